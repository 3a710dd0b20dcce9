//! Load configuration.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Facets of information requested for every loaded package.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LoadMode(u16);

impl LoadMode {
    pub const NAME: Self = Self(1 << 0);
    pub const FILES: Self = Self(1 << 1);
    pub const IMPORTS: Self = Self(1 << 2);
    pub const DEPS: Self = Self(1 << 3);
    pub const SYNTAX: Self = Self(1 << 4);
    pub const TYPES: Self = Self(1 << 5);
    pub const TYPES_INFO: Self = Self(1 << 6);

    /// Everything discovery needs: the dependency graph, syntax trees,
    /// identifier resolution and package scopes.
    pub const DISCOVERY: Self = Self(0x7f);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Facets of `required` that `self` lacks.
    pub const fn missing(self, required: Self) -> Self {
        Self(required.0 & !self.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for LoadMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LoadMode {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(LoadMode, &str); 7] = [
            (LoadMode::NAME, "NAME"),
            (LoadMode::FILES, "FILES"),
            (LoadMode::IMPORTS, "IMPORTS"),
            (LoadMode::DEPS, "DEPS"),
            (LoadMode::SYNTAX, "SYNTAX"),
            (LoadMode::TYPES, "TYPES"),
            (LoadMode::TYPES_INFO, "TYPES_INFO"),
        ];
        let set: Vec<&str> = NAMES
            .iter()
            .filter(|(m, _)| self.contains(*m))
            .map(|(_, n)| *n)
            .collect();
        if set.is_empty() {
            f.write_str("(empty)")
        } else {
            f.write_str(&set.join("|"))
        }
    }
}

/// Cooperative cancellation flag shared between a caller and a running load or resolve.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Where and how packages are loaded.
#[derive(Clone, Debug)]
pub struct LoadConfig {
    /// Working directory; the module root is the nearest ancestor with a `go.mod`.
    pub dir: PathBuf,
    pub mode: LoadMode,
    pub goos: String,
    pub goarch: String,
    pub build_tags: Vec<String>,
    /// Include `_test.go` files of the package itself.
    pub tests: bool,
    /// Go installation root; standard library sources are searched in `<goroot>/src`.
    pub goroot: Option<PathBuf>,
    pub cancel: Option<CancelToken>,
}

impl LoadConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            mode: LoadMode::DISCOVERY,
            goos: host_goos().to_string(),
            goarch: host_goarch().to_string(),
            build_tags: Vec::new(),
            tests: false,
            goroot: None,
            cancel: None,
        }
    }

    /// Like [`LoadConfig::new`], with `GOOS`, `GOARCH`, `GOROOT` and the
    /// `-tags` flag of `GOFLAGS` taken from the environment.
    pub fn from_env(dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::new(dir);
        if let Some(goos) = non_empty_var("GOOS") {
            config.goos = goos;
        }
        if let Some(goarch) = non_empty_var("GOARCH") {
            config.goarch = goarch;
        }
        config.goroot = non_empty_var("GOROOT").map(PathBuf::from);
        if let Some(flags) = non_empty_var("GOFLAGS") {
            config.build_tags = tags_from_goflags(&flags);
        }
        config
    }

    pub fn with_mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_platform(mut self, goos: impl Into<String>, goarch: impl Into<String>) -> Self {
        self.goos = goos.into();
        self.goarch = goarch.into();
        self
    }

    pub fn with_build_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.build_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tests(mut self, tests: bool) -> Self {
        self.tests = tests;
        self
    }

    pub fn with_goroot(mut self, goroot: impl Into<PathBuf>) -> Self {
        self.goroot = Some(goroot.into());
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Extracts the tag list of `-tags=a,b` (or `--tags=a,b`) from a `GOFLAGS` value.
fn tags_from_goflags(flags: &str) -> Vec<String> {
    flags
        .split_whitespace()
        .filter_map(|f| {
            f.strip_prefix("--tags=")
                .or_else(|| f.strip_prefix("-tags="))
        })
        .last()
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Host operating system under its Go name.
pub fn host_goos() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Host architecture under its Go name.
pub fn host_goarch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        "wasm32" => "wasm",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_mode_holds_every_facet() {
        let all = LoadMode::NAME
            | LoadMode::FILES
            | LoadMode::IMPORTS
            | LoadMode::DEPS
            | LoadMode::SYNTAX
            | LoadMode::TYPES
            | LoadMode::TYPES_INFO;
        assert_eq!(all, LoadMode::DISCOVERY);

        let partial = LoadMode::NAME | LoadMode::SYNTAX;
        let missing = partial.missing(LoadMode::DISCOVERY);
        assert!(missing.contains(LoadMode::TYPES_INFO));
        assert!(!missing.contains(LoadMode::SYNTAX));
        assert_eq!(format!("{partial:?}"), "NAME|SYNTAX");
    }

    #[test]
    fn goflags_tags_are_extracted() {
        assert_eq!(
            tags_from_goflags("-mod=mod -tags=integration,linux_only"),
            vec!["integration", "linux_only"]
        );
        assert!(tags_from_goflags("-mod=vendor").is_empty());
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let config = LoadConfig::new(".").with_cancel(token.clone());
        assert!(!config.is_cancelled());
        token.cancel();
        assert!(config.is_cancelled());
    }
}
