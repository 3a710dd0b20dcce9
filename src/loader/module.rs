//! Main module discovery and `go.mod` parsing.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::LoadError;

/// The module containing the load directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Module path from the `module` directive.
    pub path: String,
    /// Directory holding `go.mod`.
    pub root: PathBuf,
    /// Version from the `go` directive, e.g. `1.22` or `1.22.3`.
    pub go_version: Option<String>,
}

impl Module {
    /// Minor release of the `go` directive (`22` for `1.22.3`).
    pub fn go_minor(&self) -> Option<u32> {
        let version = self.go_version.as_deref()?;
        let mut parts = version.split('.');
        match (parts.next(), parts.next()) {
            (Some("1"), Some(minor)) => {
                let digits: String = minor.chars().take_while(char::is_ascii_digit).collect();
                digits.parse().ok()
            }
            _ => None,
        }
    }

    /// Directory of `import_path` if it lies inside the module.
    pub fn dir_for(&self, import_path: &str) -> Option<PathBuf> {
        if import_path == self.path {
            return Some(self.root.clone());
        }
        let rel = import_path.strip_prefix(&self.path)?.strip_prefix('/')?;
        Some(self.root.join(rel))
    }

    /// Import path of `dir`, which must be inside the module root.
    pub fn import_path_for(&self, dir: &Path) -> Option<String> {
        let rel = dir.strip_prefix(&self.root).ok()?;
        let mut path = self.path.clone();
        for component in rel.components() {
            match component {
                Component::Normal(part) => {
                    path.push('/');
                    path.push_str(part.to_str()?);
                }
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(path)
    }

    /// `<root>/vendor/<import_path>`.
    pub fn vendor_dir(&self, import_path: &str) -> PathBuf {
        self.root.join("vendor").join(import_path)
    }
}

/// Finds the nearest `go.mod` at or above `dir`.
pub fn find_module(dir: &Path) -> Result<Module, LoadError> {
    let start = dir.canonicalize().map_err(|_| LoadError::NoModule {
        dir: dir.to_path_buf(),
    })?;
    let Some(root) = start.ancestors().find(|d| d.join("go.mod").is_file()) else {
        return Err(LoadError::NoModule {
            dir: dir.to_path_buf(),
        });
    };
    let go_mod = root.join("go.mod");
    let src = fs::read_to_string(&go_mod).map_err(|e| LoadError::InvalidGoMod {
        path: go_mod.clone(),
        message: e.to_string(),
    })?;
    let (path, go_version) = parse_go_mod(&src).map_err(|message| LoadError::InvalidGoMod {
        path: go_mod.clone(),
        message,
    })?;
    tracing::debug!(module = %path, root = %root.display(), "found main module");
    Ok(Module {
        path,
        root: root.to_path_buf(),
        go_version,
    })
}

/// Extracts the `module` path and `go` version. Other directives are ignored.
fn parse_go_mod(src: &str) -> Result<(String, Option<String>), String> {
    let mut module = None;
    let mut go = None;
    for (lineno, raw) in src.lines().enumerate() {
        let line = match raw.find("//") {
            Some(i) => &raw[..i],
            None => raw,
        }
        .trim();
        let mut words = line.split_whitespace();
        match words.next() {
            Some("module") => {
                let Some(path) = words.next() else {
                    return Err(format!("line {}: usage: module module/path", lineno + 1));
                };
                let path = path.trim_matches(|c| c == '"' || c == '`');
                if path.is_empty() {
                    return Err(format!("line {}: empty module path", lineno + 1));
                }
                if module.replace(path.to_string()).is_some() {
                    return Err(format!("line {}: repeated module statement", lineno + 1));
                }
            }
            Some("go") => go = words.next().map(str::to_string),
            _ => {}
        }
    }
    module
        .map(|m| (m, go))
        .ok_or_else(|| "missing module declaration".to_string())
}
