//! Expansion of package patterns into package directories.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use walkdir::WalkDir;

use super::module::Module;
use crate::error::LoadError;

/// One package a pattern named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub pattern: String,
    pub path: String,
    pub dir: PathBuf,
    /// Came from a `/...` pattern; a directory without buildable files is skipped.
    pub wildcard: bool,
}

/// Expands `patterns` relative to `cwd`. Duplicates keep their first position.
pub fn expand<S: AsRef<str>>(
    patterns: &[S],
    module: &Module,
    cwd: &Path,
    goroot: Option<&Path>,
) -> Result<Vec<Target>, LoadError> {
    let mut targets: IndexMap<String, Target> = IndexMap::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let expanded = match pattern.strip_suffix("/...").or((pattern == "...").then_some("")) {
            Some(prefix) => expand_wildcard(pattern, prefix, module, cwd)?,
            None => vec![single(pattern, module, cwd, goroot)?],
        };
        for target in expanded {
            targets.entry(target.path.clone()).or_insert(target);
        }
    }
    Ok(targets.into_values().collect())
}

fn is_relative(pattern: &str) -> bool {
    pattern == "." || pattern == ".." || pattern.starts_with("./") || pattern.starts_with("../")
}

fn local_dir(pattern: &str, cwd: &Path) -> Result<PathBuf, LoadError> {
    let dir = if Path::new(pattern).is_absolute() {
        PathBuf::from(pattern)
    } else {
        cwd.join(pattern)
    };
    dir.canonicalize().map_err(|_| LoadError::PackageNotFound {
        pattern: pattern.to_string(),
        reason: format!("directory {} does not exist", dir.display()),
    })
}

fn single(
    pattern: &str,
    module: &Module,
    cwd: &Path,
    goroot: Option<&Path>,
) -> Result<Target, LoadError> {
    let not_found = |reason: String| LoadError::PackageNotFound {
        pattern: pattern.to_string(),
        reason,
    };

    if is_relative(pattern) || Path::new(pattern).is_absolute() {
        let dir = local_dir(pattern, cwd)?;
        let path = module.import_path_for(&dir).ok_or_else(|| {
            not_found(format!(
                "directory {} is outside the main module {}",
                dir.display(),
                module.root.display()
            ))
        })?;
        return Ok(Target {
            pattern: pattern.to_string(),
            path,
            dir,
            wildcard: false,
        });
    }

    let candidates = [
        module.dir_for(pattern),
        Some(module.vendor_dir(pattern)),
        goroot.map(|g| g.join("src").join(pattern)),
    ];
    let dir = candidates
        .into_iter()
        .flatten()
        .find(|d| d.is_dir())
        .ok_or_else(|| not_found("no directory for this import path".to_string()))?;
    Ok(Target {
        pattern: pattern.to_string(),
        path: pattern.to_string(),
        dir,
        wildcard: false,
    })
}

fn expand_wildcard(
    pattern: &str,
    prefix: &str,
    module: &Module,
    cwd: &Path,
) -> Result<Vec<Target>, LoadError> {
    let base = if prefix.is_empty() {
        cwd.canonicalize().map_err(|_| LoadError::NoMatch {
            pattern: pattern.to_string(),
        })?
    } else if is_relative(prefix) || Path::new(prefix).is_absolute() {
        local_dir(prefix, cwd)?
    } else {
        module.dir_for(prefix).ok_or_else(|| LoadError::PackageNotFound {
            pattern: pattern.to_string(),
            reason: format!("{prefix} is not in the main module {}", module.path),
        })?
    };

    let walker = WalkDir::new(&base)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !skip_dir(e.path()));
    let mut targets = Vec::new();
    for entry in walker {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_dir() || !has_go_files(entry.path()) {
            continue;
        }
        let Some(path) = module.import_path_for(entry.path()) else {
            continue;
        };
        targets.push(Target {
            pattern: pattern.to_string(),
            path,
            dir: entry.path().to_path_buf(),
            wildcard: true,
        });
    }
    if targets.is_empty() {
        return Err(LoadError::NoMatch {
            pattern: pattern.to_string(),
        });
    }
    Ok(targets)
}

/// Directories `go build ./...` never descends into.
fn skip_dir(dir: &Path) -> bool {
    let name = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if !dir.is_dir() {
        return false;
    }
    name.starts_with('.')
        || name.starts_with('_')
        || name == "testdata"
        || name == "vendor"
        || dir.join("go.mod").is_file()
}

fn has_go_files(dir: &Path) -> bool {
    std::fs::read_dir(dir).is_ok_and(|entries| {
        entries
            .filter_map(Result::ok)
            .any(|e| e.path().extension().is_some_and(|x| x == "go") && e.path().is_file())
    })
}
