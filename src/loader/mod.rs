//! Program Loader: finds, parses and type-checks packages with their
//! dependency closure.
//!
//! Packages are loaded depth-first along imports; a package is checked as
//! soon as all its imports are, so ids follow dependency order.

mod build;
mod module;
mod patterns;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use findimpls_parser::ast::{Interner, Spec};
use findimpls_parser::{parse_source, ParsedFile};
use indexmap::IndexMap;

pub use build::{BuildContext, Constraint};
pub use module::{find_module, Module};

use build::LATEST_GO_MINOR;
use patterns::Target;

use crate::config::{LoadConfig, LoadMode};
use crate::error::LoadError;
use crate::program::{line_starts, FileId, GoFile, Package, PackageId, Program};
use crate::types::{Checker, PackageInfo, TypeCtx};

/// Loads the packages named by `patterns` and everything they import.
pub fn load<S: AsRef<str>>(patterns: &[S], config: &LoadConfig) -> Result<Program, LoadError> {
    let missing = config.mode.missing(LoadMode::DISCOVERY);
    if !missing.is_empty() {
        return Err(LoadError::IncompleteMode {
            mode: config.mode,
            missing,
        });
    }
    if patterns.is_empty() {
        return Err(LoadError::EmptyPatterns);
    }
    if config.is_cancelled() {
        return Err(LoadError::Cancelled);
    }

    let module = find_module(&config.dir)?;
    let cwd = config
        .dir
        .canonicalize()
        .unwrap_or_else(|_| config.dir.clone());
    let targets = patterns::expand(patterns, &module, &cwd, config.goroot.as_deref())?;

    let ctx = BuildContext {
        goos: config.goos.clone(),
        goarch: config.goarch.clone(),
        tags: config.build_tags.iter().cloned().collect(),
        go_minor: module.go_minor().unwrap_or(LATEST_GO_MINOR),
        tests: config.tests,
    };
    let mut interner = Interner::new();
    let tcx = TypeCtx::new(&mut interner);
    let mut loader = Loader {
        config,
        module,
        ctx,
        interner,
        tcx,
        files: Vec::new(),
        packages: Vec::new(),
        by_path: HashMap::new(),
        in_progress: Vec::new(),
    };

    let mut roots = Vec::new();
    let mut matched: IndexMap<&str, bool> = IndexMap::new();
    for target in &targets {
        let found = matched.entry(target.pattern.as_str()).or_insert(false);
        match loader.load_target(target)? {
            Some(id) => {
                *found = true;
                if !roots.contains(&id) {
                    roots.push(id);
                }
            }
            None => tracing::debug!(dir = %target.dir.display(), "no buildable Go files, skipped"),
        }
    }
    if let Some((pattern, _)) = matched.iter().find(|(_, found)| !**found) {
        return Err(LoadError::NoMatch {
            pattern: pattern.to_string(),
        });
    }

    tracing::info!(
        roots = roots.len(),
        packages = loader.packages.len(),
        files = loader.files.len(),
        "program loaded"
    );
    Ok(Program {
        module: loader.module,
        interner: loader.interner,
        tcx: loader.tcx,
        files: loader.files,
        packages: loader.packages,
        roots,
        by_path: loader.by_path,
        cancel: config.cancel.clone(),
    })
}

/// Where an import path was found.
enum Origin {
    Dir(PathBuf),
    Opaque,
}

struct Loader<'c> {
    config: &'c LoadConfig,
    module: Module,
    ctx: BuildContext,
    interner: Interner,
    tcx: TypeCtx,
    files: Vec<GoFile>,
    packages: Vec<Package>,
    by_path: HashMap<String, PackageId>,
    /// Import paths on the current DFS path.
    in_progress: Vec<String>,
}

/// A parsed file waiting for its package id.
struct Pending {
    path: PathBuf,
    src: String,
    syntax: ParsedFile,
}

impl Loader<'_> {
    /// `None` when a wildcard target has no buildable files.
    fn load_target(&mut self, target: &Target) -> Result<Option<PackageId>, LoadError> {
        if target.wildcard
            && !self.by_path.contains_key(&target.path)
            && build::select_files(&target.dir, &self.ctx)
                .map(|files| files.is_empty())
                .unwrap_or(false)
        {
            return Ok(None);
        }
        self.load_package(&target.path, &target.dir).map(Some)
    }

    fn load_package(&mut self, path: &str, dir: &Path) -> Result<PackageId, LoadError> {
        if let Some(&id) = self.by_path.get(path) {
            return Ok(id);
        }
        if let Some(start) = self.in_progress.iter().position(|p| p == path) {
            let mut cycle = self.in_progress[start..].to_vec();
            cycle.push(path.to_string());
            return Err(LoadError::ImportCycle { cycle });
        }
        if self.config.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        tracing::trace!(package = path, dir = %dir.display(), "loading package");

        let selected = build::select_files(dir, &self.ctx).map_err(|source| LoadError::Io {
            package: path.to_string(),
            path: dir.to_path_buf(),
            source,
        })?;
        let (name, pending) = self.parse_files(path, dir, selected)?;

        let mut imports: IndexMap<String, PackageId> = IndexMap::new();
        self.in_progress.push(path.to_string());
        let resolved = self.load_imports(path, &pending, &mut imports);
        self.in_progress.pop();
        resolved?;

        let id = PackageId(self.packages.len() as u32);
        let mut file_ids = Vec::with_capacity(pending.len());
        for file in pending {
            file_ids.push(FileId(self.files.len() as u32));
            self.files
                .push(GoFile::new(file.path, id, file.src, file.syntax));
        }

        let info = Checker::new(
            &mut self.tcx,
            &self.interner,
            &self.packages,
            &self.files,
            id,
            &file_ids,
            &imports,
        )
        .check()
        .map_err(|err| {
            let file = &self.files[err.pos.file.index()];
            let (line, column) = file.line_col(err.pos.offset);
            LoadError::TypeCheck {
                package: path.to_string(),
                position: format!("{}:{line}:{column}", file.path.display()),
                message: err.message,
            }
        })?;

        tracing::debug!(package = path, files = file_ids.len(), "loaded package");
        self.packages.push(Package {
            id,
            path: path.to_string(),
            name,
            dir: Some(dir.to_path_buf()),
            files: file_ids,
            imports,
            opaque: false,
            info,
        });
        self.by_path.insert(path.to_string(), id);
        Ok(id)
    }

    /// Parses the selected files, dropping external `_test` package files.
    fn parse_files(
        &mut self,
        package: &str,
        dir: &Path,
        selected: Vec<(PathBuf, String)>,
    ) -> Result<(String, Vec<Pending>), LoadError> {
        let mut parsed = Vec::with_capacity(selected.len());
        for (path, src) in selected {
            let syntax = parse_source(&src, &mut self.interner).map_err(|failure| {
                let (position, message) = match failure.first() {
                    Some(diag) => {
                        let starts = line_starts(&src);
                        let line = starts.partition_point(|&s| s <= diag.span.start);
                        let column = diag.span.start - starts[line.saturating_sub(1)] + 1;
                        (
                            format!("{}:{line}:{column}", path.display()),
                            diag.message.clone(),
                        )
                    }
                    None => (path.display().to_string(), "syntax error".to_string()),
                };
                LoadError::Parse {
                    package: package.to_string(),
                    position,
                    message,
                }
            })?;
            let name = self.interner.resolve(syntax.file.name.sym).to_string();
            parsed.push((name, Pending { path, src, syntax }));
        }

        // The package name comes from the first non-test file.
        let is_test = |p: &Pending| p.path.to_string_lossy().ends_with("_test.go");
        let Some(name) = parsed
            .iter()
            .find(|(_, p)| !is_test(p))
            .or_else(|| parsed.first())
            .map(|(name, _)| name.clone())
        else {
            return Err(LoadError::NoGoFiles {
                package: package.to_string(),
                dir: dir.to_path_buf(),
            });
        };
        let external = format!("{name}_test");

        let mut files = Vec::with_capacity(parsed.len());
        for (file_name, pending) in parsed {
            if file_name == name {
                files.push(pending);
            } else if is_test(&pending) && file_name == external {
                tracing::trace!(file = %pending.path.display(), "skipping external test file");
            } else {
                return Err(LoadError::MixedPackages {
                    package: package.to_string(),
                    dir: dir.to_path_buf(),
                    first: name,
                    second: file_name,
                });
            }
        }
        Ok((name, files))
    }

    fn load_imports(
        &mut self,
        importer: &str,
        files: &[Pending],
        imports: &mut IndexMap<String, PackageId>,
    ) -> Result<(), LoadError> {
        for file in files {
            let arena = &file.syntax.arena;
            let specs = arena
                .gen_decls(&file.syntax.file)
                .flat_map(|gen| arena.specs_list(gen.specs))
                .filter_map(|spec| match spec {
                    Spec::Import(imp) => Some(imp),
                    _ => None,
                });
            for imp in specs {
                let path = imp.path.value(&file.src);
                if imports.contains_key(path) {
                    continue;
                }
                let id = self.load_import(importer, path)?;
                imports.insert(path.to_string(), id);
            }
        }
        Ok(())
    }

    fn load_import(&mut self, importer: &str, path: &str) -> Result<PackageId, LoadError> {
        if let Some(&id) = self.by_path.get(path) {
            return Ok(id);
        }
        match self.locate(path) {
            Some(Origin::Dir(dir)) => self.load_package(path, &dir),
            Some(Origin::Opaque) => Ok(self.opaque_package(path)),
            None => Err(LoadError::ImportNotFound {
                importer: importer.to_string(),
                path: path.to_string(),
            }),
        }
    }

    fn locate(&self, path: &str) -> Option<Origin> {
        if path == "C" || path == "unsafe" {
            return Some(Origin::Opaque);
        }
        if let Some(dir) = self.module.dir_for(path) {
            return dir.is_dir().then_some(Origin::Dir(dir));
        }
        let vendor = self.module.vendor_dir(path);
        if vendor.is_dir() {
            return Some(Origin::Dir(vendor));
        }
        if let Some(goroot) = &self.config.goroot {
            let src = goroot.join("src");
            for dir in [src.join(path), src.join("vendor").join(path)] {
                if dir.is_dir() {
                    return Some(Origin::Dir(dir));
                }
            }
        }
        is_std_path(path).then_some(Origin::Opaque)
    }

    fn opaque_package(&mut self, path: &str) -> PackageId {
        if path != "C" && path != "unsafe" {
            tracing::warn!(
                package = path,
                "standard library sources not found, treating package as opaque"
            );
        }
        let id = PackageId(self.packages.len() as u32);
        self.packages.push(Package {
            id,
            path: path.to_string(),
            name: guess_package_name(path),
            dir: None,
            files: Vec::new(),
            imports: IndexMap::new(),
            opaque: true,
            info: PackageInfo::default(),
        });
        self.by_path.insert(path.to_string(), id);
        id
    }
}

/// Standard library paths have no dot in their first element.
fn is_std_path(path: &str) -> bool {
    path.split('/').next().is_some_and(|first| !first.contains('.'))
}

/// Default name of a package known only by path: the last element, without
/// a `go-` prefix or a major version suffix.
fn guess_package_name(path: &str) -> String {
    let mut elems = path.rsplit('/');
    let mut last = elems.next().unwrap_or(path);
    let is_major = |s: &str| {
        s.strip_prefix('v')
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
    };
    if is_major(last) {
        last = elems.next().unwrap_or(last);
    }
    let last = last.strip_prefix("go-").unwrap_or(last);
    let last = match last.rsplit_once(".v") {
        Some((base, major)) if major.chars().all(|c| c.is_ascii_digit()) => base,
        _ => last,
    };
    last.replace(['-', '.'], "_")
}
