use std::path::PathBuf;

use thiserror::Error;

use crate::config::LoadMode;

/// A requested package could not be found, parsed or type-checked.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("load mode {mode:?} lacks required facets {missing:?}")]
    IncompleteMode { mode: LoadMode, missing: LoadMode },

    #[error("no go.mod found in {} or any parent directory", dir.display())]
    NoModule { dir: PathBuf },

    #[error("{}: invalid go.mod: {message}", path.display())]
    InvalidGoMod { path: PathBuf, message: String },

    #[error("no package patterns given")]
    EmptyPatterns,

    #[error("pattern {pattern:?} matched no packages")]
    NoMatch { pattern: String },

    #[error("package {pattern:?} not found: {reason}")]
    PackageNotFound { pattern: String, reason: String },

    #[error("package {importer}: cannot find imported package {path:?}")]
    ImportNotFound { importer: String, path: String },

    #[error("import cycle not allowed: {}", cycle.join(" -> "))]
    ImportCycle { cycle: Vec<String> },

    #[error("package {package}: no buildable Go source files in {}", dir.display())]
    NoGoFiles { package: String, dir: PathBuf },

    #[error("package {package}: found packages {first} and {second} in {}", dir.display())]
    MixedPackages {
        package: String,
        dir: PathBuf,
        first: String,
        second: String,
    },

    #[error("package {package}: {}: {source}", path.display())]
    Io {
        package: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("package {package}: {position}: {message}")]
    Parse {
        package: String,
        position: String,
        message: String,
    },

    #[error("package {package}: {position}: {message}")]
    TypeCheck {
        package: String,
        position: String,
        message: String,
    },

    #[error("load cancelled")]
    Cancelled,
}

/// Conformance resolution failed; no partial result exists.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("interface {package}.{name} not found: {reason}")]
    InterfaceNotFound {
        package: String,
        name: String,
        reason: String,
    },

    #[error("{package}.{name} is not an interface type")]
    NotAnInterface { package: String, name: String },

    #[error("interface {package}.{name} embeds {embedded}, but the sources of package {source_package} were not loaded")]
    IncompleteInterface {
        package: String,
        name: String,
        embedded: String,
        source_package: String,
    },

    #[error("package {package}: whether {type_name} conforms depends on embedded {embedded}, but the sources of package {source_package} were not loaded")]
    OpaqueEmbedding {
        package: String,
        type_name: String,
        embedded: String,
        source_package: String,
    },

    #[error("package {package}: type {type_name} has no method {method}")]
    MethodNotFound {
        package: String,
        type_name: String,
        method: String,
    },

    #[error("package {package}: method {type_name}.{method} has no declaration with a body in the package")]
    DeclarationNotFound {
        package: String,
        type_name: String,
        method: String,
    },

    #[error("resolution cancelled")]
    Cancelled,
}

/// Error of a combined load and resolve run.
#[derive(Debug, Error)]
pub enum FindError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}
