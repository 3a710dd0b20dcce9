//! Type-conformance discovery for Go programs.
//!
//! - [`load`] finds, parses and type-checks packages with their imports.
//! - [`resolve`] lists the types of the loaded packages implementing an
//!   interface, with the declarations of the requested methods.
//! - [`find`] does both for a [`Query`].

pub mod config;
pub mod error;
pub mod loader;
pub mod program;
pub mod query;
pub mod resolve;
pub mod types;

pub use config::{CancelToken, LoadConfig, LoadMode};
pub use error::{FindError, LoadError, ResolveError};
pub use loader::load;
pub use program::{DeclRef, FileId, GoFile, MethodDecl, Package, PackageId, Pos, Position, Program};
pub use query::{find, Discovery, Query};
pub use resolve::{resolve, ConformanceResult, ImplForm, ImplType, PackageImpls};
