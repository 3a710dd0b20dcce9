//! One-call discovery: load the packages, then resolve the interface.

use crate::config::{LoadConfig, LoadMode};
use crate::error::FindError;
use crate::loader::load;
use crate::program::Program;
use crate::resolve::{resolve, ConformanceResult};

/// What to load and what to look for.
#[derive(Clone, Debug)]
pub struct Query {
    pub config: LoadConfig,
    /// Package patterns to load and scan.
    pub packages: Vec<String>,
    /// Import path of the package declaring the interface.
    pub interface_package: String,
    pub interface_name: String,
    /// Methods whose declarations are retrieved for every conforming type.
    pub methods: Vec<String>,
}

impl Query {
    pub fn new(
        config: LoadConfig,
        interface_package: impl Into<String>,
        interface_name: impl Into<String>,
    ) -> Self {
        Self {
            config,
            packages: Vec::new(),
            interface_package: interface_package.into(),
            interface_name: interface_name.into(),
            methods: Vec::new(),
        }
    }

    pub fn with_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages = packages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn run(&self) -> Result<Discovery, FindError> {
        find(self)
    }
}

/// The loaded program and what was found in it.
///
/// Declarations in `result` point into `program`.
#[derive(Debug)]
pub struct Discovery {
    pub program: Program,
    pub result: ConformanceResult,
}

/// Loads `query.packages` and resolves the interface against them.
pub fn find(query: &Query) -> Result<Discovery, FindError> {
    let mut config = query.config.clone();
    config.mode |= LoadMode::DISCOVERY;
    let program = load(&query.packages, &config)?;
    let result = resolve(
        &program,
        &query.interface_package,
        &query.interface_name,
        &query.methods,
    )?;
    Ok(Discovery { program, result })
}
