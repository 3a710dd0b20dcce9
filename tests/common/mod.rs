//! Fixture Go modules written into temporary directories.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use findimpls::{ConformanceResult, LoadConfig, Program};
use tempfile::TempDir;

pub const MODULE: &str = "example.com/geo";

/// A throwaway Go module rooted at a temporary directory.
pub struct GoModule {
    _tmp: TempDir,
    root: PathBuf,
}

impl GoModule {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        fs::write(root.join("go.mod"), format!("module {MODULE}\n\ngo 1.22\n")).unwrap();
        Self { _tmp: tmp, root }
    }

    /// Writes `src` to `rel`, creating parent directories.
    pub fn file(self, rel: &str, src: &str) -> Self {
        let path = self.root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, src).unwrap();
        self
    }

    pub fn dir(self, rel: &str) -> Self {
        fs::create_dir_all(self.root.join(rel)).unwrap();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads from the module root for linux/amd64.
    pub fn config(&self) -> LoadConfig {
        LoadConfig::new(&self.root).with_platform("linux", "amd64")
    }
}

/// The geo/shapes module: `Shape` in `geo`, implementations in `shapes`.
pub fn shapes_module() -> GoModule {
    GoModule::new()
        .file(
            "geo/geo.go",
            "package geo\n\
             \n\
             // Shape is anything with an area.\n\
             type Shape interface {\n\
             \tArea() float64\n\
             }\n\
             \n\
             type Point struct{ X, Y float64 }\n",
        )
        .file(
            "shapes/shapes.go",
            "package shapes\n\
             \n\
             import \"example.com/geo/geo\"\n\
             \n\
             type Circle struct{ R float64 }\n\
             \n\
             func (c Circle) Area() float64 { return 3.14159 * c.R * c.R }\n\
             \n\
             type Square struct{ Side float64 }\n\
             \n\
             func (s *Square) Area() float64 {\n\
             \treturn s.Side * s.Side\n\
             }\n\
             \n\
             type Named interface {\n\
             \tArea() float64\n\
             \tName() string\n\
             }\n\
             \n\
             type Label string\n\
             \n\
             var _ geo.Shape = Circle{}\n",
        )
}

/// `(type, method, receiver)` triples of one package, sorted by type.
pub fn entries(
    program: &Program,
    result: &ConformanceResult,
    package: &str,
) -> Vec<(String, String, String)> {
    let impls = result
        .by_path(package)
        .unwrap_or_else(|| panic!("no entry for {package}"));
    let mut out = Vec::new();
    for (typ, methods) in &impls.impls {
        let name = typ.display(program, impls.package);
        if methods.is_empty() {
            out.push((name.clone(), String::new(), String::new()));
        }
        for (method, decl) in methods {
            let decl = program.method_decl(*decl);
            assert_eq!(decl.name, method);
            out.push((name.clone(), method.clone(), decl.receiver.to_string()));
        }
    }
    out.sort();
    out
}

pub fn triple(typ: &str, method: &str, receiver: &str) -> (String, String, String) {
    (typ.to_string(), method.to_string(), receiver.to_string())
}
