//! The loaded, type-checked program.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use findimpls_parser::ast::{FuncDecl, FuncDeclId, Interner, Span, Symbol};
use findimpls_parser::ParsedFile;
use indexmap::IndexMap;

use crate::config::CancelToken;
use crate::loader::Module;
use crate::types::{ObjId, Object, PackageInfo, TypeCtx};

/// Index of a package within its [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(pub(crate) u32);

impl PackageId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a source file within its [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub(crate) u32);

impl FileId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Program-wide source location: a byte offset within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos {
    pub file: FileId,
    pub offset: u32,
}

impl Pos {
    pub fn new(file: FileId, span: Span) -> Self {
        Self {
            file,
            offset: span.start,
        }
    }
}

/// Human-readable location, 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub path: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path.display(), self.line, self.column)
    }
}

/// One parsed source file.
#[derive(Debug)]
pub struct GoFile {
    pub path: PathBuf,
    pub package: PackageId,
    pub src: String,
    pub syntax: ParsedFile,
    line_starts: Vec<u32>,
}

impl GoFile {
    pub(crate) fn new(path: PathBuf, package: PackageId, src: String, syntax: ParsedFile) -> Self {
        let line_starts = line_starts(&src);
        Self {
            path,
            package,
            src,
            syntax,
            line_starts,
        }
    }

    /// 1-based line and byte column of `offset`.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let line = self.line_starts.partition_point(|&s| s <= offset);
        let start = self.line_starts[line.saturating_sub(1)];
        (line as u32, offset - start + 1)
    }

    pub fn text(&self, span: Span) -> &str {
        span.text(&self.src)
    }
}

pub(crate) fn line_starts(src: &str) -> Vec<u32> {
    std::iter::once(0)
        .chain(src.match_indices('\n').map(|(i, _)| i as u32 + 1))
        .collect()
}

/// One package of the program.
#[derive(Debug)]
pub struct Package {
    pub id: PackageId,
    /// Unique import path.
    pub path: String,
    /// Name from the package clause (last path element for opaque packages).
    pub name: String,
    pub dir: Option<PathBuf>,
    pub files: Vec<FileId>,
    /// Import path to package, in first-import order.
    pub imports: IndexMap<String, PackageId>,
    /// Packages without sources (`"C"`, `"unsafe"`, unlocated standard library).
    pub opaque: bool,
    pub info: PackageInfo,
}

/// A syntactic function declaration, addressed by file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclRef {
    pub file: FileId,
    pub func: FuncDeclId,
}

/// View over a method declaration owned by a package's syntax tree.
#[derive(Debug, Clone)]
pub struct MethodDecl<'p> {
    pub name: &'p str,
    pub decl: &'p FuncDecl,
    /// Receiver clause as written, e.g. `(s *Square)`.
    pub receiver: &'p str,
    /// Parameter list as written, e.g. `(f float64)`.
    pub params: &'p str,
    pub body: Option<Span>,
    /// Whole declaration as written.
    pub text: &'p str,
    pub position: Position,
}

/// Packages, files and semantic model of one load.
///
/// Immutable once produced by [`crate::load`].
#[derive(Debug)]
pub struct Program {
    pub(crate) module: Module,
    pub(crate) interner: Interner,
    pub(crate) tcx: TypeCtx,
    pub(crate) files: Vec<GoFile>,
    pub(crate) packages: Vec<Package>,
    pub(crate) roots: Vec<PackageId>,
    pub(crate) by_path: HashMap<String, PackageId>,
    pub(crate) cancel: Option<CancelToken>,
}

impl Program {
    /// Root packages, in pattern order.
    pub fn roots(&self) -> impl Iterator<Item = &Package> + '_ {
        self.roots.iter().map(|id| &self.packages[id.index()])
    }

    /// All packages; dependencies precede their importers.
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.index()]
    }

    pub fn package_by_path(&self, path: &str) -> Option<&Package> {
        self.by_path.get(path).map(|id| self.package(*id))
    }

    pub fn file(&self, id: FileId) -> &GoFile {
        &self.files[id.index()]
    }

    pub fn files(&self) -> &[GoFile] {
        &self.files
    }

    pub fn module_path(&self) -> &str {
        &self.module.path
    }

    pub fn module_root(&self) -> &Path {
        &self.module.root
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    pub fn types(&self) -> &TypeCtx {
        &self.tcx
    }

    pub fn object(&self, id: ObjId) -> &Object {
        self.tcx.object(id)
    }

    pub fn name(&self, sym: Symbol) -> &str {
        self.interner.resolve(sym)
    }

    /// Package-level object named `name`.
    pub fn scope_lookup(&self, pkg: PackageId, name: &str) -> Option<ObjId> {
        let sym = self.interner.get(name)?;
        self.package(pkg).info.scope.get(&sym).copied()
    }

    /// Object declared by the identifier at `pos`.
    pub fn def_at(&self, pos: Pos) -> Option<ObjId> {
        let pkg = self.file(pos.file).package;
        self.package(pkg).info.defs.get(&pos).copied()
    }

    /// Object referred to by the identifier at `pos`.
    pub fn use_at(&self, pos: Pos) -> Option<ObjId> {
        let pkg = self.file(pos.file).package;
        self.package(pkg).info.uses.get(&pos).copied()
    }

    pub fn position(&self, pos: Pos) -> Position {
        let file = self.file(pos.file);
        let (line, column) = file.line_col(pos.offset);
        Position {
            path: file.path.clone(),
            line,
            column,
        }
    }

    pub(crate) fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    /// The declaration `decl` points at.
    pub fn method_decl(&self, decl: DeclRef) -> MethodDecl<'_> {
        let file = self.file(decl.file);
        let arena = &file.syntax.arena;
        let func = &arena.funcs[decl.func];
        let receiver = func
            .recv
            .map(|r| file.text(r.l_paren.to(r.r_paren)))
            .unwrap_or_default();
        let params = arena.signatures[func.signature].params;
        MethodDecl {
            name: self.interner.resolve(func.name.sym),
            decl: func,
            receiver,
            params: file.text(params.l_paren.to(params.r_paren)),
            body: func.body.map(|b| b.span()),
            text: file.text(arena.funcs.span(decl.func)),
            position: self.position(Pos::new(decl.file, func.func_pos)),
        }
    }
}
