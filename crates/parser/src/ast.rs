//! # Declaration-level Go AST
//!
//! The tree models what a package-level analysis needs: the package clause,
//! imports, const/var/type declarations, and function/method declarations with
//! their full signatures. Function bodies are kept as brace-delimited blocks and
//! initializer expressions as spans; neither is parsed into statements.
//!
//! ## Architecture
//!
//! - **Nodes**: allocated in typed arenas (`SpannedArena<T>`) and addressed by `Id<T>`
//! - **Lists**: centralized buffers in `ExtraData`, referenced by `ListRef<T>`
//! - **Spans**: byte offsets kept in side tables, next to the node data
//! - **Symbols**: interned identifier text, shared by every file of a program
//!
//! Walk/Visitor infrastructure lives in `walk.rs`; `#[derive(WalkAst)]`
//! generates `impl crate::walk::Walk`.

use ast_derive::WalkAst;
use core::marker::PhantomData;
use core::ops::{Index, IndexMut};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::hash::{BuildHasher, BuildHasherDefault, Hasher, RandomState};

// =============================================================================
// Core Foundation Types
// =============================================================================

/// Byte range `[start, end)` within one source file.
///
/// Positions are stored as `u32`, limiting a single file to 4GiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Creates a new span from usize positions, clamping at `u32::MAX`.
    #[inline]
    pub const fn new(start: usize, end: usize) -> Self {
        let s = if start > u32::MAX as usize {
            u32::MAX
        } else {
            start as u32
        };
        let e = if end > u32::MAX as usize {
            u32::MAX
        } else {
            end as u32
        };
        Self { start: s, end: e }
    }

    #[inline]
    pub const fn empty_at(pos: usize) -> Self {
        Self::new(pos, pos)
    }

    /// Smallest span covering both `self` and `other`.
    #[inline]
    pub const fn to(self, other: Span) -> Span {
        let start = if self.start < other.start {
            self.start
        } else {
            other.start
        };
        let end = if self.end > other.end {
            self.end
        } else {
            other.end
        };
        Span { start, end }
    }

    #[inline]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Source text covered by this span (empty if out of bounds).
    #[inline]
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        src.get(self.start as usize..self.end as usize)
            .unwrap_or_default()
    }
}

/// Type-safe identifier for arena-allocated nodes.
#[repr(transparent)]
pub struct Id<T> {
    raw: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Copy for Id<T> {}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

// Manual impls: none of these should depend on the node type.
impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T> std::hash::Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> std::fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Id({})", self.raw)
    }
}

impl<T> Id<T> {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub const fn to_usize(&self) -> usize {
        self.raw as usize
    }

    #[inline]
    pub const fn raw(&self) -> u32 {
        self.raw
    }
}

/// Typed reference into a centralized list buffer.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ListRef<T> {
    start: u32,
    len: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Copy for ListRef<T> {}

impl<T> Clone for ListRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Default for ListRef<T> {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl<T> ListRef<T> {
    pub const EMPTY: Self = Self {
        start: 0,
        len: 0,
        _marker: PhantomData,
    };

    #[inline]
    pub const fn new(start: u32, len: u32) -> Self {
        Self {
            start,
            len,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub const fn start(&self) -> u32 {
        self.start
    }

    #[inline]
    pub const fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub const fn end(&self) -> u32 {
        self.start + self.len
    }
}

// =============================================================================
// Symbol Interning
// =============================================================================

/// Interned string symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Symbol(u32);

impl Symbol {
    #[inline]
    pub const fn from_raw(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// Identifier occurrence (interned symbol + source position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, WalkAst)]
pub struct IdentName {
    pub sym: Symbol,
    pub pos: Span,
}

/// Identity hasher for the pre-computed u64 bucket keys.
#[derive(Default)]
struct U64IdentityHasher(u64);

impl Hasher for U64IdentityHasher {
    fn write(&mut self, _b: &[u8]) {
        unreachable!("U64IdentityHasher only supports write_u64")
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.0 = i;
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }
}

type U64IdentityBuild = BuildHasherDefault<U64IdentityHasher>;

/// String interner.
///
/// Strings are stored once and found again through hash buckets keyed by a
/// seeded hash of the text.
#[derive(Debug, Default)]
pub struct Interner {
    strings: Vec<Box<str>>,
    buckets: HashMap<u64, SmallVec<[Symbol; 1]>, U64IdentityBuild>,
    state: RandomState,
}

impl Interner {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    fn hash_str(&self, s: &str) -> u64 {
        self.state.hash_one(s)
    }

    /// Interns a string and returns its symbol.
    #[inline]
    pub fn intern(&mut self, s: &str) -> Symbol {
        let h = self.hash_str(s);
        let entry = self.buckets.entry(h).or_default();

        for &sym in entry.iter() {
            if self.strings[sym.0 as usize].as_ref() == s {
                return sym;
            }
        }

        let sym = Symbol(self.strings.len() as u32);
        self.strings.push(s.into());
        entry.push(sym);
        sym
    }

    /// Looks up a string without interning it.
    pub fn get(&self, s: &str) -> Option<Symbol> {
        let h = self.hash_str(s);
        self.buckets
            .get(&h)?
            .iter()
            .copied()
            .find(|sym| self.strings[sym.0 as usize].as_ref() == s)
    }

    /// Resolves a symbol back to its string.
    ///
    /// Symbols from another interner resolve to the empty string.
    #[inline]
    pub fn resolve(&self, sym: Symbol) -> &str {
        self.strings
            .get(sym.0 as usize)
            .map(|s| s.as_ref())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

// =============================================================================
// Arena Allocation
// =============================================================================

/// Arena for nodes with associated spans (parallel vectors).
#[derive(Debug)]
pub struct SpannedArena<T> {
    data: Vec<T>,
    spans: Vec<Span>,
}

impl<T> Default for SpannedArena<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            spans: Vec::new(),
        }
    }
}

impl<T> SpannedArena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc(&mut self, node: T, span: Span) -> Id<T> {
        let id = Id::from_raw(self.data.len() as u32);
        self.data.push(node);
        self.spans.push(span);
        id
    }

    #[inline]
    pub fn get(&self, id: Id<T>) -> &T {
        &self.data[id.to_usize()]
    }

    #[inline]
    pub fn span(&self, id: Id<T>) -> Span {
        self.spans[id.to_usize()]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterates over `(id, node)` pairs in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (Id<T>, &T)> + '_ {
        self.data
            .iter()
            .enumerate()
            .map(|(i, n)| (Id::from_raw(i as u32), n))
    }
}

impl<T> Index<Id<T>> for SpannedArena<T> {
    type Output = T;
    fn index(&self, id: Id<T>) -> &T {
        self.get(id)
    }
}

impl<T> IndexMut<Id<T>> for SpannedArena<T> {
    fn index_mut(&mut self, id: Id<T>) -> &mut T {
        &mut self.data[id.to_usize()]
    }
}

// =============================================================================
// Node IDs
// =============================================================================

pub type DeclId = Id<Decl>;
pub type ExprId = Id<Expr>;
pub type TypeId = Id<Type>;
pub type FieldId = Id<Field>;
pub type SignatureId = Id<Signature>;
pub type FuncDeclId = Id<FuncDecl>;
pub type TypeParamsId = Id<TypeParams>;
pub type TypeParamDeclId = Id<TypeParamDecl>;

// =============================================================================
// Centralized List Storage
// =============================================================================

#[derive(Debug, Default)]
pub struct ExtraData {
    pub ident_names: Vec<IdentName>,
    pub exprs: Vec<ExprId>,
    pub types: Vec<TypeId>,
    pub fields: Vec<FieldId>,
    pub specs: Vec<Spec>,
    pub top_decls: Vec<TopLevelDecl>,
    pub type_terms: Vec<TypeTerm>,
    pub interface_elems: Vec<InterfaceElem>,
    pub type_param_decl_ids: Vec<TypeParamDeclId>,
}

// =============================================================================
// Main AST Arena
// =============================================================================

/// Central arena holding all nodes and list buffers of one source file.
#[derive(Debug, Default)]
pub struct AstArena {
    pub decls: SpannedArena<Decl>,
    pub exprs: SpannedArena<Expr>,
    pub types: SpannedArena<Type>,
    pub signatures: SpannedArena<Signature>,
    pub funcs: SpannedArena<FuncDecl>,
    pub fields: SpannedArena<Field>,
    pub type_params: SpannedArena<TypeParams>,
    pub type_param_decls: SpannedArena<TypeParamDecl>,
    pub extras: ExtraData,
}

impl AstArena {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn push_list<T>(buf: &mut Vec<T>, items: impl IntoIterator<Item = T>) -> ListRef<T> {
        let start = buf.len();
        buf.extend(items);
        let len = buf.len() - start;
        debug_assert!(start <= u32::MAX as usize);
        debug_assert!(len <= u32::MAX as usize);
        ListRef::new(start as u32, len as u32)
    }

    #[inline]
    fn slice<T>(buf: &[T], r: ListRef<T>) -> &[T] {
        &buf[r.start() as usize..r.end() as usize]
    }

    // List Builders

    pub fn list_ident_names(
        &mut self,
        i: impl IntoIterator<Item = IdentName>,
    ) -> ListRef<IdentName> {
        Self::push_list(&mut self.extras.ident_names, i)
    }

    pub fn list_exprs(&mut self, i: impl IntoIterator<Item = ExprId>) -> ListRef<ExprId> {
        Self::push_list(&mut self.extras.exprs, i)
    }

    pub fn list_types(&mut self, i: impl IntoIterator<Item = TypeId>) -> ListRef<TypeId> {
        Self::push_list(&mut self.extras.types, i)
    }

    pub fn list_fields(&mut self, i: impl IntoIterator<Item = FieldId>) -> ListRef<FieldId> {
        Self::push_list(&mut self.extras.fields, i)
    }

    pub fn list_specs(&mut self, i: impl IntoIterator<Item = Spec>) -> ListRef<Spec> {
        Self::push_list(&mut self.extras.specs, i)
    }

    pub fn list_top_decls(
        &mut self,
        i: impl IntoIterator<Item = TopLevelDecl>,
    ) -> ListRef<TopLevelDecl> {
        Self::push_list(&mut self.extras.top_decls, i)
    }

    pub fn list_type_terms(&mut self, i: impl IntoIterator<Item = TypeTerm>) -> ListRef<TypeTerm> {
        Self::push_list(&mut self.extras.type_terms, i)
    }

    pub fn list_interface_elems(
        &mut self,
        i: impl IntoIterator<Item = InterfaceElem>,
    ) -> ListRef<InterfaceElem> {
        Self::push_list(&mut self.extras.interface_elems, i)
    }

    pub fn list_type_param_decl_ids(
        &mut self,
        i: impl IntoIterator<Item = TypeParamDeclId>,
    ) -> ListRef<TypeParamDeclId> {
        Self::push_list(&mut self.extras.type_param_decl_ids, i)
    }

    // List Accessors

    pub fn ident_names(&self, r: ListRef<IdentName>) -> &[IdentName] {
        Self::slice(&self.extras.ident_names, r)
    }

    pub fn exprs_list(&self, r: ListRef<ExprId>) -> &[ExprId] {
        Self::slice(&self.extras.exprs, r)
    }

    pub fn types_list(&self, r: ListRef<TypeId>) -> &[TypeId] {
        Self::slice(&self.extras.types, r)
    }

    pub fn fields_list(&self, r: ListRef<FieldId>) -> &[FieldId] {
        Self::slice(&self.extras.fields, r)
    }

    pub fn specs_list(&self, r: ListRef<Spec>) -> &[Spec] {
        Self::slice(&self.extras.specs, r)
    }

    pub fn top_decls(&self, r: ListRef<TopLevelDecl>) -> &[TopLevelDecl] {
        Self::slice(&self.extras.top_decls, r)
    }

    pub fn type_terms(&self, r: ListRef<TypeTerm>) -> &[TypeTerm] {
        Self::slice(&self.extras.type_terms, r)
    }

    pub fn interface_elems(&self, r: ListRef<InterfaceElem>) -> &[InterfaceElem] {
        Self::slice(&self.extras.interface_elems, r)
    }

    pub fn type_param_decl_ids(&self, r: ListRef<TypeParamDeclId>) -> &[TypeParamDeclId] {
        Self::slice(&self.extras.type_param_decl_ids, r)
    }

    /// Iterates over the function and method declarations of a file, in source order.
    pub fn func_decls<'a>(
        &'a self,
        file: &SourceFile,
    ) -> impl Iterator<Item = (FuncDeclId, &'a FuncDecl)> + 'a {
        self.top_decls(file.decls).iter().filter_map(|d| match d {
            TopLevelDecl::Func(id) => Some((*id, &self.funcs[*id])),
            TopLevelDecl::Decl(_) => None,
        })
    }

    /// Iterates over the generic declarations (import/const/var/type) of a file.
    pub fn gen_decls<'a>(&'a self, file: &SourceFile) -> impl Iterator<Item = &'a GenDecl> + 'a {
        self.top_decls(file.decls).iter().filter_map(|d| match d {
            TopLevelDecl::Decl(id) => match &self.decls[*id] {
                Decl::Gen(g) => Some(g),
            },
            TopLevelDecl::Func(_) => None,
        })
    }
}

// =============================================================================
// Source File (Root Node)
// =============================================================================

/// A complete Go source file.
///
/// ```text
/// SourceFile = PackageClause ";" { ImportDecl ";" } { TopLevelDecl ";" }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub struct SourceFile {
    /// Position of the `package` keyword
    pub package_pos: Span,
    /// Package name
    pub name: IdentName,
    /// All top-level declarations (imports included) in source order
    pub decls: ListRef<TopLevelDecl>,
}

// =============================================================================
// Declarations
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub enum TopLevelDecl {
    Decl(DeclId),
    Func(FuncDeclId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub enum Decl {
    Gen(GenDecl),
}

/// `import`, `const`, `type` or `var` declaration, single or grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub struct GenDecl {
    pub kw_pos: Span,
    pub kind: GenDeclKind,
    pub l_paren: Option<Span>,
    pub specs: ListRef<Spec>,
    pub r_paren: Option<Span>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GenDeclKind {
    Import,
    Const,
    Type,
    Var,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub enum Spec {
    Import(ImportSpec),
    Value(ValueSpec),
    Type(TypeSpec),
}

/// `ImportSpec = [ "." | PackageName ] ImportPath`
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub struct ImportSpec {
    #[walk(skip)]
    pub name: Option<ImportName>,
    #[walk(skip)]
    pub path: StringLit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportName {
    /// `import . "pkg"`
    Dot(Span),
    /// `import _ "pkg"`
    Blank(Span),
    /// `import name "pkg"`
    Name(IdentName),
}

/// `const` or `var` specification. Initializers are kept as spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub struct ValueSpec {
    pub names: ListRef<IdentName>,
    pub typ: Option<TypeId>,
    pub values: ListRef<ExprId>,
}

/// `TypeSpec = AliasDecl | TypeDef`
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub struct TypeSpec {
    pub name: IdentName,
    pub type_params: Option<TypeParamsId>,
    #[walk(skip)]
    pub assign_pos: Option<Span>,
    pub typ: TypeId,
    pub alias: bool,
}

/// Function or method declaration.
///
/// ```text
/// FunctionDecl = "func" FunctionName [ TypeParameters ] Signature [ FunctionBody ]
/// MethodDecl   = "func" Receiver MethodName Signature [ FunctionBody ]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub struct FuncDecl {
    pub func_pos: Span,
    pub recv: Option<Receiver>,
    pub name: IdentName,
    pub type_params: Option<TypeParamsId>,
    pub signature: SignatureId,
    #[walk(skip)]
    pub body: Option<Block>,
}

impl FuncDecl {
    #[inline]
    pub fn is_method(&self) -> bool {
        self.recv.is_some()
    }
}

// =============================================================================
// Generics
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub struct TypeParams {
    pub l_brack: Span,
    pub params: ListRef<TypeParamDeclId>,
    pub r_brack: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub struct TypeParamDecl {
    pub names: ListRef<IdentName>,
    pub constraint: TypeElem,
}

/// `TypeTerm { "|" TypeTerm }`
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub struct TypeElem {
    pub terms: ListRef<TypeTerm>,
}

/// Method receiver. Receiver type parameters stay inside `typ` as type arguments
/// of the base type (`*List[T]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub struct Receiver {
    pub l_paren: Span,
    pub name: Option<IdentName>,
    pub typ: TypeId,
    pub r_paren: Span,
}

// =============================================================================
// Signatures and Fields
// =============================================================================

/// `Signature = Parameters [ Result ]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub struct Signature {
    pub params: FieldList,
    pub results: Option<Results>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub enum Results {
    /// `(x int, err error)` or `(int, error)`
    Params(FieldList),
    /// Single unnamed result: `int`
    Type(TypeId),
}

/// Parameters, results, or struct fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub struct FieldList {
    pub l_paren: Span,
    pub fields: ListRef<FieldId>,
    pub r_paren: Span,
}

/// `ParameterDecl = [ IdentifierList ] [ "..." ] Type`, or a struct field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub struct Field {
    /// Empty for unnamed parameters and embedded fields
    pub names: ListRef<IdentName>,
    #[walk(skip)]
    pub ellipsis_pos: Option<Span>,
    pub typ: TypeId,
    #[walk(skip)]
    pub tag: Option<StringLit>,
    pub is_embed: bool,
}

/// Function body. Statements are not modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub l_brace: Span,
    pub r_brace: Span,
}

impl Block {
    #[inline]
    pub fn span(&self) -> Span {
        self.l_brace.to(self.r_brace)
    }
}

// =============================================================================
// Expressions
// =============================================================================

/// Expression node. Only the shapes needed by declarations are distinguished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub enum Expr {
    Ident(IdentName),
    BasicLit(BasicLit),
    /// Any other expression; the node span covers its source text.
    Opaque,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicLit {
    pub kind: BasicLitKind,
    pub raw: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BasicLitKind {
    Int,
    Float,
    Imag,
    Rune,
    String,
}

/// String literal; `raw` includes the quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringLit {
    pub raw: Span,
}

impl StringLit {
    /// Literal value without quotes. Escape sequences are not decoded.
    pub fn value<'a>(&self, src: &'a str) -> &'a str {
        let raw = self.raw.text(src);
        if raw.len() >= 2 {
            &raw[1..raw.len() - 1]
        } else {
            raw
        }
    }
}

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub enum Type {
    /// `Name`, `pkg.Name`, `Name[T1, T2]`
    Named {
        pkg: Option<IdentName>,
        name: IdentName,
        args: ListRef<TypeId>,
    },

    /// `*T`
    Pointer {
        #[walk(skip)]
        star_pos: Span,
        elem: TypeId,
    },

    /// `[N]T`
    Array { len: ExprId, elem: TypeId },

    /// `[]T`
    Slice { elem: TypeId },

    /// `map[K]V`
    Map { key: TypeId, val: TypeId },

    /// `chan T`, `<-chan T`, `chan<- T`
    Chan { dir: ChanDir, elem: TypeId },

    /// `struct { ... }`
    Struct { fields: ListRef<FieldId> },

    /// `interface { ... }`
    Interface { elems: ListRef<InterfaceElem> },

    /// `func(...) ...`
    Func { sig: SignatureId },

    /// `(T)`
    Paren { typ: TypeId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    /// `chan T`
    Both,
    /// `chan<- T`
    Send,
    /// `<-chan T`
    Recv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub enum TypeTerm {
    /// `~T`
    Tilde {
        #[walk(skip)]
        tilde_pos: Span,
        typ: TypeId,
    },
    /// `T`
    Type { typ: TypeId },
}

impl TypeTerm {
    #[inline]
    pub fn typ(&self) -> TypeId {
        match *self {
            TypeTerm::Tilde { typ, .. } | TypeTerm::Type { typ } => typ,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkAst)]
pub enum InterfaceElem {
    /// `Method(...) ...`
    Method { name: IdentName, sig: SignatureId },

    /// Embedded interface (`io.Reader`) or union (`~int | string`)
    TypeElem(TypeElem),
}
