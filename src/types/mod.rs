//! Semantic model: hash-consed types, objects and per-package scopes.
//!
//! Types live in a program-wide [`TypeCtx`] and are addressed by [`TypeRef`].
//! Structurally equal types share a `TypeRef`; named types are nominal and get
//! one `TypeRef` each. [`TypeCtx::identical`] implements Go type identity,
//! which differs from `TypeRef` equality only for interfaces (compared by
//! method set) and types built from them.

mod check;
mod consts;
mod display;
#[cfg(test)]
mod fixture;
mod lookup;
mod universe;

use std::collections::{HashMap, HashSet};

use findimpls_parser::ast::{ChanDir, Interner, Symbol};
use indexmap::IndexMap;

use crate::program::{PackageId, Pos};

pub(crate) use check::Checker;
pub use display::TypeDisplay;
pub use lookup::{LookupResult, Selection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamedId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    String,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
}

impl BasicKind {
    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::String => "string",
            BasicKind::Int => "int",
            BasicKind::Int8 => "int8",
            BasicKind::Int16 => "int16",
            BasicKind::Int32 => "int32",
            BasicKind::Int64 => "int64",
            BasicKind::Uint => "uint",
            BasicKind::Uint8 => "uint8",
            BasicKind::Uint16 => "uint16",
            BasicKind::Uint32 => "uint32",
            BasicKind::Uint64 => "uint64",
            BasicKind::Uintptr => "uintptr",
            BasicKind::Float32 => "float32",
            BasicKind::Float64 => "float64",
            BasicKind::Complex64 => "complex64",
            BasicKind::Complex128 => "complex128",
        }
    }
}

/// Field or method name. Unexported names carry the declaring package, so
/// `m` of package `a` and `m` of package `b` never match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name {
    pub sym: Symbol,
    pub pkg: Option<PackageId>,
}

impl Name {
    pub fn new(sym: Symbol, text: &str, pkg: PackageId) -> Self {
        Self {
            sym,
            pkg: if is_exported(text) { None } else { Some(pkg) },
        }
    }
}

/// Go exports identifiers starting with an upper-case letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArrayLen {
    Known(u64),
    /// Length expression that could not be evaluated, as normalized source text.
    Expr(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<TypeRef>,
    pub results: Vec<TypeRef>,
    /// Last parameter is `...T`, stored as `[]T`.
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    pub name: Name,
    pub typ: TypeRef,
    pub embedded: bool,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IfaceMethod {
    pub name: Name,
    /// A [`TypeKind::Func`] without receiver.
    pub sig: TypeRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Term {
    pub tilde: bool,
    pub typ: TypeRef,
}

/// Interface as declared. A single plain term may name an embedded interface;
/// that is only known once its underlying type is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct InterfaceType {
    pub methods: Vec<IfaceMethod>,
    pub elems: Vec<Vec<Term>>,
    pub comparable: bool,
}

/// Interface with embeddings flattened.
#[derive(Debug, Clone, Default)]
pub struct MethodSet {
    /// Sorted by name.
    pub methods: Vec<IfaceMethod>,
    /// Type-set restrictions; a type must satisfy every union.
    pub unions: Vec<Vec<Term>>,
    pub comparable: bool,
    /// Embedded types of packages without sources; their methods are unknown.
    pub opaque: Vec<TypeRef>,
}

impl MethodSet {
    pub fn get(&self, name: Name) -> Option<&IfaceMethod> {
        self.methods
            .binary_search_by(|m| m.name.cmp(&name))
            .ok()
            .map(|i| &self.methods[i])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Invalid,
    Basic(BasicKind),
    Named(NamedId),
    /// Instantiated generic type. Its methods and fields are not modelled.
    Instance(NamedId, Vec<TypeRef>),
    TypeParam(ObjId),
    Pointer(TypeRef),
    Slice(TypeRef),
    Array(ArrayLen, TypeRef),
    Map(TypeRef, TypeRef),
    Chan(ChanDir, TypeRef),
    Func(Signature),
    Struct(Vec<StructField>),
    Interface(InterfaceType),
}

#[derive(Debug, Clone)]
pub struct NamedType {
    pub obj: ObjId,
    /// `Invalid` until the declaration is resolved, and for opaque types.
    pub underlying: TypeRef,
    /// Methods in declaration order.
    pub methods: Vec<ObjId>,
    pub generic: bool,
    /// Declared by a package without sources.
    pub opaque: bool,
}

/// How a method receives its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecvForm {
    Value,
    Pointer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjKind {
    TypeName { alias: bool },
    Func,
    Method {
        recv: NamedId,
        form: RecvForm,
        /// Opening brace of the body; `None` for declarations without one.
        scope_pos: Option<Pos>,
    },
    Var,
    Const { value: Option<i128> },
    TypeParam,
}

#[derive(Debug, Clone)]
pub struct Object {
    pub name: Symbol,
    /// `None` for universe objects.
    pub pkg: Option<PackageId>,
    pub kind: ObjKind,
    pub pos: Option<Pos>,
    pub typ: TypeRef,
}

impl Object {
    pub fn is_type_name(&self) -> bool {
        matches!(self.kind, ObjKind::TypeName { .. })
    }

    pub fn is_alias(&self) -> bool {
        matches!(self.kind, ObjKind::TypeName { alias: true })
    }

    /// Body position of a method.
    pub fn scope_pos(&self) -> Option<Pos> {
        match self.kind {
            ObjKind::Method { scope_pos, .. } => scope_pos,
            _ => None,
        }
    }
}

/// Identifier resolution of one package.
#[derive(Debug, Default)]
pub struct PackageInfo {
    /// Package-level objects in declaration order.
    pub scope: IndexMap<Symbol, ObjId>,
    /// Identifier position to the object it declares.
    pub defs: HashMap<Pos, ObjId>,
    /// Identifier position (inside type expressions) to the object it denotes.
    pub uses: HashMap<Pos, ObjId>,
}

/// Program-wide store of types and objects.
#[derive(Debug)]
pub struct TypeCtx {
    types: Vec<TypeKind>,
    interned: HashMap<TypeKind, TypeRef>,
    named: Vec<NamedType>,
    objects: Vec<Object>,
    universe: HashMap<Symbol, ObjId>,
    opaque: HashMap<(PackageId, Symbol), ObjId>,
    invalid: TypeRef,
    error: TypeRef,
}

impl TypeCtx {
    pub fn new(interner: &mut Interner) -> Self {
        let mut tcx = Self {
            types: Vec::new(),
            interned: HashMap::new(),
            named: Vec::new(),
            objects: Vec::new(),
            universe: HashMap::new(),
            opaque: HashMap::new(),
            invalid: TypeRef(0),
            error: TypeRef(0),
        };
        tcx.invalid = tcx.intern(TypeKind::Invalid);
        universe::populate(&mut tcx, interner);
        tcx
    }

    pub fn intern(&mut self, kind: TypeKind) -> TypeRef {
        if let Some(&t) = self.interned.get(&kind) {
            return t;
        }
        let t = TypeRef(self.types.len() as u32);
        self.types.push(kind.clone());
        self.interned.insert(kind, t);
        t
    }

    pub fn kind(&self, t: TypeRef) -> &TypeKind {
        &self.types[t.0 as usize]
    }

    pub fn invalid(&self) -> TypeRef {
        self.invalid
    }

    /// The predeclared `error` type.
    pub fn error_type(&self) -> TypeRef {
        self.error
    }

    pub fn pointer(&mut self, elem: TypeRef) -> TypeRef {
        self.intern(TypeKind::Pointer(elem))
    }

    pub fn object(&self, id: ObjId) -> &Object {
        &self.objects[id.0 as usize]
    }

    pub(crate) fn object_mut(&mut self, id: ObjId) -> &mut Object {
        &mut self.objects[id.0 as usize]
    }

    pub(crate) fn new_object(&mut self, obj: Object) -> ObjId {
        let id = ObjId(self.objects.len() as u32);
        self.objects.push(obj);
        id
    }

    pub fn named(&self, id: NamedId) -> &NamedType {
        &self.named[id.0 as usize]
    }

    pub(crate) fn named_mut(&mut self, id: NamedId) -> &mut NamedType {
        &mut self.named[id.0 as usize]
    }

    /// Creates the named type declared by `obj` and makes it the object's type.
    pub(crate) fn new_named(&mut self, obj: ObjId, opaque: bool) -> (NamedId, TypeRef) {
        let id = NamedId(self.named.len() as u32);
        self.named.push(NamedType {
            obj,
            underlying: self.invalid,
            methods: Vec::new(),
            generic: false,
            opaque,
        });
        let t = self.intern(TypeKind::Named(id));
        self.object_mut(obj).typ = t;
        (id, t)
    }

    pub(crate) fn universe_lookup(&self, sym: Symbol) -> Option<ObjId> {
        self.universe.get(&sym).copied()
    }

    /// Type name `name` of a package without sources, created on first use.
    pub(crate) fn opaque_type_name(&mut self, pkg: PackageId, name: Symbol) -> ObjId {
        if let Some(&obj) = self.opaque.get(&(pkg, name)) {
            return obj;
        }
        let obj = self.new_object(Object {
            name,
            pkg: Some(pkg),
            kind: ObjKind::TypeName { alias: false },
            pos: None,
            typ: self.invalid,
        });
        self.new_named(obj, true);
        self.opaque.insert((pkg, name), obj);
        obj
    }

    pub fn as_named(&self, t: TypeRef) -> Option<NamedId> {
        match self.kind(t) {
            TypeKind::Named(id) => Some(*id),
            _ => None,
        }
    }

    pub fn underlying(&self, t: TypeRef) -> TypeRef {
        match self.kind(t) {
            TypeKind::Named(id) => self.named(*id).underlying,
            // Instances are opaque.
            TypeKind::Instance(..) => self.invalid,
            _ => t,
        }
    }

    /// Strips one pointer level.
    pub fn deref(&self, t: TypeRef) -> (TypeRef, bool) {
        match self.kind(t) {
            TypeKind::Pointer(elem) => (*elem, true),
            _ => (t, false),
        }
    }

    /// Named type of a package whose sources were not loaded.
    pub fn is_opaque(&self, t: TypeRef) -> bool {
        self.as_named(t).is_some_and(|id| self.named(id).opaque)
    }

    pub fn is_interface(&self, t: TypeRef) -> bool {
        matches!(self.kind(self.underlying(t)), TypeKind::Interface(_))
    }

    pub fn signature(&self, t: TypeRef) -> Option<&Signature> {
        match self.kind(t) {
            TypeKind::Func(sig) => Some(sig),
            _ => None,
        }
    }

    /// Flattened method set of interface type `t`.
    ///
    /// Embedded interfaces already visited are skipped, so a recursive
    /// embedding terminates (the checker reports it separately).
    pub fn method_set(&self, t: TypeRef) -> MethodSet {
        let mut set = MethodSet::default();
        let mut visited = HashSet::new();
        self.collect_methods(t, &mut set, &mut visited);
        set.methods.sort_by(|a, b| a.name.cmp(&b.name));
        set.methods.dedup_by(|a, b| a.name == b.name);
        set
    }

    fn collect_methods(&self, t: TypeRef, set: &mut MethodSet, visited: &mut HashSet<TypeRef>) {
        if !visited.insert(t) {
            return;
        }
        let TypeKind::Interface(iface) = self.kind(self.underlying(t)) else {
            return;
        };
        set.methods.extend(iface.methods.iter().cloned());
        set.comparable |= iface.comparable;
        for elem in &iface.elems {
            match elem.as_slice() {
                [Term { tilde: false, typ }] if self.is_interface(*typ) => {
                    self.collect_methods(*typ, set, visited)
                }
                [Term { tilde: false, typ }] if self.is_opaque(*typ) => {
                    if !set.opaque.contains(typ) {
                        set.opaque.push(*typ);
                    }
                }
                _ => set.unions.push(elem.clone()),
            }
        }
    }

    /// True when an embedding chain starting at `t` leads back to `t`.
    pub(crate) fn has_embedding_cycle(&self, t: TypeRef) -> bool {
        let mut stack = vec![t];
        let mut seen = HashSet::new();
        while let Some(cur) = stack.pop() {
            let TypeKind::Interface(iface) = self.kind(self.underlying(cur)) else {
                continue;
            };
            for elem in &iface.elems {
                if let [Term { tilde: false, typ }] = elem.as_slice() {
                    if *typ == t {
                        return true;
                    }
                    if seen.insert(*typ) {
                        stack.push(*typ);
                    }
                }
            }
        }
        false
    }

    /// Go type identity.
    pub fn identical(&self, a: TypeRef, b: TypeRef) -> bool {
        if a == b {
            return true;
        }
        match (self.kind(a), self.kind(b)) {
            (TypeKind::Instance(x, xs), TypeKind::Instance(y, ys)) => {
                x == y && self.all_identical(xs, ys)
            }
            (TypeKind::Pointer(x), TypeKind::Pointer(y))
            | (TypeKind::Slice(x), TypeKind::Slice(y)) => self.identical(*x, *y),
            (TypeKind::Array(n, x), TypeKind::Array(m, y)) => n == m && self.identical(*x, *y),
            (TypeKind::Map(k1, v1), TypeKind::Map(k2, v2)) => {
                self.identical(*k1, *k2) && self.identical(*v1, *v2)
            }
            (TypeKind::Chan(d1, x), TypeKind::Chan(d2, y)) => d1 == d2 && self.identical(*x, *y),
            (TypeKind::Func(s1), TypeKind::Func(s2)) => {
                s1.variadic == s2.variadic
                    && self.all_identical(&s1.params, &s2.params)
                    && self.all_identical(&s1.results, &s2.results)
            }
            (TypeKind::Struct(f1), TypeKind::Struct(f2)) => {
                f1.len() == f2.len()
                    && f1.iter().zip(f2).all(|(x, y)| {
                        x.name == y.name
                            && x.embedded == y.embedded
                            && x.tag == y.tag
                            && self.identical(x.typ, y.typ)
                    })
            }
            (TypeKind::Interface(_), TypeKind::Interface(_)) => {
                let (s1, s2) = (self.method_set(a), self.method_set(b));
                s1.comparable == s2.comparable
                    && s1.opaque == s2.opaque
                    && s1.methods.len() == s2.methods.len()
                    && s1
                        .methods
                        .iter()
                        .zip(&s2.methods)
                        .all(|(x, y)| x.name == y.name && self.identical(x.sig, y.sig))
                    && s1.unions.len() == s2.unions.len()
                    && s1.unions.iter().zip(&s2.unions).all(|(u, v)| {
                        u.len() == v.len()
                            && u
                                .iter()
                                .zip(v)
                                .all(|(x, y)| x.tilde == y.tilde && self.identical(x.typ, y.typ))
                    })
            }
            _ => false,
        }
    }

    fn all_identical(&self, xs: &[TypeRef], ys: &[TypeRef]) -> bool {
        xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| self.identical(*x, *y))
    }

    /// Whether values of `t` can be compared with `==`.
    pub fn is_comparable(&self, t: TypeRef) -> bool {
        match self.kind(self.underlying(t)) {
            TypeKind::Slice(_) | TypeKind::Map(..) | TypeKind::Func(_) => false,
            TypeKind::Array(_, elem) => self.is_comparable(*elem),
            TypeKind::Struct(fields) => fields.iter().all(|f| self.is_comparable(f.typ)),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> (TypeCtx, Interner) {
        let mut interner = Interner::new();
        let tcx = TypeCtx::new(&mut interner);
        (tcx, interner)
    }

    fn basic(tcx: &mut TypeCtx, k: BasicKind) -> TypeRef {
        tcx.intern(TypeKind::Basic(k))
    }

    fn func(tcx: &mut TypeCtx, params: Vec<TypeRef>, results: Vec<TypeRef>) -> TypeRef {
        tcx.intern(TypeKind::Func(Signature {
            params,
            results,
            variadic: false,
        }))
    }

    #[test]
    fn structural_types_are_hash_consed() {
        let (mut tcx, _) = ctx();
        let int = basic(&mut tcx, BasicKind::Int);
        let a = tcx.intern(TypeKind::Slice(int));
        let b = tcx.intern(TypeKind::Slice(int));
        assert_eq!(a, b);
        assert_ne!(a, tcx.pointer(int));
    }

    #[test]
    fn interfaces_compare_by_method_set() {
        let (mut tcx, mut interner) = ctx();
        let string = basic(&mut tcx, BasicKind::String);
        let sig = func(&mut tcx, vec![], vec![string]);
        let name = Name {
            sym: interner.intern("String"),
            pkg: None,
        };
        let direct = tcx.intern(TypeKind::Interface(InterfaceType {
            methods: vec![IfaceMethod { name, sig }],
            ..Default::default()
        }));
        let embedding = tcx.intern(TypeKind::Interface(InterfaceType {
            elems: vec![vec![Term {
                tilde: false,
                typ: direct,
            }]],
            ..Default::default()
        }));
        assert_ne!(direct, embedding);
        assert!(tcx.identical(direct, embedding));

        let empty = tcx.intern(TypeKind::Interface(InterfaceType::default()));
        assert!(!tcx.identical(direct, empty));
    }

    #[test]
    fn signatures_ignore_nothing_but_names() {
        let (mut tcx, _) = ctx();
        let int = basic(&mut tcx, BasicKind::Int);
        let string = basic(&mut tcx, BasicKind::String);
        let f1 = func(&mut tcx, vec![int], vec![string]);
        let f2 = func(&mut tcx, vec![int], vec![string]);
        let f3 = func(&mut tcx, vec![string], vec![string]);
        let slice = tcx.intern(TypeKind::Slice(int));
        let variadic = tcx.intern(TypeKind::Func(Signature {
            params: vec![slice],
            results: vec![],
            variadic: true,
        }));
        let plain = func(&mut tcx, vec![slice], vec![]);
        assert!(tcx.identical(f1, f2));
        assert!(!tcx.identical(f1, f3));
        assert!(!tcx.identical(variadic, plain));
    }

    #[test]
    fn comparability_follows_components() {
        let (mut tcx, mut interner) = ctx();
        let int = basic(&mut tcx, BasicKind::Int);
        let slice = tcx.intern(TypeKind::Slice(int));
        let field = |sym, typ| StructField {
            name: Name { sym, pkg: None },
            typ,
            embedded: false,
            tag: None,
        };
        let ok = tcx.intern(TypeKind::Struct(vec![field(interner.intern("A"), int)]));
        let bad = tcx.intern(TypeKind::Struct(vec![field(interner.intern("B"), slice)]));
        assert!(tcx.is_comparable(ok));
        assert!(!tcx.is_comparable(bad));
        assert!(tcx.is_comparable(tcx.error_type()));
    }

    #[test]
    fn exported_names() {
        assert!(is_exported("Area"));
        assert!(is_exported("Ämter"));
        assert!(!is_exported("area"));
        assert!(!is_exported("_X"));
        assert!(!is_exported(""));
    }
}
