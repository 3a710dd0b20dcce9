//! Package-level type checking.
//!
//! Declarations are checked in phases:
//! 1. collect imports and package-level objects,
//! 2. resolve every object lazily in declaration order (cycles are errors
//!    only where Go rejects them),
//! 3. attach methods to their receiver base types.
//!
//! Function bodies are never looked at.

use std::collections::{HashMap, HashSet};
use std::fmt;

use findimpls_parser::ast::{
    AstArena, BasicLitKind, Expr, ExprId, FieldId, FuncDeclId, GenDecl, GenDeclKind, IdentName,
    ImportName, ImportSpec, InterfaceElem, Interner, ListRef, Results, SignatureId, Span, Spec,
    Symbol, Type, TypeId, TypeParamsId, TypeSpec, TypeTerm, ValueSpec,
};
use indexmap::IndexMap;

use super::consts::{self, ConstEnv};
use super::{
    is_exported, ArrayLen, BasicKind, IfaceMethod, InterfaceType, Name, NamedId, ObjId, ObjKind,
    Object, PackageInfo, RecvForm, Signature, StructField, Term, TypeCtx, TypeKind, TypeRef,
};
use crate::program::{FileId, GoFile, Package, PackageId, Pos};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CheckError {
    pub pos: Pos,
    pub message: String,
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

type CheckResult<T> = Result<T, CheckError>;

#[derive(Debug, Default)]
struct FileScope {
    imports: HashMap<Symbol, PackageId>,
    dots: Vec<PackageId>,
}

#[derive(Debug, Clone, Copy)]
enum DeclKind {
    Type(TypeSpec),
    Const {
        typ: Option<TypeId>,
        value: Option<ExprId>,
        iota: i128,
    },
    Var {
        typ: Option<TypeId>,
        value: Option<ExprId>,
    },
    Func(FuncDeclId),
}

#[derive(Debug, Clone, Copy)]
struct DeclInfo {
    file: usize,
    pos: Pos,
    kind: DeclKind,
}

pub(crate) struct Checker<'a> {
    tcx: &'a mut TypeCtx,
    interner: &'a Interner,
    /// Every package checked so far, indexed by id.
    packages: &'a [Package],
    files: &'a [GoFile],
    file_ids: &'a [FileId],
    imports: &'a IndexMap<String, PackageId>,
    pkg: PackageId,
    info: PackageInfo,
    scopes: Vec<FileScope>,
    decls: IndexMap<ObjId, DeclInfo>,
    resolved: HashSet<ObjId>,
    resolving: Vec<ObjId>,
    type_params: Vec<HashMap<Symbol, ObjId>>,
    methods: Vec<(usize, FuncDeclId)>,
}

impl<'a> Checker<'a> {
    pub(crate) fn new(
        tcx: &'a mut TypeCtx,
        interner: &'a Interner,
        packages: &'a [Package],
        files: &'a [GoFile],
        pkg: PackageId,
        file_ids: &'a [FileId],
        imports: &'a IndexMap<String, PackageId>,
    ) -> Self {
        Self {
            tcx,
            interner,
            packages,
            files,
            file_ids,
            imports,
            pkg,
            info: PackageInfo::default(),
            scopes: Vec::with_capacity(file_ids.len()),
            decls: IndexMap::new(),
            resolved: HashSet::new(),
            resolving: Vec::new(),
            type_params: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub(crate) fn check(mut self) -> CheckResult<PackageInfo> {
        for fi in 0..self.file_ids.len() {
            self.collect_file(fi)?;
        }
        let objs: Vec<ObjId> = self.decls.keys().copied().collect();
        for &obj in &objs {
            self.resolve_obj(obj)?;
        }
        for &obj in &objs {
            self.check_embedding_cycle(obj)?;
        }
        let methods = std::mem::take(&mut self.methods);
        for (fi, func) in methods {
            self.method(fi, func)?;
        }
        Ok(self.info)
    }

    fn file(&self, fi: usize) -> &'a GoFile {
        &self.files[self.file_ids[fi].index()]
    }

    fn arena(&self, fi: usize) -> &'a AstArena {
        &self.file(fi).syntax.arena
    }

    fn pos(&self, fi: usize, span: Span) -> Pos {
        Pos::new(self.file_ids[fi], span)
    }

    fn name(&self, sym: Symbol) -> &'a str {
        self.interner.resolve(sym)
    }

    fn err(&self, fi: usize, span: Span, message: impl Into<String>) -> CheckError {
        CheckError {
            pos: self.pos(fi, span),
            message: message.into(),
        }
    }

    // ---------------------------------------------------------------------
    // Phase 1: collection
    // ---------------------------------------------------------------------

    fn collect_file(&mut self, fi: usize) -> CheckResult<()> {
        let file = self.file(fi);
        let arena = &file.syntax.arena;
        let mut scope = FileScope::default();
        for gen in arena.gen_decls(&file.syntax.file) {
            match gen.kind {
                GenDeclKind::Import => {
                    for spec in arena.specs_list(gen.specs) {
                        if let Spec::Import(imp) = spec {
                            self.import(fi, &mut scope, imp)?;
                        }
                    }
                }
                GenDeclKind::Type => {
                    for spec in arena.specs_list(gen.specs) {
                        if let Spec::Type(ts) = spec {
                            self.declare_type(fi, *ts)?;
                        }
                    }
                }
                GenDeclKind::Const => self.declare_consts(fi, gen)?,
                GenDeclKind::Var => {
                    for spec in arena.specs_list(gen.specs) {
                        if let Spec::Value(vs) = spec {
                            self.declare_vars(fi, vs)?;
                        }
                    }
                }
            }
        }
        self.scopes.push(scope);

        for (id, func) in arena.func_decls(&file.syntax.file) {
            if func.is_method() {
                self.methods.push((fi, id));
                continue;
            }
            // `init` may be declared many times and is not in scope.
            let scoped = self.name(func.name.sym) != "init";
            self.declare(fi, func.name, ObjKind::Func, scoped, DeclKind::Func(id))?;
        }
        Ok(())
    }

    fn import(&mut self, fi: usize, scope: &mut FileScope, imp: &ImportSpec) -> CheckResult<()> {
        let path = imp.path.value(&self.file(fi).src);
        let Some(&dep) = self.imports.get(path) else {
            return Err(self.err(fi, imp.path.raw, format!("could not import {path:?}")));
        };
        match imp.name {
            Some(ImportName::Dot(_)) => scope.dots.push(dep),
            Some(ImportName::Blank(_)) => {}
            Some(ImportName::Name(name)) => {
                scope.imports.insert(name.sym, dep);
            }
            None => {
                // Never interned means never referenced by this file.
                if let Some(sym) = self.interner.get(&self.packages[dep.index()].name) {
                    scope.imports.insert(sym, dep);
                }
            }
        }
        Ok(())
    }

    fn declare(
        &mut self,
        fi: usize,
        name: IdentName,
        kind: ObjKind,
        scoped: bool,
        decl: DeclKind,
    ) -> CheckResult<ObjId> {
        let pos = self.pos(fi, name.pos);
        let text = self.name(name.sym);
        let invalid = self.tcx.invalid();
        let obj = self.tcx.new_object(Object {
            name: name.sym,
            pkg: Some(self.pkg),
            kind,
            pos: Some(pos),
            typ: invalid,
        });
        self.info.defs.insert(pos, obj);
        if scoped && text != "_" {
            if self.info.scope.contains_key(&name.sym) {
                return Err(self.err(fi, name.pos, format!("{text} redeclared in this block")));
            }
            self.info.scope.insert(name.sym, obj);
        }
        self.decls.insert(
            obj,
            DeclInfo {
                file: fi,
                pos,
                kind: decl,
            },
        );
        Ok(obj)
    }

    fn declare_type(&mut self, fi: usize, ts: TypeSpec) -> CheckResult<()> {
        let kind = ObjKind::TypeName { alias: ts.alias };
        let obj = self.declare(fi, ts.name, kind, true, DeclKind::Type(ts))?;
        if !ts.alias {
            let (named, _) = self.tcx.new_named(obj, false);
            self.tcx.named_mut(named).generic = ts.type_params.is_some();
        }
        Ok(())
    }

    /// Constants of one group. A spec without type and values repeats the
    /// previous one, with its own `iota`.
    fn declare_consts(&mut self, fi: usize, gen: &GenDecl) -> CheckResult<()> {
        let arena = self.arena(fi);
        let mut last: (Option<TypeId>, ListRef<ExprId>) = (None, ListRef::EMPTY);
        for (iota, spec) in arena.specs_list(gen.specs).iter().enumerate() {
            let Spec::Value(vs) = spec else { continue };
            if vs.typ.is_some() || !vs.values.is_empty() {
                last = (vs.typ, vs.values);
            }
            let (typ, values) = last;
            let values = arena.exprs_list(values);
            for (i, name) in arena.ident_names(vs.names).iter().enumerate() {
                let decl = DeclKind::Const {
                    typ,
                    value: values.get(i).copied(),
                    iota: iota as i128,
                };
                self.declare(fi, *name, ObjKind::Const { value: None }, true, decl)?;
            }
        }
        Ok(())
    }

    fn declare_vars(&mut self, fi: usize, vs: &ValueSpec) -> CheckResult<()> {
        let arena = self.arena(fi);
        let names = arena.ident_names(vs.names);
        let values = arena.exprs_list(vs.values);
        for (i, name) in names.iter().enumerate() {
            let value = (values.len() == names.len()).then(|| values[i]);
            let decl = DeclKind::Var { typ: vs.typ, value };
            self.declare(fi, *name, ObjKind::Var, true, decl)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Phase 2: resolution
    // ---------------------------------------------------------------------

    fn resolve_obj(&mut self, obj: ObjId) -> CheckResult<()> {
        if self.resolved.contains(&obj) {
            return Ok(());
        }
        // Objects of other packages and the universe are complete.
        let Some(&decl) = self.decls.get(&obj) else {
            return Ok(());
        };
        if let Some(start) = self.resolving.iter().position(|o| *o == obj) {
            let names: Vec<&str> = self.resolving[start..]
                .iter()
                .chain(std::iter::once(&obj))
                .map(|o| self.name(self.tcx.object(*o).name))
                .collect();
            let what = match decl.kind {
                DeclKind::Type(_) => "invalid recursive type",
                _ => "initialization cycle",
            };
            return Err(CheckError {
                pos: decl.pos,
                message: format!("{what}: {}", names.join(" refers to ")),
            });
        }

        self.resolving.push(obj);
        let result = match decl.kind {
            DeclKind::Type(ts) => self.resolve_type_decl(decl.file, obj, ts),
            DeclKind::Const { typ, value, iota } => {
                self.resolve_const(decl.file, obj, typ, value, iota)
            }
            DeclKind::Var { typ, value } => self.resolve_var(decl.file, obj, typ, value),
            DeclKind::Func(func) => self.resolve_func(decl.file, obj, func),
        };
        self.resolving.pop();
        result?;
        self.resolved.insert(obj);
        Ok(())
    }

    fn resolve_type_decl(&mut self, fi: usize, obj: ObjId, ts: TypeSpec) -> CheckResult<()> {
        let pushed = self.push_type_params(fi, ts.type_params)?;
        let rhs = self.type_expr(fi, ts.typ);
        if pushed {
            self.type_params.pop();
        }
        let rhs = rhs?;

        if ts.alias {
            self.tcx.object_mut(obj).typ = rhs;
            return Ok(());
        }
        if let TypeKind::TypeParam(_) = self.tcx.kind(rhs) {
            let span = self.arena(fi).types.span(ts.typ);
            return Err(self.err(
                fi,
                span,
                "cannot use a type parameter as RHS in type declaration",
            ));
        }
        // `type T U` takes U's underlying type, which must be known first.
        if let Some(target) = self.tcx.as_named(rhs) {
            let target_obj = self.tcx.named(target).obj;
            self.resolve_obj(target_obj)?;
        }
        let underlying = self.tcx.underlying(rhs);
        if let Some(named) = self.tcx.as_named(self.tcx.object(obj).typ) {
            self.tcx.named_mut(named).underlying = underlying;
        }
        Ok(())
    }

    fn resolve_func(&mut self, fi: usize, obj: ObjId, func: FuncDeclId) -> CheckResult<()> {
        let decl = self.arena(fi).funcs[func];
        let pushed = self.push_type_params(fi, decl.type_params)?;
        let sig = self.signature(fi, decl.signature);
        if pushed {
            self.type_params.pop();
        }
        self.tcx.object_mut(obj).typ = sig?;
        Ok(())
    }

    fn resolve_const(
        &mut self,
        fi: usize,
        obj: ObjId,
        typ: Option<TypeId>,
        value: Option<ExprId>,
        iota: i128,
    ) -> CheckResult<()> {
        let declared = typ.map(|t| self.type_expr(fi, t)).transpose()?;
        let (inferred, folded) = match value {
            Some(expr) => {
                let span = self.arena(fi).exprs.span(expr);
                let folded = self.fold(fi, span, Some(iota))?;
                (self.infer(fi, expr, folded.is_some())?, folded)
            }
            None => (self.tcx.invalid(), None),
        };
        let object = self.tcx.object_mut(obj);
        object.typ = declared.unwrap_or(inferred);
        object.kind = ObjKind::Const { value: folded };
        Ok(())
    }

    fn resolve_var(
        &mut self,
        fi: usize,
        obj: ObjId,
        typ: Option<TypeId>,
        value: Option<ExprId>,
    ) -> CheckResult<()> {
        let typ = match (typ, value) {
            (Some(t), _) => self.type_expr(fi, t)?,
            (None, Some(expr)) => self.infer(fi, expr, false)?,
            (None, None) => self.tcx.invalid(),
        };
        self.tcx.object_mut(obj).typ = typ;
        Ok(())
    }

    /// Type of an initializer. Only literals and identifiers are typed;
    /// other expressions are `Invalid` unless they fold to an integer.
    fn infer(&mut self, fi: usize, expr: ExprId, folded: bool) -> CheckResult<TypeRef> {
        let basic = match self.arena(fi).exprs[expr] {
            Expr::BasicLit(lit) => match lit.kind {
                BasicLitKind::Int => BasicKind::Int,
                BasicLitKind::Float => BasicKind::Float64,
                BasicLitKind::Imag => BasicKind::Complex128,
                BasicLitKind::Rune => BasicKind::Int32,
                BasicLitKind::String => BasicKind::String,
            },
            Expr::Ident(name) => {
                let Some(obj) = self.lookup(fi, name.sym) else {
                    return Ok(self.tcx.invalid());
                };
                self.resolve_obj(obj)?;
                let object = self.tcx.object(obj);
                return Ok(match object.kind {
                    ObjKind::Const { .. } | ObjKind::Var | ObjKind::Func => object.typ,
                    _ => self.tcx.invalid(),
                });
            }
            Expr::Opaque if folded => BasicKind::Int,
            Expr::Opaque => return Ok(self.tcx.invalid()),
        };
        Ok(self.tcx.intern(TypeKind::Basic(basic)))
    }

    fn fold(&mut self, fi: usize, span: Span, iota: Option<i128>) -> CheckResult<Option<i128>> {
        let text = self.file(fi).text(span);
        let mut env = FoldEnv {
            checker: self,
            fi,
            iota,
            error: None,
        };
        let value = consts::eval(text, &mut env);
        match env.error {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }

    fn push_type_params(&mut self, fi: usize, params: Option<TypeParamsId>) -> CheckResult<bool> {
        let Some(params) = params else {
            return Ok(false);
        };
        let arena = self.arena(fi);
        let mut scope = HashMap::new();
        let mut constraints = Vec::new();
        for &id in arena.type_param_decl_ids(arena.type_params[params].params) {
            let decl = arena.type_param_decls[id];
            for name in arena.ident_names(decl.names) {
                let obj = self.new_type_param(fi, *name);
                scope.insert(name.sym, obj);
            }
            constraints.push(decl.constraint);
        }
        self.type_params.push(scope);
        for constraint in constraints {
            for term in arena.type_terms(constraint.terms) {
                if let Err(err) = self.type_expr(fi, term.typ()) {
                    self.type_params.pop();
                    return Err(err);
                }
            }
        }
        Ok(true)
    }

    fn new_type_param(&mut self, fi: usize, name: IdentName) -> ObjId {
        let pos = self.pos(fi, name.pos);
        let invalid = self.tcx.invalid();
        let obj = self.tcx.new_object(Object {
            name: name.sym,
            pkg: Some(self.pkg),
            kind: ObjKind::TypeParam,
            pos: Some(pos),
            typ: invalid,
        });
        let typ = self.tcx.intern(TypeKind::TypeParam(obj));
        self.tcx.object_mut(obj).typ = typ;
        self.info.defs.insert(pos, obj);
        obj
    }

    /// Innermost binding of `sym`: type parameters, package scope, dot
    /// imports, universe.
    fn lookup(&mut self, fi: usize, sym: Symbol) -> Option<ObjId> {
        if let Some(obj) = self.type_params.iter().rev().find_map(|s| s.get(&sym)) {
            return Some(*obj);
        }
        if let Some(obj) = self.info.scope.get(&sym) {
            return Some(*obj);
        }
        let exported = is_exported(self.name(sym));
        for &dep in &self.scopes[fi].dots {
            let pkg = &self.packages[dep.index()];
            if pkg.opaque {
                if exported {
                    return Some(self.tcx.opaque_type_name(dep, sym));
                }
                continue;
            }
            if let Some(obj) = pkg.info.scope.get(&sym) {
                if exported {
                    return Some(*obj);
                }
            }
        }
        self.tcx.universe_lookup(sym)
    }

    // ---------------------------------------------------------------------
    // Type expressions
    // ---------------------------------------------------------------------

    fn type_expr(&mut self, fi: usize, id: TypeId) -> CheckResult<TypeRef> {
        let arena = self.arena(fi);
        match arena.types[id] {
            Type::Named { pkg, name, args } => {
                let typ = match pkg {
                    Some(qualifier) => self.qualified_type(fi, qualifier, name)?,
                    None => self.named_type(fi, name)?,
                };
                self.instantiate(fi, typ, args, name)
            }
            Type::Pointer { elem, .. } => {
                let elem = self.type_expr(fi, elem)?;
                Ok(self.tcx.pointer(elem))
            }
            Type::Array { len, elem } => {
                let span = arena.exprs.span(len);
                let len = match self.fold(fi, span, None)? {
                    Some(n) if n >= 0 => ArrayLen::Known(n as u64),
                    _ => ArrayLen::Expr(normalize(self.file(fi).text(span))),
                };
                let elem = self.type_expr(fi, elem)?;
                Ok(self.tcx.intern(TypeKind::Array(len, elem)))
            }
            Type::Slice { elem } => {
                let elem = self.type_expr(fi, elem)?;
                Ok(self.tcx.intern(TypeKind::Slice(elem)))
            }
            Type::Map { key, val } => {
                let key = self.type_expr(fi, key)?;
                let val = self.type_expr(fi, val)?;
                Ok(self.tcx.intern(TypeKind::Map(key, val)))
            }
            Type::Chan { dir, elem } => {
                let elem = self.type_expr(fi, elem)?;
                Ok(self.tcx.intern(TypeKind::Chan(dir, elem)))
            }
            Type::Struct { fields } => self.struct_type(fi, fields),
            Type::Interface { elems } => self.interface_type(fi, elems),
            Type::Func { sig } => self.signature(fi, sig),
            Type::Paren { typ } => self.type_expr(fi, typ),
        }
    }

    fn named_type(&mut self, fi: usize, name: IdentName) -> CheckResult<TypeRef> {
        let Some(obj) = self.lookup(fi, name.sym) else {
            let text = self.name(name.sym);
            if self.scopes[fi].imports.contains_key(&name.sym) {
                return Err(self.err(fi, name.pos, format!("use of package {text} without selector")));
            }
            return Err(self.err(fi, name.pos, format!("undefined: {text}")));
        };
        self.info.uses.insert(self.pos(fi, name.pos), obj);
        self.type_of(fi, name, obj)
    }

    fn qualified_type(
        &mut self,
        fi: usize,
        qualifier: IdentName,
        name: IdentName,
    ) -> CheckResult<TypeRef> {
        let (q, n) = (self.name(qualifier.sym), self.name(name.sym));
        let Some(&dep) = self.scopes[fi].imports.get(&qualifier.sym) else {
            return Err(self.err(fi, qualifier.pos, format!("undefined: {q}")));
        };
        if !is_exported(n) {
            return Err(self.err(fi, name.pos, format!("name {n} not exported by package {q}")));
        }
        let pkg = &self.packages[dep.index()];
        let obj = if pkg.opaque {
            self.tcx.opaque_type_name(dep, name.sym)
        } else {
            match pkg.info.scope.get(&name.sym) {
                Some(obj) => *obj,
                None => return Err(self.err(fi, name.pos, format!("undefined: {q}.{n}"))),
            }
        };
        self.info.uses.insert(self.pos(fi, name.pos), obj);
        self.type_of(fi, name, obj)
    }

    fn type_of(&mut self, fi: usize, name: IdentName, obj: ObjId) -> CheckResult<TypeRef> {
        let kind = self.tcx.object(obj).kind.clone();
        match kind {
            ObjKind::TypeName { alias: true } => {
                self.resolve_obj(obj)?;
                Ok(self.tcx.object(obj).typ)
            }
            ObjKind::TypeName { alias: false } | ObjKind::TypeParam => Ok(self.tcx.object(obj).typ),
            _ => {
                let text = self.name(name.sym);
                Err(self.err(fi, name.pos, format!("{text} is not a type")))
            }
        }
    }

    fn instantiate(
        &mut self,
        fi: usize,
        typ: TypeRef,
        args: ListRef<TypeId>,
        name: IdentName,
    ) -> CheckResult<TypeRef> {
        let args = self.arena(fi).types_list(args);
        let text = self.name(name.sym);
        let Some(named) = self.tcx.as_named(typ) else {
            if args.is_empty() {
                return Ok(typ);
            }
            return Err(self.err(fi, name.pos, format!("{text} is not a generic type")));
        };
        let (generic, opaque) = {
            let n = self.tcx.named(named);
            (n.generic, n.opaque)
        };
        if args.is_empty() {
            if generic {
                return Err(self.err(
                    fi,
                    name.pos,
                    format!("cannot use generic type {text} without instantiation"),
                ));
            }
            return Ok(typ);
        }
        // Opaque types may be generic; nothing is known about them.
        if !generic && !opaque {
            return Err(self.err(fi, name.pos, format!("{text} is not a generic type")));
        }
        let mut targs = Vec::with_capacity(args.len());
        for &arg in args {
            targs.push(self.type_expr(fi, arg)?);
        }
        Ok(self.tcx.intern(TypeKind::Instance(named, targs)))
    }

    fn signature(&mut self, fi: usize, id: SignatureId) -> CheckResult<TypeRef> {
        let sig = self.arena(fi).signatures[id];
        let (params, variadic) = self.field_types(fi, sig.params.fields)?;
        let results = match sig.results {
            None => Vec::new(),
            Some(Results::Type(t)) => vec![self.type_expr(fi, t)?],
            Some(Results::Params(list)) => self.field_types(fi, list.fields)?.0,
        };
        Ok(self.tcx.intern(TypeKind::Func(Signature {
            params,
            results,
            variadic,
        })))
    }

    /// Parameter types with grouped names expanded, and whether the last is variadic.
    fn field_types(
        &mut self,
        fi: usize,
        fields: ListRef<FieldId>,
    ) -> CheckResult<(Vec<TypeRef>, bool)> {
        let arena = self.arena(fi);
        let mut out = Vec::new();
        let mut variadic = false;
        for &id in arena.fields_list(fields) {
            let field = arena.fields[id];
            let mut typ = self.type_expr(fi, field.typ)?;
            if field.ellipsis_pos.is_some() {
                typ = self.tcx.intern(TypeKind::Slice(typ));
                variadic = true;
            }
            let count = field.names.len().max(1);
            out.extend(std::iter::repeat(typ).take(count as usize));
        }
        Ok((out, variadic))
    }

    fn struct_type(&mut self, fi: usize, fields: ListRef<FieldId>) -> CheckResult<TypeRef> {
        let file = self.file(fi);
        let arena = &file.syntax.arena;
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for &id in arena.fields_list(fields) {
            let field = arena.fields[id];
            let typ = self.type_expr(fi, field.typ)?;
            let tag = field.tag.map(|t| match consts::unquote(t.raw.text(&file.src)) {
                Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                None => t.value(&file.src).to_string(),
            });
            let names = arena.ident_names(field.names);
            let embedded = names.is_empty();
            let names = if embedded {
                vec![self.embedded_name(fi, field.typ)?]
            } else {
                names.to_vec()
            };
            for name in names {
                let text = self.name(name.sym);
                if text != "_" && !seen.insert(name.sym) {
                    return Err(self.err(fi, name.pos, format!("{text} redeclared")));
                }
                out.push(StructField {
                    name: Name::new(name.sym, text, self.pkg),
                    typ,
                    embedded,
                    tag: tag.clone(),
                });
            }
        }
        Ok(self.tcx.intern(TypeKind::Struct(out)))
    }

    /// Field name of an embedded field: the type name without package or pointer.
    fn embedded_name(&self, fi: usize, mut id: TypeId) -> CheckResult<IdentName> {
        let arena = self.arena(fi);
        loop {
            match arena.types[id] {
                Type::Pointer { elem, .. } | Type::Paren { typ: elem } => id = elem,
                Type::Named { name, .. } => return Ok(name),
                _ => return Err(self.err(fi, arena.types.span(id), "invalid embedded field type")),
            }
        }
    }

    fn interface_type(
        &mut self,
        fi: usize,
        elems: ListRef<InterfaceElem>,
    ) -> CheckResult<TypeRef> {
        let arena = self.arena(fi);
        let mut iface = InterfaceType::default();
        for elem in arena.interface_elems(elems) {
            match *elem {
                InterfaceElem::Method { name, sig } => {
                    let text = self.name(name.sym);
                    let name_key = Name::new(name.sym, text, self.pkg);
                    if iface.methods.iter().any(|m| m.name == name_key) {
                        return Err(self.err(fi, name.pos, format!("duplicate method {text}")));
                    }
                    let sig = self.signature(fi, sig)?;
                    iface.methods.push(IfaceMethod {
                        name: name_key,
                        sig,
                    });
                }
                InterfaceElem::TypeElem(te) => {
                    let mut terms = Vec::new();
                    for term in arena.type_terms(te.terms) {
                        terms.push(Term {
                            tilde: matches!(term, TypeTerm::Tilde { .. }),
                            typ: self.type_expr(fi, term.typ())?,
                        });
                    }
                    iface.elems.push(terms);
                }
            }
        }
        Ok(self.tcx.intern(TypeKind::Interface(iface)))
    }

    fn check_embedding_cycle(&mut self, obj: ObjId) -> CheckResult<()> {
        let object = self.tcx.object(obj);
        if !matches!(object.kind, ObjKind::TypeName { alias: false }) {
            return Ok(());
        }
        let typ = object.typ;
        if self.tcx.is_interface(typ) && self.tcx.has_embedding_cycle(typ) {
            let name = self.name(object.name);
            return Err(CheckError {
                pos: self.decls[&obj].pos,
                message: format!("invalid recursive type: {name} embeds itself"),
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Phase 3: methods
    // ---------------------------------------------------------------------

    fn method(&mut self, fi: usize, id: FuncDeclId) -> CheckResult<()> {
        let file = self.file(fi);
        let arena = &file.syntax.arena;
        let func = arena.funcs[id];
        let Some(recv) = func.recv else {
            return Ok(());
        };
        let recv_text = file.text(arena.types.span(recv.typ));
        let invalid_recv = || format!("invalid receiver type {recv_text}");

        let mut base = strip_parens(arena, recv.typ);
        let mut form = RecvForm::Value;
        if let Type::Pointer { elem, .. } = arena.types[base] {
            form = RecvForm::Pointer;
            base = strip_parens(arena, elem);
        }
        let Type::Named {
            pkg: None,
            name,
            args,
        } = arena.types[base]
        else {
            return Err(self.err(fi, recv.l_paren, invalid_recv()));
        };

        let type_name = self.name(name.sym);
        let Some(&type_obj) = self.info.scope.get(&name.sym) else {
            let message = match self.tcx.universe_lookup(name.sym) {
                Some(_) => format!("cannot define new methods on non-local type {type_name}"),
                None => format!("undefined: {type_name}"),
            };
            return Err(self.err(fi, name.pos, message));
        };
        self.info.uses.insert(self.pos(fi, name.pos), type_obj);
        let typ = self.type_of(fi, name, type_obj)?;
        let named = match self.tcx.as_named(typ) {
            Some(n) if self.tcx.object(self.tcx.named(n).obj).pkg == Some(self.pkg) => n,
            _ => {
                return Err(self.err(
                    fi,
                    name.pos,
                    format!("cannot define new methods on non-local type {type_name}"),
                ))
            }
        };
        let underlying = self.tcx.named(named).underlying;
        if matches!(
            self.tcx.kind(underlying),
            TypeKind::Pointer(_) | TypeKind::Interface(_)
        ) {
            return Err(self.err(
                fi,
                name.pos,
                format!("invalid receiver type {type_name} (pointer or interface type)"),
            ));
        }

        let pushed = self.push_receiver_params(fi, named, name, args)?;
        let sig = self.signature(fi, func.signature);
        if pushed {
            self.type_params.pop();
        }
        let sig = sig?;

        let pos = self.pos(fi, func.name.pos);
        let obj = self.tcx.new_object(Object {
            name: func.name.sym,
            pkg: Some(self.pkg),
            kind: ObjKind::Method {
                recv: named,
                form,
                scope_pos: func.body.map(|b| self.pos(fi, b.l_brace)),
            },
            pos: Some(pos),
            typ: sig,
        });
        self.info.defs.insert(pos, obj);

        let method_name = self.name(func.name.sym);
        if method_name == "_" {
            return Ok(());
        }
        let clash = self
            .tcx
            .named(named)
            .methods
            .iter()
            .any(|m| self.tcx.object(*m).name == func.name.sym);
        if clash {
            return Err(self.err(
                fi,
                func.name.pos,
                format!("method {type_name}.{method_name} already declared"),
            ));
        }
        if let TypeKind::Struct(fields) = self.tcx.kind(underlying) {
            if fields.iter().any(|f| f.name.sym == func.name.sym) {
                return Err(self.err(
                    fi,
                    func.name.pos,
                    format!("field and method with the same name {method_name}"),
                ));
            }
        }
        self.tcx.named_mut(named).methods.push(obj);
        Ok(())
    }

    /// Binds the type parameters a generic receiver (`List[T]`) introduces.
    fn push_receiver_params(
        &mut self,
        fi: usize,
        named: NamedId,
        name: IdentName,
        args: ListRef<TypeId>,
    ) -> CheckResult<bool> {
        let arena = self.arena(fi);
        let args = arena.types_list(args);
        let type_name = self.name(name.sym);
        match (self.tcx.named(named).generic, args.is_empty()) {
            (false, true) => return Ok(false),
            (true, true) => {
                return Err(self.err(
                    fi,
                    name.pos,
                    format!("cannot use generic type {type_name} without instantiation"),
                ))
            }
            (false, false) => {
                return Err(self.err(fi, name.pos, format!("{type_name} is not a generic type")))
            }
            (true, false) => {}
        }
        let mut scope = HashMap::new();
        for &arg in args {
            let Type::Named {
                pkg: None,
                name: param,
                args: inner,
            } = arena.types[arg]
            else {
                return Err(self.err(
                    fi,
                    arena.types.span(arg),
                    "receiver type parameter must be an identifier",
                ));
            };
            if !inner.is_empty() {
                return Err(self.err(fi, param.pos, "receiver type parameter must be an identifier"));
            }
            let obj = self.new_type_param(fi, param);
            if self.name(param.sym) != "_" {
                scope.insert(param.sym, obj);
            }
        }
        self.type_params.push(scope);
        Ok(true)
    }
}

fn strip_parens(arena: &AstArena, mut id: TypeId) -> TypeId {
    while let Type::Paren { typ } = arena.types[id] {
        id = typ;
    }
    id
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves identifiers of a folded constant expression through the checker.
struct FoldEnv<'c, 'a> {
    checker: &'c mut Checker<'a>,
    fi: usize,
    iota: Option<i128>,
    error: Option<CheckError>,
}

impl FoldEnv<'_, '_> {
    fn object(&mut self, name: &str) -> Option<ObjId> {
        let sym = self.checker.interner.get(name)?;
        let obj = self.checker.lookup(self.fi, sym)?;
        if let Err(err) = self.checker.resolve_obj(obj) {
            self.error.get_or_insert(err);
            return None;
        }
        Some(obj)
    }
}

impl ConstEnv for FoldEnv<'_, '_> {
    fn value(&mut self, name: &str) -> Option<i128> {
        let obj = self.object(name)?;
        let object = self.checker.tcx.object(obj);
        if object.pkg.is_none() && name == "iota" {
            return self.iota;
        }
        match object.kind {
            ObjKind::Const { value } => value,
            _ => None,
        }
    }

    fn is_int_type(&mut self, name: &str) -> bool {
        let Some(obj) = self.object(name) else {
            return false;
        };
        let tcx = &self.checker.tcx;
        let object = tcx.object(obj);
        object.is_type_name()
            && matches!(
                tcx.kind(tcx.underlying(object.typ)),
                TypeKind::Basic(
                    BasicKind::Int
                        | BasicKind::Int8
                        | BasicKind::Int16
                        | BasicKind::Int32
                        | BasicKind::Int64
                        | BasicKind::Uint
                        | BasicKind::Uint8
                        | BasicKind::Uint16
                        | BasicKind::Uint32
                        | BasicKind::Uint64
                        | BasicKind::Uintptr
                )
            )
    }

    fn is_len(&mut self, name: &str) -> bool {
        let Some(obj) = self.object(name) else {
            return false;
        };
        let object = self.checker.tcx.object(obj);
        object.pkg.is_none() && matches!(object.kind, ObjKind::Func) && name == "len"
    }
}
