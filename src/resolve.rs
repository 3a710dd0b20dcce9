//! Conformance Resolver: which root-package types implement an interface,
//! and where their methods are declared.

use std::collections::HashMap;

use findimpls_parser::ast::{AstArena, FuncDeclId};
use findimpls_parser::walk::Visitor;
use indexmap::IndexMap;

use crate::error::ResolveError;
use crate::program::{DeclRef, FileId, Package, PackageId, Pos, Program};
use crate::types::{LookupResult, Name, ObjKind, Selection, TypeDisplay, TypeRef};

/// The form in which a type satisfies the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImplForm {
    Value,
    Pointer,
}

/// A conforming type: the named type `T`, as `T` or as `*T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImplType {
    pub named: TypeRef,
    pub form: ImplForm,
}

impl ImplType {
    /// Go spelling, e.g. `Circle` or `*Square`, qualified unless the type
    /// belongs to `relative_to`.
    pub fn display(&self, program: &Program, relative_to: PackageId) -> String {
        let named = TypeDisplay::new(
            program.types(),
            program.interner(),
            program.packages(),
            self.named,
        )
        .relative_to(relative_to);
        match self.form {
            ImplForm::Value => named.to_string(),
            ImplForm::Pointer => format!("*{named}"),
        }
    }
}

/// Conforming types of one scanned package, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageImpls {
    pub package: PackageId,
    pub path: String,
    /// Each type's requested methods, in request order.
    pub impls: IndexMap<ImplType, IndexMap<String, DeclRef>>,
}

impl PackageImpls {
    pub fn is_empty(&self) -> bool {
        self.impls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.impls.len()
    }
}

/// Result of one resolution: an entry for every scanned package, empty or not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConformanceResult {
    pub packages: IndexMap<PackageId, PackageImpls>,
}

impl ConformanceResult {
    pub fn get(&self, id: PackageId) -> Option<&PackageImpls> {
        self.packages.get(&id)
    }

    pub fn by_path(&self, path: &str) -> Option<&PackageImpls> {
        self.packages.values().find(|p| p.path == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageImpls> + '_ {
        self.packages.values()
    }

    /// Number of conforming types over all packages.
    pub fn total(&self) -> usize {
        self.packages.values().map(PackageImpls::len).sum()
    }
}

/// Finds every type of the program's root packages that implements
/// interface `name` of package `owner`, and the declarations of `methods`
/// on each of them.
///
/// A type implementing the interface in both forms is recorded once, in
/// value form.
pub fn resolve<S: AsRef<str>>(
    program: &Program,
    owner: &str,
    name: &str,
    methods: &[S],
) -> Result<ConformanceResult, ResolveError> {
    let iface = locate_interface(program, owner, name)?;
    let tcx = program.types();

    let mut result = ConformanceResult::default();
    for package in program.roots() {
        if program.cancel_token().is_some_and(|t| t.is_cancelled()) {
            return Err(ResolveError::Cancelled);
        }
        let bodies = BodyIndex::build(program, package);
        let mut impls = IndexMap::new();

        for &obj_id in package.info.scope.values() {
            let obj = program.object(obj_id);
            if !matches!(obj.kind, ObjKind::TypeName { alias: false }) {
                continue;
            }
            let Some(named) = tcx.as_named(obj.typ) else {
                continue;
            };
            if tcx.named(named).generic || tcx.is_interface(obj.typ) {
                continue;
            }
            let form = if tcx.implements(obj.typ, false, iface) {
                ImplForm::Value
            } else if tcx.implements(obj.typ, true, iface) {
                ImplForm::Pointer
            } else if let Some(embedded) = tcx.opaque_embedding(obj.typ) {
                let (embedded, source_package) = opaque_names(program, embedded, package.id);
                return Err(ResolveError::OpaqueEmbedding {
                    package: package.path.clone(),
                    type_name: program.name(obj.name).to_string(),
                    embedded,
                    source_package,
                });
            } else {
                continue;
            };
            let impl_type = ImplType {
                named: obj.typ,
                form,
            };
            tracing::trace!(
                package = %package.path,
                typ = %impl_type.display(program, package.id),
                "conforming type"
            );

            let mut decls = IndexMap::with_capacity(methods.len());
            for method in methods {
                let method = method.as_ref();
                let decl = method_decl(program, package, &bodies, impl_type, method)?;
                decls.insert(method.to_string(), decl);
            }
            impls.insert(impl_type, decls);
        }

        result.packages.insert(
            package.id,
            PackageImpls {
                package: package.id,
                path: package.path.clone(),
                impls,
            },
        );
    }

    tracing::info!(
        interface = %format_args!("{owner}.{name}"),
        packages = result.packages.len(),
        implementations = result.total(),
        "resolved conformance"
    );
    Ok(result)
}

fn locate_interface(program: &Program, owner: &str, name: &str) -> Result<TypeRef, ResolveError> {
    let not_found = |reason: &str| ResolveError::InterfaceNotFound {
        package: owner.to_string(),
        name: name.to_string(),
        reason: reason.to_string(),
    };
    let package = program
        .package_by_path(owner)
        .ok_or_else(|| not_found("package is not part of the program"))?;
    let obj = program
        .scope_lookup(package.id, name)
        .map(|id| program.object(id))
        .ok_or_else(|| not_found("no package-level declaration with this name"))?;
    if !obj.is_type_name() {
        return Err(not_found("declaration is not a type"));
    }
    let tcx = program.types();
    if !tcx.is_interface(obj.typ) {
        return Err(ResolveError::NotAnInterface {
            package: owner.to_string(),
            name: name.to_string(),
        });
    }
    // Without the embedded interface's methods no type can be judged.
    if let Some(&embedded) = tcx.method_set(obj.typ).opaque.first() {
        let (embedded, source_package) = opaque_names(program, embedded, package.id);
        return Err(ResolveError::IncompleteInterface {
            package: owner.to_string(),
            name: name.to_string(),
            embedded,
            source_package,
        });
    }
    Ok(obj.typ)
}

/// Spelling of an opaque type and the import path of its package.
fn opaque_names(program: &Program, typ: TypeRef, relative_to: PackageId) -> (String, String) {
    let tcx = program.types();
    let spelled = TypeDisplay::new(tcx, program.interner(), program.packages(), typ)
        .relative_to(relative_to)
        .to_string();
    let path = tcx
        .as_named(typ)
        .and_then(|id| program.object(tcx.named(id).obj).pkg)
        .map(|pkg| program.package(pkg).path.clone())
        .unwrap_or_default();
    (spelled, path)
}

fn method_decl(
    program: &Program,
    package: &Package,
    bodies: &BodyIndex,
    impl_type: ImplType,
    method: &str,
) -> Result<DeclRef, ResolveError> {
    let type_name = || impl_type.display(program, package.id);
    let not_found = || ResolveError::MethodNotFound {
        package: package.path.clone(),
        type_name: type_name(),
        method: method.to_string(),
    };
    let no_decl = || ResolveError::DeclarationNotFound {
        package: package.path.clone(),
        type_name: type_name(),
        method: method.to_string(),
    };

    // A name never interned appears in no source file.
    let sym = program.interner().get(method).ok_or_else(not_found)?;
    let name = Name::new(sym, method, package.id);
    let ptr = impl_type.form == ImplForm::Pointer;
    match program.types().lookup(impl_type.named, ptr, true, name) {
        LookupResult::Found(Selection::Method { obj, .. }) => program
            .object(obj)
            .scope_pos()
            .and_then(|pos| bodies.get(pos))
            .ok_or_else(no_decl),
        LookupResult::Found(Selection::InterfaceMethod { .. }) => Err(no_decl()),
        _ => Err(not_found()),
    }
}

/// Method declarations of one package keyed by the position of their
/// body's opening brace.
struct BodyIndex {
    by_pos: HashMap<Pos, DeclRef>,
}

impl BodyIndex {
    fn build(program: &Program, package: &Package) -> Self {
        let mut by_pos = HashMap::new();
        for &file in &package.files {
            let syntax = &program.file(file).syntax;
            let mut collector = BodyCollector {
                file,
                by_pos: &mut by_pos,
            };
            collector.visit_source_file(&syntax.arena, &syntax.file);
        }
        Self { by_pos }
    }

    fn get(&self, pos: Pos) -> Option<DeclRef> {
        self.by_pos.get(&pos).copied()
    }
}

struct BodyCollector<'i> {
    file: FileId,
    by_pos: &'i mut HashMap<Pos, DeclRef>,
}

impl<'ast> Visitor<'ast> for BodyCollector<'_> {
    fn visit_func_decl(&mut self, a: &'ast AstArena, id: FuncDeclId) {
        let func = &a.funcs[id];
        if let (true, Some(body)) = (func.is_method(), func.body) {
            self.by_pos.insert(
                Pos::new(self.file, body.l_brace),
                DeclRef {
                    file: self.file,
                    func: id,
                },
            );
        }
    }
}
