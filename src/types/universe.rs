use findimpls_parser::ast::Interner;

use super::{
    BasicKind, IfaceMethod, InterfaceType, Name, ObjKind, Object, Signature, TypeCtx, TypeKind,
};

const BASICS: [BasicKind; 17] = [
    BasicKind::Bool,
    BasicKind::String,
    BasicKind::Int,
    BasicKind::Int8,
    BasicKind::Int16,
    BasicKind::Int32,
    BasicKind::Int64,
    BasicKind::Uint,
    BasicKind::Uint8,
    BasicKind::Uint16,
    BasicKind::Uint32,
    BasicKind::Uint64,
    BasicKind::Uintptr,
    BasicKind::Float32,
    BasicKind::Float64,
    BasicKind::Complex64,
    BasicKind::Complex128,
];

const BUILTIN_FUNCS: [&str; 18] = [
    "append", "cap", "clear", "close", "complex", "copy", "delete", "imag", "len", "make", "max",
    "min", "new", "panic", "print", "println", "real", "recover",
];

/// Declares the predeclared identifiers.
pub(super) fn populate(tcx: &mut TypeCtx, interner: &mut Interner) {
    for kind in BASICS {
        let typ = tcx.intern(TypeKind::Basic(kind));
        declare(tcx, interner, kind.name(), ObjKind::TypeName { alias: false }, typ);
    }

    let uint8 = tcx.intern(TypeKind::Basic(BasicKind::Uint8));
    let int32 = tcx.intern(TypeKind::Basic(BasicKind::Int32));
    declare(tcx, interner, "byte", ObjKind::TypeName { alias: true }, uint8);
    declare(tcx, interner, "rune", ObjKind::TypeName { alias: true }, int32);

    let empty = tcx.intern(TypeKind::Interface(InterfaceType::default()));
    declare(tcx, interner, "any", ObjKind::TypeName { alias: true }, empty);

    // type error interface { Error() string }
    let string = tcx.intern(TypeKind::Basic(BasicKind::String));
    let error_sig = tcx.intern(TypeKind::Func(Signature {
        params: Vec::new(),
        results: vec![string],
        variadic: false,
    }));
    let error_iface = tcx.intern(TypeKind::Interface(InterfaceType {
        methods: vec![IfaceMethod {
            name: Name {
                sym: interner.intern("Error"),
                pkg: None,
            },
            sig: error_sig,
        }],
        ..Default::default()
    }));
    tcx.error = declare_named(tcx, interner, "error", error_iface);

    let comparable = tcx.intern(TypeKind::Interface(InterfaceType {
        comparable: true,
        ..Default::default()
    }));
    declare_named(tcx, interner, "comparable", comparable);

    let bool_t = tcx.intern(TypeKind::Basic(BasicKind::Bool));
    let int = tcx.intern(TypeKind::Basic(BasicKind::Int));
    declare(tcx, interner, "true", ObjKind::Const { value: Some(1) }, bool_t);
    declare(tcx, interner, "false", ObjKind::Const { value: Some(0) }, bool_t);
    declare(tcx, interner, "iota", ObjKind::Const { value: None }, int);

    let invalid = tcx.invalid();
    declare(tcx, interner, "nil", ObjKind::Var, invalid);
    for name in BUILTIN_FUNCS {
        declare(tcx, interner, name, ObjKind::Func, invalid);
    }
}

fn declare(
    tcx: &mut TypeCtx,
    interner: &mut Interner,
    name: &str,
    kind: ObjKind,
    typ: super::TypeRef,
) -> super::ObjId {
    let sym = interner.intern(name);
    let obj = tcx.new_object(Object {
        name: sym,
        pkg: None,
        kind,
        pos: None,
        typ,
    });
    tcx.universe.insert(sym, obj);
    obj
}

fn declare_named(
    tcx: &mut TypeCtx,
    interner: &mut Interner,
    name: &str,
    underlying: super::TypeRef,
) -> super::TypeRef {
    let invalid = tcx.invalid();
    let obj = declare(tcx, interner, name, ObjKind::TypeName { alias: false }, invalid);
    let (named, typ) = tcx.new_named(obj, false);
    tcx.named_mut(named).underlying = underlying;
    typ
}
