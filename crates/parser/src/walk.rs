use crate::ast::*;

// Core traits
pub trait Walk<'ast> {
    fn walk<V: Visitor<'ast> + ?Sized>(&self, a: &'ast AstArena, v: &mut V);
}

/// Hooks for every arena-allocated node kind. The default of each hook walks
/// the children, so an override that still wants them must call `walk` itself.
pub trait Visitor<'ast> {
    #[inline(always)]
    fn visit_source_file(&mut self, a: &'ast AstArena, f: &'ast SourceFile) {
        f.walk(a, self);
    }

    #[inline(always)]
    fn visit_decl(&mut self, a: &'ast AstArena, id: DeclId) {
        a.decls[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_func_decl(&mut self, a: &'ast AstArena, id: FuncDeclId) {
        a.funcs[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_expr(&mut self, a: &'ast AstArena, id: ExprId) {
        a.exprs[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_type(&mut self, a: &'ast AstArena, id: TypeId) {
        a.types[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_field(&mut self, a: &'ast AstArena, id: FieldId) {
        a.fields[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_signature(&mut self, a: &'ast AstArena, id: SignatureId) {
        a.signatures[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_type_params(&mut self, a: &'ast AstArena, id: TypeParamsId) {
        a.type_params[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_type_param_decl(&mut self, a: &'ast AstArena, id: TypeParamDeclId) {
        a.type_param_decls[id].walk(a, self);
    }
}

macro_rules! impl_walk_for_ids {
    ($($id:ty => $visit:ident),* $(,)?) => {
        $(
            impl<'ast> Walk<'ast> for $id {
                #[inline(always)]
                fn walk<V: Visitor<'ast> + ?Sized>(&self, a: &'ast AstArena, v: &mut V) {
                    v.$visit(a, *self);
                }
            }
        )*
    };
}

impl_walk_for_ids! {
    DeclId => visit_decl,
    FuncDeclId => visit_func_decl,
    ExprId => visit_expr,
    TypeId => visit_type,
    FieldId => visit_field,
    SignatureId => visit_signature,
    TypeParamsId => visit_type_params,
    TypeParamDeclId => visit_type_param_decl,
}

pub trait ListSlice<T> {
    fn slice(&self, r: ListRef<T>) -> &[T];
}

impl<'ast, T> Walk<'ast> for ListRef<T>
where
    AstArena: ListSlice<T>,
    T: Walk<'ast>,
{
    #[inline(always)]
    fn walk<V: Visitor<'ast> + ?Sized>(&self, a: &'ast AstArena, v: &mut V) {
        for item in a.slice(*self) {
            item.walk(a, v);
        }
    }
}

macro_rules! impl_list_slice {
    ($($t:ty => $getter:ident),* $(,)?) => {
        $(
            impl ListSlice<$t> for AstArena {
                #[inline(always)]
                fn slice(&self, r: ListRef<$t>) -> &[$t] {
                    self.$getter(r)
                }
            }
        )*
    };
}

impl_list_slice! {
    ExprId => exprs_list,
    TypeId => types_list,
    FieldId => fields_list,
    Spec => specs_list,
    TopLevelDecl => top_decls,
    TypeTerm => type_terms,
    InterfaceElem => interface_elems,
    IdentName => ident_names,
    TypeParamDeclId => type_param_decl_ids,
}

// Utilities
impl<'ast, T: Walk<'ast>> Walk<'ast> for Option<T> {
    #[inline(always)]
    fn walk<V: Visitor<'ast> + ?Sized>(&self, a: &'ast AstArena, v: &mut V) {
        if let Some(x) = self {
            x.walk(a, v);
        }
    }
}

// Leaves
macro_rules! impl_walk_noop {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<'ast> Walk<'ast> for $ty {
                #[inline(always)]
                fn walk<V: Visitor<'ast> + ?Sized>(&self, _: &'ast AstArena, _: &mut V) {}
            }
        )*
    };
}

impl_walk_noop! {
    Span,
    Symbol,
    BasicLit,
    bool,
    GenDeclKind,
    ChanDir,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source;

    #[derive(Default)]
    struct Counter {
        funcs: usize,
        methods: usize,
        types: usize,
        fields: usize,
    }

    impl<'ast> Visitor<'ast> for Counter {
        fn visit_func_decl(&mut self, a: &'ast AstArena, id: FuncDeclId) {
            if a.funcs[id].is_method() {
                self.methods += 1;
            } else {
                self.funcs += 1;
            }
            a.funcs[id].walk(a, self);
        }

        fn visit_type(&mut self, a: &'ast AstArena, id: TypeId) {
            self.types += 1;
            a.types[id].walk(a, self);
        }

        fn visit_field(&mut self, a: &'ast AstArena, id: FieldId) {
            self.fields += 1;
            a.fields[id].walk(a, self);
        }
    }

    #[test]
    fn visits_funcs_methods_and_nested_types() {
        let src = "package p\n\
                   type T struct { a []int; b map[string]*T }\n\
                   func (t *T) M(x int) error { return nil }\n\
                   func F() {}\n";
        let mut interner = Interner::new();
        let parsed = parse_source(src, &mut interner).expect("parses");
        let mut c = Counter::default();
        c.visit_source_file(&parsed.arena, &parsed.file);

        assert_eq!(c.funcs, 1);
        assert_eq!(c.methods, 1);
        // struct, []int, int, map, string, *T, T, receiver *T, T, int, error
        assert_eq!(c.types, 11);
        // a, b, x; a single unnamed result is not a field
        assert_eq!(c.fields, 3);
    }
}
