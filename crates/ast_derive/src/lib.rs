//! `#[derive(WalkAst)]` for the declaration-level Go syntax tree.
//!
//! The generated impl calls `crate::walk::Walk::walk` on every field (structs) or
//! every bound field of the matched variant (enums). Fields annotated with
//! `#[walk(skip)]` are left out, which lets leaf data (positions, literal spans,
//! flags) live on nodes without a `Walk` impl.

use proc_macro::TokenStream;
use quote::{format_ident, quote, quote_spanned};
use syn::{parse_macro_input, spanned::Spanned, Data, DeriveInput, Field, Fields, Index};

#[proc_macro_derive(WalkAst, attributes(walk))]
pub fn derive_walk_ast(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let span = input.span();

    let walk_body = match generate_walk_body(&input.data) {
        Ok(body) => body,
        Err(err) => return err.into_compile_error().into(),
    };

    let expanded = quote_spanned! {span =>
        impl<'ast> crate::walk::Walk<'ast> for #name {
            #[inline(always)]
            #[allow(unused_variables)]
            fn walk<V: crate::walk::Visitor<'ast> + ?Sized>(
                &self,
                a: &'ast crate::ast::AstArena,
                v: &mut V
            ) {
                #walk_body
            }
        }
    };

    expanded.into()
}

fn generate_walk_body(data: &Data) -> syn::Result<proc_macro2::TokenStream> {
    match data {
        Data::Struct(data_struct) => generate_fields_walk(&data_struct.fields),
        Data::Enum(data_enum) => {
            let arms = data_enum
                .variants
                .iter()
                .map(|variant| generate_variant_arm(&variant.ident, &variant.fields))
                .collect::<syn::Result<Vec<_>>>()?;

            Ok(quote! {
                match self {
                    #(#arms)*
                }
            })
        }
        Data::Union(u) => Err(syn::Error::new_spanned(
            u.union_token,
            "WalkAst cannot be derived for unions",
        )),
    }
}

/// Returns true when the field carries `#[walk(skip)]`.
fn is_skipped(field: &Field) -> syn::Result<bool> {
    let mut skipped = false;
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("walk")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skipped = true;
                Ok(())
            } else {
                Err(meta.error("unsupported walk attribute, expected `skip`"))
            }
        })?;
    }
    Ok(skipped)
}

fn generate_fields_walk(fields: &Fields) -> syn::Result<proc_macro2::TokenStream> {
    let mut walk_calls = Vec::new();
    for (i, field) in fields.iter().enumerate() {
        if is_skipped(field)? {
            continue;
        }
        let field_access = match &field.ident {
            Some(ident) => quote! { &self.#ident },
            None => {
                let index = Index::from(i);
                quote! { &self.#index }
            }
        };
        walk_calls.push(quote! { crate::walk::Walk::walk(#field_access, a, v); });
    }

    Ok(quote! { #(#walk_calls)* })
}

fn generate_variant_arm(
    variant_name: &syn::Ident,
    fields: &Fields,
) -> syn::Result<proc_macro2::TokenStream> {
    match fields {
        Fields::Unit => Ok(quote! { Self::#variant_name => {} }),
        Fields::Named(fields_named) => {
            let mut bindings = Vec::new();
            let mut walk_calls = Vec::new();
            for f in &fields_named.named {
                let Some(name) = f.ident.as_ref() else {
                    return Err(syn::Error::new_spanned(f, "named field without identifier"));
                };
                bindings.push(name.clone());
                if !is_skipped(f)? {
                    walk_calls.push(quote! { crate::walk::Walk::walk(#name, a, v); });
                }
            }

            Ok(quote! {
                Self::#variant_name { #(#bindings),* } => {
                    #(#walk_calls)*
                }
            })
        }
        Fields::Unnamed(fields_unnamed) => {
            let mut bindings = Vec::new();
            let mut walk_calls = Vec::new();
            for (i, f) in fields_unnamed.unnamed.iter().enumerate() {
                let var = format_ident!("f{}", i);
                if !is_skipped(f)? {
                    walk_calls.push(quote! { crate::walk::Walk::walk(#var, a, v); });
                }
                bindings.push(var);
            }

            Ok(quote! {
                Self::#variant_name(#(#bindings),*) => {
                    #(#walk_calls)*
                }
            })
        }
    }
}
