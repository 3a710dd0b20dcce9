use crate::ast::{self, Span};

/// One comma-separated entry of a parameter list, before grouping.
///
/// `typ == None` marks a lone identifier, which is either a parameter name
/// waiting for the type of a later entry (`a, b int`) or a type in an unnamed
/// list (`int, string`).
#[derive(Clone, Debug)]
pub struct ParamDecl {
    pub names: Vec<ast::IdentName>,
    pub ellipsis_pos: Option<Span>,
    pub typ: Option<ast::TypeId>,
    pub span: Span,
}

/// Groups raw entries into fields.
///
/// Either every parameter is named or none is; on a mix the span of the
/// first unnamed entry is returned.
pub fn resolve_param_list(
    arena: &mut ast::AstArena,
    params: Vec<ParamDecl>,
) -> Result<Vec<ast::FieldId>, Span> {
    let mut out = Vec::new();
    let mut pending_names: Vec<ast::IdentName> = Vec::new();
    let mut pending_start: Option<u32> = None;
    let mut named = false;
    let mut first_unnamed: Option<Span> = None;

    for param in params {
        match param.typ {
            None => {
                if pending_names.is_empty() {
                    pending_start = Some(param.span.start);
                }
                pending_names.extend(param.names);
            }
            Some(typ) if !param.names.is_empty() => {
                let mut names = std::mem::take(&mut pending_names);
                names.extend(param.names);
                let names = arena.list_ident_names(names);
                let start = pending_start.take().unwrap_or(param.span.start);
                let span = Span {
                    start,
                    end: param.span.end,
                };
                let field = ast::Field {
                    names,
                    ellipsis_pos: param.ellipsis_pos,
                    typ,
                    tag: None,
                    is_embed: false,
                };
                out.push(arena.fields.alloc(field, span));
                named = true;
            }
            Some(typ) => {
                flush_unnamed(arena, &mut pending_names, &mut out, &mut first_unnamed);
                pending_start = None;
                let field = ast::Field {
                    names: ast::ListRef::EMPTY,
                    ellipsis_pos: param.ellipsis_pos,
                    typ,
                    tag: None,
                    is_embed: false,
                };
                out.push(arena.fields.alloc(field, param.span));
                first_unnamed.get_or_insert(param.span);
            }
        }
    }
    flush_unnamed(arena, &mut pending_names, &mut out, &mut first_unnamed);

    match first_unnamed {
        Some(span) if named => Err(span),
        _ => Ok(out),
    }
}

/// Turns identifiers still waiting for a type into unnamed parameters of that type.
fn flush_unnamed(
    arena: &mut ast::AstArena,
    pending: &mut Vec<ast::IdentName>,
    out: &mut Vec<ast::FieldId>,
    first_unnamed: &mut Option<Span>,
) {
    for name in pending.drain(..) {
        let typ = named_type_from_ident(arena, name);
        let field = ast::Field {
            names: ast::ListRef::EMPTY,
            ellipsis_pos: None,
            typ,
            tag: None,
            is_embed: false,
        };
        out.push(arena.fields.alloc(field, name.pos));
        first_unnamed.get_or_insert(name.pos);
    }
}

fn named_type_from_ident(arena: &mut ast::AstArena, name: ast::IdentName) -> ast::TypeId {
    arena.types.alloc(
        ast::Type::Named {
            pkg: None,
            name,
            args: ast::ListRef::EMPTY,
        },
        name.pos,
    )
}
