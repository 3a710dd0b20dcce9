//! Recursive-descent parser for the declaration level of a Go source file.
//!
//! Works on the fully collected token stream so that the few ambiguous spots
//! of the grammar (`[` after an identifier, type parameters against array
//! lengths) can be settled by looking past a bracket group. Function bodies are
//! skipped by brace depth and initializers by bracket depth.

use crate::ast::*;
use crate::error::Diag;
use crate::lexer::Tok;
use crate::parser_support::{resolve_param_list, ParamDecl};

type PResult<T> = Result<T, Diag>;

const MAX_TYPE_DEPTH: u32 = 256;

pub(crate) struct Parser<'src, 'i> {
    toks: Vec<(usize, Tok<'src>, usize)>,
    pos: usize,
    prev_end: usize,
    src_len: usize,
    type_depth: u32,
    arena: AstArena,
    interner: &'i mut Interner,
}

impl<'src, 'i> Parser<'src, 'i> {
    pub(crate) fn new(
        src_len: usize,
        toks: Vec<(usize, Tok<'src>, usize)>,
        interner: &'i mut Interner,
    ) -> Self {
        Self {
            toks,
            pos: 0,
            prev_end: 0,
            src_len,
            type_depth: 0,
            arena: AstArena::new(),
            interner,
        }
    }

    pub(crate) fn into_arena(self) -> AstArena {
        self.arena
    }

    // =========================================================================
    // Token cursor
    // =========================================================================

    #[inline]
    fn peek(&self) -> Option<&Tok<'src>> {
        self.peek_nth(0)
    }

    #[inline]
    fn peek_nth(&self, n: usize) -> Option<&Tok<'src>> {
        self.toks.get(self.pos + n).map(|(_, t, _)| t)
    }

    #[inline]
    fn is(&self, t: &Tok<'src>) -> bool {
        self.peek() == Some(t)
    }

    #[inline]
    fn cur_span(&self) -> Span {
        match self.toks.get(self.pos) {
            Some(&(start, _, end)) => Span::new(start, end),
            None => Span::empty_at(self.src_len),
        }
    }

    #[inline]
    fn start(&self) -> usize {
        self.cur_span().start as usize
    }

    #[inline]
    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    fn bump(&mut self) -> Span {
        let span = self.cur_span();
        if self.pos < self.toks.len() {
            self.prev_end = span.end as usize;
            self.pos += 1;
        }
        span
    }

    fn eat(&mut self, t: &Tok<'src>) -> Option<Span> {
        if self.is(t) {
            Some(self.bump())
        } else {
            None
        }
    }

    fn expect(&mut self, t: &Tok<'src>, what: &str) -> PResult<Span> {
        match self.eat(t) {
            Some(span) => Ok(span),
            None => Err(self.error(what)),
        }
    }

    fn error(&self, expected: &str) -> Diag {
        let found = match self.peek() {
            Some(t) => t.to_string(),
            None => "end of file".to_string(),
        };
        Diag::parse(self.cur_span(), format!("expected {expected}, found {found}"))
    }

    fn ident(&mut self) -> PResult<IdentName> {
        let name = match self.peek() {
            Some(Tok::Ident(name)) => *name,
            _ => return Err(self.error("identifier")),
        };
        let pos = self.bump();
        Ok(IdentName {
            sym: self.interner.intern(name),
            pos,
        })
    }

    fn ident_list(&mut self) -> PResult<Vec<IdentName>> {
        let mut names = vec![self.ident()?];
        while self.eat(&Tok::Comma).is_some() {
            names.push(self.ident()?);
        }
        Ok(names)
    }

    /// Token right after the bracket group opened at token index `open`.
    fn after_group(&self, open: usize) -> Option<&Tok<'src>> {
        let mut depth = 0usize;
        for (i, (_, tok, _)) in self.toks.iter().enumerate().skip(open) {
            match tok {
                Tok::LParen | Tok::LBrack | Tok::LBrace => depth += 1,
                Tok::RParen | Tok::RBrack | Tok::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return self.toks.get(i + 1).map(|(_, t, _)| t);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// True when the bracket group opened at token index `open` contains a
    /// comma outside any nested group.
    fn group_has_top_level_comma(&self, open: usize) -> bool {
        let mut depth = 0usize;
        for (_, tok, _) in self.toks.iter().skip(open) {
            match tok {
                Tok::LParen | Tok::LBrack | Tok::LBrace => depth += 1,
                Tok::RParen | Tok::RBrack | Tok::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return false;
                    }
                }
                Tok::Comma if depth == 1 => return true,
                _ => {}
            }
        }
        false
    }

    fn starts_type(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Tok::Ident(_)
                    | Tok::Star
                    | Tok::LBrack
                    | Tok::LParen
                    | Tok::KwMap
                    | Tok::KwChan
                    | Tok::KwFunc
                    | Tok::KwStruct
                    | Tok::KwInterface
                    | Tok::Arrow
            )
        )
    }

    // =========================================================================
    // Source file and declarations
    // =========================================================================

    pub(crate) fn parse_file(&mut self) -> PResult<SourceFile> {
        let package_pos = self.expect(&Tok::KwPackage, "'package'")?;
        let name = self.ident()?;
        self.expect_decl_end()?;

        let mut decls = Vec::new();
        while self.peek().is_some() {
            let decl = match self.peek() {
                Some(Tok::KwFunc) => TopLevelDecl::Func(self.func_decl()?),
                Some(Tok::KwImport) => TopLevelDecl::Decl(self.gen_decl(GenDeclKind::Import)?),
                Some(Tok::KwConst) => TopLevelDecl::Decl(self.gen_decl(GenDeclKind::Const)?),
                Some(Tok::KwType) => TopLevelDecl::Decl(self.gen_decl(GenDeclKind::Type)?),
                Some(Tok::KwVar) => TopLevelDecl::Decl(self.gen_decl(GenDeclKind::Var)?),
                _ => return Err(self.error("declaration")),
            };
            decls.push(decl);
            self.expect_decl_end()?;
        }

        Ok(SourceFile {
            package_pos,
            name,
            decls: self.arena.list_top_decls(decls),
        })
    }

    fn expect_decl_end(&mut self) -> PResult<()> {
        if self.peek().is_none() || self.eat(&Tok::Semi).is_some() {
            Ok(())
        } else {
            Err(self.error("';'"))
        }
    }

    fn gen_decl(&mut self, kind: GenDeclKind) -> PResult<DeclId> {
        let start = self.start();
        let kw_pos = self.bump();
        let mut specs = Vec::new();

        let (l_paren, r_paren) = if let Some(l_paren) = self.eat(&Tok::LParen) {
            while !self.is(&Tok::RParen) {
                specs.push(self.spec(kind)?);
                if self.eat(&Tok::Semi).is_none() {
                    break;
                }
            }
            let r_paren = self.expect(&Tok::RParen, "')'")?;
            (Some(l_paren), Some(r_paren))
        } else {
            specs.push(self.spec(kind)?);
            (None, None)
        };

        let specs = self.arena.list_specs(specs);
        let decl = Decl::Gen(GenDecl {
            kw_pos,
            kind,
            l_paren,
            specs,
            r_paren,
        });
        Ok(self.arena.decls.alloc(decl, self.span_from(start)))
    }

    fn spec(&mut self, kind: GenDeclKind) -> PResult<Spec> {
        match kind {
            GenDeclKind::Import => self.import_spec().map(Spec::Import),
            GenDeclKind::Const => self.value_spec(true).map(Spec::Value),
            GenDeclKind::Var => self.value_spec(false).map(Spec::Value),
            GenDeclKind::Type => self.type_spec().map(Spec::Type),
        }
    }

    fn import_spec(&mut self) -> PResult<ImportSpec> {
        let name = match self.peek() {
            Some(Tok::Dot) => Some(ImportName::Dot(self.bump())),
            Some(Tok::Ident("_")) => Some(ImportName::Blank(self.bump())),
            Some(Tok::Ident(_)) => Some(ImportName::Name(self.ident()?)),
            _ => None,
        };
        let path = match self.peek() {
            Some(Tok::StringLit(_) | Tok::RawStringLit(_)) => StringLit { raw: self.bump() },
            _ => return Err(self.error("import path")),
        };
        Ok(ImportSpec { name, path })
    }

    fn value_spec(&mut self, is_const: bool) -> PResult<ValueSpec> {
        let names = self.ident_list()?;
        let typ = if !self.is(&Tok::Assign) && self.starts_type() {
            Some(self.parse_type()?)
        } else {
            None
        };

        let mut values = Vec::new();
        if self.eat(&Tok::Assign).is_some() {
            values.push(self.expr()?);
            while self.eat(&Tok::Comma).is_some() {
                values.push(self.expr()?);
            }
        } else if typ.is_none() && !is_const {
            return Err(self.error("type or '='"));
        }

        Ok(ValueSpec {
            names: self.arena.list_ident_names(names),
            typ,
            values: self.arena.list_exprs(values),
        })
    }

    fn type_spec(&mut self) -> PResult<TypeSpec> {
        let name = self.ident()?;
        let type_params = if self.is(&Tok::LBrack) && self.lbrack_opens_type_params() {
            Some(self.type_params()?)
        } else {
            None
        };
        let assign_pos = self.eat(&Tok::Assign);
        let typ = self.parse_type()?;
        Ok(TypeSpec {
            name,
            type_params,
            assign_pos,
            typ,
            alias: assign_pos.is_some(),
        })
    }

    /// Decides whether the `[` after a type name starts a type parameter list
    /// or an array length. `type A [N]int` is an array; `[P any]`, `[K, V any]`
    /// and `[P ~int]` are type parameters. `[P *C]` is read as an array length
    /// unless the group holds a top-level comma.
    fn lbrack_opens_type_params(&self) -> bool {
        match (self.peek_nth(1), self.peek_nth(2)) {
            (Some(Tok::Ident(_)), Some(next)) => match next {
                Tok::Ident(_)
                | Tok::Tilde
                | Tok::KwInterface
                | Tok::KwFunc
                | Tok::KwMap
                | Tok::KwChan
                | Tok::KwStruct
                | Tok::LBrack
                | Tok::Arrow
                | Tok::Comma => true,
                Tok::Star => self.group_has_top_level_comma(self.pos),
                _ => false,
            },
            _ => false,
        }
    }

    fn type_params(&mut self) -> PResult<TypeParamsId> {
        let start = self.start();
        let l_brack = self.bump();
        let mut decls = Vec::new();

        while !self.is(&Tok::RBrack) {
            let decl_start = self.start();
            let names = self.ident_list()?;
            let constraint = self.type_elem()?;
            let names = self.arena.list_ident_names(names);
            let decl = TypeParamDecl { names, constraint };
            decls.push(
                self.arena
                    .type_param_decls
                    .alloc(decl, self.span_from(decl_start)),
            );
            if self.eat(&Tok::Comma).is_none() {
                break;
            }
        }

        let r_brack = self.expect(&Tok::RBrack, "']'")?;
        let params = self.arena.list_type_param_decl_ids(decls);
        let tp = TypeParams {
            l_brack,
            params,
            r_brack,
        };
        Ok(self.arena.type_params.alloc(tp, self.span_from(start)))
    }

    fn type_elem(&mut self) -> PResult<TypeElem> {
        let mut terms = Vec::new();
        loop {
            let term = match self.eat(&Tok::Tilde) {
                Some(tilde_pos) => TypeTerm::Tilde {
                    tilde_pos,
                    typ: self.parse_type()?,
                },
                None => TypeTerm::Type {
                    typ: self.parse_type()?,
                },
            };
            terms.push(term);
            if self.eat(&Tok::Pipe).is_none() {
                break;
            }
        }
        Ok(TypeElem {
            terms: self.arena.list_type_terms(terms),
        })
    }

    fn func_decl(&mut self) -> PResult<FuncDeclId> {
        let start = self.start();
        let func_pos = self.bump();
        let recv = if self.is(&Tok::LParen) {
            Some(self.receiver()?)
        } else {
            None
        };
        let name = self.ident()?;
        let type_params = if recv.is_none() && self.is(&Tok::LBrack) {
            Some(self.type_params()?)
        } else {
            None
        };
        let signature = self.signature()?;
        let body = if self.is(&Tok::LBrace) {
            Some(self.skip_block()?)
        } else {
            None
        };

        let decl = FuncDecl {
            func_pos,
            recv,
            name,
            type_params,
            signature,
            body,
        };
        Ok(self.arena.funcs.alloc(decl, self.span_from(start)))
    }

    fn receiver(&mut self) -> PResult<Receiver> {
        let l_paren = self.bump();
        let named = matches!(
            (self.peek(), self.peek_nth(1)),
            (
                Some(Tok::Ident(_)),
                Some(Tok::Ident(_) | Tok::Star | Tok::LParen)
            )
        );
        let name = if named { Some(self.ident()?) } else { None };
        let typ = self.parse_type()?;
        self.eat(&Tok::Comma);
        let r_paren = self.expect(&Tok::RParen, "')'")?;
        Ok(Receiver {
            l_paren,
            name,
            typ,
            r_paren,
        })
    }

    /// Skips a function body, keeping the positions of its braces.
    fn skip_block(&mut self) -> PResult<Block> {
        let l_brace = self.expect(&Tok::LBrace, "'{'")?;
        let mut depth = 1u32;
        loop {
            match self.peek() {
                None => return Err(Diag::parse(l_brace, "unclosed block")),
                Some(Tok::LBrace) => depth += 1,
                Some(Tok::RBrace) => {
                    depth -= 1;
                    if depth == 0 {
                        let r_brace = self.bump();
                        return Ok(Block { l_brace, r_brace });
                    }
                }
                _ => {}
            }
            self.bump();
        }
    }

    // =========================================================================
    // Signatures
    // =========================================================================

    fn signature(&mut self) -> PResult<SignatureId> {
        let start = self.start();
        let params = self.params()?;
        let results = if self.is(&Tok::LParen) {
            Some(Results::Params(self.params()?))
        } else if self.starts_type() {
            Some(Results::Type(self.parse_type()?))
        } else {
            None
        };
        let sig = Signature { params, results };
        Ok(self.arena.signatures.alloc(sig, self.span_from(start)))
    }

    fn params(&mut self) -> PResult<FieldList> {
        let l_paren = self.expect(&Tok::LParen, "'('")?;
        let mut entries = Vec::new();
        while !self.is(&Tok::RParen) {
            entries.push(self.param_entry()?);
            if self.eat(&Tok::Comma).is_none() {
                break;
            }
        }
        let r_paren = self.expect(&Tok::RParen, "')'")?;

        let fields = resolve_param_list(&mut self.arena, entries)
            .map_err(|span| Diag::parse(span, "mixed named and unnamed parameters"))?;
        Ok(FieldList {
            l_paren,
            fields: self.arena.list_fields(fields),
            r_paren,
        })
    }

    fn param_entry(&mut self) -> PResult<ParamDecl> {
        let start = self.start();

        if let Some(Tok::Ident(_)) = self.peek() {
            let named = match self.peek_nth(1) {
                Some(Tok::Comma | Tok::RParen) => {
                    let name = self.ident()?;
                    return Ok(ParamDecl {
                        names: vec![name],
                        ellipsis_pos: None,
                        typ: None,
                        span: name.pos,
                    });
                }
                Some(Tok::Dot) | None => false,
                // `T[int]` is an instantiated type, `a []int` a named parameter.
                Some(Tok::LBrack) => !matches!(
                    self.after_group(self.pos + 1),
                    Some(Tok::Comma | Tok::RParen)
                ),
                Some(_) => true,
            };
            if named {
                let name = self.ident()?;
                let ellipsis_pos = self.eat(&Tok::Ellipsis);
                let typ = self.parse_type()?;
                return Ok(ParamDecl {
                    names: vec![name],
                    ellipsis_pos,
                    typ: Some(typ),
                    span: self.span_from(start),
                });
            }
        }

        let ellipsis_pos = self.eat(&Tok::Ellipsis);
        let typ = self.parse_type()?;
        Ok(ParamDecl {
            names: Vec::new(),
            ellipsis_pos,
            typ: Some(typ),
            span: self.span_from(start),
        })
    }

    // =========================================================================
    // Types
    // =========================================================================

    fn parse_type(&mut self) -> PResult<TypeId> {
        if self.type_depth >= MAX_TYPE_DEPTH {
            return Err(Diag::parse(self.cur_span(), "type nesting too deep"));
        }
        self.type_depth += 1;
        let res = self.parse_type_inner();
        self.type_depth -= 1;
        res
    }

    fn parse_type_inner(&mut self) -> PResult<TypeId> {
        let start = self.start();
        let typ = match self.peek() {
            Some(Tok::Ident(_)) => {
                let first = self.ident()?;
                let (pkg, name) = if self.eat(&Tok::Dot).is_some() {
                    (Some(first), self.ident()?)
                } else {
                    (None, first)
                };
                let args = if self.is(&Tok::LBrack) {
                    self.type_args()?
                } else {
                    ListRef::EMPTY
                };
                Type::Named { pkg, name, args }
            }
            Some(Tok::Star) => {
                let star_pos = self.bump();
                Type::Pointer {
                    star_pos,
                    elem: self.parse_type()?,
                }
            }
            Some(Tok::LBrack) => {
                self.bump();
                if self.eat(&Tok::RBrack).is_some() {
                    Type::Slice {
                        elem: self.parse_type()?,
                    }
                } else {
                    let len = self.expr()?;
                    self.expect(&Tok::RBrack, "']'")?;
                    Type::Array {
                        len,
                        elem: self.parse_type()?,
                    }
                }
            }
            Some(Tok::KwMap) => {
                self.bump();
                self.expect(&Tok::LBrack, "'['")?;
                let key = self.parse_type()?;
                self.expect(&Tok::RBrack, "']'")?;
                Type::Map {
                    key,
                    val: self.parse_type()?,
                }
            }
            Some(Tok::KwChan) => {
                self.bump();
                let dir = if self.eat(&Tok::Arrow).is_some() {
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                Type::Chan {
                    dir,
                    elem: self.parse_type()?,
                }
            }
            Some(Tok::Arrow) => {
                self.bump();
                self.expect(&Tok::KwChan, "'chan'")?;
                Type::Chan {
                    dir: ChanDir::Recv,
                    elem: self.parse_type()?,
                }
            }
            Some(Tok::KwFunc) => {
                self.bump();
                Type::Func {
                    sig: self.signature()?,
                }
            }
            Some(Tok::KwStruct) => self.struct_type()?,
            Some(Tok::KwInterface) => self.interface_type()?,
            Some(Tok::LParen) => {
                self.bump();
                let typ = self.parse_type()?;
                self.expect(&Tok::RParen, "')'")?;
                Type::Paren { typ }
            }
            _ => return Err(self.error("type")),
        };
        Ok(self.arena.types.alloc(typ, self.span_from(start)))
    }

    fn type_args(&mut self) -> PResult<ListRef<TypeId>> {
        self.bump();
        let mut args = Vec::new();
        while !self.is(&Tok::RBrack) {
            args.push(self.parse_type()?);
            if self.eat(&Tok::Comma).is_none() {
                break;
            }
        }
        self.expect(&Tok::RBrack, "']'")?;
        Ok(self.arena.list_types(args))
    }

    fn struct_type(&mut self) -> PResult<Type> {
        self.bump();
        self.expect(&Tok::LBrace, "'{'")?;
        let mut fields = Vec::new();
        while !self.is(&Tok::RBrace) {
            fields.push(self.struct_field()?);
            if self.eat(&Tok::Semi).is_none() {
                break;
            }
        }
        self.expect(&Tok::RBrace, "'}'")?;
        Ok(Type::Struct {
            fields: self.arena.list_fields(fields),
        })
    }

    fn struct_field(&mut self) -> PResult<FieldId> {
        let start = self.start();
        let embedded = match (self.peek(), self.peek_nth(1)) {
            (Some(Tok::Star), _) => true,
            (
                Some(Tok::Ident(_)),
                Some(Tok::Semi | Tok::RBrace | Tok::StringLit(_) | Tok::RawStringLit(_) | Tok::Dot),
            ) => true,
            // `T[int]` embeds an instantiated type, `a [2]int` declares a field.
            (Some(Tok::Ident(_)), Some(Tok::LBrack)) => matches!(
                self.after_group(self.pos + 1),
                Some(Tok::Semi | Tok::RBrace | Tok::StringLit(_) | Tok::RawStringLit(_)) | None
            ),
            _ => false,
        };

        let (names, typ) = if embedded {
            (ListRef::EMPTY, self.parse_type()?)
        } else {
            let names = self.ident_list()?;
            let typ = self.parse_type()?;
            (self.arena.list_ident_names(names), typ)
        };
        let tag = match self.peek() {
            Some(Tok::StringLit(_) | Tok::RawStringLit(_)) => Some(StringLit { raw: self.bump() }),
            _ => None,
        };

        let field = Field {
            names,
            ellipsis_pos: None,
            typ,
            tag,
            is_embed: embedded,
        };
        Ok(self.arena.fields.alloc(field, self.span_from(start)))
    }

    fn interface_type(&mut self) -> PResult<Type> {
        self.bump();
        self.expect(&Tok::LBrace, "'{'")?;
        let mut elems = Vec::new();
        while !self.is(&Tok::RBrace) {
            let is_method = matches!(
                (self.peek(), self.peek_nth(1)),
                (Some(Tok::Ident(_)), Some(Tok::LParen))
            );
            let elem = if is_method {
                let name = self.ident()?;
                InterfaceElem::Method {
                    name,
                    sig: self.signature()?,
                }
            } else {
                InterfaceElem::TypeElem(self.type_elem()?)
            };
            elems.push(elem);
            if self.eat(&Tok::Semi).is_none() {
                break;
            }
        }
        self.expect(&Tok::RBrace, "'}'")?;
        Ok(Type::Interface {
            elems: self.arena.list_interface_elems(elems),
        })
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Consumes one expression up to a `,` or `;` or an unmatched closing
    /// bracket. Lone identifiers and literals are kept; everything else
    /// becomes an opaque node covering its source range.
    fn expr(&mut self) -> PResult<ExprId> {
        let start = self.start();
        let first = self.pos;
        let mut depth = 0u32;

        while let Some(tok) = self.peek() {
            match tok {
                Tok::LParen | Tok::LBrack | Tok::LBrace => depth += 1,
                Tok::RParen | Tok::RBrack | Tok::RBrace => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                Tok::Comma | Tok::Semi if depth == 0 => break,
                _ => {}
            }
            self.bump();
        }

        if self.pos == first {
            return Err(self.error("expression"));
        }
        if depth != 0 {
            return Err(self.error("closing bracket"));
        }

        let span = self.span_from(start);
        let expr = if self.pos == first + 1 {
            match &self.toks[first].1 {
                Tok::Ident(name) => Expr::Ident(IdentName {
                    sym: self.interner.intern(name),
                    pos: span,
                }),
                Tok::IntLit(_) => basic_lit(BasicLitKind::Int, span),
                Tok::FloatLit(_) => basic_lit(BasicLitKind::Float, span),
                Tok::ImagLit(_) => basic_lit(BasicLitKind::Imag, span),
                Tok::RuneLit(_) => basic_lit(BasicLitKind::Rune, span),
                Tok::StringLit(_) | Tok::RawStringLit(_) => basic_lit(BasicLitKind::String, span),
                _ => Expr::Opaque,
            }
        } else {
            Expr::Opaque
        };
        Ok(self.arena.exprs.alloc(expr, span))
    }
}

#[inline]
fn basic_lit(kind: BasicLitKind, raw: Span) -> Expr {
    Expr::BasicLit(BasicLit { kind, raw })
}
