//! Go tokenizer.
//!
//! Logos produces raw tokens (including newlines and comments); the [`Lexer`]
//! wrapper drops trivia, classifies number literals and applies Go's automatic
//! semicolon insertion. Literal validation (escape sequences, digit separators)
//! is not performed: inputs are expected to be code that `go build` accepts.

use crate::ast::Span;
use crate::error::{Diag, LexError, LexErrorKind};
use logos::{Lexer as LogosLexer, Logos};
use memchr::{memchr, memchr2};
use std::ops::Range;

// =============================================================================
// Callbacks
// =============================================================================

#[inline]
fn lex_block_comment(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), LexErrorKind> {
    let rem = lex.remainder().as_bytes();
    let mut search_start = 0;

    while let Some(star_pos) = memchr(b'*', &rem[search_start..]) {
        let abs_pos = search_start + star_pos;
        if rem.get(abs_pos + 1) == Some(&b'/') {
            lex.bump(abs_pos + 2);
            return Ok(());
        }
        search_start = abs_pos + 1;
    }

    lex.bump(rem.len());
    Err(LexErrorKind::UnterminatedComment)
}

/// Consumes the rest of a `//` comment, leaving the line terminator in place.
#[inline]
fn lex_line_comment(lex: &mut LogosLexer<'_, RawTok>) {
    let rem = lex.remainder().as_bytes();
    let end = memchr2(b'\n', b'\r', rem).unwrap_or(rem.len());
    lex.bump(end);
}

#[inline]
fn lex_raw_string(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), LexErrorKind> {
    let rem = lex.remainder().as_bytes();
    match memchr(b'`', rem) {
        Some(end) => {
            lex.bump(end + 1);
            Ok(())
        }
        None => {
            lex.bump(rem.len());
            Err(LexErrorKind::UnterminatedRawString)
        }
    }
}

/// Maximal munch over the characters a Go number literal may contain.
///
/// Signs are only taken right after an exponent marker (`e`/`E` for decimal
/// literals, `p`/`P` for hex literals).
fn lex_number(lex: &mut LogosLexer<'_, RawTok>) {
    let head = lex.slice().as_bytes();
    let rem = lex.remainder().as_bytes();
    let mut prev = *head.last().unwrap_or(&b'0');
    let mut hex = false;
    let mut n = 0;

    while n < rem.len() {
        let b = rem[n];
        let take = match b {
            b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'.' => true,
            b'+' | b'-' => {
                if hex {
                    matches!(prev, b'p' | b'P')
                } else {
                    matches!(prev, b'e' | b'E')
                }
            }
            _ => false,
        };
        if !take {
            break;
        }
        if n == 0 && head == b"0" && matches!(b, b'x' | b'X') {
            hex = true;
        }
        prev = b;
        n += 1;
    }

    lex.bump(n);
}

fn classify_number(lit: &str) -> Tok<'_> {
    let bytes = lit.as_bytes();
    if bytes.last() == Some(&b'i') {
        return Tok::ImagLit(lit);
    }
    let hex = bytes.len() > 1 && bytes[0] == b'0' && matches!(bytes[1], b'x' | b'X');
    let is_float = if hex {
        bytes.iter().any(|b| matches!(b, b'.' | b'p' | b'P'))
    } else {
        let radix_prefixed =
            bytes.len() > 1 && bytes[0] == b'0' && matches!(bytes[1], b'b' | b'B' | b'o' | b'O');
        !radix_prefixed && bytes.iter().any(|b| matches!(b, b'.' | b'e' | b'E'))
    };
    if is_float {
        Tok::FloatLit(lit)
    } else {
        Tok::IntLit(lit)
    }
}

// =============================================================================
// Raw tokens
// =============================================================================

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(error = LexErrorKind)]
#[logos(skip r"[ \t\f]+")]
#[rustfmt::skip]
enum RawTok {
    #[token("\u{FEFF}")] Bom,

    // Trivia
    #[regex(r"\r\n|\n|\r")] Newline,
    #[token("//", lex_line_comment)] LineComment,
    #[token("/*", lex_block_comment)] BlockComment,

    // Keywords (before Ident)
    #[token("break")] KwBreak,
    #[token("case")] KwCase,
    #[token("chan")] KwChan,
    #[token("const")] KwConst,
    #[token("continue")] KwContinue,
    #[token("default")] KwDefault,
    #[token("defer")] KwDefer,
    #[token("else")] KwElse,
    #[token("fallthrough")] KwFallthrough,
    #[token("for")] KwFor,
    #[token("func")] KwFunc,
    #[token("go")] KwGo,
    #[token("goto")] KwGoto,
    #[token("if")] KwIf,
    #[token("import")] KwImport,
    #[token("interface")] KwInterface,
    #[token("map")] KwMap,
    #[token("package")] KwPackage,
    #[token("range")] KwRange,
    #[token("return")] KwReturn,
    #[token("select")] KwSelect,
    #[token("struct")] KwStruct,
    #[token("switch")] KwSwitch,
    #[token("type")] KwType,
    #[token("var")] KwVar,

    #[regex(r"[_\p{L}][_\p{L}\p{Nd}]*")] Ident,
    #[regex(r"[0-9]|\.[0-9]", lex_number)] Number,
    #[token("`", lex_raw_string)] RawString,
    #[regex(r#""([^"\\\n\r]|\\.)*""#)] String,
    #[regex(r"'([^'\\\n\r]|\\.)+'")] Rune,

    // Operators
    #[token("...")] Ellipsis,
    #[token("<<=")] ShlAssign,
    #[token(">>=")] ShrAssign,
    #[token("&^=")] AndNotAssign,
    #[token("+=")] AddAssign,
    #[token("-=")] SubAssign,
    #[token("*=")] MulAssign,
    #[token("/=")] DivAssign,
    #[token("%=")] ModAssign,
    #[token("&=")] AndAssign,
    #[token("|=")] OrAssign,
    #[token("^=")] XorAssign,
    #[token("<<")] Shl,
    #[token(">>")] Shr,
    #[token("&^")] AndNot,
    #[token("&&")] LAnd,
    #[token("||")] LOr,
    #[token("==")] EqEq,
    #[token("!=")] NotEq,
    #[token("<=")] Le,
    #[token(">=")] Ge,
    #[token("++")] Inc,
    #[token("--")] Dec,
    #[token(":=")] Define,
    #[token("<-")] Arrow,
    #[token("=")] Assign,
    #[token("+")] Plus,
    #[token("-")] Minus,
    #[token("*")] Star,
    #[token("/")] Slash,
    #[token("%")] Percent,
    #[token("&")] Amp,
    #[token("|")] Pipe,
    #[token("^")] Caret,
    #[token("~")] Tilde,
    #[token("!")] Bang,
    #[token("<")] Lt,
    #[token(">")] Gt,

    // Delimiters
    #[token("(")] LParen,
    #[token(")")] RParen,
    #[token("[")] LBrack,
    #[token("]")] RBrack,
    #[token("{")] LBrace,
    #[token("}")] RBrace,
    #[token(",")] Comma,
    #[token(";")] Semi,
    #[token(":")] Colon,
    #[token(".")] Dot,
}

impl RawTok {
    /// Go spec: a semicolon is inserted after a line's final token when it is one of these.
    #[inline(always)]
    const fn can_insert_semicolon(self) -> bool {
        matches!(
            self,
            Self::Ident
                | Self::Number
                | Self::Rune
                | Self::String
                | Self::RawString
                | Self::KwBreak
                | Self::KwContinue
                | Self::KwFallthrough
                | Self::KwReturn
                | Self::Inc
                | Self::Dec
                | Self::RParen
                | Self::RBrack
                | Self::RBrace
        )
    }

    #[rustfmt::skip]
    fn to_token(self, slice: &str) -> Tok<'_> {
        macro_rules! simple_tok {
            ($($raw:ident),* $(,)?) => {
                match self {
                    Self::Ident => Tok::Ident(slice),
                    Self::Number => classify_number(slice),
                    Self::Rune => Tok::RuneLit(slice),
                    Self::String => Tok::StringLit(slice),
                    Self::RawString => Tok::RawStringLit(slice),
                    $(Self::$raw => Tok::$raw,)*
                    Self::Bom | Self::Newline | Self::LineComment | Self::BlockComment => Tok::Error,
                }
            };
        }

        simple_tok! {
            KwBreak, KwCase, KwChan, KwConst, KwContinue, KwDefault, KwDefer, KwElse,
            KwFallthrough, KwFor, KwFunc, KwGo, KwGoto, KwIf, KwImport, KwInterface,
            KwMap, KwPackage, KwRange, KwReturn, KwSelect, KwStruct, KwSwitch, KwType, KwVar,

            Ellipsis, ShlAssign, ShrAssign, AndNotAssign, AddAssign, SubAssign, MulAssign,
            DivAssign, ModAssign, AndAssign, OrAssign, XorAssign, Shl, Shr, AndNot, LAnd, LOr,
            EqEq, NotEq, Le, Ge, Inc, Dec, Define, Arrow, Assign, Plus, Minus, Star, Slash,
            Percent, Amp, Pipe, Caret, Tilde, Bang, Lt, Gt,

            LParen, RParen, LBrack, RBrack, LBrace, RBrace, Comma, Semi, Colon, Dot,
        }
    }
}

// =============================================================================
// Public tokens (zero-copy)
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Tok<'input> {
    Ident(&'input str),
    IntLit(&'input str),
    FloatLit(&'input str),
    ImagLit(&'input str),
    RuneLit(&'input str),
    StringLit(&'input str),
    RawStringLit(&'input str),

    // Keywords
    KwBreak,
    KwCase,
    KwChan,
    KwConst,
    KwContinue,
    KwDefault,
    KwDefer,
    KwElse,
    KwFallthrough,
    KwFor,
    KwFunc,
    KwGo,
    KwGoto,
    KwIf,
    KwImport,
    KwInterface,
    KwMap,
    KwPackage,
    KwRange,
    KwReturn,
    KwSelect,
    KwStruct,
    KwSwitch,
    KwType,
    KwVar,

    // Operators / Delimiters
    Ellipsis,
    ShlAssign,
    ShrAssign,
    AndNotAssign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    Shl,
    Shr,
    AndNot,
    LAnd,
    LOr,
    EqEq,
    NotEq,
    Le,
    Ge,
    Inc,
    Dec,
    Define,
    Arrow,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Lt,
    Gt,
    LParen,
    RParen,
    LBrack,
    RBrack,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Colon,
    Dot,

    Error,
}

impl<'input> std::fmt::Display for Tok<'input> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tok::Ident(s)
            | Tok::IntLit(s)
            | Tok::FloatLit(s)
            | Tok::ImagLit(s)
            | Tok::RuneLit(s)
            | Tok::StringLit(s)
            | Tok::RawStringLit(s) => write!(f, "{s}"),
            Tok::Semi => write!(f, "';'"),
            other => write!(f, "{other:?}"),
        }
    }
}

// =============================================================================
// Lexer wrapper: trivia, semicolon insertion, diagnostics
// =============================================================================

pub struct Lexer<'src> {
    logos: LogosLexer<'src, RawTok>,
    pending: Option<(usize, Tok<'src>, usize)>,
    diags: Vec<Diag>,
    last_can_insert_semi: bool,
    src_len: usize,
    eof_done: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(input: &'src str) -> Self {
        Self {
            logos: RawTok::lexer(input),
            pending: None,
            diags: Vec::new(),
            last_can_insert_semi: false,
            src_len: input.len(),
            eof_done: false,
        }
    }

    pub fn take_diags(&mut self) -> Vec<Diag> {
        std::mem::take(&mut self.diags)
    }

    #[inline]
    fn push_lex_diag(&mut self, kind: LexErrorKind, span: Range<usize>) {
        let span = Span::new(span.start, span.end);
        self.diags.push(LexError { kind, span }.diag());
    }

    #[inline]
    fn emit_semi_at(&mut self, pos: usize) {
        self.pending = Some((pos, Tok::Semi, pos));
    }

    /// Returns true when `raw` is trivia and has been consumed.
    #[inline]
    fn handle_trivia(&mut self, raw: RawTok, span: &Range<usize>, slice: &str) -> bool {
        match raw {
            RawTok::Newline => {
                if self.last_can_insert_semi {
                    self.last_can_insert_semi = false;
                    self.emit_semi_at(span.start);
                }
                true
            }
            RawTok::LineComment => true,
            RawTok::BlockComment => {
                if self.last_can_insert_semi {
                    if let Some(off) = memchr2(b'\n', b'\r', slice.as_bytes()) {
                        self.last_can_insert_semi = false;
                        self.emit_semi_at(span.start + off);
                    }
                }
                true
            }
            _ => false,
        }
    }

    #[inline]
    fn handle_eof(&mut self) {
        self.eof_done = true;
        if self.last_can_insert_semi {
            self.last_can_insert_semi = false;
            self.emit_semi_at(self.src_len);
        }
    }

    #[inline]
    fn error_token(&mut self, kind: LexErrorKind, span: Range<usize>) -> (usize, Tok<'src>, usize) {
        self.push_lex_diag(kind, span.clone());
        self.last_can_insert_semi = false;
        (span.start, Tok::Error, span.end)
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = (usize, Tok<'src>, usize);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(tok) = self.pending.take() {
                return Some(tok);
            }
            if self.eof_done {
                return None;
            }

            let raw = match self.logos.next() {
                None => {
                    // Do not return yet: a pending ';' may have been queued.
                    self.handle_eof();
                    continue;
                }
                Some(Err(kind)) => {
                    let span = self.logos.span();
                    return Some(self.error_token(kind, span));
                }
                Some(Ok(raw)) => raw,
            };

            let span = self.logos.span();
            let slice = self.logos.slice();

            if raw == RawTok::Bom {
                if span.start == 0 {
                    continue;
                }
                return Some(self.error_token(LexErrorKind::InvalidToken, span));
            }

            if self.handle_trivia(raw, &span, slice) {
                continue;
            }

            self.last_can_insert_semi = raw.can_insert_semicolon();
            return Some((span.start, raw.to_token(slice), span.end));
        }
    }
}
