use thiserror::Error;

use crate::ast::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagKind {
    Lex,
    Parse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diag {
    pub kind: DiagKind,
    pub span: Span,
    pub message: String,
}

impl Diag {
    #[inline]
    pub fn parse(span: Span, message: impl Into<String>) -> Self {
        Self {
            kind: DiagKind::Parse,
            span,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            DiagKind::Lex => "lex",
            DiagKind::Parse => "parse",
        };
        write!(
            f,
            "{kind} error at {}..{}: {}",
            self.span.start, self.span.end, self.message
        )
    }
}

/// A source file that could not be turned into a syntax tree.
///
/// Carries every lexical diagnostic plus the syntax error that stopped the parser.
#[derive(Debug, Clone, Error)]
#[error("failed to parse source ({} diagnostics)", diags.len())]
pub struct ParseFailure {
    pub diags: Vec<Diag>,
}

impl ParseFailure {
    /// The first diagnostic in source order.
    pub fn first(&self) -> Option<&Diag> {
        self.diags.iter().min_by_key(|d| d.span.start)
    }
}

#[derive(Debug, Error, Clone, Default, PartialEq, Eq)]
pub enum LexErrorKind {
    #[default]
    #[error("invalid token")]
    InvalidToken,
    #[error("unterminated raw string")]
    UnterminatedRawString,
    #[error("unterminated comment")]
    UnterminatedComment,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}: {span:?}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

impl LexError {
    #[inline]
    pub fn diag(&self) -> Diag {
        Diag {
            kind: DiagKind::Lex,
            span: self.span,
            message: self.kind.to_string(),
        }
    }
}
