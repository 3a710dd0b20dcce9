//! Declaration-level Go front end.
//!
//! - Lexer uses Logos and implements Go semicolon insertion.
//! - Parser is recursive descent over the token stream; function bodies and
//!   initializers are skipped, not parsed.
//! - Nodes live in an arena owned by each [`ParsedFile`]; identifier text is
//!   interned in a caller-supplied [`Interner`] shared across files.

pub mod ast;
pub mod error;
pub mod lexer;
mod parser;
mod parser_support;
pub mod walk;

// Re-exports for convenience
pub use ast::{AstArena, Interner, SourceFile, Span, Symbol};
pub use error::{Diag, DiagKind, ParseFailure};
pub use lexer::Lexer;

/// Syntax tree of one source file.
#[derive(Debug)]
pub struct ParsedFile {
    pub arena: AstArena,
    pub file: SourceFile,
}

/// Parses one Go source file.
///
/// Fails when the lexer reported any diagnostic (even inside a skipped body)
/// or when the parser hit a syntax error. There is no error recovery.
pub fn parse_source(src: &str, interner: &mut Interner) -> Result<ParsedFile, ParseFailure> {
    let mut lexer = Lexer::new(src);
    let toks: Vec<_> = lexer.by_ref().collect();
    let mut diags = lexer.take_diags();

    let mut parser = parser::Parser::new(src.len(), toks, interner);
    match parser.parse_file() {
        Ok(file) if diags.is_empty() => Ok(ParsedFile {
            arena: parser.into_arena(),
            file,
        }),
        Ok(_) => Err(ParseFailure { diags }),
        Err(diag) => {
            diags.push(diag);
            Err(ParseFailure { diags })
        }
    }
}
