#![no_main]

use findimpls_parser::ast::Interner;
use findimpls_parser::lexer::{Lexer, Tok};
use findimpls_parser::parse_source;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let s = String::from_utf8_lossy(data);

    // Tokens stay in bounds and in order; injected semicolons are empty.
    let mut last_end = 0usize;
    for (start, tok, end) in Lexer::new(&s) {
        assert!(start <= end && end <= s.len());
        if matches!(tok, Tok::Semi) && start == end {
            assert!(start >= last_end);
        } else {
            assert!(start >= last_end);
            last_end = end;
        }
    }

    let mut interner = Interner::new();
    match parse_source(&s, &mut interner) {
        Ok(parsed) => {
            for (_, func) in parsed.arena.func_decls(&parsed.file) {
                if let Some(body) = func.body {
                    assert!(body.l_brace.start < body.r_brace.end);
                    assert_eq!(&s[body.l_brace.start as usize..body.l_brace.end as usize], "{");
                }
            }
        }
        Err(failure) => assert!(!failure.diags.is_empty()),
    }
});
