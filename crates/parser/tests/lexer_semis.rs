use findimpls_parser::lexer::{Lexer, Tok};

/// Token stream rendered compactly: `;` for explicit, `;*` for inserted semicolons.
fn render(input: &str) -> String {
    Lexer::new(input)
        .map(|(s, t, e)| match t {
            Tok::Semi if s == e => ";*".to_string(),
            Tok::Semi => ";".to_string(),
            Tok::Ident(x) => x.to_string(),
            Tok::IntLit(x) | Tok::FloatLit(x) | Tok::ImagLit(x) => x.to_string(),
            Tok::RuneLit(_) => "CHAR".to_string(),
            Tok::StringLit(_) | Tok::RawStringLit(_) => "STRING".to_string(),
            Tok::LParen => "(".to_string(),
            Tok::RParen => ")".to_string(),
            Tok::LBrack => "[".to_string(),
            Tok::RBrack => "]".to_string(),
            Tok::LBrace => "{".to_string(),
            Tok::RBrace => "}".to_string(),
            other => format!("{other:?}"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[rustfmt::skip]
const CASES: &[(&str, &str)] = &[
    ("", ""),
    ("\u{FEFF};", ";"),
    ("foo\n", "foo ;*"),
    ("123\n", "123 ;*"),
    ("1.2\n", "1.2 ;*"),
    ("'x'\n", "CHAR ;*"),
    ("\"x\"\n", "STRING ;*"),
    ("`x`\n", "STRING ;*"),
    ("x++\n", "x Inc ;*"),
    ("return\n", "KwReturn ;*"),
    ("break\ncontinue\n", "KwBreak ;* KwContinue ;*"),
    ("f()\n", "f ( ) ;*"),
    ("a[0]\n", "a [ 0 ] ;*"),
    ("}\n", "} ;*"),

    // No insertion after operators, openers and other keywords.
    ("+\n", "Plus"),
    ("a ||\nb\n", "a LOr b ;*"),
    ("(\n", "("),
    ("func\n", "KwFunc"),
    ("struct {\n}\n", "KwStruct { } ;*"),

    // Comments
    ("foo // trailing\n", "foo ;*"),
    ("foo /* one line */\n", "foo ;*"),
    ("foo /* spans\nlines */ bar\n", "foo ;* bar ;*"),
    ("foo /* no newline */ bar", "foo bar ;*"),
    ("foo // at eof", "foo ;*"),

    // End of input
    ("foo", "foo ;*"),
    ("foo;", "foo ;"),
    ("x\r\ny\r\n", "x ;* y ;*"),
];

#[test]
fn semicolon_insertion_table() {
    for (input, want) in CASES {
        let got = render(input);
        assert_eq!(&got, want, "input=<<{input:?}>>");
    }
}

#[test]
fn inserted_semicolon_sits_at_the_line_break() {
    let src = "package p\ntype T int\n";
    let semis: Vec<usize> = Lexer::new(src)
        .filter(|(s, t, e)| matches!(t, Tok::Semi) && s == e)
        .map(|(s, _, _)| s)
        .collect();
    assert_eq!(semis, vec![9, 20]);
}
