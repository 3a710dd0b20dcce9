//! Integer constant folding over expression text.
//!
//! Only what array lengths and enumerations need: integer literals, named
//! constants, `iota`, conversions, `len` of a string literal and the integer
//! operators. Anything else folds to `None`.

use findimpls_parser::lexer::{Lexer, Tok};

/// Identifier resolution for [`eval`].
pub(crate) trait ConstEnv {
    /// Value of constant `name`, `None` if it is not an integer constant.
    fn value(&mut self, name: &str) -> Option<i128>;

    /// Whether `name(x)` is a conversion to an integer type.
    fn is_int_type(&mut self, name: &str) -> bool;

    /// Whether `name` denotes the predeclared `len`.
    fn is_len(&mut self, name: &str) -> bool;
}

pub(crate) fn eval(text: &str, env: &mut dyn ConstEnv) -> Option<i128> {
    let mut lexer = Lexer::new(text);
    let toks: Vec<Tok<'_>> = lexer.by_ref().map(|(_, t, _)| t).collect();
    if !lexer.take_diags().is_empty() {
        return None;
    }
    let mut folder = Folder { toks, pos: 0, env };
    let value = folder.binary(0)?;
    while folder.eat(&Tok::Semi) {}
    (folder.pos == folder.toks.len()).then_some(value)
}

/// Parses an integer literal: decimal, `0x`, `0o`, `0b`, legacy octal, `_` separators.
pub(crate) fn parse_int(lit: &str) -> Option<i128> {
    let digits: String = lit.chars().filter(|c| *c != '_').collect();
    let lower = digits.to_ascii_lowercase();
    let (radix, body) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };
    i128::from_str_radix(body, radix).ok()
}

struct Folder<'t, 'e> {
    toks: Vec<Tok<'t>>,
    pos: usize,
    env: &'e mut dyn ConstEnv,
}

impl<'t> Folder<'t, '_> {
    fn peek(&self) -> Option<&Tok<'t>> {
        self.toks.get(self.pos)
    }

    fn eat(&mut self, tok: &Tok<'_>) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn binary(&mut self, min_prec: u8) -> Option<i128> {
        let mut lhs = self.unary()?;
        while let Some(prec) = self.peek().and_then(precedence) {
            if prec < min_prec {
                break;
            }
            let op = self.toks[self.pos].clone();
            self.pos += 1;
            let rhs = self.binary(prec + 1)?;
            lhs = apply(&op, lhs, rhs)?;
        }
        Some(lhs)
    }

    fn unary(&mut self) -> Option<i128> {
        let tok = self.peek()?.clone();
        self.pos += 1;
        match tok {
            Tok::Plus => self.unary(),
            Tok::Minus => self.unary()?.checked_neg(),
            Tok::Caret => Some(!self.unary()?),
            Tok::IntLit(lit) => parse_int(lit),
            Tok::RuneLit(lit) => rune_value(lit),
            Tok::LParen => {
                let v = self.binary(0)?;
                self.eat(&Tok::RParen).then_some(v)
            }
            Tok::Ident(name) => {
                if self.eat(&Tok::LParen) {
                    if self.env.is_len(name) {
                        let len = match self.peek()? {
                            Tok::StringLit(lit) | Tok::RawStringLit(lit) => unquote(lit)?.len(),
                            _ => return None,
                        };
                        self.pos += 1;
                        return self.eat(&Tok::RParen).then_some(len as i128);
                    }
                    if !self.env.is_int_type(name) {
                        return None;
                    }
                    let v = self.binary(0)?;
                    self.eat(&Tok::Comma);
                    return self.eat(&Tok::RParen).then_some(v);
                }
                self.env.value(name)
            }
            _ => None,
        }
    }
}

fn precedence(tok: &Tok<'_>) -> Option<u8> {
    match tok {
        Tok::Star | Tok::Slash | Tok::Percent | Tok::Shl | Tok::Shr | Tok::Amp | Tok::AndNot => {
            Some(2)
        }
        Tok::Plus | Tok::Minus | Tok::Pipe | Tok::Caret => Some(1),
        _ => None,
    }
}

fn apply(op: &Tok<'_>, a: i128, b: i128) -> Option<i128> {
    match op {
        Tok::Star => a.checked_mul(b),
        Tok::Slash => a.checked_div(b),
        Tok::Percent => a.checked_rem(b),
        Tok::Shl => a.checked_shl(u32::try_from(b).ok()?),
        Tok::Shr => a.checked_shr(u32::try_from(b).ok()?),
        Tok::Amp => Some(a & b),
        Tok::AndNot => Some(a & !b),
        Tok::Plus => a.checked_add(b),
        Tok::Minus => a.checked_sub(b),
        Tok::Pipe => Some(a | b),
        Tok::Caret => Some(a ^ b),
        _ => None,
    }
}

/// Bytes of a string literal written with its quotes.
pub(crate) fn unquote(lit: &str) -> Option<Vec<u8>> {
    if let Some(raw) = lit.strip_prefix('`').and_then(|l| l.strip_suffix('`')) {
        return Some(raw.bytes().filter(|b| *b != b'\r').collect());
    }
    let inner = lit.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let esc = chars.next()?;
        let simple = match esc {
            'a' => Some(0x07),
            'b' => Some(0x08),
            'f' => Some(0x0c),
            'n' => Some(b'\n'),
            'r' => Some(b'\r'),
            't' => Some(b'\t'),
            'v' => Some(0x0b),
            '\\' => Some(b'\\'),
            '"' => Some(b'"'),
            _ => None,
        };
        if let Some(b) = simple {
            out.push(b);
            continue;
        }
        let (digits, radix) = match esc {
            '0'..='7' => (2, 8),
            'x' => (2, 16),
            'u' => (4, 16),
            'U' => (8, 16),
            _ => return None,
        };
        let mut text = String::new();
        if radix == 8 {
            text.push(esc);
        }
        for _ in 0..digits {
            text.push(chars.next()?);
        }
        let value = u32::from_str_radix(&text, radix).ok()?;
        if matches!(esc, 'u' | 'U') {
            let mut buf = [0; 4];
            out.extend_from_slice(char::from_u32(value)?.encode_utf8(&mut buf).as_bytes());
        } else {
            out.push(u8::try_from(value).ok()?);
        }
    }
    Some(out)
}

fn rune_value(lit: &str) -> Option<i128> {
    let inner = lit.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut chars = inner.chars();
    match (chars.next()?, chars.next()) {
        ('\\', Some(esc)) => match esc {
            'n' => Some('\n' as i128),
            't' => Some('\t' as i128),
            'r' => Some('\r' as i128),
            '0'..='7' => i128::from_str_radix(&inner[1..], 8).ok(),
            'x' | 'u' | 'U' => i128::from_str_radix(&inner[2..], 16).ok(),
            '\\' | '\'' => Some(esc as i128),
            _ => None,
        },
        (c, None) => Some(c as i128),
        _ => None,
    }
}
