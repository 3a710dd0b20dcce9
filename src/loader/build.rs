//! File selection: file name suffixes and `//go:build` constraints.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Latest Go release whose `go1.N` tags are satisfied by default.
pub const LATEST_GO_MINOR: u32 = 25;

const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

/// Target of a build: which files belong to a package.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub goos: String,
    pub goarch: String,
    pub tags: HashSet<String>,
    pub go_minor: u32,
    pub tests: bool,
}

impl BuildContext {
    /// Whether build tag `tag` is satisfied.
    pub fn match_tag(&self, tag: &str) -> bool {
        if tag == self.goos || tag == self.goarch || tag == "gc" || self.tags.contains(tag) {
            return true;
        }
        match (self.goos.as_str(), tag) {
            ("android", "linux") | ("illumos", "solaris") | ("ios", "darwin") => return true,
            (goos, "unix") => return UNIX_OS.contains(&goos),
            _ => {}
        }
        tag.strip_prefix("go1.")
            .and_then(|minor| minor.parse::<u32>().ok())
            .is_some_and(|minor| minor <= self.go_minor)
    }

    /// Name-based selection: extension, ignored prefixes, test files and
    /// `_GOOS`/`_GOARCH` suffixes.
    pub fn match_file_name(&self, name: &str) -> bool {
        let Some(stem) = name.strip_suffix(".go") else {
            return false;
        };
        if name.starts_with('.') || name.starts_with('_') {
            return false;
        }
        let stem = match stem.strip_suffix("_test") {
            Some(_) if !self.tests => return false,
            Some(s) => s,
            None => stem,
        };
        // The first element never constrains: `linux.go` builds everywhere.
        let Some((_, rest)) = stem.split_once('_') else {
            return true;
        };
        let parts: Vec<&str> = rest.split('_').collect();
        let n = parts.len();
        let is_os = |s: &str| KNOWN_OS.contains(&s);
        let is_arch = |s: &str| KNOWN_ARCH.contains(&s);
        if n >= 2 && is_os(parts[n - 2]) && is_arch(parts[n - 1]) {
            return self.match_tag(parts[n - 2]) && self.match_tag(parts[n - 1]);
        }
        if is_os(parts[n - 1]) || is_arch(parts[n - 1]) {
            return self.match_tag(parts[n - 1]);
        }
        true
    }

    /// Whether the build constraints in the header of `src` are satisfied.
    pub fn match_constraints(&self, src: &str) -> Result<bool, String> {
        let header = Header::scan(src);
        if let Some(line) = header.go_build {
            let expr = Constraint::parse(line)?;
            return Ok(expr.eval(&|tag| self.match_tag(tag)));
        }
        Ok(header
            .plus_build
            .iter()
            .all(|line| plus_build_line(line, &|tag| self.match_tag(tag))))
    }
}

/// Selected source files of `dir` as `(path, source)`, sorted by name.
pub fn select_files(dir: &Path, ctx: &BuildContext) -> io::Result<Vec<(PathBuf, String)>> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| ctx.match_file_name(name))
        .collect();
    names.sort();

    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let path = dir.join(&name);
        let src = fs::read_to_string(&path)?;
        match ctx.match_constraints(&src) {
            Ok(true) => out.push((path, src)),
            Ok(false) => tracing::trace!(file = %path.display(), "excluded by build constraint"),
            Err(message) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid //go:build line: {message}"),
                ))
            }
        }
    }
    Ok(out)
}

/// Constraint lines found before the package clause.
#[derive(Debug, Default)]
struct Header<'a> {
    go_build: Option<&'a str>,
    plus_build: Vec<&'a str>,
}

impl<'a> Header<'a> {
    fn scan(src: &'a str) -> Self {
        let mut header = Header::default();
        let mut in_block = false;
        for line in src.lines() {
            let line = line.trim();
            if in_block {
                if let Some(i) = line.find("*/") {
                    in_block = false;
                    if !line[i + 2..].trim().is_empty() {
                        break;
                    }
                }
                continue;
            }
            if line.is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix("//") {
                if let Some(expr) = comment.strip_prefix("go:build") {
                    if expr.starts_with([' ', '\t']) || expr.is_empty() {
                        header.go_build.get_or_insert(expr.trim());
                    }
                } else if let Some(expr) = comment.trim_start().strip_prefix("+build") {
                    header.plus_build.push(expr.trim());
                }
                continue;
            }
            if let Some(rest) = line.strip_prefix("/*") {
                in_block = !rest.contains("*/");
                continue;
            }
            break;
        }
        header
    }
}

/// `// +build a,b !c`: space-separated options, comma-separated conjunctions.
fn plus_build_line(line: &str, ok: &dyn Fn(&str) -> bool) -> bool {
    line.split_whitespace().any(|option| {
        option.split(',').all(|term| match term.strip_prefix('!') {
            Some(tag) => !ok(tag),
            None => ok(term),
        })
    })
}

/// Parsed `//go:build` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Tag(String),
    Not(Box<Constraint>),
    And(Box<Constraint>, Box<Constraint>),
    Or(Box<Constraint>, Box<Constraint>),
}

impl Constraint {
    pub fn parse(src: &str) -> Result<Self, String> {
        let mut p = ConstraintParser { src, pos: 0 };
        let expr = p.or()?;
        p.skip_ws();
        if p.pos != src.len() {
            return Err(format!("unexpected {:?}", &src[p.pos..]));
        }
        Ok(expr)
    }

    pub fn eval(&self, ok: &dyn Fn(&str) -> bool) -> bool {
        match self {
            Constraint::Tag(tag) => ok(tag),
            Constraint::Not(x) => !x.eval(ok),
            Constraint::And(a, b) => a.eval(ok) && b.eval(ok),
            Constraint::Or(a, b) => a.eval(ok) || b.eval(ok),
        }
    }
}

struct ConstraintParser<'a> {
    src: &'a str,
    pos: usize,
}

impl ConstraintParser<'_> {
    fn skip_ws(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, op: &str) -> bool {
        self.skip_ws();
        if self.src[self.pos..].starts_with(op) {
            self.pos += op.len();
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Result<Constraint, String> {
        let mut lhs = self.and()?;
        while self.eat("||") {
            lhs = Constraint::Or(Box::new(lhs), Box::new(self.and()?));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Constraint, String> {
        let mut lhs = self.not()?;
        while self.eat("&&") {
            lhs = Constraint::And(Box::new(lhs), Box::new(self.not()?));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Constraint, String> {
        if self.eat("!") {
            return Ok(Constraint::Not(Box::new(self.not()?)));
        }
        if self.eat("(") {
            let inner = self.or()?;
            if !self.eat(")") {
                return Err("missing )".to_string());
            }
            return Ok(inner);
        }
        self.skip_ws();
        let rest = &self.src[self.pos..];
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(match rest.chars().next() {
                Some(c) => format!("unexpected {c:?}"),
                None => "unexpected end of expression".to_string(),
            });
        }
        self.pos += len;
        Ok(Constraint::Tag(rest[..len].to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ctx(goos: &str, goarch: &str) -> BuildContext {
        BuildContext {
            goos: goos.to_string(),
            goarch: goarch.to_string(),
            tags: HashSet::from(["integration".to_string()]),
            go_minor: 21,
            tests: false,
        }
    }

    #[test]
    fn file_name_suffixes() {
        let linux = ctx("linux", "amd64");
        assert!(linux.match_file_name("shape.go"));
        assert!(linux.match_file_name("linux.go"));
        assert!(linux.match_file_name("shape_linux.go"));
        assert!(linux.match_file_name("shape_linux_amd64.go"));
        assert!(linux.match_file_name("shape_amd64.go"));
        assert!(!linux.match_file_name("shape_windows.go"));
        assert!(!linux.match_file_name("shape_linux_arm64.go"));
        assert!(!linux.match_file_name("shape_test.go"));
        assert!(!linux.match_file_name("_shape.go"));
        assert!(!linux.match_file_name(".shape.go"));
        assert!(!linux.match_file_name("shape.c"));
        assert!(linux.match_file_name("shape_unknown.go"));

        let android = ctx("android", "arm64");
        assert!(android.match_file_name("x_linux.go"));

        let mut tests = ctx("linux", "amd64");
        tests.tests = true;
        assert!(tests.match_file_name("shape_test.go"));
        assert!(!tests.match_file_name("shape_windows_test.go"));
    }

    #[test]
    fn tags() {
        let c = ctx("darwin", "arm64");
        assert!(c.match_tag("darwin"));
        assert!(c.match_tag("unix"));
        assert!(c.match_tag("gc"));
        assert!(c.match_tag("go1.21"));
        assert!(!c.match_tag("go1.22"));
        assert!(c.match_tag("integration"));
        assert!(!c.match_tag("ignore"));
        assert!(!ctx("windows", "amd64").match_tag("unix"));
        assert!(ctx("ios", "arm64").match_tag("darwin"));
    }

    #[test]
    fn header_constraints() {
        let c = ctx("linux", "amd64");
        let yes = "// Copyright\n\n//go:build linux && (amd64 || arm64)\n\npackage p\n";
        let no = "//go:build !linux\n\npackage p\n";
        let ignored = "//go:build ignore\npackage main\n";
        let late = "package p\n\n//go:build windows\n";
        let plus = "// +build windows linux,amd64\n\npackage p\n";
        let block = "/* license\n   text */\n//go:build windows\npackage p\n";
        assert_eq!(c.match_constraints(yes), Ok(true));
        assert_eq!(c.match_constraints(no), Ok(false));
        assert_eq!(c.match_constraints(ignored), Ok(false));
        assert_eq!(c.match_constraints(late), Ok(true));
        assert_eq!(c.match_constraints(plus), Ok(true));
        assert_eq!(c.match_constraints(block), Ok(false));
        assert!(c.match_constraints("//go:build linux &&\npackage p\n").is_err());
    }

    #[test]
    fn parses_with_precedence() {
        let e = Constraint::parse("a || b && !c").expect("parses");
        let tag = |t: &str| Box::new(Constraint::Tag(t.to_string()));
        assert_eq!(
            e,
            Constraint::Or(
                tag("a"),
                Box::new(Constraint::And(tag("b"), Box::new(Constraint::Not(tag("c")))))
            )
        );
        assert!(Constraint::parse("(a").is_err());
        assert!(Constraint::parse("a b").is_err());
    }

    fn arb_constraint() -> impl Strategy<Value = Constraint> {
        let leaf = prop::sample::select(vec!["linux", "amd64", "windows", "cgo", "go1.20"])
            .prop_map(|t| Constraint::Tag(t.to_string()));
        leaf.prop_recursive(4, 32, 2, |inner| {
            prop_oneof![
                inner.clone().prop_map(|x| Constraint::Not(Box::new(x))),
                (inner.clone(), inner.clone())
                    .prop_map(|(a, b)| Constraint::And(Box::new(a), Box::new(b))),
                (inner.clone(), inner).prop_map(|(a, b)| Constraint::Or(Box::new(a), Box::new(b))),
            ]
        })
    }

    /// Fully parenthesized rendering.
    fn render(e: &Constraint) -> String {
        match e {
            Constraint::Tag(t) => t.clone(),
            Constraint::Not(x) => format!("!({})", render(x)),
            Constraint::And(a, b) => format!("({}) && ({})", render(a), render(b)),
            Constraint::Or(a, b) => format!("({}) || ({})", render(a), render(b)),
        }
    }

    fn reference(e: &Constraint, truth: &HashSet<&str>) -> bool {
        match e {
            Constraint::Tag(t) => truth.contains(t.as_str()),
            Constraint::Not(x) => !reference(x, truth),
            Constraint::And(a, b) => reference(a, truth) && reference(b, truth),
            Constraint::Or(a, b) => reference(a, truth) || reference(b, truth),
        }
    }

    proptest! {
        #[test]
        fn evaluation_matches_reference(e in arb_constraint()) {
            let c = ctx("linux", "amd64");
            let truth: HashSet<&str> = ["linux", "amd64", "go1.20"].into_iter().collect();
            let parsed = Constraint::parse(&render(&e)).expect("rendered expression parses");
            prop_assert_eq!(parsed.eval(&|t| c.match_tag(t)), reference(&e, &truth));
        }
    }
}
