use std::fmt::{self, Write as _};

use findimpls_parser::ast::{ChanDir, Interner};

use super::{ArrayLen, InterfaceType, Signature, TypeCtx, TypeKind, TypeRef};
use crate::program::{Package, PackageId};

/// Go spelling of a type, e.g. `*geo.Square` or `func(int) (string, error)`.
///
/// Named types of packages other than `relative_to` are qualified with the
/// package name.
#[derive(Clone, Copy)]
pub struct TypeDisplay<'a> {
    tcx: &'a TypeCtx,
    interner: &'a Interner,
    packages: &'a [Package],
    relative_to: Option<PackageId>,
    typ: TypeRef,
}

impl<'a> TypeDisplay<'a> {
    pub fn new(
        tcx: &'a TypeCtx,
        interner: &'a Interner,
        packages: &'a [Package],
        typ: TypeRef,
    ) -> Self {
        Self {
            tcx,
            interner,
            packages,
            relative_to: None,
            typ,
        }
    }

    pub fn relative_to(mut self, pkg: PackageId) -> Self {
        self.relative_to = Some(pkg);
        self
    }

    fn of(self, typ: TypeRef) -> Self {
        Self { typ, ..self }
    }

    fn list(self, f: &mut fmt::Formatter<'_>, types: &[TypeRef]) -> fmt::Result {
        for (i, t) in types.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", self.of(*t))?;
        }
        Ok(())
    }

    fn signature(self, f: &mut fmt::Formatter<'_>, sig: &Signature) -> fmt::Result {
        f.write_char('(')?;
        for (i, t) in sig.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let last = i + 1 == sig.params.len();
            match self.tcx.kind(*t) {
                TypeKind::Slice(elem) if last && sig.variadic => {
                    write!(f, "...{}", self.of(*elem))?
                }
                _ => write!(f, "{}", self.of(*t))?,
            }
        }
        f.write_char(')')?;
        match sig.results.as_slice() {
            [] => Ok(()),
            [one] => write!(f, " {}", self.of(*one)),
            many => {
                f.write_str(" (")?;
                self.list(f, many)?;
                f.write_char(')')
            }
        }
    }

    fn interface(self, f: &mut fmt::Formatter<'_>, iface: &InterfaceType) -> fmt::Result {
        f.write_str("interface{")?;
        let mut first = true;
        let mut sep = |f: &mut fmt::Formatter<'_>| {
            if !std::mem::take(&mut first) {
                f.write_str("; ")?;
            }
            Ok::<_, fmt::Error>(())
        };
        if iface.comparable {
            sep(f)?;
            f.write_str("comparable")?;
        }
        for m in &iface.methods {
            sep(f)?;
            f.write_str(self.interner.resolve(m.name.sym))?;
            if let Some(sig) = self.tcx.signature(m.sig) {
                self.signature(f, sig)?;
            }
        }
        for union in &iface.elems {
            sep(f)?;
            for (i, term) in union.iter().enumerate() {
                if i > 0 {
                    f.write_str(" | ")?;
                }
                if term.tilde {
                    f.write_char('~')?;
                }
                write!(f, "{}", self.of(term.typ))?;
            }
        }
        f.write_char('}')
    }

    fn qualified_name(self, f: &mut fmt::Formatter<'_>, obj: super::ObjId) -> fmt::Result {
        let obj = self.tcx.object(obj);
        if let Some(pkg) = obj.pkg.filter(|p| Some(*p) != self.relative_to) {
            if let Some(package) = self.packages.get(pkg.index()) {
                write!(f, "{}.", package.name)?;
            }
        }
        f.write_str(self.interner.resolve(obj.name))
    }
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tcx.kind(self.typ) {
            TypeKind::Invalid => f.write_str("invalid type"),
            TypeKind::Basic(kind) => f.write_str(kind.name()),
            TypeKind::Named(named) => self.qualified_name(f, self.tcx.named(*named).obj),
            TypeKind::Instance(named, args) => {
                self.qualified_name(f, self.tcx.named(*named).obj)?;
                f.write_char('[')?;
                self.list(f, args)?;
                f.write_char(']')
            }
            TypeKind::TypeParam(obj) => {
                f.write_str(self.interner.resolve(self.tcx.object(*obj).name))
            }
            TypeKind::Pointer(elem) => write!(f, "*{}", self.of(*elem)),
            TypeKind::Slice(elem) => write!(f, "[]{}", self.of(*elem)),
            TypeKind::Array(ArrayLen::Known(n), elem) => write!(f, "[{n}]{}", self.of(*elem)),
            TypeKind::Array(ArrayLen::Expr(e), elem) => write!(f, "[{e}]{}", self.of(*elem)),
            TypeKind::Map(key, val) => write!(f, "map[{}]{}", self.of(*key), self.of(*val)),
            TypeKind::Chan(dir, elem) => {
                let prefix = match dir {
                    ChanDir::Both => "chan ",
                    ChanDir::Send => "chan<- ",
                    ChanDir::Recv => "<-chan ",
                };
                write!(f, "{prefix}{}", self.of(*elem))
            }
            TypeKind::Func(sig) => {
                f.write_str("func")?;
                self.signature(f, sig)
            }
            TypeKind::Struct(fields) => {
                f.write_str("struct{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    if !field.embedded {
                        write!(f, "{} ", self.interner.resolve(field.name.sym))?;
                    }
                    write!(f, "{}", self.of(field.typ))?;
                    if let Some(tag) = &field.tag {
                        write!(f, " {tag:?}")?;
                    }
                }
                f.write_char('}')
            }
            TypeKind::Interface(iface) => self.interface(f, iface),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixture::{check, Checked};

    fn show(c: &Checked, typ: TypeRef) -> String {
        TypeDisplay::new(&c.tcx, &c.interner, &[], typ).to_string()
    }

    fn underlying(c: &Checked, name: &str) -> String {
        show(c, c.tcx.underlying(c.typ(name)))
    }

    #[test]
    fn spells_types_like_go() {
        let mut c = check(
            "package p\n\
             type T struct{ a int; B []string `json:\"b\"`; *T }\n\
             type F func(x, y int, rest ...string) (int, error)\n\
             type C <-chan map[string][4]byte\n\
             type I interface{ M(int) bool; ~int | string }\n\
             type L[E any] struct{ next *L[E] }\n",
        )
        .expect("checks");
        let t = c.typ("T");
        let ptr = c.tcx.pointer(t);
        assert_eq!(show(&c, t), "T");
        assert_eq!(show(&c, ptr), "*T");
        assert_eq!(underlying(&c, "T"), "struct{a int; B []string \"json:\\\"b\\\"\"; *T}");
        assert_eq!(underlying(&c, "F"), "func(int, int, ...string) (int, error)");
        assert_eq!(underlying(&c, "C"), "<-chan map[string][4]uint8");
        assert_eq!(underlying(&c, "I"), "interface{M(int) bool; ~int | string}");
        assert_eq!(underlying(&c, "L"), "struct{next *L[E]}");
    }
}
