//! Field and method lookup, and interface satisfaction.
//!
//! Lookup follows Go's selector rules: a breadth-first search through
//! embedded fields where the shallowest match wins and two matches at the
//! same depth are ambiguous.

use std::collections::HashSet;

use super::{Name, NamedId, ObjId, ObjKind, RecvForm, Term, TypeCtx, TypeKind, TypeRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Method declared on a named type.
    Method { obj: ObjId, indirect: bool },
    /// Method promoted from an embedded interface.
    InterfaceMethod { name: Name, sig: TypeRef },
    Field { typ: TypeRef, indirect: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    Found(Selection),
    NotFound,
    /// Several matches at the shallowest depth.
    Ambiguous,
    /// A pointer-receiver method reached through a non-addressable value.
    PointerReceiverRequired(ObjId),
}

#[derive(Debug, Clone, Copy)]
struct Embedded {
    typ: TypeRef,
    indirect: bool,
    /// Reached along more than one path at this depth.
    multiples: bool,
}

impl TypeCtx {
    /// Looks up field or method `name` on `recv`, or on `*recv` if `ptr`.
    pub fn lookup(&self, recv: TypeRef, ptr: bool, addressable: bool, name: Name) -> LookupResult {
        let (typ, indirect) = if ptr { (recv, true) } else { self.deref(recv) };
        // Pointers to interfaces have no methods.
        if indirect && self.is_interface(typ) {
            return LookupResult::NotFound;
        }

        let mut current = vec![Embedded {
            typ,
            indirect,
            multiples: false,
        }];
        let mut seen: HashSet<NamedId> = HashSet::new();

        while !current.is_empty() {
            let mut next = Vec::new();
            let mut found: Option<Selection> = None;
            let mut collision = false;

            for e in &current {
                let mut typ = e.typ;
                if let TypeKind::Named(named) = self.kind(typ) {
                    if !seen.insert(*named) {
                        continue;
                    }
                    if let Some(obj) = self.declared_method(*named, name) {
                        collision |= found.is_some() || e.multiples;
                        found = Some(Selection::Method {
                            obj,
                            indirect: e.indirect,
                        });
                        continue;
                    }
                    typ = self.named(*named).underlying;
                }

                match self.kind(typ) {
                    TypeKind::Struct(fields) => {
                        for f in fields {
                            if f.name == name {
                                collision |= found.is_some() || e.multiples;
                                found = Some(Selection::Field {
                                    typ: f.typ,
                                    indirect: e.indirect,
                                });
                                continue;
                            }
                            if found.is_none() && f.embedded {
                                let (typ, ptr) = self.deref(f.typ);
                                next.push(Embedded {
                                    typ,
                                    indirect: e.indirect || ptr,
                                    multiples: e.multiples,
                                });
                            }
                        }
                    }
                    TypeKind::Interface(_) => {
                        if let Some(m) = self.method_set(typ).get(name) {
                            collision |= found.is_some() || e.multiples;
                            found = Some(Selection::InterfaceMethod {
                                name: m.name,
                                sig: m.sig,
                            });
                        }
                    }
                    _ => {}
                }
            }

            if collision {
                return LookupResult::Ambiguous;
            }
            if let Some(sel) = found {
                if let Selection::Method { obj, indirect } = sel {
                    if !indirect && !addressable && self.recv_form(obj) == Some(RecvForm::Pointer) {
                        return LookupResult::PointerReceiverRequired(obj);
                    }
                }
                return LookupResult::Found(sel);
            }
            current = self.consolidate(next);
        }
        LookupResult::NotFound
    }

    fn declared_method(&self, named: NamedId, name: Name) -> Option<ObjId> {
        self.named(named).methods.iter().copied().find(|m| {
            let obj = self.object(*m);
            obj.name == name.sym && (name.pkg.is_none() || obj.pkg == name.pkg)
        })
    }

    fn recv_form(&self, method: ObjId) -> Option<RecvForm> {
        match self.object(method).kind {
            ObjKind::Method { form, .. } => Some(form),
            _ => None,
        }
    }

    /// Merges entries for identical types, marking them as reached twice.
    fn consolidate(&self, list: Vec<Embedded>) -> Vec<Embedded> {
        let mut out: Vec<Embedded> = Vec::with_capacity(list.len());
        for e in list {
            match out.iter_mut().find(|o| self.identical(o.typ, e.typ)) {
                Some(prev) => prev.multiples = true,
                None => out.push(e),
            }
        }
        out
    }

    /// First type of a package without sources that `recv` embeds, directly
    /// or through other embedded structs and interfaces.
    pub fn opaque_embedding(&self, recv: TypeRef) -> Option<TypeRef> {
        let mut stack = vec![self.deref(recv).0];
        let mut seen = HashSet::new();
        while let Some(typ) = stack.pop() {
            if !seen.insert(typ) {
                continue;
            }
            if self.is_opaque(typ) {
                return Some(typ);
            }
            match self.kind(self.underlying(typ)) {
                TypeKind::Struct(fields) => stack.extend(
                    fields
                        .iter()
                        .filter(|f| f.embedded)
                        .map(|f| self.deref(f.typ).0),
                ),
                TypeKind::Interface(_) => {
                    if let Some(&opaque) = self.method_set(typ).opaque.first() {
                        return Some(opaque);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// First method of interface `iface` that `recv` (or `*recv` if `ptr`)
    /// lacks or declares with a different signature.
    pub fn missing_method(&self, recv: TypeRef, ptr: bool, iface: TypeRef) -> Option<Name> {
        let wanted = self.method_set(iface);
        if !ptr && self.is_interface(recv) {
            let have = self.method_set(recv);
            return wanted
                .methods
                .iter()
                .find(|m| {
                    !have
                        .get(m.name)
                        .is_some_and(|h| self.identical(h.sig, m.sig))
                })
                .map(|m| m.name);
        }
        wanted
            .methods
            .iter()
            .find(|m| {
                let sig = match self.lookup(recv, ptr, false, m.name) {
                    LookupResult::Found(Selection::Method { obj, .. }) => self.object(obj).typ,
                    LookupResult::Found(Selection::InterfaceMethod { sig, .. }) => sig,
                    _ => return true,
                };
                !self.identical(sig, m.sig)
            })
            .map(|m| m.name)
    }

    /// Whether `recv` (or `*recv` if `ptr`) implements interface `iface`.
    pub fn implements(&self, recv: TypeRef, ptr: bool, iface: TypeRef) -> bool {
        if !self.is_interface(iface) || self.missing_method(recv, ptr, iface).is_some() {
            return false;
        }
        let set = self.method_set(iface);
        if set.unions.is_empty() && !set.comparable {
            return true;
        }
        // Constraint interfaces are not satisfied by interfaces here.
        if !ptr && self.is_interface(recv) {
            return false;
        }
        if set.comparable && !ptr && !self.is_comparable(recv) {
            return false;
        }
        set.unions
            .iter()
            .all(|union| union.iter().any(|term| self.in_term(recv, ptr, *term)))
    }

    fn in_term(&self, recv: TypeRef, ptr: bool, term: Term) -> bool {
        if !ptr {
            let typ = if term.tilde { self.underlying(recv) } else { recv };
            return self.identical(typ, term.typ);
        }
        // `*recv` is its own underlying type.
        match self.kind(term.typ) {
            TypeKind::Pointer(elem) => self.identical(*elem, recv),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixture::{check, Checked};

    fn name(c: &Checked, n: &str) -> Name {
        Name {
            sym: c.interner.get(n).expect("interned"),
            pkg: None,
        }
    }

    const SHAPES: &str = "package p\n\
        type Shape interface{ Area() float64; Perimeter() float64 }\n\
        type Square struct{ side float64 }\n\
        func (s Square) Area() float64 { return 0 }\n\
        func (s Square) Perimeter() float64 { return 0 }\n\
        type Circle struct{ r float64 }\n\
        func (c *Circle) Area() float64 { return 0 }\n\
        func (c *Circle) Perimeter() float64 { return 0 }\n\
        type Half struct{}\n\
        func (Half) Area() float64 { return 0 }\n\
        type Wrong struct{}\n\
        func (Wrong) Area() int { return 0 }\n\
        func (Wrong) Perimeter() float64 { return 0 }\n";

    #[test]
    fn value_and_pointer_forms() {
        let c = check(SHAPES).expect("checks");
        let shape = c.typ("Shape");
        let (square, circle) = (c.typ("Square"), c.typ("Circle"));
        assert!(c.tcx.implements(square, false, shape));
        assert!(c.tcx.implements(square, true, shape));
        assert!(!c.tcx.implements(circle, false, shape));
        assert!(c.tcx.implements(circle, true, shape));
        assert!(!c.tcx.implements(c.typ("Half"), true, shape));
        assert!(!c.tcx.implements(c.typ("Wrong"), false, shape));
        assert_eq!(
            c.tcx.missing_method(c.typ("Half"), false, shape),
            Some(name(&c, "Perimeter"))
        );
    }

    #[test]
    fn pointer_receivers_need_addressable_values() {
        let c = check(SHAPES).expect("checks");
        let circle = c.typ("Circle");
        let area = name(&c, "Area");
        assert!(matches!(
            c.tcx.lookup(circle, false, false, area),
            LookupResult::PointerReceiverRequired(_)
        ));
        assert!(matches!(
            c.tcx.lookup(circle, false, true, area),
            LookupResult::Found(Selection::Method { indirect: false, .. })
        ));
        assert!(matches!(
            c.tcx.lookup(circle, true, false, area),
            LookupResult::Found(Selection::Method { indirect: true, .. })
        ));
    }

    #[test]
    fn promotion_through_embedding() {
        let c = check(
            "package p\n\
             type Base struct{}\n\
             func (Base) Hello() string { return \"\" }\n\
             type Outer struct{ Base }\n\
             type Deeper struct{ *Outer }\n\
             type Left struct{}\n\
             func (Left) Hello() string { return \"\" }\n\
             type Both struct{ Base; Left }\n\
             type Shadow struct{ Both; Hello int }\n\
             type Iface interface{ Hello() string }\n\
             type Holder struct{ Iface }\n",
        )
        .expect("checks");
        let hello = name(&c, "Hello");
        let found_method = |t: &str| {
            matches!(
                c.tcx.lookup(c.typ(t), false, true, hello),
                LookupResult::Found(Selection::Method { .. })
            )
        };
        assert!(found_method("Outer"));
        assert!(found_method("Deeper"));
        assert_eq!(
            c.tcx.lookup(c.typ("Both"), false, true, hello),
            LookupResult::Ambiguous
        );
        assert!(matches!(
            c.tcx.lookup(c.typ("Shadow"), false, true, hello),
            LookupResult::Found(Selection::Field { .. })
        ));
        assert!(matches!(
            c.tcx.lookup(c.typ("Holder"), false, true, hello),
            LookupResult::Found(Selection::InterfaceMethod { .. })
        ));
        assert!(c.tcx.implements(c.typ("Holder"), false, c.typ("Iface")));
        assert!(!c.tcx.implements(c.typ("Both"), false, c.typ("Iface")));
    }

    #[test]
    fn type_sets_restrict_implementations() {
        let c = check(
            "package p\n\
             type Num interface{ ~int | ~float64 }\n\
             type MyInt int\n\
             type Str string\n\
             type Keyed interface{ comparable }\n\
             type Bag struct{ items []int }\n",
        )
        .expect("checks");
        let num = c.typ("Num");
        assert!(c.tcx.implements(c.typ("MyInt"), false, num));
        assert!(!c.tcx.implements(c.typ("Str"), false, num));
        assert!(!c.tcx.implements(c.typ("MyInt"), true, num));
        assert!(c.tcx.implements(c.typ("Str"), false, c.typ("Keyed")));
        assert!(!c.tcx.implements(c.typ("Bag"), false, c.typ("Keyed")));
    }
}
