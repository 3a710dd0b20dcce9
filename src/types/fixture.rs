//! Single-file type checking for unit tests.

use std::path::PathBuf;

use findimpls_parser::ast::Interner;
use findimpls_parser::parse_source;
use indexmap::IndexMap;

use super::check::{CheckError, Checker};
use super::{ObjKind, Object, PackageInfo, RecvForm, TypeCtx, TypeRef};
use crate::program::{FileId, GoFile, PackageId};

pub(crate) struct Checked {
    pub tcx: TypeCtx,
    pub interner: Interner,
    pub info: PackageInfo,
}

impl Checked {
    pub fn obj(&self, name: &str) -> &Object {
        let sym = self.interner.get(name).expect("interned");
        self.tcx.object(self.info.scope[&sym])
    }

    pub fn typ(&self, name: &str) -> TypeRef {
        self.obj(name).typ
    }

    pub fn methods_of(&self, name: &str) -> Vec<(&str, RecvForm)> {
        let named = self.tcx.as_named(self.typ(name)).expect("named");
        self.tcx
            .named(named)
            .methods
            .iter()
            .map(|m| {
                let obj = self.tcx.object(*m);
                let ObjKind::Method { form, .. } = obj.kind else {
                    panic!("not a method")
                };
                (self.interner.resolve(obj.name), form)
            })
            .collect()
    }
}

pub(crate) fn check(src: &str) -> Result<Checked, CheckError> {
    let mut interner = Interner::new();
    let mut tcx = TypeCtx::new(&mut interner);
    let syntax = parse_source(src, &mut interner).expect("parses");
    let pkg = PackageId(0);
    let files = vec![GoFile::new(PathBuf::from("a.go"), pkg, src.to_string(), syntax)];
    let imports = IndexMap::new();
    let file_ids = [FileId(0)];
    let info = Checker::new(&mut tcx, &interner, &[], &files, pkg, &file_ids, &imports).check()?;
    Ok(Checked {
        tcx,
        interner,
        info,
    })
}

pub(crate) fn check_err(src: &str) -> String {
    match check(src) {
        Ok(_) => panic!("expected an error"),
        Err(err) => err.message,
    }
}
