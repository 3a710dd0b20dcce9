//! Loader failures and file selection.

mod common;

use common::{shapes_module, GoModule};
use findimpls::{load, resolve, LoadConfig, LoadError, ResolveError};
use tempfile::TempDir;

const SHAPES: &str = "example.com/geo/shapes";

#[test]
fn rejects_empty_patterns_and_missing_module() {
    let module = shapes_module();
    let none: &[&str] = &[];
    assert!(matches!(load(none, &module.config()), Err(LoadError::EmptyPatterns)));

    let bare = TempDir::new().unwrap();
    let err = load(&["./..."], &LoadConfig::new(bare.path())).unwrap_err();
    assert!(matches!(err, LoadError::NoModule { .. }));

    let broken = GoModule::new();
    std::fs::write(broken.root().join("go.mod"), "go 1.22\n").unwrap();
    let err = load(&["./..."], &broken.config()).unwrap_err();
    assert!(matches!(err, LoadError::InvalidGoMod { .. }));
}

#[test]
fn patterns_must_match_packages() {
    let module = shapes_module().dir("docs");
    assert!(matches!(
        load(&["./docs/..."], &module.config()),
        Err(LoadError::NoMatch { .. })
    ));
    assert!(matches!(
        load(&["./missing"], &module.config()),
        Err(LoadError::PackageNotFound { .. })
    ));
    let err = load(&["./docs"], &module.config()).unwrap_err();
    assert!(matches!(err, LoadError::NoGoFiles { ref package, .. } if package == "example.com/geo/docs"));
}

#[test]
fn unresolvable_imports_name_the_importer() {
    let module = GoModule::new().file(
        "shapes/shapes.go",
        "package shapes\n\nimport \"example.org/missing/pkg\"\n\ntype T struct{ p pkg.P }\n",
    );
    let err = load(&["./shapes"], &module.config()).unwrap_err();
    match err {
        LoadError::ImportNotFound { importer, path } => {
            assert_eq!(importer, SHAPES);
            assert_eq!(path, "example.org/missing/pkg");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn import_cycles_are_reported() {
    let module = GoModule::new()
        .file("a/a.go", "package a\n\nimport \"example.com/geo/b\"\n\ntype A struct{ b b.B }\n")
        .file("b/b.go", "package b\n\nimport \"example.com/geo/a\"\n\ntype B struct{ a *a.A }\n");
    let err = load(&["./a"], &module.config()).unwrap_err();
    match err {
        LoadError::ImportCycle { cycle } => assert_eq!(
            cycle,
            vec!["example.com/geo/a", "example.com/geo/b", "example.com/geo/a"]
        ),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn standard_library_without_sources_is_opaque() {
    let module = GoModule::new()
        .file(
            "geo/geo.go",
            "package geo\n\ntype Stringer interface{ String() string }\n",
        )
        .file(
            "shapes/shapes.go",
            "package shapes\n\
             \n\
             import (\n\
             \t\"fmt\"\n\
             \t\"io\"\n\
             )\n\
             \n\
             type Printer struct{ w io.Writer }\n\
             \n\
             func (p Printer) String() string { return fmt.Sprint(p.w) }\n\
             \n\
             type Writer struct{ io.Writer }\n\
             \n\
             func (Writer) String() string { return \"w\" }\n",
        );
    let program = load(&["./geo", "./shapes"], &module.config()).unwrap();
    let fmt = program.package_by_path("fmt").unwrap();
    assert!(fmt.opaque);
    assert_eq!(fmt.name, "fmt");
    assert!(program.package_by_path("io").unwrap().files.is_empty());

    let result = resolve(&program, "example.com/geo/geo", "Stringer", &["String"]).unwrap();
    assert_eq!(result.by_path(SHAPES).unwrap().len(), 2);

    let err = resolve(&program, "fmt", "Stringer", &["String"]).unwrap_err();
    assert!(matches!(err, ResolveError::InterfaceNotFound { .. }));
}

#[test]
fn mixed_package_names_are_rejected() {
    let module = GoModule::new()
        .file("shapes/a.go", "package shapes\n")
        .file("shapes/b.go", "package figures\n");
    let err = load(&["./shapes"], &module.config()).unwrap_err();
    match err {
        LoadError::MixedPackages { first, second, .. } => {
            assert_eq!(first, "shapes");
            assert_eq!(second, "figures");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn syntax_errors_carry_a_position() {
    let module = GoModule::new().file("shapes/bad.go", "package shapes\n\nfunc (] Area() {}\n");
    let err = load(&["./shapes"], &module.config()).unwrap_err();
    match &err {
        LoadError::Parse { package, position, .. } => {
            assert_eq!(package, SHAPES);
            assert!(position.contains("shapes/bad.go:3:"), "{position}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().starts_with("package example.com/geo/shapes: "));
}

#[test]
fn type_errors_carry_a_position() {
    let module = GoModule::new().file(
        "shapes/bad.go",
        "package shapes\n\ntype T struct{ x Missing }\n",
    );
    let err = load(&["./shapes"], &module.config()).unwrap_err();
    match err {
        LoadError::TypeCheck {
            package,
            position,
            message,
        } => {
            assert_eq!(package, SHAPES);
            assert!(position.ends_with("shapes/bad.go:3:18"), "{position}");
            assert_eq!(message, "undefined: Missing");
        }
        other => panic!("unexpected error: {other}"),
    }

    let module = GoModule::new().file(
        "shapes/bad.go",
        "package shapes\n\ntype A B\ntype B A\n",
    );
    let err = load(&["./shapes"], &module.config()).unwrap_err();
    assert!(err.to_string().contains("invalid recursive type"), "{err}");
}

#[test]
fn test_files_are_opt_in() {
    let module = shapes_module()
        .file(
            "shapes/shapes_test.go",
            "package shapes\n\ntype fake struct{}\n\nfunc (fake) Area() float64 { return 0 }\n",
        )
        .file(
            "shapes/api_test.go",
            "package shapes_test\n\ntype External struct{}\n\nfunc (External) Area() float64 { return 0 }\n",
        );

    let program = load(&["./shapes"], &module.config()).unwrap();
    let result = resolve(&program, "example.com/geo/geo", "Shape", &["Area"]).unwrap();
    assert_eq!(result.by_path(SHAPES).unwrap().len(), 2);

    let program = load(&["./shapes"], &module.config().with_tests(true)).unwrap();
    let result = resolve(&program, "example.com/geo/geo", "Shape", &["Area"]).unwrap();
    assert_eq!(result.by_path(SHAPES).unwrap().len(), 3);
    assert_eq!(program.package_by_path(SHAPES).unwrap().files.len(), 2);
}

#[test]
fn release_tags_follow_the_go_directive() {
    let module = shapes_module()
        .file(
            "shapes/old.go",
            "//go:build go1.21\n\npackage shapes\n\ntype Old struct{}\n\nfunc (Old) Area() float64 { return 0 }\n",
        )
        .file(
            "shapes/new.go",
            "//go:build go1.23\n\npackage shapes\n\ntype New struct{}\n\nfunc (New) Area() float64 { return 0 }\n",
        );
    let program = load(&["./shapes"], &module.config()).unwrap();
    assert!(program.package_by_path(SHAPES).is_some());
    let shapes = program.package_by_path(SHAPES).unwrap();
    assert!(program.scope_lookup(shapes.id, "Old").is_some());
    assert!(program.scope_lookup(shapes.id, "New").is_none());
}
