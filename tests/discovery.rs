//! End-to-end discovery over fixture modules.

mod common;

use common::{entries, shapes_module, triple, GoModule};
use findimpls::{
    find, load, resolve, CancelToken, ConformanceResult, FindError, ImplForm, LoadError,
    LoadMode, Program, Query, ResolveError,
};
use tempfile::TempDir;

const GEO: &str = "example.com/geo/geo";
const SHAPES: &str = "example.com/geo/shapes";

const NO_METHODS: &[&str] = &[];

#[test]
fn shape_scenario() {
    let module = shapes_module();
    let program = load(&["./geo", "./shapes"], &module.config()).unwrap();
    let result = resolve(&program, GEO, "Shape", &["Area"]).unwrap();

    assert_eq!(result.packages.len(), 2);
    assert!(result.by_path(GEO).unwrap().is_empty());
    assert_eq!(
        entries(&program, &result, SHAPES),
        vec![
            triple("*Square", "Area", "(s *Square)"),
            triple("Circle", "Area", "(c Circle)"),
        ]
    );

    let shapes = result.by_path(SHAPES).unwrap();
    let (circle, methods) = shapes.impls.first().unwrap();
    assert_eq!(circle.form, ImplForm::Value);
    let decl = program.method_decl(methods["Area"]);
    assert_eq!(decl.position.line, 7);
    assert_eq!(decl.position.column, 1);
    assert!(decl.position.path.ends_with("shapes/shapes.go"));
    assert_eq!(decl.params, "()");
    assert!(decl.text.starts_with("func (c Circle) Area() float64 {"));
    assert!(decl.text.ends_with('}'));
}

#[test]
fn value_form_wins_and_interfaces_are_not_candidates() {
    let module = shapes_module();
    let program = load(&["./..."], &module.config()).unwrap();
    let result = resolve(&program, GEO, "Shape", NO_METHODS).unwrap();

    let shapes = result.by_path(SHAPES).unwrap();
    let names: Vec<String> = shapes
        .impls
        .keys()
        .map(|t| t.display(&program, shapes.package))
        .collect();
    assert_eq!(names, vec!["Circle", "*Square"]);
    assert!(shapes.impls.values().all(|methods| methods.is_empty()));
    assert_eq!(
        shapes.impls.keys().map(|t| t.form).collect::<Vec<_>>(),
        vec![ImplForm::Value, ImplForm::Pointer]
    );
}

#[test]
fn missing_method_fails_the_whole_resolution() {
    let module = shapes_module();
    let program = load(&["./geo", "./shapes"], &module.config()).unwrap();

    let err = resolve(&program, GEO, "Shape", &["Area", "Perimeter"]).unwrap_err();
    assert_eq!(
        err,
        ResolveError::MethodNotFound {
            package: SHAPES.to_string(),
            type_name: "Circle".to_string(),
            method: "Perimeter".to_string(),
        }
    );

    // `Name` is declared by an interface of the package, not by Circle.
    let err = resolve(&program, GEO, "Shape", &["Name"]).unwrap_err();
    assert!(matches!(err, ResolveError::MethodNotFound { ref method, .. } if method == "Name"));
}

#[test]
fn every_root_package_has_an_entry() {
    let module = shapes_module().file("docs/doc.go", "// Package docs is empty.\npackage docs\n");
    let program = load(&["./..."], &module.config()).unwrap();
    let result = resolve(&program, GEO, "Shape", &["Area"]).unwrap();

    let paths: Vec<&str> = result.iter().map(|p| p.path.as_str()).collect();
    assert_eq!(paths, vec!["example.com/geo/docs", GEO, SHAPES]);
    assert!(result.by_path("example.com/geo/docs").unwrap().is_empty());
    assert_eq!(result.total(), 2);
}

#[test]
fn interface_owner_may_be_a_dependency() {
    let module = shapes_module();
    let program = load(&["./shapes"], &module.config()).unwrap();
    assert_eq!(program.roots().count(), 1);
    assert!(program.package_by_path(GEO).is_some());

    let result = resolve(&program, GEO, "Shape", &["Area"]).unwrap();
    assert_eq!(result.packages.len(), 1);
    assert!(result.by_path(GEO).is_none());
    assert_eq!(result.by_path(SHAPES).unwrap().len(), 2);
}

fn embedding_module() -> GoModule {
    GoModule::new()
        .file(
            "geo/geo.go",
            "package geo\n\
             \n\
             type Shape interface{ Area() float64 }\n\
             \n\
             type Base struct{}\n\
             \n\
             func (Base) Area() float64 { return 0 }\n",
        )
        .file(
            "shapes/embed.go",
            "package shapes\n\
             \n\
             type Unit struct{}\n\
             \n\
             func (Unit) Area() float64 { return 1 }\n\
             \n\
             type Tile struct {\n\
             \tUnit\n\
             \tcolor string\n\
             }\n\
             \n\
             type Square struct{ side float64 }\n\
             \n\
             func (s *Square) Area() float64 { return s.side * s.side }\n\
             \n\
             type Board struct{ *Square }\n\
             \n\
             type Deep struct{ Tile }\n",
        )
}

#[test]
fn promoted_methods_resolve_to_their_declaration() {
    let module = embedding_module();
    let program = load(&["./geo", "./shapes"], &module.config()).unwrap();
    let result = resolve(&program, GEO, "Shape", &["Area"]).unwrap();

    assert_eq!(
        entries(&program, &result, SHAPES),
        vec![
            triple("*Square", "Area", "(s *Square)"),
            triple("Board", "Area", "(s *Square)"),
            triple("Deep", "Area", "(Unit)"),
            triple("Tile", "Area", "(Unit)"),
            triple("Unit", "Area", "(Unit)"),
        ]
    );

    let shapes = result.by_path(SHAPES).unwrap();
    let decl_of = |name: &str| {
        shapes
            .impls
            .iter()
            .find(|(t, _)| t.display(&program, shapes.package) == name)
            .map(|(_, methods)| methods["Area"])
            .unwrap()
    };
    assert_eq!(decl_of("Tile"), decl_of("Unit"));
    assert_eq!(decl_of("Deep"), decl_of("Unit"));
    assert_eq!(decl_of("Board"), decl_of("*Square"));
}

#[test]
fn methods_without_a_body_in_the_package_are_not_declared() {
    let module = embedding_module().file(
        "shapes/foreign.go",
        "package shapes\n\
         \n\
         import \"example.com/geo/geo\"\n\
         \n\
         type Foreign struct{ geo.Base }\n",
    );
    let program = load(&["./shapes"], &module.config()).unwrap();
    let result = resolve(&program, GEO, "Shape", NO_METHODS).unwrap();
    assert_eq!(result.by_path(SHAPES).unwrap().len(), 6);

    let err = resolve(&program, GEO, "Shape", &["Area"]).unwrap_err();
    assert_eq!(
        err,
        ResolveError::DeclarationNotFound {
            package: SHAPES.to_string(),
            type_name: "Foreign".to_string(),
            method: "Area".to_string(),
        }
    );

    let module = GoModule::new()
        .file("geo/geo.go", "package geo\n\ntype Shape interface{ Area() float64 }\n")
        .file(
            "wrap/wrap.go",
            "package wrap\n\nimport \"example.com/geo/geo\"\n\ntype Wrapped struct{ geo.Shape }\n",
        );
    let program = load(&["./wrap"], &module.config()).unwrap();
    let err = resolve(&program, GEO, "Shape", &["Area"]).unwrap_err();
    assert!(matches!(
        err,
        ResolveError::DeclarationNotFound { ref type_name, .. } if type_name == "Wrapped"
    ));
}

#[test]
fn ambiguous_and_shadowed_methods_do_not_conform() {
    let module = GoModule::new()
        .file("geo/geo.go", "package geo\n\ntype Shape interface{ Area() float64 }\n")
        .file(
            "shapes/shapes.go",
            "package shapes\n\
             \n\
             type A struct{}\n\
             \n\
             func (A) Area() float64 { return 1 }\n\
             \n\
             type B struct{}\n\
             \n\
             func (B) Area() float64 { return 2 }\n\
             \n\
             type Both struct {\n\
             \tA\n\
             \tB\n\
             }\n\
             \n\
             type Override struct {\n\
             \tA\n\
             \tB\n\
             }\n\
             \n\
             func (o Override) Area() float64 { return o.A.Area() + o.B.Area() }\n\
             \n\
             type Shadow struct {\n\
             \tA\n\
             \tArea float64\n\
             }\n\
             \n\
             type Wrong struct{}\n\
             \n\
             func (Wrong) Area() int { return 0 }\n",
        );
    let program = load(&["./geo", "./shapes"], &module.config()).unwrap();
    let result = resolve(&program, GEO, "Shape", &["Area"]).unwrap();
    assert_eq!(
        entries(&program, &result, SHAPES),
        vec![
            triple("A", "Area", "(A)"),
            triple("B", "Area", "(B)"),
            triple("Override", "Area", "(o Override)"),
        ]
    );
}

#[test]
fn aliases_and_generic_types_are_not_candidates() {
    let module = shapes_module().file(
        "shapes/more.go",
        "package shapes\n\
         \n\
         type Round = Circle\n\
         \n\
         type Box[T any] struct{ v T }\n\
         \n\
         func (b Box[T]) Area() float64 { return 0 }\n",
    );
    let program = load(&["./shapes"], &module.config()).unwrap();
    let result = resolve(&program, GEO, "Shape", &["Area"]).unwrap();
    assert_eq!(
        entries(&program, &result, SHAPES),
        vec![
            triple("*Square", "Area", "(s *Square)"),
            triple("Circle", "Area", "(c Circle)"),
        ]
    );
}

#[test]
fn unexported_methods_belong_to_their_package() {
    let module = GoModule::new()
        .file(
            "geo/geo.go",
            "package geo\n\
             \n\
             type sizer interface{ size() int }\n\
             \n\
             type box struct{}\n\
             \n\
             func (box) size() int { return 1 }\n",
        )
        .file(
            "shapes/shapes.go",
            "package shapes\n\
             \n\
             type crate struct{}\n\
             \n\
             func (crate) size() int { return 2 }\n",
        );
    let program = load(&["./geo", "./shapes"], &module.config()).unwrap();
    let result = resolve(&program, GEO, "sizer", &["size"]).unwrap();
    assert_eq!(entries(&program, &result, GEO), vec![triple("box", "size", "(box)")]);
    assert!(result.by_path(SHAPES).unwrap().is_empty());
}

/// `geo` embeds `io.Closer`; `shapes` embeds `io.Reader`. Neither has
/// sources unless a GOROOT provides them.
fn stdlib_module() -> GoModule {
    GoModule::new()
        .file(
            "geo/geo.go",
            "package geo\n\
             \n\
             import \"io\"\n\
             \n\
             type Shape interface{ Area() float64 }\n\
             \n\
             type Resource interface {\n\
             \tio.Closer\n\
             \tArea() float64\n\
             }\n",
        )
        .file(
            "shapes/shapes.go",
            "package shapes\n\
             \n\
             import \"io\"\n\
             \n\
             type File struct{}\n\
             \n\
             func (File) Area() float64 { return 0 }\n\
             \n\
             func (File) Close() error { return nil }\n\
             \n\
             type Plain struct{}\n\
             \n\
             func (Plain) Area() float64 { return 1 }\n\
             \n\
             type Stream struct{ io.Reader }\n",
        )
}

fn fake_goroot() -> TempDir {
    let goroot = TempDir::new().unwrap();
    let io = goroot.path().join("src/io");
    std::fs::create_dir_all(&io).unwrap();
    std::fs::write(
        io.join("io.go"),
        "package io\n\
         \n\
         type Reader interface {\n\
         \tRead(p []byte) (n int, err error)\n\
         }\n\
         \n\
         type Closer interface {\n\
         \tClose() error\n\
         }\n",
    )
    .unwrap();
    goroot
}

#[test]
fn embeddings_without_sources_fail_the_resolution() {
    let module = stdlib_module();
    let program = load(&["./geo", "./shapes"], &module.config()).unwrap();
    assert!(program.package_by_path("io").unwrap().opaque);

    let err = resolve(&program, GEO, "Resource", &["Close"]).unwrap_err();
    assert_eq!(
        err,
        ResolveError::IncompleteInterface {
            package: GEO.to_string(),
            name: "Resource".to_string(),
            embedded: "io.Closer".to_string(),
            source_package: "io".to_string(),
        }
    );

    let err = resolve(&program, GEO, "Shape", &["Area"]).unwrap_err();
    assert_eq!(
        err,
        ResolveError::OpaqueEmbedding {
            package: SHAPES.to_string(),
            type_name: "Stream".to_string(),
            embedded: "io.Reader".to_string(),
            source_package: "io".to_string(),
        }
    );
}

#[test]
fn standard_library_sources_come_from_goroot() {
    let module = stdlib_module();
    let goroot = fake_goroot();
    let config = module.config().with_goroot(goroot.path());
    let program = load(&["./geo", "./shapes"], &config).unwrap();
    let io = program.package_by_path("io").unwrap();
    assert!(!io.opaque);
    assert_eq!(io.files.len(), 1);

    let result = resolve(&program, GEO, "Resource", &["Area", "Close"]).unwrap();
    assert_eq!(
        entries(&program, &result, SHAPES),
        vec![triple("File", "Area", "(File)"), triple("File", "Close", "(File)")]
    );

    let result = resolve(&program, GEO, "Shape", &["Area"]).unwrap();
    assert_eq!(
        entries(&program, &result, SHAPES),
        vec![triple("File", "Area", "(File)"), triple("Plain", "Area", "(Plain)")]
    );
}

#[test]
fn build_constraints_select_files() {
    let module = shapes_module()
        .file(
            "shapes/hex_windows.go",
            "package shapes\n\ntype Hexagon struct{}\n\nfunc (Hexagon) Area() float64 { return 6 }\n",
        )
        .file(
            "shapes/broken.go",
            "//go:build ignore\n\npackage shapes\n\nfunc ( {\n",
        )
        .file(
            "shapes/tri.go",
            "//go:build linux && !cgo\n\npackage shapes\n\ntype Tri struct{}\n\nfunc (*Tri) Area() float64 { return 3 }\n",
        );

    let program = load(&["./shapes"], &module.config()).unwrap();
    let result = resolve(&program, GEO, "Shape", NO_METHODS).unwrap();
    assert_eq!(type_names(&program, &result), vec!["*Square", "*Tri", "Circle"]);

    let windows = module.config().with_platform("windows", "amd64");
    let program = load(&["./shapes"], &windows).unwrap();
    let result = resolve(&program, GEO, "Shape", NO_METHODS).unwrap();
    assert_eq!(type_names(&program, &result), vec!["*Square", "Circle", "Hexagon"]);
}

fn type_names(program: &Program, result: &ConformanceResult) -> Vec<String> {
    let shapes = result.by_path(SHAPES).unwrap();
    let mut names: Vec<String> = shapes
        .impls
        .keys()
        .map(|t| t.display(program, shapes.package))
        .collect();
    names.sort();
    names
}

#[test]
fn resolution_is_deterministic() {
    let module = embedding_module();
    let first = load(&["./..."], &module.config()).unwrap();
    let a = resolve(&first, GEO, "Shape", &["Area"]).unwrap();
    let b = resolve(&first, GEO, "Shape", &["Area"]).unwrap();
    assert_eq!(a, b);

    let second = load(&["./..."], &module.config()).unwrap();
    let c = resolve(&second, GEO, "Shape", &["Area"]).unwrap();
    for path in [GEO, SHAPES] {
        assert_eq!(entries(&first, &a, path), entries(&second, &c, path));
    }
}

#[test]
fn interface_must_exist_and_be_an_interface() {
    let module = shapes_module();
    let program = load(&["./..."], &module.config()).unwrap();

    let err = resolve(&program, "example.com/geo/nope", "Shape", NO_METHODS).unwrap_err();
    assert!(matches!(err, ResolveError::InterfaceNotFound { .. }));
    let err = resolve(&program, GEO, "Polygon", NO_METHODS).unwrap_err();
    assert!(matches!(err, ResolveError::InterfaceNotFound { ref name, .. } if name == "Polygon"));
    let err = resolve(&program, GEO, "Point", NO_METHODS).unwrap_err();
    assert_eq!(
        err,
        ResolveError::NotAnInterface {
            package: GEO.to_string(),
            name: "Point".to_string(),
        }
    );
}

#[test]
fn query_loads_and_resolves() {
    let module = shapes_module();
    let config = module.config().with_mode(LoadMode::NAME);
    assert!(matches!(
        load(&["./..."], &config),
        Err(LoadError::IncompleteMode { .. })
    ));

    let discovery = Query::new(config, GEO, "Shape")
        .with_packages(["./geo", "./shapes"])
        .with_methods(["Area"])
        .run()
        .unwrap();
    assert_eq!(
        entries(&discovery.program, &discovery.result, SHAPES),
        vec![
            triple("*Square", "Area", "(s *Square)"),
            triple("Circle", "Area", "(c Circle)"),
        ]
    );
}

#[test]
fn cancellation_fails_the_call() {
    let module = shapes_module();
    let token = CancelToken::new();
    let config = module.config().with_cancel(token.clone());

    let program = load(&["./..."], &config).unwrap();
    token.cancel();
    assert_eq!(
        resolve(&program, GEO, "Shape", &["Area"]).unwrap_err(),
        ResolveError::Cancelled
    );
    assert!(matches!(load(&["./..."], &config), Err(LoadError::Cancelled)));

    let query = Query::new(config, GEO, "Shape").with_packages(["./..."]);
    assert!(matches!(
        find(&query),
        Err(FindError::Load(LoadError::Cancelled))
    ));
}
