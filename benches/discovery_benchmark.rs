use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use findimpls::{load, resolve, LoadConfig};
use findimpls_parser::ast::Interner;
use findimpls_parser::{parse_source, Lexer};
use std::fmt::Write as _;
use std::hint::black_box as bb;
use tempfile::TempDir;

// =============================================================================
// Corpus
// =============================================================================

const MEDIUM_STRUCT_METHODS: &str = r#"
package geometry

type Point struct {
    X, Y float64
}

func (p Point) Abs() float64 {
    return sqrt(p.X*p.X + p.Y*p.Y)
}

func (p *Point) Scale(f float64) {
    p.X = p.X * f
    p.Y = p.Y * f
}

type Rectangle struct {
    Width, Height float64
}

func (r Rectangle) Area() float64 {
    return r.Width * r.Height
}

func (r *Rectangle) Grow(delta float64) {
    r.Width += delta
    r.Height += delta
}
"#;

/// A shapes package with `n` types, every third one implementing `Shape`
/// through a pointer receiver.
fn shapes_source(n: usize) -> String {
    let mut src = String::from("package shapes\n\nimport \"example.com/bench/geo\"\n\n");
    for i in 0..n {
        let _ = writeln!(src, "type S{i} struct {{ side float64; next *S{i} }}\n");
        let recv = if i % 3 == 0 { "*S" } else { "S" };
        let _ = writeln!(
            src,
            "func (s {recv}{i}) Area() float64 {{ return s.side * s.side }}\n"
        );
        if i % 2 == 0 {
            let _ = writeln!(
                src,
                "func (s {recv}{i}) Perimeter() float64 {{ return 4 * s.side }}\n"
            );
        }
    }
    src.push_str("var _ geo.Shape = (*S0)(nil)\n");
    src
}

/// Writes a module with `packages` shape packages of `types` types each.
fn synth_module(packages: usize, types: usize) -> (TempDir, Vec<String>) {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();
    std::fs::write(root.join("go.mod"), "module example.com/bench\n\ngo 1.22\n").expect("go.mod");
    std::fs::create_dir_all(root.join("geo")).expect("mkdir");
    std::fs::write(
        root.join("geo/geo.go"),
        "package geo\n\ntype Shape interface {\n\tArea() float64\n\tPerimeter() float64\n}\n",
    )
    .expect("geo");

    let src = shapes_source(types);
    let mut patterns = vec!["./geo".to_string()];
    for p in 0..packages {
        let dir = root.join(format!("shapes{p}"));
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join("shapes.go"), &src).expect("shapes");
        patterns.push(format!("./shapes{p}"));
    }
    (tmp, patterns)
}

// =============================================================================
// Benchmark 1: Front end
// =============================================================================

fn bench_front_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("front_end");

    let large = shapes_source(200);
    let corpora = [("medium", MEDIUM_STRUCT_METHODS), ("large", large.as_str())];

    for (name, input) in corpora {
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("lex", name), &input, |b, &input| {
            b.iter(|| {
                let mut acc: u64 = 0;
                for (l, _, r) in Lexer::new(bb(input)) {
                    acc = acc.wrapping_add(l as u64).wrapping_add(r as u64);
                }
                bb(acc);
            });
        });

        group.bench_with_input(BenchmarkId::new("parse", name), &input, |b, &input| {
            b.iter_batched(
                Interner::new,
                |mut interner| bb(parse_source(bb(input), &mut interner).is_ok()),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

// =============================================================================
// Benchmark 2: Load and resolve
// =============================================================================

fn bench_discovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("discovery");
    group.sample_size(20);

    for (packages, types) in [(4, 50), (16, 100)] {
        let (tmp, patterns) = synth_module(packages, types);
        let config = LoadConfig::new(tmp.path()).with_platform("linux", "amd64");
        let id = format!("{packages}x{types}");

        group.throughput(Throughput::Elements((packages * types) as u64));
        group.bench_with_input(BenchmarkId::new("load", &id), &patterns, |b, patterns| {
            b.iter(|| bb(load(patterns, &config).expect("load").packages().len()));
        });

        let program = load(&patterns, &config).expect("load");
        group.bench_with_input(BenchmarkId::new("resolve", &id), &program, |b, program| {
            b.iter(|| {
                let result = resolve(program, "example.com/bench/geo", "Shape", &["Area"])
                    .expect("resolve");
                bb(result.total())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_front_end, bench_discovery);
criterion_main!(benches);
