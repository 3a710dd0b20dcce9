//! findimpls - lists the Go types implementing an interface

use std::path::PathBuf;

use clap::Parser;
use findimpls::{FindError, LoadConfig, Query};
use tracing_subscriber::EnvFilter;

/// Find the types implementing a Go interface and where their methods are declared.
#[derive(Parser, Debug)]
#[command(name = "findimpls", version)]
struct Cli {
    /// Import path of the package declaring the interface
    interface_package: String,

    /// Name of the interface
    interface_name: String,

    /// Comma-separated methods to locate on every implementation
    methods: String,

    /// Package patterns to scan (e.g. ./...)
    #[arg(required = true)]
    patterns: Vec<String>,

    /// Working directory inside the Go module
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Extra build tags
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,

    /// Include _test.go files
    #[arg(long)]
    tests: bool,

    /// Target operating system (defaults to GOOS or the host)
    #[arg(long)]
    goos: Option<String>,

    /// Target architecture (defaults to GOARCH or the host)
    #[arg(long)]
    goarch: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), FindError> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose {
            "findimpls=debug"
        } else {
            "findimpls=warn"
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let mut config = LoadConfig::from_env(&cli.dir).with_tests(cli.tests);
    if !cli.tags.is_empty() {
        config = config.with_build_tags(cli.tags);
    }
    if let Some(goos) = cli.goos {
        config.goos = goos;
    }
    if let Some(goarch) = cli.goarch {
        config.goarch = goarch;
    }

    let discovery = Query::new(config, cli.interface_package, cli.interface_name)
        .with_packages(cli.patterns)
        .with_methods(cli.methods.split(',').map(str::trim).filter(|m| !m.is_empty()))
        .run()?;
    let program = &discovery.program;

    for package in discovery.result.iter() {
        let mut impls: Vec<_> = package
            .impls
            .iter()
            .map(|(typ, methods)| (typ.display(program, package.package), methods))
            .collect();
        impls.sort_by(|a, b| a.0.trim_start_matches('*').cmp(b.0.trim_start_matches('*')));
        for (type_name, methods) in impls {
            if methods.is_empty() {
                println!("{}: {type_name}", package.path);
            }
            for (method, decl) in methods {
                let position = program.method_decl(*decl).position;
                println!("{}: {type_name}.{method} -> {position}", package.path);
            }
        }
    }
    Ok(())
}
