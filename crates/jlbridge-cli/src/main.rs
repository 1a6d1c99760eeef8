use anyhow::Result;
use clap::{Parser, Subcommand};
use jlbridge_config::BackendKind;
use jlbridge_runtime::PrimitiveKind;
use std::path::PathBuf;

mod commands;
mod config;

/// Evaluate Julia code and move typed arrays across the boundary.
///
/// Runs against a libjulia found through jlbridge.toml or JULIA_DIR, or
/// against the built-in emulator (the default backend).
///
/// EXAMPLES:
///     jlbridge eval 'randn(2, 2)'              Evaluate and print the result
///     jlbridge matmul --size 3                 inv(A) * A for a random A
///     jlbridge invert --size 4                 Round-trip and invert a matrix
///     jlbridge typeof --kind Bool --shape 2,2  Julia type of a marshaled container
///
/// ENVIRONMENT VARIABLES:
///     JLBRIDGE_BACKEND   Backend to use (emulated, libjulia)
///     JULIA_DIR          Julia installation root
///     JLBRIDGE_OUTPUT    Set to 'json' for JSON output by default
///     RUST_LOG           Log filter (default: warn)
#[derive(Parser)]
#[command(name = "jlbridge")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Backend to run against (emulated or libjulia)
    #[arg(long, global = true)]
    backend: Option<BackendKind>,
    /// Julia installation root, overrides configuration
    #[arg(long, global = true)]
    julia_dir: Option<PathBuf>,
    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,
    /// Log session activity to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate Julia code
    ///
    /// Prints the result's type name and length, and its values when it is a
    /// scalar or array of a supported element type.
    ///
    /// EXAMPLES:
    ///     jlbridge eval '[1, 2, 3] * 2'
    ///     jlbridge eval 'typeof(1.5f0)' --json
    Eval {
        /// Julia source text
        code: String,
    },

    /// Multiply a random matrix by its inverse
    ///
    /// Evaluates randn(N, N), inverts it, multiplies the two and unmarshals
    /// the (near identity) product.
    Matmul {
        /// Matrix size N
        #[arg(long, short = 'n', default_value = "3")]
        size: usize,
    },

    /// Invert a random matrix after a host round-trip
    ///
    /// Unmarshals randn(N, N) into a host container, marshals it back,
    /// inverts it and unmarshals the inverse into the same container.
    Invert {
        /// Matrix size N
        #[arg(long, short = 'n', default_value = "3")]
        size: usize,
    },

    /// Print the Julia type of a marshaled zero container
    ///
    /// EXAMPLES:
    ///     jlbridge typeof --kind f64 --shape 2,3,4   Array{Float64, 3}
    ///     jlbridge typeof --kind Bool --shape 4      Vector{Int8}
    Typeof {
        /// Element kind, Julia or Rust name (Float64, f64, Bool, ...)
        #[arg(long, short = 'k')]
        kind: PrimitiveKind,
        /// Comma-separated dimensions
        #[arg(long, short = 's', value_delimiter = ',', required = true)]
        shape: Vec<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cli_config = config::Config::from_env();
    init_tracing(cli.verbose);

    let options = commands::SessionOptions {
        backend: cli.backend,
        julia_dir: cli.julia_dir,
        json: cli.json || cli_config.default_json,
    };

    match cli.command {
        Commands::Eval { code } => commands::eval::run(&code, &options)?,
        Commands::Matmul { size } => commands::matmul::run(size, &options)?,
        Commands::Invert { size } => commands::invert::run(size, &options)?,
        Commands::Typeof { kind, shape } => commands::typeof_cmd::run(kind, shape, &options)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}
