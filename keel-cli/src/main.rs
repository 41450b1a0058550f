//! keel: render KubeVela-style definitions and check their health.
//!
//! # Usage
//!
//! ```text
//! keel render <component.yaml> [--json | --summary]
//! keel check <component.yaml> --snapshot <objects.yaml> [--json]
//! keel check <component.yaml> --kubeconfig [<path>] [--json]
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).

mod commands;
mod cluster;
mod pipeline;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, render::RenderArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "keel",
    version,
    about = "Render workload and trait definitions and check them against a cluster",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a component's workload and traits and print the objects.
    Render(RenderArgs),

    /// Render a component, then evaluate health policies and custom status.
    Check(CheckArgs),
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Render(args) => args.run(),
        Commands::Check(args) => args.run(),
    }
}
