//! infrasync: synchronize inventory data between external systems and Infrahub.
//!
//! # Usage
//!
//! ```text
//! infrasync list [--directory <dir>]
//! infrasync diff (--name <sync> | --config-file <path>) [--directory <dir>] [--branch <branch>]
//! infrasync sync (--name <sync> | --config-file <path>) [--directory <dir>] [--branch <branch>] [--diff | --no-diff]
//! infrasync generate (--name <sync> | --config-file <path>) [--directory <dir>] [--branch <branch>] [--dry-run]
//! ```

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use commands::{diff::DiffArgs, generate::GenerateArgs, list::ListArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "infrasync",
    version,
    about = "Synchronize data between inventory sources and Infrahub",
    long_about = None,
)]
struct Cli {
    /// Log progress (equivalent to RUST_LOG=info).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the sync configurations found under a directory.
    List(ListArgs),

    /// Show the differences between the source and the destination of a sync.
    Diff(DiffArgs),

    /// Apply the differences of a sync to its destination.
    Sync(SyncArgs),

    /// Render per-adapter model files from the Infrahub schema.
    Generate(GenerateArgs),
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::List(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Generate(args) => args.run(),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", format!("Error: {err:#}").red().bold());
            ExitCode::FAILURE
        }
    }
}
