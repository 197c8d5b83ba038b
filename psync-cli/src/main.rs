//! psync — keep GitLab access groups in line with Okta developer groups.
//!
//! # Usage
//!
//! ```text
//! psync sync [--group <name>] [--dry-run] [--json]
//! psync status [--group <name>] [--json]
//! psync check
//! ```
//!
//! Every command accepts `--config <path>` (or `PSYNC_CONFIG`) and `-v`.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, status::StatusArgs, sync::SyncArgs};
use psync_core::config;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "psync",
    version,
    about = "Reconcile GitLab access groups against Okta developer groups",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML config (default: ~/.psync/config.yaml).
    #[arg(long, global = true, env = "PSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one reconciliation pass.
    Sync(SyncArgs),

    /// Show the last recorded pass per directory group.
    Status(StatusArgs),

    /// Validate the config and show what a pass would target.
    Check(CheckArgs),
}

/// Options shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
}

impl GlobalOpts {
    /// Explicit `--config`, else the default under the home directory.
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config::default_path().context("could not determine home directory"),
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let global = GlobalOpts { config: cli.config };
    match cli.command {
        Commands::Sync(args) => args.run(&global),
        Commands::Status(args) => args.run(),
        Commands::Check(args) => args.run(&global),
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
