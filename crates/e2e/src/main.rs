//! Rancher Manager end-to-end runner.
//!
//! Provisions a single-node K3s cluster, installs cert-manager, installs or
//! upgrades Rancher Manager and blocks until the named workloads are
//! healthy. Every cluster operation drives an external tool (kubectl, helm,
//! the K3s installer) under a bounded retry budget.

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod rancher;
mod scenario;
mod ui;
mod validator;

use commands::install::InstallCommand;
use commands::upgrade::UpgradeCommand;
use commands::validate::ValidateCommand;

/// Rancher Manager end-to-end install/upgrade runner.
#[derive(Parser)]
#[command(
    name = "rancher-e2e",
    version,
    about = "Rancher Manager e2e install/upgrade runner",
    long_about = "Install or upgrade Rancher Manager end to end.\n\n\
                  The install scenario provisions a single-node K3s cluster,\n\
                  installs cert-manager and deploys the configured Rancher\n\
                  Manager version, then waits for every workload to be healthy.\n\n\
                  All underlying operations are idempotent - re-running the\n\
                  same command converges on the same state."
)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install K3s, cert-manager and Rancher Manager on this host.
    Install(InstallCommand),

    /// Upgrade the Rancher Manager deployment on an existing cluster.
    Upgrade(UpgradeCommand),

    /// Check the external tooling without touching the host.
    Validate(ValidateCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("info,harness=debug,rancher_e2e=debug")
    } else {
        EnvFilter::new("warn,harness=info,rancher_e2e=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Install(cmd) => cmd.run().await,
        Commands::Upgrade(cmd) => cmd.run().await,
        Commands::Validate(cmd) => cmd.run().await,
    }
}
