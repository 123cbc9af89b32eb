//! # lndis
//!
//! Operator CLI for Lndis, a policy-mediated local assistant.
//!
//! - `lndis shell` — interactive plan → approve → run loop
//! - `lndis audit verify/tail` — inspect the tamper-evident audit trail
//! - `lndis policy check/show` — dry-run a tool call, show the effective policy
//!
//! Settings come from `<data dir>/config.toml`; see [`config`].

mod commands;
mod config;
mod planner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::LndisConfig;

/// Lndis: every tool call planned, approved, checked, and audited.
#[derive(Parser)]
#[command(name = "lndis", version, about)]
struct Cli {
    /// Data directory holding config.toml and the audit log
    /// (defaults to the platform's local data dir).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Config file (defaults to <data dir>/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive shell.
    Shell,
    /// Inspect the audit trail.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
    /// Inspect and dry-run the policy.
    Policy {
        #[command(subcommand)]
        command: commands::policy::PolicyCommands,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never interleave with command output on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("lndis_cli=info".parse()?)
                .add_directive("lndis_policy=info".parse()?)
                .add_directive("lndis_workflow=info".parse()?)
                .add_directive("lndis_audit=info".parse()?)
                .add_directive("lndis_tools=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(LndisConfig::default_data_dir);
    let config = config::load_config(&data_dir, cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    match &cli.command {
        Commands::Shell => commands::shell::execute(&config),
        Commands::Audit { command } => commands::audit::execute(command, &config),
        Commands::Policy { command } => commands::policy::execute(command, &config),
    }
}
