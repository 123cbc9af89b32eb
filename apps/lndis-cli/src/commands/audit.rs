// audit.rs — Audit subcommands: verify, tail.

use std::path::PathBuf;

use clap::Subcommand;
use lndis_audit::{AuditEntry, AuditLog};

use crate::config::LndisConfig;

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Verify the audit log hash chain integrity.
    Verify {
        /// Path to audit log (defaults to <data dir>/audit.jsonl).
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Show recent audit entries, oldest first.
    Tail {
        /// Path to audit log (defaults to <data dir>/audit.jsonl).
        #[arg(long)]
        log: Option<PathBuf>,
        /// Number of entries to show.
        #[arg(short, default_value = "10")]
        n: usize,
        /// Print raw JSON lines instead of a table.
        #[arg(long)]
        json: bool,
    },
}

pub fn execute(cmd: &AuditCommands, config: &LndisConfig) -> anyhow::Result<()> {
    match cmd {
        AuditCommands::Verify { log } => {
            let path = log.clone().unwrap_or_else(|| config.audit_log.clone());

            if !path.exists() {
                println!("No audit log found at {}", path.display());
                return Ok(());
            }

            match AuditLog::verify_chain(&path) {
                Ok(count) => {
                    println!("Audit log verified: {} entry(s), hash chain intact.", count);
                }
                Err(lndis_audit::AuditError::IntegrityViolation {
                    line,
                    expected,
                    actual,
                }) => {
                    println!("INTEGRITY VIOLATION at line {}:", line);
                    println!("  Expected previous_hash: {}", expected);
                    println!("  Actual previous_hash:   {}", actual);
                    println!();
                    println!("The audit log may have been tampered with.");
                    anyhow::bail!("Audit log integrity check failed");
                }
                Err(e) => return Err(e.into()),
            }
        }

        AuditCommands::Tail { log, n, json } => {
            let path = log.clone().unwrap_or_else(|| config.audit_log.clone());

            if !path.exists() {
                println!("No audit log found at {}", path.display());
                return Ok(());
            }

            let entries = AuditLog::read_all(&path)?;
            let start = entries.len().saturating_sub(*n);
            let recent = &entries[start..];

            if recent.is_empty() {
                println!("No audit entries.");
                return Ok(());
            }

            if *json {
                for entry in recent {
                    println!("{}", serde_json::to_string(entry)?);
                }
            } else {
                print_table(recent);
            }
        }
    }

    Ok(())
}

/// Tabular view shared by `lndis audit tail` and the shell's `/logs`.
pub(crate) fn print_table(entries: &[AuditEntry]) {
    println!(
        "{:<20} {:<15} {:<17} {:<13} REASON",
        "TIMESTAMP", "TOOL", "DECISION", "RESULT"
    );
    println!("{}", "-".repeat(80));

    for entry in entries {
        println!(
            "{:<20} {:<15} {:<17} {:<13} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.tool_name,
            entry.policy_decision.to_string(),
            entry.result.label(),
            entry.policy_reason,
        );
    }
}
