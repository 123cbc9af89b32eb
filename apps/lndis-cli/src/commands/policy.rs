// policy.rs — Policy subcommands: check a single call, show the effective rules.

use anyhow::Context;
use clap::Subcommand;
use serde_json::{Map, Value};

use lndis_policy::{EvaluationTrace, PolicySummary, ToolCall};

use crate::config::LndisConfig;

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// Evaluate one tool call and print every check it went through.
    /// Nothing is executed and nothing is written to the audit log.
    Check {
        /// Tool name, e.g. file_write.
        tool: String,
        /// Arguments as a JSON object, e.g. '{"path": "notes.txt"}'.
        #[arg(default_value = "{}")]
        args: String,
        /// Evaluate as if the network toggle were on.
        #[arg(long)]
        network: bool,
        /// Print the trace as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show the effective policy: workspace, protected paths, tools.
    Show {
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },
}

pub fn execute(cmd: &PolicyCommands, config: &LndisConfig) -> anyhow::Result<()> {
    let engine = super::load_engine(config)?;

    match cmd {
        PolicyCommands::Check {
            tool,
            args,
            network,
            json,
        } => {
            let call = ToolCall::new(tool.as_str(), parse_args(args)?);
            let ctx = super::session_context(config).with_network(config.network_enabled || *network);
            let trace = engine.evaluate_with_trace(&call, &ctx);

            if *json {
                println!("{}", serde_json::to_string_pretty(&trace)?);
            } else {
                print_trace(&trace);
            }
        }

        PolicyCommands::Show { json } => {
            let summary = engine.summary(&super::session_context(config));
            if *json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
    }

    Ok(())
}

fn parse_args(raw: &str) -> anyhow::Result<Map<String, Value>> {
    let value: Value = serde_json::from_str(raw).context("arguments must be valid JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("arguments must be a JSON object, got: {other}"),
    }
}

fn print_trace(trace: &EvaluationTrace) {
    println!(
        "Matched rule: {}",
        trace.matched_rule.as_deref().unwrap_or("(none)")
    );
    println!();
    println!("{:<14} OUTCOME", "CHECK");
    println!("{}", "-".repeat(60));
    for step in &trace.steps {
        let marker = if step.terminal { " <-" } else { "" };
        println!("{:<14} {}{}", step.check, step.outcome, marker);
    }
    println!();
    println!("Decision: {}", trace.decision);
}

pub(crate) fn print_summary(summary: &PolicySummary) {
    println!("Workspace:      {}", summary.workspace_root.display());
    println!(
        "Network:        {}",
        if summary.network_enabled { "on" } else { "off" }
    );
    println!(
        "Delete:         {}",
        if summary.delete_enabled { "enabled" } else { "disabled" }
    );
    println!("Tools:          {}", summary.tools.join(", "));
    println!(
        "Commands:       {}",
        if summary.command_allowlist.is_empty() {
            "(none)".to_string()
        } else {
            summary.command_allowlist.join(", ")
        }
    );
    println!("Protected paths:");
    for path in &summary.protected_paths {
        println!("  {}", path.display());
    }
}
