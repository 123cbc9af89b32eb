// entry.rs — The audit record written for every evaluated tool call.
//
// One entry per call, whatever the verdict. A denied call is recorded with
// `result: not_executed`; an allowed call carries the tool's outcome and how
// long it took. Entries are immutable once `AuditLog::append` returns.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use lndis_policy::{PolicyDecision, ToolCall, Verdict};

/// What happened when (or whether) the call was dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    /// The tool ran and succeeded.
    Ok { summary: String },
    /// The tool ran and failed.
    Error { message: String },
    /// The call was never dispatched (denied, or the plan was cancelled).
    NotExecuted,
}

impl AuditOutcome {
    pub fn ok(summary: impl Into<String>) -> Self {
        Self::Ok {
            summary: summary.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Short label for tabular display.
    pub fn label(&self) -> &'static str {
        match self {
            AuditOutcome::Ok { .. } => "ok",
            AuditOutcome::Error { .. } => "error",
            AuditOutcome::NotExecuted => "not_executed",
        }
    }
}

/// One line in the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub tool_name: String,
    /// The call's arguments exactly as evaluated.
    pub args: Value,
    pub policy_decision: Verdict,
    pub policy_reason: String,
    pub result: AuditOutcome,
    /// Wall-clock time spent in the tool, in milliseconds. Zero if not executed.
    pub duration: u64,

    /// The plan this call belonged to, if it was part of one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_index: Option<usize>,

    /// SHA-256 of the preceding line. `None` only for the first entry.
    pub previous_hash: Option<String>,
}

impl AuditEntry {
    /// Record a call and the decision made about it. The result starts as
    /// `NotExecuted`; set it with [`AuditEntry::with_result`] after dispatch.
    pub fn new(call: &ToolCall, decision: &PolicyDecision) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            tool_name: call.tool_name().to_string(),
            args: call.args_value(),
            policy_decision: decision.verdict(),
            policy_reason: decision.reason().to_string(),
            result: AuditOutcome::NotExecuted,
            duration: 0,
            plan_id: None,
            step_index: None,
            previous_hash: None,
        }
    }

    pub fn with_result(mut self, result: AuditOutcome) -> Self {
        self.result = result;
        self
    }

    pub fn with_duration(mut self, elapsed: Duration) -> Self {
        self.duration = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Tie the entry to a plan step.
    pub fn with_step(mut self, plan_id: Uuid, step_index: usize) -> Self {
        self.plan_id = Some(plan_id);
        self.step_index = Some(step_index);
        self
    }
}
