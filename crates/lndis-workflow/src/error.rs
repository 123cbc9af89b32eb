// error.rs — Error types for the workflow and the tool boundary.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use lndis_audit::AuditError;

/// Errors from plan lifecycle operations.
///
/// Policy denials and tool failures are not here: they are recorded per step
/// and never abort a plan. Only an audit write failure stops a run midway.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Approve, run, or cancel was requested with no plan proposed.
    #[error("no current plan")]
    NoCurrentPlan,

    /// The plan is not in a state that allows the requested step.
    #[error("invalid transition from {from} to {to} for plan {plan_id}")]
    InvalidTransition {
        plan_id: Uuid,
        from: String,
        to: String,
    },

    /// Only freshly proposed plans can become the current plan.
    #[error("plan {plan_id} is {state}, only proposed plans can be submitted")]
    NotProposed { plan_id: Uuid, state: String },

    /// The audit log could not record a step. The plan was halted.
    #[error("audit log failure, plan halted: {0}")]
    Audit(#[from] AuditError),
}

/// A failure inside a tool. Recorded in the step's audit entry; the plan
/// moves on to its next step.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No implementation is registered under the tool name.
    #[error("no tool registered as '{0}'")]
    Unavailable(String),

    /// The arguments passed policy but the tool cannot use them.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// A filesystem operation failed.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The tool ran but reported failure.
    #[error("{0}")]
    Failed(String),
}
