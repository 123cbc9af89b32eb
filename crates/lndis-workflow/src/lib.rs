//! # lndis-workflow
//!
//! The Plan → Approve → Execute state machine for Lndis.
//!
//! A [`Planner`] turns a request into a [`Plan`]. The [`Workflow`] holds it
//! in `Proposed` until the operator approves, then runs each [`Action`]
//! through the policy engine, dispatches what is allowed to a [`Tool`], and
//! appends one audit entry per step before moving on.
//!
//! ## Key invariants
//!
//! - **Forward only**: a plan never revisits a state, and cannot execute
//!   without passing through `Approved`.
//! - **One current plan**: proposing replaces (and aborts) the previous one.
//! - **Audit before next step**: every evaluated call is on disk before the
//!   following call is evaluated. An audit failure halts the plan.
//! - **Local failures**: denials and tool errors are recorded per step and
//!   never abort the plan.

pub mod error;
pub mod plan;
pub mod tool;
pub mod workflow;

pub use error::{ToolError, WorkflowError};
pub use plan::{Action, Plan, PlanState, Planner, StepRecord, StepStatus};
pub use tool::{Tool, ToolOutput, ToolRegistry};
pub use workflow::{CancelHandle, Workflow};
