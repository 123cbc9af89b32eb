//! # lndis-policy
//!
//! Deny-first policy engine for Lndis.
//!
//! Every tool call an agent wants to make is a [`ToolCall`]. Before anything
//! is dispatched, the [`PolicyEngine`] evaluates it against an immutable
//! [`RuleTable`] and the current [`SessionContext`] and returns a
//! [`PolicyDecision`]: Allow, Deny, or RequireApproval, with a reason.
//!
//! ## Key invariants
//!
//! - **Default deny**: a tool name with no rule is denied.
//! - **No deletes**: delete-class tools are denied whatever the rule says.
//! - **Traversal blocked**: path arguments containing `..` (plain or
//!   percent-encoded) are denied before any resolution.
//! - **Protected directories**: system paths are never a legal target.
//! - **Workspace-only writes**: write-class tools stay under the workspace root.
//! - **Commands are gated**: shell metacharacters are denied outright and an
//!   allowlisted command still resolves to RequireApproval.
//! - **Network off by default**: network tools need the session toggle.

pub mod call;
pub mod command;
pub mod context;
pub mod engine;
pub mod error;
pub mod path;
pub mod rules;

pub use call::ToolCall;
pub use context::SessionContext;
pub use engine::{
    reason, EvaluationStep, EvaluationTrace, PolicyDecision, PolicyEngine, PolicySummary, Verdict,
};
pub use error::ConfigError;
pub use rules::{CommandRule, PathAccess, PathRule, PolicyDocument, PolicyRule, RuleTable};
