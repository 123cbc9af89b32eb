// plan.rs — Plan, Action, and the plan lifecycle state machine.
//
// A Plan is an ordered list of Actions produced by a Planner from one
// operator request. Its state only ever moves forward:
//
//   Proposed → Approved → Executing → Completed
//   (any non-terminal state) → Aborted
//
// Completed and Aborted are terminal. Nothing outside this crate can set a
// plan's state directly; the Workflow drives every transition.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lndis_audit::AuditOutcome;
use lndis_policy::{PolicyDecision, ToolCall};

use crate::error::WorkflowError;

/// The lifecycle state of a Plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlanState {
    /// Waiting for the operator.
    Proposed,
    /// The operator approved it. Gated steps will run under this approval.
    Approved,
    /// Steps are being evaluated and dispatched.
    Executing,
    /// Every step was processed.
    Completed,
    /// Cancelled, superseded, or halted by an audit failure.
    Aborted { reason: String },
}

impl fmt::Display for PlanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanState::Proposed => write!(f, "proposed"),
            PlanState::Approved => write!(f, "approved"),
            PlanState::Executing => write!(f, "executing"),
            PlanState::Completed => write!(f, "completed"),
            PlanState::Aborted { .. } => write!(f, "aborted"),
        }
    }
}

impl PlanState {
    pub fn can_transition_to(&self, next: &PlanState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(next, PlanState::Aborted { .. }) {
            return true;
        }
        matches!(
            (self, next),
            (PlanState::Proposed, PlanState::Approved)
                | (PlanState::Approved, PlanState::Executing)
                | (PlanState::Executing, PlanState::Completed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanState::Completed | PlanState::Aborted { .. })
    }

    /// Approved or Executing: the states in which a plan holds the session.
    pub fn is_active(&self) -> bool {
        matches!(self, PlanState::Approved | PlanState::Executing)
    }
}

/// What happened to one step during a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    /// Dispatched and the tool succeeded.
    Completed,
    /// Dispatched and the tool failed.
    Failed,
    /// Denied by policy; never dispatched.
    Skipped,
    /// The plan was cancelled or aborted before this step was reached.
    Cancelled,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
            StepStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Per-step result, filled in as the plan runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepRecord {
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<PolicyDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<AuditOutcome>,
    /// Milliseconds spent in the tool.
    #[serde(default)]
    pub duration_ms: u64,
    /// Id of the audit entry written for this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_id: Option<Uuid>,
}

impl StepRecord {
    pub fn pending() -> Self {
        Self {
            status: StepStatus::Pending,
            decision: None,
            outcome: None,
            duration_ms: 0,
            audit_id: None,
        }
    }
}

/// One planned tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Action {
    pub id: Uuid,
    pub step_index: usize,
    pub tool_call: ToolCall,
    pub description: String,
    pub record: StepRecord,
}

impl Action {
    pub fn new(step_index: usize, tool_call: ToolCall, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            step_index,
            tool_call,
            description: description.into(),
            record: StepRecord::pending(),
        }
    }
}

/// An ordered set of Actions derived from one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    id: Uuid,
    request: String,
    actions: Vec<Action>,
    state: PlanState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Plan {
    /// A new, empty plan in the Proposed state.
    pub fn new(request: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            request: request.into(),
            actions: Vec::new(),
            state: PlanState::Proposed,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a step. Its `step_index` is its position in the plan.
    pub fn with_action(mut self, tool_call: ToolCall, description: impl Into<String>) -> Self {
        let index = self.actions.len();
        self.actions.push(Action::new(index, tool_call, description));
        self
    }

    /// Build a plan from pre-indexed actions. They are kept in `step_index`
    /// order whatever order they arrive in.
    pub fn from_actions(request: impl Into<String>, mut actions: Vec<Action>) -> Self {
        actions.sort_by_key(|a| a.step_index);
        for action in &mut actions {
            action.record = StepRecord::pending();
        }
        Self {
            actions,
            ..Self::new(request)
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn state(&self) -> &PlanState {
        &self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub(crate) fn actions_mut(&mut self) -> &mut [Action] {
        &mut self.actions
    }

    /// Move to `next`, or fail without changing anything.
    pub(crate) fn transition(&mut self, next: PlanState) -> Result<(), WorkflowError> {
        if !self.state.can_transition_to(&next) {
            return Err(WorkflowError::InvalidTransition {
                plan_id: self.id,
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::info!(plan_id = %self.id, from = %self.state, to = %next, "plan transition");
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Abort, marking every step not yet processed as cancelled.
    pub(crate) fn abort(&mut self, reason: impl Into<String>) -> Result<(), WorkflowError> {
        self.transition(PlanState::Aborted {
            reason: reason.into(),
        })?;
        for action in &mut self.actions {
            if action.record.status == StepStatus::Pending {
                action.record.status = StepStatus::Cancelled;
            }
        }
        Ok(())
    }
}

/// Turns an operator request into a Plan.
///
/// A planner is untrusted: it may emit any tool name and any arguments.
/// Everything it produces is evaluated by policy before anything runs.
pub trait Planner {
    fn plan(&self, request: &str) -> Plan;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aborted() -> PlanState {
        PlanState::Aborted {
            reason: "test".into(),
        }
    }

    #[test]
    fn forward_transitions_are_valid() {
        assert!(PlanState::Proposed.can_transition_to(&PlanState::Approved));
        assert!(PlanState::Approved.can_transition_to(&PlanState::Executing));
        assert!(PlanState::Executing.can_transition_to(&PlanState::Completed));
    }

    #[test]
    fn skipping_approval_is_invalid() {
        assert!(!PlanState::Proposed.can_transition_to(&PlanState::Executing));
        assert!(!PlanState::Proposed.can_transition_to(&PlanState::Completed));
        assert!(!PlanState::Approved.can_transition_to(&PlanState::Completed));
    }

    #[test]
    fn no_state_is_revisited() {
        assert!(!PlanState::Approved.can_transition_to(&PlanState::Proposed));
        assert!(!PlanState::Executing.can_transition_to(&PlanState::Approved));
        assert!(!PlanState::Approved.can_transition_to(&PlanState::Approved));
    }

    #[test]
    fn abort_is_reachable_until_terminal() {
        for state in [PlanState::Proposed, PlanState::Approved, PlanState::Executing] {
            assert!(state.can_transition_to(&aborted()), "{state}");
        }
        assert!(!PlanState::Completed.can_transition_to(&aborted()));
        assert!(!aborted().can_transition_to(&aborted()));
    }

    #[test]
    fn invalid_transition_leaves_plan_unchanged() {
        let mut plan = Plan::new("read notes");
        let err = plan.transition(PlanState::Executing).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
        assert_eq!(plan.state(), &PlanState::Proposed);
    }

    #[test]
    fn abort_cancels_pending_steps() {
        let mut plan = Plan::new("two steps")
            .with_action(ToolCall::named("file_read").arg("path", "a"), "read a")
            .with_action(ToolCall::named("file_read").arg("path", "b"), "read b");
        plan.actions_mut()[0].record.status = StepStatus::Completed;
        plan.abort("operator cancelled").unwrap();

        assert_eq!(plan.state().to_string(), "aborted");
        assert_eq!(plan.actions()[0].record.status, StepStatus::Completed);
        assert_eq!(plan.actions()[1].record.status, StepStatus::Cancelled);
    }

    #[test]
    fn from_actions_orders_by_step_index() {
        let plan = Plan::from_actions(
            "out of order",
            vec![
                Action::new(2, ToolCall::named("c"), "third"),
                Action::new(0, ToolCall::named("a"), "first"),
                Action::new(1, ToolCall::named("b"), "second"),
            ],
        );
        let order: Vec<usize> = plan.actions().iter().map(|a| a.step_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(plan.state(), &PlanState::Proposed);
    }

    #[test]
    fn state_serializes_with_tag() {
        let json = serde_json::to_value(aborted()).unwrap();
        assert_eq!(json["state"], "aborted");
        assert_eq!(json["reason"], "test");
    }
}
