// workflow.rs — The Plan → Approve → Execute loop.
//
// The Workflow owns the session: the context the engine evaluates against,
// the current plan, the tool registry, and the single audit log writer.
// For every step of an approved plan it:
//
//   1. asks the policy engine for a decision,
//   2. dispatches the call if the decision lets it through,
//   3. appends exactly one audit entry,
//
// and only then moves to the next step. A denial or a tool failure is
// recorded on the step and the run continues. A failed audit write halts
// the plan, because no further call may run unrecorded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use lndis_audit::{AuditEntry, AuditError, AuditLog, AuditOutcome};
use lndis_policy::{PolicyDecision, PolicyEngine, SessionContext, Verdict};

use crate::error::WorkflowError;
use crate::plan::{Plan, PlanState, StepStatus};
use crate::tool::ToolRegistry;

/// Requests cancellation of a running plan from outside the workflow
/// (e.g. a Ctrl-C handler). Checked before each step. `run` clears any
/// cancellation left over from before it started.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Workflow {
    engine: PolicyEngine,
    tools: ToolRegistry,
    audit: AuditLog,
    context: SessionContext,
    current: Option<Plan>,
    cancel: CancelHandle,
}

impl Workflow {
    pub fn new(
        engine: PolicyEngine,
        tools: ToolRegistry,
        audit: AuditLog,
        context: SessionContext,
    ) -> Self {
        Self {
            engine,
            tools,
            audit,
            context,
            current: None,
            cancel: CancelHandle::default(),
        }
    }

    /// Use `handle` for cancellation instead of a fresh one, so it can be
    /// shared with a signal handler or a tool created before the workflow.
    pub fn with_cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancel = handle;
        self
    }

    /// Make `plan` the current plan.
    ///
    /// Any plan that has not finished is abandoned first. That is not an
    /// error: a new request replaces the old one.
    pub fn propose(&mut self, plan: Plan) -> Result<&Plan, WorkflowError> {
        if plan.state() != &PlanState::Proposed {
            return Err(WorkflowError::NotProposed {
                plan_id: plan.id(),
                state: plan.state().to_string(),
            });
        }
        if let Some(previous) = self.current.as_mut() {
            if !previous.state().is_terminal() {
                tracing::warn!(
                    plan_id = %previous.id(),
                    replaced_by = %plan.id(),
                    "abandoning unfinished plan"
                );
                previous.abort("superseded by a new plan")?;
            }
        }
        tracing::info!(plan_id = %plan.id(), steps = plan.actions().len(), "plan proposed");
        Ok(&*self.current.insert(plan))
    }

    /// Approve the current plan. Approval covers every gated step in it.
    pub fn approve(&mut self) -> Result<&Plan, WorkflowError> {
        let plan = self.current.as_mut().ok_or(WorkflowError::NoCurrentPlan)?;
        plan.transition(PlanState::Approved)?;
        Ok(&*plan)
    }

    /// Run the approved plan to completion.
    ///
    /// Fails before doing anything if the plan is not Approved or the audit
    /// log is poisoned. Returns the plan with every step's record filled in.
    pub fn run(&mut self) -> Result<&Plan, WorkflowError> {
        let mut plan = self.current.take().ok_or(WorkflowError::NoCurrentPlan)?;
        if plan.state() != &PlanState::Approved {
            let err = WorkflowError::InvalidTransition {
                plan_id: plan.id(),
                from: plan.state().to_string(),
                to: PlanState::Executing.to_string(),
            };
            self.current = Some(plan);
            return Err(err);
        }
        if self.audit.is_poisoned() {
            tracing::error!(plan_id = %plan.id(), "audit log is poisoned; refusing to run");
            self.current = Some(plan);
            return Err(AuditError::Poisoned {
                path: self.audit.path().to_path_buf(),
            }
            .into());
        }

        self.cancel.reset();
        let result = self.execute(&mut plan);
        let plan = self.current.insert(plan);
        result?;
        Ok(&*plan)
    }

    fn execute(&mut self, plan: &mut Plan) -> Result<(), WorkflowError> {
        plan.transition(PlanState::Executing)?;

        for i in 0..plan.actions().len() {
            if self.cancel.is_cancelled() {
                tracing::warn!(plan_id = %plan.id(), at_step = i, "run cancelled");
                return plan.abort("cancelled by operator");
            }

            let plan_id = plan.id();
            let action = &mut plan.actions_mut()[i];
            let call = &action.tool_call;
            let decision = self.engine.evaluate(call, &self.context);

            let (status, outcome, elapsed) = match decision.verdict() {
                Verdict::Deny => {
                    tracing::warn!(
                        tool = call.tool_name(),
                        step = action.step_index,
                        reason = decision.reason(),
                        "step denied by policy"
                    );
                    (StepStatus::Skipped, AuditOutcome::NotExecuted, None)
                }
                verdict => {
                    if verdict == Verdict::RequireApproval {
                        tracing::warn!(
                            tool = call.tool_name(),
                            step = action.step_index,
                            reason = decision.reason(),
                            "gated step proceeding under plan approval"
                        );
                    }
                    let started = Instant::now();
                    let result = self.tools.dispatch(call, &self.context);
                    let elapsed = started.elapsed();
                    tracing::info!(
                        tool = call.tool_name(),
                        step = action.step_index,
                        ok = result.is_ok(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "step dispatched"
                    );
                    match result {
                        Ok(output) => (
                            StepStatus::Completed,
                            AuditOutcome::ok(output.summary),
                            Some(elapsed),
                        ),
                        Err(e) => (
                            StepStatus::Failed,
                            AuditOutcome::error(e.to_string()),
                            Some(elapsed),
                        ),
                    }
                }
            };

            let mut entry = AuditEntry::new(call, &decision)
                .with_result(outcome.clone())
                .with_step(plan_id, action.step_index);
            if let Some(elapsed) = elapsed {
                entry = entry.with_duration(elapsed);
            }

            let record = &mut action.record;
            record.status = status;
            record.decision = Some(decision);
            record.outcome = Some(outcome);
            record.duration_ms = entry.duration;

            if let Err(e) = self.audit.append(&mut entry) {
                tracing::error!(plan_id = %plan_id, error = %e, "audit write failed; halting plan");
                plan.abort("audit write failed")?;
                return Err(e.into());
            }
            action.record.audit_id = Some(entry.id);
        }

        plan.transition(PlanState::Completed)
    }

    /// Cancel the current plan if it has not finished.
    pub fn cancel(&mut self) -> Result<&Plan, WorkflowError> {
        let plan = self.current.as_mut().ok_or(WorkflowError::NoCurrentPlan)?;
        plan.abort("cancelled by operator")?;
        Ok(&*plan)
    }

    /// Handle for cancelling a run from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Evaluate a single call against the live session without running it.
    pub fn check(&self, call: &lndis_policy::ToolCall) -> PolicyDecision {
        self.engine.evaluate(call, &self.context)
    }

    /// Flip the session network toggle. Steps already evaluated keep their
    /// decisions.
    pub fn set_network(&mut self, enabled: bool) {
        tracing::info!(enabled, "network toggle");
        self.context.network_enabled = enabled;
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn current_plan(&self) -> Option<&Plan> {
        self.current.as_ref()
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// The last `n` audit entries, oldest first.
    pub fn tail_audit(&self, n: usize) -> Result<Vec<AuditEntry>, WorkflowError> {
        Ok(self.audit.tail(n)?)
    }
}
