// shell.rs — Interactive operator shell.
//
// Type a request to get a plan, review it, `/approve`, then `/run`.
// Nothing executes without an explicit approval of the plan shown.
//
// Only an audit write failure ends the session with an error. Every other
// workflow error (no plan, wrong state) is reported and the prompt returns.
//
// Ctrl-C at the prompt is handled by the line editor. Ctrl-C while a plan is
// running cancels the plan before its next step instead of killing the
// process.

use std::fs;

use anyhow::Context;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use lndis_audit::{AuditLog, AuditOutcome};
use lndis_workflow::{Plan, PlanState, Planner, StepStatus, Workflow, WorkflowError};

use crate::commands::{audit, policy};
use crate::config::LndisConfig;
use crate::planner::KeywordPlanner;

const PROMPT: &str = "lndis> ";
const DEFAULT_LOG_LINES: usize = 10;

const HELP: &str = "\
  <request>          plan a request (same as /plan <request>)
  /plan <request>    plan a request, e.g. write notes.txt with content hi
  /approve           approve the current plan
  /run               execute the approved plan
  /cancel            abandon the current plan
  /logs [n]          show the last n audit entries (default 10)
  /network [on|off]  show or toggle network access
  /status            policy summary
  /tools             list registered tools
  /help              this text
  /quit              exit";

/// One parsed line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Input {
    Plan(String),
    Approve,
    Run,
    Cancel,
    Logs(usize),
    Network(Option<bool>),
    Status,
    Tools,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub(crate) fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Plan(line.to_string());
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };
    match (name.to_ascii_lowercase().as_str(), rest) {
        ("plan", "") => Input::Unknown("/plan needs a request".into()),
        ("plan", request) => Input::Plan(request.to_string()),
        ("approve", _) => Input::Approve,
        ("run", _) => Input::Run,
        ("cancel", _) => Input::Cancel,
        ("logs", "") => Input::Logs(DEFAULT_LOG_LINES),
        ("logs", n) => match n.parse() {
            Ok(n) => Input::Logs(n),
            Err(_) => Input::Unknown(format!("/logs expects a number, got '{n}'")),
        },
        ("network", "") => Input::Network(None),
        ("network", "on") => Input::Network(Some(true)),
        ("network", "off") => Input::Network(Some(false)),
        ("network", other) => {
            Input::Unknown(format!("/network expects on or off, got '{other}'"))
        }
        ("status", _) => Input::Status,
        ("tools", _) => Input::Tools,
        ("help", _) | ("?", _) => Input::Help,
        ("quit", _) | ("exit", _) | ("q", _) => Input::Quit,
        (other, _) => Input::Unknown(format!("unknown command /{other}")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

/// The shell's state: a workflow plus the planner that feeds it.
pub(crate) struct Shell<P: Planner> {
    workflow: Workflow,
    planner: P,
}

impl<P: Planner> Shell<P> {
    pub(crate) fn new(workflow: Workflow, planner: P) -> Self {
        Self { workflow, planner }
    }

    pub(crate) fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Act on one input. Errors returned from here end the session.
    pub(crate) fn handle(&mut self, input: Input) -> anyhow::Result<Flow> {
        match input {
            Input::Empty => {}
            Input::Quit => return Ok(Flow::Quit),
            Input::Help => println!("{HELP}"),
            Input::Unknown(msg) => println!("  {msg}. Type /help for commands."),

            Input::Plan(request) => {
                let plan = self.planner.plan(&request);
                if plan.is_empty() {
                    println!("  No actions recognised in that request. Type /help for examples.");
                } else {
                    self.workflow.propose(plan)?;
                    if let Some(plan) = self.workflow.current_plan() {
                        show_plan(plan, &self.workflow);
                    }
                }
            }

            Input::Approve => match self.workflow.current_plan().map(Plan::state) {
                None => println!("  No active plan. Type a request first."),
                Some(PlanState::Approved) => println!("  Plan already approved. Use /run."),
                Some(PlanState::Proposed) => {
                    self.workflow.approve()?;
                    println!("  [+] Plan approved. Use /run to execute.");
                }
                Some(state) => println!("  Plan is {state}. Type a new request."),
            },

            Input::Run => match self.workflow.current_plan().map(Plan::state) {
                None => println!("  No active plan. Type a request first."),
                Some(PlanState::Proposed) => println!("  Plan not approved. Use /approve first."),
                Some(PlanState::Approved) => match self.workflow.run() {
                    Ok(plan) => show_results(plan),
                    Err(e @ WorkflowError::Audit(_)) => {
                        return Err(e).context("audit log unavailable; session halted")
                    }
                    Err(e) => println!("  {e}"),
                },
                Some(state) => println!("  Plan is {state}. Type a new request."),
            },

            Input::Cancel => match self.workflow.current_plan().map(|p| p.state().is_terminal()) {
                None => println!("  No active plan."),
                Some(true) => println!("  Nothing to cancel: the plan has finished."),
                Some(false) => {
                    self.workflow.cancel()?;
                    println!("  [x] Plan cancelled.");
                }
            },

            Input::Logs(n) => {
                let entries = self.workflow.tail_audit(n)?;
                if entries.is_empty() {
                    println!("  No audit entries.");
                } else {
                    audit::print_table(&entries);
                }
            }

            Input::Network(None) => {
                println!("  Network is {}.", on_off(self.workflow.context().network_enabled));
            }
            Input::Network(Some(enabled)) => {
                self.workflow.set_network(enabled);
                println!("  Network {}.", on_off(enabled));
            }

            Input::Status => {
                let summary = self.workflow.engine().summary(self.workflow.context());
                policy::print_summary(&summary);
                if let Some(plan) = self.workflow.current_plan() {
                    println!("Current plan:   {} ({})", short_id(plan), plan.state());
                }
            }

            Input::Tools => {
                for (name, description) in self.workflow.tools().describe() {
                    println!("  {:<16} {}", name, description);
                }
            }
        }
        Ok(Flow::Continue)
    }
}

pub fn execute(config: &LndisConfig) -> anyhow::Result<()> {
    fs::create_dir_all(&config.workspace_root)
        .with_context(|| format!("create workspace {}", config.workspace_root.display()))?;
    let engine = super::load_engine(config)?;
    let audit = AuditLog::open(&config.audit_log)
        .with_context(|| format!("open audit log {}", config.audit_log.display()))?;
    let workflow = Workflow::new(
        engine,
        lndis_tools::default_registry(),
        audit,
        super::session_context(config),
    )
    .with_cancel_handle(interrupt::handle());
    let mut shell = Shell::new(workflow, KeywordPlanner::new()?);
    let _sigint = interrupt::install();

    println!("Lndis shell. Workspace: {}", config.workspace_root.display());
    println!(
        "Network {}. Type /help for commands, /quit to exit.",
        on_off(shell.workflow().context().network_enabled)
    );

    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }
                if shell.handle(parse_input(&line))? == Flow::Quit {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => println!("  (type /quit to exit)"),
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Routes SIGINT to one process-wide cancel handle.
#[cfg(unix)]
mod interrupt {
    use std::sync::OnceLock;

    use lndis_workflow::CancelHandle;

    static HANDLE: OnceLock<CancelHandle> = OnceLock::new();

    pub(super) fn handle() -> CancelHandle {
        HANDLE.get_or_init(CancelHandle::default).clone()
    }

    extern "C" fn on_sigint(_signal: libc::c_int) {
        // Only an atomic store happens here.
        if let Some(handle) = HANDLE.get() {
            handle.cancel();
        }
    }

    /// Puts the previous SIGINT disposition back when dropped.
    pub(super) struct Guard {
        previous: Option<libc::sighandler_t>,
    }

    pub(super) fn install() -> Guard {
        handle();
        let handler = on_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t;
        // SAFETY: `on_sigint` is async-signal-safe.
        let previous = unsafe { libc::signal(libc::SIGINT, handler) };
        if previous == libc::SIG_ERR {
            tracing::warn!("could not install SIGINT handler; Ctrl-C will not cancel runs");
            return Guard { previous: None };
        }
        Guard {
            previous: Some(previous),
        }
    }

    impl Drop for Guard {
        fn drop(&mut self) {
            if let Some(previous) = self.previous {
                // SAFETY: restores the disposition `install` replaced.
                unsafe {
                    libc::signal(libc::SIGINT, previous);
                }
            }
        }
    }
}

#[cfg(not(unix))]
mod interrupt {
    use lndis_workflow::CancelHandle;

    pub(super) fn handle() -> CancelHandle {
        CancelHandle::default()
    }

    pub(super) struct Guard;

    pub(super) fn install() -> Guard {
        Guard
    }
}

fn show_plan(plan: &Plan, workflow: &Workflow) {
    println!();
    println!("  Plan {}: {}", short_id(plan), plan.request());
    for action in plan.actions() {
        // Preview only; the decision that counts is made again at run time.
        let preview = workflow.check(&action.tool_call);
        println!(
            "  {:>2}. {:<40} [{}] {}",
            action.step_index + 1,
            action.description,
            action.tool_call.tool_name(),
            preview
        );
    }
    println!();
    println!("  -> /approve to approve, then /run to execute.");
}

fn show_results(plan: &Plan) {
    println!();
    for action in plan.actions() {
        let record = &action.record;
        let detail = match (&record.outcome, &record.decision) {
            (Some(AuditOutcome::Ok { summary }), _) => summary.clone(),
            (Some(AuditOutcome::Error { message }), _) => message.clone(),
            (_, Some(decision)) if record.status == StepStatus::Skipped => {
                decision.reason().to_string()
            }
            _ => String::new(),
        };
        println!(
            "  {:>2}. {:<10} {:<40} {}",
            action.step_index + 1,
            record.status.to_string(),
            action.description,
            detail
        );
    }
    println!();
    println!("  Plan {}.", plan.state());
}

fn short_id(plan: &Plan) -> String {
    plan.id().to_string().chars().take(8).collect()
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lndis_policy::{PolicyEngine, SessionContext};
    use tempfile::tempdir;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_input("  "), Input::Empty);
        assert_eq!(parse_input("/approve"), Input::Approve);
        assert_eq!(parse_input("/RUN"), Input::Run);
        assert_eq!(parse_input("/logs"), Input::Logs(10));
        assert_eq!(parse_input("/logs 3"), Input::Logs(3));
        assert_eq!(parse_input("/network on"), Input::Network(Some(true)));
        assert_eq!(parse_input("/network"), Input::Network(None));
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(
            parse_input("/plan read a.txt"),
            Input::Plan("read a.txt".into())
        );
        assert_eq!(parse_input("read a.txt"), Input::Plan("read a.txt".into()));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(matches!(parse_input("/logs many"), Input::Unknown(_)));
        assert!(matches!(parse_input("/network maybe"), Input::Unknown(_)));
        assert!(matches!(parse_input("/plan"), Input::Unknown(_)));
        assert!(matches!(parse_input("/frobnicate"), Input::Unknown(_)));
    }

    fn shell(dir: &std::path::Path) -> Shell<KeywordPlanner> {
        let workspace = dir.join("ws");
        fs::create_dir_all(&workspace).unwrap();
        let workflow = Workflow::new(
            PolicyEngine::builtin().unwrap(),
            lndis_tools::default_registry(),
            AuditLog::open(dir.join("audit.jsonl")).unwrap(),
            SessionContext::new(&workspace),
        );
        Shell::new(workflow, KeywordPlanner::new().unwrap())
    }

    #[test]
    fn request_approve_run_writes_and_audits() {
        let dir = tempdir().unwrap();
        let mut sh = shell(dir.path());

        sh.handle(parse_input("write notes.txt with content hi then read notes.txt"))
            .unwrap();
        // Run before approval is refused and does nothing.
        sh.handle(Input::Run).unwrap();
        assert!(!dir.path().join("ws/notes.txt").exists());

        sh.handle(Input::Approve).unwrap();
        sh.handle(Input::Run).unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("ws/notes.txt")).unwrap(),
            "hi"
        );
        let plan = sh.workflow().current_plan().unwrap();
        assert_eq!(plan.state(), &PlanState::Completed);
        assert_eq!(sh.workflow().tail_audit(10).unwrap().len(), 2);
    }

    #[test]
    fn cancel_abandons_a_proposed_plan() {
        let dir = tempdir().unwrap();
        let mut sh = shell(dir.path());

        sh.handle(Input::Plan("write a.txt with content x".into()))
            .unwrap();
        sh.handle(Input::Cancel).unwrap();
        assert!(matches!(
            sh.workflow().current_plan().unwrap().state(),
            PlanState::Aborted { .. }
        ));

        // Approving a cancelled plan is reported, not an error.
        sh.handle(Input::Approve).unwrap();
        sh.handle(Input::Run).unwrap();
        assert!(!dir.path().join("ws/a.txt").exists());
        assert!(sh.workflow().tail_audit(10).unwrap().is_empty());
    }

    #[test]
    fn network_toggle_and_quit() {
        let dir = tempdir().unwrap();
        let mut sh = shell(dir.path());
        sh.handle(Input::Network(Some(true))).unwrap();
        assert!(sh.workflow().context().network_enabled);
        assert_eq!(sh.handle(Input::Quit).unwrap(), Flow::Quit);
    }

    #[cfg(unix)]
    #[test]
    fn sigint_cancels_through_the_shared_handle() {
        let handle = interrupt::handle();
        {
            let _guard = interrupt::install();
            // SAFETY: the handler installed above only flips an atomic flag.
            unsafe {
                libc::raise(libc::SIGINT);
            }
        }
        assert!(handle.is_cancelled());
        assert!(interrupt::handle().is_cancelled());
    }

    #[test]
    fn unrecognised_request_proposes_nothing() {
        let dir = tempdir().unwrap();
        let mut sh = shell(dir.path());
        sh.handle(Input::Plan("good morning".into())).unwrap();
        assert!(sh.workflow().current_plan().is_none());
    }
}
