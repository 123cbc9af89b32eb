// engine.rs — Policy evaluation engine.
//
// The PolicyEngine is the single chokepoint every tool call passes through.
// `evaluate()` walks a fixed chain of checks and the first one that fires
// decides:
//
// 1. No rule for the tool name?              → Deny "unknown tool"
// 2. Delete-class tool?                      → Deny "delete disabled"
// 3. Required argument missing or malformed? → Deny "invalid arguments"
// 4. Path argument:
//      traversal token in the raw string     → Deny "path traversal"
//      inside a protected directory          → Deny "protected path"
//      blocked extension                     → Deny "blocked extension"
//      write outside the workspace root      → Deny "outside workspace"
// 5. Command argument:
//      shell metacharacter in the raw string → Deny "unsafe characters"
//      base command blocklisted / not listed → Deny "not allowlisted"
// 6. Network tool with network off?          → Deny "network disabled"
// 7. The rule's default verdict. Commands never resolve to a silent Allow:
//    an Allow default on a command rule becomes RequireApproval.
//
// The engine holds nothing but the immutable rule table, so `&PolicyEngine`
// can be shared across threads without locking.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::call::ToolCall;
use crate::command;
use crate::context::SessionContext;
use crate::error::ConfigError;
use crate::path;
use crate::rules::{self, PathAccess, PolicyRule, RuleTable};

/// Short, stable reason strings. Audit entries and operator messages use
/// these verbatim; details live in the evaluation trace.
pub mod reason {
    pub const UNKNOWN_TOOL: &str = "unknown tool";
    pub const DELETE_DISABLED: &str = "delete disabled";
    pub const INVALID_ARGUMENTS: &str = "invalid arguments";
    pub const PATH_TRAVERSAL: &str = "path traversal";
    pub const PROTECTED_PATH: &str = "protected path";
    pub const BLOCKED_EXTENSION: &str = "blocked extension";
    pub const OUTSIDE_WORKSPACE: &str = "outside workspace";
    pub const UNSAFE_CHARACTERS: &str = "unsafe characters";
    pub const NOT_ALLOWLISTED: &str = "not allowlisted";
    pub const NETWORK_DISABLED: &str = "network disabled";
    pub const ALLOWED_BY_POLICY: &str = "allowed by policy";
    pub const DENIED_BY_POLICY: &str = "denied by policy";
    pub const REQUIRES_APPROVAL: &str = "requires approval";
    pub const COMMAND_REQUIRES_APPROVAL: &str = "command requires approval";
}

/// The three possible outcomes of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    Deny,
    RequireApproval,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allow => write!(f, "allow"),
            Verdict::Deny => write!(f, "deny"),
            Verdict::RequireApproval => write!(f, "require_approval"),
        }
    }
}

/// The result of a policy evaluation: a verdict and why.
///
/// Fields are private; a decision never changes after the engine returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    verdict: Verdict,
    reason: String,
}

impl PolicyDecision {
    pub fn new(verdict: Verdict, reason: impl Into<String>) -> Self {
        Self {
            verdict,
            reason: reason.into(),
        }
    }

    pub fn allow(reason: impl Into<String>) -> Self {
        Self::new(Verdict::Allow, reason)
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self::new(Verdict::Deny, reason)
    }

    pub fn require_approval(reason: impl Into<String>) -> Self {
        Self::new(Verdict::RequireApproval, reason)
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn is_denied(&self) -> bool {
        self.verdict == Verdict::Deny
    }
}

impl fmt::Display for PolicyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.verdict, self.reason)
    }
}

/// One check in the evaluation chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationStep {
    /// Which check ran (e.g. "rule_lookup", "path").
    pub check: String,
    /// What it found (e.g. "passed", "'/etc/passwd' is under '/etc'").
    pub outcome: String,
    /// Whether this check produced the final decision.
    pub terminal: bool,
}

/// A decision plus every check that led to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationTrace {
    pub decision: PolicyDecision,
    pub steps: Vec<EvaluationStep>,
    /// The rule key that matched the tool name, if any.
    pub matched_rule: Option<String>,
}

/// Snapshot of the effective policy, for status displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySummary {
    pub workspace_root: PathBuf,
    pub network_enabled: bool,
    pub delete_enabled: bool,
    pub protected_paths: Vec<PathBuf>,
    pub tools: Vec<String>,
    pub command_allowlist: Vec<String>,
}

/// Accumulates steps as the chain runs; `finish` seals the trace.
struct Trace {
    steps: Vec<EvaluationStep>,
    matched_rule: Option<String>,
}

impl Trace {
    fn new() -> Self {
        Self {
            steps: Vec::new(),
            matched_rule: None,
        }
    }

    fn pass(&mut self, check: &str, outcome: impl Into<String>) {
        self.steps.push(EvaluationStep {
            check: check.to_string(),
            outcome: outcome.into(),
            terminal: false,
        });
    }

    fn finish(
        mut self,
        check: &str,
        outcome: impl Into<String>,
        decision: PolicyDecision,
    ) -> EvaluationTrace {
        self.steps.push(EvaluationStep {
            check: check.to_string(),
            outcome: outcome.into(),
            terminal: true,
        });
        EvaluationTrace {
            decision,
            steps: self.steps,
            matched_rule: self.matched_rule,
        }
    }

    fn deny(self, check: &str, outcome: impl Into<String>, reason: &str) -> EvaluationTrace {
        self.finish(check, outcome, PolicyDecision::deny(reason))
    }
}

/// The policy engine: an immutable rule table and the evaluation chain.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    rules: RuleTable,
}

impl PolicyEngine {
    pub fn new(rules: RuleTable) -> Self {
        Self { rules }
    }

    /// Engine over the compiled-in default policy.
    pub fn builtin() -> Result<Self, ConfigError> {
        Ok(Self::new(RuleTable::builtin()?))
    }

    /// Engine over a rule document on disk.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        Ok(Self::new(RuleTable::load(path)?))
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Evaluate a tool call and return the decision.
    pub fn evaluate(&self, call: &ToolCall, ctx: &SessionContext) -> PolicyDecision {
        self.evaluate_with_trace(call, ctx).decision
    }

    /// Evaluate a tool call and return the decision with the full check trail.
    pub fn evaluate_with_trace(&self, call: &ToolCall, ctx: &SessionContext) -> EvaluationTrace {
        let trace = self.run_chain(call, ctx);
        tracing::debug!(
            tool = call.tool_name(),
            verdict = %trace.decision.verdict(),
            reason = trace.decision.reason(),
            "policy decision"
        );
        trace
    }

    fn run_chain(&self, call: &ToolCall, ctx: &SessionContext) -> EvaluationTrace {
        let mut trace = Trace::new();
        let name = call.tool_name();

        // Step 1: rule lookup. No rule means no permission.
        let Some((key, rule)) = self.rules.lookup(name) else {
            return trace.deny(
                "rule_lookup",
                format!("no rule matches '{name}'"),
                reason::UNKNOWN_TOOL,
            );
        };
        trace.matched_rule = Some(key.to_string());
        trace.pass("rule_lookup", format!("matched rule '{key}'"));

        // Step 2: delete ban. Nothing in the rule can lift it.
        if rules::is_delete_class(name, rule) {
            return trace.deny(
                "delete_guard",
                "delete-class operation",
                reason::DELETE_DISABLED,
            );
        }
        trace.pass("delete_guard", "passed");

        // Step 3: required arguments.
        if let Some(missing) = rule
            .required_args
            .iter()
            .find(|key| call.args().get(key.as_str()).map_or(true, Value::is_null))
        {
            return trace.deny(
                "arguments",
                format!("missing required argument '{missing}'"),
                reason::INVALID_ARGUMENTS,
            );
        }
        trace.pass("arguments", "passed");

        // Step 4: path constraints.
        if let Err(done) = self.check_path(call, rule, ctx, &mut trace) {
            return done.seal(trace);
        }

        // Step 5: command constraints.
        let gated = match check_command(call, rule, &mut trace) {
            Ok(gated) => gated,
            Err(done) => return done.seal(trace),
        };

        // Step 6: network toggle.
        if rule.network {
            if !ctx.network_enabled {
                return trace.deny(
                    "network",
                    "network access is switched off for this session",
                    reason::NETWORK_DISABLED,
                );
            }
            trace.pass("network", "network enabled");
        }

        // Step 7: the rule's default.
        let decision = match (rule.default, gated) {
            (Verdict::Deny, _) => PolicyDecision::deny(reason::DENIED_BY_POLICY),
            (Verdict::Allow, false) => PolicyDecision::allow(reason::ALLOWED_BY_POLICY),
            (_, true) => PolicyDecision::require_approval(reason::COMMAND_REQUIRES_APPROVAL),
            (Verdict::RequireApproval, false) => {
                PolicyDecision::require_approval(reason::REQUIRES_APPROVAL)
            }
        };
        trace.finish(
            "default",
            format!("rule default is {}", rule.default),
            decision,
        )
    }

    fn check_path(
        &self,
        call: &ToolCall,
        rule: &PolicyRule,
        ctx: &SessionContext,
        trace: &mut Trace,
    ) -> Result<(), Denial> {
        let Some(path_rule) = &rule.path else {
            return Ok(());
        };
        let writes = path_rule.access == PathAccess::Write;
        let contained = path_rule.access.requires_workspace();

        let raw = match call.args().get(&path_rule.arg) {
            None | Some(Value::Null) if writes => {
                return Err(Denial::new(
                    "path",
                    format!("write tool called without '{}'", path_rule.arg),
                    reason::INVALID_ARGUMENTS,
                ));
            }
            None | Some(Value::Null) => {
                trace.pass("path", "no path argument");
                return Ok(());
            }
            Some(Value::String(raw)) if !raw.trim().is_empty() && !raw.contains('\0') => raw,
            Some(_) => {
                return Err(Denial::new(
                    "path",
                    format!("'{}' is not a usable path string", path_rule.arg),
                    reason::INVALID_ARGUMENTS,
                ));
            }
        };

        // Traversal is judged on the raw string, before any resolution.
        if path::has_traversal(raw) {
            return Err(Denial::new(
                "path",
                format!("traversal token in '{raw}'"),
                reason::PATH_TRAVERSAL,
            ));
        }

        let resolved = path::resolve(raw, &ctx.workspace_root);
        if let Some(dir) = path::protected_match(&resolved, self.rules.protected_paths()) {
            return Err(Denial::new(
                "path",
                format!("'{}' is under '{}'", resolved.display(), dir.display()),
                reason::PROTECTED_PATH,
            ));
        }
        if path::has_blocked_extension(&resolved, &path_rule.blocked_extensions) {
            return Err(Denial::new(
                "path",
                format!("'{}' has a blocked extension", resolved.display()),
                reason::BLOCKED_EXTENSION,
            ));
        }
        if contained && !path::is_within(&resolved, &ctx.workspace_root) {
            return Err(Denial::new(
                "path",
                format!(
                    "'{}' is not inside '{}'",
                    resolved.display(),
                    ctx.workspace_root.display()
                ),
                reason::OUTSIDE_WORKSPACE,
            ));
        }

        trace.pass("path", format!("resolved to '{}'", resolved.display()));
        Ok(())
    }

    /// Snapshot of the effective policy under the given session.
    pub fn summary(&self, ctx: &SessionContext) -> PolicySummary {
        let mut command_allowlist: Vec<String> = self
            .rules
            .keys()
            .into_iter()
            .filter_map(|key| self.rules.lookup(key))
            .filter_map(|(_, rule)| rule.command.as_ref())
            .flat_map(|c| c.allowlist.iter().cloned())
            .collect();
        command_allowlist.sort();
        command_allowlist.dedup();

        PolicySummary {
            workspace_root: ctx.workspace_root.clone(),
            network_enabled: ctx.network_enabled,
            delete_enabled: false,
            protected_paths: self.rules.protected_paths().to_vec(),
            tools: self.rules.keys().into_iter().map(str::to_string).collect(),
            command_allowlist,
        }
    }
}

/// A terminal denial produced by a helper check.
struct Denial {
    check: &'static str,
    outcome: String,
    reason: &'static str,
}

impl Denial {
    fn new(check: &'static str, outcome: String, reason: &'static str) -> Self {
        Self {
            check,
            outcome,
            reason,
        }
    }

    fn seal(self, trace: Trace) -> EvaluationTrace {
        trace.deny(self.check, self.outcome, self.reason)
    }
}

/// Returns `Ok(true)` when the call is a command that passed validation and
/// must therefore be operator-gated.
fn check_command(call: &ToolCall, rule: &PolicyRule, trace: &mut Trace) -> Result<bool, Denial> {
    let Some(command_rule) = &rule.command else {
        return Ok(false);
    };

    let Some(raw) = command::command_line(call.args().get(&command_rule.arg)) else {
        return Err(Denial::new(
            "command",
            format!("'{}' is not a command string or list", command_rule.arg),
            reason::INVALID_ARGUMENTS,
        ));
    };

    // Raw-string scan first; nothing is tokenized if this fires.
    if let Some(token) = command::find_unsafe_token(&raw) {
        return Err(Denial::new(
            "command",
            format!("blocked token {token:?} in command"),
            reason::UNSAFE_CHARACTERS,
        ));
    }

    let words = match command::tokenize(&raw) {
        Ok(words) if !words.is_empty() => words,
        Ok(_) => {
            return Err(Denial::new(
                "command",
                "empty command".to_string(),
                reason::INVALID_ARGUMENTS,
            ));
        }
        Err(e) => {
            return Err(Denial::new(
                "command",
                format!("unparseable command line: {e}"),
                reason::INVALID_ARGUMENTS,
            ));
        }
    };

    if command::is_path_qualified(&words[0]) {
        return Err(Denial::new(
            "command",
            format!("'{}' names a path, not an allowlisted command", words[0]),
            reason::NOT_ALLOWLISTED,
        ));
    }

    let base = command::base_command(&words[0]);
    if command::is_listed(&base, &command_rule.blocklist) {
        return Err(Denial::new(
            "command",
            format!("'{base}' is blocklisted"),
            reason::NOT_ALLOWLISTED,
        ));
    }
    if !command::is_listed(&base, &command_rule.allowlist) {
        return Err(Denial::new(
            "command",
            format!("'{base}' is not in the allowlist"),
            reason::NOT_ALLOWLISTED,
        ));
    }

    trace.pass("command", format!("'{base}' is allowlisted"));
    Ok(true)
}
