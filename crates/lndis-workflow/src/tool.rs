// tool.rs — The Tool boundary and the registry of implementations.
//
// Tools are the only code that touches the outside world, and they only run
// after the policy engine has let a call through. A tool never sees policy
// internals. It gets the call and the session it runs under.

use std::collections::BTreeMap;

use serde_json::Value;

use lndis_policy::{SessionContext, ToolCall};

use crate::error::ToolError;

/// A successful tool result.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// One line for the audit entry and the step report.
    pub summary: String,
    /// The full payload (file contents, command output, matches).
    pub data: Value,
}

impl ToolOutput {
    pub fn new(summary: impl Into<String>, data: Value) -> Self {
        Self {
            summary: summary.into(),
            data,
        }
    }
}

/// A capability the workflow can dispatch to.
pub trait Tool: Send + Sync {
    /// The name rules and tool calls refer to.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn execute(&self, call: &ToolCall, ctx: &SessionContext) -> Result<ToolOutput, ToolError>;
}

/// Tool implementations keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any earlier one with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Box::new(tool)).is_some() {
            tracing::warn!(tool = %name, "replaced previously registered tool");
        }
    }

    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|tool| tool.as_ref())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// (name, description) pairs, sorted by name.
    pub fn describe(&self) -> Vec<(&str, &str)> {
        self.tools
            .values()
            .map(|tool| (tool.name(), tool.description()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look the tool up and run it. A missing implementation is a tool
    /// error, not a panic.
    pub fn dispatch(&self, call: &ToolCall, ctx: &SessionContext) -> Result<ToolOutput, ToolError> {
        match self.get(call.tool_name()) {
            Some(tool) => tool.execute(call, ctx),
            None => Err(ToolError::Unavailable(call.tool_name().to_string())),
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
