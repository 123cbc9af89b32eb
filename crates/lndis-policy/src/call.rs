// call.rs — ToolCall: the unit the policy engine evaluates.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One requested invocation of a tool: a name plus named arguments.
///
/// Fields are private so a call cannot change between the moment it is
/// evaluated and the moment it is dispatched. Build it with [`ToolCall::new`]
/// and chain [`ToolCall::arg`] calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    tool_name: String,
    #[serde(default)]
    args: Map<String, Value>,
}

impl ToolCall {
    /// Create a call with an explicit argument map.
    pub fn new(tool_name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
        }
    }

    /// Create a call with no arguments.
    pub fn named(tool_name: impl Into<String>) -> Self {
        Self::new(tool_name, Map::new())
    }

    /// Add an argument and return self (builder pattern).
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn args(&self) -> &Map<String, Value> {
        &self.args
    }

    /// Look up a string argument. Returns `None` if absent or not a string.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }

    /// Snapshot of the arguments as a JSON value, for audit records.
    pub fn args_value(&self) -> Value {
        Value::Object(self.args.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_collects_arguments() {
        let call = ToolCall::named("file_write")
            .arg("path", "notes.txt")
            .arg("content", "hello");
        assert_eq!(call.tool_name(), "file_write");
        assert_eq!(call.str_arg("path"), Some("notes.txt"));
        assert_eq!(call.args().len(), 2);
    }

    #[test]
    fn str_arg_ignores_non_strings() {
        let call = ToolCall::named("command_run").arg("command", json!(["ls", "-la"]));
        assert!(call.str_arg("command").is_none());
        assert!(call.args().contains_key("command"));
    }

    #[test]
    fn missing_args_deserialize_as_empty() {
        let call: ToolCall = serde_json::from_str(r#"{"tool_name":"research_local"}"#).unwrap();
        assert!(call.args().is_empty());
    }
}
