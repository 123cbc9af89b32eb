// rules.rs — Policy rule document and the immutable rule table.
//
// The rule document is YAML, parsed straight into typed structs with
// `deny_unknown_fields` so a typo is a startup error rather than a silently
// ignored key. `RuleTable::from_document` then validates and normalizes every
// rule. Once built, the table is never mutated; changing policy means
// restarting the process.
//
// Rule keys are tool names or globs (`research_*`). Exact names win over
// globs. A tool name that matches nothing has no rule and is denied.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::engine::Verdict;
use crate::error::ConfigError;
use crate::command;
use crate::path;

/// The rule document shipped with the crate, used when no path is configured.
pub const DEFAULT_POLICY: &str = include_str!("../default_policy.yaml");

/// Name fragments that mark a tool as delete-class regardless of its rule.
const DELETE_VERBS: &[&str] = &[
    "delete", "remove", "rm", "rmdir", "unlink", "erase", "purge", "wipe",
];

/// The on-disk shape of a policy document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDocument {
    /// Additional protected directories. These extend the compiled-in set.
    #[serde(default)]
    pub extra_protected_paths: Vec<String>,

    /// Tool name (or glob) → rule.
    pub tools: BTreeMap<String, PolicyRule>,
}

/// How a tool uses its path argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathAccess {
    /// Reads the named path only. It may lie outside the workspace.
    #[default]
    Read,
    /// Writes to the path. It must lie inside the workspace.
    Write,
    /// Reads everything beneath the path (a directory walk). It must lie
    /// inside the workspace, since only the root is checked.
    Contained,
}

impl PathAccess {
    /// Whether the resolved path must be inside the workspace root.
    pub fn requires_workspace(self) -> bool {
        matches!(self, PathAccess::Write | PathAccess::Contained)
    }
}

/// Constraints on a tool's path argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathRule {
    /// Name of the argument holding the path.
    pub arg: String,
    #[serde(default)]
    pub access: PathAccess,
    /// Extensions (e.g. ".exe") the tool may never target.
    #[serde(default)]
    pub blocked_extensions: Vec<String>,
}

fn default_command_arg() -> String {
    command::COMMAND_ARG.to_string()
}

/// Constraints on a command-execution tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandRule {
    /// Name of the argument holding the command line (string or array).
    #[serde(default = "default_command_arg")]
    pub arg: String,
    /// Base commands that may run. Everything else is denied.
    #[serde(default)]
    pub allowlist: Vec<String>,
    /// Base commands that are denied even if allowlisted.
    #[serde(default)]
    pub blocklist: Vec<String>,
}

/// The predicate set attached to one tool name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyRule {
    /// Verdict when no predicate fires.
    pub default: Verdict,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Argument keys that must be present (and non-null).
    #[serde(default)]
    pub required_args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandRule>,

    /// The tool reaches the network and needs the session toggle.
    #[serde(default)]
    pub network: bool,

    /// The tool deletes data. Always denied.
    #[serde(default)]
    pub delete: bool,
}

impl PolicyRule {
    /// Whether this rule's path argument is written to.
    pub fn writes(&self) -> bool {
        self.path
            .as_ref()
            .is_some_and(|p| p.access == PathAccess::Write)
    }
}

/// Delete-class check: the rule flag, or a delete verb in the tool name.
///
/// The name check means a rule document cannot smuggle in `file_delete`
/// by leaving `delete: false`.
pub fn is_delete_class(tool_name: &str, rule: &PolicyRule) -> bool {
    rule.delete
        || tool_name
            .to_ascii_lowercase()
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| DELETE_VERBS.contains(&word))
}

/// The validated, immutable rule table.
#[derive(Debug, Clone)]
pub struct RuleTable {
    exact: HashMap<String, PolicyRule>,
    patterns: Vec<(Pattern, PolicyRule)>,
    protected: Vec<PathBuf>,
}

impl RuleTable {
    /// Build the table from the compiled-in default document.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml_str(DEFAULT_POLICY)
    }

    /// Read and validate a rule document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_yaml_str(&yaml)?;
        tracing::info!(
            path = %path.display(),
            rules = table.len(),
            "loaded policy document"
        );
        Ok(table)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let document: PolicyDocument = serde_yaml::from_str(yaml)?;
        Self::from_document(document)
    }

    /// Validate a parsed document. Any bad entry rejects the whole document.
    pub fn from_document(document: PolicyDocument) -> Result<Self, ConfigError> {
        let mut protected = path::builtin_protected_dirs();
        for raw in &document.extra_protected_paths {
            let expanded = path::expand_home(raw);
            if !expanded.is_absolute() {
                return Err(ConfigError::InvalidRule {
                    tool: "extra_protected_paths".to_string(),
                    reason: format!("protected path '{raw}' is not absolute"),
                });
            }
            protected.push(path::normalize(&expanded));
        }

        let mut exact = HashMap::new();
        let mut patterns = Vec::new();
        for (key, rule) in document.tools {
            let rule = validate_rule(&key, rule)?;
            if is_pattern(&key) {
                if key.chars().all(|c| c == '*') {
                    return Err(ConfigError::CatchAllRule { pattern: key });
                }
                let pattern = Pattern::new(&key).map_err(|e| ConfigError::InvalidPattern {
                    pattern: key.clone(),
                    reason: e.msg.to_string(),
                })?;
                patterns.push((pattern, rule));
            } else {
                exact.insert(key, rule);
            }
        }

        if exact.is_empty() && patterns.is_empty() {
            tracing::warn!("policy document defines no tools; every call will be denied");
        }

        Ok(Self {
            exact,
            patterns,
            protected,
        })
    }

    /// Find the rule governing `tool_name`, with the key that matched.
    pub fn lookup(&self, tool_name: &str) -> Option<(&str, &PolicyRule)> {
        if let Some((key, rule)) = self.exact.get_key_value(tool_name) {
            return Some((key.as_str(), rule));
        }
        self.patterns
            .iter()
            .find(|(pattern, _)| pattern.matches(tool_name))
            .map(|(pattern, rule)| (pattern.as_str(), rule))
    }

    /// Compiled-in protected directories plus any the document added.
    pub fn protected_paths(&self) -> &[PathBuf] {
        &self.protected
    }

    /// Every rule key (names and globs), sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .exact
            .keys()
            .map(String::as_str)
            .chain(self.patterns.iter().map(|(p, _)| p.as_str()))
            .collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn is_pattern(key: &str) -> bool {
    key.contains(['*', '?', '['])
}

fn invalid(tool: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidRule {
        tool: tool.to_string(),
        reason: reason.into(),
    }
}

/// Check one rule and normalize its lists to the form the engine compares.
fn validate_rule(key: &str, mut rule: PolicyRule) -> Result<PolicyRule, ConfigError> {
    if key.trim().is_empty() {
        return Err(invalid(key, "tool name is empty"));
    }
    if rule.required_args.iter().any(|a| a.trim().is_empty()) {
        return Err(invalid(key, "required_args contains an empty name"));
    }

    if let Some(path_rule) = rule.path.as_mut() {
        if path_rule.arg.trim().is_empty() {
            return Err(invalid(key, "path.arg is empty"));
        }
        for ext in path_rule.blocked_extensions.iter_mut() {
            let lowered = ext.trim().to_lowercase();
            if lowered.is_empty() || lowered == "." {
                return Err(invalid(key, "blocked_extensions contains an empty entry"));
            }
            *ext = if lowered.starts_with('.') {
                lowered
            } else {
                format!(".{lowered}")
            };
        }
    }

    if let Some(command_rule) = rule.command.as_mut() {
        // Command tools execute the `command` argument, so that is the one
        // the rule must validate.
        if command_rule.arg != command::COMMAND_ARG {
            return Err(invalid(
                key,
                format!(
                    "command.arg must be '{}', got '{}'",
                    command::COMMAND_ARG,
                    command_rule.arg
                ),
            ));
        }
        for entry in command_rule
            .allowlist
            .iter_mut()
            .chain(command_rule.blocklist.iter_mut())
        {
            *entry = entry.trim().to_lowercase();
            if entry.is_empty() {
                return Err(invalid(key, "command lists contain an empty entry"));
            }
        }
        if let Some(both) = command_rule
            .allowlist
            .iter()
            .find(|c| command_rule.blocklist.contains(c))
        {
            return Err(invalid(
                key,
                format!("'{both}' is in both allowlist and blocklist"),
            ));
        }
    }

    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_document_loads() {
        let table = RuleTable::builtin().unwrap();
        for tool in ["file_read", "file_write", "command_run", "research_web", "research_local"] {
            assert!(table.lookup(tool).is_some(), "missing rule for {tool}");
        }
        assert!(table.lookup("evil_tool").is_none());
    }

    #[test]
    fn exact_name_beats_glob() {
        let table = RuleTable::from_yaml_str(
            r#"
tools:
  "research_*":
    default: deny
  research_local:
    default: allow
"#,
        )
        .unwrap();
        let (key, rule) = table.lookup("research_local").unwrap();
        assert_eq!(key, "research_local");
        assert_eq!(rule.default, Verdict::Allow);

        let (key, rule) = table.lookup("research_papers").unwrap();
        assert_eq!(key, "research_*");
        assert_eq!(rule.default, Verdict::Deny);
    }

    #[test]
    fn catch_all_pattern_is_rejected() {
        let err = RuleTable::from_yaml_str("tools:\n  \"*\":\n    default: allow\n").unwrap_err();
        assert!(matches!(err, ConfigError::CatchAllRule { .. }));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = RuleTable::from_yaml_str(
            "tools:\n  file_read:\n    default: allow\n    enabled: true\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn unknown_verdict_is_rejected() {
        let err =
            RuleTable::from_yaml_str("tools:\n  file_read:\n    default: maybe\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn relative_extra_protected_path_is_rejected() {
        let err = RuleTable::from_yaml_str(
            "extra_protected_paths: [\"relative/dir\"]\ntools:\n  file_read:\n    default: allow\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule { .. }));
    }

    #[test]
    fn conflicting_command_lists_are_rejected() {
        let err = RuleTable::from_yaml_str(
            r#"
tools:
  command_run:
    default: require_approval
    command:
      allowlist: [ls, rm]
      blocklist: [RM]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule { .. }));
    }

    #[test]
    fn lists_are_normalized() {
        let table = RuleTable::from_yaml_str(
            r#"
tools:
  file_write:
    default: allow
    path: { arg: path, access: write, blocked_extensions: [EXE, ".Dll"] }
  command_run:
    default: require_approval
    command: { allowlist: ["  LS ", Whoami] }
"#,
        )
        .unwrap();
        let (_, write) = table.lookup("file_write").unwrap();
        assert!(write.writes());
        assert_eq!(
            write.path.as_ref().unwrap().blocked_extensions,
            vec![".exe", ".dll"]
        );
        let (_, cmd) = table.lookup("command_run").unwrap();
        let cmd = cmd.command.as_ref().unwrap();
        assert_eq!(cmd.arg, "command");
        assert_eq!(cmd.allowlist, vec!["ls", "whoami"]);
    }

    #[test]
    fn command_arg_is_pinned() {
        let err = RuleTable::from_yaml_str(
            r#"
tools:
  command_run:
    default: require_approval
    command: { arg: cmdline, allowlist: [ls] }
"#,
        )
        .unwrap_err();
        match err {
            ConfigError::InvalidRule { reason, .. } => assert!(reason.contains("cmdline")),
            other => panic!("expected InvalidRule, got {other:?}"),
        }
    }

    #[test]
    fn contained_access_requires_the_workspace() {
        let table = RuleTable::builtin().unwrap();
        let (_, rule) = table.lookup("research_local").unwrap();
        let access = rule.path.as_ref().unwrap().access;
        assert_eq!(access, PathAccess::Contained);
        assert!(access.requires_workspace());
        assert!(!rule.writes());
        assert!(!PathAccess::Read.requires_workspace());
    }

    #[test]
    fn delete_class_by_flag_or_name() {
        let plain = PolicyRule {
            default: Verdict::Allow,
            description: None,
            required_args: vec![],
            path: None,
            command: None,
            network: false,
            delete: false,
        };
        assert!(is_delete_class("file_delete", &plain));
        assert!(is_delete_class("fs.remove", &plain));
        assert!(is_delete_class("rm", &plain));
        assert!(!is_delete_class("file_write", &plain));
        assert!(!is_delete_class("format_remover_tool", &plain));

        let flagged = PolicyRule {
            delete: true,
            ..plain
        };
        assert!(is_delete_class("cleanup", &flagged));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RuleTable::load(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
