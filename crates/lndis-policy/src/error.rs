// error.rs — Error types for the policy subsystem.
//
// Only configuration can fail here. A denied tool call is not an error: it
// is an ordinary `PolicyDecision` returned by the engine.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading the policy rule document.
///
/// Every variant is fatal at startup: the process must never run with a
/// partially loaded rule table.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The rule document could not be read from disk.
    #[error("failed to read policy document at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The rule document is not valid YAML or does not match the schema.
    #[error("malformed policy document: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A tool-name pattern is not a valid glob.
    #[error("invalid tool pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A pattern that matches every tool name would void the implicit deny.
    #[error("catch-all tool pattern '{pattern}' is not permitted")]
    CatchAllRule { pattern: String },

    /// A rule is structurally valid YAML but semantically unusable.
    #[error("invalid rule for tool '{tool}': {reason}")]
    InvalidRule { tool: String, reason: String },
}
