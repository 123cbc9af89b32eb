// error.rs — Error types for the audit subsystem.
//
// Any of these surfacing from `append` means an action may have gone
// unrecorded. Callers treat that as fatal to the running plan.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    /// Failed to open, create, or repair the log file.
    #[error("failed to open audit log at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write or sync an entry.
    #[error("failed to append audit entry: {0}")]
    WriteFailed(#[from] std::io::Error),

    /// An earlier append failed and could not be rolled back. The file may
    /// end in a partial line until it is reopened.
    #[error("audit log at {path} is poisoned by an earlier failed append")]
    Poisoned { path: PathBuf },

    /// An entry could not be serialized, or a stored line is not valid JSON.
    #[error("audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The hash chain is broken: a line was altered, inserted, or removed.
    #[error("integrity check failed at line {line}: expected hash {expected}, got {actual}")]
    IntegrityViolation {
        line: usize,
        expected: String,
        actual: String,
    },
}
