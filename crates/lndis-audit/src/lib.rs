//! # lndis-audit
//!
//! Append-only record of every tool call Lndis evaluates.
//!
//! Each evaluated call, allowed or not, becomes one [`AuditEntry`] on one
//! line of a JSONL file. Entries are hash-chained through `previous_hash`
//! so tampering is detectable with [`AuditLog::verify_chain`].
//!
//! ```rust,no_run
//! use lndis_audit::{AuditEntry, AuditLog};
//! use lndis_policy::{PolicyDecision, ToolCall};
//!
//! let mut log = AuditLog::open("/tmp/audit.jsonl").unwrap();
//! let call = ToolCall::named("research_web").arg("query", "rust");
//! let mut entry = AuditEntry::new(&call, &PolicyDecision::deny("network disabled"));
//! log.append(&mut entry).unwrap();
//! ```

pub mod entry;
pub mod error;
pub mod hasher;
pub mod log;

pub use entry::{AuditEntry, AuditOutcome};
pub use error::AuditError;
pub use log::{AuditLog, LogFile};
