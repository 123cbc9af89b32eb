//! # lndis-tools
//!
//! Reference [`Tool`](lndis_workflow::Tool) implementations for Lndis.
//!
//! These are the tools that actually touch the machine. They assume the
//! policy engine has already approved the call and do no policy checks of
//! their own; they only validate that the arguments are usable. The one
//! exception is `research_local`, which refuses to walk outside the workspace.
//!
//! | Tool             | Does                                                  |
//! |------------------|-------------------------------------------------------|
//! | `file_read`      | read a text file or list a directory                  |
//! | `file_write`     | create, overwrite, or append to a file                |
//! | `command_run`    | run one program, no shell, with captured output       |
//! | `research_local` | case-insensitive keyword search over text files       |

pub mod command_run;
pub mod file_read;
pub mod file_write;
pub mod research_local;

use lndis_workflow::ToolRegistry;

pub use command_run::CommandRunTool;
pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use research_local::LocalResearchTool;

/// A registry with every reference tool.
pub fn default_registry() -> ToolRegistry {
    ToolRegistry::new()
        .with(FileReadTool::default())
        .with(FileWriteTool)
        .with(CommandRunTool::default())
        .with(LocalResearchTool::default())
}

/// Cut `s` to at most `max` characters, marking the cut.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}… (truncated)", &s[..cut]),
        None => s.to_string(),
    }
}
