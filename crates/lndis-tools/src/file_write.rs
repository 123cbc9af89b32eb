// file_write.rs — Create, overwrite, or append to a file.
//
// Relative paths land in the workspace root. Parent directories are created
// as needed. `create` refuses to touch an existing file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde_json::json;

use lndis_policy::{path, SessionContext, ToolCall};
use lndis_workflow::{Tool, ToolError, ToolOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Overwrite,
    Append,
}

impl WriteMode {
    fn parse(raw: Option<&str>) -> Result<Self, ToolError> {
        match raw.unwrap_or("create") {
            "create" => Ok(WriteMode::Create),
            "overwrite" => Ok(WriteMode::Overwrite),
            "append" => Ok(WriteMode::Append),
            other => Err(ToolError::InvalidArguments(format!(
                "unknown mode '{other}' (expected create, overwrite or append)"
            ))),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            WriteMode::Create => "create",
            WriteMode::Overwrite => "overwrite",
            WriteMode::Append => "append",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FileWriteTool;

impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Create, overwrite or append to a file inside the workspace."
    }

    fn execute(&self, call: &ToolCall, ctx: &SessionContext) -> Result<ToolOutput, ToolError> {
        let raw = call
            .str_arg("path")
            .ok_or_else(|| ToolError::InvalidArguments("'path' must be a string".into()))?;
        let content = call
            .str_arg("content")
            .ok_or_else(|| ToolError::InvalidArguments("'content' must be a string".into()))?;
        let mode = WriteMode::parse(call.str_arg("mode"))?;
        let target = path::resolve(raw, &ctx.workspace_root);

        write(&target, content, mode)?;
        tracing::debug!(path = %target.display(), mode = mode.as_str(), "file written");

        Ok(ToolOutput::new(
            format!("{} {} bytes to {}", mode.as_str(), content.len(), target.display()),
            json!({
                "path": target,
                "mode": mode.as_str(),
                "bytes_written": content.len(),
            }),
        ))
    }
}

fn write(target: &Path, content: &str, mode: WriteMode) -> Result<(), ToolError> {
    let io_err = |source| ToolError::Io {
        path: target.to_path_buf(),
        source,
    };
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut options = OpenOptions::new();
    match mode {
        WriteMode::Create => options.write(true).create_new(true),
        WriteMode::Overwrite => options.write(true).create(true).truncate(true),
        WriteMode::Append => options.append(true).create(true),
    };
    let mut file = options.open(target).map_err(io_err)?;
    file.write_all(content.as_bytes()).map_err(io_err)?;
    file.sync_data().map_err(io_err)
}
