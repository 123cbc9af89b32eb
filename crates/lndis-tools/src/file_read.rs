// file_read.rs — Read a text file or list a directory.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::{json, Value};

use lndis_policy::{path, SessionContext, ToolCall};
use lndis_workflow::{Tool, ToolError, ToolOutput};

const DEFAULT_MAX_LINES: usize = 200;
/// Larger files are refused outright.
const MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct FileReadTool {
    max_lines: usize,
}

impl Default for FileReadTool {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

impl FileReadTool {
    pub fn with_max_lines(max_lines: usize) -> Self {
        Self { max_lines }
    }
}

impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read a file's contents or list a directory. Read-only."
    }

    fn execute(&self, call: &ToolCall, ctx: &SessionContext) -> Result<ToolOutput, ToolError> {
        let raw = call
            .str_arg("path")
            .ok_or_else(|| ToolError::InvalidArguments("'path' must be a string".into()))?;
        let max_lines = call
            .args()
            .get("max_lines")
            .and_then(Value::as_u64)
            .map_or(self.max_lines, |n| n as usize);
        let target = path::resolve(raw, &ctx.workspace_root);

        let meta = fs::metadata(&target).map_err(|source| ToolError::Io {
            path: target.clone(),
            source,
        })?;
        if meta.is_dir() {
            list_dir(&target)
        } else {
            read_file(&target, meta.len(), max_lines)
        }
    }
}

fn list_dir(dir: &Path) -> Result<ToolOutput, ToolError> {
    let io_err = |source| ToolError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = Vec::new();
    for child in fs::read_dir(dir).map_err(io_err)? {
        let child = child.map_err(io_err)?;
        let meta = child.metadata().map_err(io_err)?;
        let kind = if meta.is_dir() { "dir" } else { "file" };
        let size = meta.is_file().then(|| meta.len());
        entries.push(json!({
            "name": child.file_name().to_string_lossy(),
            "type": kind,
            "size": size,
        }));
    }
    entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

    Ok(ToolOutput::new(
        format!("{} entries in {}", entries.len(), dir.display()),
        json!({ "type": "directory", "path": dir, "entries": entries }),
    ))
}

fn read_file(file: &Path, size: u64, max_lines: usize) -> Result<ToolOutput, ToolError> {
    if size > MAX_FILE_BYTES {
        return Err(ToolError::Failed(format!(
            "{} is {size} bytes, over the {MAX_FILE_BYTES} byte read limit",
            file.display()
        )));
    }
    let io_err = |source| ToolError::Io {
        path: file.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(file).map_err(io_err)?);

    // One line past the cap is enough to know the file was cut.
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    let mut truncated = false;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).map_err(io_err)? == 0 {
            break;
        }
        if lines.len() == max_lines {
            truncated = true;
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        lines.push(line.trim_end_matches(['\n', '\r']).to_string());
    }
    let read = lines.len();
    if truncated {
        lines.push(format!("... (truncated at {max_lines} lines)"));
    }

    let summary = if truncated {
        format!("read first {read} lines from {}", file.display())
    } else {
        format!("read {read} lines from {}", file.display())
    };
    Ok(ToolOutput::new(
        summary,
        json!({
            "type": "file",
            "path": file,
            "lines": read,
            "truncated": truncated,
            "content": lines.join("\n"),
        }),
    ))
}
