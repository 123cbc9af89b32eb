// research_local.rs — Offline keyword search over text files.
//
// Walks the scan directory (the workspace by default, never outside it),
// reads files with a known text extension, and returns every line
// containing all query keywords, case-insensitively.

use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde_json::{json, Value};

use lndis_policy::{path, SessionContext, ToolCall};
use lndis_workflow::{Tool, ToolError, ToolOutput};

use crate::truncate_chars;

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "csv", "log", "json", "yaml", "yml", "ini", "cfg", "toml", "py", "js", "rs",
    "html", "css",
];
const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;
const SNIPPET_CHARS: usize = 300;
const DEFAULT_MAX_RESULTS: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct LocalResearchTool;

impl Tool for LocalResearchTool {
    fn name(&self) -> &str {
        "research_local"
    }

    fn description(&self) -> &str {
        "Search text files in the workspace for lines containing every keyword."
    }

    fn execute(&self, call: &ToolCall, ctx: &SessionContext) -> Result<ToolOutput, ToolError> {
        let query = call
            .str_arg("query")
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("'query' is required".into()))?;
        let root = match call.str_arg("scan_dir").filter(|s| !s.trim().is_empty()) {
            Some(raw) => path::resolve(raw, &ctx.workspace_root),
            None => ctx.workspace_root.clone(),
        };
        if !path::is_within(&root, &ctx.workspace_root) {
            return Err(ToolError::InvalidArguments(format!(
                "scan_dir {} is outside the workspace",
                root.display()
            )));
        }
        if !root.is_dir() {
            return Err(ToolError::Failed(format!(
                "directory not found: {}",
                root.display()
            )));
        }
        let max_results = call
            .args()
            .get("max_results")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_MAX_RESULTS, |n| n as usize);

        let keywords: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        let files = text_files(&root)?;
        let mut results = Vec::new();

        'files: for file in &files {
            let Ok(bytes) = fs::read(file) else {
                continue;
            };
            let text = String::from_utf8_lossy(&bytes);
            for (index, line) in text.lines().enumerate() {
                let lower = line.to_lowercase();
                if keywords.iter().all(|kw| lower.contains(kw.as_str())) {
                    results.push(json!({
                        "file": file,
                        "line": index + 1,
                        "snippet": truncate_chars(line.trim(), SNIPPET_CHARS),
                    }));
                    if results.len() >= max_results {
                        break 'files;
                    }
                }
            }
        }

        Ok(ToolOutput::new(
            format!(
                "{} matches for '{query}' in {} files",
                results.len(),
                files.len()
            ),
            json!({
                "query": query,
                "files_scanned": files.len(),
                "matches": results.len(),
                "results": results,
            }),
        ))
    }
}

/// Every searchable file under `root`, sorted.
fn text_files(root: &Path) -> Result<Vec<PathBuf>, ToolError> {
    let pattern = format!("{}/**/*", Pattern::escape(&root.to_string_lossy()));
    let walker = glob::glob(&pattern)
        .map_err(|e| ToolError::Failed(format!("cannot scan {}: {}", root.display(), e.msg)))?;

    let mut files: Vec<PathBuf> = walker
        .filter_map(Result::ok)
        .filter(|p| is_text_file(p))
        .collect();
    files.sort();
    Ok(files)
}

fn is_text_file(path: &Path) -> bool {
    let known = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| TEXT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
    known
        && fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() <= MAX_FILE_BYTES)
}
