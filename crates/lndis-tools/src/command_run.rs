// command_run.rs — Run one program with arguments. No shell is involved.
//
// The command line is split with the same tokenizer the policy engine uses,
// the program is resolved on PATH, and its output is captured and capped.
// A run that exceeds the timeout is killed.

use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use lndis_policy::{command, SessionContext, ToolCall};
use lndis_workflow::{Tool, ToolError, ToolOutput};

use crate::truncate_chars;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_TIMEOUT: Duration = Duration::from_secs(120);
const STDOUT_LIMIT: usize = 5_000;
const STDERR_LIMIT: usize = 2_000;
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct CommandRunTool {
    timeout: Duration,
}

impl Default for CommandRunTool {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl CommandRunTool {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: timeout.min(MAX_TIMEOUT),
        }
    }
}

impl Tool for CommandRunTool {
    fn name(&self) -> &str {
        "command_run"
    }

    fn description(&self) -> &str {
        "Run an allowlisted command without a shell. Always operator-gated."
    }

    fn execute(&self, call: &ToolCall, ctx: &SessionContext) -> Result<ToolOutput, ToolError> {
        let raw = command::command_line(call.args().get(command::COMMAND_ARG))
            .ok_or_else(|| ToolError::InvalidArguments("'command' is empty".into()))?;
        let words = command::tokenize(&raw)
            .map_err(|e| ToolError::InvalidArguments(format!("unparseable command: {e}")))?;
        let (program, args) = words
            .split_first()
            .ok_or_else(|| ToolError::InvalidArguments("'command' is empty".into()))?;
        let timeout = call
            .args()
            .get("timeout")
            .and_then(Value::as_u64)
            .map_or(self.timeout, |secs| Duration::from_secs(secs).min(MAX_TIMEOUT));

        let resolved = which::which(program)
            .map_err(|_| ToolError::Failed(format!("command not found: {program}")))?;

        let mut cmd = Command::new(&resolved);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if ctx.workspace_root.is_dir() {
            cmd.current_dir(&ctx.workspace_root);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ToolError::Failed(format!("failed to start {program}: {e}")))?;
        // Four bytes per char covers the char caps applied below.
        let stdout = drain(child.stdout.take(), STDOUT_LIMIT * 4);
        let stderr = drain(child.stderr.take(), STDERR_LIMIT * 4);

        let status = match wait_with_timeout(&mut child, timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolError::Failed(format!(
                    "command timed out after {}s",
                    timeout.as_secs()
                )));
            }
            Err(e) => return Err(ToolError::Failed(format!("waiting on {program}: {e}"))),
        };

        let stdout = truncate_chars(&stdout.join().unwrap_or_default(), STDOUT_LIMIT);
        let stderr = truncate_chars(&stderr.join().unwrap_or_default(), STDERR_LIMIT);
        let code = status.code();
        tracing::debug!(program = %program, ?code, "command finished");

        let summary = match code {
            Some(code) => format!("{program} exited with status {code}"),
            None => format!("{program} terminated by signal"),
        };
        Ok(ToolOutput::new(
            summary,
            json!({
                "returncode": code,
                "stdout": stdout,
                "stderr": stderr,
            }),
        ))
    }
}

/// Read a pipe to the end on its own thread so a chatty child cannot block
/// on a full pipe while we wait for it. Only the first `limit` bytes are
/// kept; the rest is read and discarded.
fn drain<R: Read + Send + 'static>(pipe: Option<R>, limit: usize) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.by_ref().take(limit as u64).read_to_end(&mut buf);
            let _ = io::copy(&mut pipe, &mut io::sink());
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
