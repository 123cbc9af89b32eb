// planner.rs — Deterministic keyword planner.
//
// Turns a short imperative request into a plan, one action per clause.
// Clauses are joined with "then":
//
//   write notes.txt with content hello then read notes.txt
//
// The planner only proposes. Whatever it emits still goes through the policy
// engine, so a request it misreads can at worst produce a denied step.

use regex::{Captures, Regex};

use lndis_policy::ToolCall;
use lndis_workflow::{Plan, Planner};

type Build = fn(&Captures) -> (ToolCall, String);

/// Keyword-driven [`Planner`]. Unrecognised clauses produce no action.
pub struct KeywordPlanner {
    patterns: Vec<(Regex, Build)>,
    verbs: Regex,
    separator: Regex,
}

impl KeywordPlanner {
    pub fn new() -> Result<Self, regex::Error> {
        let patterns: Vec<(&str, Build)> = vec![
            (r"(?is)^write\s+(\S+)(?:\s+with\s+content\s+(.*))?$", build_write),
            (r"(?is)^(?:read|cat|show)\s+(.+)$", build_read),
            (r"(?is)^(?:list|ls)\s+(.+)$", build_list),
            (r"(?is)^run\s+(.+)$", build_run),
            (r"(?is)^search\s+(.+)$", build_search),
            (r"(?is)^web\s+(.+)$", build_web),
        ];
        let patterns = patterns
            .into_iter()
            .map(|(re, build)| Ok((Regex::new(re)?, build)))
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            patterns,
            verbs: Regex::new(r"(?i)^(?:write|read|cat|show|list|ls|run|search|web)\s")?,
            separator: Regex::new(r"(?i)\s+then\s+")?,
        })
    }

    /// Split a request into clauses. A "then" only separates clauses when the
    /// text after it starts with a known verb, so file content may contain it.
    fn clauses<'a>(&self, request: &'a str) -> Vec<&'a str> {
        let mut cuts = vec![0];
        for m in self.separator.find_iter(request) {
            if self.verbs.is_match(&request[m.end()..]) {
                cuts.push(m.start());
                cuts.push(m.end());
            }
        }
        cuts.push(request.len());
        cuts.chunks(2)
            .map(|pair| request[pair[0]..pair[1]].trim())
            .filter(|c| !c.is_empty())
            .collect()
    }

    fn action_for(&self, clause: &str) -> Option<(ToolCall, String)> {
        self.patterns
            .iter()
            .find_map(|(re, build)| re.captures(clause).map(|caps| build(&caps)))
    }
}

impl Planner for KeywordPlanner {
    fn plan(&self, request: &str) -> Plan {
        let mut plan = Plan::new(request.trim());
        for clause in self.clauses(request) {
            match self.action_for(clause) {
                Some((call, description)) => plan = plan.with_action(call, description),
                None => tracing::debug!(clause, "no keyword matched"),
            }
        }
        plan
    }
}

fn capture<'c>(caps: &'c Captures, i: usize) -> &'c str {
    caps.get(i).map_or("", |m| m.as_str().trim())
}

fn build_write(caps: &Captures) -> (ToolCall, String) {
    let path = capture(caps, 1);
    let call = ToolCall::named("file_write")
        .arg("path", path)
        .arg("content", capture(caps, 2))
        .arg("mode", "create");
    (call, format!("Write to {path}"))
}

fn build_read(caps: &Captures) -> (ToolCall, String) {
    let path = capture(caps, 1);
    (
        ToolCall::named("file_read").arg("path", path),
        format!("Read {path}"),
    )
}

fn build_list(caps: &Captures) -> (ToolCall, String) {
    let path = capture(caps, 1);
    (
        ToolCall::named("file_read").arg("path", path),
        format!("List {path}"),
    )
}

fn build_run(caps: &Captures) -> (ToolCall, String) {
    let command = capture(caps, 1);
    (
        ToolCall::named("command_run").arg("command", command),
        format!("Run: {command}"),
    )
}

fn build_search(caps: &Captures) -> (ToolCall, String) {
    let query = capture(caps, 1);
    (
        ToolCall::named("research_local").arg("query", query),
        format!("Search workspace for '{query}'"),
    )
}

fn build_web(caps: &Captures) -> (ToolCall, String) {
    let query = capture(caps, 1);
    (
        ToolCall::named("research_web").arg("query", query),
        format!("Web search: {query}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(request: &str) -> Plan {
        KeywordPlanner::new().unwrap().plan(request)
    }

    #[test]
    fn write_with_content() {
        let p = plan("write notes.txt with content hello world");
        assert_eq!(p.actions().len(), 1);
        let call = &p.actions()[0].tool_call;
        assert_eq!(call.tool_name(), "file_write");
        assert_eq!(call.str_arg("path"), Some("notes.txt"));
        assert_eq!(call.str_arg("content"), Some("hello world"));
        assert_eq!(call.str_arg("mode"), Some("create"));
    }

    #[test]
    fn write_without_content_writes_empty_file() {
        let p = plan("Write empty.txt");
        assert_eq!(p.actions()[0].tool_call.str_arg("content"), Some(""));
    }

    #[test]
    fn verbs_map_to_tools() {
        let cases = [
            ("read notes.txt", "file_read"),
            ("list .", "file_read"),
            ("run ls -la", "command_run"),
            ("search policy engine", "research_local"),
            ("web rust borrow checker", "research_web"),
        ];
        for (request, tool) in cases {
            let p = plan(request);
            assert_eq!(p.actions().len(), 1, "{request}");
            assert_eq!(p.actions()[0].tool_call.tool_name(), tool, "{request}");
        }
    }

    #[test]
    fn run_keeps_the_raw_command_line() {
        // Metacharacters are passed through untouched for the policy engine to see.
        let p = plan("run ls; rm -rf /");
        assert_eq!(
            p.actions()[0].tool_call.str_arg("command"),
            Some("ls; rm -rf /")
        );
    }

    #[test]
    fn then_splits_clauses_in_order() {
        let p = plan("write a.txt with content x then read a.txt then run ls");
        let tools: Vec<&str> = p.actions().iter().map(|a| a.tool_call.tool_name()).collect();
        assert_eq!(tools, vec!["file_write", "file_read", "command_run"]);
        let indexes: Vec<usize> = p.actions().iter().map(|a| a.step_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(p.actions()[0].tool_call.str_arg("content"), Some("x"));
    }

    #[test]
    fn then_inside_content_is_kept() {
        let p = plan("write todo.txt with content eat then sleep");
        assert_eq!(p.actions().len(), 1);
        assert_eq!(
            p.actions()[0].tool_call.str_arg("content"),
            Some("eat then sleep")
        );
    }

    #[test]
    fn small_talk_yields_an_empty_plan() {
        let p = plan("hello there");
        assert!(p.is_empty());
        assert_eq!(p.request(), "hello there");
    }
}
