// command.rs — Command-line validation.
//
// The raw command string is scanned for shell metacharacters before it is
// tokenized. Quoting does not help an attacker: `echo "a; b"` is rejected the
// same as `echo a; b`, because the whole string is untrusted.

use serde_json::Value;

/// The argument every command-execution tool reads its command line from.
pub const COMMAND_ARG: &str = "command";

/// Tokens that chain, redirect, or substitute commands.
///
/// Order matters only for reporting: multi-character tokens come first so
/// `>>` is reported as `>>` rather than `>`.
pub const BLOCKED_TOKENS: &[&str] = &[">>", "&&", "||", "$(", ">", "<", "|", ";", "`", "\n", "\r"];

/// Return the first blocked token found anywhere in `raw`.
pub fn find_unsafe_token(raw: &str) -> Option<&'static str> {
    BLOCKED_TOKENS.iter().copied().find(|token| raw.contains(token))
}

/// Flatten a command argument into its raw string form.
///
/// Accepts either a single string or an array of strings (joined with
/// spaces). Anything else, or an all-whitespace command, yields `None`.
pub fn command_line(value: Option<&Value>) -> Option<String> {
    let raw = match value? {
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let parts: Option<Vec<&str>> = items.iter().map(Value::as_str).collect();
            parts?.join(" ")
        }
        _ => return None,
    };
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw)
    }
}

/// Split a command line into words using POSIX shell quoting rules.
pub fn tokenize(raw: &str) -> Result<Vec<String>, shell_words::ParseError> {
    shell_words::split(raw)
}

/// Reduce the first word of a command to the name the allowlist is keyed on:
/// directory stripped, extension stripped, lowercased.
///
/// `/usr/bin/LS` → `ls`, `C:\Python\python.exe` → `python`.
pub fn base_command(word: &str) -> String {
    let file = word.rsplit(['/', '\\']).next().unwrap_or(word);
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    stem.to_lowercase()
}

/// Whether the program word names a location rather than a bare command.
///
/// `./ls` or `/tmp/x/ls` would run that exact file, whatever the allowlist
/// entry `ls` was meant to cover.
pub fn is_path_qualified(word: &str) -> bool {
    word.contains(['/', '\\'])
}

/// Case-insensitive membership test against a lowercase list.
pub fn is_listed(base: &str, list: &[String]) -> bool {
    list.iter().any(|entry| entry == base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_blocked_token_is_found() {
        for raw in [
            "ls > out.txt",
            "ls >> out.txt",
            "cat a | grep b",
            "make && make install",
            "false || true",
            "ls; rm -rf /",
            "echo `whoami`",
            "echo $(whoami)",
            "sort < input.txt",
            "ls\nrm -rf /",
        ] {
            assert!(find_unsafe_token(raw).is_some(), "should reject: {raw:?}");
        }
    }

    #[test]
    fn quoting_does_not_hide_metacharacters() {
        assert_eq!(find_unsafe_token(r#"echo "a; b""#), Some(";"));
        assert_eq!(find_unsafe_token("echo 'x | y'"), Some("|"));
    }

    #[test]
    fn longest_token_is_reported() {
        assert_eq!(find_unsafe_token("ls >> log"), Some(">>"));
        assert_eq!(find_unsafe_token("a && b"), Some("&&"));
    }

    #[test]
    fn plain_commands_pass_the_scan() {
        assert!(find_unsafe_token("ls -la /home").is_none());
        assert!(find_unsafe_token("git status --short").is_none());
        assert!(find_unsafe_token("echo 'hello world'").is_none());
    }

    #[test]
    fn command_line_accepts_string_or_array() {
        assert_eq!(command_line(Some(&json!("ls -la"))).as_deref(), Some("ls -la"));
        assert_eq!(
            command_line(Some(&json!(["echo", "hello", ">", "f.txt"]))).as_deref(),
            Some("echo hello > f.txt")
        );
        assert!(command_line(Some(&json!(["ls", 3]))).is_none());
        assert!(command_line(Some(&json!(42))).is_none());
        assert!(command_line(Some(&json!("   "))).is_none());
        assert!(command_line(None).is_none());
    }

    #[test]
    fn path_qualified_programs_are_flagged() {
        assert!(is_path_qualified("./ls"));
        assert!(is_path_qualified("/tmp/x/ls"));
        assert!(is_path_qualified(r"C:\tools\ls.exe"));
        assert!(!is_path_qualified("ls"));
        assert!(!is_path_qualified("python3"));
    }

    #[test]
    fn tokenize_respects_quotes() {
        let words = tokenize(r#"git commit -m "first commit""#).unwrap();
        assert_eq!(words, vec!["git", "commit", "-m", "first commit"]);
        assert!(tokenize(r#"echo "unterminated"#).is_err());
    }

    #[test]
    fn base_command_strips_directory_and_extension() {
        assert_eq!(base_command("/usr/bin/LS"), "ls");
        assert_eq!(base_command(r"C:\Python\python.exe"), "python");
        assert_eq!(base_command("whoami"), "whoami");
        assert_eq!(base_command(".hidden"), ".hidden");
    }
}
