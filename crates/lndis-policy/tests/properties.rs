// properties.rs — Deny-first guarantees that must hold for every input.
//
// These run against the compiled-in default policy and against hostile rule
// documents that try to loosen it. Each test sweeps a family of inputs rather
// than a single example: the invariants are universal, so the tests are too.

use serde_json::json;
use tempfile::tempdir;

use lndis_policy::{
    reason, ConfigError, PolicyEngine, RuleTable, SessionContext, ToolCall, Verdict,
};

fn session() -> (tempfile::TempDir, SessionContext) {
    let dir = tempdir().unwrap();
    let ctx = SessionContext::new(dir.path());
    (dir, ctx)
}

/// A rule document that allows everything it can, to prove the built-in
/// guarantees do not depend on the document being careful.
const PERMISSIVE: &str = r#"
tools:
  file_read:
    default: allow
    path: { arg: path }
  file_write:
    default: allow
    path: { arg: path, access: write }
  file_delete:
    default: allow
  remove_dir:
    default: allow
  command_run:
    default: allow
    command:
      allowlist: [ls, echo, cat, rm, sudo]
  research_*:
    default: allow
"#;

#[test]
fn unregistered_tool_names_are_always_denied() {
    let (_dir, ctx) = session();
    let engines = [
        PolicyEngine::builtin().unwrap(),
        PolicyEngine::new(RuleTable::from_yaml_str(PERMISSIVE).unwrap()),
    ];
    for engine in &engines {
        for name in ["", "shell", "FILE_READ", "file_read ", "exec", "python", "web_fetch"] {
            let call = ToolCall::named(name).arg("path", "notes.txt");
            let decision = engine.evaluate(&call, &ctx);
            assert_eq!(decision.verdict(), Verdict::Deny, "{name:?} was not denied");
            assert_eq!(decision.reason(), reason::UNKNOWN_TOOL);
        }
    }
}

#[test]
fn delete_class_is_denied_whatever_the_rules_say() {
    let (_dir, ctx) = session();
    let engine = PolicyEngine::new(RuleTable::from_yaml_str(PERMISSIVE).unwrap());
    for name in ["file_delete", "remove_dir"] {
        let call = ToolCall::named(name).arg("path", "notes.txt");
        let decision = engine.evaluate(&call, &ctx);
        assert_eq!(decision.verdict(), Verdict::Deny);
        assert_eq!(decision.reason(), reason::DELETE_DISABLED);
    }
}

#[test]
fn traversal_tokens_are_denied_for_every_path_tool() {
    let (_dir, ctx) = session();
    let engine = PolicyEngine::new(RuleTable::from_yaml_str(PERMISSIVE).unwrap());
    let hostile = [
        "..",
        "../secret.txt",
        "notes/../../../etc/shadow",
        r"..\..\Windows\System32",
        "%2e%2e/%2e%2e/etc/passwd",
        "..%2F..%2Fboot",
        "./a/./../../b",
    ];
    for tool in ["file_read", "file_write"] {
        for raw in hostile {
            // The path does not exist: denial must not depend on the filesystem.
            let call = ToolCall::named(tool).arg("path", raw).arg("content", "x");
            let decision = engine.evaluate(&call, &ctx);
            assert_eq!(decision.verdict(), Verdict::Deny, "{tool} {raw:?}");
            assert_eq!(decision.reason(), reason::PATH_TRAVERSAL, "{tool} {raw:?}");
        }
    }
}

#[test]
fn metacharacters_are_denied_anywhere_in_the_command() {
    let (_dir, ctx) = session();
    let engines = [
        PolicyEngine::builtin().unwrap(),
        PolicyEngine::new(RuleTable::from_yaml_str(PERMISSIVE).unwrap()),
    ];
    let tokens = [">", ">>", "|", "&&", "||", ";", "`", "$("];
    for engine in &engines {
        for token in tokens {
            for command in [
                format!("ls {token} x"),
                format!("echo \"quoted {token} inside\""),
                format!("{token}ls"),
                format!("ls{token}"),
            ] {
                let call = ToolCall::named("command_run").arg("command", command.clone());
                let decision = engine.evaluate(&call, &ctx);
                assert_eq!(decision.verdict(), Verdict::Deny, "{command:?}");
                assert_eq!(decision.reason(), reason::UNSAFE_CHARACTERS, "{command:?}");
            }
        }
    }
}

#[test]
fn commands_never_resolve_to_allow() {
    let (_dir, ctx) = session();
    let engine = PolicyEngine::new(RuleTable::from_yaml_str(PERMISSIVE).unwrap());
    for command in ["ls", "echo hi", "cat notes.txt"] {
        let call = ToolCall::named("command_run").arg("command", command);
        assert_eq!(
            engine.evaluate(&call, &ctx).verdict(),
            Verdict::RequireApproval,
            "{command:?}"
        );
    }
    // A program named by path never matches the allowlist by its file name.
    for command in ["/bin/ls -la", "./ls", "tools/echo hi"] {
        let call = ToolCall::named("command_run").arg("command", command);
        assert_eq!(engine.evaluate(&call, &ctx).verdict(), Verdict::Deny, "{command:?}");
    }
}

#[cfg(unix)]
#[test]
fn local_search_never_walks_above_the_workspace() {
    let (_dir, ctx) = session();
    let engine = PolicyEngine::builtin().unwrap();
    let parent = ctx
        .workspace_root
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap();
    for root in ["/", "/var", "/etc", parent.as_str()] {
        let call = ToolCall::named("research_local")
            .arg("query", "password")
            .arg("scan_dir", root);
        let decision = engine.evaluate(&call, &ctx);
        assert_eq!(decision.verdict(), Verdict::Deny, "{root:?}");
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
#[test]
fn protected_directories_override_permissive_rules() {
    let dir = tempdir().unwrap();
    let engine = PolicyEngine::new(RuleTable::from_yaml_str(PERMISSIVE).unwrap());

    // Even a workspace rooted at / cannot make /etc writable.
    let ctx = SessionContext::new("/");
    for target in ["/etc/passwd", "/usr/bin/ls", "/boot/vmlinuz"] {
        let call = ToolCall::named("file_write")
            .arg("path", target)
            .arg("content", "x");
        let decision = engine.evaluate(&call, &ctx);
        assert_eq!(decision.reason(), reason::PROTECTED_PATH, "{target}");
    }

    let ctx = SessionContext::new(dir.path());
    let call = ToolCall::named("file_write").arg("path", "notes.txt");
    assert_eq!(engine.evaluate(&call, &ctx).verdict(), Verdict::Allow);
}

#[test]
fn scenario_protected_write() {
    let (_dir, ctx) = session();
    let engine = PolicyEngine::builtin().unwrap();
    let call = ToolCall::new(
        "file_write",
        json!({"path": "/etc/passwd", "content": "x"})
            .as_object()
            .cloned()
            .unwrap(),
    );
    let decision = engine.evaluate(&call, &ctx);
    assert_eq!(decision.verdict(), Verdict::Deny);
    if cfg!(all(unix, not(target_os = "macos"))) {
        assert_eq!(decision.reason(), reason::PROTECTED_PATH);
    }
}

#[test]
fn scenario_network_disabled() {
    let (_dir, ctx) = session();
    let engine = PolicyEngine::builtin().unwrap();
    let call = ToolCall::named("research_web").arg("query", "x");
    let decision = engine.evaluate(&call, &ctx);
    assert_eq!(decision.verdict(), Verdict::Deny);
    assert_eq!(decision.reason(), "network disabled");
}

#[test]
fn scenario_chained_command() {
    let (_dir, ctx) = session();
    let engine = PolicyEngine::builtin().unwrap();
    let call = ToolCall::named("command_run").arg("command", "ls; rm -rf /");
    let decision = engine.evaluate(&call, &ctx);
    assert_eq!(decision.verdict(), Verdict::Deny);
    assert_eq!(decision.reason(), "unsafe characters");
}

#[test]
fn scenario_workspace_write_is_allowed() {
    let (_dir, ctx) = session();
    let engine = PolicyEngine::builtin().unwrap();
    let target = ctx.workspace_root.join("notes.txt");
    let call = ToolCall::named("file_write")
        .arg("path", target.to_string_lossy().to_string())
        .arg("content", "hello");
    let decision = engine.evaluate(&call, &ctx);
    assert_eq!(decision.verdict(), Verdict::Allow);
    // Evaluation never touches the filesystem.
    assert!(!target.exists());
}

#[test]
fn catch_all_rules_are_rejected_at_load() {
    for yaml in ["tools:\n  '*':\n    default: allow\n", "tools:\n  '**':\n    default: allow\n"] {
        let err = RuleTable::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::CatchAllRule { .. }), "{err}");
    }
}

#[test]
fn rule_document_loads_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("policy.yaml");
    std::fs::write(&path, lndis_policy::rules::DEFAULT_POLICY).unwrap();
    let engine = PolicyEngine::load(&path).unwrap();
    assert_eq!(
        engine.rules().keys().len(),
        PolicyEngine::builtin().unwrap().rules().keys().len()
    );
}
