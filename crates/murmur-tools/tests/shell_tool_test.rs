//! Shell tool behavior: workspace-pinned cwd, timeouts, policy, clipping.

use std::sync::Arc;

use murmur_core::Tool;
use murmur_tools::{CommandPolicy, ShellTool, Workspace};
use serde_json::json;

fn shell_in(dir: &std::path::Path) -> ShellTool {
    ShellTool::new(Arc::new(Workspace::new(dir, 1024 * 1024).unwrap()))
}

#[tokio::test]
async fn commands_run_in_the_workspace_directory() {
    let dir = tempfile::tempdir().unwrap();
    let tool = shell_in(dir.path());
    let result = tool.execute(json!({"command": "pwd"})).await.unwrap();
    assert_eq!(result["exit_code"], 0);
    let cwd = result["stdout"].as_str().unwrap().trim();
    assert_eq!(
        std::path::Path::new(cwd),
        dir.path().canonicalize().unwrap()
    );
}

#[tokio::test]
async fn exit_code_and_stderr_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let tool = shell_in(dir.path());
    let result = tool
        .execute(json!({"command": "echo oops >&2; exit 3"}))
        .await
        .unwrap();
    assert_eq!(result["exit_code"], 3);
    assert!(result["stderr"].as_str().unwrap().contains("oops"));
}

#[tokio::test]
async fn slow_command_is_killed_at_the_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let tool = shell_in(dir.path());
    let started = std::time::Instant::now();
    let err = tool
        .execute(json!({"command": "sleep 5", "timeout_ms": 100}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("timed out after 100 ms"));
    assert!(started.elapsed() < std::time::Duration::from_secs(4));
}

#[tokio::test]
async fn long_output_is_clipped_with_a_marker() {
    let dir = tempfile::tempdir().unwrap();
    let tool = shell_in(dir.path()).with_output_cap(64);
    let result = tool
        .execute(json!({"command": "yes x | head -n 200"}))
        .await
        .unwrap();
    let stdout = result["stdout"].as_str().unwrap();
    assert!(stdout.contains("[output clipped at 64 bytes]"));
    assert!(stdout.len() < 200 * 2);
}

#[tokio::test]
async fn builtin_denied_fragments_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let tool = shell_in(dir.path());
    let err = tool
        .execute(json!({"command": "rm -rf / --no-preserve-root"}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("denied fragment"));
}

#[tokio::test]
async fn policy_deny_list_extends_the_builtin_one() {
    let dir = tempfile::tempdir().unwrap();
    let tool = shell_in(dir.path()).with_policy(CommandPolicy {
        deny: vec!["curl".to_string()],
        allow: vec![],
    });
    let err = tool
        .execute(json!({"command": "curl http://example.com"}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("denied by policy"));
}

#[tokio::test]
async fn allow_list_limits_the_executable() {
    let dir = tempfile::tempdir().unwrap();
    let tool = shell_in(dir.path()).with_policy(CommandPolicy {
        deny: vec![],
        allow: vec!["echo".to_string()],
    });

    let ok = tool.execute(json!({"command": "echo fine"})).await;
    assert!(ok.is_ok());

    let err = tool
        .execute(json!({"command": "cat /etc/hostname"}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not on the allow list"));
}

#[tokio::test]
async fn allow_list_refuses_chained_commands() {
    let dir = tempfile::tempdir().unwrap();
    let tool = shell_in(dir.path()).with_policy(CommandPolicy {
        deny: vec![],
        allow: vec!["echo".to_string()],
    });
    for command in ["echo a; cat /etc/hostname", "echo a | cat", "echo `id`"] {
        let err = tool.execute(json!({"command": command})).await.unwrap_err();
        assert!(err.to_string().contains("chaining operator"), "{command}");
    }
}

#[tokio::test]
async fn dry_run_validates_but_does_not_execute() {
    let dir = tempfile::tempdir().unwrap();
    let tool = shell_in(dir.path()).dry_run();

    let result = tool
        .execute(json!({"command": "touch should_not_exist"}))
        .await
        .unwrap();
    assert!(result["stdout"].as_str().unwrap().starts_with("[dry-run]"));
    assert!(!dir.path().join("should_not_exist").exists());

    // policy still applies in dry-run
    assert!(tool.execute(json!({"command": "mkfs.ext4 /dev/sda"})).await.is_err());
}

#[tokio::test]
async fn missing_command_field_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let tool = shell_in(dir.path());
    let err = tool.execute(json!({})).await.unwrap_err();
    assert!(err.to_string().contains("'command'"));
}
