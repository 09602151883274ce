//! Integration tests with real skill processes
#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use hearth_runner::{RunnerConfig, RunnerError, SkillExecutor, SkillProcessRunner};
use hearth_skills::SkillConfig;
use hearth_types::{ConversationContext, IntentContext, SkillOutput, Utterance};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

fn skill() -> SkillConfig {
    serde_json::from_str(
        r#"{"name": "timer_skill", "actions": {"set_timer": {}, "countdown": {}}}"#,
    )
    .unwrap()
}

fn intent(action: &str) -> IntentContext {
    let mut intent = IntentContext::new(
        &Utterance::new("set a timer", "en"),
        ConversationContext::default(),
    );
    intent.set_skill("timer_skill");
    intent.set_action(action, Default::default(), Vec::new());
    intent
}

/// Runner executing `script` with `sh -c`; the intent file path arrives as `$1`
fn runner(script: &str, intent_dir: &Path) -> SkillProcessRunner {
    let mut config = RunnerConfig::with_command(
        "sh",
        vec!["-c".into(), script.into(), "skill".into()],
    );
    config.intent_dir = intent_dir.to_path_buf();
    config.timeout_secs = Some(5);
    config.kill_grace_ms = 200;
    SkillProcessRunner::new(config)
}

async fn invoke(
    runner: &SkillProcessRunner,
    action: &str,
) -> (Result<SkillOutput, RunnerError>, Vec<SkillOutput>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let result = runner.invoke(intent(action), &skill(), tx).await;
    let mut streamed = Vec::new();
    while let Some(output) = rx.recv().await {
        streamed.push(output);
    }
    (result, streamed)
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

#[tokio::test]
async fn test_diagnostics_and_last_result() {
    let dir = tempfile::tempdir().unwrap();
    let script = r#"
        echo '[HEARTH_TOOL_LOG] starting'
        echo '{"output":{"answer":"Counting down","replaceMessageId":null}}'
        echo 'Traceback: not json'
        printf '{"output":{"codes":"done","answer":"Timer set"}}'
    "#;

    let (result, streamed) = invoke(&runner(script, dir.path()), "set_timer").await;

    let output = result.unwrap();
    assert_eq!(output.codes.as_deref(), Some("done"));
    assert_eq!(output.answer.text(), "Timer set");
    assert_eq!(streamed.len(), 2);
    assert_eq!(streamed[0].answer.text(), "Counting down");
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn test_intent_file_is_the_last_argument() {
    let dir = tempfile::tempdir().unwrap();
    let script = r#"
        action=$(sed -n 's/.*"action_name":"\([a-z_]*\)".*/\1/p' "$1")
        echo "{\"output\":{\"answer\":\"ran $action\"}}"
    "#;

    let (result, _) = invoke(&runner(script, dir.path()), "countdown").await;
    assert_eq!(result.unwrap().answer.text(), "ran countdown");
}

#[tokio::test]
async fn test_stderr_fails_invocation() {
    let dir = tempfile::tempdir().unwrap();
    let script = r#"
        echo '{"output":{"answer":"half way"}}'
        echo 'ModuleNotFoundError: no module named timer' >&2
    "#;

    let (result, _) = invoke(&runner(script, dir.path()), "set_timer").await;
    assert!(matches!(result, Err(RunnerError::Stderr(ref msg)) if msg.contains("ModuleNotFoundError")));
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn test_non_zero_exit_fails_invocation() {
    let dir = tempfile::tempdir().unwrap();
    let script = r#"echo '{"output":{"answer":"bye"}}'; exit 3"#;

    let (result, _) = invoke(&runner(script, dir.path()), "set_timer").await;
    assert!(matches!(result, Err(RunnerError::ExitStatus { code: Some(3) })));
}

#[tokio::test]
async fn test_no_result_line() {
    let dir = tempfile::tempdir().unwrap();
    let (result, streamed) =
        invoke(&runner("echo '[HEARTH_TOOL_LOG] nothing to say'", dir.path()), "set_timer").await;
    assert!(matches!(result, Err(RunnerError::NoResult)));
    assert!(streamed.is_empty());
}

#[tokio::test]
async fn test_timeout_kills_process() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RunnerConfig::with_command("sh", vec!["-c".into(), "exec sleep 30".into()]);
    config.intent_dir = dir.path().to_path_buf();
    config.timeout_secs = Some(1);
    config.kill_grace_ms = 200;
    let runner = SkillProcessRunner::new(config);

    let started = std::time::Instant::now();
    let (result, _) = invoke(&runner, "set_timer").await;

    assert!(result.unwrap_err().is_timeout());
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn test_spawn_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RunnerConfig::with_command("hearth-no-such-bridge", Vec::new());
    config.intent_dir = dir.path().to_path_buf();
    let runner = SkillProcessRunner::new(config);

    let (result, _) = invoke(&runner, "set_timer").await;
    assert!(matches!(result, Err(RunnerError::Spawn { .. })));
    assert!(dir_is_empty(dir.path()));
}
