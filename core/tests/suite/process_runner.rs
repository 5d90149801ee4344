#![cfg(unix)]

use std::time::Duration;

use codex_bridge_core::cli_executor::CliError;
use codex_bridge_core::cli_executor::InvocationRequest;
use codex_bridge_core::cli_executor::ProcessRunner;
use codex_bridge_core::cli_executor::build_prompt;
use codex_bridge_core::context_manager::Message;
use core_test_support::FakeCodex;
use pretty_assertions::assert_eq;
use serial_test::serial;

fn request(fake: &FakeCodex, messages: &[Message]) -> InvocationRequest {
    InvocationRequest::new(fake.binary(), build_prompt("be brief", messages).unwrap())
}

fn is_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

async fn wait_until_dead(pid: u32) -> bool {
    for _ in 0..100 {
        if !is_alive(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
#[serial]
async fn test_lines_then_clean_exit() {
    let fake = FakeCodex::builder()
        .event(r#"{"type":"response.output_text.delta","delta":"a"}"#)
        .event("")
        .event("not json")
        .build()
        .unwrap();

    let mut handle = ProcessRunner::start(&request(&fake, &[Message::user("hi")])).unwrap();
    let mut lines = Vec::new();
    while let Some(line) = handle.next_line().await.unwrap() {
        lines.push(line);
    }

    assert_eq!(
        lines,
        vec![
            r#"{"type":"response.output_text.delta","delta":"a"}"#,
            "",
            "not json"
        ]
    );
    // Not restartable.
    assert_eq!(handle.next_line().await.unwrap(), None);
    assert_eq!(fake.exec_args(), vec!["exec", "--json"]);
    assert_eq!(fake.exec_stdin()["systemPrompt"], "be brief");
}

#[tokio::test]
#[serial]
async fn test_non_utf8_line_is_skipped() {
    let fake = FakeCodex::builder()
        .raw_event(b"\xff\xfe noise".to_vec())
        .event(r#"{"type":"response.output_text.delta","delta":"after"}"#)
        .event("crlf\r")
        .build()
        .unwrap();

    let mut handle = ProcessRunner::start(&request(&fake, &[])).unwrap();
    let mut lines = Vec::new();
    while let Some(line) = handle.next_line().await.unwrap() {
        lines.push(line);
    }

    assert_eq!(
        lines,
        vec![
            r#"{"type":"response.output_text.delta","delta":"after"}"#,
            "crlf"
        ]
    );
}

#[tokio::test]
#[serial]
async fn test_non_zero_exit_reports_code_and_stderr() {
    let fake = FakeCodex::builder()
        .event(r#"{"type":"response.output_text.delta","delta":"partial"}"#)
        .exec_exit(3, "model overloaded")
        .build()
        .unwrap();

    let mut handle = ProcessRunner::start(&request(&fake, &[])).unwrap();
    assert!(handle.next_line().await.unwrap().is_some());

    let err = handle.next_line().await.unwrap_err();
    match err {
        CliError::ProcessExit { code, stderr } => {
            assert_eq!(code, 3);
            assert_eq!(stderr.trim(), "model overloaded");
        }
        other => panic!("expected ProcessExit, got {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn test_missing_binary_is_reported_at_start() {
    let payload = build_prompt("", &[]).unwrap();
    let request = InvocationRequest::new("/nonexistent/dir/codex", payload);

    match ProcessRunner::start(&request) {
        Err(CliError::BinaryNotFound { binary, install_hint }) => {
            assert_eq!(binary, "/nonexistent/dir/codex");
            assert!(install_hint.contains("npm install"));
        }
        Err(other) => panic!("expected BinaryNotFound, got {other:?}"),
        Ok(_) => panic!("expected BinaryNotFound, got a running process"),
    }
}

#[tokio::test]
#[serial]
async fn test_unread_stdin_does_not_fail_the_run() {
    let fake = FakeCodex::builder()
        .ignore_stdin()
        .event(r#"{"type":"response.output_text.delta","delta":"ok"}"#)
        .build()
        .unwrap();

    // Larger than a pipe buffer so the write hits a closed pipe.
    let big = "x".repeat(1 << 20);
    let mut handle = ProcessRunner::start(&request(&fake, &[Message::user(big)])).unwrap();

    let mut count = 0;
    while handle.next_line().await.unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, 1);
}

#[tokio::test]
#[serial]
async fn test_drop_kills_running_process() {
    let fake = FakeCodex::builder()
        .event(r#"{"type":"response.output_text.delta","delta":"tick"}"#)
        .hang()
        .build()
        .unwrap();

    let mut handle = ProcessRunner::start(&request(&fake, &[])).unwrap();
    assert!(handle.next_line().await.unwrap().is_some());

    let pid = handle.id().unwrap();
    assert!(is_alive(pid));

    drop(handle);
    assert!(wait_until_dead(pid).await, "process {pid} survived drop");
}

#[tokio::test]
#[serial]
async fn test_kill_reports_signal_exit() {
    let fake = FakeCodex::builder()
        .event(r#"{"type":"response.output_text.delta","delta":"tick"}"#)
        .hang()
        .build()
        .unwrap();

    let mut handle = ProcessRunner::start(&request(&fake, &[])).unwrap();
    assert!(handle.next_line().await.unwrap().is_some());

    handle.kill();
    let err = handle.next_line().await.unwrap_err();
    assert!(
        matches!(err, CliError::ProcessExit { code: -1, .. }),
        "unexpected error {err:?}"
    );
}
