#![cfg(unix)]

use std::collections::HashMap;

use codex_bridge_core::cli_executor::CliError;
use codex_bridge_core::provider_auth::AuthProbeSource;
use codex_bridge_core::provider_auth::AuthStatus;
use codex_bridge_core::provider_auth::CliAuth;
use codex_bridge_core::provider_auth::CodexAuthManager;
use core_test_support::FakeCodex;
use core_test_support::StatusProbe;
use pretty_assertions::assert_eq;
use serial_test::serial;

async fn status_of(fake: &FakeCodex) -> AuthStatus {
    CodexAuthManager::new()
        .status(&fake.binary(), &HashMap::new())
        .await
}

#[tokio::test]
#[serial]
async fn test_structured_probe_authenticated() {
    let fake = FakeCodex::builder().build().unwrap();

    let status = status_of(&fake).await;

    assert_eq!(status, AuthStatus::authenticated(AuthProbeSource::StructuredProbe));
    assert_eq!(fake.calls(), vec!["status"]);
}

#[tokio::test]
#[serial]
async fn test_structured_probe_signed_out() {
    let fake = FakeCodex::builder()
        .status(StatusProbe::Succeeds(r#"{"loggedIn": false}"#.to_string()))
        .build()
        .unwrap();

    let status = status_of(&fake).await;

    assert!(!status.authenticated);
    assert_eq!(status.source, AuthProbeSource::StructuredProbe);
}

#[tokio::test]
#[serial]
async fn test_unsupported_status_falls_back_to_probe_run() {
    let fake = FakeCodex::builder()
        .status(StatusProbe::Fails {
            stderr: "unknown command: auth".to_string(),
            code: 2,
        })
        .build()
        .unwrap();

    let status = status_of(&fake).await;

    assert_eq!(status, AuthStatus::authenticated(AuthProbeSource::HeuristicProbe));
    assert_eq!(fake.calls(), vec!["status", "probe"]);
}

#[tokio::test]
#[serial]
async fn test_failed_probe_run_is_unauthenticated() {
    let fake = FakeCodex::builder()
        .status(StatusProbe::Fails {
            stderr: "error: unrecognized subcommand 'status'".to_string(),
            code: 2,
        })
        .probe_exit(1)
        .build()
        .unwrap();

    let status = status_of(&fake).await;

    assert!(!status.authenticated);
    assert_eq!(status.source, AuthProbeSource::HeuristicProbe);
    assert_eq!(status.detail.as_deref(), Some("exited with code 1"));
}

#[tokio::test]
#[serial]
async fn test_other_status_failure_skips_fallback() {
    let fake = FakeCodex::builder()
        .status(StatusProbe::Fails {
            stderr: "Not logged in".to_string(),
            code: 1,
        })
        .build()
        .unwrap();

    let status = status_of(&fake).await;

    assert_eq!(
        status,
        AuthStatus::unauthenticated(AuthProbeSource::StructuredProbe, "Not logged in")
    );
    assert_eq!(fake.calls(), vec!["status"]);
}

#[tokio::test]
#[serial]
async fn test_ensure_login_is_noop_when_authenticated() {
    let fake = FakeCodex::builder().build().unwrap();

    CodexAuthManager::new()
        .ensure_login(&fake.binary(), &HashMap::new())
        .await
        .unwrap();

    assert_eq!(fake.calls(), vec!["status"]);
}

#[tokio::test]
#[serial]
async fn test_ensure_login_runs_login_when_signed_out() {
    let fake = FakeCodex::builder()
        .status(StatusProbe::Succeeds(r#"{"status": "signed-out"}"#.to_string()))
        .build()
        .unwrap();

    CodexAuthManager::new()
        .ensure_login(&fake.binary(), &HashMap::new())
        .await
        .unwrap();

    assert_eq!(fake.calls(), vec!["status", "login"]);
}

#[tokio::test]
#[serial]
async fn test_failed_login_carries_stderr() {
    let fake = FakeCodex::builder()
        .status(StatusProbe::Succeeds(r#"{"authenticated": false}"#.to_string()))
        .login_exit(1, "browser flow cancelled")
        .build()
        .unwrap();

    let err = CodexAuthManager::new()
        .ensure_login(&fake.binary(), &HashMap::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        CliError::LoginFailed {
            detail: "browser flow cancelled".to_string()
        }
    );
}

#[tokio::test]
#[serial]
async fn test_login_with_missing_binary() {
    let err = CodexAuthManager::new()
        .ensure_login("/nonexistent/dir/codex", &HashMap::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CliError::BinaryNotFound { .. }), "got {err:?}");
}
