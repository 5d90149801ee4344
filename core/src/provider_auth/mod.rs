//! Authentication state of the Codex CLI.
//!
//! The bridge never handles credentials for session auth itself; it asks the
//! installed CLI whether it is logged in and runs `codex login` when it is
//! not.
//!
//! # Architecture
//!
//! - [`CliAuth`] trait: status probe plus login, with `ensure_login` built on top
//! - [`CodexAuthManager`]: the implementation that shells out to the CLI
//! - [`AuthStatus`]: result of a probe, tagged with the tier that produced it
//!
//! Probing is two-tiered. The structured probe (`codex login status --json`)
//! is preferred; builds that do not know that subcommand fall back to a
//! heuristic probe that runs a trivial prompt and judges by exit status.

pub mod manager;

pub use manager::CodexAuthManager;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::cli_executor::CliError;

/// Which probe produced an [`AuthStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthProbeSource {
    StructuredProbe,
    HeuristicProbe,
}

impl fmt::Display for AuthProbeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthProbeSource::StructuredProbe => write!(f, "structured probe"),
            AuthProbeSource::HeuristicProbe => write!(f, "heuristic probe"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub source: AuthProbeSource,
    /// Status text or failure output, when there is any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuthStatus {
    pub fn authenticated(source: AuthProbeSource) -> Self {
        Self {
            authenticated: true,
            source,
            detail: None,
        }
    }

    pub fn unauthenticated(source: AuthProbeSource, detail: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            source,
            detail: Some(detail.into()),
        }
    }
}

/// Authentication seam used by the streaming session.
#[async_trait]
pub trait CliAuth: Send + Sync {
    /// Probe the current state. Never fails; problems are reported as an
    /// unauthenticated status with the failure text attached.
    async fn status(&self, binary: &str, env: &HashMap<String, String>) -> AuthStatus;

    /// Run the interactive login flow.
    async fn login(&self, binary: &str, env: &HashMap<String, String>) -> Result<(), CliError>;

    /// Log in only if the probe says we are not authenticated.
    async fn ensure_login(
        &self,
        binary: &str,
        env: &HashMap<String, String>,
    ) -> Result<(), CliError> {
        let status = self.status(binary, env).await;
        if status.authenticated {
            tracing::info!("Codex CLI authenticated ({})", status.source);
            return Ok(());
        }

        tracing::info!(
            "Codex CLI not authenticated ({}): {}; starting login",
            status.source,
            status.detail.as_deref().unwrap_or("no detail")
        );
        self.login(binary, env).await
    }
}

/// Keys older and newer CLI builds have used for the logged-in flag.
const AUTH_FLAG_KEYS: &[&str] = &[
    "authenticated",
    "logged_in",
    "loggedIn",
    "isAuthenticated",
    "is_authenticated",
];
const AUTH_STATUS_KEYS: &[&str] = &["status", "state", "auth_status", "authStatus"];

const SIGNED_OUT_MARKERS: &[&str] = &["unauth", "signed-out", "signed out", "logged out", "not logged"];
const SIGNED_IN_MARKERS: &[&str] = &["auth", "signed-in", "signed in", "logged in"];

/// Error fragments meaning the CLI does not know the status subcommand.
const UNSUPPORTED_SUBCOMMAND_MARKERS: &[&str] = &[
    "unknown command",
    "unrecognized command",
    "unknown subcommand",
    "unrecognized subcommand",
    "invalid choice",
    "unexpected argument",
];

/// Interpret the stdout of a successful structured probe.
///
/// A boolean flag wins over a status string. Output with no recognizable
/// signal counts as authenticated because the probe itself succeeded.
pub fn parse_status_output(stdout: &str) -> AuthStatus {
    let source = AuthProbeSource::StructuredProbe;
    let Ok(json) = serde_json::from_str::<Value>(stdout.trim()) else {
        tracing::debug!("Auth status output is not JSON, assuming authenticated");
        return AuthStatus::authenticated(source);
    };

    if let Some(flag) = AUTH_FLAG_KEYS
        .iter()
        .find_map(|key| json.get(*key).and_then(Value::as_bool))
    {
        return AuthStatus {
            authenticated: flag,
            source,
            detail: status_string(&json).map(str::to_string),
        };
    }

    if let Some(status) = status_string(&json) {
        let lower = status.to_lowercase();
        if SIGNED_OUT_MARKERS.iter().any(|m| lower.contains(m)) {
            return AuthStatus::unauthenticated(source, status);
        }
        if SIGNED_IN_MARKERS.iter().any(|m| lower.contains(m)) {
            return AuthStatus {
                authenticated: true,
                source,
                detail: Some(status.to_string()),
            };
        }
    }

    AuthStatus::authenticated(source)
}

fn status_string(json: &Value) -> Option<&str> {
    AUTH_STATUS_KEYS
        .iter()
        .find_map(|key| json.get(*key).and_then(Value::as_str))
}

/// Whether a failed structured probe means the subcommand is unsupported.
pub fn is_unsupported_subcommand(output: &str) -> bool {
    let lower = output.to_lowercase();
    UNSUPPORTED_SUBCOMMAND_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}
