//! Auth probes and login, implemented by running the Codex CLI.

use std::collections::HashMap;
use std::process::Output;
use std::process::Stdio;

use async_trait::async_trait;

use super::AuthProbeSource;
use super::AuthStatus;
use super::CliAuth;
use super::is_unsupported_subcommand;
use super::parse_status_output;
use crate::cli_executor::CliError;
use crate::cli_executor::process::codex_command;
use crate::cli_executor::process::spawn_error;

pub const STATUS_ARGS: &[&str] = &["login", "status", "--json"];
pub const LOGIN_ARGS: &[&str] = &["login"];

/// Prompt used by the heuristic probe. Any successful run proves the
/// credentials work.
pub const PROBE_PROMPT: &str = "Reply with the single word OK.";

#[derive(Debug, Clone, Copy, Default)]
pub struct CodexAuthManager;

impl CodexAuthManager {
    pub fn new() -> Self {
        Self
    }

    async fn structured_probe(
        &self,
        binary: &str,
        env: &HashMap<String, String>,
    ) -> Result<Output, CliError> {
        run_captured(binary, env, STATUS_ARGS).await
    }

    async fn heuristic_probe(&self, binary: &str, env: &HashMap<String, String>) -> AuthStatus {
        let source = AuthProbeSource::HeuristicProbe;
        match run_captured(binary, env, &["exec", "--json", PROBE_PROMPT]).await {
            Ok(output) if output.status.success() => AuthStatus::authenticated(source),
            Ok(output) => AuthStatus::unauthenticated(source, failure_text(&output)),
            Err(e) => AuthStatus::unauthenticated(source, e.to_string()),
        }
    }
}

#[async_trait]
impl CliAuth for CodexAuthManager {
    async fn status(&self, binary: &str, env: &HashMap<String, String>) -> AuthStatus {
        let output = match self.structured_probe(binary, env).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("Codex CLI auth status probe could not run: {e}");
                return AuthStatus::unauthenticated(AuthProbeSource::StructuredProbe, e.to_string());
            }
        };

        if output.status.success() {
            return parse_status_output(&String::from_utf8_lossy(&output.stdout));
        }

        let failure = failure_text(&output);
        if is_unsupported_subcommand(&failure) {
            tracing::info!("Codex CLI has no structured auth status, falling back to a probe run");
            return self.heuristic_probe(binary, env).await;
        }

        tracing::warn!("Codex CLI auth status probe failed: {failure}");
        AuthStatus::unauthenticated(AuthProbeSource::StructuredProbe, failure)
    }

    async fn login(&self, binary: &str, env: &HashMap<String, String>) -> Result<(), CliError> {
        // The user interacts with the login flow directly; only stderr is kept
        // for the error message.
        let child = codex_command(binary, env)
            .args(LOGIN_ARGS)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(binary, e))?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| CliError::Internal {
                message: format!("Failed to wait for codex login: {e}"),
            })?;

        if output.status.success() {
            tracing::info!("Codex CLI login completed");
            Ok(())
        } else {
            Err(CliError::LoginFailed {
                detail: failure_text(&output),
            })
        }
    }
}

/// Run a short CLI command with stdin closed and both output streams captured.
async fn run_captured(
    binary: &str,
    env: &HashMap<String, String>,
    args: &[&str],
) -> Result<Output, CliError> {
    codex_command(binary, env)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| spawn_error(binary, e))
}

/// Stderr, else stdout, else the exit code.
fn failure_text(output: &Output) -> String {
    [&output.stderr, &output.stdout]
        .into_iter()
        .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
        .find(|text| !text.is_empty())
        .unwrap_or_else(|| match output.status.code() {
            Some(code) => format!("exited with code {code}"),
            None => "terminated by signal".to_string(),
        })
}
