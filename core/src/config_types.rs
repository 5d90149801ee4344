//! Types used to define the fields of [`CodexCliConfig`].

// Note this file should generally be restricted to simple struct/enum
// definitions that do not contain business logic.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

/// Environment variable the Codex CLI reads its API key from.
pub const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

/// How the Codex CLI is authenticated before an invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    /// Interactive ChatGPT session managed by `codex login`.
    #[default]
    #[serde(rename = "chatgpt", alias = "session")]
    ChatGpt,
    /// API key injected through [`API_KEY_ENV_VAR`].
    ApiKey,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::ChatGpt => "chatgpt",
            AuthMode::ApiKey => "api-key",
        }
    }
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chatgpt" | "chat-gpt" | "session" => Ok(AuthMode::ChatGpt),
            "api-key" | "apikey" | "api_key" => Ok(AuthMode::ApiKey),
            other => Err(format!("unknown auth mode '{other}'")),
        }
    }
}

/// Value passed to `codex exec --sandbox`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxMode {
    ReadOnly,
    WorkspaceWrite,
    DangerFullAccess,
}

impl SandboxMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SandboxMode::ReadOnly => "read-only",
            SandboxMode::WorkspaceWrite => "workspace-write",
            SandboxMode::DangerFullAccess => "danger-full-access",
        }
    }
}

impl fmt::Display for SandboxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SandboxMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "read-only" => Ok(SandboxMode::ReadOnly),
            "workspace-write" => Ok(SandboxMode::WorkspaceWrite),
            "danger-full-access" => Ok(SandboxMode::DangerFullAccess),
            other => Err(format!("unknown sandbox mode '{other}'")),
        }
    }
}

/// Settings for driving the Codex CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CodexCliConfig {
    /// Path to the codex binary (default: "codex", resolved through PATH).
    pub binary_path: String,
    /// Model id; blank means the registry default.
    pub model: Option<String>,
    pub auth_mode: AuthMode,
    /// Only used when `auth_mode` is [`AuthMode::ApiKey`].
    pub api_key: Option<String>,
    pub sandbox: Option<SandboxMode>,
    pub output_schema: Option<PathBuf>,
    pub full_auto: bool,
    /// Extra variables for the child process, applied over the inherited environment.
    pub extra_env: HashMap<String, String>,
}

impl Default for CodexCliConfig {
    fn default() -> Self {
        Self {
            binary_path: "codex".to_string(),
            model: None,
            auth_mode: AuthMode::default(),
            api_key: None,
            sandbox: None,
            output_schema: None,
            full_auto: false,
            extra_env: HashMap::new(),
        }
    }
}

impl CodexCliConfig {
    /// Environment overrides for every process spawned with this config.
    ///
    /// In API-key mode a non-empty key is injected as [`API_KEY_ENV_VAR`],
    /// replacing any inherited value.
    pub fn child_env(&self) -> HashMap<String, String> {
        let mut env = self.extra_env.clone();
        if self.auth_mode == AuthMode::ApiKey
            && let Some(key) = self.api_key.as_deref().map(str::trim)
            && !key.is_empty()
        {
            env.insert(API_KEY_ENV_VAR.to_string(), key.to_string());
        }
        env
    }
}
