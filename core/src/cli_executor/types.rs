use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use super::prompt::PromptPayload;
use crate::config_types::SandboxMode;
use crate::model_info::ModelPricing;
use crate::model_info::calculate_cost;

/// Everything needed to launch one `codex exec` process.
///
/// Built once per call by the session and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub payload: PromptPayload,
    pub binary_path: String,
    pub model_id: Option<String>,
    pub output_schema: Option<PathBuf>,
    pub sandbox: Option<SandboxMode>,
    pub full_auto: bool,
    /// Merged over the inherited environment; entries here win.
    pub extra_env: HashMap<String, String>,
}

impl InvocationRequest {
    pub fn new(binary_path: impl Into<String>, payload: PromptPayload) -> Self {
        Self {
            payload,
            binary_path: binary_path.into(),
            model_id: None,
            output_schema: None,
            sandbox: None,
            full_auto: false,
            extra_env: HashMap::new(),
        }
    }
}

/// One unit of the normalized output stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    Text {
        text: String,
    },
    Reasoning {
        text: String,
    },
    ToolCallPartial {
        index: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        arguments_fragment: String,
    },
    Usage(UsageSummary),
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Reasoning { text: text.into() }
    }
}

/// Raw token counts resolved from a usage payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenCounts {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_write_tokens: u64,
    pub cache_read_tokens: u64,
    pub reasoning_tokens: Option<u64>,
}

/// Token usage plus the cost derived from it.
///
/// The cost is computed from the counts and the model's pricing at
/// construction time and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSummary {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_write_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
    total_cost: f64,
}

impl UsageSummary {
    /// Zero-valued cache counts are reported as absent.
    pub fn priced(counts: TokenCounts, pricing: &ModelPricing) -> Self {
        let total_cost = calculate_cost(
            pricing,
            counts.input_tokens,
            counts.output_tokens,
            counts.cache_write_tokens,
            counts.cache_read_tokens,
        );

        Self {
            input_tokens: counts.input_tokens,
            output_tokens: counts.output_tokens,
            cache_write_tokens: (counts.cache_write_tokens > 0).then_some(counts.cache_write_tokens),
            cache_read_tokens: (counts.cache_read_tokens > 0).then_some(counts.cache_read_tokens),
            reasoning_tokens: counts.reasoning_tokens,
            total_cost,
        }
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CliError {
    #[error("Codex CLI binary not found: {binary}. {install_hint}")]
    BinaryNotFound {
        binary: String,
        install_hint: String,
    },

    #[error("Codex CLI process error: {message}")]
    ProcessRuntime { message: String },

    #[error("Codex CLI process exited with code {code}{}", format_stderr(.stderr))]
    ProcessExit { code: i32, stderr: String },

    #[error("{message}")]
    ProtocolEvent { message: String },

    #[error("Codex CLI login failed: {detail}")]
    LoginFailed { detail: String },

    #[error("Malformed message: {details}")]
    MalformedMessage { details: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}
