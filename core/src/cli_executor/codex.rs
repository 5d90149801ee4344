use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::Stream;

use super::ChunkStream;
use super::CliExecutor;
use super::process::ProcessRunner;
use super::process::codex_command;
use super::process::spawn_error;
use super::prompt::PromptPayload;
use super::prompt::build_prompt;
use super::stream::check_event_error;
use super::stream::normalize_event;
use super::stream::parse_event_line;
use super::types::CliError;
use super::types::InvocationRequest;
use super::types::StreamChunk;
use crate::config_types::AuthMode;
use crate::config_types::CodexCliConfig;
use crate::context_manager::Message;
use crate::model_info::ModelRegistry;
use crate::model_info::ResolvedModel;
use crate::provider_auth::CliAuth;
use crate::provider_auth::CodexAuthManager;

/// Streaming session over the Codex CLI.
///
/// Each call to [`CliExecutor::stream`] spawns a fresh `codex exec` process;
/// nothing is shared between calls except the configuration.
pub struct CodexCliSession {
    config: CodexCliConfig,
    model: ResolvedModel,
    auth: Arc<dyn CliAuth>,
}

impl CodexCliSession {
    /// Resolve the configured model against `registry` once, up front.
    pub fn new(config: CodexCliConfig, registry: &dyn ModelRegistry) -> Self {
        let model = registry.resolve(config.model.as_deref());
        Self {
            config,
            model,
            auth: Arc::new(CodexAuthManager::new()),
        }
    }

    /// Replace the auth implementation.
    pub fn with_auth(mut self, auth: Arc<dyn CliAuth>) -> Self {
        self.auth = auth;
        self
    }

    pub fn config(&self) -> &CodexCliConfig {
        &self.config
    }

    /// The request the session would send for `payload`.
    pub fn invocation(&self, payload: PromptPayload) -> InvocationRequest {
        invocation_request(&self.config, &self.model, payload, self.config.child_env())
    }
}

fn invocation_request(
    config: &CodexCliConfig,
    model: &ResolvedModel,
    payload: PromptPayload,
    extra_env: HashMap<String, String>,
) -> InvocationRequest {
    InvocationRequest {
        payload,
        binary_path: config.binary_path.clone(),
        model_id: Some(model.id.clone()),
        output_schema: config.output_schema.clone(),
        sandbox: config.sandbox,
        full_auto: config.full_auto,
        extra_env,
    }
}

/// Auth, prompt, process, then one normalized chunk at a time.
///
/// The first error ends the stream. Dropping the stream drops the process
/// handle, which kills the child if it is still running.
fn chunk_stream(
    config: CodexCliConfig,
    model: ResolvedModel,
    auth: Arc<dyn CliAuth>,
    system_prompt: String,
    messages: Vec<Message>,
) -> impl Stream<Item = Result<StreamChunk, CliError>> + Send {
    try_stream! {
        let env = config.child_env();
        if config.auth_mode == AuthMode::ChatGpt {
            auth.ensure_login(&config.binary_path, &env).await?;
        }

        let payload = build_prompt(&system_prompt, &messages)?;
        let request = invocation_request(&config, &model, payload, env);
        let mut process = ProcessRunner::start(&request)?;

        while let Some(line) = process.next_line().await? {
            let Some(event) = parse_event_line(&line) else {
                continue;
            };
            check_event_error(&event)?;
            for chunk in normalize_event(&event, &model.descriptor) {
                yield chunk;
            }
        }
    }
}

#[async_trait]
impl CliExecutor for CodexCliSession {
    fn stream(&self, system_prompt: &str, messages: &[Message]) -> ChunkStream {
        Box::pin(chunk_stream(
            self.config.clone(),
            self.model.clone(),
            Arc::clone(&self.auth),
            system_prompt.to_string(),
            messages.to_vec(),
        ))
    }

    async fn health_check(&self) -> Result<String, CliError> {
        let binary = &self.config.binary_path;
        let output = codex_command(binary, &self.config.child_env())
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(binary, e))?;

        if !output.status.success() {
            return Err(CliError::ProcessExit {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::info!("Codex CLI health check passed: {version}");
        Ok(version)
    }

    fn model(&self) -> &ResolvedModel {
        &self.model
    }
}

/// Whether `binary` resolves to an executable, either as a path or on PATH.
pub fn is_available(binary: &str) -> bool {
    which::which(binary).is_ok()
}

pub fn install_instructions() -> &'static str {
    "Install the Codex CLI:\n  npm install -g @openai/codex\nor\n  brew install --cask codex\n\
     Then set binary_path (or CODEX_BRIDGE_BINARY) if codex is not on PATH."
}

pub fn auth_instructions() -> &'static str {
    "Authenticate the Codex CLI with one of:\n  codex login            (ChatGPT account, auth_mode = \"chatgpt\")\n  \
     auth_mode = \"api-key\"  (set api_key or CODEX_BRIDGE_API_KEY; passed as OPENAI_API_KEY)"
}
