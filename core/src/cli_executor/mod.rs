use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

pub mod codex;
pub mod process;
pub mod prompt;
pub mod stream;
pub mod types;
pub mod usage;

pub use codex::CodexCliSession;
pub use codex::auth_instructions;
pub use codex::install_instructions;
pub use codex::is_available;
pub use process::ProcessHandle;
pub use process::ProcessRunner;
pub use process::ProcessState;
pub use prompt::PromptPayload;
pub use prompt::build_prompt;
pub use types::*;

use crate::context_manager::Message;
use crate::model_info::ResolvedModel;

/// Normalized output of one invocation. Ends after the first error.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, CliError>> + Send>>;

/// Core trait for CLI-based model executors
///
/// Implementations spawn an external CLI per request, write the prompt to
/// its stdin and normalize what it prints.
#[async_trait]
pub trait CliExecutor: Send + Sync {
    /// Stream a response to `messages`.
    ///
    /// Nothing runs until the stream is first polled. Dropping the stream
    /// terminates the underlying process.
    fn stream(&self, system_prompt: &str, messages: &[Message]) -> ChunkStream;

    /// Check the CLI can be launched; returns its version string.
    async fn health_check(&self) -> Result<String, CliError>;

    /// Model id sent to the CLI and the capabilities it resolved to.
    fn model(&self) -> &ResolvedModel;
}
