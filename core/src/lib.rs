//! Root of the `codex-bridge-core` library.
//!
//! Drives the Codex CLI as a subprocess and turns its JSON event output into
//! a stream of [`cli_executor::StreamChunk`]s.

// Prevent accidental direct writes to stdout/stderr in library code. All
// user-visible output must go through the caller or the tracing stack.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod cli_executor;
pub mod config_loader;
pub mod config_types;
pub mod context_manager;
pub mod model_info;
pub mod provider_auth;

pub use cli_executor::ChunkStream;
pub use cli_executor::CliError;
pub use cli_executor::CliExecutor;
pub use cli_executor::CodexCliSession;
pub use cli_executor::StreamChunk;
pub use config_loader::ConfigLoader;
pub use config_types::CodexCliConfig;
pub use context_manager::Message;
