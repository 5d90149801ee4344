//! `codex-bridge`: run a prompt through the Codex CLI and print the
//! normalized chunk stream.
//!
//! ## Commands
//!
//! - `codex-bridge [--prompt TEXT]` - stream a response (prompt from stdin when omitted)
//! - `codex-bridge health` - check the codex binary can be launched
//! - `codex-bridge auth` - show authentication status, optionally logging in
//!
//! ## Exit Codes
//!
//! - 0: Success
//! - 1: The stream, health check or login failed
//! - 2: Configuration error

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use codex_bridge_core::config_loader::ConfigLoader;
use codex_bridge_core::config_types::AuthMode;
use codex_bridge_core::config_types::CodexCliConfig;
use codex_bridge_core::config_types::SandboxMode;

mod status_cmd;
mod stream_cmd;

pub use status_cmd::AuthArgs;
pub use status_cmd::HealthArgs;
pub use stream_cmd::StreamArgs;

pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

/// Stream Codex CLI responses as normalized text, reasoning, tool-call and usage chunks
#[derive(Debug, Parser)]
#[command(name = "codex-bridge", version)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigOverrides,

    #[command(subcommand)]
    pub command: Option<BridgeCommand>,

    #[command(flatten)]
    pub stream: StreamArgs,
}

#[derive(Debug, Subcommand)]
pub enum BridgeCommand {
    /// Run `codex --version` to check the binary can be launched
    Health(HealthArgs),

    /// Probe authentication status
    Auth(AuthArgs),
}

/// Flags layered over `config.toml` and `CODEX_BRIDGE_*` variables.
#[derive(Debug, Default, Args)]
pub struct ConfigOverrides {
    /// Directory holding config.toml (default: $CODEX_BRIDGE_HOME or ~/.codex-bridge)
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Path to the codex executable
    #[arg(long, global = true, value_name = "PATH")]
    pub binary: Option<String>,

    #[arg(long, short = 'm', global = true)]
    pub model: Option<String>,

    /// chatgpt | api-key
    #[arg(long, global = true)]
    pub auth_mode: Option<AuthMode>,

    /// Passed to codex as OPENAI_API_KEY in api-key mode
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// read-only | workspace-write | danger-full-access
    #[arg(long, global = true)]
    pub sandbox: Option<SandboxMode>,

    /// JSON schema file passed to `codex exec --output-schema`
    #[arg(long, global = true, value_name = "FILE")]
    pub output_schema: Option<PathBuf>,

    /// Let codex run without asking for approvals
    #[arg(long, global = true)]
    pub full_auto: bool,
}

impl ConfigOverrides {
    pub fn load(&self) -> anyhow::Result<CodexCliConfig> {
        let mut loader = ConfigLoader::new();
        if let Some(home) = &self.home {
            loader = loader.with_home(home.clone());
        }
        let mut config = loader.load().context("failed to load configuration")?;
        self.apply(&mut config);
        Ok(config)
    }

    pub fn apply(&self, config: &mut CodexCliConfig) {
        if let Some(binary) = &self.binary {
            config.binary_path = binary.clone();
        }
        if let Some(model) = &self.model {
            config.model = Some(model.clone());
        }
        if let Some(auth_mode) = self.auth_mode {
            config.auth_mode = auth_mode;
        }
        if let Some(api_key) = &self.api_key {
            config.api_key = Some(api_key.clone());
        }
        if let Some(sandbox) = self.sandbox {
            config.sandbox = Some(sandbox);
        }
        if let Some(schema) = &self.output_schema {
            config.output_schema = Some(schema.clone());
        }
        if self.full_auto {
            config.full_auto = true;
        }
    }
}

/// Run the parsed command and return the process exit code.
pub async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = match cli.config.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    match cli.command {
        Some(BridgeCommand::Health(args)) => status_cmd::run_health(config, args).await,
        Some(BridgeCommand::Auth(args)) => status_cmd::run_auth(config, args).await,
        None => stream_cmd::run_stream(config, cli.stream).await,
    }
}
