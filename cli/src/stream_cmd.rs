use std::io::Write;

use anyhow::Context;
use clap::Args;
use codex_bridge_core::cli_executor::CliError;
use codex_bridge_core::cli_executor::CliExecutor;
use codex_bridge_core::cli_executor::CodexCliSession;
use codex_bridge_core::cli_executor::StreamChunk;
use codex_bridge_core::cli_executor::UsageSummary;
use codex_bridge_core::cli_executor::auth_instructions;
use codex_bridge_core::cli_executor::install_instructions;
use codex_bridge_core::config_types::CodexCliConfig;
use codex_bridge_core::context_manager::Message;
use codex_bridge_core::model_info::StaticModelRegistry;
use futures::StreamExt;
use tokio::io::AsyncReadExt;

use crate::exit_codes;

#[derive(Debug, Default, Args)]
pub struct StreamArgs {
    /// Prompt text (read from stdin when omitted)
    #[arg(long, short = 'p')]
    pub prompt: Option<String>,

    /// System prompt
    #[arg(long, short = 's')]
    pub system: Option<String>,

    /// Print one JSON object per chunk instead of plain text
    #[arg(long)]
    pub json: bool,

    /// Also print reasoning chunks (to stderr) in text mode
    #[arg(long)]
    pub show_reasoning: bool,
}

pub(crate) async fn run_stream(config: CodexCliConfig, args: StreamArgs) -> anyhow::Result<i32> {
    let prompt = match args.prompt {
        Some(prompt) => prompt,
        None => {
            let mut input = String::new();
            tokio::io::stdin()
                .read_to_string(&mut input)
                .await
                .context("failed to read prompt from stdin")?;
            input
        }
    };
    if prompt.trim().is_empty() {
        eprintln!("error: empty prompt (pass --prompt or pipe text on stdin)");
        return Ok(exit_codes::CONFIG_ERROR);
    }

    let session = CodexCliSession::new(config, &StaticModelRegistry);
    tracing::debug!("Streaming with model {}", session.model().id);

    let system = args.system.unwrap_or_default();
    let mut stream = session.stream(&system, &[Message::user(prompt)]);
    let mut usage: Option<UsageSummary> = None;
    let mut stdout = std::io::stdout();

    while let Some(item) = stream.next().await {
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(e) => {
                if !args.json {
                    println!();
                }
                report_error(&e);
                return Ok(exit_codes::FAILURE);
            }
        };

        if args.json {
            println!("{}", serde_json::to_string(&chunk)?);
        }
        match chunk {
            StreamChunk::Text { text } if !args.json => {
                print!("{text}");
                stdout.flush()?;
            }
            StreamChunk::Reasoning { text } if !args.json && args.show_reasoning => {
                eprint!("{text}");
            }
            StreamChunk::Usage(summary) => usage = Some(summary),
            _ => {}
        }
    }

    if !args.json {
        println!();
    }
    if let Some(usage) = usage {
        eprintln!("{}", format_usage(&usage));
    }
    Ok(exit_codes::SUCCESS)
}

fn report_error(err: &CliError) {
    eprintln!("error: {err}");
    match err {
        CliError::BinaryNotFound { .. } => eprintln!("\n{}", install_instructions()),
        CliError::LoginFailed { .. } => eprintln!("\n{}", auth_instructions()),
        _ => {}
    }
}

fn format_usage(usage: &UsageSummary) -> String {
    let mut line = format!(
        "tokens: {} in, {} out",
        usage.input_tokens, usage.output_tokens
    );
    if let Some(cached) = usage.cache_read_tokens {
        line.push_str(&format!(", {cached} cached"));
    }
    if let Some(written) = usage.cache_write_tokens {
        line.push_str(&format!(", {written} cache writes"));
    }
    if let Some(reasoning) = usage.reasoning_tokens {
        line.push_str(&format!(", {reasoning} reasoning"));
    }
    line.push_str(&format!(" | cost ${:.6}", usage.total_cost()));
    line
}
