use clap::Args;
use codex_bridge_core::cli_executor::CliError;
use codex_bridge_core::cli_executor::CliExecutor;
use codex_bridge_core::cli_executor::CodexCliSession;
use codex_bridge_core::cli_executor::auth_instructions;
use codex_bridge_core::cli_executor::install_instructions;
use codex_bridge_core::cli_executor::is_available;
use codex_bridge_core::config_types::AuthMode;
use codex_bridge_core::config_types::CodexCliConfig;
use codex_bridge_core::model_info::StaticModelRegistry;
use codex_bridge_core::provider_auth::CliAuth;
use codex_bridge_core::provider_auth::CodexAuthManager;
use serde_json::json;

use crate::exit_codes;

#[derive(Debug, Args)]
pub struct HealthArgs {
    /// Output as JSON for automation
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct AuthArgs {
    /// Run `codex login` when not authenticated
    #[arg(long)]
    pub login: bool,

    /// Output as JSON for automation
    #[arg(long)]
    pub json: bool,
}

pub(crate) async fn run_health(config: CodexCliConfig, args: HealthArgs) -> anyhow::Result<i32> {
    let binary = config.binary_path.clone();
    let available = is_available(&binary);
    tracing::debug!("{binary} resolvable: {available}");

    let session = CodexCliSession::new(config, &StaticModelRegistry);
    let model = session.model().id.clone();
    let result = session.health_check().await;

    if args.json {
        let report = match &result {
            Ok(version) => json!({
                "healthy": true,
                "available": available,
                "binary": binary,
                "version": version,
                "model": model,
            }),
            Err(e) => json!({
                "healthy": false,
                "available": available,
                "binary": binary,
                "error": e.to_string(),
                "model": model,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match &result {
            Ok(version) => println!("{binary}: {version} (model {model})"),
            Err(e) => {
                if !available {
                    eprintln!("{binary} is not an executable path and was not found on PATH");
                }
                eprintln!("error: {e}");
                if matches!(e, CliError::BinaryNotFound { .. }) {
                    eprintln!("\n{}", install_instructions());
                }
            }
        }
    }

    Ok(if result.is_ok() {
        exit_codes::SUCCESS
    } else {
        exit_codes::FAILURE
    })
}

pub(crate) async fn run_auth(config: CodexCliConfig, args: AuthArgs) -> anyhow::Result<i32> {
    if config.auth_mode == AuthMode::ApiKey {
        let has_key = config
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({"auth_mode": "api-key", "api_key_set": has_key}))?
            );
        } else {
            println!(
                "auth mode api-key, key {}",
                if has_key { "configured" } else { "missing" }
            );
        }
        return Ok(if has_key {
            exit_codes::SUCCESS
        } else {
            exit_codes::FAILURE
        });
    }

    let auth = CodexAuthManager::new();
    let env = config.child_env();

    if args.login
        && let Err(e) = auth.ensure_login(&config.binary_path, &env).await
    {
        eprintln!("error: {e}\n\n{}", auth_instructions());
        return Ok(exit_codes::FAILURE);
    }

    let status = auth.status(&config.binary_path, &env).await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        let state = if status.authenticated {
            "authenticated"
        } else {
            "not authenticated"
        };
        match &status.detail {
            Some(detail) => println!("{state} ({}): {detail}", status.source),
            None => println!("{state} ({})", status.source),
        }
        if !status.authenticated {
            eprintln!("\n{}", auth_instructions());
        }
    }

    Ok(if status.authenticated {
        exit_codes::SUCCESS
    } else {
        exit_codes::FAILURE
    })
}
