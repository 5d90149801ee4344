//! Layered configuration loader for the Codex bridge.
//!
//! Three layers with precedence (later layers override earlier):
//! 1. Default config ([`CodexCliConfig::default`])
//! 2. File config (`config.toml` under the bridge home)
//! 3. Environment overrides (`CODEX_BRIDGE_*` variables)
//!
//! ## Example
//!
//! ```no_run
//! use codex_bridge_core::config_loader::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .with_env_prefix("CODEX_BRIDGE")
//!     .load()
//!     .expect("Failed to load config");
//! ```

use std::env;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

use crate::config_types::AuthMode;
use crate::config_types::CodexCliConfig;
use crate::config_types::SandboxMode;

const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("I/O error loading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Invalid value for ${var}: '{value}' (expected: {expected})")]
    InvalidEnvValue {
        var: String,
        value: String,
        expected: String,
    },

    #[error("Cannot determine home directory")]
    NoHomeDir,
}

/// Builder for layered configuration loading.
pub struct ConfigLoader {
    home: Option<PathBuf>,
    env_prefix: String,
    skip_file: bool,
    skip_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// By default the home directory is auto-detected, the environment
    /// prefix is "CODEX_BRIDGE" and all layers are enabled.
    pub fn new() -> Self {
        Self {
            home: None,
            env_prefix: "CODEX_BRIDGE".to_string(),
            skip_file: false,
            skip_env: false,
        }
    }

    /// Set the directory holding `config.toml` explicitly.
    pub fn with_home(mut self, path: PathBuf) -> Self {
        self.home = Some(path);
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn skip_file_layer(mut self) -> Self {
        self.skip_file = true;
        self
    }

    pub fn skip_env_layer(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Load configuration with all enabled layers.
    ///
    /// Precedence: default < file < environment
    pub fn load(self) -> Result<CodexCliConfig, ConfigLoadError> {
        let mut config = CodexCliConfig::default();

        if !self.skip_file {
            let home = self.resolve_home()?;
            if let Some(file_config) = Self::load_from_file(&home)? {
                config = file_config;
            }
        }

        if !self.skip_env {
            Self::apply_env_overrides(&mut config, &self.env_prefix, |name| env::var(name).ok())?;
        }

        Ok(config)
    }

    /// Priority: explicit home, then `$<PREFIX>_HOME`, then `~/.codex-bridge`.
    fn resolve_home(&self) -> Result<PathBuf, ConfigLoadError> {
        self.resolve_home_with(|name| env::var(name).ok())
    }

    fn resolve_home_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<PathBuf, ConfigLoadError> {
        if let Some(ref path) = self.home {
            return Ok(path.clone());
        }

        if let Some(path) = lookup(&format!("{}_HOME", self.env_prefix)) {
            return Ok(PathBuf::from(path));
        }

        dirs::home_dir()
            .map(|home| home.join(".codex-bridge"))
            .ok_or(ConfigLoadError::NoHomeDir)
    }

    /// Returns `Ok(None)` when no config file exists.
    pub fn load_from_file(home: &Path) -> Result<Option<CodexCliConfig>, ConfigLoadError> {
        let config_path = home.join(CONFIG_FILE_NAME);

        let contents = match std::fs::read_to_string(&config_path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("{CONFIG_FILE_NAME} not found at {config_path:?}, using defaults");
                return Ok(None);
            }
            Err(e) => return Err(ConfigLoadError::Io(e)),
        };

        let config: CodexCliConfig = toml::from_str(&contents)?;
        tracing::debug!("Loaded config from {config_path:?}");
        Ok(Some(config))
    }

    /// Apply `<PREFIX>_*` overrides read through `lookup`.
    ///
    /// Recognized suffixes: `BINARY`, `MODEL`, `AUTH_MODE`, `API_KEY`,
    /// `SANDBOX`, `OUTPUT_SCHEMA`, `FULL_AUTO`.
    pub fn apply_env_overrides(
        config: &mut CodexCliConfig,
        prefix: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigLoadError> {
        let var = |suffix: &str| format!("{prefix}_{suffix}");

        if let Some(binary) = lookup(&var("BINARY")) {
            config.binary_path = binary;
        }
        if let Some(model) = lookup(&var("MODEL")) {
            config.model = Some(model);
        }
        if let Some(value) = lookup(&var("AUTH_MODE")) {
            config.auth_mode = value
                .parse::<AuthMode>()
                .map_err(|_| ConfigLoadError::InvalidEnvValue {
                    var: var("AUTH_MODE"),
                    value,
                    expected: "chatgpt | api-key".to_string(),
                })?;
        }
        if let Some(key) = lookup(&var("API_KEY")) {
            config.api_key = Some(key);
        }
        if let Some(value) = lookup(&var("SANDBOX")) {
            config.sandbox = Some(value.parse::<SandboxMode>().map_err(|_| {
                ConfigLoadError::InvalidEnvValue {
                    var: var("SANDBOX"),
                    value,
                    expected: "read-only | workspace-write | danger-full-access".to_string(),
                }
            })?);
        }
        if let Some(path) = lookup(&var("OUTPUT_SCHEMA")) {
            config.output_schema = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup(&var("FULL_AUTO")) {
            config.full_auto = parse_bool(&value).ok_or_else(|| ConfigLoadError::InvalidEnvValue {
                var: var("FULL_AUTO"),
                value,
                expected: "true | false".to_string(),
            })?;
        }

        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
