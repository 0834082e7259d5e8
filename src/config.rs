//! Configuration System
//!
//! Layered configuration: built-in defaults, then `folio.toml` in the workspace, then
//! `config/{FOLIO_ENV}.toml`, then `FOLIO__`-prefixed environment variables
//! (e.g. `FOLIO__ORCHESTRATOR__BATCH_SIZE=5`).

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolioConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scheduling and retry policy for generation runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Sections dispatched concurrently per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Automatic retries per section before it is marked failed
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before a failed attempt is re-dispatched (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_batch_size() -> usize {
    3
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    5000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl OrchestratorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Content generation service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Inline API key; prefer `api_key_env`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            api_key_env: default_api_key_env(),
            temperature: None,
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ProviderSettings {
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("provider model cannot be empty".to_string());
        }
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(format!(
                "provider endpoint must be an http(s) URL: {}",
                self.endpoint
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be positive".to_string());
        }
        Ok(())
    }
}

/// Storage locations, relative to the workspace root unless absolute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory searched for `<document_type>.toml` catalogs
    #[serde(default = "default_catalog_dir")]
    pub catalog_dir: PathBuf,
}

fn default_history_path() -> PathBuf {
    PathBuf::from(".folio/history")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".folio/out")
}

fn default_catalog_dir() -> PathBuf {
    PathBuf::from("catalogs")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
            output_dir: default_output_dir(),
            catalog_dir: default_catalog_dir(),
        }
    }
}

impl StorageConfig {
    pub fn resolve(&self, workspace_root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            workspace_root.join(path)
        }
    }
}

impl FolioConfig {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        if let Err(e) = self.orchestrator.validate() {
            errors.push(format!("orchestrator: {}", e));
        }
        if let Err(e) = self.provider.validate() {
            errors.push(format!("provider: {}", e));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            )))
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the layered configuration for a workspace.
    pub fn load(workspace_root: &Path) -> Result<FolioConfig, ApiError> {
        let env_name = std::env::var("FOLIO_ENV").unwrap_or_else(|_| "development".to_string());
        let builder = Config::builder()
            .add_source(File::from(workspace_root.join("folio.toml")).required(false))
            .add_source(
                File::from(workspace_root.join("config").join(format!("{}.toml", env_name)))
                    .required(false),
            )
            .add_source(
                Environment::with_prefix("FOLIO")
                    .separator("__")
                    .try_parsing(true),
            );
        let config: FolioConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load a single explicit file (no environment layering).
    pub fn load_from_file(path: &Path) -> Result<FolioConfig, ApiError> {
        let config: FolioConfig = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(true))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
