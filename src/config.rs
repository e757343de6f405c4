//! Pipeline configuration and secrets.
//!
//! The config file is optional JSON; every section falls back to defaults
//! that match the hosted services the pipeline was built against. Secrets
//! never live in the config file, only in the environment (or `.env`).
use crate::error::FatalConfigurationError;
use crate::retry::RetryPolicy;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current schema version for the pipeline config file.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

pub const LOOKUP_API_KEY_ENV: &str = "PERPLEXITY_API_KEY";
pub const REMOTE_API_KEY_ENV: &str = "AIRTABLE_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub schema_version: u32,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// External lookup service settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LookupConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub timeout_secs: u64,
    /// Minimum pause between consecutive lookups, for rate limits.
    pub request_interval_ms: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.perplexity.ai/chat/completions".to_string(),
            model: "sonar".to_string(),
            temperature: 0.2,
            top_p: 0.9,
            frequency_penalty: 1.0,
            timeout_secs: 120,
            request_interval_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            multiplier: policy.multiplier,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            multiplier: self.multiplier,
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

/// Collaborative store (Airtable) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    pub api_url: String,
    pub base_id: String,
    pub page_size: usize,
    pub timeout_secs: u64,
    pub fields: RemoteFieldNames,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.airtable.com/v0".to_string(),
            base_id: "appNLda8uMnN5ZJPb".to_string(),
            page_size: 100,
            timeout_secs: 15,
            fields: RemoteFieldNames::default(),
        }
    }
}

/// Column names used when writing curated rows back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteFieldNames {
    pub name: String,
    pub organization: String,
    pub registration_url: String,
    pub categories: String,
    pub description: String,
}

impl Default for RemoteFieldNames {
    fn default() -> Self {
        Self {
            name: "Award Name".to_string(),
            organization: "Organization".to_string(),
            registration_url: "Registration URL".to_string(),
            categories: "Categories".to_string(),
            description: "Description".to_string(),
        }
    }
}

/// Build the config used when no file is present.
pub fn default_config() -> PipelineConfig {
    PipelineConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        lookup: LookupConfig::default(),
        retry: RetryConfig::default(),
        remote: RemoteConfig::default(),
    }
}

/// Load a config file from disk and validate it.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: PipelineConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Resolve config: explicit path, then the per-user config file, then defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<PipelineConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match user_config_path() {
        Some(path) if path.is_file() => {
            tracing::debug!(path = %path.display(), "using user config");
            load_config(&path)
        }
        _ => Ok(default_config()),
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bookawards").join("config.json"))
}

/// Validate schema version and value ranges.
pub fn validate_config(config: &PipelineConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    if config.lookup.endpoint.trim().is_empty() {
        return Err(anyhow!("lookup.endpoint must be non-empty"));
    }
    if config.lookup.model.trim().is_empty() {
        return Err(anyhow!("lookup.model must be non-empty"));
    }
    if config.retry.multiplier < 1.0 {
        return Err(anyhow!(
            "retry.multiplier must be at least 1.0 (got {})",
            config.retry.multiplier
        ));
    }
    if config.remote.page_size == 0 || config.remote.page_size > 100 {
        return Err(anyhow!(
            "remote.page_size must be between 1 and 100 (got {})",
            config.remote.page_size
        ));
    }
    Ok(())
}

/// Read a required secret from the environment.
pub fn require_secret(name: &str) -> Result<String, FatalConfigurationError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(FatalConfigurationError(format!(
            "{name} is not set; export it or add it to .env"
        ))),
    }
}
