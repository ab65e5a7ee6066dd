//! Configuration loading, validation, and management for memloop.
//!
//! Loads configuration from `~/.memloop/config.toml` with environment
//! variable overrides. Validates all settings at startup so that a bad
//! setting fails the session before any query runs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.memloop/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Anthropic API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model used for both the loop and the summarizer
    #[serde(default = "default_model")]
    pub model: String,

    /// Max tokens per loop completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Orchestration loop and memory settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Tool host settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Inference endpoint settings
    #[serde(default)]
    pub provider: ProviderConfig,
}

fn default_model() -> String {
    "claude-3-5-sonnet-20241022".into()
}
fn default_max_tokens() -> u32 {
    1000
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .field("provider", &self.provider)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Messages kept in the conversation window
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Hard ceiling on completion requests per query
    #[serde(default = "default_max_total_loops")]
    pub max_total_loops: u32,

    /// Summarize once the persistent log holds more entries than this
    #[serde(default = "default_summary_threshold")]
    pub summary_threshold: usize,

    /// How many recent persistent entries feed each summary
    #[serde(default = "default_summary_span")]
    pub summary_span: usize,

    /// Max tokens for a summarization completion
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,

    /// System prompt placed at the head of every conversation
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_window_size() -> usize {
    20
}
fn default_max_total_loops() -> u32 {
    10
}
fn default_summary_threshold() -> usize {
    5
}
fn default_summary_span() -> usize {
    5
}
fn default_summary_max_tokens() -> u32 {
    500
}
fn default_system_prompt() -> String {
    concat!(
        "You are a helpful assistant. You can use tools to answer questions and perform tasks. ",
        "Remember to use tools only when necessary, and always provide clear responses."
    )
    .into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            max_total_loops: default_max_total_loops(),
            summary_threshold: default_summary_threshold(),
            summary_span: default_summary_span(),
            summary_max_tokens: default_summary_max_tokens(),
            system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Tools to register, by name
    #[serde(default = "default_enabled_tools")]
    pub enabled: Vec<String>,

    /// Per-invocation deadline
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,

    /// TTL for cacheable tool results; 0 disables the cache
    #[serde(default)]
    pub cache_ttl_secs: u64,

    /// Maximum cached results
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Base commands `execute_command` may run. Empty = built-in read-only set.
    #[serde(default)]
    pub allowed_commands: Vec<String>,

    /// Path prefixes file tools must never touch
    #[serde(default = "default_forbidden_paths")]
    pub forbidden_paths: Vec<String>,

    /// If non-empty, file tools are confined to these roots
    #[serde(default)]
    pub allowed_roots: Vec<String>,
}

fn default_enabled_tools() -> Vec<String> {
    [
        "execute_command",
        "list_allowed_commands",
        "list_directory",
        "read_file",
        "create_file",
        "delete_file",
        "get_system_resources",
        "get_process_info",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_tool_timeout() -> u64 {
    30
}
fn default_cache_capacity() -> usize {
    1000
}
fn default_forbidden_paths() -> Vec<String> {
    vec![
        "~/.ssh".into(),
        "~/.gnupg".into(),
        "~/.aws".into(),
        "/etc/shadow".into(),
    ]
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_tools(),
            timeout_secs: default_tool_timeout(),
            cache_ttl_secs: 0,
            cache_capacity: default_cache_capacity(),
            allowed_commands: vec![],
            forbidden_paths: default_forbidden_paths(),
            allowed_roots: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Override for the Messages API base URL (proxies, tests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// HTTP request timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    300
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.memloop/config.toml).
    ///
    /// Environment overrides:
    /// - `MEMLOOP_API_KEY`, then `ANTHROPIC_API_KEY` (when the file has no key)
    /// - `MEMLOOP_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("MEMLOOP_API_KEY")
                .ok()
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("MEMLOOP_MODEL") {
            config.model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".memloop")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("model must not be empty".into()));
        }

        if self.max_tokens == 0 || self.agent.summary_max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "max_tokens and agent.summary_max_tokens must be > 0".into(),
            ));
        }

        if let Some(t) = self.temperature
            && !(0.0..=1.0).contains(&t)
        {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 1.0".into(),
            ));
        }

        if self.agent.window_size == 0 {
            return Err(ConfigError::ValidationError(
                "agent.window_size must be at least 1".into(),
            ));
        }

        if self.agent.max_total_loops == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_total_loops must be at least 1".into(),
            ));
        }

        if self.agent.summary_span == 0 {
            return Err(ConfigError::ValidationError(
                "agent.summary_span must be at least 1".into(),
            ));
        }

        if self.tools.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tools.timeout_secs must be > 0".into(),
            ));
        }

        if let Some(url) = &self.provider.base_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(ConfigError::ValidationError(format!(
                "provider.base_url '{url}' is not an http(s) URL"
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: None,
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for memloop_core::Error {
    fn from(e: ConfigError) -> Self {
        memloop_core::Error::config(e.to_string())
    }
}
