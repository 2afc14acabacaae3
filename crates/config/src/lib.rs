//! Configuration loading and validation for Palaver.
//!
//! Loads configuration from `~/.palaver/config.toml` with environment
//! variable overrides, and turns it into the [`SendOptions`] and
//! [`ResolutionLimits`] the core consumes.

use palaver_core::{
    DEFAULT_MAX_DEPTH, DEFAULT_MAX_TOKENS, DEFAULT_TOKEN_BUDGET, ResolutionLimits, SendOptions,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.palaver/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PalaverConfig {
    /// System prompt sent ahead of every context
    #[serde(default = "default_system_message")]
    pub system_message: String,

    /// Max tokens per adapter response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Limits for recursive tool resolution
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_system_message() -> String {
    "You are a helpful assistant.".into()
}
fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

/// Bounds for `resolve_tool_calls_recurse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Maximum adapter round-trips per resolution
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Total tokens a resolution may spend before it stops re-prompting
    #[serde(default = "default_token_budget")]
    pub token_budget: u32,
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}
fn default_token_budget() -> u32 {
    DEFAULT_TOKEN_BUDGET
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            token_budget: default_token_budget(),
        }
    }
}

impl ResolutionConfig {
    pub fn limits(&self) -> ResolutionLimits {
        ResolutionLimits {
            max_depth: self.max_depth,
            token_budget: self.token_budget,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"info"` or `"palaver_core=debug"`
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

impl PalaverConfig {
    /// Load configuration from the default path (~/.palaver/config.toml).
    ///
    /// Environment variables take precedence over the file:
    /// - `PALAVER_SYSTEM_MESSAGE`
    /// - `PALAVER_MAX_TOKENS`
    /// - `PALAVER_MAX_DEPTH`
    /// - `PALAVER_TOKEN_BUDGET`
    /// - `PALAVER_LOG`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
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

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup. `load` passes
    /// `std::env::var`; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(system_message) = lookup("PALAVER_SYSTEM_MESSAGE") {
            self.system_message = system_message;
        }
        if let Some(value) = lookup("PALAVER_MAX_TOKENS") {
            self.max_tokens = parse_env("PALAVER_MAX_TOKENS", &value)?;
        }
        if let Some(value) = lookup("PALAVER_MAX_DEPTH") {
            self.resolution.max_depth = parse_env("PALAVER_MAX_DEPTH", &value)?;
        }
        if let Some(value) = lookup("PALAVER_TOKEN_BUDGET") {
            self.resolution.token_budget = parse_env("PALAVER_TOKEN_BUDGET", &value)?;
        }
        if let Some(filter) = lookup("PALAVER_LOG") {
            self.logging.filter = filter;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".palaver")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "max_tokens must be greater than 0".into(),
            ));
        }

        if self.resolution.max_depth == 0 {
            return Err(ConfigError::ValidationError(
                "resolution.max_depth must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Send options carrying the configured system message and token limit.
    pub fn send_options(&self) -> SendOptions {
        SendOptions::new(self.system_message.clone(), self.max_tokens)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for PalaverConfig {
    fn default() -> Self {
        Self {
            system_message: default_system_message(),
            max_tokens: default_max_tokens(),
            resolution: ResolutionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn parse_env(var: &'static str, value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| ConfigError::InvalidEnv {
            var,
            value: value.to_string(),
            reason: e.to_string(),
        })
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

    #[error("Invalid value {value:?} for {var}: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },
}
