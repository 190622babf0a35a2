//! Configuration loading and validation for the ELIZA gateway.
//!
//! Loads configuration from `~/.eliza/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.eliza/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Session persistence and expiry
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Rule sources and engine limits
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}
fn default_request_timeout() -> u64 {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Where conversation snapshots live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// One file per session under `dir`
    #[default]
    File,
    /// Process memory only; lost on restart
    Memory,
}

impl std::fmt::Display for SessionBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionBackend::File => f.write_str("file"),
            SessionBackend::Memory => f.write_str("memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default)]
    pub backend: SessionBackend,

    /// Session directory; defaults to `~/.eliza/sessions`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Sessions untouched for longer than this are deleted
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,

    /// How often the sweeper runs
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_minutes: u64,
}

fn default_max_age_hours() -> u64 {
    24
}
fn default_sweep_interval() -> u64 {
    60
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::default(),
            dir: None,
            max_age_hours: default_max_age_hours(),
            sweep_interval_minutes: default_sweep_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Classic script file; the bundled DOCTOR script when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<PathBuf>,

    /// Bundled rule packs to merge, by name
    #[serde(default = "default_builtin_packs")]
    pub builtin_packs: Vec<String>,

    /// Additional TOML rule packs, merged in order after the bundled ones
    #[serde(default)]
    pub packs: Vec<PathBuf>,

    /// Maximum deferred replies held per conversation
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,

    /// Longest accepted utterance, in normalized words
    #[serde(default = "default_max_utterance_words")]
    pub max_utterance_words: usize,
}

fn default_builtin_packs() -> Vec<String> {
    vec!["zh".into()]
}
fn default_memory_capacity() -> usize {
    20
}
fn default_max_utterance_words() -> usize {
    2048
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            script: None,
            builtin_packs: default_builtin_packs(),
            packs: Vec::new(),
            memory_capacity: default_memory_capacity(),
            max_utterance_words: default_max_utterance_words(),
        }
    }
}

/// Upper bound on `engine.memory_capacity`.
const MAX_MEMORY_CAPACITY: usize = 1_000;

impl AppConfig {
    /// Load configuration from the default path (~/.eliza/config.toml).
    ///
    /// Environment variables override the file:
    /// - `PORT` (gateway port, as set by most hosting platforms)
    /// - `ELIZA_HOST`
    /// - `ELIZA_SESSIONS_DIR`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
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

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(port) = lookup("PORT") {
            self.gateway.port = port.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("PORT must be a port number, got '{port}'"))
            })?;
        }
        if let Some(host) = lookup("ELIZA_HOST") {
            self.gateway.host = host;
        }
        if let Some(dir) = lookup("ELIZA_SESSIONS_DIR") {
            self.sessions.dir = Some(PathBuf::from(dir));
        }
        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".eliza")
    }

    /// The session directory in effect.
    pub fn sessions_dir(&self) -> PathBuf {
        self.sessions
            .dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("sessions"))
    }

    /// `host:port` for binding the gateway.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.port must be non-zero".into(),
            ));
        }
        if self.gateway.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.request_timeout_secs must be > 0".into(),
            ));
        }
        if self.sessions.max_age_hours == 0 {
            return Err(ConfigError::ValidationError(
                "sessions.max_age_hours must be > 0".into(),
            ));
        }
        if self.sessions.sweep_interval_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "sessions.sweep_interval_minutes must be > 0".into(),
            ));
        }
        if self.engine.memory_capacity > MAX_MEMORY_CAPACITY {
            return Err(ConfigError::ValidationError(format!(
                "engine.memory_capacity must be at most {MAX_MEMORY_CAPACITY}"
            )));
        }
        if self.engine.max_utterance_words == 0 {
            return Err(ConfigError::ValidationError(
                "engine.max_utterance_words must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
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
