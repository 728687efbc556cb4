//! Configuration management for the LanShare server.
//!
//! This module provides TOML-based configuration file loading and saving.
//! A `lanshare.toml` in the working directory wins over the platform default
//! `~/.config/lanshare/config.toml`.

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frontend::DEFAULT_INDEX;

/// Name of the config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "lanshare.toml";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8000;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("host must be an IP address, got {0}")]
    InvalidHost(String),

    #[error("share directory must not be empty")]
    EmptyShareDirectory,

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("frontend index must be a plain file name, got {0:?}")]
    InvalidFrontendIndex(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the LanShare server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Listener configuration.
    pub server: ServerConfig,

    /// Shared directory configuration.
    pub share: ShareConfig,

    /// Logging configuration.
    pub log: LogConfig,

    /// Optional browser front-end.
    pub frontend: FrontendConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind (default: all interfaces).
    pub host: String,

    /// TCP port; 0 picks an ephemeral port.
    pub port: u16,
}

/// Shared directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShareConfig {
    /// Directory to expose. Relative paths are resolved against the working
    /// directory; the directory is created at startup if missing.
    pub directory: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub level: String,
}

/// Front-end hosting configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FrontendConfig {
    /// Directory holding the browser UI. Not served when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Page served for `/` and directory paths.
    pub index: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./shared_files"),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            directory: None,
            index: DEFAULT_INDEX.to_string(),
        }
    }
}

/// Returns the platform configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lanshare")
        .join("config.toml")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - LANSHARE_HOST: Override listen address
    /// - LANSHARE_PORT: Override listen port
    /// - LANSHARE_SHARED_DIR: Override shared directory
    /// - LANSHARE_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    /// - LANSHARE_FRONTEND_DIR: Serve a browser front-end from this directory
    pub fn apply_env_overrides(&mut self) {
        if let Some(host) = non_empty_env("LANSHARE_HOST") {
            tracing::info!("Overriding host from environment: {}", host);
            self.server.host = host;
        }

        if let Some(port) = non_empty_env("LANSHARE_PORT") {
            match port.parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Overriding port from environment: {}", port);
                    self.server.port = port;
                }
                Err(_) => tracing::warn!("Ignoring invalid LANSHARE_PORT value: {}", port),
            }
        }

        if let Some(dir) = non_empty_env("LANSHARE_SHARED_DIR") {
            tracing::info!("Overriding shared directory from environment: {}", dir);
            self.share.directory = PathBuf::from(dir);
        }

        if let Some(level) = non_empty_env("LANSHARE_LOG_LEVEL") {
            tracing::info!("Overriding log level from environment: {}", level);
            self.log.level = level;
        }

        if let Some(dir) = non_empty_env("LANSHARE_FRONTEND_DIR") {
            tracing::info!("Overriding frontend directory from environment: {}", dir);
            self.frontend.directory = Some(PathBuf::from(dir));
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.parse::<IpAddr>().is_err() {
            return Err(ConfigError::InvalidHost(self.server.host.clone()));
        }

        if self.share.directory.as_os_str().is_empty() {
            return Err(ConfigError::EmptyShareDirectory);
        }

        let level = self.log.level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.log.level.clone()));
        }

        let index = &self.frontend.index;
        if index.is_empty() || index == "." || index == ".." || index.contains(['/', '\\']) {
            return Err(ConfigError::InvalidFrontendIndex(index.clone()));
        }

        Ok(())
    }

    /// Socket address to listen on. Call [`validate`](Self::validate) first.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default location.
    ///
    /// `lanshare.toml` in the working directory is used when present,
    /// otherwise the platform config path.
    pub fn load_default() -> Result<Self> {
        let local = Path::new(LOCAL_CONFIG_FILE);
        if local.is_file() {
            tracing::info!("Using config file: {}", local.display());
            return Self::load(local);
        }
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
