//! # Configuration Module
//!
//! TOML configuration for the mirel server and CLI.
//!
//! Configuration is resolved in three layers, strongest first:
//! 1. Environment variables (`MIREL_*`)
//! 2. Config file (`mirel.toml` or `--config <path>`)
//! 3. Built-in defaults
//!
//! The file layer is optional: a missing `mirel.toml` in the working
//! directory is fine, but a path given explicitly via `--config` must exist.

use mirel_core::MirelError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "mirel.toml";

// =============================================================================
// CONFIG TYPES
// =============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MirelConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Comma-separated allowed CORS origins, or "*" for all.
    pub cors_origins: Option<String>,
    /// Requests per second, 0 disables rate limiting.
    pub rate_limit: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origins: None,
            rate_limit: None,
        }
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl MirelConfig {
    /// Load configuration for the given `--config` argument.
    ///
    /// With `Some(path)` the file must exist and parse. With `None` the
    /// default file is read when present, otherwise defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self, MirelError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, MirelError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MirelError::Io(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&content)
            .map_err(|e| MirelError::Serialization(format!("Failed to parse config file: {}", e)))
    }
}

// =============================================================================
// TESTS
// =============================================================================
