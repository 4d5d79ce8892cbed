//! Configuration for rgwible
//!
//! Connection defaults and logging settings can be kept in an optional
//! `rgwible.toml` so they do not have to be repeated on every invocation:
//!
//! ```toml
//! [connection]
//! host = "rgw.example.com"
//! port = 8000
//! use_ssl = false
//! region = "us-east-1"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Precedence is flags > environment > config file; secrets may live here
//! too, but are never logged.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const PROJECT_CONFIG: &str = "rgwible.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection defaults applied when flags and environment are silent
    pub connection: ConnectionDefaults,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Connection defaults from the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionDefaults {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub use_ssl: Option<bool>,
    pub verify: Option<bool>,
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base filter level used when no -v flags are given
    pub level: Option<String>,
}

impl Config {
    /// Load configuration from an explicit path, the project-local
    /// `rgwible.toml`, or fall back to defaults.
    pub fn load(explicit: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let project = Path::new(PROJECT_CONFIG);
        if project.exists() {
            return Self::from_file(project);
        }

        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }
}
