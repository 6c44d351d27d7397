//! Runtime configuration for the control API and the native plugin manager.
//!
//! Values come from built-in defaults, an optional TOML file and the
//! `OSI2_*` environment variables, in that order of precedence (lowest first).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default message detail level for a freshly constructed control API.
pub const DEFAULT_LOG_LEVEL: u8 = 7;

/// Environment variable names.
pub mod env_vars {
    /// Directory searched for plugin libraries when no directory is given.
    pub const PLUGIN_DIR: &str = "OSI2_PLUGIN_DIR";
    /// Message detail level (0 silences the control API).
    pub const LOG_LEVEL: &str = "OSI2_LOG_LEVEL";
    /// Emit JSON log lines from the command-line front end.
    pub const LOG_JSON: &str = "OSI2_LOG_JSON";
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`Osi2Config`].
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Control API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Osi2Config {
    /// Default plugin directory. `None` defers to the plugin manager.
    pub plugin_dir: Option<String>,

    /// Message detail level.
    pub log_level: u8,

    /// Structured (JSON) log output for the command-line front end.
    pub log_json: bool,
}

impl Default for Osi2Config {
    fn default() -> Self {
        Self {
            plugin_dir: None,
            log_level: DEFAULT_LOG_LEVEL,
            log_json: false,
        }
    }
}

impl Osi2Config {
    /// Parse a configuration from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Override fields from the process environment.
    pub fn with_env(self) -> Self {
        self.with_vars(|key| std::env::var(key).ok())
    }

    /// Override fields from an arbitrary variable lookup.
    ///
    /// Unparseable values are ignored and the current value is kept.
    pub fn with_vars<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(env_vars::PLUGIN_DIR) {
            self.plugin_dir = (!dir.is_empty()).then_some(dir);
        }
        if let Some(level) = lookup(env_vars::LOG_LEVEL).and_then(|s| s.trim().parse().ok()) {
            self.log_level = level;
        }
        if let Some(json) = lookup(env_vars::LOG_JSON).and_then(|s| s.trim().parse().ok()) {
            self.log_json = json;
        }
        self
    }

    /// The configured plugin directory, or the empty string.
    pub fn plugin_dir_or_empty(&self) -> &str {
        self.plugin_dir.as_deref().unwrap_or("")
    }
}
