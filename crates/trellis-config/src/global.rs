//! Global Configuration (~/.trellis/config.toml)
//!
//! Handles user-level run defaults stored in `~/.trellis/config.toml`.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.trellis/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default run settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Logging preferences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<LogConfig>,
}

/// Default run settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    /// Worker threads used to resolve targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    /// Resolve targets concurrently
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,

    /// Fail on same-priority scalar conflicts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,

    /// Plan output format ("json" or "jsonl")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Logging preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Filter directive, e.g. "trellis_build=debug"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(defaults) = &self.defaults {
            if defaults.jobs == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: "defaults.jobs".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            if let Some(format) = &defaults.format {
                validate_format("defaults.format", format)?;
            }
        }
        Ok(())
    }

    /// Get the global config file path (~/.trellis/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".trellis").join("config.toml"))
    }

    pub fn jobs(&self) -> Option<usize> {
        self.defaults.as_ref().and_then(|d| d.jobs)
    }

    pub fn parallel(&self) -> Option<bool> {
        self.defaults.as_ref().and_then(|d| d.parallel)
    }

    pub fn strict(&self) -> Option<bool> {
        self.defaults.as_ref().and_then(|d| d.strict)
    }

    pub fn format(&self) -> Option<&str> {
        self.defaults.as_ref().and_then(|d| d.format.as_deref())
    }

    pub fn log_filter(&self) -> Option<&str> {
        self.log.as_ref().and_then(|l| l.filter.as_deref())
    }

    /// Merge another global config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &GlobalConfig) {
        if other.defaults.is_some() {
            self.defaults = other.defaults.clone();
        }
        if other.log.is_some() {
            self.log = other.log.clone();
        }
    }
}

/// Validate a plan output format
pub(crate) fn validate_format(field: &str, value: &str) -> ConfigResult<()> {
    if !matches!(value, "json" | "jsonl") {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("must be 'json' or 'jsonl', got '{}'", value),
        });
    }
    Ok(())
}
