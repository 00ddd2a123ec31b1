//! Trellis Configuration System
//!
//! Provides the declaration manifests and run settings for trellis workspaces:
//! - Workspace manifest (trellis.toml) and included fragments (*.trellis.toml)
//! - Global user configuration (~/.trellis/config.toml)
//! - Configuration precedence and merging
//!
//! # Configuration Hierarchy
//!
//! Run settings are loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.trellis/config.toml)
//! 2. Workspace manifest (./trellis.toml)
//! 3. Environment variables (TRELLIS_*)
//! 4. CLI flags
//!
//! # Example
//!
//! ```no_run
//! use trellis_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! ```

pub mod global;
pub mod loader;
pub mod manifest;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Include '{include}' in {file} does not exist")]
    IncludeNotFound { include: String, file: PathBuf },

    #[error("Failed to scan {path}: {error}")]
    Walk {
        path: PathBuf,
        error: walkdir::Error,
    },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use global::GlobalConfig;
pub use loader::{Config, ConfigLoader, RunSettings};
pub use manifest::Manifest;
