//! Workspace loading and run settings for CLI commands
//!
//! Run settings come from the global config, the manifest and TRELLIS_*
//! variables (see `trellis_config::ConfigLoader`); flags given on the command
//! line are applied last.

use anyhow::{Context, Result};
use std::path::Path;
use trellis_build::{load_workspace, PlanConfig, Workspace};
use trellis_config::{Config, ConfigLoader, RunSettings};

/// A loaded manifest and the workspace registered from it
pub struct Session {
    pub config: Config,
    pub workspace: Workspace,
}

impl Session {
    /// Register the declarations of a loaded configuration
    pub fn from_config(config: Config) -> Result<Self> {
        let workspace = load_workspace(&config).with_context(|| {
            format!(
                "Invalid declarations in {}",
                config.manifest_path.display()
            )
        })?;
        tracing::debug!(
            manifest = %config.manifest_path.display(),
            fragments = config.fragments.len(),
            "loaded workspace"
        );
        Ok(Self { config, workspace })
    }

    pub fn settings(&self) -> &RunSettings {
        &self.config.settings
    }
}

/// Load from an explicit manifest, or walk up from the current directory
pub fn load_config(manifest: Option<&Path>) -> Result<Config> {
    let mut loader = ConfigLoader::new();
    match manifest {
        Some(path) => loader
            .load_from_file(path)
            .with_context(|| format!("Failed to load manifest {}", path.display())),
        None => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            loader
                .load_from_directory(&cwd)
                .context("Failed to find trellis.toml in this directory or any parent")
        }
    }
}

/// Command-line overrides of the run settings
#[derive(Debug, Clone, Default)]
pub struct PlanFlags {
    pub targets: Vec<String>,
    pub solution: Option<String>,
    pub strict: bool,
    pub jobs: Option<usize>,
    pub no_parallel: bool,
}

impl PlanFlags {
    /// Merge flags over run settings; a flag that is set always wins
    pub fn plan_config(&self, settings: &RunSettings) -> PlanConfig {
        PlanConfig {
            strict: self.strict || settings.strict,
            parallel: !self.no_parallel && settings.parallel,
            jobs: self.jobs.or(settings.jobs),
            targets: self.targets.clone(),
            solution: self.solution.clone(),
        }
    }
}

/// Where plan output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    /// One pretty-printed JSON document
    Json,
    /// One JSON object per line, streamed
    JsonLines,
}

impl OutputFormat {
    pub fn resolve(jsonl_flag: bool, settings: &RunSettings) -> Self {
        if jsonl_flag || settings.format == "jsonl" {
            Self::JsonLines
        } else {
            Self::Json
        }
    }
}
