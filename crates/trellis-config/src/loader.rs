//! Configuration Loader
//!
//! Finds the workspace manifest, splices its included fragments in, and merges
//! run settings from every source with proper precedence.

use crate::global::{validate_format, GlobalConfig};
use crate::manifest::{Manifest, FRAGMENT_SUFFIX, MANIFEST_FILE};
use crate::{ConfigError, ConfigResult};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Configuration loader
///
/// Run settings are merged with the following precedence:
/// 1. Global config (~/.trellis/config.toml) - lowest priority
/// 2. Workspace manifest (./trellis.toml) - overrides global
/// 3. Environment variables (TRELLIS_*) - overrides manifest
/// 4. CLI flags - highest priority (handled by caller)
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Root manifest with every fragment spliced in
    pub manifest: Manifest,

    /// Global configuration
    pub global: GlobalConfig,

    /// Directory containing trellis.toml
    pub workspace_root: PathBuf,

    /// Path of trellis.toml
    pub manifest_path: PathBuf,

    /// Fragment files in the order they were merged
    pub fragments: Vec<PathBuf>,

    /// Effective run settings
    pub settings: RunSettings,
}

/// Settings that control a planning run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub strict: bool,
    pub parallel: bool,
    /// Worker threads (None: rayon's default)
    pub jobs: Option<usize>,
    /// "json" or "jsonl"
    pub format: String,
    pub log_filter: Option<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            strict: false,
            parallel: true,
            jobs: None,
            format: "json".to_string(),
            log_filter: None,
        }
    }
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use a specific global config file instead of ~/.trellis/config.toml
    pub fn with_global_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find trellis.toml.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let manifest_path = Self::find_manifest(start_dir)?;
        self.load_from_file(&manifest_path)
    }

    /// Load configuration from a specific manifest file
    pub fn load_from_file(&mut self, manifest_path: &Path) -> ConfigResult<Config> {
        let (manifest, fragments) = load_manifest_tree(manifest_path)?;
        let global = self.load_global_config()?;
        let settings = apply_env_overrides(Self::base_settings(&global, &manifest))?;

        let workspace_root = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(Config {
            manifest,
            global,
            workspace_root,
            manifest_path: manifest_path.to_path_buf(),
            fragments,
            settings,
        })
    }

    /// Find trellis.toml by walking up the directory tree
    pub fn find_manifest(start_dir: &Path) -> ConfigResult<PathBuf> {
        let mut current = start_dir.to_path_buf();

        loop {
            let candidate = current.join(MANIFEST_FILE);
            if candidate.is_file() {
                return Ok(candidate);
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Err(ConfigError::NotFound(start_dir.join(MANIFEST_FILE))),
            }
        }
    }

    /// Load global configuration from ~/.trellis/config.toml
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => match GlobalConfig::global_config_path() {
                Ok(path) => {
                    self.global_config_path = Some(path.clone());
                    path
                }
                Err(ConfigError::HomeNotFound) => return Ok(GlobalConfig::default()),
                Err(e) => return Err(e),
            },
        };

        // Global config is optional
        if !path.exists() {
            return Ok(GlobalConfig::default());
        }

        GlobalConfig::load_from_file(&path)
    }

    fn base_settings(global: &GlobalConfig, manifest: &Manifest) -> RunSettings {
        let defaults = RunSettings::default();
        RunSettings {
            strict: manifest
                .strict()
                .or_else(|| global.strict())
                .unwrap_or(defaults.strict),
            parallel: global.parallel().unwrap_or(defaults.parallel),
            jobs: global.jobs(),
            format: global
                .format()
                .map(str::to_string)
                .unwrap_or(defaults.format),
            log_filter: global.log_filter().map(str::to_string),
        }
    }

    /// Get the global configuration directory (~/.trellis)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".trellis"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Workspace name (manifest name, else the root directory's name)
    pub fn workspace_name(&self) -> Option<&str> {
        self.manifest
            .name()
            .or_else(|| self.workspace_root.file_name().and_then(|n| n.to_str()))
    }

    /// Resolve a manifest-relative path against the workspace root
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        self.workspace_root.join(path)
    }
}

/// Load a manifest and every fragment it includes, transitively
///
/// Directory includes pick up `*.trellis.toml` files recursively in file name
/// order. A file reached twice is only merged once.
pub fn load_manifest_tree(manifest_path: &Path) -> ConfigResult<(Manifest, Vec<PathBuf>)> {
    let mut root = Manifest::load_from_file(manifest_path)?;
    let mut visited = HashSet::new();
    visited.insert(canonical(manifest_path));

    let mut fragments = Vec::new();
    let includes = std::mem::take(&mut root.include);
    splice_includes(&mut root, manifest_path, &includes, &mut visited, &mut fragments)?;
    root.include = includes;

    Ok((root, fragments))
}

fn splice_includes(
    root: &mut Manifest,
    including_file: &Path,
    includes: &[String],
    visited: &mut HashSet<PathBuf>,
    fragments: &mut Vec<PathBuf>,
) -> ConfigResult<()> {
    let base_dir = including_file.parent().unwrap_or_else(|| Path::new("."));

    for include in includes {
        let target = base_dir.join(include);
        let files = if target.is_file() {
            vec![target]
        } else if target.is_dir() {
            fragment_files(&target)?
        } else {
            return Err(ConfigError::IncludeNotFound {
                include: include.clone(),
                file: including_file.to_path_buf(),
            });
        };

        for file in files {
            if !visited.insert(canonical(&file)) {
                continue;
            }
            let mut fragment = Manifest::load_from_file(&file)?;
            let nested = std::mem::take(&mut fragment.include);
            root.merge_fragment(fragment, &file)?;
            fragments.push(file.clone());
            splice_includes(root, &file, &nested, visited, fragments)?;
        }
    }

    Ok(())
}

fn fragment_files(dir: &Path) -> ConfigResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|error| ConfigError::Walk {
            path: dir.to_path_buf(),
            error,
        })?;
        let is_fragment = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(FRAGMENT_SUFFIX));
        if entry.file_type().is_file() && is_fragment {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Apply environment variable overrides to run settings
///
/// Recognized: TRELLIS_STRICT, TRELLIS_PARALLEL, TRELLIS_JOBS, TRELLIS_FORMAT
fn apply_env_overrides(mut settings: RunSettings) -> ConfigResult<RunSettings> {
    if let Ok(strict) = env::var("TRELLIS_STRICT") {
        settings.strict = parse_bool(&strict);
    }

    if let Ok(parallel) = env::var("TRELLIS_PARALLEL") {
        settings.parallel = parse_bool(&parallel);
    }

    if let Ok(jobs) = env::var("TRELLIS_JOBS") {
        let jobs = jobs
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "TRELLIS_JOBS".to_string(),
                reason: format!("expected a positive integer, got '{}'", jobs),
            })?;
        settings.jobs = Some(jobs);
    }

    if let Ok(format) = env::var("TRELLIS_FORMAT") {
        validate_format("TRELLIS_FORMAT", &format)?;
        settings.format = format;
    }

    Ok(settings)
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn create_manifest(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join(MANIFEST_FILE);
        fs::write(&path, content).unwrap();
        path
    }

    fn loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::new().with_global_config_path(dir.join("no-global.toml"))
    }

    #[test]
    #[serial]
    fn test_find_manifest_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        create_manifest(temp_dir.path(), "[workspace]\nname = \"engine\"\n");

        let sub_dir = temp_dir.path().join("Source").join("Core");
        fs::create_dir_all(&sub_dir).unwrap();

        let config = loader(temp_dir.path()).load_from_directory(&sub_dir).unwrap();
        assert_eq!(config.workspace_name(), Some("engine"));
        assert_eq!(config.workspace_root, temp_dir.path());
    }

    #[test]
    #[serial]
    fn test_missing_manifest_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = loader(temp_dir.path()).load_from_directory(temp_dir.path());
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    #[serial]
    fn test_directory_include_is_sorted_and_recursive() {
        let temp_dir = TempDir::new().unwrap();
        let modules = temp_dir.path().join("Modules");
        fs::create_dir_all(modules.join("Render")).unwrap();
        fs::write(
            modules.join("b.trellis.toml"),
            "[[project]]\nname = \"B\"\n",
        )
        .unwrap();
        fs::write(
            modules.join("a.trellis.toml"),
            "[[project]]\nname = \"A\"\n",
        )
        .unwrap();
        fs::write(
            modules.join("Render").join("r.trellis.toml"),
            "[[project]]\nname = \"R\"\n",
        )
        .unwrap();
        fs::write(modules.join("notes.toml"), "ignored = true\n").unwrap();

        create_manifest(temp_dir.path(), "include = [\"Modules\"]\n");

        let config = loader(temp_dir.path())
            .load_from_directory(temp_dir.path())
            .unwrap();
        let names: Vec<_> = config
            .manifest
            .projects
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["R", "A", "B"]);
        assert_eq!(config.fragments.len(), 3);
    }

    #[test]
    #[serial]
    fn test_include_cycle_merges_once() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("a.trellis.toml"),
            "include = [\"b.trellis.toml\"]\n[[project]]\nname = \"A\"\n",
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("b.trellis.toml"),
            "include = [\"a.trellis.toml\"]\n[[project]]\nname = \"B\"\n",
        )
        .unwrap();
        create_manifest(temp_dir.path(), "include = [\"a.trellis.toml\"]\n");

        let config = loader(temp_dir.path())
            .load_from_directory(temp_dir.path())
            .unwrap();
        assert_eq!(config.manifest.projects.len(), 2);
    }

    #[test]
    #[serial]
    fn test_missing_include_names_including_file() {
        let temp_dir = TempDir::new().unwrap();
        create_manifest(temp_dir.path(), "include = [\"Nowhere\"]\n");

        let err = loader(temp_dir.path())
            .load_from_directory(temp_dir.path())
            .unwrap_err();
        assert!(matches!(err, ConfigError::IncludeNotFound { .. }));
        assert!(err.to_string().contains("Nowhere"));
    }

    #[test]
    #[serial]
    fn test_fragment_origin_recorded() {
        let temp_dir = TempDir::new().unwrap();
        let fragment = temp_dir.path().join("core.trellis.toml");
        fs::write(&fragment, "[[project]]\nname = \"Core\"\n").unwrap();
        create_manifest(temp_dir.path(), "include = [\"core.trellis.toml\"]\n");

        let config = loader(temp_dir.path())
            .load_from_directory(temp_dir.path())
            .unwrap();
        assert_eq!(config.manifest.projects[0].origin.as_deref(), Some(fragment.as_path()));
    }

    #[test]
    #[serial]
    fn test_env_overrides_manifest_strict() {
        let temp_dir = TempDir::new().unwrap();
        create_manifest(temp_dir.path(), "[workspace]\nstrict = false\n");

        env::set_var("TRELLIS_STRICT", "1");
        env::set_var("TRELLIS_JOBS", "3");
        let config = loader(temp_dir.path())
            .load_from_directory(temp_dir.path())
            .unwrap();
        env::remove_var("TRELLIS_STRICT");
        env::remove_var("TRELLIS_JOBS");

        assert!(config.settings.strict);
        assert_eq!(config.settings.jobs, Some(3));
    }

    #[test]
    #[serial]
    fn test_invalid_jobs_env_rejected() {
        let temp_dir = TempDir::new().unwrap();
        create_manifest(temp_dir.path(), "");

        env::set_var("TRELLIS_JOBS", "many");
        let result = loader(temp_dir.path()).load_from_directory(temp_dir.path());
        env::remove_var("TRELLIS_JOBS");

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    #[serial]
    fn test_global_defaults_below_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let global = temp_dir.path().join("global.toml");
        fs::write(
            &global,
            "[defaults]\nstrict = true\nparallel = false\nformat = \"jsonl\"\n",
        )
        .unwrap();
        create_manifest(temp_dir.path(), "[workspace]\nstrict = false\n");

        let config = ConfigLoader::new()
            .with_global_config_path(&global)
            .load_from_directory(temp_dir.path())
            .unwrap();

        assert!(!config.settings.strict);
        assert!(!config.settings.parallel);
        assert_eq!(config.settings.format, "jsonl");
    }
}
