//! Declaration Manifest (trellis.toml)
//!
//! A manifest declares axis presets, rule sets, projects and solutions. The
//! root manifest may also carry a `[workspace]` table; fragment files pulled in
//! through `include` may not. Axis values are kept as strings here and are
//! checked when the declarations are registered.

use crate::{ConfigError, ConfigResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Manifest file name looked up by the loader
pub const MANIFEST_FILE: &str = "trellis.toml";

/// Suffix of fragment files found in included directories
pub const FRAGMENT_SUFFIX: &str = ".trellis.toml";

/// Parsed manifest or fragment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Fragment files or directories, relative to this file
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceSection>,

    /// Named axis presets
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub axes: IndexMap<String, AxesDecl>,

    #[serde(default, rename = "rule_set", skip_serializing_if = "Vec::is_empty")]
    pub rule_sets: Vec<RuleSetDecl>,

    #[serde(default, rename = "project", skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<ProjectDecl>,

    #[serde(default, rename = "solution", skip_serializing_if = "Vec::is_empty")]
    pub solutions: Vec<SolutionDecl>,
}

/// `[workspace]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Solution root (default: the manifest's directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution_root: Option<String>,

    /// Intermediate root (default: `<solution_root>/Intermediate`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intermediate_root: Option<String>,

    /// Output root (default: `<solution_root>/Binaries`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_root: Option<String>,

    /// Fail on same-priority scalar conflicts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,

    /// `%NAME%` substitutions
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, String>,
}

/// Axis value lists; a missing list takes the engine default
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct AxesDecl {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_envs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimizations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_kinds: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_modes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_systems: Option<Vec<String>>,
}

/// Axes given either as a preset name or inline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AxesRef {
    Preset(String),
    Inline(AxesDecl),
}

/// Target filter of a rule or edge; a missing list accepts every value
pub type PredicateDecl = AxesDecl;

/// `[[rule_set]]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RuleSetDecl {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    #[serde(default, rename = "rule", skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleDecl>,

    /// File this rule set was declared in
    #[serde(skip)]
    pub origin: Option<PathBuf>,
}

/// `[[rule_set.rule]]` / `[[project.rule]]`: one declarative rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RuleDecl {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<PredicateDecl>,

    #[serde(default)]
    pub priority: i32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub private_include_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defines: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub export_defines: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub library_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub library_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compiler_options: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intermediate_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_file_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub public_dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub private_dependencies: Vec<String>,
}

/// Project kind as written in a manifest
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKindDecl {
    #[default]
    Generate,
    Export,
}

/// `[[project]]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProjectDecl {
    pub name: String,

    /// Source root (default: the project name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,

    #[serde(default)]
    pub kind: ProjectKindDecl,

    /// Base rule set of the project's own rules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_set: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub axes: Option<AxesRef>,

    /// Replace an earlier declaration of the same name instead of failing
    #[serde(default)]
    pub replace: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub public_dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub private_dependencies: Vec<String>,

    /// Edges that only exist for some targets
    #[serde(default, rename = "dependency", skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyDecl>,

    #[serde(default, rename = "rule", skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleDecl>,

    /// File this project was declared in
    #[serde(skip)]
    pub origin: Option<PathBuf>,
}

/// Visibility as written in a manifest
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityDecl {
    #[default]
    Public,
    Private,
}

/// `[[project.dependency]]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DependencyDecl {
    pub project: String,

    #[serde(default)]
    pub visibility: VisibilityDecl,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<PredicateDecl>,
}

/// `[[solution]]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SolutionDecl {
    pub name: String,

    #[serde(default)]
    pub projects: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_project: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub axes: Option<AxesRef>,

    #[serde(skip)]
    pub origin: Option<PathBuf>,
}

impl Manifest {
    /// Load a manifest from a file, without following includes
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let mut manifest: Self =
            toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
                file: path.to_path_buf(),
                error: e,
            })?;

        manifest.set_origin(path);
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse a manifest from a string
    pub fn parse(content: &str) -> ConfigResult<Self> {
        let manifest: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: PathBuf::from("<string>"),
            error: e,
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate names and presets
    pub fn validate(&self) -> ConfigResult<()> {
        for project in &self.projects {
            if project.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "project.name".to_string(),
                    reason: "name cannot be empty".to_string(),
                });
            }
            for rule in &project.rules {
                validate_rule(&format!("project '{}'", project.name), rule)?;
            }
        }

        for rule_set in &self.rule_sets {
            if rule_set.id.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "rule_set.id".to_string(),
                    reason: "id cannot be empty".to_string(),
                });
            }
            for rule in &rule_set.rules {
                validate_rule(&format!("rule set '{}'", rule_set.id), rule)?;
            }
        }

        for solution in &self.solutions {
            if let Some(startup) = &solution.startup_project {
                if !solution.projects.contains(startup) {
                    return Err(ConfigError::InvalidValue {
                        field: format!("solution '{}'.startup_project", solution.name),
                        reason: format!("'{}' is not one of the solution's projects", startup),
                    });
                }
            }
        }

        Ok(())
    }

    /// Splice an included fragment into this manifest
    pub fn merge_fragment(&mut self, fragment: Manifest, file: &Path) -> ConfigResult<()> {
        if fragment.workspace.is_some() {
            return Err(ConfigError::ValidationError(format!(
                "[workspace] is only allowed in {}, found in {}",
                MANIFEST_FILE,
                file.display()
            )));
        }

        for (name, axes) in fragment.axes {
            if self.axes.contains_key(&name) {
                return Err(ConfigError::ValidationError(format!(
                    "axis preset '{}' is declared more than once (again in {})",
                    name,
                    file.display()
                )));
            }
            self.axes.insert(name, axes);
        }

        self.rule_sets.extend(fragment.rule_sets);
        self.projects.extend(fragment.projects);
        self.solutions.extend(fragment.solutions);
        Ok(())
    }

    /// Look up a preset or take inline axes
    pub fn resolve_axes(&self, axes: &AxesRef) -> ConfigResult<AxesDecl> {
        match axes {
            AxesRef::Inline(decl) => Ok(decl.clone()),
            AxesRef::Preset(name) => {
                self.axes
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::InvalidValue {
                        field: "axes".to_string(),
                        reason: format!("unknown axis preset '{}'", name),
                    })
            }
        }
    }

    /// Workspace name, if declared
    pub fn name(&self) -> Option<&str> {
        self.workspace.as_ref().and_then(|w| w.name.as_deref())
    }

    /// Manifest-level strict setting
    pub fn strict(&self) -> Option<bool> {
        self.workspace.as_ref().and_then(|w| w.strict)
    }

    fn set_origin(&mut self, path: &Path) {
        for rule_set in &mut self.rule_sets {
            rule_set.origin = Some(path.to_path_buf());
        }
        for project in &mut self.projects {
            project.origin = Some(path.to_path_buf());
        }
        for solution in &mut self.solutions {
            solution.origin = Some(path.to_path_buf());
        }
    }
}

fn validate_rule(owner: &str, rule: &RuleDecl) -> ConfigResult<()> {
    if rule.name.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: format!("{} rule.name", owner),
            reason: "name cannot be empty".to_string(),
        });
    }
    for define in rule.defines.iter().chain(&rule.export_defines) {
        if define.split('=').next().map_or(true, |name| name.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: format!("{} rule '{}' defines", owner, rule.name),
                reason: format!("define '{}' has no name", define),
            });
        }
    }
    Ok(())
}
