//! Resolved build descriptors
use crate::configuration::Defines;
use crate::graph::ProjectKind;
use crate::target::OutputKind;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Settings a project hands to its consumers
///
/// For a project this is its own exported fields followed by the exports of
/// every public dependency, transitively. Private dependencies never appear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedSettings {
    pub include_paths: Vec<String>,
    pub defines: Defines,
    pub library_paths: Vec<String>,
    pub library_files: Vec<String>,
}

impl ExportedSettings {
    pub fn is_empty(&self) -> bool {
        self.include_paths.is_empty()
            && self.defines.is_empty()
            && self.library_paths.is_empty()
            && self.library_files.is_empty()
    }
}

/// Accumulates settings keeping the first position of every value
#[derive(Debug, Clone, Default)]
pub(crate) struct SettingsAccumulator {
    pub include_paths: IndexSet<String>,
    pub defines: Defines,
    pub library_paths: IndexSet<String>,
    pub library_files: IndexSet<String>,
}

impl SettingsAccumulator {
    /// Splice `exports` in after what is already there
    ///
    /// A define already present keeps its value: the project's own definition
    /// beats an inherited one.
    pub fn absorb(&mut self, exports: &ExportedSettings) {
        self.include_paths
            .extend(exports.include_paths.iter().cloned());
        for (name, value) in &exports.defines {
            self.defines
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        self.library_paths
            .extend(exports.library_paths.iter().cloned());
        self.library_files
            .extend(exports.library_files.iter().cloned());
    }

    pub fn into_exports(self) -> ExportedSettings {
        ExportedSettings {
            include_paths: self.include_paths.into_iter().collect(),
            defines: self.defines,
            library_paths: self.library_paths.into_iter().collect(),
            library_files: self.library_files.into_iter().collect(),
        }
    }
}

/// Fully resolved settings for one (project, target) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDescriptor {
    pub project: String,
    /// Target key
    pub target: String,
    /// Configuration name, e.g. `Debug_Editor`
    pub configuration: String,
    pub kind: ProjectKind,
    pub output_kind: OutputKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_file_name: Option<String>,
    pub include_paths: Vec<String>,
    pub defines: Defines,
    pub library_paths: Vec<String>,
    pub library_files: Vec<String>,
    pub compiler_options: Vec<String>,
    pub properties: IndexMap<String, String>,
    /// Direct and transitive dependencies to link against, in dependency order
    pub dependencies: Vec<String>,
    /// What consumers of this project inherit
    pub exports: ExportedSettings,
    /// `rule_set/rule` of every applied rule, in application order
    pub applied_rules: Vec<String>,
}

impl BuildDescriptor {
    /// Whether no rule applied to this pair
    pub fn is_default(&self) -> bool {
        self.applied_rules.is_empty()
    }

    pub fn depends_on(&self, project: &str) -> bool {
        self.dependencies.iter().any(|dep| dep == project)
    }
}
