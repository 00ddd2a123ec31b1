//! In-progress configuration written by rule merge functions
//!
//! Field merge policies:
//!
//! | field | policy |
//! |---|---|
//! | `include_paths`, `private_include_paths`, `library_paths`, `library_files`, `compiler_options` | append, ordered and unique (first insertion keeps its position) |
//! | `defines`, `export_defines`, `properties` | keyed, ordered; re-definition replaces the value in place |
//! | `output_kind`, `output_path`, `intermediate_path`, `target_file_name` | scalar, last writer wins |
//!
//! Scalar writes remember which rule made them so strict mode can flag two
//! rules of one rule set fighting over the same field.

use crate::graph::Visibility;
use crate::target::{OutputKind, Target};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;

/// Preprocessor defines: symbol to literal value, `None` for a bare flag
pub type Defines = IndexMap<String, Option<String>>;

/// Split `NAME=VALUE` into its parts; a bare `NAME` is a flag define
pub fn parse_define(define: &str) -> (String, Option<String>) {
    match define.split_once('=') {
        Some((name, value)) => (name.trim().to_string(), Some(value.trim().to_string())),
        None => (define.trim().to_string(), None),
    }
}

/// Scalar fields with last-writer-wins semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarField {
    OutputKind,
    OutputPath,
    IntermediatePath,
    TargetFileName,
}

impl ScalarField {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OutputKind => "output_kind",
            Self::OutputPath => "output_path",
            Self::IntermediatePath => "intermediate_path",
            Self::TargetFileName => "target_file_name",
        }
    }
}

/// The rule currently writing into a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RuleProvenance {
    pub rule_set: String,
    pub rule: String,
    pub priority: i32,
}

#[derive(Debug, Clone)]
struct ScalarWrite {
    by: RuleProvenance,
    value: String,
}

/// Two rules of one rule set wrote different values to the same scalar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarConflict {
    pub field: ScalarField,
    pub rule_set: String,
    pub first_rule: String,
    pub first_value: String,
    pub second_rule: String,
    pub second_value: String,
}

/// Dependency edge declared from inside a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredDependency {
    pub project: String,
    pub visibility: Visibility,
    /// `rule_set/rule` that declared the edge
    pub declared_by: String,
}

/// Settings of one (project, target) pair while its rule chain runs
#[derive(Debug, Clone)]
pub struct Configuration {
    project: String,
    target: Target,
    include_paths: IndexSet<String>,
    private_include_paths: IndexSet<String>,
    library_paths: IndexSet<String>,
    library_files: IndexSet<String>,
    compiler_options: IndexSet<String>,
    defines: Defines,
    export_defines: Defines,
    properties: IndexMap<String, String>,
    output_kind: OutputKind,
    output_path: Option<String>,
    intermediate_path: Option<String>,
    target_file_name: Option<String>,
    dependencies: Vec<DeclaredDependency>,
    current: Option<RuleProvenance>,
    scalar_writes: HashMap<ScalarField, ScalarWrite>,
    conflicts: Vec<ScalarConflict>,
    applied_rules: Vec<String>,
}

impl Configuration {
    /// Identity configuration for `project` on `target`
    pub fn new(project: impl Into<String>, target: &Target) -> Self {
        Self {
            project: project.into(),
            target: target.clone(),
            include_paths: IndexSet::new(),
            private_include_paths: IndexSet::new(),
            library_paths: IndexSet::new(),
            library_files: IndexSet::new(),
            compiler_options: IndexSet::new(),
            defines: Defines::new(),
            export_defines: Defines::new(),
            properties: IndexMap::new(),
            output_kind: target.output_kind,
            output_path: None,
            intermediate_path: None,
            target_file_name: None,
            dependencies: Vec::new(),
            current: None,
            scalar_writes: HashMap::new(),
            conflicts: Vec::new(),
            applied_rules: Vec::new(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    // ------------------------------------------------------------------
    // Append fields
    // ------------------------------------------------------------------

    /// Add an exported include path
    pub fn add_include_path(&mut self, path: impl Into<String>) -> &mut Self {
        self.include_paths.insert(path.into());
        self
    }

    /// Add an include path visible to this project only
    pub fn add_private_include_path(&mut self, path: impl Into<String>) -> &mut Self {
        self.private_include_paths.insert(path.into());
        self
    }

    /// Add an exported library search path
    pub fn add_library_path(&mut self, path: impl Into<String>) -> &mut Self {
        self.library_paths.insert(path.into());
        self
    }

    /// Add an exported library file
    pub fn add_library_file(&mut self, file: impl Into<String>) -> &mut Self {
        self.library_files.insert(file.into());
        self
    }

    pub fn add_library_files<I, S>(&mut self, files: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for file in files {
            self.library_files.insert(file.into());
        }
        self
    }

    pub fn add_compiler_option(&mut self, option: impl Into<String>) -> &mut Self {
        self.compiler_options.insert(option.into());
        self
    }

    // ------------------------------------------------------------------
    // Keyed fields
    // ------------------------------------------------------------------

    /// Add a define visible to this project only (`NAME` or `NAME=VALUE`)
    pub fn add_define(&mut self, define: &str) -> &mut Self {
        let (name, value) = parse_define(define);
        self.defines.insert(name, value);
        self
    }

    /// Add a define exported to consumers (`NAME` or `NAME=VALUE`)
    pub fn add_export_define(&mut self, define: &str) -> &mut Self {
        let (name, value) = parse_define(define);
        self.export_defines.insert(name, value);
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    // ------------------------------------------------------------------
    // Scalar fields
    // ------------------------------------------------------------------

    pub fn set_output_kind(&mut self, kind: OutputKind) -> &mut Self {
        self.record_scalar(ScalarField::OutputKind, kind.name().to_string());
        self.output_kind = kind;
        self
    }

    pub fn set_output_path(&mut self, path: impl Into<String>) -> &mut Self {
        let path = path.into();
        self.record_scalar(ScalarField::OutputPath, path.clone());
        self.output_path = Some(path);
        self
    }

    pub fn set_intermediate_path(&mut self, path: impl Into<String>) -> &mut Self {
        let path = path.into();
        self.record_scalar(ScalarField::IntermediatePath, path.clone());
        self.intermediate_path = Some(path);
        self
    }

    pub fn set_target_file_name(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.record_scalar(ScalarField::TargetFileName, name.clone());
        self.target_file_name = Some(name);
        self
    }

    // ------------------------------------------------------------------
    // Dependencies
    // ------------------------------------------------------------------

    pub fn add_public_dependency(&mut self, project: impl Into<String>) -> &mut Self {
        self.add_dependency(project, Visibility::Public)
    }

    pub fn add_private_dependency(&mut self, project: impl Into<String>) -> &mut Self {
        self.add_dependency(project, Visibility::Private)
    }

    pub fn add_dependency(
        &mut self,
        project: impl Into<String>,
        visibility: Visibility,
    ) -> &mut Self {
        let declared_by = self
            .current
            .as_ref()
            .map(|p| format!("{}/{}", p.rule_set, p.rule))
            .unwrap_or_default();
        self.dependencies.push(DeclaredDependency {
            project: project.into(),
            visibility,
            declared_by,
        });
        self
    }

    // ------------------------------------------------------------------
    // Readers (a derived rule may read what its base wrote)
    // ------------------------------------------------------------------

    pub fn include_paths(&self) -> &IndexSet<String> {
        &self.include_paths
    }

    pub fn private_include_paths(&self) -> &IndexSet<String> {
        &self.private_include_paths
    }

    pub fn library_paths(&self) -> &IndexSet<String> {
        &self.library_paths
    }

    pub fn library_files(&self) -> &IndexSet<String> {
        &self.library_files
    }

    pub fn compiler_options(&self) -> &IndexSet<String> {
        &self.compiler_options
    }

    pub fn defines(&self) -> &Defines {
        &self.defines
    }

    pub fn export_defines(&self) -> &Defines {
        &self.export_defines
    }

    pub fn properties(&self) -> &IndexMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn output_kind(&self) -> OutputKind {
        self.output_kind
    }

    pub fn output_path(&self) -> Option<&str> {
        self.output_path.as_deref()
    }

    pub fn intermediate_path(&self) -> Option<&str> {
        self.intermediate_path.as_deref()
    }

    pub fn target_file_name(&self) -> Option<&str> {
        self.target_file_name.as_deref()
    }

    pub fn dependencies(&self) -> &[DeclaredDependency] {
        &self.dependencies
    }

    /// `rule_set/rule` names of every rule applied so far, in order
    pub fn applied_rules(&self) -> &[String] {
        &self.applied_rules
    }

    pub fn conflicts(&self) -> &[ScalarConflict] {
        &self.conflicts
    }

    // ------------------------------------------------------------------
    // Compiler hooks
    // ------------------------------------------------------------------

    pub(crate) fn begin_rule(&mut self, provenance: RuleProvenance) {
        self.applied_rules
            .push(format!("{}/{}", provenance.rule_set, provenance.rule));
        self.current = Some(provenance);
    }

    pub(crate) fn end_rule(&mut self) {
        self.current = None;
    }

    /// Apply `f` to every path-like field and property value
    pub(crate) fn map_strings(&mut self, mut f: impl FnMut(&str) -> String) {
        fn remap(set: &mut IndexSet<String>, f: &mut impl FnMut(&str) -> String) {
            *set = set.iter().map(|s| f(s)).collect();
        }
        remap(&mut self.include_paths, &mut f);
        remap(&mut self.private_include_paths, &mut f);
        remap(&mut self.library_paths, &mut f);
        remap(&mut self.library_files, &mut f);
        for value in self.properties.values_mut() {
            *value = f(value);
        }
        for value in self.defines.values_mut().chain(self.export_defines.values_mut()) {
            if let Some(v) = value {
                *v = f(v);
            }
        }
        for slot in [
            &mut self.output_path,
            &mut self.intermediate_path,
            &mut self.target_file_name,
        ] {
            if let Some(value) = slot {
                *value = f(value);
            }
        }
    }

    pub(crate) fn fill_default_output_path(&mut self, path: String) {
        if self.output_path.is_none() {
            self.output_path = Some(path);
        }
    }

    pub(crate) fn fill_default_intermediate_path(&mut self, path: String) {
        if self.intermediate_path.is_none() {
            self.intermediate_path = Some(path);
        }
    }

    pub(crate) fn clear_output_paths(&mut self) {
        self.output_path = None;
        self.intermediate_path = None;
    }

    fn record_scalar(&mut self, field: ScalarField, value: String) {
        let Some(current) = self.current.clone() else {
            self.scalar_writes.remove(&field);
            return;
        };

        if let Some(previous) = self.scalar_writes.get(&field) {
            if previous.by.rule_set == current.rule_set
                && previous.by.priority == current.priority
                && previous.by.rule != current.rule
                && previous.value != value
            {
                self.conflicts.push(ScalarConflict {
                    field,
                    rule_set: current.rule_set.clone(),
                    first_rule: previous.by.rule.clone(),
                    first_value: previous.value.clone(),
                    second_rule: current.rule.clone(),
                    second_value: value.clone(),
                });
            }
        }

        self.scalar_writes
            .insert(field, ScalarWrite { by: current, value });
    }

    pub(crate) fn into_parts(self) -> ConfigurationParts {
        ConfigurationParts {
            include_paths: self.include_paths,
            private_include_paths: self.private_include_paths,
            library_paths: self.library_paths,
            library_files: self.library_files,
            compiler_options: self.compiler_options,
            defines: self.defines,
            export_defines: self.export_defines,
            properties: self.properties,
            output_kind: self.output_kind,
            output_path: self.output_path,
            intermediate_path: self.intermediate_path,
            target_file_name: self.target_file_name,
            applied_rules: self.applied_rules,
        }
    }
}

/// Owned fields of a finished configuration
#[derive(Debug, Clone)]
pub(crate) struct ConfigurationParts {
    pub include_paths: IndexSet<String>,
    pub private_include_paths: IndexSet<String>,
    pub library_paths: IndexSet<String>,
    pub library_files: IndexSet<String>,
    pub compiler_options: IndexSet<String>,
    pub defines: Defines,
    pub export_defines: Defines,
    pub properties: IndexMap<String, String>,
    pub output_kind: OutputKind,
    pub output_path: Option<String>,
    pub intermediate_path: Option<String>,
    pub target_file_name: Option<String>,
    pub applied_rules: Vec<String>,
}
