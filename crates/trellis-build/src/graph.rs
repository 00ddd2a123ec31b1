//! Projects and dependency edges
use crate::axis::TargetAxes;
use crate::error::{BuildError, BuildResult};
use crate::rules::TargetPredicate;
use crate::target::Target;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Dependency visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Exported settings propagate to the dependent's consumers
    Public,
    /// Settings stay with the dependent
    Private,
}

impl Visibility {
    /// Union of two visibilities, favoring `Public`
    pub fn union(self, other: Self) -> Self {
        if self == Self::Public || other == Self::Public {
            Self::Public
        } else {
            Self::Private
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
        }
    }
}

/// Whether a project is compiled or only carries settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    /// Compiled by the build executor
    #[default]
    Generate,
    /// Prebuilt package: exports include paths and libraries, no compile step
    Export,
}

/// A named compilation unit
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub name: String,
    pub source_root: String,
    pub kind: ProjectKind,
    /// Most-derived rule set of this project, if any
    pub rule_set: Option<String>,
    pub axes: TargetAxes,
    /// Declaration file, for error reports
    pub origin: Option<PathBuf>,
}

impl Project {
    pub fn new(name: impl Into<String>, source_root: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_root: source_root.into(),
            kind: ProjectKind::Generate,
            rule_set: None,
            axes: TargetAxes::default(),
            origin: None,
        }
    }

    pub fn with_kind(mut self, kind: ProjectKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_rule_set(mut self, rule_set: impl Into<String>) -> Self {
        self.rule_set = Some(rule_set.into());
        self
    }

    pub fn with_axes(mut self, axes: TargetAxes) -> Self {
        self.axes = axes;
        self
    }

    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Targets this project is built for
    /// Whether the project declares a variant for `target`
    pub fn supports(&self, target: &Target) -> bool {
        self.axes.contains(target)
    }

    pub fn targets(&self) -> BuildResult<Vec<Target>> {
        self.axes.expand()
    }
}

/// Registered dependency edge
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub visibility: Visibility,
    /// Targets the edge exists for
    pub filter: TargetPredicate,
}

impl DependencyEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            visibility,
            filter: TargetPredicate::all(),
        }
    }

    pub fn public(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(from, to, Visibility::Public)
    }

    pub fn private(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(from, to, Visibility::Private)
    }

    pub fn with_filter(mut self, filter: TargetPredicate) -> Self {
        self.filter = filter;
        self
    }
}

/// Named set of root projects planned together
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub name: String,
    pub projects: Vec<String>,
    pub startup_project: Option<String>,
    pub axes: TargetAxes,
}

impl Solution {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            projects: Vec::new(),
            startup_project: None,
            axes: TargetAxes::default(),
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        let project = project.into();
        if !self.projects.contains(&project) {
            self.projects.push(project);
        }
        self
    }

    pub fn with_startup_project(mut self, project: impl Into<String>) -> Self {
        self.startup_project = Some(project.into());
        self
    }

    pub fn with_axes(mut self, axes: TargetAxes) -> Self {
        self.axes = axes;
        self
    }
}

/// Project nodes in declaration order and the registered edges between them
#[derive(Debug, Clone, Default)]
pub struct ProjectGraph {
    projects: IndexMap<String, Project>,
    edges: Vec<DependencyEdge>,
}

impl ProjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_project(&mut self, project: Project) -> Option<Project> {
        self.projects.insert(project.name.clone(), project)
    }

    pub(crate) fn add_edge(&mut self, edge: DependencyEdge) {
        self.edges.push(edge);
    }

    pub(crate) fn remove_edges_from(&mut self, from: &str) {
        self.edges.retain(|edge| edge.from != from);
    }

    pub fn get_project(&self, name: &str) -> Option<&Project> {
        self.projects.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.projects.contains_key(name)
    }

    /// Projects in declaration order
    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    /// Declaration index of a project, used to break ordering ties
    pub fn declaration_index(&self, name: &str) -> Option<usize> {
        self.projects.get_index_of(name)
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Registered edges leaving `from` that exist for `target`
    pub fn edges_for<'a>(
        &'a self,
        from: &'a str,
        target: &'a Target,
    ) -> impl Iterator<Item = &'a DependencyEdge> {
        self.edges
            .iter()
            .filter(move |edge| edge.from == from && edge.filter.matches(target))
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Check every edge endpoint is a registered project
    pub fn validate(&self) -> BuildResult<()> {
        for edge in &self.edges {
            for end in [&edge.from, &edge.to] {
                if !self.projects.contains_key(end) {
                    return Err(BuildError::UnknownProject {
                        project: format!("{} (edge {} -> {})", end, edge.from, edge.to),
                    });
                }
            }
        }
        Ok(())
    }
}
