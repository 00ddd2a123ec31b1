/// Build plan error types
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::target::Target;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid target axis '{axis}': {reason}")]
    InvalidAxis { axis: &'static str, reason: String },

    #[error("Circular dependency detected for target {target}: {cycle}")]
    CyclicDependency { target: String, cycle: String },

    #[error(
        "Project '{dependency}' (required by '{dependent}') has no variant for target {target}"
    )]
    MissingTargetVariant {
        dependency: String,
        dependent: String,
        target: String,
    },

    #[error(
        "Conflicting values for '{field}' in rule set '{rule_set}' of project '{project}': rule '{first_rule}' set {first_value:?}, rule '{second_rule}' set {second_value:?} at the same priority"
    )]
    ConflictingScalarOverride {
        project: String,
        rule_set: String,
        field: &'static str,
        first_rule: String,
        first_value: String,
        second_rule: String,
        second_value: String,
    },

    #[error("Descriptor for '{project}' references '{dependency}' which is not emitted for target {target}")]
    IncompleteDescriptor {
        project: String,
        dependency: String,
        target: String,
    },

    #[error("Project '{name}' is declared more than once{}", origin_suffix(.first, .second))]
    DuplicateProjectDeclaration {
        name: String,
        first: Option<PathBuf>,
        second: Option<PathBuf>,
    },

    #[error("Rule set '{0}' is declared more than once")]
    DuplicateRuleSet(String),

    #[error("Project not found: {project}")]
    UnknownProject { project: String },

    #[error("Rule set not found: {rule_set} (referenced by {referenced_by})")]
    UnknownRuleSet {
        rule_set: String,
        referenced_by: String,
    },

    #[error("Rule set base chain is circular: {0}")]
    RuleChainCycle(String),

    #[error("Descriptor for '{project}' on target {target} was written twice")]
    DuplicateDescriptor { project: String, target: String },

    #[error("Invalid declaration: {0}")]
    InvalidDeclaration(String),

    #[error("Configuration error: {0}")]
    Config(#[from] trellis_config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

fn origin_suffix(first: &Option<PathBuf>, second: &Option<PathBuf>) -> String {
    match (first, second) {
        (Some(a), Some(b)) => format!(" (in {} and {})", a.display(), b.display()),
        (Some(a), None) | (None, Some(a)) => format!(" (in {})", a.display()),
        (None, None) => String::new(),
    }
}

/// Error categories reported to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidAxis,
    CyclicDependency,
    MissingTargetVariant,
    ConflictingScalarOverride,
    IncompleteDescriptor,
    DuplicateProjectDeclaration,
    Declaration,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidAxis => "InvalidAxisError",
            Self::CyclicDependency => "CyclicDependencyError",
            Self::MissingTargetVariant => "MissingTargetVariantError",
            Self::ConflictingScalarOverride => "ConflictingScalarOverrideError",
            Self::IncompleteDescriptor => "IncompleteDescriptorError",
            Self::DuplicateProjectDeclaration => "DuplicateProjectDeclarationError",
            Self::Declaration => "DeclarationError",
            Self::Internal => "InternalError",
        };
        f.write_str(name)
    }
}

impl BuildError {
    /// Category of this error for failure reports
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAxis { .. } => ErrorKind::InvalidAxis,
            Self::CyclicDependency { .. } => ErrorKind::CyclicDependency,
            Self::MissingTargetVariant { .. } => ErrorKind::MissingTargetVariant,
            Self::ConflictingScalarOverride { .. } => ErrorKind::ConflictingScalarOverride,
            Self::IncompleteDescriptor { .. } => ErrorKind::IncompleteDescriptor,
            Self::DuplicateProjectDeclaration { .. } => ErrorKind::DuplicateProjectDeclaration,
            Self::DuplicateRuleSet(_)
            | Self::UnknownProject { .. }
            | Self::UnknownRuleSet { .. }
            | Self::RuleChainCycle(_)
            | Self::InvalidDeclaration(_)
            | Self::Config(_) => ErrorKind::Declaration,
            Self::DuplicateDescriptor { .. }
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::ThreadPool(_) => ErrorKind::Internal,
        }
    }

    /// Project the failure is attributed to, if any
    pub fn project(&self) -> Option<&str> {
        match self {
            Self::CyclicDependency { cycle, .. } => cycle.split(" -> ").next(),
            Self::MissingTargetVariant { dependent, .. } => Some(dependent.as_str()),
            Self::ConflictingScalarOverride { project, .. }
            | Self::IncompleteDescriptor { project, .. }
            | Self::DuplicateDescriptor { project, .. } => Some(project.as_str()),
            Self::DuplicateProjectDeclaration { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    /// Create an invalid axis error
    pub fn invalid_axis(axis: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidAxis {
            axis,
            reason: reason.into(),
        }
    }

    /// Create a cyclic dependency error
    pub fn cyclic(target: &Target, cycle: impl Into<String>) -> Self {
        Self::CyclicDependency {
            target: target.key(),
            cycle: cycle.into(),
        }
    }

    /// Create a missing target variant error
    pub fn missing_variant(
        dependency: impl Into<String>,
        dependent: impl Into<String>,
        target: &Target,
    ) -> Self {
        Self::MissingTargetVariant {
            dependency: dependency.into(),
            dependent: dependent.into(),
            target: target.key(),
        }
    }

    /// Create an incomplete descriptor error
    pub fn incomplete(
        project: impl Into<String>,
        dependency: impl Into<String>,
        target: &Target,
    ) -> Self {
        Self::IncompleteDescriptor {
            project: project.into(),
            dependency: dependency.into(),
            target: target.key(),
        }
    }

    /// Create a project not found error
    pub fn unknown_project(project: impl Into<String>) -> Self {
        Self::UnknownProject {
            project: project.into(),
        }
    }
}
