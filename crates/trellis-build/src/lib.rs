//! Trellis build plan compiler
//!
//! Turns declarative project, rule and dependency declarations into per-target
//! build descriptors:
//! - Target axes and their expansion into concrete targets
//! - Configuration rules and base-first rule set chains
//! - The project graph with public and private dependency edges
//! - Per-target dependency ordering and export inheritance
//! - Parallel planning over every target of a workspace
//! - Deterministic plan emission for a downstream build executor

pub mod axis;
pub mod compiler;
pub mod configuration;
pub mod descriptor;
pub mod emitter;
pub mod error;
pub mod graph;
pub mod manifest;
pub mod planner;
pub mod resolver;
pub mod rules;
pub mod store;
pub mod target;
pub mod tokens;
pub mod workspace;

// Re-export main types
pub use axis::{union_targets, TargetAxes};
pub use compiler::{ConfigurationCompiler, LocalConfiguration, TargetResolution};
pub use configuration::{parse_define, Configuration, DeclaredDependency, Defines, ScalarField};
pub use descriptor::{BuildDescriptor, ExportedSettings};
pub use emitter::{
    dot_graph, emit, emit_target, stream, BuildExecutor, CollectingExecutor, ExecutorInput,
    JsonLinesExecutor, TargetHeader, TargetPlan, FORMAT_VERSION,
};
pub use error::{BuildError, BuildResult, ErrorKind};
pub use graph::{DependencyEdge, Project, ProjectGraph, ProjectKind, Solution, Visibility};
pub use manifest::{load_workspace, workspace_from_manifest};
pub use planner::{
    Failure, FailureReport, PlanConfig, PlanOutcome, PlanStats, PlannedTarget, Planner,
};
pub use resolver::{TargetGraph, TargetNode};
pub use rules::{
    ConfigurationRule, PlanContext, RuleContext, RuleSet, RuleSetRegistry, TargetPredicate,
};
pub use store::DescriptorStore;
pub use target::{
    BuildSystem, DevEnv, Flag, FlagSet, LaunchMode, LaunchModeSet, Optimization, OptimizationSet,
    OutputKind, Platform, Target,
};
pub use tokens::TokenExpander;
pub use workspace::{Workspace, WorkspaceBuilder};

// Re-export trellis-config types for convenience
pub use trellis_config::{Config, ConfigLoader, Manifest, RunSettings};
