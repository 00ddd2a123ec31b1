//! Registers manifest declarations on a [`WorkspaceBuilder`]
//!
//! Axis names are parsed here, so a misspelled optimization or output kind is
//! reported as an invalid axis before any target is resolved. Declarative
//! rules become ordinary [`ConfigurationRule`]s whose merge functions replay
//! the declared actions.

use crate::axis::TargetAxes;
use crate::configuration::Configuration;
use crate::error::{BuildError, BuildResult};
use crate::graph::{DependencyEdge, Project, ProjectKind, Solution, Visibility};
use crate::rules::{ConfigurationRule, PlanContext, RuleSet, TargetPredicate};
use crate::target::{BuildSystem, DevEnv, Flag, FlagSet, OutputKind, Platform};
use crate::workspace::{Workspace, WorkspaceBuilder};
use indexmap::IndexMap;
use std::path::Path;
use trellis_config::manifest::{
    AxesDecl, DependencyDecl, ProjectDecl, ProjectKindDecl, RuleDecl, SolutionDecl,
    VisibilityDecl,
};
use trellis_config::{Config, Manifest};

/// Build the workspace described by a loaded configuration
pub fn load_workspace(config: &Config) -> BuildResult<Workspace> {
    workspace_from_manifest(&config.manifest, &config.workspace_root)
}

/// Build a workspace from a manifest whose relative paths resolve against `root`
pub fn workspace_from_manifest(manifest: &Manifest, root: &Path) -> BuildResult<Workspace> {
    let mut builder = WorkspaceBuilder::new();
    builder.context(plan_context(manifest, root));

    for decl in &manifest.rule_sets {
        let mut rule_set = RuleSet::new(&decl.id);
        rule_set.base = decl.base.clone();
        for rule in &decl.rules {
            rule_set.rules.push(configuration_rule(rule)?);
        }
        builder.rule_set(rule_set)?;
    }

    for decl in &manifest.projects {
        declare_project(&mut builder, manifest, root, decl)?;
    }

    for decl in &manifest.solutions {
        builder.solution(solution(manifest, decl)?)?;
    }

    let workspace = builder.finish()?;
    tracing::debug!(
        projects = workspace.graph().len(),
        rule_sets = workspace.rules().len(),
        "registered manifest declarations"
    );
    Ok(workspace)
}

fn plan_context(manifest: &Manifest, root: &Path) -> PlanContext {
    let section = manifest.workspace.clone().unwrap_or_default();

    let solution_root = match &section.solution_root {
        Some(path) => root.join(path),
        None => root.to_path_buf(),
    };
    let mut context = PlanContext::new(solution_root.display().to_string());
    if let Some(path) = &section.intermediate_root {
        context.intermediate_root = solution_root.join(path).display().to_string();
    }
    if let Some(path) = &section.output_root {
        context.output_root = solution_root.join(path).display().to_string();
    }
    context.variables = section.variables;
    context
}

fn declare_project(
    builder: &mut WorkspaceBuilder,
    manifest: &Manifest,
    root: &Path,
    decl: &ProjectDecl,
) -> BuildResult<()> {
    let source_root = decl.source_root.as_deref().unwrap_or(&decl.name);
    let mut project = Project::new(&decl.name, root.join(source_root).display().to_string())
        .with_kind(match decl.kind {
            ProjectKindDecl::Generate => ProjectKind::Generate,
            ProjectKindDecl::Export => ProjectKind::Export,
        });
    project.rule_set = decl.rule_set.clone();
    project.origin = decl.origin.clone();
    if let Some(axes) = &decl.axes {
        project.axes = target_axes(&manifest.resolve_axes(axes)?)?;
    }

    if decl.replace {
        builder.replace_project(project);
    } else {
        builder.project(project)?;
    }

    for dep in &decl.public_dependencies {
        builder.dependency(DependencyEdge::public(&decl.name, dep));
    }
    for dep in &decl.private_dependencies {
        builder.dependency(DependencyEdge::private(&decl.name, dep));
    }
    for dep in &decl.dependencies {
        builder.dependency(dependency_edge(&decl.name, dep)?);
    }

    for rule in &decl.rules {
        builder.project_rule(&decl.name, configuration_rule(rule)?)?;
    }
    Ok(())
}

fn dependency_edge(from: &str, decl: &DependencyDecl) -> BuildResult<DependencyEdge> {
    let visibility = match decl.visibility {
        VisibilityDecl::Public => Visibility::Public,
        VisibilityDecl::Private => Visibility::Private,
    };
    let mut edge = DependencyEdge::new(from, &decl.project, visibility);
    if let Some(when) = &decl.when {
        edge = edge.with_filter(target_predicate(when)?);
    }
    Ok(edge)
}

fn solution(manifest: &Manifest, decl: &SolutionDecl) -> BuildResult<Solution> {
    let mut solution = Solution::new(&decl.name);
    for project in &decl.projects {
        solution = solution.with_project(project);
    }
    if let Some(startup) = &decl.startup_project {
        solution = solution.with_startup_project(startup);
    }
    if let Some(axes) = &decl.axes {
        solution = solution.with_axes(target_axes(&manifest.resolve_axes(axes)?)?);
    }
    Ok(solution)
}

/// Turn axis value lists into [`TargetAxes`]; missing lists keep the default
pub fn target_axes(decl: &AxesDecl) -> BuildResult<TargetAxes> {
    let mut axes = TargetAxes::default();
    if let Some(platforms) = &decl.platforms {
        axes.platforms = platforms.iter().cloned().map(Platform::from).collect();
    }
    if let Some(dev_envs) = &decl.dev_envs {
        axes.dev_envs = dev_envs.iter().cloned().map(DevEnv::from).collect();
    }
    if let Some(optimizations) = &decl.optimizations {
        axes.optimizations = flags(optimizations)?;
    }
    if let Some(output_kinds) = &decl.output_kinds {
        axes.output_kinds = parse_all(output_kinds, parse_output_kind)?;
    }
    if let Some(launch_modes) = &decl.launch_modes {
        axes.launch_modes = flags(launch_modes)?;
    }
    if let Some(build_systems) = &decl.build_systems {
        axes.build_systems = parse_all(build_systems, parse_build_system)?;
    }
    Ok(axes)
}

/// Turn a rule or edge filter into a [`TargetPredicate`]
pub fn target_predicate(decl: &AxesDecl) -> BuildResult<TargetPredicate> {
    Ok(TargetPredicate {
        platforms: decl
            .platforms
            .as_ref()
            .map(|names| names.iter().cloned().map(Platform::from).collect()),
        dev_envs: decl
            .dev_envs
            .as_ref()
            .map(|names| names.iter().cloned().map(DevEnv::from).collect()),
        optimizations: decl
            .optimizations
            .as_deref()
            .map(|names| parse_all(names, parse_flag))
            .transpose()?,
        output_kinds: decl
            .output_kinds
            .as_deref()
            .map(|names| parse_all(names, parse_output_kind))
            .transpose()?,
        launch_modes: decl
            .launch_modes
            .as_deref()
            .map(|names| parse_all(names, parse_flag))
            .transpose()?,
        build_systems: decl
            .build_systems
            .as_deref()
            .map(|names| parse_all(names, parse_build_system))
            .transpose()?,
    })
}

fn parse_all<T>(names: &[String], parse: fn(&str) -> BuildResult<T>) -> BuildResult<Vec<T>> {
    names.iter().map(|name| parse(name)).collect()
}

fn flags<F: Flag>(names: &[String]) -> BuildResult<FlagSet<F>> {
    names.iter().map(|name| parse_flag::<F>(name)).collect()
}

fn parse_flag<F: Flag>(name: &str) -> BuildResult<F> {
    F::parse(name).ok_or_else(|| BuildError::invalid_axis(F::AXIS, format!("unknown value '{}'", name)))
}

fn parse_output_kind(name: &str) -> BuildResult<OutputKind> {
    match name.to_lowercase().as_str() {
        "lib" => Ok(OutputKind::Lib),
        "dll" => Ok(OutputKind::Dll),
        "exe" => Ok(OutputKind::Exe),
        _ => Err(BuildError::invalid_axis(
            "output_kind",
            format!("unknown value '{}'", name),
        )),
    }
}

fn parse_build_system(name: &str) -> BuildResult<BuildSystem> {
    match name.to_lowercase().as_str() {
        "msbuild" => Ok(BuildSystem::MsBuild),
        "fastbuild" => Ok(BuildSystem::FastBuild),
        "make" => Ok(BuildSystem::Make),
        "ninja" => Ok(BuildSystem::Ninja),
        _ => Err(BuildError::invalid_axis(
            "build_system",
            format!("unknown value '{}'", name),
        )),
    }
}

/// Actions of a declarative rule, checked and owned by its merge function
#[derive(Debug, Clone)]
struct RuleActions {
    include_paths: Vec<String>,
    private_include_paths: Vec<String>,
    defines: Vec<String>,
    export_defines: Vec<String>,
    library_paths: Vec<String>,
    library_files: Vec<String>,
    compiler_options: Vec<String>,
    properties: IndexMap<String, String>,
    output_kind: Option<OutputKind>,
    output_path: Option<String>,
    intermediate_path: Option<String>,
    target_file_name: Option<String>,
    public_dependencies: Vec<String>,
    private_dependencies: Vec<String>,
}

impl RuleActions {
    fn apply(&self, conf: &mut Configuration) {
        for path in &self.include_paths {
            conf.add_include_path(path.as_str());
        }
        for path in &self.private_include_paths {
            conf.add_private_include_path(path.as_str());
        }
        for define in &self.defines {
            conf.add_define(define);
        }
        for define in &self.export_defines {
            conf.add_export_define(define);
        }
        for path in &self.library_paths {
            conf.add_library_path(path.as_str());
        }
        conf.add_library_files(&self.library_files);
        for option in &self.compiler_options {
            conf.add_compiler_option(option.as_str());
        }
        for (key, value) in &self.properties {
            conf.set_property(key.as_str(), value.as_str());
        }
        if let Some(kind) = self.output_kind {
            conf.set_output_kind(kind);
        }
        if let Some(path) = &self.output_path {
            conf.set_output_path(path.as_str());
        }
        if let Some(path) = &self.intermediate_path {
            conf.set_intermediate_path(path.as_str());
        }
        if let Some(name) = &self.target_file_name {
            conf.set_target_file_name(name.as_str());
        }
        for project in &self.public_dependencies {
            conf.add_public_dependency(project.as_str());
        }
        for project in &self.private_dependencies {
            conf.add_private_dependency(project.as_str());
        }
    }
}

/// Convert a declarative rule into a [`ConfigurationRule`]
pub fn configuration_rule(decl: &RuleDecl) -> BuildResult<ConfigurationRule> {
    let predicate = match &decl.when {
        Some(when) => target_predicate(when)?,
        None => TargetPredicate::all(),
    };
    let actions = RuleActions {
        include_paths: decl.include_paths.clone(),
        private_include_paths: decl.private_include_paths.clone(),
        defines: decl.defines.clone(),
        export_defines: decl.export_defines.clone(),
        library_paths: decl.library_paths.clone(),
        library_files: decl.library_files.clone(),
        compiler_options: decl.compiler_options.clone(),
        properties: decl.properties.clone(),
        output_kind: decl.output_kind.as_deref().map(parse_output_kind).transpose()?,
        output_path: decl.output_path.clone(),
        intermediate_path: decl.intermediate_path.clone(),
        target_file_name: decl.target_file_name.clone(),
        public_dependencies: decl.public_dependencies.clone(),
        private_dependencies: decl.private_dependencies.clone(),
    };

    Ok(
        ConfigurationRule::new(&decl.name, predicate, move |conf, _| actions.apply(conf))
            .with_priority(decl.priority),
    )
}
