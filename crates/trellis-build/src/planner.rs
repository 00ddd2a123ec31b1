//! Plan orchestration across targets
use crate::compiler::{ConfigurationCompiler, TargetResolution};
use crate::error::{BuildError, BuildResult, ErrorKind};
use crate::store::DescriptorStore;
use crate::target::Target;
use crate::workspace::Workspace;
use rayon::prelude::*;
use std::fmt;
use std::time::{Duration, Instant};

/// Plan configuration
#[derive(Debug, Clone)]
pub struct PlanConfig {
    /// Fail on same-priority scalar conflicts inside a rule set
    pub strict: bool,
    /// Resolve targets and independent projects concurrently
    pub parallel: bool,
    /// Worker threads; `None` uses the rayon default
    pub jobs: Option<usize>,
    /// Only plan targets with these keys; empty plans every target
    pub targets: Vec<String>,
    /// Plan a solution's roots and axes instead of every project
    pub solution: Option<String>,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            strict: false,
            parallel: true,
            jobs: None,
            targets: Vec::new(),
            solution: None,
        }
    }
}

/// Plan statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanStats {
    /// Targets attempted
    pub total_targets: usize,
    /// Targets that resolved
    pub planned_targets: usize,
    /// Targets that failed
    pub failed_targets: usize,
    /// Descriptors produced by successful targets
    pub descriptors: usize,
    /// Sum of compile waves over successful targets
    pub waves: usize,
    pub total_time: Duration,
}

/// One failed (project, target) resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub target: String,
    pub project: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
}

impl Failure {
    pub fn from_error(target: &Target, error: &BuildError) -> Self {
        Self {
            target: target.key(),
            project: error.project().map(str::to_string),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.project {
            Some(project) => write!(
                f,
                "[{}] {} in '{}': {}",
                self.target, self.kind, project, self.message
            ),
            None => write!(f, "[{}] {}: {}", self.target, self.kind, self.message),
        }
    }
}

/// Every failure of a run, in target order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureReport {
    failures: Vec<Failure>,
}

impl FailureReport {
    pub fn push(&mut self, failure: Failure) {
        self.failures.push(failure);
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Failure> {
        self.failures.iter()
    }

    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.failures.iter().any(|f| f.kind == kind)
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} resolution failure(s):", self.failures.len())?;
        for failure in &self.failures {
            writeln!(f, "  {}", failure)?;
        }
        Ok(())
    }
}

/// Result of a plan run
#[derive(Debug)]
pub struct PlanOutcome {
    pub solution: Option<String>,
    pub startup_project: Option<String>,
    /// Successful targets, in target order
    pub resolutions: Vec<TargetResolution>,
    pub failures: FailureReport,
    pub stats: PlanStats,
}

impl PlanOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A target and the projects resolved from it
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTarget {
    pub target: Target,
    pub roots: Vec<String>,
}

/// Runs resolution for every requested target
pub struct Planner<'w> {
    workspace: &'w Workspace,
    config: PlanConfig,
}

impl<'w> Planner<'w> {
    pub fn new(workspace: &'w Workspace) -> Self {
        Self {
            workspace,
            config: PlanConfig::default(),
        }
    }

    /// Set plan configuration
    pub fn with_config(mut self, config: PlanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn with_targets(mut self, keys: Vec<String>) -> Self {
        self.config.targets = keys;
        self
    }

    pub fn with_solution(mut self, solution: impl Into<String>) -> Self {
        self.config.solution = Some(solution.into());
        self
    }

    pub fn config(&self) -> &PlanConfig {
        &self.config
    }

    /// Targets to plan and their root projects, in target order
    pub fn planned_targets(&self) -> BuildResult<Vec<PlannedTarget>> {
        let mut planned = Vec::new();

        match &self.config.solution {
            Some(name) => {
                let solution = self.workspace.solution(name).ok_or_else(|| {
                    BuildError::InvalidDeclaration(format!("unknown solution '{}'", name))
                })?;
                for target in solution.axes.expand()? {
                    let mut roots = Vec::new();
                    for project in &solution.projects {
                        if self.workspace.project(project)?.targets()?.contains(&target) {
                            roots.push(project.clone());
                        }
                    }
                    if !roots.is_empty() {
                        planned.push(PlannedTarget { target, roots });
                    }
                }
            }
            None => {
                for target in self.workspace.targets()? {
                    let roots = self
                        .workspace
                        .projects_for(&target)?
                        .into_iter()
                        .map(|project| project.name.clone())
                        .collect();
                    planned.push(PlannedTarget { target, roots });
                }
            }
        }

        if self.config.targets.is_empty() {
            return Ok(planned);
        }

        for key in &self.config.targets {
            if !planned.iter().any(|p| &p.target.key() == key) {
                return Err(BuildError::invalid_axis(
                    "target",
                    format!("no project is built for target '{}'", key),
                ));
            }
        }
        planned.retain(|p| self.config.targets.contains(&p.target.key()));
        Ok(planned)
    }

    /// Resolve every planned target
    ///
    /// A failing target is recorded in the failure report and produces no
    /// resolution; the other targets still resolve.
    pub fn plan(&self) -> BuildResult<PlanOutcome> {
        match self.config.jobs {
            Some(jobs) if self.config.parallel => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
                pool.install(|| self.run())
            }
            _ => self.run(),
        }
    }

    fn run(&self) -> BuildResult<PlanOutcome> {
        let start = Instant::now();
        let planned = self.planned_targets()?;
        let compiler = ConfigurationCompiler::new(self.workspace)
            .strict(self.config.strict)
            .parallel(self.config.parallel);
        let store = DescriptorStore::new();

        let resolve = |p: &PlannedTarget| compiler.resolve_target(&p.roots, &p.target, &store);
        let results: Vec<BuildResult<TargetResolution>> = if self.config.parallel {
            planned.par_iter().map(resolve).collect()
        } else {
            planned.iter().map(resolve).collect()
        };

        let mut stats = PlanStats {
            total_targets: planned.len(),
            ..PlanStats::default()
        };
        let mut resolutions = Vec::new();
        let mut failures = FailureReport::default();

        for (planned_target, result) in planned.iter().zip(results) {
            match result {
                Ok(resolution) => {
                    stats.planned_targets += 1;
                    stats.descriptors += resolution.descriptors.len();
                    stats.waves += resolution.waves;
                    resolutions.push(resolution);
                }
                Err(error) => {
                    tracing::warn!(target = %planned_target.target, %error, "target failed");
                    stats.failed_targets += 1;
                    failures.push(Failure::from_error(&planned_target.target, &error));
                }
            }
        }

        stats.total_time = start.elapsed();
        tracing::info!(
            planned = stats.planned_targets,
            failed = stats.failed_targets,
            descriptors = stats.descriptors,
            "plan finished"
        );

        let solution = self
            .config
            .solution
            .as_ref()
            .and_then(|name| self.workspace.solution(name));

        Ok(PlanOutcome {
            solution: solution.map(|s| s.name.clone()),
            startup_project: solution.and_then(|s| s.startup_project.clone()),
            resolutions,
            failures,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::TargetAxes;
    use crate::graph::{DependencyEdge, Project, Solution};
    use crate::rules::{ConfigurationRule, TargetPredicate};
    use crate::target::{DevEnv, Optimization, Platform};
    use crate::workspace::WorkspaceBuilder;

    fn single_target_axes() -> TargetAxes {
        TargetAxes::single(&Target::default())
    }

    #[test]
    fn test_plan_config_default() {
        let config = PlanConfig::default();
        assert!(config.parallel);
        assert!(!config.strict);
        assert!(config.targets.is_empty());
    }

    #[test]
    fn test_failures_do_not_stop_other_targets() {
        let mut builder = WorkspaceBuilder::new();
        let axes = single_target_axes().with_optimizations(Optimization::Debug | Optimization::Release);
        builder.project(Project::new("A", "a").with_axes(axes.clone())).unwrap();
        builder.project(Project::new("B", "b").with_axes(axes)).unwrap();
        builder.dependency(DependencyEdge::public("A", "B"));
        builder.dependency(
            DependencyEdge::public("B", "A")
                .with_filter(TargetPredicate::optimization(Optimization::Release)),
        );
        let ws = builder.finish().unwrap();

        for parallel in [true, false] {
            let outcome = Planner::new(&ws).with_parallel(parallel).plan().unwrap();
            assert!(!outcome.is_success());
            assert_eq!(outcome.stats.planned_targets, 1);
            assert_eq!(outcome.stats.failed_targets, 1);
            assert_eq!(outcome.resolutions[0].target.optimization, Optimization::Debug);
            assert_eq!(outcome.resolutions[0].order, vec!["B", "A"]);
            assert!(outcome.failures.has_kind(ErrorKind::CyclicDependency));

            let report = outcome.failures.to_string();
            assert!(report.contains("CyclicDependencyError"));
            assert!(report.contains("release"));
        }
    }

    #[test]
    fn test_target_filter() {
        let mut builder = WorkspaceBuilder::new();
        builder.project(Project::new("A", "a")).unwrap();
        let ws = builder.finish().unwrap();

        let key = Target::default().key();
        let planner = Planner::new(&ws).with_targets(vec![key.clone()]);
        let planned = planner.planned_targets().unwrap();
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].target.key(), key);

        let err = Planner::new(&ws)
            .with_targets(vec!["nope".to_string()])
            .planned_targets()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAxis);
    }

    #[test]
    fn test_solution_roots_and_startup() {
        let mut builder = WorkspaceBuilder::new();
        builder
            .project(Project::new("Game", "game").with_axes(single_target_axes()))
            .unwrap();
        builder
            .project(Project::new("Tool", "tool").with_axes(single_target_axes()))
            .unwrap();
        builder
            .project(Project::new("Core", "core").with_axes(single_target_axes()))
            .unwrap();
        builder
            .project_rule(
                "Core",
                ConfigurationRule::new("all", TargetPredicate::all(), |conf, _| {
                    conf.add_include_path("core");
                }),
            )
            .unwrap();
        builder.dependency(DependencyEdge::private("Game", "Core"));
        builder
            .solution(
                Solution::new("Engine")
                    .with_project("Game")
                    .with_startup_project("Game")
                    .with_axes(single_target_axes()),
            )
            .unwrap();
        let ws = builder.finish().unwrap();

        let outcome = Planner::new(&ws).with_solution("Engine").plan().unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.solution.as_deref(), Some("Engine"));
        assert_eq!(outcome.startup_project.as_deref(), Some("Game"));
        assert_eq!(outcome.resolutions.len(), 1);
        assert_eq!(outcome.resolutions[0].order, vec!["Core", "Game"]);
    }

    #[test]
    fn test_custom_axis_targets_resolve_independently() {
        let xbox_one = Platform::Custom("xbox_one".to_string());
        let xbox = Platform::Custom("xbox".to_string());
        let axes = single_target_axes()
            .with_platforms(vec![xbox_one.clone(), xbox.clone()])
            .with_dev_envs(vec![
                DevEnv::Custom("gdk".to_string()),
                DevEnv::Custom("one_gdk".to_string()),
            ]);

        let mut builder = WorkspaceBuilder::new();
        builder.project(Project::new("Core", "core").with_axes(axes.clone())).unwrap();
        builder.project(Project::new("Game", "game").with_axes(axes)).unwrap();
        builder
            .project_rule(
                "Core",
                ConfigurationRule::new(
                    "consoles",
                    TargetPredicate::platform(xbox_one).and_platform(xbox),
                    |conf, ctx| {
                        let symbol = format!(
                            "{}_{}_API",
                            ctx.target.platform.name(),
                            ctx.target.dev_env.name()
                        );
                        conf.add_export_define(&symbol.to_uppercase());
                    },
                ),
            )
            .unwrap();
        builder.dependency(DependencyEdge::public("Game", "Core"));
        let ws = builder.finish().unwrap();

        for parallel in [true, false] {
            let outcome = Planner::new(&ws).with_parallel(parallel).plan().unwrap();
            assert!(outcome.is_success(), "{}", outcome.failures);
            assert_eq!(outcome.stats.planned_targets, 4);

            for resolution in &outcome.resolutions {
                let game = resolution
                    .descriptors
                    .iter()
                    .find(|d| d.project == "Game")
                    .unwrap();
                let expected = format!(
                    "{}_{}_API",
                    resolution.target.platform.name(),
                    resolution.target.dev_env.name()
                )
                .to_uppercase();
                assert_eq!(game.defines.len(), 1);
                assert!(game.defines.contains_key(&expected));
            }
        }
    }

    #[test]
    fn test_projects_only_planned_for_their_targets() {
        let mut builder = WorkspaceBuilder::new();
        builder
            .project(Project::new("Win", "win").with_axes(single_target_axes()))
            .unwrap();
        builder
            .project(Project::new("Linux", "linux").with_axes(
                single_target_axes().with_platforms(vec![Platform::Linux]),
            ))
            .unwrap();
        let ws = builder.finish().unwrap();

        let outcome = Planner::new(&ws).with_config(PlanConfig {
            jobs: Some(2),
            ..PlanConfig::default()
        })
        .plan()
        .unwrap();
        assert_eq!(outcome.stats.total_targets, 2);
        let orders: Vec<_> = outcome.resolutions.iter().map(|r| r.order.clone()).collect();
        assert_eq!(orders, vec![vec!["Win"], vec!["Linux"]]);
    }
}
