//! Declaration API and the immutable workspace it produces
//!
//! Declarations are registered on a [`WorkspaceBuilder`]. [`WorkspaceBuilder::finish`]
//! validates them, resolves every rule set chain once and returns a
//! [`Workspace`] that resolution runs only read from.

use crate::axis::union_targets;
use crate::error::{BuildError, BuildResult};
use crate::graph::{DependencyEdge, Project, ProjectGraph, Solution};
use crate::rules::{ConfigurationRule, PlanContext, RuleSet, RuleSetRegistry};
use crate::target::Target;
use indexmap::IndexMap;

/// Collects project, rule and edge declarations
#[derive(Debug, Default)]
pub struct WorkspaceBuilder {
    graph: ProjectGraph,
    rule_sets: IndexMap<String, RuleSet>,
    solutions: IndexMap<String, Solution>,
    context: PlanContext,
}

impl WorkspaceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a project; a second declaration of the same name is an error
    pub fn project(&mut self, project: Project) -> BuildResult<&mut Self> {
        if let Some(existing) = self.graph.get_project(&project.name) {
            return Err(BuildError::DuplicateProjectDeclaration {
                name: project.name.clone(),
                first: existing.origin.clone(),
                second: project.origin.clone(),
            });
        }
        self.graph.insert_project(project);
        Ok(self)
    }

    /// Register a project, explicitly replacing an earlier declaration
    ///
    /// Edges and inline rules registered for the earlier declaration are
    /// dropped with it.
    pub fn replace_project(&mut self, project: Project) -> &mut Self {
        if let Some(existing) = self.graph.get_project(&project.name) {
            tracing::debug!(project = %project.name, "replacing project declaration");
            if existing.rule_set.as_deref() == Some(project.name.as_str()) {
                self.rule_sets.shift_remove(&project.name);
            }
            self.graph.remove_edges_from(&project.name);
        }
        self.graph.insert_project(project);
        self
    }

    /// Register a rule set
    pub fn rule_set(&mut self, rule_set: RuleSet) -> BuildResult<&mut Self> {
        if self.rule_sets.contains_key(&rule_set.id) {
            return Err(BuildError::DuplicateRuleSet(rule_set.id));
        }
        self.rule_sets.insert(rule_set.id.clone(), rule_set);
        Ok(self)
    }

    /// Append a rule to an already registered rule set
    pub fn rule(&mut self, rule_set: &str, rule: ConfigurationRule) -> BuildResult<&mut Self> {
        let set = self
            .rule_sets
            .get_mut(rule_set)
            .ok_or_else(|| BuildError::UnknownRuleSet {
                rule_set: rule_set.to_string(),
                referenced_by: format!("rule '{}'", rule.name),
            })?;
        set.rules.push(rule);
        Ok(self)
    }

    /// Append a rule to the project's own rule set
    ///
    /// The first call creates a rule set named after the project whose base is
    /// the rule set the project declared, and makes it the project's rule set.
    pub fn project_rule(&mut self, project: &str, rule: ConfigurationRule) -> BuildResult<&mut Self> {
        let declared = self
            .graph
            .get_project(project)
            .ok_or_else(|| BuildError::unknown_project(project))?
            .rule_set
            .clone();

        if declared.as_deref() != Some(project) {
            if self.rule_sets.contains_key(project) {
                return Err(BuildError::DuplicateRuleSet(project.to_string()));
            }
            let mut own = RuleSet::new(project);
            own.base = declared;
            self.rule_sets.insert(project.to_string(), own);
            if let Some(mut updated) = self.graph.get_project(project).cloned() {
                updated.rule_set = Some(project.to_string());
                self.graph.insert_project(updated);
            }
        }

        self.rule(project, rule)
    }

    /// Register a dependency edge
    pub fn dependency(&mut self, edge: DependencyEdge) -> &mut Self {
        self.graph.add_edge(edge);
        self
    }

    /// Register a solution
    pub fn solution(&mut self, solution: Solution) -> BuildResult<&mut Self> {
        if self.solutions.contains_key(&solution.name) {
            return Err(BuildError::InvalidDeclaration(format!(
                "solution '{}' is declared more than once",
                solution.name
            )));
        }
        self.solutions.insert(solution.name.clone(), solution);
        Ok(self)
    }

    /// Set the context threaded into every rule
    pub fn context(&mut self, context: PlanContext) -> &mut Self {
        self.context = context;
        self
    }

    /// Validate the declarations and freeze them
    pub fn finish(self) -> BuildResult<Workspace> {
        self.graph.validate()?;

        let rules = RuleSetRegistry::new(self.rule_sets)?;

        for project in self.graph.projects() {
            if let Some(rule_set) = &project.rule_set {
                if !rules.contains(rule_set) {
                    return Err(BuildError::UnknownRuleSet {
                        rule_set: rule_set.clone(),
                        referenced_by: format!("project '{}'", project.name),
                    });
                }
            }
            project.axes.validate()?;
        }

        for solution in self.solutions.values() {
            let unknown = solution
                .projects
                .iter()
                .chain(solution.startup_project.iter())
                .find(|name| !self.graph.contains(name));
            if let Some(name) = unknown {
                return Err(BuildError::UnknownProject {
                    project: format!("{} (in solution {})", name, solution.name),
                });
            }
            solution.axes.validate()?;
        }

        tracing::debug!(
            projects = self.graph.len(),
            rule_sets = rules.len(),
            edges = self.graph.edges().len(),
            "workspace declarations frozen"
        );

        Ok(Workspace {
            graph: self.graph,
            rules,
            solutions: self.solutions,
            context: self.context,
        })
    }
}

/// Immutable snapshot of every declaration
#[derive(Debug, Clone)]
pub struct Workspace {
    graph: ProjectGraph,
    rules: RuleSetRegistry,
    solutions: IndexMap<String, Solution>,
    context: PlanContext,
}

impl Workspace {
    pub fn graph(&self) -> &ProjectGraph {
        &self.graph
    }

    pub fn rules(&self) -> &RuleSetRegistry {
        &self.rules
    }

    pub fn context(&self) -> &PlanContext {
        &self.context
    }

    pub fn project(&self, name: &str) -> BuildResult<&Project> {
        self.graph
            .get_project(name)
            .ok_or_else(|| BuildError::unknown_project(name))
    }

    pub fn solution(&self, name: &str) -> Option<&Solution> {
        self.solutions.get(name)
    }

    pub fn solutions(&self) -> impl Iterator<Item = &Solution> {
        self.solutions.values()
    }

    /// Every target any project is built for, in first-seen order
    pub fn targets(&self) -> BuildResult<Vec<Target>> {
        let per_project = self
            .graph
            .projects()
            .map(Project::targets)
            .collect::<BuildResult<Vec<_>>>()?;
        Ok(union_targets(per_project.iter().map(Vec::as_slice)))
    }

    /// Projects that declare `target` among their own targets
    pub fn projects_for(&self, target: &Target) -> BuildResult<Vec<&Project>> {
        let mut roots = Vec::new();
        for project in self.graph.projects() {
            if project.targets()?.contains(target) {
                roots.push(project);
            }
        }
        Ok(roots)
    }
}
