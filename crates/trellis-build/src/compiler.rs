//! Configuration compiler
//!
//! Resolving one target runs in three phases:
//!
//! 1. every reachable project runs its rule chain base-first, then gets tokens
//!    expanded and path defaults filled in;
//! 2. the target-filtered graph of registered and rule-declared edges is
//!    ordered, failing on cycles and on dependencies without a variant;
//! 3. projects are assembled wave by wave, each inheriting the exports of its
//!    dependencies from the descriptor store.

use crate::configuration::{Configuration, ConfigurationParts, DeclaredDependency, RuleProvenance};
use crate::descriptor::{BuildDescriptor, ExportedSettings, SettingsAccumulator};
use crate::error::{BuildError, BuildResult};
use crate::graph::{Project, ProjectKind, Visibility};
use crate::resolver::{TargetGraph, TargetNode};
use crate::rules::RuleContext;
use crate::store::DescriptorStore;
use crate::target::Target;
use crate::tokens::TokenExpander;
use crate::workspace::Workspace;
use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use std::sync::Arc;

/// One project's rule chain output, before inheritance
#[derive(Debug, Clone)]
pub struct LocalConfiguration {
    pub project: String,
    pub kind: ProjectKind,
    /// Whether any rule set in the project's chain has rules at all
    pub has_rules: bool,
    pub declared: Vec<DeclaredDependency>,
    pub(crate) parts: ConfigurationParts,
    /// The project's own exported fields, without anything inherited
    pub own_exports: ExportedSettings,
}

impl LocalConfiguration {
    /// Whether at least one rule applied to the target
    pub fn has_variant(&self) -> bool {
        !self.has_rules || !self.parts.applied_rules.is_empty()
    }
}

/// Everything resolved for one target
#[derive(Debug, Clone)]
pub struct TargetResolution {
    pub target: Target,
    pub graph: TargetGraph,
    /// Dependencies before dependents
    pub order: Vec<String>,
    pub waves: usize,
    /// Descriptors in `order`
    pub descriptors: Vec<Arc<BuildDescriptor>>,
}

/// Compiles descriptors for (project, target) pairs of a workspace
#[derive(Debug, Clone, Copy)]
pub struct ConfigurationCompiler<'w> {
    workspace: &'w Workspace,
    strict: bool,
    parallel: bool,
}

impl<'w> ConfigurationCompiler<'w> {
    pub fn new(workspace: &'w Workspace) -> Self {
        Self {
            workspace,
            strict: false,
            parallel: true,
        }
    }

    /// Report same-priority scalar fights inside a rule set as errors
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Compile independent projects of a target concurrently
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Compile the descriptor of one project for `target`
    pub fn compile(&self, project: &str, target: &Target) -> BuildResult<Arc<BuildDescriptor>> {
        let store = DescriptorStore::new();
        let resolution = self.resolve_target(&[project.to_string()], target, &store)?;
        resolution
            .descriptors
            .into_iter()
            .find(|descriptor| descriptor.project == project)
            .ok_or_else(|| BuildError::unknown_project(project))
    }

    /// Run one project's rule chain for `target`
    pub fn compile_local(&self, project: &Project, target: &Target) -> BuildResult<LocalConfiguration> {
        let ctx = RuleContext {
            plan: self.workspace.context(),
            project,
            target,
        };
        let mut conf = Configuration::new(&project.name, target);
        let mut has_rules = false;

        if let Some(rule_set) = &project.rule_set {
            for set in self.workspace.rules().chain(rule_set) {
                has_rules |= !set.rules.is_empty();
                for rule in set.matching(target) {
                    conf.begin_rule(RuleProvenance {
                        rule_set: set.id.clone(),
                        rule: rule.name.clone(),
                        priority: rule.priority,
                    });
                    rule.apply(&mut conf, &ctx);
                    conf.end_rule();
                }
            }
        }

        if let Some(conflict) = conf.conflicts().first() {
            if self.strict {
                return Err(BuildError::ConflictingScalarOverride {
                    project: project.name.clone(),
                    rule_set: conflict.rule_set.clone(),
                    field: conflict.field.name(),
                    first_rule: conflict.first_rule.clone(),
                    first_value: conflict.first_value.clone(),
                    second_rule: conflict.second_rule.clone(),
                    second_value: conflict.second_value.clone(),
                });
            }
            tracing::debug!(
                project = %project.name,
                field = conflict.field.name(),
                rule_set = %conflict.rule_set,
                "scalar overridden at equal priority; last writer wins"
            );
        }

        if !conf.applied_rules().is_empty() {
            let expander = TokenExpander::new(&ctx);
            conf.map_strings(|value| expander.expand(value));

            let plan = self.workspace.context();
            let conf_name = target.configuration_name();
            conf.add_define(&format!(
                "TRELLIS_CONFIGURATION_{}",
                conf_name.to_uppercase()
            ));
            match project.kind {
                ProjectKind::Generate => {
                    conf.fill_default_output_path(format!("{}/{}", plan.output_root, conf_name));
                    conf.fill_default_intermediate_path(format!(
                        "{}/{}/{}",
                        plan.intermediate_root, conf_name, project.name
                    ));
                }
                ProjectKind::Export => conf.clear_output_paths(),
            }
        }

        tracing::debug!(
            project = %project.name,
            target = %target,
            rules = conf.applied_rules().len(),
            "compiled rule chain"
        );

        let declared = conf.dependencies().to_vec();
        let parts = conf.into_parts();
        let own_exports = ExportedSettings {
            include_paths: parts.include_paths.iter().cloned().collect(),
            defines: parts.export_defines.clone(),
            library_paths: parts.library_paths.iter().cloned().collect(),
            library_files: parts.library_files.iter().cloned().collect(),
        };

        Ok(LocalConfiguration {
            project: project.name.clone(),
            kind: project.kind,
            has_rules,
            declared,
            parts,
            own_exports,
        })
    }

    /// Resolve `roots` and everything they depend on for `target`
    ///
    /// Descriptors are published to `store` as they complete.
    pub fn resolve_target(
        &self,
        roots: &[String],
        target: &Target,
        store: &DescriptorStore,
    ) -> BuildResult<TargetResolution> {
        let span = tracing::debug_span!("resolve_target", target = %target);
        let _guard = span.enter();

        let (graph, locals) = self.discover(roots, target)?;
        graph.validate()?;

        let workspace = self.workspace;
        for node in graph.nodes() {
            for dep in node.dependencies.keys() {
                let has_variant = workspace.project(dep)?.supports(target)
                    && locals
                        .get(dep.as_str())
                        .map_or(true, LocalConfiguration::has_variant);
                if !has_variant {
                    return Err(BuildError::missing_variant(dep, &node.name, target));
                }
            }
        }

        let order = graph.topological_order()?;
        let waves = graph.parallel_groups()?;
        let positions: IndexMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        for wave in &waves {
            let assembled = self.map_names(wave, |name| {
                self.assemble(name, target, &graph, &locals, &positions, store)
            });
            for result in assembled {
                result?;
            }
        }

        let descriptors = order
            .iter()
            .map(|name| {
                store
                    .get(name, target)
                    .ok_or_else(|| BuildError::incomplete(name, name, target))
            })
            .collect::<BuildResult<Vec<_>>>()?;

        tracing::info!(
            target = %target,
            projects = order.len(),
            waves = waves.len(),
            "resolved target"
        );

        Ok(TargetResolution {
            target: target.clone(),
            graph,
            order,
            waves: waves.len(),
            descriptors,
        })
    }

    /// Compile every project reachable from `roots`, breadth first
    fn discover(
        &self,
        roots: &[String],
        target: &Target,
    ) -> BuildResult<(TargetGraph, IndexMap<String, LocalConfiguration>)> {
        let workspace = self.workspace;
        let mut graph = TargetGraph::new(target.clone());
        let mut locals: IndexMap<String, LocalConfiguration> = IndexMap::new();
        let mut queued: IndexSet<String> = roots.iter().cloned().collect();
        let mut frontier: Vec<String> = queued.iter().cloned().collect();

        while !frontier.is_empty() {
            let compiled = self.map_names(&frontier, |name| {
                let project = workspace.project(name)?;
                self.compile_local(project, target)
            });

            let mut next = Vec::new();
            for (name, result) in frontier.iter().zip(compiled) {
                let local = result?;
                let index = workspace
                    .graph()
                    .declaration_index(name)
                    .ok_or_else(|| BuildError::unknown_project(name.as_str()))?;

                let mut node = TargetNode::new(name.as_str(), index);
                for edge in workspace.graph().edges_for(name, target) {
                    node.add_dependency(edge.to.as_str(), edge.visibility);
                }
                for declared in &local.declared {
                    node.add_dependency(declared.project.as_str(), declared.visibility);
                }

                for dep in node.dependencies.keys() {
                    if !workspace.graph().contains(dep) {
                        return Err(BuildError::UnknownProject {
                            project: format!("{} (required by {})", dep, name),
                        });
                    }
                    if queued.insert(dep.clone()) {
                        next.push(dep.clone());
                    }
                }

                graph.add_node(node);
                locals.insert(name.clone(), local);
            }
            frontier = next;
        }

        Ok((graph, locals))
    }

    /// Merge inherited settings into one project and publish its descriptor
    fn assemble(
        &self,
        name: &str,
        target: &Target,
        graph: &TargetGraph,
        locals: &IndexMap<String, LocalConfiguration>,
        positions: &IndexMap<&str, usize>,
        store: &DescriptorStore,
    ) -> BuildResult<()> {
        let node = graph
            .get_node(name)
            .ok_or_else(|| BuildError::unknown_project(name))?;
        let local = locals
            .get(name)
            .ok_or_else(|| BuildError::unknown_project(name))?;
        let parts = &local.parts;

        let mut exports = SettingsAccumulator::default();
        exports.absorb(&local.own_exports);
        let mut inherited = SettingsAccumulator::default();

        for (dep, visibility) in &node.dependencies {
            match visibility {
                Visibility::Public => {
                    let resolved = store
                        .get(dep, target)
                        .ok_or_else(|| BuildError::incomplete(name, dep.as_str(), target))?;
                    exports.absorb(&resolved.exports);
                    inherited.absorb(&resolved.exports);
                }
                Visibility::Private => {
                    let dep_local = locals
                        .get(dep)
                        .ok_or_else(|| BuildError::incomplete(name, dep.as_str(), target))?;
                    inherited.absorb(&dep_local.own_exports);
                }
            }
        }

        let mut include_paths: IndexSet<String> = parts.include_paths.clone();
        include_paths.extend(parts.private_include_paths.iter().cloned());
        include_paths.extend(inherited.include_paths);

        let mut defines = parts.defines.clone();
        for (symbol, value) in &parts.export_defines {
            defines.insert(symbol.clone(), value.clone());
        }
        for (symbol, value) in inherited.defines {
            defines.entry(symbol).or_insert(value);
        }

        let mut library_paths = parts.library_paths.clone();
        library_paths.extend(inherited.library_paths);
        let mut library_files = parts.library_files.clone();
        library_files.extend(inherited.library_files);

        let transitive = graph.transitive_dependencies(name);
        let mut dependencies: Vec<String> = transitive.into_iter().collect();
        dependencies.sort_by_key(|dep| positions.get(dep.as_str()).copied().unwrap_or(usize::MAX));

        let descriptor = BuildDescriptor {
            project: name.to_string(),
            target: target.key(),
            configuration: target.configuration_name(),
            kind: local.kind,
            output_kind: parts.output_kind,
            output_path: parts.output_path.clone(),
            intermediate_path: parts.intermediate_path.clone(),
            target_file_name: parts.target_file_name.clone(),
            include_paths: include_paths.into_iter().collect(),
            defines,
            library_paths: library_paths.into_iter().collect(),
            library_files: library_files.into_iter().collect(),
            compiler_options: parts.compiler_options.iter().cloned().collect(),
            properties: parts.properties.clone(),
            dependencies,
            exports: exports.into_exports(),
            applied_rules: parts.applied_rules.clone(),
        };

        store.insert(target, descriptor)?;
        Ok(())
    }

    fn map_names<T, F>(&self, names: &[String], f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&str) -> T + Send + Sync,
    {
        if self.parallel && names.len() > 1 {
            names.par_iter().map(|name| f(name.as_str())).collect()
        } else {
            names.iter().map(|name| f(name.as_str())).collect()
        }
    }
}
