//! Configuration rules and rule sets
//!
//! A rule is a predicate over [`Target`] plus a merge function that writes into
//! a [`Configuration`]. Rules are grouped into rule sets; a rule set may name a
//! base rule set, and its chain runs base-first, each rule set's rules in
//! declaration order.

use crate::configuration::Configuration;
use crate::error::{BuildError, BuildResult};
use crate::graph::Project;
use crate::target::{BuildSystem, DevEnv, LaunchMode, Optimization, OutputKind, Platform, Target};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Predicate over target fields
///
/// Each axis is an optional allow-list; `None` accepts every value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetPredicate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<Platform>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_envs: Option<Vec<DevEnv>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimizations: Option<Vec<Optimization>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_kinds: Option<Vec<OutputKind>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_modes: Option<Vec<LaunchMode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_systems: Option<Vec<BuildSystem>>,
}

impl TargetPredicate {
    /// Predicate matching every target
    pub fn all() -> Self {
        Self::default()
    }

    pub fn platform(platform: Platform) -> Self {
        Self {
            platforms: Some(vec![platform]),
            ..Self::default()
        }
    }

    pub fn optimization(optimization: Optimization) -> Self {
        Self {
            optimizations: Some(vec![optimization]),
            ..Self::default()
        }
    }

    pub fn launch_mode(launch_mode: LaunchMode) -> Self {
        Self {
            launch_modes: Some(vec![launch_mode]),
            ..Self::default()
        }
    }

    pub fn and_optimization(mut self, optimization: Optimization) -> Self {
        self.optimizations
            .get_or_insert_with(Vec::new)
            .push(optimization);
        self
    }

    pub fn and_platform(mut self, platform: Platform) -> Self {
        self.platforms.get_or_insert_with(Vec::new).push(platform);
        self
    }

    /// Whether every axis filter accepts `target`
    pub fn matches(&self, target: &Target) -> bool {
        fn accepts<T: PartialEq>(filter: &Option<Vec<T>>, value: &T) -> bool {
            filter.as_ref().map_or(true, |allowed| allowed.contains(value))
        }

        accepts(&self.platforms, &target.platform)
            && accepts(&self.dev_envs, &target.dev_env)
            && accepts(&self.optimizations, &target.optimization)
            && accepts(&self.output_kinds, &target.output_kind)
            && accepts(&self.launch_modes, &target.launch_mode)
            && accepts(&self.build_systems, &target.build_system)
    }

    pub fn is_unconditional(&self) -> bool {
        self == &Self::default()
    }
}

/// Solution-wide paths and variables shared by every rule
///
/// Replaces process-wide environment variables: merge functions read from
/// here and never from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanContext {
    pub solution_root: String,
    pub intermediate_root: String,
    pub output_root: String,
    /// `%NAME%` substitutions
    #[serde(default)]
    pub variables: IndexMap<String, String>,
}

impl PlanContext {
    pub fn new(solution_root: impl Into<String>) -> Self {
        let solution_root = solution_root.into();
        Self {
            intermediate_root: format!("{}/Intermediate", solution_root),
            output_root: format!("{}/Binaries", solution_root),
            solution_root,
            variables: IndexMap::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

impl Default for PlanContext {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Immutable context handed to a merge function
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub plan: &'a PlanContext,
    pub project: &'a Project,
    pub target: &'a Target,
}

/// Merge function of a rule
pub type MergeFn = Arc<dyn Fn(&mut Configuration, &RuleContext<'_>) + Send + Sync>;

/// One configuration rule
#[derive(Clone)]
pub struct ConfigurationRule {
    pub name: String,
    pub predicate: TargetPredicate,
    /// Strict mode only reports scalar conflicts between rules of equal priority
    pub priority: i32,
    merge: MergeFn,
}

impl ConfigurationRule {
    /// Create a rule applying `merge` when `predicate` matches
    pub fn new<F>(name: impl Into<String>, predicate: TargetPredicate, merge: F) -> Self
    where
        F: Fn(&mut Configuration, &RuleContext<'_>) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate,
            priority: 0,
            merge: Arc::new(merge),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn applies_to(&self, target: &Target) -> bool {
        self.predicate.matches(target)
    }

    pub fn apply(&self, conf: &mut Configuration, ctx: &RuleContext<'_>) {
        (self.merge)(conf, ctx)
    }
}

impl fmt::Debug for ConfigurationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationRule")
            .field("name", &self.name)
            .field("predicate", &self.predicate)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Ordered group of rules with an optional base rule set
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub id: String,
    pub base: Option<String>,
    pub rules: Vec<ConfigurationRule>,
}

impl RuleSet {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base: None,
            rules: Vec::new(),
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_rule(mut self, rule: ConfigurationRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Rules of this set applicable to `target`, in declaration order
    pub fn matching<'a>(&'a self, target: &'a Target) -> impl Iterator<Item = &'a ConfigurationRule> {
        self.rules.iter().filter(move |rule| rule.applies_to(target))
    }
}

/// Rule sets by id, with base chains resolved
#[derive(Debug, Clone, Default)]
pub struct RuleSetRegistry {
    sets: IndexMap<String, Arc<RuleSet>>,
    /// Rule set id to chain of ids, most-base first
    chains: IndexMap<String, Vec<String>>,
}

impl RuleSetRegistry {
    /// Resolve every chain, rejecting unknown bases and cycles
    pub fn new(sets: IndexMap<String, RuleSet>) -> BuildResult<Self> {
        let sets: IndexMap<String, Arc<RuleSet>> =
            sets.into_iter().map(|(id, set)| (id, Arc::new(set))).collect();

        let mut chains = IndexMap::new();
        for id in sets.keys() {
            chains.insert(id.clone(), resolve_chain(&sets, id)?);
        }

        Ok(Self { sets, chains })
    }

    pub fn get(&self, id: &str) -> Option<&Arc<RuleSet>> {
        self.sets.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sets.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Rule sets of the chain ending at `id`, most-base first
    pub fn chain(&self, id: &str) -> Vec<&Arc<RuleSet>> {
        self.chains
            .get(id)
            .map(|ids| ids.iter().filter_map(|id| self.sets.get(id)).collect())
            .unwrap_or_default()
    }
}

fn resolve_chain(sets: &IndexMap<String, Arc<RuleSet>>, id: &str) -> BuildResult<Vec<String>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(id.to_string());

    while let Some(set_id) = current {
        if !seen.insert(set_id.clone()) {
            chain.push(set_id);
            chain.reverse();
            return Err(BuildError::RuleChainCycle(chain.join(" -> ")));
        }

        let set = sets.get(&set_id).ok_or_else(|| BuildError::UnknownRuleSet {
            rule_set: set_id.clone(),
            referenced_by: chain
                .last()
                .map(|derived: &String| format!("rule set '{}'", derived))
                .unwrap_or_else(|| "registry".to_string()),
        })?;

        current = set.base.clone();
        chain.push(set_id);
    }

    chain.reverse();
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(sets: Vec<RuleSet>) -> BuildResult<RuleSetRegistry> {
        RuleSetRegistry::new(sets.into_iter().map(|s| (s.id.clone(), s)).collect())
    }

    #[test]
    fn test_predicate_all_matches_everything() {
        let predicate = TargetPredicate::all();
        assert!(predicate.is_unconditional());
        assert!(predicate.matches(&Target::default()));
    }

    #[test]
    fn test_predicate_filters_axes() {
        let debug = TargetPredicate::optimization(Optimization::Debug);
        let target = Target::default();
        assert!(debug.matches(&target));
        assert!(!debug.matches(&target.clone().with_optimization(Optimization::Release)));

        let linux_debug = TargetPredicate::platform(Platform::Linux).and_optimization(Optimization::Debug);
        assert!(!linux_debug.matches(&target));
        assert!(linux_debug.matches(&target.with_platform(Platform::Linux)));
    }

    #[test]
    fn test_chain_is_base_first() {
        let reg = registry(vec![
            RuleSet::new("boost").with_base("vcpkg"),
            RuleSet::new("vcpkg").with_base("export"),
            RuleSet::new("export"),
        ])
        .unwrap();

        let ids: Vec<_> = reg.chain("boost").iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["export", "vcpkg", "boost"]);
        assert_eq!(reg.chain("export").len(), 1);
        assert!(reg.chain("missing").is_empty());
    }

    #[test]
    fn test_chain_cycle_rejected() {
        let result = registry(vec![
            RuleSet::new("a").with_base("b"),
            RuleSet::new("b").with_base("a"),
        ]);
        match result {
            Err(BuildError::RuleChainCycle(msg)) => {
                assert!(msg.contains("a"));
                assert!(msg.contains("b"));
            }
            other => panic!("Expected RuleChainCycle error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unknown_base_rejected() {
        let result = registry(vec![RuleSet::new("a").with_base("missing")]);
        match result {
            Err(BuildError::UnknownRuleSet { rule_set, referenced_by }) => {
                assert_eq!(rule_set, "missing");
                assert!(referenced_by.contains("'a'"));
            }
            other => panic!("Expected UnknownRuleSet error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_matching_preserves_declaration_order() {
        let set = RuleSet::new("core")
            .with_rule(ConfigurationRule::new("all", TargetPredicate::all(), |_, _| {}))
            .with_rule(ConfigurationRule::new(
                "release",
                TargetPredicate::optimization(Optimization::Release),
                |_, _| {},
            ))
            .with_rule(ConfigurationRule::new("late", TargetPredicate::all(), |_, _| {}));

        let target = Target::default();
        let names: Vec<_> = set.matching(&target).map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["all", "late"]);
    }
}
