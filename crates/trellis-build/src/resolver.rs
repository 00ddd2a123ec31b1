//! Dependency order of one target's project subgraph using topological sort
use crate::error::{BuildError, BuildResult};
use crate::graph::Visibility;
use crate::target::Target;
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap, HashSet};

/// A project node in a target-filtered graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetNode {
    pub name: String,
    /// Declaration index, used to break ordering ties
    pub index: usize,
    /// Direct dependencies with their effective visibility, in discovery order
    pub dependencies: IndexMap<String, Visibility>,
}

impl TargetNode {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            dependencies: IndexMap::new(),
        }
    }

    pub fn with_dependency(mut self, name: impl Into<String>, visibility: Visibility) -> Self {
        self.add_dependency(name, visibility);
        self
    }

    /// Add an edge; a repeated edge keeps the union of both visibilities
    pub fn add_dependency(&mut self, name: impl Into<String>, visibility: Visibility) {
        let name = name.into();
        let merged = match self.dependencies.get(&name) {
            Some(existing) => existing.union(visibility),
            None => visibility,
        };
        self.dependencies.insert(name, merged);
    }
}

/// Project subgraph reachable for one target
#[derive(Debug, Clone)]
pub struct TargetGraph {
    target: Target,
    nodes: IndexMap<String, TargetNode>,
}

impl TargetGraph {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            nodes: IndexMap::new(),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn add_node(&mut self, node: TargetNode) {
        self.nodes.insert(node.name.clone(), node);
    }

    pub fn get_node(&self, name: &str) -> Option<&TargetNode> {
        self.nodes.get(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TargetNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check all dependencies are nodes of this graph
    pub fn validate(&self) -> BuildResult<()> {
        for (name, node) in &self.nodes {
            for dep in node.dependencies.keys() {
                if !self.nodes.contains_key(dep) {
                    return Err(BuildError::UnknownProject {
                        project: format!("{} (required by {})", dep, name),
                    });
                }
            }
        }
        Ok(())
    }

    /// Compute the dependency order using Kahn's algorithm
    ///
    /// Every project comes after all its dependencies. Among projects that are
    /// ready at the same time the one declared first goes first, so the order
    /// is a pure function of the declarations.
    pub fn topological_order(&self) -> BuildResult<Vec<String>> {
        if self.nodes.is_empty() {
            return Ok(Vec::new());
        }

        let dependents = self.dependents();
        let mut remaining: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|(name, node)| (name.as_str(), node.dependencies.len()))
            .collect();

        let mut ready: BTreeSet<(usize, &str)> = self
            .nodes
            .values()
            .filter(|node| node.dependencies.is_empty())
            .map(|node| (node.index, node.name.as_str()))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(next) = ready.pop_first() {
            let (_, name) = next;
            order.push(name.to_string());

            for &dependent in dependents.get(name).into_iter().flatten() {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert((self.nodes[dependent].index, dependent));
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(BuildError::cyclic(&self.target, self.find_cycle()));
        }

        Ok(order)
    }

    /// Group projects into waves that can be compiled concurrently
    ///
    /// Every dependency of a project lives in an earlier wave. Projects inside a
    /// wave are in declaration order.
    pub fn parallel_groups(&self) -> BuildResult<Vec<Vec<String>>> {
        if self.nodes.is_empty() {
            return Ok(Vec::new());
        }

        let mut groups = Vec::new();
        let mut done: HashSet<&str> = HashSet::new();

        loop {
            let mut group: Vec<&TargetNode> = self
                .nodes
                .values()
                .filter(|node| !done.contains(node.name.as_str()))
                .filter(|node| {
                    node.dependencies
                        .keys()
                        .all(|dep| done.contains(dep.as_str()))
                })
                .collect();

            if group.is_empty() {
                break;
            }

            group.sort_by_key(|node| node.index);
            for node in &group {
                done.insert(node.name.as_str());
            }
            groups.push(group.into_iter().map(|node| node.name.clone()).collect());
        }

        if done.len() != self.nodes.len() {
            return Err(BuildError::cyclic(&self.target, self.find_cycle()));
        }

        Ok(groups)
    }

    /// Every project `name` depends on, directly or not, in no particular order
    pub fn transitive_dependencies(&self, name: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack: Vec<&str> = vec![name];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(current) {
                for dep in node.dependencies.keys() {
                    if seen.insert(dep.clone()) {
                        stack.push(dep);
                    }
                }
            }
        }
        seen
    }

    fn dependents(&self) -> HashMap<&str, Vec<&str>> {
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for (name, node) in &self.nodes {
            for dep in node.dependencies.keys() {
                dependents.entry(dep.as_str()).or_default().push(name.as_str());
            }
        }
        dependents
    }

    /// Find a cycle in the graph (for error reporting)
    fn find_cycle(&self) -> String {
        let mut visited = HashSet::new();
        let mut stack = HashSet::new();
        let mut path = Vec::new();

        for name in self.nodes.keys() {
            if let Some(cycle) = self.dfs_find_cycle(name, &mut visited, &mut stack, &mut path) {
                return cycle;
            }
        }

        "unknown cycle".to_string()
    }

    fn dfs_find_cycle(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
        stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<String> {
        if stack.contains(name) {
            path.push(name.to_string());
            if let Some(start) = path.iter().position(|p| p == name) {
                return Some(path[start..].join(" -> "));
            }
            return Some(path.join(" -> "));
        }

        if visited.contains(name) {
            return None;
        }

        visited.insert(name.to_string());
        stack.insert(name.to_string());
        path.push(name.to_string());

        if let Some(node) = self.nodes.get(name) {
            for dep in node.dependencies.keys() {
                if let Some(cycle) = self.dfs_find_cycle(dep, visited, stack, path) {
                    return Some(cycle);
                }
            }
        }

        stack.remove(name);
        path.pop();
        None
    }
}
