//! Dependency graph and topological ordering for extensions.
//!
//! An extension lists the names of extensions it depends on in the `depends`
//! field of its metadata. Names are compared case-insensitively. Two entries
//! are special:
//!
//! - `all` makes the extension depend on every other known extension;
//! - the extension's own name contributes nothing.
//!
//! A dependency on an extension that is not known contributes no edge.
//!
//! # Example
//!
//! ```
//! use ext_runtime::dependency::DependencyGraph;
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_node("storage");
//! graph.add_node("audit");
//! graph.add_edge("audit", "storage");
//!
//! let order = graph.topological_sort().unwrap();
//! assert_eq!(order, vec!["storage", "audit"]);
//! ```

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use ext_archive::{ExtensionMetadata, name_key, same_name};

use crate::error::{Error, Result};

/// Name that stands for "every other extension" in a `depends` list.
pub const ALL_SENTINEL: &str = "all";

/// Directed graph of dependencies between extensions.
///
/// Edges point from dependent to dependency: if A depends on B, the edge is
/// `A -> B` and B sorts first. Nodes keep their insertion order, which is
/// the tie-break between nodes that are not ordered by an edge.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    names: Vec<String>,
    index: HashMap<String, usize>,
    /// For each node, the nodes it depends on.
    edges: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its index. A name that is already present (in
    /// any case) keeps its original index.
    pub fn add_node(&mut self, name: &str) -> usize {
        let key = name_key(name);
        if let Some(&existing) = self.index.get(&key) {
            return existing;
        }
        let position = self.names.len();
        self.index.insert(key, position);
        self.names.push(name.to_string());
        self.edges.push(BTreeSet::new());
        position
    }

    /// Declare that `from` depends on `to`.
    ///
    /// Returns `false` without adding anything if either node is unknown or
    /// both name the same node.
    pub fn add_edge(&mut self, from: &str, to: &str) -> bool {
        match (self.position(from), self.position(to)) {
            (Some(from), Some(to)) if from != to => {
                self.edges[from].insert(to);
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(BTreeSet::len).sum()
    }

    /// Direct dependencies of a node, in insertion order.
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.position(name)
            .map(|i| self.edges[i].iter().map(|&d| self.names[d].as_str()).collect())
            .unwrap_or_default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.index.get(&name_key(name)).copied()
    }

    /// Names in dependency order. See [`topological_order`](Self::topological_order).
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        Ok(self
            .topological_order()?
            .into_iter()
            .map(|i| self.names[i].clone())
            .collect())
    }

    /// Kahn's algorithm over node indices. Among nodes that are ready at the
    /// same time the one inserted first goes first.
    ///
    /// # Errors
    ///
    /// Returns `Error::DependencyCycle` naming the extensions on the cycle.
    pub fn topological_order(&self) -> Result<Vec<usize>> {
        let count = self.names.len();
        let mut remaining: Vec<usize> = self.edges.iter().map(BTreeSet::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (from, deps) in self.edges.iter().enumerate() {
            for &to in deps {
                dependents[to].push(from);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = remaining
            .iter()
            .enumerate()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(count);
        while let Some(Reverse(current)) = ready.pop() {
            order.push(current);
            for &dependent in &dependents[current] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() != count {
            let involved = self.cycle_members(&remaining, &dependents);
            tracing::warn!(involved = ?involved, "Dependency cycle detected");
            return Err(Error::DependencyCycle { involved });
        }

        Ok(order)
    }

    /// Nodes left over after Kahn's pass either sit on a cycle or merely
    /// depend on one. Strip the latter: repeatedly drop leftover nodes that no
    /// other leftover node depends on.
    fn cycle_members(&self, remaining: &[usize], dependents: &[Vec<usize>]) -> Vec<String> {
        let mut alive: Vec<bool> = remaining.iter().map(|&deg| deg > 0).collect();
        loop {
            let dangling: Vec<usize> = (0..alive.len())
                .filter(|&i| alive[i] && !dependents[i].iter().any(|&d| alive[d]))
                .collect();
            if dangling.is_empty() {
                break;
            }
            for i in dangling {
                alive[i] = false;
            }
        }
        alive
            .iter()
            .enumerate()
            .filter(|&(_, &on_cycle)| on_cycle)
            .map(|(i, _)| self.names[i].clone())
            .collect()
    }

    /// Build the graph for a set of extensions, in registration order.
    ///
    /// Node `i` is the `i`-th extension as long as the names are distinct
    /// under [`name_key`], which the registry guarantees.
    pub fn from_metadata<'a>(extensions: impl IntoIterator<Item = &'a ExtensionMetadata>) -> Self {
        let extensions: Vec<&ExtensionMetadata> = extensions.into_iter().collect();
        let mut graph = Self::new();
        for metadata in &extensions {
            graph.add_node(&metadata.name);
        }

        for metadata in &extensions {
            for dependency in &metadata.depends {
                if same_name(dependency, ALL_SENTINEL) {
                    for other in &extensions {
                        graph.add_edge(&metadata.name, &other.name);
                    }
                } else if same_name(dependency, &metadata.name) {
                    continue;
                } else if !graph.add_edge(&metadata.name, dependency) {
                    tracing::warn!(
                        extension = %metadata.name,
                        dependency = %dependency,
                        "Ignoring dependency on unknown extension"
                    );
                }
            }
        }
        graph
    }
}
