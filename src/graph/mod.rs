// src/graph/mod.rs

//! Dependency graph over the commands of one queue.
//!
//! Built once at queue creation and immutable afterwards. Construction
//! enforces identity uniqueness and known dependency references, but does
//! *not* reject cycles: cycle handling is deferred to the planner, which
//! sweeps unresolvable commands into a sequential fallback group so a
//! malformed queue still makes partial progress instead of being rejected
//! outright. [`DependencyGraph::is_acyclic`] exists so callers can diagnose
//! and warn at creation time.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{QueueError, Result};
use crate::queue::Command;

/// Adjacency for one command.
#[derive(Debug, Clone)]
struct GraphNode {
    /// Index into the original command list.
    index: usize,
    /// Identities this command waits on.
    dependencies: Vec<String>,
    /// Identities that wait on this command.
    dependents: Vec<String>,
}

/// Forward and reverse adjacency keyed by command identity.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: HashMap<String, GraphNode>,
    /// Identities in original submission order, for deterministic scans.
    order: Vec<String>,
}

impl DependencyGraph {
    /// Build the graph for a command list.
    ///
    /// Fails with [`QueueError::DuplicateCommandId`] when two commands share
    /// an identity and [`QueueError::UnknownDependency`] when a `depends_on`
    /// entry references an identity not present in the list.
    pub fn build(commands: &[Command]) -> Result<Self> {
        let mut nodes: HashMap<String, GraphNode> = HashMap::new();
        let mut order = Vec::with_capacity(commands.len());

        for (index, command) in commands.iter().enumerate() {
            let identity = command.identity().to_string();
            if nodes.contains_key(&identity) {
                return Err(QueueError::DuplicateCommandId(identity));
            }
            nodes.insert(
                identity.clone(),
                GraphNode {
                    index,
                    dependencies: command.depends_on.clone(),
                    dependents: Vec::new(),
                },
            );
            order.push(identity);
        }

        // Reverse adjacency; every dependency must name a known identity.
        for command in commands {
            let identity = command.identity();
            for dep in &command.depends_on {
                match nodes.get_mut(dep) {
                    Some(node) => node.dependents.push(identity.to_string()),
                    None => {
                        return Err(QueueError::UnknownDependency {
                            command: identity.to_string(),
                            dependency: dep.clone(),
                        });
                    }
                }
            }
        }

        Ok(Self { nodes, order })
    }

    /// Identities in original submission order.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Index of a command in the original submission order.
    pub fn index_of(&self, identity: &str) -> Option<usize> {
        self.nodes.get(identity).map(|n| n.index)
    }

    /// Immediate dependencies of a command.
    pub fn dependencies_of(&self, identity: &str) -> &[String] {
        self.nodes
            .get(identity)
            .map(|n| n.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a command.
    pub fn dependents_of(&self, identity: &str) -> &[String] {
        self.nodes
            .get(identity)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the dependency relation is cycle-free.
    ///
    /// Cyclic queues still execute (fallback group); this is diagnostic only.
    pub fn is_acyclic(&self) -> bool {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for identity in &self.order {
            graph.add_node(identity.as_str());
        }

        // Edge direction: dependency -> dependent.
        for (identity, node) in &self.nodes {
            for dep in &node.dependencies {
                graph.add_edge(dep.as_str(), identity.as_str(), ());
            }
        }

        toposort(&graph, None).is_ok()
    }
}
