// src/plan/mod.rs

//! Execution-order derivation.
//!
//! Turns a [`DependencyGraph`] into an ordered list of execution groups using
//! a layered readiness scan (Kahn-style): every pass collects the commands
//! whose dependencies are all resolved, emits them as one group, and repeats.
//! A pass that finds nothing ready while commands remain means a cycle or
//! deadlock; those commands are swept into one final sequential fallback
//! group in original submission order, so the planner always terminates and
//! every command appears in exactly one group.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::graph::DependencyGraph;

/// How the commands of a group relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// Strictly ordered; the runner awaits each command before the next.
    Sequential,
    /// Mutually unordered; the runner dispatches members concurrently.
    Parallel,
}

/// A batch of commands scheduled together.
#[derive(Debug, Clone)]
pub struct ExecutionGroup {
    pub kind: GroupKind,
    /// Command identities, in submission order.
    pub commands: Vec<String>,
}

/// The ordered groups for one queue run.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub groups: Vec<ExecutionGroup>,
    pub total_commands: usize,
}

impl ExecutionPlan {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Derive the execution plan for a graph.
///
/// Guarantees:
/// - the concatenation of all groups is a permutation of the command set;
/// - every command's dependencies appear in an earlier group, except for
///   commands swept into the cycle fallback group.
pub fn plan(graph: &DependencyGraph) -> ExecutionPlan {
    let mut remaining: Vec<String> = graph.identities().map(str::to_string).collect();
    let mut resolved: HashSet<String> = HashSet::new();
    let mut groups = Vec::new();
    let total_commands = remaining.len();

    while !remaining.is_empty() {
        let ready: Vec<String> = remaining
            .iter()
            .filter(|identity| {
                graph
                    .dependencies_of(identity)
                    .iter()
                    .all(|dep| resolved.contains(dep))
            })
            .cloned()
            .collect();

        if ready.is_empty() {
            // Cycle or deadlock: nothing can make progress through the
            // dependency relation. Run whatever is left sequentially in
            // submission order rather than rejecting the queue.
            warn!(
                stranded = remaining.len(),
                "unresolvable dependencies; emitting sequential fallback group"
            );
            groups.push(ExecutionGroup {
                kind: GroupKind::Sequential,
                commands: remaining,
            });
            break;
        }

        let kind = if ready.len() == 1 {
            GroupKind::Sequential
        } else {
            GroupKind::Parallel
        };

        debug!(?kind, commands = ?ready, "planned execution group");

        for identity in &ready {
            resolved.insert(identity.clone());
        }
        remaining.retain(|identity| !resolved.contains(identity));

        groups.push(ExecutionGroup {
            kind,
            commands: ready,
        });
    }

    ExecutionPlan {
        groups,
        total_commands,
    }
}
