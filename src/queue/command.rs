// src/queue/command.rs

//! The unit of work: a single command with declared dependencies.

use std::time::Duration;

/// One command in a queue.
///
/// Identity is `id` if present, else `action`. Identities must be unique
/// within a queue; [`crate::graph::DependencyGraph::build`] rejects
/// duplicates at creation time.
#[derive(Debug, Clone)]
pub struct Command {
    /// Optional explicit identity. Falls back to `action` when absent.
    pub id: Option<String>,

    /// What to execute. Opaque to the engine; interpreted by the executor
    /// (a shell line for the subprocess backend, an operation name for
    /// remote backends).
    pub action: String,

    /// Identities of commands that must settle successfully before this one
    /// may be dispatched.
    pub depends_on: Vec<String>,

    /// Advisory duration estimate, surfaced to event consumers. Never used
    /// for scheduling decisions.
    pub estimated_duration: Option<Duration>,

    /// Opaque executor payload (arguments, environment, target details).
    pub payload: Option<serde_json::Value>,
}

impl Command {
    /// Create a command whose identity is its action.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            id: None,
            action: action.into(),
            depends_on: Vec::new(),
            estimated_duration: None,
            payload: None,
        }
    }

    /// The identity used for dependency references and result bookkeeping.
    pub fn identity(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.action)
    }
}
