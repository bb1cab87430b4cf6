// src/queue/state.rs

//! Queue status state machine and mutable per-run state.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::exec::Outcome;

/// Lifecycle status of a queue.
///
/// Transitions:
/// - `Pending -> Executing -> {Completed, Failed}`
/// - `Executing -> Paused -> Executing` (explicit resume; completed commands
///   are not re-executed)
/// - `Failed -> Executing` (via `retry_failed` only)
/// - any non-terminal state `-> Cancelled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueStatus {
    Pending,
    Executing,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl QueueStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            QueueStatus::Completed | QueueStatus::Failed | QueueStatus::Cancelled
        )
    }
}

/// Mutable run state of a queue.
///
/// Success for a command moves its identity from `failed` into `completed`;
/// failure does the reverse. `outcomes` appends every settlement, so a retried
/// command contributes one entry per attempt.
#[derive(Debug, Default)]
pub struct ExecutionState {
    /// Index of the plan group the runner last worked on.
    pub current_step: usize,
    pub completed: HashSet<String>,
    pub failed: HashSet<String>,
    /// Number of `retry_failed` invocations on this queue.
    pub retry_count: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<Outcome>,
}

impl ExecutionState {
    /// Record a settled outcome, updating the completed/failed sets.
    pub fn record(&mut self, outcome: Outcome) {
        let identity = outcome.command_id.clone();
        if outcome.success {
            self.failed.remove(&identity);
            self.completed.insert(identity);
        } else {
            self.completed.remove(&identity);
            self.failed.insert(identity);
        }
        self.outcomes.push(outcome);
    }

    /// Number of distinct commands that have settled successfully.
    pub fn completed_steps(&self) -> usize {
        self.completed.len()
    }
}
