// src/manager/stats.rs

//! Aggregate statistics across all queues.

use std::time::Duration;

use crate::queue::{Queue, QueueStatus};

/// Counts and timings aggregated over the manager's queues.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManagerStatistics {
    pub total_queues: usize,
    pub pending: usize,
    pub executing: usize,
    pub paused: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Average wall-clock duration over completed queues.
    pub average_duration: Option<Duration>,
    pub total_commands: usize,
    pub succeeded_commands: usize,
    pub failed_commands: usize,
}

/// Accumulates statistics one queue at a time.
#[derive(Debug, Default)]
pub(crate) struct StatisticsBuilder {
    stats: ManagerStatistics,
    completed_duration_sum: Duration,
}

impl StatisticsBuilder {
    pub fn observe(&mut self, queue: &Queue) {
        self.stats.total_queues += 1;
        match queue.status {
            QueueStatus::Pending => self.stats.pending += 1,
            QueueStatus::Executing => self.stats.executing += 1,
            QueueStatus::Paused => self.stats.paused += 1,
            QueueStatus::Completed => self.stats.completed += 1,
            QueueStatus::Failed => self.stats.failed += 1,
            QueueStatus::Cancelled => self.stats.cancelled += 1,
        }

        self.stats.total_commands += queue.commands.len();
        self.stats.succeeded_commands += queue.execution.completed.len();
        self.stats.failed_commands += queue.execution.failed.len();

        if queue.status == QueueStatus::Completed {
            if let (Some(start), Some(end)) =
                (queue.execution.started_at, queue.execution.finished_at)
            {
                if let Ok(elapsed) = (end - start).to_std() {
                    self.completed_duration_sum += elapsed;
                }
            }
        }
    }

    pub fn finish(self) -> ManagerStatistics {
        let mut stats = self.stats;
        if stats.completed > 0 {
            stats.average_duration = Some(self.completed_duration_sum / stats.completed as u32);
        }
        stats
    }
}
