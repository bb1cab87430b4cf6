// src/queue/options.rs

//! Per-queue execution options and retry bookkeeping.

use std::time::Duration;

/// Options attached to a queue at submission time.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Upper bound on concurrently in-flight executor calls within a
    /// parallel group. Groups larger than this are chunked by a semaphore.
    pub max_concurrent: usize,

    pub retry_policy: RetryPolicy,

    /// Bound on the wall-clock duration of an entire queue run. Per-command
    /// timeouts are the executor's responsibility.
    pub timeout: Option<Duration>,

    /// Advisory priority, surfaced to outer schedulers. The engine itself
    /// never reorders queues by priority.
    pub priority: QueuePriority,

    /// Abort the remaining plan as soon as one command fails.
    pub stop_on_error: bool,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            retry_policy: RetryPolicy::default(),
            timeout: None,
            priority: QueuePriority::Normal,
            stop_on_error: false,
        }
    }
}

/// Advisory queue priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueuePriority {
    Low,
    #[default]
    Normal,
    High,
}

impl std::str::FromStr for QueuePriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(QueuePriority::Low),
            "normal" => Ok(QueuePriority::Normal),
            "high" => Ok(QueuePriority::High),
            other => Err(format!(
                "invalid priority: {other} (expected \"low\", \"normal\" or \"high\")"
            )),
        }
    }
}

/// Retry bookkeeping for failed commands.
///
/// The engine never retries on its own: `retry_failed` is caller-invoked, and
/// this policy only tells the caller how to pace repeated invocations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Base delay before the first retry.
    pub retry_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Suggested backoff before retry attempt `attempt` (0-based):
    /// `retry_delay * backoff_multiplier^attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.retry_delay
            .mul_f64(self.backoff_multiplier.powi(attempt as i32))
    }
}
