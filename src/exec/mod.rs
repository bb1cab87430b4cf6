// src/exec/mod.rs

//! Executor boundary.
//!
//! The engine never runs commands itself; it hands each one to a
//! [`CommandExecutor`] and awaits settlement. The executor call is the only
//! suspension point in the orchestration logic.
//!
//! - [`shell`] contains the production subprocess backend.
//! - Tests provide their own executor that settles commands without spawning
//!   processes (see `runqueue-test-utils`).

pub mod shell;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::errors::Result;
use crate::queue::Command;

pub use shell::ShellExecutor;

/// The recorded result of one execution attempt.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub command_id: String,
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
}

impl Outcome {
    pub fn success(command_id: impl Into<String>, output: Option<String>, duration: Duration) -> Self {
        Self {
            command_id: command_id.into(),
            success: true,
            output,
            error: None,
            duration,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(command_id: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            command_id: command_id.into(),
            success: false,
            output: None,
            error: Some(error.into()),
            duration,
            timestamp: Utc::now(),
        }
    }
}

/// Per-call context handed to the executor.
#[derive(Debug, Clone)]
pub struct ExecContext {
    pub queue_id: String,
    /// 0 for the initial run; incremented by each `retry_failed` pass.
    pub attempt: u32,
    /// Cancelled when the queue is cancelled or times out. Executors should
    /// stop in-flight work promptly and settle.
    pub cancellation: CancellationToken,
}

/// Trait abstracting how commands are executed against the target.
///
/// Implementations must not fail silently: any error is returned (or mapped
/// to a failed [`Outcome`]) so the runner can record it. The runner converts
/// an `Err` from `execute` into a synthesized failed outcome; it never
/// propagates it as a queue-level error.
pub trait CommandExecutor: Send + Sync {
    fn execute(
        &self,
        command: Command,
        ctx: ExecContext,
    ) -> Pin<Box<dyn Future<Output = Result<Outcome>> + Send + '_>>;
}
