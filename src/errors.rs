// src/errors.rs

//! Crate-wide error taxonomy and helpers.
//!
//! Structural errors (unknown dependencies, duplicate ids, bad state
//! transitions) are rejected synchronously at the call that caused them. A
//! failing *command* is never a `QueueError`: executor failures are recorded
//! as failed outcomes and only influence the queue-level status through the
//! stop-on-error guard.

use thiserror::Error;

use crate::queue::QueueStatus;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("command '{command}' depends on unknown command '{dependency}'")]
    UnknownDependency { command: String, dependency: String },

    #[error("duplicate command identity '{0}' in queue")]
    DuplicateCommandId(String),

    #[error("queue '{0}' already exists")]
    DuplicateQueueId(String),

    #[error("queue not found: {0}")]
    QueueNotFound(String),

    #[error("queue '{0}' is already executing")]
    AlreadyExecuting(String),

    #[error("queue '{queue}' cannot {operation} from state {from:?}")]
    InvalidStateTransition {
        queue: String,
        from: QueueStatus,
        operation: &'static str,
    },

    #[error("queue '{0}' has no commands")]
    EmptyQueue(String),

    #[error("queue '{0}' has no failed commands to retry")]
    NothingToRetry(String),

    #[error("executor failure for '{command}': {message}")]
    ExecutorFailure { command: String, message: String },

    #[error("queue definition error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, QueueError>;
