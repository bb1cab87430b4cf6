// src/events/mod.rs

//! Event publication surface.
//!
//! The engine reports lifecycle transitions through an [`EventSink`] passed
//! in at construction, decoupling the core from any particular pub/sub
//! mechanism. Delivery is fire-and-forget: a sink must never block the run,
//! and publication cannot fail from the engine's perspective.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A lifecycle event with its structured payload.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    QueueCreated {
        queue_id: String,
        total_commands: usize,
    },
    QueueStarted {
        queue_id: String,
    },
    QueueCompleted {
        queue_id: String,
        success_count: usize,
        total_count: usize,
    },
    QueueFailed {
        queue_id: String,
        failed: Vec<String>,
    },
    QueuePaused {
        queue_id: String,
    },
    QueueResumed {
        queue_id: String,
    },
    QueueCancelled {
        queue_id: String,
    },
    CommandStarted {
        queue_id: String,
        command_id: String,
    },
    CommandCompleted {
        queue_id: String,
        command_id: String,
        duration: Duration,
    },
    CommandFailed {
        queue_id: String,
        command_id: String,
        error: String,
    },
    /// Emitted after every command settlement.
    Progress {
        queue_id: String,
        command_id: String,
        percent: f64,
    },
}

impl QueueEvent {
    /// The queue this event concerns.
    pub fn queue_id(&self) -> &str {
        match self {
            QueueEvent::QueueCreated { queue_id, .. }
            | QueueEvent::QueueStarted { queue_id }
            | QueueEvent::QueueCompleted { queue_id, .. }
            | QueueEvent::QueueFailed { queue_id, .. }
            | QueueEvent::QueuePaused { queue_id }
            | QueueEvent::QueueResumed { queue_id }
            | QueueEvent::QueueCancelled { queue_id }
            | QueueEvent::CommandStarted { queue_id, .. }
            | QueueEvent::CommandCompleted { queue_id, .. }
            | QueueEvent::CommandFailed { queue_id, .. }
            | QueueEvent::Progress { queue_id, .. } => queue_id,
        }
    }
}

/// Where the engine publishes lifecycle events.
///
/// Implementations must be cheap and non-blocking; anything slow belongs on
/// the far side of a channel.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: QueueEvent);
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn publish(&self, _event: QueueEvent) {}
}

/// Logs events through `tracing`.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn publish(&self, event: QueueEvent) {
        match &event {
            QueueEvent::CommandStarted {
                queue_id,
                command_id,
            } => {
                debug!(queue = %queue_id, command = %command_id, "command started");
            }
            QueueEvent::CommandCompleted {
                queue_id,
                command_id,
                duration,
            } => {
                debug!(queue = %queue_id, command = %command_id, ?duration, "command completed");
            }
            QueueEvent::CommandFailed {
                queue_id,
                command_id,
                error,
            } => {
                warn!(queue = %queue_id, command = %command_id, error = %error, "command failed");
            }
            QueueEvent::Progress {
                queue_id,
                command_id,
                percent,
            } => {
                debug!(queue = %queue_id, command = %command_id, percent, "progress");
            }
            other => {
                info!(queue = %other.queue_id(), event = ?other, "queue event");
            }
        }
    }
}

/// Forwards events over an unbounded channel.
///
/// Publication never blocks; once the receiver is dropped, further events are
/// silently discarded.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<QueueEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<QueueEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn publish(&self, event: QueueEvent) {
        let _ = self.tx.send(event);
    }
}
