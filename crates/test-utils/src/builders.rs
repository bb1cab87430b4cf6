#![allow(dead_code)]

use std::time::Duration;

use runqueue::queue::{Command, QueueOptions, QueuePriority, RetryPolicy};

/// Builder for [`Command`] to simplify test setup.
pub struct CommandBuilder {
    command: Command,
}

impl CommandBuilder {
    pub fn new(action: &str) -> Self {
        Self {
            command: Command::new(action),
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.command.id = Some(id.to_string());
        self
    }

    pub fn depends_on(mut self, dep: &str) -> Self {
        self.command.depends_on.push(dep.to_string());
        self
    }

    pub fn estimated_duration(mut self, duration: Duration) -> Self {
        self.command.estimated_duration = Some(duration);
        self
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.command.payload = Some(payload);
        self
    }

    pub fn build(self) -> Command {
        self.command
    }
}

/// Builder for [`QueueOptions`].
pub struct QueueOptionsBuilder {
    options: QueueOptions,
}

impl QueueOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: QueueOptions::default(),
        }
    }

    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.options.max_concurrent = n;
        self
    }

    pub fn stop_on_error(mut self, val: bool) -> Self {
        self.options.stop_on_error = val;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn priority(mut self, priority: QueuePriority) -> Self {
        self.options.priority = priority;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.options.retry_policy = policy;
        self
    }

    pub fn build(self) -> QueueOptions {
        self.options
    }
}

impl Default for QueueOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
