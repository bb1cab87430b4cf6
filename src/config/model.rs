// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::queue::{Command, QueueOptions, QueuePriority, RetryPolicy};

/// Top-level queue definition as read from a TOML file.
///
/// ```toml
/// [queue]
/// id = "deploy"
/// max_concurrent = 4
/// stop_on_error = true
/// timeout_secs = 600
///
/// [queue.retry]
/// max_retries = 3
/// retry_delay_ms = 500
/// backoff_multiplier = 2.0
///
/// [command.build]
/// run = "cargo build --release"
///
/// [command.upload]
/// run = "scp target/release/app host:/srv"
/// depends_on = ["build"]
/// ```
///
/// All `[queue]` fields are optional with reasonable defaults. Command keys
/// are the command identities; `BTreeMap` keeps submission order
/// deterministic (alphabetical by identity).
#[derive(Debug, Clone, Deserialize)]
pub struct RawQueueFile {
    #[serde(default)]
    pub queue: QueueSection,

    /// All commands from `[command.<id>]`.
    #[serde(default)]
    pub command: BTreeMap<String, CommandConfig>,
}

/// `[queue]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueSection {
    /// Queue id; defaults to the definition file's stem.
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default)]
    pub stop_on_error: bool,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// `"low"`, `"normal"` or `"high"`.
    #[serde(default)]
    pub priority: Option<String>,

    #[serde(default)]
    pub retry: RetrySection,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            id: None,
            max_concurrent: default_max_concurrent(),
            stop_on_error: false,
            timeout_secs: None,
            priority: None,
            retry: RetrySection::default(),
        }
    }
}

fn default_max_concurrent() -> usize {
    4
}

/// `[queue.retry]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

/// `[command.<id>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandConfig {
    /// The command line (or remote operation) to execute.
    pub run: String,

    /// Identities of commands that must succeed first.
    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub estimated_duration_secs: Option<u64>,

    /// Opaque payload forwarded to the executor.
    #[serde(default)]
    pub payload: Option<toml::Value>,
}

/// A validated queue definition.
///
/// Constructed only through `TryFrom<RawQueueFile>` (see `validate`), so
/// holding one means identities are unique (map keys) and every
/// `depends_on` reference resolves.
#[derive(Debug, Clone)]
pub struct QueueFile {
    queue: QueueSection,
    command: BTreeMap<String, CommandConfig>,
    priority: QueuePriority,
}

impl QueueFile {
    pub(crate) fn new_unchecked(
        queue: QueueSection,
        command: BTreeMap<String, CommandConfig>,
        priority: QueuePriority,
    ) -> Self {
        Self {
            queue,
            command,
            priority,
        }
    }

    /// Queue id from the file, if declared.
    pub fn queue_id(&self) -> Option<&str> {
        self.queue.id.as_deref()
    }

    pub fn commands(&self) -> &BTreeMap<String, CommandConfig> {
        &self.command
    }

    /// Engine options derived from the `[queue]` section.
    pub fn options(&self) -> QueueOptions {
        QueueOptions {
            max_concurrent: self.queue.max_concurrent,
            retry_policy: RetryPolicy {
                max_retries: self.queue.retry.max_retries,
                retry_delay: Duration::from_millis(self.queue.retry.retry_delay_ms),
                backoff_multiplier: self.queue.retry.backoff_multiplier,
            },
            timeout: self.queue.timeout_secs.map(Duration::from_secs),
            priority: self.priority,
            stop_on_error: self.queue.stop_on_error,
        }
    }

    /// Engine commands derived from the `[command.<id>]` sections.
    pub fn to_commands(&self) -> Vec<Command> {
        self.command
            .iter()
            .map(|(identity, cfg)| Command {
                id: Some(identity.clone()),
                action: cfg.run.clone(),
                depends_on: cfg.depends_on.clone(),
                estimated_duration: cfg.estimated_duration_secs.map(Duration::from_secs),
                payload: cfg
                    .payload
                    .as_ref()
                    .and_then(|value| serde_json::to_value(value).ok()),
            })
            .collect()
    }
}
