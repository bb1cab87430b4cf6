// src/config/validate.rs

use std::str::FromStr;

use tracing::warn;

use crate::config::model::{QueueFile, RawQueueFile};
use crate::errors::{QueueError, Result};
use crate::queue::QueuePriority;

impl TryFrom<RawQueueFile> for QueueFile {
    type Error = QueueError;

    fn try_from(raw: RawQueueFile) -> std::result::Result<Self, Self::Error> {
        let priority = validate_raw_file(&raw)?;
        Ok(QueueFile::new_unchecked(raw.queue, raw.command, priority))
    }
}

fn validate_raw_file(raw: &RawQueueFile) -> Result<QueuePriority> {
    ensure_has_commands(raw)?;
    validate_dependencies(raw)?;
    validate_priority(raw)
}

fn ensure_has_commands(raw: &RawQueueFile) -> Result<()> {
    if raw.command.is_empty() {
        return Err(QueueError::ConfigError(
            "definition must contain at least one [command.<id>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_dependencies(raw: &RawQueueFile) -> Result<()> {
    for (identity, command) in raw.command.iter() {
        for dep in command.depends_on.iter() {
            if !raw.command.contains_key(dep) {
                return Err(QueueError::ConfigError(format!(
                    "command '{identity}' has unknown dependency '{dep}' in `depends_on`"
                )));
            }
            if dep == identity {
                // A self-dependency is a 1-cycle: the planner sweeps it into
                // the sequential fallback group rather than rejecting it.
                warn!(
                    command = %identity,
                    "command depends on itself; it will run in the sequential fallback group"
                );
            }
        }
    }
    Ok(())
}

fn validate_priority(raw: &RawQueueFile) -> Result<QueuePriority> {
    match raw.queue.priority.as_deref() {
        None => Ok(QueuePriority::default()),
        Some(s) => QueuePriority::from_str(s).map_err(QueueError::ConfigError),
    }
}
