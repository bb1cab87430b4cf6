// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{QueueFile, RawQueueFile};
use crate::errors::Result;

/// Read a queue definition file and deserialize it, without semantic
/// validation. Use [`load_and_validate`] for the checked variant.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawQueueFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let raw: RawQueueFile = toml::from_str(&contents)?;

    Ok(raw)
}

/// Load a queue definition from path and validate it.
///
/// This is the recommended entry point:
/// - reads TOML, applying defaults via `serde` + `Default` impls;
/// - checks for an empty command set, unknown `depends_on` references and a
///   malformed priority;
/// - warns (but does not fail) on self-dependencies, which execute through
///   the planner's sequential fallback group.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<QueueFile> {
    let raw = load_from_path(&path)?;
    let file = QueueFile::try_from(raw)?;
    Ok(file)
}

/// Default queue definition path: `Runqueue.toml` in the working directory.
pub fn default_definition_path() -> PathBuf {
    PathBuf::from("Runqueue.toml")
}
