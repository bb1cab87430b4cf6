// src/config/mod.rs

//! Queue definition files.
//!
//! - [`model`] maps the TOML format onto raw and validated types.
//! - [`loader`] reads and validates definition files.
//! - [`validate`] holds the semantic checks behind `TryFrom<RawQueueFile>`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_definition_path, load_and_validate, load_from_path};
pub use model::{CommandConfig, QueueFile, QueueSection, RawQueueFile, RetrySection};
