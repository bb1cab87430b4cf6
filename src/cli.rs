// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `runqueue`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "runqueue",
    version,
    about = "Run dependency-ordered command batches with pause/resume/cancel and retry.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the queue definition file (TOML).
    ///
    /// Default: `Runqueue.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Runqueue.toml")]
    pub file: String,

    /// Override the queue id from the definition file.
    #[arg(long, value_name = "ID")]
    pub id: Option<String>,

    /// Override `max_concurrent` from the definition file.
    #[arg(long, value_name = "N")]
    pub max_concurrent: Option<usize>,

    /// Abort the remaining plan as soon as one command fails.
    #[arg(long)]
    pub stop_on_error: bool,

    /// Retry failed commands after the initial run, honouring the retry
    /// policy's backoff between attempts.
    #[arg(long)]
    pub retry: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RUNQUEUE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the derived execution plan, but don't execute
    /// any commands.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
