// src/exec/shell.rs

//! Subprocess executor backend.
//!
//! Runs each command's `action` through the platform shell. This is the
//! reference backend used by the CLI; remote-target backends (SSH and
//! friends) live outside this crate and implement [`CommandExecutor`] the
//! same way.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Instant;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as ProcessCommand;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::{CommandExecutor, ExecContext, Outcome};
use crate::queue::Command;

/// Executes command actions as local shell lines.
#[derive(Debug, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for ShellExecutor {
    fn execute(
        &self,
        command: Command,
        ctx: ExecContext,
    ) -> Pin<Box<dyn Future<Output = Result<Outcome>> + Send + '_>> {
        Box::pin(async move { run_shell(command, ctx).await })
    }
}

/// Drain a child pipe to a string in the background, so the process never
/// blocks on a full pipe buffer.
fn drain_pipe(pipe: Option<impl AsyncRead + Unpin + Send + 'static>) -> Option<JoinHandle<String>> {
    pipe.map(|mut reader| {
        tokio::spawn(async move {
            let mut buf = String::new();
            let _ = reader.read_to_string(&mut buf).await;
            buf
        })
    })
}

async fn collect(handle: Option<JoinHandle<String>>) -> String {
    match handle {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

async fn run_shell(command: Command, ctx: ExecContext) -> Result<Outcome> {
    let identity = command.identity().to_string();
    let started = Instant::now();

    info!(
        queue = %ctx.queue_id,
        command = %identity,
        attempt = ctx.attempt,
        action = %command.action,
        "starting shell process"
    );

    let mut cmd = if cfg!(windows) {
        let mut c = ProcessCommand::new("cmd");
        c.arg("/C").arg(&command.action);
        c
    } else {
        let mut c = ProcessCommand::new("sh");
        c.arg("-c").arg(&command.action);
        c
    };

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for command '{identity}'"))?;

    let stdout_task = drain_pipe(child.stdout.take());
    let stderr_task = drain_pipe(child.stderr.take());

    // Either the process exits on its own, or the run is cancelled and we
    // kill it. A killed process settles as a failed outcome; the runner (not
    // this backend) decides what cancellation means for the queue.
    tokio::select! {
        status_res = child.wait() => {
            let status = status_res
                .with_context(|| format!("waiting for process of command '{identity}'"))?;

            let out = collect(stdout_task).await;
            let err = collect(stderr_task).await;

            let code = status.code().unwrap_or(-1);
            debug!(
                queue = %ctx.queue_id,
                command = %identity,
                exit_code = code,
                success = status.success(),
                "shell process exited"
            );

            let duration = started.elapsed();
            if status.success() {
                let output = if out.is_empty() { None } else { Some(out) };
                Ok(Outcome::success(identity, output, duration))
            } else {
                let error = if err.trim().is_empty() {
                    format!("exit code {code}")
                } else {
                    format!("exit code {code}: {}", err.trim())
                };
                Ok(Outcome::failure(identity, error, duration))
            }
        }

        _ = ctx.cancellation.cancelled() => {
            info!(
                queue = %ctx.queue_id,
                command = %identity,
                "cancellation requested; killing shell process"
            );
            if let Err(e) = child.kill().await {
                warn!(
                    queue = %ctx.queue_id,
                    command = %identity,
                    error = %e,
                    "failed to kill child process on cancellation"
                );
            }
            Ok(Outcome::failure(identity, "cancelled", started.elapsed()))
        }
    }
}
