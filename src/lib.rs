// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod events;
pub mod exec;
pub mod graph;
pub mod logging;
pub mod manager;
pub mod plan;
pub mod queue;
pub mod runner;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::QueueFile;
use crate::config::loader::load_and_validate;
use crate::events::LogEventSink;
use crate::exec::ShellExecutor;
use crate::manager::QueueManager;
use crate::queue::QueueStatus;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - queue definition loading
/// - the lifecycle manager with the shell executor
/// - Ctrl-C handling (cancels the running queue)
/// - the optional caller-driven retry loop
pub async fn run(args: CliArgs) -> Result<()> {
    let file = load_and_validate(&args.file)?;

    let queue_id = args
        .id
        .clone()
        .or_else(|| file.queue_id().map(str::to_string))
        .unwrap_or_else(|| file_stem(&args.file));

    let mut options = file.options();
    if let Some(n) = args.max_concurrent {
        options.max_concurrent = n;
    }
    if args.stop_on_error {
        options.stop_on_error = true;
    }

    let commands = file.to_commands();

    if args.dry_run {
        print_dry_run(&queue_id, &file, &commands)?;
        return Ok(());
    }

    let retry_policy = options.retry_policy.clone();
    let manager = Arc::new(QueueManager::new(
        Arc::new(ShellExecutor::new()),
        Arc::new(LogEventSink),
    ));
    manager.create(queue_id.clone(), commands, options)?;

    // Ctrl-C → cancel the queue; in-flight processes are killed through the
    // cancellation token.
    {
        let manager = Arc::clone(&manager);
        let queue_id = queue_id.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            if let Err(e) = manager.cancel(&queue_id).await {
                warn!(queue = %queue_id, error = %e, "cancel on Ctrl+C failed");
            }
        });
    }

    let result = manager.execute(&queue_id).await?;
    info!(
        queue = %queue_id,
        success = result.success,
        succeeded = result.success_count,
        total = result.total_count,
        "initial run settled"
    );

    // Caller-driven retry: the engine never retries on its own, so the CLI
    // plays the role of the outer scheduler, pacing attempts with the
    // policy's backoff.
    if args.retry {
        for attempt in 0..retry_policy.max_retries {
            let snapshot = manager.status(&queue_id).await?;
            if snapshot.status != QueueStatus::Failed {
                break;
            }
            let delay = retry_policy.delay_for_attempt(attempt);
            info!(queue = %queue_id, attempt = attempt + 1, ?delay, "retrying failed commands");
            tokio::time::sleep(delay).await;
            manager.retry_failed(&queue_id).await?;
        }
    }

    let snapshot = manager.status(&queue_id).await?;
    println!(
        "queue '{}': {:?} ({}/{} commands succeeded)",
        queue_id, snapshot.status, snapshot.completed_steps, snapshot.total_commands
    );
    if !snapshot.failed.is_empty() {
        println!("failed commands: {:?}", snapshot.failed);
    }

    match snapshot.status {
        QueueStatus::Completed => Ok(()),
        status => Err(anyhow::anyhow!("queue '{queue_id}' ended {status:?}")),
    }
}

fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "queue".to_string())
}

/// Dry-run output: print commands, dependencies and the derived plan.
fn print_dry_run(
    queue_id: &str,
    file: &QueueFile,
    commands: &[crate::queue::Command],
) -> Result<()> {
    let graph = graph::DependencyGraph::build(commands)?;
    let plan = plan::plan(&graph);

    println!("runqueue dry-run for queue '{queue_id}'");
    println!();

    println!("commands ({}):", file.commands().len());
    for (identity, cfg) in file.commands().iter() {
        println!("  - {identity}");
        println!("      run: {}", cfg.run);
        if !cfg.depends_on.is_empty() {
            println!("      depends_on: {:?}", cfg.depends_on);
        }
        if let Some(secs) = cfg.estimated_duration_secs {
            println!("      estimated_duration_secs: {secs}");
        }
    }
    println!();

    println!("execution plan ({} groups):", plan.groups.len());
    for (index, group) in plan.groups.iter().enumerate() {
        println!("  {index}: {:?} {:?}", group.kind, group.commands);
    }

    Ok(())
}
