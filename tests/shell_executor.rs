// tests/shell_executor.rs

//! End-to-end runs against the real subprocess backend.

#![cfg(unix)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use runqueue::events::NullEventSink;
use runqueue::exec::ShellExecutor;
use runqueue::manager::QueueManager;
use runqueue::queue::QueueStatus;
use runqueue_test_utils::builders::CommandBuilder;
use runqueue_test_utils::{init_tracing, with_timeout};

fn shell_manager() -> Arc<QueueManager> {
    Arc::new(QueueManager::new(
        Arc::new(ShellExecutor::new()),
        Arc::new(NullEventSink),
    ))
}

#[tokio::test]
async fn shell_queue_runs_to_completion() {
    init_tracing();

    let manager = shell_manager();
    manager
        .create(
            "shell",
            vec![
                CommandBuilder::new("echo hello").id("greet").build(),
                CommandBuilder::new("true").id("noop").depends_on("greet").build(),
            ],
            Default::default(),
        )
        .unwrap();

    let result = with_timeout(manager.execute("shell")).await.unwrap();

    assert!(result.success);
    let greet = result
        .outcomes
        .iter()
        .find(|o| o.command_id == "greet")
        .unwrap();
    assert_eq!(greet.output.as_deref(), Some("hello\n"));
}

#[tokio::test]
async fn failing_process_records_exit_code() {
    init_tracing();

    let manager = shell_manager();
    manager
        .create(
            "shell",
            vec![CommandBuilder::new("exit 3").id("boom").build()],
            Default::default(),
        )
        .unwrap();

    let result = with_timeout(manager.execute("shell")).await.unwrap();

    assert!(!result.success);
    let boom = &result.outcomes[0];
    assert!(!boom.success);
    assert!(
        boom.error.as_deref().is_some_and(|e| e.contains("exit code 3")),
        "unexpected error: {:?}",
        boom.error
    );
    assert_eq!(
        manager.status("shell").await.unwrap().status,
        QueueStatus::Failed
    );
}

#[tokio::test]
async fn cancel_kills_a_long_running_process() {
    init_tracing();

    let manager = shell_manager();
    manager
        .create(
            "shell",
            vec![CommandBuilder::new("sleep 30").id("slow").build()],
            Default::default(),
        )
        .unwrap();

    let background = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.execute("shell").await })
    };

    // Give the process a moment to spawn, then cancel.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let started = Instant::now();
    manager.cancel("shell").await.unwrap();

    let result = with_timeout(background).await.unwrap().unwrap();
    assert!(!result.success);
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "cancel should not wait for the sleep to finish"
    );
    assert_eq!(
        manager.status("shell").await.unwrap().status,
        QueueStatus::Cancelled
    );
}
