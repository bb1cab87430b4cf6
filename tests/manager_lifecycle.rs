// tests/manager_lifecycle.rs

//! Lifecycle state machine: creation guards, at-most-one run per queue id,
//! pause/resume, cancel, removal and statistics.

use std::sync::Arc;
use std::time::Duration;

use runqueue::errors::QueueError;
use runqueue::events::NullEventSink;
use runqueue::manager::QueueManager;
use runqueue::queue::{Command, QueueStatus};
use runqueue_test_utils::builders::{CommandBuilder, QueueOptionsBuilder};
use runqueue_test_utils::fake_executor::FakeExecutor;
use runqueue_test_utils::{init_tracing, with_timeout};

fn manager_with(executor: &FakeExecutor) -> Arc<QueueManager> {
    Arc::new(QueueManager::new(
        Arc::new(executor.clone()),
        Arc::new(NullEventSink),
    ))
}

fn chain_commands() -> Vec<Command> {
    vec![
        CommandBuilder::new("a").build(),
        CommandBuilder::new("b").depends_on("a").build(),
        CommandBuilder::new("c").depends_on("b").build(),
    ]
}

/// Poll until `predicate` holds, or panic after ~2 seconds.
async fn wait_until(predicate: impl Fn() -> bool) {
    for _ in 0..200 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2 seconds");
}

#[tokio::test]
async fn create_rejects_duplicate_queue_ids() {
    init_tracing();

    let executor = FakeExecutor::new();
    let manager = manager_with(&executor);

    manager.create("q", chain_commands(), Default::default()).unwrap();
    let err = manager
        .create("q", chain_commands(), Default::default())
        .unwrap_err();

    assert!(matches!(err, QueueError::DuplicateQueueId(id) if id == "q"));
}

#[tokio::test]
async fn create_rejects_unknown_dependencies_and_empty_queues() {
    init_tracing();

    let executor = FakeExecutor::new();
    let manager = manager_with(&executor);

    let err = manager
        .create(
            "q",
            vec![CommandBuilder::new("a").depends_on("ghost").build()],
            Default::default(),
        )
        .unwrap_err();
    assert!(matches!(err, QueueError::UnknownDependency { .. }));

    let err = manager.create("empty", vec![], Default::default()).unwrap_err();
    assert!(matches!(err, QueueError::EmptyQueue(_)));
}

#[tokio::test]
async fn execute_is_rejected_while_queue_is_active() {
    init_tracing();

    let executor = FakeExecutor::new();
    executor.delay("a", Duration::from_millis(300));
    let manager = manager_with(&executor);

    manager.create("q", chain_commands(), Default::default()).unwrap();

    let background = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.execute("q").await })
    };

    {
        let executor = executor.clone();
        wait_until(move || executor.executed().contains(&"a".to_string())).await;
    }

    let err = manager.execute("q").await.unwrap_err();
    assert!(matches!(err, QueueError::AlreadyExecuting(id) if id == "q"));

    // The guard left the running execution untouched.
    let result = with_timeout(background).await.unwrap().unwrap();
    assert!(result.success);
    assert_eq!(
        manager.status("q").await.unwrap().status,
        QueueStatus::Completed
    );
}

#[tokio::test]
async fn execute_from_terminal_state_is_invalid() {
    init_tracing();

    let executor = FakeExecutor::new();
    let manager = manager_with(&executor);

    manager.create("q", chain_commands(), Default::default()).unwrap();
    with_timeout(manager.execute("q")).await.unwrap();

    let err = manager.execute("q").await.unwrap_err();
    assert!(matches!(
        err,
        QueueError::InvalidStateTransition {
            from: QueueStatus::Completed,
            operation: "execute",
            ..
        }
    ));
}

#[tokio::test]
async fn pause_then_resume_runs_only_the_remaining_commands() {
    init_tracing();

    let executor = FakeExecutor::new();
    executor.delay("b", Duration::from_millis(300));
    let manager = manager_with(&executor);

    manager.create("q", chain_commands(), Default::default()).unwrap();

    let background = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.execute("q").await })
    };

    // Pause while b is in flight: a has settled, c not yet dispatched.
    {
        let executor = executor.clone();
        wait_until(move || executor.executed().contains(&"b".to_string())).await;
    }
    manager.pause("q").await.unwrap();

    let result = with_timeout(background).await.unwrap().unwrap();
    assert!(!result.success);

    let snapshot = manager.status("q").await.unwrap();
    assert_eq!(snapshot.status, QueueStatus::Paused);
    // The in-flight command settled before the run stopped.
    assert_eq!(snapshot.completed_steps, 2);

    // Pausing a non-executing queue is invalid.
    let err = manager.pause("q").await.unwrap_err();
    assert!(matches!(
        err,
        QueueError::InvalidStateTransition { operation: "pause", .. }
    ));

    let result = with_timeout(manager.resume("q")).await.unwrap();
    assert!(result.success);

    // Completed commands were not re-executed: each ran exactly once.
    assert_eq!(executor.executed(), vec!["a", "b", "c"]);
    assert_eq!(
        manager.status("q").await.unwrap().status,
        QueueStatus::Completed
    );
}

#[tokio::test]
async fn resume_requires_a_paused_queue() {
    init_tracing();

    let executor = FakeExecutor::new();
    let manager = manager_with(&executor);

    manager.create("q", chain_commands(), Default::default()).unwrap();
    let err = manager.resume("q").await.unwrap_err();
    assert!(matches!(
        err,
        QueueError::InvalidStateTransition { operation: "resume", .. }
    ));
}

#[tokio::test]
async fn cancel_propagates_to_in_flight_commands() {
    init_tracing();

    let executor = FakeExecutor::new();
    executor.delay("b", Duration::from_secs(30));
    let manager = manager_with(&executor);

    manager.create("q", chain_commands(), Default::default()).unwrap();

    let background = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.execute("q").await })
    };

    {
        let executor = executor.clone();
        wait_until(move || executor.executed().contains(&"b".to_string())).await;
    }
    manager.cancel("q").await.unwrap();

    let result = with_timeout(background).await.unwrap().unwrap();
    assert!(!result.success);

    // b observed the cancellation token instead of sleeping 30 seconds.
    assert_eq!(executor.cancelled(), vec!["b"]);

    let snapshot = manager.status("q").await.unwrap();
    assert_eq!(snapshot.status, QueueStatus::Cancelled);
    // a settled before the cancel and stays recorded.
    assert_eq!(snapshot.completed_steps, 1);
    assert!(snapshot.finished_at.is_some());

    // Cancelled is terminal.
    let err = manager.cancel("q").await.unwrap_err();
    assert!(matches!(
        err,
        QueueError::InvalidStateTransition { operation: "cancel", .. }
    ));
}

#[tokio::test]
async fn cancel_is_valid_for_pending_queues() {
    init_tracing();

    let executor = FakeExecutor::new();
    let manager = manager_with(&executor);

    manager.create("q", chain_commands(), Default::default()).unwrap();
    manager.cancel("q").await.unwrap();

    assert_eq!(
        manager.status("q").await.unwrap().status,
        QueueStatus::Cancelled
    );
    assert!(matches!(
        manager.execute("q").await.unwrap_err(),
        QueueError::InvalidStateTransition { .. }
    ));
}

#[tokio::test]
async fn unknown_queue_ids_are_not_found() {
    init_tracing();

    let executor = FakeExecutor::new();
    let manager = manager_with(&executor);

    assert!(matches!(
        manager.execute("ghost").await.unwrap_err(),
        QueueError::QueueNotFound(_)
    ));
    assert!(matches!(
        manager.status("ghost").await.unwrap_err(),
        QueueError::QueueNotFound(_)
    ));
}

#[tokio::test]
async fn remove_only_deletes_terminal_queues() {
    init_tracing();

    let executor = FakeExecutor::new();
    let manager = manager_with(&executor);

    manager.create("q", chain_commands(), Default::default()).unwrap();

    let err = manager.remove("q").await.unwrap_err();
    assert!(matches!(
        err,
        QueueError::InvalidStateTransition { operation: "remove", .. }
    ));

    with_timeout(manager.execute("q")).await.unwrap();
    manager.remove("q").await.unwrap();

    assert!(matches!(
        manager.status("q").await.unwrap_err(),
        QueueError::QueueNotFound(_)
    ));
}

#[tokio::test]
async fn statistics_aggregate_across_queues() {
    init_tracing();

    let executor = FakeExecutor::new();
    executor.fail("boom");
    let manager = manager_with(&executor);

    manager
        .create("ok", chain_commands(), Default::default())
        .unwrap();
    manager
        .create(
            "bad",
            vec![
                CommandBuilder::new("fine").build(),
                CommandBuilder::new("boom").depends_on("fine").build(),
            ],
            QueueOptionsBuilder::new().build(),
        )
        .unwrap();
    manager
        .create("idle", chain_commands(), Default::default())
        .unwrap();

    with_timeout(manager.execute("ok")).await.unwrap();
    with_timeout(manager.execute("bad")).await.unwrap();

    let stats = manager.statistics().await;
    assert_eq!(stats.total_queues, 3);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.total_commands, 8);
    assert_eq!(stats.succeeded_commands, 4);
    assert_eq!(stats.failed_commands, 1);
    assert!(stats.average_duration.is_some());

    let all = manager.list_all().await;
    assert_eq!(all.len(), 3);
}
