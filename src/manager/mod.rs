// src/manager/mod.rs

//! Queue lifecycle management.
//!
//! The manager owns every queue (id -> queue arena) plus the set of ids with
//! an active run. The registry locks are held only across map bookkeeping,
//! never across an executor await, so two different queues execute fully
//! concurrently; the active set enforces at-most-one run per queue id.
//!
//! - [`stats`] aggregates in-memory statistics across all queues.

pub mod stats;

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{QueueError, Result};
use crate::events::{EventSink, QueueEvent};
use crate::exec::CommandExecutor;
use crate::graph::DependencyGraph;
use crate::plan;
use crate::queue::{Command, ExecutionState, Queue, QueueOptions, QueueStatus};
use crate::runner::{Interruption, QueueRunner, RunResult};

pub use stats::ManagerStatistics;

type SharedQueue = Arc<Mutex<Queue>>;

/// Cancellation handles for one active run.
#[derive(Debug, Clone)]
struct RunHandle {
    cancel: CancellationToken,
    pause: CancellationToken,
}

/// Read-only view of a queue's current state.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub id: String,
    pub status: QueueStatus,
    pub total_commands: usize,
    pub completed_steps: usize,
    pub failed: Vec<String>,
    pub retry_count: u32,
    pub current_step: usize,
    pub started_at: Option<chrono::DateTime<Utc>>,
    pub finished_at: Option<chrono::DateTime<Utc>>,
}

/// Owns all queues and drives their lifecycle.
pub struct QueueManager {
    executor: Arc<dyn CommandExecutor>,
    sink: Arc<dyn EventSink>,
    queues: StdMutex<HashMap<String, SharedQueue>>,
    active: StdMutex<HashMap<String, RunHandle>>,
}

impl QueueManager {
    pub fn new(executor: Arc<dyn CommandExecutor>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            executor,
            sink,
            queues: StdMutex::new(HashMap::new()),
            active: StdMutex::new(HashMap::new()),
        }
    }

    /// Submit a new queue.
    ///
    /// Validation is synchronous: non-empty command list, unique identities,
    /// known dependency references. The dependency graph and execution plan
    /// are derived here, once; they never change afterwards. A cyclic
    /// dependency relation is *not* an error (the planner's fallback group
    /// covers it), but it is worth a warning.
    pub fn create(
        &self,
        id: impl Into<String>,
        commands: Vec<Command>,
        options: QueueOptions,
    ) -> Result<QueueSnapshot> {
        let id = id.into();

        if commands.is_empty() {
            return Err(QueueError::EmptyQueue(id));
        }

        let graph = DependencyGraph::build(&commands)?;
        if !graph.is_acyclic() {
            warn!(
                queue = %id,
                "dependency cycle detected; stranded commands will run sequentially in submission order"
            );
        }
        let plan = plan::plan(&graph);

        let queue = Queue {
            id: id.clone(),
            commands,
            status: QueueStatus::Pending,
            options,
            graph,
            plan,
            execution: ExecutionState::default(),
        };
        let snapshot = snapshot_of(&queue);

        {
            let mut queues = self.queues.lock().expect("queue registry poisoned");
            if queues.contains_key(&id) {
                return Err(QueueError::DuplicateQueueId(id));
            }
            queues.insert(id.clone(), Arc::new(Mutex::new(queue)));
        }

        info!(queue = %id, commands = snapshot.total_commands, "queue created");
        self.sink.publish(QueueEvent::QueueCreated {
            queue_id: id,
            total_commands: snapshot.total_commands,
        });

        Ok(snapshot)
    }

    /// Execute a pending queue to settlement.
    pub async fn execute(&self, id: &str) -> Result<RunResult> {
        self.start_run(id, "execute", &[QueueStatus::Pending], false)
            .await
    }

    /// Resume a paused queue against the same plan; commands already in the
    /// completed set are not re-executed.
    pub async fn resume(&self, id: &str) -> Result<RunResult> {
        self.start_run(id, "resume", &[QueueStatus::Paused], false)
            .await
    }

    /// Re-execute exactly the commands in the failed set of a failed queue.
    pub async fn retry_failed(&self, id: &str) -> Result<RunResult> {
        self.start_run(id, "retry", &[QueueStatus::Failed], true).await
    }

    /// Pause an executing queue. In-flight executor calls settle; commands
    /// not yet dispatched stay pending for resume.
    pub async fn pause(&self, id: &str) -> Result<()> {
        let queue = self.shared(id)?;
        let handle = self
            .active
            .lock()
            .expect("active registry poisoned")
            .get(id)
            .cloned();

        {
            let mut q = queue.lock().await;
            if q.status != QueueStatus::Executing {
                return Err(QueueError::InvalidStateTransition {
                    queue: id.to_string(),
                    from: q.status,
                    operation: "pause",
                });
            }
            q.status = QueueStatus::Paused;
        }

        info!(queue = %id, "queue paused");
        self.sink.publish(QueueEvent::QueuePaused {
            queue_id: id.to_string(),
        });

        if let Some(handle) = handle {
            handle.pause.cancel();
        }
        Ok(())
    }

    /// Cancel a queue from any non-terminal state. Propagates to in-flight
    /// executor calls through the cancellation token; already-settled
    /// outcomes remain recorded.
    pub async fn cancel(&self, id: &str) -> Result<()> {
        let queue = self.shared(id)?;
        let handle = self
            .active
            .lock()
            .expect("active registry poisoned")
            .get(id)
            .cloned();

        {
            let mut q = queue.lock().await;
            if q.status.is_terminal() {
                return Err(QueueError::InvalidStateTransition {
                    queue: id.to_string(),
                    from: q.status,
                    operation: "cancel",
                });
            }
            q.status = QueueStatus::Cancelled;
            q.execution.finished_at = Some(Utc::now());
        }

        info!(queue = %id, "queue cancelled");
        self.sink.publish(QueueEvent::QueueCancelled {
            queue_id: id.to_string(),
        });

        if let Some(handle) = handle {
            handle.cancel.cancel();
        }
        Ok(())
    }

    /// Delete a terminal queue from the registry.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let queue = self.shared(id)?;
        {
            let q = queue.lock().await;
            if !q.status.is_terminal() {
                return Err(QueueError::InvalidStateTransition {
                    queue: id.to_string(),
                    from: q.status,
                    operation: "remove",
                });
            }
        }
        self.queues
            .lock()
            .expect("queue registry poisoned")
            .remove(id);
        debug!(queue = %id, "queue removed");
        Ok(())
    }

    /// Current state of one queue.
    pub async fn status(&self, id: &str) -> Result<QueueSnapshot> {
        let queue = self.shared(id)?;
        let q = queue.lock().await;
        Ok(snapshot_of(&q))
    }

    /// Snapshots of every queue, in unspecified order.
    pub async fn list_all(&self) -> Vec<QueueSnapshot> {
        let shared: Vec<SharedQueue> = {
            let queues = self.queues.lock().expect("queue registry poisoned");
            queues.values().cloned().collect()
        };

        let mut snapshots = Vec::with_capacity(shared.len());
        for queue in shared {
            let q = queue.lock().await;
            snapshots.push(snapshot_of(&q));
        }
        snapshots
    }

    /// Aggregate statistics over all queues, computed from in-memory state.
    pub async fn statistics(&self) -> ManagerStatistics {
        let shared: Vec<SharedQueue> = {
            let queues = self.queues.lock().expect("queue registry poisoned");
            queues.values().cloned().collect()
        };

        let mut builder = stats::StatisticsBuilder::default();
        for queue in shared {
            let q = queue.lock().await;
            builder.observe(&q);
        }
        builder.finish()
    }

    fn shared(&self, id: &str) -> Result<SharedQueue> {
        self.queues
            .lock()
            .expect("queue registry poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| QueueError::QueueNotFound(id.to_string()))
    }

    /// Common entry for `execute`, `resume` and `retry_failed`.
    ///
    /// Registers the id in the active set (enforcing at-most-one run per
    /// queue id), validates the starting status, drives the runner, then
    /// settles the final status and deregisters.
    async fn start_run(
        &self,
        id: &str,
        operation: &'static str,
        allowed_from: &[QueueStatus],
        retry_only: bool,
    ) -> Result<RunResult> {
        let queue = self.shared(id)?;

        let handle = RunHandle {
            cancel: CancellationToken::new(),
            pause: CancellationToken::new(),
        };
        {
            let mut active = self.active.lock().expect("active registry poisoned");
            if active.contains_key(id) {
                return Err(QueueError::AlreadyExecuting(id.to_string()));
            }
            active.insert(id.to_string(), handle.clone());
        }

        // Every early return below must deregister, or the id stays locked out.
        let result = self
            .drive_run(&queue, id, operation, allowed_from, retry_only, &handle)
            .await;

        self.active
            .lock()
            .expect("active registry poisoned")
            .remove(id);

        result
    }

    async fn drive_run(
        &self,
        queue: &SharedQueue,
        id: &str,
        operation: &'static str,
        allowed_from: &[QueueStatus],
        retry_only: bool,
        handle: &RunHandle,
    ) -> Result<RunResult> {
        {
            let mut q = queue.lock().await;
            if !allowed_from.contains(&q.status) {
                return Err(QueueError::InvalidStateTransition {
                    queue: id.to_string(),
                    from: q.status,
                    operation,
                });
            }
            if retry_only && q.execution.failed.is_empty() {
                return Err(QueueError::NothingToRetry(id.to_string()));
            }

            q.status = QueueStatus::Executing;
            if q.execution.started_at.is_none() {
                q.execution.started_at = Some(Utc::now());
            }
        }

        info!(queue = %id, operation, "queue run starting");
        if operation == "resume" {
            self.sink.publish(QueueEvent::QueueResumed {
                queue_id: id.to_string(),
            });
        }
        self.sink.publish(QueueEvent::QueueStarted {
            queue_id: id.to_string(),
        });

        let runner = QueueRunner::new(
            self.executor.as_ref(),
            self.sink.as_ref(),
            handle.cancel.clone(),
            handle.pause.clone(),
        );

        let result = if retry_only {
            runner.retry_failed(queue).await
        } else {
            runner.run(queue).await
        };

        self.settle_run(queue, id, &result).await;
        Ok(result)
    }

    /// Map the run result onto the queue's final status and emit the
    /// matching lifecycle event. Pause and cancel have already transitioned
    /// the status themselves; their runs settle without touching it again.
    async fn settle_run(&self, queue: &SharedQueue, id: &str, result: &RunResult) {
        let event = {
            let mut q = queue.lock().await;
            if q.status != QueueStatus::Executing {
                // Paused or cancelled mid-run; status and event already handled.
                None
            } else {
                match result.interruption {
                    Some(Interruption::Paused) => {
                        q.status = QueueStatus::Paused;
                        None
                    }
                    Some(Interruption::Cancelled) => {
                        q.status = QueueStatus::Cancelled;
                        q.execution.finished_at = Some(Utc::now());
                        Some(QueueEvent::QueueCancelled {
                            queue_id: id.to_string(),
                        })
                    }
                    Some(Interruption::TimedOut) | Some(Interruption::StoppedOnError) => {
                        q.status = QueueStatus::Failed;
                        q.execution.finished_at = Some(Utc::now());
                        Some(QueueEvent::QueueFailed {
                            queue_id: id.to_string(),
                            failed: sorted_failed(&q),
                        })
                    }
                    None => {
                        q.execution.finished_at = Some(Utc::now());
                        if q.execution.failed.is_empty() {
                            q.status = QueueStatus::Completed;
                            Some(QueueEvent::QueueCompleted {
                                queue_id: id.to_string(),
                                success_count: q.execution.completed.len(),
                                total_count: q.plan.total_commands,
                            })
                        } else {
                            q.status = QueueStatus::Failed;
                            Some(QueueEvent::QueueFailed {
                                queue_id: id.to_string(),
                                failed: sorted_failed(&q),
                            })
                        }
                    }
                }
            }
        };

        if let Some(event) = event {
            self.sink.publish(event);
        }
    }
}

fn snapshot_of(queue: &Queue) -> QueueSnapshot {
    QueueSnapshot {
        id: queue.id.clone(),
        status: queue.status,
        total_commands: queue.plan.total_commands,
        completed_steps: queue.execution.completed_steps(),
        failed: sorted_failed(queue),
        retry_count: queue.execution.retry_count,
        current_step: queue.execution.current_step,
        started_at: queue.execution.started_at,
        finished_at: queue.execution.finished_at,
    }
}

fn sorted_failed(queue: &Queue) -> Vec<String> {
    let mut failed: Vec<String> = queue.execution.failed.iter().cloned().collect();
    failed.sort_by_key(|identity| queue.graph.index_of(identity).unwrap_or(usize::MAX));
    failed
}
