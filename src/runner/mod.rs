// src/runner/mod.rs

//! Drives one queue through its execution plan.
//!
//! The runner walks plan groups in order, dispatching each command to the
//! executor and awaiting settlement. Sequential groups run one command at a
//! time; parallel groups dispatch every member concurrently, bounded by a
//! semaphore of `max_concurrent` permits, and complete only once every member
//! has settled (a failure in one member never cancels its siblings).
//!
//! The runner mutates the queue's `ExecutionState` as settlements arrive, so
//! concurrent `status()` queries observe live progress. The queue lock is
//! held only across bookkeeping, never across an executor await.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{QueueError, Result as ExecResult};
use crate::events::{EventSink, QueueEvent};
use crate::exec::{CommandExecutor, ExecContext, Outcome};
use crate::plan::{ExecutionGroup, GroupKind};
use crate::queue::{Command, Queue, QueueOptions};

/// Why a run stopped before finishing its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    /// Pause requested; unfinished commands stay pending for resume.
    Paused,
    /// Queue cancelled; in-flight calls observed the cancellation token.
    Cancelled,
    /// The per-queue timeout bounded the run.
    TimedOut,
    /// A command failed with `stop_on_error` set.
    StoppedOnError,
}

/// Result of one `run` or `retry_failed` invocation.
#[derive(Debug)]
pub struct RunResult {
    /// True when every command this run was responsible for succeeded and
    /// nothing interrupted the plan.
    pub success: bool,
    /// Outcomes settled during this invocation (retries append per attempt).
    pub outcomes: Vec<Outcome>,
    pub success_count: usize,
    pub total_count: usize,
    pub interruption: Option<Interruption>,
}

/// Executes the plan of a single queue.
///
/// One runner instance drives at most one run; the lifecycle manager
/// guarantees at most one runner per queue id at a time.
pub struct QueueRunner<'a> {
    executor: &'a dyn CommandExecutor,
    sink: &'a dyn EventSink,
    /// Cancelled by `cancel()`; also the parent of the per-run token.
    cancel: CancellationToken,
    /// Cancelled by `pause()`; in-flight calls settle, the rest wait.
    pause: CancellationToken,
}

impl<'a> QueueRunner<'a> {
    pub fn new(
        executor: &'a dyn CommandExecutor,
        sink: &'a dyn EventSink,
        cancel: CancellationToken,
        pause: CancellationToken,
    ) -> Self {
        Self {
            executor,
            sink,
            cancel,
            pause,
        }
    }

    /// Walk the queue's plan from wherever the completed set left off.
    ///
    /// Groups whose commands are all in `execution.completed` are skipped
    /// wholesale; within a partially-complete parallel group only the
    /// unfinished members are dispatched. This is what makes resume-after-
    /// pause re-execute exactly the remaining commands.
    pub async fn run(&self, queue: &Mutex<Queue>) -> RunResult {
        let (queue_id, plan, options, commands, attempt) = {
            let q = queue.lock().await;
            (
                q.id.clone(),
                q.plan.clone(),
                q.options.clone(),
                command_index(&q.commands),
                q.execution.retry_count,
            )
        };

        let run_token = self.cancel.child_token();
        let timed_out = Arc::new(AtomicBool::new(false));

        // The queue-level timeout cancels the run token so in-flight executor
        // calls stop cooperatively; the flag tells interruption classification
        // apart from an explicit cancel.
        let timeout_watcher = options.timeout.map(|limit| {
            let token = run_token.clone();
            let flag = Arc::clone(&timed_out);
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                flag.store(true, Ordering::SeqCst);
                token.cancel();
            })
        });

        let mut outcomes = Vec::new();
        let mut interruption = None;

        for (index, group) in plan.groups.iter().enumerate() {
            if let Some(stop) = self.check_interrupted(&run_token, &timed_out) {
                interruption = Some(stop);
                break;
            }

            let members = {
                let mut q = queue.lock().await;
                q.execution.current_step = index;
                pending_members(group, &q)
            };

            if members.is_empty() {
                debug!(queue = %queue_id, group = index, "group already complete; skipping");
                continue;
            }

            let group_outcomes = match group.kind {
                GroupKind::Sequential => {
                    self.run_sequential(queue, &queue_id, &members, &commands, &options, attempt, &run_token, &timed_out)
                        .await
                }
                GroupKind::Parallel => {
                    self.run_parallel(queue, &queue_id, &members, &commands, &options, attempt, &run_token)
                        .await
                }
            };

            let group_failed = group_outcomes.iter().any(|o| !o.success);
            outcomes.extend(group_outcomes);

            if let Some(stop) = self.check_interrupted(&run_token, &timed_out) {
                interruption = Some(stop);
                break;
            }

            if group_failed && options.stop_on_error {
                warn!(queue = %queue_id, group = index, "command failed with stop_on_error; aborting plan");
                interruption = Some(Interruption::StoppedOnError);
                break;
            }
        }

        if let Some(watcher) = timeout_watcher {
            watcher.abort();
        }

        let (success_count, failed_empty) = {
            let q = queue.lock().await;
            (q.execution.completed.len(), q.execution.failed.is_empty())
        };

        RunResult {
            success: interruption.is_none() && failed_empty && success_count == plan.total_commands,
            outcomes,
            success_count,
            total_count: plan.total_commands,
            interruption,
        }
    }

    /// Re-execute exactly the commands currently in the failed set.
    ///
    /// A singleton retries sequentially; anything larger is dispatched as one
    /// bounded parallel batch, mirroring the dispatch rules of a group of
    /// that size. Retry pacing (`retry_policy`) is the caller's concern.
    pub async fn retry_failed(&self, queue: &Mutex<Queue>) -> RunResult {
        let (queue_id, options, commands, members, attempt) = {
            let mut q = queue.lock().await;
            q.execution.retry_count += 1;
            let attempt = q.execution.retry_count;

            // Deterministic retry order: original submission order.
            let mut members: Vec<String> = q.execution.failed.iter().cloned().collect();
            members.sort_by_key(|identity| q.graph.index_of(identity).unwrap_or(usize::MAX));

            (
                q.id.clone(),
                q.options.clone(),
                command_index(&q.commands),
                members,
                attempt,
            )
        };

        info!(queue = %queue_id, attempt, retrying = members.len(), "retrying failed commands");

        let run_token = self.cancel.child_token();
        let timed_out = Arc::new(AtomicBool::new(false));
        let total_count = members.len();

        let outcomes = if members.len() == 1 {
            self.run_sequential(queue, &queue_id, &members, &commands, &options, attempt, &run_token, &timed_out)
                .await
        } else {
            self.run_parallel(queue, &queue_id, &members, &commands, &options, attempt, &run_token)
                .await
        };

        let success_count = outcomes.iter().filter(|o| o.success).count();
        let interruption = self.check_interrupted(&run_token, &timed_out);

        RunResult {
            success: interruption.is_none() && success_count == total_count,
            outcomes,
            success_count,
            total_count,
            interruption,
        }
    }

    fn check_interrupted(
        &self,
        run_token: &CancellationToken,
        timed_out: &AtomicBool,
    ) -> Option<Interruption> {
        if timed_out.load(Ordering::SeqCst) {
            Some(Interruption::TimedOut)
        } else if self.cancel.is_cancelled() || run_token.is_cancelled() {
            Some(Interruption::Cancelled)
        } else if self.pause.is_cancelled() {
            Some(Interruption::Paused)
        } else {
            None
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_sequential(
        &self,
        queue: &Mutex<Queue>,
        queue_id: &str,
        members: &[String],
        commands: &HashMap<String, Command>,
        options: &QueueOptions,
        attempt: u32,
        run_token: &CancellationToken,
        timed_out: &AtomicBool,
    ) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(members.len());

        for identity in members {
            if self.check_interrupted(run_token, timed_out).is_some() {
                break;
            }

            let Some(command) = commands.get(identity) else {
                continue;
            };

            let outcome = self
                .dispatch_one(queue_id, command.clone(), attempt, run_token.clone())
                .await;
            let failed = !outcome.success;

            self.record(queue, queue_id, &outcome).await;
            outcomes.push(outcome);

            if failed && options.stop_on_error {
                break;
            }
        }

        outcomes
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_parallel(
        &self,
        queue: &Mutex<Queue>,
        queue_id: &str,
        members: &[String],
        commands: &HashMap<String, Command>,
        options: &QueueOptions,
        attempt: u32,
        run_token: &CancellationToken,
    ) -> Vec<Outcome> {
        let semaphore = Arc::new(Semaphore::new(options.max_concurrent.max(1)));
        let mut in_flight = FuturesUnordered::new();

        for identity in members {
            let Some(command) = commands.get(identity) else {
                continue;
            };
            let command = command.clone();
            let identity = identity.clone();
            let semaphore = Arc::clone(&semaphore);
            let token = run_token.clone();

            in_flight.push(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };

                // Members still waiting on a permit when the run is torn
                // down are never dispatched; they stay pending for resume.
                if token.is_cancelled() || self.pause.is_cancelled() {
                    return None;
                }

                Some(self.dispatch_one(queue_id, command, attempt, token).await)
            });
        }

        let mut outcomes = Vec::new();

        // Settle semantics: wait for every member, whatever the siblings did.
        while let Some(settled) = in_flight.next().await {
            if let Some(outcome) = settled {
                self.record(queue, queue_id, &outcome).await;
                outcomes.push(outcome);
            }
        }

        outcomes
    }

    /// One executor call: emit start, await settlement, convert an executor
    /// error into a synthesized failed outcome.
    async fn dispatch_one(
        &self,
        queue_id: &str,
        command: Command,
        attempt: u32,
        cancellation: CancellationToken,
    ) -> Outcome {
        let identity = command.identity().to_string();

        self.sink.publish(QueueEvent::CommandStarted {
            queue_id: queue_id.to_string(),
            command_id: identity.clone(),
        });

        let ctx = ExecContext {
            queue_id: queue_id.to_string(),
            attempt,
            cancellation,
        };

        let started = Instant::now();
        let result: ExecResult<Outcome> = self.executor.execute(command, ctx).await;

        match result {
            Ok(outcome) => outcome,
            Err(err) => {
                // An executor rejection is scoped to this command, never to
                // the queue: wrap it and record a failed outcome.
                let failure = QueueError::ExecutorFailure {
                    command: identity.clone(),
                    message: err.to_string(),
                };
                warn!(queue = %queue_id, error = %failure, "recording failed outcome");
                Outcome::failure(identity, failure.to_string(), started.elapsed())
            }
        }
    }

    /// Record a settlement and publish the per-command events.
    async fn record(&self, queue: &Mutex<Queue>, queue_id: &str, outcome: &Outcome) {
        let percent = {
            let mut q = queue.lock().await;
            q.execution.record(outcome.clone());
            q.execution.completed.len() as f64 / q.plan.total_commands.max(1) as f64 * 100.0
        };

        if outcome.success {
            self.sink.publish(QueueEvent::CommandCompleted {
                queue_id: queue_id.to_string(),
                command_id: outcome.command_id.clone(),
                duration: outcome.duration,
            });
        } else {
            self.sink.publish(QueueEvent::CommandFailed {
                queue_id: queue_id.to_string(),
                command_id: outcome.command_id.clone(),
                error: outcome.error.clone().unwrap_or_default(),
            });
        }

        self.sink.publish(QueueEvent::Progress {
            queue_id: queue_id.to_string(),
            command_id: outcome.command_id.clone(),
            percent,
        });
    }
}

fn command_index(commands: &[Command]) -> HashMap<String, Command> {
    commands
        .iter()
        .map(|c| (c.identity().to_string(), c.clone()))
        .collect()
}

/// Members of a group that still need to run (not in the completed set).
fn pending_members(group: &ExecutionGroup, queue: &Queue) -> Vec<String> {
    group
        .commands
        .iter()
        .filter(|identity| !queue.execution.completed.contains(*identity))
        .cloned()
        .collect()
}
