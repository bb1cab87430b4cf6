use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use runqueue::errors::Result;
use runqueue::exec::{CommandExecutor, ExecContext, Outcome};
use runqueue::queue::Command;

/// What the fake should do when a given command is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behaviour {
    /// Settle successfully (the default).
    Succeed,
    /// Settle with a failed outcome, `n` times, then succeed. `u32::MAX`
    /// means "always fail".
    Fail(u32),
    /// Return an `Err` from `execute` (the runner must synthesize a failed
    /// outcome from it).
    Error,
}

#[derive(Debug, Default)]
struct Inner {
    behaviours: HashMap<String, Behaviour>,
    delays: HashMap<String, Duration>,
    executed: Vec<String>,
    in_flight: usize,
    max_in_flight: usize,
    cancelled: Vec<String>,
}

/// A scriptable executor that settles commands without spawning processes.
///
/// - records the dispatch order of every command
/// - tracks the maximum number of concurrently in-flight calls
/// - observes the cancellation token during per-command delays
#[derive(Debug, Clone, Default)]
pub struct FakeExecutor {
    inner: Arc<Mutex<Inner>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `identity` always settle as failed.
    pub fn fail(&self, identity: &str) {
        self.inner
            .lock()
            .unwrap()
            .behaviours
            .insert(identity.to_string(), Behaviour::Fail(u32::MAX));
    }

    /// Make `identity` fail `n` times, then succeed.
    pub fn fail_times(&self, identity: &str, n: u32) {
        self.inner
            .lock()
            .unwrap()
            .behaviours
            .insert(identity.to_string(), Behaviour::Fail(n));
    }

    /// Make `execute` return an `Err` for `identity`.
    pub fn error(&self, identity: &str) {
        self.inner
            .lock()
            .unwrap()
            .behaviours
            .insert(identity.to_string(), Behaviour::Error);
    }

    /// Delay settlement of `identity`, observing cancellation meanwhile.
    pub fn delay(&self, identity: &str, delay: Duration) {
        self.inner
            .lock()
            .unwrap()
            .delays
            .insert(identity.to_string(), delay);
    }

    /// Commands in dispatch order (retries appear once per attempt).
    pub fn executed(&self) -> Vec<String> {
        self.inner.lock().unwrap().executed.clone()
    }

    /// Highest number of calls that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.inner.lock().unwrap().max_in_flight
    }

    /// Commands whose delay was interrupted by the cancellation token.
    pub fn cancelled(&self) -> Vec<String> {
        self.inner.lock().unwrap().cancelled.clone()
    }
}

impl CommandExecutor for FakeExecutor {
    fn execute(
        &self,
        command: Command,
        ctx: ExecContext,
    ) -> Pin<Box<dyn Future<Output = Result<Outcome>> + Send + '_>> {
        let inner = Arc::clone(&self.inner);

        Box::pin(async move {
            let identity = command.identity().to_string();
            let started = Instant::now();

            let (behaviour, delay) = {
                let mut guard = inner.lock().unwrap();
                guard.executed.push(identity.clone());
                guard.in_flight += 1;
                guard.max_in_flight = guard.max_in_flight.max(guard.in_flight);

                let behaviour = match guard.behaviours.get_mut(&identity) {
                    None => Behaviour::Succeed,
                    Some(Behaviour::Fail(0)) => Behaviour::Succeed,
                    Some(Behaviour::Fail(n)) => {
                        if *n != u32::MAX {
                            *n -= 1;
                        }
                        Behaviour::Fail(*n)
                    }
                    Some(b) => *b,
                };
                (behaviour, guard.delays.get(&identity).copied())
            };

            if let Some(delay) = delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = ctx.cancellation.cancelled() => {
                        let mut guard = inner.lock().unwrap();
                        guard.cancelled.push(identity.clone());
                        guard.in_flight -= 1;
                        return Ok(Outcome::failure(identity, "cancelled", started.elapsed()));
                    }
                }
            }

            inner.lock().unwrap().in_flight -= 1;

            match behaviour {
                Behaviour::Succeed => Ok(Outcome::success(
                    identity,
                    Some("ok".to_string()),
                    started.elapsed(),
                )),
                Behaviour::Fail(_) => Ok(Outcome::failure(
                    identity,
                    "scripted failure",
                    started.elapsed(),
                )),
                Behaviour::Error => Err(anyhow::anyhow!("scripted executor error for '{identity}'").into()),
            }
        })
    }
}
