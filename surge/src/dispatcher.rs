use crate::clock::ArrivalClock;
use crate::pool::WorkerPool;
use crate::sink::MetricsSink;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use surge_core::{IterationContext, IterationResult, Outcome, TargetError};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatcherState {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// Consumes arrival ticks and fans each one out to a worker.
///
/// The dispatch loop is the only time-ordered component in a run: it sleeps
/// until each fire time, acquires a worker (or records a drop) and spawns
/// the iteration as its own task. It never awaits an iteration, so the
/// offered load stays a property of the schedule, not of target
/// responsiveness.
pub(crate) struct Dispatcher<T> {
    iteration: T,
    pool: Arc<WorkerPool>,
    sink: Arc<MetricsSink>,
    iteration_timeout: Duration,
    grace_period: Duration,
    state: DispatcherState,
    tasks: JoinSet<()>,
    cancel: watch::Sender<bool>,
    ticks: u64,
}

impl<T, F> Dispatcher<T>
where
    T: Fn(IterationContext) -> F + Send + Sync + 'static,
    F: Future<Output = IterationResult> + Send + 'static,
{
    pub fn new(
        iteration: T,
        pool: Arc<WorkerPool>,
        sink: Arc<MetricsSink>,
        iteration_timeout: Duration,
        grace_period: Duration,
    ) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            iteration,
            pool,
            sink,
            iteration_timeout,
            grace_period,
            state: DispatcherState::Idle,
            tasks: JoinSet::new(),
            cancel,
            ticks: 0,
        }
    }

    /// Runs the clock to exhaustion (or until `abort` fires), then drains.
    /// Returns the number of ticks dispatched.
    pub async fn run(&mut self, clock: ArrivalClock, mut abort: watch::Receiver<bool>) -> u64 {
        self.state = DispatcherState::Running;
        let origin = Instant::now();

        let mut clock = clock.peekable();
        while let Some(fire_at) = clock.peek().copied() {
            if *abort.borrow() {
                debug!("abort signalled, stopping tick dispatch");
                break;
            }
            tokio::select! {
                changed = abort.changed() => {
                    // A dead abort channel means the controller is gone.
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep_until(origin + fire_at) => {
                    clock.next();
                    self.dispatch_one();
                }
                // Reap finished iterations while waiting on the next tick.
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.account_join(joined);
                }
            }
        }

        self.drain().await;
        self.ticks
    }

    /// One scheduled arrival: lease a worker or drop the tick. Must never
    /// block on iteration execution.
    fn dispatch_one(&mut self) {
        let iteration = self.ticks;
        self.ticks += 1;

        let Some(lease) = self.pool.try_acquire() else {
            trace!(iteration, "pool exhausted, dropping tick");
            self.sink.record(&Outcome::dropped());
            return;
        };

        let ctx = IterationContext {
            worker: lease.id(),
            iteration,
        };
        let fut = (self.iteration)(ctx);
        let sink = self.sink.clone();
        let iteration_timeout = self.iteration_timeout;
        let mut cancel = self.cancel.subscribe();

        self.tasks.spawn(async move {
            // The lease rides along with the task; dropping it (normal exit,
            // panic or abort) returns the worker to the pool.
            let _lease = lease;
            let started = Instant::now();
            let outcome = if *cancel.borrow() {
                Outcome::cancelled(Duration::ZERO)
            } else {
                tokio::select! {
                    result = tokio::time::timeout(iteration_timeout, fut) => match result {
                        Ok(result) => Outcome::from_result(started.elapsed(), result),
                        // The iteration future is dropped here, which
                        // reclaims the worker from the stalled call.
                        Err(_) => Outcome::timeout(iteration_timeout),
                    },
                    _ = cancel.changed() => Outcome::cancelled(started.elapsed()),
                }
            };
            // No await below this point: once the outcome is decided it is
            // always recorded, even under abort_all.
            sink.record(&outcome);
        });
    }

    /// Stops accepting ticks, cooperatively cancels in-flight iterations and
    /// waits up to the grace period before force-aborting stragglers.
    /// Aborted iterations are still accounted as cancelled outcomes.
    async fn drain(&mut self) {
        self.state = DispatcherState::Draining;
        let _ = self.cancel.send(true);

        let deadline = Instant::now() + self.grace_period;
        let mut forced = false;
        loop {
            let joined = if forced {
                self.tasks.join_next().await
            } else {
                match tokio::time::timeout_at(deadline, self.tasks.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!(
                            in_flight = self.tasks.len(),
                            "grace period expired, force-cancelling stragglers"
                        );
                        self.tasks.abort_all();
                        forced = true;
                        continue;
                    }
                }
            };
            match joined {
                Some(joined) => self.account_join(joined),
                None => break,
            }
        }

        self.pool.drain();
        self.state = DispatcherState::Stopped;
    }

    /// Iterations normally record their own outcome; only abnormal exits
    /// (abort, panic) need accounting here so every tick stays counted
    /// exactly once.
    fn account_join(&self, joined: Result<(), JoinError>) {
        match joined {
            Ok(()) => {}
            Err(err) if err.is_cancelled() => {
                self.sink.record(&Outcome::cancelled(Duration::ZERO));
            }
            Err(err) => {
                error!("iteration task panicked: {err}");
                self.sink.record(&Outcome::from_result(
                    Duration::ZERO,
                    Err(TargetError::Transport(err.to_string())),
                ));
            }
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> DispatcherState {
        self.state
    }
}
