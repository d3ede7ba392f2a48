//! Tokio driver for the dispatch loop.
//!
//! The scheduler itself never sleeps; this driver turns its
//! [`Step::Wait`] answers into timed sleeps and otherwise loops.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::core::{DispatchError, Placement, Step, TaskHandler, TaskScheduler};
use crate::util::clock::Clock;
use crate::util::serde::ProcessHandle;

/// Default tick of [`wait_for_exit`].
pub const DEFAULT_POLL_TICK: Duration = Duration::from_millis(100);

/// Clock following tokio's time, so paused-time tests advance it.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
    start_ms: u64,
}

impl TokioClock {
    /// Clock reading `start_ms` now.
    #[must_use]
    pub fn starting_at(start_ms: u64) -> Self {
        Self {
            origin: Instant::now(),
            start_ms,
        }
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        let elapsed = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.start_ms.saturating_add(elapsed)
    }
}

/// Owns the scheduler and its handler and runs the loop.
#[derive(Debug)]
pub struct Driver<H, K> {
    scheduler: TaskScheduler,
    handler: H,
    clock: K,
    dispatched: u64,
}

impl<H: TaskHandler, K: Clock> Driver<H, K> {
    /// Driver over a seeded scheduler.
    pub const fn new(scheduler: TaskScheduler, handler: H, clock: K) -> Self {
        Self {
            scheduler,
            handler,
            clock,
            dispatched: 0,
        }
    }

    /// The scheduler.
    pub const fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    /// The handler.
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// Mutable handler, for adjusting state between steps.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Jobs dispatched so far.
    pub const fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Run one scheduler step, sleeping when told to wait.
    pub async fn tick(&mut self) -> Step {
        let now = self.clock.now_ms();
        let step = self.scheduler.step(&mut self.handler, now);
        match &step {
            Step::Wait { wait_ms, .. } => {
                tokio::time::sleep(Duration::from_millis(*wait_ms)).await;
            }
            Step::Empty => {
                tracing::warn!("no jobs queued");
                let idle = self.scheduler.limits().cap_wait_ms;
                tokio::time::sleep(Duration::from_millis(idle)).await;
            }
            Step::Dispatched {
                name,
                estimates,
                requeued,
            } => {
                self.dispatched += 1;
                tracing::info!(task = %name, estimates = estimates.len(), requeued, "dispatched");
            }
        }
        step
    }

    /// Run until `dispatches` more jobs have been dispatched.
    pub async fn run_dispatches(&mut self, dispatches: u64) {
        let target = self.dispatched + dispatches;
        while self.dispatched < target {
            self.tick().await;
        }
    }

    /// Run until the clock reaches `until_ms`.
    pub async fn run_until(&mut self, until_ms: u64) {
        while self.clock.now_ms() < until_ms {
            self.tick().await;
        }
    }

    /// Run until `shutdown` flips to true or its sender is dropped.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(jobs = self.scheduler.len(), "dispatch loop started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = self.tick() => {}
            }
        }
        tracing::info!(dispatched = self.dispatched, "dispatch loop stopped");
    }

    /// Give back the scheduler and handler.
    pub fn into_parts(self) -> (TaskScheduler, H) {
        (self.scheduler, self.handler)
    }
}

/// Poll `handle` every `tick` until it is no longer active.
///
/// Returns the time waited.
///
/// # Errors
///
/// Returns [`DispatchError::Timeout`] if the process is still active after
/// `timeout`.
pub async fn wait_for_exit<P: Placement + ?Sized>(
    placement: &P,
    handle: ProcessHandle,
    tick: Duration,
    timeout: Duration,
) -> Result<Duration, DispatchError> {
    let started = Instant::now();
    loop {
        if !placement.is_active(handle) {
            return Ok(started.elapsed());
        }
        let waited = started.elapsed();
        if waited >= timeout {
            return Err(DispatchError::Timeout { waited });
        }
        tokio::time::sleep(tick.min(timeout - waited)).await;
    }
}
