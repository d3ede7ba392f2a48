//! Recurring-task scheduler.
//!
//! The scheduler owns a single queue of named jobs ordered by due time. Each
//! dispatch pops the front job, runs it through a [`TaskHandler`], and
//! re-enqueues it once per completion estimate the handler returns. Runs are
//! open loop: the handler's estimates are trusted and the next run simply
//! re-reads live state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of jobs the scheduler can run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind {
    /// Extraction pass (with replenishment fallback) through a pool.
    Extraction {
        /// Pool name.
        pool: String,
    },
    /// Replenishment pass through a pool.
    Replenishment {
        /// Pool name.
        pool: String,
        /// Rank shortest replenishment first instead of best value.
        #[serde(default)]
        prioritize_short: bool,
    },
    /// Mitigation pass through a pool.
    Mitigation {
        /// Pool name.
        pool: String,
    },
    /// Four-phase batch cycles against one ranked target.
    Batch {
        /// Pool name.
        pool: String,
        /// Rank of the target by cycle value, 0 being the best.
        #[serde(default)]
        target_rank: usize,
    },
    /// Externally supplied maintenance routine.
    Maintenance {
        /// Routine name.
        routine: String,
    },
    /// Report how long until each queued job is due.
    QueueReport,
}

/// One queued instance of a recurring job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Instance identifier, unique per enqueue.
    pub id: Uuid,
    /// Job name; instances of the same job share it.
    pub name: String,
    /// What to run.
    pub kind: TaskKind,
    /// Absolute due time in milliseconds.
    pub due_at_ms: u64,
}

impl ScheduledTask {
    /// New instance of `name` due at `due_at_ms`.
    pub fn new(name: impl Into<String>, kind: TaskKind, due_at_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            due_at_ms,
        }
    }
}

/// Runs jobs on behalf of the scheduler.
pub trait TaskHandler {
    /// Run `kind` and return completion estimates in milliseconds from now.
    /// An empty list means no useful work was started.
    fn handle(&mut self, kind: &TaskKind, now_ms: u64) -> Vec<u64>;

    /// Put idle capacity to use before a long wait. Returns threads placed.
    fn share_idle(&mut self) -> u32;

    /// Forward a status line.
    fn report(&mut self, source: &str, message: String);
}

/// Timing constants of the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerLimits {
    /// Longest single wait, bounding staleness from estimate drift.
    pub cap_wait_ms: u64,
    /// Waits longer than this share idle capacity first.
    pub share_threshold_ms: u64,
    /// Delay before re-running a job that reported no work.
    pub default_backoff_ms: u64,
    /// Same-name instances closer than this are coalesced.
    pub coalesce_window_ms: u64,
}

impl Default for SchedulerLimits {
    fn default() -> Self {
        Self {
            cap_wait_ms: 11_000,
            share_threshold_ms: 10_000,
            default_backoff_ms: 60_000,
            coalesce_window_ms: 10_000,
        }
    }
}

/// Result of one [`TaskScheduler::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Nothing is queued.
    Empty,
    /// The front job is not due; sleep this long.
    Wait {
        /// Milliseconds to sleep.
        wait_ms: u64,
        /// Filler threads placed before sleeping.
        shared: u32,
    },
    /// A job ran.
    Dispatched {
        /// Job name.
        name: String,
        /// Estimates the handler returned.
        estimates: Vec<u64>,
        /// Instances enqueued in response.
        requeued: usize,
    },
}

/// Time-ordered queue of recurring jobs.
#[derive(Debug, Clone, Default)]
pub struct TaskScheduler {
    limits: SchedulerLimits,
    queue: Vec<ScheduledTask>,
}

impl TaskScheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub const fn new(limits: SchedulerLimits) -> Self {
        Self {
            limits,
            queue: Vec::new(),
        }
    }

    /// Timing constants in use.
    #[must_use]
    pub const fn limits(&self) -> SchedulerLimits {
        self.limits
    }

    /// Queue all jobs `due_at_ms = now`, in the order given.
    pub fn seed<I, N>(&mut self, jobs: I, now_ms: u64)
    where
        I: IntoIterator<Item = (N, TaskKind)>,
        N: Into<String>,
    {
        for (name, kind) in jobs {
            self.queue.push(ScheduledTask::new(name, kind, now_ms));
        }
        self.queue.sort_by_key(|t| t.due_at_ms);
    }

    /// Queued instances, earliest first.
    #[must_use]
    pub fn queue(&self) -> &[ScheduledTask] {
        &self.queue
    }

    /// Number of queued instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether the queue is ordered by due time.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.queue.windows(2).all(|w| w[0].due_at_ms <= w[1].due_at_ms)
    }

    /// Advance the loop once: either report how long to wait, or run the
    /// front job and reschedule it.
    pub fn step<H: TaskHandler + ?Sized>(&mut self, handler: &mut H, now_ms: u64) -> Step {
        let Some(front) = self.queue.first() else {
            return Step::Empty;
        };
        if front.due_at_ms > now_ms {
            let wait_ms = self.limits.cap_wait_ms.min(front.due_at_ms - now_ms);
            let shared = if wait_ms > self.limits.share_threshold_ms {
                handler.share_idle()
            } else {
                0
            };
            return Step::Wait { wait_ms, shared };
        }

        debug_assert!(self.is_sorted(), "queue out of order at dispatch");
        let task = self.queue.remove(0);
        tracing::debug!(task = %task.name, id = %task.id, "dispatching");
        let estimates = match &task.kind {
            TaskKind::QueueReport => {
                let message = self.describe_waits(now_ms);
                handler.report(&task.name, message);
                Vec::new()
            }
            kind => handler.handle(kind, now_ms),
        };
        let name = task.name.clone();
        let requeued = self.reschedule(task, &estimates, now_ms);
        Step::Dispatched {
            name,
            estimates,
            requeued,
        }
    }

    /// Re-enqueue `task` after a run that returned `estimates`, then restore
    /// ordering and coalesce. Returns the instances enqueued.
    pub fn reschedule(&mut self, task: ScheduledTask, estimates: &[u64], now_ms: u64) -> usize {
        let enqueued = if estimates.is_empty() {
            if self.queue.iter().any(|t| t.name == task.name) {
                tracing::debug!(task = %task.name, "another instance pending, dropping");
                0
            } else {
                let due = now_ms.saturating_add(self.limits.default_backoff_ms);
                self.queue.push(ScheduledTask::new(task.name, task.kind, due));
                1
            }
        } else {
            for estimate in estimates {
                let due = now_ms.saturating_add(*estimate);
                self.queue
                    .push(ScheduledTask::new(task.name.clone(), task.kind.clone(), due));
            }
            estimates.len()
        };

        self.queue.sort_by_key(|t| t.due_at_ms);
        self.compress();
        enqueued
    }

    /// Drop every instance that is due within the coalescing window before a
    /// later instance of the same job. Survivors keep their relative order.
    /// Returns the instances removed.
    pub fn compress(&mut self) -> usize {
        let window = self.limits.coalesce_window_ms;
        let mut keep = vec![true; self.queue.len()];
        let mut last_kept: HashMap<&str, u64> = HashMap::new();
        for (idx, task) in self.queue.iter().enumerate().rev() {
            let within = last_kept
                .get(task.name.as_str())
                .is_some_and(|later| later.saturating_sub(task.due_at_ms) < window);
            if within {
                keep[idx] = false;
            } else {
                last_kept.insert(task.name.as_str(), task.due_at_ms);
            }
        }

        let before = self.queue.len();
        let queue = std::mem::take(&mut self.queue);
        self.queue = queue
            .into_iter()
            .zip(keep)
            .filter_map(|(task, kept)| kept.then_some(task))
            .collect();
        let removed = before - self.queue.len();
        if removed > 0 {
            tracing::debug!(removed, "coalesced queued instances");
        }
        removed
    }

    /// "Waiting for tasks in [..] seconds." for every queued instance.
    #[must_use]
    pub fn describe_waits(&self, now_ms: u64) -> String {
        let waits: Vec<String> = self
            .queue
            .iter()
            .map(|t| (t.due_at_ms.saturating_sub(now_ms) / 1000).to_string())
            .collect();
        format!("Waiting for tasks in [{}] seconds.", waits.join(","))
    }
}
