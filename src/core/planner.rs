//! Four-phase batch cycles against a single target.
//!
//! A cycle is extraction, mitigation, replenishment, mitigation. The phases
//! start at staggered delays so that, whatever their durations, they land on
//! the target in that order and at least one increment apart. Repeated
//! cycles in the same pass shift by four increments each.

use serde::{Deserialize, Serialize};

use crate::core::calculator::{CycleParameterCalculator, CycleThreads, CycleTimes};
use crate::core::catalog::{Cluster, CostModel, TargetNode};
use crate::core::report::{build_status_line, StatusSink};
use crate::core::resource_pool::ResourcePool;
use crate::core::DispatchError;
use crate::util::serde::{ceil_ms, OperationKind, TaskKey};

/// Start delays of the four phases of one cycle, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaggerDelays {
    /// Extraction start.
    pub extraction_ms: u64,
    /// Mitigation after extraction.
    pub mitigation_after_extraction_ms: u64,
    /// Replenishment start.
    pub replenishment_ms: u64,
    /// Mitigation after replenishment.
    pub mitigation_after_replenishment_ms: u64,
}

impl StaggerDelays {
    /// When each phase completes: start delay plus duration, in phase order.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn landing_times(&self, times: &CycleTimes) -> [f64; 4] {
        [
            self.extraction_ms as f64 + times.extraction_ms,
            self.mitigation_after_extraction_ms as f64 + times.mitigation_ms,
            self.replenishment_ms as f64 + times.replenishment_ms,
            self.mitigation_after_replenishment_ms as f64 + times.mitigation_ms,
        ]
    }
}

/// Outcome of one batch planning pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Target the cycles were issued against.
    pub target: String,
    /// Cycles issued.
    pub cycles: u32,
    /// Whether any cycle skipped extraction because the target was not yet
    /// at steady state.
    pub initializing: bool,
    /// When the planning task should next run, relative to now.
    pub next_due_ms: u64,
}

/// Batch orchestrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CyclePlanner {
    /// Spacing between consecutive landings.
    pub increment_ms: u64,
    /// Upper bound on cycles issued per pass.
    pub max_iterations: u32,
    /// Extraction runs only while yield exceeds this share of its maximum.
    pub steady_yield_ratio: f64,
    /// Extraction runs only while defense is below this multiple of its
    /// minimum.
    pub steady_defense_ratio: f64,
}

impl Default for CyclePlanner {
    fn default() -> Self {
        Self {
            increment_ms: 50,
            max_iterations: 100,
            steady_yield_ratio: 0.95,
            steady_defense_ratio: 1.1,
        }
    }
}

impl CyclePlanner {
    /// Start delays for a cycle beginning at `base_delay_ms`.
    ///
    /// ```text
    /// mitigation_after_extraction = max(E − M + Δ, 0)
    /// replenishment               = max(max(E, M) − R + 2Δ, 0)
    /// mitigation_after_replen     = max(max(E, M, R) − M + 3Δ, 0)
    /// ```
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stagger(&self, times: &CycleTimes, base_delay_ms: u64) -> StaggerDelays {
        let step = self.increment_ms as f64;
        let e = times.extraction_ms;
        let m = times.mitigation_ms;
        let r = times.replenishment_ms;
        StaggerDelays {
            extraction_ms: base_delay_ms,
            mitigation_after_extraction_ms: base_delay_ms + ceil_ms(e - m + step),
            replenishment_ms: base_delay_ms + ceil_ms(e.max(m) - r + 2.0 * step),
            mitigation_after_replenishment_ms: base_delay_ms
                + ceil_ms(e.max(m).max(r) - m + 3.0 * step),
        }
    }

    /// Whether the target is close enough to steady state for extraction.
    #[must_use]
    pub fn is_steady(&self, target: &TargetNode) -> bool {
        target.current_yield > target.max_yield * self.steady_yield_ratio
            && target.current_defense < target.min_defense * self.steady_defense_ratio
    }

    /// Capacity one full cycle consumes.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidCost`] if any of the three operations
    /// has no positive cost.
    pub fn cycle_cost<C: CostModel + ?Sized>(
        &self,
        costs: &C,
        threads: &CycleThreads,
    ) -> Result<f64, DispatchError> {
        let extraction = costs.checked_cost(OperationKind::Extraction)?;
        let mitigation = costs.checked_cost(OperationKind::Mitigation)?;
        let replenishment = costs.checked_cost(OperationKind::Replenishment)?;
        Ok(f64::from(threads.extraction) * extraction
            + f64::from(threads.replenishment) * replenishment
            + f64::from(
                threads
                    .mitigation_after_extraction
                    .saturating_add(threads.mitigation_after_replenishment),
            ) * mitigation)
    }

    /// Issue as many cycles against the `target_rank`-th most valuable target
    /// as the pool can hold, and return when planning should run again.
    ///
    /// Returns an empty list when there is no such target or the cycle cannot
    /// be costed; the scheduler then backs off.
    pub fn plan_batch<C: Cluster + ?Sized>(
        &self,
        pool: &mut ResourcePool,
        cluster: &mut C,
        calc: &CycleParameterCalculator,
        target_rank: usize,
        sink: &mut dyn StatusSink,
    ) -> Vec<u64> {
        self.run_batch(pool, cluster, calc, target_rank, sink)
            .map(|report| vec![report.next_due_ms])
            .unwrap_or_default()
    }

    /// [`plan_batch`](Self::plan_batch) returning the full report.
    pub fn run_batch<C: Cluster + ?Sized>(
        &self,
        pool: &mut ResourcePool,
        cluster: &mut C,
        calc: &CycleParameterCalculator,
        target_rank: usize,
        sink: &mut dyn StatusSink,
    ) -> Option<BatchReport> {
        let target = calc.rank_cycle_targets(&*cluster).into_iter().nth(target_rank)?;
        let times = calc.cycle_times(&*cluster, &target);
        let threads = calc.cycle_threads(&*cluster, &target);
        let cost = match self.cycle_cost(&*cluster, &threads) {
            Ok(cost) if cost > 0.0 => cost,
            Ok(_) => return None,
            Err(e) => {
                tracing::error!(pool = %pool.name(), target = %target.id, "batch skipped: {}", e);
                return None;
            }
        };

        pool.refresh_usage(&*cluster);
        let mut base_delay = 0u64;
        let mut cycles = 0u32;
        let mut initializing = false;
        while cycles < self.max_iterations && pool.available_capacity(&*cluster) >= cost {
            let live = cluster.target(&target.id).unwrap_or_else(|| target.clone());
            let delays = self.stagger(&times, base_delay);
            let mut phases = Vec::with_capacity(4);

            let steady = self.is_steady(&live);
            if steady {
                phases.push((
                    OperationKind::Extraction,
                    delays.extraction_ms,
                    threads.extraction,
                ));
            }
            phases.push((
                OperationKind::Mitigation,
                delays.mitigation_after_extraction_ms,
                threads.mitigation_after_extraction,
            ));
            phases.push((
                OperationKind::Replenishment,
                delays.replenishment_ms,
                threads.replenishment,
            ));
            phases.push((
                OperationKind::Mitigation,
                delays.mitigation_after_replenishment_ms,
                threads.mitigation_after_replenishment,
            ));

            let mut placed = 0u32;
            let mut short = false;
            for (operation, delay_ms, wanted) in phases {
                let deployed =
                    place_phase(pool, cluster, operation, &target.id, delay_ms, wanted);
                placed = placed.saturating_add(deployed);
                short |= deployed < wanted;
            }

            // free capacity too fragmented for any single thread
            if placed == 0 {
                tracing::debug!(
                    pool = %pool.name(),
                    target = %target.id,
                    "batch cycle placed nothing"
                );
                break;
            }
            base_delay += 4 * self.increment_ms;
            cycles += 1;
            initializing |= !steady;
            if short {
                break;
            }
        }

        let next_due_ms = ceil_ms(times.max_ms()) + base_delay;
        if cycles > 0 {
            sink.report(build_status_line(
                pool.name(),
                format!(
                    "Batch: pool {} {} {} {} times in {}s.",
                    pool.name(),
                    if initializing { "initializing" } else { "attacking" },
                    target.id,
                    cycles,
                    next_due_ms / 1000
                ),
            ));
        }
        Some(BatchReport {
            target: target.id,
            cycles,
            initializing,
            next_due_ms,
        })
    }
}

/// Place one phase and return the threads placed. Each cycle is new work,
/// so the request is on top of whatever is already recorded under the same
/// key.
fn place_phase<C: Cluster + ?Sized>(
    pool: &mut ResourcePool,
    cluster: &mut C,
    operation: OperationKind,
    target: &str,
    delay_ms: u64,
    threads: u32,
) -> u32 {
    if threads == 0 {
        return 0;
    }
    let key = TaskKey::delayed(operation, target, delay_ms);
    let outcome = pool.deploy_additional(cluster, threads, &key);
    if outcome.deployed < threads {
        tracing::warn!(
            pool = %pool.name(),
            key = %key,
            placed = outcome.deployed,
            threads,
            "batch phase short"
        );
    }
    outcome.deployed
}
