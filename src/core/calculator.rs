//! Thread counts, durations and value scores derived from target state.
//!
//! Everything here is a pure function of what the catalog reports. Targets
//! that fail an eligibility predicate yield `None` and simply drop out of the
//! current ranking pass.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::core::catalog::{TargetModel, TargetNode, WorkerCatalog};
use crate::util::serde::{ceil_threads, floor_threads, TargetId};

/// Sizing of one operation against one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationParams {
    /// Target the operation acts on.
    pub target: TargetId,
    /// Threads to request.
    pub threads: u32,
    /// Expected duration in milliseconds.
    pub time_ms: f64,
    /// Ranking score, higher is better.
    pub value: f64,
}

/// Durations of the three operations against a target at steady state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleTimes {
    /// Extraction duration.
    pub extraction_ms: f64,
    /// Mitigation duration.
    pub mitigation_ms: f64,
    /// Replenishment duration.
    pub replenishment_ms: f64,
}

impl CycleTimes {
    /// Longest of the three durations.
    #[must_use]
    pub fn max_ms(&self) -> f64 {
        self.extraction_ms
            .max(self.mitigation_ms)
            .max(self.replenishment_ms)
    }
}

/// Thread counts for the four phases of a batch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CycleThreads {
    /// Extraction threads.
    pub extraction: u32,
    /// Mitigation cancelling the extraction's defense increase.
    pub mitigation_after_extraction: u32,
    /// Replenishment threads restoring the extracted yield.
    pub replenishment: u32,
    /// Mitigation cancelling the replenishment's defense increase.
    pub mitigation_after_replenishment: u32,
}

impl CycleThreads {
    /// Threads across all four phases.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.extraction
            .saturating_add(self.mitigation_after_extraction)
            .saturating_add(self.replenishment)
            .saturating_add(self.mitigation_after_replenishment)
    }
}

/// Catalog-derived computations for the three operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleParameterCalculator {
    /// Fraction of yield a single extraction aims to remove.
    pub extraction_fraction: f64,
    /// A target is worth replenishing only while
    /// `current_yield × replenish_headroom ≤ max_yield`.
    pub replenish_headroom: f64,
    /// Targets are ranked for extraction only at or above this share of
    /// their maximum yield.
    pub extraction_min_yield_ratio: f64,
}

impl Default for CycleParameterCalculator {
    fn default() -> Self {
        Self {
            extraction_fraction: 0.4,
            replenish_headroom: 1.1,
            extraction_min_yield_ratio: 0.9,
        }
    }
}

impl CycleParameterCalculator {
    /// Threads to extract `extraction_fraction` of the current yield, the
    /// time it takes, and `current_yield × success / threads / time`.
    pub fn extraction_params<M: TargetModel + ?Sized>(
        &self,
        model: &M,
        target: &TargetNode,
    ) -> Option<OperationParams> {
        let per_thread = model.extraction_fraction_per_thread(target);
        if per_thread <= 0.0 {
            return None;
        }
        let threads = ceil_threads(self.extraction_fraction / per_thread);
        let time_ms = model.extraction_time_ms(target);
        if threads == 0 || time_ms <= 0.0 {
            return None;
        }
        let chance = model.success_probability(target);
        Some(OperationParams {
            target: target.id.clone(),
            threads,
            time_ms,
            value: target.current_yield * chance / f64::from(threads) / time_ms,
        })
    }

    /// Threads to restore the target to its maximum yield. `None` when the
    /// target is already close to saturated.
    pub fn replenish_params<M: TargetModel + ?Sized>(
        &self,
        model: &M,
        target: &TargetNode,
    ) -> Option<OperationParams> {
        if target.current_yield * self.replenish_headroom > target.max_yield {
            return None;
        }
        let multiplier = target.max_yield / target.current_yield.max(1.0);
        let threads = ceil_threads(model.replenish_threads(target, multiplier));
        let time_ms = model.replenish_time_ms(target);
        if threads == 0 || time_ms <= 0.0 {
            return None;
        }
        let chance = model.success_probability(target);
        Some(OperationParams {
            target: target.id.clone(),
            threads,
            time_ms,
            value: target.current_yield * chance / f64::from(threads) / time_ms,
        })
    }

    /// Threads to bring the target's defense down to its minimum. `None`
    /// when there is no excess defense.
    pub fn mitigation_params<M: TargetModel + ?Sized>(
        &self,
        model: &M,
        target: &TargetNode,
    ) -> Option<OperationParams> {
        if target.current_defense <= target.min_defense {
            return None;
        }
        let per_thread = model.mitigation_per_thread();
        if per_thread <= 0.0 {
            return None;
        }
        let threads = ceil_threads((target.current_defense - target.min_defense) / per_thread);
        let time_ms = model.mitigation_time_ms(target);
        if threads == 0 || time_ms <= 0.0 {
            return None;
        }
        Some(OperationParams {
            target: target.id.clone(),
            threads,
            time_ms,
            value: 1.0 / time_ms,
        })
    }

    /// Mitigation threads that cancel `defense_increase`.
    pub fn mitigation_threads_for<M: TargetModel + ?Sized>(
        &self,
        model: &M,
        defense_increase: f64,
    ) -> u32 {
        let per_thread = model.mitigation_per_thread();
        if per_thread <= 0.0 {
            return 0;
        }
        ceil_threads(defense_increase / per_thread)
    }

    /// Extraction candidates, best value first.
    pub fn rank_extraction<C>(&self, cluster: &C) -> Vec<OperationParams>
    where
        C: WorkerCatalog + TargetModel + ?Sized,
    {
        let mut ranked: Vec<OperationParams> = cluster
            .eligible_targets()
            .iter()
            .filter(|t| {
                t.current_yield >= self.extraction_min_yield_ratio * t.max_yield
                    && cluster.success_probability(t) > 0.0
            })
            .filter_map(|t| self.extraction_params(cluster, t))
            .collect();
        sort_by_value(&mut ranked);
        ranked
    }

    /// Replenishment candidates, best value first, or shortest first when
    /// `prioritize_short` is set.
    pub fn rank_replenishment<C>(&self, cluster: &C, prioritize_short: bool) -> Vec<OperationParams>
    where
        C: WorkerCatalog + TargetModel + ?Sized,
    {
        let mut ranked: Vec<OperationParams> = cluster
            .eligible_targets()
            .iter()
            .filter_map(|t| self.replenish_params(cluster, t))
            .collect();
        if prioritize_short {
            ranked.sort_by(|a, b| a.time_ms.total_cmp(&b.time_ms));
        } else {
            sort_by_value(&mut ranked);
        }
        ranked
    }

    /// Mitigation candidates, quickest first.
    pub fn rank_mitigation<C>(&self, cluster: &C) -> Vec<OperationParams>
    where
        C: WorkerCatalog + TargetModel + ?Sized,
    {
        let mut ranked: Vec<OperationParams> = cluster
            .eligible_targets()
            .iter()
            .filter_map(|t| self.mitigation_params(cluster, t))
            .collect();
        sort_by_value(&mut ranked);
        ranked
    }

    /// Operation durations with the target at minimum defense.
    pub fn cycle_times<M: TargetModel + ?Sized>(
        &self,
        model: &M,
        target: &TargetNode,
    ) -> CycleTimes {
        let steady = target.at_steady_state(target.max_yield);
        CycleTimes {
            extraction_ms: model.extraction_time_ms(&steady),
            mitigation_ms: model.mitigation_time_ms(&steady),
            replenishment_ms: model.replenish_time_ms(&steady),
        }
    }

    /// Thread counts for one steady-state cycle. Extraction rounds down so it
    /// never takes more than the configured fraction; replenishment and both
    /// mitigations round up so the target ends the cycle restored.
    pub fn cycle_threads<M: TargetModel + ?Sized>(
        &self,
        model: &M,
        target: &TargetNode,
    ) -> CycleThreads {
        let full = target.at_steady_state(target.max_yield);
        let per_thread = model.extraction_fraction_per_thread(&full);
        let extraction = if per_thread > 0.0 {
            floor_threads(self.extraction_fraction / per_thread)
        } else {
            0
        };

        let drained = target.at_steady_state(target.max_yield * (1.0 - self.extraction_fraction));
        let multiplier = target.max_yield / drained.current_yield.max(1.0);
        let replenishment = ceil_threads(model.replenish_threads(&drained, multiplier));

        CycleThreads {
            extraction,
            mitigation_after_extraction: self
                .mitigation_threads_for(model, model.extraction_defense_increase(extraction)),
            replenishment,
            mitigation_after_replenishment: self
                .mitigation_threads_for(model, model.replenish_defense_increase(replenishment)),
        }
    }

    /// Yield per thread-millisecond of a full cycle; 0 for targets a cycle
    /// cannot act on.
    pub fn cycle_value<M: TargetModel + ?Sized>(&self, model: &M, target: &TargetNode) -> f64 {
        let time = self.cycle_times(model, target).max_ms();
        let threads = self.cycle_threads(model, target).total();
        if time <= 0.0 || threads == 0 {
            return 0.0;
        }
        target.max_yield / (time * f64::from(threads))
    }

    /// Eligible targets ordered by [`cycle_value`](Self::cycle_value),
    /// best first.
    pub fn rank_cycle_targets<C>(&self, cluster: &C) -> Vec<TargetNode>
    where
        C: WorkerCatalog + TargetModel + ?Sized,
    {
        let mut scored: Vec<(f64, TargetNode)> = cluster
            .eligible_targets()
            .into_iter()
            .map(|t| (self.cycle_value(cluster, &t), t))
            .filter(|(value, _)| *value > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().map(|(_, t)| t).collect()
    }
}

fn sort_by_value(ranked: &mut [OperationParams]) {
    ranked.sort_by(|a, b| match b.value.total_cmp(&a.value) {
        Ordering::Equal => a.target.cmp(&b.target),
        other => other,
    });
}
