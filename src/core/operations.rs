//! Ranking passes for the three operations.
//!
//! Each pass ranks the eligible targets, deploys them in order through one
//! pool and returns completion estimates for the scheduler. An empty result
//! means nothing useful was started.

use crate::core::calculator::{CycleParameterCalculator, OperationParams};
use crate::core::catalog::Cluster;
use crate::core::report::{build_status_line, StatusSink};
use crate::core::resource_pool::ResourcePool;
use crate::util::serde::{ceil_ms, OperationKind, TaskKey, TargetId};

/// Deploy `ranked` in order through `pool`.
///
/// Stops at the first entry that gets no threads at all (the pool is full)
/// and after the first entry that only gets part of what it asked for. With
/// `follow_up` set, every entry that placed threads also gets a delayed
/// mitigation sized to cancel the defense those threads add.
pub fn deploy_common<C: Cluster + ?Sized>(
    pool: &mut ResourcePool,
    cluster: &mut C,
    calc: &CycleParameterCalculator,
    ranked: &[OperationParams],
    operation: OperationKind,
    follow_up: bool,
    sink: &mut dyn StatusSink,
) -> Vec<u64> {
    let mut estimates = Vec::new();
    let mut total_deployed = 0u32;
    let mut targets: Vec<TargetId> = Vec::new();

    for params in ranked {
        let key = TaskKey::new(operation, params.target.clone());
        let outcome = pool.deploy(cluster, params.threads, &key);
        if outcome.total_deployed == 0 {
            break;
        }
        total_deployed = total_deployed.saturating_add(outcome.total_deployed);
        targets.push(params.target.clone());

        if outcome.deployed > 0 {
            let estimate = if follow_up {
                deploy_follow_up(pool, cluster, calc, params, operation, outcome.deployed)
            } else {
                params.time_ms
            };
            estimates.push(ceil_ms(estimate));
        }

        if outcome.is_partial(params.threads) {
            tracing::debug!(
                pool = %pool.name(),
                target = %params.target,
                "partial deployment ends pass"
            );
            break;
        }
    }

    if !targets.is_empty() {
        sink.report(build_status_line(
            pool.name(),
            format!(
                "Pool {} has {} threads of {} across [{}].",
                pool.name(),
                total_deployed,
                operation,
                targets.join(",")
            ),
        ));
    }
    estimates
}

/// Place the mitigation that cancels `deployed` threads of `operation` and
/// return the estimate for the pair. The follow-up may fail; the mitigation
/// pass cleans up whatever it leaves behind.
fn deploy_follow_up<C: Cluster + ?Sized>(
    pool: &mut ResourcePool,
    cluster: &mut C,
    calc: &CycleParameterCalculator,
    params: &OperationParams,
    operation: OperationKind,
    deployed: u32,
) -> f64 {
    let increase = match operation {
        OperationKind::Extraction => cluster.extraction_defense_increase(deployed),
        OperationKind::Replenishment => cluster.replenish_defense_increase(deployed),
        OperationKind::Mitigation | OperationKind::Filler => 0.0,
    };
    let threads = calc.mitigation_threads_for(&*cluster, increase);
    let Some(target) = cluster.target(&params.target) else {
        return params.time_ms;
    };
    if threads == 0 {
        return params.time_ms;
    }

    let mitigation_ms = cluster.mitigation_time_ms(&target);
    let delay_ms = ceil_ms(params.time_ms - mitigation_ms);
    let key = TaskKey::delayed(OperationKind::Mitigation, params.target.clone(), delay_ms);
    let mitigated = pool.deploy(cluster, threads, &key);

    if mitigated.deployed > 0 {
        params.time_ms.max(mitigation_ms)
    } else {
        params.time_ms
    }
}

/// Extract from the most valuable saturated targets, then spend what is left
/// on replenishment, shortest first.
pub fn extraction_pass<C: Cluster + ?Sized>(
    pool: &mut ResourcePool,
    cluster: &mut C,
    calc: &CycleParameterCalculator,
    sink: &mut dyn StatusSink,
) -> Vec<u64> {
    let ranked = calc.rank_extraction(&*cluster);
    let mut estimates = deploy_common(
        pool,
        cluster,
        calc,
        &ranked,
        OperationKind::Extraction,
        true,
        sink,
    );
    estimates.extend(replenishment_pass(pool, cluster, calc, true, sink));
    estimates
}

/// Replenish drained targets, best value first unless `prioritize_short`.
pub fn replenishment_pass<C: Cluster + ?Sized>(
    pool: &mut ResourcePool,
    cluster: &mut C,
    calc: &CycleParameterCalculator,
    prioritize_short: bool,
    sink: &mut dyn StatusSink,
) -> Vec<u64> {
    let ranked = calc.rank_replenishment(&*cluster, prioritize_short);
    deploy_common(
        pool,
        cluster,
        calc,
        &ranked,
        OperationKind::Replenishment,
        true,
        sink,
    )
}

/// Bring every target with excess defense back to its minimum.
pub fn mitigation_pass<C: Cluster + ?Sized>(
    pool: &mut ResourcePool,
    cluster: &mut C,
    calc: &CycleParameterCalculator,
    sink: &mut dyn StatusSink,
) -> Vec<u64> {
    let ranked = calc.rank_mitigation(&*cluster);
    deploy_common(
        pool,
        cluster,
        calc,
        &ranked,
        OperationKind::Mitigation,
        false,
        sink,
    )
}
