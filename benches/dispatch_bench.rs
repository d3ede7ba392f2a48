//! Benchmarks for the dispatch core.
//!
//! Benchmarks cover:
//! - First-fit deployment across many worker nodes
//! - Rescheduling with queue compression
//! - Stagger delay computation
//! - A full batch planning pass

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use cluster_dispatch::core::{
    CycleParameterCalculator, CyclePlanner, CycleTimes, InMemoryStatusSink, PoolLimits,
    ResourcePool, ScheduledTask, SchedulerLimits, TargetNode, TaskKind, TaskScheduler,
};
use cluster_dispatch::infra::{InMemoryCluster, TargetProfile};
use cluster_dispatch::util::serde::{OperationKind, TaskKey};

// ============================================================================
// Fixtures
// ============================================================================

fn build_cluster(nodes: u64) -> InMemoryCluster {
    let cluster = InMemoryCluster::new();
    for i in 0..nodes {
        cluster.add_worker(format!("node-{i}"), 64.0);
    }
    for op in [
        OperationKind::Extraction,
        OperationKind::Replenishment,
        OperationKind::Mitigation,
    ] {
        cluster.set_cost(op, 1.75);
    }
    cluster.set_skill(100);
    cluster
}

fn limits() -> PoolLimits {
    PoolLimits {
        usage_fraction: 0.8,
        host_reservation: 0.0,
    }
}

// ============================================================================
// Pool Benchmarks
// ============================================================================

fn bench_pool_deploy(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_deploy");

    for nodes in [10, 100, 1_000] {
        group.throughput(Throughput::Elements(nodes));
        group.bench_with_input(BenchmarkId::from_parameter(nodes), &nodes, |b, &nodes| {
            b.iter(|| {
                let mut cluster = build_cluster(nodes);
                let mut pool = ResourcePool::new("shard", limits());
                let key = TaskKey::new(OperationKind::Extraction, "n00dles");
                let wanted = u32::try_from(nodes * 30).unwrap_or(u32::MAX);
                black_box(pool.deploy(&mut cluster, wanted, &key));
            });
        });
    }
    group.finish();
}

// ============================================================================
// Scheduler Benchmarks
// ============================================================================

fn bench_scheduler_reschedule(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_reschedule");

    for jobs in [10u64, 100, 1_000] {
        group.throughput(Throughput::Elements(jobs));
        group.bench_with_input(BenchmarkId::from_parameter(jobs), &jobs, |b, &jobs| {
            b.iter(|| {
                let mut scheduler = TaskScheduler::new(SchedulerLimits::default());
                for i in 0..jobs {
                    let name = format!("job-{}", i % 8);
                    let estimates = [i * 1_500 % 90_000, i * 7_000 % 120_000];
                    scheduler.reschedule(
                        ScheduledTask::new(name, TaskKind::QueueReport, i),
                        &estimates,
                        i,
                    );
                }
                black_box(scheduler.len());
            });
        });
    }
    group.finish();
}

// ============================================================================
// Planner Benchmarks
// ============================================================================

fn bench_stagger(c: &mut Criterion) {
    let planner = CyclePlanner::default();
    let times = CycleTimes {
        extraction_ms: 4_000.0,
        mitigation_ms: 16_000.0,
        replenishment_ms: 12_800.0,
    };
    c.bench_function("stagger_100_cycles", |b| {
        b.iter(|| {
            for cycle in 0..100u64 {
                black_box(planner.stagger(black_box(&times), cycle * 200));
            }
        });
    });
}

fn bench_batch_pass(c: &mut Criterion) {
    let calc = CycleParameterCalculator::default();
    let planner = CyclePlanner::default();
    c.bench_function("batch_pass_50_nodes", |b| {
        b.iter(|| {
            let mut cluster = build_cluster(50);
            cluster.add_target(TargetProfile::new(TargetNode {
                id: "phantasy".into(),
                max_yield: 1_000.0,
                current_yield: 1_000.0,
                min_defense: 10.0,
                current_defense: 10.0,
                required_skill_level: 1,
            }));
            let mut pool = ResourcePool::new("shard", limits());
            let mut sink = InMemoryStatusSink::new(1);
            black_box(planner.plan_batch(&mut pool, &mut cluster, &calc, 0, &mut sink));
        });
    });
}

criterion_group!(pool_benches, bench_pool_deploy);
criterion_group!(scheduler_benches, bench_scheduler_reschedule);
criterion_group!(planner_benches, bench_stagger, bench_batch_pass);

criterion_main!(pool_benches, scheduler_benches, planner_benches);
