//! Tests for the runtime driver and snapshot API

use cluster_dispatch::core::{
    Controller, CycleParameterCalculator, CyclePlanner, InMemoryStatusSink, PoolLimits,
    ResourcePool, SchedulerLimits, Step, TaskKind, TaskScheduler,
};
use cluster_dispatch::infra::InMemoryCluster;
use cluster_dispatch::runtime::{
    health, list_pools, list_queue, Driver, PoolSnapshot, TokioClock,
};
use cluster_dispatch::util::clock::ManualClock;
use cluster_dispatch::util::serde::{OperationKind, TaskKey};

fn controller(cluster: InMemoryCluster) -> Controller<InMemoryCluster> {
    Controller::new(
        cluster,
        vec![ResourcePool::new(
            "shard",
            PoolLimits {
                usage_fraction: 0.5,
                host_reservation: 0.0,
            },
        )],
        CycleParameterCalculator::default(),
        CyclePlanner::default(),
        Box::new(InMemoryStatusSink::new(4)),
    )
}

#[test]
fn test_pool_snapshot_reflects_records() {
    let mut cluster = InMemoryCluster::new();
    cluster.add_worker("w1", 100.0);
    cluster.set_cost(OperationKind::Mitigation, 2.0);
    let mut pool = ResourcePool::new(
        "shard",
        PoolLimits {
            usage_fraction: 0.5,
            host_reservation: 0.0,
        },
    );
    pool.deploy(&mut cluster, 5, &TaskKey::new(OperationKind::Mitigation, "t"));

    let snap = PoolSnapshot::capture(&pool, &cluster);
    assert_eq!(snap.name, "shard");
    assert!((snap.ceiling - 50.0).abs() < 1e-9);
    assert!((snap.used - 10.0).abs() < 1e-9);
    assert!((snap.available - 40.0).abs() < 1e-9);
    assert_eq!(snap.records, 1);
    assert_eq!(snap.threads, 5);

    let json = serde_json::to_value(&snap).unwrap();
    assert_eq!(json["threads"], 5);
}

#[test]
fn test_queue_snapshot_and_health() {
    let cluster = InMemoryCluster::new();
    cluster.add_worker("w1", 10.0);
    let controller = controller(cluster);
    let mut scheduler = TaskScheduler::new(SchedulerLimits::default());

    assert!(!health(&scheduler, &controller).ok);

    scheduler.seed([("print", TaskKind::QueueReport)], 5_000);
    let queue = list_queue(&scheduler, 2_000);
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].due_in_ms, 3_000);

    let h = health(&scheduler, &controller);
    assert!(h.ok);
    assert_eq!(h.pools, 1);
    assert_eq!(h.eligible_workers, 1);
    assert_eq!(list_pools(&controller)[0].records, 0);
}

#[tokio::test(start_paused = true)]
async fn test_driver_tick_follows_clock() {
    let clock = ManualClock::new(0);
    let mut scheduler = TaskScheduler::new(SchedulerLimits::default());
    scheduler.seed([("print", TaskKind::QueueReport)], 3_000);
    let mut driver = Driver::new(scheduler, controller(InMemoryCluster::new()), clock.clone());

    assert_eq!(
        driver.tick().await,
        Step::Wait {
            wait_ms: 3_000,
            shared: 0
        }
    );
    clock.set(3_000);
    assert!(matches!(driver.tick().await, Step::Dispatched { .. }));
    assert_eq!(driver.dispatched(), 1);

    let (scheduler, _controller) = driver.into_parts();
    assert_eq!(scheduler.queue()[0].due_at_ms, 63_000);
}

#[tokio::test(start_paused = true)]
async fn test_driver_runs_until_deadline() {
    let mut scheduler = TaskScheduler::new(SchedulerLimits::default());
    scheduler.seed([("print", TaskKind::QueueReport)], 0);
    let mut driver = Driver::new(
        scheduler,
        controller(InMemoryCluster::new()),
        TokioClock::starting_at(0),
    );
    driver.handler_mut().cluster_mut().add_worker("w1", 32.0);

    driver.run_until(130_000).await;

    // reports at 0, 60s and 120s
    assert_eq!(driver.dispatched(), 3);
    assert_eq!(driver.scheduler().queue()[0].due_at_ms, 180_000);
    assert_eq!(health(driver.scheduler(), driver.handler()).eligible_workers, 1);
}
