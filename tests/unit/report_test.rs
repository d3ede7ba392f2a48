//! Tests for status sinks

use cluster_dispatch::core::{
    build_status_line, InMemoryStatusSink, StatusSink, TracingStatusSink,
};

#[test]
fn test_in_memory_sink_keeps_latest_lines() {
    let mut sink = InMemoryStatusSink::new(2);
    for n in 0..3 {
        sink.report(build_status_line("shard_hack", format!("line {n}")));
    }
    assert_eq!(sink.messages(), vec!["line 1".to_string(), "line 2".to_string()]);
    assert!(sink.lines().iter().all(|l| l.source == "shard_hack"));
}

#[test]
fn test_boxed_sinks_forward() {
    let mut sinks: Vec<Box<dyn StatusSink>> = vec![
        Box::new(TracingStatusSink),
        Box::new(InMemoryStatusSink::new(1)),
    ];
    for sink in &mut sinks {
        sink.report(build_status_line("scheduler", "Waiting for tasks in [] seconds."));
    }
}
