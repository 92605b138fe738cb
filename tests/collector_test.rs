mod common;

use common::{short_timeouts, spawn_member, CountingForwarder, FakeMember, RoutedForwarder};
use rediscluster_inspect::types::Candidate;
use rediscluster_inspect::{Collector, InspectError, QueryError, TunnelLog};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

#[test_log::test(tokio::test)]
async fn one_result_per_candidate_despite_a_delayed_failure() {
    let slots = vec![(0, 16383, vec!["10.0.0.1"])];
    let first = spawn_member(FakeMember::healthy("10.0.0.1", slots.clone())).await;
    let second = spawn_member(FakeMember::healthy("10.0.0.2", slots)).await;

    let forwarder = RoutedForwarder::new()
        .route("10.0.0.1", first)
        .route("10.0.0.2", second)
        .stall("10.0.0.3");
    let collector = Collector::new(Arc::new(forwarder), short_timeouts());

    let candidates = vec![
        Candidate::new("redis-0", "10.0.0.1"),
        Candidate::new("redis-1", "10.0.0.2"),
        Candidate::new("redis-2", "10.0.0.3"),
    ];
    let started = Instant::now();
    let results = collector.collect(candidates).await;

    assert_eq!(results.len(), 3);
    assert!(started.elapsed() >= short_timeouts().tunnel.ready_timeout);

    let failed: Vec<_> = results.iter().filter(|r| !r.is_ok()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].candidate.name, "redis-2");
    assert!(failed[0].error().unwrap().is_timeout());

    for result in results.iter().filter(|r| r.is_ok()) {
        let snapshot = result.snapshot().unwrap();
        assert_eq!(snapshot.slots.len(), 1);
        assert_eq!(snapshot.roster.self_role(), "master");
        assert_eq!(snapshot.stats.key_count(), "42");
    }
}

#[test_log::test(tokio::test)]
async fn unroutable_candidates_fail_independently() {
    let port = spawn_member(FakeMember::healthy("10.0.0.1", vec![(0, 100, vec!["10.0.0.1"])])).await;
    let forwarder = RoutedForwarder::new().route("10.0.0.1", port);
    let collector = Collector::new(Arc::new(forwarder), short_timeouts());

    let results = collector
        .collect(vec![Candidate::new("redis-0", "10.0.0.1"), Candidate::new("ghost", "10.9.9.9")])
        .await;

    assert_eq!(results.len(), 2);
    let ghost = results.iter().find(|r| r.candidate.name == "ghost").unwrap();
    assert!(ghost.snapshot().is_none());
    assert!(ghost.error().is_some());
    assert!(results.iter().any(|r| r.candidate.name == "redis-0" && r.is_ok()));
}

#[tokio::test]
async fn relay_diagnostics_reach_the_sink() {
    let port = spawn_member(FakeMember::healthy("10.0.0.1", vec![(0, 100, vec!["10.0.0.1"])])).await;
    let forwarder = RoutedForwarder::new().route("10.0.0.1", port);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let collector = Collector::new(Arc::new(forwarder), short_timeouts()).with_log(TunnelLog::Sink(tx));

    let results = collector.collect(vec![Candidate::new("redis-0", "10.0.0.1")]).await;
    assert!(results[0].is_ok());

    let first = rx.recv().await.unwrap();
    assert!(first.starts_with("redis-0: Forwarding from 127.0.0.1:"), "{}", first);
}

#[test_log::test(tokio::test)]
async fn tunnel_is_closed_after_a_query_error() {
    let member = FakeMember {
        failing: Some("CLUSTER NODES"),
        ..FakeMember::healthy("10.0.0.1", vec![(0, 16383, vec!["10.0.0.1"])])
    };
    let port = spawn_member(member).await;
    let (forwarder, exits) = CountingForwarder::new(RoutedForwarder::new().route("10.0.0.1", port));
    let collector = Collector::new(Arc::new(forwarder), short_timeouts());

    let results = collector.collect(vec![Candidate::new("redis-0", "10.0.0.1")]).await;

    assert_eq!(results.len(), 1);
    match results[0].error() {
        Some(InspectError::Query(QueryError::Command { command, .. })) => {
            assert_eq!(command, "CLUSTER NODES")
        }
        other => panic!("expected a command failure, got {:?}", other),
    }
    assert_eq!(exits.load(Ordering::SeqCst), 1);
}
