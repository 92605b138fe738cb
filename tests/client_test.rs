mod common;

use common::{spawn_member, FakeMember};
use rediscluster_inspect::client::ProtocolClient;
use rediscluster_inspect::resp::RespValue;
use rediscluster_inspect::QueryError;
use std::time::Duration;

#[tokio::test]
async fn query_sequence_returns_every_reply() {
    let member = FakeMember::healthy("10.0.0.1", vec![(0, 16383, vec!["10.0.0.1"])]);
    let port = spawn_member(member).await;

    let mut client = ProtocolClient::connect(port, Duration::from_secs(2)).await.unwrap();
    let replies = client.query_all().await.unwrap();

    assert_eq!(replies.key_count, 42);
    assert!(replies.cluster_info.contains("cluster_state:ok"));
    assert!(replies.info.contains("uptime_in_seconds:3725"));
    assert!(replies.nodes.contains("myself,master"));
    match &replies.slots {
        RespValue::Array(entries) => assert_eq!(entries.len(), 1),
        other => panic!("unexpected slots reply {:?}", other),
    }
}

#[tokio::test]
async fn error_reply_is_a_command_failure() {
    let member = FakeMember {
        failing: Some("CLUSTER SLOTS"),
        ..FakeMember::healthy("10.0.0.1", vec![])
    };
    let port = spawn_member(member).await;

    let mut client = ProtocolClient::connect(port, Duration::from_secs(2)).await.unwrap();
    match client.query_all().await {
        Err(QueryError::Command { command, message }) => {
            assert_eq!(command, "CLUSTER SLOTS");
            assert!(message.contains("cluster support disabled"));
        }
        other => panic!("expected a command failure, got {:?}", other),
    }
}

#[tokio::test]
async fn closed_port_is_unreachable() {
    let port = rediscluster_inspect::tunnel::allocate_local_port().unwrap();
    let result = ProtocolClient::connect(port, Duration::from_secs(1)).await;
    assert!(matches!(result, Err(QueryError::Unreachable(_))));
}

#[tokio::test]
async fn silent_member_fails_the_ping_check() {
    let member = FakeMember {
        silent: true,
        ..Default::default()
    };
    let port = spawn_member(member).await;

    let result = ProtocolClient::connect(port, Duration::from_millis(200)).await;
    assert!(matches!(result, Err(QueryError::Unreachable(_))));
}

#[tokio::test]
async fn member_hanging_after_ping_hits_the_query_deadline() {
    let member = FakeMember {
        hang_on: Some("CLUSTER SLOTS"),
        ..FakeMember::healthy("10.0.0.1", vec![(0, 16383, vec!["10.0.0.1"])])
    };
    let port = spawn_member(member).await;
    let deadline = Duration::from_millis(300);

    let mut client = ProtocolClient::connect(port, deadline).await.unwrap();
    let started = std::time::Instant::now();
    match client.query_all().await {
        Err(QueryError::Timeout { command, timeout }) => {
            assert_eq!(command, "CLUSTER SLOTS");
            assert_eq!(timeout, deadline);
        }
        other => panic!("expected a query timeout, got {:?}", other),
    }
    assert!(started.elapsed() >= deadline);
}
