//! Cluster snapshot polling against mock nodes

mod common;

use common::{client, client_with_timeout, dead_endpoint, dead_endpoints, MockNode};
use minidfs::client::{NodeStatus, RaftRole};
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_snapshot_matches_registry_order() {
    let a = dead_endpoint();
    let b = MockNode::spawn("FOLLOWER").await;
    let c = MockNode::spawn("LEADER").await;
    let client = client(&[&a, &b.url, &c.url]);

    let snapshot = client.cluster_snapshot().await;
    let rows: Vec<(&str, RaftRole, NodeStatus)> = snapshot
        .iter()
        .map(|n| (n.endpoint.as_str(), n.role, n.status))
        .collect();

    assert_eq!(
        rows,
        vec![
            (a.as_str(), RaftRole::Unknown, NodeStatus::Down),
            (b.url.as_str(), RaftRole::Follower, NodeStatus::Up),
            (c.url.as_str(), RaftRole::Leader, NodeStatus::Up),
        ]
    );
    assert_eq!(snapshot.leader().map(|n| n.endpoint.clone()), Some(c.url.clone()));
    assert_eq!(client.resolve_leader().await, Some(c.url.clone()));
}

#[tokio::test]
async fn test_unreachable_cluster_still_reports_every_node() {
    let nodes = dead_endpoints(4);
    let client = client(&nodes);

    let snapshot = client.cluster_snapshot().await;
    assert_eq!(snapshot.len(), 4);
    assert_eq!(snapshot.up_count(), 0);
    assert!(snapshot.leader().is_none());
    for node in snapshot.iter() {
        assert_eq!(node.role, RaftRole::Unknown);
        assert_eq!(node.status, NodeStatus::Down);
    }
}

#[tokio::test]
async fn test_probes_run_concurrently() {
    let mut nodes = Vec::new();
    for _ in 0..3 {
        let node = MockNode::spawn("FOLLOWER").await;
        node.set_delay(Duration::from_secs(5));
        nodes.push(node);
    }
    let fast = MockNode::spawn("LEADER").await;
    let mut urls: Vec<&str> = nodes.iter().map(|n| n.url.as_str()).collect();
    urls.push(&fast.url);
    let client = client_with_timeout(&urls, Duration::from_millis(400));

    let start = Instant::now();
    let snapshot = client.cluster_snapshot().await;
    let elapsed = start.elapsed();

    // sequential probing would need at least 3 x 400ms
    assert!(elapsed < Duration::from_millis(1_000), "took {:?}", elapsed);
    assert_eq!(snapshot.len(), 4);
    assert_eq!(snapshot.up_count(), 1);
    assert_eq!(snapshot.nodes[3].role, RaftRole::Leader);
}

#[tokio::test]
async fn test_candidate_counts_as_up() {
    let a = MockNode::spawn("CANDIDATE").await;
    let b = MockNode::spawn("garbage").await;
    let client = client(&[&a.url, &b.url]);

    let snapshot = client.cluster_snapshot().await;
    assert_eq!(snapshot.nodes[0].role, RaftRole::Candidate);
    assert_eq!(snapshot.nodes[0].status, NodeStatus::Up);
    assert_eq!(snapshot.nodes[1].role, RaftRole::Unknown);
    assert_eq!(snapshot.nodes[1].status, NodeStatus::Down);
}

#[tokio::test]
async fn test_watch_polls_until_break() {
    let a = MockNode::spawn("LEADER").await;
    let client = client(&[&a.url]);

    let mut seen = 0;
    client
        .watch_cluster(Duration::from_millis(20), |snapshot| {
            assert_eq!(snapshot.len(), 1);
            seen += 1;
            if seen == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await;

    assert_eq!(seen, 3);
    assert_eq!(a.role_probes(), 3);
}

#[tokio::test]
async fn test_snapshot_serializes_for_display() {
    let a = MockNode::spawn("FOLLOWER").await;
    let client = client(&[&a.url]);

    let snapshot = client.cluster_snapshot().await;
    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["nodes"][0]["endpoint"], a.url.as_str());
    assert_eq!(json["nodes"][0]["role"], "FOLLOWER");
    assert_eq!(json["nodes"][0]["status"], "UP");
    assert!(json["taken_at"].is_string());
}
