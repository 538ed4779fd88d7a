//! Cluster health snapshots
//!
//! Every node is probed concurrently with its own timeout. A slow or dead node
//! only affects its own entry, and the snapshot is returned in registry order
//! once every probe has settled.

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::client::registry::NodeRegistry;
use crate::client::transport::{HttpTransport, RaftRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeStatus {
    Up,
    Down,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Up => write!(f, "UP"),
            NodeStatus::Down => write!(f, "DOWN"),
        }
    }
}

/// One node as seen by one poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeHealth {
    pub endpoint: String,
    pub role: RaftRole,
    pub status: NodeStatus,
}

impl NodeHealth {
    pub fn from_role(endpoint: &str, role: RaftRole) -> Self {
        let status = if role.is_known() {
            NodeStatus::Up
        } else {
            NodeStatus::Down
        };
        Self {
            endpoint: endpoint.to_string(),
            role,
            status,
        }
    }

    pub fn reachable(&self) -> bool {
        self.status == NodeStatus::Up
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterSnapshot {
    pub taken_at: DateTime<Utc>,
    pub nodes: Vec<NodeHealth>,
}

impl ClusterSnapshot {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeHealth> {
        self.nodes.iter()
    }

    /// First node reporting LEADER, in registry order
    pub fn leader(&self) -> Option<&NodeHealth> {
        self.nodes.iter().find(|n| n.role.is_leader())
    }

    pub fn up_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.reachable()).count()
    }
}

pub struct ClusterHealthAggregator {
    registry: Arc<NodeRegistry>,
    transport: HttpTransport,
}

impl ClusterHealthAggregator {
    pub fn new(registry: Arc<NodeRegistry>, transport: HttpTransport) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Probe every node at once; one entry per registry node, in order.
    pub async fn snapshot(&self) -> ClusterSnapshot {
        let timeout = self.transport.timeouts().role_probe();
        let probes = self.registry.iter().map(|endpoint| async move {
            let role = self.transport.probe_role(endpoint, timeout).await;
            NodeHealth::from_role(endpoint, role)
        });

        let nodes = join_all(probes).await;
        let snapshot = ClusterSnapshot {
            taken_at: Utc::now(),
            nodes,
        };
        debug!(
            nodes = snapshot.len(),
            up = snapshot.up_count(),
            leader = ?snapshot.leader().map(|n| n.endpoint.as_str()),
            "Cluster snapshot"
        );
        snapshot
    }

    /// Take a snapshot every `period` until `on_snapshot` breaks.
    pub async fn watch<F>(&self, period: Duration, mut on_snapshot: F)
    where
        F: FnMut(ClusterSnapshot) -> ControlFlow<()>,
    {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if on_snapshot(self.snapshot().await).is_break() {
                break;
            }
        }
    }
}
