//! Cluster client
//!
//! The client is responsible for:
//! - Locating and caching the Raft leader
//! - Routing chunk writes to the leader
//! - Chunked upload and multi-node download fallback
//! - Point-in-time cluster health snapshots

pub mod health;
pub mod leader;
pub mod registry;
pub mod transfer;
pub mod transport;

pub use health::{ClusterHealthAggregator, ClusterSnapshot, NodeHealth, NodeStatus};
pub use leader::{CachedLeader, LeaderCache, LeaderLocator};
pub use registry::NodeRegistry;
pub use transfer::{
    parse_chunk_sequences, Chunk, ChunkTransferEngine, DownloadReport, TransferJob,
    TransferProgress, TransferState, UploadReport, CHUNK_SIZE,
};
pub use transport::{HttpTransport, RaftRole};

use bytes::Bytes;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{Config, Result};

/// Entry point wiring the registry, locator, transfer engine and health aggregator
pub struct DfsClient {
    registry: Arc<NodeRegistry>,
    locator: Arc<LeaderLocator>,
    transfers: ChunkTransferEngine,
    health: ClusterHealthAggregator,
}

impl DfsClient {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(NodeRegistry::new(&config.nodes)?);
        let transport = HttpTransport::new(config.timeouts.clone())?;

        tracing::debug!(nodes = ?registry.endpoints(), "Client configured");

        let locator = Arc::new(LeaderLocator::new(registry.clone(), transport.clone()));
        let transfers =
            ChunkTransferEngine::new(registry.clone(), locator.clone(), transport.clone());
        let health = ClusterHealthAggregator::new(registry.clone(), transport);

        Ok(Self {
            registry,
            locator,
            transfers,
            health,
        })
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn locator(&self) -> &LeaderLocator {
        &self.locator
    }

    pub fn transfers(&self) -> &ChunkTransferEngine {
        &self.transfers
    }

    pub async fn resolve_leader(&self) -> Option<String> {
        self.locator.resolve_leader().await
    }

    pub async fn upload_file(&self, file_id: &str, data: Bytes) -> Result<UploadReport> {
        self.transfers.upload_file(file_id, data).await
    }

    pub async fn upload_file_with_progress<F>(
        &self,
        file_id: &str,
        data: Bytes,
        on_progress: F,
    ) -> Result<UploadReport>
    where
        F: FnMut(TransferProgress),
    {
        self.transfers
            .upload_file_with_progress(file_id, data, on_progress)
            .await
    }

    pub async fn download_file(&self, file_id: &str, sequences: &[u64]) -> Result<DownloadReport> {
        self.transfers.download_file(file_id, sequences).await
    }

    pub async fn download_file_with_progress<F>(
        &self,
        file_id: &str,
        sequences: &[u64],
        on_progress: F,
    ) -> Result<DownloadReport>
    where
        F: FnMut(TransferProgress),
    {
        self.transfers
            .download_file_with_progress(file_id, sequences, on_progress)
            .await
    }

    pub async fn cluster_snapshot(&self) -> ClusterSnapshot {
        self.health.snapshot().await
    }

    pub async fn watch_cluster<F>(&self, period: Duration, on_snapshot: F)
    where
        F: FnMut(ClusterSnapshot) -> ControlFlow<()>,
    {
        self.health.watch(period, on_snapshot).await
    }
}
