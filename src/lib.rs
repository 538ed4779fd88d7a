//! # minidfs
//!
//! Client-side coordination for a Raft-replicated, chunked file store:
//! - Leader discovery with a versioned leader cache
//! - Chunk writes routed to the leader, stale leaders detected via HTTP 307
//! - 1 MiB chunked uploads, in order, fail-fast
//! - Downloads with per-chunk fallback across nodes and in-order reassembly
//! - Parallel per-node role polling into a cluster snapshot
//!
//! ## Architecture
//!
//! ```text
//!                 ┌───────────────────────┐
//!                 │       DfsClient       │
//!                 └───┬────────┬──────┬───┘
//!                     │        │      │
//!        ┌────────────▼──┐     │   ┌──▼─────────────────────┐
//!        │ ChunkTransfer │     │   │ ClusterHealthAggregator│
//!        │    Engine     │     │   └──┬─────────────────────┘
//!        └──┬─────────┬──┘     │      │
//!           │  ┌──────▼────────▼──┐   │
//!           │  │  LeaderLocator   │   │
//!           │  │  (LeaderCache)   │   │
//!           │  └──────┬───────────┘   │
//!        ┌──▼─────────▼───────────────▼──┐
//!        │ NodeRegistry + HttpTransport  │
//!        └──┬────────────┬────────────┬──┘
//!           │ HTTP       │            │
//!       ┌───▼────┐  ┌────▼───┐   ┌────▼───┐
//!       │ node 1 │  │ node 2 │   │ node 3 │
//!       └────────┘  └────────┘   └────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Cluster roles
//! minidfs --nodes http://localhost:8081,http://localhost:8082 status
//!
//! # Upload / download
//! minidfs upload ./report.pdf --file-id report
//! minidfs download report --chunks 1,2,3 --output ./report.pdf
//! ```

pub mod client;
pub mod common;

// Re-export commonly used types
pub use client::DfsClient;
pub use common::{Config, Error, Result};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
