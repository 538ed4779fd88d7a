//! Leader discovery and caching
//!
//! The cached leader is the only mutable state shared between operations. It
//! lives in a versioned single-slot cell: every store bumps the version and
//! invalidation only clears the slot if the caller saw the current version,
//! so a late failure report about an old leader cannot evict a newer one.

use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::client::registry::NodeRegistry;
use crate::client::transport::{HttpTransport, RaftRole};

/// A leader endpoint together with the cache version it was read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedLeader {
    pub endpoint: String,
    pub version: u64,
}

#[derive(Debug, Default)]
struct Slot {
    endpoint: Option<String>,
    version: u64,
}

/// Single-slot, versioned leader cell with compare-and-invalidate
#[derive(Debug, Default)]
pub struct LeaderCache {
    slot: Mutex<Slot>,
}

impl LeaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // The slot is always left consistent, a poisoned lock is still usable.
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self) -> Option<CachedLeader> {
        let slot = self.lock();
        slot.endpoint.as_ref().map(|endpoint| CachedLeader {
            endpoint: endpoint.clone(),
            version: slot.version,
        })
    }

    pub fn store(&self, endpoint: &str) -> CachedLeader {
        let mut slot = self.lock();
        slot.version += 1;
        slot.endpoint = Some(endpoint.to_string());
        CachedLeader {
            endpoint: endpoint.to_string(),
            version: slot.version,
        }
    }

    /// Clear the slot if it still holds `seen`. Returns whether it did.
    pub fn invalidate_if(&self, seen: &CachedLeader) -> bool {
        let mut slot = self.lock();
        if slot.version == seen.version && slot.endpoint.as_deref() == Some(&seen.endpoint) {
            slot.endpoint = None;
            slot.version += 1;
            true
        } else {
            false
        }
    }

    pub fn clear(&self) {
        let mut slot = self.lock();
        if slot.endpoint.take().is_some() {
            slot.version += 1;
        }
    }

    pub fn version(&self) -> u64 {
        self.lock().version
    }
}

/// Answers "which endpoint should receive the next write?"
pub struct LeaderLocator {
    registry: Arc<NodeRegistry>,
    transport: HttpTransport,
    cache: LeaderCache,
}

impl LeaderLocator {
    pub fn new(registry: Arc<NodeRegistry>, transport: HttpTransport) -> Self {
        Self {
            registry,
            transport,
            cache: LeaderCache::new(),
        }
    }

    /// Current leader endpoint, or `None` when no node answers LEADER.
    pub async fn resolve_leader(&self) -> Option<String> {
        self.resolve().await.map(|leader| leader.endpoint)
    }

    /// Like [`resolve_leader`](Self::resolve_leader) but keeps the cache
    /// version so the caller can invalidate exactly what it used.
    pub async fn resolve(&self) -> Option<CachedLeader> {
        let timeout = self.transport.timeouts().leader_probe();

        if let Some(cached) = self.cache.get() {
            let role = self.transport.probe_role(&cached.endpoint, timeout).await;
            if role.is_leader() {
                return Some(cached);
            }
            warn!(
                endpoint = %cached.endpoint,
                role = %role,
                "Cached leader no longer leads, rediscovering"
            );
            self.cache.invalidate_if(&cached);
        }

        self.discover().await
    }

    /// Scan the registry in order; the first LEADER wins.
    async fn discover(&self) -> Option<CachedLeader> {
        let timeout = self.transport.timeouts().leader_probe();

        for endpoint in self.registry.iter() {
            match self.transport.probe_role(endpoint, timeout).await {
                RaftRole::Leader => {
                    info!(endpoint, "Discovered leader");
                    return Some(self.cache.store(endpoint));
                }
                role => debug!(endpoint, role = %role, "Not leader"),
            }
        }

        warn!(nodes = self.registry.len(), "No leader available");
        None
    }

    pub fn invalidate(&self, seen: &CachedLeader) -> bool {
        let cleared = self.cache.invalidate_if(seen);
        if cleared {
            debug!(endpoint = %seen.endpoint, "Invalidated cached leader");
        }
        cleared
    }

    pub fn cached_leader(&self) -> Option<String> {
        self.cache.get().map(|leader| leader.endpoint)
    }

    pub fn cache(&self) -> &LeaderCache {
        &self.cache
    }
}
