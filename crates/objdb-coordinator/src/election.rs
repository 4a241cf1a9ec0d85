use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use objdb_store::{Lease, PluginStorage};
use objdb_types::{PluginEvent, PluginEventBus};
use tokio::sync::RwLock;

use crate::error::CoordinatorError;

/// Single-coordinator leader election over one lease key, with epoch
/// renewal every `work_interval`. Backs both the queue's coordinator
/// participant and the inventory engine's per-cluster sync lease — the
/// same primitive at different keys/TTLs.
pub struct Coordinator {
    lease: Lease,
    lease_key: String,
    worker_id: String,
    ttl: Duration,
    is_leader: AtomicBool,
    epoch: AtomicU64,
    became_leader_at: RwLock<Option<chrono::DateTime<chrono::Utc>>>,
    event_bus: PluginEventBus,
}

impl Coordinator {
    pub fn new(storage: PluginStorage, lease_key: impl Into<String>, worker_id: impl Into<String>, ttl: Duration) -> Self {
        Coordinator {
            lease: Lease::new(storage),
            lease_key: lease_key.into(),
            worker_id: worker_id.into(),
            ttl,
            is_leader: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            became_leader_at: RwLock::new(None),
            event_bus: PluginEventBus::new(),
        }
    }

    /// Subscribes this coordinator's `coordinator-elected` emissions to a
    /// shared bus. Defaults to an unsubscribed, private bus so existing
    /// callers are unaffected.
    pub fn with_event_bus(mut self, bus: PluginEventBus) -> Self {
        self.event_bus = bus;
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::SeqCst)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub async fn became_leader_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        *self.became_leader_at.read().await
    }

    /// Attempts to acquire or renew leadership. Returns the new leadership
    /// state (`true` iff this worker is the coordinator after the call).
    pub async fn tick(&self) -> Result<bool, CoordinatorError> {
        let was_leader = self.is_leader();
        let acquired = if was_leader {
            self.lease.renew(&self.lease_key, &self.worker_id, self.ttl).await?
        } else {
            self.lease.acquire(&self.lease_key, &self.worker_id, self.ttl).await?
        };

        if acquired && !was_leader {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            *self.became_leader_at.write().await = Some(chrono::Utc::now());
            tracing::info!(lease_key = %self.lease_key, worker = %self.worker_id, epoch = self.epoch(), "coordinator-elected");
            self.event_bus.emit(PluginEvent::CoordinatorElected {
                lease_key: self.lease_key.clone(),
                worker_id: self.worker_id.clone(),
            });
        }
        if !acquired && was_leader {
            tracing::info!(lease_key = %self.lease_key, worker = %self.worker_id, "coordinator-demoted");
        }
        self.is_leader.store(acquired, Ordering::SeqCst);
        Ok(acquired)
    }

    pub async fn resign(&self) -> Result<(), CoordinatorError> {
        if self.is_leader() {
            self.lease.release(&self.lease_key, &self.worker_id).await?;
            self.is_leader.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    pub async fn current_leader(&self) -> Result<Option<String>, CoordinatorError> {
        Ok(self.lease.current_holder(&self.lease_key).await?)
    }
}

pub fn new_coordinator(
    storage: PluginStorage,
    lease_key: impl Into<String>,
    worker_id: impl Into<String>,
    ttl: Duration,
) -> Arc<Coordinator> {
    Arc::new(Coordinator::new(storage, lease_key, worker_id, ttl))
}
