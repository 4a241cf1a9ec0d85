use std::time::Duration;

use chrono::{DateTime, Utc};
use objdb_store::PluginStorage;
use serde::{Deserialize, Serialize};

use crate::error::CoordinatorError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkerRecord {
    worker_id: String,
    last_heartbeat: DateTime<Utc>,
}

/// Tracks worker liveness under `workers/<workerId>` with TTL
/// `heartbeatTTL`. The coordinator uses this to release tickets claimed by
/// workers whose heartbeat has gone stale during recovery.
pub struct WorkerRegistry {
    storage: PluginStorage,
    heartbeat_ttl: Duration,
}

impl WorkerRegistry {
    pub fn new(storage: PluginStorage, heartbeat_ttl: Duration) -> Self {
        WorkerRegistry { storage: storage.namespaced("workers"), heartbeat_ttl }
    }

    pub async fn heartbeat(&self, worker_id: &str) -> Result<(), CoordinatorError> {
        let record = WorkerRecord { worker_id: worker_id.to_string(), last_heartbeat: Utc::now() };
        self.storage.put_json(&[worker_id], &record, Some(self.heartbeat_ttl)).await?;
        Ok(())
    }

    /// `true` iff the worker registry has no live (unexpired) entry for
    /// this worker — the condition under which a recovery pass should
    /// release tickets it was holding.
    pub async fn is_stale(&self, worker_id: &str) -> Result<bool, CoordinatorError> {
        Ok(self.storage.get_json::<WorkerRecord>(&[worker_id]).await?.is_none())
    }

    pub async fn active_workers(&self) -> Result<Vec<String>, CoordinatorError> {
        let keys = self.storage.list_keys(&[]).await?;
        Ok(keys.into_iter().filter_map(|k| k.rsplit('/').next().map(str::to_string)).collect())
    }
}
