use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use objdb_resource::Resource;
use objdb_store::{Lease, PluginStorage};
use objdb_types::{InventoryChange, InventoryItem, InventorySnapshot, InventoryVersion, KeyDiff, SyncStatus, UpdatedValue};
use objdb_util::new_id;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::InventoryError;
use crate::filter::InventoryFilter;
use crate::schema::{change_to_fields, fields_to_snapshot, fields_to_version, snapshot_to_fields, version_to_fields};
use crate::source::ClusterSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterSyncStatus {
    Idle,
    Running,
    Error,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncCounters {
    pub processed: u64,
    pub created: u64,
    pub unchanged: u64,
    pub updated: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    pub cluster_id: String,
    pub status: ClusterSyncStatus,
    pub last_run_at: Option<chrono::DateTime<Utc>>,
    pub last_result: Option<String>,
    pub checkpoint: Option<String>,
    pub counters: SyncCounters,
}

impl SyncSummary {
    fn idle(cluster_id: &str) -> Self {
        SyncSummary {
            cluster_id: cluster_id.to_string(),
            status: ClusterSyncStatus::Idle,
            last_run_at: None,
            last_result: None,
            checkpoint: None,
            counters: SyncCounters::default(),
        }
    }
}

/// Top-level-keys-only diff: arrays and scalars compare by value equality,
/// objects recurse one level only (a key-level diff using deep equality on
/// values).
fn key_diff(old: &Value, new: &Value) -> KeyDiff {
    let mut diff = KeyDiff::default();
    let empty = serde_json::Map::new();
    let old_map = old.as_object().unwrap_or(&empty);
    let new_map = new.as_object().unwrap_or(&empty);

    for (key, new_value) in new_map {
        match old_map.get(key) {
            None => {
                diff.added.insert(key.clone(), new_value.clone());
            }
            Some(old_value) if old_value != new_value => {
                diff.updated.insert(key.clone(), UpdatedValue { old: old_value.clone(), new: new_value.clone() });
            }
            _ => {}
        }
    }
    for (key, old_value) in old_map {
        if !new_map.contains_key(key) {
            diff.removed.insert(key.clone(), old_value.clone());
        }
    }
    diff
}

/// Normalizes driver-discovered items into versioned snapshots with a
/// key-level drift diff, and drives the per-cluster sync lease.
pub struct InventoryEngine {
    snapshots: Arc<Resource>,
    versions: Arc<Resource>,
    changes: Arc<Resource>,
    lease: Lease,
    summaries: PluginStorage,
    worker_id: String,
}

impl InventoryEngine {
    pub fn new(
        snapshots: Arc<Resource>,
        versions: Arc<Resource>,
        changes: Arc<Resource>,
        storage: PluginStorage,
        worker_id: impl Into<String>,
    ) -> Self {
        InventoryEngine {
            snapshots,
            versions,
            changes,
            lease: Lease::new(storage.namespaced("sync-leases")),
            summaries: storage.namespaced("summaries"),
            worker_id: worker_id.into(),
        }
    }

    /// Computes `digest = SHA256(stableJSON(configuration))`, then inserts,
    /// touches, or versions-and-diffs the snapshot at
    /// `<cluster>::<type>::<namespace|'cluster'>::<resourceId>`.
    pub async fn persist_snapshot(&self, item: &InventoryItem) -> Result<SyncStatus, InventoryError> {
        let digest = objdb_util::content_digest(&item.configuration);
        let key = item.snapshot_key();
        let now = Utc::now();

        let Some(existing) = self.snapshots.get_or_null(&key).await? else {
            let snapshot = InventorySnapshot {
                id: key.clone(),
                latest_digest: digest.clone(),
                latest_version: 1,
                changelog_size: 0,
                first_seen_at: now,
                last_seen_at: now,
                labels: item.labels.clone(),
                annotations: item.annotations.clone(),
            };
            self.snapshots.insert(snapshot_to_fields(&snapshot, &item.cluster_id, &item.resource_type)?).await?;
            let version = InventoryVersion {
                snapshot_id: key.clone(),
                version: 1,
                digest,
                captured_at: now,
                configuration: item.configuration.clone(),
                raw: item.raw.clone(),
            };
            self.versions.insert(version_to_fields(&version_id(&key, 1), &version)?).await?;
            debug!(snapshot = %key, "inventory item created");
            return Ok(SyncStatus::Created);
        };

        let existing = fields_to_snapshot(&existing.data)?;
        if existing.latest_digest == digest {
            self.snapshots
                .patch(&key, HashMap::from([("last_seen_at".to_string(), Value::String(now.to_rfc3339()))]))
                .await?;
            return Ok(SyncStatus::Unchanged);
        }

        let new_version_no = existing.latest_version + 1;
        let previous = self
            .versions
            .get_or_null(&version_id(&key, existing.latest_version))
            .await?
            .map(|r| fields_to_version(&r.data))
            .transpose()?;
        let previous_config = previous.map(|v| v.configuration).unwrap_or(Value::Null);
        let diff = key_diff(&previous_config, &item.configuration);

        let version = InventoryVersion {
            snapshot_id: key.clone(),
            version: new_version_no,
            digest: digest.clone(),
            captured_at: now,
            configuration: item.configuration.clone(),
            raw: item.raw.clone(),
        };
        self.versions.insert(version_to_fields(&version_id(&key, new_version_no), &version)?).await?;

        let change = InventoryChange {
            cluster_id: item.cluster_id.clone(),
            resource_type: item.resource_type.clone(),
            resource_id: item.resource_id.clone(),
            from_version: existing.latest_version,
            to_version: new_version_no,
            diff,
        };
        self.changes.insert(change_to_fields(&new_id(), &change)?).await?;

        self.snapshots
            .patch(
                &key,
                HashMap::from([
                    ("latest_digest".to_string(), Value::String(digest)),
                    ("latest_version".to_string(), Value::Number(new_version_no.into())),
                    ("changelog_size".to_string(), Value::Number((existing.changelog_size + 1).into())),
                    ("labels".to_string(), serde_json::to_value(&item.labels)?),
                    ("annotations".to_string(), serde_json::to_value(&item.annotations)?),
                    ("last_seen_at".to_string(), Value::String(now.to_rfc3339())),
                ]),
            )
            .await?;
        info!(snapshot = %key, version = new_version_no, "inventory item updated");
        Ok(SyncStatus::Updated)
    }

    pub async fn summary(&self, cluster_id: &str) -> Result<SyncSummary, InventoryError> {
        Ok(self
            .summaries
            .get_json::<SyncSummary>(&[cluster_id])
            .await?
            .map(|(s, _)| s)
            .unwrap_or_else(|| SyncSummary::idle(cluster_id)))
    }

    async fn write_summary(&self, summary: &SyncSummary) -> Result<(), InventoryError> {
        self.summaries.put_json(&[&summary.cluster_id], summary, None).await?;
        Ok(())
    }

    /// Runs one full discovery pass for `cluster_id`, guarded by the
    /// `k8s-inventory-sync-<clusterId>` lease. `lock_timeout` of zero means
    /// try-once: a held lease aborts the sync immediately rather than
    /// waiting.
    pub async fn sync(
        &self,
        source: &dyn ClusterSource,
        filter: &InventoryFilter,
        lock_ttl: Duration,
        lock_timeout: Duration,
    ) -> Result<SyncSummary, InventoryError> {
        let cluster_id = source.cluster_id().to_string();
        let lease_key = format!("k8s-inventory-sync-{cluster_id}");

        if !self.acquire_with_wait(&lease_key, lock_ttl, lock_timeout).await? {
            return Err(InventoryError::LockTimeout(lock_timeout, cluster_id));
        }

        let mut summary = SyncSummary {
            cluster_id: cluster_id.clone(),
            status: ClusterSyncStatus::Running,
            last_run_at: Some(Utc::now()),
            last_result: None,
            checkpoint: None,
            counters: SyncCounters::default(),
        };
        self.write_summary(&summary).await?;

        let result = self.drain_and_persist(source, filter, &mut summary).await;

        summary.status = match &result {
            Ok(()) => ClusterSyncStatus::Idle,
            Err(e) => {
                warn!(cluster = %cluster_id, error = %e, "inventory sync failed");
                ClusterSyncStatus::Error
            }
        };
        summary.last_result = Some(match &result {
            Ok(()) => "ok".to_string(),
            Err(e) => e.to_string(),
        });
        self.write_summary(&summary).await?;
        self.lease.release(&lease_key, &self.worker_id).await?;

        result.map(|_| summary)
    }

    async fn drain_and_persist(
        &self,
        source: &dyn ClusterSource,
        filter: &InventoryFilter,
        summary: &mut SyncSummary,
    ) -> Result<(), InventoryError> {
        use futures::StreamExt;

        let mut stream = source.discover().await?;
        while let Some(next) = stream.next().await {
            let item = match next {
                Ok(item) => item,
                Err(e) => {
                    summary.counters.errors += 1;
                    warn!(error = %e, "inventory discovery item failed");
                    continue;
                }
            };
            if !filter.allows(&item) {
                continue;
            }
            summary.counters.processed += 1;
            summary.checkpoint = Some(item.snapshot_key());
            match self.persist_snapshot(&item).await {
                Ok(SyncStatus::Created) => summary.counters.created += 1,
                Ok(SyncStatus::Unchanged) => summary.counters.unchanged += 1,
                Ok(SyncStatus::Updated) => summary.counters.updated += 1,
                Err(e) => {
                    summary.counters.errors += 1;
                    warn!(item = %item.resource_id, error = %e, "failed to persist inventory item");
                }
            }
        }
        Ok(())
    }

    async fn acquire_with_wait(
        &self,
        key: &str,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<bool, InventoryError> {
        if self.lease.acquire(key, &self.worker_id, ttl).await? {
            return Ok(true);
        }
        if timeout.is_zero() {
            return Ok(false);
        }
        let deadline = tokio::time::Instant::now() + timeout;
        let poll_interval = Duration::from_millis(50).min(timeout);
        while tokio::time::Instant::now() < deadline {
            tokio::time::sleep(poll_interval).await;
            if self.lease.acquire(key, &self.worker_id, ttl).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn version_id(snapshot_key: &str, version: u64) -> String {
    format!("{snapshot_key}::v{version}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{change_resource_schema, snapshot_resource_schema, version_resource_schema};
    use crate::source::StaticSource;
    use objdb_store::ObjectStoreBlob;
    use serde_json::json;
    use std::collections::HashMap as Map;

    fn engine() -> InventoryEngine {
        let store: Arc<dyn objdb_store::BlobStore> = Arc::new(ObjectStoreBlob::in_memory());
        let snapshots = Arc::new(Resource::new(snapshot_resource_schema("plg_inventory_snapshot"), store.clone()));
        let versions = Arc::new(Resource::new(version_resource_schema("plg_inventory_version"), store.clone()));
        let changes = Arc::new(Resource::new(change_resource_schema("plg_inventory_change"), store.clone()));
        InventoryEngine::new(snapshots, versions, changes, PluginStorage::new(store, "inventory"), "worker-1")
    }

    fn item(config: Value) -> InventoryItem {
        InventoryItem {
            cluster_id: "c1".into(),
            resource_type: "Deployment".into(),
            namespace: Some("default".into()),
            resource_id: "web".into(),
            uid: None,
            name: "web".into(),
            api_version: "apps/v1".into(),
            kind: "Deployment".into(),
            labels: Map::new(),
            annotations: Map::new(),
            configuration: config,
            raw: json!({}),
        }
    }

    #[tokio::test]
    async fn first_sight_creates_version_one() {
        let engine = engine();
        let status = engine.persist_snapshot(&item(json!({"replicas": 3}))).await.unwrap();
        assert_eq!(status, SyncStatus::Created);
    }

    #[tokio::test]
    async fn unchanged_digest_reports_unchanged() {
        let engine = engine();
        engine.persist_snapshot(&item(json!({"replicas": 3}))).await.unwrap();
        let status = engine.persist_snapshot(&item(json!({"replicas": 3}))).await.unwrap();
        assert_eq!(status, SyncStatus::Unchanged);
    }

    #[tokio::test]
    async fn changed_digest_bumps_version_and_diffs() {
        let engine = engine();
        engine.persist_snapshot(&item(json!({"replicas": 3}))).await.unwrap();
        let status = engine.persist_snapshot(&item(json!({"replicas": 5}))).await.unwrap();
        assert_eq!(status, SyncStatus::Updated);

        let key = item(json!({})).snapshot_key();
        let snapshot = fields_to_snapshot(&engine.snapshots.get(&key).await.unwrap().data).unwrap();
        assert_eq!(snapshot.latest_version, 2);
        assert_eq!(snapshot.changelog_size, 1);
    }

    #[tokio::test]
    async fn sync_consumes_static_source_and_reports_counters() {
        let engine = engine();
        let source = StaticSource::new("c1", vec![item(json!({"replicas": 1}))]);
        let filter = InventoryFilter::default();
        let summary =
            engine.sync(&source, &filter, Duration::from_secs(30), Duration::from_millis(0)).await.unwrap();
        assert_eq!(summary.counters.processed, 1);
        assert_eq!(summary.counters.created, 1);
        assert_eq!(summary.status, ClusterSyncStatus::Idle);
    }

    #[tokio::test]
    async fn sync_releases_lease_so_a_second_run_can_proceed() {
        let engine = engine();
        let source = StaticSource::new("c1", vec![item(json!({"replicas": 1}))]);
        let filter = InventoryFilter::default();
        engine.sync(&source, &filter, Duration::from_secs(30), Duration::from_millis(0)).await.unwrap();
        let second = engine.sync(&source, &filter, Duration::from_secs(30), Duration::from_millis(0)).await.unwrap();
        assert_eq!(second.counters.unchanged, 1);
    }
}
