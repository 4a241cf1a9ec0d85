use std::sync::Arc;

use anyhow::{Context, Result};
use objdb_config::InventoryOptions;
use objdb_cron::CronManager;
use objdb_inventory::{
    change_resource_schema, snapshot_resource_schema, version_resource_schema, ClusterRegistry, FilterRule,
    InventoryEngine, InventoryFilter, KubeSource, WatchedKind,
};
use objdb_resource::Database;
use objdb_store::{BlobStore, PluginStorage};
use tracing::{error, info, warn};

/// Default set of kinds every kube-backed cluster source watches.
/// `InventoryOptions` doesn't carry a per-cluster kind list, so every
/// registered cluster gets this baseline workload/networking surface.
fn default_watched_kinds() -> Vec<WatchedKind> {
    vec![
        WatchedKind::new("", "v1", "Pod"),
        WatchedKind::new("", "v1", "Service"),
        WatchedKind::new("apps", "v1", "Deployment"),
    ]
}

pub struct InventoryHandle {
    pub engine: Arc<InventoryEngine>,
    pub registry: Arc<ClusterRegistry>,
    pub filter: Arc<InventoryFilter>,
}

/// Builds the snapshot engine and a best-effort cluster source per
/// configured cluster id. A cluster whose kube client can't be
/// constructed (no in-cluster config, no kubeconfig) is skipped with a
/// warning rather than failing the whole process.
pub async fn build_inventory(database: &Database, store: Arc<dyn BlobStore>, opts: &InventoryOptions) -> Result<Option<InventoryHandle>> {
    if opts.clusters.is_empty() {
        return Ok(None);
    }

    let snapshots = database.create_resource(snapshot_resource_schema("inventory-snapshots")).await;
    let versions = database.create_resource(version_resource_schema("inventory-versions")).await;
    let changes = database.create_resource(change_resource_schema("inventory-changes")).await;

    let storage = PluginStorage::new(store, "inventory");
    let engine = Arc::new(InventoryEngine::new(snapshots, versions, changes, storage, "objdb-inventory"));

    let mut registry = ClusterRegistry::new();
    for cluster_id in &opts.clusters {
        match kube::Client::try_default().await {
            Ok(client) => {
                registry.register(Arc::new(KubeSource::new(cluster_id.clone(), client, default_watched_kinds())));
            }
            Err(e) => {
                warn!(cluster = %cluster_id, error = %e, "no kube client available, cluster will not sync");
            }
        }
    }

    let select = opts.discovery.select.iter().map(|p| FilterRule::pattern(p)).collect::<Result<Vec<_>, _>>()?;
    let ignore = opts.discovery.ignore.iter().map(|p| FilterRule::pattern(p)).collect::<Result<Vec<_>, _>>()?;
    let filter = Arc::new(InventoryFilter::new(select, ignore));

    Ok(Some(InventoryHandle { engine, registry: Arc::new(registry), filter }))
}

pub async fn run_sync_once(handle: &InventoryHandle, cluster_id: &str, opts: &InventoryOptions) -> Result<()> {
    let source =
        handle.registry.get(cluster_id).with_context(|| format!("no cluster source registered for '{cluster_id}'"))?;
    let summary = handle.engine.sync(source.as_ref(), &handle.filter, opts.lock.ttl, opts.lock.timeout).await?;
    info!(cluster = %cluster_id, processed = summary.counters.processed, "inventory sync complete");
    Ok(())
}

/// Registers the configured cron schedule, running once immediately first
/// when `runOnStart` is set.
pub async fn schedule(cron: &mut CronManager, handle: Arc<InventoryHandle>, opts: InventoryOptions) -> Result<()> {
    if !opts.scheduled.enabled {
        return Ok(());
    }
    let Some(cron_expr) = opts.scheduled.cron.clone() else {
        return Ok(());
    };

    if opts.scheduled.run_on_start {
        for cluster_id in &opts.clusters {
            if let Err(e) = run_sync_once(&handle, cluster_id, &opts).await {
                error!(cluster = %cluster_id, error = %e, "initial inventory sync failed");
            }
        }
    }

    let clusters = opts.clusters.clone();
    let timezone = opts.scheduled.timezone.clone();
    cron.add_cron("inventory-sync", &cron_expr, timezone.as_deref(), move || {
        let handle = handle.clone();
        let opts = opts.clone();
        let clusters = clusters.clone();
        async move {
            for cluster_id in &clusters {
                if let Err(e) = run_sync_once(&handle, cluster_id, &opts).await {
                    error!(cluster = %cluster_id, error = %e, "scheduled inventory sync failed");
                }
            }
        }
    })
    .await?;
    Ok(())
}
