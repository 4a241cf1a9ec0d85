use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use objdb_config::load_cluster_config;
use objdb_cron::CronManager;
use objdb_metrics::{metrics_errors_resource_schema, metrics_performance_resource_schema, metrics_resource_schema};
use objdb_store::{BlobStore, ObjectStoreBlob};
use objdb_util::new_prefixed_id;
use serde_json::json;
use tracing::{info, warn};

use crate::inventory;
use crate::wiring::{self, Plugins};

const METRICS_LOOKBACK_DAYS: i64 = 7;

fn build_store(store_arg: &str) -> Result<Arc<dyn BlobStore>> {
    if store_arg == "memory" {
        Ok(Arc::new(ObjectStoreBlob::in_memory()))
    } else {
        Ok(Arc::new(ObjectStoreBlob::local(Path::new(store_arg))?))
    }
}

pub async fn serve(config_path: &Path, store_arg: &str, worker_id: Option<String>, bind: String, port: u16, auth_token: Option<String>) -> Result<()> {
    let config = load_cluster_config(config_path).with_context(|| format!("loading {}", config_path.display()))?;
    let store = build_store(store_arg)?;
    let worker_id = worker_id.unwrap_or_else(|| new_prefixed_id("worker"));

    let Plugins { database, queues, graphs, replication, events } = wiring::build_plugins(&config, store.clone(), &worker_id).await?;
    info!(
        resources = config.resources.len(),
        queues = queues.len(),
        graphs = graphs.len(),
        replication = replication.is_some(),
        worker_id = %worker_id,
        "plugins wired"
    );
    events.on_event(std::sync::Arc::new(|event: objdb_types::PluginEvent| {
        Box::pin(async move { info!(name = event.name(), "plugin event") })
    }));

    let mut cron = CronManager::new().await?;
    if let Some(inventory_opts) = config.inventory.clone() {
        if let Some(handle) = inventory::build_inventory(&database, store.clone(), &inventory_opts).await? {
            inventory::schedule(&mut cron, Arc::new(handle), inventory_opts).await?;
        }
    }
    cron.start().await?;

    let metrics = objdb_metrics::Metrics::new()?;
    let metrics_resource = database.create_resource(metrics_resource_schema()).await;
    let errors_resource = database.create_resource(metrics_errors_resource_schema()).await;
    let performance_resource = database.create_resource(metrics_performance_resource_schema()).await;
    let retention_days = config.metrics.as_ref().map(|m| m.retention_days).unwrap_or(30);
    let flush_interval = config.metrics.as_ref().map(|m| m.flush_interval).unwrap_or(Duration::from_secs(60));

    let sweep_metrics = metrics.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(flush_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = sweep_metrics.flush(&metrics_resource, &errors_resource, &performance_resource).await {
                warn!(error = %e, "metrics flush failed");
            }
            if let Err(e) =
                sweep_metrics.cleanup_old_data(&metrics_resource, &errors_resource, &performance_resource, retention_days, METRICS_LOOKBACK_DAYS).await
            {
                warn!(error = %e, "metrics retention sweep failed");
            }
        }
    });

    let app = objdb_api::build_app(metrics, auth_token);
    let addr = format!("{bind}:{port}");
    info!(%addr, "serving metrics/health surface");
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await.context("server error")?;

    cron.shutdown().await?;
    Ok(())
}

pub async fn inspect(config_path: &Path, as_json: bool) -> Result<()> {
    let config = load_cluster_config(config_path).with_context(|| format!("loading {}", config_path.display()))?;

    if as_json {
        let summary = json!({
            "resources": config.resources.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            "queues": config.queues.iter().map(|q| &q.resource).collect::<Vec<_>>(),
            "graphs": config.graphs.iter().map(|g| &g.name).collect::<Vec<_>>(),
            "replication": config.replication.as_ref().map(|r| r.replicators.iter().map(|t| &t.id).collect::<Vec<_>>()),
            "inventory_clusters": config.inventory.as_ref().map(|i| i.clusters.clone()),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("resources ({}):", config.resources.len());
    for resource in &config.resources {
        println!("  - {} [{:?}]", resource.name.as_str(), resource.behavior);
    }

    println!("queues ({}):", config.queues.len());
    for queue in &config.queues {
        println!(
            "  - {} (visibility_timeout={}s, max_attempts={}, dead_letter={})",
            queue.resource,
            queue.config.visibility_timeout.as_secs(),
            queue.config.max_attempts,
            queue.dead_letter_resource.as_deref().unwrap_or("none"),
        );
    }

    if let Some(replication) = &config.replication {
        println!("replicators ({}):", replication.replicators.len());
        for target in &replication.replicators {
            println!("  - {} -> {}", target.id, target.url);
        }
    }

    if !config.graphs.is_empty() {
        println!("graphs ({}):", config.graphs.len());
        for graph in &config.graphs {
            println!("  - {} ({} -> {})", graph.name, graph.vertices, graph.edges);
        }
    }

    if let Some(inventory) = &config.inventory {
        println!("inventory clusters: {}", inventory.clusters.join(", "));
    }

    Ok(())
}
