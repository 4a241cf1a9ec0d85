use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use objdb_config::{ClusterConfig, ReplicationOptions};
use objdb_graph::GraphOverlay;
use objdb_queue::S3Queue;
use objdb_replication::{ReplicationFabric, ResourceSelector, WebhookReplicator};
use objdb_resource::{Database, Resource};
use objdb_store::{BlobStore, PluginStorage};
use objdb_types::{PluginEventBus, ResourceName};

pub const QUEUE_CAPABILITY: &str = "queue";
pub const GRAPH_CAPABILITY: &str = "graph";

/// Every plugin built from one cluster's configuration, handed back to the
/// caller so `serve` can start/await the pieces that run in the
/// background (queues auto-starting their dispatch loop is a queue-side
/// concern; this struct just keeps them alive for the process lifetime).
pub struct Plugins {
    pub database: Arc<Database>,
    pub queues: Vec<Arc<S3Queue>>,
    pub graphs: Vec<Arc<GraphOverlay>>,
    pub replication: Option<Arc<ReplicationFabric>>,
    pub events: PluginEventBus,
}

/// Registers every declared resource, then layers queues, graph overlays,
/// and the replication fabric on top, in that declare-then-wire order,
/// before the server starts accepting work. Every queue and the
/// replication fabric publish their `plg:*` events onto the same shared
/// bus, so one subscriber can observe the whole cluster.
pub async fn build_plugins(config: &ClusterConfig, store: Arc<dyn BlobStore>, worker_id: &str) -> Result<Plugins> {
    let database = Arc::new(Database::new(store.clone()));
    let events = PluginEventBus::new();

    for schema in &config.resources {
        database.create_resource(schema.clone()).await;
    }

    let mut queues = Vec::new();
    for queue_opts in &config.queues {
        let target = database
            .resource(&ResourceName::new(&queue_opts.resource))
            .await
            .with_context(|| format!("queue target resource '{}'", queue_opts.resource))?;

        let entries_schema = objdb_queue::entry::queue_resource_schema(&queue_opts.resource);
        let entries = database.create_resource(entries_schema).await;

        let dead_letter = match &queue_opts.dead_letter_resource {
            Some(name) => Some(database.resource(&ResourceName::new(name)).await.with_context(|| {
                format!("queue dead-letter resource '{name}' for queue on '{}'", queue_opts.resource)
            })?),
            None => None,
        };

        let storage = PluginStorage::new(store.clone(), format!("s3queue-{}", queue_opts.resource));
        let queue = Arc::new(
            S3Queue::new(target.clone(), entries, dead_letter, storage, None, None, queue_opts.config.clone(), worker_id)
                .with_context(|| format!("constructing queue for '{}'", queue_opts.resource))?
                .with_event_bus(events.clone()),
        );
        database.register_capability(&ResourceName::new(&queue_opts.resource), QUEUE_CAPABILITY, queue.clone()).await;
        queues.push(queue);
    }

    let mut graphs = Vec::new();
    for graph_opts in &config.graphs {
        let vertices = if graph_opts.create_resources {
            get_or_create_placeholder(&database, &graph_opts.vertices).await
        } else {
            database.resource(&ResourceName::new(&graph_opts.vertices)).await.with_context(|| {
                format!("graph '{}' vertex resource '{}'", graph_opts.name, graph_opts.vertices)
            })?
        };
        let edges = if graph_opts.create_resources {
            database.create_resource(objdb_graph::edge_resource_schema(&graph_opts.edges)).await
        } else {
            database
                .resource(&ResourceName::new(&graph_opts.edges))
                .await
                .with_context(|| format!("graph '{}' edge resource '{}'", graph_opts.name, graph_opts.edges))?
        };

        let overlay = Arc::new(GraphOverlay::new(vertices.clone(), edges));
        database.register_capability(&ResourceName::new(&graph_opts.vertices), GRAPH_CAPABILITY, overlay.clone()).await;
        graphs.push(overlay);
    }

    let replication = match &config.replication {
        Some(opts) => Some(build_replication_fabric(&database, opts, events.clone()).await?),
        None => None,
    };

    Ok(Plugins { database, queues, graphs, replication, events })
}

/// `graphs[].createResources: true` declares a bare `{id}`-only vertex
/// resource inline instead of requiring one under `resources:`.
async fn get_or_create_placeholder(database: &Database, name: &str) -> Arc<Resource> {
    if let Ok(existing) = database.resource(&ResourceName::new(name)).await {
        return existing;
    }
    let schema = objdb_types::ResourceSchema {
        name: ResourceName::new(name),
        attributes: vec![objdb_types::AttributeDef {
            name: "id".to_string(),
            attr_type: objdb_types::AttributeType::String,
            required: true,
        }],
        behavior: objdb_types::ResourceBehavior::BodyOnly,
        partitions: vec![],
        timestamps: false,
        async_partitions: false,
    };
    database.create_resource(schema).await
}

async fn build_replication_fabric(
    database: &Database,
    opts: &ReplicationOptions,
    events: PluginEventBus,
) -> Result<Arc<ReplicationFabric>> {
    let log = database.resource(&ResourceName::new(&opts.log_resource)).await.with_context(|| {
        format!("replication log resource '{}' must be declared under resources:", opts.log_resource)
    })?;

    let mut resources = HashMap::new();
    for resource in database.resources().await {
        resources.insert(resource.name().as_str().to_string(), resource);
    }

    let mut replicators: Vec<Arc<dyn objdb_replication::Replicator>> = Vec::new();
    for target in &opts.replicators {
        let selector = if target.block.is_empty() {
            if target.allow.is_empty() { ResourceSelector::All } else { ResourceSelector::allowlist(target.allow.clone()) }
        } else {
            ResourceSelector::blocklist(target.block.clone())
        };
        replicators.push(Arc::new(WebhookReplicator::new(target.id.clone(), target.url.clone(), selector)));
    }

    let global_filter = if !opts.block.is_empty() {
        ResourceSelector::blocklist(opts.block.clone())
    } else if !opts.allow.is_empty() {
        ResourceSelector::allowlist(opts.allow.clone())
    } else {
        ResourceSelector::All
    };

    let fabric = ReplicationFabric::new(resources, log, replicators)
        .with_global_filter(global_filter)
        .with_concurrency(opts.concurrency)
        .with_max_retries(opts.max_retries)
        .with_event_bus(events);
    fabric.install().await;
    Ok(fabric)
}
