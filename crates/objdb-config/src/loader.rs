use std::path::Path;
use std::time::Duration;

use objdb_queue::config::{FailureStrategy, OrderingMode, QueueConfig};
use tracing::debug;

use crate::error::ConfigError;
use crate::model::{
    ClusterConfig, DiscoveryOptions, GraphOptions, InventoryOptions, LockOptions, MetricsOptions, QueueOptions,
    ReplicationOptions, ReplicatorTarget, ScheduleOptions,
};
use crate::raw::{RawDiscovery, RawDocument, RawGraph, RawInventory, RawLock, RawMetrics, RawQueue, RawReplication, RawSchedule};

/// Parses `path` as a single YAML document describing a cluster's
/// resources and plugin options.
pub fn load_cluster_config(path: &Path) -> Result<ClusterConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io { path: path.display().to_string(), source: e })?;
    load_cluster_config_str(&content, path)
}

/// Parses an in-memory YAML document; `path` is used only for error
/// messages, so it need not exist on disk.
pub fn load_cluster_config_str(yaml: &str, path: &Path) -> Result<ClusterConfig, ConfigError> {
    debug!("loading cluster config from {}", path.display());
    let raw: RawDocument =
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::YamlParse { path: path.display().to_string(), source: e })?;
    convert_document(raw, path)
}

fn convert_document(raw: RawDocument, path: &Path) -> Result<ClusterConfig, ConfigError> {
    let resource_names: Vec<String> = raw.resources.iter().map(|r| r.name.as_str().to_string()).collect();

    let queues = raw
        .queues
        .into_iter()
        .map(|q| convert_queue(q, &resource_names, path))
        .collect::<Result<Vec<_>, _>>()?;

    let replication = raw.replication.map(convert_replication);
    let graphs = raw.graphs.into_iter().map(|g| convert_graph(g, &resource_names, path)).collect::<Result<Vec<_>, _>>()?;
    let inventory = raw.inventory.map(convert_inventory);
    let metrics = raw.metrics.map(convert_metrics);

    Ok(ClusterConfig { resources: raw.resources, queues, replication, graphs, inventory, metrics })
}

fn convert_queue(raw: RawQueue, resource_names: &[String], path: &Path) -> Result<QueueOptions, ConfigError> {
    if !resource_names.iter().any(|n| n == &raw.resource) {
        return Err(ConfigError::Conversion {
            path: path.display().to_string(),
            message: format!("queue declared for undeclared resource '{}'", raw.resource),
        });
    }
    if let Some(dlq) = &raw.dead_letter_resource {
        if !resource_names.iter().any(|n| n == dlq) {
            return Err(ConfigError::Conversion {
                path: path.display().to_string(),
                message: format!("queue dead-letter resource '{}' is not declared", dlq),
            });
        }
    }

    let defaults = QueueConfig::default();
    let config = QueueConfig {
        visibility_timeout: raw.visibility_timeout_secs.map(Duration::from_secs).unwrap_or(defaults.visibility_timeout),
        poll_interval: raw.poll_interval_secs.map(Duration::from_secs).unwrap_or(defaults.poll_interval),
        max_poll_interval: raw.max_poll_interval_secs.map(Duration::from_secs).unwrap_or(defaults.max_poll_interval),
        max_attempts: raw.max_attempts.unwrap_or(defaults.max_attempts),
        concurrency: raw.concurrency.unwrap_or(defaults.concurrency),
        auto_start: raw.auto_start.unwrap_or(defaults.auto_start),
        ordering_mode: raw
            .ordering_mode
            .as_deref()
            .map(|s| parse_ordering_mode(s, path))
            .transpose()?
            .unwrap_or(defaults.ordering_mode),
        ordering_guarantee: raw.ordering_guarantee.unwrap_or(defaults.ordering_guarantee),
        ordering_lock_ttl: raw.ordering_lock_ttl_millis.map(Duration::from_millis).unwrap_or(defaults.ordering_lock_ttl),
        failure_strategy: raw
            .failure_strategy
            .as_deref()
            .map(|s| parse_failure_strategy(s, path))
            .transpose()?
            .unwrap_or(defaults.failure_strategy),
        lock_ttl: raw.lock_ttl_secs.map(Duration::from_secs).unwrap_or(defaults.lock_ttl),
        heartbeat_ttl: raw.heartbeat_ttl_secs.map(Duration::from_secs).unwrap_or(defaults.heartbeat_ttl),
        ticket_batch_size: raw.ticket_batch_size.unwrap_or(defaults.ticket_batch_size),
        dispatch_interval: raw.dispatch_interval_secs.map(Duration::from_secs).unwrap_or(defaults.dispatch_interval),
        poll_batch_size: raw.poll_batch_size.unwrap_or(defaults.poll_batch_size),
        recovery_interval: raw.recovery_interval_secs.map(Duration::from_secs).unwrap_or(defaults.recovery_interval),
        processed_cache_ttl: raw.processed_cache_ttl_secs.map(Duration::from_secs).unwrap_or(defaults.processed_cache_ttl),
    };
    config.validate().map_err(|e| ConfigError::Conversion { path: path.display().to_string(), message: e.to_string() })?;

    if matches!(config.failure_strategy, FailureStrategy::DeadLetter | FailureStrategy::Hybrid) && raw.dead_letter_resource.is_none() {
        return Err(ConfigError::InvalidCombination {
            path: path.display().to_string(),
            message: format!("queue on '{}' uses a dead-letter failure strategy but declares no dead_letter_resource", raw.resource),
        });
    }

    Ok(QueueOptions { resource: raw.resource, dead_letter_resource: raw.dead_letter_resource, config })
}

fn parse_ordering_mode(s: &str, path: &Path) -> Result<OrderingMode, ConfigError> {
    match s {
        "fifo" => Ok(OrderingMode::Fifo),
        "lifo" => Ok(OrderingMode::Lifo),
        other => Err(ConfigError::Conversion { path: path.display().to_string(), message: format!("unknown ordering mode '{}'", other) }),
    }
}

fn parse_failure_strategy(s: &str, path: &Path) -> Result<FailureStrategy, ConfigError> {
    match s {
        "retry" => Ok(FailureStrategy::Retry),
        "dead-letter" | "dead_letter" => Ok(FailureStrategy::DeadLetter),
        "hybrid" => Ok(FailureStrategy::Hybrid),
        other => {
            Err(ConfigError::Conversion { path: path.display().to_string(), message: format!("unknown failure strategy '{}'", other) })
        }
    }
}

fn convert_replication(raw: RawReplication) -> ReplicationOptions {
    let replicators =
        raw.replicators.into_iter().map(|r| ReplicatorTarget { id: r.id, url: r.url, allow: r.allow, block: r.block }).collect();
    ReplicationOptions {
        replicators,
        allow: raw.allow,
        block: raw.block,
        concurrency: raw.concurrency.unwrap_or(5),
        max_retries: raw.max_retries.unwrap_or(3),
        log_resource: raw.log_resource,
    }
}

fn convert_graph(raw: RawGraph, resource_names: &[String], path: &Path) -> Result<GraphOptions, ConfigError> {
    if !raw.create_resources {
        for needed in [&raw.vertices, &raw.edges] {
            if !resource_names.iter().any(|n| n == needed) {
                return Err(ConfigError::Conversion {
                    path: path.display().to_string(),
                    message: format!("graph '{}' references undeclared resource '{}'", raw.name, needed),
                });
            }
        }
    }
    Ok(GraphOptions {
        name: raw.name,
        vertices: raw.vertices,
        edges: raw.edges,
        directed: raw.directed,
        weighted: raw.weighted,
        default_weight: raw.default_weight.unwrap_or(1.0),
        max_traversal_depth: raw.max_traversal_depth,
        create_resources: raw.create_resources,
        denormalize: raw.denormalize,
    })
}

fn convert_inventory(raw: RawInventory) -> InventoryOptions {
    InventoryOptions {
        clusters: raw.clusters,
        discovery: convert_discovery(raw.discovery),
        scheduled: convert_schedule(raw.scheduled),
        lock: convert_lock(raw.lock),
    }
}

fn convert_discovery(raw: RawDiscovery) -> DiscoveryOptions {
    DiscoveryOptions {
        concurrency: raw.concurrency.unwrap_or(5),
        select: raw.select,
        ignore: raw.ignore,
        run_on_install: raw.run_on_install,
        dry_run: raw.dry_run,
    }
}

fn convert_schedule(raw: RawSchedule) -> ScheduleOptions {
    ScheduleOptions { enabled: raw.enabled, cron: raw.cron, timezone: raw.timezone, run_on_start: raw.run_on_start }
}

fn convert_lock(raw: RawLock) -> LockOptions {
    let defaults = LockOptions::default();
    LockOptions {
        ttl: raw.ttl_secs.map(Duration::from_secs).unwrap_or(defaults.ttl),
        timeout: raw.timeout_secs.map(Duration::from_secs).unwrap_or(defaults.timeout),
    }
}

fn convert_metrics(raw: RawMetrics) -> MetricsOptions {
    MetricsOptions {
        retention_days: raw.retention_days.unwrap_or(30),
        flush_interval: raw.flush_interval_secs.map(Duration::from_secs).unwrap_or(Duration::from_secs(60)),
    }
}
