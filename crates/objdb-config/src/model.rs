use std::time::Duration;

use objdb_queue::QueueConfig;
use objdb_types::ResourceSchema;

/// Fully parsed and validated configuration for one cluster: every
/// declared resource plus the plugin options layered on top of it.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub resources: Vec<ResourceSchema>,
    pub queues: Vec<QueueOptions>,
    pub replication: Option<ReplicationOptions>,
    pub graphs: Vec<GraphOptions>,
    pub inventory: Option<InventoryOptions>,
    pub metrics: Option<MetricsOptions>,
}

impl ClusterConfig {
    pub fn resource(&self, name: &str) -> Option<&ResourceSchema> {
        self.resources.iter().find(|r| r.name.as_str() == name)
    }
}

#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub resource: String,
    pub dead_letter_resource: Option<String>,
    pub config: QueueConfig,
}

#[derive(Debug, Clone)]
pub struct ReplicatorTarget {
    pub id: String,
    pub url: String,
    pub allow: Vec<String>,
    pub block: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ReplicationOptions {
    pub replicators: Vec<ReplicatorTarget>,
    pub allow: Vec<String>,
    pub block: Vec<String>,
    pub concurrency: usize,
    pub max_retries: u32,
    pub log_resource: String,
}

#[derive(Debug, Clone)]
pub struct GraphOptions {
    pub name: String,
    pub vertices: String,
    pub edges: String,
    pub directed: bool,
    pub weighted: bool,
    pub default_weight: f64,
    pub max_traversal_depth: Option<usize>,
    pub create_resources: bool,
    pub denormalize: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    pub concurrency: usize,
    pub select: Vec<String>,
    pub ignore: Vec<String>,
    pub run_on_install: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleOptions {
    pub enabled: bool,
    pub cron: Option<String>,
    pub timezone: Option<String>,
    pub run_on_start: bool,
}

#[derive(Debug, Clone)]
pub struct LockOptions {
    pub ttl: Duration,
    pub timeout: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        LockOptions { ttl: Duration::from_secs(30), timeout: Duration::from_secs(10) }
    }
}

#[derive(Debug, Clone)]
pub struct InventoryOptions {
    pub clusters: Vec<String>,
    pub discovery: DiscoveryOptions,
    pub scheduled: ScheduleOptions,
    pub lock: LockOptions,
}

#[derive(Debug, Clone)]
pub struct MetricsOptions {
    pub retention_days: i64,
    pub flush_interval: Duration,
}
