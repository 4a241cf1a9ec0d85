use objdb_types::ResourceSchema;
use serde::{Deserialize, Serialize};

/// Top-level shape of a cluster's YAML document: resource declarations
/// plus the options for every plugin that opts in.
#[derive(Debug, Deserialize, Serialize)]
pub struct RawDocument {
    #[serde(default)]
    pub resources: Vec<ResourceSchema>,
    #[serde(default)]
    pub queues: Vec<RawQueue>,
    #[serde(default)]
    pub replication: Option<RawReplication>,
    #[serde(default)]
    pub graphs: Vec<RawGraph>,
    #[serde(default)]
    pub inventory: Option<RawInventory>,
    #[serde(default)]
    pub metrics: Option<RawMetrics>,
}

/// One declared work queue, bound to an already-declared resource by name.
/// Every field but `resource` is optional and falls back to
/// `objdb_queue::QueueConfig::default`.
#[derive(Debug, Deserialize, Serialize)]
pub struct RawQueue {
    pub resource: String,
    #[serde(default)]
    pub dead_letter_resource: Option<String>,
    #[serde(default)]
    pub visibility_timeout_secs: Option<u64>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub max_poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub auto_start: Option<bool>,
    /// `"fifo"` or `"lifo"`.
    #[serde(default)]
    pub ordering_mode: Option<String>,
    #[serde(default)]
    pub ordering_guarantee: Option<bool>,
    #[serde(default)]
    pub ordering_lock_ttl_millis: Option<u64>,
    /// `"retry"`, `"dead-letter"`, or `"hybrid"`.
    #[serde(default)]
    pub failure_strategy: Option<String>,
    #[serde(default)]
    pub lock_ttl_secs: Option<u64>,
    #[serde(default)]
    pub heartbeat_ttl_secs: Option<u64>,
    #[serde(default)]
    pub ticket_batch_size: Option<usize>,
    #[serde(default)]
    pub dispatch_interval_secs: Option<u64>,
    #[serde(default)]
    pub poll_batch_size: Option<usize>,
    #[serde(default)]
    pub recovery_interval_secs: Option<u64>,
    #[serde(default)]
    pub processed_cache_ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RawReplicatorTarget {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub block: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RawReplication {
    #[serde(default)]
    pub replicators: Vec<RawReplicatorTarget>,
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub block: Vec<String>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default = "default_log_resource")]
    pub log_resource: String,
}

fn default_log_resource() -> String {
    "replication-log".to_string()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RawGraph {
    pub name: String,
    pub vertices: String,
    pub edges: String,
    #[serde(default)]
    pub directed: bool,
    #[serde(default)]
    pub weighted: bool,
    pub default_weight: Option<f64>,
    pub max_traversal_depth: Option<usize>,
    #[serde(default)]
    pub create_resources: bool,
    #[serde(default)]
    pub denormalize: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RawInventory {
    #[serde(default)]
    pub clusters: Vec<String>,
    #[serde(default)]
    pub discovery: RawDiscovery,
    #[serde(default)]
    pub scheduled: RawSchedule,
    #[serde(default)]
    pub lock: RawLock,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RawDiscovery {
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub select: Vec<String>,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub run_on_install: bool,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RawSchedule {
    #[serde(default)]
    pub enabled: bool,
    pub cron: Option<String>,
    /// IANA zone name (e.g. `"America/New_York"`); `CronManager` ticks in
    /// the process's local timezone when unset.
    pub timezone: Option<String>,
    #[serde(default)]
    pub run_on_start: bool,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RawLock {
    pub ttl_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RawMetrics {
    pub retention_days: Option<i64>,
    pub flush_interval_secs: Option<u64>,
}
