use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Identifiers & version tags ───────────────────────────────────────────────

/// Opaque store-assigned revision marker (concretely, a blob-store ETag).
/// Never compared by anything but equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionTag(pub String);

impl VersionTag {
    pub fn new(s: impl Into<String>) -> Self {
        VersionTag(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VersionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceName(pub String);

impl ResourceName {
    pub fn new(s: impl Into<String>) -> Self {
        ResourceName(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Resource schema ───────────────────────────────────────────────────────────

/// How a resource's records are laid out against the blob store object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceBehavior {
    /// Entire payload serialized into the object body.
    BodyOnly,
    /// Declared metadata fields live in object metadata; the remainder
    /// spills into the body and is merged back in on read.
    BodyOverflow,
    /// Only enumerated attributes survive a write; unknown fields are
    /// dropped and the body itself is elided.
    TruncateData,
}

impl Default for ResourceBehavior {
    fn default() -> Self {
        ResourceBehavior::BodyOnly
    }
}

/// Scalar/structural type of a declared attribute, used for validation
/// before a write is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    pub attr_type: AttributeType,
    #[serde(default)]
    pub required: bool,
}

/// A projection over declared fields that produces an auxiliary index path.
///
/// `string|maxlength:N` truncates the source field to its first N chars
/// before it becomes part of the partition key (typically an ISO date
/// prefix).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDef {
    pub name: String,
    pub fields: Vec<String>,
    #[serde(default)]
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSchema {
    pub name: ResourceName,
    pub attributes: Vec<AttributeDef>,
    #[serde(default)]
    pub behavior: ResourceBehavior,
    #[serde(default)]
    pub partitions: Vec<PartitionDef>,
    #[serde(default)]
    pub timestamps: bool,
    /// Decouples partition-index writes from the primary write's critical
    /// path when set; callers must tolerate eventual visibility.
    #[serde(default)]
    pub async_partitions: bool,
}

// ── Record ────────────────────────────────────────────────────────────────────

/// A key-value map with a mandatory `id`, paired with the version tag the
/// store returned on its last read or write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub data: HashMap<String, Value>,
    pub etag: Option<VersionTag>,
}

impl Record {
    pub fn new(id: impl Into<String>, data: HashMap<String, Value>) -> Self {
        Record { id: id.into(), data, etag: None }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }
}

/// Result of a conditional update. Never thrown at this boundary — a stale
/// `ifMatch` precondition is a normal, expected outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalUpdateResult {
    pub success: bool,
    pub data: Option<Record>,
    pub etag: Option<VersionTag>,
    pub error: Option<String>,
}

// ── Queue entry ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: String,
    pub original_id: String,
    pub status: QueueStatus,
    pub visible_at: DateTime<Utc>,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub lock_token: Option<String>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub queued_at: DateTime<Utc>,
    pub error: Option<String>,
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    /// `lockToken` must be present iff the entry is `processing`, and
    /// `attempts` must never exceed `maxAttempts`.
    pub fn invariants_hold(&self) -> bool {
        let lock_matches_state = (self.status == QueueStatus::Processing) == self.lock_token.is_some();
        lock_matches_state && self.attempts <= self.max_attempts
    }

    pub fn eligible_for_claim(&self, now: DateTime<Utc>) -> bool {
        self.status == QueueStatus::Pending && self.visible_at <= now
    }
}

// ── Dispatch ticket ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Available,
    Claimed,
}

/// Ephemeral record published by the coordinator authorizing a worker to
/// attempt a specific queue entry. Stored in plugin storage with TTL
/// `max(30s, 2 * visibilityTimeout)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchTicket {
    pub ticket_id: String,
    pub message_id: String,
    pub original_id: String,
    pub queued_at: DateTime<Utc>,
    pub order_index: u64,
    pub published_at: DateTime<Utc>,
    pub published_by: String,
    pub status: TicketStatus,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub ticket_ttl: std::time::Duration,
}

// ── Edge record ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: String,
    pub source_field: String,
    pub target_field: String,
    pub label_field: Option<String>,
    pub weight_field: Option<f64>,
    pub snapshot: Option<Value>,
    #[serde(default)]
    pub reverse: bool,
    pub original_edge: Option<String>,
}

// ── Inventory ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySnapshot {
    /// `<cluster>::<type>::<namespace|'cluster'>::<resourceId>`
    pub id: String,
    pub latest_digest: String,
    pub latest_version: u64,
    pub changelog_size: u64,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryVersion {
    pub snapshot_id: String,
    pub version: u64,
    pub digest: String,
    pub captured_at: DateTime<Utc>,
    pub configuration: Value,
    pub raw: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KeyDiff {
    pub added: HashMap<String, Value>,
    pub removed: HashMap<String, Value>,
    pub updated: HashMap<String, UpdatedValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatedValue {
    pub old: Value,
    pub new: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryChange {
    pub cluster_id: String,
    pub resource_type: String,
    pub resource_id: String,
    pub from_version: u64,
    pub to_version: u64,
    pub diff: KeyDiff,
}

/// Outcome of persisting one discovered inventory item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Created,
    Unchanged,
    Updated,
}

/// Discovered item prior to normalization, as surfaced by a cluster source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub cluster_id: String,
    pub resource_type: String,
    pub namespace: Option<String>,
    pub resource_id: String,
    pub uid: Option<String>,
    pub name: String,
    pub api_version: String,
    pub kind: String,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    pub configuration: Value,
    pub raw: Value,
}

impl InventoryItem {
    pub fn snapshot_key(&self) -> String {
        format!(
            "{}::{}::{}::{}",
            self.cluster_id,
            self.resource_type,
            self.namespace.as_deref().unwrap_or("cluster"),
            self.resource_id
        )
    }
}

// ── Replication log ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationOp {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationLogEntry {
    pub id: String,
    pub replicator: String,
    pub resource: String,
    pub operation: MutationOp,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: ReplicationStatus,
    pub error: Option<String>,
    pub retry_count: u32,
}

// ── Event bus ─────────────────────────────────────────────────────────────────

/// Post-mutation events emitted by the resource runtime. Typed in place of
/// the string-keyed hook names a dynamic-language sibling would use;
/// subscribers register a handler per variant at plugin install.
#[derive(Debug, Clone)]
pub enum Event {
    Inserted { resource: ResourceName, record: Record },
    Updated { resource: ResourceName, record: Record, before: Record },
    Deleted { resource: ResourceName, record: Record },
}

impl Event {
    pub fn resource(&self) -> &ResourceName {
        match self {
            Event::Inserted { resource, .. }
            | Event::Updated { resource, .. }
            | Event::Deleted { resource, .. } => resource,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::Inserted { .. } => "inserted",
            Event::Updated { .. } => "updated",
            Event::Deleted { .. } => "deleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn sample_entry(status: QueueStatus, lock_token: Option<&str>) -> QueueEntry {
        let now = Utc::now();
        QueueEntry {
            id: "q1".into(),
            original_id: "r1".into(),
            status,
            visible_at: now,
            claimed_by: None,
            claimed_at: None,
            lock_token: lock_token.map(String::from),
            attempts: 0,
            max_attempts: 3,
            queued_at: now,
            error: None,
            result: None,
            created_at: now,
            completed_at: None,
        }
    }

    #[test]
    fn processing_requires_lock_token() {
        assert!(!sample_entry(QueueStatus::Processing, None).invariants_hold());
        assert!(sample_entry(QueueStatus::Processing, Some("tok")).invariants_hold());
    }

    #[test]
    fn pending_forbids_lock_token() {
        assert!(!sample_entry(QueueStatus::Pending, Some("tok")).invariants_hold());
        assert!(sample_entry(QueueStatus::Pending, None).invariants_hold());
    }

    #[test]
    fn eligible_for_claim_requires_visible_past() {
        let mut e = sample_entry(QueueStatus::Pending, None);
        e.visible_at = Utc::now() + ChronoDuration::seconds(60);
        assert!(!e.eligible_for_claim(Utc::now()));
        e.visible_at = Utc::now() - ChronoDuration::seconds(1);
        assert!(e.eligible_for_claim(Utc::now()));
    }

    #[test]
    fn inventory_item_snapshot_key_uses_cluster_namespace() {
        let item = InventoryItem {
            cluster_id: "prod".into(),
            resource_type: "Deployment".into(),
            namespace: Some("default".into()),
            resource_id: "web".into(),
            uid: None,
            name: "web".into(),
            api_version: "apps/v1".into(),
            kind: "Deployment".into(),
            labels: HashMap::new(),
            annotations: HashMap::new(),
            configuration: Value::Null,
            raw: Value::Null,
        };
        assert_eq!(item.snapshot_key(), "prod::Deployment::default::web");
    }

    #[test]
    fn inventory_item_snapshot_key_defaults_namespace_to_cluster() {
        let item = InventoryItem {
            cluster_id: "prod".into(),
            resource_type: "Node".into(),
            namespace: None,
            resource_id: "node-1".into(),
            uid: None,
            name: "node-1".into(),
            api_version: "v1".into(),
            kind: "Node".into(),
            labels: HashMap::new(),
            annotations: HashMap::new(),
            configuration: Value::Null,
            raw: Value::Null,
        };
        assert_eq!(item.snapshot_key(), "prod::Node::cluster::node-1");
    }

    #[test]
    fn event_name_matches_variant() {
        let r = Record::new("x", HashMap::new());
        let resource = ResourceName::new("widgets");
        assert_eq!(
            Event::Inserted { resource: resource.clone(), record: r.clone() }.name(),
            "inserted"
        );
        assert_eq!(
            Event::Updated { resource: resource.clone(), record: r.clone(), before: r.clone() }.name(),
            "updated"
        );
        assert_eq!(Event::Deleted { resource, record: r }.name(), "deleted");
    }
}
