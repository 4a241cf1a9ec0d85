use std::collections::HashMap;

use objdb_types::{AttributeDef, AttributeType, PartitionDef, ReplicationLogEntry, ResourceBehavior, ResourceName, ResourceSchema};
use serde_json::Value;

use crate::error::ReplicationError;

/// The internal log resource recording one row per replicate attempt,
/// partitioned by replicator and by status so a retry sweep never scans
/// the whole log.
pub fn replication_log_resource_schema(name: impl Into<String>) -> ResourceSchema {
    ResourceSchema {
        name: ResourceName::new(name),
        attributes: vec![
            AttributeDef { name: "id".into(), attr_type: AttributeType::String, required: true },
            AttributeDef { name: "replicator".into(), attr_type: AttributeType::String, required: true },
            AttributeDef { name: "status".into(), attr_type: AttributeType::String, required: true },
        ],
        behavior: ResourceBehavior::BodyOnly,
        partitions: vec![
            PartitionDef { name: "byReplicator".into(), fields: vec!["replicator".into()], max_length: None },
            PartitionDef { name: "byStatus".into(), fields: vec!["status".into()], max_length: None },
        ],
        timestamps: false,
        async_partitions: true,
    }
}

pub fn log_entry_to_fields(entry: &ReplicationLogEntry) -> Result<HashMap<String, Value>, ReplicationError> {
    match serde_json::to_value(entry)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => unreachable!("replication log entries always serialize to JSON objects"),
    }
}

pub fn fields_to_log_entry(data: &HashMap<String, Value>) -> Result<ReplicationLogEntry, ReplicationError> {
    Ok(serde_json::from_value(Value::Object(data.clone().into_iter().collect()))?)
}
