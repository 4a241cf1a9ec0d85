use std::collections::HashMap;

use objdb_types::{
    AttributeDef, AttributeType, PartitionDef, QueueEntry, ResourceBehavior, ResourceName, ResourceSchema,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QueueError;

pub fn entry_to_fields(entry: &QueueEntry) -> Result<HashMap<String, Value>, QueueError> {
    let value = serde_json::to_value(entry)?;
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => Err(QueueError::MalformedEntry("queue entry did not serialize to an object".to_string())),
    }
}

pub fn fields_to_entry(data: &HashMap<String, Value>) -> Result<QueueEntry, QueueError> {
    let value = Value::Object(data.clone().into_iter().collect());
    Ok(serde_json::from_value(value)?)
}

/// `plg_s3queue_<resource>_queue` — the managed resource queue entries live
/// in, partitioned by status so pending/processing scans don't require a
/// full listing.
pub fn queue_resource_schema(target_resource: &str) -> ResourceSchema {
    ResourceSchema {
        name: ResourceName::new(format!("plg_s3queue_{target_resource}_queue")),
        attributes: vec![
            AttributeDef { name: "id".into(), attr_type: AttributeType::String, required: true },
            AttributeDef { name: "originalId".into(), attr_type: AttributeType::String, required: true },
            AttributeDef { name: "status".into(), attr_type: AttributeType::String, required: true },
        ],
        behavior: ResourceBehavior::BodyOnly,
        partitions: vec![PartitionDef { name: "byStatus".into(), fields: vec!["status".into()], max_length: None }],
        timestamps: false,
        async_partitions: false,
    }
}

/// `plg_s3queue_<resource>_dead` — the dead-letter resource.
pub fn dead_letter_resource_schema(target_resource: &str) -> ResourceSchema {
    ResourceSchema {
        name: ResourceName::new(format!("plg_s3queue_{target_resource}_dead")),
        attributes: vec![AttributeDef { name: "id".into(), attr_type: AttributeType::String, required: true }],
        behavior: ResourceBehavior::BodyOnly,
        partitions: vec![],
        timestamps: false,
        async_partitions: false,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub id: String,
    pub original_id: String,
    pub queue_id: String,
    pub data: Value,
    pub error: String,
    pub attempts: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use objdb_types::QueueStatus;

    fn sample() -> QueueEntry {
        let now = Utc::now();
        QueueEntry {
            id: "q1".into(),
            original_id: "r1".into(),
            status: QueueStatus::Pending,
            visible_at: now,
            claimed_by: None,
            claimed_at: None,
            lock_token: None,
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
    fn entry_round_trips_through_fields() {
        let entry = sample();
        let fields = entry_to_fields(&entry).unwrap();
        let back = fields_to_entry(&fields).unwrap();
        assert_eq!(back.id, entry.id);
        assert_eq!(back.status, entry.status);
    }
}
