use std::collections::HashMap;

use objdb_types::{
    AttributeDef, AttributeType, InventoryChange, InventorySnapshot, InventoryVersion, PartitionDef,
    ResourceBehavior, ResourceName, ResourceSchema,
};
use serde_json::Value;

use crate::error::InventoryError;

/// `plg_inventory_snapshot`: one row per `<cluster>::<type>::<ns|'cluster'>::<id>`.
/// Partitioned by `clusterId`/`resourceType` so a per-cluster or
/// per-resource-type sweep never needs a full scan.
pub fn snapshot_resource_schema(name: impl Into<String>) -> ResourceSchema {
    ResourceSchema {
        name: ResourceName::new(name),
        attributes: vec![
            AttributeDef { name: "id".into(), attr_type: AttributeType::String, required: true },
            AttributeDef { name: "cluster_id".into(), attr_type: AttributeType::String, required: true },
            AttributeDef { name: "resource_type".into(), attr_type: AttributeType::String, required: true },
        ],
        behavior: ResourceBehavior::BodyOnly,
        partitions: vec![
            PartitionDef { name: "byCluster".into(), fields: vec!["cluster_id".into()], max_length: None },
            PartitionDef { name: "byType".into(), fields: vec!["cluster_id".into(), "resource_type".into()], max_length: None },
        ],
        timestamps: false,
        async_partitions: true,
    }
}

/// `plg_inventory_version`: append-only, one row per captured revision.
pub fn version_resource_schema(name: impl Into<String>) -> ResourceSchema {
    ResourceSchema {
        name: ResourceName::new(name),
        attributes: vec![
            AttributeDef { name: "id".into(), attr_type: AttributeType::String, required: true },
            AttributeDef { name: "snapshot_id".into(), attr_type: AttributeType::String, required: true },
        ],
        behavior: ResourceBehavior::BodyOnly,
        partitions: vec![PartitionDef {
            name: "bySnapshot".into(),
            fields: vec!["snapshot_id".into()],
            max_length: None,
        }],
        timestamps: false,
        async_partitions: true,
    }
}

/// `plg_inventory_change`: one row per detected drift, keyed for both
/// per-cluster audit and per-resource history lookups.
pub fn change_resource_schema(name: impl Into<String>) -> ResourceSchema {
    ResourceSchema {
        name: ResourceName::new(name),
        attributes: vec![
            AttributeDef { name: "id".into(), attr_type: AttributeType::String, required: true },
            AttributeDef { name: "cluster_id".into(), attr_type: AttributeType::String, required: true },
            AttributeDef { name: "resource_id".into(), attr_type: AttributeType::String, required: true },
        ],
        behavior: ResourceBehavior::BodyOnly,
        partitions: vec![
            PartitionDef { name: "byCluster".into(), fields: vec!["cluster_id".into()], max_length: None },
            PartitionDef { name: "byResource".into(), fields: vec!["resource_id".into()], max_length: None },
        ],
        timestamps: false,
        async_partitions: true,
    }
}

fn to_fields<T: serde::Serialize>(value: &T) -> Result<HashMap<String, Value>, InventoryError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => unreachable!("inventory records always serialize to JSON objects"),
    }
}

pub fn snapshot_to_fields(
    snapshot: &InventorySnapshot,
    cluster_id: &str,
    resource_type: &str,
) -> Result<HashMap<String, Value>, InventoryError> {
    let mut fields = to_fields(snapshot)?;
    fields.insert("cluster_id".to_string(), Value::String(cluster_id.to_string()));
    fields.insert("resource_type".to_string(), Value::String(resource_type.to_string()));
    Ok(fields)
}

pub fn fields_to_snapshot(data: &HashMap<String, Value>) -> Result<InventorySnapshot, InventoryError> {
    Ok(serde_json::from_value(Value::Object(data.clone().into_iter().collect()))?)
}

pub fn version_to_fields(id: &str, version: &InventoryVersion) -> Result<HashMap<String, Value>, InventoryError> {
    let mut fields = to_fields(version)?;
    fields.insert("id".to_string(), Value::String(id.to_string()));
    Ok(fields)
}

pub fn fields_to_version(data: &HashMap<String, Value>) -> Result<InventoryVersion, InventoryError> {
    Ok(serde_json::from_value(Value::Object(data.clone().into_iter().collect()))?)
}

pub fn change_to_fields(id: &str, change: &InventoryChange) -> Result<HashMap<String, Value>, InventoryError> {
    let mut fields = to_fields(change)?;
    fields.insert("id".to_string(), Value::String(id.to_string()));
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn snapshot_round_trips_through_fields() {
        let snapshot = InventorySnapshot {
            id: "c1::Pod::default::web-0".into(),
            latest_digest: "abc".into(),
            latest_version: 1,
            changelog_size: 0,
            first_seen_at: Utc::now(),
            last_seen_at: Utc::now(),
            labels: HashMap::new(),
            annotations: HashMap::new(),
        };
        let fields = snapshot_to_fields(&snapshot, "c1", "Pod").unwrap();
        assert_eq!(fields.get("cluster_id").unwrap(), "c1");
        let back = fields_to_snapshot(&fields).unwrap();
        assert_eq!(back.id, snapshot.id);
    }
}
