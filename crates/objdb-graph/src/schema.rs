use std::collections::HashMap;

use objdb_types::{AttributeDef, AttributeType, EdgeRecord, PartitionDef, ResourceBehavior, ResourceName, ResourceSchema};
use serde_json::Value;

use crate::error::GraphError;

/// Edge resource schema: partitioned on source, target and label so
/// `bySource`/`byTarget`/`byLabel` lookups never require a full scan.
pub fn edge_resource_schema(name: impl Into<String>) -> ResourceSchema {
    ResourceSchema {
        name: ResourceName::new(name),
        attributes: vec![
            AttributeDef { name: "id".into(), attr_type: AttributeType::String, required: true },
            AttributeDef { name: "source_field".into(), attr_type: AttributeType::String, required: true },
            AttributeDef { name: "target_field".into(), attr_type: AttributeType::String, required: true },
        ],
        behavior: ResourceBehavior::BodyOnly,
        partitions: vec![
            PartitionDef { name: "bySource".into(), fields: vec!["source_field".into()], max_length: None },
            PartitionDef { name: "byTarget".into(), fields: vec!["target_field".into()], max_length: None },
            PartitionDef { name: "byLabel".into(), fields: vec!["label_field".into()], max_length: None },
        ],
        timestamps: false,
        async_partitions: false,
    }
}

pub fn edge_to_fields(edge: &EdgeRecord) -> Result<HashMap<String, Value>, GraphError> {
    match serde_json::to_value(edge)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => Err(GraphError::MalformedEdge("edge record did not serialize to an object".to_string())),
    }
}

pub fn fields_to_edge(data: &HashMap<String, Value>) -> Result<EdgeRecord, GraphError> {
    let value = Value::Object(data.clone().into_iter().collect());
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_round_trips_through_fields() {
        let edge = EdgeRecord {
            id: "e1".into(),
            source_field: "a".into(),
            target_field: "b".into(),
            label_field: Some("knows".into()),
            weight_field: Some(2.5),
            snapshot: None,
            reverse: false,
            original_edge: None,
        };
        let fields = edge_to_fields(&edge).unwrap();
        let back = fields_to_edge(&fields).unwrap();
        assert_eq!(back.source_field, "a");
        assert_eq!(back.target_field, "b");
        assert_eq!(back.weight_field, Some(2.5));
    }
}
