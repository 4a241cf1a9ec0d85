use std::collections::HashMap;

use chrono::{DateTime, Utc};
use objdb_types::{AttributeDef, AttributeType, PartitionDef, ResourceBehavior, ResourceName, ResourceSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MetricsError;

/// One row per flush, recording a cumulative counter snapshot for one
/// `(resource, operation)` pair as of that flush.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRow {
    pub id: String,
    pub resource: String,
    pub operation: String,
    pub count: u64,
    pub total_time_ms: u64,
    pub errors: u64,
    pub date: String,
    pub flushed_at: DateTime<Utc>,
}

/// One row per failed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRow {
    pub id: String,
    pub resource: String,
    pub operation: String,
    pub message: String,
    pub date: String,
    pub timestamp: DateTime<Utc>,
}

/// One row per completed operation (successful or not), used for latency
/// analysis independent of the aggregated `plg_metrics` counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceRow {
    pub id: String,
    pub resource: String,
    pub operation: String,
    pub duration_ms: u64,
    pub success: bool,
    pub date: String,
    pub timestamp: DateTime<Utc>,
}

fn date_partitioned(name: &str) -> ResourceSchema {
    ResourceSchema {
        name: ResourceName::new(name),
        attributes: vec![
            AttributeDef { name: "id".into(), attr_type: AttributeType::String, required: true },
            AttributeDef { name: "date".into(), attr_type: AttributeType::String, required: true },
        ],
        behavior: ResourceBehavior::BodyOnly,
        partitions: vec![PartitionDef { name: "byDate".into(), fields: vec!["date".into()], max_length: None }],
        timestamps: false,
        async_partitions: true,
    }
}

pub fn metrics_resource_schema() -> ResourceSchema {
    date_partitioned("plg_metrics")
}

pub fn metrics_errors_resource_schema() -> ResourceSchema {
    date_partitioned("plg_metrics_errors")
}

pub fn metrics_performance_resource_schema() -> ResourceSchema {
    date_partitioned("plg_metrics_performance")
}

pub fn to_fields<T: Serialize>(row: &T) -> Result<HashMap<String, Value>, MetricsError> {
    match serde_json::to_value(row)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => unreachable!("metrics rows always serialize to JSON objects"),
    }
}
