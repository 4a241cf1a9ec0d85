use std::collections::HashMap;

use objdb_types::PartitionDef;
use serde_json::Value;

/// Projects a record's declared fields into the partition value used as the
/// index key's second segment. Multiple fields join with `/`; `max_length`
/// truncates the joined string (the `string|maxlength:N` projection,
/// typically an ISO date prefix).
pub fn partition_value(def: &PartitionDef, data: &HashMap<String, Value>) -> Option<String> {
    let parts: Vec<String> = def
        .fields
        .iter()
        .map(|f| match data.get(f) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        })
        .collect();
    if parts.iter().all(|p| p.is_empty()) {
        return None;
    }
    let joined = parts.join("/");
    Some(match def.max_length {
        Some(n) => joined.chars().take(n).collect(),
        None => joined,
    })
}

/// `<resource>/_partitions/<partitionName>/<partitionValue>/<id>`.
pub fn partition_key(resource: &str, partition_name: &str, value: &str, id: &str) -> String {
    format!("{resource}/_partitions/{partition_name}/{value}/{id}")
}

/// Prefix used by `listPartition` to scope the listing to one partition
/// value (or the whole partition when `value` is `None`).
pub fn partition_prefix(resource: &str, partition_name: &str, value: Option<&str>) -> String {
    match value {
        Some(v) => format!("{resource}/_partitions/{partition_name}/{v}/"),
        None => format!("{resource}/_partitions/{partition_name}/"),
    }
}
