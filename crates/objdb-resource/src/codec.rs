use std::collections::HashMap;

use bytes::Bytes;
use objdb_types::{AttributeType, ResourceBehavior, ResourceSchema};
use serde_json::Value;

use crate::error::ResourceError;

/// Encodes a record's field map into the object body/metadata split the
/// resource's declared [`ResourceBehavior`] calls for.
pub fn encode(
    schema: &ResourceSchema,
    data: &HashMap<String, Value>,
) -> Result<(Bytes, HashMap<String, String>), ResourceError> {
    match schema.behavior {
        ResourceBehavior::BodyOnly => {
            let body = Bytes::from(serde_json::to_vec(data)?);
            Ok((body, HashMap::new()))
        }
        ResourceBehavior::BodyOverflow => {
            let mut metadata = HashMap::new();
            let mut overflow = HashMap::new();
            for (key, value) in data {
                if fits_in_metadata(value) {
                    metadata.insert(key.clone(), scalar_to_string(value));
                } else {
                    overflow.insert(key.clone(), value.clone());
                }
            }
            let body = Bytes::from(serde_json::to_vec(&overflow)?);
            Ok((body, metadata))
        }
        ResourceBehavior::TruncateData => {
            let mut metadata = HashMap::new();
            for attr in &schema.attributes {
                if let Some(value) = data.get(&attr.name) {
                    metadata.insert(attr.name.clone(), scalar_to_string(value));
                }
            }
            Ok((Bytes::new(), metadata))
        }
    }
}

/// Reverses [`encode`], merging metadata and body back into one field map.
pub fn decode(
    schema: &ResourceSchema,
    body: &Bytes,
    metadata: &HashMap<String, String>,
) -> Result<HashMap<String, Value>, ResourceError> {
    match schema.behavior {
        ResourceBehavior::BodyOnly => {
            if body.is_empty() {
                Ok(HashMap::new())
            } else {
                Ok(serde_json::from_slice(body)?)
            }
        }
        ResourceBehavior::BodyOverflow => {
            let mut merged: HashMap<String, Value> = if body.is_empty() {
                HashMap::new()
            } else {
                serde_json::from_slice(body)?
            };
            for (key, value) in metadata {
                merged.entry(key.clone()).or_insert_with(|| string_to_scalar(value));
            }
            Ok(merged)
        }
        ResourceBehavior::TruncateData => {
            Ok(metadata.iter().map(|(k, v)| (k.clone(), string_to_scalar(v))).collect())
        }
    }
}

/// `body-overflow` keeps plain scalars in object metadata; anything
/// structural always spills to the body.
fn fits_in_metadata(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null)
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn string_to_scalar(s: &str) -> Value {
    serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string()))
}

/// Structural validation against declared attributes. Unknown fields are
/// tolerated except under `truncate-data`, where they are silently dropped
/// by [`encode`] rather than rejected.
pub fn validate(schema: &ResourceSchema, data: &HashMap<String, Value>) -> Result<(), ResourceError> {
    for attr in &schema.attributes {
        match data.get(&attr.name) {
            None => {
                if attr.required {
                    return Err(ResourceError::Validation(format!(
                        "missing required attribute '{}'",
                        attr.name
                    )));
                }
            }
            Some(value) => {
                if !matches_type(&attr.attr_type, value) {
                    return Err(ResourceError::Validation(format!(
                        "attribute '{}' expected {:?}, got {}",
                        attr.name, attr.attr_type, value
                    )));
                }
            }
        }
    }
    Ok(())
}

fn matches_type(attr_type: &AttributeType, value: &Value) -> bool {
    match attr_type {
        AttributeType::String => value.is_string(),
        AttributeType::Number => value.is_number(),
        AttributeType::Boolean => value.is_boolean(),
        AttributeType::Object => value.is_object(),
        AttributeType::Array => value.is_array(),
        AttributeType::Json => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objdb_types::{AttributeDef, ResourceName};
    use serde_json::json;

    fn schema(behavior: ResourceBehavior) -> ResourceSchema {
        ResourceSchema {
            name: ResourceName::new("widgets"),
            attributes: vec![
                AttributeDef { name: "name".into(), attr_type: AttributeType::String, required: true },
                AttributeDef { name: "tags".into(), attr_type: AttributeType::Array, required: false },
            ],
            behavior,
            partitions: vec![],
            timestamps: false,
            async_partitions: false,
        }
    }

    #[test]
    fn body_only_round_trips() {
        let s = schema(ResourceBehavior::BodyOnly);
        let mut data = HashMap::new();
        data.insert("name".to_string(), json!("widget-1"));
        data.insert("tags".to_string(), json!(["a", "b"]));
        let (body, meta) = encode(&s, &data).unwrap();
        assert!(meta.is_empty());
        let decoded = decode(&s, &body, &meta).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn body_overflow_splits_scalars_from_structural() {
        let s = schema(ResourceBehavior::BodyOverflow);
        let mut data = HashMap::new();
        data.insert("name".to_string(), json!("widget-1"));
        data.insert("tags".to_string(), json!(["a", "b"]));
        let (body, meta) = encode(&s, &data).unwrap();
        assert_eq!(meta.get("name"), Some(&"widget-1".to_string()));
        let overflow: HashMap<String, Value> = serde_json::from_slice(&body).unwrap();
        assert!(overflow.contains_key("tags"));
        let decoded = decode(&s, &body, &meta).unwrap();
        assert_eq!(decoded.get("name"), Some(&json!("widget-1")));
        assert_eq!(decoded.get("tags"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn truncate_data_drops_unknown_fields() {
        let s = schema(ResourceBehavior::TruncateData);
        let mut data = HashMap::new();
        data.insert("name".to_string(), json!("widget-1"));
        data.insert("secret".to_string(), json!("shh"));
        let (body, meta) = encode(&s, &data).unwrap();
        assert!(body.is_empty());
        assert!(!meta.contains_key("secret"));
        let decoded = decode(&s, &body, &meta).unwrap();
        assert!(!decoded.contains_key("secret"));
        assert_eq!(decoded.get("name"), Some(&json!("widget-1")));
    }

    #[test]
    fn validate_rejects_missing_required_attribute() {
        let s = schema(ResourceBehavior::BodyOnly);
        let data = HashMap::new();
        assert!(validate(&s, &data).is_err());
    }

    #[test]
    fn validate_rejects_type_mismatch() {
        let s = schema(ResourceBehavior::BodyOnly);
        let mut data = HashMap::new();
        data.insert("name".to_string(), json!(42));
        assert!(validate(&s, &data).is_err());
    }

    #[test]
    fn validate_allows_missing_optional_attribute() {
        let s = schema(ResourceBehavior::BodyOnly);
        let mut data = HashMap::new();
        data.insert("name".to_string(), json!("ok"));
        assert!(validate(&s, &data).is_ok());
    }
}
