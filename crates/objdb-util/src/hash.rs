use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Serializes `value` to canonical JSON — object keys sorted recursively,
/// arrays left in source order — and returns the SHA-256 hex digest.
///
/// Two values with the same canonical JSON always hash identically
/// regardless of field insertion order; this is the sole primitive the
/// inventory engine uses to detect configuration drift.
pub fn content_digest<T: Serialize>(value: &T) -> String {
    let v = serde_json::to_value(value).unwrap_or(Value::Null);
    let canonical = stable_json(v);
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    format!("{digest:x}")
}

/// Recursively sorts JSON object keys so map field ordering never affects a
/// downstream hash or string comparison.
pub fn stable_json(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, stable_json(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(stable_json).collect()),
        other => other,
    }
}

/// Renders `value` as a canonical JSON string — keys sorted, no extra
/// whitespace — suitable for digesting or for byte-for-byte comparison.
pub fn stable_json_string<T: Serialize>(value: &T) -> String {
    let v = serde_json::to_value(value).unwrap_or(Value::Null);
    serde_json::to_string(&stable_json(v)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn digest_is_insensitive_to_key_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(content_digest(&a), content_digest(&b));
    }

    #[test]
    fn digest_is_sensitive_to_array_order() {
        let a = json!({"xs": [1, 2, 3]});
        let b = json!({"xs": [3, 2, 1]});
        assert_ne!(content_digest(&a), content_digest(&b));
    }

    #[test]
    fn digest_is_sensitive_to_value_change() {
        let a = json!({"spec": {"replicas": 3}});
        let b = json!({"spec": {"replicas": 4}});
        assert_ne!(content_digest(&a), content_digest(&b));
    }

    #[test]
    fn nested_object_keys_are_sorted() {
        let v = json!({"z": {"y": 1, "x": 2}, "a": 1});
        let s = stable_json_string(&v);
        assert_eq!(s, r#"{"a":1,"z":{"x":2,"y":1}}"#);
    }

    proptest::proptest! {
        #[test]
        fn digest_equal_for_permuted_keys(a in 0i64..1000, b in 0i64..1000) {
            let v1 = json!({"a": a, "b": b});
            let v2 = json!({"b": b, "a": a});
            proptest::prop_assert_eq!(content_digest(&v1), content_digest(&v2));
        }
    }
}
