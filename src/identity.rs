//! Content-independent identity hashes.
//!
//! Datasets and measures describe themselves with a small JSON map of their
//! configuration. The hash is SHA-256 over the canonical serialization of that
//! map (keys sorted at every level), so it never depends on loaded spectra.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Canonical parameter map describing a configured entity.
pub type Descriptor = Map<String, Value>;

/// Build a descriptor from `(key, value)` pairs.
pub fn descriptor<I, K>(fields: I) -> Descriptor
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    fields.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Hex SHA-256 of the canonical JSON form of `value`.
pub fn consistent_hash(value: &Value) -> String {
    let canonical = canonicalize(value).to_string();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

pub fn descriptor_hash(descriptor: &Descriptor) -> String {
    consistent_hash(&Value::Object(descriptor.clone()))
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Value::Object(
                keys.into_iter()
                    .map(|k| (k.clone(), canonicalize(&map[k])))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insertion_order_does_not_matter() {
        let a = descriptor([("name", json!("GNPS")), ("tolerance", json!(0.1))]);
        let b = descriptor([("tolerance", json!(0.1)), ("name", json!("GNPS"))]);
        assert_eq!(descriptor_hash(&a), descriptor_hash(&b));
    }

    #[test]
    fn any_field_change_changes_hash() {
        let a = descriptor([("name", json!("GNPS")), ("tolerance", json!(0.1))]);
        let b = descriptor([("name", json!("GNPS")), ("tolerance", json!(0.01))]);
        assert_ne!(descriptor_hash(&a), descriptor_hash(&b));
        assert_eq!(descriptor_hash(&a).len(), 64);
    }
}
