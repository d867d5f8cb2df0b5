use serde_json::Value;
use sha2::{Digest, Sha256};

/// Length of the truncated hex digests used as audit identifiers.
pub const SHORT_HASH_LEN: usize = 8;

/// First [`SHORT_HASH_LEN`] hex chars of the SHA-256 digest of `bytes`.
pub fn short_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(SHORT_HASH_LEN);
    digest
}

/// Produce canonical JSON bytes: object keys sorted lexicographically
/// (recursive), arrays preserve order, no extra whitespace. Two values that
/// differ only in key insertion order serialize identically.
pub fn canonical_json_bytes(value: &Value) -> Vec<u8> {
    let sorted = sort_value(value);
    serde_json::to_vec(&sorted).expect("canonical JSON serialization should not fail")
}

/// Short content hash of a JSON value over its canonical byte form.
pub fn hash_value(value: &Value) -> String {
    short_hash(&canonical_json_bytes(value))
}

fn sort_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<(&String, Value)> =
                map.iter().map(|(k, v)| (k, sort_value(v))).collect();
            pairs.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> =
                pairs.into_iter().map(|(k, v)| (k.clone(), v)).collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hash_is_8_lowercase_hex() {
        let h = short_hash(b"hello");
        assert_eq!(h.len(), 8);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn keys_sorted_lexicographically() {
        let input: Value = serde_json::from_str(r#"{"z":1,"a":2,"m":3}"#).unwrap();
        let output = String::from_utf8(canonical_json_bytes(&input)).unwrap();
        assert_eq!(output, r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn nested_objects_sorted() {
        let input: Value = serde_json::from_str(r#"{"b":{"z":1,"a":2},"a":1}"#).unwrap();
        let output = String::from_utf8(canonical_json_bytes(&input)).unwrap();
        assert_eq!(output, r#"{"a":1,"b":{"a":2,"z":1}}"#);
    }

    #[test]
    fn arrays_preserve_order() {
        let input: Value = serde_json::from_str(r#"{"a":[3,1,2]}"#).unwrap();
        let output = String::from_utf8(canonical_json_bytes(&input)).unwrap();
        assert_eq!(output, r#"{"a":[3,1,2]}"#);
    }

    #[test]
    fn hash_value_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"issue":2,"add_labels":["a"]}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"add_labels":["a"],"issue":2}"#).unwrap();
        assert_eq!(hash_value(&a), hash_value(&b));
    }

    #[test]
    fn hash_value_distinguishes_content() {
        let a: Value = serde_json::from_str(r#"{"issue":2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"issue":3}"#).unwrap();
        assert_ne!(hash_value(&a), hash_value(&b));
    }
}
