//! Canonical JSON encoding and content hashing
//!
//! Both the configuration hash and the audit chain hash the canonical
//! rendering of a JSON document: mapping keys sorted lexicographically at
//! every nesting level, no insignificant whitespace, `null`/`true`/`false`
//! spelled lowercase. The same encoder is used across all services so the
//! two hash domains can never drift apart.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt::Write as FmtWrite;

/// The prev-hash of the first event in a chain: sixty-four zero characters.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

fn sort_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k.clone(), sort_value(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_value).collect()),
        other => other.clone(),
    }
}

/// Render a JSON value canonically: sorted keys, compact separators.
///
/// Same input always yields the same bytes, so the derived SHA-256 is a
/// stable content address for the document.
pub fn canonical_json(value: &Value) -> String {
    serde_json::to_string(&sort_value(value)).unwrap_or_default()
}

/// Hex-encoded SHA-256 of arbitrary bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(64);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_sorted_keys() {
        let v = json!({"b": 1, "a": {"d": 2, "c": 3}});
        assert_eq!(canonical_json(&v), r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn test_no_whitespace_and_lowercase_scalars() {
        let v = json!({"x": [true, false, null], "y": "s p a c e"});
        assert_eq!(
            canonical_json(&v),
            r#"{"x":[true,false,null],"y":"s p a c e"}"#
        );
    }

    #[test]
    fn test_arrays_keep_order() {
        let v = json!([3, 1, 2]);
        assert_eq!(canonical_json(&v), "[3,1,2]");
    }

    #[test]
    fn test_sha256_hex() {
        // sha256("") is a well-known vector
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(ZERO_HASH.len(), 64);
    }

    fn arb_json() -> impl Strategy<Value = serde_json::Value> {
        let leaf = prop_oneof![
            Just(serde_json::Value::Null),
            any::<bool>().prop_map(serde_json::Value::from),
            any::<i64>().prop_map(serde_json::Value::from),
            "[a-z0-9_]{0,12}".prop_map(serde_json::Value::from),
        ];
        leaf.prop_recursive(4, 32, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(serde_json::Value::Array),
                prop::collection::btree_map("[a-z_]{1,8}", inner, 0..6).prop_map(|m| {
                    serde_json::Value::Object(m.into_iter().collect())
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn canonical_is_a_function(v in arb_json()) {
            prop_assert_eq!(canonical_json(&v), canonical_json(&v));
        }

        #[test]
        fn canonical_is_a_fixed_point(v in arb_json()) {
            let once = canonical_json(&v);
            let reparsed: serde_json::Value = serde_json::from_str(&once).unwrap();
            prop_assert_eq!(once, canonical_json(&reparsed));
        }

        #[test]
        fn hash_tracks_bytes(v in arb_json()) {
            let rendered = canonical_json(&v);
            prop_assert_eq!(
                sha256_hex(rendered.as_bytes()),
                sha256_hex(canonical_json(&v).as_bytes())
            );
        }
    }
}
