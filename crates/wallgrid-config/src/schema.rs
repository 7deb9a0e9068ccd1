//! JSONSchema validation (Draft 2020-12)
//!
//! The schema ships inside the binary; there is no runtime schema
//! discovery. Validation returns error strings shaped `path: message` so
//! the dry-run surface can forward them verbatim.

use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use serde_json::Value;

const SCHEMA_JSON: &str = include_str!("../schema/platform-config.schema.json");

static COMPILED: Lazy<JSONSchema> = Lazy::new(|| {
    let schema: Value =
        serde_json::from_str(SCHEMA_JSON).expect("embedded platform schema is valid JSON");
    JSONSchema::options()
        .with_draft(Draft::Draft202012)
        .compile(&schema)
        .expect("embedded platform schema compiles")
});

/// Validate a parsed document. Empty result means valid.
pub fn validate_schema(doc: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    if let Err(iter) = COMPILED.validate(doc) {
        for err in iter {
            let path = err
                .instance_path
                .to_string()
                .trim_start_matches('/')
                .replace('/', ".");
            if path.is_empty() {
                errors.push(err.to_string());
            } else {
                errors.push(format!("{path}: {err}"));
            }
        }
    }
    errors
}
