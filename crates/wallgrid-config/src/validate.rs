//! Semantic validation beyond what the schema can express

use serde_json::Value;
use std::collections::BTreeSet;

fn ids_of(doc: &Value, section: &str) -> Vec<String> {
    doc.get(section)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    item.get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Semantic checks: unique wall/source ids, disjoint id namespaces, and the
/// tiles→grid / bigscreen→screens pairing restated for defense in depth.
pub fn validate_semantic(doc: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    let wall_ids = ids_of(doc, "walls");
    let mut seen = BTreeSet::new();
    for id in &wall_ids {
        if !seen.insert(id.clone()) {
            errors.push(format!("Duplicate wall id: '{id}'"));
        }
    }

    let source_ids = ids_of(doc, "sources");
    let mut seen = BTreeSet::new();
    for id in &source_ids {
        if !seen.insert(id.clone()) {
            errors.push(format!("Duplicate source id: '{id}'"));
        }
    }

    let walls: BTreeSet<&String> = wall_ids.iter().collect();
    let sources: BTreeSet<&String> = source_ids.iter().collect();
    let overlap: Vec<&str> = walls.intersection(&sources).map(|s| s.as_str()).collect();
    if !overlap.is_empty() {
        errors.push(format!(
            "IDs used in both walls and sources: {}",
            overlap.join(", ")
        ));
    }

    if let Some(walls) = doc.get("walls").and_then(Value::as_array) {
        for wall in walls {
            let kind = wall.get("type").and_then(Value::as_str).unwrap_or_default();
            let id = wall.get("id").and_then(Value::as_str).unwrap_or("?");
            if kind == "tiles" && wall.get("grid").is_none() {
                errors.push(format!("Wall '{id}': type=tiles requires 'grid'"));
            }
            if kind == "bigscreen" && wall.get("screens").is_none() {
                errors.push(format!("Wall '{id}': type=bigscreen requires 'screens'"));
            }
        }
    }

    errors
}
