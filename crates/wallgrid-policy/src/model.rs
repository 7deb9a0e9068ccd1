//! Policy document and evaluation DTOs
//!
//! The document shape matches what the Configuration Authority publishes
//! on `/api/v1/policy`; a local YAML policy file uses the same shape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One access rule. `when` is a conjunction: every named condition must
/// evaluate true for the rule to match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: String,
    #[serde(default = "default_effect")]
    pub effect: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub when: BTreeMap<String, serde_json::Value>,
}

fn default_effect() -> String {
    "deny".to_string()
}

/// The full policy document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyDoc {
    #[serde(default)]
    pub taxonomy: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
    /// Entries of shape `{operator_id, wall_id, source_id}`; values are
    /// coerced leniently at evaluation time.
    #[serde(default)]
    pub allow_list: Vec<serde_json::Value>,
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

impl PolicyDoc {
    /// Deny reason used when no rule matches.
    pub fn default_deny_reason(&self) -> String {
        self.defaults
            .get("deny_reason")
            .cloned()
            .unwrap_or_else(|| "default_deny".to_string())
    }
}

/// An evaluation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRequest {
    pub wall_id: i64,
    pub source_id: i64,
    pub operator_id: String,
    #[serde(default)]
    pub operator_roles: Vec<String>,
    #[serde(default)]
    pub operator_tags: Vec<String>,
}

/// A rule that matched during evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedRule {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}

/// The evaluation decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResponse {
    pub allowed: bool,
    pub reason: String,
    #[serde(default)]
    pub matched_rules: Vec<MatchedRule>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_doc_deserializes_from_authority_shape() {
        let doc: PolicyDoc = serde_json::from_str(
            r#"{
                "taxonomy": {"classifications": ["unclassified", "secret"]},
                "rules": [
                    {"id": "r1", "effect": "allow",
                     "when": {"source_tags_subset_of_operator_tags": true}}
                ],
                "allow_list": [{"operator_id": "op-1", "wall_id": 1, "source_id": 2}],
                "defaults": {"deny_reason": "not_cleared"}
            }"#,
        )
        .unwrap();
        assert_eq!(doc.rules.len(), 1);
        assert_eq!(doc.default_deny_reason(), "not_cleared");
    }

    #[test]
    fn test_empty_doc_denies_by_default() {
        let doc = PolicyDoc::default();
        assert!(doc.rules.is_empty());
        assert_eq!(doc.default_deny_reason(), "default_deny");
    }
}
