//! Rule evaluation
//!
//! [`evaluate`] is pure: the decision depends only on the document, the
//! request, and the fetched tag sets. The [`PolicyEngine`] wrapper holds
//! the current document under a readers-writer lock; a reload swaps the
//! whole document in one write.

use metrics::counter;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::model::{EvalRequest, EvalResponse, MatchedRule, PolicyDoc};

fn in_allow_list(doc: &PolicyDoc, operator_id: &str, wall_id: i64, source_id: i64) -> bool {
    doc.allow_list.iter().any(|entry| {
        let op = entry
            .get("operator_id")
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        let wall = entry.get("wall_id").and_then(value_as_i64);
        let source = entry.get("source_id").and_then(value_as_i64);
        op == operator_id && wall == Some(wall_id) && source == Some(source_id)
    })
}

fn value_as_i64(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Evaluate a request against a policy document.
///
/// `source_tags` and `wall_tags` are the enrichment results; an
/// unreachable Management Service yields empty sets, which keeps the
/// decision deterministic and, absent an explicit allow, denying.
pub fn evaluate(
    doc: &PolicyDoc,
    req: &EvalRequest,
    source_tags: &[String],
    wall_tags: &[String],
) -> EvalResponse {
    let roles: BTreeSet<String> = req.operator_roles.iter().map(|r| r.to_lowercase()).collect();
    if roles.contains("admin") {
        return EvalResponse {
            allowed: true,
            reason: "admin_bypass".to_string(),
            matched_rules: vec![MatchedRule {
                id: "admin-bypass".to_string(),
                effect: None,
            }],
        };
    }

    let op_tags: BTreeSet<&str> = req.operator_tags.iter().map(String::as_str).collect();
    let s_tags: BTreeSet<&str> = source_tags.iter().map(String::as_str).collect();
    let w_tags: BTreeSet<&str> = wall_tags.iter().map(String::as_str).collect();

    let mut matched = Vec::new();

    for rule in &doc.rules {
        let effect = rule.effect.to_lowercase();

        let mut ok = true;
        for condition in rule.when.keys() {
            let holds = match condition.as_str() {
                "source_tags_subset_of_operator_tags" => s_tags.is_subset(&op_tags),
                "source_tags_intersect_wall_tags" => !s_tags.is_disjoint(&w_tags),
                "in_explicit_allow_list" => {
                    in_allow_list(doc, &req.operator_id, req.wall_id, req.source_id)
                }
                "always" => true,
                // unknown condition names never match
                _ => false,
            };
            if !holds {
                ok = false;
                break;
            }
        }

        if ok {
            matched.push(MatchedRule {
                id: rule.id.clone(),
                effect: Some(effect.clone()),
            });
            let allowed = effect == "allow";
            let verb = if allowed { "allowed_by" } else { "denied_by" };
            return EvalResponse {
                allowed,
                reason: format!("{verb}:{}", rule.id),
                matched_rules: matched,
            };
        }
    }

    EvalResponse {
        allowed: false,
        reason: doc.default_deny_reason(),
        matched_rules: matched,
    }
}

/// Holds the live policy document and serves evaluations.
pub struct PolicyEngine {
    doc: RwLock<Arc<PolicyDoc>>,
    source: RwLock<String>,
}

impl PolicyEngine {
    pub fn new(doc: PolicyDoc, source: impl Into<String>) -> Self {
        Self {
            doc: RwLock::new(Arc::new(doc)),
            source: RwLock::new(source.into()),
        }
    }

    /// Current document.
    pub async fn document(&self) -> Arc<PolicyDoc> {
        self.doc.read().await.clone()
    }

    /// Where the current document came from (`authority`, `file`, `default`).
    pub async fn source(&self) -> String {
        self.source.read().await.clone()
    }

    /// Atomically replace the document.
    pub async fn replace(&self, doc: PolicyDoc, source: impl Into<String>) {
        let source = source.into();
        *self.doc.write().await = Arc::new(doc);
        *self.source.write().await = source.clone();
        info!("🔄 Policy document replaced (source: {})", source);
    }

    /// Evaluate against the current document.
    pub async fn evaluate(
        &self,
        req: &EvalRequest,
        source_tags: &[String],
        wall_tags: &[String],
    ) -> EvalResponse {
        let doc = self.document().await;
        let decision = evaluate(&doc, req, source_tags, wall_tags);
        counter!(
            "policy.evaluations",
            "allowed" => if decision.allowed { "true" } else { "false" }
        )
        .increment(1);
        debug!(
            "⚖️ policy decision operator={} wall={} source={} allowed={} reason={}",
            req.operator_id, req.wall_id, req.source_id, decision.allowed, decision.reason
        );
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PolicyRule;
    use std::collections::BTreeMap;
    use test_log::test;

    fn rule(id: &str, effect: &str, conditions: &[&str]) -> PolicyRule {
        PolicyRule {
            id: id.to_string(),
            effect: effect.to_string(),
            description: String::new(),
            when: conditions
                .iter()
                .map(|c| (c.to_string(), serde_json::Value::Bool(true)))
                .collect(),
        }
    }

    fn request(roles: &[&str], tags: &[&str]) -> EvalRequest {
        EvalRequest {
            wall_id: 1,
            source_id: 2,
            operator_id: "op-1".to_string(),
            operator_roles: roles.iter().map(|s| s.to_string()).collect(),
            operator_tags: tags.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_admin_bypass_beats_deny_rules() {
        let doc = PolicyDoc {
            rules: vec![rule("deny-everything", "deny", &["always"])],
            ..Default::default()
        };
        let decision = evaluate(&doc, &request(&["Admin"], &[]), &[], &[]);
        assert!(decision.allowed);
        assert_eq!(decision.reason, "admin_bypass");
        assert_eq!(decision.matched_rules.len(), 1);
        assert_eq!(decision.matched_rules[0].id, "admin-bypass");
        assert!(decision.matched_rules[0].effect.is_none());
    }

    #[test]
    fn test_subset_match_allows() {
        let doc = PolicyDoc {
            rules: vec![rule("rule-1", "allow", &["source_tags_subset_of_operator_tags"])],
            ..Default::default()
        };
        let decision = evaluate(
            &doc,
            &request(&["operator"], &["C", "ops", "briefing"]),
            &strings(&["C", "ops"]),
            &[],
        );
        assert!(decision.allowed);
        assert_eq!(decision.reason, "allowed_by:rule-1");
    }

    #[test]
    fn test_subset_mismatch_falls_through_to_default_deny() {
        let doc = PolicyDoc {
            rules: vec![rule("rule-1", "allow", &["source_tags_subset_of_operator_tags"])],
            ..Default::default()
        };
        let decision = evaluate(
            &doc,
            &request(&["operator"], &["ops"]),
            &strings(&["C", "ops"]),
            &[],
        );
        assert!(!decision.allowed);
        assert_eq!(decision.reason, "default_deny");
        assert!(decision.matched_rules.is_empty());
    }

    #[test]
    fn test_wall_intersection_condition() {
        let doc = PolicyDoc {
            rules: vec![rule("geo", "allow", &["source_tags_intersect_wall_tags"])],
            ..Default::default()
        };
        let allowed = evaluate(
            &doc,
            &request(&[], &[]),
            &strings(&["mission:alpha"]),
            &strings(&["mission:alpha", "floor:2"]),
        );
        assert!(allowed.allowed);

        let denied = evaluate(
            &doc,
            &request(&[], &[]),
            &strings(&["mission:beta"]),
            &strings(&["mission:alpha"]),
        );
        assert!(!denied.allowed);
    }

    #[test]
    fn test_explicit_allow_list_with_string_ids() {
        let doc = PolicyDoc {
            rules: vec![rule("al", "allow", &["in_explicit_allow_list"])],
            allow_list: vec![serde_json::json!({
                "operator_id": "op-1", "wall_id": "1", "source_id": 2
            })],
            ..Default::default()
        };
        let decision = evaluate(&doc, &request(&[], &[]), &[], &[]);
        assert!(decision.allowed);
        assert_eq!(decision.reason, "allowed_by:al");
    }

    #[test]
    fn test_first_match_wins_in_declaration_order() {
        let doc = PolicyDoc {
            rules: vec![
                rule("deny-first", "deny", &["always"]),
                rule("allow-later", "allow", &["always"]),
            ],
            ..Default::default()
        };
        let decision = evaluate(&doc, &request(&["viewer"], &[]), &[], &[]);
        assert!(!decision.allowed);
        assert_eq!(decision.reason, "denied_by:deny-first");
        assert_eq!(decision.matched_rules.len(), 1);
    }

    #[test]
    fn test_unknown_condition_fails_the_rule() {
        let doc = PolicyDoc {
            rules: vec![
                rule("weird", "allow", &["phase_of_the_moon"]),
                rule("fallback", "deny", &["always"]),
            ],
            ..Default::default()
        };
        let decision = evaluate(&doc, &request(&[], &[]), &[], &[]);
        assert_eq!(decision.reason, "denied_by:fallback");
    }

    #[test]
    fn test_conjunction_requires_all_conditions() {
        let doc = PolicyDoc {
            rules: vec![rule(
                "both",
                "allow",
                &["source_tags_subset_of_operator_tags", "source_tags_intersect_wall_tags"],
            )],
            ..Default::default()
        };
        // subset holds, intersection does not
        let decision = evaluate(
            &doc,
            &request(&[], &["a"]),
            &strings(&["a"]),
            &strings(&["b"]),
        );
        assert!(!decision.allowed);
    }

    #[test]
    fn test_custom_default_deny_reason() {
        let mut defaults = BTreeMap::new();
        defaults.insert("deny_reason".to_string(), "not_cleared".to_string());
        let doc = PolicyDoc {
            defaults,
            ..Default::default()
        };
        let decision = evaluate(&doc, &request(&[], &[]), &[], &[]);
        assert_eq!(decision.reason, "not_cleared");
    }

    #[test]
    fn test_evaluation_is_pure() {
        let doc = PolicyDoc {
            rules: vec![rule("r", "allow", &["source_tags_subset_of_operator_tags"])],
            ..Default::default()
        };
        let req = request(&["operator"], &["x", "y"]);
        let tags = strings(&["x"]);
        let a = evaluate(&doc, &req, &tags, &[]);
        let b = evaluate(&doc, &req, &tags, &[]);
        assert_eq!(a.allowed, b.allowed);
        assert_eq!(a.reason, b.reason);
        assert_eq!(a.matched_rules.len(), b.matched_rules.len());
    }

    #[tokio::test]
    async fn test_engine_reload_is_atomic_swap() {
        let engine = PolicyEngine::new(PolicyDoc::default(), "default");
        let before = engine
            .evaluate(&request(&[], &[]), &[], &[])
            .await;
        assert!(!before.allowed);

        engine
            .replace(
                PolicyDoc {
                    rules: vec![rule("open", "allow", &["always"])],
                    ..Default::default()
                },
                "file",
            )
            .await;
        let after = engine.evaluate(&request(&[], &[]), &[], &[]).await;
        assert!(after.allowed);
        assert_eq!(engine.source().await, "file");
    }
}
