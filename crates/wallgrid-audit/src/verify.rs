//! Forward chain verification
//!
//! Walks events oldest-first, tracking the expected previous hash, and
//! reports every broken link without aborting the walk. Two breakage
//! kinds: `prev_hash_mismatch` (the link does not point at its
//! predecessor) and `hash_mismatch` (the event's own hash does not match
//! its recomputed core).

use serde::{Deserialize, Serialize};
use wallgrid_common::ZERO_HASH;

use crate::chain::{chain_hash, event_core, AuditEvent};

/// One broken link in a chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokenEvent {
    pub id: i64,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_prev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found_prev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found: Option<String>,
}

/// Result of a verification walk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyReport {
    pub chain_id: String,
    pub checked: usize,
    pub verified: usize,
    pub broken: Vec<BrokenEvent>,
}

/// Verify a forward-ordered slice of events belonging to one chain.
pub fn verify_events(chain_id: &str, events: &[AuditEvent]) -> VerifyReport {
    let mut expected_prev = ZERO_HASH.to_string();
    let mut verified = 0usize;
    let mut broken = Vec::new();

    for ev in events {
        if ev.prev_hash != expected_prev {
            broken.push(BrokenEvent {
                id: ev.id,
                reason: "prev_hash_mismatch".to_string(),
                expected_prev: Some(expected_prev.clone()),
                found_prev: Some(ev.prev_hash.clone()),
                expected: None,
                found: None,
            });
            expected_prev = ev.hash.clone();
            continue;
        }

        let core = event_core(
            &ev.ts,
            &ev.chain_id,
            &ev.action,
            &ev.actor,
            &ev.object_type,
            &ev.object_id,
            &ev.details,
        );
        let recomputed = chain_hash(&expected_prev, &core);
        if recomputed != ev.hash {
            broken.push(BrokenEvent {
                id: ev.id,
                reason: "hash_mismatch".to_string(),
                expected_prev: None,
                found_prev: None,
                expected: Some(recomputed),
                found: Some(ev.hash.clone()),
            });
        } else {
            verified += 1;
        }
        expected_prev = ev.hash.clone();
    }

    VerifyReport {
        chain_id: chain_id.to_string(),
        checked: events.len(),
        verified,
        broken,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::truncate_to_micros;
    use chrono::Utc;
    use test_log::test;

    fn build_chain(chain_id: &str, n: usize) -> Vec<AuditEvent> {
        let mut events = Vec::new();
        let mut prev = ZERO_HASH.to_string();
        for i in 0..n {
            let ts = truncate_to_micros(Utc::now());
            let details = serde_json::json!({"seq": i});
            let core = event_core(&ts, chain_id, "walls.update", "alice", "wall", "7", &details);
            let hash = chain_hash(&prev, &core);
            events.push(AuditEvent {
                id: i as i64 + 1,
                ts,
                chain_id: chain_id.to_string(),
                action: "walls.update".to_string(),
                actor: "alice".to_string(),
                object_type: "wall".to_string(),
                object_id: "7".to_string(),
                details,
                prev_hash: prev.clone(),
                hash: hash.clone(),
            });
            prev = hash;
        }
        events
    }

    #[test]
    fn test_intact_chain_verifies() {
        let events = build_chain("c1", 5);
        let report = verify_events("c1", &events);
        assert_eq!(report.checked, 5);
        assert_eq!(report.verified, 5);
        assert!(report.broken.is_empty());
    }

    #[test]
    fn test_tampered_details_breaks_exactly_one() {
        let mut events = build_chain("c1", 3);
        events[1].details = serde_json::json!({"seq": 99, "tampered": true});

        let report = verify_events("c1", &events);
        assert_eq!(report.checked, 3);
        assert_eq!(report.verified, 2);
        assert_eq!(report.broken.len(), 1);
        assert_eq!(report.broken[0].id, 2);
        assert_eq!(report.broken[0].reason, "hash_mismatch");
    }

    #[test]
    fn test_relinked_chain_reports_prev_mismatch() {
        let mut events = build_chain("c1", 3);
        events[2].prev_hash = ZERO_HASH.to_string();

        let report = verify_events("c1", &events);
        assert_eq!(report.broken.len(), 1);
        assert_eq!(report.broken[0].reason, "prev_hash_mismatch");
        // the walk resynchronizes on the stored hash and does not abort
        assert_eq!(report.checked, 3);
    }

    #[test]
    fn test_empty_chain() {
        let report = verify_events("c1", &[]);
        assert_eq!(report.checked, 0);
        assert_eq!(report.verified, 0);
        assert!(report.broken.is_empty());
    }
}
