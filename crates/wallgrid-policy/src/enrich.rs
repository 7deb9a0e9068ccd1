//! Tag enrichment
//!
//! Evaluation needs the wall's and source's tag lists, owned by the
//! Management Service. Lookup is fail-open: an unreachable peer yields
//! empty tag sets and the decision proceeds deterministically (usually
//! denying, absent an explicit allow).

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Seam between the pure evaluator and the Management Service.
#[async_trait]
pub trait TagLookup: Send + Sync {
    async fn wall_tags(&self, wall_id: i64) -> Vec<String>;
    async fn source_tags(&self, source_id: i64) -> Vec<String>;
}

/// Tag lookup against the Management Service REST API.
pub struct MgmtTagLookup {
    client: reqwest::Client,
    base_url: String,
}

impl MgmtTagLookup {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn fetch_tags(&self, path: &str) -> Vec<String> {
        let url = format!("{}{}", self.base_url, path);
        let result = async {
            let body: serde_json::Value =
                self.client.get(&url).send().await?.json().await?;
            Ok::<_, reqwest::Error>(
                body.get("tags")
                    .and_then(serde_json::Value::as_array)
                    .map(|tags| {
                        tags.iter()
                            .map(|t| match t {
                                serde_json::Value::String(s) => s.clone(),
                                other => other.to_string(),
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            )
        }
        .await;

        match result {
            Ok(tags) => tags,
            Err(err) => {
                debug!("⚠️ Tag lookup failed for {} (treating as empty): {}", url, err);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl TagLookup for MgmtTagLookup {
    async fn wall_tags(&self, wall_id: i64) -> Vec<String> {
        self.fetch_tags(&format!("/api/v1/walls/{wall_id}")).await
    }

    async fn source_tags(&self, source_id: i64) -> Vec<String> {
        self.fetch_tags(&format!("/api/v1/sources/{source_id}")).await
    }
}

/// Fixed tag sets, for tests and air-gapped evaluation.
#[derive(Debug, Default, Clone)]
pub struct StaticTagLookup {
    pub walls: std::collections::HashMap<i64, Vec<String>>,
    pub sources: std::collections::HashMap<i64, Vec<String>>,
}

#[async_trait]
impl TagLookup for StaticTagLookup {
    async fn wall_tags(&self, wall_id: i64) -> Vec<String> {
        self.walls.get(&wall_id).cloned().unwrap_or_default()
    }

    async fn source_tags(&self, source_id: i64) -> Vec<String> {
        self.sources.get(&source_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[tokio::test]
    async fn test_static_lookup() {
        let mut lookup = StaticTagLookup::default();
        lookup.walls.insert(1, vec!["mission:alpha".to_string()]);

        assert_eq!(lookup.wall_tags(1).await, vec!["mission:alpha".to_string()]);
        assert!(lookup.wall_tags(2).await.is_empty());
        assert!(lookup.source_tags(9).await.is_empty());
    }

    #[tokio::test]
    async fn test_mgmt_lookup_fails_open_on_unreachable_peer() {
        // nothing listens on this port; lookup must come back empty, not error
        let lookup = MgmtTagLookup::new("http://127.0.0.1:1");
        assert!(lookup.wall_tags(1).await.is_empty());
        assert!(lookup.source_tags(1).await.is_empty());
    }
}
