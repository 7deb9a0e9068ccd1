//! Policy document loading
//!
//! Sources are tried in order: the Configuration Authority's policy
//! endpoint, then a local YAML file, then an empty default-deny document.
//! The engine never runs without a document.

use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{PolicyError, Result};
use crate::model::PolicyDoc;

/// Outcome of resolving the policy source chain.
pub struct ResolvedPolicy {
    pub doc: PolicyDoc,
    /// `authority`, `file`, or `default`
    pub source: String,
    /// Error from the last configured source that failed, if any.
    pub last_error: Option<PolicyError>,
}

/// Fetch the policy from the Configuration Authority.
pub async fn fetch_policy(client: &reqwest::Client, config_url: &str) -> Result<PolicyDoc> {
    let url = format!("{config_url}/api/v1/policy");
    let response = client
        .get(&url)
        .timeout(Duration::from_secs(5))
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(PolicyError::Upstream(format!(
            "policy endpoint returned {}",
            response.status()
        )));
    }
    Ok(response.json().await?)
}

/// Read a local YAML policy file.
pub fn read_policy_file(path: &Path) -> Result<PolicyDoc> {
    let text = std::fs::read_to_string(path)?;
    let value: serde_yaml::Value =
        serde_yaml::from_str(&text).map_err(|e| PolicyError::InvalidDocument(e.to_string()))?;
    if !value.is_mapping() {
        return Err(PolicyError::InvalidDocument(
            "policy_document_must_be_mapping".to_string(),
        ));
    }
    serde_yaml::from_value(value).map_err(|e| PolicyError::InvalidDocument(e.to_string()))
}

/// Walk the source chain. Always yields a document.
pub async fn resolve_policy(
    client: &reqwest::Client,
    config_url: Option<&str>,
    policy_path: Option<&Path>,
) -> ResolvedPolicy {
    let mut last_error = None;

    if let Some(url) = config_url {
        match fetch_policy(client, url).await {
            Ok(doc) => {
                info!("✅ Policy loaded from Configuration Authority ({} rules)", doc.rules.len());
                return ResolvedPolicy {
                    doc,
                    source: "authority".to_string(),
                    last_error: None,
                };
            }
            Err(err) => {
                warn!("⚠️ Authority policy unavailable, trying local file: {}", err);
                last_error = Some(err);
            }
        }
    }

    if let Some(path) = policy_path {
        match read_policy_file(path) {
            Ok(doc) => {
                info!("✅ Policy loaded from {} ({} rules)", path.display(), doc.rules.len());
                return ResolvedPolicy {
                    doc,
                    source: "file".to_string(),
                    last_error: None,
                };
            }
            Err(err) => {
                warn!("⚠️ Local policy file unusable: {}", err);
                last_error = Some(err);
            }
        }
    }

    warn!("⚠️ No policy source available; running default-deny");
    ResolvedPolicy {
        doc: PolicyDoc::default(),
        source: "default".to_string(),
        last_error,
    }
}
