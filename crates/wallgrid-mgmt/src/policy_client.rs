//! Policy Engine client
//!
//! The management service never decides access itself; it proxies to the
//! Policy Engine and treats any transport failure or non-200 as a 502
//! `policy_service_error` (fail closed).

use std::time::Duration;
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::models::{PolicyEvalRequest, PolicyEvalResponse};

/// Evaluate a request against the Policy Engine.
pub async fn evaluate(
    client: &reqwest::Client,
    policy_url: &str,
    req: &PolicyEvalRequest,
) -> ApiResult<PolicyEvalResponse> {
    let url = format!("{policy_url}/evaluate");
    let response = client
        .post(&url)
        .timeout(Duration::from_secs(5))
        .json(req)
        .send()
        .await
        .map_err(|e| {
            warn!("⚠️ Policy Engine unreachable: {}", e);
            ApiError::Upstream("policy_service_error".into())
        })?;

    if !response.status().is_success() {
        warn!("⚠️ Policy Engine returned {}", response.status());
        return Err(ApiError::Upstream("policy_service_error".into()));
    }
    response
        .json()
        .await
        .map_err(|_| ApiError::Upstream("policy_service_error".into()))
}
