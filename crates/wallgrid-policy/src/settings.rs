//! Environment-driven settings for the Policy Engine

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Settings for the Policy Engine service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySettings {
    /// Listen address, e.g. `0.0.0.0:8001`
    pub listen: String,
    /// Configuration Authority base URL; empty disables the source
    pub config_url: String,
    /// Local policy YAML fallback; empty disables the source
    pub policy_path: String,
    /// Management Service base URL for tag enrichment
    pub mgmt_url: String,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8001".to_string(),
            config_url: "http://wallgrid-config:8006".to_string(),
            policy_path: "/etc/wallgrid/policy.yaml".to_string(),
            mgmt_url: "http://wallgrid-mgmt:8000".to_string(),
        }
    }
}

impl PolicySettings {
    /// Load from `WALLGRID_*` environment variables over defaults.
    pub fn from_env() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed("WALLGRID_"))
            .extract()
    }

    pub fn config_url_opt(&self) -> Option<&str> {
        if self.config_url.is_empty() {
            None
        } else {
            Some(&self.config_url)
        }
    }

    pub fn policy_path_opt(&self) -> Option<&std::path::Path> {
        if self.policy_path.is_empty() {
            None
        } else {
            Some(std::path::Path::new(&self.policy_path))
        }
    }
}
