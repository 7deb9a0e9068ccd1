//! Environment-driven settings for the Configuration Authority

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Settings for the Configuration Authority service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthoritySettings {
    /// Listen address, e.g. `0.0.0.0:8006`
    pub listen: String,
    /// Path of the declarative platform YAML
    pub config_path: String,
    /// File poll interval in seconds
    pub config_poll_interval_s: u64,
    /// JSONL reload event log path
    pub config_event_log: String,
}

impl Default for AuthoritySettings {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8006".to_string(),
            config_path: "/etc/wallgrid/platform-config.yaml".to_string(),
            config_poll_interval_s: 5,
            config_event_log: "/var/lib/wallgrid/config-events.jsonl".to_string(),
        }
    }
}

impl AuthoritySettings {
    /// Load from `WALLGRID_*` environment variables over defaults.
    pub fn from_env() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed("WALLGRID_"))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_defaults() {
        let settings = AuthoritySettings::default();
        assert_eq!(settings.config_poll_interval_s, 5);
        assert!(settings.config_path.ends_with("platform-config.yaml"));
    }

    #[test]
    fn test_env_override() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("WALLGRID_CONFIG_POLL_INTERVAL_S", "11");
            jail.set_env("WALLGRID_CONFIG_PATH", "/tmp/p.yaml");
            let settings = AuthoritySettings::from_env().unwrap();
            assert_eq!(settings.config_poll_interval_s, 11);
            assert_eq!(settings.config_path, "/tmp/p.yaml");
            Ok(())
        });
    }
}
