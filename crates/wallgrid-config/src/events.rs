//! Reload event log
//!
//! Append-only JSONL record of every reload outcome. Writing is
//! best-effort: a failure to record an event must never fail the reload
//! that produced it.

use chrono::{SecondsFormat, Utc};
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

/// Append-only JSONL log of `config_applied` / `config_rejected` events.
#[derive(Debug, Clone)]
pub struct ReloadEventLog {
    path: PathBuf,
}

impl ReloadEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one event line: `{ts, event, old_hash, new_hash, source, error?}`.
    pub fn append(
        &self,
        event: &str,
        old_hash: &str,
        new_hash: &str,
        source: &str,
        error: Option<&str>,
    ) {
        let mut entry = json!({
            "ts": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            "event": event,
            "old_hash": old_hash,
            "new_hash": new_hash,
            "source": source,
        });
        if let Some(err) = error {
            entry["error"] = json!(err);
        }

        if let Err(e) = self.write_line(&entry) {
            warn!("⚠️ Failed to write reload event log: {}", e);
        }
    }

    fn write_line(&self, entry: &serde_json::Value) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{entry}")?;
        Ok(())
    }
}
