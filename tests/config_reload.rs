//! Configuration Authority reload behavior: last-known-good, seen-hash
//! advance, and force reload.

use std::sync::Arc;
use std::time::Duration;

use wallgrid_config::events::ReloadEventLog;
use wallgrid_config::ConfigWatcher;

const GOOD: &str = r#"
platform: { version: "1.0.0", max_concurrent_streams: 64 }
walls:
  - id: wall-a
    type: tiles
    classification: unclassified
    latency_class: interactive
    grid: { rows: 2, cols: 2 }
"#;

const BROKEN: &str = r#"
platform: { version: "1.0.0", max_concurrent_streams: 64 }
walls:
  - id: wall-a
    type: tiles
    classification: unclassified
    latency_class: interactive
"#;

#[tokio::test]
async fn broken_reload_keeps_previous_snapshot_and_surfaces_error() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("platform.yaml");
    let events_path = dir.path().join("events.jsonl");
    std::fs::write(&config_path, GOOD).unwrap();

    let watcher = Arc::new(ConfigWatcher::new(
        &config_path,
        Duration::from_secs(5),
        ReloadEventLog::new(&events_path),
    ));
    watcher.load_initial().await.unwrap();
    let good_hash = watcher.current().await.unwrap().derived.config_hash.clone();

    // a tiled wall without a grid fails validation
    std::fs::write(&config_path, BROKEN).unwrap();
    assert!(watcher.check_and_reload().await.is_none());

    let health = watcher.health().await;
    assert_eq!(health.status, "ok");
    assert_eq!(health.config_hash.as_deref(), Some(good_hash.as_str()));
    assert!(health.last_error.is_some());

    // the broken bytes were marked seen and are not retried...
    assert!(watcher.check_and_reload().await.is_none());
    // ...until a force reload resets the seen hash
    assert!(watcher.force_reload().await.is_none());
    let health = watcher.health().await;
    assert!(health.last_error.is_some());

    // the event log recorded both outcomes
    let log = std::fs::read_to_string(&events_path).unwrap();
    assert!(log.lines().any(|l| l.contains("config_applied")));
    assert!(log.lines().any(|l| l.contains("config_rejected")));
}

#[tokio::test]
async fn fixed_file_recovers_and_clears_error() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("platform.yaml");
    std::fs::write(&config_path, GOOD).unwrap();

    let watcher = Arc::new(ConfigWatcher::new(
        &config_path,
        Duration::from_secs(5),
        ReloadEventLog::new(dir.path().join("events.jsonl")),
    ));
    watcher.load_initial().await.unwrap();

    std::fs::write(&config_path, BROKEN).unwrap();
    watcher.check_and_reload().await;
    assert!(watcher.health().await.last_error.is_some());

    let repaired = GOOD.replace("rows: 2", "rows: 3");
    std::fs::write(&config_path, &repaired).unwrap();
    let snapshot = watcher.check_and_reload().await.unwrap();
    assert_eq!(snapshot.derived.total_tiles, 6);

    let health = watcher.health().await;
    assert_eq!(health.status, "ok");
    assert!(health.last_error.is_none());
}
