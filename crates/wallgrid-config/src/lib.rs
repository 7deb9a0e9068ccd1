//! Wallgrid Configuration Authority
//!
//! Single source of truth for declarative platform state. Loads and
//! validates the platform YAML (walls, sources, policy), computes derived
//! metrics, exposes a canonical JSON rendering with a content hash, and
//! watches the file for changes while keeping last-known-good on any
//! reload failure.

pub mod derived;
pub mod error;
pub mod events;
pub mod loader;
pub mod model;
pub mod schema;
pub mod service;
pub mod settings;
pub mod validate;
pub mod watcher;

pub use error::{ConfigError, Result};
pub use loader::{dry_run, load_config, load_config_file};
pub use model::ConfigSnapshot;
pub use watcher::ConfigWatcher;
