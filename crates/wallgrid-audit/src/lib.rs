//! Wallgrid Audit Chain
//!
//! Append-only, hash-chained event log backed by Postgres. Every
//! state-changing decision in the control plane lands here as an event
//! whose hash covers the previous event's hash, so any later tampering is
//! detectable by a forward walk over the chain.
//!
//! The crate is used two ways: embedded (the management service appends to
//! its own chain through [`chain::append_event`]) and standalone (the
//! `/ingest`, `/query`, `/verify`, `/export` HTTP surface in [`service`]).

pub mod chain;
pub mod error;
pub mod service;
pub mod settings;
pub mod store;
pub mod verify;

pub use chain::{append_event, append_event_tx, AuditEvent, NewEvent};
pub use error::{AuditError, Result};
pub use verify::{verify_events, BrokenEvent, VerifyReport};
