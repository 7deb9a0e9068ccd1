//! Wallgrid Policy Engine
//!
//! Decides whether an operator may view a given source on a given wall.
//! Rule matching is a pure function over tag sets with deterministic rule
//! ordering and a default-deny posture; tag fetching is the only I/O and
//! sits behind a lookup seam so decisions stay exhaustively testable.

pub mod engine;
pub mod enrich;
pub mod error;
pub mod loader;
pub mod model;
pub mod service;
pub mod settings;

pub use engine::{evaluate, PolicyEngine};
pub use enrich::{MgmtTagLookup, TagLookup};
pub use error::{PolicyError, Result};
pub use model::{EvalRequest, EvalResponse, PolicyDoc};
