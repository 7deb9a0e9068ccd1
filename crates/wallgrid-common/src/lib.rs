//! Wallgrid Common Library
//!
//! Shared building blocks for the Wallgrid control plane: the error type
//! used across services and the canonical JSON encoding that both the
//! configuration hash and the audit chain depend on.

pub mod canonical;
pub mod error;

pub use canonical::{canonical_json, sha256_hex, ZERO_HASH};
pub use error::{Result, WallgridError};
