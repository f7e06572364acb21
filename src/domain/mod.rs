//! Domain models for the POI list provider.
//!
//! Core types for shield ingestion, policy gating, and the signed per-list
//! event log.

mod blocked;
mod event;
mod shield;
mod types;

pub use blocked::*;
pub use event::*;
pub use shield::*;
pub use types::*;
