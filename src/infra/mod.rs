//! Infrastructure layer for the list provider.
//!
//! Contains trait definitions and implementations for:
//! - Shield queue storage (SQLite, in-memory)
//! - Ingest cursor storage
//! - POI event log (append-only, dense-indexed)
//! - Blocked-shield records
//! - Retry with exponential backoff for chain RPC

mod error;
pub mod memory;
mod retry;
pub mod sqlite;
mod traits;

pub use error::*;
pub use memory::{
    InMemoryBlockedShields, InMemoryPoiEventLog, InMemoryShieldQueue, InMemoryStatusStore,
};
pub use retry::{retry_with_config, RetryConfig};
pub use sqlite::{
    open, open_in_memory, SqliteBlockedShields, SqlitePoiEventLog, SqliteShieldQueue,
    SqliteStatusStore,
};
pub use traits::*;
