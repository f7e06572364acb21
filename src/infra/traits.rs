//! Trait definitions for the list-provider stores.
//!
//! Every store is exclusively owned by the list-provider process; peers only
//! ever see read-only views through the sync surface. Concurrency safety is
//! delegated to the store implementation, except for the POI event log whose
//! single-writer discipline is enforced by the event-queue coordinator.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::{
    ListKey, NetworkName, ShieldData, ShieldQueueItem, ShieldStatus, SignedBlockedShield,
    SignedPoiEvent,
};

use super::Result;

/// Per-network durable set of observed shields, keyed by
/// `(txid, commitment_hash)`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ShieldQueueStore: Send + Sync {
    /// Insert a shield as `Pending`. Idempotent: a duplicate key is a no-op
    /// and never overwrites an existing row, terminal or not. Returns whether
    /// a new row was written.
    async fn insert_pending_shield(
        &self,
        network: NetworkName,
        shield: &ShieldData,
    ) -> Result<bool>;

    /// Up to `limit` rows with `status = Pending` and
    /// `timestamp <= end_timestamp_ms`, ordered by timestamp ascending.
    /// The cutoff keeps shields inside the reorg window out of validation.
    async fn get_pending_shields(
        &self,
        network: NetworkName,
        end_timestamp_ms: u64,
        limit: usize,
    ) -> Result<Vec<ShieldQueueItem>>;

    /// Transition `Pending -> {Allowed, Blocked}` and stamp
    /// `last_validated_timestamp`. Idempotent at the target status; any
    /// regression attempt is a fatal [`StatusRegression`] error.
    ///
    /// [`StatusRegression`]: super::ListProviderError::StatusRegression
    async fn update_shield_status(
        &self,
        network: NetworkName,
        txid: &str,
        commitment_hash: &str,
        new_status: ShieldStatus,
    ) -> Result<()>;

    /// Fetch one row by key.
    async fn get_shield(
        &self,
        network: NetworkName,
        txid: &str,
        commitment_hash: &str,
    ) -> Result<Option<ShieldQueueItem>>;

    /// Test fixture only: drop every row for a network.
    async fn delete_all_shields_dangerous(&self, network: NetworkName) -> Result<()>;
}

/// Per-network ingest cursor: the highest block shields have been pulled
/// from.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NetworkStatusStore: Send + Sync {
    async fn latest_block_scanned(&self, network: NetworkName) -> Result<Option<u64>>;

    /// Persist a new cursor. Monotone: a value below the stored one is a
    /// [`CursorRegression`] error; an equal value is accepted.
    ///
    /// [`CursorRegression`]: super::ListProviderError::CursorRegression
    async fn save_status(&self, network: NetworkName, latest_block_scanned: u64) -> Result<()>;
}

/// Per-list append-only log of signed POI events.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PoiEventStore: Send + Sync {
    /// Number of events stored for a list; also the next append index.
    async fn event_count(&self, list_key: &ListKey) -> Result<u64>;

    /// The highest-index event, if any.
    async fn last_event(&self, list_key: &ListKey) -> Result<Option<SignedPoiEvent>>;

    /// Append one event. Enforces density (`event.index` must equal the
    /// current count) and the starting-index chain; violations are fatal
    /// [`LogInvariantViolation`] errors.
    ///
    /// [`LogInvariantViolation`]: super::ListProviderError::LogInvariantViolation
    async fn append_event(&self, list_key: &ListKey, event: &SignedPoiEvent) -> Result<()>;

    /// Range read for downstream sync, `length` capped at
    /// [`MAX_EVENT_QUERY_RANGE_LENGTH`].
    ///
    /// [`MAX_EVENT_QUERY_RANGE_LENGTH`]: crate::domain::MAX_EVENT_QUERY_RANGE_LENGTH
    async fn get_events(
        &self,
        list_key: &ListKey,
        start_index: u64,
        length: usize,
    ) -> Result<Vec<SignedPoiEvent>>;
}

/// Per-list set of signed blocked-shield records, content-addressed.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BlockedShieldStore: Send + Sync {
    /// Insert one record. A duplicate (same content address) is silently
    /// absorbed. Returns whether a new record was written.
    async fn insert_blocked_shield(
        &self,
        list_key: &ListKey,
        record: &SignedBlockedShield,
    ) -> Result<bool>;

    /// Sync read, `limit` capped at [`MAX_BLOCKED_SHIELDS_SYNCED`].
    ///
    /// [`MAX_BLOCKED_SHIELDS_SYNCED`]: crate::domain::MAX_BLOCKED_SHIELDS_SYNCED
    async fn get_blocked_shields(
        &self,
        list_key: &ListKey,
        limit: usize,
    ) -> Result<Vec<SignedBlockedShield>>;

    /// Whether any record exists for a blinded commitment.
    async fn blocked_shield_exists(
        &self,
        list_key: &ListKey,
        blinded_commitment: &str,
    ) -> Result<bool>;
}
