//! In-memory store implementations.
//!
//! Used by tests and by development setups that do not need durability. The
//! semantics (idempotent ingest, status machine, dense log indices) match
//! the SQLite implementations exactly.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::crypto::blocked_shield_record_hash;
use crate::domain::{
    now_ms, ListKey, NetworkName, ShieldData, ShieldQueueItem, ShieldStatus, SignedBlockedShield,
    SignedPoiEvent, MAX_BLOCKED_SHIELDS_SYNCED, MAX_EVENT_QUERY_RANGE_LENGTH,
};
use crate::infra::{
    BlockedShieldStore, ListProviderError, NetworkStatusStore, PoiEventStore, Result,
    ShieldQueueStore,
};

type ShieldKey = (NetworkName, String, String);

/// In-memory shield queue.
#[derive(Default)]
pub struct InMemoryShieldQueue {
    rows: RwLock<HashMap<ShieldKey, ShieldQueueItem>>,
}

impl InMemoryShieldQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(network: NetworkName, txid: &str, commitment_hash: &str) -> ShieldKey {
        (network, txid.to_string(), commitment_hash.to_string())
    }
}

#[async_trait]
impl ShieldQueueStore for InMemoryShieldQueue {
    async fn insert_pending_shield(
        &self,
        network: NetworkName,
        shield: &ShieldData,
    ) -> Result<bool> {
        let key = Self::key(network, &shield.txid, &shield.commitment_hash);
        let mut rows = self.rows.write().await;
        if rows.contains_key(&key) {
            return Ok(false);
        }
        rows.insert(key, ShieldQueueItem::pending(network, shield.clone()));
        Ok(true)
    }

    async fn get_pending_shields(
        &self,
        network: NetworkName,
        end_timestamp_ms: u64,
        limit: usize,
    ) -> Result<Vec<ShieldQueueItem>> {
        let rows = self.rows.read().await;
        let mut pending: Vec<ShieldQueueItem> = rows
            .values()
            .filter(|item| {
                item.network == network
                    && item.status == ShieldStatus::Pending
                    && item.timestamp_ms <= end_timestamp_ms
            })
            .cloned()
            .collect();
        pending.sort_by_key(|item| item.timestamp_ms);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn update_shield_status(
        &self,
        network: NetworkName,
        txid: &str,
        commitment_hash: &str,
        new_status: ShieldStatus,
    ) -> Result<()> {
        let key = Self::key(network, txid, commitment_hash);
        let mut rows = self.rows.write().await;
        let item = rows
            .get_mut(&key)
            .ok_or_else(|| ListProviderError::ShieldNotFound {
                txid: txid.to_string(),
                commitment_hash: commitment_hash.to_string(),
            })?;

        if item.status == new_status {
            return Ok(());
        }
        if item.status.is_terminal() || !new_status.is_terminal() {
            return Err(ListProviderError::StatusRegression {
                txid: txid.to_string(),
                commitment_hash: commitment_hash.to_string(),
                from: item.status,
                to: new_status,
            });
        }

        item.status = new_status;
        item.last_validated_timestamp = Some(now_ms());
        Ok(())
    }

    async fn get_shield(
        &self,
        network: NetworkName,
        txid: &str,
        commitment_hash: &str,
    ) -> Result<Option<ShieldQueueItem>> {
        let rows = self.rows.read().await;
        Ok(rows.get(&Self::key(network, txid, commitment_hash)).cloned())
    }

    async fn delete_all_shields_dangerous(&self, network: NetworkName) -> Result<()> {
        let mut rows = self.rows.write().await;
        rows.retain(|(n, _, _), _| *n != network);
        Ok(())
    }
}

/// In-memory ingest cursor store.
#[derive(Default)]
pub struct InMemoryStatusStore {
    cursors: RwLock<HashMap<NetworkName, u64>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NetworkStatusStore for InMemoryStatusStore {
    async fn latest_block_scanned(&self, network: NetworkName) -> Result<Option<u64>> {
        Ok(self.cursors.read().await.get(&network).copied())
    }

    async fn save_status(&self, network: NetworkName, latest_block_scanned: u64) -> Result<()> {
        let mut cursors = self.cursors.write().await;
        if let Some(&current) = cursors.get(&network) {
            if latest_block_scanned < current {
                return Err(ListProviderError::CursorRegression {
                    network,
                    current,
                    requested: latest_block_scanned,
                });
            }
        }
        cursors.insert(network, latest_block_scanned);
        Ok(())
    }
}

/// Append-time invariant checks shared by the log implementations.
pub(crate) fn check_log_append(
    list_key: &ListKey,
    count: u64,
    last: Option<&SignedPoiEvent>,
    event: &SignedPoiEvent,
) -> Result<()> {
    if event.index != count {
        return Err(ListProviderError::LogInvariantViolation {
            list_key: list_key.to_string(),
            message: format!("expected index {count}, got {}", event.index),
        });
    }
    let expected_starting = last.map(SignedPoiEvent::next_starting_index).unwrap_or(0);
    if event.blinded_commitment_starting_index != expected_starting {
        return Err(ListProviderError::LogInvariantViolation {
            list_key: list_key.to_string(),
            message: format!(
                "expected starting index {expected_starting}, got {}",
                event.blinded_commitment_starting_index
            ),
        });
    }
    if event.blinded_commitments.is_empty() {
        return Err(ListProviderError::LogInvariantViolation {
            list_key: list_key.to_string(),
            message: "event carries no blinded commitments".to_string(),
        });
    }
    Ok(())
}

/// In-memory POI event log.
#[derive(Default)]
pub struct InMemoryPoiEventLog {
    logs: RwLock<HashMap<String, Vec<SignedPoiEvent>>>,
}

impl InMemoryPoiEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PoiEventStore for InMemoryPoiEventLog {
    async fn event_count(&self, list_key: &ListKey) -> Result<u64> {
        let logs = self.logs.read().await;
        Ok(logs.get(list_key.as_str()).map(Vec::len).unwrap_or(0) as u64)
    }

    async fn last_event(&self, list_key: &ListKey) -> Result<Option<SignedPoiEvent>> {
        let logs = self.logs.read().await;
        Ok(logs
            .get(list_key.as_str())
            .and_then(|log| log.last().cloned()))
    }

    async fn append_event(&self, list_key: &ListKey, event: &SignedPoiEvent) -> Result<()> {
        let mut logs = self.logs.write().await;
        let log = logs.entry(list_key.to_string()).or_default();
        check_log_append(list_key, log.len() as u64, log.last(), event)?;
        log.push(event.clone());
        Ok(())
    }

    async fn get_events(
        &self,
        list_key: &ListKey,
        start_index: u64,
        length: usize,
    ) -> Result<Vec<SignedPoiEvent>> {
        let length = length.min(MAX_EVENT_QUERY_RANGE_LENGTH);
        let logs = self.logs.read().await;
        let Some(log) = logs.get(list_key.as_str()) else {
            return Ok(Vec::new());
        };
        let start = (start_index as usize).min(log.len());
        let end = start.saturating_add(length).min(log.len());
        Ok(log[start..end].to_vec())
    }
}

/// In-memory blocked-shield store.
#[derive(Default)]
pub struct InMemoryBlockedShields {
    // list key -> record hash -> record, insertion-ordered via Vec of hashes
    records: RwLock<HashMap<String, Vec<(String, SignedBlockedShield)>>>,
}

impl InMemoryBlockedShields {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlockedShieldStore for InMemoryBlockedShields {
    async fn insert_blocked_shield(
        &self,
        list_key: &ListKey,
        record: &SignedBlockedShield,
    ) -> Result<bool> {
        let record_hash = blocked_shield_record_hash(
            &record.commitment_hash,
            &record.blinded_commitment,
            record.block_reason.as_deref(),
        )?;
        let mut records = self.records.write().await;
        let list = records.entry(list_key.to_string()).or_default();
        if list.iter().any(|(hash, _)| *hash == record_hash) {
            return Ok(false);
        }
        list.push((record_hash, record.clone()));
        Ok(true)
    }

    async fn get_blocked_shields(
        &self,
        list_key: &ListKey,
        limit: usize,
    ) -> Result<Vec<SignedBlockedShield>> {
        let limit = limit.min(MAX_BLOCKED_SHIELDS_SYNCED);
        let records = self.records.read().await;
        Ok(records
            .get(list_key.as_str())
            .map(|list| {
                list.iter()
                    .take(limit)
                    .map(|(_, record)| record.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn blocked_shield_exists(
        &self,
        list_key: &ListKey,
        blinded_commitment: &str,
    ) -> Result<bool> {
        let records = self.records.read().await;
        Ok(records
            .get(list_key.as_str())
            .map(|list| {
                list.iter()
                    .any(|(_, record)| record.blinded_commitment == blinded_commitment)
            })
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PoiEventKind;

    fn shield(txid: &str, timestamp_ms: u64) -> ShieldData {
        ShieldData {
            txid: txid.to_string(),
            commitment_hash: format!("{txid}-hash"),
            blinded_commitment: format!("{txid}-blinded"),
            timestamp_ms,
            block_number: 100,
        }
    }

    fn event(index: u64, starting: u64, commitments: usize) -> SignedPoiEvent {
        SignedPoiEvent {
            index,
            blinded_commitment_starting_index: starting,
            kind: PoiEventKind::Shield,
            blinded_commitments: (0..commitments).map(|i| format!("{i:02x}")).collect(),
            proof: None,
            signature: "00".repeat(64),
        }
    }

    #[tokio::test]
    async fn test_empty_queue_returns_nothing() {
        let queue = InMemoryShieldQueue::new();
        let pending = queue
            .get_pending_shields(NetworkName::Ethereum, u64::MAX, 100)
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let queue = InMemoryShieldQueue::new();
        let data = shield("0xaa", 1000);

        assert!(queue
            .insert_pending_shield(NetworkName::Ethereum, &data)
            .await
            .unwrap());
        assert!(!queue
            .insert_pending_shield(NetworkName::Ethereum, &data)
            .await
            .unwrap());

        let pending = queue
            .get_pending_shields(NetworkName::Ethereum, u64::MAX, 100)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_does_not_reset_terminal_status() {
        let queue = InMemoryShieldQueue::new();
        let data = shield("0xaa", 1000);
        queue
            .insert_pending_shield(NetworkName::Ethereum, &data)
            .await
            .unwrap();
        queue
            .update_shield_status(
                NetworkName::Ethereum,
                &data.txid,
                &data.commitment_hash,
                ShieldStatus::Allowed,
            )
            .await
            .unwrap();

        queue
            .insert_pending_shield(NetworkName::Ethereum, &data)
            .await
            .unwrap();

        let item = queue
            .get_shield(NetworkName::Ethereum, &data.txid, &data.commitment_hash)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.status, ShieldStatus::Allowed);
    }

    #[tokio::test]
    async fn test_age_gating() {
        let queue = InMemoryShieldQueue::new();
        let now = now_ms();
        let day_ms = 24 * 60 * 60 * 1000;

        queue
            .insert_pending_shield(NetworkName::Ethereum, &shield("0xnew", now))
            .await
            .unwrap();
        queue
            .insert_pending_shield(NetworkName::Ethereum, &shield("0xold", now - 10 * day_ms))
            .await
            .unwrap();

        let eligible = queue
            .get_pending_shields(NetworkName::Ethereum, now - 7 * day_ms, 100)
            .await
            .unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].txid, "0xold");
        assert_eq!(eligible[0].status, ShieldStatus::Pending);
        assert_eq!(eligible[0].last_validated_timestamp, None);
    }

    #[tokio::test]
    async fn test_pending_ordered_by_timestamp_and_limited() {
        let queue = InMemoryShieldQueue::new();
        for (txid, ts) in [("0xc", 300), ("0xa", 100), ("0xb", 200)] {
            queue
                .insert_pending_shield(NetworkName::Ethereum, &shield(txid, ts))
                .await
                .unwrap();
        }

        let pending = queue
            .get_pending_shields(NetworkName::Ethereum, 1000, 2)
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].txid, "0xa");
        assert_eq!(pending[1].txid, "0xb");
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let queue = InMemoryShieldQueue::new();
        let data = shield("0xaa", 1000);
        queue
            .insert_pending_shield(NetworkName::Ethereum, &data)
            .await
            .unwrap();

        queue
            .update_shield_status(
                NetworkName::Ethereum,
                &data.txid,
                &data.commitment_hash,
                ShieldStatus::Allowed,
            )
            .await
            .unwrap();

        // idempotent at target status
        queue
            .update_shield_status(
                NetworkName::Ethereum,
                &data.txid,
                &data.commitment_hash,
                ShieldStatus::Allowed,
            )
            .await
            .unwrap();

        // regression is fatal
        let err = queue
            .update_shield_status(
                NetworkName::Ethereum,
                &data.txid,
                &data.commitment_hash,
                ShieldStatus::Blocked,
            )
            .await
            .unwrap_err();
        assert!(err.is_fatal());

        let item = queue
            .get_shield(NetworkName::Ethereum, &data.txid, &data.commitment_hash)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.status, ShieldStatus::Allowed);
        assert!(item.last_validated_timestamp.is_some());
    }

    #[tokio::test]
    async fn test_status_update_unknown_shield() {
        let queue = InMemoryShieldQueue::new();
        let err = queue
            .update_shield_status(NetworkName::Ethereum, "0xmissing", "0xhash", ShieldStatus::Allowed)
            .await
            .unwrap_err();
        assert!(matches!(err, ListProviderError::ShieldNotFound { .. }));
    }

    #[tokio::test]
    async fn test_networks_are_isolated() {
        let queue = InMemoryShieldQueue::new();
        queue
            .insert_pending_shield(NetworkName::Ethereum, &shield("0xaa", 1000))
            .await
            .unwrap();

        let polygon = queue
            .get_pending_shields(NetworkName::Polygon, u64::MAX, 100)
            .await
            .unwrap();
        assert!(polygon.is_empty());

        queue
            .delete_all_shields_dangerous(NetworkName::Polygon)
            .await
            .unwrap();
        let ethereum = queue
            .get_pending_shields(NetworkName::Ethereum, u64::MAX, 100)
            .await
            .unwrap();
        assert_eq!(ethereum.len(), 1);
    }

    #[tokio::test]
    async fn test_cursor_monotonicity() {
        let store = InMemoryStatusStore::new();
        assert_eq!(
            store
                .latest_block_scanned(NetworkName::Ethereum)
                .await
                .unwrap(),
            None
        );

        store.save_status(NetworkName::Ethereum, 100).await.unwrap();
        store.save_status(NetworkName::Ethereum, 100).await.unwrap();
        store.save_status(NetworkName::Ethereum, 150).await.unwrap();

        let err = store
            .save_status(NetworkName::Ethereum, 149)
            .await
            .unwrap_err();
        assert!(matches!(err, ListProviderError::CursorRegression { .. }));

        assert_eq!(
            store
                .latest_block_scanned(NetworkName::Ethereum)
                .await
                .unwrap(),
            Some(150)
        );
    }

    #[tokio::test]
    async fn test_event_log_dense_indices() {
        let log = InMemoryPoiEventLog::new();
        let list_key = ListKey::new("abcd");

        log.append_event(&list_key, &event(0, 0, 1)).await.unwrap();
        log.append_event(&list_key, &event(1, 1, 2)).await.unwrap();
        log.append_event(&list_key, &event(2, 3, 1)).await.unwrap();

        assert_eq!(log.event_count(&list_key).await.unwrap(), 3);

        // non-dense index
        let err = log
            .append_event(&list_key, &event(5, 4, 1))
            .await
            .unwrap_err();
        assert!(err.is_fatal());

        // broken starting-index chain
        let err = log
            .append_event(&list_key, &event(3, 7, 1))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_event_log_first_starting_index_must_be_zero() {
        let log = InMemoryPoiEventLog::new();
        let list_key = ListKey::new("abcd");
        let err = log
            .append_event(&list_key, &event(0, 5, 1))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_event_log_range_reads() {
        let log = InMemoryPoiEventLog::new();
        let list_key = ListKey::new("abcd");
        let mut starting = 0;
        for index in 0..10 {
            log.append_event(&list_key, &event(index, starting, 1))
                .await
                .unwrap();
            starting += 1;
        }

        let range = log.get_events(&list_key, 3, 4).await.unwrap();
        assert_eq!(range.len(), 4);
        assert_eq!(range[0].index, 3);
        assert_eq!(range[3].index, 6);

        // past the end
        let tail = log.get_events(&list_key, 8, 100).await.unwrap();
        assert_eq!(tail.len(), 2);
        let empty = log.get_events(&list_key, 50, 10).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_blocked_shield_dedup() {
        let store = InMemoryBlockedShields::new();
        let list_key = ListKey::new("abcd");
        let record = SignedBlockedShield {
            commitment_hash: "0x5678".to_string(),
            blinded_commitment: "0x1234".to_string(),
            block_reason: Some("sanctioned".to_string()),
            signature: "00".repeat(64),
        };

        assert!(store
            .insert_blocked_shield(&list_key, &record)
            .await
            .unwrap());
        assert!(!store
            .insert_blocked_shield(&list_key, &record)
            .await
            .unwrap());

        assert_eq!(
            store.get_blocked_shields(&list_key, 50).await.unwrap().len(),
            1
        );
        assert!(store
            .blocked_shield_exists(&list_key, "0x1234")
            .await
            .unwrap());
        assert!(!store
            .blocked_shield_exists(&list_key, "0x9999")
            .await
            .unwrap());
    }
}
