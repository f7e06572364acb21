//! SQLite implementations of the list-provider stores.
//!
//! One embedded database holds every collection: the per-network shield
//! queue and ingest cursor, and the per-list event log and blocked-shield
//! set. All four stores share a pool; schema setup runs through the embedded
//! migrator.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use crate::crypto::blocked_shield_record_hash;
use crate::domain::{
    now_ms, ListKey, NetworkName, PoiEventKind, ShieldData, ShieldQueueItem, ShieldStatus,
    SignedBlockedShield, SignedPoiEvent, SnarkProof, MAX_BLOCKED_SHIELDS_SYNCED,
    MAX_EVENT_QUERY_RANGE_LENGTH,
};
use crate::infra::memory::check_log_append;
use crate::infra::{
    BlockedShieldStore, ListProviderError, NetworkStatusStore, PoiEventStore, Result,
    ShieldQueueStore,
};

/// Open (creating if missing) a database file and run migrations.
pub async fn open(path: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    crate::migrations::run(&pool).await?;
    Ok(pool)
}

/// Open a fresh in-memory database. Pinned to one connection so every query
/// sees the same database.
pub async fn open_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    crate::migrations::run(&pool).await?;
    Ok(pool)
}

fn parse_status(raw: &str) -> Result<ShieldStatus> {
    raw.parse()
        .map_err(|e: String| ListProviderError::Internal(e))
}

// ============================================================================
// Shield queue
// ============================================================================

#[derive(FromRow)]
struct ShieldRow {
    txid: String,
    commitment_hash: String,
    blinded_commitment: String,
    timestamp_ms: i64,
    block_number: i64,
    status: String,
    last_validated_timestamp: Option<i64>,
}

impl ShieldRow {
    fn into_item(self, network: NetworkName) -> Result<ShieldQueueItem> {
        Ok(ShieldQueueItem {
            network,
            txid: self.txid,
            commitment_hash: self.commitment_hash,
            blinded_commitment: self.blinded_commitment,
            timestamp_ms: self.timestamp_ms as u64,
            block_number: self.block_number as u64,
            status: parse_status(&self.status)?,
            last_validated_timestamp: self.last_validated_timestamp.map(|t| t as u64),
        })
    }
}

/// SQLite-backed shield queue.
pub struct SqliteShieldQueue {
    pool: SqlitePool,
}

impl SqliteShieldQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShieldQueueStore for SqliteShieldQueue {
    async fn insert_pending_shield(
        &self,
        network: NetworkName,
        shield: &ShieldData,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO shield_queue (
                network, txid, commitment_hash, blinded_commitment,
                timestamp_ms, block_number, status, last_validated_timestamp
            ) VALUES (?, ?, ?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(network.as_str())
        .bind(&shield.txid)
        .bind(&shield.commitment_hash)
        .bind(&shield.blinded_commitment)
        .bind(shield.timestamp_ms as i64)
        .bind(shield.block_number as i64)
        .bind(ShieldStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_pending_shields(
        &self,
        network: NetworkName,
        end_timestamp_ms: u64,
        limit: usize,
    ) -> Result<Vec<ShieldQueueItem>> {
        let rows = sqlx::query_as::<_, ShieldRow>(
            r#"
            SELECT txid, commitment_hash, blinded_commitment,
                   timestamp_ms, block_number, status, last_validated_timestamp
            FROM shield_queue
            WHERE network = ? AND status = ? AND timestamp_ms <= ?
            ORDER BY timestamp_ms ASC
            LIMIT ?
            "#,
        )
        .bind(network.as_str())
        .bind(ShieldStatus::Pending.as_str())
        .bind(end_timestamp_ms as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|row| row.into_item(network)).collect()
    }

    async fn update_shield_status(
        &self,
        network: NetworkName,
        txid: &str,
        commitment_hash: &str,
        new_status: ShieldStatus,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> = sqlx::query_scalar(
            r#"
            SELECT status FROM shield_queue
            WHERE network = ? AND txid = ? AND commitment_hash = ?
            "#,
        )
        .bind(network.as_str())
        .bind(txid)
        .bind(commitment_hash)
        .fetch_optional(&mut *tx)
        .await?;

        let current = match current {
            Some(raw) => parse_status(&raw)?,
            None => {
                return Err(ListProviderError::ShieldNotFound {
                    txid: txid.to_string(),
                    commitment_hash: commitment_hash.to_string(),
                })
            }
        };

        if current == new_status {
            return Ok(());
        }
        if current.is_terminal() || !new_status.is_terminal() {
            return Err(ListProviderError::StatusRegression {
                txid: txid.to_string(),
                commitment_hash: commitment_hash.to_string(),
                from: current,
                to: new_status,
            });
        }

        sqlx::query(
            r#"
            UPDATE shield_queue
            SET status = ?, last_validated_timestamp = ?
            WHERE network = ? AND txid = ? AND commitment_hash = ?
            "#,
        )
        .bind(new_status.as_str())
        .bind(now_ms() as i64)
        .bind(network.as_str())
        .bind(txid)
        .bind(commitment_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_shield(
        &self,
        network: NetworkName,
        txid: &str,
        commitment_hash: &str,
    ) -> Result<Option<ShieldQueueItem>> {
        let row = sqlx::query_as::<_, ShieldRow>(
            r#"
            SELECT txid, commitment_hash, blinded_commitment,
                   timestamp_ms, block_number, status, last_validated_timestamp
            FROM shield_queue
            WHERE network = ? AND txid = ? AND commitment_hash = ?
            "#,
        )
        .bind(network.as_str())
        .bind(txid)
        .bind(commitment_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row.into_item(network)).transpose()
    }

    async fn delete_all_shields_dangerous(&self, network: NetworkName) -> Result<()> {
        sqlx::query("DELETE FROM shield_queue WHERE network = ?")
            .bind(network.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ============================================================================
// Network status
// ============================================================================

/// SQLite-backed ingest cursor store.
pub struct SqliteStatusStore {
    pool: SqlitePool,
}

impl SqliteStatusStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NetworkStatusStore for SqliteStatusStore {
    async fn latest_block_scanned(&self, network: NetworkName) -> Result<Option<u64>> {
        let block: Option<i64> = sqlx::query_scalar(
            "SELECT latest_block_scanned FROM network_status WHERE network = ?",
        )
        .bind(network.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(block.map(|b| b as u64))
    }

    async fn save_status(&self, network: NetworkName, latest_block_scanned: u64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> = sqlx::query_scalar(
            "SELECT latest_block_scanned FROM network_status WHERE network = ?",
        )
        .bind(network.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(current) = current {
            if latest_block_scanned < current as u64 {
                return Err(ListProviderError::CursorRegression {
                    network,
                    current: current as u64,
                    requested: latest_block_scanned,
                });
            }
        }

        sqlx::query(
            r#"
            INSERT INTO network_status (network, latest_block_scanned)
            VALUES (?, ?)
            ON CONFLICT (network) DO UPDATE SET latest_block_scanned = excluded.latest_block_scanned
            "#,
        )
        .bind(network.as_str())
        .bind(latest_block_scanned as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

// ============================================================================
// POI event log
// ============================================================================

#[derive(FromRow)]
struct PoiEventRow {
    event_index: i64,
    kind: String,
    starting_index: i64,
    blinded_commitments: String,
    proof: Option<String>,
    signature: String,
}

impl PoiEventRow {
    fn into_event(self) -> Result<SignedPoiEvent> {
        let kind: PoiEventKind = self
            .kind
            .parse()
            .map_err(|e: String| ListProviderError::Internal(e))?;
        let blinded_commitments: Vec<String> = serde_json::from_str(&self.blinded_commitments)
            .map_err(|e| ListProviderError::Internal(e.to_string()))?;
        let proof: Option<SnarkProof> = match self.proof {
            Some(raw) => Some(
                serde_json::from_str(&raw)
                    .map_err(|e| ListProviderError::Internal(e.to_string()))?,
            ),
            None => None,
        };

        Ok(SignedPoiEvent {
            index: self.event_index as u64,
            blinded_commitment_starting_index: self.starting_index as u64,
            kind,
            blinded_commitments,
            proof,
            signature: self.signature,
        })
    }
}

/// SQLite-backed POI event log.
pub struct SqlitePoiEventLog {
    pool: SqlitePool,
}

impl SqlitePoiEventLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const POI_EVENT_COLUMNS: &str =
    "event_index, kind, starting_index, blinded_commitments, proof, signature";

#[async_trait]
impl PoiEventStore for SqlitePoiEventLog {
    async fn event_count(&self, list_key: &ListKey) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM poi_events WHERE list_key = ?")
            .bind(list_key.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn last_event(&self, list_key: &ListKey) -> Result<Option<SignedPoiEvent>> {
        let row = sqlx::query_as::<_, PoiEventRow>(&format!(
            "SELECT {POI_EVENT_COLUMNS} FROM poi_events \
             WHERE list_key = ? ORDER BY event_index DESC LIMIT 1"
        ))
        .bind(list_key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(PoiEventRow::into_event).transpose()
    }

    async fn append_event(&self, list_key: &ListKey, event: &SignedPoiEvent) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM poi_events WHERE list_key = ?")
            .bind(list_key.as_str())
            .fetch_one(&mut *tx)
            .await?;

        let last = sqlx::query_as::<_, PoiEventRow>(&format!(
            "SELECT {POI_EVENT_COLUMNS} FROM poi_events \
             WHERE list_key = ? ORDER BY event_index DESC LIMIT 1"
        ))
        .bind(list_key.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .map(PoiEventRow::into_event)
        .transpose()?;

        check_log_append(list_key, count as u64, last.as_ref(), event)?;

        let blinded_commitments = serde_json::to_string(&event.blinded_commitments)
            .map_err(|e| ListProviderError::Internal(e.to_string()))?;
        let proof = event
            .proof
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ListProviderError::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO poi_events (
                list_key, event_index, kind, starting_index,
                blinded_commitments, proof, signature
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(list_key.as_str())
        .bind(event.index as i64)
        .bind(event.kind.as_str())
        .bind(event.blinded_commitment_starting_index as i64)
        .bind(&blinded_commitments)
        .bind(proof)
        .bind(&event.signature)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_events(
        &self,
        list_key: &ListKey,
        start_index: u64,
        length: usize,
    ) -> Result<Vec<SignedPoiEvent>> {
        let length = length.min(MAX_EVENT_QUERY_RANGE_LENGTH);
        let rows = sqlx::query_as::<_, PoiEventRow>(&format!(
            "SELECT {POI_EVENT_COLUMNS} FROM poi_events \
             WHERE list_key = ? AND event_index >= ? ORDER BY event_index ASC LIMIT ?"
        ))
        .bind(list_key.as_str())
        .bind(start_index as i64)
        .bind(length as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PoiEventRow::into_event).collect()
    }
}

// ============================================================================
// Blocked shields
// ============================================================================

#[derive(FromRow)]
struct BlockedShieldRow {
    commitment_hash: String,
    blinded_commitment: String,
    block_reason: Option<String>,
    signature: String,
}

/// SQLite-backed blocked-shield store.
pub struct SqliteBlockedShields {
    pool: SqlitePool,
}

impl SqliteBlockedShields {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlockedShieldStore for SqliteBlockedShields {
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

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO blocked_shields (
                list_key, record_hash, commitment_hash,
                blinded_commitment, block_reason, signature
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(list_key.as_str())
        .bind(&record_hash)
        .bind(&record.commitment_hash)
        .bind(&record.blinded_commitment)
        .bind(record.block_reason.as_deref())
        .bind(&record.signature)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_blocked_shields(
        &self,
        list_key: &ListKey,
        limit: usize,
    ) -> Result<Vec<SignedBlockedShield>> {
        let limit = limit.min(MAX_BLOCKED_SHIELDS_SYNCED);
        let rows = sqlx::query_as::<_, BlockedShieldRow>(
            r#"
            SELECT commitment_hash, blinded_commitment, block_reason, signature
            FROM blocked_shields
            WHERE list_key = ?
            ORDER BY rowid ASC
            LIMIT ?
            "#,
        )
        .bind(list_key.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SignedBlockedShield {
                commitment_hash: row.commitment_hash,
                blinded_commitment: row.blinded_commitment,
                block_reason: row.block_reason,
                signature: row.signature,
            })
            .collect())
    }

    async fn blocked_shield_exists(
        &self,
        list_key: &ListKey,
        blinded_commitment: &str,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM blocked_shields WHERE list_key = ? AND blinded_commitment = ?",
        )
        .bind(list_key.as_str())
        .bind(blinded_commitment)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}

// ============================================================================
// Tests
// ============================================================================
