//! Shield queue items and chain-observer receipt types.

use serde::{Deserialize, Serialize};

use super::{NetworkName, ShieldStatus};

/// A shield as reported by the chain observer: the raw material the
/// queue-shields poller ingests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldData {
    /// Hex-encoded transaction identifier.
    pub txid: String,

    /// Hex-encoded commitment hash of the shield.
    pub commitment_hash: String,

    /// Hex-encoded blinded commitment, derived off-chain by the wallet
    /// adapter; downstream proofs reference this value.
    pub blinded_commitment: String,

    /// Milliseconds timestamp of the block the shield was mined in, as
    /// reported by the observer. Re-derived from the receipt at validation.
    pub timestamp_ms: u64,

    /// Source block number.
    pub block_number: u64,
}

/// One row of the shield queue. Unique per `(network, txid, commitment_hash)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldQueueItem {
    pub network: NetworkName,
    pub txid: String,
    pub commitment_hash: String,
    pub blinded_commitment: String,
    pub timestamp_ms: u64,
    pub block_number: u64,
    pub status: ShieldStatus,

    /// Milliseconds timestamp of the last validation pass that touched this
    /// row, or `None` while the shield has never been validated.
    pub last_validated_timestamp: Option<u64>,
}

impl ShieldQueueItem {
    /// A freshly ingested row: `Pending`, never validated.
    pub fn pending(network: NetworkName, data: ShieldData) -> Self {
        Self {
            network,
            txid: data.txid,
            commitment_hash: data.commitment_hash,
            blinded_commitment: data.blinded_commitment,
            timestamp_ms: data.timestamp_ms,
            block_number: data.block_number,
            status: ShieldStatus::Pending,
            last_validated_timestamp: None,
        }
    }
}

/// Resolved transaction receipt facts the validation poller needs: the
/// sender and the mined block's number and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldReceipt {
    /// Hex-encoded sender address, as returned by the RPC (any case).
    pub from_address: String,
    pub block_number: u64,
    pub timestamp_ms: u64,
}
