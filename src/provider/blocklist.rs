//! Blocked-shield writer.
//!
//! Rejected shields never enter the event log; they are published as signed,
//! content-addressed records so peers can sync the blocklist independently.

use std::sync::Arc;

use tracing::{debug, info};

use crate::crypto::ListSigningKey;
use crate::domain::{ListKey, NetworkName, ShieldQueueItem, SignedBlockedShield};
use crate::infra::{BlockedShieldStore, Result};

/// Signs and persists blocked-shield records for one list.
pub struct BlockedShieldWriter {
    list_key: ListKey,
    signer: ListSigningKey,
    store: Arc<dyn BlockedShieldStore>,
}

impl BlockedShieldWriter {
    pub fn new(signer: ListSigningKey, store: Arc<dyn BlockedShieldStore>) -> Self {
        let list_key = signer.list_key();
        Self {
            list_key,
            signer,
            store,
        }
    }

    pub fn list_key(&self) -> &ListKey {
        &self.list_key
    }

    /// Sign and store a blocked-shield record. Duplicate content is
    /// absorbed silently.
    pub async fn append_blocked_shield(
        &self,
        network: NetworkName,
        shield: &ShieldQueueItem,
        block_reason: Option<String>,
    ) -> Result<SignedBlockedShield> {
        let signature = self.signer.sign_blocked_shield(
            &shield.commitment_hash,
            &shield.blinded_commitment,
            block_reason.as_deref(),
        )?;

        let record = SignedBlockedShield {
            commitment_hash: shield.commitment_hash.clone(),
            blinded_commitment: shield.blinded_commitment.clone(),
            block_reason,
            signature,
        };

        let inserted = self.store.insert_blocked_shield(&self.list_key, &record).await?;
        if inserted {
            info!(
                list_key = %self.list_key,
                network = %network,
                txid = %shield.txid,
                reason = record.block_reason.as_deref().unwrap_or(""),
                "recorded blocked shield"
            );
        } else {
            debug!(
                list_key = %self.list_key,
                network = %network,
                txid = %shield.txid,
                "duplicate blocked-shield record absorbed"
            );
        }

        Ok(record)
    }
}
