//! Signed blocked-shield records.

use serde::{Deserialize, Serialize};

/// A shield the policy gate rejected, published so peers can sync the
/// blocklist. Content-addressed in storage by the SHA-256 of its signing
/// preimage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBlockedShield {
    pub commitment_hash: String,
    pub blinded_commitment: String,

    /// Free-form operator-facing reason, if the policy supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,

    /// Hex-encoded Ed25519 signature over the canonical record encoding.
    pub signature: String,
}
