//! Canonical byte encodings for list signatures.
//!
//! Every signature the list produces is over a deterministic byte string:
//!
//! ```text
//! event_preimage =
//!   domain_byte (0x01 shield | 0x02 transact) ||
//!   U64_BE(index) ||
//!   U64_BE(blinded_commitment_starting_index) ||
//!   hex_decode(blinded_commitments[0]) || ... ||
//!   proof_bytes                      (non-legacy transact only)
//!
//! blocked_preimage =
//!   hex_decode(commitment_hash) ||
//!   hex_decode(blinded_commitment) ||
//!   UTF8(block_reason or "")
//! ```
//!
//! Hex fields tolerate an optional `0x` prefix and any case. Proof field
//! elements are left-padded to 32 bytes and concatenated in declaration
//! order. Ed25519 signs the preimage directly (the scheme hashes
//! internally), so no outer digest is applied.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::{PoiEventKind, SnarkProof};

/// Errors producing a canonical encoding.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("invalid hex in {field}: {source}")]
    InvalidHex {
        field: &'static str,
        #[source]
        source: hex::FromHexError,
    },

    #[error("proof field element longer than 32 bytes: {0} bytes")]
    OversizedFieldElement(usize),

    #[error("event carries no blinded commitments")]
    EmptyCommitments,
}

/// Encode a u64 as 8 bytes big-endian.
#[inline]
pub fn u64_be(n: u64) -> [u8; 8] {
    n.to_be_bytes()
}

/// Decode a hex field, tolerating an optional `0x` prefix and mixed case.
/// An odd-length string is left-padded with one zero nibble.
pub fn decode_hex_field(value: &str, field: &'static str) -> Result<Vec<u8>, EncodingError> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    let padded;
    let normalized = if trimmed.len() % 2 == 1 {
        padded = format!("0{trimmed}");
        &padded
    } else {
        trimmed
    };
    hex::decode(normalized).map_err(|source| EncodingError::InvalidHex { field, source })
}

/// Decode a proof field element to exactly 32 bytes, left-padded.
fn decode_field_element(value: &str) -> Result<[u8; 32], EncodingError> {
    let bytes = decode_hex_field(value, "proof")?;
    if bytes.len() > 32 {
        return Err(EncodingError::OversizedFieldElement(bytes.len()));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

/// Canonical byte encoding of a SNARK proof: the eight field elements,
/// each 32 bytes, in order a0 a1 b00 b01 b10 b11 c0 c1.
pub fn snark_proof_bytes(proof: &SnarkProof) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::with_capacity(8 * 32);
    for element in proof.elements() {
        out.extend_from_slice(&decode_field_element(element)?);
    }
    Ok(out)
}

/// Signing preimage for a POI event.
///
/// `proof` is ignored for shield events; legacy transact events pass `None`
/// and contribute no proof component.
pub fn poi_event_signing_bytes(
    kind: PoiEventKind,
    index: u64,
    blinded_commitment_starting_index: u64,
    blinded_commitments: &[String],
    proof: Option<&SnarkProof>,
) -> Result<Vec<u8>, EncodingError> {
    if blinded_commitments.is_empty() {
        return Err(EncodingError::EmptyCommitments);
    }

    let mut out = Vec::new();
    out.push(kind.domain_byte());
    out.extend_from_slice(&u64_be(index));
    out.extend_from_slice(&u64_be(blinded_commitment_starting_index));
    for commitment in blinded_commitments {
        out.extend_from_slice(&decode_hex_field(commitment, "blinded_commitment")?);
    }
    if kind == PoiEventKind::Transact {
        if let Some(proof) = proof {
            out.extend_from_slice(&snark_proof_bytes(proof)?);
        }
    }
    Ok(out)
}

/// Signing preimage for a blocked-shield record.
pub fn blocked_shield_signing_bytes(
    commitment_hash: &str,
    blinded_commitment: &str,
    block_reason: Option<&str>,
) -> Result<Vec<u8>, EncodingError> {
    let mut out = decode_hex_field(commitment_hash, "commitment_hash")?;
    out.extend_from_slice(&decode_hex_field(blinded_commitment, "blinded_commitment")?);
    out.extend_from_slice(block_reason.unwrap_or("").as_bytes());
    Ok(out)
}

/// Content address of a blocked-shield record: hex SHA-256 of its signing
/// preimage. Two records with identical content collapse to one row.
pub fn blocked_shield_record_hash(
    commitment_hash: &str,
    blinded_commitment: &str,
    block_reason: Option<&str>,
) -> Result<String, EncodingError> {
    let preimage = blocked_shield_signing_bytes(commitment_hash, blinded_commitment, block_reason)?;
    let mut hasher = Sha256::new();
    hasher.update(&preimage);
    Ok(hex::encode(hasher.finalize()))
}
