//! List signing and verification.
//!
//! A list is identified by an Ed25519 keypair held for the lifetime of the
//! process; the hex-encoded public key is the list key peers address the
//! list by. Signatures cover the canonical encodings in [`super::encoding`].

use ed25519_dalek::{
    Signature, Signer, SigningKey, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH,
    SIGNATURE_LENGTH,
};
use rand::rngs::OsRng;

use crate::crypto::encoding::{
    blocked_shield_signing_bytes, poi_event_signing_bytes, EncodingError,
};
use crate::domain::{ListKey, PoiEventKind, SignedPoiEvent, SnarkProof};

/// Ed25519 signature (64 bytes)
pub type Signature64 = [u8; SIGNATURE_LENGTH];

/// Ed25519 public key (32 bytes)
pub type PublicKey32 = [u8; PUBLIC_KEY_LENGTH];

/// Ed25519 secret key (32 bytes)
pub type SecretKey32 = [u8; SECRET_KEY_LENGTH];

/// Error type for signing operations
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("invalid signature format")]
    InvalidSignatureFormat,

    #[error("invalid public key format")]
    InvalidPublicKeyFormat,

    #[error("invalid secret key format")]
    InvalidSecretKeyFormat,

    #[error("signature verification failed")]
    VerificationFailed,

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

// ============================================================================
// List Signing Key
// ============================================================================

/// The list's Ed25519 keypair.
#[derive(Clone)]
pub struct ListSigningKey {
    signing_key: SigningKey,
}

impl ListSigningKey {
    /// Generate a new random signing key
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Create from secret key bytes
    pub fn from_bytes(bytes: &SecretKey32) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// Create from a hex secret key (optional `0x` prefix)
    pub fn from_hex(hex_str: &str) -> Result<Self, SigningError> {
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let bytes: SecretKey32 = hex::decode(hex_str)
            .map_err(|_| SigningError::InvalidSecretKeyFormat)?
            .try_into()
            .map_err(|_| SigningError::InvalidSecretKeyFormat)?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Get the secret key bytes
    pub fn to_bytes(&self) -> SecretKey32 {
        self.signing_key.to_bytes()
    }

    /// Get the verifying half of this keypair
    pub fn verifying_key(&self) -> ListVerifyingKey {
        ListVerifyingKey {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    /// The list key: lowercase hex public key, no prefix.
    pub fn list_key(&self) -> ListKey {
        ListKey::new(hex::encode(self.signing_key.verifying_key().to_bytes()))
    }

    /// Sign an arbitrary preimage. Ed25519 hashes internally; the preimage
    /// is signed as-is.
    pub fn sign(&self, message: &[u8]) -> Signature64 {
        self.signing_key.sign(message).to_bytes()
    }

    /// Sign a POI event, returning the hex signature.
    pub fn sign_poi_event(
        &self,
        kind: PoiEventKind,
        index: u64,
        blinded_commitment_starting_index: u64,
        blinded_commitments: &[String],
        proof: Option<&SnarkProof>,
    ) -> Result<String, SigningError> {
        let preimage = poi_event_signing_bytes(
            kind,
            index,
            blinded_commitment_starting_index,
            blinded_commitments,
            proof,
        )?;
        Ok(hex::encode(self.sign(&preimage)))
    }

    /// Sign a blocked-shield record, returning the hex signature.
    pub fn sign_blocked_shield(
        &self,
        commitment_hash: &str,
        blinded_commitment: &str,
        block_reason: Option<&str>,
    ) -> Result<String, SigningError> {
        let preimage =
            blocked_shield_signing_bytes(commitment_hash, blinded_commitment, block_reason)?;
        Ok(hex::encode(self.sign(&preimage)))
    }
}

impl std::fmt::Debug for ListSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListSigningKey")
            .field("list_key", &self.list_key())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// List Verifying Key
// ============================================================================

/// A list's public key, for signature verification by peers.
#[derive(Clone)]
pub struct ListVerifyingKey {
    verifying_key: VerifyingKey,
}

impl ListVerifyingKey {
    /// Create from public key bytes
    pub fn from_bytes(bytes: &PublicKey32) -> Result<Self, SigningError> {
        let verifying_key =
            VerifyingKey::from_bytes(bytes).map_err(|_| SigningError::InvalidPublicKeyFormat)?;
        Ok(Self { verifying_key })
    }

    /// Create from a list key (hex public key).
    pub fn from_list_key(list_key: &ListKey) -> Result<Self, SigningError> {
        let bytes: PublicKey32 = hex::decode(list_key.as_str())
            .map_err(|_| SigningError::InvalidPublicKeyFormat)?
            .try_into()
            .map_err(|_| SigningError::InvalidPublicKeyFormat)?;
        Self::from_bytes(&bytes)
    }

    /// Get the public key bytes
    pub fn to_bytes(&self) -> PublicKey32 {
        self.verifying_key.to_bytes()
    }

    /// Verify a signature over a preimage.
    pub fn verify(&self, message: &[u8], signature: &Signature64) -> Result<(), SigningError> {
        let sig = Signature::from_bytes(signature);
        self.verifying_key
            .verify(message, &sig)
            .map_err(|_| SigningError::VerificationFailed)
    }

    /// Verify a hex signature over a preimage. Malformed hex verifies false.
    pub fn verify_hex(&self, message: &[u8], signature_hex: &str) -> bool {
        let hex_str = signature_hex.strip_prefix("0x").unwrap_or(signature_hex);
        let Ok(bytes) = hex::decode(hex_str) else {
            return false;
        };
        let signature: Signature64 = match bytes.try_into() {
            Ok(signature) => signature,
            Err(_) => return false,
        };
        self.verify(message, &signature).is_ok()
    }

    /// Verify a stored POI event against this key.
    pub fn verify_poi_event(&self, event: &SignedPoiEvent) -> Result<bool, SigningError> {
        let preimage = poi_event_signing_bytes(
            event.kind,
            event.index,
            event.blinded_commitment_starting_index,
            &event.blinded_commitments,
            event.proof.as_ref(),
        )?;
        Ok(self.verify_hex(&preimage, &event.signature))
    }

    /// Verify a stored blocked-shield record against this key.
    pub fn verify_blocked_shield(
        &self,
        commitment_hash: &str,
        blinded_commitment: &str,
        block_reason: Option<&str>,
        signature_hex: &str,
    ) -> Result<bool, SigningError> {
        let preimage =
            blocked_shield_signing_bytes(commitment_hash, blinded_commitment, block_reason)?;
        Ok(self.verify_hex(&preimage, signature_hex))
    }
}

impl std::fmt::Debug for ListVerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListVerifyingKey")
            .field("list_key", &hex::encode(self.to_bytes()))
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
