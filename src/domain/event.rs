//! POI event types.
//!
//! A list's event log is an append-only sequence of signed events with dense
//! 0-based indices. Each event carries one or more blinded commitments; the
//! `blinded_commitment_starting_index` chain makes the concatenation of all
//! commitment sequences addressable by a single global offset.

use serde::{Deserialize, Serialize};

/// Groth16-shaped SNARK proof attached to non-legacy transact events.
///
/// Field elements are hex strings (optional `0x` prefix); the canonical byte
/// encoding left-pads each element to 32 bytes and concatenates them in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnarkProof {
    pub pi_a: [String; 2],
    pub pi_b: [[String; 2]; 2],
    pub pi_c: [String; 2],
}

impl SnarkProof {
    /// All eight field elements in canonical order: a0 a1 b00 b01 b10 b11 c0 c1.
    pub fn elements(&self) -> [&str; 8] {
        [
            &self.pi_a[0],
            &self.pi_a[1],
            &self.pi_b[0][0],
            &self.pi_b[0][1],
            &self.pi_b[1][0],
            &self.pi_b[1][1],
            &self.pi_c[0],
            &self.pi_c[1],
        ]
    }
}

/// Discriminates the two event flavours for signing (domain separation) and
/// for verification of stored events. A transact event without a proof is a
/// legacy transact event, not a shield event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoiEventKind {
    Shield,
    Transact,
}

impl PoiEventKind {
    /// Single-byte domain separator prefixed to the signing preimage.
    pub fn domain_byte(&self) -> u8 {
        match self {
            PoiEventKind::Shield => 0x01,
            PoiEventKind::Transact => 0x02,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PoiEventKind::Shield => "shield",
            PoiEventKind::Transact => "transact",
        }
    }
}

impl std::str::FromStr for PoiEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shield" => Ok(PoiEventKind::Shield),
            "transact" => Ok(PoiEventKind::Transact),
            other => Err(format!("unknown poi event kind: {other}")),
        }
    }
}

/// An allowed shield, ready to be sequenced into the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoiEventShield {
    pub commitment_hash: String,
    pub blinded_commitment: String,
}

/// A transact event submitted by a wallet. `proof` is absent only for
/// legacy events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoiEventTransact {
    pub blinded_commitments: Vec<String>,
    pub proof: Option<SnarkProof>,
}

/// An event accepted by the coordinator but not yet signed and appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnsignedPoiEvent {
    Shield(PoiEventShield),
    Transact(PoiEventTransact),
}

impl UnsignedPoiEvent {
    pub fn kind(&self) -> PoiEventKind {
        match self {
            UnsignedPoiEvent::Shield(_) => PoiEventKind::Shield,
            UnsignedPoiEvent::Transact(_) => PoiEventKind::Transact,
        }
    }

    /// The ordered blinded commitments this event contributes to the log.
    pub fn blinded_commitments(&self) -> Vec<String> {
        match self {
            UnsignedPoiEvent::Shield(shield) => vec![shield.blinded_commitment.clone()],
            UnsignedPoiEvent::Transact(transact) => transact.blinded_commitments.clone(),
        }
    }

    pub fn proof(&self) -> Option<&SnarkProof> {
        match self {
            UnsignedPoiEvent::Shield(_) => None,
            UnsignedPoiEvent::Transact(transact) => transact.proof.as_ref(),
        }
    }
}

/// One entry of a list's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPoiEvent {
    /// Dense 0-based log index.
    pub index: u64,

    /// Sum of commitment counts over all prior events in the log.
    pub blinded_commitment_starting_index: u64,

    pub kind: PoiEventKind,

    /// Ordered, non-empty.
    pub blinded_commitments: Vec<String>,

    /// Present iff this is a non-legacy transact event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<SnarkProof>,

    /// Hex-encoded Ed25519 signature over the canonical event encoding.
    pub signature: String,
}

impl SignedPoiEvent {
    /// Number of blinded commitments this event contributes.
    pub fn commitment_count(&self) -> u64 {
        self.blinded_commitments.len() as u64
    }

    /// Starting index the next event in the log must carry.
    pub fn next_starting_index(&self) -> u64 {
        self.blinded_commitment_starting_index + self.commitment_count()
    }
}
