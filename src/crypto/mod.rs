//! Cryptographic utilities for the list provider.
//!
//! Provides:
//! - Canonical signing encodings with domain separation
//! - List signing and verification (Ed25519)

mod encoding;
mod signing;

pub use encoding::*;
pub use signing::*;
