//! Proof-of-Innocence list provider.
//!
//! A semi-trusted operator node that observes shield (deposit) events from a
//! privacy-preserving protocol across multiple networks, classifies each
//! shield under a list-specific policy, and publishes a signed, append-only
//! event log downstream wallets use to prove their funds are not on the
//! blocklist.
//!
//! ## Modules
//!
//! - [`domain`] - Core domain types (shields, events, blocked records)
//! - [`crypto`] - Canonical signing encodings and Ed25519 list keys
//! - [`infra`] - Store traits and implementations (SQLite, in-memory)
//! - [`chain`] - Chain observer (shield scanning, receipt resolution)
//! - [`policy`] - The operator-supplied allow/block gate
//! - [`provider`] - The pipeline: ingest poller, validation poller, and the
//!   single-writer event-queue coordinator
//! - [`config`] - Environment-driven configuration
//! - [`telemetry`] - Tracing setup

pub mod chain;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod infra;
pub mod migrations;
pub mod policy;
pub mod provider;
pub mod telemetry;

// Re-export commonly used types
pub use domain::{
    ListKey, NetworkName, PoiEventShield, PoiEventTransact, ShieldData, ShieldQueueItem,
    ShieldStatus, SignedBlockedShield, SignedPoiEvent, SnarkProof, UnsignedPoiEvent,
};

pub use chain::{ChainObserver, InMemoryChainObserver, RpcChainObserver};
pub use config::{ListProviderConfig, NetworkSettings};
pub use crypto::{ListSigningKey, ListVerifyingKey};
pub use infra::{ListProviderError, Result};
pub use policy::{AddressBlocklistPolicy, AllowAllPolicy, PolicyDecision, PolicyGate};
pub use provider::{ListProvider, PoiEventQueue, ProviderStores};
