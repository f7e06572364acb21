//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use poi_list_provider::chain::InMemoryChainObserver;
use poi_list_provider::config::{ListProviderConfig, NetworkSettings};
use poi_list_provider::crypto::ListSigningKey;
use poi_list_provider::domain::{now_ms, NetworkName, ShieldData};
use poi_list_provider::policy::PolicyGate;
use poi_list_provider::provider::{ListProvider, ProviderStores};

pub const HOUR_MS: u64 = 60 * 60 * 1000;
pub const DAY_MS: u64 = 24 * HOUR_MS;

/// A blocked test sender, lowercase.
pub const EXCLUDED_ADDRESS: &str = "0xbad0000000000000000000000000000000000bad";

/// Deterministic signing key so list keys are stable across test runs.
pub fn test_signing_key(seed: u8) -> ListSigningKey {
    ListSigningKey::from_bytes(&[seed; 32])
}

/// A shield old enough to clear any test pending period.
pub fn aged_shield(txid: &str, age_ms: u64) -> ShieldData {
    ShieldData {
        txid: txid.to_string(),
        commitment_hash: format!("{txid}00"),
        blinded_commitment: format!("{txid}ff"),
        timestamp_ms: now_ms().saturating_sub(age_ms),
        block_number: 15_000_000,
    }
}

/// Config with one network, short cadences, and a one-hour pending period.
pub fn test_config() -> ListProviderConfig {
    let mut settings = NetworkSettings::new(NetworkName::Ethereum);
    settings.deployment_block = 1;
    ListProviderConfig::new("test-list", "integration test list")
        .with_networks(vec![settings])
        .with_pending_period(Duration::from_millis(HOUR_MS))
        .with_queue_shields_delay(Duration::from_millis(10))
        .with_validate_shields_delay(Duration::from_millis(10))
}

/// Assemble a provider over in-memory stores and a scripted observer.
pub fn test_provider(
    seed: u8,
    observer: Arc<InMemoryChainObserver>,
    policy: Arc<dyn PolicyGate>,
) -> ListProvider {
    ListProvider::init(
        test_config(),
        test_signing_key(seed),
        observer,
        policy,
        ProviderStores::in_memory(),
    )
    .expect("provider init")
}
