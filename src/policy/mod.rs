//! Policy gate: the list operator's allow/block decision.
//!
//! The gate is a capability value consumed by the validation poller, not a
//! base class: operators hand the provider an `Arc<dyn PolicyGate>`. Gates
//! may perform remote lookups but must be idempotent with respect to their
//! inputs; the `from_address` argument is always lowercase.

use std::collections::HashSet;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::NetworkName;
use crate::infra::Result;

/// Outcome of classifying one shield.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Block { reason: Option<String> },
}

impl PolicyDecision {
    pub fn should_allow(&self) -> bool {
        matches!(self, PolicyDecision::Allow)
    }
}

/// The single capability a list operator supplies.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PolicyGate: Send + Sync {
    /// Classify one shield. `from_address` is lowercase hex; `timestamp_ms`
    /// is the receipt-derived mined time.
    async fn classify_shield(
        &self,
        network: NetworkName,
        txid: &str,
        from_address: &str,
        timestamp_ms: u64,
    ) -> Result<PolicyDecision>;
}

/// Allows everything. The neutral list.
pub struct AllowAllPolicy;

#[async_trait]
impl PolicyGate for AllowAllPolicy {
    async fn classify_shield(
        &self,
        _network: NetworkName,
        _txid: &str,
        _from_address: &str,
        _timestamp_ms: u64,
    ) -> Result<PolicyDecision> {
        Ok(PolicyDecision::Allow)
    }
}

/// Blocks shields originating from a fixed set of addresses.
pub struct AddressBlocklistPolicy {
    blocked_addresses: HashSet<String>,
    reason: String,
}

impl AddressBlocklistPolicy {
    /// Addresses are normalized to lowercase at construction so comparisons
    /// line up with the gate's lowercase input contract.
    pub fn new<I, S>(addresses: I, reason: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            blocked_addresses: addresses
                .into_iter()
                .map(|address| address.as_ref().to_lowercase())
                .collect(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl PolicyGate for AddressBlocklistPolicy {
    async fn classify_shield(
        &self,
        _network: NetworkName,
        _txid: &str,
        from_address: &str,
        _timestamp_ms: u64,
    ) -> Result<PolicyDecision> {
        if self.blocked_addresses.contains(from_address) {
            Ok(PolicyDecision::Block {
                reason: Some(self.reason.clone()),
            })
        } else {
            Ok(PolicyDecision::Allow)
        }
    }
}
