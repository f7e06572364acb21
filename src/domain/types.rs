//! Core identifier types shared across the list provider.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Maximum number of events served in a single range read.
pub const MAX_EVENT_QUERY_RANGE_LENGTH: usize = 500;

/// Maximum number of blocked-shield records served in a single sync read.
pub const MAX_BLOCKED_SHIELDS_SYNCED: usize = 50;

/// Maximum number of queued-but-unsigned events exposed in a snapshot.
pub const MAX_PENDING_EVENTS_SNAPSHOT: usize = 500;

/// Current wall-clock time in integer milliseconds.
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Supported networks. A closed, statically configured set; all per-network
/// state (shield queue, ingest cursor, pollers) is partitioned by this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkName {
    Ethereum,
    BnbChain,
    Polygon,
    Arbitrum,
    EthereumSepolia,
}

impl NetworkName {
    pub const ALL: [NetworkName; 5] = [
        NetworkName::Ethereum,
        NetworkName::BnbChain,
        NetworkName::Polygon,
        NetworkName::Arbitrum,
        NetworkName::EthereumSepolia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkName::Ethereum => "ethereum",
            NetworkName::BnbChain => "bnb-chain",
            NetworkName::Polygon => "polygon",
            NetworkName::Arbitrum => "arbitrum",
            NetworkName::EthereumSepolia => "ethereum-sepolia",
        }
    }

    /// Default floor for initial ingest: the block the shield contract was
    /// deployed at on this network. Overridable through configuration.
    pub fn deployment_block(&self) -> u64 {
        match self {
            NetworkName::Ethereum => 14_737_691,
            NetworkName::BnbChain => 17_633_701,
            NetworkName::Polygon => 28_083_766,
            NetworkName::Arbitrum => 56_109_834,
            NetworkName::EthereumSepolia => 5_784_866,
        }
    }
}

impl fmt::Display for NetworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ethereum" => Ok(NetworkName::Ethereum),
            "bnb-chain" => Ok(NetworkName::BnbChain),
            "polygon" => Ok(NetworkName::Polygon),
            "arbitrum" => Ok(NetworkName::Arbitrum),
            "ethereum-sepolia" => Ok(NetworkName::EthereumSepolia),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// Lifecycle of a queued shield. Transitions are `Pending -> Allowed` or
/// `Pending -> Blocked`; terminal states never regress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShieldStatus {
    Pending,
    Allowed,
    Blocked,
}

impl ShieldStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShieldStatus::Pending => "pending",
            ShieldStatus::Allowed => "allowed",
            ShieldStatus::Blocked => "blocked",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ShieldStatus::Pending)
    }
}

impl fmt::Display for ShieldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShieldStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ShieldStatus::Pending),
            "allowed" => Ok(ShieldStatus::Allowed),
            "blocked" => Ok(ShieldStatus::Blocked),
            other => Err(format!("unknown shield status: {other}")),
        }
    }
}

/// Identity of a list: the hex-encoded Ed25519 public key the list signs
/// under, lowercase, without a `0x` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListKey(pub String);

impl ListKey {
    /// Normalize an incoming hex string (optional `0x`, any case).
    pub fn new(hex_key: impl Into<String>) -> Self {
        let raw: String = hex_key.into();
        let trimmed = raw.strip_prefix("0x").unwrap_or(&raw);
        ListKey(trimmed.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_name_roundtrip() {
        for network in NetworkName::ALL {
            let parsed: NetworkName = network.as_str().parse().unwrap();
            assert_eq!(parsed, network);
        }
    }

    #[test]
    fn test_network_name_unknown() {
        assert!("dogecoin".parse::<NetworkName>().is_err());
    }

    #[test]
    fn test_shield_status_roundtrip() {
        for status in [
            ShieldStatus::Pending,
            ShieldStatus::Allowed,
            ShieldStatus::Blocked,
        ] {
            let parsed: ShieldStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!ShieldStatus::Pending.is_terminal());
        assert!(ShieldStatus::Allowed.is_terminal());
        assert!(ShieldStatus::Blocked.is_terminal());
    }

    #[test]
    fn test_list_key_normalization() {
        let key = ListKey::new("0xABCD1234");
        assert_eq!(key.as_str(), "abcd1234");

        let bare = ListKey::new("abcd1234");
        assert_eq!(key, bare);
    }

    #[test]
    fn test_deployment_blocks_nonzero() {
        for network in NetworkName::ALL {
            assert!(network.deployment_block() > 0);
        }
    }
}
