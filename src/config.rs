//! Configuration for the list provider.
//!
//! Everything is env-driven with builder-style overrides for embedding. The
//! recognized variables:
//!
//! - `LIST_NAME`, `LIST_DESCRIPTION` — informational
//! - `LIST_PROVIDER_PRIVATE_KEY` — hex Ed25519 secret key
//! - `QUEUE_SHIELDS_OVERRIDE_DELAY_MSEC` — queue poller cadence (default 20 min)
//! - `VALIDATE_SHIELDS_OVERRIDE_DELAY_MSEC` — validate poller cadence (default 30 s)
//! - `HOURS_SHIELD_PENDING_PERIOD` — shield age required before validation
//! - `NETWORK_NAMES` — comma-separated networks to poll, in order
//! - `DEPLOYMENT_BLOCK_<NETWORK>` — per-network ingest floor override
//! - `RPC_URL_<NETWORK>` — per-network JSON-RPC endpoint

use std::str::FromStr;
use std::time::Duration;

use crate::domain::NetworkName;
use crate::infra::{ListProviderError, Result};
use crate::provider::{DEFAULT_QUEUE_SHIELDS_DELAY_MSEC, DEFAULT_VALIDATE_SHIELDS_DELAY_MSEC};

/// Default shield pending period, in hours.
pub const DEFAULT_HOURS_SHIELD_PENDING_PERIOD: f64 = 3.0;

/// Default coordinator drain cadence when no wake signal arrives.
pub const DEFAULT_EVENT_QUEUE_POLL_DELAY_MSEC: u64 = 5_000;

/// Per-network settings.
#[derive(Debug, Clone)]
pub struct NetworkSettings {
    pub name: NetworkName,
    /// Floor for initial ingest when no cursor is stored yet.
    pub deployment_block: u64,
    pub rpc_url: Option<String>,
}

impl NetworkSettings {
    pub fn new(name: NetworkName) -> Self {
        Self {
            name,
            deployment_block: name.deployment_block(),
            rpc_url: None,
        }
    }
}

/// List-provider configuration.
#[derive(Debug, Clone)]
pub struct ListProviderConfig {
    /// Informational list name.
    pub name: String,
    /// Informational list description.
    pub description: String,
    /// Queue-shields poller cadence.
    pub queue_shields_delay: Duration,
    /// Validate-shields poller cadence.
    pub validate_shields_delay: Duration,
    /// Coordinator drain cadence.
    pub event_queue_poll_delay: Duration,
    /// Age a shield must reach before it is eligible for validation.
    pub pending_period: Duration,
    /// Networks to poll, in order.
    pub networks: Vec<NetworkSettings>,
}

impl ListProviderConfig {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            queue_shields_delay: Duration::from_millis(DEFAULT_QUEUE_SHIELDS_DELAY_MSEC),
            validate_shields_delay: Duration::from_millis(DEFAULT_VALIDATE_SHIELDS_DELAY_MSEC),
            event_queue_poll_delay: Duration::from_millis(DEFAULT_EVENT_QUEUE_POLL_DELAY_MSEC),
            pending_period: hours_to_duration(DEFAULT_HOURS_SHIELD_PENDING_PERIOD),
            networks: Vec::new(),
        }
    }

    pub fn with_networks(mut self, networks: Vec<NetworkSettings>) -> Self {
        self.networks = networks;
        self
    }

    pub fn with_pending_period(mut self, pending_period: Duration) -> Self {
        self.pending_period = pending_period;
        self
    }

    pub fn with_queue_shields_delay(mut self, delay: Duration) -> Self {
        self.queue_shields_delay = delay;
        self
    }

    pub fn with_validate_shields_delay(mut self, delay: Duration) -> Self {
        self.validate_shields_delay = delay;
        self
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let name = get("LIST_NAME").unwrap_or_else(|| "poi-list-provider".to_string());
        let description = get("LIST_DESCRIPTION").unwrap_or_default();

        let mut config = Self::new(name, description);

        if let Some(raw) = get("QUEUE_SHIELDS_OVERRIDE_DELAY_MSEC") {
            config.queue_shields_delay = Duration::from_millis(parse_var(
                "QUEUE_SHIELDS_OVERRIDE_DELAY_MSEC",
                &raw,
            )?);
        }
        // The validate poller reads its own override, not the queue one.
        if let Some(raw) = get("VALIDATE_SHIELDS_OVERRIDE_DELAY_MSEC") {
            config.validate_shields_delay = Duration::from_millis(parse_var(
                "VALIDATE_SHIELDS_OVERRIDE_DELAY_MSEC",
                &raw,
            )?);
        }
        if let Some(raw) = get("HOURS_SHIELD_PENDING_PERIOD") {
            let hours: f64 = parse_var("HOURS_SHIELD_PENDING_PERIOD", &raw)?;
            if hours < 0.0 {
                return Err(ListProviderError::Configuration(
                    "HOURS_SHIELD_PENDING_PERIOD must be non-negative".to_string(),
                ));
            }
            config.pending_period = hours_to_duration(hours);
        }

        let network_names = get("NETWORK_NAMES").unwrap_or_default();
        for name in parse_network_names(&network_names)? {
            let mut settings = NetworkSettings::new(name);
            let suffix = env_suffix(name);
            if let Some(raw) = get(&format!("DEPLOYMENT_BLOCK_{suffix}")) {
                settings.deployment_block = parse_var("DEPLOYMENT_BLOCK", &raw)?;
            }
            settings.rpc_url = get(&format!("RPC_URL_{suffix}"));
            config.networks.push(settings);
        }

        Ok(config)
    }

    /// The networks to poll, in configured order.
    pub fn network_names(&self) -> Vec<NetworkName> {
        self.networks.iter().map(|settings| settings.name).collect()
    }
}

fn hours_to_duration(hours: f64) -> Duration {
    Duration::from_secs_f64(hours * 3600.0)
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e| {
        ListProviderError::Configuration(format!("invalid value for {key}: {e}"))
    })
}

/// Parse a comma-separated network list, preserving order.
pub fn parse_network_names(raw: &str) -> Result<Vec<NetworkName>> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            name.parse()
                .map_err(|e: String| ListProviderError::Configuration(e))
        })
        .collect()
}

fn env_suffix(network: NetworkName) -> String {
    network.as_str().to_uppercase().replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ListProviderConfig::new("test-list", "a test list");
        assert_eq!(config.queue_shields_delay, Duration::from_secs(20 * 60));
        assert_eq!(config.validate_shields_delay, Duration::from_secs(30));
        assert_eq!(
            config.pending_period,
            Duration::from_secs((DEFAULT_HOURS_SHIELD_PENDING_PERIOD * 3600.0) as u64)
        );
        assert!(config.networks.is_empty());
    }

    #[test]
    fn test_parse_network_names() {
        let networks = parse_network_names("ethereum, polygon ,arbitrum").unwrap();
        assert_eq!(
            networks,
            vec![
                NetworkName::Ethereum,
                NetworkName::Polygon,
                NetworkName::Arbitrum
            ]
        );

        assert!(parse_network_names("ethereum,dogecoin").is_err());
        assert!(parse_network_names("").unwrap().is_empty());
    }

    #[test]
    fn test_from_vars() {
        let config = ListProviderConfig::from_vars(|key| match key {
            "LIST_NAME" => Some("sanctions-list".to_string()),
            "QUEUE_SHIELDS_OVERRIDE_DELAY_MSEC" => Some("60000".to_string()),
            "VALIDATE_SHIELDS_OVERRIDE_DELAY_MSEC" => Some("5000".to_string()),
            "HOURS_SHIELD_PENDING_PERIOD" => Some("0.5".to_string()),
            "NETWORK_NAMES" => Some("ethereum,polygon".to_string()),
            "DEPLOYMENT_BLOCK_POLYGON" => Some("12345".to_string()),
            "RPC_URL_ETHEREUM" => Some("http://localhost:8545".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.name, "sanctions-list");
        assert_eq!(config.queue_shields_delay, Duration::from_secs(60));
        assert_eq!(config.validate_shields_delay, Duration::from_secs(5));
        assert_eq!(config.pending_period, Duration::from_secs(30 * 60));
        assert_eq!(config.networks.len(), 2);
        assert_eq!(config.networks[0].name, NetworkName::Ethereum);
        assert_eq!(
            config.networks[0].rpc_url.as_deref(),
            Some("http://localhost:8545")
        );
        assert_eq!(
            config.networks[0].deployment_block,
            NetworkName::Ethereum.deployment_block()
        );
        assert_eq!(config.networks[1].deployment_block, 12345);
    }

    #[test]
    fn test_validate_override_is_independent_of_queue_override() {
        // Only the queue override is set; the validate cadence keeps its
        // own default instead of inheriting the queue value.
        let config = ListProviderConfig::from_vars(|key| match key {
            "QUEUE_SHIELDS_OVERRIDE_DELAY_MSEC" => Some("1".to_string()),
            "NETWORK_NAMES" => Some("ethereum".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.queue_shields_delay, Duration::from_millis(1));
        assert_eq!(
            config.validate_shields_delay,
            Duration::from_millis(DEFAULT_VALIDATE_SHIELDS_DELAY_MSEC)
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = ListProviderConfig::from_vars(|key| match key {
            "HOURS_SHIELD_PENDING_PERIOD" => Some("-1".to_string()),
            _ => None,
        });
        assert!(result.is_err());

        let result = ListProviderConfig::from_vars(|key| match key {
            "QUEUE_SHIELDS_OVERRIDE_DELAY_MSEC" => Some("soon".to_string()),
            _ => None,
        });
        assert!(result.is_err());
    }
}
