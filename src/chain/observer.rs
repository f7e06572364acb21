//! Chain observer: the provider's only upstream dependency.
//!
//! Two capabilities: scan new shields from a block floor, and resolve a txid
//! to the facts validation needs (sender, block, block timestamp). The RPC
//! implementation talks JSON-RPC through alloy; tests use the in-memory
//! observer or a mock.

use std::collections::HashMap;

use alloy::primitives::{keccak256, Address, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{BlockTransactionsKind, Filter};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{NetworkName, ShieldData, ShieldReceipt};
use crate::infra::{retry_with_config, ListProviderError, Result, RetryConfig};

/// Pulls shield observations and transaction receipts from a chain.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainObserver: Send + Sync {
    /// All shields observed at or after `from_block`, ordered by block.
    async fn get_new_shields(
        &self,
        network: NetworkName,
        from_block: u64,
    ) -> Result<Vec<ShieldData>>;

    /// Resolve a txid to its receipt facts. The mined block's timestamp is
    /// authoritative; validation re-derives shield age from it.
    async fn get_shield_receipt(
        &self,
        network: NetworkName,
        txid: &str,
    ) -> Result<ShieldReceipt>;
}

/// Per-network RPC endpoint settings.
#[derive(Debug, Clone)]
pub struct RpcEndpoint {
    pub rpc_url: String,
    /// Shield contract emitting `Shield(bytes32 commitmentHash, bytes32 blindedCommitment)`,
    /// commitment hash indexed, blinded commitment in the data word.
    pub shield_contract: Address,
}

/// JSON-RPC backed observer.
pub struct RpcChainObserver {
    endpoints: HashMap<NetworkName, RpcEndpoint>,
    retry: RetryConfig,
}

fn shield_event_topic() -> B256 {
    keccak256(b"Shield(bytes32,bytes32)")
}

fn lowercase_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

impl RpcChainObserver {
    pub fn new(endpoints: HashMap<NetworkName, RpcEndpoint>) -> Self {
        Self {
            endpoints,
            retry: RetryConfig::rpc(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self, network: NetworkName) -> Result<&RpcEndpoint> {
        self.endpoints.get(&network).ok_or_else(|| {
            ListProviderError::Configuration(format!("no rpc endpoint configured for {network}"))
        })
    }

    async fn fetch_new_shields(
        &self,
        endpoint: &RpcEndpoint,
        network: NetworkName,
        from_block: u64,
    ) -> Result<Vec<ShieldData>> {
        let provider = ProviderBuilder::new().on_http(
            endpoint
                .rpc_url
                .parse()
                .map_err(|e| ListProviderError::Configuration(format!("invalid rpc url: {e}")))?,
        );

        let filter = Filter::new()
            .address(endpoint.shield_contract)
            .event_signature(shield_event_topic())
            .from_block(from_block);

        let logs = provider
            .get_logs(&filter)
            .await
            .map_err(|e| ListProviderError::ChainRpc(e.to_string()))?;

        let mut block_timestamps: HashMap<u64, u64> = HashMap::new();
        let mut shields = Vec::with_capacity(logs.len());

        for log in logs {
            let txid = log
                .transaction_hash
                .ok_or_else(|| ListProviderError::ChainRpc("log without txid".to_string()))?;
            let block_number = log
                .block_number
                .ok_or_else(|| ListProviderError::ChainRpc("log without block".to_string()))?;

            let topics = log.inner.data.topics();
            let commitment_hash = topics.get(1).ok_or_else(|| {
                ListProviderError::ChainRpc("shield log missing commitment topic".to_string())
            })?;
            let data = log.inner.data.data.as_ref();
            if data.len() < 32 {
                return Err(ListProviderError::ChainRpc(
                    "shield log data shorter than one word".to_string(),
                ));
            }

            let timestamp_ms = match log.block_timestamp {
                Some(seconds) => seconds * 1000,
                None => {
                    let seconds = match block_timestamps.get(&block_number) {
                        Some(&seconds) => seconds,
                        None => {
                            let seconds =
                                Self::block_timestamp(&provider, block_number).await?;
                            block_timestamps.insert(block_number, seconds);
                            seconds
                        }
                    };
                    seconds * 1000
                }
            };

            shields.push(ShieldData {
                txid: lowercase_hex(txid.as_slice()),
                commitment_hash: lowercase_hex(commitment_hash.as_slice()),
                blinded_commitment: lowercase_hex(&data[..32]),
                timestamp_ms,
                block_number,
            });
        }

        shields.sort_by_key(|shield| shield.block_number);
        debug!(
            network = %network,
            from_block,
            count = shields.len(),
            "scanned shield logs"
        );
        Ok(shields)
    }

    async fn block_timestamp<T, P>(provider: &P, block_number: u64) -> Result<u64>
    where
        T: alloy::transports::Transport + Clone,
        P: Provider<T>,
    {
        let block = provider
            .get_block_by_number(block_number.into(), BlockTransactionsKind::Hashes)
            .await
            .map_err(|e| ListProviderError::ChainRpc(e.to_string()))?
            .ok_or_else(|| {
                ListProviderError::ChainRpc(format!("block {block_number} not found"))
            })?;
        Ok(block.header.timestamp)
    }

    async fn fetch_shield_receipt(
        &self,
        endpoint: &RpcEndpoint,
        txid: &str,
    ) -> Result<ShieldReceipt> {
        let provider = ProviderBuilder::new().on_http(
            endpoint
                .rpc_url
                .parse()
                .map_err(|e| ListProviderError::Configuration(format!("invalid rpc url: {e}")))?,
        );

        let prefixed;
        let normalized = if txid.starts_with("0x") {
            txid
        } else {
            prefixed = format!("0x{txid}");
            &prefixed
        };
        let tx_hash: B256 = normalized
            .parse()
            .map_err(|e| ListProviderError::ChainRpc(format!("invalid txid {txid}: {e}")))?;

        let receipt = provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| ListProviderError::ChainRpc(e.to_string()))?
            .ok_or_else(|| ListProviderError::ChainRpc(format!("no receipt for {txid}")))?;

        let block_number = receipt
            .block_number
            .ok_or_else(|| ListProviderError::ChainRpc(format!("receipt for {txid} not mined")))?;
        let timestamp_seconds = Self::block_timestamp(&provider, block_number).await?;

        Ok(ShieldReceipt {
            from_address: lowercase_hex(receipt.from.as_slice()),
            block_number,
            timestamp_ms: timestamp_seconds * 1000,
        })
    }
}

#[async_trait]
impl ChainObserver for RpcChainObserver {
    async fn get_new_shields(
        &self,
        network: NetworkName,
        from_block: u64,
    ) -> Result<Vec<ShieldData>> {
        let endpoint = self.endpoint(network)?;
        retry_with_config(&self.retry, "get_new_shields", || {
            self.fetch_new_shields(endpoint, network, from_block)
        })
        .await
    }

    async fn get_shield_receipt(
        &self,
        network: NetworkName,
        txid: &str,
    ) -> Result<ShieldReceipt> {
        let endpoint = self.endpoint(network)?;
        retry_with_config(&self.retry, "get_shield_receipt", || {
            self.fetch_shield_receipt(endpoint, txid)
        })
        .await
    }
}

// ============================================================================
// In-memory observer
// ============================================================================

/// Scripted observer for tests and development.
#[derive(Default)]
pub struct InMemoryChainObserver {
    shields: RwLock<HashMap<NetworkName, Vec<ShieldData>>>,
    receipts: RwLock<HashMap<(NetworkName, String), ShieldReceipt>>,
}

impl InMemoryChainObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shield the observer will report, along with the receipt
    /// validation will later resolve for it.
    pub async fn add_shield(
        &self,
        network: NetworkName,
        shield: ShieldData,
        from_address: &str,
    ) {
        let receipt = ShieldReceipt {
            from_address: from_address.to_string(),
            block_number: shield.block_number,
            timestamp_ms: shield.timestamp_ms,
        };
        self.receipts
            .write()
            .await
            .insert((network, shield.txid.clone()), receipt);
        self.shields
            .write()
            .await
            .entry(network)
            .or_default()
            .push(shield);
    }

    /// Override the receipt for a txid (e.g. to simulate an observer that
    /// reported an optimistic timestamp).
    pub async fn set_receipt(&self, network: NetworkName, txid: &str, receipt: ShieldReceipt) {
        self.receipts
            .write()
            .await
            .insert((network, txid.to_string()), receipt);
    }

    /// Drop all scripted shields so the next scan returns nothing new.
    pub async fn clear_shields(&self) {
        self.shields.write().await.clear();
    }
}

#[async_trait]
impl ChainObserver for InMemoryChainObserver {
    async fn get_new_shields(
        &self,
        network: NetworkName,
        from_block: u64,
    ) -> Result<Vec<ShieldData>> {
        let shields = self.shields.read().await;
        let mut out: Vec<ShieldData> = shields
            .get(&network)
            .map(|list| {
                list.iter()
                    .filter(|shield| shield.block_number >= from_block)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by_key(|shield| shield.block_number);
        Ok(out)
    }

    async fn get_shield_receipt(
        &self,
        network: NetworkName,
        txid: &str,
    ) -> Result<ShieldReceipt> {
        self.receipts
            .read()
            .await
            .get(&(network, txid.to_string()))
            .cloned()
            .ok_or_else(|| ListProviderError::ChainRpc(format!("no receipt for {txid}")))
    }
}
