//! Queue-shields poller.
//!
//! Pulls new shields from the chain observer into the shield queue, one
//! network at a time, then advances the per-network ingest cursor. Networks
//! are drained in series so a pass never fans out across every chain RPC at
//! once. Per-shield insert failures are logged and swallowed; the remaining
//! shields of the batch are still attempted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::chain::ChainObserver;
use crate::config::NetworkSettings;
use crate::infra::{
    ListProviderError, NetworkStatusStore, Result, ShieldQueueStore,
};

/// Default queue-shields cadence: 20 minutes.
pub const DEFAULT_QUEUE_SHIELDS_DELAY_MSEC: u64 = 20 * 60 * 1000;

/// Running statistics for the queue-shields poller.
#[derive(Debug, Default, Clone)]
pub struct QueueShieldsStats {
    pub iterations: u64,
    pub shields_queued: u64,
    pub duplicates_skipped: u64,
    pub insert_errors: u64,
    pub network_errors: u64,
}

/// Per-list ingest poller.
pub struct QueueShieldsPoller {
    networks: Vec<NetworkSettings>,
    observer: Arc<dyn ChainObserver>,
    shield_queue: Arc<dyn ShieldQueueStore>,
    status_store: Arc<dyn NetworkStatusStore>,
    stats: RwLock<QueueShieldsStats>,
    running: RwLock<bool>,
    stop_signal: Notify,
}

impl QueueShieldsPoller {
    pub fn new(
        networks: Vec<NetworkSettings>,
        observer: Arc<dyn ChainObserver>,
        shield_queue: Arc<dyn ShieldQueueStore>,
        status_store: Arc<dyn NetworkStatusStore>,
    ) -> Self {
        Self {
            networks,
            observer,
            shield_queue,
            status_store,
            stats: RwLock::new(QueueShieldsStats::default()),
            running: RwLock::new(false),
            stop_signal: Notify::new(),
        }
    }

    pub async fn stats(&self) -> QueueShieldsStats {
        self.stats.read().await.clone()
    }

    /// Cooperative poll loop: run one pass, sleep the delay, repeat. Never
    /// overlaps iterations.
    pub async fn run(&self, delay: Duration) -> Result<()> {
        {
            let mut running = self.running.write().await;
            if *running {
                return Err(ListProviderError::AlreadyRunning("queue-shields poller"));
            }
            *running = true;
        }

        info!(networks = self.networks.len(), "starting queue-shields poller");

        loop {
            if !*self.running.read().await {
                info!("queue-shields poller stopping");
                break;
            }

            self.run_iteration().await;
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.stop_signal.notified() => {}
            }
        }

        Ok(())
    }

    pub async fn stop(&self) {
        *self.running.write().await = false;
        self.stop_signal.notify_one();
    }

    /// One full pass over all configured networks, in series. Network-level
    /// failures are isolated: the remaining networks still run.
    #[instrument(skip(self))]
    pub async fn run_iteration(&self) {
        for settings in &self.networks {
            if let Err(e) = self.queue_new_shields(settings).await {
                warn!(
                    network = %settings.name,
                    error = %e,
                    "failed to queue new shields"
                );
                self.stats.write().await.network_errors += 1;
            }
        }
        self.stats.write().await.iterations += 1;
    }

    /// Ingest for one network: read the cursor (deployment block when
    /// absent), pull shields, insert each as pending, then advance the
    /// cursor to the last returned shield's block. An empty scan leaves both
    /// the queue and the cursor untouched.
    async fn queue_new_shields(&self, settings: &NetworkSettings) -> Result<()> {
        let network = settings.name;
        let from_block = self
            .status_store
            .latest_block_scanned(network)
            .await?
            .unwrap_or(settings.deployment_block);

        let shields = self.observer.get_new_shields(network, from_block).await?;
        if shields.is_empty() {
            debug!(network = %network, from_block, "no new shields");
            return Ok(());
        }

        let mut queued = 0u64;
        for shield in &shields {
            match self.shield_queue.insert_pending_shield(network, shield).await {
                Ok(true) => queued += 1,
                Ok(false) => {
                    self.stats.write().await.duplicates_skipped += 1;
                }
                Err(e) => {
                    // One bad shield must not block the rest of the batch.
                    warn!(
                        network = %network,
                        txid = %shield.txid,
                        error = %e,
                        "failed to insert pending shield"
                    );
                    self.stats.write().await.insert_errors += 1;
                }
            }
        }

        if let Some(last) = shields.last() {
            self.status_store
                .save_status(network, last.block_number)
                .await?;
        }

        self.stats.write().await.shields_queued += queued;
        info!(
            network = %network,
            from_block,
            fetched = shields.len(),
            queued,
            "queued new shields"
        );
        Ok(())
    }
}
