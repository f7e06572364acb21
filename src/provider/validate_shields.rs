//! Validate-shields poller.
//!
//! Drains shields that have aged past the pending period, re-derives each
//! shield's mined timestamp from its transaction receipt, consults the
//! policy gate, and routes the outcome: allowed shields into the event-queue
//! coordinator, blocked shields into the signed blocklist. The shield-queue
//! status flips only after the emission succeeded, so a crash in between
//! re-validates rather than losing the shield.
//!
//! Per-row failures are isolated: the row stays `Pending` and a later pass
//! retries it. The pending period itself bounds how long a row can churn.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::chain::ChainObserver;
use crate::domain::{now_ms, NetworkName, PoiEventShield, ShieldQueueItem, ShieldStatus};
use crate::infra::{ListProviderError, Result, ShieldQueueStore};
use crate::policy::{PolicyDecision, PolicyGate};
use crate::provider::{BlockedShieldWriter, PoiEventQueue};

/// Default validate-shields cadence: 30 seconds.
pub const DEFAULT_VALIDATE_SHIELDS_DELAY_MSEC: u64 = 30_000;

/// Rows validated per network per pass.
pub const VALIDATE_BATCH_SIZE: usize = 100;

/// Running statistics for the validate-shields poller.
#[derive(Debug, Default, Clone)]
pub struct ValidateShieldsStats {
    pub iterations: u64,
    pub shields_allowed: u64,
    pub shields_blocked: u64,
    /// Receipt timestamp was still inside the pending period; row deferred.
    pub shields_deferred: u64,
    pub row_errors: u64,
    pub network_errors: u64,
}

enum ValidationOutcome {
    Allowed,
    Blocked,
    StillPending,
}

/// Per-list validation poller.
pub struct ValidateShieldsPoller {
    networks: Vec<NetworkName>,
    pending_period: Duration,
    observer: Arc<dyn ChainObserver>,
    policy: Arc<dyn PolicyGate>,
    shield_queue: Arc<dyn ShieldQueueStore>,
    event_queue: Arc<PoiEventQueue>,
    blocklist: Arc<BlockedShieldWriter>,
    stats: RwLock<ValidateShieldsStats>,
    running: RwLock<bool>,
    stop_signal: Notify,
}

impl ValidateShieldsPoller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        networks: Vec<NetworkName>,
        pending_period: Duration,
        observer: Arc<dyn ChainObserver>,
        policy: Arc<dyn PolicyGate>,
        shield_queue: Arc<dyn ShieldQueueStore>,
        event_queue: Arc<PoiEventQueue>,
        blocklist: Arc<BlockedShieldWriter>,
    ) -> Self {
        Self {
            networks,
            pending_period,
            observer,
            policy,
            shield_queue,
            event_queue,
            blocklist,
            stats: RwLock::new(ValidateShieldsStats::default()),
            running: RwLock::new(false),
            stop_signal: Notify::new(),
        }
    }

    pub async fn stats(&self) -> ValidateShieldsStats {
        self.stats.read().await.clone()
    }

    /// Cooperative poll loop. Never overlaps iterations.
    pub async fn run(&self, delay: Duration) -> Result<()> {
        {
            let mut running = self.running.write().await;
            if *running {
                return Err(ListProviderError::AlreadyRunning("validate-shields poller"));
            }
            *running = true;
        }

        info!(
            networks = self.networks.len(),
            pending_period_secs = self.pending_period.as_secs(),
            "starting validate-shields poller"
        );

        loop {
            if !*self.running.read().await {
                info!("validate-shields poller stopping");
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

    /// One pass over all networks, in series.
    #[instrument(skip(self))]
    pub async fn run_iteration(&self) {
        for &network in &self.networks {
            if let Err(e) = self.validate_pending_shields(network).await {
                warn!(network = %network, error = %e, "failed to validate pending shields");
                self.stats.write().await.network_errors += 1;
            }
        }
        self.stats.write().await.iterations += 1;
    }

    /// Validate one network's eligible shields: rows older than the pending
    /// period, up to the batch cap, fanned out concurrently within the
    /// batch.
    async fn validate_pending_shields(&self, network: NetworkName) -> Result<()> {
        let end_timestamp = now_ms().saturating_sub(self.pending_period.as_millis() as u64);
        let pending = self
            .shield_queue
            .get_pending_shields(network, end_timestamp, VALIDATE_BATCH_SIZE)
            .await?;
        if pending.is_empty() {
            return Ok(());
        }

        debug!(network = %network, batch = pending.len(), "validating pending shields");

        let results = join_all(
            pending
                .iter()
                .map(|item| self.validate_shield(network, item, end_timestamp)),
        )
        .await;

        let mut stats = self.stats.write().await;
        for (item, result) in pending.iter().zip(results) {
            match result {
                Ok(ValidationOutcome::Allowed) => stats.shields_allowed += 1,
                Ok(ValidationOutcome::Blocked) => stats.shields_blocked += 1,
                Ok(ValidationOutcome::StillPending) => stats.shields_deferred += 1,
                Err(e) => {
                    // Row stays pending; the next pass retries it.
                    warn!(
                        network = %network,
                        txid = %item.txid,
                        error = %e,
                        "shield validation failed, leaving pending"
                    );
                    stats.row_errors += 1;
                }
            }
        }

        Ok(())
    }

    /// Validate one shield end to end.
    async fn validate_shield(
        &self,
        network: NetworkName,
        item: &ShieldQueueItem,
        end_timestamp: u64,
    ) -> Result<ValidationOutcome> {
        let receipt = self.observer.get_shield_receipt(network, &item.txid).await?;

        // The receipt's block timestamp is authoritative. An observer that
        // reported an optimistic timestamp must not sneak a too-young shield
        // past the pending period.
        let timestamp = receipt.timestamp_ms;
        if timestamp > end_timestamp {
            debug!(
                network = %network,
                txid = %item.txid,
                timestamp,
                end_timestamp,
                "receipt timestamp still inside pending period, deferring"
            );
            return Ok(ValidationOutcome::StillPending);
        }

        let from_address = receipt.from_address.to_lowercase();
        let decision = self
            .policy
            .classify_shield(network, &item.txid, &from_address, timestamp)
            .await?;

        match decision {
            PolicyDecision::Allow => {
                self.event_queue
                    .queue_unsigned_poi_shield_event(
                        network,
                        PoiEventShield {
                            commitment_hash: item.commitment_hash.clone(),
                            blinded_commitment: item.blinded_commitment.clone(),
                        },
                    )
                    .await;
                self.shield_queue
                    .update_shield_status(
                        network,
                        &item.txid,
                        &item.commitment_hash,
                        ShieldStatus::Allowed,
                    )
                    .await?;
                Ok(ValidationOutcome::Allowed)
            }
            PolicyDecision::Block { reason } => {
                self.blocklist
                    .append_blocked_shield(network, item, reason)
                    .await?;
                self.shield_queue
                    .update_shield_status(
                        network,
                        &item.txid,
                        &item.commitment_hash,
                        ShieldStatus::Blocked,
                    )
                    .await?;
                Ok(ValidationOutcome::Blocked)
            }
        }
    }
}
