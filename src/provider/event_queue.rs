//! POI event queue coordinator.
//!
//! The single writer over a list's event log. Events arrive from the
//! validation poller (shields) and from wallet submissions (transacts), are
//! buffered FIFO, and are drained either on a wake signal or on the drain
//! cadence. Each drained event is signed at the exact index the log holds at
//! append time; the append lock makes the read-sign-append sequence atomic
//! with respect to any other caller of [`drain`].
//!
//! A log-invariant violation (non-dense index, broken starting-index chain)
//! halts the coordinator: continuing would silently corrupt the proofs
//! downstream wallets derive from the log.
//!
//! [`drain`]: PoiEventQueue::drain

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::crypto::{ListSigningKey, ListVerifyingKey};
use crate::domain::{
    ListKey, NetworkName, PoiEventShield, PoiEventTransact, SignedPoiEvent, UnsignedPoiEvent,
    MAX_EVENT_QUERY_RANGE_LENGTH, MAX_PENDING_EVENTS_SNAPSHOT,
};
use crate::infra::{ListProviderError, PoiEventStore, Result};

/// Single-writer coordinator for one list's event log.
pub struct PoiEventQueue {
    list_key: ListKey,
    signer: ListSigningKey,
    store: Arc<dyn PoiEventStore>,
    queue: Mutex<VecDeque<(NetworkName, UnsignedPoiEvent)>>,
    wake: Notify,
    running: RwLock<bool>,
    append_lock: Mutex<()>,
}

impl PoiEventQueue {
    pub fn new(signer: ListSigningKey, store: Arc<dyn PoiEventStore>) -> Self {
        let list_key = signer.list_key();
        Self {
            list_key,
            signer,
            store,
            queue: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
            running: RwLock::new(false),
            append_lock: Mutex::new(()),
        }
    }

    pub fn list_key(&self) -> &ListKey {
        &self.list_key
    }

    /// Accept an allowed shield for sequencing.
    pub async fn queue_unsigned_poi_shield_event(
        &self,
        network: NetworkName,
        shield: PoiEventShield,
    ) {
        self.enqueue(network, UnsignedPoiEvent::Shield(shield)).await;
    }

    /// Accept a transact event for sequencing.
    pub async fn queue_unsigned_poi_transact_event(
        &self,
        network: NetworkName,
        transact: PoiEventTransact,
    ) {
        self.enqueue(network, UnsignedPoiEvent::Transact(transact))
            .await;
    }

    async fn enqueue(&self, network: NetworkName, event: UnsignedPoiEvent) {
        {
            let mut queue = self.queue.lock().await;
            queue.push_back((network, event));
            debug!(
                list_key = %self.list_key,
                network = %network,
                queued = queue.len(),
                "queued unsigned poi event"
            );
        }
        self.wake.notify_one();
    }

    /// Number of buffered, not-yet-signed events.
    pub async fn pending_count(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Snapshot of the buffered events, capped.
    pub async fn pending_events(&self, limit: usize) -> Vec<UnsignedPoiEvent> {
        let limit = limit.min(MAX_PENDING_EVENTS_SNAPSHOT);
        self.queue
            .lock()
            .await
            .iter()
            .take(limit)
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Drain the buffer in FIFO order, signing and appending each event.
    ///
    /// A transient failure (store I/O, signing) returns the event to the
    /// head of the queue and stops this pass; a fatal log-invariant
    /// violation propagates without requeueing.
    pub async fn drain(&self) -> Result<usize> {
        let mut appended = 0;
        loop {
            let next = { self.queue.lock().await.pop_front() };
            let Some((network, event)) = next else { break };

            match self.sign_and_append(&event).await {
                Ok(index) => {
                    appended += 1;
                    debug!(
                        list_key = %self.list_key,
                        network = %network,
                        index,
                        "appended signed poi event"
                    );
                }
                Err(e) if e.is_fatal() => {
                    error!(
                        list_key = %self.list_key,
                        network = %network,
                        error = %e,
                        "poi log invariant violated"
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        list_key = %self.list_key,
                        network = %network,
                        error = %e,
                        "failed to sign and append poi event, requeued at head"
                    );
                    self.queue.lock().await.push_front((network, event));
                    return Err(e);
                }
            }
        }
        Ok(appended)
    }

    /// Sign one event at the log's current head and append it. The append
    /// lock serialises concurrent callers; the store re-checks density as a
    /// backstop.
    async fn sign_and_append(&self, event: &UnsignedPoiEvent) -> Result<u64> {
        let _guard = self.append_lock.lock().await;

        let index = self.store.event_count(&self.list_key).await?;
        let starting_index = match self.store.last_event(&self.list_key).await? {
            Some(previous) => previous.next_starting_index(),
            None => 0,
        };

        let kind = event.kind();
        let blinded_commitments = event.blinded_commitments();
        let proof = event.proof().cloned();
        let signature = self.signer.sign_poi_event(
            kind,
            index,
            starting_index,
            &blinded_commitments,
            proof.as_ref(),
        )?;

        let signed = SignedPoiEvent {
            index,
            blinded_commitment_starting_index: starting_index,
            kind,
            blinded_commitments,
            proof,
            signature,
        };
        self.store.append_event(&self.list_key, &signed).await?;
        Ok(index)
    }

    /// Cooperative drain loop: drain, then wait for a wake signal or the
    /// poll delay, whichever comes first. Halts (with the error) on a fatal
    /// log-invariant violation.
    #[instrument(skip(self), fields(list_key = %self.list_key))]
    pub async fn run(&self, poll_delay: Duration) -> Result<()> {
        {
            let mut running = self.running.write().await;
            if *running {
                return Err(ListProviderError::AlreadyRunning("poi event queue"));
            }
            *running = true;
        }

        info!(list_key = %self.list_key, "starting poi event queue coordinator");

        loop {
            if !*self.running.read().await {
                info!(list_key = %self.list_key, "poi event queue coordinator stopping");
                break;
            }

            match self.drain().await {
                Ok(_) => {}
                Err(e) if e.is_fatal() => {
                    *self.running.write().await = false;
                    error!(
                        list_key = %self.list_key,
                        error = %e,
                        "halting poi event queue coordinator"
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(list_key = %self.list_key, error = %e, "event drain failed, will retry");
                }
            }

            tokio::select! {
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(poll_delay) => {}
            }
        }

        Ok(())
    }

    pub async fn stop(&self) {
        *self.running.write().await = false;
        self.wake.notify_one();
    }
}

/// Audit a stored log: density, starting-index arithmetic, and signatures
/// under the list key. Returns the number of verified events.
pub async fn verify_log(store: &dyn PoiEventStore, list_key: &ListKey) -> Result<u64> {
    let verifier = ListVerifyingKey::from_list_key(list_key)?;
    let count = store.event_count(list_key).await?;

    let mut index = 0u64;
    let mut expected_starting = 0u64;
    while index < count {
        let batch = store
            .get_events(list_key, index, MAX_EVENT_QUERY_RANGE_LENGTH)
            .await?;
        if batch.is_empty() {
            return Err(ListProviderError::LogInvariantViolation {
                list_key: list_key.to_string(),
                message: format!("log ends early at index {index}"),
            });
        }
        for event in batch {
            if event.index != index {
                return Err(ListProviderError::LogInvariantViolation {
                    list_key: list_key.to_string(),
                    message: format!("expected index {index}, found {}", event.index),
                });
            }
            if event.blinded_commitment_starting_index != expected_starting {
                return Err(ListProviderError::LogInvariantViolation {
                    list_key: list_key.to_string(),
                    message: format!(
                        "expected starting index {expected_starting} at index {index}, found {}",
                        event.blinded_commitment_starting_index
                    ),
                });
            }
            if !verifier.verify_poi_event(&event)? {
                return Err(ListProviderError::LogInvariantViolation {
                    list_key: list_key.to_string(),
                    message: format!("signature invalid at index {index}"),
                });
            }
            expected_starting = event.next_starting_index();
            index += 1;
        }
    }

    Ok(count)
}
