//! The list provider: assembly of the ingest poller, validation poller, and
//! event-queue coordinator for one list.
//!
//! A provider is initialized once per list key per process ([`init`] rejects
//! a second instance for the same key) and then started with
//! [`start_polling`], which spawns the three workers as cooperative loops.
//!
//! [`init`]: ListProvider::init
//! [`start_polling`]: ListProvider::start_polling

mod blocklist;
mod event_queue;
mod queue_shields;
mod validate_shields;

pub use blocklist::BlockedShieldWriter;
pub use event_queue::{verify_log, PoiEventQueue};
pub use queue_shields::{
    QueueShieldsPoller, QueueShieldsStats, DEFAULT_QUEUE_SHIELDS_DELAY_MSEC,
};
pub use validate_shields::{
    ValidateShieldsPoller, ValidateShieldsStats, DEFAULT_VALIDATE_SHIELDS_DELAY_MSEC,
    VALIDATE_BATCH_SIZE,
};

use std::sync::{Arc, Mutex as StdMutex};

use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::chain::ChainObserver;
use crate::config::ListProviderConfig;
use crate::crypto::ListSigningKey;
use crate::domain::ListKey;
use crate::infra::{
    BlockedShieldStore, InMemoryBlockedShields, InMemoryPoiEventLog, InMemoryShieldQueue,
    InMemoryStatusStore, ListProviderError, NetworkStatusStore, PoiEventStore, Result,
    ShieldQueueStore, SqliteBlockedShields, SqlitePoiEventLog, SqliteShieldQueue,
    SqliteStatusStore,
};
use crate::policy::PolicyGate;

/// One provider instance per list key per process.
static INITIALIZED_LISTS: StdMutex<Vec<String>> = StdMutex::new(Vec::new());

/// The four stores a provider runs on.
#[derive(Clone)]
pub struct ProviderStores {
    pub shield_queue: Arc<dyn ShieldQueueStore>,
    pub status: Arc<dyn NetworkStatusStore>,
    pub events: Arc<dyn PoiEventStore>,
    pub blocked: Arc<dyn BlockedShieldStore>,
}

impl ProviderStores {
    /// Volatile stores for tests and development.
    pub fn in_memory() -> Self {
        Self {
            shield_queue: Arc::new(InMemoryShieldQueue::new()),
            status: Arc::new(InMemoryStatusStore::new()),
            events: Arc::new(InMemoryPoiEventLog::new()),
            blocked: Arc::new(InMemoryBlockedShields::new()),
        }
    }

    /// Durable stores over one SQLite pool.
    pub fn sqlite(pool: &SqlitePool) -> Self {
        Self {
            shield_queue: Arc::new(SqliteShieldQueue::new(pool.clone())),
            status: Arc::new(SqliteStatusStore::new(pool.clone())),
            events: Arc::new(SqlitePoiEventLog::new(pool.clone())),
            blocked: Arc::new(SqliteBlockedShields::new(pool.clone())),
        }
    }
}

/// A running (or startable) list provider.
pub struct ListProvider {
    config: ListProviderConfig,
    list_key: ListKey,
    stores: ProviderStores,
    event_queue: Arc<PoiEventQueue>,
    queue_poller: Arc<QueueShieldsPoller>,
    validate_poller: Arc<ValidateShieldsPoller>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for ListProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListProvider")
            .field("list_key", &self.list_key)
            .finish_non_exhaustive()
    }
}

impl ListProvider {
    /// Wire up a provider for one list. Fails with
    /// [`ListProviderError::AlreadyInitialized`] if this process already
    /// holds a provider for the same list key; the instance must be dropped
    /// before a new one can be created.
    pub fn init(
        config: ListProviderConfig,
        signer: ListSigningKey,
        observer: Arc<dyn ChainObserver>,
        policy: Arc<dyn PolicyGate>,
        stores: ProviderStores,
    ) -> Result<Self> {
        let list_key = signer.list_key();
        {
            let mut initialized = INITIALIZED_LISTS
                .lock()
                .map_err(|_| ListProviderError::Internal("init registry poisoned".to_string()))?;
            if initialized.contains(&list_key.0) {
                return Err(ListProviderError::AlreadyInitialized(list_key.to_string()));
            }
            initialized.push(list_key.0.clone());
        }

        let event_queue = Arc::new(PoiEventQueue::new(signer.clone(), stores.events.clone()));
        let blocklist = Arc::new(BlockedShieldWriter::new(signer, stores.blocked.clone()));

        let queue_poller = Arc::new(QueueShieldsPoller::new(
            config.networks.clone(),
            observer.clone(),
            stores.shield_queue.clone(),
            stores.status.clone(),
        ));
        let validate_poller = Arc::new(ValidateShieldsPoller::new(
            config.network_names(),
            config.pending_period,
            observer,
            policy,
            stores.shield_queue.clone(),
            event_queue.clone(),
            blocklist,
        ));

        info!(
            list_key = %list_key,
            name = %config.name,
            networks = config.networks.len(),
            "initialized list provider"
        );

        Ok(Self {
            config,
            list_key,
            stores,
            event_queue,
            queue_poller,
            validate_poller,
            handles: Mutex::new(Vec::new()),
        })
    }

    pub fn list_key(&self) -> &ListKey {
        &self.list_key
    }

    pub fn config(&self) -> &ListProviderConfig {
        &self.config
    }

    pub fn event_queue(&self) -> &Arc<PoiEventQueue> {
        &self.event_queue
    }

    pub fn queue_poller(&self) -> &Arc<QueueShieldsPoller> {
        &self.queue_poller
    }

    pub fn validate_poller(&self) -> &Arc<ValidateShieldsPoller> {
        &self.validate_poller
    }

    pub fn stores(&self) -> &ProviderStores {
        &self.stores
    }

    /// Audit the stored event log before serving it: density, starting
    /// indices, signatures. Returns the verified event count.
    pub async fn verify_event_log(&self) -> Result<u64> {
        verify_log(self.stores.events.as_ref(), &self.list_key).await
    }

    /// Spawn the three workers. Each is its own cooperative loop; a second
    /// call fails through the workers' own running guards.
    pub async fn start_polling(&self) -> Result<()> {
        let mut handles = self.handles.lock().await;

        let queue_poller = self.queue_poller.clone();
        let queue_delay = self.config.queue_shields_delay;
        handles.push(tokio::spawn(async move {
            if let Err(e) = queue_poller.run(queue_delay).await {
                error!(error = %e, "queue-shields poller exited");
            }
        }));

        let validate_poller = self.validate_poller.clone();
        let validate_delay = self.config.validate_shields_delay;
        handles.push(tokio::spawn(async move {
            if let Err(e) = validate_poller.run(validate_delay).await {
                error!(error = %e, "validate-shields poller exited");
            }
        }));

        let event_queue = self.event_queue.clone();
        let poll_delay = self.config.event_queue_poll_delay;
        handles.push(tokio::spawn(async move {
            if let Err(e) = event_queue.run(poll_delay).await {
                error!(error = %e, "poi event queue coordinator exited");
            }
        }));

        info!(list_key = %self.list_key, "list provider polling started");
        Ok(())
    }

    /// Stop all workers and wait for them to finish their current pass.
    pub async fn shutdown(&self) {
        self.queue_poller.stop().await;
        self.validate_poller.stop().await;
        self.event_queue.stop().await;

        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        info!(list_key = %self.list_key, "list provider stopped");
    }
}

impl Drop for ListProvider {
    fn drop(&mut self) {
        if let Ok(mut initialized) = INITIALIZED_LISTS.lock() {
            initialized.retain(|key| *key != self.list_key.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::InMemoryChainObserver;
    use crate::policy::AllowAllPolicy;

    fn init_provider(secret: u8) -> Result<ListProvider> {
        ListProvider::init(
            ListProviderConfig::new("test", ""),
            ListSigningKey::from_bytes(&[secret; 32]),
            Arc::new(InMemoryChainObserver::new()),
            Arc::new(AllowAllPolicy),
            ProviderStores::in_memory(),
        )
    }

    #[tokio::test]
    async fn test_double_init_rejected_until_drop() {
        let provider = init_provider(41).unwrap();

        let err = init_provider(41).unwrap_err();
        assert!(matches!(err, ListProviderError::AlreadyInitialized(_)));

        // a different list key is fine
        let other = init_provider(42).unwrap();
        drop(other);

        drop(provider);
        let again = init_provider(41).unwrap();
        drop(again);
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let provider = init_provider(43).unwrap();
        provider.start_polling().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        provider.shutdown().await;

        // the empty log verifies trivially
        assert_eq!(provider.verify_event_log().await.unwrap(), 0);
    }
}
