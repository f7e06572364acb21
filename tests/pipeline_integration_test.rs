//! End-to-end tests of the list-provider pipeline: ingest, age gating,
//! policy routing, the signed event log, and restart durability.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{aged_shield, test_provider, test_signing_key, DAY_MS, EXCLUDED_ADDRESS, HOUR_MS};

use poi_list_provider::chain::InMemoryChainObserver;
use poi_list_provider::domain::{now_ms, NetworkName, PoiEventShield, ShieldStatus};
use poi_list_provider::infra::{
    open, open_in_memory, BlockedShieldStore as _, PoiEventStore, ShieldQueueStore,
    SqlitePoiEventLog, SqliteShieldQueue,
};
use poi_list_provider::policy::{AddressBlocklistPolicy, AllowAllPolicy};
use poi_list_provider::provider::{verify_log, PoiEventQueue};

fn blocklist_policy() -> Arc<AddressBlocklistPolicy> {
    Arc::new(AddressBlocklistPolicy::new(
        [EXCLUDED_ADDRESS],
        "excluded address",
    ))
}

// ============================================================================
// S1 / S2: queue behaviour on the durable store
// ============================================================================

#[tokio::test]
async fn empty_queue_returns_empty_sequence() {
    let pool = open_in_memory().await.unwrap();
    let queue = SqliteShieldQueue::new(pool);

    let pending = queue
        .get_pending_shields(NetworkName::Ethereum, now_ms(), 100)
        .await
        .unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn age_gating_selects_only_old_shields() {
    let pool = open_in_memory().await.unwrap();
    let queue = SqliteShieldQueue::new(pool);

    let fresh = aged_shield("0xaa", 0);
    let old = aged_shield("0xbb", 10 * DAY_MS);
    queue
        .insert_pending_shield(NetworkName::Ethereum, &fresh)
        .await
        .unwrap();
    queue
        .insert_pending_shield(NetworkName::Ethereum, &old)
        .await
        .unwrap();

    let eligible = queue
        .get_pending_shields(NetworkName::Ethereum, now_ms() - 7 * DAY_MS, 100)
        .await
        .unwrap();
    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].txid, "0xbb");
    assert_eq!(eligible[0].status, ShieldStatus::Pending);
    assert_eq!(eligible[0].last_validated_timestamp, None);
}

// ============================================================================
// S5 / S6: policy routing through the full pipeline
// ============================================================================

#[tokio::test]
async fn blocked_shield_lands_on_blocklist_not_in_log() {
    let observer = Arc::new(InMemoryChainObserver::new());
    let provider = test_provider(101, observer.clone(), blocklist_policy());

    let shield = aged_shield("0x01", 2 * HOUR_MS);
    observer
        .add_shield(NetworkName::Ethereum, shield.clone(), EXCLUDED_ADDRESS)
        .await;

    provider.queue_poller().run_iteration().await;
    provider.validate_poller().run_iteration().await;
    provider.event_queue().drain().await.unwrap();

    let item = provider
        .stores()
        .shield_queue
        .get_shield(NetworkName::Ethereum, &shield.txid, &shield.commitment_hash)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.status, ShieldStatus::Blocked);

    let blocked = provider
        .stores()
        .blocked
        .get_blocked_shields(provider.list_key(), 50)
        .await
        .unwrap();
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0].blinded_commitment, shield.blinded_commitment);
    assert_eq!(blocked[0].block_reason.as_deref(), Some("excluded address"));

    assert_eq!(
        provider
            .stores()
            .events
            .event_count(provider.list_key())
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn allowed_shield_becomes_signed_event() {
    let observer = Arc::new(InMemoryChainObserver::new());
    let provider = test_provider(102, observer.clone(), blocklist_policy());

    let shield = aged_shield("0x02", 2 * HOUR_MS);
    observer
        .add_shield(
            NetworkName::Ethereum,
            shield.clone(),
            "0xGOOD000000000000000000000000000000000000",
        )
        .await;

    provider.queue_poller().run_iteration().await;
    provider.validate_poller().run_iteration().await;
    provider.event_queue().drain().await.unwrap();

    let item = provider
        .stores()
        .shield_queue
        .get_shield(NetworkName::Ethereum, &shield.txid, &shield.commitment_hash)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.status, ShieldStatus::Allowed);

    let events = provider
        .stores()
        .events
        .get_events(provider.list_key(), 0, 10)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].index, 0);
    assert_eq!(events[0].blinded_commitment_starting_index, 0);
    assert_eq!(
        events[0].blinded_commitments,
        vec![shield.blinded_commitment.clone()]
    );

    // the stored log verifies under the list key
    assert_eq!(provider.verify_event_log().await.unwrap(), 1);

    // re-running the whole pipeline over the same state is a no-op
    provider.queue_poller().run_iteration().await;
    provider.validate_poller().run_iteration().await;
    provider.event_queue().drain().await.unwrap();
    assert_eq!(provider.verify_event_log().await.unwrap(), 1);
}

#[tokio::test]
async fn mixed_batch_routes_each_shield_independently() {
    let observer = Arc::new(InMemoryChainObserver::new());
    let provider = test_provider(103, observer.clone(), blocklist_policy());

    observer
        .add_shield(
            NetworkName::Ethereum,
            aged_shield("0x03", 3 * HOUR_MS),
            "0xgood",
        )
        .await;
    observer
        .add_shield(
            NetworkName::Ethereum,
            aged_shield("0x04", 2 * HOUR_MS),
            EXCLUDED_ADDRESS,
        )
        .await;

    provider.queue_poller().run_iteration().await;
    provider.validate_poller().run_iteration().await;
    provider.event_queue().drain().await.unwrap();

    assert_eq!(
        provider
            .stores()
            .events
            .event_count(provider.list_key())
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        provider
            .stores()
            .blocked
            .get_blocked_shields(provider.list_key(), 50)
            .await
            .unwrap()
            .len(),
        1
    );

    let stats = provider.validate_poller().stats().await;
    assert_eq!(stats.shields_allowed, 1);
    assert_eq!(stats.shields_blocked, 1);
}

// ============================================================================
// Background polling end to end
// ============================================================================

#[tokio::test]
async fn background_pollers_process_shields() {
    let observer = Arc::new(InMemoryChainObserver::new());
    let provider = test_provider(104, observer.clone(), Arc::new(AllowAllPolicy));

    let shield = aged_shield("0x05", 2 * HOUR_MS);
    observer
        .add_shield(NetworkName::Ethereum, shield.clone(), "0xgood")
        .await;

    provider.start_polling().await.unwrap();

    let mut appended = 0;
    for _ in 0..200 {
        appended = provider
            .stores()
            .events
            .event_count(provider.list_key())
            .await
            .unwrap();
        if appended == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    provider.shutdown().await;

    assert_eq!(appended, 1);
    assert_eq!(provider.verify_event_log().await.unwrap(), 1);
}

// ============================================================================
// S7: restart durability
// ============================================================================

#[tokio::test]
async fn log_survives_restart_and_continues_at_next_index() {
    let path = std::env::temp_dir().join(format!("poi-restart-{}.db", std::process::id()));
    let path = path.to_str().unwrap().to_string();
    let _ = std::fs::remove_file(&path);

    let signer = test_signing_key(105);
    let list_key = signer.list_key();

    // first process lifetime: append one event
    {
        let pool = open(&path).await.unwrap();
        let store = Arc::new(SqlitePoiEventLog::new(pool.clone()));
        let queue = PoiEventQueue::new(signer.clone(), store.clone());

        queue
            .queue_unsigned_poi_shield_event(
                NetworkName::Ethereum,
                PoiEventShield {
                    commitment_hash: "0x5678".to_string(),
                    blinded_commitment: "0x1234".to_string(),
                },
            )
            .await;
        queue.drain().await.unwrap();
        assert_eq!(store.event_count(&list_key).await.unwrap(), 1);
        pool.close().await;
    }

    // restart: the log re-opens intact and the next event signs at index 1
    {
        let pool = open(&path).await.unwrap();
        let store = Arc::new(SqlitePoiEventLog::new(pool.clone()));
        assert_eq!(verify_log(store.as_ref(), &list_key).await.unwrap(), 1);

        let queue = PoiEventQueue::new(signer, store.clone());
        queue
            .queue_unsigned_poi_shield_event(
                NetworkName::Ethereum,
                PoiEventShield {
                    commitment_hash: "0x9abc".to_string(),
                    blinded_commitment: "0xdef0".to_string(),
                },
            )
            .await;
        queue.drain().await.unwrap();

        let events = store.get_events(&list_key, 0, 10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].index, 1);
        assert_eq!(events[1].blinded_commitment_starting_index, 1);
        assert_eq!(verify_log(store.as_ref(), &list_key).await.unwrap(), 2);
        pool.close().await;
    }

    let _ = std::fs::remove_file(&path);
}
