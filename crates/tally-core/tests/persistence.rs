//! Durability, rollback, concurrency and lead-directory behavior.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tally_core::{
    AgentId, InMemoryLeadDirectory, LeadId, LeadMetadata, LeadRef, ManualClock, Period,
    ReportPeriod, ResetOutcome, TallyError, Tracker, TrackerConfig,
};
use tally_state::fakes::MemoryCounterStore;
use tally_state::{FsCounterStore, StorageError};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
}

fn agent(name: &str) -> AgentId {
    AgentId::parse(name).unwrap()
}

fn tracker_over(store: Arc<MemoryCounterStore>) -> Tracker {
    Tracker::builder(store)
        .clock(Arc::new(ManualClock::new(t0())))
        .build()
}

// ===========================================================================
// Rollback
// ===========================================================================

#[tokio::test]
async fn failed_write_rolls_back_counters_and_log() {
    let store = Arc::new(MemoryCounterStore::new());
    let tracker = tracker_over(store.clone());
    let grant = agent("Grant");

    tracker
        .record_call(&grant, &LeadId::from(1), 60, true)
        .await
        .unwrap();

    store.set_fail_writes(true);
    let err = tracker
        .record_call(&grant, &LeadId::from(2), 60, true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TallyError::Persistence(StorageError::Backend(_))
    ));
    assert!(err.is_retryable());

    let lifetime = tracker.lifetime(&grant).await.unwrap();
    assert_eq!(lifetime.total_calls, 1);
    let day = tracker.stats(&grant, &ReportPeriod::Day).await.unwrap();
    assert_eq!(day.total_calls, 1);

    store.set_fail_writes(false);
    tracker
        .record_call(&grant, &LeadId::from(2), 60, true)
        .await
        .unwrap();
    assert_eq!(tracker.lifetime(&grant).await.unwrap().total_calls, 2);
}

#[tokio::test]
async fn failed_reset_all_keeps_prior_state() {
    let store = Arc::new(MemoryCounterStore::new());
    let tracker = tracker_over(store.clone());
    let grant = agent("Grant");

    tracker
        .record_lead_assigned(&grant, &LeadId::from(1), LeadMetadata::default())
        .await
        .unwrap();
    tracker.reset_period(&grant, Period::Week).await.unwrap();

    store.set_fail_writes(true);
    let err = tracker.reset_all(&grant).await.unwrap_err();
    assert!(matches!(err, TallyError::Persistence(_)));

    assert_eq!(tracker.lifetime(&grant).await.unwrap().total_leads, 1);
    assert!(tracker.markers(&grant).await.unwrap().week.is_some());

    store.set_fail_writes(false);
    assert_eq!(tracker.reset_all(&grant).await.unwrap(), ResetOutcome::Reset);
}

#[tokio::test(start_paused = true)]
async fn slow_write_times_out_and_rolls_back() {
    let store = Arc::new(MemoryCounterStore::new());
    let config = TrackerConfig {
        persist_timeout: StdDuration::from_millis(200),
        ..TrackerConfig::default()
    };
    let tracker = Tracker::builder(store.clone())
        .config(config)
        .clock(Arc::new(ManualClock::new(t0())))
        .build();
    let grant = agent("Grant");

    store.set_write_delay(Some(StdDuration::from_secs(5)));
    let err = tracker
        .record_call(&grant, &LeadId::from(1), 60, true)
        .await
        .unwrap_err();
    match err {
        TallyError::Persistence(StorageError::Timeout {
            operation,
            timeout_ms,
        }) => {
            assert_eq!(operation, "save");
            assert_eq!(timeout_ms, 200);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(store.write_count(), 0);

    store.set_write_delay(None);
    assert_eq!(tracker.lifetime(&grant).await.unwrap().total_calls, 0);
}

// ===========================================================================
// Durable state
// ===========================================================================

#[tokio::test]
async fn v1_document_is_upgraded_on_first_use() {
    let store = Arc::new(MemoryCounterStore::new());
    store.insert_raw(
        "Carson",
        json!({
            "agent_id": "Carson",
            "counters": {
                "lead_count": 1, "call_count": 1, "sale_count": 0,
                "broker_referral_count": 0, "total_call_duration_seconds": 95
            },
            "activities": [
                {"id": "6f1c8a7e-1f0e-4a53-9d51-2f7f0f6f9a10", "kind": "lead_assigned",
                 "lead_id": "9", "timestamp": "2026-10-18T09:00:00Z",
                 "payload": {"premium": 8000.0, "source": "web"}},
                {"id": "0c3f5b9a-7d2e-4c61-8e2b-5a9d3e7f1b22", "kind": "call_made",
                 "lead_id": "9", "timestamp": "2026-10-18T09:30:00Z",
                 "payload": {"duration_seconds": 95, "connected": true}}
            ],
            "updated_at": "2026-10-18T09:30:00Z"
        }),
    );
    let tracker = tracker_over(store.clone());
    let carson = agent("Carson");

    let lifetime = tracker.lifetime(&carson).await.unwrap();
    assert_eq!(lifetime.connected_calls, 1);
    assert_eq!(lifetime.high_value_leads, 1);

    let day = tracker.stats(&carson, &ReportPeriod::Day).await.unwrap();
    assert_eq!(day.total_leads, 1);
    assert_eq!(day.total_call_duration_minutes, 2);

    // The next write stores the current schema.
    tracker
        .record_call(&carson, &LeadId::from(9), 10, false)
        .await
        .unwrap();
    let raw = store.raw("Carson").unwrap();
    assert_eq!(raw["version"], json!(tally_state::CURRENT_SCHEMA_VERSION));
}

#[tokio::test]
async fn v1_upgrade_counts_high_value_with_configured_threshold() {
    let store = Arc::new(MemoryCounterStore::new());
    store.insert_raw(
        "Hunter",
        json!({
            "agent_id": "Hunter",
            "counters": {
                "lead_count": 2, "call_count": 0, "sale_count": 0,
                "broker_referral_count": 0, "total_call_duration_seconds": 0
            },
            "activities": [
                {"id": "3a6e0d1c-5b7f-4f2a-9c8d-1e2f3a4b5c6d", "kind": "lead_assigned",
                 "lead_id": "1", "timestamp": "2026-10-18T08:00:00Z",
                 "payload": {"premium": 3000.0}},
                {"id": "8b9c0d1e-2f3a-4b5c-8d7e-9f0a1b2c3d4e", "kind": "lead_assigned",
                 "lead_id": "2", "timestamp": "2026-10-18T08:05:00Z",
                 "payload": {"premium": 1500.0}}
            ],
            "updated_at": "2026-10-18T08:05:00Z"
        }),
    );
    let config = TrackerConfig {
        high_value_premium: 2500.0,
        ..TrackerConfig::default()
    };
    let tracker = Tracker::builder(store)
        .config(config)
        .clock(Arc::new(ManualClock::new(t0())))
        .build();
    let hunter = agent("Hunter");

    let lifetime = tracker.lifetime(&hunter).await.unwrap();
    assert_eq!(lifetime.high_value_leads, 1);

    tracker
        .record_lead_assigned(
            &hunter,
            &LeadId::from(3),
            LeadMetadata {
                premium: 2600.0,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let lifetime = tracker.lifetime(&hunter).await.unwrap();
    let ytd = tracker.stats(&hunter, &ReportPeriod::Ytd).await.unwrap();
    assert_eq!(lifetime.high_value_leads, 2);
    assert_eq!(ytd.high_value_leads, lifetime.high_value_leads);
}

#[tokio::test]
async fn future_schema_is_a_persistence_error() {
    let store = Arc::new(MemoryCounterStore::new());
    store.insert_raw(
        "Carson",
        json!({"version": 42, "agent_id": "Carson", "updated_at": "2026-10-18T09:30:00Z"}),
    );
    let tracker = tracker_over(store);
    let err = tracker
        .stats(&agent("Carson"), &ReportPeriod::Day)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TallyError::Persistence(StorageError::UnsupportedSchemaVersion { found: 42, .. })
    ));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn fs_store_survives_tracker_restart() {
    let dir = tempfile::tempdir().unwrap();
    let grant = agent("Grant");

    let before = {
        let store = Arc::new(FsCounterStore::new(dir.path()).unwrap());
        let tracker = Tracker::builder(store)
            .clock(Arc::new(ManualClock::new(t0())))
            .build();
        tracker
            .record_lead_assigned(
                &grant,
                &LeadId::from(1),
                LeadMetadata {
                    name: Some("Acme Freight".to_string()),
                    premium: 5200.0,
                    source: Some("referral".to_string()),
                    stage: Some("new".to_string()),
                },
            )
            .await
            .unwrap();
        tracker
            .record_call(&grant, &LeadId::from(1), 75, true)
            .await
            .unwrap();
        tracker.reset_period(&grant, Period::Ytd).await.unwrap();
        tracker.summary(&grant).await.unwrap()
    };

    let store = Arc::new(FsCounterStore::new(dir.path()).unwrap());
    let tracker = Tracker::builder(store)
        .clock(Arc::new(ManualClock::new(t0())))
        .build();
    let after = tracker.summary(&grant).await.unwrap();
    assert_eq!(before, after);

    // Duplicate detection uses the persisted log.
    let again = tracker
        .record_lead_assigned(&grant, &LeadId::from(1), LeadMetadata::default())
        .await
        .unwrap();
    assert!(again.is_duplicate());
}

// ===========================================================================
// Concurrency
// ===========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_records_for_one_agent_are_exact() {
    let store = Arc::new(MemoryCounterStore::new());
    let tracker = Arc::new(tracker_over(store.clone()));
    let grant = agent("Grant");

    let mut handles = Vec::new();
    for i in 0..40u64 {
        let tracker = tracker.clone();
        let grant = grant.clone();
        handles.push(tokio::spawn(async move {
            tracker
                .record_call(&grant, &LeadId::from(i), 30, i % 2 == 0)
                .await
                .unwrap();
            tracker
                .record_lead_assigned(&grant, &LeadId::from(i % 10), LeadMetadata::default())
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let lifetime = tracker.lifetime(&grant).await.unwrap();
    assert_eq!(lifetime.total_calls, 40);
    assert_eq!(lifetime.connected_calls, 20);
    assert_eq!(lifetime.total_leads, 10);
    assert_eq!(lifetime.total_call_duration_minutes, 20);

    let day = tracker.stats(&grant, &ReportPeriod::Day).await.unwrap();
    assert_eq!(day.total_calls, 40);
    assert_eq!(day.total_leads, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn agents_do_not_interfere() {
    let store = Arc::new(MemoryCounterStore::new());
    let tracker = Arc::new(tracker_over(store));

    let mut handles = Vec::new();
    for name in ["Grant", "Carson", "Hunter"] {
        let tracker = tracker.clone();
        handles.push(tokio::spawn(async move {
            let agent = AgentId::parse(name).unwrap();
            for i in 0..15u64 {
                tracker
                    .record_call(&agent, &LeadId::from(i), 60, true)
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for name in ["Grant", "Carson", "Hunter"] {
        let lifetime = tracker.lifetime(&agent(name)).await.unwrap();
        assert_eq!(lifetime.total_calls, 15, "{name}");
    }
}

// ===========================================================================
// Lead directory and sync
// ===========================================================================

#[tokio::test]
async fn unknown_lead_is_rejected_when_directory_configured() {
    let store = Arc::new(MemoryCounterStore::new());
    let leads = Arc::new(InMemoryLeadDirectory::from_leads([
        LeadRef::new(LeadId::from(1)).with_premium(6000.0)
    ]));
    let tracker = Tracker::builder(store.clone())
        .clock(Arc::new(ManualClock::new(t0())))
        .lead_directory(leads)
        .build();
    let grant = agent("Grant");

    let err = tracker
        .record_call(&grant, &LeadId::from(2), 60, true)
        .await
        .unwrap_err();
    match err {
        TallyError::LeadNotFound { lead_id } => assert_eq!(lead_id, "2"),
        other => panic!("expected LeadNotFound, got {other:?}"),
    }
    assert_eq!(store.write_count(), 0);

    tracker
        .record_call(&grant, &LeadId::from(1), 60, true)
        .await
        .unwrap();
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn sync_records_new_assignments_once() {
    let store = Arc::new(MemoryCounterStore::new());
    let tracker = tracker_over(store);
    let grant = agent("Grant");
    let hunter = agent("Hunter");

    let first = vec![
        LeadRef::new(LeadId::from(1)).assigned_to(grant.clone()),
        LeadRef::new(LeadId::from(2)),
    ];
    let report = tracker.sync_assignments(&[], &first).await.unwrap();
    assert_eq!(report.recorded, 1);

    let second = vec![
        LeadRef::new(LeadId::from(1)).assigned_to(hunter.clone()),
        LeadRef::new(LeadId::from(2))
            .assigned_to(grant.clone())
            .with_premium(9000.0),
    ];
    let report = tracker.sync_assignments(&first, &second).await.unwrap();
    assert_eq!(report.recorded, 1);

    // Replaying the same change is absorbed by the duplicate guard.
    let report = tracker.sync_assignments(&first, &second).await.unwrap();
    assert_eq!(report.recorded, 0);
    assert_eq!(report.duplicates, 1);

    let grant_stats = tracker.lifetime(&grant).await.unwrap();
    assert_eq!(grant_stats.total_leads, 2);
    assert_eq!(grant_stats.high_value_leads, 1);
    assert_eq!(tracker.lifetime(&hunter).await.unwrap().total_leads, 0);
}
