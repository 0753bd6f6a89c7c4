//! Persists a `PositionReconciler` snapshot through `Storage` and reads it
//! back via the query path — the two modules are unit-tested separately,
//! this exercises them wired together the way `bins::drive_symbol` does.

use std::time::{Duration, Instant};

use engine_storage::{LocalTruth, PositionReconciler, ReconciliationConfig, Storage, StorageConfig, WriteRecord};
use rust_decimal_macros::dec;

fn test_config(dir: &tempfile::TempDir) -> StorageConfig {
    StorageConfig {
        db_path: dir.path().join("test.db"),
        fallback_path: dir.path().join("fallback.log"),
        channel_capacity: 100,
        batch_size: 1,
        flush_interval: Duration::from_millis(20),
    }
}

#[test]
fn reconciliation_snapshot_round_trips_and_drift_event_fires() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::start(test_config(&dir)).unwrap();

    let mut config = ReconciliationConfig::default();
    config.critical_drift_threshold = dec!(0.1);
    let mut reconciler = PositionReconciler::new(config);

    let local = LocalTruth { held_qty: dec!(10), ..Default::default() };
    let now = Instant::now();
    let snapshot = reconciler.reconcile("BTCUSDT", &local, dec!(5), dec!(0), now);
    let event = reconciler.evaluate_drift(&snapshot, now);
    assert!(event.is_some(), "a 100% relative drift should raise a critical event");

    storage.save(WriteRecord::Reconciliation(snapshot));
    storage.stop();

    let history = storage
        .query_reconciliation_history(
            "BTCUSDT",
            chrono::Utc::now() - chrono::Duration::hours(1),
            chrono::Utc::now() + chrono::Duration::hours(1),
            10,
            0,
        )
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].position_diff, dec!(5));

    let latest = storage.get_latest_reconciliation_history("BTCUSDT").unwrap();
    assert!(latest.is_some());
}
