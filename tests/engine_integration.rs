//! End-to-end engine tests: feed envelope in, snapshot out.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::json;

use railtrace::api::{
    ConnectionStatus, DeltaId, Direction, EngineEvent, RawEnvelope, RouteStop, StationId,
    StaticDataset, Station, Train, TrainId,
};
use railtrace::config::EngineConfig;
use railtrace::db::repositories::MemoryStore;
use railtrace::engine::LiveEngine;

fn central_station() -> Station {
    Station {
        id: StationId::new(17),
        name: "Central".to_string(),
        latitude: 28.64,
        longitude: 77.22,
    }
}

fn express_train() -> Train {
    Train {
        id: TrainId::new(5),
        number: 123,
        name: "Morning Express".to_string(),
        direction: Direction::Up,
        locomotive: Some("WAP-7".to_string()),
        route: vec![
            RouteStop {
                station_id: StationId::new(11),
                station_name: Some("Origin".to_string()),
                arrival: None,
                departure: Some("06:00".to_string()),
                order: 1,
                day: Some(1),
            },
            RouteStop {
                station_id: StationId::new(17),
                station_name: Some("Central".to_string()),
                arrival: Some("07:10".to_string()),
                departure: Some("07:15".to_string()),
                order: 2,
                day: Some(1),
            },
        ],
    }
}

fn small_dataset() -> StaticDataset {
    StaticDataset {
        trains: vec![express_train()],
        stations: vec![central_station()],
        checksum: "abc123".to_string(),
    }
}

fn envelope(value: serde_json::Value) -> RawEnvelope {
    serde_json::from_value(value).expect("valid envelope JSON")
}

fn make_engine() -> LiveEngine {
    LiveEngine::new(EngineConfig::default(), Some(Arc::new(MemoryStore::new())))
}

#[tokio::test]
async fn test_batch_merges_into_matching_train_view() {
    let engine = make_engine();
    engine.set_dataset(small_dataset());

    let stats = engine.apply_batch(&envelope(json!({
        "123": {
            "9900": {
                "lat": "28.10",
                "lon": "77.20",
                "sp": "45",
                "next_station": "17"
            }
        }
    })));

    assert_eq!(stats.applied, 1);
    assert_eq!(stats.unresolved, 0);
    assert_eq!(stats.dropped, 0);

    let snapshot = engine.snapshot();
    let view = snapshot
        .views
        .iter()
        .find(|v| v.train.id == TrainId::new(5))
        .expect("view for train 5");
    assert!(view.is_live);
    assert_eq!(view.runs.len(), 1);
    assert_eq!(view.runs[0].speed, Some(45.0));

    let position = view.live_position.expect("live position");
    assert!((position.latitude - 28.10).abs() < 1e-9);
    assert!((position.longitude - 77.20).abs() < 1e-9);

    let upcoming = view.upcoming_stop.as_ref().expect("upcoming stop");
    assert_eq!(upcoming.station_id, StationId::new(17));
    assert_eq!(upcoming.station_name.as_deref(), Some("Central"));
    assert_eq!(upcoming.arrival.as_deref(), Some("07:10"));
}

#[tokio::test]
async fn test_unmatched_delta_lands_in_unresolved_pool() {
    let engine = make_engine();
    engine.set_dataset(small_dataset());

    let stats = engine.apply_batch(&envelope(json!({
        "777": {
            "1": { "lat": "10.0", "lon": "20.0" }
        }
    })));

    assert_eq!(stats.applied, 0);
    assert_eq!(stats.unresolved, 1);

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.counts.unresolved_deltas, 1);
    assert_eq!(snapshot.counts.live_trains, 0);
}

#[tokio::test]
async fn test_invalid_position_is_dropped_and_counted() {
    let engine = make_engine();
    engine.set_dataset(small_dataset());

    let stats = engine.apply_batch(&envelope(json!({
        "123": {
            "9900": { "lon": "77.20", "sp": "45" }
        }
    })));

    assert_eq!(stats.applied, 0);
    assert_eq!(stats.dropped, 1);
    assert_eq!(engine.snapshot().counts.dropped_invalid, 1);
}

#[tokio::test]
async fn test_batch_event_is_published_after_the_transition() {
    let engine = make_engine();
    engine.set_dataset(small_dataset());

    let seen: Arc<Mutex<Vec<EngineEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _subscription = engine
        .connection()
        .subscribe(move |event| sink.lock().unwrap().push(event.clone()));

    engine.apply_batch(&envelope(json!({
        "123": { "9900": { "lat": "28.1", "lon": "77.2" } },
        "777": { "1": { "lat": "10.0", "lon": "20.0" } }
    })));

    let events = seen.lock().unwrap();
    let batch = events
        .iter()
        .find_map(|e| match e {
            EngineEvent::BatchApplied {
                applied,
                unresolved,
                dropped,
                ..
            } => Some((*applied, *unresolved, *dropped)),
            _ => None,
        })
        .expect("batch event");
    assert_eq!(batch, (1, 1, 0));
}

#[tokio::test]
async fn test_repeated_report_replaces_run_instead_of_duplicating() {
    let engine = make_engine();
    engine.set_dataset(small_dataset());

    let now_ms = Utc::now().timestamp_millis() as f64;
    engine.apply_batch(&envelope(json!({
        "123": { "9900": { "lat": "28.1", "lon": "77.2", "__last_updated": now_ms - 30_000.0 } }
    })));
    engine.apply_batch(&envelope(json!({
        "123": { "9900": { "lat": "28.2", "lon": "77.3", "__last_updated": now_ms } }
    })));

    let snapshot = engine.snapshot();
    let view = &snapshot.views[0];
    assert_eq!(view.runs.len(), 1);
    let position = view.live_position.expect("live position");
    assert!((position.latitude - 28.2).abs() < 1e-9);
}

#[tokio::test]
async fn test_pinned_run_survives_a_fresher_concurrent_run() {
    let engine = make_engine();
    engine.set_dataset(small_dataset());

    let now_ms = Utc::now().timestamp_millis() as f64;
    engine.apply_batch(&envelope(json!({
        "123": { "9900": { "lat": "28.1", "lon": "77.2", "__last_updated": now_ms - 30_000.0 } }
    })));
    assert!(engine.select_run(TrainId::new(5), &DeltaId::from_keys("123", "9900")));

    engine.apply_batch(&envelope(json!({
        "123": { "8800": { "lat": "28.9", "lon": "77.9", "__last_updated": now_ms } }
    })));

    let snapshot = engine.snapshot();
    let view = &snapshot.views[0];
    assert_eq!(view.runs.len(), 2);
    assert!(view.pinned);
    assert_eq!(view.selected_run, Some(DeltaId::from_keys("123", "9900")));
    let position = view.live_position.expect("live position");
    assert!((position.latitude - 28.1).abs() < 1e-9);
}

#[tokio::test]
async fn test_sweep_now_evicts_expired_runs() {
    let engine = make_engine();
    engine.set_dataset(small_dataset());

    let old_ms = (Utc::now().timestamp_millis() - 15 * 60 * 1000) as f64;
    engine.apply_batch(&envelope(json!({
        "123": { "9900": { "lat": "28.1", "lon": "77.2", "__last_updated": old_ms } }
    })));
    assert_eq!(engine.snapshot().counts.live_trains, 1);

    engine.sweep_now();

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.counts.live_trains, 0);
    let view = &snapshot.views[0];
    assert!(view.runs.is_empty());
    assert!(view.selected_run.is_none());
    assert!(view.live_position.is_none());
    assert!(view.upcoming_stop.is_none());
}

#[tokio::test]
async fn test_selecting_an_unknown_run_is_rejected() {
    let engine = make_engine();
    engine.set_dataset(small_dataset());

    assert!(!engine.select_run(TrainId::new(5), &DeltaId::from_keys("123", "nope")));
    assert!(!engine.select_run(TrainId::new(99), &DeltaId::from_keys("123", "9900")));
}

#[tokio::test]
async fn test_dataset_refresh_keeps_applying_batches() {
    let engine = make_engine();
    engine.set_dataset(small_dataset());
    engine.apply_batch(&envelope(json!({
        "123": { "9900": { "lat": "28.1", "lon": "77.2" } }
    })));

    // A wholesale refresh resets live state; the next batch re-resolves.
    engine.set_dataset(small_dataset());
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.counts.live_trains, 0);

    let stats = engine.apply_batch(&envelope(json!({
        "123": { "9900": { "lat": "28.3", "lon": "77.4" } }
    })));
    assert_eq!(stats.applied, 1);
    assert_eq!(engine.snapshot().counts.live_trains, 1);
}

#[tokio::test]
async fn test_feed_status_flows_into_the_snapshot() {
    let engine = make_engine();
    engine.set_dataset(small_dataset());

    engine.connection().set_status(ConnectionStatus::Connected);
    assert_eq!(engine.snapshot().status, ConnectionStatus::Connected);

    engine.connection().record_error("socket closed");
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.status, ConnectionStatus::Error);
    assert_eq!(snapshot.last_error.as_deref(), Some("socket closed"));
}

#[tokio::test]
async fn test_reconnection_keeps_resolved_state() {
    let engine = make_engine();
    engine.set_dataset(small_dataset());
    engine.connection().set_status(ConnectionStatus::Connected);
    engine.apply_batch(&envelope(json!({
        "123": { "9900": { "lat": "28.1", "lon": "77.2" } }
    })));

    engine.connection().record_error("socket closed");
    engine.connection().set_status(ConnectionStatus::Reconnecting);
    engine.connection().set_status(ConnectionStatus::Connected);

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.status, ConnectionStatus::Connected);
    assert_eq!(snapshot.counts.live_trains, 1);
    assert!(snapshot.views[0].is_live);
}

mod failing_store {
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use railtrace::api::{DeltaId, Station, StationId, Train, TrainDelta, TrainId};
    use railtrace::db::error::{StoreError, StoreResult};
    use railtrace::db::repository::{DeltaStore, MetaStore, StationStore, TrainStore};

    /// A store whose every operation fails, to prove persistence is
    /// best-effort.
    pub struct FailingStore;

    fn boom<T>() -> StoreResult<T> {
        Err(StoreError::storage("disk on fire"))
    }

    #[async_trait]
    impl TrainStore for FailingStore {
        async fn put_trains(&self, _: &[Train]) -> StoreResult<usize> {
            boom()
        }
        async fn get_train(&self, _: TrainId) -> StoreResult<Option<Train>> {
            boom()
        }
        async fn list_trains(&self) -> StoreResult<Vec<Train>> {
            boom()
        }
    }

    #[async_trait]
    impl StationStore for FailingStore {
        async fn put_stations(&self, _: &[Station]) -> StoreResult<usize> {
            boom()
        }
        async fn get_station(&self, _: StationId) -> StoreResult<Option<Station>> {
            boom()
        }
        async fn list_stations(&self) -> StoreResult<Vec<Station>> {
            boom()
        }
    }

    #[async_trait]
    impl DeltaStore for FailingStore {
        async fn put_deltas(&self, _: &[TrainDelta]) -> StoreResult<usize> {
            boom()
        }
        async fn get_delta(&self, _: &DeltaId) -> StoreResult<Option<TrainDelta>> {
            boom()
        }
        async fn list_deltas_sorted(&self) -> StoreResult<Vec<TrainDelta>> {
            boom()
        }
        async fn delete_deltas_older_than(&self, _: DateTime<Utc>) -> StoreResult<usize> {
            boom()
        }
    }

    #[async_trait]
    impl MetaStore for FailingStore {
        async fn set_last_sync(&self, _: DateTime<Utc>) -> StoreResult<()> {
            boom()
        }
        async fn last_sync(&self) -> StoreResult<Option<DateTime<Utc>>> {
            boom()
        }
    }
}

#[tokio::test]
async fn test_write_failures_never_disturb_the_live_view() {
    let engine = LiveEngine::new(
        EngineConfig::default(),
        Some(Arc::new(failing_store::FailingStore)),
    );
    engine.set_dataset(small_dataset());

    let stats = engine.apply_batch(&envelope(json!({
        "123": { "9900": { "lat": "28.1", "lon": "77.2" } }
    })));
    assert_eq!(stats.applied, 1);

    // Let the fire-and-forget write fail in the background.
    tokio::task::yield_now().await;

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.counts.live_trains, 1);
    assert!(!engine.cache_is_fresh().await);
}
