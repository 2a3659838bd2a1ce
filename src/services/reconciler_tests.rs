use super::*;
use crate::api::{DeltaId, Direction, StationId, TrainId};
use crate::engine::state::EngineState;
use crate::models::dataset::{parse_dataset_json_str, StaticDataset};
use chrono::{DateTime, Duration, TimeZone, Utc};

const TTL_MINUTES: i64 = 10;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn dataset() -> StaticDataset {
    parse_dataset_json_str(
        r#"{
            "trains": [
                {
                    "id": 5, "number": 123, "name": "Karachi Express", "direction": "up",
                    "route": [ { "station_id": 17, "order": 1 } ]
                },
                {
                    "id": 6, "number": 124, "name": "Khyber Mail", "direction": "down",
                    "route": [ { "station_id": 11, "order": 1 } ]
                }
            ],
            "stations": [
                { "id": 11, "name": "Lahore", "latitude": 31.58, "longitude": 74.33 },
                { "id": 17, "name": "Multan", "latitude": 30.19, "longitude": 71.47 }
            ]
        }"#,
        None,
    )
    .unwrap()
}

fn persisted(key: &str, number: i64, age_minutes: i64) -> crate::models::delta::TrainDelta {
    crate::models::delta::TrainDelta {
        id: DeltaId::from_keys(key, "0"),
        train_key: key.to_string(),
        variant_key: "0".to_string(),
        latitude: 30.0,
        longitude: 70.0,
        speed: None,
        late_by: None,
        next_station: Some(StationId::new(17)),
        next_stop_name: None,
        prev_station: None,
        locomotive: None,
        direction: Direction::Unknown,
        is_station: false,
        is_stop: false,
        flagged: false,
        day_hint: None,
        number_hint: Some(number),
        last_updated: now() - Duration::minutes(age_minutes),
    }
}

#[test]
fn test_replay_reproduces_live_state() {
    let mut state = EngineState::new();
    state.set_dataset(dataset());

    let stats = replay_persisted_deltas(
        &mut state,
        vec![persisted("123", 123, 5), persisted("124", 124, 3)],
        now(),
        Duration::minutes(TTL_MINUTES),
    );
    assert_eq!(stats.replayed, 2);
    assert_eq!(stats.merged, 2);
    assert_eq!(stats.unresolved, 0);

    let view = state.view(TrainId::new(5)).unwrap();
    assert!(view.is_live);
    assert_eq!(
        view.upcoming_stop.as_ref().unwrap().station_id,
        StationId::new(17)
    );
    assert_eq!(state.counts().live_trains, 2);
}

#[test]
fn test_expired_deltas_are_not_resurrected() {
    let mut state = EngineState::new();
    state.set_dataset(dataset());

    let stats = replay_persisted_deltas(
        &mut state,
        vec![persisted("123", 123, 15)],
        now(),
        Duration::minutes(TTL_MINUTES),
    );
    // The delta replays, then the closing sweep evicts it
    assert_eq!(stats.merged, 1);
    assert_eq!(stats.sweep.evicted_runs, 1);
    assert_eq!(stats.sweep.cleared_trains, 1);

    let view = state.view(TrainId::new(5)).unwrap();
    assert!(!view.is_live);
    assert!(view.runs.is_empty());
    assert!(view.upcoming_stop.is_none());
}

#[test]
fn test_replay_applies_in_timestamp_order() {
    let mut state = EngineState::new();
    state.set_dataset(dataset());

    // Same identity twice: the newer sample must win regardless of input order
    let newer = persisted("123", 123, 1);
    let mut older = persisted("123", 123, 8);
    older.latitude = 99.0;

    replay_persisted_deltas(
        &mut state,
        vec![newer.clone(), older],
        now(),
        Duration::minutes(TTL_MINUTES),
    );

    let view = state.view(TrainId::new(5)).unwrap();
    assert_eq!(view.runs.len(), 1);
    assert_eq!(view.live_position.unwrap().latitude, newer.latitude);
}

#[test]
fn test_unmatchable_delta_lands_in_pool() {
    let mut state = EngineState::new();
    state.set_dataset(dataset());

    let mut stray = persisted("999", 999, 2);
    stray.next_station = None;
    let stats = replay_persisted_deltas(
        &mut state,
        vec![stray],
        now(),
        Duration::minutes(TTL_MINUTES),
    );
    assert_eq!(stats.unresolved, 1);
    assert_eq!(state.counts().unresolved_deltas, 1);
}
