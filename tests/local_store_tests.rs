//! In-memory store behavior behind the storage traits.

use chrono::{Duration, Utc};

use railtrace::api::{DeltaId, Direction, Station, StationId, Train, TrainDelta, TrainId};
use railtrace::db::repositories::MemoryStore;
use railtrace::db::repository::{DeltaStore, MetaStore, StationStore, TrainStore};

fn train(id: i64, number: i64) -> Train {
    Train {
        id: TrainId::new(id),
        number,
        name: format!("Train {}", number),
        direction: Direction::Up,
        locomotive: None,
        route: vec![],
    }
}

fn station(id: i64, name: &str) -> Station {
    Station {
        id: StationId::new(id),
        name: name.to_string(),
        latitude: 0.0,
        longitude: 0.0,
    }
}

fn delta(outer: &str, inner: &str, age: Duration) -> TrainDelta {
    TrainDelta {
        id: DeltaId::from_keys(outer, inner),
        train_key: outer.to_string(),
        variant_key: inner.to_string(),
        latitude: 1.0,
        longitude: 2.0,
        speed: None,
        late_by: None,
        next_station: None,
        next_stop_name: None,
        prev_station: None,
        locomotive: None,
        direction: Direction::Unknown,
        is_station: false,
        is_stop: false,
        flagged: false,
        day_hint: None,
        number_hint: None,
        last_updated: Utc::now() - age,
    }
}

#[tokio::test]
async fn test_train_collection_round_trip() {
    let store = MemoryStore::new();
    let written = store.put_trains(&[train(1, 100), train(2, 200)]).await.unwrap();
    assert_eq!(written, 2);

    let fetched = store.get_train(TrainId::new(2)).await.unwrap();
    assert_eq!(fetched.map(|t| t.number), Some(200));
    assert!(store.get_train(TrainId::new(9)).await.unwrap().is_none());
    assert_eq!(store.list_trains().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_put_trains_replaces_the_collection() {
    let store = MemoryStore::new();
    store.put_trains(&[train(1, 100), train(2, 200)]).await.unwrap();
    store.put_trains(&[train(3, 300)]).await.unwrap();

    let trains = store.list_trains().await.unwrap();
    assert_eq!(trains.len(), 1);
    assert_eq!(trains[0].id, TrainId::new(3));
}

#[tokio::test]
async fn test_station_collection_round_trip() {
    let store = MemoryStore::new();
    store
        .put_stations(&[station(17, "Central"), station(11, "Origin")])
        .await
        .unwrap();

    let fetched = store.get_station(StationId::new(17)).await.unwrap();
    assert_eq!(fetched.map(|s| s.name), Some("Central".to_string()));
    assert_eq!(store.list_stations().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_deltas_upsert_by_identity() {
    let store = MemoryStore::new();
    store
        .put_deltas(&[delta("123", "9900", Duration::minutes(5))])
        .await
        .unwrap();

    let mut updated = delta("123", "9900", Duration::minutes(1));
    updated.latitude = 9.0;
    store.put_deltas(&[updated]).await.unwrap();

    assert_eq!(store.delta_count(), 1);
    let fetched = store
        .get_delta(&DeltaId::from_keys("123", "9900"))
        .await
        .unwrap()
        .expect("delta present");
    assert!((fetched.latitude - 9.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_list_deltas_sorted_is_ascending_by_sample_time() {
    let store = MemoryStore::new();
    store
        .put_deltas(&[
            delta("a", "1", Duration::minutes(1)),
            delta("b", "1", Duration::minutes(9)),
            delta("c", "1", Duration::minutes(4)),
        ])
        .await
        .unwrap();

    let listed = store.list_deltas_sorted().await.unwrap();
    let keys: Vec<&str> = listed.iter().map(|d| d.train_key.as_str()).collect();
    assert_eq!(keys, vec!["b", "c", "a"]);
    assert!(listed.windows(2).all(|w| w[0].last_updated <= w[1].last_updated));
}

#[tokio::test]
async fn test_delete_deltas_older_than_cutoff() {
    let store = MemoryStore::new();
    store
        .put_deltas(&[
            delta("fresh", "1", Duration::minutes(2)),
            delta("stale", "1", Duration::minutes(20)),
            delta("ancient", "1", Duration::hours(3)),
        ])
        .await
        .unwrap();

    let deleted = store
        .delete_deltas_older_than(Utc::now() - Duration::minutes(10))
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(store.delta_count(), 1);

    let remaining = store.list_deltas_sorted().await.unwrap();
    assert_eq!(remaining[0].train_key, "fresh");
}

#[tokio::test]
async fn test_last_sync_round_trip() {
    let store = MemoryStore::new();
    assert!(store.last_sync().await.unwrap().is_none());

    let at = Utc::now();
    store.set_last_sync(at).await.unwrap();
    assert_eq!(store.last_sync().await.unwrap(), Some(at));
}
