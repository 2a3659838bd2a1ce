//! Entity resolution: attribute an anonymous telemetry delta to a train.
//!
//! Resolution is deterministic, additive evidence scoring — no learning, no
//! randomness. A unique train-number match short-circuits everything else;
//! ties and near-ties are rejected rather than guessed at.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::api::{DeltaId, Direction, TrainId};
use crate::models::dataset::{StaticDataset, Train};
use crate::models::delta::TrainDelta;

/// Evidence weights, additive.
const WEIGHT_LOCOMOTIVE: f64 = 10.0;
const WEIGHT_NEXT_STATION: f64 = 4.0;
const WEIGHT_PREV_STATION: f64 = 4.0;
const WEIGHT_STOP_ORDER: f64 = 1.0;
const WEIGHT_DIRECTION: f64 = 1.0;
const WEIGHT_STOP_NAME: f64 = 0.5;
const WEIGHT_NAME_SUBSTRING: f64 = 0.25;

/// Why a candidate train scored what it scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    Locomotive,
    NextStationOnRoute,
    PrevStationOnRoute,
    StopOrder,
    DirectionMatch,
    StopNameMatch,
    StopNameInTrainName,
}

/// Why a delta could not be attributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// No train scored above zero
    NoCandidate,
    /// Two or more trains tied for the best score
    Ambiguous,
}

/// Outcome of a resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved(TrainId),
    Unresolved(UnresolvedReason),
}

/// Cache of successful resolutions.
///
/// Subsequent updates from the same source variant skip re-scoring; a unique
/// train-number match is also remembered under the number itself. Cleared
/// wholesale on dataset refresh.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    by_delta: HashMap<DeltaId, TrainId>,
    by_number: HashMap<i64, TrainId>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &DeltaId) -> Option<TrainId> {
        self.by_delta.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_delta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_delta.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_delta.clear();
        self.by_number.clear();
    }
}

/// Score one candidate train against a delta.
///
/// Pure and side-effect free; returns the additive score together with the
/// reason tags that produced it so the weight table is testable in isolation.
pub fn score_candidate(train: &Train, delta: &TrainDelta) -> (f64, Vec<MatchReason>) {
    let mut score = 0.0;
    let mut reasons = Vec::new();

    if let (Some(loco), Some(train_loco)) = (&delta.locomotive, &train.locomotive) {
        if loco == train_loco {
            score += WEIGHT_LOCOMOTIVE;
            reasons.push(MatchReason::Locomotive);
        }
    }

    let next_stop = delta.next_station.and_then(|id| train.route_stop(id));
    if next_stop.is_some() {
        score += WEIGHT_NEXT_STATION;
        reasons.push(MatchReason::NextStationOnRoute);
    }

    let prev_stop = delta.prev_station.and_then(|id| train.route_stop(id));
    if prev_stop.is_some() {
        score += WEIGHT_PREV_STATION;
        reasons.push(MatchReason::PrevStationOnRoute);
    }

    if let (Some(next), Some(prev)) = (next_stop, prev_stop) {
        if prev.order < next.order {
            score += WEIGHT_STOP_ORDER;
            reasons.push(MatchReason::StopOrder);
        }
    }

    if delta.direction != Direction::Unknown && delta.direction == train.direction {
        score += WEIGHT_DIRECTION;
        reasons.push(MatchReason::DirectionMatch);
    }

    if let Some(stop_name) = &delta.next_stop_name {
        let on_route = train.route.iter().any(|s| {
            s.station_name
                .as_deref()
                .map(|n| n.eq_ignore_ascii_case(stop_name))
                .unwrap_or(false)
        });
        if on_route {
            score += WEIGHT_STOP_NAME;
            reasons.push(MatchReason::StopNameMatch);
        } else if train
            .name
            .to_lowercase()
            .contains(&stop_name.to_lowercase())
        {
            score += WEIGHT_NAME_SUBSTRING;
            reasons.push(MatchReason::StopNameInTrainName);
        }
    }

    (score, reasons)
}

/// Resolve a delta against the train collection.
///
/// 1. A cached identity mapping wins outright.
/// 2. A train-number hint matching exactly one train short-circuits scoring.
/// 3. Otherwise every train is scored; candidates at or below zero are
///    discarded, and the best candidate must strictly exceed the runner-up,
///    else resolution fails as ambiguous.
///
/// Successful resolutions are recorded in `cache`.
pub fn resolve(
    delta: &TrainDelta,
    dataset: &StaticDataset,
    cache: &mut ResolutionCache,
) -> Resolution {
    if let Some(train_id) = cache.get(&delta.id) {
        return Resolution::Resolved(train_id);
    }

    if let Some(number) = delta.number_hint {
        if let Some(train_id) = cache.by_number.get(&number).copied() {
            cache.by_delta.insert(delta.id.clone(), train_id);
            return Resolution::Resolved(train_id);
        }

        let mut with_number = dataset.trains_with_number(number);
        if let (Some(train), None) = (with_number.next(), with_number.next()) {
            cache.by_delta.insert(delta.id.clone(), train.id);
            cache.by_number.insert(number, train.id);
            return Resolution::Resolved(train.id);
        }
    }

    let mut candidates: Vec<(TrainId, f64)> = dataset
        .trains
        .iter()
        .map(|train| (train.id, score_candidate(train, delta).0))
        .filter(|(_, score)| *score > 0.0)
        .collect();

    if candidates.is_empty() {
        return Resolution::Unresolved(UnresolvedReason::NoCandidate);
    }

    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let (best_id, best_score) = candidates[0];
    if let Some((_, second_score)) = candidates.get(1) {
        // The winner must strictly exceed the runner-up; exact ties and
        // float-equal near-ties both fail.
        if !(best_score > *second_score) {
            return Resolution::Unresolved(UnresolvedReason::Ambiguous);
        }
    }

    cache.by_delta.insert(delta.id.clone(), best_id);
    Resolution::Resolved(best_id)
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod resolver_tests;
