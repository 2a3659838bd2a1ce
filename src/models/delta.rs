//! Telemetry delta normalization.
//!
//! The realtime feed delivers a two-level envelope, `outerKey -> innerKey ->
//! field map`, where every field value is loosely typed (numeric values often
//! arrive as text). Each field has exactly one coercion rule here; nothing
//! downstream touches raw wire values.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{DeltaId, Direction, StationId};
use crate::models::time::delta_timestamp;

/// Raw field record of one `(outerKey, innerKey)` entry, as decoded from JSON.
///
/// Every field is optional and string-typed on the wire except the
/// pre-normalized timestamp. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDeltaFields {
    pub lat: Option<String>,
    pub lon: Option<String>,
    /// Speed in km/h
    pub sp: Option<String>,
    /// Schedule deviation in minutes
    pub late_by: Option<String>,
    pub next_station: Option<String>,
    /// Next stop referenced by name rather than id
    pub next_stop: Option<String>,
    pub prev_station: Option<String>,
    /// Locomotive identifier, spelled as the feed spells it
    #[serde(rename = "locomitiveNo")]
    pub locomotive_no: Option<String>,
    #[serde(rename = "isTrainStation")]
    pub is_train_station: Option<String>,
    #[serde(rename = "isTrainStop")]
    pub is_train_stop: Option<String>,
    #[serde(rename = "isFlagged")]
    pub is_flagged: Option<String>,
    pub icon: Option<String>,
    /// Day hint for schedules crossing midnight
    pub st: Option<String>,
    /// Sample time in epoch seconds, as text
    pub last_updated: Option<String>,
    /// Pre-normalized sample time in epoch milliseconds
    #[serde(rename = "__last_updated")]
    pub last_updated_millis: Option<f64>,
}

/// The inbound message envelope: outer key -> inner key -> field record.
pub type RawEnvelope = HashMap<String, HashMap<String, RawDeltaFields>>;

/// One normalized telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainDelta {
    pub id: DeltaId,
    pub train_key: String,
    pub variant_key: String,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub late_by: Option<f64>,
    pub next_station: Option<StationId>,
    pub next_stop_name: Option<String>,
    pub prev_station: Option<StationId>,
    pub locomotive: Option<String>,
    pub direction: Direction,
    pub is_station: bool,
    pub is_stop: bool,
    pub flagged: bool,
    pub day_hint: Option<i64>,
    /// Train number derived from the envelope keys, when parseable
    pub number_hint: Option<i64>,
    pub last_updated: DateTime<Utc>,
}

/// Result of normalizing one envelope.
#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    pub deltas: Vec<TrainDelta>,
    /// Triples discarded for a non-finite position
    pub dropped: u64,
}

/// Parse a loosely-typed numeric field to a finite number, or `None`.
fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Parse a station reference field to an id, or `None`.
fn parse_station(raw: Option<&str>) -> Option<StationId> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .map(StationId::new)
}

/// Parse an integral field (day hints), or `None`.
fn parse_integer(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
}

/// Boolean-ish fields are true only on an exact case-insensitive `"true"`.
fn parse_flag(raw: Option<&str>) -> bool {
    raw.map(|s| s.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Infer travel direction from the icon tag by substring match.
pub fn direction_from_icon(raw: Option<&str>) -> Direction {
    let Some(icon) = raw else {
        return Direction::Unknown;
    };
    let icon = icon.to_ascii_lowercase();
    if icon.contains("up") {
        Direction::Up
    } else if icon.contains("down") {
        Direction::Down
    } else {
        Direction::Unknown
    }
}

/// Derive a train-number hint from an envelope key.
///
/// The feed pads identifiers by train class: a key may carry a `099900` or a
/// `9900` suffix in front of the actual number. The longer suffix is checked
/// first, otherwise every padded key would match the shorter one. A key
/// without padding parses as-is.
pub fn number_hint_from_key(key: &str) -> Option<i64> {
    let key = key.trim();
    let candidate = if let Some(stripped) = key.strip_suffix("099900") {
        stripped
    } else if let Some(stripped) = key.strip_suffix("9900") {
        stripped
    } else {
        key
    };
    candidate.parse::<i64>().ok()
}

/// Normalize one `(outerKey, innerKey, fields)` triple.
///
/// Returns `None` when either coordinate is missing or non-finite; no partial
/// record is ever produced.
pub fn normalize_record(
    outer_key: &str,
    inner_key: &str,
    fields: &RawDeltaFields,
    ingested_at: DateTime<Utc>,
) -> Option<TrainDelta> {
    let latitude = parse_number(fields.lat.as_deref())?;
    let longitude = parse_number(fields.lon.as_deref())?;

    let number_hint =
        number_hint_from_key(outer_key).or_else(|| number_hint_from_key(inner_key));

    Some(TrainDelta {
        id: DeltaId::from_keys(outer_key, inner_key),
        train_key: outer_key.to_string(),
        variant_key: inner_key.to_string(),
        latitude,
        longitude,
        speed: parse_number(fields.sp.as_deref()),
        late_by: parse_number(fields.late_by.as_deref()),
        next_station: parse_station(fields.next_station.as_deref()),
        next_stop_name: fields
            .next_stop
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        prev_station: parse_station(fields.prev_station.as_deref()),
        locomotive: fields
            .locomotive_no
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        direction: direction_from_icon(fields.icon.as_deref()),
        is_station: parse_flag(fields.is_train_station.as_deref()),
        is_stop: parse_flag(fields.is_train_stop.as_deref()),
        flagged: parse_flag(fields.is_flagged.as_deref()),
        day_hint: parse_integer(fields.st.as_deref()),
        number_hint,
        last_updated: delta_timestamp(
            fields.last_updated_millis,
            fields.last_updated.as_deref(),
            ingested_at,
        ),
    })
}

/// Normalize a full envelope, counting silently dropped triples.
pub fn normalize_envelope(envelope: &RawEnvelope, ingested_at: DateTime<Utc>) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();
    for (outer_key, variants) in envelope {
        for (inner_key, fields) in variants {
            match normalize_record(outer_key, inner_key, fields, ingested_at) {
                Some(delta) => outcome.deltas.push(delta),
                None => outcome.dropped += 1,
            }
        }
    }
    outcome
}

#[cfg(test)]
#[path = "delta_tests.rs"]
mod delta_tests;
