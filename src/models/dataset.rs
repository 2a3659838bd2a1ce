//! Static schedule dataset: trains, stations, routes.
//!
//! The dataset is authoritative and immutable once loaded; it is only ever
//! replaced wholesale on refresh. Parsing accepts the main dataset JSON plus
//! an optional separate routes blob when route data ships in a second file.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{Direction, StationId, TrainId};
use crate::db::checksum::calculate_checksum;

/// One scheduled stop on a train's route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub station_id: StationId,
    /// Station name, filled from the station collection when absent
    #[serde(default)]
    pub station_name: Option<String>,
    #[serde(default)]
    pub arrival: Option<String>,
    #[serde(default)]
    pub departure: Option<String>,
    pub order: i32,
    /// Day count for routes that cross midnight
    #[serde(default)]
    pub day: Option<i64>,
}

/// Authoritative schedule record for one train.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Train {
    pub id: TrainId,
    pub number: i64,
    pub name: String,
    pub direction: Direction,
    #[serde(default)]
    pub locomotive: Option<String>,
    /// Ordered sequence of scheduled stops
    #[serde(default)]
    pub route: Vec<RouteStop>,
}

impl Train {
    /// Look up a route stop by station id.
    pub fn route_stop(&self, station_id: StationId) -> Option<&RouteStop> {
        self.route.iter().find(|s| s.station_id == station_id)
    }
}

/// A station record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// The parsed static dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticDataset {
    pub trains: Vec<Train>,
    pub stations: Vec<Station>,
    /// SHA-256 of the source JSON, used as dataset identity
    #[serde(default)]
    pub checksum: String,
}

impl StaticDataset {
    /// Trains carrying the given train number.
    pub fn trains_with_number(&self, number: i64) -> impl Iterator<Item = &Train> {
        self.trains.iter().filter(move |t| t.number == number)
    }

    pub fn train(&self, id: TrainId) -> Option<&Train> {
        self.trains.iter().find(|t| t.id == id)
    }
}

#[derive(serde::Deserialize)]
struct DatasetInput {
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub trains: Vec<Train>,
    #[serde(default)]
    pub stations: Vec<Station>,
}

fn validate_input_dataset(dataset_json: &str) -> Result<()> {
    let value: serde_json::Value =
        serde_json::from_str(dataset_json).context("Invalid dataset JSON")?;
    let has_trains = value
        .as_object()
        .and_then(|obj| obj.get("trains"))
        .is_some();
    if !has_trains {
        anyhow::bail!("Missing required 'trains' field");
    }
    Ok(())
}

/// Parse the static dataset from JSON with optional merging of a separate
/// routes blob.
///
/// The main JSON carries the train and station collections. When route data
/// ships separately, `routes_json` supplies a map from train id to ordered
/// route entries; both a wrapper `{"routes": { "<id>": [ ... ] }}` and a
/// direct map `{ "<id>": [ ... ] }` are accepted.
///
/// # Arguments
///
/// * `dataset_json` - Main dataset JSON (trains and stations)
/// * `routes_json` - Optional JSON with route entries per train id
///
/// # Returns
///
/// A fully populated `StaticDataset` with merged routes, station names filled
/// onto route stops, and a computed checksum.
pub fn parse_dataset_json_str(
    dataset_json: &str,
    routes_json: Option<&str>,
) -> Result<StaticDataset> {
    validate_input_dataset(dataset_json)?;

    let input: DatasetInput = serde_json::from_str(dataset_json)
        .context("Failed to deserialize dataset JSON using Serde")?;

    let mut dataset = StaticDataset {
        trains: input.trains,
        stations: input.stations,
        checksum: input.checksum,
    };

    // Compute checksum if not provided
    if dataset.checksum.is_empty() {
        dataset.checksum = calculate_checksum(dataset_json);
    }

    // Merge separately supplied routes, matched by train id.
    if let Some(routes_json) = routes_json {
        let trimmed = routes_json.trim();
        if !trimmed.is_empty() {
            #[derive(serde::Deserialize)]
            struct RoutesWrapper {
                routes: HashMap<String, Vec<RouteStop>>,
            }

            // Try wrapper form first, then the direct map form.
            let maybe_map: Option<HashMap<String, Vec<RouteStop>>> =
                match serde_json::from_str::<RoutesWrapper>(trimmed) {
                    Ok(wrapper) => Some(wrapper.routes),
                    Err(_) => {
                        serde_json::from_str::<HashMap<String, Vec<RouteStop>>>(trimmed).ok()
                    }
                };

            if let Some(map) = maybe_map {
                for train in &mut dataset.trains {
                    if let Some(route) = map.get(&train.id.to_string()) {
                        train.route = route.clone();
                    }
                }
            }
        }
    }

    // Fill station names onto route stops and keep routes ordered.
    let names: HashMap<StationId, String> = dataset
        .stations
        .iter()
        .map(|s| (s.id, s.name.clone()))
        .collect();
    for train in &mut dataset.trains {
        train.route.sort_by_key(|s| s.order);
        for stop in &mut train.route {
            if stop.station_name.is_none() {
                stop.station_name = names.get(&stop.station_id).cloned();
            }
        }
    }

    Ok(dataset)
}

#[cfg(test)]
#[path = "dataset_tests.rs"]
mod dataset_tests;
