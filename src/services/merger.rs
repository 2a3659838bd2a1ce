//! Run merging and train view building.
//!
//! A resolved delta becomes a run in its train's run set. A train may carry
//! several concurrent runs (re-registration after a reconnect, two field
//! units reporting the same service); one of them is authoritative for
//! display, either pinned by the caller or the most recently updated.

use crate::api::{DeltaId, LivePosition, StationId, StopRef};
use crate::engine::state::TrainView;
use crate::models::dataset::Train;
use crate::models::delta::TrainDelta;

/// Integrate a resolved delta into the view's run set and recompute the
/// derived fields.
///
/// An existing run with the same identity is replaced; runs stay sorted by
/// `last_updated` descending. A caller pin survives the merge as long as the
/// pinned run still exists.
pub fn merge_run(view: &mut TrainView, delta: TrainDelta) {
    view.runs.retain(|r| r.id != delta.id);
    view.runs.push(delta);
    view.runs
        .sort_by(|a, b| b.last_updated.cmp(&a.last_updated));

    reselect(view);
    recompute_derived(view);
}

/// Pin a specific run as the authoritative one.
///
/// Re-runs the derived-field computation against the requested run without
/// altering run set membership. Returns false when the run is not present.
pub fn pin_run(view: &mut TrainView, run_id: &DeltaId) -> bool {
    if !view.runs.iter().any(|r| &r.id == run_id) {
        return false;
    }
    view.selected_run = Some(run_id.clone());
    view.pinned = true;
    recompute_derived(view);
    true
}

/// Re-apply the selection rule after a membership change.
///
/// A surviving pin is kept; otherwise the most recently updated run is
/// selected and the pin is dropped.
pub fn reselect(view: &mut TrainView) {
    let pin_survives = view.pinned
        && view
            .selected_run
            .as_ref()
            .map(|id| view.runs.iter().any(|r| &r.id == id))
            .unwrap_or(false);

    if !pin_survives {
        view.pinned = false;
        view.selected_run = view.runs.first().map(|r| r.id.clone());
    }
}

/// Recompute position, stops and the live flag from the selected run.
pub fn recompute_derived(view: &mut TrainView) {
    if view.runs.is_empty() {
        view.clear_live();
        return;
    }

    let Some(run) = view.selected().cloned() else {
        view.clear_live();
        return;
    };

    view.live_position = Some(LivePosition {
        latitude: run.latitude,
        longitude: run.longitude,
    });
    view.upcoming_stop = derive_stop(&view.train, run.next_station, run.day_hint);
    view.previous_stop = derive_stop(&view.train, run.prev_station, run.day_hint);
    view.is_live = true;
}

/// Resolve a station reference against the train's route.
///
/// A reference with no matching route entry yields no stop; that is a normal
/// outcome, not an error. The day index prefers the route entry's day count
/// and falls back to the delta's own day hint.
fn derive_stop(train: &Train, station: Option<StationId>, day_hint: Option<i64>) -> Option<StopRef> {
    let station_id = station?;
    let stop = train.route_stop(station_id)?;
    Some(StopRef {
        station_id,
        station_name: stop.station_name.clone(),
        arrival: stop.arrival.clone(),
        departure: stop.departure.clone(),
        order: stop.order,
        day: stop.day.or(day_hint),
    })
}

#[cfg(test)]
#[path = "merger_tests.rs"]
mod merger_tests;
