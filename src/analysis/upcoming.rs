// src/analysis/upcoming.rs
//
// "What's ahead" filters used when choosing the next callout.

use crate::geometry::{bearing, haversine, heading_change};
use crate::types::{Coord, CurveEvent};

/// Bearing window (deg) for a curve to count as ahead.
const AHEAD_BEARING_TOLERANCE: f64 = 70.0;
/// Closer than this, winding roads put the next entry at an oblique bearing.
const NEAR_DISTANCE_M: f64 = 150.0;
const NEAR_BEARING_TOLERANCE: f64 = 110.0;
/// A close curve behind us by more than this is treated as just passed.
const PASSED_DISTANCE_M: f64 = 100.0;
const PASSED_BEARING_DIVERGENCE: f64 = 120.0;

/// Curves ahead of a vehicle at `position` travelling on `heading`, within
/// `max_distance` meters straight-line, nearest first.
pub fn upcoming_curves(
    curves: &[CurveEvent],
    position: Coord,
    heading: f64,
    max_distance: f64,
) -> Vec<CurveEvent> {
    let mut ahead: Vec<(f64, &CurveEvent)> = curves
        .iter()
        .filter_map(|c| {
            let distance = haversine(position, c.entry.coord);
            if distance > max_distance {
                return None;
            }
            let divergence = heading_change(heading, bearing(position, c.entry.coord)).abs();

            if distance < PASSED_DISTANCE_M && divergence > PASSED_BEARING_DIVERGENCE {
                return None;
            }
            let tolerance = if distance < NEAR_DISTANCE_M {
                NEAR_BEARING_TOLERANCE
            } else {
                AHEAD_BEARING_TOLERANCE
            };
            (divergence <= tolerance).then_some((distance, c))
        })
        .collect();

    ahead.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    ahead.into_iter().map(|(_, c)| c.clone()).collect()
}

/// Progress-based variant: curves whose exit is still ahead of
/// `distance_along` and whose entry is within `lookahead` meters of it.
pub fn curves_ahead_on_route(
    curves: &[CurveEvent],
    distance_along: f64,
    lookahead: f64,
) -> Vec<CurveEvent> {
    curves
        .iter()
        .filter(|c| c.exit.distance >= distance_along)
        .take_while(|c| c.entry.distance <= distance_along + lookahead)
        .cloned()
        .collect()
}
