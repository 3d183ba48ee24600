// src/matching/mod.rs
//
// GPS fix → distance along a planned route.
//
// A plain nearest-point search snaps to the wrong leg wherever a route runs
// parallel to itself (out-and-backs, switchbacks, loops). The matcher only
// searches a window around the last known distance and refuses implausible
// jumps.

pub mod route_matcher;

pub use route_matcher::{distance_along_route, RouteMatcher};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Lower bound on the forward search window (m).
    pub min_forward_window_m: f64,
    /// Forward window in update intervals of travel at current speed.
    pub forward_window_updates: f64,
    pub backward_tolerance_m: f64,
    /// Fixes further than this from the route leave progress unchanged.
    pub max_off_route_m: f64,
    /// Candidates further behind the last distance are rejected.
    pub max_backward_m: f64,
    /// Forward progress per fix is capped at this many seconds of travel.
    pub max_jump_seconds: f64,
    /// Floor for the jump cap, so a stale zero speed cannot pin progress.
    pub min_jump_cap_m: f64,
    pub update_interval_s: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_forward_window_m: 200.0,
            forward_window_updates: 10.0,
            backward_tolerance_m: 50.0,
            max_off_route_m: 100.0,
            max_backward_m: 30.0,
            max_jump_seconds: 5.0,
            min_jump_cap_m: 20.0,
            update_interval_s: 1.0,
        }
    }
}
