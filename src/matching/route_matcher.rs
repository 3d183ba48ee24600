// src/matching/route_matcher.rs

use super::MatcherConfig;
use crate::geometry::{cumulative_distances, project_onto_segment_clamped};
use crate::types::{Coord, GpsFix, MatchResult, MPS_PER_MPH};
use tracing::{debug, trace};

/// Closest projection of `p` onto the part of the route between `from` and
/// `to` meters. Returns (distance along route, distance from route).
fn nearest_in_range(
    route: &[Coord],
    cumulative: &[f64],
    p: Coord,
    from: f64,
    to: f64,
) -> Option<(f64, f64)> {
    let mut best: Option<(f64, f64)> = None;

    for i in 0..route.len() - 1 {
        let (seg_start, seg_end) = (cumulative[i], cumulative[i + 1]);
        if seg_end < from {
            continue;
        }
        if seg_start > to {
            break;
        }
        let seg_len = seg_end - seg_start;
        if seg_len <= f64::EPSILON {
            continue;
        }

        let t_min = ((from - seg_start) / seg_len).clamp(0.0, 1.0);
        let t_max = ((to - seg_start) / seg_len).clamp(0.0, 1.0);
        let (t, off) = project_onto_segment_clamped(p, route[i], route[i + 1], t_min, t_max);

        if best.map_or(true, |(_, b)| off < b) {
            best = Some((seg_start + t * seg_len, off));
        }
    }

    best
}

/// Match a fix to a distance along `route`, searching only near
/// `last_distance`.
///
/// Off-route fixes and candidates too far behind leave the distance
/// unchanged; forward jumps are capped to a few seconds of travel.
/// Malformed routes return `last_distance` with an infinite offset.
pub fn distance_along_route(
    route: &[Coord],
    cumulative: &[f64],
    lng: f64,
    lat: f64,
    last_distance: f64,
    speed_mph: f64,
    cfg: &MatcherConfig,
) -> MatchResult {
    let unmatched = MatchResult {
        distance: last_distance,
        dist_from_route: f64::INFINITY,
    };
    if route.len() < 2 || cumulative.len() != route.len() || !lng.is_finite() || !lat.is_finite() {
        return unmatched;
    }

    let speed_mps = speed_mph.max(0.0) * MPS_PER_MPH;
    let forward = cfg
        .min_forward_window_m
        .max(cfg.forward_window_updates * speed_mps * cfg.update_interval_s);
    let from = last_distance - cfg.backward_tolerance_m;
    let to = last_distance + forward;

    let Some((candidate, off)) = nearest_in_range(route, cumulative, Coord::new(lng, lat), from, to)
    else {
        return unmatched;
    };

    if off > cfg.max_off_route_m {
        trace!("fix {:.0} m off route, holding {:.0} m", off, last_distance);
        return MatchResult {
            distance: last_distance,
            dist_from_route: off,
        };
    }

    if candidate < last_distance - cfg.max_backward_m {
        debug!(
            "rejecting backward match {:.0} m (last {:.0} m)",
            candidate, last_distance
        );
        return MatchResult {
            distance: last_distance,
            dist_from_route: off,
        };
    }

    let max_jump = (speed_mps * cfg.max_jump_seconds).max(cfg.min_jump_cap_m);
    let distance = if candidate - last_distance > max_jump {
        debug!(
            "capping jump {:.0} → {:.0} m",
            candidate - last_distance,
            max_jump
        );
        last_distance + max_jump
    } else {
        candidate
    };

    MatchResult {
        distance,
        dist_from_route: off,
    }
}

/// Stateful matcher for a single drive.
///
/// The first fix is matched against the whole route; after that every fix
/// goes through the windowed search.
pub struct RouteMatcher {
    route: Vec<Coord>,
    cumulative: Vec<f64>,
    cfg: MatcherConfig,
    last_distance: f64,
    acquired: bool,
}

impl RouteMatcher {
    pub fn new(route: Vec<Coord>, cfg: MatcherConfig) -> Self {
        let cumulative = cumulative_distances(&route);
        Self {
            route,
            cumulative,
            cfg,
            last_distance: 0.0,
            acquired: false,
        }
    }

    pub fn update(&mut self, fix: &GpsFix) -> MatchResult {
        if !self.acquired {
            return self.acquire(fix.coord());
        }
        let result = distance_along_route(
            &self.route,
            &self.cumulative,
            fix.lng,
            fix.lat,
            self.last_distance,
            fix.speed_mph(),
            &self.cfg,
        );
        self.last_distance = result.distance;
        result
    }

    fn acquire(&mut self, p: Coord) -> MatchResult {
        let total = self.total_length();
        let nearest = (self.route.len() >= 2 && self.cumulative.len() == self.route.len())
            .then(|| nearest_in_range(&self.route, &self.cumulative, p, 0.0, total))
            .flatten();

        match nearest {
            Some((distance, off)) if off <= self.cfg.max_off_route_m => {
                debug!("📍 acquired route at {:.0} m ({:.0} m off)", distance, off);
                self.acquired = true;
                self.last_distance = distance;
                MatchResult {
                    distance,
                    dist_from_route: off,
                }
            }
            Some((_, off)) => MatchResult {
                distance: self.last_distance,
                dist_from_route: off,
            },
            None => MatchResult {
                distance: self.last_distance,
                dist_from_route: f64::INFINITY,
            },
        }
    }

    pub fn reset(&mut self) {
        self.last_distance = 0.0;
        self.acquired = false;
    }

    pub fn distance(&self) -> f64 {
        self.last_distance
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    pub fn total_length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    pub fn route(&self) -> &[Coord] {
        &self.route
    }
}
