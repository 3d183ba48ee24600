// src/analysis/curve_detector.rs
//
// Polyline → curve events.
//
// Signal flow:
//   coords → resample (fixed arc-length) → headings → heading changes
//          → road character (threshold set)
//          → sharp pass ──┐
//          → gradual pass ┴→ spans → CurveEvent
//          → adjacent merge → chicane merge → technical sections
//          → road-type speed factor
//
// A heading change at index i sits on resampled vertex i + 1.

use super::curve_merge::{merge_adjacent, merge_chicanes, merge_technical_sections};
use super::road_character::{
    analyze_road_character, CharacterConfig, CurveThresholds, RoadCharacterProfile, ThresholdSet,
};
use super::speeds::{apply_road_factor, recommended_speeds, severity_for};
use crate::geometry::{bearing, heading_change, resample};
use crate::types::{
    Coord, CurveEvent, CurveKind, CurvePoint, Direction, RoutePoint, ShapeModifier,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Changes smaller than this never decide a curve's direction.
const DIRECTION_MIN_CHANGE_DEG: f64 = 1.0;

/// Edge vertices of a gradual sweeper below this are trimmed off.
const GRADUAL_TRIM_DEG: f64 = 0.25;
/// Neighbourhood (vertices) that must keep turning for a sweeper to grow.
const GRADUAL_EXPAND_SAMPLES: usize = 6;

const TIGHTENS_RATIO: f64 = 1.5;
const OPENS_RATIO: f64 = 0.65;
const HAIRPIN_ANGLE_DEG: f64 = 150.0;
const SHARP_ANGLE_DEG: f64 = 90.0;
const SHARP_MAX_LENGTH_M: f64 = 60.0;
const LONG_LENGTH_M: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub resample_interval_m: f64,
    /// Samples scanned past a sub-threshold vertex before a sharp curve closes.
    pub lookahead_samples: usize,
    pub gradual_window_m: f64,
    pub adjacent_merge_gap_m: f64,
    pub chicane_max_gap_m: f64,
    pub section_max_gap_m: f64,
    /// Sections keep flow, so they run slightly faster than their hardest curve.
    pub section_speed_bonus: f64,
    pub character: CharacterConfig,
    pub thresholds: ThresholdSet,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            resample_interval_m: 8.0,
            lookahead_samples: 3,
            gradual_window_m: 250.0,
            adjacent_merge_gap_m: 30.0,
            chicane_max_gap_m: 150.0,
            section_max_gap_m: 200.0,
            section_speed_bonus: 1.05,
            character: CharacterConfig::default(),
            thresholds: ThresholdSet::default(),
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

/// Inclusive range of heading-change indices forming one curve body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurveSpan {
    pub start: usize,
    pub end: usize,
}

/// Everything the detector learned about one route.
#[derive(Debug, Clone)]
pub struct CurveAnalysis {
    pub points: Vec<RoutePoint>,
    pub profile: Option<RoadCharacterProfile>,
    pub curves: Vec<CurveEvent>,
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Detect curves along a polyline. Fewer than three points yields nothing.
pub fn detect_curves(coords: &[Coord], cfg: &DetectorConfig) -> Vec<CurveEvent> {
    analyze_route(coords, cfg).curves
}

pub fn analyze_route(coords: &[Coord], cfg: &DetectorConfig) -> CurveAnalysis {
    if coords.len() < 3 {
        return CurveAnalysis {
            points: Vec::new(),
            profile: None,
            curves: Vec::new(),
        };
    }

    let points = resample(coords, cfg.resample_interval_m);
    if points.len() < 3 {
        return CurveAnalysis {
            points,
            profile: None,
            curves: Vec::new(),
        };
    }

    let changes = heading_changes(&points);
    let profile = analyze_road_character(&changes, cfg.resample_interval_m, &cfg.character);
    let thresholds = cfg.thresholds.for_character(profile.character);

    let mut claimed = vec![false; changes.len()];
    let mut spans = sharp_pass(&changes, &thresholds, cfg.lookahead_samples, &mut claimed);
    let window = ((cfg.gradual_window_m / cfg.resample_interval_m).ceil() as usize).max(2);
    spans.extend(gradual_pass(&changes, &thresholds, window, &mut claimed));
    spans.sort_by_key(|s| s.start);

    let raw: Vec<CurveEvent> = spans
        .iter()
        .map(|s| build_curve(&points, &changes, *s, cfg.resample_interval_m))
        .collect();
    let raw_count = raw.len();

    let merged = merge_adjacent(raw, cfg.adjacent_merge_gap_m);
    let merged = merge_chicanes(merged, cfg.chicane_max_gap_m);
    let merged = merge_technical_sections(merged, cfg.section_max_gap_m, cfg.section_speed_bonus);
    let curves = apply_road_factor(merged, thresholds.speed_factor);

    info!(
        "🌀 Detected {} curve events ({} raw spans) on {} road, {:.0}m",
        curves.len(),
        raw_count,
        profile.character,
        points.last().map(|p| p.cumulative_distance).unwrap_or(0.0)
    );

    CurveAnalysis {
        points,
        profile: Some(profile),
        curves,
    }
}

/// Signed change at every interior vertex.
pub fn heading_changes(points: &[RoutePoint]) -> Vec<f64> {
    let headings: Vec<f64> = points
        .windows(2)
        .map(|w| bearing(w[0].coord, w[1].coord))
        .collect();
    headings
        .windows(2)
        .map(|w| heading_change(w[0], w[1]))
        .collect()
}

// ============================================================================
// SHARP PASS
// ============================================================================

/// Walk the change sequence opening a curve on a strong change and extending
/// it over same-sign changes, bridging short sub-threshold gaps.
pub fn sharp_pass(
    changes: &[f64],
    t: &CurveThresholds,
    lookahead: usize,
    claimed: &mut [bool],
) -> Vec<CurveSpan> {
    let mut spans = Vec::new();
    let n = changes.len();
    let mut i = 0;

    while i < n {
        if changes[i].abs() < t.start_deg {
            i += 1;
            continue;
        }

        let sign = changes[i].signum();
        let start = i;
        let mut end = i;
        let mut j = i + 1;

        while j < n {
            if sign * changes[j] >= t.continue_deg {
                end = j;
                j += 1;
                continue;
            }
            // opposite-sign significant change closes immediately
            if -sign * changes[j] >= t.continue_deg {
                break;
            }

            let mut bridged = None;
            for k in (j + 1)..n.min(j + 1 + lookahead) {
                if -sign * changes[k] >= t.continue_deg {
                    break;
                }
                if sign * changes[k] >= t.continue_deg {
                    bridged = Some(k);
                    break;
                }
            }
            match bridged {
                Some(k) => {
                    end = k;
                    j = k + 1;
                }
                None => break,
            }
        }

        let total: f64 = changes[start..=end].iter().sum();
        if total.abs() >= t.min_angle_deg {
            debug!(
                "sharp span {}..={} total {:.1}° over {} vertices",
                start,
                end,
                total,
                end - start + 1
            );
            spans.push(CurveSpan { start, end });
            claimed[start..=end].iter_mut().for_each(|c| *c = true);
        }
        i = end + 1;
    }

    spans
}

// ============================================================================
// GRADUAL PASS
// ============================================================================

/// Slide a fixed window over unclaimed vertices looking for long sweepers
/// whose individual changes never trip the sharp pass.
pub fn gradual_pass(
    changes: &[f64],
    t: &CurveThresholds,
    window: usize,
    claimed: &mut [bool],
) -> Vec<CurveSpan> {
    let mut spans = Vec::new();
    let n = changes.len();
    if n < window {
        return spans;
    }

    let mut i = 0;
    while i + window <= n {
        if claimed[i..i + window].iter().any(|&c| c) {
            i += 1;
            continue;
        }

        let net: f64 = changes[i..i + window].iter().sum();
        if net.abs() < t.gradual_net_deg {
            i += 1;
            continue;
        }

        let sign = net.signum();
        let mut start = i;
        let mut end = i + window - 1;
        // Grow while the local neighbourhood keeps turning the same way, so
        // straight vertices between chord bends do not stop the expansion.
        while start > 0 && !claimed[start - 1] && sign * changes[start - 1] > -GRADUAL_TRIM_DEG {
            let hi = (start - 1 + GRADUAL_EXPAND_SAMPLES).min(n);
            let local: f64 = changes[start - 1..hi].iter().sum();
            if sign * local <= GRADUAL_TRIM_DEG {
                break;
            }
            start -= 1;
        }
        while end + 1 < n && !claimed[end + 1] && sign * changes[end + 1] > -GRADUAL_TRIM_DEG {
            let lo = (end + 2).saturating_sub(GRADUAL_EXPAND_SAMPLES);
            let local: f64 = changes[lo..=end + 1].iter().sum();
            if sign * local <= GRADUAL_TRIM_DEG {
                break;
            }
            end += 1;
        }
        while start < end && sign * changes[start] < GRADUAL_TRIM_DEG {
            start += 1;
        }
        while end > start && sign * changes[end] < GRADUAL_TRIM_DEG {
            end -= 1;
        }

        let total: f64 = changes[start..=end].iter().sum();
        if total.abs() >= t.min_angle_deg {
            debug!(
                "gradual span {}..={} total {:.1}°",
                start, end, total
            );
            spans.push(CurveSpan { start, end });
            claimed[start..=end].iter_mut().for_each(|c| *c = true);
        }
        i = end.max(i) + 1;
    }

    spans
}

// ============================================================================
// CURVE CONSTRUCTION
// ============================================================================

/// Direction of the first segment turning more than 1°, falling back to the
/// sign of the total. Never the net angle when a significant segment exists.
pub fn first_significant_direction(segment_changes: &[f64]) -> Direction {
    segment_changes
        .iter()
        .find(|c| c.abs() > DIRECTION_MIN_CHANGE_DEG)
        .map(|c| Direction::from_heading_change(*c))
        .unwrap_or_else(|| Direction::from_heading_change(segment_changes.iter().sum()))
}

/// Tightening / opening from the first vs last third of the body, with a
/// geometric label as fallback.
pub fn shape_modifier(segment_changes: &[f64], angle_deg: f64, length_m: f64) -> Option<ShapeModifier> {
    if segment_changes.len() >= 3 {
        let third = segment_changes.len() / 3;
        let mean_abs = |s: &[f64]| s.iter().map(|c| c.abs()).sum::<f64>() / s.len() as f64;
        let first = mean_abs(&segment_changes[..third]);
        let last = mean_abs(&segment_changes[segment_changes.len() - third..]);

        if first > f64::EPSILON {
            let ratio = last / first;
            if ratio > TIGHTENS_RATIO {
                return Some(ShapeModifier::Tightens);
            }
            if ratio < OPENS_RATIO {
                return Some(ShapeModifier::Opens);
            }
        } else if last > f64::EPSILON {
            return Some(ShapeModifier::Tightens);
        }
    }

    if angle_deg >= HAIRPIN_ANGLE_DEG {
        Some(ShapeModifier::Hairpin)
    } else if angle_deg >= SHARP_ANGLE_DEG && length_m < SHARP_MAX_LENGTH_M {
        Some(ShapeModifier::Sharp)
    } else if length_m >= LONG_LENGTH_M {
        Some(ShapeModifier::Long)
    } else {
        None
    }
}

/// Radius from arc length and turned angle.
pub fn radius_from(length_m: f64, angle_deg: f64) -> f64 {
    let rad = angle_deg.abs().to_radians();
    if rad <= f64::EPSILON {
        f64::INFINITY
    } else {
        length_m / rad
    }
}

pub fn build_curve(
    points: &[RoutePoint],
    changes: &[f64],
    span: CurveSpan,
    spacing: f64,
) -> CurveEvent {
    let segment_changes = changes[span.start..=span.end].to_vec();
    let signed_total: f64 = segment_changes.iter().sum();
    let angle = signed_total.abs();

    let entry_vertex = span.start + 1;
    let exit_vertex = span.end + 1;
    let to_point = |v: usize| CurvePoint {
        coord: points[v].coord,
        distance: points[v].cumulative_distance,
    };
    let entry = to_point(entry_vertex);
    let exit = to_point(exit_vertex);

    // geometric apex: where half of the turning has been done
    let mut turned = 0.0;
    let mut apex_vertex = entry_vertex;
    for (offset, c) in segment_changes.iter().enumerate() {
        turned += c.abs();
        if turned >= angle / 2.0 {
            apex_vertex = entry_vertex + offset;
            break;
        }
    }

    // each turning vertex stands for one resample interval of arc
    let length = exit.distance - entry.distance + spacing;
    let radius = radius_from(length, angle);
    let severity = severity_for(radius, angle);

    CurveEvent {
        kind: CurveKind::Curve,
        direction: first_significant_direction(&segment_changes),
        severity,
        angle,
        length,
        radius,
        modifier: shape_modifier(&segment_changes, angle, length),
        entry,
        apex: to_point(apex_vertex),
        exit,
        distance_from_start: entry.distance,
        speeds: recommended_speeds(radius),
        segment_changes,
        sub_curves: Vec::new(),
        zone: None,
    }
}
