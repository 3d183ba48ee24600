// src/analysis/curve_merge.rs
//
// Post-detection merging. Order matters:
//
//   1. adjacent: same-direction fragments <30 m apart become one curve
//   2. chicane: 2-3 alternating curves within 150 m become one entity
//   3. section: longer runs (≥3 curves, ≤200 m gaps, ≥2 reversals)
//
// Only plain curves take part in each stage; chicanes and sections are
// never merged again.

use super::curve_detector::{radius_from, shape_modifier};
use super::speeds::{recommended_speeds, scale_speeds, severity_for};
use crate::types::{CurveEvent, CurveKind, SectionStyle, SpeedRecommendation};
use tracing::debug;

// ============================================================================
// SECTION STYLE CUT-OFFS
// ============================================================================

const SWITCHBACK_MIN_SEVERITY: u8 = 5;
const SWITCHBACK_MIN_DENSITY: f64 = 0.6;
const SWEEPING_MAX_SEVERITY: u8 = 2;
const TECHNICAL_MIN_SEVERITY: u8 = 3;
const TECHNICAL_MIN_DENSITY: f64 = 0.5;

const MIN_SECTION_CURVES: usize = 3;
const MIN_SECTION_REVERSALS: usize = 2;
const MAX_CHICANE_CURVES: usize = 3;

/// Gap between the exit of `a` and the entry of `b`.
pub fn gap_between(a: &CurveEvent, b: &CurveEvent) -> f64 {
    b.entry.distance - a.exit.distance
}

// ============================================================================
// ADJACENT MERGE
// ============================================================================

/// Merge same-direction plain curves separated by less than `max_gap`.
/// Idempotent: after one pass no mergeable pair remains.
pub fn merge_adjacent(curves: Vec<CurveEvent>, max_gap: f64) -> Vec<CurveEvent> {
    let mut out: Vec<CurveEvent> = Vec::with_capacity(curves.len());

    for curve in curves {
        if let Some(last) = out.last_mut() {
            if last.is_plain()
                && curve.is_plain()
                && last.direction == curve.direction
                && gap_between(last, &curve) < max_gap
            {
                debug!(
                    "merging adjacent {} curves at {:.0}m and {:.0}m",
                    curve.direction, last.entry.distance, curve.entry.distance
                );
                combine_into(last, curve);
                continue;
            }
        }
        out.push(curve);
    }

    out
}

fn combine_into(first: &mut CurveEvent, second: CurveEvent) {
    let angle = first.angle + second.angle;
    let length = first.length + second.length;
    let radius = radius_from(length, angle);

    if second.angle > first.angle {
        first.apex = second.apex;
    }
    first.exit = second.exit;
    first.angle = angle;
    first.length = length;
    first.radius = radius;
    first.severity = severity_for(radius, angle);
    first.segment_changes.extend(second.segment_changes);
    first.modifier = shape_modifier(&first.segment_changes, angle, length);
    first.speeds = recommended_speeds(radius);
}

// ============================================================================
// CHICANES
// ============================================================================

/// Collapse 2-3 consecutive alternating curves within `max_gap` into one
/// chicane. Longer alternating runs are left for section detection.
pub fn merge_chicanes(curves: Vec<CurveEvent>, max_gap: f64) -> Vec<CurveEvent> {
    let mut out = Vec::with_capacity(curves.len());
    let mut run: Vec<CurveEvent> = Vec::new();

    let flush = |run: &mut Vec<CurveEvent>, out: &mut Vec<CurveEvent>| {
        if (2..=MAX_CHICANE_CURVES).contains(&run.len()) {
            out.push(build_chicane(std::mem::take(run)));
        } else {
            out.append(run);
        }
    };

    for curve in curves {
        if !curve.is_plain() {
            flush(&mut run, &mut out);
            out.push(curve);
            continue;
        }

        let continues_run = run.last().map_or(false, |prev: &CurveEvent| {
            prev.direction != curve.direction && gap_between(prev, &curve) <= max_gap
        });
        if !continues_run {
            flush(&mut run, &mut out);
        }
        run.push(curve);
    }
    flush(&mut run, &mut out);

    out
}

fn hardest_speeds(curves: &[CurveEvent]) -> SpeedRecommendation {
    curves
        .iter()
        .map(|c| c.speeds)
        .reduce(|a, b| a.min(&b))
        .unwrap_or_else(|| recommended_speeds(f64::INFINITY))
}

fn sharpest(curves: &[CurveEvent]) -> usize {
    curves
        .iter()
        .enumerate()
        .max_by(|a, b| {
            a.1.angle
                .partial_cmp(&b.1.angle)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Shared shell for chicanes and sections built from `subs` (non-empty).
fn compound(subs: Vec<CurveEvent>, kind: CurveKind, speeds: SpeedRecommendation) -> CurveEvent {
    let first = &subs[0];
    let last = &subs[subs.len() - 1];
    let apex = subs[sharpest(&subs)].apex;

    CurveEvent {
        kind,
        direction: first.direction,
        severity: subs.iter().map(|c| c.severity).max().unwrap_or(1),
        angle: subs.iter().map(|c| c.angle).sum(),
        length: last.exit.distance - first.entry.distance,
        radius: subs.iter().map(|c| c.radius).fold(f64::INFINITY, f64::min),
        modifier: None,
        entry: first.entry,
        apex,
        exit: last.exit,
        distance_from_start: first.entry.distance,
        speeds,
        segment_changes: Vec::new(),
        sub_curves: subs,
        zone: None,
    }
}

fn build_chicane(subs: Vec<CurveEvent>) -> CurveEvent {
    debug!(
        "🔀 Chicane of {} curves at {:.0}m",
        subs.len(),
        subs[0].entry.distance
    );
    let speeds = hardest_speeds(&subs);
    compound(subs, CurveKind::Chicane, speeds)
}

// ============================================================================
// TECHNICAL SECTIONS
// ============================================================================

fn count_reversals(curves: &[CurveEvent]) -> usize {
    curves
        .windows(2)
        .filter(|w| w[0].direction != w[1].direction)
        .count()
}

pub fn section_style(subs: &[CurveEvent]) -> SectionStyle {
    let reversals = count_reversals(subs);
    let density = reversals as f64 / (subs.len().saturating_sub(1)).max(1) as f64;
    let max_severity = subs.iter().map(|c| c.severity).max().unwrap_or(1);

    if max_severity >= SWITCHBACK_MIN_SEVERITY && density >= SWITCHBACK_MIN_DENSITY {
        SectionStyle::Switchbacks
    } else if max_severity <= SWEEPING_MAX_SEVERITY {
        SectionStyle::Sweeping
    } else if max_severity >= TECHNICAL_MIN_SEVERITY && density >= TECHNICAL_MIN_DENSITY {
        SectionStyle::Technical
    } else {
        SectionStyle::Windy
    }
}

/// Collapse runs of plain curves (gaps ≤ `max_gap`, ≥3 curves, ≥2
/// reversals) into technical sections.
pub fn merge_technical_sections(
    curves: Vec<CurveEvent>,
    max_gap: f64,
    speed_bonus: f64,
) -> Vec<CurveEvent> {
    let mut out = Vec::with_capacity(curves.len());
    let mut run: Vec<CurveEvent> = Vec::new();

    let flush = |run: &mut Vec<CurveEvent>, out: &mut Vec<CurveEvent>| {
        if run.len() >= MIN_SECTION_CURVES && count_reversals(run) >= MIN_SECTION_REVERSALS {
            let subs = std::mem::take(run);
            let style = section_style(&subs);
            let speeds = scale_speeds(&hardest_speeds(&subs), speed_bonus);
            debug!(
                "🧩 {} section: {} curves from {:.0}m to {:.0}m",
                style.as_str(),
                subs.len(),
                subs[0].entry.distance,
                subs[subs.len() - 1].exit.distance
            );
            out.push(compound(subs, CurveKind::TechnicalSection(style), speeds));
        } else {
            out.append(run);
        }
    };

    for curve in curves {
        if !curve.is_plain() {
            flush(&mut run, &mut out);
            out.push(curve);
            continue;
        }
        let continues_run = run
            .last()
            .map_or(false, |prev: &CurveEvent| gap_between(prev, &curve) <= max_gap);
        if !continues_run {
            flush(&mut run, &mut out);
        }
        run.push(curve);
    }
    flush(&mut run, &mut out);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::curve_detector::tests::{arc_legs, route_from_legs};
    use crate::analysis::curve_detector::{detect_curves, DetectorConfig};
    use crate::types::{Coord, CurvePoint, Direction};

    fn curve(entry: f64, exit: f64, direction: Direction, angle: f64) -> CurveEvent {
        let length = exit - entry + 8.0;
        let radius = radius_from(length, angle);
        let point = |d: f64| CurvePoint {
            coord: Coord::new(0.0, 0.0),
            distance: d,
        };
        let sign = if direction == Direction::Right { 1.0 } else { -1.0 };
        CurveEvent {
            kind: CurveKind::Curve,
            direction,
            severity: severity_for(radius, angle),
            angle,
            length,
            radius,
            modifier: None,
            entry: point(entry),
            apex: point((entry + exit) / 2.0),
            exit: point(exit),
            distance_from_start: entry,
            speeds: recommended_speeds(radius),
            segment_changes: vec![sign * angle / 2.0, sign * angle / 2.0],
            sub_curves: Vec::new(),
            zone: None,
        }
    }

    #[test]
    fn test_adjacent_same_direction_merges() {
        let curves = vec![
            curve(100.0, 140.0, Direction::Left, 20.0),
            curve(160.0, 200.0, Direction::Left, 25.0),
            curve(400.0, 440.0, Direction::Left, 30.0),
        ];
        let merged = merge_adjacent(curves, 30.0);
        assert_eq!(merged.len(), 2);
        assert!((merged[0].angle - 45.0).abs() < 1e-9);
        assert_eq!(merged[0].exit.distance, 200.0);
        assert_eq!(merged[0].severity, severity_for(merged[0].radius, 45.0));
    }

    #[test]
    fn test_adjacent_merge_is_idempotent() {
        let curves = vec![
            curve(100.0, 140.0, Direction::Right, 20.0),
            curve(150.0, 170.0, Direction::Right, 15.0),
            curve(190.0, 230.0, Direction::Right, 18.0),
            curve(240.0, 280.0, Direction::Left, 30.0),
            curve(600.0, 640.0, Direction::Left, 30.0),
        ];
        let once = merge_adjacent(curves, 30.0);
        let twice = merge_adjacent(once.clone(), 30.0);
        assert_eq!(once, twice);
        for w in once.windows(2) {
            assert!(w[0].direction != w[1].direction || gap_between(&w[0], &w[1]) >= 30.0);
        }
    }

    #[test]
    fn test_opposite_directions_do_not_merge() {
        let curves = vec![
            curve(100.0, 140.0, Direction::Right, 20.0),
            curve(150.0, 190.0, Direction::Left, 20.0),
        ];
        assert_eq!(merge_adjacent(curves, 30.0).len(), 2);
    }

    #[test]
    fn test_two_alternating_curves_form_chicane() {
        let curves = vec![
            curve(100.0, 140.0, Direction::Left, 30.0),
            curve(200.0, 240.0, Direction::Right, 30.0),
        ];
        let merged = merge_chicanes(curves, 150.0);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_chicane());
        assert_eq!(merged[0].direction, Direction::Left);
        assert_eq!(merged[0].sub_curves.len(), 2);
    }

    #[test]
    fn test_long_alternating_run_becomes_section_not_chicanes() {
        let curves: Vec<CurveEvent> = (0..5)
            .map(|i| {
                let d = if i % 2 == 0 { Direction::Left } else { Direction::Right };
                curve(100.0 + i as f64 * 120.0, 140.0 + i as f64 * 120.0, d, 40.0)
            })
            .collect();
        let merged = merge_chicanes(curves, 150.0);
        assert_eq!(merged.len(), 5);
        let merged = merge_technical_sections(merged, 200.0, 1.05);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_technical_section());
        assert_eq!(merged[0].sub_curves.len(), 5);
    }

    #[test]
    fn test_section_needs_two_reversals() {
        let curves = vec![
            curve(100.0, 140.0, Direction::Left, 30.0),
            curve(300.0, 340.0, Direction::Left, 30.0),
            curve(500.0, 540.0, Direction::Right, 30.0),
        ];
        let merged = merge_technical_sections(curves, 200.0, 1.05);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_section_speed_above_hardest_curve() {
        let curves = vec![
            curve(100.0, 140.0, Direction::Left, 60.0),
            curve(300.0, 340.0, Direction::Right, 30.0),
            curve(500.0, 540.0, Direction::Left, 30.0),
        ];
        let hardest = hardest_speeds(&curves);
        let merged = merge_technical_sections(curves, 200.0, 1.05);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].speeds.cruise >= hardest.cruise);
        assert_eq!(merged[0].speeds.cruise, (hardest.cruise * 1.05).round());
    }

    #[test]
    fn test_section_styles() {
        let hairpins = vec![
            curve(0.0, 20.0, Direction::Left, 160.0),
            curve(150.0, 170.0, Direction::Right, 160.0),
            curve(300.0, 320.0, Direction::Left, 160.0),
        ];
        assert_eq!(section_style(&hairpins), SectionStyle::Switchbacks);

        let sweepers = vec![
            curve(0.0, 200.0, Direction::Left, 15.0),
            curve(350.0, 550.0, Direction::Right, 15.0),
            curve(700.0, 900.0, Direction::Left, 15.0),
        ];
        assert_eq!(section_style(&sweepers), SectionStyle::Sweeping);
    }

    #[test]
    fn test_three_alternating_corners_collapse_to_chicane() {
        let coords = route_from_legs(&[
            (90.0, 300.0),
            (45.0, 50.0),
            (135.0, 50.0),
            (90.0, 300.0),
        ]);
        let curves = detect_curves(&coords, &DetectorConfig::default());
        assert_eq!(curves.len(), 1, "got {:?}", curves);
        assert!(curves[0].is_chicane());
        assert_eq!(curves[0].sub_curves.len(), 3);
        assert_eq!(curves[0].direction, Direction::Left);
    }

    #[test]
    fn test_switchback_climb_becomes_section() {
        let mut legs = vec![(0.0, 300.0)];
        let mut heading = 0.0;
        for i in 0..5 {
            let turn = if i % 2 == 0 { 150.0 } else { -150.0 };
            legs.extend(arc_legs(heading, turn, 25.0));
            heading += turn;
            legs.push((heading, 180.0));
        }
        let coords = route_from_legs(&legs);
        let curves = detect_curves(&coords, &DetectorConfig::default());
        assert!(
            curves.iter().any(|c| c.is_technical_section()),
            "got {:?}",
            curves.iter().map(|c| c.kind).collect::<Vec<_>>()
        );
    }
}
