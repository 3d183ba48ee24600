// src/simulation/speed_model.rs
//
// Target speed at a point on the route. The simulator chases this target
// with bounded acceleration, so everything here only needs to be
// continuous in distance.

use super::SimulatorConfig;
use crate::types::{CurveEvent, Zone, ZoneCharacter, METERS_PER_MILE, MPS_PER_MPH};

pub fn base_mph(character: ZoneCharacter, cfg: &SimulatorConfig) -> f64 {
    match character {
        ZoneCharacter::Transit => cfg.transit_mph,
        ZoneCharacter::Technical => cfg.technical_mph,
        ZoneCharacter::Urban => cfg.urban_mph,
    }
}

/// Zone base speed with a linear blend across each boundary.
pub fn zone_speed_mph(zones: &[Zone], distance: f64, cfg: &SimulatorConfig) -> f64 {
    let mile = distance / METERS_PER_MILE;
    let Some(idx) = zones
        .iter()
        .position(|z| z.contains_mile(mile))
        .or_else(|| (!zones.is_empty() && mile >= zones[zones.len() - 1].end_mile).then(|| zones.len() - 1))
    else {
        return cfg.transit_mph;
    };

    let zone = &zones[idx];
    let here = base_mph(zone.character, cfg);
    let span = cfg.zone_transition_m.max(1.0);
    let half = span / 2.0;

    let since_start = distance - zone.start_mile * METERS_PER_MILE;
    if idx > 0 && since_start < half {
        let prev = base_mph(zones[idx - 1].character, cfg);
        let t = 0.5 + since_start / span;
        return prev + (here - prev) * t;
    }

    let to_end = zone.end_mile * METERS_PER_MILE - distance;
    if idx + 1 < zones.len() && to_end < half {
        let next = base_mph(zones[idx + 1].character, cfg);
        let t = 0.5 - to_end / span;
        return here + (next - here) * t;
    }

    here
}

/// Multiplier in (0, 1] from the curve that slows us most at `distance`.
pub fn curve_factor(curves: &[CurveEvent], distance: f64, cfg: &SimulatorConfig) -> f64 {
    let approach = cfg.curve_approach_m.max(1.0);
    let recovery = cfg.curve_recovery_m.max(1.0);

    curves
        .iter()
        .filter(|c| {
            distance >= c.apex.distance - approach && distance <= c.exit.distance + recovery
        })
        .map(|c| {
            let idx = (c.severity as usize).min(cfg.severity_multipliers.len() - 1);
            let mult = cfg.severity_multipliers[idx].clamp(0.05, 1.0);
            let apex = c.apex.distance;
            let exit = c.exit.distance.max(apex);
            if distance < apex {
                let t = (apex - distance) / approach;
                mult + (1.0 - mult) * t
            } else if distance <= exit {
                mult
            } else {
                let t = (distance - exit) / recovery;
                mult + (1.0 - mult) * t
            }
        })
        .fold(1.0, f64::min)
}

pub fn target_speed_mps(
    zones: &[Zone],
    curves: &[CurveEvent],
    distance: f64,
    cfg: &SimulatorConfig,
) -> f64 {
    zone_speed_mph(zones, distance, cfg) * curve_factor(curves, distance, cfg) * MPS_PER_MPH
}

/// Move `current` toward `target`, limited by the configured accel/decel.
pub fn approach_speed(current: f64, target: f64, dt: f64, cfg: &SimulatorConfig) -> f64 {
    let delta = target - current;
    let step = delta.clamp(-cfg.deceleration_mps2 * dt, cfg.acceleration_mps2 * dt);
    (current + step).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coord, CurveKind, CurvePoint, Direction, SpeedRecommendation, ZoneScore};

    fn zone(s: f64, e: f64, c: ZoneCharacter) -> Zone {
        Zone {
            start_mile: s,
            end_mile: e,
            character: c,
            score: ZoneScore::default(),
            reasons: Vec::new(),
        }
    }

    fn curve_at(entry: f64, apex: f64, exit: f64, severity: u8) -> CurveEvent {
        let p = |d: f64| CurvePoint {
            coord: Coord::new(0.0, 0.0),
            distance: d,
        };
        CurveEvent {
            kind: CurveKind::Curve,
            direction: Direction::Left,
            severity,
            angle: 60.0,
            length: exit - entry,
            radius: 60.0,
            modifier: None,
            entry: p(entry),
            apex: p(apex),
            exit: p(exit),
            distance_from_start: entry,
            speeds: SpeedRecommendation {
                cruise: 25.0,
                fast: 30.0,
                race: 40.0,
            },
            segment_changes: Vec::new(),
            sub_curves: Vec::new(),
            zone: None,
        }
    }

    #[test]
    fn test_zone_speed_blends_at_boundary() {
        let cfg = SimulatorConfig::default();
        let zones = vec![
            zone(0.0, 2.0, ZoneCharacter::Transit),
            zone(2.0, 4.0, ZoneCharacter::Technical),
        ];
        let b = 2.0 * METERS_PER_MILE;
        assert_eq!(zone_speed_mph(&zones, 1000.0, &cfg), 65.0);
        assert_eq!(zone_speed_mph(&zones, b + 500.0, &cfg), 40.0);
        let mid = zone_speed_mph(&zones, b, &cfg);
        assert!((mid - 52.5).abs() < 1e-9);

        // continuous from both sides and monotonic through the blend
        let before = zone_speed_mph(&zones, b - 1e-6, &cfg);
        assert!((before - mid).abs() < 1e-3);
        let mut last = f64::INFINITY;
        for k in 0..=30 {
            let v = zone_speed_mph(&zones, b - 150.0 + k as f64 * 10.0, &cfg);
            assert!(v <= last + 1e-9);
            last = v;
        }
    }

    #[test]
    fn test_no_zones_defaults_to_transit() {
        let cfg = SimulatorConfig::default();
        assert_eq!(zone_speed_mph(&[], 123.0, &cfg), cfg.transit_mph);
    }

    #[test]
    fn test_curve_slows_to_multiplier_at_apex() {
        let cfg = SimulatorConfig::default();
        let curves = vec![curve_at(1000.0, 1030.0, 1060.0, 5)];
        assert_eq!(curve_factor(&curves, 500.0, &cfg), 1.0);
        assert!((curve_factor(&curves, 1030.0, &cfg) - 0.5).abs() < 1e-9);
        assert!((curve_factor(&curves, 1045.0, &cfg) - 0.5).abs() < 1e-9);
        let approaching = curve_factor(&curves, 930.0, &cfg);
        assert!(approaching > 0.5 && approaching < 1.0);
        assert!((curve_factor(&curves, 1060.0 + 150.0, &cfg) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_approach_speed_is_bounded() {
        let cfg = SimulatorConfig::default();
        assert_eq!(approach_speed(10.0, 30.0, 1.0, &cfg), 12.0);
        assert_eq!(approach_speed(30.0, 10.0, 1.0, &cfg), 26.5);
        assert_eq!(approach_speed(10.0, 10.5, 1.0, &cfg), 10.5);
    }
}
