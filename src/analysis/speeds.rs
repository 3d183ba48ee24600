// src/analysis/speeds.rs
//
// Severity rating and recommended corner speeds.

use crate::types::{CurveEvent, SpeedRecommendation, MPS_PER_MPH};

// ============================================================================
// SEVERITY
// ============================================================================

/// Radius bands (m), tightest last. Index + 1 is the base severity.
const RADIUS_BANDS: [f64; 5] = [500.0, 250.0, 120.0, 60.0, 30.0];

const ANGLE_ESCALATE_ONE: f64 = 70.0;
const ANGLE_ESCALATE_TWO: f64 = 120.0;

pub const MAX_SEVERITY: u8 = 6;

/// 1..=6 rating from radius, escalated by total turn angle.
pub fn severity_for(radius_m: f64, angle_deg: f64) -> u8 {
    let base = RADIUS_BANDS
        .iter()
        .position(|&band| radius_m >= band)
        .map(|i| i as u8 + 1)
        .unwrap_or(MAX_SEVERITY);

    let bump = if angle_deg >= ANGLE_ESCALATE_TWO {
        2
    } else if angle_deg >= ANGLE_ESCALATE_ONE {
        1
    } else {
        0
    };

    (base + bump).min(MAX_SEVERITY)
}

// ============================================================================
// SPEEDS
// ============================================================================

/// Lateral acceleration budget (m/s²) per driving style.
const CRUISE_LATERAL: f64 = 2.5;
const FAST_LATERAL: f64 = 4.0;
const RACE_LATERAL: f64 = 6.0;

const MIN_SPEED_MPH: f64 = 15.0;
const MAX_SPEED_MPH: f64 = 85.0;

fn corner_speed_mph(radius_m: f64, lateral: f64) -> f64 {
    let mph = (lateral * radius_m.max(0.0)).sqrt() / MPS_PER_MPH;
    ((mph / 5.0).round() * 5.0).clamp(MIN_SPEED_MPH, MAX_SPEED_MPH)
}

pub fn recommended_speeds(radius_m: f64) -> SpeedRecommendation {
    SpeedRecommendation {
        cruise: corner_speed_mph(radius_m, CRUISE_LATERAL),
        fast: corner_speed_mph(radius_m, FAST_LATERAL),
        race: corner_speed_mph(radius_m, RACE_LATERAL),
    }
}

fn round_mph(s: SpeedRecommendation) -> SpeedRecommendation {
    SpeedRecommendation {
        cruise: s.cruise.round(),
        fast: s.fast.round(),
        race: s.race.round(),
    }
}

/// Scale a recommendation and round to whole mph.
pub fn scale_speeds(s: &SpeedRecommendation, factor: f64) -> SpeedRecommendation {
    round_mph(s.scaled(factor))
}

/// Final road-type adjustment, applied to every event and its sub-curves.
pub fn apply_road_factor(curves: Vec<CurveEvent>, factor: f64) -> Vec<CurveEvent> {
    curves
        .into_iter()
        .map(|mut c| {
            c.speeds = scale_speeds(&c.speeds, factor);
            c.sub_curves = apply_road_factor(std::mem::take(&mut c.sub_curves), factor);
            c
        })
        .collect()
}
