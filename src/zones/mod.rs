// src/zones/mod.rs
//
// Zone classification by weighted voting.
//
// Signal flow:
//   curve events → vote curves (flattened, ≥12°)
//   0.5 mi windows @ 50% stride → signals (scoring) → per-cell character
//   → voting (merge, absorb short zones, urban-edge override) → Vec<Zone>
//   lookup relabels curve events against the final zones.
//
// Every weight and threshold lives in `ZoneConfig` so the tuning can be
// adjusted from config.yaml without touching the classifier.

pub mod lookup;
pub mod signals;
pub mod voting;

pub use lookup::{character_at_mile, reassign_event_zones, summarize_zones, zone_at_mile, ZoneSummary};
pub use voting::classify_with_voting;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingWeights {
    // technical
    pub cluster: f64,
    pub sustained: f64,
    pub danger: f64,
    pub high_avg_angle: f64,
    pub tight_radius: f64,
    pub local_road: f64,
    // transit
    pub long_gap: f64,
    pub sparse: f64,
    pub rural: f64,
    pub highway: f64,
    // urban
    pub urban: f64,
}

impl Default for VotingWeights {
    fn default() -> Self {
        Self {
            cluster: 3.0,
            sustained: 2.0,
            danger: 1.5,
            high_avg_angle: 1.0,
            tight_radius: 1.5,
            local_road: 1.0,
            long_gap: 3.0,
            sparse: 2.0,
            rural: 1.0,
            highway: 2.5,
            urban: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingThresholds {
    pub cluster_min_curves: usize,
    pub cluster_min_avg_angle: f64,
    pub sustained_span_miles: f64,
    pub sustained_min_curves: usize,
    pub sustained_min_avg_angle: f64,
    pub danger_angle: f64,
    pub high_avg_angle: f64,
    pub high_avg_min_curves: usize,
    pub tight_radius_m: f64,
    pub tight_min_curves: usize,
    pub long_gap_miles: f64,
    pub sparse_span_miles: f64,
    /// A window is sparse with fewer curves than this in the sparse span.
    pub sparse_max_curves: usize,
}

impl Default for VotingThresholds {
    fn default() -> Self {
        Self {
            cluster_min_curves: 3,
            cluster_min_avg_angle: 18.0,
            sustained_span_miles: 2.0,
            sustained_min_curves: 4,
            sustained_min_avg_angle: 20.0,
            danger_angle: 50.0,
            high_avg_angle: 30.0,
            high_avg_min_curves: 2,
            tight_radius_m: 100.0,
            tight_min_curves: 2,
            long_gap_miles: 2.0,
            sparse_span_miles: 2.0,
            sparse_max_curves: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    pub window_miles: f64,
    pub stride_miles: f64,
    pub min_zone_miles: f64,
    /// Urban votes and the urban override only apply this close to an end.
    pub urban_edge_miles: f64,
    /// Curves below this angle do not vote.
    pub meaningful_angle_deg: f64,
    pub weights: VotingWeights,
    pub thresholds: VotingThresholds,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            window_miles: 0.5,
            stride_miles: 0.25,
            min_zone_miles: 0.5,
            urban_edge_miles: 2.0,
            meaningful_angle_deg: 12.0,
            weights: VotingWeights::default(),
            thresholds: VotingThresholds::default(),
        }
    }
}
