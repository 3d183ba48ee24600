// src/analysis/road_character.rs
//
// Whole-route character classification. Runs once over the heading-change
// sequence before any curve is extracted and picks the threshold set every
// later pass uses:
//
//   highway   → few degrees per 100 m, long straights. Raised thresholds so
//               lane-keeping wobble in the polyline is not called a curve.
//   technical → dense heading change, short straights. Lowered thresholds.
//   mixed     → everything else.

use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadCharacter {
    Highway,
    Technical,
    Mixed,
}

impl RoadCharacter {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoadCharacter::Highway => "highway",
            RoadCharacter::Technical => "technical",
            RoadCharacter::Mixed => "mixed",
        }
    }
}

impl std::fmt::Display for RoadCharacter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Detection thresholds tuned for one road character.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveThresholds {
    /// Per-vertex change (deg) that opens a sharp curve.
    pub start_deg: f64,
    /// Per-vertex change (deg) that keeps a sharp curve going.
    pub continue_deg: f64,
    /// Minimum total angle (deg) for a candidate to become a curve.
    pub min_angle_deg: f64,
    /// Net change (deg) over the gradual window that flags a sweeper.
    pub gradual_net_deg: f64,
    /// Multiplier applied to every recommended speed on this road type.
    pub speed_factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSet {
    pub highway: CurveThresholds,
    pub technical: CurveThresholds,
    pub mixed: CurveThresholds,
}

impl ThresholdSet {
    pub fn for_character(&self, character: RoadCharacter) -> CurveThresholds {
        match character {
            RoadCharacter::Highway => self.highway,
            RoadCharacter::Technical => self.technical,
            RoadCharacter::Mixed => self.mixed,
        }
    }
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            highway: CurveThresholds {
                start_deg: 4.0,
                continue_deg: 1.5,
                min_angle_deg: 15.0,
                gradual_net_deg: 25.0,
                speed_factor: 1.12,
            },
            technical: CurveThresholds {
                start_deg: 2.5,
                continue_deg: 1.0,
                min_angle_deg: 10.0,
                gradual_net_deg: 15.0,
                speed_factor: 0.92,
            },
            mixed: CurveThresholds {
                start_deg: 3.0,
                continue_deg: 1.2,
                min_angle_deg: 12.0,
                gradual_net_deg: 20.0,
                speed_factor: 1.0,
            },
        }
    }
}

/// Cut-offs for the character classification itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterConfig {
    /// Vertices changing less than this count as straight.
    pub straight_change_deg: f64,
    pub highway_max_deg_per_100m: f64,
    pub highway_min_longest_straight_m: f64,
    pub technical_min_deg_per_100m: f64,
    pub technical_max_avg_straight_m: f64,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            straight_change_deg: 2.0,
            highway_max_deg_per_100m: 6.0,
            highway_min_longest_straight_m: 800.0,
            technical_min_deg_per_100m: 20.0,
            technical_max_avg_straight_m: 120.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadCharacterProfile {
    pub character: RoadCharacter,
    pub deg_per_100m: f64,
    pub avg_straight_m: f64,
    pub longest_straight_m: f64,
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Classify a route from its per-vertex heading changes.
///
/// `spacing` is the distance between resampled vertices.
pub fn analyze_road_character(
    changes: &[f64],
    spacing: f64,
    cfg: &CharacterConfig,
) -> RoadCharacterProfile {
    let length = changes.len() as f64 * spacing;
    if changes.is_empty() || length <= 0.0 {
        return RoadCharacterProfile {
            character: RoadCharacter::Mixed,
            deg_per_100m: 0.0,
            avg_straight_m: 0.0,
            longest_straight_m: 0.0,
        };
    }

    let total_change: f64 = changes.iter().map(|c| c.abs()).sum();
    let deg_per_100m = total_change / length * 100.0;

    let mut runs: Vec<f64> = Vec::new();
    let mut run = 0usize;
    for c in changes {
        if c.abs() < cfg.straight_change_deg {
            run += 1;
        } else if run > 0 {
            runs.push(run as f64 * spacing);
            run = 0;
        }
    }
    if run > 0 {
        runs.push(run as f64 * spacing);
    }

    let longest_straight_m = runs.iter().copied().fold(0.0, f64::max);
    let avg_straight_m = if runs.is_empty() {
        0.0
    } else {
        runs.iter().sum::<f64>() / runs.len() as f64
    };

    let character = if deg_per_100m <= cfg.highway_max_deg_per_100m
        && longest_straight_m >= cfg.highway_min_longest_straight_m
    {
        RoadCharacter::Highway
    } else if deg_per_100m >= cfg.technical_min_deg_per_100m
        || avg_straight_m <= cfg.technical_max_avg_straight_m
    {
        RoadCharacter::Technical
    } else {
        RoadCharacter::Mixed
    };

    debug!(
        "🛣️ Road character: {} ({:.1}°/100m, avg straight {:.0}m, longest {:.0}m)",
        character, deg_per_100m, avg_straight_m, longest_straight_m
    );

    RoadCharacterProfile {
        character,
        deg_per_100m,
        avg_straight_m,
        longest_straight_m,
    }
}
