// src/analysis/mod.rs
//
// Curve detection pipeline.
//
// Signal flow:
//   polyline → curve_detector (resample, headings, passes)
//            → road_character (threshold set per route)
//            → curve_merge (adjacent, chicane, section)
//            → speeds (severity, recommendations, road factor)
//   upcoming filters consume the finished events at drive time.

pub mod curve_detector;
pub mod curve_merge;
pub mod road_character;
pub mod speeds;
pub mod upcoming;

pub use curve_detector::{analyze_route, detect_curves, CurveAnalysis, DetectorConfig};
pub use road_character::{RoadCharacter, RoadCharacterProfile};
pub use upcoming::{curves_ahead_on_route, upcoming_curves};
