// src/lib.rs
//
// Road-geometry core for a driving companion: curve detection, zone
// classification, route matching and a synthetic drive.

pub mod analysis;
pub mod config;
pub mod geometry;
pub mod ingest;
pub mod matching;
pub mod simulation;
pub mod types;
pub mod zones;

pub use analysis::{analyze_route, detect_curves, upcoming_curves, DetectorConfig};
pub use config::Config;
pub use matching::{distance_along_route, MatcherConfig, RouteMatcher};
pub use simulation::{DriveSimulator, SimEvent, SimulationRoute, SimulatorConfig};
pub use types::{CurveEvent, GpsFix, MatchResult, Zone, ZoneCharacter};
pub use zones::{classify_with_voting, reassign_event_zones, ZoneConfig};
