// src/simulation/mod.rs
//
// Synthetic drive along a planned route.
//
// Signal flow:
//   SimulationRoute (coords + zones + curves)
//   → speed_model (zone base speed, boundary ramps, curve slow-downs)
//   → simulator (state machine, bounded accel/decel, fix synthesis)
//   → event_bus (Position / ZoneChanged / Completed, drained by the caller)

pub mod event_bus;
pub mod noise;
pub mod simulator;
pub mod speed_model;

pub use event_bus::{SimEvent, SimEventBus};
pub use simulator::{DriveSimulator, SimPhase, SimProgress, SimulationRoute, SimulationState};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub transit_mph: f64,
    pub technical_mph: f64,
    pub urban_mph: f64,
    /// Base speed blends across a zone boundary over this distance (m),
    /// centred on the boundary.
    pub zone_transition_m: f64,
    /// Lead-in before a curve apex over which speed drops (m).
    pub curve_approach_m: f64,
    /// Distance after the exit over which speed recovers (m).
    pub curve_recovery_m: f64,
    /// Speed multiplier by severity, index 0 unused.
    pub severity_multipliers: [f64; 7],
    pub acceleration_mps2: f64,
    pub deceleration_mps2: f64,
    pub initial_delay_s: f64,
    pub tick_interval_s: f64,
    /// Simulated seconds per wall-clock second when driven by a timer.
    pub playback_rate: f64,
    pub accuracy_m: f64,
    /// Max position noise (m). Zero disables noise.
    pub noise_m: f64,
    pub noise_seed: u64,
    pub max_pending_events: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            transit_mph: 65.0,
            technical_mph: 40.0,
            urban_mph: 30.0,
            zone_transition_m: 300.0,
            curve_approach_m: 200.0,
            curve_recovery_m: 150.0,
            severity_multipliers: [1.0, 0.95, 0.85, 0.75, 0.62, 0.5, 0.4],
            acceleration_mps2: 2.0,
            deceleration_mps2: 3.5,
            initial_delay_s: 1.0,
            tick_interval_s: 1.0,
            playback_rate: 1.0,
            accuracy_m: 5.0,
            noise_m: 0.0,
            noise_seed: 42,
            max_pending_events: 512,
        }
    }
}
