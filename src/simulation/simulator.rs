// src/simulation/simulator.rs

use super::event_bus::{SimEvent, SimEventBus};
use super::noise::NoiseGen;
use super::speed_model::{approach_speed, target_speed_mps};
use super::SimulatorConfig;
use crate::geometry::{cumulative_distances, offset_meters, point_at_distance};
use crate::types::{
    Coord, CurveEvent, GpsFix, Zone, ZoneCharacter, METERS_PER_MILE, MPS_PER_MPH,
};
use crate::zones::character_at_mile;
use serde::Serialize;
use tracing::{debug, info, warn};

const END_EPSILON_M: f64 = 1e-6;

/// Everything the simulator drives over.
#[derive(Debug, Clone, Default)]
pub struct SimulationRoute {
    pub coordinates: Vec<Coord>,
    pub zones: Vec<Zone>,
    pub curves: Vec<CurveEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimPhase {
    Idle,
    InitialDelay,
    Running,
    Paused,
    Completed,
    Stopped,
}

/// Snapshot handed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    pub distance: f64,
    pub zone: Option<ZoneCharacter>,
    pub speed_override: Option<f64>,
    pub is_seeking: bool,
    pub is_running: bool,
    pub is_paused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimProgress {
    pub distance: f64,
    pub total: f64,
    pub fraction: f64,
    pub mile: f64,
    pub speed_mph: f64,
    pub elapsed_s: f64,
    pub phase: SimPhase,
}

pub struct DriveSimulator {
    coords: Vec<Coord>,
    cumulative: Vec<f64>,
    total: f64,
    zones: Vec<Zone>,
    curves: Vec<CurveEvent>,
    cfg: SimulatorConfig,

    phase: SimPhase,
    /// Phase to return to on resume.
    paused_from: SimPhase,
    delay_remaining: f64,
    distance: f64,
    speed_mps: f64,
    elapsed_s: f64,
    speed_override: Option<f64>,
    is_seeking: bool,
    zone: Option<ZoneCharacter>,
    completion_sent: bool,

    noise: Option<NoiseGen>,
    bus: SimEventBus,
}

impl DriveSimulator {
    pub fn new(route: SimulationRoute, cfg: SimulatorConfig) -> Self {
        let cumulative = cumulative_distances(&route.coordinates);
        let total = cumulative.last().copied().unwrap_or(0.0);
        let noise = (cfg.noise_m > 0.0).then(|| NoiseGen::new(cfg.noise_seed));
        let bus = SimEventBus::new(cfg.max_pending_events);

        Self {
            coords: route.coordinates,
            cumulative,
            total,
            zones: route.zones,
            curves: route.curves,
            cfg,
            phase: SimPhase::Idle,
            paused_from: SimPhase::Running,
            delay_remaining: 0.0,
            distance: 0.0,
            speed_mps: 0.0,
            elapsed_s: 0.0,
            speed_override: None,
            is_seeking: false,
            zone: None,
            completion_sent: false,
            noise,
            bus,
        }
    }

    // ── lifecycle ───────────────────────────────────────────────────────

    pub fn start(&mut self) {
        if self.phase != SimPhase::Idle {
            debug!("start ignored in {:?}", self.phase);
            return;
        }
        info!(
            "🚗 Simulation start: {:.2} mi, {} zones, {} curves",
            self.total / METERS_PER_MILE,
            self.zones.len(),
            self.curves.len()
        );
        self.update_zone();
        self.emit_position();

        if self.cfg.initial_delay_s > 0.0 {
            self.delay_remaining = self.cfg.initial_delay_s;
            self.phase = SimPhase::InitialDelay;
        } else {
            self.phase = SimPhase::Running;
        }
    }

    pub fn pause(&mut self) {
        if matches!(self.phase, SimPhase::Running | SimPhase::InitialDelay) {
            self.paused_from = self.phase;
            self.phase = SimPhase::Paused;
            debug!("paused at {:.0} m", self.distance);
        }
    }

    pub fn resume(&mut self) {
        if self.phase == SimPhase::Paused {
            self.phase = self.paused_from;
            debug!("resumed at {:.0} m", self.distance);
        }
    }

    /// Terminal. Nothing is emitted after this returns; calling it again
    /// is a no-op.
    pub fn stop(&mut self) {
        if self.phase == SimPhase::Stopped {
            return;
        }
        info!("🛑 Simulation stopped at {:.0} m", self.distance);
        self.phase = SimPhase::Stopped;
        self.speed_mps = 0.0;
    }

    /// Jump straight to `meters` without replaying the ticks in between.
    ///
    /// Events queued by the jump carry `is_seeking = true`. Ignored once
    /// the drive has completed or been stopped.
    pub fn seek_to(&mut self, meters: f64) {
        if matches!(self.phase, SimPhase::Completed | SimPhase::Stopped) {
            debug!("seek ignored in {:?}", self.phase);
            return;
        }
        let target = if meters.is_finite() {
            meters.clamp(0.0, self.total)
        } else {
            self.distance
        };

        self.is_seeking = true;
        debug!("⏩ seek {:.0} → {:.0} m", self.distance, target);
        self.distance = target;
        self.speed_mps = match self.speed_override {
            Some(mph) => mph.max(0.0) * MPS_PER_MPH,
            None => target_speed_mps(&self.zones, &self.curves, target, &self.cfg),
        };
        self.update_zone();
        self.emit_position();
        self.is_seeking = false;
    }

    /// `None` hands speed back to the zone and curve model.
    pub fn set_speed_override(&mut self, mph: Option<f64>) {
        self.speed_override = mph.filter(|v| v.is_finite()).map(|v| v.max(0.0));
    }

    // ── stepping ────────────────────────────────────────────────────────

    /// Advance by `dt` seconds. Returns whether the simulator is still
    /// live (delaying, running or paused).
    pub fn tick(&mut self, dt: f64) -> bool {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        match self.phase {
            SimPhase::InitialDelay => {
                self.delay_remaining -= dt;
                if self.delay_remaining <= 0.0 {
                    self.phase = SimPhase::Running;
                }
            }
            SimPhase::Running => self.advance(dt),
            _ => {}
        }

        self.is_live()
    }

    fn advance(&mut self, dt: f64) {
        self.elapsed_s += dt;
        self.speed_mps = match self.speed_override {
            Some(mph) => mph * MPS_PER_MPH,
            None => {
                let target = target_speed_mps(&self.zones, &self.curves, self.distance, &self.cfg);
                approach_speed(self.speed_mps, target, dt, &self.cfg)
            }
        };
        self.distance = (self.distance + self.speed_mps * dt).min(self.total);

        self.update_zone();
        self.emit_position();

        if self.distance >= self.total - END_EPSILON_M {
            self.distance = self.total;
            self.phase = SimPhase::Completed;
            if !self.completion_sent {
                self.completion_sent = true;
                info!(
                    "🏁 Simulation complete: {:.2} mi in {:.0} s",
                    self.total / METERS_PER_MILE,
                    self.elapsed_s
                );
                self.bus.publish(SimEvent::Completed {
                    distance: self.distance,
                    elapsed_s: self.elapsed_s,
                });
            }
        }
    }

    fn update_zone(&mut self) {
        let current = character_at_mile(&self.zones, self.distance / METERS_PER_MILE);
        if self.zone != Some(current) {
            debug!(
                "zone {:?} → {} at {:.2} mi",
                self.zone,
                current,
                self.distance / METERS_PER_MILE
            );
            self.bus.publish(SimEvent::ZoneChanged {
                from: self.zone,
                to: current,
                mile: self.distance / METERS_PER_MILE,
                is_seeking: self.is_seeking,
            });
            self.zone = Some(current);
        }
    }

    fn emit_position(&mut self) {
        let fix = self.current_fix();
        self.bus.publish(SimEvent::Position {
            fix,
            distance: self.distance,
            is_seeking: self.is_seeking,
        });
    }

    fn current_fix(&mut self) -> GpsFix {
        let (mut coord, heading) = point_at_distance(&self.coords, &self.cumulative, self.distance);
        let mut accuracy = self.cfg.accuracy_m;
        if let Some(noise) = self.noise.as_mut() {
            let amp = self.cfg.noise_m;
            coord = offset_meters(coord, noise.jitter(amp), noise.jitter(amp));
            accuracy += amp;
        }
        GpsFix {
            lat: coord.lat,
            lng: coord.lng,
            speed: self.speed_mps,
            heading,
            accuracy,
            timestamp_ms: self.elapsed_s * 1000.0,
        }
    }

    // ── observation ─────────────────────────────────────────────────────

    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.bus.drain()
    }

    pub fn state(&self) -> SimulationState {
        SimulationState {
            distance: self.distance,
            zone: self.zone,
            speed_override: self.speed_override,
            is_seeking: self.is_seeking,
            is_running: matches!(self.phase, SimPhase::Running | SimPhase::InitialDelay),
            is_paused: self.phase == SimPhase::Paused,
        }
    }

    pub fn get_progress(&self) -> SimProgress {
        SimProgress {
            distance: self.distance,
            total: self.total,
            fraction: if self.total > 0.0 {
                self.distance / self.total
            } else {
                1.0
            },
            mile: self.distance / METERS_PER_MILE,
            speed_mph: self.speed_mps / MPS_PER_MPH,
            elapsed_s: self.elapsed_s,
            phase: self.phase,
        }
    }

    pub fn phase(&self) -> SimPhase {
        self.phase
    }

    pub fn is_live(&self) -> bool {
        matches!(
            self.phase,
            SimPhase::InitialDelay | SimPhase::Running | SimPhase::Paused
        )
    }

    pub fn total_distance(&self) -> f64 {
        self.total
    }

    // ── pull iterators ──────────────────────────────────────────────────

    /// Every event, ticking by `dt` as needed. Starts an idle simulator;
    /// ends once the drive is completed, stopped or paused and the queue
    /// is empty. Calling again after a seek continues from there. A
    /// non-positive or non-finite `dt` yields nothing.
    pub fn events(&mut self, dt: f64) -> SimEvents<'_> {
        if !(dt.is_finite() && dt > 0.0) {
            warn!("events requested with invalid dt {}, yielding none", dt);
            return SimEvents { sim: self, dt: 0.0 };
        }
        if self.phase == SimPhase::Idle {
            self.start();
        }
        SimEvents { sim: self, dt }
    }

    /// Position fixes only.
    pub fn fixes(&mut self, dt: f64) -> impl Iterator<Item = GpsFix> + '_ {
        self.events(dt).filter_map(|e| match e {
            SimEvent::Position { fix, .. } => Some(fix),
            _ => None,
        })
    }
}

pub struct SimEvents<'a> {
    sim: &'a mut DriveSimulator,
    dt: f64,
}

impl Iterator for SimEvents<'_> {
    type Item = SimEvent;

    fn next(&mut self) -> Option<SimEvent> {
        if self.dt <= 0.0 {
            return None;
        }
        loop {
            if let Some(event) = self.sim.bus.pop() {
                return Some(event);
            }
            if !matches!(self.sim.phase, SimPhase::InitialDelay | SimPhase::Running) {
                return None;
            }
            self.sim.tick(self.dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::curve_detector::tests::route_from_legs;
    use crate::analysis::{detect_curves, DetectorConfig};
    use crate::geometry::haversine;
    use crate::types::ZoneScore;

    fn straight_mile() -> SimulationRoute {
        let coordinates = route_from_legs(&[(0.0, METERS_PER_MILE)]);
        let total_miles = cumulative_distances(&coordinates).last().copied().unwrap() / METERS_PER_MILE;
        SimulationRoute {
            coordinates,
            zones: vec![Zone {
                start_mile: 0.0,
                end_mile: total_miles,
                character: ZoneCharacter::Transit,
                score: ZoneScore::default(),
                reasons: Vec::new(),
            }],
            curves: Vec::new(),
        }
    }

    fn run_to_end(sim: &mut DriveSimulator) -> Vec<SimEvent> {
        let mut events = sim.drain_events();
        for _ in 0..10_000 {
            if !sim.tick(1.0) {
                break;
            }
            events.extend(sim.drain_events());
        }
        events
    }

    #[test]
    fn test_straight_mile_completes_exactly_once() {
        let mut sim = DriveSimulator::new(straight_mile(), SimulatorConfig::default());
        let total = sim.total_distance();
        sim.start();
        let mut events = run_to_end(&mut sim);

        assert_eq!(sim.phase(), SimPhase::Completed);
        // extra ticks after completion change nothing
        for _ in 0..5 {
            assert!(!sim.tick(1.0));
        }
        events.extend(sim.drain_events());

        let completions = events
            .iter()
            .filter(|e| matches!(e, SimEvent::Completed { .. }))
            .count();
        assert_eq!(completions, 1);

        for e in &events {
            if let SimEvent::Position { distance, .. } = e {
                assert!(*distance <= total, "{} > {}", distance, total);
            }
        }
        assert_eq!(sim.get_progress().distance, total);
        assert_eq!(sim.get_progress().fraction, 1.0);
    }

    #[test]
    fn test_progress_is_monotonic_and_speed_ramps() {
        let mut sim = DriveSimulator::new(straight_mile(), SimulatorConfig::default());
        sim.start();
        let mut last_distance = 0.0;
        let mut last_speed = 0.0;
        for _ in 0..10 {
            sim.tick(1.0);
            let p = sim.get_progress();
            assert!(p.distance >= last_distance);
            assert!(p.speed_mph * MPS_PER_MPH - last_speed <= 2.0 + 1e-9);
            last_distance = p.distance;
            last_speed = p.speed_mph * MPS_PER_MPH;
        }
        assert!(last_distance > 0.0);
    }

    #[test]
    fn test_seek_flags_events_in_both_directions() {
        let mut sim = DriveSimulator::new(straight_mile(), SimulatorConfig::default());
        sim.start();
        sim.tick(1.0);
        sim.tick(1.0);
        sim.drain_events();

        for target in [1200.0, 300.0] {
            sim.seek_to(target);
            assert!(!sim.state().is_seeking);
            assert!((sim.state().distance - target).abs() < 1e-9);

            let seek_events = sim.drain_events();
            assert!(!seek_events.is_empty());
            assert!(seek_events.iter().all(|e| e.is_seeking()));

            sim.tick(1.0);
            let after = sim.drain_events();
            assert!(!after.is_empty());
            assert!(after.iter().all(|e| !e.is_seeking()));
        }
    }

    #[test]
    fn test_seek_is_clamped_to_route() {
        let mut sim = DriveSimulator::new(straight_mile(), SimulatorConfig::default());
        sim.seek_to(1e9);
        assert_eq!(sim.state().distance, sim.total_distance());
        sim.seek_to(-50.0);
        assert_eq!(sim.state().distance, 0.0);
    }

    #[test]
    fn test_stop_is_idempotent_and_silences() {
        let mut sim = DriveSimulator::new(straight_mile(), SimulatorConfig::default());
        sim.start();
        sim.tick(1.0);
        sim.tick(1.0);
        sim.stop();
        sim.drain_events();
        sim.stop();

        assert!(!sim.tick(1.0));
        sim.seek_to(500.0);
        sim.start();
        sim.resume();
        assert!(sim.drain_events().is_empty());
        assert_eq!(sim.phase(), SimPhase::Stopped);
        assert_eq!(sim.fixes(1.0).count(), 0);
    }

    #[test]
    fn test_pause_holds_position() {
        let mut sim = DriveSimulator::new(straight_mile(), SimulatorConfig::default());
        sim.start();
        for _ in 0..4 {
            sim.tick(1.0);
        }
        sim.pause();
        assert!(sim.state().is_paused);
        let held = sim.state().distance;
        for _ in 0..5 {
            assert!(sim.tick(1.0));
        }
        assert_eq!(sim.state().distance, held);

        sim.resume();
        assert!(sim.state().is_running);
        sim.tick(1.0);
        assert!(sim.state().distance > held);
    }

    #[test]
    fn test_speed_override_bypasses_model() {
        let cfg = SimulatorConfig {
            initial_delay_s: 0.0,
            ..Default::default()
        };
        let mut sim = DriveSimulator::new(straight_mile(), cfg);
        sim.set_speed_override(Some(30.0));
        sim.start();
        sim.tick(1.0);
        assert!((sim.get_progress().speed_mph - 30.0).abs() < 1e-9);
        assert!((sim.state().distance - 30.0 * MPS_PER_MPH).abs() < 1e-9);
        assert_eq!(sim.state().speed_override, Some(30.0));

        sim.set_speed_override(None);
        sim.tick(1.0);
        // back on the model: at most one second of acceleration above 30 mph
        let mps = sim.get_progress().speed_mph * MPS_PER_MPH;
        assert!(mps <= 30.0 * MPS_PER_MPH + 2.0 + 1e-9);
    }

    #[test]
    fn test_zone_changes_are_reported() {
        let mut route = straight_mile();
        let total_miles = route.zones[0].end_mile;
        route.zones = vec![
            Zone {
                start_mile: 0.0,
                end_mile: 0.5,
                character: ZoneCharacter::Urban,
                score: ZoneScore::default(),
                reasons: Vec::new(),
            },
            Zone {
                start_mile: 0.5,
                end_mile: total_miles,
                character: ZoneCharacter::Transit,
                score: ZoneScore::default(),
                reasons: Vec::new(),
            },
        ];
        let mut sim = DriveSimulator::new(route, SimulatorConfig::default());
        let changes: Vec<(Option<ZoneCharacter>, ZoneCharacter)> = sim
            .events(1.0)
            .filter_map(|e| match e {
                SimEvent::ZoneChanged { from, to, .. } => Some((from, to)),
                _ => None,
            })
            .collect();
        assert_eq!(
            changes,
            vec![
                (None, ZoneCharacter::Urban),
                (Some(ZoneCharacter::Urban), ZoneCharacter::Transit)
            ]
        );
    }

    #[test]
    fn test_fixes_iterator_is_finite_and_resumes_after_seek() {
        let cfg = SimulatorConfig {
            initial_delay_s: 0.0,
            ..Default::default()
        };
        let mut sim = DriveSimulator::new(straight_mile(), cfg);
        let first: Vec<GpsFix> = sim.fixes(1.0).take(5).collect();
        assert_eq!(first.len(), 5);

        sim.seek_to(1000.0);
        let rest: Vec<GpsFix> = sim.fixes(1.0).collect();
        let start = destination_of(&sim, 1000.0);
        assert!(haversine(rest[0].coord(), start) < 1.0);
        assert!(rest.len() > 1);
        assert_eq!(sim.phase(), SimPhase::Completed);
    }

    #[test]
    fn test_fixes_iterator_with_invalid_dt_is_empty() {
        let mut sim = DriveSimulator::new(straight_mile(), SimulatorConfig::default());
        assert_eq!(sim.fixes(0.0).take(3).count(), 0);
        assert_eq!(sim.fixes(f64::NAN).count(), 0);
        assert_eq!(sim.events(-1.0).count(), 0);
        assert_eq!(sim.phase(), SimPhase::Idle);

        // mid-delay and mid-drive it still returns straight away
        sim.start();
        assert_eq!(sim.fixes(0.0).count(), 0);
        assert_eq!(sim.phase(), SimPhase::InitialDelay);
        sim.tick(2.0);
        assert_eq!(sim.fixes(f64::INFINITY).count(), 0);
        assert_eq!(sim.phase(), SimPhase::Running);
        assert!(sim.fixes(1.0).take(3).count() == 3);
    }

    fn destination_of(sim: &DriveSimulator, d: f64) -> Coord {
        point_at_distance(&sim.coords, &sim.cumulative, d).0
    }

    #[test]
    fn test_noise_is_deterministic_and_bounded() {
        let cfg = SimulatorConfig {
            noise_m: 4.0,
            noise_seed: 9,
            initial_delay_s: 0.0,
            ..Default::default()
        };
        let a: Vec<GpsFix> = DriveSimulator::new(straight_mile(), cfg.clone())
            .fixes(1.0)
            .collect();
        let b: Vec<GpsFix> = DriveSimulator::new(straight_mile(), cfg).fixes(1.0).collect();
        assert_eq!(a, b);

        let clean: Vec<GpsFix> = DriveSimulator::new(
            straight_mile(),
            SimulatorConfig {
                initial_delay_s: 0.0,
                ..Default::default()
            },
        )
        .fixes(1.0)
        .collect();
        assert_eq!(a.len(), clean.len());
        for (n, c) in a.iter().zip(&clean) {
            // two axes of ±4 m
            assert!(haversine(n.coord(), c.coord()) < 6.0);
        }
    }

    #[test]
    fn test_curves_slow_the_drive() {
        let coordinates = route_from_legs(&[(0.0, 800.0), (90.0, 800.0)]);
        let curves = detect_curves(&coordinates, &DetectorConfig::default());
        assert_eq!(curves.len(), 1);
        let apex = curves[0].apex.distance;

        let cfg = SimulatorConfig {
            initial_delay_s: 0.0,
            ..Default::default()
        };
        let mut sim = DriveSimulator::new(
            SimulationRoute {
                coordinates,
                zones: Vec::new(),
                curves,
            },
            cfg,
        );
        let mut slowest_near_apex = f64::INFINITY;
        let mut fastest = 0.0_f64;
        for e in sim.events(0.5) {
            if let SimEvent::Position { fix, distance, .. } = e {
                fastest = fastest.max(fix.speed);
                if (distance - apex).abs() < 30.0 {
                    slowest_near_apex = slowest_near_apex.min(fix.speed);
                }
            }
        }
        assert!(slowest_near_apex < fastest * 0.8, "{} vs {}", slowest_near_apex, fastest);
    }
}
