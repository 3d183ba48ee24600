// src/main.rs

use anyhow::{Context, Result};
use road_cues::analysis::{analyze_route, curves_ahead_on_route, upcoming_curves, RoadCharacterProfile};
use road_cues::config::{CalloutConfig, Config};
use road_cues::ingest::{self, Route};
use road_cues::matching::RouteMatcher;
use road_cues::simulation::{DriveSimulator, SimEvent, SimulationRoute};
use road_cues::types::{CurveEvent, CurveKind, GpsFix, Zone, METERS_PER_MILE};
use road_cues::zones::{classify_with_voting, reassign_event_zones, summarize_zones, ZoneSummary};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config.yaml";
const DEFAULT_ROUTE: &str = "demos/ridge_road.json";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisDump<'a> {
    name: &'a str,
    distance_meters: f64,
    profile: Option<RoadCharacterProfile>,
    summary: ZoneSummary,
    zones: &'a [Zone],
    curves: &'a [CurveEvent],
}

#[derive(Debug, Default)]
struct DriveStats {
    fixes: usize,
    off_route_fixes: usize,
    callouts: usize,
    zone_changes: usize,
    max_match_error_m: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("ROAD_CUES_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let config = if Path::new(&config_path).exists() {
        Some(Config::load(&config_path)?)
    } else {
        None
    };
    let loaded = config.is_some();
    let config = config.unwrap_or_default();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚗 Road cues starting");
    if loaded {
        info!("✓ Configuration loaded from {}", config_path);
    } else {
        warn!("No config at {}, using defaults", config_path);
    }

    let route_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ROUTE.to_string());
    let route = ingest::load_route(&route_path)?;

    // ── analysis ────────────────────────────────────────────────────────
    let (curves, profile) = match route.curves.clone() {
        Some(curves) => {
            info!("Using {} precomputed curve events", curves.len());
            (curves, None)
        }
        None => {
            let analysis = analyze_route(&route.coordinates, &config.detector);
            (analysis.curves, analysis.profile)
        }
    };
    if let Some(p) = &profile {
        info!(
            "  Road character: {} ({:.1}°/100m, avg straight {:.0}m, longest {:.0}m)",
            p.character, p.deg_per_100m, p.avg_straight_m, p.longest_straight_m
        );
    }

    let zones = classify_with_voting(
        &curves,
        route.distance_meters,
        Some(&route.area_hints),
        Some(&route.road_segments),
        &config.zones,
    );
    let curves = reassign_event_zones(&curves, &zones);
    let summary = summarize_zones(&zones);

    info!(
        "  Zones: {} ({:.1} mi transit, {:.1} mi technical, {:.1} mi urban)",
        summary.zone_count, summary.transit_miles, summary.technical_miles, summary.urban_miles
    );
    for z in &zones {
        info!(
            "    {:>9}  {:5.2} → {:5.2} mi  [{}]",
            z.character.as_str(),
            z.start_mile,
            z.end_mile,
            z.reasons.join(", ")
        );
    }

    if let Ok(output) = std::env::var("ROAD_CUES_OUTPUT") {
        let dump = AnalysisDump {
            name: &route.name,
            distance_meters: route.distance_meters,
            profile,
            summary,
            zones: &zones,
            curves: &curves,
        };
        let json = serde_json::to_string_pretty(&dump)?;
        std::fs::write(&output, json).with_context(|| format!("writing analysis to {}", output))?;
        info!("💾 Analysis written to {}", output);
    }

    // ── drive ───────────────────────────────────────────────────────────
    let stats = drive(&route, curves, zones, &config).await?;

    info!("\n✓ Drive finished");
    info!("  Fixes: {}", stats.fixes);
    info!("  Off-route fixes: {}", stats.off_route_fixes);
    info!("  Callouts: {}", stats.callouts);
    info!("  Zone changes: {}", stats.zone_changes);
    info!("  Worst match offset: {:.1}m", stats.max_match_error_m);

    Ok(())
}

async fn drive(
    route: &Route,
    curves: Vec<CurveEvent>,
    zones: Vec<Zone>,
    config: &Config,
) -> Result<DriveStats> {
    let mut matcher = RouteMatcher::new(route.coordinates.clone(), config.matcher);
    let mut sim = DriveSimulator::new(
        SimulationRoute {
            coordinates: route.coordinates.clone(),
            zones,
            curves: curves.clone(),
        },
        config.simulator.clone(),
    );

    let dt = config.simulator.tick_interval_s.max(0.05);
    let period = dt / config.simulator.playback_rate.max(0.01);
    let mut ticker = interval(Duration::from_secs_f64(period));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut stats = DriveStats::default();
    let mut announced_until = f64::NEG_INFINITY;

    sim.start();
    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("listening for ctrl-c")?;
                warn!("Interrupted, stopping simulation");
                sim.stop();
                break;
            }
            _ = ticker.tick() => {
                let live = sim.tick(dt);
                for event in sim.drain_events() {
                    handle_event(
                        event,
                        &mut matcher,
                        &curves,
                        &config.callouts,
                        config.matcher.max_off_route_m,
                        &mut announced_until,
                        &mut stats,
                    );
                }
                if !live {
                    break;
                }
            }
        }
    }

    Ok(stats)
}

fn handle_event(
    event: SimEvent,
    matcher: &mut RouteMatcher,
    curves: &[CurveEvent],
    callouts: &CalloutConfig,
    max_off_route_m: f64,
    announced_until: &mut f64,
    stats: &mut DriveStats,
) {
    match event {
        SimEvent::Position {
            fix,
            distance,
            is_seeking,
        } => {
            if is_seeking {
                // scrubbing: re-acquire and skip callouts for everything we jumped past
                matcher.reset();
                let m = matcher.update(&fix);
                *announced_until = m.distance;
                return;
            }

            stats.fixes += 1;
            let m = matcher.update(&fix);
            if m.dist_from_route > max_off_route_m {
                stats.off_route_fixes += 1;
                debug!("off route by {:.0}m", m.dist_from_route);
                return;
            }
            stats.max_match_error_m = stats.max_match_error_m.max((m.distance - distance).abs());

            if let Some(next) = next_callout(curves, &fix, m.distance, callouts) {
                if next.entry.distance > *announced_until {
                    *announced_until = next.entry.distance;
                    stats.callouts += 1;
                    info!(
                        "📢 {} in {:.0}m  (mile {:.2}, {:.0} mph)",
                        describe(&next),
                        next.entry.distance - m.distance,
                        m.distance / METERS_PER_MILE,
                        fix.speed_mph()
                    );
                }
            }
        }
        SimEvent::ZoneChanged {
            from,
            to,
            mile,
            is_seeking,
        } => {
            if !is_seeking {
                stats.zone_changes += 1;
            }
            match from {
                Some(from) => info!("🗺️  {} → {} at mile {:.2}", from, to, mile),
                None => info!("🗺️  Starting in {} zone", to),
            }
        }
        SimEvent::Completed {
            distance,
            elapsed_s,
        } => {
            info!(
                "🏁 Arrived: {:.2} mi in {:.0}s",
                distance / METERS_PER_MILE,
                elapsed_s
            );
        }
    }
}

/// The next curve worth announcing: on-route progress bounds the search,
/// the heading filter drops anything already behind the vehicle.
fn next_callout(
    curves: &[CurveEvent],
    fix: &GpsFix,
    distance: f64,
    callouts: &CalloutConfig,
) -> Option<CurveEvent> {
    let ahead: Vec<CurveEvent> = curves_ahead_on_route(curves, distance, callouts.lookahead_m)
        .into_iter()
        .filter(|c| c.entry.distance >= distance && c.severity >= callouts.min_severity)
        .collect();
    let visible = upcoming_curves(&ahead, fix.coord(), fix.heading, callouts.lookahead_m);
    visible.into_iter().next().or_else(|| ahead.into_iter().next())
}

fn describe(curve: &CurveEvent) -> String {
    let mut text = match curve.kind {
        CurveKind::Curve => format!("{} {}", curve.direction, curve.severity),
        CurveKind::Chicane => format!(
            "Chicane {} {} ({} turns)",
            curve.direction,
            curve.severity,
            curve.sub_curves.len()
        ),
        CurveKind::TechnicalSection(style) => format!(
            "{} section, {} curves, max {}",
            style.as_str(),
            curve.sub_curves.len(),
            curve.severity
        ),
    };
    if let Some(m) = curve.modifier {
        text.push(' ');
        text.push_str(&m.as_str().to_lowercase());
    }
    text.push_str(&format!(", {:.0} mph", curve.speeds.cruise));
    text
}
