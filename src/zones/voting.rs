// src/zones/voting.rs
//
// Windows → zones.
//
//   cells       every stride (0.25 mi) owns one cell; its character comes
//               from the 0.5 mi window starting at the cell
//   merge       adjacent same-character cells become zones
//   absorb      zones under 0.5 mi fold into a neighbour until stable
//   urban edge  urban hints near either end force that edge urban
//
// No randomness, no clock, no hash iteration: identical inputs give
// identical boundaries.

use super::signals::{vote_curves, VoteContext, WindowVote};
use super::ZoneConfig;
use crate::types::{
    AreaHint, AreaKind, CurveEvent, RoadSegment, Zone, ZoneCharacter, ZoneScore, METERS_PER_MILE,
};
use tracing::{debug, info};

const MILE_EPSILON: f64 = 1e-9;
const URBAN_EDGE_REASON: &str = "urban edge";

/// Classify a route into contiguous zones covering `[0, total miles]`.
///
/// Returns an empty list only for a zero-length route.
pub fn classify_with_voting(
    events: &[CurveEvent],
    total_distance_m: f64,
    area_hints: Option<&[AreaHint]>,
    road_hints: Option<&[RoadSegment]>,
    cfg: &ZoneConfig,
) -> Vec<Zone> {
    let total_miles = total_distance_m / METERS_PER_MILE;
    if !(total_miles > 0.0) || !total_miles.is_finite() {
        return Vec::new();
    }
    let area_hints = area_hints.unwrap_or(&[]);
    let road_hints = road_hints.unwrap_or(&[]);

    let curves = vote_curves(events, cfg.meaningful_angle_deg);
    let ctx = VoteContext {
        curves: &curves,
        total_miles,
        area_hints,
        road_hints,
        cfg,
    };

    let stride = cfg.stride_miles.max(0.01);
    let cells = ((total_miles / stride) - MILE_EPSILON).ceil().max(1.0) as usize;

    let mut zones: Vec<Zone> = Vec::new();
    for i in 0..cells {
        let start = i as f64 * stride;
        let end = if i + 1 == cells {
            total_miles
        } else {
            ((i + 1) as f64 * stride).min(total_miles)
        };
        let window_end = (start + cfg.window_miles).min(total_miles);
        let vote = ctx.score_window(start, window_end);
        push_cell(&mut zones, start, end, vote);
    }
    let window_zones = zones.len();

    let zones = absorb_short_zones(zones, cfg.min_zone_miles);
    let zones = apply_urban_edges(zones, total_miles, area_hints, cfg.urban_edge_miles);
    let zones = seal(zones, total_miles);

    info!(
        "🗺️ {} zones over {:.1} mi ({} after window merge, {} voting curves)",
        zones.len(),
        total_miles,
        window_zones,
        curves.len()
    );
    for z in &zones {
        debug!(
            "  {:>9} {:.2}-{:.2} mi  tech={:.1} transit={:.1} urban={:.1}  [{}]",
            z.character.as_str(),
            z.start_mile,
            z.end_mile,
            z.score.technical,
            z.score.transit,
            z.score.urban,
            z.reasons.join(", ")
        );
    }

    zones
}

fn merge_reasons(into: &mut Vec<String>, from: Vec<String>) {
    for r in from {
        if !into.contains(&r) {
            into.push(r);
        }
    }
}

fn push_cell(zones: &mut Vec<Zone>, start: f64, end: f64, vote: WindowVote) {
    if let Some(last) = zones.last_mut() {
        if last.character == vote.character {
            last.end_mile = end;
            last.score.add(&vote.score);
            merge_reasons(&mut last.reasons, vote.reasons);
            return;
        }
    }
    let mut reasons = Vec::new();
    merge_reasons(&mut reasons, vote.reasons);
    zones.push(Zone {
        start_mile: start,
        end_mile: end,
        character: vote.character,
        score: vote.score,
        reasons,
    });
}

/// Join neighbouring zones that share a character.
pub fn coalesce(zones: Vec<Zone>) -> Vec<Zone> {
    let mut out: Vec<Zone> = Vec::with_capacity(zones.len());
    for z in zones {
        if let Some(last) = out.last_mut() {
            if last.character == z.character {
                last.end_mile = z.end_mile;
                last.score.add(&z.score);
                merge_reasons(&mut last.reasons, z.reasons);
                continue;
            }
        }
        out.push(z);
    }
    out
}

/// Which neighbour swallows the short zone at `idx`: a same-character one
/// if present, otherwise the longer neighbour (ties go to the previous).
fn absorbing_neighbour(zones: &[Zone], idx: usize) -> usize {
    let prev = idx.checked_sub(1);
    let next = (idx + 1 < zones.len()).then_some(idx + 1);
    let character = zones[idx].character;

    if let Some(p) = prev.filter(|&p| zones[p].character == character) {
        return p;
    }
    if let Some(n) = next.filter(|&n| zones[n].character == character) {
        return n;
    }
    match (prev, next) {
        (Some(p), Some(n)) => {
            if zones[n].length_miles() > zones[p].length_miles() {
                n
            } else {
                p
            }
        }
        (Some(p), None) => p,
        (None, Some(n)) => n,
        (None, None) => idx,
    }
}

/// Fold zones shorter than `min_len` into a neighbour, repeating until no
/// short zone remains (or only one zone is left).
pub fn absorb_short_zones(mut zones: Vec<Zone>, min_len: f64) -> Vec<Zone> {
    loop {
        if zones.len() <= 1 {
            return zones;
        }
        let Some(idx) = zones
            .iter()
            .position(|z| z.length_miles() < min_len - MILE_EPSILON)
        else {
            return zones;
        };

        let target = absorbing_neighbour(&zones, idx);
        let short = zones.remove(idx);
        let target = if target > idx { target - 1 } else { target };
        let into = &mut zones[target];

        debug!(
            "absorbing {:.2} mi {} zone at {:.2} into {}",
            short.length_miles(),
            short.character,
            short.start_mile,
            into.character
        );
        into.start_mile = into.start_mile.min(short.start_mile);
        into.end_mile = into.end_mile.max(short.end_mile);
        into.score.add(&short.score);
        merge_reasons(&mut into.reasons, short.reasons);

        zones = coalesce(zones);
    }
}

/// Force `[from, to]` to urban, splitting zones that straddle the bounds.
fn force_urban(zones: Vec<Zone>, from: f64, to: f64) -> Vec<Zone> {
    let mut out = Vec::with_capacity(zones.len() + 2);

    for z in zones {
        let len = z.length_miles();
        let cuts = [
            (z.start_mile, from.clamp(z.start_mile, z.end_mile), false),
            (
                from.clamp(z.start_mile, z.end_mile),
                to.clamp(z.start_mile, z.end_mile),
                true,
            ),
            (to.clamp(z.start_mile, z.end_mile), z.end_mile, false),
        ];
        for (start, end, urban) in cuts {
            if end - start <= MILE_EPSILON {
                continue;
            }
            let share = if len > 0.0 { (end - start) / len } else { 1.0 };
            let mut piece = Zone {
                start_mile: start,
                end_mile: end,
                character: z.character,
                score: ZoneScore {
                    technical: z.score.technical * share,
                    transit: z.score.transit * share,
                    urban: z.score.urban * share,
                },
                reasons: z.reasons.clone(),
            };
            if urban && piece.character != ZoneCharacter::Urban {
                piece.character = ZoneCharacter::Urban;
                merge_reasons(&mut piece.reasons, vec![URBAN_EDGE_REASON.to_string()]);
            }
            out.push(piece);
        }
    }

    coalesce(out)
}

/// Urban hints touching the first or last `edge` miles make that boundary
/// region urban. Mid-route hints are ignored.
pub fn apply_urban_edges(
    zones: Vec<Zone>,
    total_miles: f64,
    area_hints: &[AreaHint],
    edge: f64,
) -> Vec<Zone> {
    let urban: Vec<&AreaHint> = area_hints
        .iter()
        .filter(|h| h.kind == AreaKind::Urban && h.end_mile > h.start_mile)
        .collect();
    if urban.is_empty() || zones.is_empty() {
        return zones;
    }

    let edge = edge.min(total_miles);
    let mut zones = zones;

    let start_region_end = urban
        .iter()
        .filter(|h| h.start_mile < edge)
        .map(|h| h.end_mile.min(edge))
        .fold(0.0_f64, f64::max);
    if start_region_end > MILE_EPSILON {
        debug!("urban edge at start: 0.00-{:.2} mi", start_region_end);
        zones = force_urban(zones, 0.0, start_region_end);
    }

    let end_floor = total_miles - edge;
    let end_region_start = urban
        .iter()
        .filter(|h| h.end_mile > end_floor)
        .map(|h| h.start_mile.max(end_floor))
        .fold(total_miles, f64::min);
    if end_region_start < total_miles - MILE_EPSILON {
        debug!(
            "urban edge at end: {:.2}-{:.2} mi",
            end_region_start, total_miles
        );
        zones = force_urban(zones, end_region_start, total_miles);
    }

    zones
}

/// Pin the outer bounds and make every boundary shared exactly.
fn seal(mut zones: Vec<Zone>, total_miles: f64) -> Vec<Zone> {
    if zones.is_empty() {
        return zones;
    }
    zones[0].start_mile = 0.0;
    for i in 1..zones.len() {
        zones[i].start_mile = zones[i - 1].end_mile;
    }
    if let Some(last) = zones.last_mut() {
        last.end_mile = total_miles;
    }
    zones
}
