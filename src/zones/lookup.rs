// src/zones/lookup.rs

use crate::types::{CurveEvent, Zone, ZoneCharacter};
use serde::Serialize;

/// The zone containing `mile`. Zones are half-open except the last, which
/// also owns the route end.
pub fn zone_at_mile(zones: &[Zone], mile: f64) -> Option<&Zone> {
    let last = zones.len().checked_sub(1)?;
    zones.iter().enumerate().find_map(|(i, z)| {
        let inside = z.contains_mile(mile) || (i == last && mile == z.end_mile);
        inside.then_some(z)
    })
}

/// Character at `mile`, transit when no zone covers it.
pub fn character_at_mile(zones: &[Zone], mile: f64) -> ZoneCharacter {
    zone_at_mile(zones, mile)
        .map(|z| z.character)
        .unwrap_or(ZoneCharacter::Transit)
}

fn relabel(event: &CurveEvent, zones: &[Zone]) -> CurveEvent {
    let mut out = event.clone();
    out.zone = Some(character_at_mile(zones, event.mile()));
    out.sub_curves = event.sub_curves.iter().map(|s| relabel(s, zones)).collect();
    out
}

/// Label every event and sub-curve with the zone it starts in.
pub fn reassign_event_zones(events: &[CurveEvent], zones: &[Zone]) -> Vec<CurveEvent> {
    events.iter().map(|e| relabel(e, zones)).collect()
}

/// Miles per character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSummary {
    pub transit_miles: f64,
    pub technical_miles: f64,
    pub urban_miles: f64,
    pub zone_count: usize,
}

impl ZoneSummary {
    pub fn total_miles(&self) -> f64 {
        self.transit_miles + self.technical_miles + self.urban_miles
    }
}

pub fn summarize_zones(zones: &[Zone]) -> ZoneSummary {
    zones.iter().fold(
        ZoneSummary {
            zone_count: zones.len(),
            ..Default::default()
        },
        |mut s, z| {
            match z.character {
                ZoneCharacter::Transit => s.transit_miles += z.length_miles(),
                ZoneCharacter::Technical => s.technical_miles += z.length_miles(),
                ZoneCharacter::Urban => s.urban_miles += z.length_miles(),
            }
            s
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Coord, CurveKind, CurvePoint, Direction, SectionStyle, SpeedRecommendation, ZoneScore,
        METERS_PER_MILE,
    };

    fn zone(s: f64, e: f64, c: ZoneCharacter) -> Zone {
        Zone {
            start_mile: s,
            end_mile: e,
            character: c,
            score: ZoneScore::default(),
            reasons: Vec::new(),
        }
    }

    fn zones() -> Vec<Zone> {
        vec![
            zone(0.0, 1.0, ZoneCharacter::Urban),
            zone(1.0, 4.0, ZoneCharacter::Technical),
            zone(4.0, 6.0, ZoneCharacter::Transit),
        ]
    }

    fn ev(mile: f64) -> CurveEvent {
        let p = CurvePoint {
            coord: Coord::new(0.0, 0.0),
            distance: mile * METERS_PER_MILE,
        };
        CurveEvent {
            kind: CurveKind::Curve,
            direction: Direction::Right,
            severity: 2,
            angle: 30.0,
            length: 50.0,
            radius: 95.0,
            modifier: None,
            entry: p,
            apex: p,
            exit: p,
            distance_from_start: p.distance,
            speeds: SpeedRecommendation {
                cruise: 35.0,
                fast: 45.0,
                race: 55.0,
            },
            segment_changes: Vec::new(),
            sub_curves: Vec::new(),
            zone: None,
        }
    }

    #[test]
    fn test_zone_boundaries_are_half_open() {
        let z = zones();
        assert_eq!(character_at_mile(&z, 0.0), ZoneCharacter::Urban);
        assert_eq!(character_at_mile(&z, 1.0), ZoneCharacter::Technical);
        assert_eq!(character_at_mile(&z, 6.0), ZoneCharacter::Transit);
        assert!(zone_at_mile(&z, 6.5).is_none());
        assert_eq!(character_at_mile(&z, 6.5), ZoneCharacter::Transit);
        assert!(zone_at_mile(&[], 0.0).is_none());
    }

    #[test]
    fn test_reassign_labels_sub_curves() {
        let mut section = ev(3.8);
        section.kind = CurveKind::TechnicalSection(SectionStyle::Windy);
        section.sub_curves = vec![ev(3.8), ev(3.95), ev(4.1)];

        let out = reassign_event_zones(&[ev(0.5), section], &zones());
        assert_eq!(out[0].zone, Some(ZoneCharacter::Urban));
        assert_eq!(out[1].zone, Some(ZoneCharacter::Technical));
        let subs: Vec<_> = out[1].sub_curves.iter().map(|s| s.zone).collect();
        assert_eq!(
            subs,
            vec![
                Some(ZoneCharacter::Technical),
                Some(ZoneCharacter::Technical),
                Some(ZoneCharacter::Transit)
            ]
        );
    }

    #[test]
    fn test_summarize_zones() {
        let s = summarize_zones(&zones());
        assert_eq!(s.zone_count, 3);
        assert!((s.urban_miles - 1.0).abs() < 1e-9);
        assert!((s.technical_miles - 3.0).abs() < 1e-9);
        assert!((s.transit_miles - 2.0).abs() < 1e-9);
        assert!((s.total_miles() - 6.0).abs() < 1e-9);
    }
}
