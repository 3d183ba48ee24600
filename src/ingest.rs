// src/ingest.rs
//
// Route files and curve events from outside producers.
//
// Directions providers and older tooling disagree on field names
// (`angle` vs `totalAngle`, `type` vs `kind`, bare coordinate arrays vs
// GeoJSON). Aliases are accepted here and nowhere else; everything past
// this module sees one validated `CurveEvent` schema.

use crate::analysis::curve_detector::radius_from;
use crate::analysis::speeds::{recommended_speeds, severity_for, MAX_SEVERITY};
use crate::geometry::cumulative_distances;
use crate::types::{
    AreaHint, Coord, CurveEvent, CurveKind, CurvePoint, Direction, RoadSegment, SectionStyle,
    ShapeModifier, SpeedRecommendation, ZoneCharacter,
};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Exit/entry slack allowed between neighbouring precomputed curves.
const OVERLAP_TOLERANCE_M: f64 = 1.0;

/// Geometry as either a bare `[[lng, lat], ...]` list or a GeoJSON
/// LineString.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GeometryInput {
    Pairs(Vec<Coord>),
    LineString {
        #[serde(rename = "type")]
        kind: String,
        coordinates: Vec<Coord>,
    },
}

impl GeometryInput {
    fn into_coords(self) -> Result<Vec<Coord>> {
        match self {
            GeometryInput::Pairs(c) => Ok(c),
            GeometryInput::LineString { kind, coordinates } => {
                if kind != "LineString" {
                    bail!("unsupported geometry type '{}'", kind);
                }
                Ok(coordinates)
            }
        }
    }
}

/// Route file as written by a directions provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(alias = "geometry", alias = "coords")]
    pub coordinates: GeometryInput,
    #[serde(default, alias = "distance")]
    pub distance_meters: Option<f64>,
    #[serde(default, alias = "duration")]
    pub duration_seconds: Option<f64>,
    #[serde(default, alias = "roads")]
    pub road_segments: Vec<RoadSegment>,
    #[serde(default, alias = "areas")]
    pub area_hints: Vec<AreaHint>,
    /// Precomputed curves, if the producer already ran a detector.
    #[serde(default)]
    pub curves: Option<Vec<RawCurveEvent>>,
}

/// Validated route.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub coordinates: Vec<Coord>,
    pub distance_meters: f64,
    pub duration_seconds: Option<f64>,
    pub road_segments: Vec<RoadSegment>,
    pub area_hints: Vec<AreaHint>,
    pub curves: Option<Vec<CurveEvent>>,
}

/// Entry/apex/exit as a bare coordinate or with its route distance.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum RawPoint {
    Bare(Coord),
    Located {
        #[serde(alias = "location", alias = "position")]
        coord: Coord,
        #[serde(default)]
        distance: Option<f64>,
    },
}

impl RawPoint {
    fn coord(&self) -> Coord {
        match *self {
            RawPoint::Bare(c) => c,
            RawPoint::Located { coord, .. } => coord,
        }
    }

    fn distance(&self) -> Option<f64> {
        match *self {
            RawPoint::Bare(_) => None,
            RawPoint::Located { distance, .. } => distance,
        }
    }
}

/// Loosely shaped curve event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCurveEvent {
    #[serde(default, alias = "type", alias = "curveType")]
    pub kind: Option<String>,
    #[serde(default, alias = "sectionStyle")]
    pub style: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub severity: Option<f64>,
    #[serde(default, alias = "totalAngle", alias = "angleDeg")]
    pub angle: Option<f64>,
    #[serde(default, alias = "lengthMeters")]
    pub length: Option<f64>,
    #[serde(default, alias = "radiusMeters", alias = "minRadius")]
    pub radius: Option<f64>,
    #[serde(default, alias = "shape")]
    pub modifier: Option<String>,
    #[serde(default, alias = "distance", alias = "startDistance")]
    pub distance_from_start: Option<f64>,
    #[serde(default, alias = "location", alias = "position")]
    pub entry: Option<RawPoint>,
    #[serde(default)]
    pub apex: Option<RawPoint>,
    #[serde(default)]
    pub exit: Option<RawPoint>,
    #[serde(default, alias = "recommendedSpeeds")]
    pub speeds: Option<SpeedRecommendation>,
    #[serde(default, alias = "curves")]
    pub sub_curves: Vec<RawCurveEvent>,
    #[serde(default)]
    pub zone: Option<String>,
}

fn parse_direction(s: &str) -> Result<Direction> {
    match s.trim().to_ascii_lowercase().as_str() {
        "left" | "l" => Ok(Direction::Left),
        "right" | "r" => Ok(Direction::Right),
        other => bail!("unknown direction '{}'", other),
    }
}

fn parse_style(s: Option<&str>) -> Result<SectionStyle> {
    let Some(s) = s else {
        return Ok(SectionStyle::Windy);
    };
    match s.trim().to_ascii_lowercase().as_str() {
        "switchbacks" => Ok(SectionStyle::Switchbacks),
        "sweeping" | "sweepers" => Ok(SectionStyle::Sweeping),
        "technical" => Ok(SectionStyle::Technical),
        "windy" | "winding" => Ok(SectionStyle::Windy),
        other => bail!("unknown section style '{}'", other),
    }
}

fn parse_kind(kind: Option<&str>, style: Option<&str>) -> Result<CurveKind> {
    let Some(kind) = kind else {
        return Ok(CurveKind::Curve);
    };
    let k = kind.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
    match k.as_str() {
        "curve" | "corner" => Ok(CurveKind::Curve),
        "chicane" | "scurve" | "esses" => Ok(CurveKind::Chicane),
        "technicalsection" | "section" => Ok(CurveKind::TechnicalSection(parse_style(style)?)),
        _ => bail!("unknown curve kind '{}'", kind),
    }
}

fn parse_modifier(s: &str) -> Result<ShapeModifier> {
    match s.trim().to_ascii_uppercase().as_str() {
        "TIGHTENS" | "TIGHTENING" => Ok(ShapeModifier::Tightens),
        "OPENS" | "OPENING" => Ok(ShapeModifier::Opens),
        "HAIRPIN" => Ok(ShapeModifier::Hairpin),
        "SHARP" => Ok(ShapeModifier::Sharp),
        "LONG" => Ok(ShapeModifier::Long),
        other => bail!("unknown shape modifier '{}'", other),
    }
}

fn parse_zone(s: &str) -> Result<ZoneCharacter> {
    match s.trim().to_ascii_lowercase().as_str() {
        "transit" | "highway" => Ok(ZoneCharacter::Transit),
        "technical" => Ok(ZoneCharacter::Technical),
        "urban" | "city" => Ok(ZoneCharacter::Urban),
        other => bail!("unknown zone '{}'", other),
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

/// Normalize one loosely shaped event into a validated `CurveEvent`.
///
/// Missing radius/length are derived from each other; severity and speeds
/// are recomputed when absent. Unknown kinds, directions or modifiers are
/// rejected.
pub fn normalize_curve(raw: RawCurveEvent) -> Result<CurveEvent> {
    let kind = parse_kind(raw.kind.as_deref(), raw.style.as_deref())?;

    let Some(signed_angle) = raw.angle.filter(|a| a.is_finite()) else {
        bail!("curve has no angle");
    };
    let angle = signed_angle.abs();

    let direction = match raw.direction.as_deref() {
        Some(d) => parse_direction(d)?,
        None if signed_angle < 0.0 => Direction::Left,
        None if signed_angle > 0.0 => Direction::Right,
        None => bail!("curve has neither a direction nor a signed angle"),
    };

    let (length, radius) = match (positive(raw.length), positive(raw.radius)) {
        (Some(l), Some(r)) => (l, r),
        (Some(l), None) => (l, radius_from(l, angle)),
        (None, Some(r)) => (r * angle.to_radians(), r),
        (None, None) => bail!("curve needs a radius or a length"),
    };

    let Some(entry_raw) = raw.entry else {
        bail!("curve has no entry location");
    };
    let Some(start) = raw
        .distance_from_start
        .or_else(|| entry_raw.distance())
        .filter(|d| d.is_finite() && *d >= 0.0)
    else {
        bail!("curve has no distance from start");
    };

    let entry = CurvePoint {
        coord: entry_raw.coord(),
        distance: start,
    };
    let located = |p: Option<RawPoint>, fallback: CurvePoint| CurvePoint {
        coord: p.map_or(fallback.coord, |p| p.coord()),
        distance: p.and_then(|p| p.distance()).unwrap_or(fallback.distance),
    };
    let apex = located(
        raw.apex,
        CurvePoint {
            distance: start + length / 2.0,
            ..entry
        },
    );
    let exit = located(
        raw.exit,
        CurvePoint {
            distance: start + length,
            ..apex
        },
    );

    let severity = match raw.severity.filter(|s| s.is_finite()) {
        Some(s) => s.round().clamp(1.0, MAX_SEVERITY as f64) as u8,
        None => severity_for(radius, angle),
    };
    let modifier = raw.modifier.as_deref().map(parse_modifier).transpose()?;
    let zone = raw.zone.as_deref().map(parse_zone).transpose()?;

    let sub_curves = raw
        .sub_curves
        .into_iter()
        .enumerate()
        .map(|(i, sub)| normalize_curve(sub).with_context(|| format!("sub-curve {}", i)))
        .collect::<Result<Vec<_>>>()?;

    if kind == CurveKind::Chicane && !sub_curves.is_empty() && sub_curves.len() < 2 {
        bail!("chicane with a single sub-curve");
    }

    Ok(CurveEvent {
        kind,
        direction,
        severity,
        angle,
        length,
        radius,
        modifier,
        entry,
        apex,
        exit,
        distance_from_start: start,
        speeds: raw.speeds.unwrap_or_else(|| recommended_speeds(radius)),
        segment_changes: Vec::new(),
        sub_curves,
        zone,
    })
}

/// Producers may list curves in any order; downstream lookups assume
/// ascending `distance_from_start` with no overlap.
fn order_curves(mut curves: Vec<CurveEvent>) -> Result<Vec<CurveEvent>> {
    curves.sort_by(|a, b| a.distance_from_start.total_cmp(&b.distance_from_start));
    for pair in curves.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.distance_from_start + OVERLAP_TOLERANCE_M < prev.exit.distance {
            bail!(
                "curve at {:.0} m overlaps the one at {:.0} m (exit {:.0} m)",
                next.distance_from_start,
                prev.distance_from_start,
                prev.exit.distance
            );
        }
    }
    Ok(curves)
}

/// Validate a parsed route file.
pub fn validate_route(input: RouteInput) -> Result<Route> {
    let coordinates = input.coordinates.into_coords()?;
    if coordinates.len() < 2 {
        bail!("route needs at least 2 coordinates, got {}", coordinates.len());
    }
    if let Some((i, c)) = coordinates.iter().enumerate().find(|(_, c)| {
        !c.lng.is_finite() || !c.lat.is_finite() || c.lng.abs() > 180.0 || c.lat.abs() > 90.0
    }) {
        bail!("coordinate {} out of range: [{}, {}]", i, c.lng, c.lat);
    }

    let measured = cumulative_distances(&coordinates)
        .last()
        .copied()
        .unwrap_or(0.0);
    let distance_meters = match positive(input.distance_meters) {
        Some(d) => {
            if (d - measured).abs() > measured * 0.1 + 50.0 {
                warn!(
                    "reported distance {:.0} m differs from geometry {:.0} m",
                    d, measured
                );
            }
            d
        }
        None => measured,
    };

    let curves = match input.curves {
        Some(raw) => {
            let curves = raw
                .into_iter()
                .enumerate()
                .map(|(i, c)| normalize_curve(c).with_context(|| format!("curve {}", i)))
                .collect::<Result<Vec<_>>>()?;
            Some(order_curves(curves)?)
        }
        None => None,
    };

    Ok(Route {
        name: input.name.unwrap_or_else(|| "route".to_string()),
        coordinates,
        distance_meters,
        duration_seconds: input.duration_seconds,
        road_segments: input.road_segments,
        area_hints: input.area_hints,
        curves,
    })
}

pub fn parse_route(json: &str) -> Result<Route> {
    let input: RouteInput = serde_json::from_str(json).context("malformed route JSON")?;
    validate_route(input)
}

pub fn load_route(path: impl AsRef<Path>) -> Result<Route> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading route {}", path.display()))?;
    let route = parse_route(&contents).with_context(|| format!("loading route {}", path.display()))?;
    info!(
        "📂 Loaded route '{}': {} points, {:.1} km",
        route.name,
        route.coordinates.len(),
        route.distance_meters / 1000.0
    );
    Ok(route)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_route_with_geojson_geometry() {
        let json = r#"{
            "name": "ridge",
            "geometry": {"type": "LineString", "coordinates": [[-122.0, 37.0], [-122.0, 37.01], [-121.99, 37.01]]},
            "duration": 300,
            "roadSegments": [{"startMile": 0.0, "endMile": 1.0, "ref": "CA 35"}],
            "areaHints": [{"startMile": 0.0, "endMile": 0.3, "kind": "urban"}]
        }"#;
        let route = parse_route(json).unwrap();
        assert_eq!(route.name, "ridge");
        assert_eq!(route.coordinates.len(), 3);
        assert!(route.distance_meters > 1000.0);
        assert_eq!(route.duration_seconds, Some(300.0));
        assert_eq!(route.road_segments[0].road_ref, "CA 35");
        assert_eq!(route.area_hints.len(), 1);
        assert!(route.curves.is_none());
    }

    #[test]
    fn test_route_needs_two_points() {
        let err = parse_route(r#"{"coordinates": [[-122.0, 37.0]]}"#).unwrap_err();
        assert!(format!("{:#}", err).contains("at least 2"));
    }

    #[test]
    fn test_route_rejects_out_of_range_coordinates() {
        assert!(parse_route(r#"{"coordinates": [[-122.0, 37.0], [200.0, 37.0]]}"#).is_err());
        assert!(parse_route(r#"{"coordinates": {"type": "Point", "coordinates": [[0,0],[1,1]]}}"#).is_err());
    }

    #[test]
    fn test_normalize_aliased_curve() {
        let raw: RawCurveEvent = serde_json::from_str(
            r#"{
                "type": "curve",
                "totalAngle": -75.0,
                "radiusMeters": 60.0,
                "distance": 1200.0,
                "location": [-122.0, 37.0],
                "shape": "tightens"
            }"#,
        )
        .unwrap();
        let c = normalize_curve(raw).unwrap();
        assert_eq!(c.kind, CurveKind::Curve);
        assert_eq!(c.direction, Direction::Left);
        assert_eq!(c.angle, 75.0);
        assert_eq!(c.radius, 60.0);
        assert!((c.length - 60.0 * 75f64.to_radians()).abs() < 1e-9);
        assert_eq!(c.distance_from_start, 1200.0);
        assert_eq!(c.entry.distance, 1200.0);
        assert!((c.exit.distance - (1200.0 + c.length)).abs() < 1e-9);
        assert_eq!(c.modifier, Some(ShapeModifier::Tightens));
        assert_eq!(c.severity, severity_for(60.0, 75.0));
        assert_eq!(c.speeds, recommended_speeds(60.0));
    }

    #[test]
    fn test_normalize_section_with_sub_curves() {
        let raw: RawCurveEvent = serde_json::from_str(
            r#"{
                "kind": "technical_section",
                "style": "switchbacks",
                "direction": "R",
                "angle": 320.0,
                "length": 900.0,
                "distanceFromStart": 500.0,
                "entry": {"coord": [-122.0, 37.0], "distance": 500.0},
                "severity": 6,
                "zone": "technical",
                "curves": [
                    {"direction": "right", "angle": 160, "radius": 25, "distance": 500, "entry": [-122.0, 37.0]},
                    {"direction": "left", "angle": 160, "radius": 25, "distance": 900, "entry": [-122.0, 37.001]}
                ]
            }"#,
        )
        .unwrap();
        let c = normalize_curve(raw).unwrap();
        assert_eq!(c.kind, CurveKind::TechnicalSection(SectionStyle::Switchbacks));
        assert_eq!(c.direction, Direction::Right);
        assert_eq!(c.severity, 6);
        assert_eq!(c.zone, Some(ZoneCharacter::Technical));
        assert_eq!(c.sub_curves.len(), 2);
        assert_eq!(c.sub_curves[1].direction, Direction::Left);
    }

    #[test]
    fn test_unknown_shapes_rejected() {
        let base = || RawCurveEvent {
            angle: Some(40.0),
            radius: Some(100.0),
            direction: Some("left".to_string()),
            distance_from_start: Some(10.0),
            entry: Some(RawPoint::Bare(Coord::new(0.0, 0.0))),
            ..Default::default()
        };
        assert!(normalize_curve(base()).is_ok());

        let bad_kind = RawCurveEvent {
            kind: Some("roundabout".to_string()),
            ..base()
        };
        assert!(normalize_curve(bad_kind).is_err());

        let bad_dir = RawCurveEvent {
            direction: Some("up".to_string()),
            ..base()
        };
        assert!(normalize_curve(bad_dir).is_err());

        let no_geometry = RawCurveEvent {
            radius: None,
            ..base()
        };
        assert!(normalize_curve(no_geometry).is_err());

        let no_location = RawCurveEvent {
            entry: None,
            ..base()
        };
        assert!(normalize_curve(no_location).is_err());

        let bad_sub = RawCurveEvent {
            kind: Some("chicane".to_string()),
            sub_curves: vec![base(), RawCurveEvent { angle: None, ..base() }],
            ..base()
        };
        let err = normalize_curve(bad_sub).unwrap_err();
        assert!(format!("{:#}", err).contains("sub-curve 1"));
    }

    #[test]
    fn test_precomputed_curves_are_sorted() {
        let json = r#"{
            "coordinates": [[-122.0, 37.0], [-122.0, 37.03]],
            "curves": [
                {"direction": "left", "angle": 40, "length": 100, "distance": 1500, "entry": [-122.0, 37.0135]},
                {"direction": "right", "angle": 30, "length": 80, "distance": 300, "entry": [-122.0, 37.0027]}
            ]
        }"#;
        let route = parse_route(json).unwrap();
        let starts: Vec<f64> = route
            .curves
            .unwrap()
            .iter()
            .map(|c| c.distance_from_start)
            .collect();
        assert_eq!(starts, vec![300.0, 1500.0]);
    }

    #[test]
    fn test_overlapping_precomputed_curves_rejected() {
        let json = r#"{
            "coordinates": [[-122.0, 37.0], [-122.0, 37.03]],
            "curves": [
                {"direction": "left", "angle": 40, "length": 200, "distance": 300, "entry": [-122.0, 37.0027]},
                {"direction": "right", "angle": 30, "length": 80, "distance": 400, "entry": [-122.0, 37.0036]}
            ]
        }"#;
        let err = parse_route(json).unwrap_err();
        assert!(format!("{:#}", err).contains("overlaps"));

        // touching at the boundary is fine
        let touching = json.replace("\"distance\": 400", "\"distance\": 500");
        assert!(parse_route(&touching).is_ok());
    }

    #[test]
    fn test_demo_route_loads_and_classifies() {
        use crate::analysis::{detect_curves, DetectorConfig};
        use crate::zones::{classify_with_voting, ZoneConfig};

        let route = load_route(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/ridge_road.json")).unwrap();
        assert!(route.coordinates.len() > 100);
        let curves = detect_curves(&route.coordinates, &DetectorConfig::default());
        assert!(!curves.is_empty());
        let zones = classify_with_voting(
            &curves,
            route.distance_meters,
            Some(&route.area_hints),
            Some(&route.road_segments),
            &ZoneConfig::default(),
        );
        assert_eq!(zones.first().unwrap().character, ZoneCharacter::Urban);
        assert_eq!(zones.last().unwrap().character, ZoneCharacter::Urban);
        assert!(zones.iter().any(|z| z.character == ZoneCharacter::Transit));
    }
}
