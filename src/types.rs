// src/types.rs
//
// Shared data model for the route analysis pipeline.

use serde::{Deserialize, Serialize};

pub const METERS_PER_MILE: f64 = 1609.344;
pub const MPS_PER_MPH: f64 = 0.44704;

// ============================================================================
// GEOMETRY
// ============================================================================

/// Longitude/latitude pair in degrees. Serialized as `[lng, lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coord {
    pub lng: f64,
    pub lat: f64,
}

impl Coord {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

impl From<[f64; 2]> for Coord {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<Coord> for [f64; 2] {
    fn from(c: Coord) -> Self {
        [c.lng, c.lat]
    }
}

/// A resampled route vertex with its arc-length position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePoint {
    pub coord: Coord,
    pub cumulative_distance: f64,
}

// ============================================================================
// CURVES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    /// Positive heading change is clockwise, i.e. a right-hander.
    pub fn from_heading_change(change_deg: f64) -> Self {
        if change_deg >= 0.0 {
            Direction::Right
        } else {
            Direction::Left
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShapeModifier {
    Tightens,
    Opens,
    Hairpin,
    Sharp,
    Long,
}

impl ShapeModifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeModifier::Tightens => "TIGHTENS",
            ShapeModifier::Opens => "OPENS",
            ShapeModifier::Hairpin => "HAIRPIN",
            ShapeModifier::Sharp => "SHARP",
            ShapeModifier::Long => "LONG",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionStyle {
    Switchbacks,
    Sweeping,
    Technical,
    Windy,
}

impl SectionStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionStyle::Switchbacks => "switchbacks",
            SectionStyle::Sweeping => "sweeping",
            SectionStyle::Technical => "technical",
            SectionStyle::Windy => "windy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "style")]
pub enum CurveKind {
    Curve,
    Chicane,
    TechnicalSection(SectionStyle),
}

/// Recommended speeds in mph for three driving styles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedRecommendation {
    pub cruise: f64,
    pub fast: f64,
    pub race: f64,
}

impl SpeedRecommendation {
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            cruise: self.cruise * factor,
            fast: self.fast * factor,
            race: self.race * factor,
        }
    }

    /// Component-wise minimum (the hardest of two recommendations).
    pub fn min(&self, other: &Self) -> Self {
        Self {
            cruise: self.cruise.min(other.cruise),
            fast: self.fast.min(other.fast),
            race: self.race.min(other.race),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub coord: Coord,
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveEvent {
    pub kind: CurveKind,
    pub direction: Direction,
    /// 1 (gentle) ..= 6 (hairpin)
    pub severity: u8,
    pub angle: f64,
    pub length: f64,
    pub radius: f64,
    pub modifier: Option<ShapeModifier>,
    pub entry: CurvePoint,
    pub apex: CurvePoint,
    pub exit: CurvePoint,
    pub distance_from_start: f64,
    pub speeds: SpeedRecommendation,
    /// Signed per-vertex heading changes (deg) across the curve body.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segment_changes: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_curves: Vec<CurveEvent>,
    #[serde(default)]
    pub zone: Option<ZoneCharacter>,
}

impl CurveEvent {
    pub fn is_chicane(&self) -> bool {
        self.kind == CurveKind::Chicane
    }

    pub fn is_technical_section(&self) -> bool {
        matches!(self.kind, CurveKind::TechnicalSection(_))
    }

    pub fn is_plain(&self) -> bool {
        self.kind == CurveKind::Curve
    }

    pub fn mile(&self) -> f64 {
        self.distance_from_start / METERS_PER_MILE
    }
}

// ============================================================================
// ZONES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneCharacter {
    Transit,
    Technical,
    Urban,
}

impl ZoneCharacter {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneCharacter::Transit => "transit",
            ZoneCharacter::Technical => "technical",
            ZoneCharacter::Urban => "urban",
        }
    }
}

impl std::fmt::Display for ZoneCharacter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneScore {
    pub technical: f64,
    pub transit: f64,
    pub urban: f64,
}

impl ZoneScore {
    pub fn add(&mut self, other: &ZoneScore) {
        self.technical += other.technical;
        self.transit += other.transit;
        self.urban += other.urban;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub start_mile: f64,
    pub end_mile: f64,
    pub character: ZoneCharacter,
    pub score: ZoneScore,
    pub reasons: Vec<String>,
}

impl Zone {
    pub fn length_miles(&self) -> f64 {
        self.end_mile - self.start_mile
    }

    pub fn contains_mile(&self, mile: f64) -> bool {
        mile >= self.start_mile && mile < self.end_mile
    }
}

// ============================================================================
// EXTERNAL HINTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadClass {
    Interstate,
    UsHighway,
    StateHighway,
    Local,
    Unknown,
}

impl RoadClass {
    /// Derive a class from a route shield such as `I-80`, `US 101` or `CA 1`.
    /// A prefix only counts when a route number follows it, so street names
    /// like `Usher Rd` or `El Camino Real` stay local.
    pub fn from_ref(road_ref: &str) -> Self {
        let r = road_ref.trim().to_uppercase();
        if r.is_empty() {
            return RoadClass::Unknown;
        }
        let shield = |prefix: &str| r.strip_prefix(prefix).map_or(false, numbered);
        if shield("I") || shield("INTERSTATE") {
            RoadClass::Interstate
        } else if shield("US") {
            RoadClass::UsHighway
        } else if shield("SR") || shield("STATE ROUTE") || shield("STATE HIGHWAY") || state_shield(&r) {
            RoadClass::StateHighway
        } else {
            RoadClass::Local
        }
    }

    pub fn is_highway(&self) -> bool {
        matches!(self, RoadClass::Interstate | RoadClass::UsHighway)
    }
}

/// `rest` is a route number, optionally after one space or hyphen.
fn numbered(rest: &str) -> bool {
    let rest = rest
        .strip_prefix(|c: char| c == ' ' || c == '-')
        .unwrap_or(rest);
    rest.starts_with(|c: char| c.is_ascii_digit())
}

/// Two-letter state code followed by a number: `CA 1`, `NY-17`, `TX71`.
fn state_shield(r: &str) -> bool {
    let mut chars = r.chars();
    let code = chars.by_ref().take(2).filter(|c| c.is_ascii_alphabetic()).count() == 2;
    code && numbered(chars.as_str())
}

/// Per-step road reference reported by a directions provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadSegment {
    pub start_mile: f64,
    pub end_mile: f64,
    #[serde(rename = "ref", default)]
    pub road_ref: String,
    #[serde(default)]
    pub road_class: Option<RoadClass>,
}

impl RoadSegment {
    pub fn class(&self) -> RoadClass {
        self.road_class
            .unwrap_or_else(|| RoadClass::from_ref(&self.road_ref))
    }

    pub fn covers(&self, mile: f64) -> bool {
        mile >= self.start_mile && mile <= self.end_mile
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaKind {
    Urban,
    Rural,
}

/// Urban/rural hint, typically from census tract density.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaHint {
    pub start_mile: f64,
    pub end_mile: f64,
    pub kind: AreaKind,
}

impl AreaHint {
    pub fn covers(&self, mile: f64) -> bool {
        mile >= self.start_mile && mile <= self.end_mile
    }
}

// ============================================================================
// LIVE POSITION
// ============================================================================

/// A position reading shaped like a native geolocation fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsFix {
    pub lat: f64,
    pub lng: f64,
    /// m/s
    pub speed: f64,
    /// degrees clockwise from north
    pub heading: f64,
    /// meters
    pub accuracy: f64,
    pub timestamp_ms: f64,
}

impl GpsFix {
    pub fn coord(&self) -> Coord {
        Coord::new(self.lng, self.lat)
    }

    pub fn speed_mph(&self) -> f64 {
        self.speed / MPS_PER_MPH
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub distance: f64,
    pub dist_from_route: f64,
}
