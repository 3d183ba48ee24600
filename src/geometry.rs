// src/geometry.rs
//
// Spherical helpers for route polylines. Distances in meters, angles in
// degrees, bearings clockwise from north in [0, 360).

use crate::types::{Coord, RoutePoint};

const EARTH_RADIUS_M: f64 = 6_371_008.8;
const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Great-circle distance between two coordinates.
pub fn haversine(a: Coord, b: Coord) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = lat2 - lat1;
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Initial bearing from `a` to `b`.
pub fn bearing(a: Coord, b: Coord) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Signed change from one heading to the next, normalized to (-180, 180].
/// Positive is clockwise (a right turn).
pub fn heading_change(from: f64, to: f64) -> f64 {
    let mut d = (to - from) % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d <= -180.0 {
        d += 360.0;
    }
    d
}

/// Linear interpolation in lng/lat space. Adequate for the few-meter spans
/// used by resampling.
pub fn interpolate(a: Coord, b: Coord, t: f64) -> Coord {
    Coord::new(a.lng + (b.lng - a.lng) * t, a.lat + (b.lat - a.lat) * t)
}

/// Cumulative arc length at every vertex (first entry is 0).
pub fn cumulative_distances(coords: &[Coord]) -> Vec<f64> {
    let mut out = Vec::with_capacity(coords.len());
    let mut total = 0.0;
    for (i, c) in coords.iter().enumerate() {
        if i > 0 {
            total += haversine(coords[i - 1], *c);
        }
        out.push(total);
    }
    out
}

/// Resample a polyline at a fixed arc-length interval.
///
/// Points are placed every `interval` meters along the original segments.
/// The final vertex is appended unless it lies within a quarter interval of
/// the last mark, which would produce a degenerate heading. Zero-length
/// segments are skipped.
pub fn resample(coords: &[Coord], interval: f64) -> Vec<RoutePoint> {
    if coords.is_empty() || interval <= 0.0 {
        return Vec::new();
    }

    let mut out = vec![RoutePoint {
        coord: coords[0],
        cumulative_distance: 0.0,
    }];

    // distance travelled along the original polyline
    let mut travelled = 0.0;
    let mut next_mark = interval;

    for pair in coords.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let seg_len = haversine(a, b);
        if seg_len <= f64::EPSILON {
            continue;
        }

        while next_mark <= travelled + seg_len {
            let t = (next_mark - travelled) / seg_len;
            out.push(RoutePoint {
                coord: interpolate(a, b, t),
                cumulative_distance: next_mark,
            });
            next_mark += interval;
        }
        travelled += seg_len;
    }

    // Keep the tail unless it coincides with the last emitted mark.
    if let Some(last) = coords.last() {
        let tail_gap = travelled - out.last().map(|p| p.cumulative_distance).unwrap_or(0.0);
        if tail_gap > interval * 0.25 {
            out.push(RoutePoint {
                coord: *last,
                cumulative_distance: travelled,
            });
        }
    }

    out
}

/// Project `p` onto segment `a`-`b` in a local equirectangular frame centred
/// on `p`. Returns the clamped segment parameter and the perpendicular
/// distance in meters.
pub fn project_onto_segment(p: Coord, a: Coord, b: Coord) -> (f64, f64) {
    project_onto_segment_clamped(p, a, b, 0.0, 1.0)
}

/// Same as [`project_onto_segment`] with the parameter clamped to
/// `[t_min, t_max]` instead of `[0, 1]`.
pub fn project_onto_segment_clamped(
    p: Coord,
    a: Coord,
    b: Coord,
    t_min: f64,
    t_max: f64,
) -> (f64, f64) {
    let cos_lat = p.lat.to_radians().cos();
    let to_local = |c: Coord| {
        (
            (c.lng - p.lng) * cos_lat * METERS_PER_DEGREE_LAT,
            (c.lat - p.lat) * METERS_PER_DEGREE_LAT,
        )
    };
    let (ax, ay) = to_local(a);
    let (bx, by) = to_local(b);
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;

    let raw_t = if len_sq <= f64::EPSILON {
        0.0
    } else {
        // point is the local origin
        (-(ax * dx) - (ay * dy)) / len_sq
    };
    let t = raw_t.clamp(t_min, t_max);
    let (qx, qy) = (ax + t * dx, ay + t * dy);
    (t, (qx * qx + qy * qy).sqrt())
}

/// Coordinate and heading at `distance` along a polyline with precomputed
/// cumulative distances. Clamps to the route ends.
pub fn point_at_distance(coords: &[Coord], cumulative: &[f64], distance: f64) -> (Coord, f64) {
    if coords.is_empty() {
        return (Coord::new(0.0, 0.0), 0.0);
    }
    if coords.len() == 1 || cumulative.len() != coords.len() {
        return (coords[0], 0.0);
    }

    let last = coords.len() - 1;
    let d = distance.clamp(0.0, cumulative[last]);
    // first vertex strictly beyond d
    let idx = cumulative.partition_point(|&c| c <= d).clamp(1, last);
    let (a, b) = (coords[idx - 1], coords[idx]);
    let seg_len = cumulative[idx] - cumulative[idx - 1];
    let t = if seg_len > f64::EPSILON {
        (d - cumulative[idx - 1]) / seg_len
    } else {
        0.0
    };
    (interpolate(a, b, t), bearing(a, b))
}

/// Offset a coordinate by east/north meters.
pub fn offset_meters(c: Coord, east: f64, north: f64) -> Coord {
    let cos_lat = c.lat.to_radians().cos().max(1e-6);
    Coord::new(
        c.lng + east / (METERS_PER_DEGREE_LAT * cos_lat),
        c.lat + north / METERS_PER_DEGREE_LAT,
    )
}

/// Destination reached travelling `distance` meters on `bearing_deg` from
/// `origin` (flat-earth approximation, fine for route-building scales).
pub fn destination(origin: Coord, bearing_deg: f64, distance: f64) -> Coord {
    let b = bearing_deg.to_radians();
    offset_meters(origin, distance * b.sin(), distance * b.cos())
}
