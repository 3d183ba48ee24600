// src/zones/signals.rs
//
// Per-window scoring. Each signal votes independently with its configured
// weight; nothing here decides the final character.

use super::ZoneConfig;
use crate::types::{AreaHint, AreaKind, CurveEvent, RoadClass, RoadSegment, ZoneCharacter, ZoneScore};

/// A curve as seen by the classifier: position and geometry only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoteCurve {
    pub mile: f64,
    pub angle: f64,
    pub radius: f64,
}

/// Flatten chicanes and sections into their sub-curves, keep curves of at
/// least `min_angle`, sorted by position.
pub fn vote_curves(events: &[CurveEvent], min_angle: f64) -> Vec<VoteCurve> {
    fn collect(events: &[CurveEvent], min_angle: f64, out: &mut Vec<VoteCurve>) {
        for e in events {
            if e.sub_curves.is_empty() {
                if e.angle >= min_angle {
                    out.push(VoteCurve {
                        mile: e.mile(),
                        angle: e.angle,
                        radius: e.radius,
                    });
                }
            } else {
                collect(&e.sub_curves, min_angle, out);
            }
        }
    }

    let mut out = Vec::new();
    collect(events, min_angle, &mut out);
    out.sort_by(|a, b| a.mile.partial_cmp(&b.mile).unwrap_or(std::cmp::Ordering::Equal));
    out
}

/// Everything a window needs to score itself.
pub struct VoteContext<'a> {
    pub curves: &'a [VoteCurve],
    pub total_miles: f64,
    pub area_hints: &'a [AreaHint],
    pub road_hints: &'a [RoadSegment],
    pub cfg: &'a ZoneConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowVote {
    pub score: ZoneScore,
    pub reasons: Vec<String>,
    pub character: ZoneCharacter,
}

impl<'a> VoteContext<'a> {
    fn curves_between(&self, from: f64, to: f64) -> Vec<&VoteCurve> {
        self.curves
            .iter()
            .filter(|c| c.mile >= from && c.mile < to)
            .collect()
    }

    fn curves_around(&self, mid: f64, span: f64) -> Vec<&VoteCurve> {
        let half = span / 2.0;
        self.curves_between((mid - half).max(0.0), (mid + half).min(self.total_miles) + 1e-9)
    }

    /// Length of the curve-free stretch containing `mile`, bounded by the
    /// route ends.
    fn gap_around(&self, mile: f64) -> f64 {
        let prev = self
            .curves
            .iter()
            .rev()
            .find(|c| c.mile <= mile)
            .map(|c| c.mile)
            .unwrap_or(0.0);
        let next = self
            .curves
            .iter()
            .find(|c| c.mile > mile)
            .map(|c| c.mile)
            .unwrap_or(self.total_miles);
        next - prev
    }

    fn area_at(&self, mile: f64) -> Option<AreaKind> {
        self.area_hints.iter().find(|h| h.covers(mile)).map(|h| h.kind)
    }

    fn road_at(&self, mile: f64) -> Option<&RoadSegment> {
        self.road_hints.iter().find(|r| r.covers(mile))
    }

    fn near_edge(&self, mile: f64) -> bool {
        mile <= self.cfg.urban_edge_miles || mile >= self.total_miles - self.cfg.urban_edge_miles
    }

    /// Score the analysis window `[from, to]`.
    pub fn score_window(&self, from: f64, to: f64) -> WindowVote {
        let w = &self.cfg.weights;
        let t = &self.cfg.thresholds;
        let mid = (from + to) / 2.0;

        let mut score = ZoneScore::default();
        let mut reasons = Vec::new();

        let local = self.curves_between(from, to + 1e-9);
        let local_avg = mean_angle(&local);

        // technical
        if local.len() >= t.cluster_min_curves && local_avg >= t.cluster_min_avg_angle {
            score.technical += w.cluster;
            reasons.push("curve cluster".to_string());
        }

        let sustained = self.curves_around(mid, t.sustained_span_miles);
        if sustained.len() >= t.sustained_min_curves
            && mean_angle(&sustained) >= t.sustained_min_avg_angle
        {
            score.technical += w.sustained;
            reasons.push("sustained curves".to_string());
        }

        if local.iter().any(|c| c.angle >= t.danger_angle) {
            score.technical += w.danger;
            reasons.push("danger curve".to_string());
        }

        if local.len() >= t.high_avg_min_curves && local_avg >= t.high_avg_angle {
            score.technical += w.high_avg_angle;
            reasons.push("high average angle".to_string());
        }

        if local.iter().filter(|c| c.radius < t.tight_radius_m).count() >= t.tight_min_curves {
            score.technical += w.tight_radius;
            reasons.push("multiple tight curves".to_string());
        }

        let road = self.road_at(mid);
        if let Some(r) = road.filter(|r| r.class() == RoadClass::Local) {
            score.technical += w.local_road;
            reasons.push(labelled("local road", &r.road_ref));
        }

        // transit
        let gap = self.gap_around(mid);
        if gap >= t.long_gap_miles {
            score.transit += w.long_gap;
            reasons.push("long curve-free stretch".to_string());
        }

        if self.curves_around(mid, t.sparse_span_miles).len() < t.sparse_max_curves {
            score.transit += w.sparse;
            reasons.push("sparse curves".to_string());
        }

        let area = self.area_at(mid);
        if area == Some(AreaKind::Rural) {
            score.transit += w.rural;
            reasons.push("rural area".to_string());
        }

        if let Some(r) = road.filter(|r| r.class().is_highway()) {
            score.transit += w.highway;
            reasons.push(labelled("highway", &r.road_ref));
        }

        // urban, edges only
        if area == Some(AreaKind::Urban) && self.near_edge(mid) {
            score.urban += w.urban;
            reasons.push("urban area".to_string());
        }

        WindowVote {
            character: decide(&score),
            score,
            reasons,
        }
    }
}

fn mean_angle(curves: &[&VoteCurve]) -> f64 {
    if curves.is_empty() {
        0.0
    } else {
        curves.iter().map(|c| c.angle).sum::<f64>() / curves.len() as f64
    }
}

fn labelled(label: &str, road_ref: &str) -> String {
    if road_ref.is_empty() {
        label.to_string()
    } else {
        format!("{} ({})", label, road_ref)
    }
}

/// Urban needs a positive score at least as high as technical; technical
/// must beat transit outright. Ties and silence fall back to transit.
pub fn decide(score: &ZoneScore) -> ZoneCharacter {
    if score.urban > 0.0 && score.urban >= score.technical {
        ZoneCharacter::Urban
    } else if score.technical > score.transit {
        ZoneCharacter::Technical
    } else {
        ZoneCharacter::Transit
    }
}
