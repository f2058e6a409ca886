//! Planar geometry over lon/lat coordinates.
//!
//! Rings are closed (`first == last`) and are walked edge by edge. All
//! functions are total: segments shorter than [`SEGMENT_EPSILON`] are treated
//! as points and nothing divides by a near-zero length.

use std::cmp::Ordering;

use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{BoundingRect, Coord, Line, LineString, Rect};
use itertools::Itertools;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, RTreeObject};

/// Segments shorter than this (in degrees) are treated as a single point.
pub const SEGMENT_EPSILON: f64 = 1e-12;

/// Distance (in degrees) within which a point counts as lying on an edge.
const BOUNDARY_EPSILON: f64 = 1e-12;

/// Crossing parameters closer than this are merged.
const PARAM_EPSILON: f64 = 1e-12;

fn edges(ring: &[Coord<f64>]) -> impl Iterator<Item = (Coord<f64>, Coord<f64>)> + '_ {
    ring.iter().copied().tuple_windows()
}

fn length(d: Coord<f64>) -> f64 {
    d.x.hypot(d.y)
}

/// True when `p` lies on the segment `a -> b`, within [`BOUNDARY_EPSILON`].
fn on_segment(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> bool {
    let d = b - a;
    let len = length(d);
    if len < SEGMENT_EPSILON {
        return length(p - a) <= BOUNDARY_EPSILON;
    }
    let rel = p - a;
    let cross = d.x * rel.y - d.y * rel.x;
    if cross.abs() > BOUNDARY_EPSILON * len {
        return false;
    }
    let dot = rel.x * d.x + rel.y * d.y;
    dot >= -BOUNDARY_EPSILON * len && dot <= len * len + BOUNDARY_EPSILON * len
}

/// Ray-casting containment test. Points on the boundary are inside.
pub fn point_in_polygon(point: Coord<f64>, ring: &[Coord<f64>]) -> bool {
    let mut inside = false;
    for (a, b) in edges(ring) {
        if on_segment(point, a, b) {
            return true;
        }
        if (a.y > point.y) != (b.y > point.y) {
            // a.y != b.y here, so the division is safe
            let x_cross = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if point.x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

/// True if the segment crosses or touches any boundary edge, or either
/// endpoint is inside the ring.
pub fn segment_intersects_polygon(a: Coord<f64>, b: Coord<f64>, ring: &[Coord<f64>]) -> bool {
    if point_in_polygon(a, ring) || point_in_polygon(b, ring) {
        return true;
    }
    let segment = Line::new(a, b);
    edges(ring).any(|(p, q)| line_intersection(segment, Line::new(p, q)).is_some())
}

/// Share of the segment `a -> b` that lies inside the ring, in `[0, 1]`.
///
/// Every boundary crossing is projected onto the segment as a parameter
/// `t in [0, 1]`. The parameters split the segment into sub-intervals and an
/// interval counts as inside when its midpoint is. This handles non-convex
/// rings that the segment enters and leaves several times.
pub fn fraction_of_segment_inside_polygon(
    a: Coord<f64>,
    b: Coord<f64>,
    ring: &[Coord<f64>],
) -> f64 {
    let d = b - a;
    let len_sq = d.x * d.x + d.y * d.y;
    if len_sq.sqrt() < SEGMENT_EPSILON {
        return if point_in_polygon(a, ring) { 1.0 } else { 0.0 };
    }

    let param = |c: Coord<f64>| {
        let rel = c - a;
        ((rel.x * d.x + rel.y * d.y) / len_sq).clamp(0.0, 1.0)
    };

    let segment = Line::new(a, b);
    let mut params = vec![0.0, 1.0];
    for (p, q) in edges(ring) {
        match line_intersection(segment, Line::new(p, q)) {
            Some(LineIntersection::SinglePoint { intersection, .. }) => {
                params.push(param(intersection));
            }
            Some(LineIntersection::Collinear { intersection }) => {
                params.push(param(intersection.start));
                params.push(param(intersection.end));
            }
            None => {}
        }
    }
    // a ring vertex within tolerance of the segment bounds the stretch that
    // hugs an edge, even when the exact intersection test misses it
    for &v in ring {
        if on_segment(v, a, b) {
            params.push(param(v));
        }
    }

    params.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));
    params.dedup_by(|later, kept| (*later - *kept).abs() < PARAM_EPSILON);

    let inside: f64 = params
        .iter()
        .tuple_windows()
        .filter(|&(t0, t1)| {
            let mid = (t0 + t1) / 2.0;
            point_in_polygon(a + d * mid, ring)
        })
        .map(|(t0, t1)| t1 - t0)
        .sum();

    inside.clamp(0.0, 1.0)
}

/// Axis-aligned bounds of a coordinate sequence.
pub fn bounding_box(coords: &[Coord<f64>]) -> Option<Rect<f64>> {
    LineString::new(coords.to_vec()).bounding_rect()
}

/// Axis-aligned bounds of a single segment.
pub fn segment_box(a: Coord<f64>, b: Coord<f64>) -> Rect<f64> {
    Rect::new(a, b)
}

/// Lowest index pair of non-adjacent ring edges that cross or touch.
///
/// Edge boxes go into an R-tree so only edges with overlapping bounds are
/// tested against each other.
pub(crate) fn first_self_intersection(ring: &[Coord<f64>]) -> Option<(usize, usize)> {
    let lines: Vec<Line<f64>> = edges(ring).map(|(p, q)| Line::new(p, q)).collect();
    let n = lines.len();
    let envelope = |l: &Line<f64>| {
        let r = Rect::new(l.start, l.end);
        Rectangle::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y])
    };
    let tree = RTree::bulk_load(
        lines
            .iter()
            .enumerate()
            .map(|(i, l)| GeomWithData::new(envelope(l), i))
            .collect(),
    );

    let mut first: Option<(usize, usize)> = None;
    for (i, line) in lines.iter().enumerate() {
        let bounds = envelope(line).envelope();
        for entry in tree.locate_in_envelope_intersecting(&bounds) {
            let j = entry.data;
            // neighbours share a vertex; so do the first and last edge
            if j < i + 2 || (i == 0 && j == n - 1) {
                continue;
            }
            if line_intersection(*line, lines[j]).is_some() && first.is_none_or(|f| (i, j) < f) {
                first = Some((i, j));
            }
        }
    }
    first
}
