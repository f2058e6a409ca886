use serde::Serialize;

use crate::geometry::{self, SEGMENT_EPSILON};
use crate::route::{CandidateRoute, segment_meters};
use crate::safety::{HazardIndex, Severity};

/// How much of a route runs through one zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneExposure {
    pub zone_id: String,
    pub severity: Severity,
    /// Route length inside the zone.
    pub meters: f64,
    /// `meters * weight`, this zone's share of the risk score.
    pub contribution: f64,
}

/// Unnormalized risk of a route plus the per-zone breakdown behind it.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub score: f64,
    /// Length inside hazard zones, counted once per overlapping zone.
    pub exposed_meters: f64,
    /// Zones in the order the route first enters them.
    pub zones: Vec<ZoneExposure>,
}

/// Walks the route segment by segment and sums
/// `segment length * fraction inside * zone weight` over every zone the
/// segment passes through. Overlapping zones all contribute.
pub fn assess(route: &CandidateRoute, index: &HazardIndex) -> RiskAssessment {
    let mut assessment = RiskAssessment::default();
    if route.path.is_degenerate() || index.is_empty() {
        return assessment;
    }

    for (a, b) in route.path.segments() {
        let d = b - a;
        if d.x.hypot(d.y) < SEGMENT_EPSILON {
            continue;
        }
        let mut seg_len = None;
        for candidate in index.candidate_zones_for(geometry::segment_box(a, b)) {
            let ring = candidate.zone.boundary();
            if !geometry::segment_intersects_polygon(a, b, ring) {
                continue;
            }
            let fraction = geometry::fraction_of_segment_inside_polygon(a, b, ring);
            if fraction <= 0.0 {
                continue;
            }
            let meters = *seg_len.get_or_insert_with(|| segment_meters(a, b)) * fraction;
            let contribution = meters * candidate.weight;

            assessment.score += contribution;
            assessment.exposed_meters += meters;
            match assessment
                .zones
                .iter_mut()
                .find(|z| z.zone_id == candidate.zone.id)
            {
                Some(exposure) => {
                    exposure.meters += meters;
                    exposure.contribution += contribution;
                }
                None => assessment.zones.push(ZoneExposure {
                    zone_id: candidate.zone.id.clone(),
                    severity: candidate.zone.severity,
                    meters,
                    contribution,
                }),
            }
        }
    }

    assessment
}

/// Risk score alone; `0.0` when the route touches no zone.
pub fn score(route: &CandidateRoute, index: &HazardIndex) -> f64 {
    assess(route, index).score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Polyline;
    use crate::safety::{HazardZone, SeverityWeights};
    use approx::assert_relative_eq;
    use geo::coord;

    fn meters_per_degree() -> f64 {
        segment_meters(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 0.0 })
    }

    fn band(id: &str, lon_min: f64, lon_max: f64, severity: Severity) -> HazardZone {
        HazardZone::new(
            id,
            vec![
                coord! { x: lon_min, y: -0.01 },
                coord! { x: lon_max, y: -0.01 },
                coord! { x: lon_max, y: 0.01 },
                coord! { x: lon_min, y: 0.01 },
                coord! { x: lon_min, y: -0.01 },
            ],
            severity,
        )
    }

    fn equator_route(id: &str, lon_end: f64) -> CandidateRoute {
        CandidateRoute::new(
            id,
            Polyline::from(vec![[0.0, 0.0], [lon_end / 2.0, 0.0], [lon_end, 0.0]]),
            600.0,
            lon_end * meters_per_degree(),
        )
    }

    fn index(zones: Vec<HazardZone>) -> HazardIndex {
        HazardIndex::build(zones, SeverityWeights::default())
    }

    #[test]
    fn untouched_route_scores_exactly_zero() {
        let idx = index(vec![band("z", 1.0, 2.0, Severity::High)]);
        let a = assess(&equator_route("r", 0.5), &idx);
        assert_eq!(a.score, 0.0);
        assert!(a.zones.is_empty());
    }

    #[test]
    fn crossing_accumulates_length_times_weight() {
        let width = 300.0 / meters_per_degree();
        let idx = index(vec![band("z", 0.01, 0.01 + width, Severity::High)]);
        let a = assess(&equator_route("b", 5200.0 / meters_per_degree()), &idx);

        assert_relative_eq!(a.score, 50.0 * 300.0, max_relative = 1e-6);
        assert_relative_eq!(a.exposed_meters, 300.0, max_relative = 1e-6);
        assert_eq!(a.zones.len(), 1);
        assert_eq!(a.zones[0].zone_id, "z");
    }

    #[test]
    fn zone_split_across_segments_is_merged_in_breakdown() {
        // the middle vertex of the route sits inside the zone
        let end = 0.04;
        let idx = index(vec![band("z", 0.015, 0.025, Severity::Low)]);
        let a = assess(&equator_route("r", end), &idx);
        let expected = 0.01 * meters_per_degree();

        assert_eq!(a.zones.len(), 1);
        assert_relative_eq!(a.zones[0].meters, expected, max_relative = 1e-9);
        assert_relative_eq!(a.score, expected * 5.0, max_relative = 1e-9);
    }

    #[test]
    fn overlapping_zones_are_additive() {
        let single = index(vec![band("m1", 0.01, 0.02, Severity::Medium)]);
        let stacked = index(vec![
            band("m1", 0.01, 0.02, Severity::Medium),
            band("m2", 0.01, 0.02, Severity::Medium),
        ]);
        let route = equator_route("r", 0.03);

        let one = score(&route, &single);
        let two = score(&route, &stacked);
        assert_relative_eq!(two, 2.0 * one, max_relative = 1e-12);
        assert_eq!(assess(&route, &stacked).zones.len(), 2);
    }

    #[test]
    fn high_severity_outscores_low_on_same_boundary() {
        let route = equator_route("r", 0.03);
        let high = score(&route, &index(vec![band("z", 0.01, 0.02, Severity::High)]));
        let low = score(&route, &index(vec![band("z", 0.01, 0.02, Severity::Low)]));
        assert!(high > low);
    }

    #[test]
    fn score_grows_with_exposure() {
        let route = equator_route("r", 0.05);
        let mut last = 0.0;
        for width in [0.0_f64, 0.005, 0.01, 0.02, 0.04] {
            let idx = index(vec![band("z", 0.005, 0.005 + width.max(1e-6), Severity::Medium)]);
            let s = score(&route, &idx);
            assert!(s >= last, "width {width}: {s} < {last}");
            last = s;
        }
    }

    #[test]
    fn degenerate_route_scores_zero() {
        let idx = index(vec![band("z", -1.0, 1.0, Severity::High)]);
        let route = CandidateRoute::new("p", Polyline::from(vec![[0.0, 0.0]]), 0.0, 0.0);
        assert_eq!(score(&route, &idx), 0.0);
    }

    #[test]
    fn scoring_is_repeatable() {
        let idx = index(vec![
            band("a", 0.01, 0.02, Severity::High),
            band("b", 0.015, 0.03, Severity::Low),
        ]);
        let route = equator_route("r", 0.04);
        assert_eq!(assess(&route, &idx), assess(&route, &idx));
    }
}
