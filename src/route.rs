use geo::prelude::*;
use geo::{Coord, Point};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::RouteError;

/// An ordered path of lon/lat coordinates with no repeated consecutive points.
///
/// Fewer than two points is allowed: such a polyline is degenerate and has no
/// segments to score.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<[f64; 2]>", into = "Vec<[f64; 2]>")]
pub struct Polyline {
    points: Vec<Coord<f64>>,
}

impl Polyline {
    pub fn new(points: impl IntoIterator<Item = Coord<f64>>) -> Self {
        let mut points: Vec<Coord<f64>> = points.into_iter().collect();
        points.dedup();
        Self { points }
    }

    pub fn points(&self) -> &[Coord<f64>] {
        &self.points
    }

    pub fn is_degenerate(&self) -> bool {
        self.points.len() < 2
    }

    pub fn segments(&self) -> impl Iterator<Item = (Coord<f64>, Coord<f64>)> + '_ {
        self.points.iter().copied().tuple_windows()
    }

    /// Great-circle length in meters.
    pub fn length_meters(&self) -> f64 {
        self.segments().map(|(a, b)| segment_meters(a, b)).sum()
    }
}

impl From<Vec<[f64; 2]>> for Polyline {
    fn from(raw: Vec<[f64; 2]>) -> Self {
        Polyline::new(raw.into_iter().map(|[lon, lat]| Coord { x: lon, y: lat }))
    }
}

impl From<Polyline> for Vec<[f64; 2]> {
    fn from(line: Polyline) -> Self {
        line.points.into_iter().map(|c| [c.x, c.y]).collect()
    }
}

/// Haversine distance between two lon/lat coordinates, in meters.
pub fn segment_meters(a: Coord<f64>, b: Coord<f64>) -> f64 {
    Point::from(a).haversine_distance(&Point::from(b))
}

/// One alternative path supplied by the directions provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRoute {
    pub id: String,
    pub path: Polyline,
    pub duration_seconds: f64,
    pub distance_meters: f64,
}

impl CandidateRoute {
    pub fn new(
        id: impl Into<String>,
        path: Polyline,
        duration_seconds: f64,
        distance_meters: f64,
    ) -> Self {
        Self {
            id: id.into(),
            path,
            duration_seconds,
            distance_meters,
        }
    }

    /// Rejects non-finite or negative measures and non-finite coordinates.
    pub fn validate(&self) -> Result<(), RouteError> {
        for (field, value) in [
            ("durationSeconds", self.duration_seconds),
            ("distanceMeters", self.distance_meters),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RouteError::InvalidMeasure {
                    id: self.id.clone(),
                    field,
                    value,
                });
            }
        }
        if let Some(index) = self
            .path
            .points()
            .iter()
            .position(|c| !c.x.is_finite() || !c.y.is_finite())
        {
            return Err(RouteError::NonFiniteCoordinate {
                id: self.id.clone(),
                index,
            });
        }
        Ok(())
    }
}

/// Validates a batch and checks that ids are unique.
pub fn validate_batch(routes: &[CandidateRoute]) -> Result<(), RouteError> {
    for route in routes {
        route.validate()?;
    }
    if let Some(dup) = routes.iter().map(|r| r.id.as_str()).duplicates().next() {
        return Err(RouteError::DuplicateId(dup.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    #[test]
    fn construction_drops_repeated_points() {
        let line = Polyline::new([
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 1.0, y: 0.0 },
            coord! { x: 1.0, y: 0.0 },
            coord! { x: 0.0, y: 0.0 },
        ]);
        assert_eq!(line.points().len(), 3);
        assert_eq!(line.segments().count(), 2);
    }

    #[test]
    fn single_point_is_degenerate() {
        let line = Polyline::from(vec![[13.4, 52.5], [13.4, 52.5]]);
        assert!(line.is_degenerate());
        assert_eq!(line.segments().count(), 0);
        assert_eq!(line.length_meters(), 0.0);
    }

    #[test]
    fn length_uses_great_circle_distance() {
        // one degree of latitude is roughly 111 km
        let line = Polyline::from(vec![[0.0, 0.0], [0.0, 1.0]]);
        let len = line.length_meters();
        assert!((len - 111_195.0).abs() < 100.0, "got {len}");
    }

    #[test]
    fn validate_rejects_negative_duration_and_nan_points() {
        let bad = CandidateRoute::new("a", Polyline::from(vec![[0.0, 0.0], [1.0, 1.0]]), -1.0, 10.0);
        assert!(matches!(
            bad.validate(),
            Err(RouteError::InvalidMeasure { field: "durationSeconds", .. })
        ));

        let nan = CandidateRoute::new("b", Polyline::from(vec![[0.0, 0.0], [f64::NAN, 1.0]]), 1.0, 1.0);
        assert_eq!(
            nan.validate(),
            Err(RouteError::NonFiniteCoordinate { id: "b".into(), index: 1 })
        );
    }

    #[test]
    fn validate_batch_rejects_duplicate_ids() {
        let path = Polyline::from(vec![[0.0, 0.0], [1.0, 1.0]]);
        let routes = vec![
            CandidateRoute::new("x", path.clone(), 1.0, 1.0),
            CandidateRoute::new("x", path, 2.0, 2.0),
        ];
        assert_eq!(validate_batch(&routes), Err(RouteError::DuplicateId("x".into())));
    }
}
