use std::cmp::Ordering;

use itertools::Itertools;
use serde::Serialize;
use tracing::debug;

use crate::error::EngineError;
use crate::route::CandidateRoute;
use crate::scoring::RiskAssessment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteRole {
    Fastest,
    Safest,
    Standard,
}

/// A route that has been scored but not yet classified.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessedRoute {
    pub route: CandidateRoute,
    pub risk: RiskAssessment,
}

impl AssessedRoute {
    pub fn risk_score(&self) -> f64 {
        self.risk.score
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRoute {
    pub route: CandidateRoute,
    pub risk: RiskAssessment,
    pub role: RouteRole,
}

impl ScoredRoute {
    pub fn risk_score(&self) -> f64 {
        self.risk.score
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn by_speed(a: &AssessedRoute, b: &AssessedRoute) -> Ordering {
    cmp_f64(a.route.duration_seconds, b.route.duration_seconds)
        .then_with(|| cmp_f64(a.risk_score(), b.risk_score()))
        .then_with(|| cmp_f64(a.route.distance_meters, b.route.distance_meters))
}

fn by_safety(a: &AssessedRoute, b: &AssessedRoute) -> Ordering {
    cmp_f64(a.risk_score(), b.risk_score())
        .then_with(|| cmp_f64(a.route.duration_seconds, b.route.duration_seconds))
        .then_with(|| cmp_f64(a.route.distance_meters, b.route.distance_meters))
}

/// Assigns exactly one role per route, keeping input order.
///
/// The fastest route is the minimum by duration, then risk, then distance;
/// the safest by risk, then duration, then distance. Remaining ties go to the
/// earlier route. When one route is both, it is labelled `Safest` only.
pub fn classify(routes: Vec<AssessedRoute>) -> Result<Vec<ScoredRoute>, EngineError> {
    // position_min_by keeps the first of equal minima
    let fastest = routes
        .iter()
        .position_min_by(|a, b| by_speed(a, b))
        .ok_or(EngineError::NoRoutesAvailable)?;
    let safest = routes
        .iter()
        .position_min_by(|a, b| by_safety(a, b))
        .ok_or(EngineError::NoRoutesAvailable)?;

    debug!(
        fastest = %routes[fastest].route.id,
        safest = %routes[safest].route.id,
        routes = routes.len(),
        "classified routes"
    );

    Ok(routes
        .into_iter()
        .enumerate()
        .map(|(i, assessed)| {
            let role = if i == safest {
                RouteRole::Safest
            } else if i == fastest {
                RouteRole::Fastest
            } else {
                RouteRole::Standard
            };
            ScoredRoute {
                route: assessed.route,
                risk: assessed.risk,
                role,
            }
        })
        .collect())
}
