use tracing::debug;

use crate::classify::{self, AssessedRoute};
use crate::error::EngineError;
use crate::render::{self, PlannedRoute};
use crate::route::{self, CandidateRoute};
use crate::safety::HazardIndex;
use crate::scoring;

/// Scores every candidate against one hazard snapshot, assigns roles and
/// returns the routes in draw order.
pub fn evaluate(
    routes: Vec<CandidateRoute>,
    index: &HazardIndex,
) -> Result<Vec<PlannedRoute>, EngineError> {
    if routes.is_empty() {
        return Err(EngineError::NoRoutesAvailable);
    }
    route::validate_batch(&routes)?;

    let assessed: Vec<AssessedRoute> = routes
        .into_iter()
        .map(|route| {
            let risk = scoring::assess(&route, index);
            debug!(route = %route.id, risk = risk.score, "scored route");
            AssessedRoute { route, risk }
        })
        .collect();

    let scored = classify::classify(assessed)?;
    Ok(render::plan_draw_order(scored))
}
