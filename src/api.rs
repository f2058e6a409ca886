use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use geo::Coord;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::classify::RouteRole;
use crate::config::Config;
use crate::engine;
use crate::error::EngineError;
use crate::gate::{RequestGate, Superseded, Ticket};
use crate::render::PlannedRoute;
use crate::route::{CandidateRoute, Polyline};
use crate::safety::{
    HazardIndex, HazardSnapshot, HazardStore, HazardZone, Severity, StaleSnapshot, ZoneRejection,
};
use crate::scoring::ZoneExposure;

// Shared state: the hazard snapshot, the request gate and the config it was built from
pub struct AppState {
    pub config: Config,
    pub hazards: HazardStore,
    pub gate: RequestGate,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            hazards: HazardStore::new(config.severity_weights),
            gate: RequestGate::new(),
            config,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/hazards", get(get_hazards).put(put_hazards))
        .route("/routes/evaluate", post(evaluate_routes))
        .layer(TraceLayer::new_for_http());

    if state.config.cors_permissive {
        let cors = CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app.with_state(state)
}

// --- API DTOs ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteInput {
    #[serde(default)]
    pub id: Option<String>,
    pub path: Polyline, // [[lon, lat], ...]
    pub duration_seconds: f64,
    pub distance_meters: f64,
}

#[derive(Debug, Deserialize)]
pub struct HazardZoneInput {
    pub id: String,
    pub boundary: Vec<[f64; 2]>, // closed ring of [lon, lat]
    pub severity: Severity,
}

impl From<HazardZoneInput> for HazardZone {
    fn from(input: HazardZoneInput) -> Self {
        let boundary = input
            .boundary
            .into_iter()
            .map(|[lon, lat]| Coord { x: lon, y: lat })
            .collect();
        HazardZone::new(input.id, boundary, input.severity)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HazardUploadParams {
    /// Upload version; older than the current snapshot means stale.
    pub version: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub sequence: Option<u64>,
    pub routes: Vec<RouteInput>,
    /// Evaluate against these zones instead of the shared snapshot.
    #[serde(default)]
    pub hazards: Option<Vec<HazardZoneInput>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteOutput {
    pub id: String,
    pub path: Vec<[f64; 2]>,
    pub duration_seconds: f64,
    pub distance_meters: f64,
    pub risk_score: f64,
    pub role: RouteRole,
    pub draw_order_index: usize,
    pub exposure: Vec<ZoneExposure>,
}

impl From<PlannedRoute> for RouteOutput {
    fn from(planned: PlannedRoute) -> Self {
        let scored = planned.scored;
        Self {
            id: scored.route.id,
            path: scored.route.path.into(),
            duration_seconds: scored.route.duration_seconds,
            distance_meters: scored.route.distance_meters,
            risk_score: scored.risk.score,
            role: scored.role,
            draw_order_index: planned.draw_order_index,
            exposure: scored.risk.zones,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RejectedZone {
    pub id: String,
    pub reason: String,
}

impl From<&ZoneRejection> for RejectedZone {
    fn from(rejection: &ZoneRejection) -> Self {
        Self {
            id: rejection.zone_id().to_string(),
            reason: rejection.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub sequence: Option<u64>,
    /// Version of the shared snapshot used; absent for inline hazards.
    pub hazard_version: Option<u64>,
    /// Back-to-front draw order.
    pub routes: Vec<RouteOutput>,
    pub rejected_zones: Vec<RejectedZone>,
}

#[derive(Debug, Serialize)]
pub struct ZoneSummary {
    pub id: String,
    pub severity: Severity,
    pub weight: f64,
}

#[derive(Debug, Serialize)]
pub struct HazardSnapshotResponse {
    pub version: u64,
    pub accepted: usize,
    pub zones: Vec<ZoneSummary>,
    pub rejected: Vec<RejectedZone>,
}

impl From<&HazardSnapshot> for HazardSnapshotResponse {
    fn from(snapshot: &HazardSnapshot) -> Self {
        let index = snapshot.index.as_ref();
        Self {
            version: snapshot.version,
            accepted: index.len(),
            zones: index
                .zones()
                .iter()
                .map(|z| ZoneSummary {
                    id: z.zone.id.clone(),
                    severity: z.zone.severity,
                    weight: z.weight,
                })
                .collect(),
            rejected: index.rejected().iter().map(RejectedZone::from).collect(),
        }
    }
}

// --- Errors ---

#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    Superseded(Superseded),
    StaleHazards(StaleSnapshot),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl From<Superseded> for ApiError {
    fn from(err: Superseded) -> Self {
        ApiError::Superseded(err)
    }
}

impl From<StaleSnapshot> for ApiError {
    fn from(err: StaleSnapshot) -> Self {
        ApiError::StaleHazards(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Engine(EngineError::NoRoutesAvailable) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Engine(EngineError::InvalidRoute(_)) => StatusCode::BAD_REQUEST,
            ApiError::Superseded(_) | ApiError::StaleHazards(_) => StatusCode::CONFLICT,
        };
        let message = match &self {
            ApiError::Engine(err) => err.to_string(),
            ApiError::Superseded(err) => err.to_string(),
            ApiError::StaleHazards(err) => err.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

// --- Handlers ---

async fn get_hazards(State(state): State<Arc<AppState>>) -> Json<HazardSnapshotResponse> {
    Json(HazardSnapshotResponse::from(&state.hazards.current()))
}

async fn put_hazards(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HazardUploadParams>,
    Json(zones): Json<Vec<HazardZoneInput>>,
) -> Result<Json<HazardSnapshotResponse>, ApiError> {
    let zones = zones.into_iter().map(HazardZone::from).collect();
    let snapshot = state.hazards.replace(zones, params.version)?;
    Ok(Json(HazardSnapshotResponse::from(&snapshot)))
}

/// Uses the client's id when given, otherwise `route-<position>`, skipping
/// names another route in the batch already carries.
fn assign_route_ids(inputs: Vec<RouteInput>) -> Vec<CandidateRoute> {
    let mut taken: HashSet<String> = inputs.iter().filter_map(|r| r.id.clone()).collect();
    inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| {
            let id = input.id.unwrap_or_else(|| {
                let mut n = i + 1;
                while taken.contains(&format!("route-{n}")) {
                    n += 1;
                }
                let id = format!("route-{n}");
                taken.insert(id.clone());
                id
            });
            CandidateRoute::new(id, input.path, input.duration_seconds, input.distance_meters)
        })
        .collect()
}

async fn evaluate_routes(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, ApiError> {
    // 1. Register with the gate so an older request cannot overwrite a newer one
    let ticket: Option<Ticket> = match (payload.session.as_deref(), payload.sequence) {
        (Some(session), Some(sequence)) => Some(state.gate.begin(session, sequence)?),
        (Some(session), None) => Some(state.gate.begin_next(session)),
        (None, _) => None,
    };

    // 2. Pin one hazard snapshot for the whole pass
    let (index, hazard_version) = match payload.hazards {
        Some(zones) => {
            let index = HazardIndex::build(
                zones.into_iter().map(HazardZone::from).collect(),
                state.hazards.weights(),
            );
            (Arc::new(index), None)
        }
        None => {
            let snapshot = state.hazards.current();
            (snapshot.index, Some(snapshot.version))
        }
    };

    let routes = assign_route_ids(payload.routes);

    // 3. Score, classify, order; the ticket is settled whether or not scoring failed
    let outcome = engine::evaluate(routes, &index);
    let outcome = match &ticket {
        Some(ticket) => state.gate.finish(ticket, outcome)?,
        None => outcome,
    };
    let planned = outcome?;

    info!(
        routes = planned.len(),
        zones = index.len(),
        sequence = ticket.as_ref().map(Ticket::sequence),
        "evaluated routes"
    );

    Ok(Json(EvaluateResponse {
        sequence: ticket.as_ref().map(Ticket::sequence),
        hazard_version,
        routes: planned.into_iter().map(RouteOutput::from).collect(),
        rejected_zones: index.rejected().iter().map(RejectedZone::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(id: Option<&str>) -> RouteInput {
        RouteInput {
            id: id.map(str::to_string),
            path: Polyline::from(vec![[0.0, 0.0], [0.01, 0.0]]),
            duration_seconds: 60.0,
            distance_meters: 1000.0,
        }
    }

    #[test]
    fn generated_ids_skip_names_supplied_by_the_client() {
        let routes = assign_route_ids(vec![
            input(Some("route-2")),
            input(None),
            input(Some("route-3")),
            input(None),
        ]);
        let ids: Vec<&str> = routes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["route-2", "route-4", "route-3", "route-5"]);
    }

    #[test]
    fn unnamed_routes_are_numbered_by_position() {
        let routes = assign_route_ids(vec![input(None), input(Some("mine")), input(None)]);
        let ids: Vec<&str> = routes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["route-1", "mine", "route-3"]);
    }
}
