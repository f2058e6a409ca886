//! Safety-aware route risk evaluation.
//!
//! Candidate routes from a directions provider are scored against a snapshot
//! of hazard zones, labelled fastest / safest / standard, and returned in the
//! order a map should draw them.

pub mod api;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod geometry;
pub mod render;
pub mod route;
pub mod safety;
pub mod scoring;

pub use classify::{AssessedRoute, RouteRole, ScoredRoute, classify};
pub use config::Config;
pub use engine::evaluate;
pub use error::{ConfigError, EngineError, GeometryError, RouteError};
pub use render::{PlannedRoute, plan_draw_order};
pub use route::{CandidateRoute, Polyline};
pub use safety::{HazardIndex, HazardStore, HazardZone, Severity, SeverityWeights};
pub use scoring::{RiskAssessment, ZoneExposure};
