use thiserror::Error;

/// Why a hazard zone boundary was rejected from the index.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("boundary needs at least {min} points, got {got}")]
    TooFewPoints { min: usize, got: usize },
    #[error("boundary ring is not closed (first point differs from last)")]
    NotClosed,
    #[error("boundary has a non-finite coordinate at position {index}")]
    NonFinite { index: usize },
    #[error("boundary edges {first} and {second} cross each other")]
    SelfIntersecting { first: usize, second: usize },
}

/// A candidate route that cannot enter the pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    #[error("route {id}: {field} must be finite and non-negative (got {value})")]
    InvalidMeasure {
        id: String,
        field: &'static str,
        value: f64,
    },
    #[error("route {id}: coordinate {index} is not finite")]
    NonFiniteCoordinate { id: String, index: usize },
    #[error("route id {0} appears more than once")]
    DuplicateId(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("no routes available to classify")]
    NoRoutesAvailable,
    #[error(transparent)]
    InvalidRoute(#[from] RouteError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("severity weight {field} must be finite and positive (got {value})")]
    NonPositiveWeight { field: &'static str, value: f64 },
    #[error("severity weights must satisfy high > medium > low (got {high} / {medium} / {low})")]
    UnorderedWeights { high: f64, medium: f64, low: f64 },
}
