//! Error types for instance loading and solver configuration.

use thiserror::Error;

/// Errors raised while reading or building a PDPTW instance.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("cannot read instance file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON instance: {0}")]
    Json(#[from] serde_json::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("instance has no depot")]
    MissingDepot,

    #[error("instance declares more than one depot")]
    DuplicateDepot,

    #[error("vehicle capacity must be positive, got {0}")]
    InvalidCapacity(i32),

    #[error("vehicle load capacity not found in instance file")]
    MissingCapacity,

    #[error("depot time window is inconsistent: earliest {earliest} > latest {latest}")]
    InvalidDepotWindow { earliest: f64, latest: f64 },

    #[error("request {request} has non-positive demand {demand}")]
    InvalidDemand { request: usize, demand: i32 },

    #[error("location {0} has no matching pickup/delivery partner")]
    UnmatchedPartner(String),

    #[error("coordinates of location {0} are not finite")]
    NonFiniteCoordinate(String),
}

/// Errors raised when an [`AlnsConfig`](crate::heuristics::alns::AlnsConfig)
/// does not fit the instance it is applied to.
///
/// These are detected before the search starts; nothing inside an iteration
/// is fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("iterations must be greater than zero")]
    ZeroIterations,

    #[error("min_removal must be at least 1, got {0}")]
    RemovalBelowOne(usize),

    #[error("min_removal {min} is greater than max_removal {max}")]
    RemovalRangeInverted { min: usize, max: usize },

    #[error("max_removal {max} exceeds the {servable} servable requests")]
    RemovalAboveServable { max: usize, servable: usize },

    #[error("regret_k must be at least 2, got {0}")]
    RegretBelowTwo(usize),

    #[error("cooling_rate must be in (0, 1), got {0}")]
    CoolingRate(f64),

    #[error("decay must be in [0, 1], got {0}")]
    Decay(f64),

    #[error("start_acceptance must be in (0, 1), got {0}")]
    StartAcceptance(f64),

    #[error("start_worsening must be positive, got {0}")]
    StartWorsening(f64),

    #[error("initial_temperature must be positive, got {0}")]
    InitialTemperature(f64),

    #[error("{name} must be finite and non-negative, got {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}
