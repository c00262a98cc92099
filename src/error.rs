//! Error types.

use thiserror::Error;

use crate::model::{RequestId, VehicleId};

/// Rejected configuration. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("horizon must be a positive number of seconds, got {0}")]
    InvalidHorizon(f64),
    #[error("interval must be a positive number of seconds, got {0}")]
    InvalidInterval(f64),
    #[error("interval {interval} exceeds horizon {horizon}")]
    IntervalExceedsHorizon { interval: f64, horizon: f64 },
    #[error("cycle offset {offset} must lie in [0, {interval})")]
    InvalidOffset { offset: f64, interval: f64 },
    #[error("per-stop service duration must be non-negative, got {0}")]
    InvalidServiceDuration(f64),
    #[error("default vehicle capacity must be at least 1")]
    ZeroCapacity,
    #[error("solver thread count must be at least 1")]
    ZeroThreads,
    #[error("solver time budget must be positive, got {0}")]
    InvalidTimeBudget(f64),
}

/// Errors from the dispatcher's public API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("unknown vehicle {0}")]
    UnknownVehicle(VehicleId),
    #[error("unknown request {0}")]
    UnknownRequest(RequestId),
    #[error("earliest pickup {earliest} is after latest pickup {latest}")]
    InvalidPickupWindow { earliest: f64, latest: f64 },
    #[error("request must carry at least one passenger")]
    NoPassengers,
    #[error("vehicle service window [{start}, {end}] is empty")]
    InvalidServiceWindow { start: f64, end: f64 },
}

/// Solver failures. The cycle that hit one keeps the previous plan.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("solver produced no solution: {0}")]
    NoSolution(String),
    #[error("solution violates the solver contract: {0}")]
    ContractViolation(String),
    #[error("failed to build solver thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// OSRM transport and payload failures.
#[derive(Debug, Error)]
pub enum OsrmError {
    #[error("OSRM request failed")]
    Http(#[from] reqwest::Error),
    #[error("OSRM answered with code {0}")]
    Status(String),
    #[error("OSRM returned no route")]
    NoRoute,
}
