//! Core seams of the dispatch engine.
//!
//! Travel times and the batch solver are external collaborators. The engine
//! only talks to them through these traits so a simulation can plug in a
//! road network, a metaheuristic or a trivial greedy stand-in.

use crate::error::SolverError;
use crate::model::{Location, Time};
use crate::problem::{SolverProblem, SolverSolution};

/// Travel time and distance for a single leg.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelEstimate {
    /// Travel time in seconds.
    pub seconds: f64,
    /// Travel distance in meters.
    pub meters: f64,
}

impl TravelEstimate {
    pub const ZERO: TravelEstimate = TravelEstimate {
        seconds: 0.0,
        meters: 0.0,
    };

    pub fn new(seconds: f64, meters: f64) -> Self {
        Self { seconds, meters }
    }
}

/// Answers "how long from here to there when leaving at this time".
///
/// Implementations must be deterministic for a given input, otherwise two
/// cycles over the same state would produce different plans.
pub trait TravelTimeOracle: Send + Sync {
    fn time_and_distance(&self, from: Location, to: Location, departure: Time) -> TravelEstimate;

    /// Travel time in seconds.
    fn travel_time(&self, from: Location, to: Location, departure: Time) -> f64 {
        self.time_and_distance(from, to, departure).seconds
    }
}

impl<T: TravelTimeOracle + ?Sized> TravelTimeOracle for std::sync::Arc<T> {
    fn time_and_distance(&self, from: Location, to: Location, departure: Time) -> TravelEstimate {
        (**self).time_and_distance(from, to, departure)
    }
}

/// A pickup-and-delivery solver over a frozen problem.
///
/// Solvers may drop jobs they cannot place; those come back in
/// [`SolverSolution::unassigned`]. Returning an error means no solution at
/// all and the engine keeps the previous plan.
pub trait BatchSolver: Send + Sync {
    fn solve(
        &self,
        problem: &SolverProblem,
        oracle: &dyn TravelTimeOracle,
    ) -> Result<SolverSolution, SolverError>;
}
