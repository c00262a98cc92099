//! Test fixtures for drt-dispatch.
//!
//! - Trip and fleet builders with sensible defaults
//! - Solvers that fail or misbehave on demand
//! - Real Las Vegas places for geographic scenarios

#![allow(dead_code)]

pub mod las_vegas;

use std::sync::{Arc, Mutex};

use drt_dispatch::config::DispatchConfig;
use drt_dispatch::dispatcher::Dispatcher;
use drt_dispatch::error::SolverError;
use drt_dispatch::model::{Location, RequestSpec, Time, VehicleId, VehicleSpec};
use drt_dispatch::oracle::EuclideanOracle;
use drt_dispatch::problem::{SolverProblem, SolverSolution};
use drt_dispatch::solver::InsertionSolver;
use drt_dispatch::traits::{BatchSolver, TravelTimeOracle};

/// Builder for trip requests on the plane.
#[derive(Clone, Debug)]
pub struct TestTrip {
    origin: Location,
    destination: Location,
    earliest: Time,
    pickup_slack: Time,
    arrival_slack: Time,
    submitted: Option<Time>,
    passengers: u32,
}

impl TestTrip {
    pub fn new(origin: Location, destination: Location) -> Self {
        Self {
            origin,
            destination,
            earliest: 0.0,
            pickup_slack: 300.0,
            arrival_slack: 1500.0,
            submitted: None,
            passengers: 1,
        }
    }

    pub fn earliest(mut self, earliest: Time) -> Self {
        self.earliest = earliest;
        self
    }

    /// Latest pickup relative to the earliest pickup.
    pub fn pickup_slack(mut self, slack: Time) -> Self {
        self.pickup_slack = slack;
        self
    }

    /// Latest arrival relative to the earliest pickup.
    pub fn arrival_slack(mut self, slack: Time) -> Self {
        self.arrival_slack = slack;
        self
    }

    pub fn submitted(mut self, time: Time) -> Self {
        self.submitted = Some(time);
        self
    }

    pub fn passengers(mut self, passengers: u32) -> Self {
        self.passengers = passengers;
        self
    }

    pub fn spec(&self) -> RequestSpec {
        RequestSpec::new(
            self.origin,
            self.destination,
            self.earliest,
            self.earliest + self.pickup_slack,
            self.earliest + self.arrival_slack,
        )
        .submitted_at(self.submitted.unwrap_or(self.earliest))
        .passengers(self.passengers)
    }
}

/// A full-day vehicle starting at `location`.
pub fn vehicle_at(location: Location) -> VehicleSpec {
    VehicleSpec::new(location, 0.0, 3600.0)
}

/// Short cycles and a 30 s stop time on a unit-speed plane.
pub fn planar_config() -> DispatchConfig {
    DispatchConfig {
        horizon: 600.0,
        interval: 60.0,
        per_stop_service_duration: 30.0,
        ..DispatchConfig::default()
    }
}

pub fn planar_dispatcher() -> Dispatcher {
    dispatcher_with(Box::new(InsertionSolver::default()))
}

pub fn dispatcher_with(solver: Box<dyn BatchSolver>) -> Dispatcher {
    let oracle: Arc<dyn TravelTimeOracle> = Arc::new(EuclideanOracle::default());
    Dispatcher::new(planar_config(), oracle, solver).expect("planar config is valid")
}

pub fn add_vehicles(dispatcher: &mut Dispatcher, starts: &[Location]) -> Vec<VehicleId> {
    starts
        .iter()
        .map(|&start| dispatcher.add_vehicle(vehicle_at(start)).expect("vehicle"))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SolverMode {
    #[default]
    Normal,
    /// Returns an error instead of a solution.
    Fail,
    /// Reports every job unassigned.
    DropAll,
}

/// Wraps the insertion solver with a switch tests can flip between cycles.
#[derive(Clone, Default)]
pub struct SwitchableSolver {
    inner: InsertionSolver,
    mode: Arc<Mutex<SolverMode>>,
}

impl SwitchableSolver {
    pub fn set_mode(&self, mode: SolverMode) {
        *self.mode.lock().expect("mode lock") = mode;
    }
}

impl BatchSolver for SwitchableSolver {
    fn solve(
        &self,
        problem: &SolverProblem,
        oracle: &dyn TravelTimeOracle,
    ) -> Result<SolverSolution, SolverError> {
        let mode = *self.mode.lock().expect("mode lock");
        match mode {
            SolverMode::Normal => self.inner.solve(problem, oracle),
            SolverMode::Fail => Err(SolverError::NoSolution("switched off".to_string())),
            SolverMode::DropAll => Ok(SolverSolution {
                routes: Vec::new(),
                unassigned: problem.jobs.iter().map(|job| job.request).collect(),
            }),
        }
    }
}
