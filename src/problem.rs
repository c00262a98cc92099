//! Solver-facing problem and solution types.
//!
//! These are the wire format between the adapter and any [`BatchSolver`]:
//! plain data, no references back into engine state.
//!
//! [`BatchSolver`]: crate::traits::BatchSolver

use std::time::Duration;

use crate::model::{Location, RequestId, StopKind, Time, VehicleId};

/// How committed the engine already is to a job. Solvers under pressure
/// drop the lowest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobPriority {
    New = 0,
    AssignedWaiting = 1,
    Onboard = 2,
}

impl JobPriority {
    pub fn weight(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: Time,
    pub end: Time,
}

impl TimeWindow {
    pub fn new(start: Time, end: Time) -> Self {
        Self { start, end }
    }

    /// A window that admits exactly one instant.
    pub fn at(time: Time) -> Self {
        Self::new(time, time)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverActivity {
    pub location: Location,
    pub window: TimeWindow,
    pub duration: Time,
}

/// A paired pickup and dropoff for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverJob {
    pub request: RequestId,
    pub pickup: SolverActivity,
    pub dropoff: SolverActivity,
    pub demand: u32,
    pub priority: JobPriority,
    /// When set, the job may only be served by this vehicle.
    pub affinity: Option<VehicleId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverVehicle {
    pub id: VehicleId,
    pub start: Location,
    pub start_time: Time,
    pub end_time: Time,
    pub capacity: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverProblem {
    /// Departure time used for travel-time queries.
    pub now: Time,
    pub vehicles: Vec<SolverVehicle>,
    pub jobs: Vec<SolverJob>,
    pub iteration_budget: usize,
    pub time_budget: Option<Duration>,
    pub thread_count: usize,
}

impl SolverProblem {
    pub fn job(&self, request: RequestId) -> Option<&SolverJob> {
        self.jobs.iter().find(|job| job.request == request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverActivityRef {
    pub request: RequestId,
    pub kind: StopKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverRoute {
    pub vehicle: VehicleId,
    pub activities: Vec<SolverActivityRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverSolution {
    pub routes: Vec<SolverRoute>,
    pub unassigned: Vec<RequestId>,
}
