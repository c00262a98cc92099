//! Requests, vehicles and stops.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schedule::Schedule;

/// Simulation time in seconds.
pub type Time = f64;

/// A point in the plane or a (lat, lng) pair, depending on the oracle.
pub type Location = (f64, f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestState {
    Submitted,
    Assigned,
    Onboard,
    Completed,
    Rejected,
}

impl RequestState {
    pub fn is_final(self) -> bool {
        matches!(self, RequestState::Completed | RequestState::Rejected)
    }
}

/// What a rider asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub origin: Location,
    pub destination: Location,
    pub earliest_pickup: Time,
    pub latest_pickup: Time,
    pub latest_arrival: Time,
    pub submission_time: Time,
    pub passengers: u32,
}

impl RequestSpec {
    pub fn new(
        origin: Location,
        destination: Location,
        earliest_pickup: Time,
        latest_pickup: Time,
        latest_arrival: Time,
    ) -> Self {
        Self {
            origin,
            destination,
            earliest_pickup,
            latest_pickup,
            latest_arrival,
            submission_time: earliest_pickup,
            passengers: 1,
        }
    }

    pub fn submitted_at(mut self, time: Time) -> Self {
        self.submission_time = time;
        self
    }

    pub fn passengers(mut self, passengers: u32) -> Self {
        self.passengers = passengers;
        self
    }
}

/// A trip request and its lifecycle.
///
/// The rider's original bounds never change. The effective bounds start at
/// the original ones and only move when a committed plan drifts past them;
/// once moved they are never reverted.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: RequestId,
    pub origin: Location,
    pub destination: Location,
    pub earliest_pickup: Time,
    pub latest_pickup: Time,
    pub latest_arrival: Time,
    pub submission_time: Time,
    pub passengers: u32,
    state: RequestState,
    vehicle: Option<VehicleId>,
    effective_latest_pickup: Time,
    effective_latest_arrival: Time,
}

impl Request {
    pub fn new(id: RequestId, spec: RequestSpec) -> Self {
        Self {
            id,
            origin: spec.origin,
            destination: spec.destination,
            earliest_pickup: spec.earliest_pickup,
            latest_pickup: spec.latest_pickup,
            latest_arrival: spec.latest_arrival,
            submission_time: spec.submission_time,
            passengers: spec.passengers,
            state: RequestState::Submitted,
            vehicle: None,
            effective_latest_pickup: spec.latest_pickup,
            effective_latest_arrival: spec.latest_arrival,
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Vehicle currently responsible for the request, if any.
    pub fn vehicle(&self) -> Option<VehicleId> {
        self.vehicle
    }

    pub fn effective_latest_pickup(&self) -> Time {
        self.effective_latest_pickup
    }

    pub fn effective_latest_arrival(&self) -> Time {
        self.effective_latest_arrival
    }

    pub(crate) fn assign(&mut self, vehicle: VehicleId) {
        assert!(
            matches!(self.state, RequestState::Submitted | RequestState::Assigned),
            "request {} cannot be assigned from state {:?}",
            self.id,
            self.state
        );
        self.state = RequestState::Assigned;
        self.vehicle = Some(vehicle);
    }

    pub(crate) fn board(&mut self, vehicle: VehicleId) {
        assert!(
            self.state == RequestState::Assigned && self.vehicle == Some(vehicle),
            "request {} picked up by {} while {:?} on {:?}",
            self.id,
            vehicle,
            self.state,
            self.vehicle
        );
        self.state = RequestState::Onboard;
    }

    pub(crate) fn complete(&mut self, vehicle: VehicleId) {
        assert!(
            self.state == RequestState::Onboard && self.vehicle == Some(vehicle),
            "request {} dropped off by {} while {:?} on {:?}",
            self.id,
            vehicle,
            self.state,
            self.vehicle
        );
        self.state = RequestState::Completed;
    }

    pub(crate) fn reject(&mut self) {
        assert!(
            matches!(self.state, RequestState::Submitted | RequestState::Assigned),
            "request {} cannot be rejected from state {:?}",
            self.id,
            self.state
        );
        self.state = RequestState::Rejected;
        self.vehicle = None;
    }

    /// Moves the effective bounds forward to planned times that exceed them.
    /// Returns true when either bound changed.
    pub(crate) fn absorb_drift(&mut self, pickup: Option<Time>, arrival: Option<Time>) -> bool {
        let mut changed = false;
        if let Some(pickup) = pickup {
            if pickup > self.effective_latest_pickup {
                self.effective_latest_pickup = pickup;
                changed = true;
            }
        }
        if let Some(arrival) = arrival {
            if arrival > self.effective_latest_arrival {
                self.effective_latest_arrival = arrival;
                changed = true;
            }
        }
        changed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSpec {
    pub start_location: Location,
    /// Falls back to the configured default when unset.
    pub capacity: Option<u32>,
    pub service_start: Time,
    pub service_end: Time,
}

impl VehicleSpec {
    pub fn new(start_location: Location, service_start: Time, service_end: Time) -> Self {
        Self {
            start_location,
            capacity: None,
            service_start,
            service_end,
        }
    }

    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

/// A fleet vehicle and its live task queue.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: VehicleId,
    pub capacity: u32,
    pub service_start: Time,
    pub service_end: Time,
    schedule: Schedule,
}

impl Vehicle {
    pub fn new(id: VehicleId, capacity: u32, spec: &VehicleSpec) -> Self {
        Self {
            id,
            capacity,
            service_start: spec.service_start,
            service_end: spec.service_end,
            schedule: Schedule::new(spec.start_location, spec.service_start, spec.service_end),
        }
    }

    pub fn is_in_service(&self, now: Time) -> bool {
        self.service_start <= now && now < self.service_end
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub(crate) fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopKind {
    Pickup,
    Dropoff,
}

/// One side of a request the solver placed on a vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub request: RequestId,
    pub kind: StopKind,
    pub location: Location,
    /// Service may not begin earlier than this.
    pub not_before: Time,
    pub passengers: u32,
}

impl Stop {
    pub fn pickup(request: &Request) -> Self {
        Self {
            request: request.id,
            kind: StopKind::Pickup,
            location: request.origin,
            not_before: request.earliest_pickup,
            passengers: request.passengers,
        }
    }

    pub fn dropoff(request: &Request) -> Self {
        Self {
            request: request.id,
            kind: StopKind::Dropoff,
            location: request.destination,
            not_before: Time::NEG_INFINITY,
            passengers: request.passengers,
        }
    }
}
