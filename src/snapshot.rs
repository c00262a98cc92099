//! Horizon snapshots: the frozen view one dispatch cycle works from.
//!
//! Building a snapshot reads vehicles and requests but never mutates them.
//! Per-vehicle views are computed in parallel and merged in vehicle id
//! order, so the same state always yields the same snapshot.

use std::collections::{BTreeMap, HashMap, HashSet};

use rayon::prelude::*;

use crate::model::{Location, Request, RequestId, RequestState, StopKind, Time, Vehicle, VehicleId};

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleEntry {
    pub id: VehicleId,
    pub capacity: u32,
    /// Divertable position.
    pub start: Location,
    /// Divertable time.
    pub start_time: Time,
    pub service_end: Time,
}

/// A rider already on board, locked to its vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct OnboardTrip {
    pub request: RequestId,
    pub vehicle: VehicleId,
    pub destination: Location,
    pub latest_arrival: Time,
    pub passengers: u32,
}

/// A request the solver may place on any vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct TripEntry {
    pub request: RequestId,
    pub origin: Location,
    pub destination: Location,
    pub earliest_pickup: Time,
    pub latest_pickup: Time,
    pub latest_arrival: Time,
    pub passengers: u32,
}

impl TripEntry {
    fn from_request(request: &Request) -> Self {
        Self {
            request: request.id,
            origin: request.origin,
            destination: request.destination,
            earliest_pickup: request.earliest_pickup,
            latest_pickup: request.effective_latest_pickup(),
            latest_arrival: request.effective_latest_arrival(),
            passengers: request.passengers,
        }
    }
}

/// Planned stop times that ran past a request's recorded bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundAdjustment {
    pub request: RequestId,
    pub latest_pickup: Option<Time>,
    pub latest_arrival: Option<Time>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HorizonSnapshot {
    pub now: Time,
    pub vehicles: Vec<VehicleEntry>,
    pub onboard: Vec<OnboardTrip>,
    /// Accepted but not yet picked up.
    pub waiting: Vec<TripEntry>,
    /// Newly visible, never surfaced to a solver before.
    pub fresh: Vec<TripEntry>,
    pub adjustments: Vec<BoundAdjustment>,
}

impl HorizonSnapshot {
    pub fn job_count(&self) -> usize {
        self.onboard.len() + self.waiting.len() + self.fresh.len()
    }

    pub fn is_empty(&self) -> bool {
        self.job_count() == 0
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&VehicleEntry> {
        self.vehicles.iter().find(|vehicle| vehicle.id == id)
    }
}

/// What one worker extracts from one vehicle.
struct VehicleView {
    entry: VehicleEntry,
    stop_times: Vec<(RequestId, StopKind, Time)>,
}

fn view_vehicle(vehicle: &Vehicle, now: Time) -> VehicleView {
    let schedule = vehicle.schedule();
    let (start, start_time) = schedule.divertable_point(now);
    VehicleView {
        entry: VehicleEntry {
            id: vehicle.id,
            capacity: vehicle.capacity,
            start,
            start_time,
            service_end: vehicle.service_end,
        },
        stop_times: schedule.planned_stop_times(),
    }
}

/// Freezes the state of every in-service vehicle and every request the
/// cycle at `now` has to decide on.
///
/// # Panics
///
/// Panics when schedules and request states disagree (a rider on board
/// with a pickup still planned, an accepted request missing from its
/// vehicle's plan, or a request classified twice). Those are bugs in the
/// splicer or in task execution, not conditions to recover from.
pub fn build_snapshot(
    now: Time,
    horizon: Time,
    vehicles: &BTreeMap<VehicleId, Vehicle>,
    requests: &BTreeMap<RequestId, Request>,
) -> HorizonSnapshot {
    let in_service: Vec<&Vehicle> = vehicles
        .values()
        .filter(|vehicle| vehicle.is_in_service(now))
        .collect();

    let views: Vec<VehicleView> = in_service
        .par_iter()
        .map(|vehicle| view_vehicle(vehicle, now))
        .collect();

    let mut onboard = Vec::new();
    let mut waiting = Vec::new();
    let mut adjustments = Vec::new();
    let mut classified: HashSet<RequestId> = HashSet::new();

    for view in &views {
        let vehicle = view.entry.id;
        let mut pickups: HashMap<RequestId, Time> = HashMap::new();
        let mut dropoffs: Vec<(RequestId, Time)> = Vec::new();
        for &(request, kind, time) in &view.stop_times {
            match kind {
                StopKind::Pickup => {
                    pickups.insert(request, time);
                }
                StopKind::Dropoff => dropoffs.push((request, time)),
            }
        }

        for (request_id, dropoff_time) in dropoffs {
            let request = &requests[&request_id];
            assert_eq!(
                request.vehicle(),
                Some(vehicle),
                "request {} planned on {} but held by {:?}",
                request_id,
                vehicle,
                request.vehicle()
            );
            let pickup_time = pickups.get(&request_id).copied();
            match request.state() {
                RequestState::Onboard => {
                    assert!(
                        pickup_time.is_none(),
                        "request {} is on board {} but still has a pickup planned",
                        request_id,
                        vehicle
                    );
                }
                RequestState::Assigned => {
                    assert!(
                        pickup_time.is_some(),
                        "request {} is waiting for {} but has no pickup planned",
                        request_id,
                        vehicle
                    );
                }
                state => panic!(
                    "request {} in state {:?} still has stops planned on {}",
                    request_id, state, vehicle
                ),
            }
            assert!(
                classified.insert(request_id),
                "request {} appears twice in the snapshot",
                request_id
            );

            let late_pickup = pickup_time.filter(|&t| t > request.effective_latest_pickup());
            let late_arrival = Some(dropoff_time).filter(|&t| t > request.effective_latest_arrival());
            if late_pickup.is_some() || late_arrival.is_some() {
                adjustments.push(BoundAdjustment {
                    request: request_id,
                    latest_pickup: late_pickup,
                    latest_arrival: late_arrival,
                });
            }
            let latest_pickup = late_pickup.unwrap_or(request.effective_latest_pickup());
            let latest_arrival = late_arrival.unwrap_or(request.effective_latest_arrival());

            if request.state() == RequestState::Onboard {
                onboard.push(OnboardTrip {
                    request: request_id,
                    vehicle,
                    destination: request.destination,
                    latest_arrival,
                    passengers: request.passengers,
                });
            } else {
                waiting.push(TripEntry {
                    latest_pickup,
                    latest_arrival,
                    ..TripEntry::from_request(request)
                });
            }
        }
    }

    // Everything held by an in-service vehicle must have been found in its plan.
    let in_service_ids: HashSet<VehicleId> = views.iter().map(|view| view.entry.id).collect();
    for request in requests.values() {
        if matches!(request.state(), RequestState::Assigned | RequestState::Onboard) {
            if let Some(vehicle) = request.vehicle() {
                if in_service_ids.contains(&vehicle) {
                    assert!(
                        classified.contains(&request.id),
                        "request {} is {:?} on {} but missing from its plan",
                        request.id,
                        request.state(),
                        vehicle
                    );
                }
            }
        }
    }

    let fresh: Vec<TripEntry> = requests
        .values()
        .filter(|request| request.state() == RequestState::Submitted)
        .filter(|request| request.earliest_pickup <= now + horizon)
        .map(|request| {
            assert!(
                !classified.contains(&request.id),
                "request {} is both new and already planned",
                request.id
            );
            TripEntry::from_request(request)
        })
        .collect();

    tracing::debug!(
        now,
        vehicles = views.len(),
        onboard = onboard.len(),
        waiting = waiting.len(),
        fresh = fresh.len(),
        adjustments = adjustments.len(),
        "snapshot built"
    );

    HorizonSnapshot {
        now,
        vehicles: views.into_iter().map(|view| view.entry).collect(),
        onboard,
        waiting,
        fresh,
        adjustments,
    }
}
