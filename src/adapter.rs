//! Translation between horizon snapshots and solver problems.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::DispatchConfig;
use crate::error::SolverError;
use crate::model::{Location, RequestId, Stop, StopKind, Time, VehicleId};
use crate::problem::{
    JobPriority, SolverActivity, SolverJob, SolverProblem, SolverSolution, SolverVehicle, TimeWindow,
};
use crate::snapshot::{HorizonSnapshot, TripEntry};

/// The solver's answer in domain terms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedPlan {
    /// Ordered stops per in-service vehicle. Vehicles without work map to
    /// an empty list.
    pub stops: BTreeMap<VehicleId, Vec<Stop>>,
    /// Vehicle chosen for every placed request.
    pub placed: BTreeMap<RequestId, VehicleId>,
    pub unassigned: Vec<RequestId>,
}

pub fn encode_snapshot(snapshot: &HorizonSnapshot, config: &DispatchConfig) -> SolverProblem {
    let service = config.per_stop_service_duration;

    let vehicles = snapshot
        .vehicles
        .iter()
        .map(|vehicle| SolverVehicle {
            id: vehicle.id,
            start: vehicle.start,
            start_time: vehicle.start_time,
            end_time: vehicle.service_end,
            capacity: vehicle.capacity,
        })
        .collect();

    let mut jobs = Vec::with_capacity(snapshot.job_count());
    for trip in &snapshot.onboard {
        let vehicle = snapshot
            .vehicle(trip.vehicle)
            .expect("onboard trip references a vehicle outside the snapshot");
        jobs.push(SolverJob {
            request: trip.request,
            // Already on board: a zero-length pickup pinned where and when
            // the vehicle can next change course.
            pickup: SolverActivity {
                location: vehicle.start,
                window: TimeWindow::at(vehicle.start_time),
                duration: 0.0,
            },
            dropoff: SolverActivity {
                location: trip.destination,
                window: TimeWindow::new(vehicle.start_time, trip.latest_arrival),
                duration: service,
            },
            demand: trip.passengers,
            priority: JobPriority::Onboard,
            affinity: Some(trip.vehicle),
        });
    }
    for trip in &snapshot.waiting {
        jobs.push(trip_job(trip, service, JobPriority::AssignedWaiting));
    }
    for trip in &snapshot.fresh {
        jobs.push(trip_job(trip, service, JobPriority::New));
    }

    SolverProblem {
        now: snapshot.now,
        vehicles,
        jobs,
        iteration_budget: config.solver_iteration_budget,
        time_budget: config.solver_time_budget(),
        thread_count: config.solver_thread_count,
    }
}

fn trip_job(trip: &TripEntry, service: Time, priority: JobPriority) -> SolverJob {
    SolverJob {
        request: trip.request,
        pickup: SolverActivity {
            location: trip.origin,
            window: TimeWindow::new(trip.earliest_pickup, trip.latest_pickup),
            duration: service,
        },
        dropoff: SolverActivity {
            location: trip.destination,
            window: TimeWindow::new(trip.earliest_pickup, trip.latest_arrival),
            duration: service,
        },
        demand: trip.passengers,
        priority,
        affinity: None,
    }
}

/// What decoding needs to know about each job.
struct JobInfo {
    origin: Location,
    destination: Location,
    earliest_pickup: Time,
    passengers: u32,
    pinned_to: Option<VehicleId>,
}

/// Turns a solver answer into per-vehicle stop lists.
///
/// Pickups of riders already on board are skipped. Any breach of the solver
/// contract (unknown vehicle or job, a job served twice or split across
/// vehicles, a dropoff before its pickup, an onboard rider moved or
/// dropped, a job neither placed nor reported unassigned) is returned as
/// [`SolverError::ContractViolation`] so the cycle can fail closed.
pub fn decode_solution(
    snapshot: &HorizonSnapshot,
    solution: &SolverSolution,
) -> Result<DecodedPlan, SolverError> {
    let mut jobs: HashMap<RequestId, JobInfo> = HashMap::new();
    for trip in &snapshot.onboard {
        jobs.insert(
            trip.request,
            JobInfo {
                origin: trip.destination,
                destination: trip.destination,
                earliest_pickup: Time::NEG_INFINITY,
                passengers: trip.passengers,
                pinned_to: Some(trip.vehicle),
            },
        );
    }
    for trip in snapshot.waiting.iter().chain(&snapshot.fresh) {
        jobs.insert(
            trip.request,
            JobInfo {
                origin: trip.origin,
                destination: trip.destination,
                earliest_pickup: trip.earliest_pickup,
                passengers: trip.passengers,
                pinned_to: None,
            },
        );
    }

    let mut plan = DecodedPlan::default();
    for vehicle in &snapshot.vehicles {
        plan.stops.insert(vehicle.id, Vec::new());
    }

    let mut seen_vehicles: HashSet<VehicleId> = HashSet::new();
    let mut picked: HashSet<RequestId> = HashSet::new();
    for route in &solution.routes {
        if !plan.stops.contains_key(&route.vehicle) {
            return Err(violation(format!("unknown vehicle {}", route.vehicle)));
        }
        if !seen_vehicles.insert(route.vehicle) {
            return Err(violation(format!("vehicle {} routed twice", route.vehicle)));
        }

        let mut stops = Vec::with_capacity(route.activities.len());
        for activity in &route.activities {
            let info = jobs
                .get(&activity.request)
                .ok_or_else(|| violation(format!("unknown job {}", activity.request)))?;
            if let Some(pinned) = info.pinned_to {
                if pinned != route.vehicle {
                    return Err(violation(format!(
                        "onboard request {} moved from {} to {}",
                        activity.request, pinned, route.vehicle
                    )));
                }
            }
            match activity.kind {
                StopKind::Pickup => {
                    if !picked.insert(activity.request) {
                        return Err(violation(format!("request {} picked up twice", activity.request)));
                    }
                    if info.pinned_to.is_some() {
                        continue;
                    }
                    plan.placed.insert(activity.request, route.vehicle);
                    stops.push(Stop {
                        request: activity.request,
                        kind: StopKind::Pickup,
                        location: info.origin,
                        not_before: info.earliest_pickup,
                        passengers: info.passengers,
                    });
                }
                StopKind::Dropoff => {
                    let pickup_ok = info.pinned_to.is_some()
                        || plan.placed.get(&activity.request) == Some(&route.vehicle);
                    if !pickup_ok {
                        return Err(violation(format!(
                            "request {} dropped off on {} without a prior pickup there",
                            activity.request, route.vehicle
                        )));
                    }
                    stops.push(Stop {
                        request: activity.request,
                        kind: StopKind::Dropoff,
                        location: info.destination,
                        not_before: Time::NEG_INFINITY,
                        passengers: info.passengers,
                    });
                }
            }
        }
        plan.stops.insert(route.vehicle, stops);
    }

    // Every placed job needs exactly one dropoff.
    let mut dropped: HashMap<RequestId, usize> = HashMap::new();
    for stops in plan.stops.values() {
        for stop in stops.iter().filter(|stop| stop.kind == StopKind::Dropoff) {
            *dropped.entry(stop.request).or_default() += 1;
        }
    }
    for (request, info) in &jobs {
        let dropoffs = dropped.get(request).copied().unwrap_or(0);
        let unassigned = solution.unassigned.contains(request);
        if let Some(vehicle) = info.pinned_to {
            if dropoffs != 1 || unassigned {
                return Err(violation(format!("onboard request {} was not kept", request)));
            }
            plan.placed.insert(*request, vehicle);
            continue;
        }
        match (plan.placed.contains_key(request), dropoffs, unassigned) {
            (true, 1, false) => {}
            (false, 0, true) => plan.unassigned.push(*request),
            _ => {
                return Err(violation(format!(
                    "request {} is neither cleanly placed nor unassigned",
                    request
                )));
            }
        }
    }
    for request in &solution.unassigned {
        if !jobs.contains_key(request) {
            return Err(violation(format!("unknown unassigned job {}", request)));
        }
    }
    plan.unassigned.sort();

    Ok(plan)
}

fn violation(message: String) -> SolverError {
    SolverError::ContractViolation(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{SolverActivityRef, SolverRoute};
    use crate::snapshot::{OnboardTrip, VehicleEntry};

    fn snapshot() -> HorizonSnapshot {
        HorizonSnapshot {
            now: 100.0,
            vehicles: vec![
                VehicleEntry {
                    id: VehicleId(1),
                    capacity: 4,
                    start: (0.0, 0.0),
                    start_time: 120.0,
                    service_end: 3600.0,
                },
                VehicleEntry {
                    id: VehicleId(2),
                    capacity: 4,
                    start: (5.0, 0.0),
                    start_time: 100.0,
                    service_end: 3600.0,
                },
            ],
            onboard: vec![OnboardTrip {
                request: RequestId(1),
                vehicle: VehicleId(1),
                destination: (9.0, 0.0),
                latest_arrival: 900.0,
                passengers: 1,
            }],
            waiting: vec![TripEntry {
                request: RequestId(2),
                origin: (1.0, 0.0),
                destination: (2.0, 0.0),
                earliest_pickup: 150.0,
                latest_pickup: 400.0,
                latest_arrival: 1000.0,
                passengers: 1,
            }],
            fresh: vec![TripEntry {
                request: RequestId(3),
                origin: (3.0, 0.0),
                destination: (4.0, 0.0),
                earliest_pickup: 200.0,
                latest_pickup: 500.0,
                latest_arrival: 1100.0,
                passengers: 2,
            }],
            adjustments: Vec::new(),
        }
    }

    fn act(request: u64, kind: StopKind) -> SolverActivityRef {
        SolverActivityRef {
            request: RequestId(request),
            kind,
        }
    }

    #[test]
    fn encodes_onboard_trip_as_pinned_job() {
        let problem = encode_snapshot(&snapshot(), &DispatchConfig::default());
        let job = problem.job(RequestId(1)).expect("onboard job");
        assert_eq!(job.affinity, Some(VehicleId(1)));
        assert_eq!(job.priority, JobPriority::Onboard);
        assert_eq!(job.pickup.location, (0.0, 0.0));
        assert_eq!(job.pickup.window, TimeWindow::at(120.0));
        assert_eq!(job.pickup.duration, 0.0);
    }

    #[test]
    fn priorities_follow_commitment() {
        let problem = encode_snapshot(&snapshot(), &DispatchConfig::default());
        let priority = |id| problem.job(RequestId(id)).expect("job").priority;
        assert!(priority(1) > priority(2));
        assert!(priority(2) > priority(3));
        assert_eq!(problem.job(RequestId(3)).expect("job").demand, 2);
        assert_eq!(problem.now, 100.0);
    }

    #[test]
    fn decode_skips_onboard_pickups() {
        let solution = SolverSolution {
            routes: vec![
                SolverRoute {
                    vehicle: VehicleId(1),
                    activities: vec![
                        act(1, StopKind::Pickup),
                        act(2, StopKind::Pickup),
                        act(2, StopKind::Dropoff),
                        act(1, StopKind::Dropoff),
                    ],
                },
                SolverRoute {
                    vehicle: VehicleId(2),
                    activities: vec![],
                },
            ],
            unassigned: vec![RequestId(3)],
        };

        let plan = decode_solution(&snapshot(), &solution).expect("valid solution");
        let kinds: Vec<_> = plan.stops[&VehicleId(1)]
            .iter()
            .map(|stop| (stop.request.0, stop.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (2, StopKind::Pickup),
                (2, StopKind::Dropoff),
                (1, StopKind::Dropoff)
            ]
        );
        assert_eq!(plan.stops[&VehicleId(1)][0].not_before, 150.0);
        assert!(plan.stops[&VehicleId(2)].is_empty());
        assert_eq!(plan.placed[&RequestId(2)], VehicleId(1));
        assert_eq!(plan.unassigned, vec![RequestId(3)]);
    }

    #[test]
    fn moving_an_onboard_rider_is_a_violation() {
        let solution = SolverSolution {
            routes: vec![SolverRoute {
                vehicle: VehicleId(2),
                activities: vec![act(1, StopKind::Pickup), act(1, StopKind::Dropoff)],
            }],
            unassigned: vec![RequestId(2), RequestId(3)],
        };
        let result = decode_solution(&snapshot(), &solution);
        assert!(matches!(result, Err(SolverError::ContractViolation(_))));
    }

    #[test]
    fn dropping_an_onboard_rider_is_a_violation() {
        let solution = SolverSolution {
            routes: vec![],
            unassigned: vec![RequestId(1), RequestId(2), RequestId(3)],
        };
        assert!(decode_solution(&snapshot(), &solution).is_err());
    }

    #[test]
    fn forgotten_job_is_a_violation() {
        let solution = SolverSolution {
            routes: vec![SolverRoute {
                vehicle: VehicleId(1),
                activities: vec![act(1, StopKind::Dropoff)],
            }],
            unassigned: vec![RequestId(3)],
        };
        assert!(decode_solution(&snapshot(), &solution).is_err());
    }

    #[test]
    fn dropoff_before_pickup_is_a_violation() {
        let solution = SolverSolution {
            routes: vec![SolverRoute {
                vehicle: VehicleId(1),
                activities: vec![
                    act(1, StopKind::Dropoff),
                    act(2, StopKind::Dropoff),
                    act(2, StopKind::Pickup),
                ],
            }],
            unassigned: vec![RequestId(3)],
        };
        assert!(decode_solution(&snapshot(), &solution).is_err());
    }
}
