//! Rolling-horizon dispatcher.
//!
//! Owns fleet and request state. On every cycle boundary it freezes a
//! [`HorizonSnapshot`], asks the solver for new stop sequences and splices
//! them into the vehicles' schedules. Between cycles the simulation reports
//! finished tasks through [`Dispatcher::on_task_ended`].

use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use rayon::prelude::*;

use crate::adapter::{decode_solution, encode_snapshot, DecodedPlan};
use crate::config::DispatchConfig;
use crate::error::{ConfigError, DispatchError, SolverError};
use crate::events::{DispatchEvent, EventBus, RejectReason};
use crate::model::{
    Request, RequestId, RequestSpec, RequestState, Stop, StopKind, Time, Vehicle, VehicleId,
    VehicleSpec,
};
use crate::snapshot::{build_snapshot, HorizonSnapshot};
use crate::splicer::splice;
use crate::traits::{BatchSolver, TravelTimeOracle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Reoptimizing,
}

/// What one cycle decided.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub now: Time,
    pub vehicles: usize,
    pub jobs: usize,
    /// Requests placed for the first time.
    pub assigned: Vec<(RequestId, VehicleId)>,
    pub rejected: Vec<(RequestId, RejectReason)>,
    pub adjustments: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No cycle boundary was crossed.
    NotDue,
    Completed(CycleReport),
    /// The solver failed; every schedule kept its previous plan.
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub cycles_run: u64,
    /// Boundaries crossed between two ticks without a cycle of their own.
    pub cycles_skipped: u64,
    pub solver_failures: u64,
    pub requests_assigned: u64,
    pub requests_rejected: u64,
    pub passengers_picked_up: u64,
    pub passengers_dropped_off: u64,
    pub bound_adjustments: u64,
}

pub struct Dispatcher {
    config: DispatchConfig,
    oracle: Arc<dyn TravelTimeOracle>,
    solver: Box<dyn BatchSolver>,
    vehicles: BTreeMap<VehicleId, Vehicle>,
    requests: BTreeMap<RequestId, Request>,
    events: EventBus,
    state: CycleState,
    next_cycle_at: Time,
    last_tick: Option<Time>,
    next_vehicle_id: u64,
    next_request_id: u64,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(
        config: DispatchConfig,
        oracle: Arc<dyn TravelTimeOracle>,
        solver: Box<dyn BatchSolver>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let next_cycle_at = config.cycle_offset;
        Ok(Self {
            config,
            oracle,
            solver,
            vehicles: BTreeMap::new(),
            requests: BTreeMap::new(),
            events: EventBus::default(),
            state: CycleState::Idle,
            next_cycle_at,
            last_tick: None,
            next_vehicle_id: 1,
            next_request_id: 1,
            stats: DispatchStats::default(),
        })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Time of the next cycle boundary.
    pub fn next_cycle_at(&self) -> Time {
        self.next_cycle_at
    }

    pub fn subscribe(&mut self) -> Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn request(&self, id: RequestId) -> Option<&Request> {
        self.requests.get(&id)
    }

    pub fn requests(&self) -> impl Iterator<Item = &Request> {
        self.requests.values()
    }

    pub fn add_vehicle(&mut self, spec: VehicleSpec) -> Result<VehicleId, DispatchError> {
        if !(spec.service_end > spec.service_start) {
            return Err(DispatchError::InvalidServiceWindow {
                start: spec.service_start,
                end: spec.service_end,
            });
        }
        let id = VehicleId(self.next_vehicle_id);
        self.next_vehicle_id += 1;
        let capacity = spec.capacity.unwrap_or(self.config.vehicle_capacity_default);
        self.vehicles.insert(id, Vehicle::new(id, capacity, &spec));
        tracing::debug!(vehicle = %id, capacity, "vehicle added");
        Ok(id)
    }

    pub fn submit(&mut self, spec: RequestSpec) -> Result<RequestId, DispatchError> {
        if spec.earliest_pickup > spec.latest_pickup {
            return Err(DispatchError::InvalidPickupWindow {
                earliest: spec.earliest_pickup,
                latest: spec.latest_pickup,
            });
        }
        if spec.passengers == 0 {
            return Err(DispatchError::NoPassengers);
        }
        let id = RequestId(self.next_request_id);
        self.next_request_id += 1;
        self.requests.insert(id, Request::new(id, spec));
        tracing::debug!(request = %id, "request submitted");
        Ok(id)
    }

    /// Clock input. Runs a cycle when `now` reaches the next boundary.
    ///
    /// Boundaries passed without a tick of their own are skipped, not
    /// queued: at most one cycle runs per call.
    pub fn on_tick(&mut self, now: Time) -> CycleOutcome {
        if let Some(last) = self.last_tick {
            assert!(now >= last, "clock went backwards from {} to {}", last, now);
        }
        let first_tick = self.last_tick.replace(now).is_none();

        if now < self.next_cycle_at {
            return CycleOutcome::NotDue;
        }
        let interval = self.config.interval;
        let crossed = ((now - self.next_cycle_at) / interval).floor() as u64 + 1;
        // Boundaries before the first tick were never observed.
        if crossed > 1 && !first_tick {
            tracing::debug!(now, skipped = crossed - 1, "cycle boundaries skipped");
            self.stats.cycles_skipped += crossed - 1;
        }
        self.next_cycle_at += crossed as f64 * interval;

        self.run_cycle(now)
    }

    /// The snapshot a cycle at `now` would work from. Pure.
    pub fn snapshot(&self, now: Time) -> HorizonSnapshot {
        build_snapshot(now, self.config.horizon, &self.vehicles, &self.requests)
    }

    /// Runs one snapshot, solve and splice cycle at `now`, regardless of
    /// cycle boundaries.
    pub fn run_cycle(&mut self, now: Time) -> CycleOutcome {
        assert_eq!(self.state, CycleState::Idle, "dispatch cycles must not overlap");
        self.state = CycleState::Reoptimizing;
        let span = tracing::info_span!("dispatch_cycle", now);
        let _guard = span.enter();

        let snapshot = self.snapshot(now);
        for adjustment in &snapshot.adjustments {
            let request = self
                .requests
                .get_mut(&adjustment.request)
                .expect("snapshot adjustments reference known requests");
            if request.absorb_drift(adjustment.latest_pickup, adjustment.latest_arrival) {
                self.stats.bound_adjustments += 1;
                tracing::debug!(
                    request = %adjustment.request,
                    latest_pickup = request.effective_latest_pickup(),
                    latest_arrival = request.effective_latest_arrival(),
                    "bounds moved to planned times"
                );
            }
        }

        let outcome = match self.solve(&snapshot) {
            Ok(plan) => {
                let report = self.apply_plan(&snapshot, plan);
                tracing::info!(
                    vehicles = report.vehicles,
                    jobs = report.jobs,
                    assigned = report.assigned.len(),
                    rejected = report.rejected.len(),
                    "dispatch cycle completed"
                );
                CycleOutcome::Completed(report)
            }
            Err(err) => {
                self.stats.solver_failures += 1;
                tracing::warn!(error = %err, "re-optimization missed, keeping previous plan");
                CycleOutcome::Failed
            }
        };

        self.stats.cycles_run += 1;
        self.state = CycleState::Idle;
        outcome
    }

    fn solve(&self, snapshot: &HorizonSnapshot) -> Result<DecodedPlan, SolverError> {
        if snapshot.vehicles.is_empty() {
            // No fleet in service: every visible request goes unplaced.
            return Ok(DecodedPlan {
                unassigned: snapshot.fresh.iter().map(|trip| trip.request).collect(),
                ..DecodedPlan::default()
            });
        }
        let problem = encode_snapshot(snapshot, &self.config);
        let solution = self.solver.solve(&problem, self.oracle.as_ref())?;
        decode_solution(snapshot, &solution)
    }

    fn apply_plan(&mut self, snapshot: &HorizonSnapshot, mut plan: DecodedPlan) -> CycleReport {
        let now = snapshot.now;
        let service = self.config.per_stop_service_duration;
        let oracle = self.oracle.as_ref();

        let mut work: Vec<(&mut Vehicle, Vec<Stop>)> = self
            .vehicles
            .values_mut()
            .filter(|vehicle| snapshot.vehicle(vehicle.id).is_some())
            .map(|vehicle| {
                let stops = plan.stops.remove(&vehicle.id).unwrap_or_default();
                (vehicle, stops)
            })
            .collect();
        work.par_iter_mut().for_each(|(vehicle, stops)| {
            let service_end = vehicle.service_end;
            let summary = splice(vehicle.schedule_mut(), stops, now, service_end, service, oracle);
            tracing::trace!(
                vehicle = %vehicle.id,
                removed = summary.removed,
                appended = summary.appended,
                "schedule spliced"
            );
        });

        let mut report = CycleReport {
            now,
            vehicles: snapshot.vehicles.len(),
            jobs: snapshot.job_count(),
            adjustments: snapshot.adjustments.len(),
            ..CycleReport::default()
        };

        for (request_id, vehicle) in plan.placed {
            let request = self
                .requests
                .get_mut(&request_id)
                .expect("decoded plan references known requests");
            match request.state() {
                RequestState::Submitted => {
                    request.assign(vehicle);
                    self.stats.requests_assigned += 1;
                    report.assigned.push((request_id, vehicle));
                    self.events.publish(DispatchEvent::RequestAssigned {
                        request: request_id,
                        vehicle,
                    });
                }
                RequestState::Assigned => {
                    if request.vehicle() != Some(vehicle) {
                        tracing::debug!(request = %request_id, to = %vehicle, "request moved to another vehicle");
                    }
                    request.assign(vehicle);
                }
                RequestState::Onboard => {
                    assert_eq!(
                        request.vehicle(),
                        Some(vehicle),
                        "onboard request {} reassigned",
                        request_id
                    );
                }
                state => panic!("request {} placed while {:?}", request_id, state),
            }
        }

        for request_id in plan.unassigned {
            let request = self
                .requests
                .get_mut(&request_id)
                .expect("decoded plan references known requests");
            let reason = match request.state() {
                RequestState::Submitted => RejectReason::NoFeasibleInsertion,
                RequestState::Assigned => RejectReason::DroppedOnReoptimization,
                state => panic!("request {} left unassigned while {:?}", request_id, state),
            };
            request.reject();
            self.stats.requests_rejected += 1;
            report.rejected.push((request_id, reason));
            tracing::debug!(request = %request_id, ?reason, "request rejected");
            self.events.publish(DispatchEvent::RequestRejected {
                request: request_id,
                reason,
            });
        }

        report
    }

    /// Simulation callback: the vehicle finished its current task at `now`.
    ///
    /// The schedule moves on to the next task and the rest of the plan is
    /// shifted to stay contiguous. When the next task serves riders, they
    /// board or alight right away.
    pub fn on_task_ended(&mut self, vehicle_id: VehicleId, now: Time) -> Result<(), DispatchError> {
        let vehicle = self
            .vehicles
            .get_mut(&vehicle_id)
            .ok_or(DispatchError::UnknownVehicle(vehicle_id))?;
        let Some(task) = vehicle.schedule_mut().advance(now) else {
            return Ok(());
        };
        let stops = task.stops().to_vec();
        let time = task.start;

        for stop in stops {
            let request = self
                .requests
                .get_mut(&stop.request)
                .ok_or(DispatchError::UnknownRequest(stop.request))?;
            match stop.kind {
                StopKind::Pickup => {
                    request.board(vehicle_id);
                    self.stats.passengers_picked_up += 1;
                    self.events.publish(DispatchEvent::PassengerPickedUp {
                        request: stop.request,
                        vehicle: vehicle_id,
                        time,
                    });
                }
                StopKind::Dropoff => {
                    request.complete(vehicle_id);
                    self.stats.passengers_dropped_off += 1;
                    self.events.publish(DispatchEvent::PassengerDroppedOff {
                        request: stop.request,
                        vehicle: vehicle_id,
                        time,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::EuclideanOracle;
    use crate::solver::InsertionSolver;

    fn dispatcher(interval: f64) -> Dispatcher {
        let config = DispatchConfig {
            horizon: 600.0,
            interval,
            per_stop_service_duration: 30.0,
            ..DispatchConfig::default()
        };
        Dispatcher::new(
            config,
            Arc::new(EuclideanOracle::default()),
            Box::new(InsertionSolver::default()),
        )
        .expect("valid config")
    }

    #[test]
    fn rejects_invalid_config() {
        let config = DispatchConfig {
            horizon: 30.0,
            interval: 60.0,
            ..DispatchConfig::default()
        };
        let result = Dispatcher::new(
            config,
            Arc::new(EuclideanOracle::default()),
            Box::new(InsertionSolver::default()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn cycles_fire_on_boundaries_only() {
        let mut dispatcher = dispatcher(60.0);
        assert!(matches!(dispatcher.on_tick(0.0), CycleOutcome::Completed(_)));
        assert_eq!(dispatcher.on_tick(30.0), CycleOutcome::NotDue);
        assert!(matches!(dispatcher.on_tick(60.0), CycleOutcome::Completed(_)));
        assert_eq!(dispatcher.next_cycle_at(), 120.0);
        assert_eq!(dispatcher.stats().cycles_run, 2);
    }

    #[test]
    fn missed_boundaries_are_skipped_not_queued() {
        let mut dispatcher = dispatcher(60.0);
        dispatcher.on_tick(0.0);
        assert!(matches!(dispatcher.on_tick(250.0), CycleOutcome::Completed(_)));
        assert_eq!(dispatcher.stats().cycles_run, 2);
        assert_eq!(dispatcher.stats().cycles_skipped, 3);
        assert_eq!(dispatcher.next_cycle_at(), 300.0);
        assert_eq!(dispatcher.on_tick(250.0), CycleOutcome::NotDue);
    }

    #[test]
    fn late_first_tick_skips_nothing() {
        let mut dispatcher = dispatcher(60.0);
        assert!(matches!(dispatcher.on_tick(1000.0), CycleOutcome::Completed(_)));
        assert_eq!(dispatcher.stats().cycles_skipped, 0);
        assert_eq!(dispatcher.next_cycle_at(), 1020.0);

        dispatcher.on_tick(1200.0);
        assert_eq!(dispatcher.stats().cycles_skipped, 3);
        assert_eq!(dispatcher.next_cycle_at(), 1260.0);
    }

    #[test]
    #[should_panic(expected = "clock went backwards")]
    fn clock_must_not_regress() {
        let mut dispatcher = dispatcher(60.0);
        dispatcher.on_tick(100.0);
        dispatcher.on_tick(50.0);
    }

    #[test]
    fn submit_validates_pickup_window() {
        let mut dispatcher = dispatcher(60.0);
        let spec = RequestSpec::new((0.0, 0.0), (1.0, 0.0), 200.0, 100.0, 900.0);
        assert!(matches!(
            dispatcher.submit(spec),
            Err(DispatchError::InvalidPickupWindow { .. })
        ));
    }

    #[test]
    fn request_without_fleet_is_rejected() {
        let mut dispatcher = dispatcher(60.0);
        let events = dispatcher.subscribe();
        let id = dispatcher
            .submit(RequestSpec::new((0.0, 0.0), (1.0, 0.0), 0.0, 100.0, 900.0))
            .expect("valid request");
        dispatcher.on_tick(0.0);

        assert_eq!(dispatcher.request(id).map(|r| r.state()), Some(RequestState::Rejected));
        assert_eq!(
            events.try_iter().collect::<Vec<_>>(),
            vec![DispatchEvent::RequestRejected {
                request: id,
                reason: RejectReason::NoFeasibleInsertion,
            }]
        );
    }

    #[test]
    fn assignment_splices_stops_into_schedule() {
        let mut dispatcher = dispatcher(60.0);
        let vehicle = dispatcher
            .add_vehicle(VehicleSpec::new((0.0, 0.0), 0.0, 3600.0))
            .expect("vehicle");
        let request = dispatcher
            .submit(RequestSpec::new((10.0, 0.0), (20.0, 0.0), 0.0, 300.0, 900.0))
            .expect("request");

        let CycleOutcome::Completed(report) = dispatcher.on_tick(0.0) else {
            panic!("cycle should complete");
        };
        assert_eq!(report.assigned, vec![(request, vehicle)]);

        let schedule = dispatcher.vehicle(vehicle).expect("vehicle").schedule();
        let served: Vec<_> = schedule
            .planned()
            .iter()
            .flat_map(|task| task.stops().iter().map(|stop| stop.kind))
            .collect();
        assert_eq!(served, vec![StopKind::Pickup, StopKind::Dropoff]);
        assert!(schedule.last().is_stay());
    }

    #[test]
    fn unknown_vehicle_task_end_is_an_error() {
        let mut dispatcher = dispatcher(60.0);
        assert_eq!(
            dispatcher.on_task_ended(VehicleId(42), 0.0),
            Err(DispatchError::UnknownVehicle(VehicleId(42)))
        );
    }
}
