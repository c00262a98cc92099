//! Discrete-event driver that executes dispatch plans exactly as scheduled.
//!
//! Vehicles finish their current task at its planned end, requests arrive at
//! their submission time and the dispatcher is ticked at every event. Events
//! at the same instant are applied in that order: task ends, submissions,
//! then the tick, so a cycle sees everything that happened at its own time.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::dispatcher::{CycleOutcome, CycleReport, Dispatcher};
use crate::error::DispatchError;
use crate::model::{RequestId, RequestSpec, Time, VehicleId};

#[derive(Debug, Clone)]
struct PendingSubmission {
    time: Time,
    sequence: u64,
    spec: RequestSpec,
}

impl PartialEq for PendingSubmission {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingSubmission {}

impl Ord for PendingSubmission {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap pops the earliest submission first.
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for PendingSubmission {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct Simulation {
    dispatcher: Dispatcher,
    pending: BinaryHeap<PendingSubmission>,
    next_sequence: u64,
    now: Time,
    submitted: Vec<RequestId>,
    refused: usize,
    reports: Vec<CycleReport>,
}

impl Simulation {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            pending: BinaryHeap::new(),
            next_sequence: 0,
            now: Time::NEG_INFINITY,
            submitted: Vec::new(),
            refused: 0,
            reports: Vec::new(),
        }
    }

    /// Queues a request for submission at its `submission_time`.
    pub fn schedule_request(&mut self, spec: RequestSpec) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.pending.push(PendingSubmission {
            time: spec.submission_time,
            sequence,
            spec,
        });
    }

    pub fn now(&self) -> Time {
        self.now
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    /// Ids of the requests submitted so far, in submission order.
    pub fn submitted(&self) -> &[RequestId] {
        &self.submitted
    }

    /// Submissions the dispatcher refused as malformed.
    pub fn refused(&self) -> usize {
        self.refused
    }

    /// Reports of every completed cycle.
    pub fn reports(&self) -> &[CycleReport] {
        &self.reports
    }

    /// Runs every event up to and including `end`.
    pub fn run_until(&mut self, end: Time) -> Result<(), DispatchError> {
        loop {
            let time = self.next_event_time();
            if time > end {
                break;
            }
            self.step(time.max(self.now))?;
        }
        self.now = self.now.max(end);
        Ok(())
    }

    fn next_event_time(&self) -> Time {
        let submission = self.pending.peek().map(|pending| pending.time);
        let task_end = self
            .dispatcher
            .vehicles()
            .filter(|vehicle| !vehicle.schedule().is_on_last_task())
            .map(|vehicle| vehicle.schedule().current().end)
            .reduce(f64::min);

        [submission, task_end]
            .into_iter()
            .flatten()
            .fold(self.dispatcher.next_cycle_at(), f64::min)
    }

    fn step(&mut self, now: Time) -> Result<(), DispatchError> {
        self.now = now;
        self.finish_tasks(now)?;

        while self.pending.peek().is_some_and(|pending| pending.time <= now) {
            let Some(pending) = self.pending.pop() else {
                break;
            };
            match self.dispatcher.submit(pending.spec) {
                Ok(id) => self.submitted.push(id),
                Err(err) => {
                    self.refused += 1;
                    tracing::warn!(error = %err, time = now, "submission refused");
                }
            }
        }

        if let CycleOutcome::Completed(report) = self.dispatcher.on_tick(now) {
            self.reports.push(report);
        }
        Ok(())
    }

    fn finish_tasks(&mut self, now: Time) -> Result<(), DispatchError> {
        let ids: Vec<VehicleId> = self.dispatcher.vehicles().map(|vehicle| vehicle.id).collect();
        for id in ids {
            while let Some(end) = self.due_task_end(id, now) {
                self.dispatcher.on_task_ended(id, end)?;
            }
        }
        Ok(())
    }

    fn due_task_end(&self, vehicle: VehicleId, now: Time) -> Option<Time> {
        let schedule = self.dispatcher.vehicle(vehicle)?.schedule();
        let end = schedule.current().end;
        (!schedule.is_on_last_task() && end <= now).then_some(end)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::DispatchConfig;
    use crate::model::{RequestState, VehicleSpec};
    use crate::oracle::EuclideanOracle;
    use crate::solver::InsertionSolver;

    fn simulation() -> Simulation {
        let config = DispatchConfig {
            horizon: 600.0,
            interval: 60.0,
            per_stop_service_duration: 30.0,
            ..DispatchConfig::default()
        };
        let dispatcher = Dispatcher::new(
            config,
            Arc::new(EuclideanOracle::default()),
            Box::new(InsertionSolver::default()),
        )
        .expect("valid config");
        Simulation::new(dispatcher)
    }

    #[test]
    fn submissions_pop_in_time_order() {
        let mut heap = BinaryHeap::new();
        for (sequence, time) in [30.0, 10.0, 20.0, 10.0].into_iter().enumerate() {
            heap.push(PendingSubmission {
                time,
                sequence: sequence as u64,
                spec: RequestSpec::new((0.0, 0.0), (1.0, 0.0), time, time, time + 100.0),
            });
        }
        let order: Vec<_> = std::iter::from_fn(|| heap.pop())
            .map(|pending| (pending.time, pending.sequence))
            .collect();
        assert_eq!(order, vec![(10.0, 1), (10.0, 3), (20.0, 2), (30.0, 0)]);
    }

    #[test]
    fn single_request_is_served_end_to_end() {
        let mut sim = simulation();
        sim.dispatcher_mut()
            .add_vehicle(VehicleSpec::new((0.0, 0.0), 0.0, 3600.0))
            .expect("vehicle");
        sim.schedule_request(
            RequestSpec::new((20.0, 0.0), (80.0, 0.0), 30.0, 300.0, 900.0).submitted_at(10.0),
        );

        sim.run_until(1200.0).expect("simulation runs");

        let id = sim.submitted()[0];
        let request = sim.dispatcher().request(id).expect("request");
        assert_eq!(request.state(), RequestState::Completed);
        assert_eq!(sim.dispatcher().stats().passengers_dropped_off, 1);
        assert_eq!(sim.now(), 1200.0);
    }

    #[test]
    fn malformed_submission_is_counted_not_fatal() {
        let mut sim = simulation();
        sim.schedule_request(RequestSpec::new((0.0, 0.0), (1.0, 0.0), 50.0, 10.0, 100.0));
        sim.run_until(100.0).expect("simulation runs");
        assert_eq!(sim.refused(), 1);
        assert!(sim.submitted().is_empty());
    }
}
