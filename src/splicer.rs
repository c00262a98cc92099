//! Rewrites the planned part of a vehicle schedule from an ordered stop list.

use crate::model::{Location, Stop, Time};
use crate::schedule::{Schedule, TaskKind};
use crate::traits::TravelTimeOracle;

/// What a splice changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpliceSummary {
    pub removed: usize,
    pub appended: usize,
}

/// Replaces everything after the current task with drives, waits and
/// services realizing `stops`, closed by an idle stay until `service_end`.
///
/// The current task keeps its identity and end time, except an idle stay,
/// which is cut short at `now` so the vehicle can leave right away.
/// Consecutive stops at one location that are due together collapse into a
/// single service.
pub fn splice(
    schedule: &mut Schedule,
    stops: &[Stop],
    now: Time,
    service_end: Time,
    service_duration: Time,
    oracle: &dyn TravelTimeOracle,
) -> SpliceSummary {
    let current_id = schedule.current().id;
    if schedule.current().is_stay() {
        schedule.truncate_current_stay(now);
    }
    let removed = schedule.clear_planned();

    let mut location: Location = schedule.current().location;
    let mut time = schedule.current().end;
    let mut appended = 0;

    for group in stops.chunk_by(|a, b| a.location == b.location) {
        let target = group[0].location;
        if target != location {
            let leg = oracle.time_and_distance(location, target, time);
            let arrival = time + leg.seconds;
            schedule.push(
                TaskKind::Drive {
                    from: location,
                    distance: leg.meters,
                },
                target,
                time,
                arrival,
            );
            appended += 1;
            location = target;
            time = arrival;
        }

        // Stops already due are served before waiting for later pickups.
        let mut rest = group;
        while let Some(first) = rest.first() {
            if first.not_before > time {
                schedule.push(TaskKind::Wait, location, time, first.not_before);
                appended += 1;
                time = first.not_before;
            }
            let due = rest.iter().take_while(|stop| stop.not_before <= time).count();
            let (served, later) = rest.split_at(due);

            let done = time + service_duration;
            schedule.push(
                TaskKind::Serve {
                    stops: served.to_vec(),
                },
                location,
                time,
                done,
            );
            appended += 1;
            time = done;
            rest = later;
        }
    }

    schedule.push(TaskKind::Stay, location, time, service_end.max(time));
    appended += 1;

    assert_eq!(
        schedule.current().id,
        current_id,
        "splicing replaced the task being executed"
    );
    SpliceSummary { removed, appended }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RequestId, StopKind};
    use crate::oracle::EuclideanOracle;

    fn stop(request: u64, kind: StopKind, location: Location, not_before: Time) -> Stop {
        Stop {
            request: RequestId(request),
            kind,
            location,
            not_before,
            passengers: 1,
        }
    }

    fn kinds(schedule: &Schedule) -> Vec<&'static str> {
        schedule
            .planned()
            .iter()
            .map(|task| match task.kind {
                TaskKind::Drive { .. } => "drive",
                TaskKind::Wait => "wait",
                TaskKind::Serve { .. } => "serve",
                TaskKind::Stay => "stay",
            })
            .collect()
    }

    #[test]
    fn idle_vehicle_leaves_now() {
        let mut schedule = Schedule::new((0.0, 0.0), 0.0, 1000.0);
        let stops = vec![
            stop(1, StopKind::Pickup, (10.0, 0.0), 0.0),
            stop(1, StopKind::Dropoff, (20.0, 0.0), Time::NEG_INFINITY),
        ];
        let summary = splice(&mut schedule, &stops, 100.0, 1000.0, 30.0, &EuclideanOracle::new(1.0));

        assert_eq!(schedule.current().end, 100.0);
        assert_eq!(kinds(&schedule), vec!["drive", "serve", "drive", "serve", "stay"]);
        let planned = schedule.planned();
        assert_eq!((planned[0].start, planned[0].end), (100.0, 110.0));
        assert_eq!((planned[1].start, planned[1].end), (110.0, 140.0));
        assert_eq!((planned[3].start, planned[3].end), (150.0, 180.0));
        assert_eq!((planned[4].start, planned[4].end), (180.0, 1000.0));
        assert_eq!(summary, SpliceSummary { removed: 0, appended: 5 });
    }

    #[test]
    fn early_arrival_waits_for_the_rider() {
        let mut schedule = Schedule::new((0.0, 0.0), 0.0, 1000.0);
        let stops = vec![stop(1, StopKind::Pickup, (10.0, 0.0), 300.0)];
        splice(&mut schedule, &stops, 0.0, 1000.0, 30.0, &EuclideanOracle::new(1.0));

        assert_eq!(kinds(&schedule), vec!["drive", "wait", "serve", "stay"]);
        let wait = &schedule.planned()[1];
        assert_eq!((wait.start, wait.end), (10.0, 300.0));
        assert_eq!(schedule.planned()[2].start, 300.0);
    }

    #[test]
    fn active_drive_is_untouched_and_new_plan_starts_at_its_end() {
        let oracle = EuclideanOracle::new(1.0);
        let mut schedule = Schedule::new((0.0, 0.0), 0.0, 2000.0);
        // Vehicle is driving to L = (100, 0), arriving at t = 500.
        splice(
            &mut schedule,
            &[stop(9, StopKind::Pickup, (100.0, 0.0), 0.0)],
            400.0,
            2000.0,
            30.0,
            &oracle,
        );
        schedule.advance(400.0);
        let drive_id = schedule.current().id;
        assert_eq!(schedule.current().end, 500.0);

        splice(
            &mut schedule,
            &[stop(2, StopKind::Pickup, (100.0, 50.0), 400.0)],
            400.0,
            2000.0,
            30.0,
            &oracle,
        );

        assert_eq!(schedule.current().id, drive_id);
        assert_eq!(schedule.current().end, 500.0);
        let next = &schedule.planned()[0];
        assert!(matches!(next.kind, TaskKind::Drive { .. }));
        assert_eq!((next.start, next.end), (500.0, 550.0));
    }

    #[test]
    fn shared_location_collapses_into_one_service() {
        let mut schedule = Schedule::new((0.0, 0.0), 0.0, 1000.0);
        let stops = vec![
            stop(1, StopKind::Pickup, (5.0, 0.0), 0.0),
            stop(2, StopKind::Pickup, (5.0, 0.0), 0.0),
            stop(1, StopKind::Dropoff, (8.0, 0.0), Time::NEG_INFINITY),
            stop(2, StopKind::Dropoff, (8.0, 0.0), Time::NEG_INFINITY),
        ];
        splice(&mut schedule, &stops, 0.0, 1000.0, 30.0, &EuclideanOracle::new(1.0));

        assert_eq!(kinds(&schedule), vec!["drive", "serve", "drive", "serve", "stay"]);
        assert_eq!(schedule.planned()[1].stops().len(), 2);
        assert_eq!(schedule.planned()[3].stops().len(), 2);
        assert_eq!(schedule.max_occupancy(0), 2);
    }

    #[test]
    fn resplice_replaces_previous_plan() {
        let oracle = EuclideanOracle::new(1.0);
        let mut schedule = Schedule::new((0.0, 0.0), 0.0, 1000.0);
        splice(
            &mut schedule,
            &[stop(1, StopKind::Pickup, (10.0, 0.0), 0.0)],
            0.0,
            1000.0,
            30.0,
            &oracle,
        );
        schedule.advance(0.0);

        let summary = splice(&mut schedule, &[], 5.0, 1000.0, 30.0, &oracle);
        assert_eq!(summary.removed, 2);
        assert_eq!(kinds(&schedule), vec!["stay"]);
        assert_eq!(schedule.planned()[0].start, 10.0);
    }

    #[test]
    fn past_service_end_closes_with_zero_length_stay() {
        let mut schedule = Schedule::new((0.0, 0.0), 0.0, 100.0);
        let stops = vec![stop(1, StopKind::Dropoff, (200.0, 0.0), Time::NEG_INFINITY)];
        splice(&mut schedule, &stops, 50.0, 100.0, 30.0, &EuclideanOracle::new(1.0));

        let last = schedule.last();
        assert!(last.is_stay());
        assert_eq!(last.start, 280.0);
        assert_eq!(last.duration(), 0.0);
    }
    #[test]
    fn due_dropoff_is_not_held_for_later_pickup() {
        let mut schedule = Schedule::new((0.0, 0.0), 0.0, 1000.0);
        let stops = vec![
            stop(1, StopKind::Pickup, (0.0, 0.0), 0.0),
            stop(1, StopKind::Dropoff, (10.0, 0.0), Time::NEG_INFINITY),
            stop(2, StopKind::Pickup, (10.0, 0.0), 300.0),
            stop(2, StopKind::Dropoff, (20.0, 0.0), Time::NEG_INFINITY),
        ];
        splice(&mut schedule, &stops, 0.0, 1000.0, 30.0, &EuclideanOracle::new(1.0));

        assert_eq!(
            kinds(&schedule),
            vec!["serve", "drive", "serve", "wait", "serve", "drive", "serve", "stay"]
        );
        let planned = schedule.planned();
        let dropoff = &planned[2];
        assert_eq!(dropoff.stops(), &stops[1..2]);
        assert_eq!((dropoff.start, dropoff.end), (40.0, 70.0));
        assert_eq!((planned[3].start, planned[3].end), (70.0, 300.0));
        assert_eq!(planned[4].stops(), &stops[2..3]);
        assert_eq!(planned[4].start, 300.0);
    }

    #[test]
    fn stops_due_during_service_join_the_next_service() {
        let mut schedule = Schedule::new((0.0, 0.0), 0.0, 1000.0);
        let stops = vec![
            stop(1, StopKind::Pickup, (10.0, 0.0), 0.0),
            stop(2, StopKind::Pickup, (10.0, 0.0), 20.0),
            stop(3, StopKind::Pickup, (10.0, 0.0), 30.0),
        ];
        splice(&mut schedule, &stops, 0.0, 1000.0, 30.0, &EuclideanOracle::new(1.0));

        assert_eq!(kinds(&schedule), vec!["drive", "serve", "serve", "stay"]);
        let planned = schedule.planned();
        assert_eq!(planned[1].stops(), &stops[..1]);
        assert_eq!(planned[1].start, 10.0);
        assert_eq!(planned[2].stops(), &stops[1..]);
        assert_eq!(planned[2].start, 40.0);
    }
}
