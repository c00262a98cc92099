//! Per-vehicle task queues.
//!
//! A schedule is a time-contiguous list of tasks with a cursor on the task
//! the simulation is executing. Tasks before the cursor are history, the
//! cursor task is ground truth, and only tasks after it are plan.

use crate::model::{Location, RequestId, Stop, StopKind, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum TaskKind {
    Drive { from: Location, distance: f64 },
    /// Hold at the location until a request may be served.
    Wait,
    /// Board and alight riders; every stop shares the task's location.
    Serve { stops: Vec<Stop> },
    Stay,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    /// Where the vehicle is when the task ends.
    pub location: Location,
    pub start: Time,
    pub end: Time,
}

impl Task {
    pub fn duration(&self) -> Time {
        self.end - self.start
    }

    pub fn is_stay(&self) -> bool {
        matches!(self.kind, TaskKind::Stay)
    }

    pub fn stops(&self) -> &[Stop] {
        match &self.kind {
            TaskKind::Serve { stops } => stops,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Schedule {
    tasks: Vec<Task>,
    cursor: usize,
    next_id: u64,
}

impl Schedule {
    /// A schedule holding one idle stay over the whole service window.
    pub fn new(location: Location, start: Time, end: Time) -> Self {
        let mut schedule = Self {
            tasks: Vec::new(),
            cursor: 0,
            next_id: 0,
        };
        schedule.push(TaskKind::Stay, location, start, end.max(start));
        schedule
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> &Task {
        &self.tasks[self.cursor]
    }

    /// Tasks after the cursor.
    pub fn planned(&self) -> &[Task] {
        &self.tasks[self.cursor + 1..]
    }

    pub fn last(&self) -> &Task {
        // A schedule is never empty.
        &self.tasks[self.tasks.len() - 1]
    }

    pub fn is_on_last_task(&self) -> bool {
        self.cursor + 1 == self.tasks.len()
    }

    /// Earliest point where the plan may change: now for an idle stay,
    /// the end of the current task otherwise.
    pub fn divertable_point(&self, now: Time) -> (Location, Time) {
        let current = self.current();
        if current.is_stay() {
            (current.location, now.clamp(current.start, current.end))
        } else {
            (current.location, current.end)
        }
    }

    /// Planned service start of every stop after the cursor.
    pub fn planned_stop_times(&self) -> Vec<(RequestId, StopKind, Time)> {
        self.planned()
            .iter()
            .flat_map(|task| {
                task.stops()
                    .iter()
                    .map(move |stop| (stop.request, stop.kind, task.start))
            })
            .collect()
    }

    /// Highest number of riders on board implied by the planned Serve
    /// tasks, starting from `onboard` riders at the cursor.
    pub fn max_occupancy(&self, onboard: u32) -> u32 {
        let mut load = onboard as i64;
        let mut peak = load;
        for task in self.planned() {
            let stops = task.stops();
            // Riders alight before new ones board.
            for stop in stops.iter().filter(|s| s.kind == StopKind::Dropoff) {
                load -= stop.passengers as i64;
            }
            for stop in stops.iter().filter(|s| s.kind == StopKind::Pickup) {
                load += stop.passengers as i64;
            }
            peak = peak.max(load);
        }
        peak.max(0) as u32
    }

    pub(crate) fn push(&mut self, kind: TaskKind, location: Location, start: Time, end: Time) -> TaskId {
        if let Some(last) = self.tasks.last() {
            assert!(
                last.end == start,
                "task starting at {} does not continue schedule ending at {}",
                start,
                last.end
            );
        }
        assert!(end >= start, "task ends at {} before it starts at {}", end, start);
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.push(Task {
            id,
            kind,
            location,
            start,
            end,
        });
        id
    }

    /// Cuts the current idle stay short at `now`.
    pub(crate) fn truncate_current_stay(&mut self, now: Time) {
        let current = &mut self.tasks[self.cursor];
        assert!(current.is_stay(), "only an idle stay may be truncated");
        current.end = now.clamp(current.start, current.end);
    }

    /// Drops every planned task. The current task is kept.
    pub(crate) fn clear_planned(&mut self) -> usize {
        let removed = self.tasks.len() - self.cursor - 1;
        self.tasks.truncate(self.cursor + 1);
        removed
    }

    /// Closes the current task at `now`, moves the cursor to the next one
    /// and shifts the remaining plan so the schedule stays contiguous.
    ///
    /// Drives and services keep their durations; waits and stays keep their
    /// planned end unless the shift already passes it.
    pub(crate) fn advance(&mut self, now: Time) -> Option<&Task> {
        if self.is_on_last_task() {
            return None;
        }
        let current = &mut self.tasks[self.cursor];
        current.end = now.max(current.start);
        let mut time = current.end;
        self.cursor += 1;
        for task in &mut self.tasks[self.cursor..] {
            let end = match task.kind {
                TaskKind::Drive { .. } | TaskKind::Serve { .. } => time + task.duration(),
                TaskKind::Wait | TaskKind::Stay => task.end.max(time),
            };
            task.start = time;
            task.end = end;
            time = end;
        }
        Some(&self.tasks[self.cursor])
    }
}
