//! Greedy pickup-and-delivery solver (baseline implementation).
//!
//! Jobs are inserted one by one, most committed first, at the cheapest
//! feasible pickup/dropoff position pair over all allowed vehicles. A
//! relocate local search then moves free jobs between routes while total
//! drive time drops. Good enough for tests and small fleets; real
//! deployments plug in a metaheuristic through [`BatchSolver`].

use std::collections::HashMap;
use std::time::Instant;

use rayon::prelude::*;

use crate::error::SolverError;
use crate::model::{Location, StopKind};
use crate::problem::{
    JobPriority, SolverActivity, SolverActivityRef, SolverJob, SolverProblem, SolverRoute,
    SolverSolution, SolverVehicle,
};
use crate::traits::{BatchSolver, TravelTimeOracle};

/// Slack for floating point time comparisons.
const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Run the relocate phase after construction.
    pub local_search: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self { local_search: true }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InsertionSolver {
    pub options: SolveOptions,
}

impl InsertionSolver {
    pub fn new(options: SolveOptions) -> Self {
        Self { options }
    }
}

impl BatchSolver for InsertionSolver {
    fn solve(
        &self,
        problem: &SolverProblem,
        oracle: &dyn TravelTimeOracle,
    ) -> Result<SolverSolution, SolverError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(problem.thread_count.max(1))
            .build()?;
        Ok(pool.install(|| self.solve_in_pool(problem, oracle)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Act {
    job: usize,
    kind: StopKind,
}

#[derive(Debug, Clone)]
struct RouteState<'a> {
    vehicle: &'a SolverVehicle,
    acts: Vec<Act>,
    cost: f64,
}

/// Travel times between every pair of distinct problem locations.
struct TravelMatrix {
    index: HashMap<String, usize>,
    times: Vec<Vec<f64>>,
}

impl TravelMatrix {
    fn build(problem: &SolverProblem, oracle: &dyn TravelTimeOracle) -> Self {
        let locations = collect_locations(problem);
        let index = location_index(&locations);
        let times = locations
            .par_iter()
            .map(|from| {
                locations
                    .iter()
                    .map(|to| {
                        if from == to {
                            0.0
                        } else {
                            oracle.travel_time(*from, *to, problem.now)
                        }
                    })
                    .collect()
            })
            .collect();
        Self { index, times }
    }

    fn time(&self, from: Location, to: Location) -> f64 {
        let from_idx = self.index[&location_key(from)];
        let to_idx = self.index[&location_key(to)];
        self.times[from_idx][to_idx]
    }
}

struct Search<'a> {
    problem: &'a SolverProblem,
    matrix: TravelMatrix,
}

impl InsertionSolver {
    fn solve_in_pool(&self, problem: &SolverProblem, oracle: &dyn TravelTimeOracle) -> SolverSolution {
        let started = Instant::now();
        let search = Search {
            problem,
            matrix: TravelMatrix::build(problem, oracle),
        };

        let mut routes: Vec<RouteState<'_>> = problem
            .vehicles
            .iter()
            .map(|vehicle| RouteState {
                vehicle,
                acts: Vec::new(),
                cost: 0.0,
            })
            .collect();

        let mut order: Vec<usize> = (0..problem.jobs.len()).collect();
        order.sort_by(|&a, &b| {
            let (ja, jb) = (&problem.jobs[a], &problem.jobs[b]);
            jb.priority
                .cmp(&ja.priority)
                .then_with(|| ja.pickup.window.end.total_cmp(&jb.pickup.window.end))
                .then_with(|| ja.request.cmp(&jb.request))
        });

        let mut unassigned = Vec::new();
        for job in order {
            match search.best_insertion(&routes, job, None) {
                Some(candidate) => candidate.apply(&mut routes),
                None => unassigned.push(problem.jobs[job].request),
            }
        }

        if self.options.local_search {
            for round in 0..problem.iteration_budget {
                if problem
                    .time_budget
                    .is_some_and(|budget| started.elapsed() >= budget)
                {
                    tracing::debug!(round, "solver time budget exhausted");
                    break;
                }
                if !search.relocate_improve(&mut routes) {
                    break;
                }
            }
        }

        let total: f64 = routes.iter().map(|route| route.cost).sum();
        tracing::debug!(
            jobs = problem.jobs.len(),
            unassigned = unassigned.len(),
            total_drive_time = total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "insertion solver finished"
        );

        let routes = routes
            .into_iter()
            .map(|route| SolverRoute {
                vehicle: route.vehicle.id,
                activities: route
                    .acts
                    .iter()
                    .map(|act| SolverActivityRef {
                        request: problem.jobs[act.job].request,
                        kind: act.kind,
                    })
                    .collect(),
            })
            .collect();
        unassigned.sort();

        SolverSolution { routes, unassigned }
    }
}

/// A feasible way to put one job into one route.
struct Candidate {
    route: usize,
    acts: Vec<Act>,
    cost: f64,
    delta: f64,
}

impl Candidate {
    fn apply(self, routes: &mut [RouteState<'_>]) {
        let route = &mut routes[self.route];
        route.acts = self.acts;
        route.cost = self.cost;
    }
}

impl<'a> Search<'a> {
    fn job(&self, job: usize) -> &'a SolverJob {
        &self.problem.jobs[job]
    }

    fn activity(&self, act: Act) -> &'a SolverActivity {
        let job = self.job(act.job);
        match act.kind {
            StopKind::Pickup => &job.pickup,
            StopKind::Dropoff => &job.dropoff,
        }
    }

    /// Drive time of the route, or None when a window, the capacity or the
    /// vehicle's service end is violated.
    fn evaluate(&self, vehicle: &SolverVehicle, acts: &[Act]) -> Option<f64> {
        let mut time = vehicle.start_time;
        let mut location = vehicle.start;
        let mut load: u32 = 0;
        let mut drive = 0.0;

        for &act in acts {
            let activity = self.activity(act);
            let travel = self.matrix.time(location, activity.location);
            drive += travel;
            time += travel;
            if time > activity.window.end + EPSILON {
                return None;
            }
            time = time.max(activity.window.start);

            let job = self.job(act.job);
            let demand = job.demand;
            match act.kind {
                StopKind::Pickup => {
                    // New riders are only picked up while the vehicle is in service.
                    if job.priority != JobPriority::Onboard && time > vehicle.end_time + EPSILON {
                        return None;
                    }
                    load += demand;
                    if load > vehicle.capacity {
                        return None;
                    }
                }
                StopKind::Dropoff => load = load.saturating_sub(demand),
            }
            time += activity.duration;
            location = activity.location;
        }

        Some(drive)
    }

    fn allowed(&self, job: usize, vehicle: &SolverVehicle) -> bool {
        self.job(job).affinity.is_none_or(|id| id == vehicle.id)
    }

    /// Cheapest feasible insertion of `job`, optionally skipping one route.
    fn best_insertion(&self, routes: &[RouteState<'_>], job: usize, skip: Option<usize>) -> Option<Candidate> {
        routes
            .par_iter()
            .enumerate()
            .filter(|(idx, route)| Some(*idx) != skip && self.allowed(job, route.vehicle))
            .filter_map(|(idx, route)| self.best_in_route(idx, route, job))
            .min_by(|a, b| {
                a.delta
                    .total_cmp(&b.delta)
                    .then_with(|| a.route.cmp(&b.route))
            })
    }

    fn best_in_route(&self, route_idx: usize, route: &RouteState<'_>, job: usize) -> Option<Candidate> {
        let n = route.acts.len();
        let mut best: Option<Candidate> = None;
        for i in 0..=n {
            for j in i..=n {
                let mut acts = Vec::with_capacity(n + 2);
                acts.extend_from_slice(&route.acts[..i]);
                acts.push(Act {
                    job,
                    kind: StopKind::Pickup,
                });
                acts.extend_from_slice(&route.acts[i..j]);
                acts.push(Act {
                    job,
                    kind: StopKind::Dropoff,
                });
                acts.extend_from_slice(&route.acts[j..]);

                if let Some(cost) = self.evaluate(route.vehicle, &acts) {
                    let delta = cost - route.cost;
                    if best.as_ref().is_none_or(|b| delta < b.delta - EPSILON) {
                        best = Some(Candidate {
                            route: route_idx,
                            acts,
                            cost,
                            delta,
                        });
                    }
                }
            }
        }
        best
    }

    /// Relocate: move one free job to a cheaper position in another route.
    /// Returns true if an improvement was made.
    fn relocate_improve(&self, routes: &mut [RouteState<'_>]) -> bool {
        for from in 0..routes.len() {
            let jobs: Vec<usize> = routes[from]
                .acts
                .iter()
                .filter(|act| act.kind == StopKind::Pickup)
                .map(|act| act.job)
                .filter(|&job| self.job(job).affinity.is_none())
                .collect();

            for job in jobs {
                let remaining: Vec<Act> = routes[from]
                    .acts
                    .iter()
                    .copied()
                    .filter(|act| act.job != job)
                    .collect();
                // Removing a job can break a later window when the removal
                // shifts nothing earlier; only take moves that stay feasible.
                let Some(remaining_cost) = self.evaluate(routes[from].vehicle, &remaining) else {
                    continue;
                };
                let saving = routes[from].cost - remaining_cost;

                let Some(candidate) = self.best_insertion(routes, job, Some(from)) else {
                    continue;
                };
                if candidate.delta < saving - EPSILON {
                    routes[from].acts = remaining;
                    routes[from].cost = remaining_cost;
                    candidate.apply(routes);
                    return true;
                }
            }
        }

        false
    }
}

fn collect_locations(problem: &SolverProblem) -> Vec<Location> {
    let mut locations = Vec::new();
    for vehicle in &problem.vehicles {
        locations.push(vehicle.start);
    }
    for job in &problem.jobs {
        locations.push(job.pickup.location);
        locations.push(job.dropoff.location);
    }

    dedupe_locations(locations)
}

fn dedupe_locations(locations: Vec<Location>) -> Vec<Location> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut unique = Vec::new();
    for location in locations {
        let key = location_key(location);
        if seen.contains_key(&key) {
            continue;
        }
        seen.insert(key, unique.len());
        unique.push(location);
    }
    unique
}

fn location_key(location: Location) -> String {
    format!("{:.6},{:.6}", location.0, location.1)
}

fn location_index(locations: &[Location]) -> HashMap<String, usize> {
    let mut index = HashMap::new();
    for (i, location) in locations.iter().enumerate() {
        index.insert(location_key(*location), i);
    }
    index
}
