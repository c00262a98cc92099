//! Pairwise shareability of trip requests.
//!
//! Two trips are shareable when one vehicle can serve both within their
//! time windows. Only the four visit orders that keep each pickup ahead
//! of its own dropoff are considered. Over a whole demand set, the pair
//! scores feed a greedy matching that yields the fraction of trips that
//! could ride together.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::model::{Location, Request, RequestSpec, Time};
use crate::traits::TravelTimeOracle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareabilityParams {
    /// Seconds spent at every pickup and dropoff.
    pub service_duration: f64,
    /// Allowed delay between earliest and latest pickup, for derived bounds.
    pub max_wait_time: f64,
    /// Detour factor on the direct travel time, for derived bounds.
    pub alpha: f64,
    /// Constant detour allowance in seconds, for derived bounds.
    pub beta: f64,
    pub vehicle_capacity: u32,
}

impl Default for ShareabilityParams {
    fn default() -> Self {
        Self {
            service_duration: 60.0,
            max_wait_time: 600.0,
            alpha: 1.5,
            beta: 300.0,
            vehicle_capacity: 4,
        }
    }
}

/// The part of a request the evaluator looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct TripWindow {
    pub origin: Location,
    pub destination: Location,
    pub earliest_pickup: Time,
    pub latest_pickup: Time,
    pub latest_arrival: Time,
    pub passengers: u32,
}

impl TripWindow {
    /// Window of a live request, using its current effective bounds.
    pub fn from_request(request: &Request) -> Self {
        Self {
            origin: request.origin,
            destination: request.destination,
            earliest_pickup: request.earliest_pickup,
            latest_pickup: request.effective_latest_pickup(),
            latest_arrival: request.effective_latest_arrival(),
            passengers: request.passengers,
        }
    }

    pub fn from_spec(spec: &RequestSpec) -> Self {
        Self {
            origin: spec.origin,
            destination: spec.destination,
            earliest_pickup: spec.earliest_pickup,
            latest_pickup: spec.latest_pickup,
            latest_arrival: spec.latest_arrival,
            passengers: spec.passengers,
        }
    }

    /// Bounds derived from the earliest pickup alone:
    /// `earliest + max_wait_time` for pickup and
    /// `earliest + alpha * direct + beta` for arrival.
    pub fn derive(
        origin: Location,
        destination: Location,
        earliest_pickup: Time,
        params: &ShareabilityParams,
        oracle: &dyn TravelTimeOracle,
    ) -> Self {
        let direct = oracle.travel_time(origin, destination, earliest_pickup);
        Self {
            origin,
            destination,
            earliest_pickup,
            latest_pickup: earliest_pickup + params.max_wait_time,
            latest_arrival: earliest_pickup + params.alpha * direct + params.beta,
            passengers: 1,
        }
    }
}

/// A precedence-preserving visit order for two trips, 1 and 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisitOrder {
    O1O2D1D2,
    O1O2D2D1,
    O2O1D1D2,
    O2O1D2D1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Pickup(usize),
    Dropoff(usize),
}

impl VisitOrder {
    pub const ALL: [VisitOrder; 4] = [
        VisitOrder::O1O2D1D2,
        VisitOrder::O1O2D2D1,
        VisitOrder::O2O1D1D2,
        VisitOrder::O2O1D2D1,
    ];

    fn visits(self) -> [Visit; 4] {
        use Visit::*;
        match self {
            VisitOrder::O1O2D1D2 => [Pickup(0), Pickup(1), Dropoff(0), Dropoff(1)],
            VisitOrder::O1O2D2D1 => [Pickup(0), Pickup(1), Dropoff(1), Dropoff(0)],
            VisitOrder::O2O1D1D2 => [Pickup(1), Pickup(0), Dropoff(0), Dropoff(1)],
            VisitOrder::O2O1D2D1 => [Pickup(1), Pickup(0), Dropoff(1), Dropoff(0)],
        }
    }

    fn index(self) -> usize {
        match self {
            VisitOrder::O1O2D1D2 => 0,
            VisitOrder::O1O2D2D1 => 1,
            VisitOrder::O2O1D1D2 => 2,
            VisitOrder::O2O1D2D1 => 3,
        }
    }
}

/// Outcome of walking all four orders for one pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairEvaluation {
    /// Total drive time per order, `None` where a window was violated.
    drive_times: [Option<f64>; 4],
    /// Direct travel times of trip 1 and trip 2.
    pub direct: (f64, f64),
}

impl PairEvaluation {
    pub fn drive_time(&self, order: VisitOrder) -> Option<f64> {
        self.drive_times[order.index()]
    }

    pub fn is_feasible(&self) -> bool {
        self.drive_times.iter().any(Option::is_some)
    }

    /// Cheapest feasible order and its drive time. Ties keep the earlier order.
    pub fn best(&self) -> Option<(VisitOrder, f64)> {
        VisitOrder::ALL
            .iter()
            .filter_map(|&order| self.drive_time(order).map(|time| (order, time)))
            .fold(None, |best, candidate| match best {
                Some((_, time)) if time <= candidate.1 => best,
                _ => Some(candidate),
            })
    }

    /// Direct times over the pooled drive time. Above 1 means pooling saves
    /// driving; 0 when the pair cannot be shared.
    pub fn savings(&self) -> f64 {
        let Some((_, pooled)) = self.best() else {
            return 0.0;
        };
        if pooled <= 0.0 {
            // Degenerate trips with coincident stops.
            return 0.0;
        }
        (self.direct.0 + self.direct.1) / pooled
    }
}

pub struct ShareabilityEvaluator<'a> {
    oracle: &'a dyn TravelTimeOracle,
    params: ShareabilityParams,
}

impl<'a> ShareabilityEvaluator<'a> {
    pub fn new(oracle: &'a dyn TravelTimeOracle, params: ShareabilityParams) -> Self {
        Self { oracle, params }
    }

    pub fn params(&self) -> &ShareabilityParams {
        &self.params
    }

    pub fn evaluate(&self, first: &TripWindow, second: &TripWindow) -> PairEvaluation {
        let trips = [first, second];
        let direct = (
            self.oracle
                .travel_time(first.origin, first.destination, first.earliest_pickup),
            self.oracle
                .travel_time(second.origin, second.destination, second.earliest_pickup),
        );

        let mut drive_times = [None; 4];
        if first.passengers + second.passengers <= self.params.vehicle_capacity {
            for order in VisitOrder::ALL {
                drive_times[order.index()] = self.walk(&trips, order);
            }
        }
        PairEvaluation { drive_times, direct }
    }

    /// Savings score of a pair, 0 when infeasible.
    pub fn savings(&self, first: &TripWindow, second: &TripWindow) -> f64 {
        self.evaluate(first, second).savings()
    }

    /// Cheap admissibility test before handing both trips to a solver.
    pub fn can_share(&self, first: &TripWindow, second: &TripWindow) -> bool {
        self.evaluate(first, second).is_feasible()
    }

    fn walk(&self, trips: &[&TripWindow; 2], order: VisitOrder) -> Option<f64> {
        let service = self.params.service_duration;
        let visits = order.visits();

        let Visit::Pickup(first) = visits[0] else {
            unreachable!("every order starts with a pickup");
        };
        let mut location = trips[first].origin;
        let mut clock = trips[first].earliest_pickup + service;
        let mut driven = 0.0;

        for visit in &visits[1..] {
            let (target, trip) = match *visit {
                Visit::Pickup(i) => (trips[i].origin, trips[i]),
                Visit::Dropoff(i) => (trips[i].destination, trips[i]),
            };
            let leg = self.oracle.travel_time(location, target, clock);
            let arrival = clock + leg;
            driven += leg;
            clock = match *visit {
                Visit::Pickup(_) => {
                    if arrival > trip.latest_pickup {
                        return None;
                    }
                    arrival.max(trip.earliest_pickup) + service
                }
                Visit::Dropoff(_) => {
                    if arrival > trip.latest_arrival {
                        return None;
                    }
                    arrival + service
                }
            };
            location = target;
        }
        Some(driven)
    }
}

/// Symmetric matrix of pair savings scores with a zero diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareabilityMatrix {
    scores: Vec<Vec<f64>>,
}

impl ShareabilityMatrix {
    pub fn build(evaluator: &ShareabilityEvaluator<'_>, trips: &[TripWindow]) -> Self {
        let n = trips.len();
        let upper: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                (i + 1..n)
                    .map(|j| evaluator.savings(&trips[i], &trips[j]))
                    .collect()
            })
            .collect();

        let mut scores = vec![vec![0.0; n]; n];
        for (i, row) in upper.into_iter().enumerate() {
            for (offset, score) in row.into_iter().enumerate() {
                let j = i + 1 + offset;
                scores[i][j] = score;
                scores[j][i] = score;
            }
        }
        Self { scores }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn score(&self, i: usize, j: usize) -> f64 {
        self.scores[i][j]
    }

    /// Repeatedly takes the highest-scoring pair and removes both trips,
    /// until no positive score is left.
    pub fn greedy_pairs(&self) -> Vec<(usize, usize, f64)> {
        let mut scores = self.scores.clone();
        let n = scores.len();
        let mut pairs = Vec::new();

        loop {
            let mut best: Option<(usize, usize, f64)> = None;
            for i in 0..n {
                for j in i + 1..n {
                    let score = scores[i][j];
                    if score > 0.0 && best.is_none_or(|(_, _, top)| score > top) {
                        best = Some((i, j, score));
                    }
                }
            }
            let Some((i, j, score)) = best else {
                break;
            };
            pairs.push((i, j, score));
            for k in 0..n {
                scores[i][k] = 0.0;
                scores[k][i] = 0.0;
                scores[j][k] = 0.0;
                scores[k][j] = 0.0;
            }
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShareabilityReport {
    pub trips: usize,
    pub pairs: Vec<(usize, usize, f64)>,
    /// Paired trips over all trips.
    pub shareability: f64,
}

/// Scores every pair of `trips` and matches them greedily.
pub fn analyze(evaluator: &ShareabilityEvaluator<'_>, trips: &[TripWindow]) -> ShareabilityReport {
    let matrix = ShareabilityMatrix::build(evaluator, trips);
    let pairs = matrix.greedy_pairs();
    let shareability = if trips.is_empty() {
        0.0
    } else {
        (2 * pairs.len()) as f64 / trips.len() as f64
    };
    tracing::info!(trips = trips.len(), pairs = pairs.len(), shareability, "shareability analysis");
    ShareabilityReport {
        trips: trips.len(),
        pairs,
        shareability,
    }
}
