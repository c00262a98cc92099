//! Planar travel-time oracle.
//!
//! Straight-line distance at a constant speed over planar coordinates.
//! Used for synthetic demand studies and deterministic tests where a road
//! network would only get in the way.

use crate::model::{Location, Time};
use crate::traits::{TravelEstimate, TravelTimeOracle};

#[derive(Debug, Clone)]
pub struct EuclideanOracle {
    /// Distance units per second.
    pub speed: f64,
}

impl Default for EuclideanOracle {
    fn default() -> Self {
        Self { speed: 1.0 }
    }
}

impl EuclideanOracle {
    pub fn new(speed: f64) -> Self {
        assert!(speed > 0.0, "speed must be positive");
        Self { speed }
    }

    pub fn distance(from: Location, to: Location) -> f64 {
        (to.0 - from.0).hypot(to.1 - from.1)
    }
}

impl TravelTimeOracle for EuclideanOracle {
    fn time_and_distance(&self, from: Location, to: Location, _departure: Time) -> TravelEstimate {
        let distance = Self::distance(from, to);
        TravelEstimate::new(distance / self.speed, distance)
    }
}
