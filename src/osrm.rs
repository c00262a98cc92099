//! OSRM HTTP adapter for travel times.
//!
//! Answers are memoized per location pair so repeated cycles see the same
//! numbers even if the server's data changes underneath. When OSRM cannot
//! answer, the haversine estimate is used for that call only.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Deserialize;

use crate::error::OsrmError;
use crate::haversine::HaversineOracle;
use crate::model::{Location, Time};
use crate::traits::{TravelEstimate, TravelTimeOracle};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug)]
pub struct OsrmOracle {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
    fallback: HaversineOracle,
    memo: Mutex<HashMap<String, TravelEstimate>>,
}

impl OsrmOracle {
    pub fn new(config: OsrmConfig) -> Result<Self, OsrmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            fallback: HaversineOracle::default(),
            memo: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_fallback(mut self, fallback: HaversineOracle) -> Self {
        self.fallback = fallback;
        self
    }

    /// Queries OSRM for the fastest route between two (lat, lng) points.
    pub fn route(&self, from: Location, to: Location) -> Result<TravelEstimate, OsrmError> {
        let url = format!(
            "{}/route/v1/{}/{:.6},{:.6};{:.6},{:.6}?overview=false",
            self.config.base_url, self.config.profile, from.1, from.0, to.1, to.0
        );

        let body = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmRouteResponse>())?;

        if body.code != "Ok" {
            return Err(OsrmError::Status(body.code));
        }
        let route = body.routes.into_iter().next().ok_or(OsrmError::NoRoute)?;
        Ok(TravelEstimate::new(route.duration, route.distance))
    }

    fn memo_key(from: Location, to: Location) -> String {
        format!("{:.6},{:.6};{:.6},{:.6}", from.0, from.1, to.0, to.1)
    }
}

impl TravelTimeOracle for OsrmOracle {
    fn time_and_distance(&self, from: Location, to: Location, departure: Time) -> TravelEstimate {
        if from == to {
            return TravelEstimate::ZERO;
        }
        let key = Self::memo_key(from, to);
        if let Some(hit) = self.memo.lock().ok().and_then(|memo| memo.get(&key).copied()) {
            return hit;
        }

        match self.route(from, to) {
            Ok(estimate) => {
                if let Ok(mut memo) = self.memo.lock() {
                    memo.insert(key, estimate);
                }
                estimate
            }
            // Not memoized, so the pair is retried once OSRM is back.
            Err(err) => {
                tracing::warn!(error = %err, ?from, ?to, "OSRM unavailable, using haversine estimate");
                self.fallback.time_and_distance(from, to, departure)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    duration: f64,
    distance: f64,
}
