//! Dispatcher configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Recognized dispatcher options. All times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Look-ahead window for newly visible requests.
    pub horizon: f64,
    /// Time between re-optimization cycles. Must not exceed `horizon`.
    pub interval: f64,
    /// Cycles fire at `cycle_offset + k * interval`.
    pub cycle_offset: f64,
    /// Boarding/alighting time spent at every served stop.
    pub per_stop_service_duration: f64,
    /// Capacity for vehicles added without an explicit one.
    pub vehicle_capacity_default: u32,
    /// Improvement rounds the solver may spend per cycle.
    pub solver_iteration_budget: usize,
    /// Worker threads handed to the solver.
    pub solver_thread_count: usize,
    /// Optional wall-clock cap on a single solve.
    pub solver_time_budget_secs: Option<f64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            horizon: 1800.0,
            interval: 60.0,
            cycle_offset: 0.0,
            per_stop_service_duration: 60.0,
            vehicle_capacity_default: 4,
            solver_iteration_budget: 100,
            solver_thread_count: 1,
            solver_time_budget_secs: None,
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.horizon.is_finite() && self.horizon > 0.0) {
            return Err(ConfigError::InvalidHorizon(self.horizon));
        }
        if !(self.interval.is_finite() && self.interval > 0.0) {
            return Err(ConfigError::InvalidInterval(self.interval));
        }
        if self.interval > self.horizon {
            return Err(ConfigError::IntervalExceedsHorizon {
                interval: self.interval,
                horizon: self.horizon,
            });
        }
        if !(self.cycle_offset >= 0.0 && self.cycle_offset < self.interval) {
            return Err(ConfigError::InvalidOffset {
                offset: self.cycle_offset,
                interval: self.interval,
            });
        }
        if !(self.per_stop_service_duration.is_finite() && self.per_stop_service_duration >= 0.0) {
            return Err(ConfigError::InvalidServiceDuration(
                self.per_stop_service_duration,
            ));
        }
        if self.vehicle_capacity_default == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.solver_thread_count == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        if let Some(budget) = self.solver_time_budget_secs {
            if !(budget.is_finite() && budget > 0.0) {
                return Err(ConfigError::InvalidTimeBudget(budget));
            }
        }
        Ok(())
    }

    pub fn solver_time_budget(&self) -> Option<Duration> {
        self.solver_time_budget_secs.map(Duration::from_secs_f64)
    }
}
