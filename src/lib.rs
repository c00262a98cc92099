//! drt-dispatch: rolling-horizon dispatch for on-demand shared-ride fleets.
//!
//! The engine snapshots fleet and request state on a fixed cycle, hands a
//! pickup-and-delivery problem to a pluggable batch solver and splices the
//! answer into each vehicle's live schedule. A pairwise shareability
//! evaluator scores how well trips pool for demand analysis.

pub mod traits;
pub mod error;
pub mod config;
pub mod model;
pub mod schedule;
pub mod events;
pub mod problem;
pub mod snapshot;
pub mod adapter;
pub mod splicer;
pub mod solver;
pub mod dispatcher;
pub mod shareability;
pub mod sim;
pub mod oracle;
pub mod haversine;
pub mod osrm;
