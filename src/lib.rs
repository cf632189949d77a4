//! # jobgate
//!
//! Client-side admission and status-polling controller for a shared,
//! capacity-constrained generation cluster.
//!
//! Three fixed-delay loops share one copy-on-write mirror of the job store:
//! a refresh loop keeps the mirror current, an admission loop submits the
//! oldest waiting job whenever the tiered concurrency budget allows, and a
//! poll loop re-checks the status of the jobs counting against that budget.

pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod model;
pub mod remote;
pub mod store;
pub mod telemetry;
