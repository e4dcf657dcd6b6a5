//! metricmatch - structural conformance checks for a service's metrics
//!
//! Fetches the metrics a running service exposes, normalizes them and
//! compares their paths (not their values) with a ground-truth fixture.
//! Also checks that metrics are exposed at all and that the service reports
//! no portability warnings.

pub mod checks;
pub mod cli;
pub mod clients;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod metrics;
pub mod scenario;
pub mod snapshot;
pub mod telemetry;
