//! Prometheus metrics for metricmatch runs
//!
//! This module tracks what a run did, not what the service under test
//! exposes:
//! - Check outcomes by check
//! - Check duration
//! - HTTP requests to the service and the monitor by status
//!
//! Printed in Prometheus text format with `metricmatch check --emit-metrics`.

use crate::checks::Check;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Outcome of a check, as a bounded label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// All assertions held
    Passed,
    /// An assertion failed
    Failed,
    /// The check could not run (config, transport, fixture errors)
    Errored,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Errored => "errored",
        }
    }
}

/// HTTP request target, as a bounded label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Service,
    Monitor,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Service => "service",
            Target::Monitor => "monitor",
        }
    }
}

/// Metrics collector for a run
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    checks_total: IntCounterVec,
    check_duration: HistogramVec,
    http_requests_total: IntCounterVec,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Cardinality: 3 checks × 3 outcomes
        let checks_total = IntCounterVec::new(
            Opts::new(
                "metricmatch_checks_total",
                "Total number of conformance checks by check and outcome",
            ),
            &["check", "outcome"],
        )?;

        let check_duration = HistogramVec::new(
            HistogramOpts::new(
                "metricmatch_check_duration_ms",
                "Conformance check duration in milliseconds",
            )
            .buckets(vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 30000.0]),
            &["check"],
        )?;

        // status is the HTTP status code or "error" when no response arrived
        let http_requests_total = IntCounterVec::new(
            Opts::new(
                "metricmatch_http_requests_total",
                "Total HTTP requests issued by target and response status",
            ),
            &["target", "status"],
        )?;

        registry.register(Box::new(checks_total.clone()))?;
        registry.register(Box::new(check_duration.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            checks_total,
            check_duration,
            http_requests_total,
        })
    }

    /// Record the outcome of one check
    pub fn record_check(&self, check: Check, outcome: Outcome) {
        self.checks_total
            .with_label_values(&[check.as_str(), outcome.as_str()])
            .inc();
    }

    /// Record check duration
    ///
    /// # Errors
    ///
    /// Returns an error if `duration_ms` is NaN, infinite, or negative.
    pub fn record_check_duration(
        &self,
        check: Check,
        duration_ms: f64,
    ) -> Result<(), prometheus::Error> {
        if !duration_ms.is_finite() || duration_ms < 0.0 {
            return Err(prometheus::Error::Msg(format!(
                "Histogram value must be finite and non-negative, got: {}",
                duration_ms
            )));
        }

        self.check_duration
            .get_metric_with_label_values(&[check.as_str()])?
            .observe(duration_ms);
        Ok(())
    }

    /// Record one HTTP request; `status` is None when the request failed
    /// before a response arrived
    pub fn record_http_request(&self, target: Target, status: Option<u16>) {
        let status_label = status.map_or_else(|| "error".to_string(), |s| s.to_string());
        self.http_requests_total
            .with_label_values(&[target.as_str(), status_label.as_str()])
            .inc();
    }

    /// Number of recorded outcomes for a check
    pub fn check_count(&self, check: Check, outcome: Outcome) -> u64 {
        self.checks_total
            .get_metric_with_label_values(&[check.as_str(), outcome.as_str()])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    /// Number of HTTP requests sent to a target, across all statuses
    pub fn http_request_count(&self, target: Target) -> u64 {
        self.registry
            .gather()
            .iter()
            .find(|mf| mf.name() == "metricmatch_http_requests_total")
            .map(|mf| {
                mf.get_metric()
                    .iter()
                    .filter(|m| {
                        m.label
                            .iter()
                            .any(|l| l.name() == "target" && l.value() == target.as_str())
                    })
                    .map(|m| m.counter.value.unwrap_or(0.0) as u64)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Encode all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();

        tracing::debug!(
            metric_family_count = metric_families.len(),
            "Encoding metrics to Prometheus text format"
        );

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("Metrics output is not valid UTF-8: {}", e))
        })
    }
}
