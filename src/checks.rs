//! Assertions behind each conformance check
//!
//! These functions take already-fetched data and decide pass/fail. The
//! network side lives in [`crate::scenario`].

use crate::error::{AppError, AppResult};
use crate::snapshot::{NormalizedSnapshot, RelevanceFilter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The checks a run can perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// The monitor exposes more than one metric
    Smoke,
    /// The service reports no portability warnings beyond the tolerated ones
    Portability,
    /// Live metric paths match the fixture after a key-value round trip
    Structure,
}

impl Check {
    pub const ALL: [Check; 3] = [Check::Smoke, Check::Portability, Check::Structure];

    /// Label used in logs and self-metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Check::Smoke => "smoke",
            Check::Portability => "portability",
            Check::Structure => "structure",
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Portability warnings reported by the service: category to detail
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PortabilityWarnings(BTreeMap<String, serde_json::Value>);

impl PortabilityWarnings {
    pub fn new(warnings: BTreeMap<String, serde_json::Value>) -> Self {
        Self(warnings)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Remove a category if present, returning its detail
    pub fn remove(&mut self, category: &str) -> Option<serde_json::Value> {
        self.0.remove(category)
    }
}

impl FromIterator<(String, serde_json::Value)> for PortabilityWarnings {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Smoke check: more than one distinct metric must be exposed
pub fn check_metric_count(count: usize) -> AppResult<()> {
    if count > 1 {
        Ok(())
    } else {
        Err(AppError::SmokeCheckFailed { count })
    }
}

/// Portability check: warnings left after dropping tolerated categories fail
pub fn check_portability(
    mut warnings: PortabilityWarnings,
    tolerated: &[String],
) -> AppResult<()> {
    for category in tolerated {
        if warnings.remove(category).is_some() {
            tracing::debug!(category = %category, "Ignoring tolerated portability warning");
        }
    }

    if warnings.is_empty() {
        return Ok(());
    }

    let categories: Vec<String> = warnings.categories().map(str::to_string).collect();
    let details = serde_json::to_string(&warnings)
        .map_err(|e| AppError::Internal(format!("Failed to encode portability warnings: {}", e)))?;

    Err(AppError::PortabilityWarnings {
        categories,
        details,
    })
}

/// Structure check: live and fixture snapshots must expose the same paths
///
/// Returns the normalized live snapshot on success so callers can log it.
pub fn check_structure(
    live_raw: &str,
    fixture_raw: &str,
    filter: &RelevanceFilter,
) -> AppResult<NormalizedSnapshot> {
    let live = NormalizedSnapshot::from_raw(live_raw, filter);
    let fixture = NormalizedSnapshot::from_raw(fixture_raw, filter);

    let live_paths = live.paths();
    let fixture_paths = fixture.paths();

    if live_paths == fixture_paths {
        tracing::debug!(
            lines = live.line_count(),
            "Live metric paths match fixture"
        );
        return Ok(live);
    }

    let diff = live_paths.diff(&fixture_paths);
    tracing::warn!(
        missing = diff.missing.len(),
        unexpected = diff.unexpected.len(),
        "Live metric paths differ from fixture"
    );

    Err(AppError::StructuralMismatch {
        live_snapshot: live.into_string(),
        missing: diff.missing,
        unexpected: diff.unexpected,
    })
}
