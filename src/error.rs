//! Error types for metricmatch
//!
//! Check failures (smoke, portability, structure, key-value round trip) and
//! infrastructure failures (config, HTTP, fixtures) share one enum so the
//! runner can report both the same way.

use thiserror::Error;

/// Marker line opening the live snapshot in a structural mismatch report
pub const SNAPSHOT_START_MARKER: &str = "===== Service metrics start =====";

/// Marker line closing the live snapshot in a structural mismatch report
pub const SNAPSHOT_END_MARKER: &str = "===== Service metrics end =====";

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Request to {endpoint} failed: {reason}")]
    Http { endpoint: String, reason: String },

    #[error("Unexpected response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("{endpoint} returned status {status} (expected 200): {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Read-back of key '{key}' returned '{actual}', expected '{expected}'")]
    ReadBackMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("Failed to read fixture {path}: {source}")]
    FixtureRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid fixture name '{0}': must be a plain file name")]
    InvalidFixtureName(String),

    #[error("Smoke check failed: expected more than 1 metric, got {count}")]
    SmokeCheckFailed { count: usize },

    #[error("Portability check failed with warnings {categories:?}: {details}")]
    PortabilityWarnings {
        categories: Vec<String>,
        details: String,
    },

    #[error(
        "Metric paths differ from fixture ({} missing, {} unexpected)\n{start}\n{live_snapshot}\n{end}\n",
        .missing.len(),
        .unexpected.len(),
        start = SNAPSHOT_START_MARKER,
        end = SNAPSHOT_END_MARKER
    )]
    StructuralMismatch {
        live_snapshot: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns true for assertion failures of a check, false for
    /// infrastructure errors (config, transport, fixtures)
    pub fn is_check_failure(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedStatus { .. }
                | Self::ReadBackMismatch { .. }
                | Self::SmokeCheckFailed { .. }
                | Self::PortabilityWarnings { .. }
                | Self::StructuralMismatch { .. }
        )
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
