//! Command-line interface for metricmatch
//!
//! Provides argument parsing and subcommand handling for the metricmatch binary.

use crate::checks::{Check, check_structure};
use crate::config::FilterConfig;
use crate::error::{AppError, AppResult};
use crate::snapshot::{NormalizedSnapshot, RelevanceFilter};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

/// Structural conformance checks for a service's metrics exposition
#[derive(Parser)]
#[command(name = "metricmatch")]
#[command(version)]
#[command(about = "Structural conformance checks for a service's metrics exposition")]
#[command(
    long_about = "metricmatch checks that a running service exposes metrics, that they \
    pass its portability check, and that a key-value round trip produces the same metric \
    paths as a ground-truth fixture. Metric values are ignored."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "metricmatch.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run checks against the configured service (default: all)
    Check {
        /// Which check to run
        #[arg(value_enum, default_value_t = CheckSelection::All)]
        selection: CheckSelection,

        /// Print the run's own Prometheus metrics after the report
        #[arg(long)]
        emit_metrics: bool,
    },
    /// Print the normalized view of an exposition file
    ///
    /// Uses the [filter] section of the config file when it exists.
    Normalize {
        /// Exposition file (graphite format)
        file: PathBuf,

        /// Strip values and timestamps, print paths only
        #[arg(long)]
        paths: bool,
    },
    /// Compare the metric paths of two exposition files
    ///
    /// Uses the [filter] section of the config file when it exists.
    Diff {
        /// Live snapshot file
        live: PathBuf,

        /// Ground-truth fixture file
        fixture: PathBuf,
    },
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Check selection on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CheckSelection {
    Smoke,
    Portability,
    Structure,
    All,
}

impl CheckSelection {
    pub fn checks(&self) -> Vec<Check> {
        match self {
            CheckSelection::Smoke => vec![Check::Smoke],
            CheckSelection::Portability => vec![Check::Portability],
            CheckSelection::Structure => vec![Check::Structure],
            CheckSelection::All => Check::ALL.to_vec(),
        }
    }
}

/// Relevance filter for the offline subcommands
///
/// Taken from the `[filter]` table of the config file when it exists, the
/// default filter otherwise.
pub fn filter_from_config(config_path: &Path) -> AppResult<RelevanceFilter> {
    if config_path.exists() {
        Ok(FilterConfig::from_file(config_path)?.relevance_filter())
    } else {
        tracing::debug!(
            config = %config_path.display(),
            "Config file not found, using default relevance filter"
        );
        Ok(RelevanceFilter::default())
    }
}

fn read_snapshot(path: &Path) -> AppResult<String> {
    std::fs::read_to_string(path).map_err(|source| AppError::FixtureRead {
        path: path.display().to_string(),
        source,
    })
}

/// Output of `metricmatch normalize`
pub fn normalize_file(
    path: &Path,
    filter: &RelevanceFilter,
    paths_only: bool,
) -> AppResult<String> {
    let normalized = NormalizedSnapshot::from_raw(&read_snapshot(path)?, filter);
    if paths_only {
        Ok(normalized.paths().to_string())
    } else {
        Ok(normalized.into_string())
    }
}

/// `metricmatch diff`: the structure check on two files
pub fn diff_files(
    live: &Path,
    fixture: &Path,
    filter: &RelevanceFilter,
) -> AppResult<NormalizedSnapshot> {
    check_structure(&read_snapshot(live)?, &read_snapshot(fixture)?, filter)
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# metricmatch Configuration
# ==========================
#
# Endpoints of the service under test, the key-value round trip used to make
# per-statement metrics appear, and the fixture the live metrics are compared
# against.

# ─────────────────────────────────────────────────────────────────────────────
# SERVICE UNDER TEST
# ─────────────────────────────────────────────────────────────────────────────

[service]
# Main listener of the service (key-value handler, testsuite control handler)
base_url = "http://localhost:8080"

# Per-request timeout in seconds (1-300)
request_timeout_seconds = 30

# ─────────────────────────────────────────────────────────────────────────────
# MONITOR ENDPOINT
# ─────────────────────────────────────────────────────────────────────────────

[monitor]
base_url = "http://localhost:8086"

# Path of the metrics handler on the monitor listener
path = "/"

# Exposition format compared against the fixture:
#   "graphite", "prometheus", "prometheus-untyped", "json", "pretty"
output_format = "graphite"

request_timeout_seconds = 30

# ─────────────────────────────────────────────────────────────────────────────
# STRUCTURE CHECK
# ─────────────────────────────────────────────────────────────────────────────

[scenario]
# Written with PUT /v1/key-value and read back with GET /v1/key-value
key = "foo"
value = "bar"

# Ground-truth snapshot, in the same format as monitor.output_format.
# Refresh it with: metricmatch normalize live.txt > tests/static/metrics_values.txt
fixtures_dir = "tests/static"
fixture = "metrics_values.txt"

[filter]
# Only lines containing this tag are compared
subsystem_tag = "mongo"

# Lines containing any of these are dropped even if they contain the tag.
# These errors show up during service startup and are not reproducible.
excluded_markers = ["mongo_error=network", "mongo_error=cluster-unavailable"]

# ─────────────────────────────────────────────────────────────────────────────
# PORTABILITY CHECK
# ─────────────────────────────────────────────────────────────────────────────

[portability]
# Warning categories that do not fail the check. Set to [] to enforce all.
tolerated = ["label_name_mismatch"]

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error" (RUST_LOG overrides)
log_level = "info"
"#
}
