//! Configuration management for metricmatch
//!
//! Parses TOML configuration files and provides typed access to settings.

use crate::clients::OutputFormat;
use crate::error::{AppError, AppResult};
use crate::fixtures::validate_fixture_name;
use crate::snapshot::{DEFAULT_EXCLUDED_MARKERS, DEFAULT_SUBSYSTEM_TAG, RelevanceFilter};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Upper bound for any request timeout, in seconds
const MAX_TIMEOUT_SECONDS: u64 = 300;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub portability: PortabilityConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Service under test
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

/// Monitor endpoint of the service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    pub base_url: String,
    /// Path of the metrics handler on the monitor port
    #[serde(default = "default_monitor_path")]
    pub path: String,
    /// Exposition format requested for the structure check
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_monitor_path() -> String {
    "/".to_string()
}

/// Key-value round trip and fixture used by the structure check
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    #[serde(default = "default_key")]
    pub key: String,
    #[serde(default = "default_value")]
    pub value: String,
    #[serde(default = "default_fixtures_dir")]
    pub fixtures_dir: PathBuf,
    #[serde(default = "default_fixture")]
    pub fixture: String,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            key: default_key(),
            value: default_value(),
            fixtures_dir: default_fixtures_dir(),
            fixture: default_fixture(),
        }
    }
}

fn default_key() -> String {
    "foo".to_string()
}

fn default_value() -> String {
    "bar".to_string()
}

fn default_fixtures_dir() -> PathBuf {
    PathBuf::from("tests/static")
}

fn default_fixture() -> String {
    "metrics_values.txt".to_string()
}

/// Which metric lines take part in the structure comparison
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterConfig {
    #[serde(default = "default_subsystem_tag")]
    pub subsystem_tag: String,
    #[serde(default = "default_excluded_markers")]
    pub excluded_markers: Vec<String>,
}

impl FilterConfig {
    pub fn relevance_filter(&self) -> RelevanceFilter {
        RelevanceFilter::new(self.subsystem_tag.clone(), self.excluded_markers.clone())
    }

    /// Load only the `[filter]` table of a config file
    ///
    /// Other sections are neither required nor validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        #[derive(Deserialize)]
        struct FilterSection {
            #[serde(default)]
            filter: FilterConfig,
        }

        let path_display = path.as_ref().display().to_string();

        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        let section: FilterSection =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        section
            .filter
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(section.filter)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.subsystem_tag.is_empty() {
            // an empty tag would match every line
            return Err(AppError::Config(
                "filter.subsystem_tag must not be empty".to_string(),
            ));
        }

        if self.excluded_markers.iter().any(String::is_empty) {
            return Err(AppError::Config(
                "filter.excluded_markers must not contain empty markers".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            subsystem_tag: default_subsystem_tag(),
            excluded_markers: default_excluded_markers(),
        }
    }
}

fn default_subsystem_tag() -> String {
    DEFAULT_SUBSYSTEM_TAG.to_string()
}

fn default_excluded_markers() -> Vec<String> {
    DEFAULT_EXCLUDED_MARKERS.iter().map(|m| m.to_string()).collect()
}

/// Portability warning categories that do not fail the check
///
/// `label_name_mismatch` is tolerated by default until total metrics get
/// their own paths. Set `tolerated = []` to enforce every category.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PortabilityConfig {
    #[serde(default = "default_tolerated")]
    pub tolerated: Vec<String>,
}

impl Default for PortabilityConfig {
    fn default() -> Self {
        Self {
            tolerated: default_tolerated(),
        }
    }
}

fn default_tolerated() -> Vec<String> {
    vec!["label_name_mismatch".to_string()]
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn validate_base_url(section: &str, base_url: &str) -> AppResult<()> {
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(AppError::Config(format!(
            "{}.base_url '{}' must start with 'http://' or 'https://'",
            section, base_url
        )));
    }
    Ok(())
}

fn validate_timeout(section: &str, timeout: u64) -> AppResult<()> {
    if timeout == 0 {
        return Err(AppError::Config(format!(
            "{}.request_timeout_seconds must be greater than 0",
            section
        )));
    }
    if timeout > MAX_TIMEOUT_SECONDS {
        return Err(AppError::Config(format!(
            "{}.request_timeout_seconds cannot exceed {} seconds, got {}",
            section, MAX_TIMEOUT_SECONDS, timeout
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        let config: Self =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Validate configuration after parsing
    ///
    /// Called by `from_file()` and `from_str()`; call it explicitly when a
    /// `Config` is built in code.
    pub fn validate(&self) -> AppResult<()> {
        validate_base_url("service", &self.service.base_url)?;
        validate_base_url("monitor", &self.monitor.base_url)?;
        validate_timeout("service", self.service.request_timeout_seconds)?;
        validate_timeout("monitor", self.monitor.request_timeout_seconds)?;

        if !self.monitor.path.starts_with('/') {
            return Err(AppError::Config(format!(
                "monitor.path '{}' must start with '/'",
                self.monitor.path
            )));
        }

        if self.scenario.key.is_empty() {
            return Err(AppError::Config(
                "scenario.key must not be empty".to_string(),
            ));
        }

        validate_fixture_name(&self.scenario.fixture)
            .map_err(|e| AppError::Config(format!("scenario.fixture: {}", e)))?;

        self.filter.validate()
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}
