//! Orchestration of the conformance checks against a running service
//!
//! A [`Scenario`] owns the collaborators (service client, monitor client,
//! fixture loader) and runs the checks in [`Check`]:
//!
//! - smoke and portability do not depend on each other and are awaited
//!   concurrently
//! - structure runs last: it writes a key, reads it back, then compares the
//!   live metric paths with the fixture
//!
//! Every check outcome and duration is recorded in [`Metrics`].

use crate::checks::{Check, check_metric_count, check_portability, check_structure};
use crate::clients::{
    HttpMonitorClient, HttpResponse, HttpServiceClient, MonitorClient, OutputFormat,
    ServiceClient,
};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::fixtures::{DirFixtureLoader, FixtureLoader};
use crate::metrics::{Metrics, Outcome};
use crate::snapshot::{NormalizedSnapshot, RelevanceFilter};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

/// Inputs of the checks that do not come from a collaborator
#[derive(Debug, Clone)]
pub struct ScenarioSettings {
    pub key: String,
    pub value: String,
    pub fixture: String,
    pub output_format: OutputFormat,
    pub filter: RelevanceFilter,
    pub tolerated_warnings: Vec<String>,
}

impl ScenarioSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            key: config.scenario.key.clone(),
            value: config.scenario.value.clone(),
            fixture: config.scenario.fixture.clone(),
            output_format: config.monitor.output_format,
            filter: config.filter.relevance_filter(),
            tolerated_warnings: config.portability.tolerated.clone(),
        }
    }
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            key: "foo".to_string(),
            value: "bar".to_string(),
            fixture: "metrics_values.txt".to_string(),
            output_format: OutputFormat::Graphite,
            filter: RelevanceFilter::default(),
            tolerated_warnings: vec!["label_name_mismatch".to_string()],
        }
    }
}

/// Result of one check
#[derive(Debug)]
pub struct CheckReport {
    pub check: Check,
    pub outcome: Outcome,
    pub error: Option<AppError>,
    pub duration: Duration,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.outcome {
            Outcome::Passed => "PASS",
            Outcome::Failed => "FAIL",
            Outcome::Errored => "ERROR",
        };
        write!(
            f,
            "{} {} ({} ms)",
            status,
            self.check,
            self.duration.as_millis()
        )?;
        if let Some(error) = &self.error {
            write!(f, ": {}", error)?;
        }
        Ok(())
    }
}

/// Results of all checks of a run, in execution order
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub checks: Vec<CheckReport>,
}

impl RunReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(CheckReport::passed)
    }

    pub fn get(&self, check: Check) -> Option<&CheckReport> {
        self.checks.iter().find(|r| r.check == check)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run {}", self.run_id)?;
        for report in &self.checks {
            writeln!(f, "{}", report)?;
        }
        let passed = self.checks.iter().filter(|r| r.passed()).count();
        write!(f, "{}/{} checks passed", passed, self.checks.len())
    }
}

/// The conformance checks wired to their collaborators
pub struct Scenario {
    service: Arc<dyn ServiceClient>,
    monitor: Arc<dyn MonitorClient>,
    fixtures: Arc<dyn FixtureLoader>,
    settings: ScenarioSettings,
    metrics: Arc<Metrics>,
    run_id: Uuid,
}

impl Scenario {
    /// `run_id` should be the id the HTTP clients send in their request headers
    pub fn new(
        service: Arc<dyn ServiceClient>,
        monitor: Arc<dyn MonitorClient>,
        fixtures: Arc<dyn FixtureLoader>,
        settings: ScenarioSettings,
        metrics: Arc<Metrics>,
        run_id: Uuid,
    ) -> Self {
        Self {
            service,
            monitor,
            fixtures,
            settings,
            metrics,
            run_id,
        }
    }

    /// Build a scenario talking HTTP to the configured service and monitor
    pub fn from_config(config: &Config, metrics: Arc<Metrics>) -> AppResult<Self> {
        let run_id = Uuid::new_v4();
        let service =
            HttpServiceClient::new(&config.service, run_id, Some(Arc::clone(&metrics)))?;
        let monitor =
            HttpMonitorClient::new(&config.monitor, run_id, Some(Arc::clone(&metrics)))?;
        let fixtures = DirFixtureLoader::new(config.scenario.fixtures_dir.clone());

        Ok(Self::new(
            Arc::new(service),
            Arc::new(monitor),
            Arc::new(fixtures),
            ScenarioSettings::from_config(config),
            metrics,
            run_id,
        ))
    }

    /// The monitor must expose more than one metric
    pub async fn smoke(&self) -> AppResult<()> {
        let listing = self.monitor.metrics().await?;
        tracing::debug!(metric_count = listing.len(), "Fetched metrics listing");
        check_metric_count(listing.len())
    }

    /// Only tolerated portability warnings may be reported
    pub async fn portability(&self) -> AppResult<()> {
        let warnings = self.service.metrics_portability().await?;
        check_portability(warnings, &self.settings.tolerated_warnings)
    }

    /// Key-value round trip, then compare live metric paths with the fixture
    ///
    /// Returns the normalized live snapshot when the paths match.
    pub async fn structure(&self) -> AppResult<NormalizedSnapshot> {
        let settings = &self.settings;

        // forces the per-statement timing metrics to appear
        let response = self.service.put_key(&settings.key, &settings.value).await?;
        ensure_ok("PUT /v1/key-value", response)?;

        let response = self.service.get_key(&settings.key).await?;
        let body = ensure_ok("GET /v1/key-value", response)?;
        if body != settings.value {
            return Err(AppError::ReadBackMismatch {
                key: settings.key.clone(),
                expected: settings.value.clone(),
                actual: body,
            });
        }

        let fixture_raw = self.fixtures.load(&settings.fixture)?;
        let live_raw = self.monitor.metrics_raw(settings.output_format).await?;

        check_structure(&live_raw, &fixture_raw, &settings.filter)
    }

    /// Run one check, recording its outcome and duration
    pub async fn run_check(&self, check: Check) -> CheckReport {
        let span = tracing::info_span!("check", check = check.as_str(), run_id = %self.run_id);

        async {
            let started = Instant::now();
            let result = match check {
                Check::Smoke => self.smoke().await,
                Check::Portability => self.portability().await,
                Check::Structure => self.structure().await.map(|_| ()),
            };
            let duration = started.elapsed();

            let (outcome, error) = match result {
                Ok(()) => (Outcome::Passed, None),
                Err(e) if e.is_check_failure() => (Outcome::Failed, Some(e)),
                Err(e) => (Outcome::Errored, Some(e)),
            };

            self.metrics.record_check(check, outcome);
            if let Err(e) = self
                .metrics
                .record_check_duration(check, duration.as_secs_f64() * 1000.0)
            {
                tracing::warn!(error = %e, "Failed to record check duration");
            }

            match &error {
                None => tracing::info!(duration_ms = duration.as_millis() as u64, "Check passed"),
                Some(e) => tracing::error!(
                    outcome = outcome.as_str(),
                    duration_ms = duration.as_millis() as u64,
                    error = %e,
                    "Check did not pass"
                ),
            }

            CheckReport {
                check,
                outcome,
                error,
                duration,
            }
        }
        .instrument(span)
        .await
    }

    /// Run the selected checks
    ///
    /// Duplicates are ignored. Smoke and portability run concurrently,
    /// structure runs after them.
    pub async fn run(&self, checks: &[Check]) -> RunReport {
        let mut selected: Vec<Check> = Vec::new();
        for check in checks {
            if !selected.contains(check) {
                selected.push(*check);
            }
        }

        tracing::info!(
            run_id = %self.run_id,
            checks = ?selected,
            "Starting conformance run"
        );

        let independent = selected.iter().filter(|c| **c != Check::Structure);
        let mut reports =
            futures::future::join_all(independent.map(|c| self.run_check(*c))).await;

        if selected.contains(&Check::Structure) {
            reports.push(self.run_check(Check::Structure).await);
        }

        RunReport {
            run_id: self.run_id,
            checks: reports,
        }
    }
}

/// Unwrap the body of a 200 response
fn ensure_ok(endpoint: &str, response: HttpResponse) -> AppResult<String> {
    if response.is_ok() {
        Ok(response.body)
    } else {
        Err(AppError::UnexpectedStatus {
            endpoint: endpoint.to_string(),
            status: response.status,
            body: response.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::PortabilityWarnings;
    use crate::clients::MetricsListing;
    use crate::error::{SNAPSHOT_END_MARKER, SNAPSHOT_START_MARKER};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory key-value service
    #[derive(Default)]
    struct FakeService {
        store: Mutex<HashMap<String, String>>,
        put_status: Option<u16>,
        warnings: PortabilityWarnings,
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl ServiceClient for FakeService {
        async fn put_key(&self, key: &str, value: &str) -> AppResult<HttpResponse> {
            self.calls.lock().unwrap().push("put");
            if let Some(status) = self.put_status {
                return Ok(HttpResponse {
                    status,
                    body: "error".to_string(),
                });
            }
            self.store
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(HttpResponse {
                status: 200,
                body: String::new(),
            })
        }

        async fn get_key(&self, key: &str) -> AppResult<HttpResponse> {
            self.calls.lock().unwrap().push("get");
            match self.store.lock().unwrap().get(key) {
                Some(value) => Ok(HttpResponse {
                    status: 200,
                    body: value.clone(),
                }),
                None => Ok(HttpResponse {
                    status: 404,
                    body: String::new(),
                }),
            }
        }

        async fn metrics_portability(&self) -> AppResult<PortabilityWarnings> {
            Ok(self.warnings.clone())
        }
    }

    struct FakeMonitor {
        listing: &'static str,
        raw: &'static str,
    }

    #[async_trait]
    impl MonitorClient for FakeMonitor {
        async fn metrics(&self) -> AppResult<MetricsListing> {
            serde_json::from_str(self.listing).map_err(|e| AppError::Internal(e.to_string()))
        }

        async fn metrics_raw(&self, format: OutputFormat) -> AppResult<String> {
            assert_eq!(format, OutputFormat::Graphite);
            Ok(self.raw.to_string())
        }
    }

    struct StaticFixtures(&'static str);

    impl FixtureLoader for StaticFixtures {
        fn load(&self, name: &str) -> AppResult<String> {
            assert_eq!(name, "metrics_values.txt");
            Ok(self.0.to_string())
        }
    }

    fn scenario(service: FakeService, monitor: FakeMonitor, fixture: &'static str) -> Scenario {
        Scenario::new(
            Arc::new(service),
            Arc::new(monitor),
            Arc::new(StaticFixtures(fixture)),
            ScenarioSettings::default(),
            Arc::new(Metrics::new().unwrap()),
            Uuid::new_v4(),
        )
    }

    fn monitor(raw: &'static str) -> FakeMonitor {
        FakeMonitor {
            listing: r#"{"mongo.a": [], "mongo.b": []}"#,
            raw,
        }
    }

    #[tokio::test]
    async fn test_structure_passes_when_paths_match() {
        let scenario = scenario(
            FakeService::default(),
            monitor("mongo_a 1 100\nhttp_b 2 100\nmongo_a 1 100"),
            "mongo_a 9 200\nmongo_a 9 200",
        );
        let live = scenario.structure().await.expect("structure should pass");
        assert_eq!(live.as_str(), "mongo_a 1 100\nmongo_a 1 100");
    }

    #[tokio::test]
    async fn test_structure_writes_before_reading() {
        let service = Arc::new(FakeService::default());
        let scenario = Scenario::new(
            service.clone(),
            Arc::new(monitor("mongo_a 1 100")),
            Arc::new(StaticFixtures("mongo_a 2 200")),
            ScenarioSettings::default(),
            Arc::new(Metrics::new().unwrap()),
            Uuid::new_v4(),
        );
        scenario.structure().await.unwrap();
        assert_eq!(*service.calls.lock().unwrap(), vec!["put", "get"]);
    }

    #[tokio::test]
    async fn test_structure_mismatch_embeds_live_snapshot() {
        let scenario = scenario(
            FakeService::default(),
            monitor("mongo_b 1 100\nmongo_a 1 100"),
            "mongo_a 9 200\nmongo_b 9 200\nmongo_c 9 200",
        );
        let err = scenario.structure().await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains(&format!(
            "{}\nmongo_a 1 100\nmongo_b 1 100\n{}",
            SNAPSHOT_START_MARKER, SNAPSHOT_END_MARKER
        )));
    }

    #[tokio::test]
    async fn test_structure_fails_fast_on_write_error() {
        let service = FakeService {
            put_status: Some(500),
            ..Default::default()
        };
        let scenario = scenario(service, monitor("mongo_a 1 1"), "mongo_a 1 1");
        let err = scenario.structure().await.unwrap_err();
        assert!(matches!(
            err,
            AppError::UnexpectedStatus { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn test_run_reports_every_selected_check_once() {
        let scenario = scenario(
            FakeService::default(),
            monitor("mongo_a 1 100"),
            "mongo_a 1 100",
        );
        let report = scenario
            .run(&[Check::Structure, Check::Smoke, Check::Smoke, Check::Portability])
            .await;

        let order: Vec<Check> = report.checks.iter().map(|r| r.check).collect();
        assert_eq!(order, vec![Check::Smoke, Check::Portability, Check::Structure]);
        assert!(report.all_passed(), "{}", report);
        assert!(report.to_string().ends_with("3/3 checks passed"));
    }

    #[tokio::test]
    async fn test_run_records_outcomes_in_metrics() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let scenario = Scenario::new(
            Arc::new(FakeService::default()),
            Arc::new(FakeMonitor {
                listing: r#"{"only.one": []}"#,
                raw: "mongo_a 1 1",
            }),
            Arc::new(StaticFixtures("mongo_a 1 1")),
            ScenarioSettings::default(),
            Arc::clone(&metrics),
            Uuid::new_v4(),
        );

        let report = scenario.run(&Check::ALL).await;
        assert!(!report.all_passed());
        let smoke = report.get(Check::Smoke).unwrap();
        assert_eq!(smoke.outcome, Outcome::Failed);
        assert!(smoke.to_string().starts_with("FAIL smoke"));

        assert_eq!(metrics.check_count(Check::Smoke, Outcome::Failed), 1);
        assert_eq!(metrics.check_count(Check::Structure, Outcome::Passed), 1);
    }

    #[tokio::test]
    async fn test_report_carries_injected_run_id() {
        let run_id = Uuid::new_v4();
        let scenario = Scenario::new(
            Arc::new(FakeService::default()),
            Arc::new(monitor("mongo_a 1 1")),
            Arc::new(StaticFixtures("mongo_a 1 1")),
            ScenarioSettings::default(),
            Arc::new(Metrics::new().unwrap()),
            run_id,
        );

        let report = scenario.run(&[Check::Structure]).await;
        assert_eq!(report.run_id, run_id);
        assert!(report.to_string().starts_with(&format!("run {}", run_id)));
    }

    #[tokio::test]
    async fn test_portability_uses_tolerated_settings() {
        let warnings: PortabilityWarnings = [(
            "label_name_mismatch".to_string(),
            serde_json::json!({"mongo": 1}),
        )]
        .into_iter()
        .collect();
        let service = FakeService {
            warnings,
            ..Default::default()
        };
        let scenario = Scenario::new(
            Arc::new(service),
            Arc::new(monitor("")),
            Arc::new(StaticFixtures("")),
            ScenarioSettings {
                tolerated_warnings: vec![],
                ..Default::default()
            },
            Arc::new(Metrics::new().unwrap()),
            Uuid::new_v4(),
        );

        assert!(matches!(
            scenario.portability().await,
            Err(AppError::PortabilityWarnings { .. })
        ));
    }
}
