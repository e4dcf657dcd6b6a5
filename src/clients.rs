//! HTTP clients for the service under test and its monitor endpoint
//!
//! The checks only talk to the traits [`ServiceClient`] and [`MonitorClient`];
//! the reqwest-backed implementations below are what the CLI wires in.

use crate::checks::PortabilityWarnings;
use crate::config::{MonitorConfig, ServiceConfig};
use crate::error::{AppError, AppResult};
use crate::metrics::{Metrics, Target};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Header carrying the run id on every outgoing request
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Path of the key-value handler of the service
const KEY_VALUE_PATH: &str = "/v1/key-value";

/// Path of the testsuite control handler of the service
const TESTS_CONTROL_PATH: &str = "/tests/control";

/// Output formats of the monitor endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// `path value timestamp` lines
    #[default]
    Graphite,
    Prometheus,
    PrometheusUntyped,
    Json,
    Pretty,
}

impl OutputFormat {
    /// Value of the `format` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Graphite => "graphite",
            OutputFormat::Prometheus => "prometheus",
            OutputFormat::PrometheusUntyped => "prometheus-untyped",
            OutputFormat::Json => "json",
            OutputFormat::Pretty => "pretty",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "graphite" => Ok(OutputFormat::Graphite),
            "prometheus" => Ok(OutputFormat::Prometheus),
            "prometheus-untyped" => Ok(OutputFormat::PrometheusUntyped),
            "json" => Ok(OutputFormat::Json),
            "pretty" => Ok(OutputFormat::Pretty),
            other => Err(AppError::Config(format!(
                "unknown output format '{}', expected one of: graphite, prometheus, \
                prometheus-untyped, json, pretty",
                other
            ))),
        }
    }
}

/// Status and body of a service response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Structured metrics listing of the monitor, keyed by metric path
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct MetricsListing(BTreeMap<String, serde_json::Value>);

impl MetricsListing {
    /// Number of distinct metric paths
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }
}

/// Requests against the service under test
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Store `value` under `key`
    async fn put_key(&self, key: &str, value: &str) -> AppResult<HttpResponse>;

    /// Read the value stored under `key`
    async fn get_key(&self, key: &str) -> AppResult<HttpResponse>;

    /// Ask the service for metric portability warnings
    async fn metrics_portability(&self) -> AppResult<PortabilityWarnings>;
}

/// Requests against the monitor endpoint
#[async_trait]
pub trait MonitorClient: Send + Sync {
    /// Structured listing of all exposed metrics
    async fn metrics(&self) -> AppResult<MetricsListing>;

    /// Raw exposition text in the given format
    async fn metrics_raw(&self, format: OutputFormat) -> AppResult<String>;
}

/// Shared reqwest plumbing of both clients
#[derive(Clone)]
struct Transport {
    client: reqwest::Client,
    base_url: String,
    target: Target,
    run_id: Uuid,
    metrics: Option<Arc<Metrics>>,
}

impl Transport {
    fn new(
        base_url: &str,
        timeout_seconds: u64,
        target: Target,
        run_id: Uuid,
        metrics: Option<Arc<Metrics>>,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| AppError::Http {
                endpoint: base_url.to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            target,
            run_id,
            metrics,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and read the whole body
    ///
    /// `endpoint` is a short `METHOD /path` description used in errors.
    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> AppResult<HttpResponse> {
        let result = request
            .header(REQUEST_ID_HEADER, self.run_id.to_string())
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.record(None);
                tracing::debug!(
                    target_kind = self.target.as_str(),
                    endpoint = %endpoint,
                    error = %e,
                    "Request failed"
                );
                return Err(AppError::Http {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let status = response.status().as_u16();
        self.record(Some(status));

        let body = response.text().await.map_err(|e| AppError::Http {
            endpoint: endpoint.to_string(),
            reason: format!("failed to read response body: {}", e),
        })?;

        tracing::debug!(
            target_kind = self.target.as_str(),
            endpoint = %endpoint,
            status,
            bytes = body.len(),
            "Request completed"
        );

        Ok(HttpResponse { status, body })
    }

    /// Like `send`, but anything other than 200 is an error
    async fn send_expect_ok(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> AppResult<String> {
        let response = self.send(endpoint, request).await?;
        if !response.is_ok() {
            return Err(AppError::UnexpectedStatus {
                endpoint: endpoint.to_string(),
                status: response.status,
                body: response.body,
            });
        }
        Ok(response.body)
    }

    fn record(&self, status: Option<u16>) {
        if let Some(metrics) = &self.metrics {
            metrics.record_http_request(self.target, status);
        }
    }
}

/// reqwest-backed [`ServiceClient`]
#[derive(Clone)]
pub struct HttpServiceClient {
    transport: Transport,
}

impl HttpServiceClient {
    pub fn new(
        config: &ServiceConfig,
        run_id: Uuid,
        metrics: Option<Arc<Metrics>>,
    ) -> AppResult<Self> {
        Ok(Self {
            transport: Transport::new(
                &config.base_url,
                config.request_timeout_seconds,
                Target::Service,
                run_id,
                metrics,
            )?,
        })
    }
}

#[async_trait]
impl ServiceClient for HttpServiceClient {
    async fn put_key(&self, key: &str, value: &str) -> AppResult<HttpResponse> {
        let request = self
            .transport
            .client
            .put(self.transport.url(KEY_VALUE_PATH))
            .query(&[("key", key), ("value", value)]);
        self.transport
            .send(&format!("PUT {}", KEY_VALUE_PATH), request)
            .await
    }

    async fn get_key(&self, key: &str) -> AppResult<HttpResponse> {
        let request = self
            .transport
            .client
            .get(self.transport.url(KEY_VALUE_PATH))
            .query(&[("key", key)]);
        self.transport
            .send(&format!("GET {}", KEY_VALUE_PATH), request)
            .await
    }

    async fn metrics_portability(&self) -> AppResult<PortabilityWarnings> {
        let endpoint = format!("POST {}", TESTS_CONTROL_PATH);
        let request = self
            .transport
            .client
            .post(self.transport.url(TESTS_CONTROL_PATH))
            .json(&serde_json::json!({ "action": "metrics_portability" }));
        let body = self.transport.send_expect_ok(&endpoint, request).await?;

        parse_portability_response(&body).map_err(|reason| AppError::InvalidResponse {
            endpoint,
            reason,
        })
    }
}

/// Accepts either `{"warnings": {...}}` or the bare category map
fn parse_portability_response(body: &str) -> Result<PortabilityWarnings, String> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| format!("invalid JSON: {}", e))?;

    let serde_json::Value::Object(mut object) = value else {
        return Err("expected a JSON object".to_string());
    };

    let warnings = match object.remove("warnings") {
        Some(serde_json::Value::Object(inner)) => inner,
        Some(other) => {
            return Err(format!("'warnings' must be an object, got {}", other));
        }
        None => object,
    };

    Ok(warnings.into_iter().collect())
}

/// reqwest-backed [`MonitorClient`]
#[derive(Clone)]
pub struct HttpMonitorClient {
    transport: Transport,
    path: String,
}

impl HttpMonitorClient {
    pub fn new(
        config: &MonitorConfig,
        run_id: Uuid,
        metrics: Option<Arc<Metrics>>,
    ) -> AppResult<Self> {
        Ok(Self {
            transport: Transport::new(
                &config.base_url,
                config.request_timeout_seconds,
                Target::Monitor,
                run_id,
                metrics,
            )?,
            path: config.path.clone(),
        })
    }

    async fn fetch(&self, format: OutputFormat) -> AppResult<String> {
        let endpoint = format!("GET {}?format={}", self.path, format);
        let request = self
            .transport
            .client
            .get(self.transport.url(&self.path))
            .query(&[("format", format.as_str())]);
        self.transport.send_expect_ok(&endpoint, request).await
    }
}

#[async_trait]
impl MonitorClient for HttpMonitorClient {
    async fn metrics(&self) -> AppResult<MetricsListing> {
        let body = self.fetch(OutputFormat::Json).await?;
        serde_json::from_str(&body).map_err(|e| AppError::InvalidResponse {
            endpoint: format!("GET {}?format=json", self.path),
            reason: format!("expected a JSON object keyed by metric path: {}", e),
        })
    }

    async fn metrics_raw(&self, format: OutputFormat) -> AppResult<String> {
        self.fetch(format).await
    }
}
