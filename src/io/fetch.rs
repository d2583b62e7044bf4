//! Package lookup over HTTP
//!
//! Protocol:
//! - `GET {base_url}/get_package/{id}` returns the record JSON, or
//!   `{"error": "..."}` with a success status for business failures
//! - `HEAD {base_url}/` is the reachability probe
//!
//! Each lookup races the whole exchange (send + body) against a timer.
//! The losing branch is dropped, which closes the connection or cancels
//! the timer; dropping the lookup future itself releases both.

use crate::domain::record::PackageRecord;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

const USER_AGENT: &str =
    concat!("herbtrace/", env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// Log a failed lookup (cold path)
#[cold]
fn log_fetch_failed(lookup_id: &Uuid, identifier: &str, error: &FetchError, latency_ms: u64) {
    warn!(
        lookup_id = %lookup_id,
        identifier = %identifier,
        kind = %error.kind(),
        error = %error,
        latency_ms = %latency_ms,
        "package_fetch_failed"
    );
}

/// Log a transport error before it is folded into `NetworkUnreachable` (cold path)
#[cold]
fn log_transport_error(e: &reqwest::Error) {
    debug!(error = %e, is_connect = e.is_connect(), "package_transport_error");
}

/// Every way a lookup can fail. All are recoverable by the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("network unreachable")]
    NetworkUnreachable,
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),
    #[error("response body is not valid JSON")]
    MalformedResponse,
    #[error("backend reported: {0}")]
    Business(String),
}

impl FetchError {
    /// Short machine-readable name
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout => "timeout",
            FetchError::NetworkUnreachable => "network_unreachable",
            FetchError::HttpStatus(_) => "http_status",
            FetchError::MalformedResponse => "malformed_response",
            FetchError::Business(_) => "business",
        }
    }

    /// Message suitable for showing to the person who scanned the package
    pub fn user_message(&self) -> String {
        match self {
            FetchError::Timeout => {
                "Request timed out. Please check your connection and try again.".to_string()
            }
            FetchError::NetworkUnreachable => {
                "Network error: cannot connect to the server. Make sure the backend is running."
                    .to_string()
            }
            FetchError::HttpStatus(code) => format!("Server returned HTTP status {code}."),
            FetchError::MalformedResponse => {
                "The server sent a response that could not be read.".to_string()
            }
            FetchError::Business(message) => message.clone(),
        }
    }
}

/// Anything that can resolve an identifier to a package record
#[async_trait]
pub trait PackageSource: Send + Sync {
    async fn fetch_package(&self, identifier: &str) -> Result<PackageRecord, FetchError>;
}

/// Interpret a successful response body
pub fn decode_record(body: &[u8]) -> Result<PackageRecord, FetchError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| FetchError::MalformedResponse)?;

    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Err(FetchError::Business(message.to_string()));
    }

    Ok(PackageRecord::from_value(value))
}

fn classify_transport(e: reqwest::Error) -> FetchError {
    log_transport_error(&e);
    FetchError::NetworkUnreachable
}

pub struct FetchClient {
    base_url: String,
    request_timeout: Duration,
    probe_timeout: Duration,
    http: reqwest::Client,
    metrics: Arc<Metrics>,
}

impl FetchClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        // No client-level timeout: the lookup race owns the time budget
        let http = reqwest::Client::builder().user_agent(USER_AGENT).http1_only().build()?;

        Ok(Self {
            base_url: config.base_url().to_string(),
            request_timeout: Duration::from_millis(config.request_timeout_ms()),
            probe_timeout: Duration::from_millis(config.probe_timeout_ms()),
            http,
            metrics: Arc::new(Metrics::new()),
        })
    }

    /// Share a metrics collector with the caller
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The identifier is opaque and goes in as a single path segment
    pub fn package_url(&self, identifier: &str) -> String {
        format!("{}/get_package/{}", self.base_url, urlencoding::encode(identifier))
    }

    /// Look up one package. Exactly one attempt; never retries.
    pub async fn fetch_package(&self, identifier: &str) -> Result<PackageRecord, FetchError> {
        let lookup_id = Uuid::now_v7();
        let url = self.package_url(identifier);
        let start = Instant::now();

        debug!(
            lookup_id = %lookup_id,
            identifier = %identifier,
            url = %url,
            timeout_ms = %self.request_timeout.as_millis(),
            "package_fetch_started"
        );

        let result = tokio::select! {
            biased;

            outcome = self.request_record(&url) => outcome,
            _ = tokio::time::sleep(self.request_timeout) => Err(FetchError::Timeout),
        };

        let latency_ms = start.elapsed().as_millis() as u64;
        self.metrics.record_lookup(result.as_ref().err(), latency_ms);

        match &result {
            Ok(record) => info!(
                lookup_id = %lookup_id,
                identifier = %identifier,
                ingredients = %record.ingredients.len(),
                latency_ms = %latency_ms,
                "package_fetch_completed"
            ),
            Err(e) => log_fetch_failed(&lookup_id, identifier, e, latency_ms),
        }

        result
    }

    async fn request_record(&self, url: &str) -> Result<PackageRecord, FetchError> {
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        debug!(status = %status.as_u16(), "package_response_status");
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(classify_transport)?;
        decode_record(&body)
    }

    /// Lightweight pre-flight check. Any failure, including running out of
    /// the probe budget, is `false`.
    pub async fn check_reachable(&self) -> bool {
        let url = format!("{}/", self.base_url);
        let reachable =
            match tokio::time::timeout(self.probe_timeout, self.http.head(&url).send()).await {
                Ok(Ok(response)) => response.status().is_success(),
                Ok(Err(e)) => {
                    debug!(url = %url, error = %e, "probe_failed");
                    false
                }
                Err(_) => {
                    debug!(url = %url, timeout_ms = %self.probe_timeout.as_millis(), "probe_timeout");
                    false
                }
            };

        self.metrics.record_probe(reachable);
        info!(url = %url, reachable = %reachable, "backend_probe");
        reachable
    }
}

#[async_trait]
impl PackageSource for FetchClient {
    async fn fetch_package(&self, identifier: &str) -> Result<PackageRecord, FetchError> {
        FetchClient::fetch_package(self, identifier).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_record() {
        let body = br#"{"package_details": {"package_id": "PKG-1"}, "ingredients": []}"#;
        let record = decode_record(body).unwrap();
        assert_eq!(record.package_details.package_id.as_deref(), Some("PKG-1"));
    }

    #[test]
    fn test_decode_business_error() {
        let result = decode_record(br#"{"error": "Package not found"}"#);
        assert_eq!(result, Err(FetchError::Business("Package not found".to_string())));
    }

    #[test]
    fn test_decode_non_string_error_is_record() {
        // Only a string `error` field marks a business failure
        let result = decode_record(br#"{"error": null, "package_details": {}}"#);
        assert!(result.is_ok());
    }

    #[test]
    fn test_decode_malformed() {
        assert_eq!(decode_record(b"<html>oops</html>"), Err(FetchError::MalformedResponse));
        assert_eq!(decode_record(b""), Err(FetchError::MalformedResponse));
    }

    #[test]
    fn test_package_url_encodes_identifier() {
        let config = Config::default().with_base_url("http://localhost:8001/");
        let client = FetchClient::new(&config).unwrap();
        assert_eq!(client.package_url("PKG-1001"), "http://localhost:8001/get_package/PKG-1001");
        assert_eq!(
            client.package_url("a/b?c"),
            "http://localhost:8001/get_package/a%2Fb%3Fc"
        );
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(FetchError::Business("Package not found".into()).user_message(), "Package not found");
        assert_eq!(FetchError::HttpStatus(502).user_message(), "Server returned HTTP status 502.");
        assert!(FetchError::Timeout.user_message().starts_with("Request timed out"));
    }
}
