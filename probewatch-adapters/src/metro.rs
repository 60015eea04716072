//! Metrics service adapter using its HTTP API.
//!
//! The service answers three queries:
//!
//! - **Values**: `GET /services/metrics/values?probes=..&start=..&end=..`
//!   returns the raw samples of each probe, timestamps in seconds
//! - **Forecasts**: `GET /services/predict/forecast?probes=..` returns the
//!   predicted values of the probes that have a model
//! - **Logs**: `GET /services/livestatus/get/service/logs/{host}/{service}/`
//!   returns the state changes of one service
//!
//! Several probes are requested by repeating the `probes` parameter.
//!
//! ## Example
//!
//! ```rust,no_run
//! use probewatch_adapters::metro::MetroAdapter;
//! use probewatch_engine::Transport;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = MetroAdapter::builder()
//!         .endpoint("http://metrics.local:5000")
//!         .build();
//!
//!     let keys = vec!["web-1[SEP]cpu[SEP]load".to_string()];
//!     let values = adapter.fetch_values(&keys, None, None).await?;
//!
//!     for (probe, series) in &values {
//!         println!("{}: {} samples", probe, series.values.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use probewatch_engine::{Transport, TransportError};
use probewatch_types::{LogBatch, LogEntry, Millis, RawForecast, RawValues, Seconds};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::AdapterError;

/// Adapter for the metrics, forecast and log services.
#[derive(Debug, Clone)]
pub struct MetroAdapter {
    client: Client,
    endpoint: String,
}

impl MetroAdapter {
    /// Create a new builder for configuring the adapter.
    pub fn builder() -> MetroAdapterBuilder {
        MetroAdapterBuilder::default()
    }

    /// The base URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Raw samples of `keys`, bounds in milliseconds.
    pub async fn values(
        &self,
        keys: &[String],
        start: Option<Millis>,
        end: Option<Millis>,
    ) -> Result<RawValues, AdapterError> {
        let url = format!("{}/services/metrics/values", self.endpoint);
        let mut query = probes_query(keys);
        query.extend(bounds_query(start, end));

        debug!(probes = keys.len(), ?start, ?end, "requesting values");
        let response = self.client.get(&url).query(&query).send().await?;
        decode(response).await
    }

    /// Forecasts of `keys`.
    pub async fn forecast(&self, keys: &[String]) -> Result<BTreeMap<String, RawForecast>, AdapterError> {
        let url = format!("{}/services/predict/forecast", self.endpoint);
        let query = probes_query(keys);

        let response = self.client.get(&url).query(&query).send().await?;
        decode(response).await
    }

    /// State changes of one service, bounds in milliseconds.
    pub async fn logs(
        &self,
        host: &str,
        service: &str,
        start: Option<Millis>,
        end: Option<Millis>,
    ) -> Result<Vec<LogEntry>, AdapterError> {
        let url = format!(
            "{}/services/livestatus/get/service/logs/{}/{}/",
            self.endpoint,
            path_segment(host),
            path_segment(service)
        );
        let query = bounds_query(start, end);

        let response = self.client.get(&url).query(&query).send().await?;
        let batch: LogBatch = decode(response).await?;
        Ok(batch.results)
    }
}

#[async_trait]
impl Transport for MetroAdapter {
    async fn fetch_values(
        &self,
        keys: &[String],
        start: Option<Millis>,
        end: Option<Millis>,
    ) -> Result<RawValues, TransportError> {
        Ok(self.values(keys, start, end).await?)
    }

    async fn fetch_forecast(
        &self,
        keys: &[String],
    ) -> Result<BTreeMap<String, RawForecast>, TransportError> {
        Ok(self.forecast(keys).await?)
    }

    async fn fetch_logs(
        &self,
        host: &str,
        service: &str,
        start: Option<Millis>,
        end: Option<Millis>,
    ) -> Result<Vec<LogEntry>, TransportError> {
        Ok(self.logs(host, service, start, end).await?)
    }
}

/// Builder for MetroAdapter.
#[derive(Debug, Default)]
pub struct MetroAdapterBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl MetroAdapterBuilder {
    /// Set the service endpoint (e.g., "http://localhost:5000").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the adapter.
    pub fn build(self) -> MetroAdapter {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));

        let client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
            warn!(error = %e, "failed to configure HTTP client, using defaults");
            Client::new()
        });

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| "http://localhost:5000".to_string());

        MetroAdapter {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, AdapterError> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(AdapterError::Auth(format!("API returned status {status}")));
    }
    if !status.is_success() {
        return Err(AdapterError::Http(format!("API returned status {status}")));
    }

    response
        .json()
        .await
        .map_err(|e| AdapterError::Parse(e.to_string()))
}

fn probes_query(keys: &[String]) -> Vec<(&'static str, String)> {
    keys.iter().map(|key| ("probes", key.clone())).collect()
}

/// `start` and `end` parameters in whole seconds, omitted when unset.
fn bounds_query(start: Option<Millis>, end: Option<Millis>) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(start) = start {
        query.push(("start", to_seconds(start).to_string()));
    }
    if let Some(end) = end {
        query.push(("end", to_seconds(end).to_string()));
    }
    query
}

fn to_seconds(ms: Millis) -> Seconds {
    ms.div_euclid(1000)
}

// Percent-encode the characters that would break a path segment
fn path_segment(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => encoded.push_str("%25"),
            '/' => encoded.push_str("%2F"),
            ' ' => encoded.push_str("%20"),
            '?' => encoded.push_str("%3F"),
            '#' => encoded.push_str("%23"),
            _ => encoded.push(c),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let adapter = MetroAdapter::builder().build();
        assert_eq!(adapter.endpoint(), "http://localhost:5000");
    }

    #[test]
    fn test_builder_custom() {
        let adapter = MetroAdapter::builder()
            .endpoint("http://metrics.local:8080/")
            .timeout(Duration::from_secs(2))
            .build();
        assert_eq!(adapter.endpoint(), "http://metrics.local:8080");
    }

    #[test]
    fn test_probes_query_repeats_parameter() {
        let keys = vec!["a[SEP]b[SEP]c".to_string(), "d[SEP]e[SEP]f".to_string()];
        let query = probes_query(&keys);
        assert_eq!(
            query,
            vec![
                ("probes", "a[SEP]b[SEP]c".to_string()),
                ("probes", "d[SEP]e[SEP]f".to_string()),
            ]
        );
    }

    #[test]
    fn test_bounds_query_in_seconds() {
        assert!(bounds_query(None, None).is_empty());
        assert_eq!(
            bounds_query(Some(1_500_999), Some(1_600_000)),
            vec![("start", "1500".to_string()), ("end", "1600".to_string())]
        );
        assert_eq!(bounds_query(None, Some(2_000)), vec![("end", "2".to_string())]);
    }

    #[test]
    fn test_to_seconds_floors() {
        assert_eq!(to_seconds(1_999), 1);
        assert_eq!(to_seconds(-1), -1);
    }

    #[test]
    fn test_path_segment() {
        assert_eq!(path_segment("web-1"), "web-1");
        assert_eq!(path_segment("Disk /var"), "Disk%20%2Fvar");
        assert_eq!(path_segment("100%"), "100%25");
    }
}
