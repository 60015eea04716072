//! Transport serving probe data from a JSON fixture.
//!
//! Useful for demos, offline dashboards and tests. The fixture mirrors the
//! answers of the metrics service:
//!
//! ```json
//! {
//!   "values": {"web-1[SEP]cpu[SEP]load": {"values": [{"time": 0, "value": 1.5}]}},
//!   "forecasts": {"web-1[SEP]cpu[SEP]load": {"values": {"3600": [null, null, 2.0]}}},
//!   "logs": {"web-1": {"cpu": [{"time": 60, "state": 2, "output": "CRITICAL"}]}}
//! }
//! ```
//!
//! Every section is optional. Timestamps are in seconds; requested ranges
//! slice values and logs the way the real service would.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use probewatch_engine::{LogMap, Transport, TransportError};
use probewatch_types::{LogEntry, Millis, RawForecast, RawSeries, RawValues, Seconds};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::AdapterError;

/// Contents of a fixture file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub values: RawValues,
    #[serde(default)]
    pub forecasts: BTreeMap<String, RawForecast>,
    #[serde(default)]
    pub logs: LogMap,
}

/// A [`Transport`] answering from an in-memory [`Fixture`].
#[derive(Debug, Clone, Default)]
pub struct FileTransport {
    fixture: Arc<Fixture>,
}

impl FileTransport {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            fixture: Arc::new(fixture),
        }
    }

    /// Parse a fixture from JSON text.
    pub fn from_json(json: &str) -> Result<Self, AdapterError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Read and parse a fixture file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AdapterError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await?;
        let transport = Self::from_json(&json)?;
        debug!(
            path = %path.display(),
            probes = transport.fixture.values.len(),
            "loaded fixture"
        );
        Ok(transport)
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }
}

/// Requested bounds in whole seconds: start floored, end ceiled.
fn window(start: Option<Millis>, end: Option<Millis>) -> (Seconds, Seconds) {
    let start = start.map_or(Seconds::MIN, |ms| ms.div_euclid(1000));
    let end = end.map_or(Seconds::MAX, |ms| {
        ms.div_euclid(1000) + i64::from(ms.rem_euclid(1000) != 0)
    });
    (start, end)
}

#[async_trait]
impl Transport for FileTransport {
    async fn fetch_values(
        &self,
        keys: &[String],
        start: Option<Millis>,
        end: Option<Millis>,
    ) -> Result<RawValues, TransportError> {
        let (from, until) = window(start, end);
        Ok(keys
            .iter()
            .filter_map(|key| {
                let series = self.fixture.values.get(key)?;
                let sliced = RawSeries {
                    values: series
                        .values
                        .iter()
                        .filter(|p| p.time >= from && p.time <= until)
                        .cloned()
                        .collect(),
                    ..series.clone()
                };
                Some((key.clone(), sliced))
            })
            .collect())
    }

    async fn fetch_forecast(
        &self,
        keys: &[String],
    ) -> Result<BTreeMap<String, RawForecast>, TransportError> {
        Ok(keys
            .iter()
            .filter_map(|key| {
                let forecast = self.fixture.forecasts.get(key)?;
                Some((key.clone(), forecast.clone()))
            })
            .collect())
    }

    async fn fetch_logs(
        &self,
        host: &str,
        service: &str,
        start: Option<Millis>,
        end: Option<Millis>,
    ) -> Result<Vec<LogEntry>, TransportError> {
        let (from, until) = window(start, end);
        Ok(self
            .fixture
            .logs
            .get(host)
            .and_then(|services| services.get(service))
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.time >= from && e.time <= until)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
