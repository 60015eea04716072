//! Requests accepted and reports produced by the [`Coordinator`](crate::Coordinator).
//!
//! Requests deserialize from the JSON shapes charting clients send:
//! fractional timestamps are floored (start) or ceiled (end) to whole
//! milliseconds and timelines arrive as `[start, end]` pairs.

use std::collections::BTreeMap;

use probewatch_types::{
    AggregateMode, AggregatedSeries, LogEntry, Millis, Predicted, RawForecast, RawValues, TimeRange,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Logs grouped by host, then service.
pub type LogMap = BTreeMap<String, BTreeMap<String, Vec<LogEntry>>>;

/// How a probe takes part in a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOptions {
    /// Drawn cumulatively with the other stacked probes of its scale.
    #[serde(default)]
    pub stacked: bool,
    /// Scale the probe is drawn on; stacks are grouped by it.
    #[serde(default, deserialize_with = "scale_name")]
    pub scale: String,
}

impl ProbeOptions {
    pub fn stacked(scale: impl Into<String>) -> Self {
        Self {
            stacked: true,
            scale: scale.into(),
        }
    }
}

/// A read over a time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub probes: BTreeMap<String, ProbeOptions>,
    #[serde(default, deserialize_with = "floor_millis")]
    pub start: Option<Millis>,
    #[serde(default, deserialize_with = "ceil_millis")]
    pub end: Option<Millis>,
    #[serde(default)]
    pub mode: AggregateMode,
}

impl Query {
    /// Query `names` unstacked over `[start, end]`.
    pub fn new<I, S>(names: I, start: Option<Millis>, end: Option<Millis>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            probes: names
                .into_iter()
                .map(|n| (n.into(), ProbeOptions::default()))
                .collect(),
            start,
            end,
            mode: AggregateMode::default(),
        }
    }

    /// Set the aggregation mode.
    pub fn mode(mut self, mode: AggregateMode) -> Self {
        self.mode = mode;
        self
    }

    /// Add or replace one probe.
    pub fn probe(mut self, name: impl Into<String>, options: ProbeOptions) -> Self {
        self.probes.insert(name.into(), options);
        self
    }

    pub fn keys(&self) -> Vec<String> {
        self.probes.keys().cloned().collect()
    }
}

/// A zoom or pan: `focus` is the new visible window, `context` the one
/// currently drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusQuery {
    pub probes: BTreeMap<String, ProbeOptions>,
    #[serde(rename = "contextTimeline", deserialize_with = "timeline")]
    pub context: TimeRange,
    #[serde(rename = "focusTimeline", deserialize_with = "timeline")]
    pub focus: TimeRange,
    #[serde(default)]
    pub mode: AggregateMode,
}

/// Aggregated series, logs and forecasts for a [`Query`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub series: BTreeMap<String, AggregatedSeries>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub logs: LogMap,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub predictions: BTreeMap<String, Predicted>,
}

/// Everything a fetch brought back.
///
/// Forecast and log failures do not fail a fetch; they are reported here.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchReport {
    pub values: RawValues,
    pub forecasts: BTreeMap<String, RawForecast>,
    pub logs: LogMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub log_errors: Vec<String>,
}

/// Outcome of a timeline update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimelineUpdate {
    /// Present when part of the window had to be fetched first.
    pub fetched: Option<FetchReport>,
    pub result: QueryResult,
}

fn scale_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Deserialize an optional timestamp, flooring fractions.
pub fn floor_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Millis>, D::Error> {
    Ok(finite(Option::<f64>::deserialize(deserializer)?).map(|v| v.floor() as Millis))
}

/// Deserialize an optional timestamp, ceiling fractions.
pub fn ceil_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Millis>, D::Error> {
    Ok(finite(Option::<f64>::deserialize(deserializer)?).map(|v| v.ceil() as Millis))
}

fn timeline<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeRange, D::Error> {
    let (start, end) = <(f64, f64)>::deserialize(deserializer)?;
    Ok(TimeRange::new(start.floor() as Millis, end.ceil() as Millis))
}
