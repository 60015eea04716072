//! Raw samples as returned by the metrics service, and aggregated points as
//! consumed by charts.

use std::collections::BTreeMap;

use crate::{Millis, Seconds, Timed};

/// One sample from the metrics service.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawPoint {
    /// Sample time, in seconds.
    pub time: Seconds,
    /// Sampled value; `None` when the service reported a gap.
    #[cfg_attr(feature = "serde", serde(default))]
    pub value: Option<f64>,
}

impl RawPoint {
    pub fn new(time: Seconds, value: impl Into<Option<f64>>) -> Self {
        Self {
            time,
            value: value.into(),
        }
    }
}

impl Timed for RawPoint {
    fn time(&self) -> i64 {
        self.time
    }
}

/// All samples of one probe returned by a values query.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawSeries {
    #[cfg_attr(feature = "serde", serde(default))]
    pub host: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub service: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub metric: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub values: Vec<RawPoint>,
}

/// Result of a values query, keyed by probe name.
pub type RawValues = BTreeMap<String, RawSeries>;

/// One displayable point of an aggregated series.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    /// Centre of the bucket, in milliseconds.
    pub x: Millis,
    pub y: f64,
    /// Baseline used by stacked renderers; always zero here.
    pub y0: f64,
    /// Marks the first point after a break in continuity.
    pub start: bool,
}

impl Point {
    pub fn new(x: Millis, y: f64, start: bool) -> Self {
        Self {
            x,
            y,
            y0: 0.0,
            start,
        }
    }
}

/// An aggregated view over a window of one probe.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AggregatedSeries {
    pub values: Vec<Point>,
    /// Requested window start, in milliseconds.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub start: Option<Millis>,
    /// Requested window end, in milliseconds.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub end: Option<Millis>,
    /// Lowest and highest known sample of the whole probe.
    pub range: (f64, f64),
    /// Buckets dropped because they evaluated to NaN.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "is_zero"))]
    pub dropped: usize,
}

#[cfg(feature = "serde")]
fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl AggregatedSeries {
    /// True when the series has no points.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// A fixed-step series built from cached raw points.
///
/// `points[i]` covers `[start + i * step, start + (i + 1) * step)`; `None`
/// marks buckets without any sample.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FixedStepSeries {
    pub start: Seconds,
    pub step: Seconds,
    pub points: Vec<Option<f64>>,
}
