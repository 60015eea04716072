//! Forecast data produced by the prediction service.

use std::collections::BTreeMap;

use crate::Millis;

/// Position of the forecast value inside each raw forecast tuple; the two
/// leading members are the confidence bounds.
pub const FORECAST_VALUE_INDEX: usize = 2;

/// A forecast as returned by the prediction service.
///
/// `values` maps a unix timestamp in seconds, rendered as a string, to a
/// tuple whose third member is the predicted value.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawForecast {
    #[cfg_attr(feature = "serde", serde(default))]
    pub values: BTreeMap<String, Vec<Option<f64>>>,
}

impl RawForecast {
    /// Parsed `(seconds, value)` pairs in chronological order. Keys that are
    /// not integers are skipped.
    pub fn points(&self) -> Vec<(i64, Option<f64>)> {
        let mut points: Vec<(i64, Option<f64>)> = self
            .values
            .iter()
            .filter_map(|(key, tuple)| {
                let time = key.trim().parse::<i64>().ok()?;
                let value = tuple.get(FORECAST_VALUE_INDEX).copied().flatten();
                Some((time, value))
            })
            .collect();
        points.sort_by_key(|(time, _)| *time);
        points
    }
}

/// One predicted point.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PredictedPoint {
    /// Point time, in milliseconds.
    pub date: Millis,
    pub value: Option<f64>,
}

/// A forecast normalised for lookups: sorted points and a fixed step.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Predicted {
    pub start: Millis,
    pub end: Millis,
    /// Distance between points; unknown for single-point forecasts.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub step: Option<Millis>,
    pub values: Vec<PredictedPoint>,
}

impl Predicted {
    /// Build a lookup table from a raw forecast. Returns `None` when the
    /// forecast holds no usable point.
    pub fn from_raw(raw: &RawForecast) -> Option<Self> {
        let points = raw.points();
        let first = points.first()?;
        let last = points.last()?;
        let step = points.get(1).map(|second| (second.0 - first.0) * 1000);

        Some(Self {
            start: first.0 * 1000,
            end: last.0 * 1000,
            step,
            values: points
                .iter()
                .map(|(time, value)| PredictedPoint {
                    date: time * 1000,
                    value: *value,
                })
                .collect(),
        })
    }

    /// True when `t` falls within the predicted window.
    pub fn covers(&self, t: Millis) -> bool {
        t >= self.start && t <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(entries: &[(&str, f64)]) -> RawForecast {
        RawForecast {
            values: entries
                .iter()
                .map(|(k, v)| (k.to_string(), vec![Some(v - 1.0), Some(v + 1.0), Some(*v)]))
                .collect(),
        }
    }

    #[test]
    fn test_points_are_sorted_numerically() {
        // "1000" sorts before "900" as a string
        let forecast = raw(&[("1000", 3.0), ("900", 2.0), ("1100", 4.0)]);
        let points = forecast.points();
        assert_eq!(points, vec![(900, Some(2.0)), (1000, Some(3.0)), (1100, Some(4.0))]);
    }

    #[test]
    fn test_predicted_from_raw() {
        let forecast = raw(&[("600", 1.0), ("660", 2.0), ("720", 3.0)]);
        let predicted = Predicted::from_raw(&forecast).unwrap();
        assert_eq!(predicted.start, 600_000);
        assert_eq!(predicted.end, 720_000);
        assert_eq!(predicted.step, Some(60_000));
        assert_eq!(predicted.values[1].value, Some(2.0));
        assert!(predicted.covers(660_000));
        assert!(!predicted.covers(720_001));
    }

    #[test]
    fn test_empty_forecast_is_ignored() {
        assert!(Predicted::from_raw(&RawForecast::default()).is_none());
    }

    #[test]
    fn test_single_point_has_no_step() {
        let predicted = Predicted::from_raw(&raw(&[("60", 5.0)])).unwrap();
        assert_eq!(predicted.step, None);
        assert_eq!(predicted.start, predicted.end);
    }

    #[test]
    fn test_short_tuple_yields_no_value() {
        let mut forecast = RawForecast::default();
        forecast.values.insert("60".to_string(), vec![Some(1.0)]);
        assert_eq!(forecast.points(), vec![(60, None)]);
    }
}
