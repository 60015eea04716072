//! Per-probe sample store.
//!
//! A [`SeriesStore`] holds a fixed-step sample array for one probe together
//! with the bookkeeping needed to avoid refetching: the range it knows, and
//! the (wider) range already asked of the transport.

use std::collections::HashMap;

use probewatch_types::{
    AggregateMode, AggregatedSeries, Millis, Point, Predicted, RawForecast, RawPoint, TimeRange,
};
use tracing::warn;

use crate::resample::{resample, step_ratio};

/// Sample spacing assumed until data arrives.
pub const DEFAULT_STEP: Millis = 60_000;

/// Upper bound on the number of buckets an automatic aggregation produces.
pub const MAX_BUCKETS: f64 = 100.0;

const MAX_LEVEL: u32 = 1 << 30;

/// Sample store for one probe.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    known: Option<(Millis, Millis)>,
    requested_from: Option<Millis>,
    requested_until: Option<Millis>,
    /// Check interval, in minutes.
    interval: u32,
    step: Millis,
    samples: Vec<Option<f64>>,
    predicted: Option<Predicted>,
    cursor_cache: HashMap<Millis, Option<f64>>,
}

impl Default for SeriesStore {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SeriesStore {
    /// Create an empty store for a probe checked every `interval` minutes.
    pub fn new(interval: u32) -> Self {
        Self {
            known: None,
            requested_from: None,
            requested_until: None,
            interval: interval.max(1),
            step: DEFAULT_STEP,
            samples: Vec::new(),
            predicted: None,
            cursor_cache: HashMap::new(),
        }
    }

    /// Known range `(from, until)`, if any data was ingested.
    pub fn known(&self) -> Option<(Millis, Millis)> {
        self.known
    }

    /// Range already requested from the transport.
    pub fn requested(&self) -> (Option<Millis>, Option<Millis>) {
        (self.requested_from, self.requested_until)
    }

    /// Restore a previously captured requested range.
    pub fn restore_requested(&mut self, requested: (Option<Millis>, Option<Millis>)) {
        self.requested_from = requested.0;
        self.requested_until = requested.1;
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn set_interval(&mut self, interval: u32) {
        self.interval = interval.max(1);
    }

    pub fn step(&self) -> Millis {
        self.step
    }

    pub fn samples(&self) -> &[Option<f64>] {
        &self.samples
    }

    pub fn predicted(&self) -> Option<&Predicted> {
        self.predicted.as_ref()
    }

    /// True when `start` or `end` reaches outside the range already asked
    /// of the transport.
    pub fn needs_fetch(&self, start: Option<Millis>, end: Option<Millis>) -> bool {
        let before = match (start, self.requested_from) {
            (Some(start), Some(from)) => start < from,
            (Some(_), None) => true,
            (None, _) => false,
        };
        let after = match (end, self.requested_until) {
            (Some(end), Some(until)) => end > until,
            (Some(_), None) => true,
            (None, _) => false,
        };
        before || after
    }

    /// Widen the requested range to include `start` and `end`.
    pub fn mark_requested(&mut self, start: Option<Millis>, end: Option<Millis>) {
        if let Some(start) = start {
            self.requested_from = Some(self.requested_from.map_or(start, |f| f.min(start)));
        }
        if let Some(end) = end {
            self.requested_until = Some(self.requested_until.map_or(end, |u| u.max(end)));
        }
    }

    /// Merge a fixed-step sample array covering `[start, end]`.
    pub fn ingest(&mut self, samples: Vec<Option<f64>>, start: Millis, end: Millis, step: Millis) {
        let step = if step > 0 { step } else { self.step };

        match self.known {
            Some((from, until)) if start >= from && end <= until => {}
            Some((from, until)) if !(start <= from && end >= until) => {
                self.splice(samples, start, end, step, from, until);
            }
            _ => {
                self.samples = samples;
                self.known = Some((start, end));
                self.step = step;
            }
        }

        self.mark_requested(Some(start), Some(end));
        self.cursor_cache.clear();
    }

    fn splice(
        &mut self,
        samples: Vec<Option<f64>>,
        start: Millis,
        end: Millis,
        step: Millis,
        known_from: Millis,
        known_until: Millis,
    ) {
        let current = std::mem::take(&mut self.samples);
        let (current, incoming, step) = if step > self.step {
            let ratio = step_ratio(step, self.step);
            (resample(&current, ratio), samples, step)
        } else if step < self.step {
            let ratio = step_ratio(self.step, step);
            (current, resample(&samples, ratio), self.step)
        } else {
            (current, samples, step)
        };

        let from = known_from.min(start);
        let until = known_until.max(end);
        let offset = |t: Millis| ((t - from) as f64 / step as f64).round() as usize;
        let current_offset = offset(known_from);
        let incoming_offset = offset(start);

        let len = (current_offset + current.len()).max(incoming_offset + incoming.len());
        let mut merged = vec![None; len];
        for (i, value) in current.into_iter().enumerate() {
            merged[current_offset + i] = value;
        }
        for (i, value) in incoming.into_iter().enumerate() {
            let slot = &mut merged[incoming_offset + i];
            if slot.is_none() {
                *slot = value;
            }
        }

        self.samples = merged;
        self.known = Some((from, until));
        self.step = step;
    }

    /// Slot raw transport points onto this probe's check interval and
    /// ingest them. Returns `false` when there was nothing to ingest.
    ///
    /// The first point of each slot wins; empty slots between filled ones
    /// become gaps.
    pub fn ingest_points(&mut self, points: &[RawPoint]) -> bool {
        let slot = i64::from(self.interval) * 60;
        let mut sorted: Vec<&RawPoint> = points.iter().collect();
        sorted.sort_by_key(|p| p.time);

        let mut values = Vec::with_capacity(sorted.len());
        let mut first = None;
        let mut last: Option<i64> = None;
        for point in sorted {
            let current = point.time - point.time.rem_euclid(slot);
            match last {
                Some(previous) if current <= previous => continue,
                Some(previous) => {
                    let gap = ((current - previous) / slot - 1).max(0) as usize;
                    values.extend(std::iter::repeat(None).take(gap));
                }
                None => first = Some(current),
            }
            values.push(point.value);
            last = Some(current);
        }

        let (Some(first), Some(last)) = (first, last) else {
            return false;
        };

        self.ingest(
            values,
            first * 1000,
            last * 1000 + slot * 1000 - 1,
            slot * 1000,
        );
        true
    }

    /// Aggregate the window `[from, until]` into displayable points.
    ///
    /// Missing bounds default to the known range. Without an explicit
    /// `interval`, the bucket size comes from [`pick_aggregate_level`].
    ///
    /// [`pick_aggregate_level`]: SeriesStore::pick_aggregate_level
    pub fn aggregate(
        &self,
        from: Option<Millis>,
        until: Option<Millis>,
        mode: AggregateMode,
        interval: Option<u32>,
    ) -> AggregatedSeries {
        let Some((known_from, known_until)) = self.known else {
            return AggregatedSeries {
                start: from,
                end: until,
                ..Default::default()
            };
        };
        let from = from.unwrap_or(known_from);
        let until = until.unwrap_or(known_until);
        let interval = interval
            .filter(|i| *i > 0)
            .unwrap_or_else(|| self.pick_aggregate_level(from, until));
        let bucket_span = i64::from(interval) * self.step;

        let mut values = Vec::new();
        let mut dropped = 0;
        let mut start = true;
        for (i, bucket) in self.samples.chunks(interval as usize).enumerate() {
            let time = known_from + i as i64 * bucket_span;
            if time < from {
                continue;
            }
            if time > until {
                break;
            }

            let combined = combine(mode, bucket.iter().flatten().copied());
            let is_null = combined.is_none();
            if is_null && start {
                continue;
            }

            let y = combined.unwrap_or(0.0);
            if y.is_nan() {
                warn!(time, "NaN spotted on basic probe, bucket dropped");
                dropped += 1;
                continue;
            }

            values.push(Point::new(time + bucket_span / 2, y, start));
            if start {
                start = false;
            } else if is_null {
                start = true;
            }
        }

        AggregatedSeries {
            values,
            start: Some(from),
            end: Some(until),
            range: self.range(),
            dropped,
        }
    }

    /// Lowest and highest sample, `(0, 0)` when there is none.
    pub fn range(&self) -> (f64, f64) {
        self.samples
            .iter()
            .flatten()
            .filter(|v| !v.is_nan())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((*v, *v)),
                Some((lo, hi)) => Some((lo.min(*v), hi.max(*v))),
            })
            .unwrap_or((0.0, 0.0))
    }

    /// Smallest power-of-two bucket size keeping `[from, until]` within
    /// [`MAX_BUCKETS`] points.
    pub fn pick_aggregate_level(&self, from: Millis, until: Millis) -> u32 {
        let start = match self.known {
            Some((known_from, _)) => from.max(known_from),
            None => from,
        };
        let length = (until - start) as f64 / self.step as f64;
        let mut level = 1u32;
        while length / f64::from(level) > MAX_BUCKETS && level < MAX_LEVEL {
            level *= 2;
        }
        level
    }

    /// True unless moving from `context` to `focus` keeps the same
    /// aggregation level and stays within the already drawn window.
    pub fn check_aggregate(&self, context: TimeRange, focus: TimeRange) -> bool {
        let context_level = self.pick_aggregate_level(context.start, context.end);
        let focus_level = self.pick_aggregate_level(focus.start, focus.end);
        !(context_level == focus_level && context.contains(&focus))
    }

    /// Value at `t`: the nearest known sample (gaps read as 0), else the
    /// nearest predicted value, else `None`. Lookups are memoised until the
    /// next ingest.
    pub fn value_at(&mut self, t: Millis) -> Option<f64> {
        if let Some(cached) = self.cursor_cache.get(&t) {
            return *cached;
        }
        let value = self.lookup(t);
        self.cursor_cache.insert(t, value);
        value
    }

    fn lookup(&self, t: Millis) -> Option<f64> {
        if let Some((from, until)) = self.known {
            if t >= from && t <= until {
                let offset = ((t - from) as f64 / self.step as f64).round() as usize;
                return Some(self.samples.get(offset).copied().flatten().unwrap_or(0.0));
            }
        }

        let predicted = self.predicted.as_ref().filter(|p| p.covers(t))?;
        let offset = match predicted.step {
            Some(step) if step != 0 => ((t - predicted.start) as f64 / step as f64).round() as usize,
            _ => 0,
        };
        predicted
            .values
            .get(offset)
            .or_else(|| predicted.values.last())
            .and_then(|p| p.value)
    }

    /// Store a forecast. Empty forecasts are ignored.
    pub fn set_predicted(&mut self, forecast: &RawForecast) {
        if let Some(predicted) = Predicted::from_raw(forecast) {
            self.predicted = Some(predicted);
            self.cursor_cache.clear();
        }
    }
}

/// Fold values with `mode`. `None` when there are no values; NaN inputs
/// yield NaN.
pub(crate) fn combine(mode: AggregateMode, values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut acc: Option<f64> = None;
    let mut count = 0usize;
    for v in values {
        count += 1;
        acc = Some(match acc {
            None => v,
            Some(a) if a.is_nan() || v.is_nan() => f64::NAN,
            Some(a) => match mode {
                AggregateMode::Max => a.max(v),
                AggregateMode::Min => a.min(v),
                AggregateMode::Avg => a + v,
            },
        });
    }
    match mode {
        AggregateMode::Avg => acc.map(|sum| sum / count as f64),
        _ => acc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Millis = 60_000;

    fn store_with(samples: Vec<Option<f64>>, from: Millis, step: Millis) -> SeriesStore {
        let mut store = SeriesStore::new(1);
        let end = from + samples.len() as i64 * step - 1;
        store.ingest(samples, from, end, step);
        store
    }

    fn ys(series: &AggregatedSeries) -> Vec<f64> {
        series.values.iter().map(|p| p.y).collect()
    }

    #[test]
    fn test_new_store_defaults() {
        let store = SeriesStore::new(0);
        assert_eq!(store.interval(), 1);
        assert_eq!(store.step(), DEFAULT_STEP);
        assert_eq!(store.known(), None);
    }

    #[test]
    fn test_needs_fetch_before_any_request() {
        let store = SeriesStore::new(1);
        assert!(store.needs_fetch(Some(0), Some(100)));
        assert!(!store.needs_fetch(None, None));
    }

    #[test]
    fn test_needs_fetch_outside_requested_range() {
        let mut store = SeriesStore::new(1);
        store.mark_requested(Some(100), Some(200));
        assert!(!store.needs_fetch(Some(120), Some(180)));
        assert!(!store.needs_fetch(Some(100), Some(200)));
        assert!(store.needs_fetch(Some(50), Some(180)));
        assert!(store.needs_fetch(Some(120), Some(250)));
    }

    #[test]
    fn test_mark_requested_only_widens() {
        let mut store = SeriesStore::new(1);
        store.mark_requested(Some(100), Some(200));
        store.mark_requested(Some(150), Some(160));
        assert_eq!(store.requested(), (Some(100), Some(200)));
        store.mark_requested(Some(50), None);
        assert_eq!(store.requested(), (Some(50), Some(200)));
    }

    #[test]
    fn test_ingest_into_empty_store() {
        let store = store_with(vec![Some(1.0), Some(2.0)], 0, MIN);
        assert_eq!(store.known(), Some((0, 2 * MIN - 1)));
        assert_eq!(store.samples(), &[Some(1.0), Some(2.0)]);
        assert_eq!(store.requested(), (Some(0), Some(2 * MIN - 1)));
    }

    #[test]
    fn test_ingest_subset_is_ignored() {
        let mut store = store_with(vec![Some(1.0), Some(2.0), Some(3.0)], 0, MIN);
        store.ingest(vec![Some(9.0)], MIN, 2 * MIN - 1, MIN);
        assert_eq!(store.samples(), &[Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_ingest_containing_range_replaces() {
        let mut store = store_with(vec![Some(1.0)], MIN, MIN);
        store.ingest(vec![Some(7.0), Some(8.0), Some(9.0)], 0, 3 * MIN - 1, MIN);
        assert_eq!(store.samples(), &[Some(7.0), Some(8.0), Some(9.0)]);
        assert_eq!(store.known(), Some((0, 3 * MIN - 1)));
    }

    #[test]
    fn test_ingest_appends_contiguous_range() {
        let mut store = store_with(vec![Some(1.0), Some(2.0)], 0, MIN);
        store.ingest(vec![Some(3.0), Some(4.0)], 2 * MIN, 4 * MIN - 1, MIN);
        assert_eq!(store.samples(), &[Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
        assert_eq!(store.known(), Some((0, 4 * MIN - 1)));
    }

    #[test]
    fn test_ingest_prepends_with_gap() {
        let mut store = store_with(vec![Some(5.0), Some(6.0)], 10 * MIN, MIN);
        store.ingest(vec![Some(1.0), Some(2.0)], 0, 2 * MIN - 1, MIN);

        let samples = store.samples();
        assert_eq!(samples.len(), 12);
        assert_eq!(&samples[..2], &[Some(1.0), Some(2.0)]);
        assert!(samples[2..10].iter().all(Option::is_none));
        assert_eq!(&samples[10..], &[Some(5.0), Some(6.0)]);
        assert_eq!(store.known(), Some((0, 12 * MIN - 1)));
    }

    #[test]
    fn test_ingest_overlap_keeps_existing_and_fills_gaps() {
        let mut store = store_with(vec![Some(1.0), None, Some(3.0)], 0, MIN);
        store.ingest(vec![Some(20.0), Some(30.0), Some(40.0)], MIN, 4 * MIN - 1, MIN);
        assert_eq!(
            store.samples(),
            &[Some(1.0), Some(20.0), Some(3.0), Some(40.0)]
        );
    }

    #[test]
    fn test_ingest_coarser_step_resamples_existing() {
        let mut store = store_with(vec![Some(1.0), Some(3.0), Some(5.0), Some(7.0)], 0, MIN);
        store.ingest(vec![Some(10.0), Some(20.0)], 4 * MIN, 8 * MIN - 1, 2 * MIN);
        assert_eq!(store.step(), 2 * MIN);
        assert_eq!(
            store.samples(),
            &[Some(2.0), Some(6.0), Some(10.0), Some(20.0)]
        );
    }

    #[test]
    fn test_ingest_finer_step_resamples_incoming() {
        let mut store = store_with(vec![Some(2.0), Some(6.0)], 0, 2 * MIN);
        store.ingest(
            vec![Some(1.0), Some(3.0), Some(5.0), Some(7.0)],
            4 * MIN,
            8 * MIN - 1,
            MIN,
        );
        assert_eq!(store.step(), 2 * MIN);
        assert_eq!(store.samples(), &[Some(2.0), Some(6.0), Some(2.0), Some(6.0)]);
    }

    #[test]
    fn test_known_range_never_shrinks() {
        let mut store = store_with(vec![Some(1.0); 10], 0, MIN);
        let before = store.known().unwrap();
        store.ingest(vec![Some(2.0)], 20 * MIN, 21 * MIN - 1, MIN);
        store.ingest(vec![Some(3.0)], 5 * MIN, 6 * MIN - 1, MIN);
        let after = store.known().unwrap();
        assert!(after.0 <= before.0 && after.1 >= before.1);
    }

    #[test]
    fn test_ingest_points_slots_by_interval() {
        let mut store = SeriesStore::new(1);
        let points = vec![
            RawPoint::new(60, 1.0),
            RawPoint::new(90, 9.0),
            RawPoint::new(240, 4.0),
        ];
        assert!(store.ingest_points(&points));
        assert_eq!(store.samples(), &[Some(1.0), None, None, Some(4.0)]);
        assert_eq!(store.known(), Some((60_000, 299_999)));
        assert_eq!(store.step(), 60_000);
    }

    #[test]
    fn test_ingest_points_uses_check_interval() {
        let mut store = SeriesStore::new(5);
        let points = vec![RawPoint::new(310, 1.0), RawPoint::new(960, 2.0)];
        assert!(store.ingest_points(&points));
        assert_eq!(store.step(), 300_000);
        assert_eq!(store.samples(), &[Some(1.0), None, Some(2.0)]);
        assert_eq!(store.known(), Some((300_000, 1_199_999)));
    }

    #[test]
    fn test_ingest_points_without_points() {
        let mut store = SeriesStore::new(1);
        assert!(!store.ingest_points(&[]));
        assert_eq!(store.known(), None);
    }

    #[test]
    fn test_aggregate_buckets_with_override() {
        let store = store_with(vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)], 0, MIN);
        let series = store.aggregate(None, None, AggregateMode::Max, Some(2));
        assert_eq!(ys(&series), vec![2.0, 4.0]);
        assert_eq!(series.values[0].x, MIN);
        assert_eq!(series.values[1].x, 3 * MIN);
        assert!(series.values[0].start);
        assert!(!series.values[1].start);
    }

    #[test]
    fn test_aggregate_modes() {
        let store = store_with(vec![Some(2.0), None, Some(4.0)], 0, MIN);
        let max = store.aggregate(None, None, AggregateMode::Max, Some(3));
        let min = store.aggregate(None, None, AggregateMode::Min, Some(3));
        let avg = store.aggregate(None, None, AggregateMode::Avg, Some(3));
        assert_eq!(ys(&max), vec![4.0]);
        assert_eq!(ys(&min), vec![2.0]);
        assert_eq!(ys(&avg), vec![3.0]);
    }

    #[test]
    fn test_aggregate_negative_values() {
        let store = store_with(vec![Some(-3.0), Some(-1.0)], 0, MIN);
        let max = store.aggregate(None, None, AggregateMode::Max, Some(2));
        assert_eq!(ys(&max), vec![-1.0]);
    }

    #[test]
    fn test_aggregate_marks_gaps() {
        let store = store_with(vec![None, Some(1.0), None, None, Some(2.0)], 0, MIN);
        let series = store.aggregate(None, None, AggregateMode::Max, Some(1));

        let points: Vec<(f64, bool)> = series.values.iter().map(|p| (p.y, p.start)).collect();
        assert_eq!(points, vec![(1.0, true), (0.0, false), (2.0, true)]);
    }

    #[test]
    fn test_aggregate_respects_window() {
        let samples = (1..=10).map(|v| Some(v as f64)).collect();
        let store = store_with(samples, 0, MIN);
        let series = store.aggregate(Some(3 * MIN), Some(5 * MIN), AggregateMode::Max, Some(1));
        assert_eq!(ys(&series), vec![4.0, 5.0, 6.0]);
        assert_eq!(series.start, Some(3 * MIN));
        assert_eq!(series.end, Some(5 * MIN));
    }

    #[test]
    fn test_aggregate_drops_nan() {
        let store = store_with(vec![Some(f64::NAN), Some(1.0)], 0, MIN);
        let series = store.aggregate(None, None, AggregateMode::Avg, Some(1));
        assert_eq!(series.dropped, 1);
        assert_eq!(ys(&series), vec![1.0]);
        assert!(series.values[0].start);
    }

    #[test]
    fn test_aggregate_empty_store() {
        let store = SeriesStore::new(1);
        let series = store.aggregate(Some(0), Some(10), AggregateMode::Max, None);
        assert!(series.is_empty());
        assert_eq!(series.range, (0.0, 0.0));
    }

    #[test]
    fn test_range_ignores_gaps() {
        let store = store_with(vec![None, Some(3.0), Some(-1.0)], 0, MIN);
        assert_eq!(store.range(), (-1.0, 3.0));
    }

    #[test]
    fn test_pick_aggregate_level() {
        let store = store_with(vec![Some(1.0)], 0, MIN);
        assert_eq!(store.pick_aggregate_level(0, 100 * MIN), 1);
        assert_eq!(store.pick_aggregate_level(0, 101 * MIN), 2);
        assert_eq!(store.pick_aggregate_level(0, 1000 * MIN), 16);
    }

    #[test]
    fn test_pick_aggregate_level_clamps_to_known_start() {
        let store = store_with(vec![Some(1.0)], 500 * MIN, MIN);
        assert_eq!(store.pick_aggregate_level(0, 600 * MIN), 1);
    }

    #[test]
    fn test_check_aggregate() {
        let store = store_with(vec![Some(1.0)], 0, MIN);
        let context = TimeRange::new(0, 100 * MIN);
        assert!(!store.check_aggregate(context, TimeRange::new(10 * MIN, 90 * MIN)));
        assert!(store.check_aggregate(context, TimeRange::new(-10 * MIN, 90 * MIN)));

        let wide = TimeRange::new(0, 1000 * MIN);
        assert!(store.check_aggregate(wide, TimeRange::new(0, 50 * MIN)));
    }

    #[test]
    fn test_value_at_known_sample() {
        let mut store = store_with(vec![Some(1.0), None, Some(3.0)], 0, MIN);
        assert_eq!(store.value_at(0), Some(1.0));
        assert_eq!(store.value_at(MIN + 10), Some(0.0));
        assert_eq!(store.value_at(2 * MIN - 20_000), Some(3.0));
        assert_eq!(store.value_at(10 * MIN), None);
    }

    #[test]
    fn test_value_at_falls_back_to_forecast() {
        let mut store = store_with(vec![Some(1.0)], 0, MIN);
        let mut forecast = RawForecast::default();
        for (t, v) in [(600, 1.0), (660, 2.0), (720, 3.0)] {
            forecast
                .values
                .insert(t.to_string(), vec![None, None, Some(v)]);
        }
        store.set_predicted(&forecast);

        assert_eq!(store.value_at(660_000), Some(2.0));
        assert_eq!(store.value_at(700_000), Some(3.0));
        assert_eq!(store.value_at(800_000), None);
    }

    #[test]
    fn test_value_at_cache_is_cleared_by_ingest() {
        let mut store = store_with(vec![Some(1.0)], 0, MIN);
        assert_eq!(store.value_at(5 * MIN), None);
        store.ingest(vec![Some(1.0); 10], 0, 10 * MIN - 1, MIN);
        assert_eq!(store.value_at(5 * MIN), Some(1.0));
    }

    #[test]
    fn test_value_at_is_memoised() {
        let mut store = store_with(vec![Some(1.0)], 0, MIN);
        store.cursor_cache.insert(42, Some(7.0));
        assert_eq!(store.value_at(42), Some(7.0));
    }

    #[test]
    fn test_empty_forecast_keeps_previous() {
        let mut store = SeriesStore::new(1);
        let mut forecast = RawForecast::default();
        forecast.values.insert("60".to_string(), vec![None, None, Some(1.0)]);
        store.set_predicted(&forecast);
        store.set_predicted(&RawForecast::default());
        assert!(store.predicted().is_some());
    }

    #[test]
    fn test_combine() {
        let values = [1.0, 5.0, 3.0];
        assert_eq!(combine(AggregateMode::Max, values.into_iter()), Some(5.0));
        assert_eq!(combine(AggregateMode::Min, values.into_iter()), Some(1.0));
        assert_eq!(combine(AggregateMode::Avg, values.into_iter()), Some(3.0));
        assert_eq!(combine(AggregateMode::Max, std::iter::empty()), None);
        assert!(combine(AggregateMode::Max, [1.0, f64::NAN].into_iter())
            .unwrap()
            .is_nan());
    }
}
