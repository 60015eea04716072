//! Cache-backed access to raw probe samples.
//!
//! The [`ProbeManager`] keeps every downloaded sample in a [`RangeCache`]
//! (timestamps in seconds) and only asks the transport for the spans it does
//! not hold yet. On top of the cache it answers point lookups and builds
//! fixed-step series.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use probewatch_types::{AggregateMode, FixedStepSeries, RawPoint, Seconds};
use tracing::{debug, trace};

use crate::cache::{AtTime, RangeCache, Segment};
use crate::probe::combine;
use crate::{EngineError, Transport};

/// Furthest a cached sample may be from the requested time in
/// [`ProbeManager::at_time`].
pub const MAX_CURSOR_DISTANCE: Seconds = 5 * 60;

#[derive(Debug, Default)]
struct ManagerState {
    cache: RangeCache<RawPoint>,
    /// Most frequent spacing between samples, in minutes.
    native_intervals: HashMap<String, Option<i64>>,
}

/// Raw sample access with transparent download of missing spans.
#[derive(Debug, Clone)]
pub struct ProbeManager {
    state: Arc<Mutex<ManagerState>>,
    transport: Arc<dyn Transport>,
}

impl ProbeManager {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManagerState::default())),
            transport,
        }
    }

    /// Samples of `keys` within `[start, end)` (seconds), downloading the
    /// spans the cache does not cover yet.
    ///
    /// `start` is floored and `end` ceiled. All missing spans are fetched
    /// with a single request covering their union.
    pub async fn get(
        &self,
        keys: &[String],
        start: f64,
        end: f64,
    ) -> Result<BTreeMap<String, Vec<RawPoint>>, EngineError> {
        let (start, end) = seconds_window(keys, start, end)?;

        let missing: BTreeMap<String, Vec<(Seconds, Seconds)>> = {
            let state = self.state.lock();
            keys.iter()
                .filter_map(|key| Some((key.clone(), state.cache.missing_ranges(key, start, end)?)))
                .collect()
        };

        let span_start = missing.values().flatten().map(|(s, _)| *s).min();
        let span_end = missing.values().flatten().map(|(_, e)| *e).max();
        if let (Some(span_start), Some(span_end)) = (span_start, span_end) {
            let download: Vec<String> = missing.keys().cloned().collect();
            debug!(probes = download.len(), span_start, span_end, "downloading missing spans");

            let values = self
                .transport
                .fetch_values(&download, Some(span_start * 1000), Some(span_end * 1000))
                .await?;

            let mut state = self.state.lock();
            for (key, series) in values {
                let Some(gaps) = missing.get(&key) else {
                    continue;
                };
                // Only entries inside this key's own gaps are merged.
                for &(gap_start, gap_end) in gaps {
                    let entries = series
                        .values
                        .iter()
                        .filter(|p| p.time >= gap_start && p.time < gap_end)
                        .cloned()
                        .collect();
                    state.cache.merge(&key, gap_start, gap_end, entries);
                }
                let interval = native_interval(state.cache.segments(&key));
                trace!(probe = %key, ?interval, "native interval updated");
                state.native_intervals.insert(key, interval);
            }
        }

        Ok(self.state.lock().cache.read(keys, start, end))
    }

    /// Value of each probe closest to `t` (seconds), taken from the cache.
    ///
    /// Samples further than [`MAX_CURSOR_DISTANCE`] away are ignored. When
    /// both neighbours qualify the closer one wins, ties going to the later
    /// sample.
    pub fn at_time(&self, keys: &[String], t: Seconds) -> BTreeMap<String, Option<f64>> {
        let found = self.state.lock().cache.at_time(keys, t);
        found
            .into_iter()
            .map(|(key, at)| {
                if at.is_outside() {
                    debug!(probe = %key, t, "value requested outside the cache");
                }
                (key, nearest(at, t))
            })
            .collect()
    }

    /// Fixed-step series of `keys` over `[start, end)` (seconds).
    ///
    /// `interval` is the wanted step in seconds; it is raised to the probe's
    /// native interval when finer, and defaults to it when absent.
    pub async fn aggregated(
        &self,
        keys: &[String],
        start: f64,
        end: f64,
        interval: Option<Seconds>,
        mode: AggregateMode,
    ) -> Result<BTreeMap<String, FixedStepSeries>, EngineError> {
        let data = self.get(keys, start, end).await?;
        let (start, end) = seconds_window(keys, start, end)?;

        let state = self.state.lock();
        Ok(data
            .into_iter()
            .map(|(key, points)| {
                let native = state.native_intervals.get(&key).copied().flatten();
                let series = aggregated_unit(&points, start, end, interval, native, mode);
                (key, series)
            })
            .collect())
    }

    /// Native interval of `key` in minutes, once data was downloaded.
    pub fn native_interval(&self, key: &str) -> Option<i64> {
        self.state.lock().native_intervals.get(key).copied().flatten()
    }
}

fn seconds_window(keys: &[String], start: f64, end: f64) -> Result<(Seconds, Seconds), EngineError> {
    if keys.is_empty() {
        return Err(EngineError::malformed("no probes requested"));
    }
    if !start.is_finite() || !end.is_finite() {
        return Err(EngineError::malformed("start and end must be finite"));
    }
    Ok((start.floor() as Seconds, end.ceil() as Seconds))
}

/// Pick the value to show for `t` from the entries around it.
fn nearest(at: AtTime<RawPoint>, t: Seconds) -> Option<f64> {
    match at {
        AtTime::Outside | AtTime::Between(None, None) => None,
        AtTime::Exact(point) => point.value,
        AtTime::Between(Some(before), None) => {
            (t - before.time <= MAX_CURSOR_DISTANCE).then_some(before.value).flatten()
        }
        AtTime::Between(None, Some(after)) => {
            (after.time - t <= MAX_CURSOR_DISTANCE).then_some(after.value).flatten()
        }
        AtTime::Between(Some(before), Some(after)) => {
            let before_distance = t - before.time;
            let after_distance = after.time - t;
            if before_distance.min(after_distance) > MAX_CURSOR_DISTANCE {
                None
            } else if before_distance < after_distance {
                before.value
            } else {
                after.value
            }
        }
    }
}

/// Reduce `data` to one value per `[t, t + step)` bucket from `start` to
/// `end`.
///
/// `native` is the probe's native interval in minutes; the step never goes
/// below it. Buckets without samples are `None`.
pub fn aggregated_unit(
    data: &[RawPoint],
    start: Seconds,
    end: Seconds,
    interval: Option<Seconds>,
    native: Option<i64>,
    mode: AggregateMode,
) -> FixedStepSeries {
    let native = native.map(|minutes| minutes * 60);
    let step = match (interval, native) {
        (Some(interval), Some(native)) => interval.max(native),
        (Some(interval), None) => interval,
        (None, Some(native)) => native,
        (None, None) => 0,
    };

    let mut points = Vec::new();
    if step > 0 {
        let mut position = 0;
        let mut bucket_end = start;
        while bucket_end < end {
            bucket_end += step;
            let from = position;
            while position < data.len() && data[position].time < bucket_end {
                position += 1;
            }
            let values = data[from..position].iter().filter_map(|p| p.value);
            points.push(combine(mode, values));
        }
    }

    FixedStepSeries { start, step, points }
}

/// Most frequent distance between consecutive entries, rounded to minutes.
/// Ties go to the smallest distance.
pub fn native_interval(segments: &[Segment<RawPoint>]) -> Option<i64> {
    let mut distances: BTreeMap<i64, usize> = BTreeMap::new();
    for segment in segments {
        for pair in segment.entries.windows(2) {
            let distance = ((pair[1].time - pair[0].time) as f64 / 60.0).round() as i64;
            *distances.entry(distance).or_default() += 1;
        }
    }

    let mut best = None;
    let mut best_count = 0;
    for (distance, count) in distances {
        if count > best_count {
            best = Some(distance);
            best_count = count;
        }
    }
    best
}
