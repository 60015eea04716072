//! The aggregation coordinator.
//!
//! A [`Coordinator`] owns the series and log stores of one client session and
//! the transport used to fill them. Handles are cheap to clone; every clone
//! shares the same stores.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use probewatch_types::{
    AggregateMode, AggregatedSeries, LogEntry, Millis, ProbeName, DEFAULT_SEPARATOR,
};
use tracing::{debug, info, warn};

use crate::log::LogStore;
use crate::probe::SeriesStore;
use crate::query::{FetchReport, FocusQuery, LogMap, Query, QueryResult, TimelineUpdate};
use crate::stack::{aggregate_stack, StackMember};
use crate::{EngineError, Transport};

#[derive(Debug, Default)]
struct EngineState {
    probes: BTreeMap<String, SeriesStore>,
    /// host -> service -> store
    logs: BTreeMap<String, BTreeMap<String, LogStore>>,
}

impl EngineState {
    fn log_store(&self, host: &str, service: &str) -> Option<&LogStore> {
        self.logs.get(host).and_then(|services| services.get(service))
    }

    fn log_store_mut(&mut self, host: &str, service: &str) -> Option<&mut LogStore> {
        self.logs.get_mut(host).and_then(|services| services.get_mut(service))
    }
}

/// Shared handle over one session's stores.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use probewatch_engine::{Coordinator, Query, Transport};
///
/// # async fn run(transport: Arc<dyn Transport>) -> Result<(), probewatch_engine::EngineError> {
/// let coordinator = Coordinator::new(transport);
/// coordinator.register("web-1[SEP]http[SEP]time", 5);
///
/// let keys = vec!["web-1[SEP]http[SEP]time".to_string()];
/// coordinator.fetch(&keys, Some(0), Some(3_600_000)).await?;
///
/// let result = coordinator.get(&Query::new(keys, Some(0), Some(3_600_000)));
/// println!("{} series", result.series.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Coordinator {
    state: Arc<Mutex<EngineState>>,
    transport: Arc<RwLock<Arc<dyn Transport>>>,
    separator: Arc<RwLock<String>>,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("probes", &self.state.lock().probes.len())
            .field("separator", &*self.separator.read())
            .finish()
    }
}

impl Coordinator {
    /// Create a coordinator fetching through `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState::default())),
            transport: Arc::new(RwLock::new(transport)),
            separator: Arc::new(RwLock::new(DEFAULT_SEPARATOR.to_string())),
        }
    }

    /// Use `separator` to split probe names into host, service and metric.
    pub fn with_separator(self, separator: impl Into<String>) -> Self {
        self.set_separator(separator);
        self
    }

    pub fn set_separator(&self, separator: impl Into<String>) {
        *self.separator.write() = separator.into();
    }

    pub fn separator(&self) -> String {
        self.separator.read().clone()
    }

    /// Replace the transport used by later fetches.
    pub fn set_transport(&self, transport: Arc<dyn Transport>) {
        *self.transport.write() = transport;
    }

    fn transport(&self) -> Arc<dyn Transport> {
        self.transport.read().clone()
    }

    /// Register a probe checked every `interval` minutes.
    ///
    /// Registering an existing probe keeps its data. Names of the form
    /// `host<sep>service<sep>metric` also get a log store for their service.
    pub fn register(&self, name: &str, interval: u32) {
        let separator = self.separator();
        let mut state = self.state.lock();

        if !state.probes.contains_key(name) {
            state.probes.insert(name.to_string(), SeriesStore::new(interval));
            debug!(probe = name, interval, "registered probe");
        }

        let parsed = ProbeName::parse(name, &separator);
        if let Some((host, service)) = parsed.host_service() {
            state
                .logs
                .entry(host.to_string())
                .or_default()
                .entry(service.to_string())
                .or_default();
        }
    }

    /// Drop a probe and its data. The log store of its service goes with it
    /// once no other probe refers to that service.
    ///
    /// Returns `true` if the probe was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let separator = self.separator();
        let mut state = self.state.lock();

        if state.probes.remove(name).is_none() {
            return false;
        }

        let parsed = ProbeName::parse(name, &separator);
        if let Some((host, service)) = parsed.host_service() {
            let shared = state.probes.keys().any(|other| {
                ProbeName::parse(other, &separator).host_service() == Some((host, service))
            });
            if !shared {
                let emptied = match state.logs.get_mut(host) {
                    Some(services) => {
                        services.remove(service);
                        services.is_empty()
                    }
                    None => false,
                };
                if emptied {
                    state.logs.remove(host);
                }
            }
        }

        debug!(probe = name, "unregistered probe");
        true
    }

    /// Names of all registered probes.
    pub fn probes(&self) -> Vec<String> {
        self.state.lock().probes.keys().cloned().collect()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.state.lock().probes.contains_key(name)
    }

    /// Fetch values, forecasts and logs for `keys` and merge them into the
    /// stores.
    ///
    /// The three downloads run concurrently. If the values cannot be
    /// fetched, the requested ranges are restored so a later call retries;
    /// forecast and log failures only show up in the report.
    pub async fn fetch(
        &self,
        keys: &[String],
        start: Option<Millis>,
        end: Option<Millis>,
    ) -> Result<FetchReport, EngineError> {
        if keys.is_empty() {
            return Err(EngineError::malformed("no probes to fetch"));
        }

        let separator = self.separator();
        let (previous, services) = {
            let mut state = self.state.lock();
            if let Some(unknown) = keys.iter().find(|k| !state.probes.contains_key(k.as_str())) {
                return Err(EngineError::malformed(format!("unknown probe {unknown}")));
            }

            let mut previous = Vec::with_capacity(keys.len());
            for key in keys {
                if let Some(probe) = state.probes.get_mut(key) {
                    let before = probe.requested();
                    probe.mark_requested(start, end);
                    previous.push((key.clone(), before, probe.requested()));
                }
            }

            let services: BTreeSet<(String, String)> = keys
                .iter()
                .filter_map(|key| {
                    let parsed = ProbeName::parse(key, &separator);
                    let (host, service) = parsed.host_service()?;
                    state
                        .log_store(host, service)
                        .map(|_| (host.to_string(), service.to_string()))
                })
                .collect();

            (previous, services)
        };

        let transport = self.transport();
        let logs = async {
            let mut results = Vec::with_capacity(services.len());
            for (host, service) in &services {
                let result = self.fetch_logs(host, service, start, end).await;
                results.push((host.clone(), service.clone(), result));
            }
            results
        };

        debug!(probes = keys.len(), ?start, ?end, "fetching");
        let (values, forecasts, logs) = tokio::join!(
            transport.fetch_values(keys, start, end),
            transport.fetch_forecast(keys),
            logs,
        );

        let mut report = FetchReport::default();
        for (host, service, result) in logs {
            match result {
                Ok(entries) if entries.is_empty() => {}
                Ok(entries) => {
                    report.logs.entry(host).or_default().insert(service, entries);
                }
                Err(e) => {
                    warn!(host = %host, service = %service, error = %e, "log fetch failed");
                    report.log_errors.push(format!("{host}/{service}: {e}"));
                }
            }
        }

        let mut state = self.state.lock();

        let values = match values {
            Ok(values) => values,
            Err(e) => {
                for (key, before, marked) in previous {
                    // Leave ranges another fetch has widened since.
                    if let Some(probe) = state.probes.get_mut(&key) {
                        if probe.requested() == marked {
                            probe.restore_requested(before);
                        }
                    }
                }
                warn!(error = %e, "value fetch failed, requested ranges restored");
                return Err(e.into());
            }
        };

        for (key, series) in &values {
            match state.probes.get_mut(key) {
                Some(probe) => {
                    probe.ingest_points(&series.values);
                }
                None => debug!(probe = %key, "ignoring values for unregistered probe"),
            }
        }
        report.values = values;

        match forecasts {
            Ok(forecasts) => {
                for (key, forecast) in &forecasts {
                    if let Some(probe) = state.probes.get_mut(key) {
                        probe.set_predicted(forecast);
                    }
                }
                report.forecasts = forecasts;
            }
            Err(e) => {
                warn!(error = %e, "forecast fetch failed");
                report.forecast_error = Some(e.to_string());
            }
        }

        info!(
            probes = report.values.len(),
            forecasts = report.forecasts.len(),
            "fetch complete"
        );
        Ok(report)
    }

    /// Aggregate the queried probes over the query window.
    ///
    /// Unregistered probes are skipped. Stacked probes are composed per
    /// scale with [`aggregate_stack`].
    pub fn get(&self, query: &Query) -> QueryResult {
        let separator = self.separator();
        let state = self.state.lock();

        let mut series = BTreeMap::new();
        let mut stacks: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for (name, options) in &query.probes {
            if options.stacked {
                stacks.entry(options.scale.as_str()).or_default().push(name);
                continue;
            }
            if let Some(probe) = state.probes.get(name) {
                series.insert(name.clone(), probe.aggregate(query.start, query.end, query.mode, None));
            }
        }

        for members in stacks.values() {
            series.extend(compose_stack(&state, members, query.start, query.end, query.mode));
        }

        let predictions = query
            .probes
            .keys()
            .filter_map(|name| {
                let predicted = state.probes.get(name)?.predicted()?;
                Some((name.clone(), predicted.clone()))
            })
            .collect();

        let logs = collect_logs(&state, query.probes.keys(), query.start, query.end, &separator);

        QueryResult {
            series,
            logs,
            predictions,
        }
    }

    /// Fresh aggregates for the probes whose aggregation level changes when
    /// moving from the query's context to its focus window, or `None` when
    /// the drawn data can be kept.
    ///
    /// A stack is recomputed as a whole when any of its members changed.
    pub fn check_aggregate_level_changed(
        &self,
        query: &FocusQuery,
    ) -> Option<BTreeMap<String, AggregatedSeries>> {
        let state = self.state.lock();
        let changed = |probe: &SeriesStore| {
            probe.check_aggregate(query.context, query.focus.padded(probe.step() * 2))
        };

        let mut results = BTreeMap::new();
        let mut stacks: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for (name, options) in &query.probes {
            if options.stacked {
                stacks.entry(options.scale.as_str()).or_default().push(name);
                continue;
            }
            let Some(probe) = state.probes.get(name) else {
                continue;
            };
            if changed(probe) {
                let window = query.focus.padded(probe.step() * 2);
                results.insert(
                    name.clone(),
                    probe.aggregate(Some(window.start), Some(window.end), query.mode, None),
                );
            }
        }

        for members in stacks.values() {
            let any_changed = members
                .iter()
                .filter_map(|name| state.probes.get(*name))
                .any(|probe| changed(probe));
            if any_changed {
                results.extend(compose_stack(
                    &state,
                    members,
                    Some(query.focus.start),
                    Some(query.focus.end),
                    query.mode,
                ));
            }
        }

        if results.is_empty() {
            None
        } else {
            Some(results)
        }
    }

    /// Fetch whatever part of the query window is missing, then answer the
    /// query.
    ///
    /// Only probes whose requested range does not yet cover the window are
    /// fetched.
    pub async fn update_timeline(&self, query: &Query) -> Result<TimelineUpdate, EngineError> {
        if query.probes.is_empty() || (query.start.is_none() && query.end.is_none()) {
            return Err(EngineError::malformed(
                "Can't update fromDate, missing parameters",
            ));
        }

        let stale: Vec<String> = {
            let state = self.state.lock();
            query
                .probes
                .keys()
                .filter(|name| {
                    state
                        .probes
                        .get(name.as_str())
                        .is_some_and(|probe| probe.needs_fetch(query.start, query.end))
                })
                .cloned()
                .collect()
        };

        let fetched = if stale.is_empty() {
            None
        } else {
            debug!(probes = stale.len(), "timeline moved outside requested range");
            Some(self.fetch(&stale, query.start, query.end).await?)
        };

        Ok(TimelineUpdate {
            fetched,
            result: self.get(query),
        })
    }

    /// Stored logs of the queried probes' services within the query window.
    pub fn get_logs(&self, query: &Query) -> LogMap {
        let separator = self.separator();
        let state = self.state.lock();
        collect_logs(&state, query.probes.keys(), query.start, query.end, &separator)
    }

    /// Value of every registered probe at `t`.
    pub fn cursor(&self, t: Millis) -> BTreeMap<String, Option<f64>> {
        let mut state = self.state.lock();
        state
            .probes
            .iter_mut()
            .map(|(name, probe)| (name.clone(), probe.value_at(t)))
            .collect()
    }

    /// Logs of one service.
    ///
    /// The transport is only asked while the store is still empty; after
    /// that the stored entries are returned as they are.
    pub async fn fetch_logs(
        &self,
        host: &str,
        service: &str,
        start: Option<Millis>,
        end: Option<Millis>,
    ) -> Result<Vec<LogEntry>, EngineError> {
        let download = {
            let state = self.state.lock();
            match state.log_store(host, service) {
                Some(store) => store.is_empty(),
                None => {
                    return Err(EngineError::malformed(format!(
                        "no probe registered for {host}/{service}"
                    )))
                }
            }
        };

        if download {
            let entries = self.transport().fetch_logs(host, service, start, end).await?;
            debug!(host, service, entries = entries.len(), "downloaded logs");
            let mut state = self.state.lock();
            if let Some(store) = state.log_store_mut(host, service) {
                store.set_data(entries);
            }
        }

        let state = self.state.lock();
        Ok(state
            .log_store(host, service)
            .map(|store| store.get_logs(None, None))
            .unwrap_or_default())
    }
}

/// Aggregate stacked probes at full resolution and compose them.
fn compose_stack(
    state: &EngineState,
    members: &[&str],
    start: Option<Millis>,
    end: Option<Millis>,
    mode: AggregateMode,
) -> BTreeMap<String, AggregatedSeries> {
    let stack: BTreeMap<String, StackMember> = members
        .iter()
        .filter_map(|name| {
            let probe = state.probes.get(*name)?;
            let series = probe.aggregate(start, end, mode, Some(1));
            let level = match (series.start, series.end) {
                (Some(from), Some(until)) => probe.pick_aggregate_level(from, until),
                _ => 1,
            };
            let member = StackMember {
                series,
                level,
                step: probe.step(),
            };
            Some((name.to_string(), member))
        })
        .collect();

    aggregate_stack(&stack, mode)
}

/// Logs of every service named by `probes`, first probe per service wins.
fn collect_logs<'a>(
    state: &EngineState,
    probes: impl Iterator<Item = &'a String>,
    start: Option<Millis>,
    end: Option<Millis>,
    separator: &str,
) -> LogMap {
    let mut logs = LogMap::new();
    for name in probes {
        let parsed = ProbeName::parse(name, separator);
        let Some((host, service)) = parsed.host_service() else {
            continue;
        };
        if logs.get(host).is_some_and(|services| services.contains_key(service)) {
            continue;
        }
        let Some(store) = state.log_store(host, service) else {
            continue;
        };
        let entries = store.get_logs(start, end);
        if !entries.is_empty() {
            logs.entry(host.to_string())
                .or_default()
                .insert(service.to_string(), entries);
        }
    }
    logs
}
