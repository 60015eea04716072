//! One client's protocol session.
//!
//! A [`Session`] turns decoded requests into calls on its own
//! [`Coordinator`] and collects the replies to send back.

use std::collections::BTreeMap;
use std::time::Duration;

use probewatch_engine::{AggregatedSeries, Coordinator, EngineError, FetchReport, QueryResult};
use tracing::{debug, info, warn};

use crate::config::remote_transport;
use crate::protocol::{Envelope, Reply, Request, Response};

/// Notice sent when a timeline update has to download data first.
pub const FETCH_NOTICE: &str = "New fromDate require to fetch new data";

/// Request handler bound to one coordinator.
#[derive(Debug, Clone)]
pub struct Session {
    coordinator: Coordinator,
    follows_base_url: bool,
    timeout: Duration,
}

impl Session {
    /// `follows_base_url` lets clients point the session at another
    /// metrics service; `timeout` applies to transports created that way.
    pub fn new(coordinator: Coordinator, follows_base_url: bool, timeout: Duration) -> Self {
        Self {
            coordinator,
            follows_base_url,
            timeout,
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Handle one request, returning its replies in send order.
    pub async fn handle(&self, envelope: Envelope) -> Vec<Reply> {
        let Envelope { request, signature } = envelope;
        let mut out = Replies::new(signature);

        match request {
            Request::SetBaseUrl { url, separator } => {
                if let Some(separator) = separator {
                    self.coordinator.set_separator(separator);
                }
                if self.follows_base_url {
                    match remote_transport(&url, self.timeout) {
                        Ok(transport) => {
                            self.coordinator.set_transport(transport);
                            info!(%url, "using metrics service");
                        }
                        Err(e) => out.error(format!("{e:#}")),
                    }
                } else {
                    debug!(%url, "ignoring base URL, serving fixture");
                }
            }
            Request::Register { name, interval } => {
                if name.is_empty() {
                    out.error("Failed to add probe, name must not be empty");
                } else {
                    self.coordinator.register(&name, interval);
                }
            }
            Request::Fetch { probes, start, end } => {
                match self.coordinator.fetch(&probes, start, end).await {
                    Ok(report) => out.fetched(report),
                    Err(e) => out.engine_error(e),
                }
            }
            Request::Get(query) => out.result(self.coordinator.get(&query)),
            Request::UpdateTimeline(query) => match self.coordinator.update_timeline(&query).await {
                Ok(update) => {
                    if let Some(report) = update.fetched {
                        out.notice(FETCH_NOTICE);
                        out.fetched(report);
                    }
                    out.result(update.result);
                }
                Err(e) => out.engine_error(e),
            },
            Request::CheckAggregate(query) => {
                if let Some(aggregates) = self.coordinator.check_aggregate_level_changed(&query) {
                    out.dropped(&aggregates);
                    out.push(Response::Aggregates(aggregates));
                }
            }
            Request::Cursor(date) => {
                let values = self.coordinator.cursor(date);
                out.push(Response::Cursor { values, date });
            }
            Request::Logs(query) => {
                let logs = self.coordinator.get_logs(&query);
                if !logs.is_empty() {
                    out.push(Response::Logs(logs));
                }
            }
            Request::Unregister(name) => {
                if !self.coordinator.unregister(&name) {
                    debug!(probe = %name, "delete of unknown probe");
                }
            }
        }

        out.into_inner()
    }
}

/// Replies collected for one request, all carrying its signature.
struct Replies {
    signature: Option<serde_json::Value>,
    replies: Vec<Reply>,
}

impl Replies {
    fn new(signature: Option<serde_json::Value>) -> Self {
        Self {
            signature,
            replies: Vec::new(),
        }
    }

    fn push(&mut self, response: Response) {
        self.replies.push(Reply::new(response, self.signature.clone()));
    }

    fn notice(&mut self, message: impl Into<String>) {
        self.push(Response::Notice(message.into()));
    }

    fn error(&mut self, message: impl Into<String>) {
        self.push(Response::Error(message.into()));
    }

    fn engine_error(&mut self, e: EngineError) {
        warn!(error = %e, "request failed");
        self.error(e.to_string());
    }

    fn fetched(&mut self, report: FetchReport) {
        self.push(Response::Values(report.values));
        match report.forecast_error {
            Some(e) => self.notice(format!("Failed to fetch forecasts: {e}")),
            None => self.push(Response::Forecasts(report.forecasts)),
        }
        if !report.logs.is_empty() {
            self.push(Response::Logs(report.logs));
        }
        for e in report.log_errors {
            self.notice(format!("Failed to fetch logs: {e}"));
        }
    }

    fn dropped(&mut self, series: &BTreeMap<String, AggregatedSeries>) {
        for (name, s) in series {
            if s.dropped > 0 {
                self.notice(format!("NaN spotted on probe {name}, {} points dropped", s.dropped));
            }
        }
    }

    fn result(&mut self, result: QueryResult) {
        self.dropped(&result.series);
        self.push(Response::Series(result.series));
        if !result.logs.is_empty() {
            self.push(Response::Logs(result.logs));
        }
    }

    fn into_inner(self) -> Vec<Reply> {
        self.replies
    }
}
