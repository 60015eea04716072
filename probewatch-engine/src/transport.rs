//! The contract between the engine and whatever fetches remote data.

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use probewatch_types::{LogEntry, Millis, RawForecast, RawValues};

use crate::TransportError;

/// Remote access to metric values, forecasts and state change logs.
///
/// Implementations only move data: the engine decides what to ask for and
/// merges the answers into its stores.
///
/// # Example
///
/// ```rust
/// use std::collections::BTreeMap;
/// use async_trait::async_trait;
/// use probewatch_engine::{Transport, TransportError};
/// use probewatch_types::{LogEntry, Millis, RawForecast, RawValues};
///
/// #[derive(Debug)]
/// struct Offline;
///
/// #[async_trait]
/// impl Transport for Offline {
///     async fn fetch_values(
///         &self,
///         _keys: &[String],
///         _start: Option<Millis>,
///         _end: Option<Millis>,
///     ) -> Result<RawValues, TransportError> {
///         Ok(RawValues::new())
///     }
///
///     async fn fetch_forecast(
///         &self,
///         _keys: &[String],
///     ) -> Result<BTreeMap<String, RawForecast>, TransportError> {
///         Ok(BTreeMap::new())
///     }
///
///     async fn fetch_logs(
///         &self,
///         _host: &str,
///         _service: &str,
///         _start: Option<Millis>,
///         _end: Option<Millis>,
///     ) -> Result<Vec<LogEntry>, TransportError> {
///         Ok(Vec::new())
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Raw samples of `keys` within `[start, end]` (milliseconds).
    async fn fetch_values(
        &self,
        keys: &[String],
        start: Option<Millis>,
        end: Option<Millis>,
    ) -> Result<RawValues, TransportError>;

    /// Forecasts for `keys`. Probes without a forecast are simply absent.
    async fn fetch_forecast(
        &self,
        keys: &[String],
    ) -> Result<BTreeMap<String, RawForecast>, TransportError>;

    /// State changes of one service within `[start, end]` (milliseconds).
    /// Entry times are in seconds, as delivered by the log service.
    async fn fetch_logs(
        &self,
        host: &str,
        service: &str,
        start: Option<Millis>,
        end: Option<Millis>,
    ) -> Result<Vec<LogEntry>, TransportError>;
}
