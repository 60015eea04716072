//! # probewatch-engine
//!
//! Client-side caching and aggregation of monitoring probe data.
//!
//! This crate keeps downloaded metric samples, forecasts and state change
//! logs in memory, works out which parts of a requested window still have to
//! be fetched, and reduces series to a displayable number of points.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use probewatch_engine::{AggregateMode, Coordinator, Query, Transport};
//!
//! # async fn run(transport: Arc<dyn Transport>) -> Result<(), probewatch_engine::EngineError> {
//! let coordinator = Coordinator::new(transport);
//! coordinator.register("web-1[SEP]cpu[SEP]load", 1);
//!
//! // Moving the visible window fetches what is missing, then aggregates.
//! let query = Query::new(["web-1[SEP]cpu[SEP]load"], Some(0), Some(86_400_000))
//!     .mode(AggregateMode::Avg);
//! let update = coordinator.update_timeline(&query).await?;
//!
//! for (probe, series) in &update.result.series {
//!     println!("{probe}: {} points", series.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Range cache**: [`RangeCache`] tracks which spans of each key are held
//!   and merges overlapping downloads
//! - **Series stores**: fixed-step sample arrays that splice new data in at
//!   either end or across gaps
//! - **Aggregation**: max, min and average buckets sized to the window,
//!   with stacked probes composed across a shared scale
//! - **Pluggable transport**: anything implementing [`Transport`] can feed
//!   the stores

mod cache;
mod coordinator;
mod error;
mod log;
mod manager;
mod probe;
mod query;
mod resample;
mod stack;
mod transport;

pub use cache::{merge_by_time, AtTime, RangeCache, Segment};
pub use coordinator::Coordinator;
pub use error::{EngineError, TransportError};
pub use log::LogStore;
pub use manager::{aggregated_unit, native_interval, ProbeManager, MAX_CURSOR_DISTANCE};
pub use probe::{SeriesStore, DEFAULT_STEP, MAX_BUCKETS};
pub use query::{
    ceil_millis, floor_millis, FetchReport, FocusQuery, LogMap, ProbeOptions, Query, QueryResult,
    TimelineUpdate,
};
pub use resample::{resample, step_ratio};
pub use stack::{aggregate_stack, StackMember};
pub use transport::Transport;

pub use probewatch_types::{AggregateMode, AggregatedSeries, FixedStepSeries, Millis, Seconds};
