//! # probewatch-types
//!
//! Core types shared by the probewatch engine, its transport adapters and the
//! worker protocol. A probe is one named metric of a monitored service; its
//! samples come back from the metrics store as `{time, value}` pairs and are
//! handed to charts as aggregated `{x, y}` points.
//!
//! ## Features
//!
//! - `serde`: JSON serialization via serde, using the field names the
//!   dashboard and the metrics service already speak
//!
//! ## Example
//!
//! ```rust
//! use probewatch_types::{AggregateMode, ProbeName, DEFAULT_SEPARATOR};
//!
//! let name = ProbeName::parse("web01[SEP]http[SEP]time", DEFAULT_SEPARATOR);
//! assert_eq!(name.host, "web01");
//! assert_eq!(name.host_service(), Some(("web01", "http")));
//!
//! let mode: AggregateMode = "avg".parse().unwrap();
//! assert_eq!(mode, AggregateMode::Avg);
//! ```

mod forecast;
mod log;
mod mode;
mod probe;
mod series;
mod time;

pub use forecast::*;
pub use log::*;
pub use mode::*;
pub use probe::*;
pub use series::*;
pub use time::*;
