//! # probewatch-adapters
//!
//! Ready-made [`Transport`](probewatch_engine::Transport) implementations
//! feeding the probewatch engine.
//!
//! ## Supported Sources
//!
//! - **Metrics service** (`http` feature) - Fetches raw samples, forecasts
//!   and state change logs over the service's HTTP API
//! - **Fixture files** - Serves the same data from a JSON file, for demos
//!   and tests
//!
//! ## Quick Start (fixture)
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use probewatch_adapters::file::FileTransport;
//! use probewatch_engine::Coordinator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = FileTransport::load("fixture.json").await?;
//!     let coordinator = Coordinator::new(Arc::new(transport));
//!
//!     coordinator.register("web-1[SEP]cpu[SEP]load", 1);
//!     let report = coordinator
//!         .fetch(&["web-1[SEP]cpu[SEP]load".to_string()], None, None)
//!         .await?;
//!
//!     println!("Fetched {} probes", report.values.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod file;

#[cfg(feature = "http")]
pub mod metro;

pub use error::AdapterError;
pub use file::{FileTransport, Fixture};

#[cfg(feature = "http")]
pub use metro::{MetroAdapter, MetroAdapterBuilder};
