//! # probewatch
//!
//! A probe data server for monitoring dashboards.
//!
//! Dashboards talk to probewatch over a line-based JSON protocol. Each
//! client gets its own session that caches probe samples, forecasts and
//! state change logs, fetches only what a moved timeline is missing, and
//! answers with series aggregated down to a drawable number of points.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  client ──NDJSON──▶ server ──▶ session ──▶ Coordinator        │
//! │                       ▲                      │  (engine)      │
//! │                       └──── replies ◀────────┤                │
//! │                                              ▼                │
//! │                              MetroAdapter | FileTransport     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`protocol`]**: opcode codec for requests and replies
//! - **[`session`]**: maps requests onto one client's coordinator
//! - **[`server`]**: stdio and TCP front ends
//! - **[`config`]**: layered settings (file, environment, flags)
//!
//! ## Usage
//!
//! ```bash
//! # Serve one dashboard on stdin/stdout against a metrics service
//! probewatch --base-url http://metrics:5000
//!
//! # Serve TCP clients from a fixture file
//! probewatch --fixture demo.json --listen 127.0.0.1:7000
//!
//! # One-off aggregation from the command line
//! probewatch aggregate 'web-1[SEP]cpu[SEP]load' --start 1700000000 --end 1700086400
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use std::sync::Arc;
//! use probewatch::{serve, Sessions};
//! use probewatch_adapters::FileTransport;
//!
//! # tokio_test::block_on(async {
//! let transport = FileTransport::load("demo.json").await.unwrap();
//! let sessions = Sessions::new(Arc::new(transport), "[SEP]");
//! serve(tokio::io::stdin(), tokio::io::stdout(), sessions.session())
//!     .await
//!     .unwrap();
//! # });
//! ```

pub mod config;
pub mod duration;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod session;

pub use config::{Overrides, Settings};
pub use protocol::{decode, Envelope, ProtocolError, Reply, Request, Response};
pub use server::{listen, serve, serve_stdio, Sessions};
pub use session::Session;
