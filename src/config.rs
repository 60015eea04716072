//! Layered settings.
//!
//! Values are resolved in this order, later sources winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`--config`)
//! 3. `PROBEWATCH_*` environment variables (e.g. `PROBEWATCH_BASE_URL`)
//! 4. command line flags

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use probewatch_adapters::FileTransport;
use probewatch_engine::Transport;
use probewatch_types::DEFAULT_SEPARATOR;
use serde::Deserialize;

use crate::duration::parse_duration;

/// Resolved settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Metrics service endpoint.
    pub base_url: String,
    /// Serve data from this fixture instead of the metrics service.
    pub fixture: Option<PathBuf>,
    /// Separator between host, service and metric in probe names.
    pub separator: String,
    /// `host:port` to accept TCP sessions on; stdin/stdout when unset.
    pub listen: Option<String>,
    /// Per-request timeout for the metrics service (e.g. "10s").
    pub request_timeout: String,
    /// Default log filter when `RUST_LOG` is unset.
    pub log: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            fixture: None,
            separator: DEFAULT_SEPARATOR.to_string(),
            listen: None,
            request_timeout: "10s".to_string(),
            log: "info".to_string(),
        }
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub fixture: Option<PathBuf>,
    pub separator: Option<String>,
    pub listen: Option<String>,
    pub request_timeout: Option<String>,
    pub log: Option<String>,
}

impl Settings {
    /// Resolve settings from `path`, the environment and `overrides`.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        Self::load_with_env(path, overrides, None)
    }

    fn load_with_env(
        path: Option<&Path>,
        overrides: &Overrides,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let fixture = overrides
            .fixture
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());

        let settings: Settings = builder
            .add_source(Environment::with_prefix("PROBEWATCH").source(env))
            .set_override_option("base_url", overrides.base_url.clone())?
            .set_override_option("fixture", fixture)?
            .set_override_option("separator", overrides.separator.clone())?
            .set_override_option("listen", overrides.listen.clone())?
            .set_override_option("request_timeout", overrides.request_timeout.clone())?
            .set_override_option("log", overrides.log.clone())?
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")?;

        settings.timeout()?;
        Ok(settings)
    }

    /// The parsed request timeout.
    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(&self.request_timeout)
            .with_context(|| format!("Invalid request_timeout {:?}", self.request_timeout))
    }

    /// Whether sessions may switch to the endpoint a client announces.
    ///
    /// Fixture-backed sessions keep serving the fixture.
    pub fn follows_base_url(&self) -> bool {
        self.fixture.is_none()
    }

    /// Build the transport these settings describe.
    pub async fn transport(&self) -> Result<Arc<dyn Transport>> {
        if let Some(path) = &self.fixture {
            let transport = FileTransport::load(path)
                .await
                .with_context(|| format!("Failed to load fixture {}", path.display()))?;
            return Ok(Arc::new(transport));
        }
        remote_transport(&self.base_url, self.timeout()?)
    }
}

/// Transport for a metrics service endpoint.
#[cfg(feature = "http")]
pub fn remote_transport(base_url: &str, timeout: Duration) -> Result<Arc<dyn Transport>> {
    let adapter = probewatch_adapters::MetroAdapter::builder()
        .endpoint(base_url)
        .timeout(timeout)
        .build();
    Ok(Arc::new(adapter))
}

/// Transport for a metrics service endpoint.
#[cfg(not(feature = "http"))]
pub fn remote_transport(base_url: &str, _timeout: Duration) -> Result<Arc<dyn Transport>> {
    anyhow::bail!("Cannot reach {base_url}: built without the `http` feature")
}
