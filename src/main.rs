use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use probewatch::config::{Overrides, Settings};
use probewatch::duration::parse_duration;
use probewatch::logging;
use probewatch::server::{listen, serve_stdio, Sessions};
use probewatch_engine::{AggregateMode, ProbeManager, MAX_CURSOR_DISTANCE};
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "probewatch")]
#[command(about = "Probe cache and aggregation server for monitoring dashboards")]
struct Args {
    /// Settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Metrics service endpoint
    #[arg(long)]
    base_url: Option<String>,

    /// Serve probe data from a JSON fixture instead of the metrics service
    #[arg(short, long)]
    fixture: Option<PathBuf>,

    /// Separator between host, service and metric in probe names
    #[arg(long)]
    separator: Option<String>,

    /// Accept TCP clients on this address instead of using stdin/stdout
    #[arg(short, long)]
    listen: Option<String>,

    /// Metrics service request timeout (e.g., "10s", "500ms")
    #[arg(long)]
    request_timeout: Option<String>,

    /// Log filter used when RUST_LOG is unset (e.g., "debug")
    #[arg(long)]
    log: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the protocol server (default)
    Serve,

    /// Print fixed-step series of probes as JSON
    Aggregate {
        /// Probe names
        #[arg(required = true)]
        probes: Vec<String>,

        /// Window start, Unix seconds
        #[arg(long)]
        start: f64,

        /// Window end, Unix seconds
        #[arg(long)]
        end: f64,

        /// Step between points (e.g., "5m"); defaults to the probes' own
        #[arg(long)]
        interval: Option<String>,

        /// Aggregation mode: max, min or avg
        #[arg(long, default_value = "max")]
        mode: AggregateMode,
    },

    /// Print the value of probes at a point in time as JSON
    At {
        /// Probe names
        #[arg(required = true)]
        probes: Vec<String>,

        /// Unix seconds
        #[arg(long)]
        time: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = Overrides {
        base_url: args.base_url,
        fixture: args.fixture,
        separator: args.separator,
        listen: args.listen,
        request_timeout: args.request_timeout,
        log: args.log,
    };
    let settings = Settings::load(args.config.as_deref(), &overrides)?;
    logging::init(&settings.log);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(&settings).await,
        Command::Aggregate {
            probes,
            start,
            end,
            interval,
            mode,
        } => {
            let interval = interval
                .map(|i| parse_duration(&i).map(|d| d.as_secs() as i64))
                .transpose()?;
            let manager = ProbeManager::new(settings.transport().await?);
            let series = manager.aggregated(&probes, start, end, interval, mode).await?;
            println!("{}", serde_json::to_string_pretty(&series)?);
            Ok(())
        }
        Command::At { probes, time } => {
            let manager = ProbeManager::new(settings.transport().await?);
            let window = MAX_CURSOR_DISTANCE as f64;
            manager.get(&probes, time - window, time + window).await?;
            let values = manager.at_time(&probes, time.floor() as i64);
            println!("{}", serde_json::to_string_pretty(&values)?);
            Ok(())
        }
    }
}

/// Run the protocol server on TCP or stdio, per the settings.
async fn run_server(settings: &Settings) -> Result<()> {
    let sessions = Sessions::from_settings(settings).await?;

    match &settings.listen {
        Some(addr) => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to listen on {addr}"))?;
            listen(listener, sessions).await
        }
        None => serve_stdio(&sessions).await,
    }
}
