//! `pw-daemon`: the host shim and CLI entry point.
//!
//! Stands in for the embedding metrics-collection daemon: it wires a CLI
//! (`clap`) and an optional TOML config file, with CLI flags overriding the
//! file, to an in-memory demo [`DemoMetricSource`], then starts the HTTP
//! front-end and the periodic tick behind a graceful shutdown controller.
//! It carries no query semantics of its own — those live in `pw-core`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use pw_core::host::RawNames;
use pw_core::{Config, EngineState, FsDirLister, MetricSource};
use tracing::info;

mod shutdown;

use shutdown::ShutdownController;

#[derive(Parser)]
#[command(name = "pw-daemon", about = "Perfwatcher JSON-RPC query engine")]
struct Cli {
    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTTP listen port. Overrides the config file; required if the file
    /// doesn't set one.
    #[arg(long)]
    port: Option<u16>,

    /// Maximum number of concurrently admitted HTTP clients.
    #[arg(long)]
    max_clients: Option<u16>,

    /// Snapshot cache expiration, in seconds.
    #[arg(long)]
    expiration_secs: Option<u64>,

    /// Root of the `<host>/<plugin>/<type>` data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Seed the demo metric source with `host/plugin/type=unix_time` entries,
    /// comma-separated (e.g. `a/cpu/idle=1000,b/cpu/idle=1000`). Manual
    /// smoke-testing only: a real deployment's metric cache comes from the
    /// embedding daemon's plugin pipeline, out of scope for this crate.
    #[arg(long, value_delimiter = ',')]
    seed: Vec<String>,
}

/// An in-memory stand-in for the host's live metric name index.
///
/// Production metric collection is out of scope for this crate; this
/// exists only so the binary has something to serve end-to-end and for
/// manual smoke-testing via `--seed`.
struct DemoMetricSource {
    entries: std::sync::Mutex<Vec<(String, i64)>>,
}

impl DemoMetricSource {
    fn new(seed: &[String]) -> anyhow::Result<Self> {
        let mut entries = Vec::with_capacity(seed.len());
        for item in seed {
            let (name, time) = item
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("malformed --seed entry: {item:?}"))?;
            let time: i64 = time
                .parse()
                .map_err(|_| anyhow::anyhow!("malformed --seed timestamp in {item:?}"))?;
            entries.push((name.to_string(), time));
        }
        Ok(Self {
            entries: std::sync::Mutex::new(entries),
        })
    }
}

impl MetricSource for DemoMetricSource {
    fn get_names(&self) -> Result<RawNames, pw_core::EngineError> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let (names, times) = entries.iter().cloned().unzip();
        Ok(RawNames { names, times })
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Config::from_toml_str(&text)?
        }
        None => Config {
            port: 0,
            max_clients: 16,
            jsonrpc_cache_expiration_time: 60,
            data_dir: PathBuf::from("."),
        },
    };

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(max_clients) = cli.max_clients {
        config.max_clients = max_clients;
    }
    if let Some(expiration) = cli.expiration_secs {
        config.jsonrpc_cache_expiration_time = expiration;
    }
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pw_utils::init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let source = Arc::new(DemoMetricSource::new(&cli.seed)?);

    let state = Arc::new(EngineState::new(
        source,
        Arc::new(FsDirLister),
        config.data_dir.clone(),
        config.jsonrpc_cache_expiration_time,
        config.max_clients,
    ));

    let shutdown = ShutdownController::new();

    let tick_handle = pw_core::tick::spawn(
        Arc::clone(&state),
        Duration::from_secs(config.jsonrpc_cache_expiration_time.clamp(1, 60)),
        shutdown.subscribe(),
    );

    let app = pw_core::http::router(Arc::clone(&state));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, "perfwatcher query engine listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = shutdown.wait_for_signal() => {
            info!("shutdown signal received, stopping HTTP listener");
        }
    }

    shutdown.shutdown();
    let _ = tick_handle.await;
    Ok(())
}
