//! # netmon
//!
//! Server binary: loads settings, starts the measurement pipeline and the
//! periodic trigger, and serves the WebSocket endpoint and web UI until
//! Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use netmon_logging::LoggingConfig;
use netmon_runner::SpeedtestCli;
use netmon_server::{NetmonServer, ServerConfig};
use netmon_settings::NetmonSettings;
use tracing::info;

/// Network performance monitor.
#[derive(Parser, Debug)]
#[command(name = "netmon", version, about = "Network performance monitor")]
struct Cli {
    /// Server ID for the measurement tool. Omit to let the tool pick the
    /// best server.
    #[arg(long)]
    server: Option<u32>,

    /// Minutes between periodic measurements.
    #[arg(long)]
    period: Option<u64>,

    /// Listen address, `host:port` or `:port`.
    #[arg(long)]
    addr: Option<String>,

    /// Directory served as the web UI.
    #[arg(long)]
    www: Option<PathBuf>,

    /// Settings file (defaults to `~/.netmon/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Flags override everything loaded from file and environment.
    fn apply(&self, settings: &mut NetmonSettings) -> Result<()> {
        if let Some(id) = self.server {
            settings.measurement.server_id = Some(id);
        }
        if let Some(period) = self.period {
            settings.measurement.period_minutes = period;
        }
        if let Some(addr) = &self.addr {
            let (host, port) = parse_addr(addr)?;
            if let Some(host) = host {
                settings.server.host = host;
            }
            settings.server.port = port;
        }
        if let Some(www) = &self.www {
            settings.server.static_dir = Some(www.to_string_lossy().into_owned());
        }
        Ok(())
    }
}

/// Split `host:port` (or `:port`) into its parts.
fn parse_addr(addr: &str) -> Result<(Option<String>, u16)> {
    let Some((host, port)) = addr.rsplit_once(':') else {
        bail!("invalid listen address {addr:?}, expected host:port");
    };
    let port = port
        .parse::<u16>()
        .with_context(|| format!("invalid port in listen address {addr:?}"))?;
    Ok(((!host.is_empty()).then(|| host.to_string()), port))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli
        .config
        .clone()
        .unwrap_or_else(netmon_settings::loader::settings_path);
    let mut settings = netmon_settings::loader::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    cli.apply(&mut settings)?;
    settings.validate().context("Invalid configuration")?;

    let _ = netmon_logging::init_logging(&LoggingConfig {
        level: settings.logging.level.clone(),
        json: settings.logging.json,
    });
    info!(version = env!("CARGO_PKG_VERSION"), "netmon starting");

    let metrics = netmon_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let runner = Arc::new(SpeedtestCli::new(settings.measurement.command.clone()));
    info!(
        program = runner.program(),
        server_id = ?settings.measurement.server_id,
        period_minutes = settings.measurement.period_minutes,
        "measurement configured"
    );

    let server =
        NetmonServer::new(ServerConfig::from_settings(&settings), runner).with_metrics(metrics);
    let mut handles = server.spawn_workers();
    let (addr, server_handle) = server.listen().await.context("Failed to start server")?;
    handles.push(server_handle);
    info!(%addr, "ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("shutting down");
    let report = server.shutdown().graceful_shutdown(handles, None).await;
    info!(finished = report.finished, abandoned = report.abandoned, "netmon stopped");
    Ok(())
}
