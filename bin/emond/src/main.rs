//! ---
//! emon_section: "04-daemon"
//! emon_subsection: "binary"
//! emon_type: "source"
//! emon_scope: "code"
//! emon_description: "Binary entrypoint for the EMON daemon."
//! emon_version: "v0.0.0-prealpha"
//! emon_owner: "tbd"
//! ---
mod feed;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use emon_common::{init_tracing, MonitorConfig};
use emon_core::Monitor;
use emon_msg::{InMemoryTransport, Transport};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(author, version, about = "EMON premises energy monitor daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the monitor")]
    Run {
        #[arg(long, help = "Drive the monitor with synthetic telemetry")]
        simulate: bool,
    },
    #[command(about = "Load, validate, and print the effective configuration")]
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/emon.toml"));
    candidates.push(PathBuf::from("configs/emon.dev.toml"));

    let loaded = MonitorConfig::load_with_source(&candidates)?;
    let config = loaded.config;

    match cli.command.unwrap_or(Commands::Run { simulate: false }) {
        Commands::Run { simulate } => {
            init_tracing("emond", &config.logging)?;
            info!(config_path = %loaded.source.display(), "configuration loaded");
            run_daemon(config, simulate).await?
        }
        Commands::CheckConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn run_daemon(config: MonitorConfig, simulate: bool) -> Result<()> {
    let transport = Arc::new(InMemoryTransport::new());
    let monitor = Monitor::new(config)?;
    let handle = monitor.start(transport.clone());

    // local stop signal for the helper tasks around the monitor
    let (stop_tx, _) = broadcast::channel(4);

    let feed_task = if simulate {
        info!("synthetic telemetry feed enabled");
        Some(tokio::spawn(feed::run(
            handle.ingress(),
            stop_tx.subscribe(),
        )))
    } else {
        None
    };

    // Stand-in for the broker bridge: drain outbound control commands so
    // operators can see what would be published.
    let pump_transport = transport.clone();
    let mut pump_stop = stop_tx.subscribe();
    let pump_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(250));
        loop {
            tokio::select! {
                _ = pump_stop.recv() => break,
                _ = ticker.tick() => {
                    while let Some(message) = pump_transport.recv() {
                        debug!(route = %message.route, payload = %message.payload, "outbound command ready for broker");
                    }
                }
            }
        }
    });

    info!("daemon running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");

    let _ = stop_tx.send(());
    if let Some(task) = feed_task {
        task.await?;
    }
    pump_task.await?;

    let sink = handle.alerts();
    handle.shutdown().await?;
    info!(findings = sink.len(), "monitor stopped");

    Ok(())
}
