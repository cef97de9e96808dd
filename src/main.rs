use anyhow::{Context, Result};
use clap::Parser;
use recd::supervisor::SoxSpawner;
use recd::{Config, Server, Supervisor};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Local recording daemon: supervises a single sox capture subprocess,
/// controlled over a Unix domain socket.
#[derive(Debug, Parser)]
#[command(name = "recd", version)]
struct Args {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the control socket path
    #[arg(long)]
    socket: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut cfg = Config::load(args.config.as_deref())?;
    if let Some(socket) = args.socket {
        cfg.socket.path = socket;
    }

    info!(
        socket = %cfg.socket.path.display(),
        binary = %cfg.capture.binary,
        "recd starting"
    );

    let spawner = SoxSpawner::new(cfg.capture.clone());
    spawner
        .check_available()
        .await
        .context("capture tool check failed")?;

    let supervisor = Arc::new(Supervisor::new(
        Arc::new(spawner),
        cfg.capture.stop_timeout(),
    ));
    let server = Server::new(cfg.socket.path.clone(), supervisor);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.run(shutdown_rx).await
}

/// Resolves on SIGINT or SIGTERM.
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(err) => {
            warn!(error = %err, "SIGTERM handler unavailable, falling back to ctrl-c");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}
