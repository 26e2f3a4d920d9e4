//! amsig daemon - Alertmanager webhook to signald bridge
//!
//! Accepts Alertmanager webhook POSTs on `/alert` and delivers them as
//! Signal messages through a local signald daemon.
//!
//! # Usage
//!
//! ```bash
//! amsigd --config /etc/amsig/amsig.yaml
//!
//! # Override the signald socket
//! AMSIG_SOCKET=/run/signald/signald.sock amsigd --config amsig.yaml --listen 127.0.0.1:9245
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use amsigd::config;
use amsigd::http::build_router;
use amsigd::AppContext;

/// Bridge Prometheus Alertmanager to Signal via signald
#[derive(Parser, Debug)]
#[command(name = "amsigd", version, about)]
struct Args {
    /// Address to accept webhooks on
    #[arg(long, default_value = "0.0.0.0:9245")]
    listen: SocketAddr,

    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// signald socket path, overrides the configuration
    #[arg(long, env = "AMSIG_SOCKET")]
    socket: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("amsigd=info".parse()?)
                .add_directive("amsig_core=info".parse()?)
                .add_directive("amsig_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "amsig daemon starting"
    );

    let mut cfg = config::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    if let Some(socket) = args.socket {
        cfg.socket_path = socket;
    }
    info!(
        socket = %cfg.socket_path.display(),
        receivers = cfg.receivers.len(),
        commands = cfg.commands_enabled,
        keepalive = cfg.keepalive_enabled,
        "Configuration loaded"
    );

    let ctx = AppContext::new(cfg).context("Failed to build application context")?;
    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    ctx.connect().await;
    let tasks = ctx.spawn_background(&cancel_token);

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    info!(listen = %args.listen, "Listening for webhooks");

    let server_token = cancel_token.clone();
    let served = axum::serve(listener, build_router(ctx.clone()))
        .with_graceful_shutdown(async move { server_token.cancelled().await })
        .await;

    // The server can also stop on its own error
    cancel_token.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "Background task failed");
        }
    }
    ctx.connection().disconnect().await;

    served.context("HTTP server failed")?;
    info!("amsig daemon stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
