//! plumd — the Plum daemon.
//!
//! Single binary that assembles the health checker:
//! - Configuration (TOML) and the built-in `debug` plugin
//! - Scheduler + worker pool
//! - Alert router and group throttles
//! - Tombstone store (redb), restored at startup and saved on exit
//! - Optional REST API
//!
//! # Usage
//!
//! ```text
//! plumd --config /etc/plum.toml --tombstone /var/lib/plum/plum.tomb --api-addr 127.0.0.1:7979
//! ```

mod debug;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use plum_core::{ConfigDocument, PluginRegistry};
use plum_scheduler::{Scheduler, SchedulerConfig};
use plum_state::TombStoneStore;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "plumd", about = "Plum health check daemon")]
struct Cli {
    /// Configuration file.
    #[arg(long, env = "PLUM_CONFIG", default_value = "plum.toml")]
    config: PathBuf,

    /// File check state is saved to on exit and restored from on start.
    #[arg(long, env = "PLUM_TOMBSTONE", default_value = "/tmp/plum.tomb")]
    tombstone: PathBuf,

    /// Worker tasks executing checks.
    #[arg(long, env = "PLUM_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Don't log every check result.
    #[arg(long, env = "PLUM_QUIET")]
    quiet: bool,

    /// Address to serve the REST API on. Disabled when unset.
    #[arg(long, env = "PLUM_API_ADDR")]
    api_addr: Option<SocketAddr>,

    /// Emit logs as JSON.
    #[arg(long, env = "PLUM_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,plumd=debug,plum_scheduler=debug,plum_alert=debug".parse().unwrap());
    if cli.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    run(cli).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!(config = ?cli.config, "Plum starting");

    // ── Load configuration ─────────────────────────────────────

    let doc = ConfigDocument::from_file(&cli.config)?;
    let plugins = PluginRegistry::new().with("debug", Arc::new(debug::DebugPlugin));
    let scheduler = Arc::new(Scheduler::from_config(
        &doc,
        &plugins,
        SchedulerConfig {
            workers: cli.workers,
            quiet: cli.quiet,
            ..SchedulerConfig::default()
        },
    )?);
    info!(checks = scheduler.checks().len(), "configuration loaded");

    // ── Restore state ──────────────────────────────────────────

    let store = match TombStoneStore::open_or_reset(&cli.tombstone) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(path = ?cli.tombstone, error = %e, "tombstone store unavailable, state will not persist");
            None
        }
    };
    if let Some(store) = &store {
        match scheduler.restore_tombstone(store) {
            Ok(restored) => info!(restored, "check state loaded"),
            Err(e) => warn!(error = %e, "starting with fresh check state"),
        }
    }

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let scheduler_handle = tokio::spawn(Arc::clone(&scheduler).run(shutdown_rx.clone()));

    let api_handle = cli.api_addr.map(|addr| {
        let scheduler = Arc::clone(&scheduler);
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = plum_api::serve(addr, scheduler, shutdown).await {
                error!(%addr, error = %e, "API server failed");
            }
        })
    });

    wait_for_signal().await;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    // Wait for in-flight checks before capturing state.
    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "scheduler task failed");
    }
    if let Some(handle) = api_handle {
        let _ = handle.await;
    }

    if let Some(store) = &store {
        match scheduler.save_tombstone(store) {
            Ok(()) => info!(path = ?cli.tombstone, "check state saved"),
            Err(e) => error!(error = %e, "failed to save check state"),
        }
    }

    info!("Plum stopped");
    Ok(())
}

/// Resolve on Ctrl-C or, on unix, SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
