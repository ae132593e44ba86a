//! plum-api — HTTP remote control for a running scheduler.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/checks` | List all checks |
//! | GET | `/api/v1/checks/{name}` | Get one check |
//! | POST | `/api/v1/checks/{name}/suspend` | Suspend a check |
//! | POST | `/api/v1/checks/{name}/resume` | Unsuspend a check |
//! | GET | `/api/v1/results` | Live results as server-sent events |

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use plum_scheduler::Scheduler;
use tokio::sync::watch;
use tracing::info;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Arc<Scheduler>,
    /// Flips to true on shutdown; open result streams end when it does.
    pub shutdown: watch::Receiver<bool>,
}

/// Build the API router.
pub fn build_router(scheduler: Arc<Scheduler>, shutdown: watch::Receiver<bool>) -> Router {
    let api_routes = Router::new()
        .route("/checks", get(handlers::list_checks))
        .route("/checks/{name}", get(handlers::get_check))
        .route("/checks/{name}/suspend", post(handlers::suspend_check))
        .route("/checks/{name}/resume", post(handlers::resume_check))
        .route("/results", get(handlers::stream_results))
        .with_state(ApiState {
            scheduler,
            shutdown,
        });

    Router::new().nest("/api/v1", api_routes)
}

/// Serve the API on `addr` until `shutdown` flips to true.
pub async fn serve(
    addr: SocketAddr,
    scheduler: Arc<Scheduler>,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");

    let mut signal = shutdown.clone();
    axum::serve(listener, build_router(scheduler, shutdown))
        .with_graceful_shutdown(async move {
            // An error means the sender is gone, which also means shut down.
            let _ = signal.wait_for(|stopping| *stopping).await;
            info!("API server shutting down");
        })
        .await
}
