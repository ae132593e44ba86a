//! REST API handlers.
//!
//! Each handler calls straight into the `Scheduler` and returns JSON, except
//! `stream_results`, which holds a subscription open as server-sent events.

use std::convert::Infallible;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use plum_scheduler::{CheckEvent, SchedulerError, SchedulerResult};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn respond<T: serde::Serialize>(result: SchedulerResult<T>) -> axum::response::Response {
    match result {
        Ok(data) => ApiResponse::ok(data).into_response(),
        Err(e @ SchedulerError::CheckNotFound(_)) => {
            error_response(&e.to_string(), StatusCode::NOT_FOUND).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Checks ─────────────────────────────────────────────────────

/// GET /api/v1/checks
pub async fn list_checks(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.scheduler.checks())
}

/// GET /api/v1/checks/{name}
pub async fn get_check(State(state): State<ApiState>, Path(name): Path<String>) -> impl IntoResponse {
    respond(state.scheduler.check(&name))
}

/// POST /api/v1/checks/{name}/suspend
pub async fn suspend_check(State(state): State<ApiState>, Path(name): Path<String>) -> impl IntoResponse {
    respond(state.scheduler.suspend(&name))
}

/// POST /api/v1/checks/{name}/resume
pub async fn resume_check(State(state): State<ApiState>, Path(name): Path<String>) -> impl IntoResponse {
    respond(state.scheduler.unsuspend(&name))
}

// ── Results ────────────────────────────────────────────────────

enum Feed {
    Result(CheckEvent),
    Shutdown,
}

/// GET /api/v1/results
///
/// One `result` event per check execution until the client disconnects or
/// the server shuts down.
pub async fn stream_results(
    State(state): State<ApiState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.scheduler.subscribe();
    debug!(listener = ?subscription.id(), "results stream opened");

    let results = subscription.map(Feed::Result);
    let stop = WatchStream::new(state.shutdown.clone())
        .filter(|stopping| *stopping)
        .map(|_| Feed::Shutdown);

    let stream = results
        .merge(stop)
        .take_while(|feed| matches!(feed, Feed::Result(_)))
        .filter_map(|feed| match feed {
            Feed::Result(event) => match Event::default().event("result").json_data(&event) {
                Ok(sse) => Some(Ok(sse)),
                Err(e) => {
                    warn!(check = %event.check.name, error = %e, "failed to encode result");
                    None
                }
            },
            Feed::Shutdown => None,
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
