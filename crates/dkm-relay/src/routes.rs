//! Axum router and all HTTP handlers for dkm-relay.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers and the static-file fallback. Tests drive the bare
//! router in-process.
//!
//! Every mutating REST call goes through the same [`Relay`] methods as the
//! socket path, so socket sessions see REST changes immediately and vice
//! versa.
//!
//! [`Relay`]: dkm_orders::Relay

use std::{convert::Infallible, path::Path, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, Path as UrlPath, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, put},
    Json, Router,
};
use dkm_orders::{FrameReceiver, IngestError, OrderStatus, SessionGuard};
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::{
    api_types::{
        CreateOrderResponse, ErrorResponse, HealthResponse, SuccessResponse, UpdateStatusRequest,
    },
    state::{uptime_secs, AppState},
    ws,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws::upgrade))
        .route("/api/orders", get(list_orders).post(create_order))
        .route("/api/orders/stream", get(order_stream))
        .route("/api/orders/:order_id/status", put(update_order_status))
        .with_state(state)
}

/// Serve files from `dir` for any request no route matched.
pub fn with_static_dir(router: Router, dir: &Path) -> Router {
    router.fallback_service(ServeDir::new(dir))
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = st.relay.stats().await;
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            connected_clients: stats.connected_clients,
            total_orders: stats.total_orders,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            uptime_secs: uptime_secs(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /api/orders
// ---------------------------------------------------------------------------

pub(crate) async fn list_orders(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(st.relay.snapshot().await))
}

// ---------------------------------------------------------------------------
// POST /api/orders
// ---------------------------------------------------------------------------

/// Ingest an order and broadcast it to every socket session.
///
/// 400 when the body is not a JSON object or has no usable `orderId`;
/// 409 when the `orderId` is already in the log.
pub(crate) async fn create_order(
    State(st): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let payload = match body {
        Ok(Json(Value::Object(map))) => map,
        Ok(Json(_)) => {
            return error_response(StatusCode::BAD_REQUEST, "order payload must be a JSON object")
        }
        Err(rejection) => {
            warn!(error = %rejection, "POST /api/orders rejected body");
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    match st.relay.create_order(payload).await {
        Ok(order) => {
            info!(order_id = %order.order_id, "api/orders create");
            (
                StatusCode::OK,
                Json(CreateOrderResponse {
                    success: true,
                    order_id: order.order_id,
                }),
            )
                .into_response()
        }
        Err(e @ IngestError::MissingOrderId) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e @ IngestError::DuplicateOrderId(_)) => {
            error_response(StatusCode::CONFLICT, e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// PUT /api/orders/:order_id/status
// ---------------------------------------------------------------------------

pub(crate) async fn update_order_status(
    State(st): State<Arc<AppState>>,
    UrlPath(order_id): UrlPath<String>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            warn!(order_id = %order_id, error = %rejection, "status update rejected body");
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    if st
        .relay
        .update_status(&order_id, OrderStatus::from(req.status))
        .await
    {
        (StatusCode::OK, Json(SuccessResponse { success: true })).into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, "Order not found")
    }
}

// ---------------------------------------------------------------------------
// GET /api/orders/stream  (SSE)
// ---------------------------------------------------------------------------

/// Server-sent `orders_update` events for clients that cannot hold a socket.
///
/// The stream is registered as a regular relay session: it gets the current
/// snapshot first, then every broadcast, and ends when the relay shuts down.
/// Dropping the response body (client gone) deregisters the session.
pub(crate) async fn order_stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let (conn, rx) = st.relay.connect().await;
    info!(conn = %conn, "sse stream opened");
    let guard = SessionGuard::new(Arc::clone(&st.relay), conn);
    let events = frames_to_sse(rx, guard);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn frames_to_sse(
    rx: FrameReceiver,
    guard: SessionGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    UnboundedReceiverStream::new(rx).map(move |frame| {
        // The guard lives as long as the stream does.
        let _conn = guard.conn();
        Ok(Event::default().event("orders_update").data(frame))
    })
}
