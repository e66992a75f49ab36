//! In-process scenario tests for dkm-relay HTTP endpoints.
//!
//! These tests spin up the Axum router **without** binding a TCP socket.
//! Each test calls `routes::build_router` and drives it via
//! `tower::ServiceExt::oneshot`. Socket sessions are attached straight to
//! the shared relay so REST → socket propagation can be observed without
//! any network I/O.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use dkm_relay::{routes, state};
use http_body_util::BodyExt;
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_state() -> Arc<state::AppState> {
    Arc::new(state::AppState::new())
}

/// Drive the router with a single request and return (status, body_bytes).
async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

fn json_req(method: &str, uri: &str, body: serde_json::Value) -> Request<axum::body::Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

async fn post_order(st: &Arc<state::AppState>, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let (status, bytes) = call(
        routes::build_router(Arc::clone(st)),
        json_req("POST", "/api/orders", body),
    )
    .await;
    (status, parse_json(bytes))
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_clients_and_orders() {
    let st = make_state();
    let (status, body) = call(routes::build_router(Arc::clone(&st)), get("/health")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["connectedClients"], 0);
    assert_eq!(json["totalOrders"], 0);
    assert_eq!(json["service"], "dkm-relay");

    let (_conn, _rx) = st.relay.connect().await;
    post_order(&st, serde_json::json!({"orderId": "ORD-1"})).await;

    let (_, body) = call(routes::build_router(Arc::clone(&st)), get("/health")).await;
    let json = parse_json(body);
    assert_eq!(json["connectedClients"], 1);
    assert_eq!(json["totalOrders"], 1);
}

// ---------------------------------------------------------------------------
// POST /api/orders + GET /api/orders
// ---------------------------------------------------------------------------

#[tokio::test]
async fn post_order_returns_success_and_order_id() {
    let st = make_state();
    let (status, json) = post_order(
        &st,
        serde_json::json!({
            "orderId": "ORD-1000",
            "total": 25.50,
            "status": "pending",
            "customer": { "name": "Ama" }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!({ "success": true, "orderId": "ORD-1000" }));
}

#[tokio::test]
async fn get_orders_lists_newest_first_with_assigned_fields() {
    let st = make_state();
    post_order(&st, serde_json::json!({"orderId": "ORD-1"})).await;
    post_order(&st, serde_json::json!({"orderId": "ORD-2"})).await;

    let (status, body) = call(routes::build_router(Arc::clone(&st)), get("/api/orders")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    let orders = json.as_array().expect("array body");
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["orderId"], "ORD-2");
    assert_eq!(orders[1]["orderId"], "ORD-1");
    assert!(orders[0]["id"].is_string());
    assert!(orders[0]["timestamp"].is_string());
}

#[tokio::test]
async fn post_order_without_order_id_is_400() {
    let st = make_state();
    let (status, json) = post_order(&st, serde_json::json!({"total": 4})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
    assert_eq!(st.relay.stats().await.total_orders, 0);
}

#[tokio::test]
async fn post_duplicate_order_id_is_409() {
    let st = make_state();
    post_order(&st, serde_json::json!({"orderId": "ORD-1"})).await;
    let (status, json) = post_order(&st, serde_json::json!({"orderId": "ORD-1"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "order ORD-1 already exists");
}

#[tokio::test]
async fn post_non_object_or_garbage_body_is_400() {
    let st = make_state();
    let (status, _) = post_order(&st, serde_json::json!([1, 2, 3])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .method("POST")
        .uri("/api/orders")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let (status, body) = call(routes::build_router(Arc::clone(&st)), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(parse_json(body)["error"].is_string());
}

// ---------------------------------------------------------------------------
// PUT /api/orders/:orderId/status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn put_status_on_known_order_succeeds() {
    let st = make_state();
    post_order(&st, serde_json::json!({"orderId": "ORD-1", "status": "pending"})).await;

    let (status, body) = call(
        routes::build_router(Arc::clone(&st)),
        json_req(
            "PUT",
            "/api/orders/ORD-1/status",
            serde_json::json!({"status": "shipped"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body), serde_json::json!({ "success": true }));

    let orders = st.relay.snapshot().await;
    assert_eq!(orders[0].status.as_ref().map(|s| s.as_str()), Some("shipped"));
    assert!(orders[0].updated_at.is_some());
}

#[tokio::test]
async fn put_status_on_unknown_order_is_404() {
    let st = make_state();
    let (status, body) = call(
        routes::build_router(Arc::clone(&st)),
        json_req(
            "PUT",
            "/api/orders/ORD-9999/status",
            serde_json::json!({"status": "shipped"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(parse_json(body), serde_json::json!({ "error": "Order not found" }));
}

#[tokio::test]
async fn put_status_without_status_field_is_400() {
    let st = make_state();
    post_order(&st, serde_json::json!({"orderId": "ORD-1"})).await;
    let (status, _) = call(
        routes::build_router(Arc::clone(&st)),
        json_req("PUT", "/api/orders/ORD-1/status", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// REST ↔ socket consistency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rest_mutations_are_broadcast_to_socket_sessions() {
    let st = make_state();
    let (_conn, mut rx) = st.relay.connect().await;
    let _ = rx.try_recv().expect("connect snapshot");

    post_order(&st, serde_json::json!({"orderId": "ORD-5", "status": "pending"})).await;
    let frame: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
    assert_eq!(frame["type"], "orders_update");
    assert_eq!(frame["orders"][0]["orderId"], "ORD-5");

    call(
        routes::build_router(Arc::clone(&st)),
        json_req(
            "PUT",
            "/api/orders/ORD-5/status",
            serde_json::json!({"status": "delivered"}),
        ),
    )
    .await;
    let frame: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
    assert_eq!(frame["orders"][0]["status"], "delivered");
}

#[tokio::test]
async fn socket_created_order_is_visible_over_rest() {
    let st = make_state();
    let (conn, _rx) = st.relay.connect().await;
    st.relay
        .handle_text(
            &conn,
            r#"{"type":"new_order","order":{"orderId":"ORD-WS","total":12}}"#,
        )
        .await;

    let (_, body) = call(routes::build_router(Arc::clone(&st)), get("/api/orders")).await;
    let json = parse_json(body);
    assert_eq!(json[0]["orderId"], "ORD-WS");
    assert_eq!(json[0]["total"], 12);
}

// ---------------------------------------------------------------------------
// GET /api/orders/stream  (SSE)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sse_stream_opens_with_snapshot_event() {
    let st = make_state();
    post_order(&st, serde_json::json!({"orderId": "ORD-1"})).await;

    let resp = routes::build_router(Arc::clone(&st))
        .oneshot(get("/api/orders/stream"))
        .await
        .expect("oneshot failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let ct = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(ct.starts_with("text/event-stream"), "content-type was {ct}");

    let mut body = resp.into_body();
    let frame = body
        .frame()
        .await
        .expect("stream ended early")
        .expect("frame error");
    let data = frame.into_data().expect("data frame");
    let text = String::from_utf8(data.to_vec()).unwrap();
    assert!(text.contains("event: orders_update"), "got {text}");
    assert!(text.contains("ORD-1"), "got {text}");

    assert_eq!(st.relay.stats().await.connected_clients, 1);
}

#[tokio::test]
async fn dropping_sse_body_deregisters_the_session() {
    let st = make_state();

    for _ in 0..3 {
        let resp = routes::build_router(Arc::clone(&st))
            .oneshot(get("/api/orders/stream"))
            .await
            .expect("oneshot failed");
        let mut body = resp.into_body();
        body.frame()
            .await
            .expect("stream ended early")
            .expect("frame error");
        drop(body);
    }

    let drained = tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while st.relay.registered_sessions().await > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(drained.is_ok(), "sse sessions were not released");
    assert_eq!(st.relay.stats().await.connected_clients, 0);
}

// ---------------------------------------------------------------------------
// Static fallback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn static_dir_serves_unmatched_paths() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("admin.html"), "<h1>admin</h1>").unwrap();

    let router = routes::with_static_dir(routes::build_router(make_state()), dir.path());
    let (status, body) = call(router, get("/admin.html")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"<h1>admin</h1>");

    let router = routes::with_static_dir(routes::build_router(make_state()), dir.path());
    let (status, body) = call(router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["status"], "healthy");
}
