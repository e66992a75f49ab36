//! dkm-relay entry point.
//!
//! This file is intentionally thin: it sets up tracing, reads config, builds
//! the shared state, wires middleware, and runs the HTTP server until an
//! interrupt. All route handlers live in `routes.rs` and `ws.rs`.

use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use dkm_orders::Relay;
use dkm_relay::{config::RelayConfig, routes, state};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience).
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cfg = RelayConfig::from_env().context("invalid relay configuration")?;

    let relay = Arc::new(Relay::new());
    let shared = Arc::new(state::AppState::with_relay(Arc::clone(&relay)));

    let mut app = routes::build_router(shared);
    if let Some(dir) = &cfg.static_dir {
        info!("serving static files from {}", dir.display());
        app = routes::with_static_dir(app, dir);
    }
    let app = app
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors(&cfg));

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;

    let addr = cfg.bind_addr;
    info!("dkm-relay listening on http://{}", addr);
    info!("health check: http://{}/health", addr);
    info!("websocket: ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(relay))
        .await
        .context("server crashed")?;

    info!("server closed");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn cors(cfg: &RelayConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(tower_http::cors::Any)
}

/// Resolves on Ctrl-C (or SIGTERM on unix) after closing every relay session.
async fn shutdown_signal(relay: Arc<Relay>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutting down server...");
    relay.shutdown().await;
}
