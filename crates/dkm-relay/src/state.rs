//! Shared runtime state for dkm-relay.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The order log and the
//! connection set live inside [`Relay`]; this module only wires it up.

use std::sync::Arc;

use dkm_orders::Relay;
use serde::{Deserialize, Serialize};

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The single relay instance for this process.
    pub relay: Arc<Relay>,
    pub build: BuildInfo,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::with_relay(Arc::new(Relay::new()))
    }

    pub fn with_relay(relay: Arc<Relay>) -> Self {
        Self {
            relay,
            build: BuildInfo {
                service: "dkm-relay",
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}

/// Seconds since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}
