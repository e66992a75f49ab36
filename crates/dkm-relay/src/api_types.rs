//! Request and response types for the dkm-relay REST endpoints.
//!
//! Field names are camelCase on the wire to match what the storefront and
//! admin dashboard already read. No business logic lives here.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always "healthy" while the process is serving.
    pub status: String,
    pub connected_clients: usize,
    pub total_orders: usize,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
}

// ---------------------------------------------------------------------------
// POST /api/orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub success: bool,
    /// Echo of the caller's business order id.
    pub order_id: String,
}

// ---------------------------------------------------------------------------
// PUT /api/orders/:orderId/status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// ---------------------------------------------------------------------------
// Errors (400 / 404 / 409)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
