//! The order record carried by the relay.
//!
//! Only `orderId`, `id`, `timestamp`, `status` and `updatedAt` mean anything
//! to the relay. Every other field the checkout UI sends (customer, items,
//! total, location, ...) rides along in [`Order::payload`] and is emitted back
//! verbatim at the top level of the JSON object.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::IngestError;

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Order status as stored by the relay.
///
/// The four canonical values are what the admin dashboard expects
/// (pending → confirmed → shipped → delivered), but the relay itself is
/// transition-agnostic: any string is accepted and kept in [`Other`].
///
/// [`Other`]: OrderStatus::Other
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Other(s) => s,
        }
    }

    /// True for the four values the dashboard knows how to style.
    pub fn is_known(&self) -> bool {
        !matches!(self, OrderStatus::Other(_))
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => OrderStatus::Pending,
            "confirmed" => OrderStatus::Confirmed,
            "shipped" => OrderStatus::Shipped,
            "delivered" => OrderStatus::Delivered,
            _ => OrderStatus::Other(s),
        }
    }
}

impl From<&str> for OrderStatus {
    fn from(s: &str) -> Self {
        OrderStatus::from(s.to_string())
    }
}

impl From<OrderStatus> for String {
    fn from(s: OrderStatus) -> Self {
        match s {
            OrderStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// A stored order: the caller's payload plus relay-assigned fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Caller-supplied business identifier; the key for status updates.
    #[serde(rename = "orderId")]
    pub order_id: String,
    /// Relay-assigned identifier, unique for the lifetime of the process.
    pub id: String,
    /// Ingestion instant. Never changes after ingest.
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    /// Instant of the last status update; absent until the first one.
    #[serde(
        rename = "updatedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
    /// Opaque fields, carried verbatim.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Order {
    /// Build a stored record from a raw payload and the relay-assigned fields.
    ///
    /// Caller-supplied `id`, `timestamp` and `updatedAt` keys are discarded in
    /// favour of the relay's own. A non-string `status` (including `null`) is
    /// left in the payload untouched until the first [`Order::set_status`].
    pub fn assemble(
        mut payload: Map<String, Value>,
        id: String,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, IngestError> {
        let order_id = match payload.remove("orderId") {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            _ => return Err(IngestError::MissingOrderId),
        };

        payload.remove("id");
        payload.remove("timestamp");
        payload.remove("updatedAt");

        let status = match payload.remove("status") {
            Some(Value::String(s)) => Some(OrderStatus::from(s)),
            None => None,
            Some(other) => {
                payload.insert("status".to_string(), other);
                None
            }
        };

        Ok(Self {
            order_id,
            id,
            timestamp,
            status,
            updated_at: None,
            payload,
        })
    }

    /// Replace the status and stamp `updatedAt`.
    ///
    /// Drops any raw `status` still sitting in the payload so the record
    /// serializes with exactly one `status` key.
    pub fn set_status(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        self.payload.remove("status");
        self.status = Some(status);
        self.updated_at = Some(at);
    }
}
