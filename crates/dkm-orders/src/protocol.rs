//! Socket wire protocol.
//!
//! Every frame is a JSON object tagged by `type`.
//!
//! ```text
//! client → relay   new_order            { order: {...} }
//!                  update_order_status  { orderId, newStatus }
//!                  get_orders           {}
//! relay → client   orders_update        { orders: [...] }   newest first
//!                  error                { message, orderId? }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::order::{Order, OrderStatus};

/// Inbound socket messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    NewOrder {
        order: Map<String, Value>,
    },
    UpdateOrderStatus {
        #[serde(rename = "orderId")]
        order_id: String,
        #[serde(rename = "newStatus")]
        new_status: OrderStatus,
    },
    GetOrders,
}

impl ClientMsg {
    /// Wire names of every inbound kind. Only consulted to classify a frame
    /// that failed to decode; a test ties it to [`ClientMsg::kind`].
    pub const KINDS: &'static [&'static str] = &["new_order", "update_order_status", "get_orders"];

    /// Wire name of this message's `type`.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMsg::NewOrder { .. } => "new_order",
            ClientMsg::UpdateOrderStatus { .. } => "update_order_status",
            ClientMsg::GetOrders => "get_orders",
        }
    }
}

/// Outbound socket messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    OrdersUpdate {
        orders: Vec<Order>,
    },
    /// Sent to the originating connection only.
    Error {
        message: String,
        #[serde(rename = "orderId", default, skip_serializing_if = "Option::is_none")]
        order_id: Option<String>,
    },
}

impl ServerMsg {
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not JSON, not an object, no `type`, or fields of the wrong shape.
    Malformed(String),
    /// Well-formed envelope with a `type` this relay does not handle.
    UnknownType(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Malformed(msg) => write!(f, "malformed message: {msg}"),
            DecodeError::UnknownType(t) => write!(f, "unknown message type: {t}"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decode one inbound text frame.
///
/// The enum decides what is accepted; the failure is classified afterwards.
pub fn decode(text: &str) -> Result<ClientMsg, DecodeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let err = match ClientMsg::deserialize(&value) {
        Ok(msg) => return Ok(msg),
        Err(e) => e,
    };

    match value.get("type").and_then(Value::as_str) {
        Some(kind) if !ClientMsg::KINDS.contains(&kind) => {
            Err(DecodeError::UnknownType(kind.to_string()))
        }
        Some(_) => Err(DecodeError::Malformed(err.to_string())),
        None => Err(DecodeError::Malformed(
            "missing string field `type`".to_string(),
        )),
    }
}
