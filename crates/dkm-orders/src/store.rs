//! Order log storage.
//!
//! [`OrderStore`] is the narrow interface the relay mutates through. The only
//! implementation today is [`MemoryOrderLog`]: orders live for the lifetime
//! of the process and are gone on restart. A durable store only has to
//! implement the same four methods.
//!
//! # Ordering
//! Snapshots are newest-first by insertion. Every ingest goes to the head,
//! so the snapshot is the exact reverse of ingestion order regardless of any
//! timestamp the caller put in the payload.
//!
//! # Uniqueness
//! `ingest` refuses a payload without a usable `orderId` and refuses an
//! `orderId` already present in the log. `update_status` scans newest-first
//! and touches only the first match.

use std::collections::VecDeque;
use std::fmt;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::order::{Order, OrderStatus};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Reasons an order payload is refused at ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// `orderId` is absent, not a string, or blank.
    MissingOrderId,
    /// An order with this `orderId` is already in the log.
    DuplicateOrderId(String),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::MissingOrderId => write!(f, "order payload is missing orderId"),
            IngestError::DuplicateOrderId(id) => write!(f, "order {id} already exists"),
        }
    }
}

impl std::error::Error for IngestError {}

// ---------------------------------------------------------------------------
// OrderStore trait
// ---------------------------------------------------------------------------

/// Storage seam for the relay's order log.
pub trait OrderStore: Send + Sync {
    /// Assign `id` and `timestamp`, insert at the head, return the stored record.
    fn ingest(&mut self, payload: Map<String, Value>) -> Result<Order, IngestError>;

    /// Set `status` and `updatedAt` on the first order whose `orderId`
    /// matches. Returns `false` (and changes nothing) when no order matches.
    fn update_status(&mut self, order_id: &str, status: OrderStatus) -> bool;

    /// Full log, newest first.
    fn snapshot(&self) -> Vec<Order>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Id clock
// ---------------------------------------------------------------------------

/// Millisecond-timestamp ids that never repeat within a process.
///
/// Two ingests inside the same millisecond (or a wall clock stepping
/// backwards) get `last + 1` instead of a colliding value.
#[derive(Debug, Default)]
struct IdClock {
    last_millis: i64,
}

impl IdClock {
    fn next(&mut self, now_millis: i64) -> i64 {
        let next = now_millis.max(self.last_millis + 1);
        self.last_millis = next;
        next
    }
}

// ---------------------------------------------------------------------------
// MemoryOrderLog
// ---------------------------------------------------------------------------

/// Process-memory order log, newest at the front.
#[derive(Debug, Default)]
pub struct MemoryOrderLog {
    orders: VecDeque<Order>,
    ids: IdClock,
}

impl MemoryOrderLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn contains_order_id(&self, order_id: &str) -> bool {
        self.orders.iter().any(|o| o.order_id == order_id)
    }
}

impl OrderStore for MemoryOrderLog {
    fn ingest(&mut self, payload: Map<String, Value>) -> Result<Order, IngestError> {
        let now = Utc::now();
        // Validate before consuming an id so rejected payloads leave no gap.
        let mut order = Order::assemble(payload, String::new(), now)?;
        if self.contains_order_id(&order.order_id) {
            return Err(IngestError::DuplicateOrderId(order.order_id));
        }

        order.id = self.ids.next(now.timestamp_millis()).to_string();
        self.orders.push_front(order.clone());
        Ok(order)
    }

    fn update_status(&mut self, order_id: &str, status: OrderStatus) -> bool {
        match self.orders.iter_mut().find(|o| o.order_id == order_id) {
            Some(order) => {
                order.set_status(status, Utc::now());
                true
            }
            None => false,
        }
    }

    fn snapshot(&self) -> Vec<Order> {
        self.orders.iter().cloned().collect()
    }

    fn len(&self) -> usize {
        self.orders.len()
    }
}
