//! The relay service object.
//!
//! One [`Relay`] is built at startup and shared (via `Arc`) by every
//! transport task. It owns the order store and the connection set behind a
//! single async mutex: a mutation and the broadcast it triggers complete
//! before the next inbound event is looked at, so every connected client sees
//! snapshots in the same global order.
//!
//! Nothing in here returns an error that should take the process down.
//! Socket-path failures become a log line, and for well-formed requests that
//! could not be applied, an `error` frame to the sender only.
//!
//! After [`Relay::shutdown`] the relay stays closed: late `connect` calls get
//! a receiver that is already at end-of-stream and are never registered.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::connections::{ConnId, ConnectionSet, Delivery, FrameReceiver};
use crate::order::{Order, OrderStatus};
use crate::protocol::{decode, ClientMsg, DecodeError, ServerMsg};
use crate::store::{IngestError, MemoryOrderLog, OrderStore};

/// Counters surfaced by `GET /health`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelayStats {
    pub connected_clients: usize,
    pub total_orders: usize,
}

struct Inner {
    store: Box<dyn OrderStore>,
    conns: ConnectionSet,
    closed: bool,
}

impl Inner {
    fn snapshot_frame(&self) -> Option<String> {
        let msg = ServerMsg::OrdersUpdate {
            orders: self.store.snapshot(),
        };
        match msg.encode() {
            Ok(frame) => Some(frame),
            Err(e) => {
                error!(error = %e, "failed to encode orders snapshot");
                None
            }
        }
    }

    fn broadcast_snapshot(&mut self) -> Delivery {
        let Some(frame) = self.snapshot_frame() else {
            return Delivery::default();
        };
        let delivery = self.conns.broadcast(&frame);
        debug!(
            delivered = delivery.delivered,
            skipped = delivery.skipped,
            "orders_update broadcast"
        );
        delivery
    }

    fn reply_error(&self, conn: &ConnId, message: String, order_id: Option<String>) {
        let msg = ServerMsg::Error { message, order_id };
        match msg.encode() {
            Ok(frame) => {
                self.conns.send_to(conn, &frame);
            }
            Err(e) => error!(error = %e, "failed to encode error reply"),
        }
    }
}

/// Order relay: authoritative order log plus connected sessions.
pub struct Relay {
    inner: Mutex<Inner>,
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

impl Relay {
    /// Relay backed by process memory.
    pub fn new() -> Self {
        Self::with_store(MemoryOrderLog::new())
    }

    pub fn with_store(store: impl OrderStore + 'static) -> Self {
        Self {
            inner: Mutex::new(Inner {
                store: Box::new(store),
                conns: ConnectionSet::new(),
                closed: false,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Register a new session.
    ///
    /// The returned receiver already holds an `orders_update` frame with the
    /// current log, so a new dashboard is consistent without asking.
    ///
    /// Entries left behind by transports that vanished without a disconnect
    /// are pruned here, so the set stays bounded between broadcasts.
    pub async fn connect(&self) -> (ConnId, FrameReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnId::new();

        let mut inner = self.inner.lock().await;
        if inner.closed {
            debug!(conn = %id, "connect after shutdown; closing immediately");
            return (id, rx);
        }
        let pruned = inner.conns.prune_closed();
        if pruned > 0 {
            debug!(pruned, "pruned closed connections");
        }
        if let Some(frame) = inner.snapshot_frame() {
            let _ = tx.send(frame);
        }
        inner.conns.add(id, tx);
        info!(conn = %id, clients = inner.conns.len(), "client connected");

        (id, rx)
    }

    /// Remove a session. Safe to call more than once.
    pub async fn disconnect(&self, id: &ConnId) -> bool {
        let mut inner = self.inner.lock().await;
        let removed = inner.conns.remove(id);
        if removed {
            info!(conn = %id, clients = inner.conns.len(), "client disconnected");
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Socket dispatch
    // -----------------------------------------------------------------------

    /// Decode and apply one inbound text frame from `conn`.
    pub async fn handle_text(&self, conn: &ConnId, text: &str) {
        match decode(text) {
            Ok(msg) => self.dispatch(conn, msg).await,
            Err(DecodeError::UnknownType(kind)) => {
                debug!(conn = %conn, kind = %kind, "ignoring unknown message type");
            }
            Err(e @ DecodeError::Malformed(_)) => {
                warn!(conn = %conn, error = %e, "error processing message");
            }
        }
    }

    pub async fn dispatch(&self, conn: &ConnId, msg: ClientMsg) {
        match msg {
            ClientMsg::NewOrder { order } => {
                if let Err(e) = self.create_order(order).await {
                    let inner = self.inner.lock().await;
                    inner.reply_error(conn, e.to_string(), rejected_order_id(&e));
                }
            }
            ClientMsg::UpdateOrderStatus {
                order_id,
                new_status,
            } => {
                if !self.update_status(&order_id, new_status).await {
                    let inner = self.inner.lock().await;
                    inner.reply_error(conn, "Order not found".to_string(), Some(order_id));
                }
            }
            ClientMsg::GetOrders => {
                let inner = self.inner.lock().await;
                if let Some(frame) = inner.snapshot_frame() {
                    inner.conns.send_to(conn, &frame);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Mutations (socket and REST)
    // -----------------------------------------------------------------------

    /// Ingest an order and push the new log to every session.
    pub async fn create_order(&self, payload: Map<String, Value>) -> Result<Order, IngestError> {
        let mut inner = self.inner.lock().await;
        let order = match inner.store.ingest(payload) {
            Ok(order) => order,
            Err(e) => {
                warn!(error = %e, "order rejected");
                return Err(e);
            }
        };
        let delivery = inner.broadcast_snapshot();
        info!(
            order_id = %order.order_id,
            id = %order.id,
            delivered = delivery.delivered,
            "new order received"
        );
        Ok(order)
    }

    /// Update an order's status and, on a match, push the new log.
    pub async fn update_status(&self, order_id: &str, status: OrderStatus) -> bool {
        let mut inner = self.inner.lock().await;
        let known = status.is_known();
        let status_text = status.to_string();
        if !inner.store.update_status(order_id, status) {
            warn!(order_id, status = %status_text, "status update for unknown order");
            return false;
        }
        let delivery = inner.broadcast_snapshot();
        info!(
            order_id,
            status = %status_text,
            known_status = known,
            delivered = delivery.delivered,
            "order status updated"
        );
        true
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn snapshot(&self) -> Vec<Order> {
        self.inner.lock().await.store.snapshot()
    }

    /// Entries in the connection set, including ones whose transport is
    /// gone but not yet pruned.
    pub async fn registered_sessions(&self) -> usize {
        self.inner.lock().await.conns.registered()
    }

    pub async fn stats(&self) -> RelayStats {
        let inner = self.inner.lock().await;
        RelayStats {
            connected_clients: inner.conns.len(),
            total_orders: inner.store.len(),
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Close every session and refuse new ones. Returns how many were open.
    pub async fn shutdown(&self) -> usize {
        let mut inner = self.inner.lock().await;
        inner.closed = true;
        let closed = inner.conns.clear();
        info!(closed, "relay closed all connections");
        closed
    }
}

// ---------------------------------------------------------------------------
// SessionGuard
// ---------------------------------------------------------------------------

/// Deregisters a session when dropped.
///
/// For transports whose lifetime is a value rather than a loop (an SSE body
/// stream): keep the guard inside the stream and the session is removed as
/// soon as the client goes away.
pub struct SessionGuard {
    relay: Arc<Relay>,
    conn: ConnId,
}

impl SessionGuard {
    pub fn new(relay: Arc<Relay>, conn: ConnId) -> Self {
        Self { relay, conn }
    }

    pub fn conn(&self) -> ConnId {
        self.conn
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let conn = self.conn;
        if let Ok(mut inner) = self.relay.inner.try_lock() {
            if inner.conns.remove(&conn) {
                debug!(conn = %conn, "session guard released connection");
            }
            return;
        }
        // Lock is busy: finish the removal on the runtime.
        let relay = Arc::clone(&self.relay);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    relay.disconnect(&conn).await;
                });
            }
            Err(_) => warn!(conn = %conn, "no runtime to release connection; left for pruning"),
        }
    }
}

fn rejected_order_id(e: &IngestError) -> Option<String> {
    match e {
        IngestError::DuplicateOrderId(id) => Some(id.clone()),
        IngestError::MissingOrderId => None,
    }
}
