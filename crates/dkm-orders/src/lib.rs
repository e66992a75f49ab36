//! dkm-orders
//!
//! Order relay core for the Donkomi storefront.
//!
//! Responsibilities:
//! - Newest-first in-memory order log behind a pluggable [`OrderStore`]
//! - Socket wire protocol (`new_order`, `update_order_status`, `get_orders`)
//! - Connection membership and broadcast fan-out
//! - The [`Relay`] service object that ties the three together
//!
//! Transport-agnostic: a session is just an unbounded channel of
//! pre-serialized text frames. The HTTP/WebSocket process lives in
//! `dkm-relay`.

pub mod connections;
pub mod order;
pub mod protocol;
pub mod relay;
pub mod store;

pub use connections::{ConnId, ConnectionSet, Delivery, FrameReceiver, FrameSender};
pub use order::{Order, OrderStatus};
pub use protocol::{decode, ClientMsg, DecodeError, ServerMsg};
pub use relay::{Relay, RelayStats, SessionGuard};
pub use store::{IngestError, MemoryOrderLog, OrderStore};
