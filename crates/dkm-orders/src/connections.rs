//! Connection membership for broadcast fan-out.
//!
//! Each live session (WebSocket or SSE) is represented by the sending half of
//! an unbounded channel of text frames. The transport task owns the
//! receiving half and writes whatever arrives to its socket; when it goes
//! away the sender reports itself closed and broadcasts skip it.
//!
//! Nothing here retries or queues on behalf of a dead peer. A peer that
//! misses a broadcast catches up from the snapshot it gets on reconnect, or
//! from `GET /api/orders`.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::mpsc;
use uuid::Uuid;

pub type FrameSender = mpsc::UnboundedSender<String>;
pub type FrameReceiver = mpsc::UnboundedReceiver<String>;

/// Identity of one connected session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnId(Uuid);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Result of one fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    /// Members whose receiver was already gone; they are pruned.
    pub skipped: usize,
}

/// Set of sessions eligible to receive broadcasts.
#[derive(Debug, Default)]
pub struct ConnectionSet {
    members: HashMap<ConnId, FrameSender>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: ConnId, tx: FrameSender) {
        self.members.insert(id, tx);
    }

    /// Remove a member. Removing an unknown or already-removed id is a no-op
    /// that returns `false`.
    pub fn remove(&mut self, id: &ConnId) -> bool {
        self.members.remove(id).is_some()
    }

    pub fn contains(&self, id: &ConnId) -> bool {
        self.members.contains_key(id)
    }

    /// Send one frame to a single member. Returns whether it was handed to
    /// an open channel.
    pub fn send_to(&self, id: &ConnId, frame: &str) -> bool {
        match self.members.get(id) {
            Some(tx) => tx.send(frame.to_string()).is_ok(),
            None => false,
        }
    }

    /// Deliver `frame` to every open member.
    ///
    /// A failed send affects only that member. Members whose receiver has
    /// been dropped are removed from the set.
    pub fn broadcast(&mut self, frame: &str) -> Delivery {
        let mut delivery = Delivery::default();
        self.members.retain(|id, tx| {
            if tx.is_closed() {
                delivery.skipped += 1;
                tracing::debug!(conn = %id, "broadcast skipped closed connection");
                return false;
            }
            match tx.send(frame.to_string()) {
                Ok(()) => {
                    delivery.delivered += 1;
                    true
                }
                Err(_) => {
                    delivery.skipped += 1;
                    tracing::debug!(conn = %id, "broadcast send failed; dropping member");
                    false
                }
            }
        });
        delivery
    }

    /// Remove members whose receiver has been dropped. Returns how many.
    pub fn prune_closed(&mut self) -> usize {
        let before = self.members.len();
        self.members.retain(|_, tx| !tx.is_closed());
        before - self.members.len()
    }

    /// Number of members whose receiver is still alive.
    pub fn len(&self) -> usize {
        self.members.values().filter(|tx| !tx.is_closed()).count()
    }

    /// Number of entries held, open or not.
    pub fn registered(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every member's sender. Each session sees its channel end and
    /// closes its transport. Returns how many members there were.
    pub fn clear(&mut self) -> usize {
        let n = self.members.len();
        self.members.clear();
        n
    }
}
