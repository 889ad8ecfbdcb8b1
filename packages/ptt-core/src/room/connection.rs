//! Arena of connections: an opaque handle replaces direct WebSocket references
//! everywhere inside a room, per the reference-graph design note - the
//! SendQueue, the client maps, the instructor set, and the listener slot all
//! refer to connections by [`ConnectionId`] rather than holding the socket
//! itself, so a single `HashMap` drop on close is enough to retire every
//! reference.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;

/// Opaque handle identifying one WebSocket connection within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Issues unique, monotonically increasing [`ConnectionId`]s for one room.
#[derive(Debug, Default)]
pub struct ConnectionIdAllocator {
    next: AtomicU64,
}

impl ConnectionIdAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self { next: AtomicU64::new(1) }
    }

    pub fn next(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// A message queued for delivery to one connection's writer task.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    Text(String),
    Binary(Bytes),
    Close,
}

/// Sending half of a connection's outbound channel, held by the room actor.
pub type OutboundSender = mpsc::UnboundedSender<OutboundMessage>;

/// Receiving half of a connection's outbound channel, held by the transport
/// adapter's writer loop.
pub type OutboundReceiver = mpsc::UnboundedReceiver<OutboundMessage>;

/// Creates a fresh outbound channel for a newly accepted connection.
#[must_use]
pub fn outbound_channel() -> (OutboundSender, OutboundReceiver) {
    mpsc::unbounded_channel()
}
