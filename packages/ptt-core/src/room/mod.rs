//! Room domain logic: the send queue, per-client state, the connection
//! arena, wire signaling, the per-room actor, and the room registry.

pub mod client;
pub mod connection;
pub mod handler;
pub mod queue;
pub mod registry;
pub mod signaling;

pub use connection::{ConnectionId, OutboundMessage};
pub use handler::{HandlerEvent, MessageHandler};
pub use registry::{RoomInfo, RoomRegistry};
