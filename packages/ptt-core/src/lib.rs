//! Classroom PTT Core - shared library for the push-to-talk server.
//!
//! This crate implements the room lifecycle, the per-room send queue and
//! RTS/CTS state machine, and the WebSocket signaling relay that together
//! form a classroom push-to-talk session. It is designed to be embedded in
//! a standalone headless server binary.
//!
//! # Architecture
//!
//! - [`room`]: room domain logic - the send queue, per-client state, the
//!   connection arena, wire signaling, the per-room actor, and the registry
//! - [`storage`]: pluggable sink for captured speaking turns
//! - [`api`]: HTTP/WebSocket transport and router construction
//! - [`bootstrap`]: composition root wiring services together
//! - [`error`]: centralized error types
//! - [`utils`]: room code and client key helpers

#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod error;
pub mod protocol_constants;
pub mod room;
pub mod storage;
pub mod utils;

pub use api::{start_server, AppState, AppStateBuilder, ServerError, WsConnectionManager};
pub use bootstrap::{bootstrap_services, BootstrappedServices};
pub use error::{ErrorCode, PttError, PttResult};
pub use room::{ConnectionId, HandlerEvent, MessageHandler, RoomInfo, RoomRegistry};
pub use storage::{InMemoryStorageSink, NoopStorageSink, StorageSink};
pub use utils::now_millis;
