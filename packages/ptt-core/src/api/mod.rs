//! HTTP/WebSocket API layer.
//!
//! This module contains thin handlers that delegate to the room registry.
//! It provides router construction and server startup.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::room::RoomRegistry;
use crate::storage::StorageSink;

pub mod http;
pub mod response;
pub mod ws;
pub mod ws_connection;

pub use ws_connection::WsConnectionManager;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),

    /// No available ports in the specified range.
    #[error("No available ports in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },
}

/// Shared application state for the API layer.
#[derive(Clone)]
pub struct AppState {
    /// Owns every live room and the cooldown cache.
    pub registry: Arc<RoomRegistry>,
    /// Backs the `/api/v1/storage/:code/download` endpoint.
    pub storage: Arc<dyn StorageSink>,
    /// Manages WebSocket connections for global force-close on shutdown.
    pub ws_manager: Arc<WsConnectionManager>,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
    /// Port to bind to; 0 lets the OS choose.
    pub bind_port: u16,
}

/// Builder for constructing an `AppState`.
#[derive(Default)]
pub struct AppStateBuilder {
    registry: Option<Arc<RoomRegistry>>,
    storage: Option<Arc<dyn StorageSink>>,
    ws_manager: Option<Arc<WsConnectionManager>>,
    cancel_token: Option<CancellationToken>,
    bind_port: u16,
}

impl AppStateBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Populates the shared fields from a `BootstrappedServices` container.
    pub fn from_services(mut self, services: &crate::BootstrappedServices) -> Self {
        self.registry = Some(Arc::clone(&services.registry));
        self.storage = Some(Arc::clone(&services.storage));
        self.ws_manager = Some(Arc::clone(&services.ws_manager));
        self.cancel_token = Some(services.cancel_token.clone());
        self
    }

    /// Sets the room registry.
    pub fn registry(mut self, registry: Arc<RoomRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the storage sink.
    pub fn storage(mut self, storage: Arc<dyn StorageSink>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the WebSocket connection manager.
    pub fn ws_manager(mut self, manager: Arc<WsConnectionManager>) -> Self {
        self.ws_manager = Some(manager);
        self
    }

    /// Sets the cancellation token.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Sets the port to bind to.
    pub fn bind_port(mut self, port: u16) -> Self {
        self.bind_port = port;
        self
    }

    /// Builds the `AppState`, panicking if required fields are missing.
    pub fn build(self) -> AppState {
        AppState {
            registry: self.registry.expect("registry is required"),
            storage: self.storage.expect("storage is required"),
            ws_manager: self.ws_manager.expect("ws_manager is required"),
            cancel_token: self.cancel_token.expect("cancel_token is required"),
            bind_port: self.bind_port,
        }
    }
}

impl AppState {
    /// Creates a new builder for constructing an `AppState`.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }
}

async fn find_available_port(start: u16, end: u16) -> Result<(u16, tokio::net::TcpListener), ServerError> {
    for port in start..=end {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => return Ok((port, listener)),
            Err(_) => continue,
        }
    }
    Err(ServerError::NoAvailablePort { start, end })
}

/// Starts the HTTP server on the configured or auto-discovered port.
pub async fn start_server(state: AppState) -> Result<(), ServerError> {
    let (port, listener) = if state.bind_port > 0 {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], state.bind_port));
        (state.bind_port, tokio::net::TcpListener::bind(&addr).await?)
    } else {
        find_available_port(49400, 49410).await?
    };

    log::info!("Server listening on http://0.0.0.0:{port}");
    let app = http::create_router(state);

    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>()).await?;
    Ok(())
}
