//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where all
//! services are instantiated and wired together.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::WsConnectionManager;
use crate::room::RoomRegistry;
use crate::storage::{InMemoryStorageSink, StorageSink};

/// Container for all bootstrapped services.
///
/// Consumed by `AppState` to build the final application state.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Owns every live room and the cooldown cache.
    pub registry: Arc<RoomRegistry>,
    /// Backs captured-audio storage and download packaging.
    pub storage: Arc<dyn StorageSink>,
    /// Manages WebSocket connections for global force-close on shutdown.
    pub ws_manager: Arc<WsConnectionManager>,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Initiates graceful shutdown of all services.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");
        self.cancel_token.cancel();
        let closed = self.ws_manager.close_all();
        log::info!("[Bootstrap] Closed {closed} WebSocket connection(s)");
        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Bootstraps all application services with their dependencies.
///
/// This is the composition root where all services are instantiated and
/// wired together:
///
/// 1. Cancellation token for graceful shutdown
/// 2. Storage sink for captured audio
/// 3. Room registry, with its background sweep task spawned against the
///    cancellation token
/// 4. WebSocket connection manager
#[must_use]
pub fn bootstrap_services() -> BootstrappedServices {
    let cancel_token = CancellationToken::new();
    let storage: Arc<dyn StorageSink> = Arc::new(InMemoryStorageSink::new());
    let registry = Arc::new(RoomRegistry::new(Arc::clone(&storage)));
    Arc::clone(&registry).spawn_sweeper(cancel_token.clone());
    let ws_manager = Arc::new(WsConnectionManager::new());

    BootstrappedServices { registry, storage, ws_manager, cancel_token }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_produces_an_empty_registry() {
        let services = bootstrap_services();
        assert!(services.registry.lookup("ZZZ999").is_err());
    }
}
