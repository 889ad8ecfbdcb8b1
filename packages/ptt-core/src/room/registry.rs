//! Global room registry: the one genuinely concurrent piece of room state.
//!
//! Every WebSocket upgrade looks a room code up here before it ever touches
//! a room's single-threaded actor, so this map is read far more often than
//! any one room's internals - hence `DashMap` rather than a mutex.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::info;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{PttError, PttResult};
use crate::protocol_constants::{REGISTRY_SWEEP_INTERVAL_SECS, ROOM_CODE_MAX_ATTEMPTS, ROOM_COOLDOWN_SECS, ROOM_TTL_SECS};
use crate::storage::StorageSink;
use crate::utils::random_room_code;

use super::connection::{ConnectionId, ConnectionIdAllocator};
use super::handler::{HandlerEvent, MessageHandler};

/// Public-facing room metadata, per the data model's `Room` entity.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub code: String,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub persistent: bool,
    pub enable_cloud_recording: bool,
}

/// A running room: its metadata plus the handle used to reach its actor.
struct LiveRoom {
    info: RoomInfo,
    events: mpsc::UnboundedSender<HandlerEvent>,
    ids: ConnectionIdAllocator,
}

/// Owns every live room and the post-expiry cooldown cache, and runs the
/// background sweep that moves rooms between the two and eventually purges
/// their storage.
pub struct RoomRegistry {
    live: DashMap<String, Arc<LiveRoom>>,
    cooldown: DashMap<String, Instant>,
    storage: Arc<dyn StorageSink>,
    next_anon_id: AtomicU64,
}

impl RoomRegistry {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageSink>) -> Self {
        Self {
            live: DashMap::new(),
            cooldown: DashMap::new(),
            storage,
            next_anon_id: AtomicU64::new(1),
        }
    }

    /// Creates a new room with a fresh, collision-free code and spawns its actor.
    pub fn create_room(&self, persistent: bool, enable_cloud_recording: bool) -> PttResult<RoomInfo> {
        let code = self.generate_unique_code()?;
        let now = Instant::now();
        let info = RoomInfo {
            code: code.clone(),
            created_at: now,
            expires_at: now + Duration::from_secs(ROOM_TTL_SECS),
            persistent,
            enable_cloud_recording,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let handler = MessageHandler::new(code.clone(), self.storage.clone(), persistent);
        tokio::spawn(handler.run(rx));

        self.live.insert(
            code,
            Arc::new(LiveRoom { info: info.clone(), events: tx, ids: ConnectionIdAllocator::new() }),
        );
        Ok(info)
    }

    fn generate_unique_code(&self) -> PttResult<String> {
        for _ in 0..ROOM_CODE_MAX_ATTEMPTS {
            let code = random_room_code();
            if !self.live.contains_key(&code) && !self.cooldown.contains_key(&code) {
                return Ok(code);
            }
        }
        Err(PttError::Internal("exhausted room code generation attempts".into()))
    }

    /// Looks a room up by code, returning its info if it exists and has not expired.
    pub fn lookup(&self, code: &str) -> PttResult<RoomInfo> {
        let room = self.live.get(code).ok_or_else(|| PttError::RoomNotFound(code.to_string()))?;
        if room.info.expires_at <= Instant::now() {
            return Err(PttError::RoomExpired(code.to_string()));
        }
        Ok(room.info.clone())
    }

    /// Remaining time-to-live for a room, or `None` if it doesn't exist.
    #[must_use]
    pub fn ttl_remaining(&self, code: &str) -> Option<Duration> {
        let room = self.live.get(code)?;
        Some(room.info.expires_at.saturating_duration_since(Instant::now()))
    }

    /// Remaining cooldown window during which a room's files stay downloadable.
    #[must_use]
    pub fn cooldown_remaining(&self, code: &str) -> Option<Duration> {
        let until = self.cooldown.get(code)?;
        Some(until.saturating_duration_since(Instant::now()))
    }

    /// Allocates a fresh [`ConnectionId`] and registers its outbound sender
    /// with the room's actor. Returns `None` if the room is unknown/expired.
    pub fn connect(&self, code: &str, sender: super::connection::OutboundSender) -> Option<ConnectionId> {
        let room = self.live.get(code)?;
        if room.info.expires_at <= Instant::now() {
            return None;
        }
        let id = room.ids.next();
        let _ = room.events.send(HandlerEvent::Connected { id, sender });
        Some(id)
    }

    /// Forwards an event from the transport adapter into a room's actor.
    /// Silently drops the event if the room has since been torn down.
    pub fn dispatch(&self, code: &str, event: HandlerEvent) {
        if let Some(room) = self.live.get(code) {
            let _ = room.events.send(event);
        }
    }

    /// Returns every file captured for a room, regardless of whether it is
    /// still live or sitting in cooldown.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn StorageSink> {
        &self.storage
    }

    /// An identifier unique within this process, used for connections that
    /// never send a username (e.g. pure listeners).
    pub fn next_anonymous_id(&self) -> u64 {
        self.next_anon_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Spawns the background sweep that expires rooms into cooldown and
    /// purges cooldowns once they elapse. Runs until `cancel` fires.
    pub fn spawn_sweeper(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(REGISTRY_SWEEP_INTERVAL_SECS));
            loop {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    _ = interval.tick() => self.sweep(),
                }
            }
        })
    }

    fn sweep(&self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .live
            .iter()
            .filter(|entry| entry.info.expires_at <= now)
            .map(|entry| entry.key().clone())
            .collect();
        for code in expired {
            if let Some((code, _)) = self.live.remove(&code) {
                info!("room {code} expired, entering cooldown");
                self.cooldown.insert(code, now + Duration::from_secs(ROOM_COOLDOWN_SECS));
            }
        }

        let drained: Vec<String> = self
            .cooldown
            .iter()
            .filter(|entry| *entry.value() <= now)
            .map(|entry| entry.key().clone())
            .collect();
        for code in drained {
            self.cooldown.remove(&code);
            self.storage.purge(&code);
            info!("room {code} cooldown elapsed, storage purged");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorageSink;

    fn registry() -> RoomRegistry {
        RoomRegistry::new(Arc::new(InMemoryStorageSink::new()))
    }

    #[tokio::test]
    async fn create_room_produces_well_formed_code() {
        let reg = registry();
        let info = reg.create_room(false, false).unwrap();
        assert_eq!(info.code.len(), 6);
        assert!(crate::utils::is_valid_room_code(&info.code));
    }

    #[test]
    fn lookup_unknown_code_returns_not_found() {
        let reg = registry();
        assert!(matches!(reg.lookup("ZZZ999"), Err(PttError::RoomNotFound(_))));
    }

    #[tokio::test]
    async fn lookup_known_code_succeeds() {
        let reg = registry();
        let info = reg.create_room(true, false).unwrap();
        assert!(reg.lookup(&info.code).is_ok());
    }

    #[tokio::test]
    async fn ttl_remaining_is_close_to_full_window() {
        let reg = registry();
        let info = reg.create_room(false, false).unwrap();
        let ttl = reg.ttl_remaining(&info.code).unwrap();
        assert!(ttl.as_secs() <= ROOM_TTL_SECS && ttl.as_secs() > ROOM_TTL_SECS - 5);
    }

    #[tokio::test]
    async fn cooldown_remaining_is_none_before_expiry() {
        let reg = registry();
        let info = reg.create_room(false, false).unwrap();
        assert!(reg.cooldown_remaining(&info.code).is_none());
    }
}
