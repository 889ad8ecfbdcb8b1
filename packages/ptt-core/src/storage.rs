//! Storage sink for captured speaking turns.
//!
//! The core does not interpret media bytes; it hands each completed turn's
//! concatenated audio to a [`StorageSink`] and moves on. Implementations are
//! expected to be non-blocking - queue the write and return immediately.

use bytes::Bytes;
use dashmap::DashMap;

/// Receives one captured file per completed speaking turn.
///
/// Calls happen synchronously on the owning room's actor task; a slow or
/// blocking implementation will stall that room's event loop.
pub trait StorageSink: Send + Sync {
    /// Stores `bytes` under `filename`, scoped to `room_code`.
    fn store(&self, room_code: &str, filename: &str, bytes: Bytes);

    /// Returns all files stored for a room, for download packaging.
    /// Sinks that don't support retrieval (e.g. a pure forwarding sink)
    /// may return an empty list.
    fn list(&self, room_code: &str) -> Vec<(String, Bytes)>;

    /// Drops all files retained for a room, once its cooldown has elapsed.
    fn purge(&self, room_code: &str);
}

/// Discards every captured file. Useful when recording is disabled for a room.
#[derive(Debug, Default)]
pub struct NoopStorageSink;

impl StorageSink for NoopStorageSink {
    fn store(&self, _room_code: &str, _filename: &str, _bytes: Bytes) {}

    fn list(&self, _room_code: &str) -> Vec<(String, Bytes)> {
        Vec::new()
    }

    fn purge(&self, _room_code: &str) {}
}

/// Accumulates captured files in memory, keyed by room code.
///
/// Suitable for the standalone server's default deployment, where
/// downloads are served for the room's cooldown window and then dropped.
#[derive(Debug, Default)]
pub struct InMemoryStorageSink {
    files: DashMap<String, Vec<(String, Bytes)>>,
}

impl InMemoryStorageSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageSink for InMemoryStorageSink {
    fn store(&self, room_code: &str, filename: &str, bytes: Bytes) {
        self.files
            .entry(room_code.to_string())
            .or_default()
            .push((filename.to_string(), bytes));
    }

    fn list(&self, room_code: &str) -> Vec<(String, Bytes)> {
        self.files
            .get(room_code)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    fn purge(&self, room_code: &str) {
        self.files.remove(room_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_never_retains_anything() {
        let sink = NoopStorageSink;
        sink.store("ABC123", "f.wav", Bytes::from_static(b"hi"));
        assert!(sink.list("ABC123").is_empty());
    }

    #[test]
    fn in_memory_sink_accumulates_per_room() {
        let sink = InMemoryStorageSink::new();
        sink.store("ABC123", "a.wav", Bytes::from_static(b"aaa"));
        sink.store("ABC123", "b.wav", Bytes::from_static(b"bbb"));
        sink.store("XYZ999", "c.wav", Bytes::from_static(b"ccc"));

        let abc = sink.list("ABC123");
        assert_eq!(abc.len(), 2);
        assert_eq!(sink.list("XYZ999").len(), 1);
        assert!(sink.list("NONE00").is_empty());
    }

    #[test]
    fn purge_drops_room_files() {
        let sink = InMemoryStorageSink::new();
        sink.store("ABC123", "a.wav", Bytes::from_static(b"aaa"));
        sink.purge("ABC123");
        assert!(sink.list("ABC123").is_empty());
    }
}
