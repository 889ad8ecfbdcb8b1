//! Per-client state tracked by the room's [`super::handler::MessageHandler`].

use std::time::Instant;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::utils::now_millis;

/// Speaker priority under `priority` queue sort mode. Higher sorts earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Priority {
    Normal = 0,
    Medium = 1,
    High = 2,
    Urgent = 3,
}

impl Priority {
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<u8> for Priority {
    fn from(value: u8) -> Self {
        match value {
            1 => Priority::Medium,
            2 => Priority::High,
            n if n >= 3 => Priority::Urgent,
            _ => Priority::Normal,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Per-WebSocket entry: identity, priority, and queue-ordering metadata.
///
/// Created on first RTS or on WebRTC `ready`; destroyed on close.
#[derive(Debug, Clone)]
pub struct ClientEntry {
    /// `"{username}-{5 lowercase letters}"`.
    pub key: String,
    pub priority: Priority,
    pub join_time: Instant,
    /// Assigned on manual reorder; preserves hand-crafted order across
    /// sort-mode toggles.
    pub manual_order: Option<u32>,
}

impl ClientEntry {
    #[must_use]
    pub fn new(key: String) -> Self {
        Self {
            key,
            priority: Priority::Normal,
            join_time: Instant::now(),
            manual_order: None,
        }
    }
}

/// Accumulates the raw audio frames a speaker sends while holding CTS.
///
/// Invariant: `start` is `Some` iff the client currently holds CTS or did so
/// since the last flush. `flush` resets both fields.
#[derive(Debug, Default)]
pub struct CaptureBuffer {
    start: Option<Instant>,
    start_millis: u64,
    payloads: BytesMut,
}

/// A completed capture, ready to hand to a [`crate::storage::StorageSink`].
pub struct CapturedAudio {
    pub filename: String,
    pub bytes: Bytes,
}

impl CaptureBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of a new granted turn.
    pub fn begin(&mut self) {
        self.start = Some(Instant::now());
        self.start_millis = now_millis();
    }

    /// True if this buffer is currently an active (or not-yet-flushed) turn.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.start.is_some()
    }

    /// Appends a raw audio payload.
    pub fn push(&mut self, payload: &[u8]) {
        self.payloads.extend_from_slice(payload);
    }

    /// Resets the buffer and returns the completed capture, if one was in
    /// progress. Returns `None` if the buffer was never started or is empty.
    pub fn flush(&mut self, key: &str) -> Option<CapturedAudio> {
        if self.start.is_none() {
            return None;
        }
        let filename = format!("{}-{key}.wav", self.start_millis);
        let bytes = std::mem::take(&mut self.payloads).freeze();
        self.start = None;
        self.start_millis = 0;
        Some(CapturedAudio { filename, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_from_u8_clamps_high_values() {
        assert_eq!(Priority::from(0), Priority::Normal);
        assert_eq!(Priority::from(3), Priority::Urgent);
        assert_eq!(Priority::from(200), Priority::Urgent);
    }

    #[test]
    fn priority_orders_numerically() {
        assert!(Priority::Urgent > Priority::Normal);
    }

    #[test]
    fn capture_buffer_flush_before_begin_is_none() {
        let mut buf = CaptureBuffer::new();
        assert!(buf.flush("alice-xxxxx").is_none());
    }

    #[test]
    fn capture_buffer_round_trips_payloads() {
        let mut buf = CaptureBuffer::new();
        buf.begin();
        buf.push(b"abc");
        buf.push(b"def");
        let captured = buf.flush("alice-xxxxx").unwrap();
        assert_eq!(&captured.bytes[..], b"abcdef");
        assert!(captured.filename.ends_with("-alice-xxxxx.wav"));
        assert!(!buf.is_active());
    }
}
