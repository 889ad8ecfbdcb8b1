//! Wire protocol: text-frame classification and JSON signaling payloads.
//!
//! The core does not interpret SDP or ICE candidate bodies - they are
//! relayed as opaque JSON values, amended only with routing fields like
//! `from`. Control messages that the handler must act on (`ready`,
//! `kick-user`, ...) get typed payload structs.

use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};

/// Result of classifying one incoming frame per the frame classification table.
#[derive(Debug)]
pub enum ClassifiedFrame {
    /// `RTS{username}` - legacy speaker registration.
    Rts { username: String },
    /// `STOP` - speaker stops, or listener leaves.
    Stop,
    /// `LISTEN` - caller becomes/replaces the listener.
    Listen,
    /// `SKIP` - listener-only: end current speaker, advance queue.
    Skip,
    /// `QUEUE_STATUS` - mark connection as instructor; reply with a snapshot.
    QueueStatus,
    /// `FORMAT {mime}` - listener's preferred playback MIME hint.
    Format { mime: String },
    /// A parsed JSON signaling/control message.
    Json(Value),
    /// Opaque audio payload (binary frames, or unrecognized text frames).
    Audio(Bytes),
}

/// Classifies a text frame per §4.2 of the wire protocol.
#[must_use]
pub fn classify_text(text: &str) -> ClassifiedFrame {
    if text == "STOP" {
        return ClassifiedFrame::Stop;
    }
    if text == "LISTEN" {
        return ClassifiedFrame::Listen;
    }
    if text == "SKIP" {
        return ClassifiedFrame::Skip;
    }
    if text == "QUEUE_STATUS" {
        return ClassifiedFrame::QueueStatus;
    }
    if let Some(username) = text.strip_prefix("RTS") {
        return ClassifiedFrame::Rts { username: username.to_string() };
    }
    if let Some(mime) = text.strip_prefix("FORMAT ") {
        return ClassifiedFrame::Format { mime: mime.trim().to_string() };
    }
    if text.trim_start().starts_with('{') {
        if let Ok(value) = serde_json::from_str::<Value>(text) {
            return ClassifiedFrame::Json(value);
        }
    }
    ClassifiedFrame::Audio(Bytes::copy_from_slice(text.as_bytes()))
}

/// Classifies a binary frame: always an audio payload.
#[must_use]
pub fn classify_binary(data: Bytes) -> ClassifiedFrame {
    ClassifiedFrame::Audio(data)
}

// ─────────────────────────────────────────────────────────────────────────────
// Typed incoming control payloads
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ReadyPayload {
    pub username: Option<String>,
    pub priority: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct KickUserPayload {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct ReorderUserPayload {
    pub username: String,
    pub direction: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveUserToPositionPayload {
    pub username: String,
    pub position: usize,
}

#[derive(Debug, Deserialize)]
pub struct SetQueueSortModePayload {
    pub mode: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePriorityPayload {
    pub priority: u8,
}

/// Reads the `type` discriminant out of a parsed JSON signaling message.
#[must_use]
pub fn message_type(value: &Value) -> Option<&str> {
    value.get("type").and_then(Value::as_str)
}

/// Deserializes a typed payload out of a parsed JSON message, ignoring `type`.
pub fn parse_payload<T: for<'de> Deserialize<'de>>(value: &Value) -> Option<T> {
    serde_json::from_value(value.clone()).ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Outgoing control messages
// ─────────────────────────────────────────────────────────────────────────────

#[must_use]
pub fn clear_msg() -> Value {
    json!({ "type": "clear" })
}

#[must_use]
pub fn from_msg(name: &str) -> Value {
    json!({ "type": "from", "name": name })
}

#[must_use]
pub fn cts_msg() -> Value {
    json!({ "type": "cts" })
}

#[must_use]
pub fn stop_msg() -> Value {
    json!({ "type": "stop" })
}

#[must_use]
pub fn kicked_msg() -> Value {
    json!({ "type": "kicked" })
}

#[must_use]
pub fn error_msg(kind: &str, message: &str) -> Value {
    json!({ "type": kind, "message": message })
}

/// One entry in a `queue`/`queue-status` snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueueEntryView {
    pub username: String,
    pub priority: u8,
}

/// Builds the `queue-update` / `queue-status` payload shared by both message
/// types (§4.5): the tag differs, the body does not.
#[must_use]
pub fn queue_snapshot_msg(
    tag: &str,
    queue: &[QueueEntryView],
    current_speaker: Option<&str>,
    current_speaker_priority: Option<u8>,
    sort_mode: &str,
) -> Value {
    json!({
        "type": tag,
        "queue": queue,
        "currentSpeaker": current_speaker,
        "currentSpeakerPriority": current_speaker_priority,
        "queueSize": queue.len(),
        "sortMode": sort_mode,
    })
}

/// Augments a relayed `offer`/`answer`/`ice-candidate` payload with a
/// `from: {username}` field, preserving every other field verbatim.
#[must_use]
pub fn with_from_username(mut value: Value, username: &str) -> Value {
    if let Value::Object(ref mut map) = value {
        map.insert("from".to_string(), json!({ "username": username }));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_exact_keywords() {
        assert!(matches!(classify_text("STOP"), ClassifiedFrame::Stop));
        assert!(matches!(classify_text("LISTEN"), ClassifiedFrame::Listen));
        assert!(matches!(classify_text("SKIP"), ClassifiedFrame::Skip));
        assert!(matches!(classify_text("QUEUE_STATUS"), ClassifiedFrame::QueueStatus));
    }

    #[test]
    fn classifies_rts_with_username() {
        match classify_text("RTSalice") {
            ClassifiedFrame::Rts { username } => assert_eq!(username, "alice"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn classifies_format_with_mime() {
        match classify_text("FORMAT audio/webm") {
            ClassifiedFrame::Format { mime } => assert_eq!(mime, "audio/webm"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn classifies_json_payload() {
        match classify_text(r#"{"type":"ready","username":"bob"}"#) {
            ClassifiedFrame::Json(value) => assert_eq!(message_type(&value), Some("ready")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unrecognized_text_is_audio() {
        assert!(matches!(classify_text("some raw bytes"), ClassifiedFrame::Audio(_)));
    }

    #[test]
    fn with_from_username_preserves_other_fields() {
        let offer = json!({ "type": "offer", "sdp": "v=0..." });
        let augmented = with_from_username(offer, "alice");
        assert_eq!(augmented["sdp"], "v=0...");
        assert_eq!(augmented["from"]["username"], "alice");
    }
}
