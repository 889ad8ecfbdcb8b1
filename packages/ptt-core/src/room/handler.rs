//! The per-room actor: owns every piece of mutable room state and is the only
//! task allowed to touch it. The WebSocket transport adapter never reaches
//! into a room directly - it forwards frames and close notifications over a
//! [`HandlerEvent`] channel and lets this loop serialize everything.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::protocol_constants::ROOM_TTL_SECS;
use crate::storage::StorageSink;
use crate::utils::{make_client_key, strip_key_suffix};

use super::client::{CaptureBuffer, ClientEntry};
use super::connection::{ConnectionId, OutboundMessage, OutboundSender};
use super::queue::SendQueue;
use super::signaling::{
    self, clear_msg, cts_msg, error_msg, from_msg, kicked_msg, message_type, parse_payload,
    queue_snapshot_msg, stop_msg, with_from_username, ClassifiedFrame, KickUserPayload,
    MoveUserToPositionPayload, QueueEntryView, ReadyPayload, ReorderUserPayload,
    SetQueueSortModePayload, UpdatePriorityPayload,
};

/// How long a trailing audio frame from the speaker who just relinquished
/// CTS is still forwarded, to avoid truncating the tail of their speech.
const LATE_FRAME_TOLERANCE: Duration = Duration::from_millis(250);

/// Queue ordering strategy, toggled by an instructor's `set-queue-sort-mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Fifo,
    Priority,
}

impl SortMode {
    fn as_str(self) -> &'static str {
        match self {
            SortMode::Fifo => "fifo",
            SortMode::Priority => "priority",
        }
    }
}

/// Everything the transport adapter reports to a room's actor loop.
pub enum HandlerEvent {
    Connected { id: ConnectionId, sender: OutboundSender },
    Text { id: ConnectionId, text: String },
    Binary { id: ConnectionId, data: Bytes },
    Closed { id: ConnectionId },
}

/// Owns one room's full state and drives its RTS/CTS and signaling logic.
pub struct MessageHandler {
    room_code: String,
    storage: Arc<dyn StorageSink>,
    persistent: bool,

    connections: HashMap<ConnectionId, OutboundSender>,
    clients: HashMap<ConnectionId, ClientEntry>,
    queue: SendQueue<ConnectionId>,

    listener: Option<ConnectionId>,
    /// Connections that have sent `LISTEN` or `QUEUE_STATUS`; a superset of
    /// `listener` that receives queue-update broadcasts without taking over
    /// audio.
    instructor_connections: HashSet<ConnectionId>,

    capture: CaptureBuffer,
    current_cts_key: Option<ConnectionId>,
    last_sender_key: Option<ConnectionId>,
    cts_ended_at: Option<Instant>,
    preferred_playback_mime: Option<String>,
    sort_mode: SortMode,
}

impl MessageHandler {
    #[must_use]
    pub fn new(room_code: String, storage: Arc<dyn StorageSink>, persistent: bool) -> Self {
        Self {
            room_code,
            storage,
            persistent,
            connections: HashMap::new(),
            clients: HashMap::new(),
            queue: SendQueue::new(),
            listener: None,
            instructor_connections: HashSet::new(),
            capture: CaptureBuffer::new(),
            current_cts_key: None,
            last_sender_key: None,
            cts_ended_at: None,
            preferred_playback_mime: None,
            sort_mode: SortMode::Fifo,
        }
    }

    /// Drives the room until its hard TTL elapses or its event channel closes.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<HandlerEvent>) {
        let deadline = sleep(Duration::from_secs(ROOM_TTL_SECS));
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                () = &mut deadline => {
                    info!("room {} hit its hard TTL, tearing down", self.room_code);
                    self.broadcast_all(stop_msg());
                    self.close_all();
                    return;
                }
                event = events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            debug!("room {} event channel closed", self.room_code);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn handle_event(&mut self, event: HandlerEvent) {
        match event {
            HandlerEvent::Connected { id, sender } => {
                self.connections.insert(id, sender);
            }
            HandlerEvent::Text { id, text } => self.handle_text(id, &text),
            HandlerEvent::Binary { id, data } => self.handle_audio(id, data),
            HandlerEvent::Closed { id } => self.handle_closed(id),
        }
    }

    // ── outbound helpers ────────────────────────────────────────────────

    fn send_to(&self, id: ConnectionId, message: OutboundMessage) {
        if let Some(sender) = self.connections.get(&id) {
            // Best-effort: a failed send means the connection is already
            // tearing down and will produce its own Closed event shortly.
            let _ = sender.send(message);
        }
    }

    fn send_json(&self, id: ConnectionId, value: Value) {
        self.send_to(id, OutboundMessage::Text(value.to_string()));
    }

    fn send_text(&self, id: ConnectionId, text: &str) {
        self.send_to(id, OutboundMessage::Text(text.to_string()));
    }

    fn broadcast_all(&self, value: Value) {
        let text = value.to_string();
        for id in self.connections.keys() {
            self.send_to(*id, OutboundMessage::Text(text.clone()));
        }
    }

    fn close_all(&self) {
        for id in self.connections.keys() {
            self.send_to(*id, OutboundMessage::Close);
        }
    }

    fn display_name(&self, id: ConnectionId) -> Option<String> {
        self.clients.get(&id).map(|c| strip_key_suffix(&c.key).to_string())
    }

    // ── queue plumbing ──────────────────────────────────────────────────

    fn resort_queue(&mut self) {
        let clients = &self.clients;
        match self.sort_mode {
            SortMode::Priority => self.queue.sort_by_priority(
                |id| clients.get(&id).map_or(0, |c| c.priority.as_u8()),
                |id| clients.get(&id).map_or_else(Instant::now, |c| c.join_time),
                |id| clients.get(&id).and_then(|c| c.manual_order),
                self.current_cts_key,
            ),
            SortMode::Fifo => self.queue.sort_by_fifo(
                |id| clients.get(&id).map_or_else(Instant::now, |c| c.join_time),
                |id| clients.get(&id).and_then(|c| c.manual_order),
                self.current_cts_key,
            ),
        }
    }

    fn record_manual_order(&mut self) {
        for (index, id) in self.queue.get_all().into_iter().enumerate() {
            if let Some(client) = self.clients.get_mut(&id) {
                client.manual_order = Some(index as u32);
            }
        }
    }

    fn queue_snapshot(&self, tag: &str) -> Value {
        let queue: Vec<QueueEntryView> = self
            .queue
            .get_all()
            .into_iter()
            .filter_map(|id| {
                self.clients.get(&id).map(|c| QueueEntryView {
                    username: strip_key_suffix(&c.key).to_string(),
                    priority: c.priority.as_u8(),
                })
            })
            .collect();
        let current_speaker = self.current_cts_key.and_then(|id| self.display_name(id));
        let current_priority = self
            .current_cts_key
            .and_then(|id| self.clients.get(&id))
            .map(|c| c.priority.as_u8());
        queue_snapshot_msg(tag, &queue, current_speaker.as_deref(), current_priority, self.sort_mode.as_str())
    }

    fn broadcast_queue_update(&mut self) {
        let snapshot = self.queue_snapshot("queue-update");
        let text = snapshot.to_string();
        let mut dead = Vec::new();
        for id in &self.instructor_connections {
            match self.connections.get(id) {
                Some(sender) => {
                    if sender.send(OutboundMessage::Text(text.clone())).is_err() {
                        dead.push(*id);
                    }
                }
                None => dead.push(*id),
            }
        }
        for id in dead {
            self.instructor_connections.remove(&id);
        }
    }

    // ── RTS/CTS state machine ───────────────────────────────────────────

    /// Registers `id` as a speaker candidate (legacy `RTS` or WebRTC `ready`),
    /// then grants CTS immediately if nobody currently holds it.
    fn register_speaker(&mut self, id: ConnectionId, username: &str, priority: Option<u8>) {
        let client = self.clients.entry(id).or_insert_with(|| ClientEntry::new(make_client_key(username)));
        if let Some(priority) = priority {
            client.priority = priority.into();
        }
        self.queue.register(id);
        self.resort_queue();
        self.maybe_advance();
    }

    /// If nobody holds CTS and the queue is non-empty, grants it to the head.
    fn maybe_advance(&mut self) {
        if self.current_cts_key.is_some() {
            return;
        }
        if let Some(head) = self.queue.peek() {
            self.grant_cts(head);
        } else {
            self.broadcast_queue_update();
        }
    }

    /// Grants `id` clear-to-send: the exact seven-step handoff.
    fn grant_cts(&mut self, id: ConnectionId) {
        // 1. ensure head
        self.queue.prepend(id);
        // 2 & 3.
        self.capture.begin();
        self.current_cts_key = Some(id);
        self.last_sender_key = Some(id);
        self.cts_ended_at = None;

        let Some(username) = self.display_name(id) else {
            warn!("room {}: grant_cts on unknown connection {id}", self.room_code);
            return;
        };

        // 4.
        if let Some(listener) = self.listener {
            self.send_json(listener, clear_msg());
            self.send_json(listener, from_msg(&username));
            // 5. (optional) inform listener of the active capture's mime hint.
            if let Some(mime) = &self.preferred_playback_mime {
                self.send_json(listener, serde_json::json!({ "type": "rec-mime", "mime": mime }));
            }
        }
        // 6.
        self.send_json(id, cts_msg());
        // 7.
        self.broadcast_queue_update();
    }

    /// Ends the current speaker's turn: flushes captured audio to storage,
    /// drops them from the queue, and advances to the next speaker if any.
    /// `notify` sends them a `stop` first - skipped when they stopped themselves.
    fn end_turn(&mut self, id: ConnectionId, notify: bool) {
        if self.current_cts_key != Some(id) {
            return;
        }
        if notify {
            self.send_json(id, stop_msg());
        }
        if let Some(key) = self.clients.get(&id).map(|c| c.key.clone()) {
            if let Some(captured) = self.capture.flush(&key) {
                if self.persistent {
                    self.storage.store(&self.room_code, &captured.filename, captured.bytes);
                }
            }
        }
        self.current_cts_key = None;
        self.cts_ended_at = Some(Instant::now());
        self.queue.remove(id);
        self.resort_queue();

        match self.queue.peek() {
            Some(next) => self.grant_cts(next),
            None => {
                if let Some(listener) = self.listener {
                    self.send_json(listener, clear_msg());
                }
                self.broadcast_queue_update();
            }
        }
    }

    // ── frame dispatch ───────────────────────────────────────────────────

    fn handle_text(&mut self, id: ConnectionId, text: &str) {
        match signaling::classify_text(text) {
            ClassifiedFrame::Rts { username } => self.register_speaker(id, &username, None),
            ClassifiedFrame::Stop => self.handle_stop(id),
            ClassifiedFrame::Listen => self.handle_listen(id),
            ClassifiedFrame::Skip => self.handle_skip(id),
            ClassifiedFrame::QueueStatus => {
                self.instructor_connections.insert(id);
                self.send_json(id, self.queue_snapshot("queue-status"));
            }
            ClassifiedFrame::Format { mime } => {
                if Some(id) == self.listener {
                    self.preferred_playback_mime = Some(mime);
                }
            }
            ClassifiedFrame::Json(value) => self.handle_json(id, value),
            ClassifiedFrame::Audio(bytes) => self.handle_audio(id, bytes),
        }
    }

    fn handle_stop(&mut self, id: ConnectionId) {
        if Some(id) == self.current_cts_key {
            self.end_turn(id, false);
        } else if Some(id) == self.listener {
            self.listener = None;
        }
    }

    fn handle_listen(&mut self, id: ConnectionId) {
        if let Some(previous) = self.listener.take() {
            if previous != id {
                self.send_to(previous, OutboundMessage::Close);
            }
        }
        self.listener = Some(id);
        self.instructor_connections.insert(id);

        if self.current_cts_key.is_none() {
            if let Some(head) = self.queue.peek() {
                self.grant_cts(head);
            } else if let Some(last) = self.last_sender_key.and_then(|id| self.display_name(id)) {
                self.send_json(id, from_msg(&last));
            }
        }
        self.send_json(id, self.queue_snapshot("queue-status"));
    }

    fn handle_skip(&mut self, id: ConnectionId) {
        if Some(id) != self.listener {
            return;
        }
        if let Some(listener) = self.listener {
            self.send_json(listener, clear_msg());
        }
        if let Some(current) = self.current_cts_key {
            self.end_turn(current, true);
        } else if let Some(head) = self.queue.peek() {
            self.send_json(head, stop_msg());
            self.queue.remove(head);
            self.clients.remove(&head);
            self.resort_queue();
            self.broadcast_queue_update();
        }
    }

    fn handle_audio(&mut self, id: ConnectionId, data: Bytes) {
        if Some(id) == self.current_cts_key {
            self.capture.push(&data);
            if let Some(listener) = self.listener {
                self.send_to(listener, OutboundMessage::Binary(data));
            }
            return;
        }
        if Some(id) == self.last_sender_key {
            if let Some(ended) = self.cts_ended_at {
                if ended.elapsed() <= LATE_FRAME_TOLERANCE {
                    if let Some(listener) = self.listener {
                        self.send_to(listener, OutboundMessage::Binary(data));
                    }
                    return;
                }
            }
        }
        debug!("room {}: dropping audio from unregistered sender {id}", self.room_code);
    }

    fn handle_closed(&mut self, id: ConnectionId) {
        let was_listener = Some(id) == self.listener;
        let was_speaker = Some(id) == self.current_cts_key;

        self.connections.remove(&id);
        self.instructor_connections.remove(&id);

        if was_speaker {
            if let Some(key) = self.clients.get(&id).map(|c| c.key.clone()) {
                if let Some(captured) = self.capture.flush(&key) {
                    if self.persistent {
                        self.storage.store(&self.room_code, &captured.filename, captured.bytes);
                    }
                }
            }
        }

        self.clients.remove(&id);
        self.queue.remove(id);
        self.resort_queue();

        if was_listener {
            self.listener = None;
            // Restore the interrupted speaker to a queued (not granted) state
            // so a future LISTEN can re-grant CTS to them.
            if let Some(speaker) = self.current_cts_key {
                self.queue.prepend(speaker);
                self.send_json(speaker, stop_msg());
                self.current_cts_key = None;
                self.last_sender_key = None;
                self.cts_ended_at = Some(Instant::now());
            }
            self.broadcast_queue_update();
            return;
        }

        if was_speaker {
            self.current_cts_key = None;
            self.last_sender_key = None;
            self.cts_ended_at = Some(Instant::now());
            if let Some(listener) = self.listener {
                self.send_json(listener, clear_msg());
            }
            match self.queue.peek() {
                Some(next) if self.listener.is_some() => self.grant_cts(next),
                _ => self.broadcast_queue_update(),
            }
            return;
        }

        self.broadcast_queue_update();
    }

    // ── JSON signaling & instructor operations ──────────────────────────

    fn handle_json(&mut self, id: ConnectionId, value: Value) {
        let Some(kind) = message_type(&value).map(str::to_string) else {
            return;
        };
        match kind.as_str() {
            "ready" => {
                let payload: ReadyPayload = parse_payload(&value).unwrap_or_default();
                let username = payload.username.unwrap_or_else(|| id.to_string());
                self.register_speaker(id, &username, payload.priority);
            }
            "offer" | "answer" | "ice-candidate" | "stop" => self.relay_signal(id, &kind, value),
            "kick-user" => self.handle_kick_user(id, value),
            "reorder-user" => self.handle_reorder_user(id, value),
            "move-user-to-position" => self.handle_move_user(id, value),
            "set-queue-sort-mode" => self.handle_set_sort_mode(id, value),
            "update-priority" => self.handle_update_priority(id, value),
            other => debug!("room {}: unrecognized signaling type {other}", self.room_code),
        }
    }

    /// Relays WebRTC signaling between a speaker and the listener, tagging
    /// the forwarded payload with the sender's display name.
    fn relay_signal(&self, id: ConnectionId, kind: &str, value: Value) {
        let Some(username) = self.display_name(id) else { return };
        let augmented = with_from_username(value, &username);
        let target = if Some(id) == self.listener { self.current_cts_key } else { self.listener };
        if let Some(target) = target {
            self.send_json(target, augmented);
        } else {
            debug!("room {}: no relay target for {kind} from {id}", self.room_code);
        }
    }

    fn find_client_by_username(&self, username: &str) -> Option<ConnectionId> {
        self.clients
            .iter()
            .find(|(_, c)| strip_key_suffix(&c.key) == username)
            .map(|(id, _)| *id)
    }

    fn require_instructor(&self, id: ConnectionId) -> bool {
        self.instructor_connections.contains(&id)
    }

    fn handle_kick_user(&mut self, id: ConnectionId, value: Value) {
        if !self.require_instructor(id) {
            self.send_json(id, error_msg("kick-error", "not authorized"));
            return;
        }
        let Some(payload) = parse_payload::<KickUserPayload>(&value) else {
            self.send_json(id, error_msg("kick-error", "malformed request"));
            return;
        };
        let Some(target) = self.find_client_by_username(&payload.username) else {
            self.send_json(id, error_msg("kick-error", "user not found"));
            return;
        };
        if Some(target) == self.current_cts_key || Some(target) == self.last_sender_key {
            if let Some(listener) = self.listener {
                self.send_json(listener, clear_msg());
            }
        }
        self.send_json(target, kicked_msg());
        self.send_to(target, OutboundMessage::Close);
        self.handle_closed(target);
    }

    fn handle_reorder_user(&mut self, id: ConnectionId, value: Value) {
        if !self.require_instructor(id) {
            self.send_json(id, error_msg("reorder-error", "not authorized"));
            return;
        }
        let Some(payload) = parse_payload::<ReorderUserPayload>(&value) else {
            self.send_json(id, error_msg("reorder-error", "malformed request"));
            return;
        };
        let Some(target) = self.find_client_by_username(&payload.username) else {
            self.send_json(id, error_msg("reorder-error", "user not found"));
            return;
        };
        let direction = match payload.direction.as_str() {
            "up" => super::queue::SwapDirection::Up,
            "down" => super::queue::SwapDirection::Down,
            _ => {
                self.send_json(id, error_msg("reorder-error", "invalid direction"));
                return;
            }
        };
        if self.queue.swap(target, direction) {
            self.record_manual_order();
            self.broadcast_queue_update();
        } else {
            self.send_json(id, error_msg("reorder-error", "cannot move further in that direction"));
        }
    }

    fn handle_move_user(&mut self, id: ConnectionId, value: Value) {
        if !self.require_instructor(id) {
            self.send_json(id, error_msg("move-error", "not authorized"));
            return;
        }
        let Some(payload) = parse_payload::<MoveUserToPositionPayload>(&value) else {
            self.send_json(id, error_msg("move-error", "malformed request"));
            return;
        };
        let Some(target) = self.find_client_by_username(&payload.username) else {
            self.send_json(id, error_msg("move-error", "user not found"));
            return;
        };
        if self.queue.move_to_position(target, payload.position) {
            self.record_manual_order();
            self.broadcast_queue_update();
        } else {
            self.send_json(id, error_msg("move-error", "invalid position"));
        }
    }

    fn handle_set_sort_mode(&mut self, id: ConnectionId, value: Value) {
        if !self.require_instructor(id) {
            return;
        }
        let Some(payload) = parse_payload::<SetQueueSortModePayload>(&value) else { return };
        self.sort_mode = match payload.mode.as_str() {
            "priority" => SortMode::Priority,
            _ => SortMode::Fifo,
        };
        self.resort_queue();
        self.broadcast_queue_update();
    }

    fn handle_update_priority(&mut self, id: ConnectionId, value: Value) {
        let Some(payload) = parse_payload::<UpdatePriorityPayload>(&value) else { return };
        if let Some(client) = self.clients.get_mut(&id) {
            client.priority = payload.priority.into();
        }
        if self.sort_mode == SortMode::Priority {
            self.resort_queue();
            self.broadcast_queue_update();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::connection::{outbound_channel, ConnectionIdAllocator};
    use crate::storage::InMemoryStorageSink;

    fn handler() -> (MessageHandler, ConnectionIdAllocator) {
        (
            MessageHandler::new("ABC123".into(), Arc::new(InMemoryStorageSink::new()), true),
            ConnectionIdAllocator::new(),
        )
    }

    fn connect(h: &mut MessageHandler, ids: &ConnectionIdAllocator) -> (ConnectionId, mpsc::UnboundedReceiver<OutboundMessage>) {
        let id = ids.next();
        let (tx, rx) = outbound_channel();
        h.handle_event(HandlerEvent::Connected { id, sender: tx });
        (id, rx)
    }

    fn drain_text(rx: &mut mpsc::UnboundedReceiver<OutboundMessage>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let OutboundMessage::Text(t) = msg {
                out.push(t);
            }
        }
        out
    }

    #[test]
    fn single_speaker_happy_path_grants_cts_immediately() {
        let (mut h, ids) = handler();
        let (listener, mut listener_rx) = connect(&mut h, &ids);
        h.handle_text(listener, "LISTEN");
        drain_text(&mut listener_rx);

        let (alice, mut alice_rx) = connect(&mut h, &ids);
        h.handle_text(alice, "RTSalice");

        let alice_msgs = drain_text(&mut alice_rx);
        assert!(alice_msgs.iter().any(|m| m.contains("\"cts\"")));

        let listener_msgs = drain_text(&mut listener_rx);
        assert!(listener_msgs.iter().any(|m| m.contains("\"clear\"")));
        assert!(listener_msgs.iter().any(|m| m.contains("alice")));
    }

    #[test]
    fn second_speaker_queues_behind_first_fifo() {
        let (mut h, ids) = handler();
        let (listener, _) = connect(&mut h, &ids);
        h.handle_text(listener, "LISTEN");

        let (alice, _) = connect(&mut h, &ids);
        h.handle_text(alice, "RTSalice");
        let (bob, mut bob_rx) = connect(&mut h, &ids);
        h.handle_text(bob, "RTSbob");

        // bob must not receive CTS while alice still holds it.
        assert!(!drain_text(&mut bob_rx).iter().any(|m| m.contains("\"cts\"")));

        h.handle_text(alice, "STOP");
        let bob_msgs = drain_text(&mut bob_rx);
        assert!(bob_msgs.iter().any(|m| m.contains("\"cts\"")));
    }

    #[test]
    fn listener_disconnect_mid_speech_restores_speaker_to_queue_head() {
        let (mut h, ids) = handler();
        let (listener, _) = connect(&mut h, &ids);
        h.handle_text(listener, "LISTEN");
        let (alice, mut alice_rx) = connect(&mut h, &ids);
        h.handle_text(alice, "RTSalice");
        drain_text(&mut alice_rx);

        h.handle_closed(listener);
        assert!(h.listener.is_none());
        assert!(h.current_cts_key.is_none());
        assert!(alice_rx.try_recv().is_ok_and(|m| matches!(m, OutboundMessage::Text(t) if t.contains("\"stop\""))));
        assert_eq!(h.queue.peek(), Some(alice));

        let (listener2, mut listener2_rx) = connect(&mut h, &ids);
        h.handle_text(listener2, "LISTEN");
        assert!(drain_text(&mut listener2_rx).iter().any(|m| m.contains("\"cts\"") || m.contains("alice")));
        assert_eq!(h.current_cts_key, Some(alice));
    }

    #[test]
    fn instructor_kick_removes_speaker_and_advances_queue() {
        let (mut h, ids) = handler();
        let (listener, _) = connect(&mut h, &ids);
        h.handle_text(listener, "LISTEN");
        let (alice, _) = connect(&mut h, &ids);
        h.handle_text(alice, "RTSalice");
        let (bob, mut bob_rx) = connect(&mut h, &ids);
        h.handle_text(bob, "RTSbob");

        h.handle_json(listener, serde_json::json!({"type": "kick-user", "username": "alice"}));
        let bob_msgs = drain_text(&mut bob_rx);
        assert!(bob_msgs.iter().any(|m| m.contains("\"cts\"")));
        assert!(!h.clients.contains_key(&alice));
    }

    #[test]
    fn non_instructor_kick_is_rejected() {
        let (mut h, ids) = handler();
        let (listener, _) = connect(&mut h, &ids);
        h.handle_text(listener, "LISTEN");
        let (alice, _) = connect(&mut h, &ids);
        h.handle_text(alice, "RTSalice");
        let (other, mut other_rx) = connect(&mut h, &ids);

        h.handle_json(other, serde_json::json!({"type": "kick-user", "username": "alice"}));
        let msgs = drain_text(&mut other_rx);
        assert!(msgs.iter().any(|m| m.contains("kick-error")));
        assert!(h.clients.contains_key(&alice));
    }

    #[test]
    fn sort_mode_toggle_preserves_manual_order() {
        let (mut h, ids) = handler();
        let (listener, _) = connect(&mut h, &ids);
        h.handle_text(listener, "LISTEN");
        let (alice, _) = connect(&mut h, &ids);
        h.handle_text(alice, "RTSalice");
        let (bob, _) = connect(&mut h, &ids);
        h.handle_text(bob, "RTSbob");
        let (carol, _) = connect(&mut h, &ids);
        h.handle_text(carol, "RTScarol");

        // Manually promote carol to the front (bob and carol are behind alice,
        // who holds CTS and is pinned at head).
        h.handle_json(listener, serde_json::json!({"type": "move-user-to-position", "username": "carol", "position": 0}));
        let order_before = h.queue.get_all();

        h.handle_json(listener, serde_json::json!({"type": "set-queue-sort-mode", "mode": "priority"}));
        h.handle_json(listener, serde_json::json!({"type": "set-queue-sort-mode", "mode": "fifo"}));

        assert_eq!(h.queue.get_all(), order_before);
    }

    #[test]
    fn audio_from_unregistered_sender_is_dropped() {
        let (mut h, ids) = handler();
        let (listener, mut listener_rx) = connect(&mut h, &ids);
        h.handle_text(listener, "LISTEN");
        let (stranger, _) = connect(&mut h, &ids);

        h.handle_audio(stranger, Bytes::from_static(b"noise"));
        assert!(drain_text(&mut listener_rx).is_empty());
    }
}
