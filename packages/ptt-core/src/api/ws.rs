//! WebSocket transport adapter for the `/{code}` room endpoint.
//!
//! This layer never touches room state directly - it validates the code,
//! looks the room up, and then just ferries frames and close notifications
//! between the socket and the room's actor over its event channel.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::sink::SinkExt;
use futures::stream::StreamExt;

use crate::api::AppState;
use crate::room::connection::outbound_channel;
use crate::room::{HandlerEvent, OutboundMessage};
use crate::utils::is_valid_room_code;

/// WebSocket upgrade handler for `/{code}`.
pub async fn ws_handler(
    Path(code): Path<String>,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state, code))
}

/// Sends a rejection string and closes, per the external interface's
/// behavior for invalid or unknown room codes.
async fn reject(mut socket: WebSocket, reason: &str) {
    let _ = socket.send(Message::Text(reason.to_string().into())).await;
    let _ = socket.close().await;
}

async fn handle_ws(socket: WebSocket, state: AppState, code: String) {
    if !is_valid_room_code(&code) {
        reject(socket, "invalid room code").await;
        return;
    }
    if state.registry.lookup(&code).is_err() {
        reject(socket, "unknown or expired room").await;
        return;
    }

    let (tx, mut rx) = outbound_channel();
    let Some(id) = state.registry.connect(&code, tx) else {
        reject(socket, "unknown or expired room").await;
        return;
    };

    let (mut sink, mut stream) = socket.split();

    if sink.send(Message::Text("Hello from WebSocket!".to_string().into())).await.is_err() {
        state.registry.dispatch(&code, HandlerEvent::Closed { id });
        return;
    }

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let outcome = match message {
                OutboundMessage::Text(text) => sink.send(Message::Text(text.into())).await,
                OutboundMessage::Binary(data) => sink.send(Message::Binary(data)).await,
                OutboundMessage::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            };
            if outcome.is_err() {
                break;
            }
        }
    });

    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                state.registry.dispatch(&code, HandlerEvent::Text { id, text: text.to_string() });
            }
            Some(Ok(Message::Binary(data))) => {
                state.registry.dispatch(&code, HandlerEvent::Binary { id, data });
            }
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
            _ => {}
        }
    }

    state.registry.dispatch(&code, HandlerEvent::Closed { id });
    writer.abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_lowercase_codes_before_touching_the_registry() {
        assert!(!is_valid_room_code("abc123"));
    }
}
