use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use tagrush_core::net::messages::{
    ClientMessage, ErrorMsg, PlayerJoinedMsg, PlayerLeftMsg, RoomJoinedMsg, ServerMessage,
    SettingsChangedMsg,
};
use tagrush_core::net::protocol::{
    MAX_MESSAGE_SIZE, decode_client_message, decode_message_type, encode_server_message,
};
use tagrush_core::player::PlayerId;
use tagrush_core::room::RoomError;

use crate::room_manager::PlayerSender;
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (ws_sender, mut ws_receiver) = socket.split();

    let player_id = state.rooms.write().await.alloc_player_id();
    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);
    spawn_writer(ws_sender, rx);
    tracing::debug!(player_id, "Connection opened");

    read_loop(&mut ws_receiver, &state, player_id, &tx).await;

    // Disconnect counts as leaving.
    leave(&state, player_id).await;
    tracing::info!(player_id, "Player disconnected");
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender.send(Message::Binary(data)).await.is_err() {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    player_id: PlayerId,
    tx: &PlayerSender,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(player_id, "Rate limited");
            continue;
        }
        if data.is_empty() || data.len() > MAX_MESSAGE_SIZE {
            continue;
        }

        // Server-authoritative: clients may not send server frames.
        match decode_message_type(&data) {
            Ok(t) if t.is_server_only() => {
                tracing::warn!(player_id, msg_type = ?t, "Rejected server-only message from client");
                continue;
            },
            Ok(_) => {},
            Err(e) => {
                tracing::warn!(player_id, error = %e, "Undecodable frame");
                continue;
            },
        }
        let msg = match decode_client_message(&data) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(player_id, error = %e, "Malformed client message");
                continue;
            },
        };

        handle_client_message(state, player_id, tx, msg).await;
    }
}

async fn handle_client_message(
    state: &AppState,
    player_id: PlayerId,
    tx: &PlayerSender,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::CreateRoom(req) => {
            let mut rooms = state.rooms.write().await;
            match rooms.create_room(
                player_id,
                &req.player_name,
                req.arena_index,
                req.round_duration_secs,
                tx.clone(),
            ) {
                Ok(room) => {
                    send_direct(tx, &ServerMessage::RoomJoined(RoomJoinedMsg { player_id, room }));
                },
                Err(e) => reject(tx, player_id, "create_room", &e),
            }
        },
        ClientMessage::JoinRoom(req) => {
            let mut rooms = state.rooms.write().await;
            match rooms.join_room(&req.room_code, player_id, &req.player_name, tx.clone()) {
                Ok(room) => {
                    let code = room.code.clone();
                    send_direct(
                        tx,
                        &ServerMessage::RoomJoined(RoomJoinedMsg {
                            player_id,
                            room: room.clone(),
                        }),
                    );
                    rooms.broadcast_message(
                        &code,
                        &ServerMessage::PlayerJoined(PlayerJoinedMsg { player_id, room }),
                        Some(player_id),
                    );
                },
                Err(e) => reject(tx, player_id, "join_room", &e),
            }
        },
        ClientMessage::LeaveRoom(_) => {
            if !leave(state, player_id).await {
                reject(tx, player_id, "leave_room", &RoomError::NotInRoom);
            }
        },
        ClientMessage::StartGame(_) => {
            let mut rooms = state.rooms.write().await;
            if let Err(e) = rooms.start_game(player_id, Arc::clone(&state.rooms)) {
                reject(tx, player_id, "start_game", &e);
            }
        },
        ClientMessage::ChangeSettings(req) => {
            let mut rooms = state.rooms.write().await;
            match rooms.change_settings(player_id, req.arena_index, req.round_duration_secs) {
                Ok((code, settings)) => {
                    rooms.broadcast_message(
                        &code,
                        &ServerMessage::SettingsChanged(SettingsChangedMsg {
                            arena_index: settings.arena_index,
                            round_duration_secs: settings.round_duration_secs,
                        }),
                        None,
                    );
                },
                Err(e) => reject(tx, player_id, "change_settings", &e),
            }
        },
        ClientMessage::Input(input) => {
            state.rooms.read().await.route_input(player_id, input);
        },
    }
}

/// Run the registry leave handling and tell whoever remains. Returns whether
/// the player was in a room.
async fn leave(state: &AppState, player_id: PlayerId) -> bool {
    let mut rooms = state.rooms.write().await;
    let Some(outcome) = rooms.leave_room(player_id) else {
        return false;
    };
    tracing::info!(player_id, room = %outcome.room_code, "Player left room");
    if let Some(room) = outcome.room {
        rooms.broadcast_message(
            &outcome.room_code,
            &ServerMessage::PlayerLeft(PlayerLeftMsg { player_id, room }),
            None,
        );
    }
    true
}

fn reject(tx: &PlayerSender, player_id: PlayerId, action: &'static str, err: &RoomError) {
    tracing::warn!(player_id, action, error = %err, "Request rejected");
    send_direct(
        tx,
        &ServerMessage::Error(ErrorMsg {
            message: err.to_string(),
        }),
    );
}

/// Send to this connection only, whether or not it belongs to a room.
fn send_direct(tx: &PlayerSender, msg: &ServerMessage) {
    match encode_server_message(msg) {
        Ok(data) => {
            if let Err(e) = tx.try_send(Bytes::from(data)) {
                tracing::debug!(error = %e, "Failed to queue reply");
            }
        },
        Err(e) => tracing::error!(error = %e, "Failed to encode reply"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn rate_limiter_drops_burst_then_refills() {
        let mut limiter = RateLimiter::new(3.0, 3.0);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());

        tokio::time::advance(Duration::from_millis(400)).await;
        assert!(limiter.allow());
        assert!(!limiter.allow());

        tokio::time::advance(Duration::from_secs(10)).await;
        for _ in 0..3 {
            assert!(limiter.allow());
        }
        assert!(!limiter.allow());
    }

    #[test]
    fn reject_sends_error_text() {
        let (tx, mut rx) = mpsc::channel(4);
        reject(&tx, 1, "join_room", &RoomError::RoomFull);
        let data = rx.try_recv().unwrap();
        let msg = tagrush_core::net::protocol::decode_server_message(&data).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Error(ErrorMsg {
                message: "Room is full".to_string()
            })
        );
    }
}
