use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use tagrush_core::net::messages::{InputMsg, ReturnToLobbyMsg, ServerMessage};
use tagrush_core::net::protocol::encode_server_message;
use tagrush_core::player::{PlayerId, sanitize_display_name};
use tagrush_core::room::{
    MIN_PLAYERS, Room, RoomError, RoomSettings, RoomSnapshot, RoomStatus, generate_room_code,
    is_valid_room_code, normalize_room_code,
};
use tagrush_sim::arena::ArenaCatalog;
use tagrush_sim::config::TagConfig;

use crate::game_loop::{GameBroadcast, GameCommand, GameSessionConfig, spawn_game_session};
use crate::state::SharedRoomManager;

/// Per-player sender for outbound WebSocket binary messages.
/// Bounded to prevent memory exhaustion from slow clients.
/// Uses `Bytes` for zero-copy cloning when broadcasting to multiple players.
pub type PlayerSender = mpsc::Sender<Bytes>;

/// Shared between the registry and a room's broadcast forwarder so departed
/// players stop receiving frames immediately.
type SenderMap = Arc<Mutex<HashMap<PlayerId, PlayerSender>>>;

fn lock(senders: &SenderMap) -> MutexGuard<'_, HashMap<PlayerId, PlayerSender>> {
    senders.lock().unwrap_or_else(|e| e.into_inner())
}

/// A running countdown/round/results task for one room.
struct ActiveSession {
    /// Distinguishes this session from later ones in a room with the same code.
    epoch: u64,
    command_tx: mpsc::UnboundedSender<GameCommand>,
    game_task: JoinHandle<()>,
    forward_task: JoinHandle<()>,
}

impl ActiveSession {
    /// Idempotent: safe on an already finished session.
    fn stop(self) {
        let _ = self.command_tx.send(GameCommand::Stop);
        self.game_task.abort();
        self.forward_task.abort();
    }
}

struct RoomEntry {
    room: Room,
    senders: SenderMap,
    session: Option<ActiveSession>,
}

/// What a departure did to the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub room_code: String,
    pub destroyed: bool,
    pub new_host: Option<PlayerId>,
    /// Room after the departure, `None` when destroyed.
    pub room: Option<RoomSnapshot>,
}

/// Owns every live room and which room each player is in.
pub struct RoomManager {
    rooms: HashMap<String, RoomEntry>,
    memberships: HashMap<PlayerId, String>,
    next_player_id: PlayerId,
    next_epoch: u64,
    arenas: Arc<ArenaCatalog>,
    tag_config: Arc<TagConfig>,
    results_delay: Duration,
}

impl RoomManager {
    pub fn new(arenas: Arc<ArenaCatalog>, tag_config: Arc<TagConfig>, results_delay: Duration) -> Self {
        Self {
            rooms: HashMap::new(),
            memberships: HashMap::new(),
            next_player_id: 1,
            next_epoch: 1,
            arenas,
            tag_config,
            results_delay,
        }
    }

    /// Identity for a new connection.
    pub fn alloc_player_id(&mut self) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;
        id
    }

    pub fn room_of(&self, player_id: PlayerId) -> Option<&str> {
        self.memberships.get(&player_id).map(String::as_str)
    }

    /// Create a room with the caller as host and sole member.
    pub fn create_room(
        &mut self,
        player_id: PlayerId,
        player_name: &str,
        arena_index: Option<u8>,
        round_duration_secs: Option<u16>,
        sender: PlayerSender,
    ) -> Result<RoomSnapshot, RoomError> {
        if self.memberships.contains_key(&player_id) {
            return Err(RoomError::AlreadyInRoom);
        }
        let name = sanitize_display_name(player_name).ok_or(RoomError::InvalidName)?;
        let settings = RoomSettings::default().with_overrides(
            arena_index,
            round_duration_secs,
            self.arenas.len(),
        )?;

        let code = generate_unique_room_code(&self.rooms);
        let room = Room::new(code.clone(), player_id, name, settings);
        let snapshot = room.snapshot();
        let senders: SenderMap = Arc::new(Mutex::new(HashMap::from([(player_id, sender)])));
        self.rooms.insert(
            code.clone(),
            RoomEntry {
                room,
                senders,
                session: None,
            },
        );
        self.memberships.insert(player_id, code.clone());
        tracing::info!(room = %code, player_id, "Room created");
        Ok(snapshot)
    }

    /// Add the caller to an existing lobby.
    pub fn join_room(
        &mut self,
        room_code: &str,
        player_id: PlayerId,
        player_name: &str,
        sender: PlayerSender,
    ) -> Result<RoomSnapshot, RoomError> {
        if self.memberships.contains_key(&player_id) {
            return Err(RoomError::AlreadyInRoom);
        }
        let name = sanitize_display_name(player_name).ok_or(RoomError::InvalidName)?;
        let code = normalize_room_code(room_code);
        if !is_valid_room_code(&code) {
            return Err(RoomError::InvalidRoomCode);
        }
        let entry = self.rooms.get_mut(&code).ok_or(RoomError::RoomNotFound)?;
        let slot = entry.room.add_player(player_id, name)?.slot;
        lock(&entry.senders).insert(player_id, sender);
        self.memberships.insert(player_id, code.clone());
        tracing::info!(room = %code, player_id, slot, "Player joined");
        Ok(entry.room.snapshot())
    }

    /// Remove the caller from their room. Destroys the room, stopping its
    /// session, when nobody is left. `None` if the caller was in no room.
    pub fn leave_room(&mut self, player_id: PlayerId) -> Option<LeaveOutcome> {
        let code = self.memberships.remove(&player_id)?;
        let entry = self.rooms.get_mut(&code)?;

        let departure = entry.room.remove_player(player_id);
        lock(&entry.senders).remove(&player_id);
        if let Some(session) = &entry.session
            && let Err(e) = session.command_tx.send(GameCommand::PlayerLeft { player_id })
        {
            tracing::debug!(player_id, room = %code, error = %e, "Game session gone");
        }

        if entry.room.is_empty() {
            if let Some(entry) = self.rooms.remove(&code)
                && let Some(session) = entry.session
            {
                session.stop();
            }
            tracing::info!(room = %code, "Room destroyed");
            return Some(LeaveOutcome {
                room_code: code,
                destroyed: true,
                new_host: None,
                room: None,
            });
        }

        let new_host = departure.and_then(|d| d.new_host);
        if let Some(host) = new_host {
            tracing::info!(room = %code, new_host = host, "Host migrated");
        }
        Some(LeaveOutcome {
            room: Some(entry.room.snapshot()),
            room_code: code,
            destroyed: false,
            new_host,
        })
    }

    /// Begin the countdown. Host-only, lobby-only, needs two members.
    pub fn start_game(
        &mut self,
        player_id: PlayerId,
        rooms: SharedRoomManager,
    ) -> Result<(), RoomError> {
        let code = self
            .memberships
            .get(&player_id)
            .cloned()
            .ok_or(RoomError::NotInRoom)?;
        let entry = self.rooms.get_mut(&code).ok_or(RoomError::RoomNotFound)?;
        if entry.room.host_id != player_id {
            return Err(RoomError::NotHost);
        }
        if entry.room.status != RoomStatus::Lobby {
            return Err(RoomError::NotInLobby);
        }
        if entry.room.players.len() < MIN_PLAYERS {
            return Err(RoomError::NotEnoughPlayers);
        }
        let arena_index = entry.room.settings.arena_index;
        let arena = self.arenas.get(arena_index).ok_or_else(|| {
            RoomError::InvalidSettings(format!("arena index {arena_index} out of range"))
        })?;

        let epoch = self.next_epoch;
        self.next_epoch += 1;

        let config = GameSessionConfig {
            room_code: code.clone(),
            arena_index,
            arena,
            tag_config: Arc::clone(&self.tag_config),
            round_duration_secs: entry.room.settings.round_duration_secs,
            members: entry.room.players.clone(),
            results_delay: self.results_delay,
            seed: rand::rng().random(),
        };
        let (command_tx, broadcast_rx, game_task) = spawn_game_session(config);

        let senders = Arc::clone(&entry.senders);
        let room_code = code.clone();
        let forward_task = tokio::spawn(async move {
            forward_broadcasts(broadcast_rx, senders, &room_code, epoch, &rooms).await;
        });

        entry.session = Some(ActiveSession {
            epoch,
            command_tx,
            game_task,
            forward_task,
        });
        entry.room.set_status(RoomStatus::Countdown);
        tracing::info!(room = %code, epoch, players = entry.room.players.len(), "Countdown started");
        Ok(())
    }

    /// Update lobby settings. Host-only, lobby-only.
    pub fn change_settings(
        &mut self,
        player_id: PlayerId,
        arena_index: Option<u8>,
        round_duration_secs: Option<u16>,
    ) -> Result<(String, RoomSettings), RoomError> {
        let code = self.memberships.get(&player_id).ok_or(RoomError::NotInRoom)?;
        let entry = self.rooms.get_mut(code).ok_or(RoomError::RoomNotFound)?;
        if entry.room.host_id != player_id {
            return Err(RoomError::NotHost);
        }
        if entry.room.status != RoomStatus::Lobby {
            return Err(RoomError::NotInLobby);
        }
        entry.room.settings = entry.room.settings.with_overrides(
            arena_index,
            round_duration_secs,
            self.arenas.len(),
        )?;
        Ok((code.clone(), entry.room.settings))
    }

    /// Forward held keys to the caller's round. Dropped unless playing.
    pub fn route_input(&self, player_id: PlayerId, input: InputMsg) {
        let Some(code) = self.memberships.get(&player_id) else {
            return;
        };
        if let Some(entry) = self.rooms.get(code)
            && entry.room.status == RoomStatus::Playing
            && let Some(session) = &entry.session
            && let Err(e) = session
                .command_tx
                .send(GameCommand::PlayerInput { player_id, input })
        {
            tracing::debug!(player_id, room = %code, error = %e, "Game session gone");
        }
    }

    /// Record a status reported by the room's session, if still current.
    pub fn set_session_status(&mut self, room_code: &str, epoch: u64, status: RoomStatus) -> bool {
        let Some(entry) = self.rooms.get_mut(room_code) else {
            return false;
        };
        if entry.session.as_ref().map(|s| s.epoch) != Some(epoch) {
            return false;
        }
        let moved = entry.room.set_status(status);
        if !moved {
            tracing::warn!(
                room = room_code,
                from = ?entry.room.status,
                to = ?status,
                "Invalid room status transition"
            );
        }
        moved
    }

    /// Drop a finished session and put the room back in the lobby. Returns
    /// the lobby snapshot, or `None` when the room is gone or has moved on
    /// to a newer session.
    pub fn finish_session(&mut self, room_code: &str, epoch: u64) -> Option<RoomSnapshot> {
        let entry = self.rooms.get_mut(room_code)?;
        if entry.session.as_ref().map(|s| s.epoch) != Some(epoch) {
            return None;
        }
        entry.session = None;
        if !entry.room.set_status(RoomStatus::Lobby) {
            tracing::debug!(room = room_code, from = ?entry.room.status, "Forcing room back to lobby");
            entry.room.status = RoomStatus::Lobby;
        }
        tracing::info!(room = room_code, "Returned to lobby");
        Some(entry.room.snapshot())
    }

    pub fn snapshot(&self, room_code: &str) -> Option<RoomSnapshot> {
        self.rooms.get(room_code).map(|e| e.room.snapshot())
    }

    pub fn room_status(&self, room_code: &str) -> Option<RoomStatus> {
        self.rooms.get(room_code).map(|e| e.room.status)
    }

    pub fn room_exists(&self, room_code: &str) -> bool {
        self.rooms.contains_key(room_code)
    }

    /// Send a raw binary message to a specific player.
    pub fn send_to_player(&self, player_id: PlayerId, data: Bytes) {
        let Some(code) = self.memberships.get(&player_id) else {
            return;
        };
        if let Some(entry) = self.rooms.get(code)
            && let Some(sender) = lock(&entry.senders).get(&player_id)
            && let Err(e) = sender.try_send(data)
        {
            tracing::debug!(
                player_id, room = %code, error = %e,
                "Failed to send to player (slow or disconnected)"
            );
        }
    }

    /// Broadcast raw binary data to all players in a room, optionally
    /// skipping one.
    pub fn broadcast_to_room(&self, room_code: &str, data: &[u8], except: Option<PlayerId>) {
        if let Some(entry) = self.rooms.get(room_code) {
            fan_out(&entry.senders, room_code, Bytes::copy_from_slice(data), except);
        }
    }

    /// Encode and broadcast a message to a room.
    pub fn broadcast_message(&self, room_code: &str, msg: &ServerMessage, except: Option<PlayerId>) {
        match encode_server_message(msg) {
            Ok(data) => self.broadcast_to_room(room_code, &data, except),
            Err(e) => tracing::error!(room = room_code, error = %e, "Failed to encode broadcast"),
        }
    }

    /// (active rooms, total members)
    pub fn stats(&self) -> (usize, usize) {
        let members = self.rooms.values().map(|e| e.room.players.len()).sum();
        (self.rooms.len(), members)
    }

    pub fn arena_count(&self) -> usize {
        self.arenas.len()
    }
}

fn fan_out(senders: &SenderMap, room_code: &str, data: Bytes, except: Option<PlayerId>) {
    let targets: Vec<(PlayerId, PlayerSender)> = lock(senders)
        .iter()
        .filter(|(id, _)| Some(**id) != except)
        .map(|(&id, s)| (id, s.clone()))
        .collect();
    for (player_id, sender) in targets {
        if let Err(e) = sender.try_send(data.clone()) {
            tracing::debug!(
                player_id, room = room_code, error = %e,
                "Skipping broadcast to slow client"
            );
        }
    }
}

/// Relay a session's output to the room's players and apply its status
/// changes. When the session finishes, return the room to the lobby if it
/// still exists and still belongs to this session.
async fn forward_broadcasts(
    mut broadcast_rx: mpsc::UnboundedReceiver<GameBroadcast>,
    senders: SenderMap,
    room_code: &str,
    epoch: u64,
    rooms: &SharedRoomManager,
) {
    while let Some(broadcast) = broadcast_rx.recv().await {
        match broadcast {
            GameBroadcast::EncodedMessage(data) => fan_out(&senders, room_code, data, None),
            GameBroadcast::StatusChanged(status) => {
                rooms.write().await.set_session_status(room_code, epoch, status);
            },
            GameBroadcast::Finished => break,
        }
    }

    let mut mgr = rooms.write().await;
    if let Some(room) = mgr.finish_session(room_code, epoch) {
        mgr.broadcast_message(room_code, &ServerMessage::ReturnToLobby(ReturnToLobbyMsg { room }), None);
    } else {
        tracing::debug!(room = room_code, epoch, "Stale session finished, nothing to do");
    }
}

/// Generate a unique room code, retrying on collision with existing rooms.
fn generate_unique_room_code(existing: &HashMap<String, RoomEntry>) -> String {
    loop {
        let code = generate_room_code();
        if !existing.contains_key(&code) {
            return code;
        }
    }
}
