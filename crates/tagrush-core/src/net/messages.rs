use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::player::PlayerId;
use crate::room::RoomSnapshot;

/// Network message type discriminator (first byte of every frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    CreateRoom = 0x01,
    JoinRoom = 0x02,
    LeaveRoom = 0x03,
    Input = 0x04,
    StartGame = 0x05,
    ChangeSettings = 0x06,

    // Server -> Client (lobby)
    RoomJoined = 0x10,
    Error = 0x11,
    PlayerJoined = 0x12,
    PlayerLeft = 0x13,
    SettingsChanged = 0x14,

    // Server -> Client (round)
    Countdown = 0x20,
    GameStart = 0x21,
    GameState = 0x22,
    Tagged = 0x23,
    GameEnd = 0x24,
    ReturnToLobby = 0x25,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::CreateRoom),
            0x02 => Some(Self::JoinRoom),
            0x03 => Some(Self::LeaveRoom),
            0x04 => Some(Self::Input),
            0x05 => Some(Self::StartGame),
            0x06 => Some(Self::ChangeSettings),
            0x10 => Some(Self::RoomJoined),
            0x11 => Some(Self::Error),
            0x12 => Some(Self::PlayerJoined),
            0x13 => Some(Self::PlayerLeft),
            0x14 => Some(Self::SettingsChanged),
            0x20 => Some(Self::Countdown),
            0x21 => Some(Self::GameStart),
            0x22 => Some(Self::GameState),
            0x23 => Some(Self::Tagged),
            0x24 => Some(Self::GameEnd),
            0x25 => Some(Self::ReturnToLobby),
            _ => None,
        }
    }

    /// Frames only the server may emit.
    pub fn is_server_only(self) -> bool {
        (self as u8) >= 0x10
    }
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomMsg {
    pub player_name: String,
    pub arena_index: Option<u8>,
    pub round_duration_secs: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomMsg {
    pub room_code: String,
    pub player_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRoomMsg {}

/// Held-key state. Overwrites the previous state wholesale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMsg {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartGameMsg {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSettingsMsg {
    pub arena_index: Option<u8>,
    pub round_duration_secs: Option<u16>,
}

/// All client-to-server messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    CreateRoom(CreateRoomMsg),
    JoinRoom(JoinRoomMsg),
    LeaveRoom(LeaveRoomMsg),
    Input(InputMsg),
    StartGame(StartGameMsg),
    ChangeSettings(ChangeSettingsMsg),
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Reply to a successful create or join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomJoinedMsg {
    pub player_id: PlayerId,
    pub room: RoomSnapshot,
}

/// Reply to a rejected request. Sent to the requester only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMsg {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerJoinedMsg {
    pub player_id: PlayerId,
    pub room: RoomSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLeftMsg {
    pub player_id: PlayerId,
    pub room: RoomSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsChangedMsg {
    pub arena_index: u8,
    pub round_duration_secs: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownMsg {
    pub value: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStartMsg {
    pub arena_index: u8,
    pub round_duration_secs: u16,
    pub it_player_id: PlayerId,
}

/// Per-player entry of a state snapshot. Positions carry one decimal,
/// velocities are whole numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub x: f32,
    pub y: f32,
    pub vx: i32,
    pub vy: i32,
    pub on_ground: bool,
    pub facing_right: bool,
    pub is_it: bool,
    pub tag_cooldown: u16,
    pub times_tagged: u32,
    pub slot: u8,
}

/// Full per-tick room state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateMsg {
    pub tick: u64,
    /// Whole seconds left in the round.
    pub timer: u16,
    pub it_player_id: Option<PlayerId>,
    pub players: BTreeMap<PlayerId, PlayerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedMsg {
    pub old_it_id: PlayerId,
    pub new_it_id: PlayerId,
    pub new_it_name: String,
}

/// Why a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Timeout,
    NotEnoughPlayers,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerResult {
    pub player_id: PlayerId,
    pub name: String,
    /// Whether this player was "it" when the round ended.
    pub is_it: bool,
    pub times_tagged: u32,
    pub won: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEndMsg {
    pub reason: EndReason,
    /// Winners first.
    pub results: Vec<PlayerResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnToLobbyMsg {
    pub room: RoomSnapshot,
}

/// All server-to-client messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    RoomJoined(RoomJoinedMsg),
    Error(ErrorMsg),
    PlayerJoined(PlayerJoinedMsg),
    PlayerLeft(PlayerLeftMsg),
    SettingsChanged(SettingsChangedMsg),
    Countdown(CountdownMsg),
    GameStart(GameStartMsg),
    GameState(GameStateMsg),
    Tagged(TaggedMsg),
    GameEnd(GameEndMsg),
    ReturnToLobby(ReturnToLobbyMsg),
}
