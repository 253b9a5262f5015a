use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::player::{Player, PlayerId};

/// Hard cap on room membership.
pub const MAX_PLAYERS: usize = 4;
/// Members required to start a round and to keep one running.
pub const MIN_PLAYERS: usize = 2;
/// Length of a room code.
pub const ROOM_CODE_LEN: usize = 4;
/// Unambiguous uppercase alphabet (no I, O, 0, 1).
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const DEFAULT_ROUND_SECS: u16 = 90;
pub const MIN_ROUND_SECS: u16 = 30;
pub const MAX_ROUND_SECS: u16 = 300;

/// Reasons a room request is refused. Rejections never mutate state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Already in a room")]
    AlreadyInRoom,
    #[error("Not in a room")]
    NotInRoom,
    #[error("Room not found")]
    RoomNotFound,
    #[error("Room is full")]
    RoomFull,
    #[error("Game already in progress")]
    NotInLobby,
    #[error("Only the host can do that")]
    NotHost,
    #[error("Need at least {MIN_PLAYERS} players")]
    NotEnoughPlayers,
    #[error("Invalid player name")]
    InvalidName,
    #[error("Invalid room code")]
    InvalidRoomCode,
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

/// Lifecycle status of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Lobby,
    Countdown,
    Playing,
    Ended,
}

impl RoomStatus {
    /// Whether `self -> next` is a legal lifecycle step.
    /// `Countdown -> Lobby` covers a countdown cancelled by departures.
    pub fn can_transition_to(self, next: RoomStatus) -> bool {
        matches!(
            (self, next),
            (RoomStatus::Lobby, RoomStatus::Countdown)
                | (RoomStatus::Countdown, RoomStatus::Playing)
                | (RoomStatus::Countdown, RoomStatus::Lobby)
                | (RoomStatus::Playing, RoomStatus::Ended)
                | (RoomStatus::Ended, RoomStatus::Lobby)
        )
    }
}

/// Host-adjustable round settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    pub arena_index: u8,
    pub round_duration_secs: u16,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            arena_index: 0,
            round_duration_secs: DEFAULT_ROUND_SECS,
        }
    }
}

impl RoomSettings {
    /// Apply optional overrides, bounds-checking each against `arena_count`.
    pub fn with_overrides(
        self,
        arena_index: Option<u8>,
        round_duration_secs: Option<u16>,
        arena_count: usize,
    ) -> Result<Self, RoomError> {
        let mut next = self;
        if let Some(idx) = arena_index {
            if idx as usize >= arena_count {
                return Err(RoomError::InvalidSettings(format!(
                    "arena index {idx} out of range"
                )));
            }
            next.arena_index = idx;
        }
        if let Some(secs) = round_duration_secs {
            if !(MIN_ROUND_SECS..=MAX_ROUND_SECS).contains(&secs) {
                return Err(RoomError::InvalidSettings(format!(
                    "round duration must be {MIN_ROUND_SECS}-{MAX_ROUND_SECS}s"
                )));
            }
            next.round_duration_secs = secs;
        }
        Ok(next)
    }
}

/// Serializable view of a room for lobby broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub code: String,
    pub host_id: PlayerId,
    pub status: RoomStatus,
    pub settings: RoomSettings,
    pub players: Vec<Player>,
}

/// What changed when a member left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub player: Player,
    /// Set when the departing member was host and someone remains.
    pub new_host: Option<PlayerId>,
}

/// Membership and lifecycle bookkeeping for one room. Members are kept in
/// join order, which is the order every per-tick scan uses.
#[derive(Debug, Clone)]
pub struct Room {
    pub code: String,
    pub host_id: PlayerId,
    pub status: RoomStatus,
    pub settings: RoomSettings,
    pub players: Vec<Player>,
}

impl Room {
    /// Create a room seeded with its host as sole member.
    pub fn new(code: String, host_id: PlayerId, host_name: String, settings: RoomSettings) -> Self {
        let mut host = Player::new(host_id, host_name, 0);
        host.is_host = true;
        Self {
            code,
            host_id,
            status: RoomStatus::Lobby,
            settings,
            players: vec![host],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    /// Lowest slot not held by a current member.
    fn next_free_slot(&self) -> Option<u8> {
        (0..MAX_PLAYERS as u8).find(|slot| self.players.iter().all(|p| p.slot != *slot))
    }

    /// Add a member. Only allowed in the lobby and below capacity.
    pub fn add_player(&mut self, id: PlayerId, display_name: String) -> Result<&Player, RoomError> {
        if self.status != RoomStatus::Lobby {
            return Err(RoomError::NotInLobby);
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(RoomError::RoomFull);
        }
        let slot = self.next_free_slot().ok_or(RoomError::RoomFull)?;
        self.players.push(Player::new(id, display_name, slot));
        Ok(&self.players[self.players.len() - 1])
    }

    /// Remove a member, migrating host to the earliest remaining member.
    pub fn remove_player(&mut self, player_id: PlayerId) -> Option<Departure> {
        let idx = self.players.iter().position(|p| p.id == player_id)?;
        let player = self.players.remove(idx);

        let mut new_host = None;
        if self.host_id == player_id
            && let Some(first) = self.players.first()
        {
            self.host_id = first.id;
            new_host = Some(first.id);
            for p in &mut self.players {
                p.is_host = p.id == self.host_id;
            }
        }
        Some(Departure { player, new_host })
    }

    /// Move to `next` if the lifecycle allows it. Returns whether it moved.
    pub fn set_status(&mut self, next: RoomStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            code: self.code.clone(),
            host_id: self.host_id,
            status: self.status,
            settings: self.settings,
            players: self.players.clone(),
        }
    }
}

/// Generate a random room code such as `K7QZ`.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Case-normalize a user-supplied room code.
pub fn normalize_room_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Check a normalized code against the room code alphabet and length.
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room_with(n: usize) -> Room {
        let mut room = Room::new("ABCD".into(), 1, "Host".into(), RoomSettings::default());
        for i in 1..n {
            room.add_player(i as PlayerId + 1, format!("P{}", i + 1))
                .unwrap();
        }
        room
    }

    #[test]
    fn new_room_has_host_as_sole_member() {
        let room = room_with(1);
        assert_eq!(room.players.len(), 1);
        assert_eq!(room.host_id, 1);
        assert!(room.players[0].is_host);
        assert_eq!(room.players[0].slot, 0);
        assert_eq!(room.status, RoomStatus::Lobby);
    }

    #[test]
    fn slots_are_dense_in_join_order() {
        let room = room_with(4);
        let slots: Vec<u8> = room.players.iter().map(|p| p.slot).collect();
        assert_eq!(slots, vec![0, 1, 2, 3]);
    }

    #[test]
    fn fifth_member_rejected() {
        let mut room = room_with(4);
        assert_eq!(room.add_player(99, "Extra".into()), Err(RoomError::RoomFull));
        assert_eq!(room.players.len(), 4);
    }

    #[test]
    fn join_outside_lobby_rejected() {
        let mut room = room_with(2);
        assert!(room.set_status(RoomStatus::Countdown));
        assert_eq!(room.add_player(9, "Late".into()), Err(RoomError::NotInLobby));
    }

    #[test]
    fn freed_slot_is_reused_in_lobby() {
        let mut room = room_with(3);
        room.remove_player(2);
        let p = room.add_player(10, "New".into()).unwrap();
        assert_eq!(p.slot, 1);
    }

    #[test]
    fn host_leaving_migrates_to_earliest_member() {
        let mut room = room_with(3);
        let departure = room.remove_player(1).unwrap();
        assert_eq!(departure.new_host, Some(2));
        assert_eq!(room.host_id, 2);
        assert!(room.players[0].is_host);
        assert!(!room.players[1].is_host);
    }

    #[test]
    fn non_host_leaving_keeps_host() {
        let mut room = room_with(3);
        let departure = room.remove_player(3).unwrap();
        assert_eq!(departure.new_host, None);
        assert_eq!(room.host_id, 1);
    }

    #[test]
    fn last_member_leaving_empties_room() {
        let mut room = room_with(1);
        let departure = room.remove_player(1).unwrap();
        assert!(departure.new_host.is_none());
        assert!(room.is_empty());
        assert!(room.remove_player(1).is_none());
    }

    #[test]
    fn lifecycle_transitions() {
        let mut room = room_with(2);
        assert!(!room.set_status(RoomStatus::Playing));
        assert!(room.set_status(RoomStatus::Countdown));
        assert!(room.set_status(RoomStatus::Playing));
        assert!(!room.set_status(RoomStatus::Lobby));
        assert!(room.set_status(RoomStatus::Ended));
        assert!(room.set_status(RoomStatus::Lobby));
        assert_eq!(room.status, RoomStatus::Lobby);
    }

    #[test]
    fn settings_overrides_are_bounds_checked() {
        let base = RoomSettings::default();
        let ok = base.with_overrides(Some(2), Some(60), 3).unwrap();
        assert_eq!(ok.arena_index, 2);
        assert_eq!(ok.round_duration_secs, 60);

        assert!(base.with_overrides(Some(3), None, 3).is_err());
        assert!(base.with_overrides(None, Some(MIN_ROUND_SECS - 1), 3).is_err());
        assert!(base.with_overrides(None, Some(MAX_ROUND_SECS + 1), 3).is_err());
        assert_eq!(base.with_overrides(None, None, 3).unwrap(), base);
    }

    #[test]
    fn room_codes_are_valid() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert!(is_valid_room_code(&code), "Invalid room code: {code}");
        }
    }

    #[test]
    fn room_code_normalization() {
        assert_eq!(normalize_room_code(" abcd "), "ABCD");
        assert!(is_valid_room_code(&normalize_room_code("k7qz")));
        assert!(!is_valid_room_code("ABC"));
        assert!(!is_valid_room_code("AB0D"));
        assert!(!is_valid_room_code("ABCDE"));
    }
}
