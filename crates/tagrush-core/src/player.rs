use serde::{Deserialize, Serialize};

/// Opaque identity of a connected player, stable for the connection's lifetime.
pub type PlayerId = u64;

/// Display names are cut to this many characters.
pub const MAX_NAME_LEN: usize = 16;

/// A room member as seen from the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    /// Color/slot index, assigned at join time and never reused mid-round.
    pub slot: u8,
    pub color: PlayerColor,
    pub is_host: bool,
}

impl Player {
    pub fn new(id: PlayerId, display_name: String, slot: u8) -> Self {
        Self {
            id,
            display_name,
            slot,
            color: PlayerColor::for_slot(slot),
            is_host: false,
        }
    }
}

/// Avatar color, derived from the player's slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for PlayerColor {
    fn default() -> Self {
        Self::PALETTE[0]
    }
}

impl PlayerColor {
    /// One color per room slot.
    pub const PALETTE: &[PlayerColor] = &[
        PlayerColor {
            r: 255,
            g: 87,
            b: 87,
        }, // Red
        PlayerColor {
            r: 83,
            g: 152,
            b: 255,
        }, // Blue
        PlayerColor {
            r: 46,
            g: 213,
            b: 115,
        }, // Green
        PlayerColor {
            r: 255,
            g: 195,
            b: 18,
        }, // Yellow
    ];

    pub fn for_slot(slot: u8) -> Self {
        Self::PALETTE[slot as usize % Self::PALETTE.len()]
    }
}

/// Trim and cap a requested display name. Returns `None` for names that are
/// empty after trimming or contain control characters.
pub fn sanitize_display_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_control) {
        return None;
    }
    Some(trimmed.chars().take(MAX_NAME_LEN).collect())
}
