use serde::{Deserialize, Serialize};

/// Downward acceleration (px/s^2, y grows downward).
pub const GRAVITY: f32 = 1800.0;
/// Terminal fall speed (px/s).
pub const MAX_FALL_SPEED: f32 = 900.0;
/// Horizontal run speed (px/s).
pub const MOVE_SPEED: f32 = 300.0;
/// Jump impulse (px/s, negative is up).
pub const JUMP_VELOCITY: f32 = -650.0;
/// Bounce pad impulse (px/s).
pub const BOUNCE_PAD_VELOCITY: f32 = -1050.0;
/// Pads only fire while the player is not already rising faster than this.
pub const BOUNCE_PAD_TRIGGER_VY: f32 = -300.0;
/// Height of the feet strip tested against pads.
pub const BOUNCE_PAD_STRIP: f32 = 6.0;
/// Per-tick horizontal decay when no single direction is held.
pub const FRICTION: f32 = 0.8;
/// Horizontal speeds below this snap to zero.
pub const VELOCITY_EPSILON: f32 = 5.0;
/// Fraction of speed kept (downward) after a ceiling hit.
pub const CEILING_BOUNCE_DAMPING: f32 = 0.25;
/// Extra slack given to the landing side when choosing land vs. ceiling.
pub const LANDING_TOLERANCE: f32 = 1.0;
pub const PLAYER_WIDTH: f32 = 32.0;
pub const PLAYER_HEIGHT: f32 = 48.0;
/// How far below the arena a player may fall before recovery.
pub const OUT_OF_BOUNDS_MARGIN: f32 = 200.0;

/// Center-to-center distance at which a tag lands (inclusive).
pub const TAG_DISTANCE: f32 = 40.0;
pub const TAG_COOLDOWN_TICKS: u16 = 60;
pub const TELEPORT_COOLDOWN_TICKS: u16 = 60;
pub const JUMP_BUFFER_TICKS: u8 = 6;

/// Movement and collision tuning, loadable from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: f32,
    pub max_fall_speed: f32,
    pub move_speed: f32,
    pub jump_velocity: f32,
    pub bounce_pad_velocity: f32,
    pub bounce_pad_trigger_vy: f32,
    pub bounce_pad_strip: f32,
    pub friction: f32,
    pub velocity_epsilon: f32,
    pub ceiling_bounce_damping: f32,
    pub landing_tolerance: f32,
    pub player_width: f32,
    pub player_height: f32,
    pub out_of_bounds_margin: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            max_fall_speed: MAX_FALL_SPEED,
            move_speed: MOVE_SPEED,
            jump_velocity: JUMP_VELOCITY,
            bounce_pad_velocity: BOUNCE_PAD_VELOCITY,
            bounce_pad_trigger_vy: BOUNCE_PAD_TRIGGER_VY,
            bounce_pad_strip: BOUNCE_PAD_STRIP,
            friction: FRICTION,
            velocity_epsilon: VELOCITY_EPSILON,
            ceiling_bounce_damping: CEILING_BOUNCE_DAMPING,
            landing_tolerance: LANDING_TOLERANCE,
            player_width: PLAYER_WIDTH,
            player_height: PLAYER_HEIGHT,
            out_of_bounds_margin: OUT_OF_BOUNDS_MARGIN,
        }
    }
}

/// Tag and input rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub tag_distance: f32,
    pub tag_cooldown_ticks: u16,
    pub teleport_cooldown_ticks: u16,
    pub jump_buffer_ticks: u8,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            tag_distance: TAG_DISTANCE,
            tag_cooldown_ticks: TAG_COOLDOWN_TICKS,
            teleport_cooldown_ticks: TELEPORT_COOLDOWN_TICKS,
            jump_buffer_ticks: JUMP_BUFFER_TICKS,
        }
    }
}

/// Top-level game tuning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    pub physics: PhysicsConfig,
    pub rules: RulesConfig,
}

impl TagConfig {
    /// Load config from a TOML file. Falls back to defaults if the file is missing
    /// or unparseable.
    pub fn load() -> Self {
        let path = std::env::var("TAGRUSH_GAME_CONFIG")
            .unwrap_or_else(|_| "config/tagrush-game.toml".to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<TagConfig>(&content) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!("Failed to parse {path}: {e}, using defaults");
                    TagConfig::default()
                },
            },
            Err(_) => TagConfig::default(),
        }
    }
}
