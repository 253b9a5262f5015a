use tagrush_core::player::{Player, PlayerId};

use crate::arena::SpawnPoint;
use crate::config::PhysicsConfig;
use crate::input::InputState;
use crate::physics::Body;

/// A member's in-round state.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchPlayer {
    pub id: PlayerId,
    pub name: String,
    pub slot: u8,
    /// Position in the room's join order; picks the spawn and fallback point.
    pub join_index: usize,
    pub body: Body,
    pub input: InputState,
    pub is_it: bool,
    pub tag_cooldown_ticks: u16,
    pub teleport_cooldown_ticks: u16,
    pub times_tagged: u32,
}

impl MatchPlayer {
    pub fn new(player: &Player, join_index: usize, spawn: SpawnPoint) -> Self {
        Self {
            id: player.id,
            name: player.display_name.clone(),
            slot: player.slot,
            join_index,
            body: Body::at(spawn),
            input: InputState::default(),
            is_it: false,
            tag_cooldown_ticks: 0,
            teleport_cooldown_ticks: 0,
            times_tagged: 0,
        }
    }

    /// Put the player back at `spawn` with a clean slate.
    pub fn reset(&mut self, spawn: SpawnPoint) {
        self.body = Body::at(spawn);
        self.input.reset();
        self.is_it = false;
        self.tag_cooldown_ticks = 0;
        self.teleport_cooldown_ticks = 0;
        self.times_tagged = 0;
    }

    pub fn center(&self, cfg: &PhysicsConfig) -> (f32, f32) {
        self.body.center(cfg)
    }
}
