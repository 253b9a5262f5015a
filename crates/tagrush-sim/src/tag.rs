use tagrush_core::player::PlayerId;

use crate::config::{PhysicsConfig, RulesConfig};
use crate::player::MatchPlayer;

/// One transfer of "it".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagEvent {
    pub old_it: PlayerId,
    pub new_it: PlayerId,
}

/// Count down tag and teleport cooldowns for everyone.
pub fn decrement_cooldowns(players: &mut [MatchPlayer]) {
    for p in players {
        p.tag_cooldown_ticks = p.tag_cooldown_ticks.saturating_sub(1);
        p.teleport_cooldown_ticks = p.teleport_cooldown_ticks.saturating_sub(1);
    }
}

/// Evaluate one tick of tag detection. At most one transfer happens: the
/// first player in join order within reach wins.
pub fn check_tag(
    players: &mut [MatchPlayer],
    it_id: PlayerId,
    physics: &PhysicsConfig,
    rules: &RulesConfig,
) -> Option<TagEvent> {
    let it_idx = players.iter().position(|p| p.id == it_id)?;
    if players[it_idx].tag_cooldown_ticks > 0 {
        return None;
    }
    let (ix, iy) = players[it_idx].center(physics);

    let target_idx = players.iter().enumerate().position(|(i, p)| {
        if i == it_idx || p.tag_cooldown_ticks > 0 {
            return false;
        }
        let (px, py) = p.center(physics);
        let (dx, dy) = (px - ix, py - iy);
        (dx * dx + dy * dy).sqrt() <= rules.tag_distance
    })?;

    let old = &mut players[it_idx];
    old.is_it = false;
    old.tag_cooldown_ticks = rules.tag_cooldown_ticks;
    let old_it = old.id;

    let new = &mut players[target_idx];
    new.is_it = true;
    new.tag_cooldown_ticks = 0;
    new.times_tagged += 1;

    Some(TagEvent {
        old_it,
        new_it: new.id,
    })
}
