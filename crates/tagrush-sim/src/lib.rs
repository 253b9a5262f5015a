pub mod arena;
pub mod config;
pub mod input;
pub mod physics;
pub mod player;
pub mod tag;

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tagrush_core::net::messages::{
    EndReason, GameStateMsg, InputMsg, PlayerResult, PlayerSnapshot, TaggedMsg,
};
use tagrush_core::player::{Player, PlayerId};
use tagrush_core::room::MIN_PLAYERS;

use arena::Arena;
use config::TagConfig;
use physics::{TICK_DT, TICK_RATE, apply_movement, check_teleporters, step_body};
use player::MatchPlayer;
use tag::{check_tag, decrement_cooldowns};

/// Where a match is in its round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Built, round not started yet (countdown).
    Waiting,
    Playing,
    Ended(EndReason),
}

/// What one tick produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub tagged: Option<TaggedMsg>,
    pub ended: Option<EndReason>,
}

/// What a departure changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalOutcome {
    /// Set when the departing player was "it" and someone took over.
    pub new_it: Option<PlayerId>,
    pub ended: Option<EndReason>,
}

/// Authoritative state of one round: every member's body, inputs and tag
/// status, the round clock and the current "it".
pub struct TagMatch {
    arena: Arc<Arena>,
    config: Arc<TagConfig>,
    /// Join order. Every scan walks this order.
    players: Vec<MatchPlayer>,
    it_player_id: Option<PlayerId>,
    tick: u64,
    remaining_secs: u16,
    round_duration_secs: u16,
    phase: MatchPhase,
    rng: StdRng,
}

impl TagMatch {
    pub fn new(
        arena: Arc<Arena>,
        config: Arc<TagConfig>,
        round_duration_secs: u16,
        members: &[Player],
        seed: u64,
    ) -> Self {
        let players = members
            .iter()
            .enumerate()
            .map(|(i, p)| MatchPlayer::new(p, i, arena.spawn_point(i)))
            .collect();
        Self {
            arena,
            config,
            players,
            it_player_id: None,
            tick: 0,
            remaining_secs: round_duration_secs,
            round_duration_secs,
            phase: MatchPhase::Waiting,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Spawn everyone by join order, clear inputs and stats, and pick a
    /// uniformly random "it". Returns the chosen player.
    pub fn start_round(&mut self) -> Option<PlayerId> {
        for (i, p) in self.players.iter_mut().enumerate() {
            p.join_index = i;
            p.reset(self.arena.spawn_point(i));
        }
        self.tick = 0;
        self.remaining_secs = self.round_duration_secs;
        self.it_player_id = None;
        if self.players.is_empty() {
            return None;
        }

        let idx = self.rng.random_range(0..self.players.len());
        self.players[idx].is_it = true;
        self.it_player_id = Some(self.players[idx].id);
        self.phase = MatchPhase::Playing;
        self.it_player_id
    }

    /// Overwrite a player's held keys. Ignored outside `Playing` and for
    /// unknown players.
    pub fn apply_input(&mut self, player_id: PlayerId, input: &InputMsg) {
        if self.phase != MatchPhase::Playing {
            return;
        }
        let buffer = self.config.rules.jump_buffer_ticks;
        if let Some(p) = self.players.iter_mut().find(|p| p.id == player_id) {
            p.input.apply(input.left, input.right, input.jump, buffer);
        }
    }

    /// Advance one fixed step: movement, collision, teleporters, cooldowns,
    /// tag check, then round clock.
    pub fn tick(&mut self) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if self.phase != MatchPhase::Playing {
            return outcome;
        }

        let physics = &self.config.physics;
        let rules = &self.config.rules;
        for p in &mut self.players {
            apply_movement(&mut p.body, &mut p.input, physics);
            let fallback = self.arena.spawn_point(p.join_index);
            step_body(&mut p.body, &self.arena, fallback, physics, TICK_DT);
            check_teleporters(
                &mut p.body,
                &mut p.teleport_cooldown_ticks,
                &self.arena,
                physics,
                rules.teleport_cooldown_ticks,
            );
        }

        decrement_cooldowns(&mut self.players);

        if let Some(it_id) = self.it_player_id
            && let Some(event) = check_tag(&mut self.players, it_id, physics, rules)
        {
            self.it_player_id = Some(event.new_it);
            let new_it_name = self
                .players
                .iter()
                .find(|p| p.id == event.new_it)
                .map(|p| p.name.clone())
                .unwrap_or_default();
            outcome.tagged = Some(TaggedMsg {
                old_it_id: event.old_it,
                new_it_id: event.new_it,
                new_it_name,
            });
        }

        self.tick += 1;
        if self.tick % u64::from(TICK_RATE) == 0 {
            self.remaining_secs = self.remaining_secs.saturating_sub(1);
            if self.remaining_secs == 0 {
                outcome.ended = Some(self.end(EndReason::Timeout));
                return outcome;
            }
        }

        if self.players.len() < MIN_PLAYERS {
            outcome.ended = Some(self.end(EndReason::NotEnoughPlayers));
        }
        outcome
    }

    /// Drop a departed member, handing "it" to a random survivor if needed
    /// and ending the round when too few remain.
    pub fn remove_player(&mut self, player_id: PlayerId) -> RemovalOutcome {
        let mut outcome = RemovalOutcome::default();
        let Some(idx) = self.players.iter().position(|p| p.id == player_id) else {
            return outcome;
        };
        let removed = self.players.remove(idx);

        if self.phase != MatchPhase::Playing {
            return outcome;
        }

        if removed.is_it {
            self.it_player_id = None;
            if !self.players.is_empty() {
                let next = self.rng.random_range(0..self.players.len());
                self.players[next].is_it = true;
                self.it_player_id = Some(self.players[next].id);
                outcome.new_it = self.it_player_id;
            }
        }

        if self.players.len() < MIN_PLAYERS {
            outcome.ended = Some(self.end(EndReason::NotEnoughPlayers));
        }
        outcome
    }

    fn end(&mut self, reason: EndReason) -> EndReason {
        self.phase = MatchPhase::Ended(reason);
        reason
    }

    /// Per-player results, winners first. Everyone but the final "it" wins.
    pub fn results(&self) -> Vec<PlayerResult> {
        let mut results: Vec<PlayerResult> = self
            .players
            .iter()
            .map(|p| PlayerResult {
                player_id: p.id,
                name: p.name.clone(),
                is_it: p.is_it,
                times_tagged: p.times_tagged,
                won: !p.is_it,
            })
            .collect();
        results.sort_by_key(|r| !r.won);
        results
    }

    /// Wire snapshot with positions at one decimal and whole-number velocities.
    pub fn snapshot(&self) -> GameStateMsg {
        let players: BTreeMap<PlayerId, PlayerSnapshot> = self
            .players
            .iter()
            .map(|p| {
                (
                    p.id,
                    PlayerSnapshot {
                        x: round_tenth(p.body.x),
                        y: round_tenth(p.body.y),
                        vx: p.body.vx.round() as i32,
                        vy: p.body.vy.round() as i32,
                        on_ground: p.body.on_ground,
                        facing_right: p.body.facing_right,
                        is_it: p.is_it,
                        tag_cooldown: p.tag_cooldown_ticks,
                        times_tagged: p.times_tagged,
                        slot: p.slot,
                    },
                )
            })
            .collect();
        GameStateMsg {
            tick: self.tick,
            timer: self.remaining_secs,
            it_player_id: self.it_player_id,
            players,
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn is_playing(&self) -> bool {
        self.phase == MatchPhase::Playing
    }

    pub fn players(&self) -> &[MatchPlayer] {
        &self.players
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&MatchPlayer> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn it_player_id(&self) -> Option<PlayerId> {
        self.it_player_id
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn remaining_secs(&self) -> u16 {
        self.remaining_secs
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }
}

fn round_tenth(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}
