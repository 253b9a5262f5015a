use serde::{Deserialize, Serialize};

use crate::arena::{Arena, Platform, SpawnPoint};
use crate::config::PhysicsConfig;
use crate::input::InputState;

/// Fixed simulation rate.
pub const TICK_RATE: u32 = 60;
/// Seconds per tick.
pub const TICK_DT: f32 = 1.0 / TICK_RATE as f32;

/// Kinematic state of one player. `(x, y)` is the hitbox's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub on_ground: bool,
    pub facing_right: bool,
}

impl Body {
    pub fn at(spawn: SpawnPoint) -> Self {
        Self {
            x: spawn.x,
            y: spawn.y,
            vx: 0.0,
            vy: 0.0,
            on_ground: false,
            facing_right: true,
        }
    }

    pub fn center(&self, cfg: &PhysicsConfig) -> (f32, f32) {
        (
            self.x + cfg.player_width / 2.0,
            self.y + cfg.player_height / 2.0,
        )
    }
}

/// Strict AABB overlap. Touching edges do not count.
fn overlaps(x: f32, y: f32, w: f32, h: f32, p: &Platform) -> bool {
    x < p.x + p.w && x + w > p.x && y < p.y + p.h && y + h > p.y
}

/// Input-driven velocity and facing update, run before collision.
pub fn apply_movement(body: &mut Body, input: &mut InputState, cfg: &PhysicsConfig) {
    match (input.left, input.right) {
        (true, false) => {
            body.vx = -cfg.move_speed;
            body.facing_right = false;
        },
        (false, true) => {
            body.vx = cfg.move_speed;
            body.facing_right = true;
        },
        _ => {
            body.vx *= cfg.friction;
            if body.vx.abs() < cfg.velocity_epsilon {
                body.vx = 0.0;
            }
        },
    }

    if input.consume_jump(body.on_ground) {
        body.vy = cfg.jump_velocity;
        body.on_ground = false;
    }
}

/// Move along x and push out of solids sampled at `ref_y`, the vertical
/// position from before this tick's vertical integration.
pub fn resolve_horizontal(
    body: &mut Body,
    arena: &Arena,
    ref_y: f32,
    cfg: &PhysicsConfig,
    dt: f32,
) {
    let max_x = (arena.width - cfg.player_width).max(0.0);
    body.x = (body.x + body.vx * dt).clamp(0.0, max_x);

    for p in &arena.platforms {
        if !overlaps(body.x, ref_y, cfg.player_width, cfg.player_height, p) {
            continue;
        }
        let pen_left = body.x + cfg.player_width - p.x;
        let pen_right = p.x + p.w - body.x;
        if pen_left < pen_right {
            body.x = p.x - cfg.player_width;
        } else {
            body.x = p.x + p.w;
        }
        body.vx = 0.0;
    }
    body.x = body.x.clamp(0.0, max_x);
}

/// Integrate gravity and resolve against the single shallowest overlap.
pub fn resolve_vertical(body: &mut Body, arena: &Arena, cfg: &PhysicsConfig, dt: f32) {
    body.vy = (body.vy + cfg.gravity * dt).min(cfg.max_fall_speed);
    body.y += body.vy * dt;
    body.on_ground = false;

    let h = cfg.player_height;
    let mut best: Option<(&Platform, f32, f32)> = None;
    for p in &arena.platforms {
        if !overlaps(body.x, body.y, cfg.player_width, h, p) {
            continue;
        }
        let top_pen = body.y + h - p.y;
        let bottom_pen = p.y + p.h - body.y;
        let depth = top_pen.min(bottom_pen);
        if best.is_none_or(|(_, t, b)| depth < t.min(b)) {
            best = Some((p, top_pen, bottom_pen));
        }
    }

    let Some((p, top_pen, bottom_pen)) = best else {
        return;
    };
    if top_pen <= bottom_pen + cfg.landing_tolerance {
        body.y = p.y - h;
        body.vy = 0.0;
        body.on_ground = true;
    } else {
        body.y = p.y + p.h;
        body.vy = body.vy.abs() * cfg.ceiling_bounce_damping;
    }
}

/// Velocity impulse from pads under the feet. Never moves the body.
pub fn apply_bounce_pads(body: &mut Body, arena: &Arena, cfg: &PhysicsConfig) {
    if body.vy <= cfg.bounce_pad_trigger_vy {
        return;
    }
    let strip_y = body.y + cfg.player_height - cfg.bounce_pad_strip;
    let hit = arena.bounce_pads.iter().any(|pad| {
        body.x < pad.x + pad.w
            && body.x + cfg.player_width > pad.x
            && strip_y < pad.y + pad.h
            && strip_y + cfg.bounce_pad_strip > pad.y
    });
    if hit {
        body.vy = cfg.bounce_pad_velocity;
        body.on_ground = false;
    }
}

/// Return a player who fell out of the arena to `fallback`. Returns whether
/// recovery happened.
pub fn recover_out_of_bounds(
    body: &mut Body,
    arena: &Arena,
    fallback: SpawnPoint,
    cfg: &PhysicsConfig,
) -> bool {
    if body.y <= arena.height + cfg.out_of_bounds_margin {
        return false;
    }
    body.x = fallback.x;
    body.y = fallback.y;
    body.vy = 0.0;
    body.on_ground = false;
    true
}

/// Teleport when the hitbox center enters a ready teleporter. Returns the
/// index of the teleporter used.
pub fn check_teleporters(
    body: &mut Body,
    cooldown: &mut u16,
    arena: &Arena,
    cfg: &PhysicsConfig,
    cooldown_ticks: u16,
) -> Option<usize> {
    if *cooldown > 0 {
        return None;
    }
    let (cx, cy) = body.center(cfg);
    let body_radius = cfg.player_width / 2.0;
    let (idx, tp) = arena.teleporters.iter().enumerate().find(|(_, tp)| {
        let (dx, dy) = (cx - tp.x, cy - tp.y);
        (dx * dx + dy * dy).sqrt() < tp.radius + body_radius
    })?;

    body.x = tp.target_x - cfg.player_width / 2.0;
    body.y = tp.target_y - cfg.player_height / 2.0;
    body.vy = 0.0;
    body.on_ground = false;
    *cooldown = cooldown_ticks;
    Some(idx)
}

/// All collision phases for one tick, in order: horizontal, vertical, pads,
/// out-of-bounds recovery.
pub fn step_body(
    body: &mut Body,
    arena: &Arena,
    fallback: SpawnPoint,
    cfg: &PhysicsConfig,
    dt: f32,
) {
    let ref_y = body.y;
    resolve_horizontal(body, arena, ref_y, cfg, dt);
    resolve_vertical(body, arena, cfg, dt);
    apply_bounce_pads(body, arena, cfg);
    recover_out_of_bounds(body, arena, fallback, cfg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{BouncePad, Teleporter};
    use proptest::prelude::*;

    fn cfg() -> PhysicsConfig {
        PhysicsConfig::default()
    }

    fn floor_arena() -> Arena {
        Arena {
            name: "test".into(),
            width: 1280.0,
            height: 720.0,
            platforms: vec![Platform {
                x: 0.0,
                y: 680.0,
                w: 1280.0,
                h: 40.0,
                is_ground: true,
            }],
            bounce_pads: vec![],
            teleporters: vec![],
            spawn_points: vec![SpawnPoint { x: 100.0, y: 632.0 }],
        }
    }

    fn standing(x: f32) -> Body {
        Body {
            x,
            y: 632.0,
            vx: 0.0,
            vy: 0.0,
            on_ground: true,
            facing_right: true,
        }
    }

    fn spawn() -> SpawnPoint {
        SpawnPoint { x: 100.0, y: 632.0 }
    }

    #[test]
    fn standing_player_stays_grounded() {
        let arena = floor_arena();
        let mut body = standing(100.0);
        for _ in 0..120 {
            step_body(&mut body, &arena, spawn(), &cfg(), TICK_DT);
            assert!(body.on_ground);
            assert_eq!(body.y, 632.0);
            assert_eq!(body.x, 100.0);
        }
    }

    #[test]
    fn falling_player_lands_on_top() {
        let arena = floor_arena();
        let mut body = standing(100.0);
        body.y = 400.0;
        body.on_ground = false;
        for _ in 0..120 {
            step_body(&mut body, &arena, spawn(), &cfg(), TICK_DT);
        }
        assert!(body.on_ground);
        assert_eq!(body.y, 632.0);
        assert_eq!(body.vy, 0.0);
    }

    #[test]
    fn fall_speed_is_capped() {
        let mut arena = floor_arena();
        arena.platforms.clear();
        let mut body = standing(100.0);
        body.y = -5000.0;
        body.vy = 5000.0;
        resolve_vertical(&mut body, &arena, &cfg(), TICK_DT);
        assert_eq!(body.vy, cfg().max_fall_speed);
    }

    #[test]
    fn ceiling_hit_bounces_back_damped() {
        let mut arena = floor_arena();
        arena.platforms.push(Platform {
            x: 0.0,
            y: 500.0,
            w: 400.0,
            h: 20.0,
            is_ground: false,
        });
        let mut body = standing(100.0);
        body.y = 525.0;
        body.vy = -600.0;
        body.on_ground = false;
        resolve_vertical(&mut body, &arena, &cfg(), TICK_DT);
        assert_eq!(body.y, 520.0);
        let expected = (-600.0 + cfg().gravity * TICK_DT).abs() * cfg().ceiling_bounce_damping;
        assert!((body.vy - expected).abs() < 1e-3);
        assert!(body.vy > 0.0);
        assert!(!body.on_ground);
    }

    #[test]
    fn shallowest_overlap_wins() {
        let mut arena = floor_arena();
        // Thin ledge just above the floor; a fast faller has mostly passed it.
        arena.platforms.push(Platform {
            x: 0.0,
            y: 630.0,
            w: 400.0,
            h: 20.0,
            is_ground: false,
        });
        let mut body = standing(100.0);
        body.y = 620.0;
        body.vy = 870.0;
        body.on_ground = false;
        resolve_vertical(&mut body, &arena, &cfg(), TICK_DT);
        // Floor penetration (~3px) beats ledge penetration (~15px from below).
        assert!(body.on_ground);
        assert_eq!(body.y, 632.0);
    }

    #[test]
    fn walking_on_a_ledge_is_not_shoved_sideways() {
        let mut arena = floor_arena();
        arena.platforms.push(Platform {
            x: 200.0,
            y: 500.0,
            w: 300.0,
            h: 20.0,
            is_ground: false,
        });
        let mut body = standing(300.0);
        body.y = 452.0;
        body.vx = cfg().move_speed;
        step_body(&mut body, &arena, spawn(), &cfg(), TICK_DT);
        assert!(body.on_ground);
        assert_eq!(body.y, 452.0);
        assert!((body.x - 305.0).abs() < 1e-3);
    }

    #[test]
    fn wall_pushes_out_on_shallow_side() {
        let mut arena = floor_arena();
        arena.platforms.push(Platform {
            x: 400.0,
            y: 500.0,
            w: 100.0,
            h: 180.0,
            is_ground: false,
        });
        let mut body = standing(366.0);
        body.vx = cfg().move_speed;
        let ref_y = body.y;
        resolve_horizontal(&mut body, &arena, ref_y, &cfg(), TICK_DT);
        assert_eq!(body.x, 400.0 - cfg().player_width);
        assert_eq!(body.vx, 0.0);
    }

    #[test]
    fn x_is_clamped_to_arena() {
        let arena = floor_arena();
        let mut body = standing(2.0);
        body.vx = -cfg().move_speed;
        let ref_y = body.y;
        resolve_horizontal(&mut body, &arena, ref_y, &cfg(), TICK_DT);
        assert_eq!(body.x, 0.0);

        let mut body = standing(1246.0);
        body.vx = cfg().move_speed;
        let ref_y = body.y;
        resolve_horizontal(&mut body, &arena, ref_y, &cfg(), TICK_DT);
        assert_eq!(body.x, 1280.0 - cfg().player_width);
    }

    #[test]
    fn single_direction_sets_speed_and_facing() {
        let mut body = standing(100.0);
        let mut input = InputState {
            left: true,
            ..Default::default()
        };
        apply_movement(&mut body, &mut input, &cfg());
        assert_eq!(body.vx, -cfg().move_speed);
        assert!(!body.facing_right);
    }

    #[test]
    fn both_directions_decay_like_none() {
        let mut body = standing(100.0);
        body.vx = 300.0;
        let mut input = InputState {
            left: true,
            right: true,
            ..Default::default()
        };
        apply_movement(&mut body, &mut input, &cfg());
        assert!((body.vx - 240.0).abs() < 1e-3);
        assert!(body.facing_right);
    }

    #[test]
    fn friction_snaps_to_zero_below_epsilon() {
        let mut body = standing(100.0);
        body.vx = 300.0;
        let mut input = InputState::default();
        for _ in 0..100 {
            apply_movement(&mut body, &mut input, &cfg());
        }
        assert_eq!(body.vx, 0.0);
    }

    #[test]
    fn buffered_jump_fires_when_grounded() {
        let mut body = standing(100.0);
        let mut input = InputState {
            jump: true,
            jump_buffer_ticks: 6,
            ..Default::default()
        };
        apply_movement(&mut body, &mut input, &cfg());
        assert_eq!(body.vy, cfg().jump_velocity);
        assert!(!body.on_ground);
        assert_eq!(input.jump_buffer_ticks, 0);
    }

    #[test]
    fn bounce_pad_changes_velocity_not_position() {
        let mut arena = floor_arena();
        arena.bounce_pads.push(BouncePad {
            x: 80.0,
            y: 668.0,
            w: 64.0,
            h: 12.0,
        });
        let mut body = standing(100.0);
        body.vy = 200.0;
        body.on_ground = false;
        let before = (body.x, body.y);
        apply_bounce_pads(&mut body, &arena, &cfg());
        assert_eq!((body.x, body.y), before);
        assert_eq!(body.vy, cfg().bounce_pad_velocity);
        assert!(!body.on_ground);
    }

    #[test]
    fn bounce_pad_ignores_fast_risers() {
        let mut arena = floor_arena();
        arena.bounce_pads.push(BouncePad {
            x: 80.0,
            y: 668.0,
            w: 64.0,
            h: 12.0,
        });
        let mut body = standing(100.0);
        body.vy = -500.0;
        apply_bounce_pads(&mut body, &arena, &cfg());
        assert_eq!(body.vy, -500.0);
    }

    #[test]
    fn bounce_pad_only_tests_feet_strip() {
        let mut arena = floor_arena();
        arena.bounce_pads.push(BouncePad {
            x: 80.0,
            y: 560.0,
            w: 64.0,
            h: 12.0,
        });
        // Head overlaps the pad, feet do not.
        let mut body = standing(100.0);
        body.y = 540.0;
        body.vy = 100.0;
        apply_bounce_pads(&mut body, &arena, &cfg());
        assert_eq!(body.vy, 100.0);
    }

    #[test]
    fn out_of_bounds_returns_to_fallback() {
        let arena = floor_arena();
        let mut body = standing(100.0);
        body.x = 700.0;
        body.y = 720.0 + 201.0;
        body.vy = 900.0;
        assert!(recover_out_of_bounds(&mut body, &arena, spawn(), &cfg()));
        assert_eq!((body.x, body.y, body.vy), (100.0, 632.0, 0.0));

        let mut body = standing(100.0);
        body.y = 720.0 + 150.0;
        assert!(!recover_out_of_bounds(&mut body, &arena, spawn(), &cfg()));
    }

    fn teleporter_arena() -> Arena {
        let mut arena = floor_arena();
        arena.teleporters = vec![
            Teleporter {
                x: 200.0,
                y: 656.0,
                radius: 24.0,
                target_x: 1000.0,
                target_y: 656.0,
            },
            Teleporter {
                x: 1000.0,
                y: 656.0,
                radius: 24.0,
                target_x: 200.0,
                target_y: 656.0,
            },
        ];
        arena
    }

    #[test]
    fn teleporter_places_at_pair_and_respects_cooldown() {
        let arena = teleporter_arena();
        let c = cfg();
        let mut body = standing(184.0);
        body.vy = 120.0;
        let mut cooldown = 0;

        assert_eq!(
            check_teleporters(&mut body, &mut cooldown, &arena, &c, 60),
            Some(0)
        );
        let (cx, cy) = body.center(&c);
        assert!(((cx - 1000.0).powi(2) + (cy - 656.0).powi(2)).sqrt() < 24.0);
        assert_eq!(body.vy, 0.0);
        assert_eq!(cooldown, 60);

        // Sitting on the paired teleporter while cooling down does nothing.
        let before = body;
        for _ in 0..59 {
            assert_eq!(check_teleporters(&mut body, &mut cooldown, &arena, &c, 60), None);
            cooldown -= 1;
        }
        assert_eq!(body, before);
        assert_eq!(cooldown, 1);
        cooldown -= 1;
        assert_eq!(
            check_teleporters(&mut body, &mut cooldown, &arena, &c, 60),
            Some(1)
        );
    }

    #[test]
    fn teleporter_requires_proximity() {
        let arena = teleporter_arena();
        let mut body = standing(100.0);
        let mut cooldown = 0;
        assert_eq!(
            check_teleporters(&mut body, &mut cooldown, &arena, &cfg(), 60),
            None
        );
        assert_eq!(body.x, 100.0);
    }

    fn ledge_arena() -> Arena {
        let mut arena = floor_arena();
        arena.platforms.extend([
            Platform {
                x: 200.0,
                y: 540.0,
                w: 200.0,
                h: 20.0,
                is_ground: false,
            },
            Platform {
                x: 600.0,
                y: 420.0,
                w: 160.0,
                h: 20.0,
                is_ground: false,
            },
            Platform {
                x: 900.0,
                y: 300.0,
                w: 40.0,
                h: 380.0,
                is_ground: false,
            },
        ]);
        arena
    }

    proptest! {
        #[test]
        fn grounded_means_resting_on_a_platform_top(
            x in 0.0f32..1248.0,
            y in 0.0f32..600.0,
            vx in -300.0f32..300.0,
            vy in -900.0f32..900.0,
            moves in proptest::collection::vec((any::<bool>(), any::<bool>(), any::<bool>()), 1..240),
        ) {
            let arena = ledge_arena();
            let c = cfg();
            let mut body = Body { x, y, vx, vy, on_ground: false, facing_right: true };
            let mut input = InputState::default();
            for (left, right, jump) in moves {
                input.apply(left, right, jump, 6);
                apply_movement(&mut body, &mut input, &c);
                step_body(&mut body, &arena, spawn(), &c, TICK_DT);
                if body.on_ground {
                    let feet = body.y + c.player_height;
                    let support = arena.platforms.iter().any(|p| {
                        body.x < p.x + p.w
                            && body.x + c.player_width > p.x
                            && (feet - p.y).abs() <= c.landing_tolerance
                    });
                    prop_assert!(support, "grounded with no platform under feet at {:?}", body);
                }
            }
        }

        #[test]
        fn bounce_pads_never_move_the_body(
            x in 0.0f32..1248.0,
            y in 500.0f32..700.0,
            vy in -299.0f32..900.0,
        ) {
            let mut arena = floor_arena();
            arena.bounce_pads.push(BouncePad { x: 0.0, y: 600.0, w: 1280.0, h: 80.0 });
            let mut body = Body { x, y, vx: 0.0, vy, on_ground: false, facing_right: true };
            let before = (body.x, body.y);
            apply_bounce_pads(&mut body, &arena, &cfg());
            prop_assert_eq!((body.x, body.y), before);
        }
    }
}
