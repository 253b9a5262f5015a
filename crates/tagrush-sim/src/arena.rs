use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Solid axis-aligned block. `y` is the top edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    #[serde(default)]
    pub is_ground: bool,
}

/// Non-solid launch pad.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BouncePad {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Circular trigger that emits the player centered on `(target_x, target_y)`,
/// which is the center of its paired teleporter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Teleporter {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub target_x: f32,
    pub target_y: f32,
}

/// Top-left corner of a player's hitbox at round start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub x: f32,
    pub y: f32,
}

/// Immutable map layout. Pixel units, y grows downward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    pub name: String,
    pub width: f32,
    pub height: f32,
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub bounce_pads: Vec<BouncePad>,
    #[serde(default)]
    pub teleporters: Vec<Teleporter>,
    pub spawn_points: Vec<SpawnPoint>,
}

impl Arena {
    /// Spawn point for the `index`-th member, cycling through the list.
    pub fn spawn_point(&self, index: usize) -> SpawnPoint {
        if self.spawn_points.is_empty() {
            return SpawnPoint { x: 0.0, y: 0.0 };
        }
        self.spawn_points[index % self.spawn_points.len()]
    }

    /// Reject layouts the physics cannot run against.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.width > 0.0 && self.height > 0.0) {
            return Err(format!("arena '{}' has non-positive extent", self.name));
        }
        if self.spawn_points.is_empty() {
            return Err(format!("arena '{}' has no spawn points", self.name));
        }
        if self.platforms.iter().any(|p| !(p.w > 0.0 && p.h > 0.0)) {
            return Err(format!("arena '{}' has a degenerate platform", self.name));
        }
        if self.bounce_pads.iter().any(|p| !(p.w > 0.0 && p.h > 0.0)) {
            return Err(format!("arena '{}' has a degenerate bounce pad", self.name));
        }
        if self.teleporters.iter().any(|t| !(t.radius > 0.0)) {
            return Err(format!("arena '{}' has a teleporter without radius", self.name));
        }
        Ok(())
    }
}

const ARENA_WIDTH: f32 = 1280.0;
const ARENA_HEIGHT: f32 = 720.0;
const GROUND_Y: f32 = 680.0;
/// Spawn y for a 48px hitbox standing on the ground.
const GROUND_SPAWN_Y: f32 = GROUND_Y - 48.0;

fn ground(x: f32, w: f32) -> Platform {
    Platform {
        x,
        y: GROUND_Y,
        w,
        h: ARENA_HEIGHT - GROUND_Y,
        is_ground: true,
    }
}

fn ledge(x: f32, y: f32, w: f32) -> Platform {
    Platform {
        x,
        y,
        w,
        h: 20.0,
        is_ground: false,
    }
}

fn pad_on(x: f32, top: f32) -> BouncePad {
    BouncePad {
        x,
        y: top - 12.0,
        w: 64.0,
        h: 12.0,
    }
}

/// A linked pair of teleporters.
fn teleporter_pair(a: (f32, f32), b: (f32, f32)) -> [Teleporter; 2] {
    [
        Teleporter {
            x: a.0,
            y: a.1,
            radius: 24.0,
            target_x: b.0,
            target_y: b.1,
        },
        Teleporter {
            x: b.0,
            y: b.1,
            radius: 24.0,
            target_x: a.0,
            target_y: a.1,
        },
    ]
}

fn spawns(xs: [f32; 4], y: f32) -> Vec<SpawnPoint> {
    xs.iter().map(|&x| SpawnPoint { x, y }).collect()
}

/// Flat floor with a symmetric ledge pyramid.
pub fn courtyard() -> Arena {
    Arena {
        name: "Courtyard".into(),
        width: ARENA_WIDTH,
        height: ARENA_HEIGHT,
        platforms: vec![
            ground(0.0, ARENA_WIDTH),
            ledge(160.0, 540.0, 200.0),
            ledge(920.0, 540.0, 200.0),
            ledge(540.0, 420.0, 200.0),
            ledge(240.0, 300.0, 160.0),
            ledge(880.0, 300.0, 160.0),
        ],
        bounce_pads: vec![pad_on(608.0, GROUND_Y)],
        teleporters: teleporter_pair((40.0, 640.0), (1240.0, 640.0)).to_vec(),
        spawn_points: spawns([100.0, 1148.0, 400.0, 848.0], GROUND_SPAWN_Y),
    }
}

/// Two tall towers linked by teleporters at their tops.
pub fn twin_towers() -> Arena {
    Arena {
        name: "Twin Towers".into(),
        width: ARENA_WIDTH,
        height: ARENA_HEIGHT,
        platforms: vec![
            ground(0.0, ARENA_WIDTH),
            Platform {
                x: 200.0,
                y: 260.0,
                w: 80.0,
                h: GROUND_Y - 260.0,
                is_ground: false,
            },
            Platform {
                x: 1000.0,
                y: 260.0,
                w: 80.0,
                h: GROUND_Y - 260.0,
                is_ground: false,
            },
            ledge(400.0, 560.0, 160.0),
            ledge(720.0, 560.0, 160.0),
            ledge(560.0, 440.0, 160.0),
            ledge(340.0, 340.0, 120.0),
            ledge(820.0, 340.0, 120.0),
        ],
        bounce_pads: vec![pad_on(100.0, GROUND_Y), pad_on(1116.0, GROUND_Y)],
        teleporters: teleporter_pair((240.0, 180.0), (1040.0, 180.0)).to_vec(),
        spawn_points: spawns([40.0, 1208.0, 600.0, 648.0], GROUND_SPAWN_Y),
    }
}

/// Broken floor over a pit; falling in triggers recovery.
pub fn the_pit() -> Arena {
    let mut teleporters = teleporter_pair((60.0, 400.0), (1220.0, 400.0)).to_vec();
    teleporters.extend(teleporter_pair((520.0, 200.0), (760.0, 200.0)));
    Arena {
        name: "The Pit".into(),
        width: ARENA_WIDTH,
        height: ARENA_HEIGHT,
        platforms: vec![
            ground(0.0, 440.0),
            ground(840.0, 440.0),
            ledge(520.0, 560.0, 240.0),
            ledge(200.0, 440.0, 180.0),
            ledge(900.0, 440.0, 180.0),
            ledge(560.0, 320.0, 160.0),
        ],
        bounce_pads: vec![pad_on(608.0, 560.0)],
        teleporters,
        spawn_points: spawns([60.0, 1188.0, 300.0, 948.0], GROUND_SPAWN_Y),
    }
}

/// All compiled-in arenas, indexed by `arena_index`.
pub fn builtin_arenas() -> Vec<Arena> {
    vec![courtyard(), twin_towers(), the_pit()]
}

/// Load an arena from a JSON file, returning `None` if the file is missing or invalid.
pub fn load_arena_from_file(path: &Path) -> Option<Arena> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Arena>(&content) {
        Ok(arena) => match arena.validate() {
            Ok(()) => Some(arena),
            Err(e) => {
                tracing::warn!("Rejected {}: {e}", path.display());
                None
            },
        },
        Err(e) => {
            tracing::warn!("Failed to parse {}: {e}", path.display());
            None
        },
    }
}

/// Shared, immutable arena list. Cloning the `Arc`s is how sessions borrow
/// geometry without copying it.
#[derive(Debug, Clone)]
pub struct ArenaCatalog {
    arenas: Vec<Arc<Arena>>,
}

impl ArenaCatalog {
    pub fn builtin() -> Self {
        Self {
            arenas: builtin_arenas().into_iter().map(Arc::new).collect(),
        }
    }

    /// Built-in arenas with `<dir>/<index>.json` overrides applied.
    pub fn load(dir: &Path) -> Self {
        let arenas = builtin_arenas()
            .into_iter()
            .enumerate()
            .map(|(i, builtin)| {
                let path = dir.join(format!("{i}.json"));
                match load_arena_from_file(&path) {
                    Some(arena) => {
                        tracing::info!(index = i, name = %arena.name, "Loaded arena override");
                        Arc::new(arena)
                    },
                    None => Arc::new(builtin),
                }
            })
            .collect();
        Self { arenas }
    }

    /// Load using `TAGRUSH_ARENAS_DIR` (default `config/arenas`).
    pub fn from_env() -> Self {
        let dir =
            std::env::var("TAGRUSH_ARENAS_DIR").unwrap_or_else(|_| "config/arenas".to_string());
        Self::load(Path::new(&dir))
    }

    pub fn get(&self, index: u8) -> Option<Arc<Arena>> {
        self.arenas.get(index as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.arenas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arenas.is_empty()
    }
}
