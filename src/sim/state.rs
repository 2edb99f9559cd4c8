//! Session state and core simulation types
//!
//! The `GameSession` aggregate is the single shared mutable resource: the
//! engine owns it and passes it by reference into every system, so all
//! mutation is same-thread and ordering discipline comes from the fixed
//! pipeline, not locks. Renderers get a read-only snapshot and must not
//! mutate it.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::meta::MetaProgress;

use super::entity::{Entity, EntityId, EntityKind, EntityStore, EnemyVariant, PlayerState};
use super::grid::SpatialIndex;
use super::upgrades::UpgradeLedger;

/// Top-level session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Menu,
    Playing,
    Paused,
    WaveIntro,
    Shop,
    DevConsole,
    Extraction,
    ExtractionSuccess,
    GameOver,
    MetaHub,
}

/// Per-tick input intent, produced by the host from raw device events
#[derive(Debug, Clone, Default)]
pub struct FrameInput {
    /// Directional intent, not necessarily normalized
    pub move_dir: Vec2,
    /// Aim point in world coordinates
    pub aim: Vec2,
    pub fire: bool,
    pub dash: bool,
    pub ability: bool,
    pub reload: bool,
}

/// Probability mass over enemy variants for the current wave
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompositionWeights {
    pub basic: f32,
    pub fast: f32,
    pub tank: f32,
    pub shooter: f32,
    pub boss: f32,
}

impl Default for CompositionWeights {
    fn default() -> Self {
        Self {
            basic: 1.0,
            fast: 0.0,
            tank: 0.0,
            shooter: 0.0,
            boss: 0.0,
        }
    }
}

impl CompositionWeights {
    /// Weighted variant draw; a boss weight at 1.0 always yields Boss
    pub fn pick(&self, rng: &mut Pcg32) -> EnemyVariant {
        if self.boss >= 1.0 {
            return EnemyVariant::Boss;
        }
        let total = self.basic + self.fast + self.tank + self.shooter + self.boss;
        if total <= 0.0 {
            return EnemyVariant::Basic;
        }
        let mut roll = rng.random_range(0.0..total);
        for (weight, variant) in [
            (self.basic, EnemyVariant::Basic),
            (self.fast, EnemyVariant::Fast),
            (self.tank, EnemyVariant::Tank),
            (self.shooter, EnemyVariant::Shooter),
            (self.boss, EnemyVariant::Boss),
        ] {
            if roll < weight {
                return variant;
            }
            roll -= weight;
        }
        EnemyVariant::Basic
    }
}

/// Enemy walked into the player (or was pushed into overlap)
#[derive(Debug, Clone, Copy)]
pub struct PlayerContact {
    pub enemy_id: EntityId,
}

/// Player projectile overlapped an enemy
#[derive(Debug, Clone, Copy)]
pub struct ProjectileHit {
    pub projectile_id: EntityId,
    pub enemy_id: EntityId,
}

/// Enemy projectile overlapped the player
#[derive(Debug, Clone, Copy)]
pub struct EnemyShotHit {
    pub projectile_id: EntityId,
}

/// Damage actually landed on an enemy; consumed by the engine's UI events
#[derive(Debug, Clone, Copy)]
pub struct HitFeedback {
    pub enemy_id: EntityId,
    pub amount: f32,
    pub killed: bool,
}

/// Transient per-frame event lists, cleared at the top of every tick
#[derive(Debug, Clone, Default)]
pub struct FrameEvents {
    pub player_contacts: Vec<PlayerContact>,
    pub projectile_hits: Vec<ProjectileHit>,
    pub enemy_shot_hits: Vec<EnemyShotHit>,
    pub hit_feedback: Vec<HitFeedback>,
}

impl FrameEvents {
    pub fn clear(&mut self) {
        self.player_contacts.clear();
        self.projectile_hits.clear();
        self.enemy_shot_hits.clear();
        self.hit_feedback.clear();
    }
}

fn session_rng() -> Pcg32 {
    Pcg32::seed_from_u64(0)
}

fn session_grid() -> SpatialIndex {
    SpatialIndex::new(GRID_CELL_SIZE)
}

/// The complete session aggregate
///
/// Run-scoped fields are wiped by `reset_run`; `meta` persists across runs
/// and is only mutated by explicit bank/extract/death-penalty operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    pub status: GameStatus,
    pub bounds: Vec2,

    // Run progress
    pub score: u64,
    pub wave: u32,
    /// Spawn budget left in the current wave
    pub enemies_remaining: u32,
    /// Total budget the current wave started with
    pub wave_budget: u32,
    pub wave_active: bool,
    pub weights: CompositionWeights,
    pub difficulty: f32,
    pub boss_wave: bool,
    /// The guaranteed boss of a boss wave has been placed
    pub boss_spawned: bool,
    pub intro_timer: f32,

    // Risked meta value
    pub at_risk_currency: u64,
    pub at_risk_xp: u64,
    pub cleared_first_boss: bool,

    pub upgrades: UpgradeLedger,
    #[serde(skip)]
    pub events: FrameEvents,
    pub meta: MetaProgress,
    pub entities: EntityStore,
    pub is_player_alive: bool,

    // Spawn/fire bookkeeping
    pub spawn_timer: f32,
    /// Shots still owed from a multi-shot burst
    pub pending_shots: u32,
    pub shot_timer: f32,

    /// Simulation clock, advanced only while Playing
    pub elapsed: f32,
    pub seed: u64,
    #[serde(skip, default = "session_rng")]
    pub rng: Pcg32,
    /// Enemy broadphase, rebuilt by the collision resolver each tick
    #[serde(skip, default = "session_grid")]
    pub grid: SpatialIndex,
}

impl GameSession {
    pub fn new(seed: u64) -> Self {
        Self {
            status: GameStatus::Menu,
            bounds: Vec2::new(ARENA_WIDTH, ARENA_HEIGHT),
            score: 0,
            wave: 0,
            enemies_remaining: 0,
            wave_budget: 0,
            wave_active: false,
            weights: CompositionWeights::default(),
            difficulty: 1.0,
            boss_wave: false,
            boss_spawned: false,
            intro_timer: 0.0,
            at_risk_currency: 0,
            at_risk_xp: 0,
            cleared_first_boss: false,
            upgrades: UpgradeLedger::default(),
            events: FrameEvents::default(),
            meta: MetaProgress::default(),
            entities: EntityStore::new(),
            is_player_alive: false,
            spawn_timer: 0.0,
            pending_shots: 0,
            shot_timer: 0.0,
            elapsed: 0.0,
            seed,
            rng: Pcg32::seed_from_u64(seed),
            grid: session_grid(),
        }
    }

    /// Wipe all run-scoped state; meta progression survives
    pub fn reset_run(&mut self) {
        let meta = self.meta.clone();
        let seed = self.seed.wrapping_add(1);
        *self = GameSession::new(seed);
        self.meta = meta;
    }

    /// Reset and place a fresh player at arena center
    pub fn start_run(&mut self) {
        self.reset_run();
        let id = self.entities.alloc_id();
        self.entities.add(Entity {
            id,
            pos: self.bounds * 0.5,
            vel: Vec2::ZERO,
            radius: PLAYER_RADIUS,
            active: true,
            tint: 0x4ec9ffff,
            rotation: 0.0,
            kind: EntityKind::Player(PlayerState::default()),
        });
        self.is_player_alive = true;
        log::info!("run started (seed {})", self.seed);
    }

    /// Exactly one live player entity must exist while the player is alive
    pub fn player_id(&self) -> Option<EntityId> {
        self.entities.player().map(|e| e.id)
    }

    pub fn live_enemy_count(&self) -> usize {
        self.entities.live_enemy_count()
    }
}

/// Clamp a circle to the arena, zeroing velocity on any clamped axis
pub fn clamp_to_bounds(pos: &mut Vec2, vel: &mut Vec2, radius: f32, bounds: Vec2) {
    if pos.x < radius {
        pos.x = radius;
        vel.x = 0.0;
    } else if pos.x > bounds.x - radius {
        pos.x = bounds.x - radius;
        vel.x = 0.0;
    }
    if pos.y < radius {
        pos.y = radius;
        vel.y = 0.0;
    } else if pos.y > bounds.y - radius {
        pos.y = bounds.y - radius;
        vel.y = 0.0;
    }
}

pub fn within_bounds(pos: Vec2, bounds: Vec2, margin: f32) -> bool {
    pos.x >= -margin && pos.y >= -margin && pos.x <= bounds.x + margin && pos.y <= bounds.y + margin
}
