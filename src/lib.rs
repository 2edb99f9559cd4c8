//! Swarmfall - a wave-survival arena combat simulation
//!
//! Core modules:
//! - `sim`: deterministic simulation (entities, systems, session state)
//! - `engine`: fixed-order tick pipeline and top-level session state machine
//! - `events`: engine -> UI observer registry
//! - `console`: developer console command grammar
//! - `meta`: persistent meta-progression, perks, and extraction banking
//! - `persistence`: save/load for banked meta state

pub mod console;
pub mod engine;
pub mod events;
pub mod meta;
pub mod persistence;
pub mod sim;

pub use engine::GameEngine;
pub use sim::{FrameInput, GameSession, GameStatus};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Maximum delta time fed into a tick (background-tab throttle guard)
    pub const MAX_FRAME_DT: f32 = 1.0 / 30.0;

    /// Arena dimensions (logical pixels; resizable at runtime)
    pub const ARENA_WIDTH: f32 = 1280.0;
    pub const ARENA_HEIGHT: f32 = 720.0;

    /// Player defaults
    pub const PLAYER_RADIUS: f32 = 14.0;
    pub const PLAYER_BASE_HEALTH: f32 = 100.0;
    pub const PLAYER_BASE_SPEED: f32 = 220.0;
    pub const PLAYER_BASE_DAMAGE: f32 = 10.0;
    /// Shots per second before fire-rate upgrades
    pub const PLAYER_BASE_FIRE_RATE: f32 = 3.0;
    pub const PLAYER_BASE_AMMO: u32 = 12;
    pub const RELOAD_TIME: f32 = 1.1;
    /// Invulnerability window after taking a contact hit
    pub const CONTACT_INVULN: f32 = 0.8;
    /// Seconds of standing still before the stationary mitigation bonus arms
    pub const STATIONARY_ARM_TIME: f32 = 1.5;
    pub const STATIONARY_MITIGATION: f32 = 0.15;

    /// Dash
    pub const DASH_SPEED: f32 = 640.0;
    pub const DASH_DURATION: f32 = 0.18;
    pub const DASH_COOLDOWN: f32 = 1.4;
    /// Fatigue added per dash; fatigue is clamped to [0, 1]
    pub const DASH_FATIGUE_STEP: f32 = 0.35;
    /// Fatigue drained per second while above zero
    pub const DASH_FATIGUE_DECAY: f32 = 0.25;
    /// Fatigue can never push dash effectiveness below this fraction
    pub const DASH_MIN_EFFECT: f32 = 0.4;
    pub const DASH_TRAIL_LIFETIME: f32 = 1.2;
    pub const DASH_TRAIL_DAMAGE: f32 = 6.0;

    /// Area ability
    pub const ABILITY_RADIUS: f32 = 140.0;
    pub const ABILITY_COOLDOWN: f32 = 8.0;
    pub const ABILITY_DAMAGE: f32 = 18.0;

    /// Projectiles
    pub const PROJECTILE_SPEED: f32 = 520.0;
    pub const PROJECTILE_LIFETIME: f32 = 1.6;
    pub const PROJECTILE_RADIUS: f32 = 4.0;
    /// Delay between queued shots of a multi-shot burst
    pub const BURST_SPACING: f32 = 0.06;
    /// Total spread angle of a multi-stream volley (radians)
    pub const VOLLEY_SPREAD: f32 = 0.22;
    /// Unbranched tank shots burst into fragments at this age
    pub const TANK_SHOT_FRAGMENT_AGE: f32 = 5.0;
    pub const TANK_SHOT_FRAGMENTS: u32 = 8;

    /// Combat
    pub const RICOCHET_DECAY: f32 = 0.8;
    pub const RICOCHET_SEARCH_RADIUS: f32 = 160.0;
    /// Flat damage resistance of the Tank variant
    pub const TANK_RESIST: f32 = 0.6;
    pub const BOSS_VULN_DURATION: f32 = 2.0;
    pub const BOSS_VULN_MIN_INTERVAL: f32 = 7.0;
    pub const BOSS_VULN_MAX_INTERVAL: f32 = 10.0;

    /// Broadphase grid cell size, ~2x a typical enemy diameter
    pub const GRID_CELL_SIZE: f32 = 64.0;
}

/// Distance from a point to a line segment
#[inline]
pub fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 0.0001 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Angle (radians) of the vector from `from` to `to`
#[inline]
pub fn angle_to(from: Vec2, to: Vec2) -> f32 {
    let d = to - from;
    d.y.atan2(d.x)
}

/// Deterministic per-entity jitter in [0, 1) from an integer seed pair
#[inline]
pub fn hash_unit(seed: u32, salt: u32) -> f32 {
    let h = seed.wrapping_mul(2654435761).wrapping_add(salt.wrapping_mul(7919));
    (h % 10000) as f32 / 10000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_segment_distance_endpoints() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, 0.0);

        // Beyond segment start: distance to endpoint
        assert!((point_segment_distance(Vec2::new(-5.0, 0.0), a, b) - 5.0).abs() < 0.001);
        // Perpendicular from middle
        assert!((point_segment_distance(Vec2::new(5.0, 3.0), a, b) - 3.0).abs() < 0.001);
        // Degenerate segment falls back to point distance
        assert!((point_segment_distance(Vec2::new(3.0, 4.0), a, a) - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_angle_to() {
        let origin = Vec2::ZERO;
        assert!((angle_to(origin, Vec2::new(1.0, 0.0))).abs() < 0.001);
        assert!((angle_to(origin, Vec2::new(0.0, 1.0)) - std::f32::consts::FRAC_PI_2).abs() < 0.001);
    }

    #[test]
    fn test_hash_unit_range() {
        for seed in 0..200u32 {
            let v = hash_unit(seed, 13);
            assert!((0.0..1.0).contains(&v));
        }
    }
}
