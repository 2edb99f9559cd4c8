//! Wave director
//!
//! Owns the per-wave spawn budget, the composition-weight table, and the
//! difficulty multiplier. Wave-clear detection fires only when both the
//! remaining budget and the live enemy count have hit zero.

use crate::meta;

use super::state::{CompositionWeights, GameSession};

/// Composition thresholds: Fast at 3, Tank at 6, Shooter at 9, full mix at
/// 10, and a forced boss (or boss-plus-minions) on every 10th wave
pub fn weights_for_wave(wave: u32) -> CompositionWeights {
    if wave % 10 == 0 && wave > 0 {
        if wave == 10 {
            // Pure boss encounter the first time
            return CompositionWeights {
                basic: 0.0,
                fast: 0.0,
                tank: 0.0,
                shooter: 0.0,
                boss: 1.0,
            };
        }
        // Later boss waves mix minions in; the spawner places the boss itself
        return CompositionWeights {
            basic: 0.4,
            fast: 0.25,
            tank: 0.2,
            shooter: 0.15,
            boss: 0.0,
        };
    }
    match wave {
        0..=2 => CompositionWeights {
            basic: 1.0,
            fast: 0.0,
            tank: 0.0,
            shooter: 0.0,
            boss: 0.0,
        },
        3..=5 => CompositionWeights {
            basic: 0.8,
            fast: 0.2,
            tank: 0.0,
            shooter: 0.0,
            boss: 0.0,
        },
        6..=8 => CompositionWeights {
            basic: 0.6,
            fast: 0.25,
            tank: 0.15,
            shooter: 0.0,
            boss: 0.0,
        },
        9 => CompositionWeights {
            basic: 0.5,
            fast: 0.25,
            tank: 0.15,
            shooter: 0.1,
            boss: 0.0,
        },
        _ => CompositionWeights {
            basic: 0.45,
            fast: 0.25,
            tank: 0.15,
            shooter: 0.15,
            boss: 0.0,
        },
    }
}

/// Difficulty grows linearly, with a compounding term after wave 7
pub fn difficulty_for_wave(wave: u32) -> f32 {
    let mut difficulty = 1.0 + wave.saturating_sub(1) as f32 * 0.08;
    if wave > 7 {
        difficulty *= 1.05f32.powi((wave - 7) as i32);
    }
    difficulty
}

/// Advance to the next wave: budget, weights, difficulty, spawn bookkeeping
pub fn prepare_next_wave(session: &mut GameSession) {
    session.wave += 1;
    let wave = session.wave;
    session.boss_wave = wave.is_multiple_of(10);
    session.boss_spawned = false;

    let budget = if session.boss_wave {
        if wave == 10 { 1 } else { 1 + wave / 4 }
    } else {
        6 + wave * 2
    };
    session.wave_budget = budget;
    session.enemies_remaining = budget;
    session.weights = weights_for_wave(wave);
    session.difficulty = difficulty_for_wave(wave);
    session.wave_active = true;
    session.spawn_timer = 0.8;

    log::info!(
        "wave {} prepared: budget {}, difficulty {:.2}{}",
        wave,
        budget,
        session.difficulty,
        if session.boss_wave { " (boss)" } else { "" }
    );
}

/// Clear detection; on clear, heals a fraction of the player's missing
/// health and fires the wave-clear perk hook. Returns true exactly once
/// per cleared wave.
pub fn check_wave_clear(session: &mut GameSession) -> bool {
    if !session.wave_active {
        return false;
    }
    if session.enemies_remaining != 0 || session.live_enemy_count() != 0 {
        return false;
    }
    session.wave_active = false;

    let perk = session.meta.equipped_perk;
    if let Some(p) = session
        .entities
        .player_mut()
        .and_then(|e| e.as_player_mut())
    {
        let missing = p.max_health - p.health;
        p.health = (p.health + missing * p.heal_on_clear_pct).min(p.max_health);
        meta::on_wave_clear(p, perk);
    }
    log::info!("wave {} cleared", session.wave);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::enemy::spawn_enemy_at;
    use crate::sim::entity::EnemyVariant;
    use glam::Vec2;

    #[test]
    fn test_composition_thresholds() {
        assert_eq!(weights_for_wave(1).fast, 0.0);
        assert!(weights_for_wave(3).fast > 0.0);
        assert_eq!(weights_for_wave(5).tank, 0.0);
        assert!(weights_for_wave(6).tank > 0.0);
        assert_eq!(weights_for_wave(8).shooter, 0.0);
        assert!(weights_for_wave(9).shooter > 0.0);
        assert_eq!(weights_for_wave(10).boss, 1.0);
        // Boss-plus-minions later on
        let w20 = weights_for_wave(20);
        assert!(w20.basic > 0.0);
    }

    #[test]
    fn test_difficulty_compounds_after_seven() {
        let d7 = difficulty_for_wave(7);
        let d8 = difficulty_for_wave(8);
        let d9 = difficulty_for_wave(9);
        // Linear step alone would be 0.08; compounding makes it larger
        assert!(d8 - d7 > 0.08);
        assert!(d9 - d8 > d8 - d7);
    }

    #[test]
    fn test_budget_grows_linearly() {
        let mut session = GameSession::new(1);
        session.start_run();
        prepare_next_wave(&mut session);
        let b1 = session.wave_budget;
        prepare_next_wave(&mut session);
        let b2 = session.wave_budget;
        assert!(b2 > b1);
    }

    #[test]
    fn test_clear_requires_both_counts_zero() {
        let mut session = GameSession::new(1);
        session.start_run();
        prepare_next_wave(&mut session);

        // Budget still outstanding: not clear
        assert!(!check_wave_clear(&mut session));

        // Budget drained but an enemy lives: not clear
        session.enemies_remaining = 0;
        let id = spawn_enemy_at(&mut session, Vec2::new(100.0, 100.0), EnemyVariant::Basic);
        assert!(!check_wave_clear(&mut session));

        // Both zero: clear fires once
        session.entities.get_mut(id).unwrap().active = false;
        session.entities.cleanup();
        assert!(check_wave_clear(&mut session));
        assert!(!session.wave_active);
        assert!(!check_wave_clear(&mut session));
    }

    #[test]
    fn test_clear_heals_missing_fraction() {
        let mut session = GameSession::new(1);
        session.start_run();
        prepare_next_wave(&mut session);
        session.enemies_remaining = 0;
        {
            let p = session
                .entities
                .player_mut()
                .unwrap()
                .as_player_mut()
                .unwrap();
            p.health = 50.0;
            p.heal_on_clear_pct = 0.2;
        }
        check_wave_clear(&mut session);
        let p = session.entities.player().unwrap().as_player().unwrap();
        // 20% of the 50 missing
        assert!((p.health - 60.0).abs() < 0.001);
    }

    #[test]
    fn test_fresh_wave_one_clears_immediately_when_empty() {
        // End-to-end: wave 1 with a zero budget and no live enemies flags
        // clear on the first check
        let mut session = GameSession::new(1);
        session.start_run();
        prepare_next_wave(&mut session);
        session.enemies_remaining = 0;
        session.wave_budget = 0;
        assert!(check_wave_clear(&mut session));
    }

    #[test]
    fn test_boss_wave_flag_every_tenth() {
        let mut session = GameSession::new(1);
        session.start_run();
        for _ in 0..10 {
            prepare_next_wave(&mut session);
        }
        assert_eq!(session.wave, 10);
        assert!(session.boss_wave);
        assert!(!session.boss_spawned);
    }
}
