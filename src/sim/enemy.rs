//! Enemy AI director
//!
//! Spawn cadence and placement, per-variant steering and finite-state
//! machines, the multi-attack boss controller, ranged attack gates, and
//! arena containment. Steering combines pursuit/orbit intent, neighbor
//! separation and alignment (broadphase queries), id-seeded wander, and
//! soft boundary repulsion, smoothed by exponential velocity decay.

use std::collections::HashMap;

use glam::Vec2;
use rand::Rng;

use crate::consts::*;
use crate::hash_unit;

use super::entity::{
    AiState, BossAttack, BossState, Entity, EntityId, EntityKind, EnemyState, EnemyVariant,
    HazardState, ProjectileShape, ProjectileState,
};
use super::state::{clamp_to_bounds, within_bounds, GameSession};

/// Base stats per variant before difficulty scaling
fn variant_stats(variant: EnemyVariant) -> (f32, f32, u64, f32, f32) {
    // (health, damage, score, radius, speed)
    match variant {
        EnemyVariant::Basic => (20.0, 8.0, 10, 12.0, 90.0),
        EnemyVariant::Fast => (12.0, 6.0, 15, 10.0, 150.0),
        EnemyVariant::Tank => (70.0, 14.0, 30, 18.0, 55.0),
        EnemyVariant::Shooter => (18.0, 10.0, 25, 12.0, 75.0),
        EnemyVariant::Boss => (600.0, 25.0, 500, 36.0, 60.0),
    }
}

fn variant_tint(variant: EnemyVariant) -> u32 {
    match variant {
        EnemyVariant::Basic => 0xd95763ff,
        EnemyVariant::Fast => 0xf7b32bff,
        EnemyVariant::Tank => 0x8a6d3bff,
        EnemyVariant::Shooter => 0xa05cc2ff,
        EnemyVariant::Boss => 0x7a1f2bff,
    }
}

/// Cruise speed per variant (not part of the stat tuple used by tests)
fn variant_speed(variant: EnemyVariant) -> f32 {
    variant_stats(variant).4
}

/// Spawn one enemy at an explicit position, scaled by current difficulty
pub fn spawn_enemy_at(session: &mut GameSession, pos: Vec2, variant: EnemyVariant) -> EntityId {
    let (health, damage, score, radius, _) = variant_stats(variant);
    let health = health * session.difficulty;
    let damage = damage * session.difficulty;
    let boss = if variant == EnemyVariant::Boss {
        let first_vuln = session
            .rng
            .random_range(BOSS_VULN_MIN_INTERVAL..BOSS_VULN_MAX_INTERVAL);
        Some(BossState::new(first_vuln))
    } else {
        None
    };
    let orbit_dir = if session.rng.random_bool(0.5) { 1.0 } else { -1.0 };
    let state_timer = session.rng.random_range(1.2..2.8);
    let id = session.entities.alloc_id();
    session.entities.add(Entity {
        id,
        pos,
        vel: Vec2::ZERO,
        radius,
        active: true,
        tint: variant_tint(variant),
        rotation: 0.0,
        kind: EntityKind::Enemy(EnemyState {
            variant,
            health,
            max_health: health,
            damage,
            score_value: score,
            knockback: Vec2::ZERO,
            ai_state: AiState::Approach,
            state_timer,
            orbit_dir,
            entered: false,
            marked_timer: 0.0,
            fire_timer: 1.0,
            boss,
        }),
    });
    id
}

/// A point just outside one of the four cardinal edges, padded by radius
fn edge_spawn_point(session: &mut GameSession, radius: f32) -> Vec2 {
    let b = session.bounds;
    match session.rng.random_range(0..4u32) {
        0 => Vec2::new(-radius * 2.0, session.rng.random_range(0.0..b.y)),
        1 => Vec2::new(b.x + radius * 2.0, session.rng.random_range(0.0..b.y)),
        2 => Vec2::new(session.rng.random_range(0.0..b.x), -radius * 2.0),
        _ => Vec2::new(session.rng.random_range(0.0..b.x), b.y + radius * 2.0),
    }
}

fn run_spawner(session: &mut GameSession, dt: f32) {
    if !session.wave_active || session.enemies_remaining == 0 {
        return;
    }
    session.spawn_timer -= dt;
    if session.spawn_timer > 0.0 {
        return;
    }

    let interval = (1.2 - session.wave as f32 * 0.05).max(0.25);
    session.spawn_timer = interval;

    // A boss wave places its guaranteed boss before anything else
    if session.boss_wave && !session.boss_spawned {
        session.boss_spawned = true;
        let (_, _, _, radius, _) = variant_stats(EnemyVariant::Boss);
        let pos = edge_spawn_point(session, radius);
        spawn_enemy_at(session, pos, EnemyVariant::Boss);
        session.enemies_remaining -= 1;
        log::info!("boss spawned for wave {}", session.wave);
        return;
    }

    // Burst clusters unlock with wave pressure and enough remaining budget
    let burst_chance = (0.15 + session.wave as f32 * 0.02).min(0.5);
    let burst_eligible = session.wave >= 4 && session.enemies_remaining >= 3;
    if burst_eligible && session.rng.random_bool(burst_chance as f64) {
        let max_count = session.enemies_remaining.min(5);
        let count = session.rng.random_range(3..=max_count.max(3));
        let count = count.min(session.enemies_remaining);
        let center = edge_spawn_point(session, 16.0);
        for _ in 0..count {
            let jitter = Vec2::new(
                session.rng.random_range(-40.0..40.0),
                session.rng.random_range(-40.0..40.0),
            );
            let variant = session.weights.pick(&mut session.rng);
            spawn_enemy_at(session, center + jitter, variant);
            session.enemies_remaining -= 1;
        }
        log::debug!("burst cluster of {} spawned", count);
    } else {
        let variant = session.weights.pick(&mut session.rng);
        let (_, _, _, radius, _) = variant_stats(variant);
        let pos = edge_spawn_point(session, radius);
        spawn_enemy_at(session, pos, variant);
        session.enemies_remaining -= 1;
    }
}

/// Deferred spawn requests collected during the steering pass
enum Emission {
    EnemyShot {
        pos: Vec2,
        dir: Vec2,
        speed: f32,
        damage: f32,
        owner: EntityId,
        lifetime: f32,
        radius: f32,
        tank_shot: bool,
    },
    BossRing {
        pos: Vec2,
        damage: f32,
        owner: EntityId,
    },
    SlamZone {
        pos: Vec2,
        damage: f32,
    },
    DenialZone {
        pos: Vec2,
        damage: f32,
    },
}

pub fn update(session: &mut GameSession, dt: f32) {
    run_spawner(session, dt);

    let player_pos = match session.entities.player() {
        Some(p) => p.pos,
        None => session.bounds * 0.5,
    };
    let bounds = session.bounds;
    let wave = session.wave;
    let time = session.elapsed;

    // Positional snapshot for neighbor queries against the (last-tick) grid
    let snapshot: HashMap<EntityId, (Vec2, Vec2, f32)> = session
        .entities
        .enemies()
        .iter()
        .filter(|e| e.active)
        .map(|e| (e.id, (e.pos, e.vel, e.radius)))
        .collect();

    let mut emissions: Vec<Emission> = Vec::new();

    let grid = &session.grid;
    let rng = &mut session.rng;
    for enemy_ent in session.entities.enemies_mut() {
        if !enemy_ent.active {
            continue;
        }
        let id = enemy_ent.id;
        let mut pos = enemy_ent.pos;
        let mut vel = enemy_ent.vel;
        let radius = enemy_ent.radius;
        let EntityKind::Enemy(ref mut e) = enemy_ent.kind else {
            continue;
        };

        e.marked_timer = (e.marked_timer - dt).max(0.0);

        let is_boss = e.boss.is_some();
        if is_boss {
            boss_update(e, &mut pos, &mut vel, player_pos, rng, dt, &mut emissions, id);
        } else {
            // Two-state FSM: approach <-> commit on a randomized timer
            e.state_timer -= dt;
            if e.state_timer <= 0.0 {
                e.ai_state = match e.ai_state {
                    AiState::Approach => AiState::Commit,
                    _ => AiState::Approach,
                };
                e.state_timer = rng.random_range(1.2..2.8);
                if rng.random_bool(0.2) {
                    e.orbit_dir = -e.orbit_dir;
                }
            }

            let to_player = (player_pos - pos).normalize_or_zero();
            let intent = match e.ai_state {
                AiState::Commit => to_player,
                AiState::Approach => {
                    let tangent = to_player.perp() * e.orbit_dir;
                    (to_player * 0.55 + tangent * 0.45).normalize_or_zero()
                }
                AiState::Anchor => Vec2::ZERO,
            };

            // Neighbor separation and alignment from the broadphase
            let mut separation = Vec2::ZERO;
            let mut align = Vec2::ZERO;
            let mut neighbors = 0u32;
            for nid in grid.query(pos, radius * 2.5) {
                if nid == id {
                    continue;
                }
                if let Some(&(npos, nvel, nradius)) = snapshot.get(&nid) {
                    let d = pos.distance(npos);
                    let reach = radius + nradius + 8.0;
                    if d < reach && d > 0.001 {
                        separation += (pos - npos) / d * (reach - d) / reach;
                        align += nvel;
                        neighbors += 1;
                    }
                }
            }
            if neighbors > 0 {
                align = (align / neighbors as f32).normalize_or_zero() * 0.15;
            }

            // Low-amplitude wander, seeded from the entity id
            let phase = hash_unit(id, 0) * std::f32::consts::TAU;
            let wander_angle = time * 1.7 + phase;
            let wander = Vec2::new(wander_angle.cos(), wander_angle.sin()) * 0.2;

            // Soft boundary repulsion only applies once inside the arena
            let mut repulse = Vec2::ZERO;
            if e.entered {
                let margin = 60.0;
                if pos.x < margin {
                    repulse.x += (margin - pos.x) / margin;
                }
                if pos.x > bounds.x - margin {
                    repulse.x -= (pos.x - (bounds.x - margin)) / margin;
                }
                if pos.y < margin {
                    repulse.y += (margin - pos.y) / margin;
                }
                if pos.y > bounds.y - margin {
                    repulse.y -= (pos.y - (bounds.y - margin)) / margin;
                }
            }

            let speed = variant_speed(e.variant);
            let steer = (intent + separation * 1.4 + align + wander + repulse).normalize_or_zero();
            let target_vel = steer * speed;

            // Exponential smoothing; turn rate tightens with wave pressure
            let turn_rate = 3.0 + wave as f32 * 0.1;
            let blend = 1.0 - (-turn_rate * dt).exp();
            vel += (target_vel - vel) * blend;

            // Variant ranged gates
            match e.variant {
                EnemyVariant::Shooter => {
                    e.fire_timer -= dt;
                    if e.entered && e.fire_timer <= 0.0 && pos.distance(player_pos) < 380.0 {
                        e.fire_timer = 1.4;
                        emissions.push(Emission::EnemyShot {
                            pos,
                            dir: (player_pos - pos).normalize_or_zero(),
                            speed: 260.0,
                            damage: e.damage * 0.6,
                            owner: id,
                            lifetime: 3.0,
                            radius: 5.0,
                            tank_shot: false,
                        });
                    }
                }
                EnemyVariant::Tank => {
                    e.fire_timer -= dt;
                    if e.entered && e.fire_timer <= 0.0 && pos.distance(player_pos) < 700.0 {
                        e.fire_timer = 5.0;
                        emissions.push(Emission::EnemyShot {
                            pos,
                            dir: (player_pos - pos).normalize_or_zero(),
                            speed: 140.0,
                            damage: e.damage * 1.2,
                            owner: id,
                            lifetime: 12.0,
                            radius: 8.0,
                            tank_shot: true,
                        });
                    }
                }
                _ => {}
            }
        }

        // Pending knockback is an instantaneous impulse
        vel += e.knockback;
        e.knockback = Vec2::ZERO;

        pos += vel * dt;

        // Containment: strays that never entered get culled; everyone else
        // is hard-clamped with per-axis velocity zeroing
        let fully_inside = pos.x >= radius
            && pos.y >= radius
            && pos.x <= bounds.x - radius
            && pos.y <= bounds.y - radius;
        if !e.entered {
            if fully_inside {
                e.entered = true;
            } else if !within_bounds(pos, bounds, 200.0) {
                enemy_ent.active = false;
                log::debug!("culled stray enemy {}", id);
                continue;
            }
        } else {
            clamp_to_bounds(&mut pos, &mut vel, radius, bounds);
        }

        enemy_ent.rotation = vel.y.atan2(vel.x);
        enemy_ent.pos = pos;
        enemy_ent.vel = vel;
    }

    emit_all(session, emissions);
}

/// Boss controller: telegraph -> execute -> recovery, gated by a global
/// attack cooldown, with an orthogonal vulnerability cycle.
#[allow(clippy::too_many_arguments)]
fn boss_update(
    e: &mut EnemyState,
    pos: &mut Vec2,
    vel: &mut Vec2,
    player_pos: Vec2,
    rng: &mut rand_pcg::Pcg32,
    dt: f32,
    emissions: &mut Vec<Emission>,
    id: EntityId,
) {
    let damage = e.damage;
    let Some(boss) = e.boss.as_mut() else {
        return;
    };

    // Vulnerability cycle runs regardless of the attack state
    boss.vuln_timer -= dt;
    if boss.vuln_timer <= 0.0 {
        if boss.vulnerable {
            boss.vulnerable = false;
            boss.vuln_timer = rng.random_range(BOSS_VULN_MIN_INTERVAL..BOSS_VULN_MAX_INTERVAL);
        } else {
            boss.vulnerable = true;
            boss.vuln_timer = BOSS_VULN_DURATION;
            // Opening up interrupts whatever was winding up
            boss.attack = BossAttack::Recovery;
            boss.attack_timer = BOSS_VULN_DURATION;
            log::debug!("boss {} vulnerable", id);
        }
    }

    // Radial ring on a fixed interval, suppressed while vulnerable
    e.fire_timer -= dt;
    if e.fire_timer <= 0.0 {
        e.fire_timer = 4.0;
        if !boss.vulnerable {
            emissions.push(Emission::BossRing {
                pos: *pos,
                damage: damage * 0.5,
                owner: id,
            });
        }
    }

    let to_player = player_pos - *pos;
    let dist = to_player.length();
    let pursuit = to_player.normalize_or_zero();

    match boss.attack {
        BossAttack::Approach => {
            let target = pursuit * variant_speed(EnemyVariant::Boss);
            let blend = 1.0 - (-2.5f32 * dt).exp();
            *vel += (target - *vel) * blend;

            boss.attack_cooldown -= dt;
            if boss.attack_cooldown <= 0.0 {
                // Weighted choice shaped by range
                let roll: f32 = rng.random_range(0.0..1.0);
                if dist < 160.0 && roll < 0.45 {
                    boss.attack = BossAttack::TelegraphSlam;
                    boss.attack_timer = 0.8;
                } else if dist > 320.0 && roll < 0.5 {
                    boss.attack = BossAttack::TelegraphCharge;
                    boss.attack_timer = 1.0;
                    boss.charge_dir = pursuit;
                } else if roll < 0.7 {
                    boss.attack = BossAttack::TelegraphHazard;
                    boss.attack_timer = 0.7;
                } else {
                    boss.attack = BossAttack::Anchor;
                    boss.attack_timer = rng.random_range(0.8..1.6);
                }
            }
        }
        BossAttack::Anchor => {
            *vel = Vec2::ZERO;
            boss.attack_timer -= dt;
            if boss.attack_timer <= 0.0 {
                boss.attack = BossAttack::Approach;
                boss.attack_cooldown = rng.random_range(1.5..2.5);
            }
        }
        BossAttack::TelegraphSlam => {
            *vel = Vec2::ZERO;
            boss.attack_timer -= dt;
            if boss.attack_timer <= 0.0 {
                boss.attack = BossAttack::Slam;
                boss.attack_timer = 0.35;
                emissions.push(Emission::SlamZone {
                    pos: *pos,
                    damage: damage * 1.2,
                });
            }
        }
        BossAttack::Slam => {
            *vel = Vec2::ZERO;
            boss.attack_timer -= dt;
            if boss.attack_timer <= 0.0 {
                boss.attack = BossAttack::Recovery;
                boss.attack_timer = 1.2;
            }
        }
        BossAttack::TelegraphCharge => {
            *vel = Vec2::ZERO;
            boss.attack_timer -= dt;
            if boss.attack_timer <= 0.0 {
                boss.attack = BossAttack::Charge;
                boss.attack_timer = 0.5;
            }
        }
        BossAttack::Charge => {
            // Direction was locked at telegraph start
            *vel = boss.charge_dir * 520.0;
            boss.attack_timer -= dt;
            if boss.attack_timer <= 0.0 {
                boss.attack = BossAttack::Recovery;
                boss.attack_timer = 1.2;
            }
        }
        BossAttack::TelegraphHazard => {
            *vel = Vec2::ZERO;
            boss.attack_timer -= dt;
            if boss.attack_timer <= 0.0 {
                boss.attack = BossAttack::SpawnHazard;
                boss.attack_timer = 0.2;
                for _ in 0..3 {
                    let jitter = Vec2::new(rng.random_range(-90.0..90.0), rng.random_range(-90.0..90.0));
                    emissions.push(Emission::DenialZone {
                        pos: player_pos + jitter,
                        damage: damage * 0.4,
                    });
                }
            }
        }
        BossAttack::SpawnHazard => {
            *vel = Vec2::ZERO;
            boss.attack_timer -= dt;
            if boss.attack_timer <= 0.0 {
                boss.attack = BossAttack::Recovery;
                boss.attack_timer = 1.2;
            }
        }
        BossAttack::Recovery => {
            *vel *= (1.0f32 - 4.0 * dt).max(0.0);
            boss.attack_timer -= dt;
            if boss.attack_timer <= 0.0 {
                boss.attack = BossAttack::Approach;
                boss.attack_cooldown = rng.random_range(2.5..4.0);
            }
        }
    }

    // Mirror the high-level state for systems that only read AiState
    e.ai_state = match boss.attack {
        BossAttack::Approach => AiState::Approach,
        BossAttack::Charge => AiState::Commit,
        _ => AiState::Anchor,
    };
}

fn emit_all(session: &mut GameSession, emissions: Vec<Emission>) {
    for emission in emissions {
        match emission {
            Emission::EnemyShot {
                pos,
                dir,
                speed,
                damage,
                owner,
                lifetime,
                radius,
                tank_shot,
            } => {
                spawn_enemy_shot(session, pos, dir, speed, damage, owner, lifetime, radius, tank_shot);
            }
            Emission::BossRing { pos, damage, owner } => {
                let count = 12;
                for i in 0..count {
                    let angle = std::f32::consts::TAU * i as f32 / count as f32;
                    let dir = Vec2::new(angle.cos(), angle.sin());
                    spawn_enemy_shot(session, pos, dir, 200.0, damage, owner, 4.0, 5.0, false);
                }
            }
            Emission::SlamZone { pos, damage } => {
                spawn_zone(session, pos, 130.0, damage, 0.3, 0.05);
            }
            Emission::DenialZone { pos, damage } => {
                spawn_zone(session, pos, 50.0, damage, 4.0, 0.5);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_enemy_shot(
    session: &mut GameSession,
    pos: Vec2,
    dir: Vec2,
    speed: f32,
    damage: f32,
    owner: EntityId,
    lifetime: f32,
    radius: f32,
    tank_shot: bool,
) {
    let id = session.entities.alloc_id();
    session.entities.add(Entity {
        id,
        pos,
        vel: dir * speed,
        radius,
        active: true,
        tint: 0xff5a5aff,
        rotation: dir.y.atan2(dir.x),
        kind: EntityKind::Projectile(ProjectileState {
            damage,
            owner,
            lifetime,
            age: 0.0,
            pierces_remaining: 0,
            bounces_remaining: 0,
            search_radius: 0.0,
            hit_ids: Vec::new(),
            from_enemy: true,
            shape: if tank_shot {
                ProjectileShape::Slug
            } else {
                ProjectileShape::Round
            },
            marks_target: false,
            tank_shot,
            fragmented: false,
        }),
    });
}

/// Enemy-owned area denial circle
fn spawn_zone(
    session: &mut GameSession,
    pos: Vec2,
    radius: f32,
    damage: f32,
    lifetime: f32,
    tick_interval: f32,
) {
    let id = session.entities.alloc_id();
    session.entities.add(Entity {
        id,
        pos,
        vel: Vec2::ZERO,
        radius,
        active: true,
        tint: 0xc23a3aff,
        rotation: 0.0,
        kind: EntityKind::Hazard(HazardState {
            damage,
            lifetime,
            tick_interval,
            tick_timer: 0.0,
            player_owned: false,
            line: None,
        }),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::EntityClass;

    fn session_with_wave() -> GameSession {
        let mut session = GameSession::new(77);
        session.start_run();
        session.wave = 1;
        session.wave_active = true;
        session.enemies_remaining = 10;
        session.wave_budget = 10;
        session
    }

    #[test]
    fn test_spawner_decrements_budget() {
        let mut session = session_with_wave();
        // Run long enough for several spawn intervals
        for _ in 0..600 {
            update(&mut session, 1.0 / 60.0);
        }
        assert!(session.enemies_remaining < 10);
        assert!(!session.entities.enemies().is_empty());
    }

    #[test]
    fn test_spawner_idle_when_wave_inactive() {
        let mut session = session_with_wave();
        session.wave_active = false;
        for _ in 0..600 {
            update(&mut session, 1.0 / 60.0);
        }
        assert_eq!(session.enemies_remaining, 10);
        assert!(session.entities.enemies().is_empty());
    }

    #[test]
    fn test_enemy_seeks_player() {
        let mut session = session_with_wave();
        let player_pos = session.entities.player().unwrap().pos;
        let id = spawn_enemy_at(&mut session, player_pos + Vec2::new(300.0, 0.0), EnemyVariant::Basic);
        {
            let e = session.entities.get_mut(id).unwrap();
            e.as_enemy_mut().unwrap().entered = true;
            e.as_enemy_mut().unwrap().ai_state = AiState::Commit;
        }
        let d0 = session.entities.get(id).unwrap().pos.distance(player_pos);
        for _ in 0..120 {
            update(&mut session, 1.0 / 60.0);
        }
        let d1 = session.entities.get(id).unwrap().pos.distance(player_pos);
        assert!(d1 < d0, "enemy should close distance ({} -> {})", d0, d1);
    }

    #[test]
    fn test_entered_enemy_clamped_to_bounds() {
        let mut session = session_with_wave();
        let id = spawn_enemy_at(&mut session, Vec2::new(100.0, 100.0), EnemyVariant::Basic);
        {
            let e = session.entities.get_mut(id).unwrap();
            e.as_enemy_mut().unwrap().entered = true;
            e.pos = Vec2::new(-50.0, 100.0);
        }
        update(&mut session, 1.0 / 60.0);
        let e = session.entities.get(id).unwrap();
        assert!(e.pos.x >= e.radius);
    }

    #[test]
    fn test_stray_enemy_soft_culled() {
        let mut session = session_with_wave();
        let id = spawn_enemy_at(&mut session, Vec2::new(-600.0, 100.0), EnemyVariant::Basic);
        update(&mut session, 1.0 / 60.0);
        assert!(!session.entities.get(id).unwrap().active);
    }

    #[test]
    fn test_knockback_is_one_shot_impulse() {
        let mut session = session_with_wave();
        let id = spawn_enemy_at(&mut session, Vec2::new(600.0, 300.0), EnemyVariant::Basic);
        {
            let e = session.entities.get_mut(id).unwrap();
            e.as_enemy_mut().unwrap().entered = true;
            e.as_enemy_mut().unwrap().knockback = Vec2::new(500.0, 0.0);
        }
        update(&mut session, 1.0 / 60.0);
        let e = session.entities.get(id).unwrap();
        assert_eq!(e.as_enemy().unwrap().knockback, Vec2::ZERO);
        assert!(e.vel.x > 100.0);
    }

    #[test]
    fn test_boss_vulnerability_cycle() {
        let mut session = session_with_wave();
        session.difficulty = 1.0;
        let id = spawn_enemy_at(&mut session, Vec2::new(600.0, 300.0), EnemyVariant::Boss);
        {
            let e = session.entities.get_mut(id).unwrap();
            e.as_enemy_mut().unwrap().entered = true;
        }

        // Walk the clock past the longest possible normal phase
        let mut saw_vulnerable = false;
        let mut saw_recovered = false;
        for _ in 0..(14.0 * 60.0) as u32 {
            update(&mut session, 1.0 / 60.0);
            let boss = session
                .entities
                .get(id)
                .unwrap()
                .as_enemy()
                .unwrap()
                .boss
                .clone()
                .unwrap();
            if boss.vulnerable {
                saw_vulnerable = true;
                // Vulnerability forces the FSM into recovery-adjacent idling
                assert!(matches!(
                    boss.attack,
                    BossAttack::Recovery | BossAttack::Approach | BossAttack::Anchor
                ));
            } else if saw_vulnerable {
                saw_recovered = true;
                break;
            }
        }
        assert!(saw_vulnerable, "boss never opened its vulnerability window");
        assert!(saw_recovered, "boss never closed its vulnerability window");
    }

    #[test]
    fn test_boss_ring_suppressed_while_vulnerable() {
        let mut session = session_with_wave();
        let id = spawn_enemy_at(&mut session, Vec2::new(600.0, 300.0), EnemyVariant::Boss);
        {
            let e = session.entities.get_mut(id).unwrap();
            e.as_enemy_mut().unwrap().entered = true;
            let enemy = e.as_enemy_mut().unwrap();
            enemy.fire_timer = 0.0;
            let boss = enemy.boss.as_mut().unwrap();
            boss.vulnerable = true;
            boss.vuln_timer = 10.0;
        }
        update(&mut session, 1.0 / 60.0);
        assert_eq!(
            session.entities.by_class(EntityClass::Projectile).len(),
            0,
            "vulnerable boss must not fire its ring"
        );
    }

    #[test]
    fn test_shooter_fires_in_range() {
        let mut session = session_with_wave();
        let player_pos = session.entities.player().unwrap().pos;
        let id = spawn_enemy_at(&mut session, player_pos + Vec2::new(200.0, 0.0), EnemyVariant::Shooter);
        {
            let e = session.entities.get_mut(id).unwrap();
            e.as_enemy_mut().unwrap().entered = true;
            e.as_enemy_mut().unwrap().fire_timer = 0.0;
        }
        update(&mut session, 1.0 / 60.0);
        let shots = session.entities.by_class(EntityClass::Projectile);
        assert_eq!(shots.len(), 1);
        assert!(shots[0].as_projectile().unwrap().from_enemy);
    }

    #[test]
    fn test_tank_heavy_shot_flagged() {
        let mut session = session_with_wave();
        let player_pos = session.entities.player().unwrap().pos;
        let id = spawn_enemy_at(&mut session, player_pos + Vec2::new(300.0, 0.0), EnemyVariant::Tank);
        {
            let e = session.entities.get_mut(id).unwrap();
            e.as_enemy_mut().unwrap().entered = true;
            e.as_enemy_mut().unwrap().fire_timer = 0.0;
        }
        update(&mut session, 1.0 / 60.0);
        let shots = session.entities.by_class(EntityClass::Projectile);
        assert_eq!(shots.len(), 1);
        assert!(shots[0].as_projectile().unwrap().tank_shot);
    }
}
