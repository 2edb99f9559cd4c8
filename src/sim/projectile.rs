//! Projectile mover and player fire control
//!
//! Spawns volleys (one projectile per stream across a spread angle), runs
//! the micro-delayed burst queue for multi-shot, integrates all projectile
//! motion, and expires projectiles by lifetime and bounds. The enemy tank's
//! heavy shot fragments into a ring if it survives long enough unbranched.
//! Hazard lifetimes are owned by the damage resolver, not this system.

use glam::Vec2;

use crate::consts::*;

use super::entity::{Entity, EntityId, EntityKind, ProjectileShape, ProjectileState};
use super::state::{within_bounds, GameSession};
use super::upgrades::Family;

struct VolleySpec {
    origin: Vec2,
    aim: f32,
    damage: f32,
    streams: u32,
    piercing: u32,
    bounces: u32,
    marks_target: bool,
}

/// Spawn one volley: `streams` projectiles fanned across the spread angle
fn spawn_volley(session: &mut GameSession, spec: &VolleySpec) {
    let owner = session.player_id().unwrap_or(0);
    for s in 0..spec.streams {
        let offset = if spec.streams > 1 {
            VOLLEY_SPREAD * (s as f32 / (spec.streams - 1) as f32 - 0.5)
        } else {
            0.0
        };
        let angle = spec.aim + offset;
        let dir = Vec2::new(angle.cos(), angle.sin());
        let id = session.entities.alloc_id();
        session.entities.add(Entity {
            id,
            pos: spec.origin + dir * (PLAYER_RADIUS + 4.0),
            vel: dir * PROJECTILE_SPEED,
            radius: PROJECTILE_RADIUS,
            active: true,
            tint: 0xffe08aff,
            rotation: angle,
            kind: EntityKind::Projectile(ProjectileState {
                damage: spec.damage,
                owner,
                lifetime: PROJECTILE_LIFETIME,
                age: 0.0,
                pierces_remaining: spec.piercing,
                bounces_remaining: spec.bounces,
                search_radius: RICOCHET_SEARCH_RADIUS,
                hit_ids: Vec::new(),
                from_enemy: false,
                shape: ProjectileShape::Round,
                marks_target: spec.marks_target,
                tank_shot: false,
                fragmented: false,
            }),
        });
    }
}

pub fn update(session: &mut GameSession, dt: f32) {
    let offense_tier = session.upgrades.synergy_tier(Family::Bullets);

    // --- Player fire control ---
    let mut volley: Option<VolleySpec> = None;
    if let Some(player_ent) = session.entities.player_mut() {
        let origin = player_ent.pos;
        let aim = player_ent.rotation;
        if let EntityKind::Player(ref mut p) = player_ent.kind {
            p.fire_cooldown -= dt;

            let trigger_pulled =
                p.wants_to_fire && p.fire_cooldown <= 0.0 && p.ammo > 0 && !p.reloading;
            let burst_due = session.pending_shots > 0 && {
                session.shot_timer -= dt;
                session.shot_timer <= 0.0
            };

            if trigger_pulled || burst_due {
                if trigger_pulled {
                    p.fire_cooldown = 1.0 / p.fire_rate.max(0.1);
                    p.ammo -= 1;
                    // Remaining burst shots owe no ammo; the pull paid for them
                    session.pending_shots = p.projectile_count.saturating_sub(1);
                } else {
                    session.pending_shots -= 1;
                }
                session.shot_timer = BURST_SPACING;

                p.shots_fired += 1;
                let marks_target = offense_tier >= 2 && p.shots_fired.is_multiple_of(5);

                // Kinetic charge is spent entirely on the next volley
                let mut damage = p.damage;
                if p.kinetic_charge > 0.0 {
                    damage *= 1.0 + 0.5 * p.kinetic_charge;
                    p.kinetic_charge = 0.0;
                }

                volley = Some(VolleySpec {
                    origin,
                    aim,
                    damage,
                    streams: p.streams.max(1),
                    piercing: p.piercing,
                    bounces: p.ricochet_bounces,
                    marks_target,
                });
            }
        }
    } else {
        session.pending_shots = 0;
    }
    if let Some(spec) = volley {
        spawn_volley(session, &spec);
    }

    // --- Motion, aging, expiry ---
    let bounds = session.bounds;
    let mut fragment_at: Vec<(Vec2, f32, EntityId)> = Vec::new();
    for proj_ent in session.entities.projectiles_mut() {
        if !proj_ent.active {
            continue;
        }
        proj_ent.pos += proj_ent.vel * dt;
        let pos = proj_ent.pos;
        let in_bounds = within_bounds(pos, bounds, 32.0);
        if let EntityKind::Projectile(ref mut proj) = proj_ent.kind {
            proj.age += dt;
            proj.lifetime -= dt;
            if proj.lifetime <= 0.0 || !in_bounds {
                proj_ent.active = false;
                continue;
            }
            // One-time, non-recursive fragment burst
            if proj.tank_shot && !proj.fragmented && proj.age >= TANK_SHOT_FRAGMENT_AGE {
                proj.fragmented = true;
                proj_ent.active = false;
                fragment_at.push((pos, proj.damage, proj.owner));
            }
        }
    }

    for (pos, damage, owner) in fragment_at {
        spawn_tank_fragments(session, pos, damage, owner);
    }
}

/// Ring of faster, shorter-lived, lower-damage shards
fn spawn_tank_fragments(session: &mut GameSession, pos: Vec2, damage: f32, owner: EntityId) {
    for i in 0..TANK_SHOT_FRAGMENTS {
        let angle = std::f32::consts::TAU * i as f32 / TANK_SHOT_FRAGMENTS as f32;
        let dir = Vec2::new(angle.cos(), angle.sin());
        let id = session.entities.alloc_id();
        session.entities.add(Entity {
            id,
            pos,
            vel: dir * PROJECTILE_SPEED * 0.9,
            radius: PROJECTILE_RADIUS * 0.75,
            active: true,
            tint: 0xff9a5aff,
            rotation: angle,
            kind: EntityKind::Projectile(ProjectileState {
                damage: (damage * 0.4).max(1.0),
                owner,
                lifetime: 0.9,
                age: 0.0,
                pierces_remaining: 0,
                bounces_remaining: 0,
                search_radius: 0.0,
                hit_ids: Vec::new(),
                from_enemy: true,
                shape: ProjectileShape::Shard,
                marks_target: false,
                tank_shot: false,
                fragmented: true,
            }),
        });
    }
    log::debug!("tank shot fragmented at {:?}", pos);
}
