//! Collision resolver
//!
//! Rebuilds the broadphase from active enemies, separates overlapping
//! bodies, and emits typed hit events. Combat rules live entirely in the
//! damage resolver; this system never touches health, score, or active
//! flags.

use std::collections::HashMap;

use glam::Vec2;

use super::entity::{EntityId, EntityKind};
use super::state::{EnemyShotHit, GameSession, PlayerContact, ProjectileHit};

/// Effective player radius grows while a shield charge is up
const SHIELD_RADIUS_BONUS: f32 = 6.0;

pub fn update(session: &mut GameSession) {
    session.events.clear();

    // Rebuild the enemy broadphase
    session.grid.clear();
    {
        let grid = &mut session.grid;
        for e in session.entities.enemies() {
            if e.active {
                grid.insert(e.id, e.pos, e.radius);
            }
        }
    }

    separate_enemies(session);
    resolve_player_contacts(session);
    collect_projectile_hits(session);
}

/// Pairwise overlap resolution: each body absorbs half the penetration
fn separate_enemies(session: &mut GameSession) {
    let id_to_index: HashMap<EntityId, usize> = session
        .entities
        .enemies()
        .iter()
        .enumerate()
        .map(|(i, e)| (e.id, i))
        .collect();

    // (index, candidate indices) pairs gathered against the fresh grid
    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for (i, e) in session.entities.enemies().iter().enumerate() {
        if !e.active {
            continue;
        }
        for nid in session.grid.query(e.pos, e.radius * 2.0) {
            if let Some(&j) = id_to_index.get(&nid) {
                if j > i && session.entities.enemies()[j].active {
                    pairs.push((i, j));
                }
            }
        }
    }

    let enemies = session.entities.enemies_mut();
    for (i, j) in pairs {
        let (a_pos, a_radius) = (enemies[i].pos, enemies[i].radius);
        let (b_pos, b_radius) = (enemies[j].pos, enemies[j].radius);
        let delta = b_pos - a_pos;
        let dist = delta.length();
        let min_dist = a_radius + b_radius;
        if dist >= min_dist {
            continue;
        }
        let normal = if dist > 0.001 { delta / dist } else { Vec2::X };
        let push = normal * (min_dist - dist) * 0.5;
        enemies[i].pos -= push;
        enemies[j].pos += push;
    }
}

/// Push overlapping enemies fully out of the player and record contacts
fn resolve_player_contacts(session: &mut GameSession) {
    let Some(player) = session.entities.player() else {
        return;
    };
    let player_pos = player.pos;
    let mut effective_radius = player.radius;
    if let Some(p) = player.as_player() {
        if p.shield.current > 0 {
            effective_radius += SHIELD_RADIUS_BONUS;
        }
    }

    let mut contacts: Vec<PlayerContact> = Vec::new();
    for enemy in session.entities.enemies_mut() {
        if !enemy.active {
            continue;
        }
        let delta = enemy.pos - player_pos;
        let dist = delta.length();
        let min_dist = effective_radius + enemy.radius;
        if dist >= min_dist {
            continue;
        }
        // Enemy absorbs the full correction; the player is never displaced
        let normal = if dist > 0.001 { delta / dist } else { Vec2::X };
        enemy.pos = player_pos + normal * min_dist;
        contacts.push(PlayerContact { enemy_id: enemy.id });
    }
    session.events.player_contacts = contacts;
}

/// Circle-overlap projectile tests: grid query on the enemy side, direct
/// distance check on the player side
fn collect_projectile_hits(session: &mut GameSession) {
    let player_info = session.entities.player().map(|p| (p.pos, p.radius));

    let mut hits: Vec<ProjectileHit> = Vec::new();
    let mut player_hits: Vec<EnemyShotHit> = Vec::new();

    // Enemy lookup for narrowphase confirmation
    let enemy_circle: HashMap<EntityId, (Vec2, f32)> = session
        .entities
        .enemies()
        .iter()
        .filter(|e| e.active)
        .map(|e| (e.id, (e.pos, e.radius)))
        .collect();

    for proj_ent in session.entities.projectiles() {
        if !proj_ent.active {
            continue;
        }
        let EntityKind::Projectile(ref proj) = proj_ent.kind else {
            continue;
        };
        if proj.from_enemy {
            if let Some((ppos, pradius)) = player_info {
                if proj_ent.pos.distance(ppos) < proj_ent.radius + pradius {
                    player_hits.push(EnemyShotHit {
                        projectile_id: proj_ent.id,
                    });
                }
            }
        } else {
            for candidate in session.grid.query(proj_ent.pos, proj_ent.radius + 40.0) {
                if proj.hit_ids.contains(&candidate) {
                    continue;
                }
                if let Some(&(epos, eradius)) = enemy_circle.get(&candidate) {
                    if proj_ent.pos.distance(epos) < proj_ent.radius + eradius {
                        hits.push(ProjectileHit {
                            projectile_id: proj_ent.id,
                            enemy_id: candidate,
                        });
                    }
                }
            }
        }
    }

    session.events.projectile_hits = hits;
    session.events.enemy_shot_hits = player_hits;
}
