//! Player controller
//!
//! Integrates movement intent, aiming, the dash state machine (with
//! fatigue), reload handling, and the area ability. Firing itself is the
//! projectile mover's job; this system only computes `wants_to_fire`.

use glam::Vec2;

use crate::consts::*;
use crate::meta;

use super::entity::{EntityKind, EnemyVariant, HazardState};
use super::state::{clamp_to_bounds, FrameInput, GameSession};

/// Knockback impulse magnitude of the area ability per enemy variant
fn ability_knockback(variant: EnemyVariant) -> f32 {
    match variant {
        EnemyVariant::Boss => 40.0,
        EnemyVariant::Tank => 120.0,
        _ => 260.0,
    }
}

pub fn update(session: &mut GameSession, input: &FrameInput, dt: f32) {
    let perk = session.meta.equipped_perk;
    let bounds = session.bounds;

    // Deferred store work collected while the player is mutably borrowed
    let mut start_trail_at: Option<Vec2> = None;
    let mut extend_trail: Option<(u32, Vec2)> = None;
    let mut ability_at: Option<Vec2> = None;

    let Some(player_ent) = session.entities.player_mut() else {
        return;
    };
    let mut pos = player_ent.pos;
    let mut vel;
    let EntityKind::Player(ref mut p) = player_ent.kind else {
        return;
    };

    // Timers
    p.ability_cooldown = (p.ability_cooldown - dt).max(0.0);
    p.ability_flash = (p.ability_flash - dt).max(0.0);
    p.invuln_timer = (p.invuln_timer - dt).max(0.0);
    p.post_dash_buff = (p.post_dash_buff - dt).max(0.0);
    if p.dash.fatigue > 0.0 {
        p.dash.fatigue = (p.dash.fatigue - DASH_FATIGUE_DECAY * dt).max(0.0);
    }
    if p.dash.charges < p.dash.max_charges {
        p.dash.cooldown -= dt;
        if p.dash.cooldown <= 0.0 {
            p.dash.charges += 1;
            p.dash.cooldown = DASH_COOLDOWN;
        }
    }

    // Slow effects last a single tick; hazards re-apply while overlapped
    let slow = p.slow_mult;
    p.slow_mult = 1.0;

    // Dash start: gated on unlock, charge count, and not already dashing
    if input.dash && p.dash.unlocked && !p.dash.dashing && p.dash.charges > 0 {
        let aim_dir = (input.aim - pos).normalize_or_zero();
        let dir = if aim_dir.length_squared() > 0.0 {
            aim_dir
        } else if input.move_dir.length_squared() > 0.0 {
            input.move_dir.normalize_or_zero()
        } else {
            Vec2::X
        };
        // Effectiveness from fatigue as it stood before this dash
        let effect = (1.0 - p.dash.fatigue * (1.0 - DASH_MIN_EFFECT)).max(DASH_MIN_EFFECT);
        p.dash.charges -= 1;
        p.dash.fatigue = (p.dash.fatigue + DASH_FATIGUE_STEP).min(1.0);
        p.dash.dashing = true;
        p.dash.dir = dir;
        p.dash.timer = p.dash.duration * effect;
        p.dash.cooldown = DASH_COOLDOWN;
        p.invuln_timer = p.invuln_timer.max(p.dash.timer);
        start_trail_at = Some(pos);
        meta::on_dash(p, perk);
    }

    if p.dash.dashing {
        let effect = (1.0 - p.dash.fatigue * (1.0 - DASH_MIN_EFFECT)).max(DASH_MIN_EFFECT);
        vel = p.dash.dir * DASH_SPEED * effect;
        p.dash.timer -= dt;
        if p.dash.timer <= 0.0 {
            p.dash.dashing = false;
            p.dash.trail_id = None;
            if p.post_dash_damage > 0.0 {
                p.post_dash_buff = 1.5;
            }
        }
    } else {
        // Velocity is recomputed from intent every tick, never accumulated
        vel = input.move_dir.normalize_or_zero() * p.speed * slow;
    }

    // Stationary mitigation arms after standing still long enough
    if !p.dash.dashing && input.move_dir.length_squared() < 0.0001 {
        p.stationary_timer += dt;
    } else {
        p.stationary_timer = 0.0;
    }

    pos += vel * dt;

    p.wants_to_fire = input.fire && !p.dash.dashing;

    // Reload: automatic on empty, manual on request, never while reloading
    if p.reloading {
        p.reload_timer -= dt;
        if p.reload_timer <= 0.0 {
            p.ammo = p.max_ammo;
            p.reloading = false;
        }
    } else if p.ammo == 0 || (input.reload && p.ammo < p.max_ammo) {
        p.reloading = true;
        p.reload_timer = RELOAD_TIME;
    }

    // Area ability
    if input.ability && p.ability_cooldown <= 0.0 {
        p.ability_cooldown = ABILITY_COOLDOWN;
        p.ability_flash = 0.35;
        ability_at = Some(pos);
    }

    if p.dash.dashing {
        if let Some(trail) = p.dash.trail_id {
            extend_trail = Some((trail, pos));
        }
    }

    player_ent.rotation = crate::angle_to(pos, input.aim);
    clamp_to_bounds(&mut pos, &mut vel, player_ent.radius, bounds);
    player_ent.vel = vel;
    player_ent.pos = pos;
    let player_pos = pos;

    // Spawn the dash trail hazard and record its id on the player
    if let Some(start) = start_trail_at {
        let trail_damage = session
            .entities
            .player()
            .and_then(|e| e.as_player())
            .map(|p| p.trail_damage)
            .unwrap_or(DASH_TRAIL_DAMAGE);
        let hid = session.entities.alloc_id();
        session.entities.add(super::entity::Entity {
            id: hid,
            pos: start,
            vel: Vec2::ZERO,
            radius: 10.0,
            active: true,
            tint: 0x8effc1ff,
            rotation: 0.0,
            kind: EntityKind::Hazard(HazardState {
                damage: trail_damage,
                lifetime: DASH_TRAIL_LIFETIME,
                tick_interval: 0.25,
                tick_timer: 0.0,
                player_owned: true,
                line: Some((start, start)),
            }),
        });
        if let Some(p) = session.entities.player_mut().and_then(|e| e.as_player_mut()) {
            p.dash.trail_id = Some(hid);
        }
        extend_trail = Some((hid, player_pos));
    }

    // Grow the trail segment to the player's current position
    if let Some((trail, end)) = extend_trail {
        if let Some(h) = session.entities.get_mut(trail).and_then(|e| e.as_hazard_mut()) {
            if let Some((from, _)) = h.line {
                h.line = Some((from, end));
            }
        }
    }

    // Area ability: knockback plus direct damage to everything in radius.
    // Deaths are settled by the damage resolver's end-of-tick sweep.
    if let Some(center) = ability_at {
        for enemy in session.entities.enemies_mut() {
            if !enemy.active || center.distance(enemy.pos) > ABILITY_RADIUS {
                continue;
            }
            let away = (enemy.pos - center).normalize_or_zero();
            if let Some(e) = enemy.as_enemy_mut() {
                e.knockback += away * ability_knockback(e.variant);
                e.health -= ABILITY_DAMAGE;
            }
        }
        log::debug!("area ability fired at {:?}", center);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn playing_session() -> GameSession {
        let mut session = GameSession::new(11);
        session.start_run();
        session
    }

    fn player_state(session: &GameSession) -> &super::super::entity::PlayerState {
        session.entities.player().unwrap().as_player().unwrap()
    }

    fn unlock_dash(session: &mut GameSession) {
        let p = session
            .entities
            .player_mut()
            .unwrap()
            .as_player_mut()
            .unwrap();
        p.dash.unlocked = true;
        p.dash.charges = 3;
        p.dash.max_charges = 3;
    }

    #[test]
    fn test_movement_scales_with_speed() {
        let mut session = playing_session();
        let input = FrameInput {
            move_dir: Vec2::new(1.0, 0.0),
            aim: Vec2::new(900.0, 360.0),
            ..Default::default()
        };
        let x0 = session.entities.player().unwrap().pos.x;
        update(&mut session, &input, 0.1);
        let x1 = session.entities.player().unwrap().pos.x;
        let speed = player_state(&session).speed;
        assert!((x1 - x0 - speed * 0.1).abs() < 0.01);
    }

    #[test]
    fn test_position_clamped_to_arena() {
        let mut session = playing_session();
        session.entities.player_mut().unwrap().pos = Vec2::new(5.0, 5.0);
        let input = FrameInput {
            move_dir: Vec2::new(-1.0, -1.0),
            ..Default::default()
        };
        update(&mut session, &input, 0.5);
        let pos = session.entities.player().unwrap().pos;
        assert!(pos.x >= PLAYER_RADIUS);
        assert!(pos.y >= PLAYER_RADIUS);
    }

    #[test]
    fn test_dash_consumes_charge_and_blocks_fire() {
        let mut session = playing_session();
        unlock_dash(&mut session);
        let input = FrameInput {
            dash: true,
            fire: true,
            aim: Vec2::new(1000.0, 360.0),
            ..Default::default()
        };
        update(&mut session, &input, 1.0 / 60.0);
        let p = player_state(&session);
        assert!(p.dash.dashing);
        assert_eq!(p.dash.charges, 2);
        assert!(!p.wants_to_fire);
        assert!(p.dash.trail_id.is_some());
    }

    #[test]
    fn test_dash_fatigue_step_and_cap() {
        let mut session = playing_session();
        unlock_dash(&mut session);
        let input = FrameInput {
            dash: true,
            aim: Vec2::new(1000.0, 360.0),
            ..Default::default()
        };
        update(&mut session, &input, 1.0 / 60.0);
        let f1 = player_state(&session).dash.fatigue;
        assert!((f1 - DASH_FATIGUE_STEP).abs() < 0.01);

        // Force-complete the dash and dash twice more: fatigue caps at 1.0
        for _ in 0..2 {
            {
                let p = session
                    .entities
                    .player_mut()
                    .unwrap()
                    .as_player_mut()
                    .unwrap();
                p.dash.dashing = false;
                p.dash.charges = 1;
            }
            update(&mut session, &input, 1.0 / 60.0);
        }
        assert!(player_state(&session).dash.fatigue <= 1.0);
    }

    #[test]
    fn test_fatigue_decays_but_never_negative() {
        let mut session = playing_session();
        {
            let p = session
                .entities
                .player_mut()
                .unwrap()
                .as_player_mut()
                .unwrap();
            p.dash.fatigue = 0.1;
        }
        let input = FrameInput::default();
        for _ in 0..120 {
            update(&mut session, &input, 1.0 / 60.0);
        }
        let f = player_state(&session).dash.fatigue;
        assert!(f >= 0.0);
        assert!(f < 0.001);
    }

    #[test]
    fn test_auto_reload_on_empty() {
        let mut session = playing_session();
        {
            let p = session
                .entities
                .player_mut()
                .unwrap()
                .as_player_mut()
                .unwrap();
            p.ammo = 0;
        }
        update(&mut session, &FrameInput::default(), 1.0 / 60.0);
        assert!(player_state(&session).reloading);

        // Run out the reload timer
        for _ in 0..80 {
            update(&mut session, &FrameInput::default(), 1.0 / 60.0);
        }
        let p = player_state(&session);
        assert!(!p.reloading);
        assert_eq!(p.ammo, p.max_ammo);
    }

    #[test]
    fn test_manual_reload_blocked_while_reloading() {
        let mut session = playing_session();
        {
            let p = session
                .entities
                .player_mut()
                .unwrap()
                .as_player_mut()
                .unwrap();
            p.ammo = 3;
        }
        let reload = FrameInput {
            reload: true,
            ..Default::default()
        };
        update(&mut session, &reload, 1.0 / 60.0);
        let t1 = player_state(&session).reload_timer;
        update(&mut session, &reload, 1.0 / 60.0);
        let t2 = player_state(&session).reload_timer;
        // A second request must not restart the timer
        assert!(t2 < t1);
    }

    #[test]
    fn test_ability_damages_and_knocks_back() {
        let mut session = playing_session();
        let center = session.entities.player().unwrap().pos;
        crate::sim::enemy::spawn_enemy_at(
            &mut session,
            center + Vec2::new(40.0, 0.0),
            EnemyVariant::Basic,
        );
        let hp0 = session.entities.enemies()[0].as_enemy().unwrap().health;
        let input = FrameInput {
            ability: true,
            ..Default::default()
        };
        update(&mut session, &input, 1.0 / 60.0);
        let e = session.entities.enemies()[0].as_enemy().unwrap();
        assert!(e.health < hp0);
        assert!(e.knockback.x > 0.0);
        assert!(player_state(&session).ability_cooldown > 0.0);
    }

    proptest! {
        #[test]
        fn prop_fatigue_bounded(dashes in 1usize..20, idle_ticks in 0usize..200) {
            let mut session = playing_session();
            unlock_dash(&mut session);
            let dash_input = FrameInput {
                dash: true,
                aim: Vec2::new(1000.0, 360.0),
                ..Default::default()
            };
            for _ in 0..dashes {
                {
                    let p = session.entities.player_mut().unwrap().as_player_mut().unwrap();
                    p.dash.dashing = false;
                    p.dash.charges = 1;
                }
                update(&mut session, &dash_input, 1.0 / 60.0);
                let f = player_state(&session).dash.fatigue;
                prop_assert!((0.0..=1.0).contains(&f));
            }
            for _ in 0..idle_ticks {
                update(&mut session, &FrameInput::default(), 1.0 / 60.0);
                let f = player_state(&session).dash.fatigue;
                prop_assert!((0.0..=1.0).contains(&f));
            }
        }
    }
}
