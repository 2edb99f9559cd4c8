//! Entity model and storage
//!
//! Every live object in the arena is an `Entity`: a common header plus a
//! closed `EntityKind` sum. Systems match exhaustively on the kind, so a new
//! variant breaks every call site at compile time rather than at runtime.
//! Cross-references between entities are stored as ids and resolved through
//! the `EntityStore`; entity lifetime is controlled solely by the store.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;

pub type EntityId = u32;

/// Discriminant-only view of `EntityKind`, used for bucket selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityClass {
    Player,
    Enemy,
    Projectile,
    Particle,
    Hazard,
}

/// Enemy variants, in spawn-weight order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyVariant {
    Basic,
    Fast,
    Tank,
    Shooter,
    Boss,
}

/// High-level steering state for regular enemies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiState {
    /// Orbit-biased closing movement
    Approach,
    /// Pure pursuit
    Commit,
    /// Hold position (boss idling between attacks)
    Anchor,
}

/// Boss attack controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BossAttack {
    Approach,
    Anchor,
    TelegraphSlam,
    Slam,
    TelegraphCharge,
    Charge,
    TelegraphHazard,
    SpawnHazard,
    Recovery,
}

/// Boss-only controller fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BossState {
    pub attack: BossAttack,
    /// Time remaining in the current attack state
    pub attack_timer: f32,
    /// Global gate between attack choices
    pub attack_cooldown: f32,
    pub vulnerable: bool,
    /// Counts down to the next vulnerability toggle
    pub vuln_timer: f32,
    /// Direction locked during the charge telegraph
    pub charge_dir: Vec2,
}

impl BossState {
    pub fn new(first_vuln_in: f32) -> Self {
        Self {
            attack: BossAttack::Approach,
            attack_timer: 0.0,
            attack_cooldown: 2.5,
            vulnerable: false,
            vuln_timer: first_vuln_in,
            charge_dir: Vec2::ZERO,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemyState {
    pub variant: EnemyVariant,
    pub health: f32,
    pub max_health: f32,
    pub damage: f32,
    pub score_value: u64,
    /// Pending knockback impulse, drained by the steering integrator
    pub knockback: Vec2,
    pub ai_state: AiState,
    pub state_timer: f32,
    /// +1.0 or -1.0, flipped occasionally by the FSM
    pub orbit_dir: f32,
    /// Set once the enemy has fully crossed into the arena
    pub entered: bool,
    /// Vulnerability debuff applied by offense synergy (seconds remaining)
    pub marked_timer: f32,
    /// Ranged attack gate (Tank/Shooter/Boss)
    pub fire_timer: f32,
    pub boss: Option<BossState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectileShape {
    Round,
    Slug,
    Shard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileState {
    pub damage: f32,
    pub owner: EntityId,
    pub lifetime: f32,
    pub age: f32,
    pub pierces_remaining: u32,
    pub bounces_remaining: u32,
    /// Radius searched for the next ricochet target
    pub search_radius: f32,
    /// Ids already damaged by this projectile or its ricochet chain
    pub hit_ids: Vec<EntityId>,
    pub from_enemy: bool,
    pub shape: ProjectileShape,
    /// Applies the offense-synergy vulnerability debuff on hit
    pub marks_target: bool,
    /// Heavy tank shot: fragments into a ring if it survives unbranched
    pub tank_shot: bool,
    pub fragmented: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardState {
    pub damage: f32,
    pub lifetime: f32,
    pub tick_interval: f32,
    pub tick_timer: f32,
    /// Player trail vs enemy area denial
    pub player_owned: bool,
    /// Swept-line geometry for dash trails; circular hazards leave this None
    pub line: Option<(Vec2, Vec2)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleState {
    pub life: f32,
    pub size: f32,
}

/// Dash ability state machine fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashState {
    pub unlocked: bool,
    pub charges: u32,
    pub max_charges: u32,
    pub cooldown: f32,
    /// Nominal dash duration before fatigue scaling
    pub duration: f32,
    /// Accumulated fatigue in [0, 1]; reduces dash speed and duration
    pub fatigue: f32,
    pub dashing: bool,
    pub timer: f32,
    pub dir: Vec2,
    /// Active trail hazard, resolved through the store (never a reference)
    pub trail_id: Option<EntityId>,
}

impl Default for DashState {
    fn default() -> Self {
        Self {
            unlocked: false,
            charges: 1,
            max_charges: 1,
            cooldown: 0.0,
            duration: DASH_DURATION,
            fatigue: 0.0,
            dashing: false,
            timer: 0.0,
            dir: Vec2::ZERO,
            trail_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ShieldState {
    pub current: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub health: f32,
    pub max_health: f32,
    pub ammo: u32,
    pub max_ammo: u32,
    pub reload_timer: f32,
    pub reloading: bool,
    pub fire_cooldown: f32,
    pub wants_to_fire: bool,

    // Upgradeable stats
    pub damage: f32,
    pub fire_rate: f32,
    pub speed: f32,
    pub piercing: u32,
    pub ricochet_bounces: u32,
    pub projectile_count: u32,
    pub streams: u32,
    pub dodge_chance: f32,
    pub damage_reduction: f32,
    pub thorns_damage: f32,
    /// Kill (non-boss) or bonus-damage threshold as a health fraction
    pub execute_threshold: f32,
    pub execute_bonus: f32,
    /// Fraction of missing health restored on wave clear
    pub heal_on_clear_pct: f32,
    /// Chance a kill refills one shield charge
    pub siphon_chance: f32,
    /// Bonus damage multiplier while the post-dash buff timer runs
    pub post_dash_damage: f32,
    pub trail_damage: f32,
    /// Extra mitigation once the stationary timer has armed
    pub stationary_bonus: f32,

    pub dash: DashState,
    pub shield: ShieldState,
    pub ability_cooldown: f32,
    /// Render pulse timer armed when the area ability fires
    pub ability_flash: f32,

    // Transient combat bookkeeping
    pub post_dash_buff: f32,
    pub last_target: Option<EntityId>,
    pub focus_stacks: u32,
    pub shots_fired: u32,
    pub invuln_timer: f32,
    pub stationary_timer: f32,
    pub slow_mult: f32,
    /// Perk scratch: charge built by dashing, spent on the next volley
    pub kinetic_charge: f32,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            health: PLAYER_BASE_HEALTH,
            max_health: PLAYER_BASE_HEALTH,
            ammo: PLAYER_BASE_AMMO,
            max_ammo: PLAYER_BASE_AMMO,
            reload_timer: 0.0,
            reloading: false,
            fire_cooldown: 0.0,
            wants_to_fire: false,
            damage: PLAYER_BASE_DAMAGE,
            fire_rate: PLAYER_BASE_FIRE_RATE,
            speed: PLAYER_BASE_SPEED,
            piercing: 0,
            ricochet_bounces: 0,
            projectile_count: 1,
            streams: 1,
            dodge_chance: 0.0,
            damage_reduction: 0.0,
            thorns_damage: 0.0,
            execute_threshold: 0.0,
            execute_bonus: 0.0,
            heal_on_clear_pct: 0.2,
            siphon_chance: 0.0,
            post_dash_damage: 0.0,
            trail_damage: DASH_TRAIL_DAMAGE,
            stationary_bonus: STATIONARY_MITIGATION,
            dash: DashState::default(),
            shield: ShieldState::default(),
            ability_cooldown: 0.0,
            ability_flash: 0.0,
            post_dash_buff: 0.0,
            last_target: None,
            focus_stacks: 0,
            shots_fired: 0,
            invuln_timer: 0.0,
            stationary_timer: 0.0,
            slow_mult: 1.0,
            kinetic_charge: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EntityKind {
    Player(PlayerState),
    Enemy(EnemyState),
    Projectile(ProjectileState),
    Particle(ParticleState),
    Hazard(HazardState),
}

/// A live simulation object: common header + typed payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    /// false => removed by the end-of-tick cleanup pass
    pub active: bool,
    /// Packed RGBA for the renderer
    pub tint: u32,
    pub rotation: f32,
    pub kind: EntityKind,
}

impl Entity {
    pub fn class(&self) -> EntityClass {
        match self.kind {
            EntityKind::Player(_) => EntityClass::Player,
            EntityKind::Enemy(_) => EntityClass::Enemy,
            EntityKind::Projectile(_) => EntityClass::Projectile,
            EntityKind::Particle(_) => EntityClass::Particle,
            EntityKind::Hazard(_) => EntityClass::Hazard,
        }
    }

    pub fn as_player(&self) -> Option<&PlayerState> {
        match &self.kind {
            EntityKind::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.kind {
            EntityKind::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_enemy(&self) -> Option<&EnemyState> {
        match &self.kind {
            EntityKind::Enemy(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_enemy_mut(&mut self) -> Option<&mut EnemyState> {
        match &mut self.kind {
            EntityKind::Enemy(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_projectile(&self) -> Option<&ProjectileState> {
        match &self.kind {
            EntityKind::Projectile(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_projectile_mut(&mut self) -> Option<&mut ProjectileState> {
        match &mut self.kind {
            EntityKind::Projectile(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_hazard(&self) -> Option<&HazardState> {
        match &self.kind {
            EntityKind::Hazard(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_hazard_mut(&mut self) -> Option<&mut HazardState> {
        match &mut self.kind {
            EntityKind::Hazard(h) => Some(h),
            _ => None,
        }
    }
}

/// Owns all live entities in typed-variant buckets
///
/// Buckets keep systems honest about borrow scope: enemy steering can take
/// `enemies_mut()` while reading a copied-out player position. Iteration
/// within a bucket is insertion order, which is id order (ids are monotonic),
/// so the simulation stays deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityStore {
    next_id: u32,
    players: Vec<Entity>,
    enemies: Vec<Entity>,
    projectiles: Vec<Entity>,
    particles: Vec<Entity>,
    hazards: Vec<Entity>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    /// Allocate a fresh entity id
    pub fn alloc_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn add(&mut self, entity: Entity) {
        let bucket = match entity.class() {
            EntityClass::Player => &mut self.players,
            EntityClass::Enemy => &mut self.enemies,
            EntityClass::Projectile => &mut self.projectiles,
            EntityClass::Particle => &mut self.particles,
            EntityClass::Hazard => &mut self.hazards,
        };
        bucket.push(entity);
    }

    fn bucket(&self, class: EntityClass) -> &Vec<Entity> {
        match class {
            EntityClass::Player => &self.players,
            EntityClass::Enemy => &self.enemies,
            EntityClass::Projectile => &self.projectiles,
            EntityClass::Particle => &self.particles,
            EntityClass::Hazard => &self.hazards,
        }
    }

    fn bucket_mut(&mut self, class: EntityClass) -> &mut Vec<Entity> {
        match class {
            EntityClass::Player => &mut self.players,
            EntityClass::Enemy => &mut self.enemies,
            EntityClass::Projectile => &mut self.projectiles,
            EntityClass::Particle => &mut self.particles,
            EntityClass::Hazard => &mut self.hazards,
        }
    }

    /// Remove a single entity by id, whichever bucket holds it
    pub fn remove(&mut self, id: EntityId) -> bool {
        for class in [
            EntityClass::Player,
            EntityClass::Enemy,
            EntityClass::Projectile,
            EntityClass::Particle,
            EntityClass::Hazard,
        ] {
            let bucket = self.bucket_mut(class);
            if let Some(idx) = bucket.iter().position(|e| e.id == id) {
                bucket.remove(idx);
                return true;
            }
        }
        false
    }

    pub fn remove_by_class(&mut self, class: EntityClass) {
        self.bucket_mut(class).clear();
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.all().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.players
            .iter_mut()
            .chain(self.enemies.iter_mut())
            .chain(self.projectiles.iter_mut())
            .chain(self.particles.iter_mut())
            .chain(self.hazards.iter_mut())
            .find(|e| e.id == id)
    }

    pub fn by_class(&self, class: EntityClass) -> &[Entity] {
        self.bucket(class)
    }

    pub fn player(&self) -> Option<&Entity> {
        self.players.first()
    }

    pub fn player_mut(&mut self) -> Option<&mut Entity> {
        self.players.first_mut()
    }

    pub fn enemies(&self) -> &[Entity] {
        &self.enemies
    }

    pub fn enemies_mut(&mut self) -> &mut Vec<Entity> {
        &mut self.enemies
    }

    pub fn projectiles(&self) -> &[Entity] {
        &self.projectiles
    }

    pub fn projectiles_mut(&mut self) -> &mut Vec<Entity> {
        &mut self.projectiles
    }

    pub fn particles_mut(&mut self) -> &mut Vec<Entity> {
        &mut self.particles
    }

    pub fn hazards(&self) -> &[Entity] {
        &self.hazards
    }

    pub fn hazards_mut(&mut self) -> &mut Vec<Entity> {
        &mut self.hazards
    }

    pub fn all(&self) -> impl Iterator<Item = &Entity> {
        self.players
            .iter()
            .chain(self.enemies.iter())
            .chain(self.projectiles.iter())
            .chain(self.particles.iter())
            .chain(self.hazards.iter())
    }

    pub fn live_enemy_count(&self) -> usize {
        self.enemies.iter().filter(|e| e.active).count()
    }

    /// Drop every entity whose active flag has been cleared
    ///
    /// Runs exactly once per tick, after the full pipeline, so systems can
    /// mark entities dead mid-tick without invalidating ids other systems
    /// still hold.
    pub fn cleanup(&mut self) {
        self.players.retain(|e| e.active);
        self.enemies.retain(|e| e.active);
        self.projectiles.retain(|e| e.active);
        self.particles.retain(|e| e.active);
        self.hazards.retain(|e| e.active);
    }

    pub fn clear(&mut self) {
        self.players.clear();
        self.enemies.clear();
        self.projectiles.clear();
        self.particles.clear();
        self.hazards.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle(store: &mut EntityStore, active: bool) -> EntityId {
        let id = store.alloc_id();
        store.add(Entity {
            id,
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            radius: 2.0,
            active,
            tint: 0xffffffff,
            rotation: 0.0,
            kind: EntityKind::Particle(ParticleState { life: 1.0, size: 2.0 }),
        });
        id
    }

    #[test]
    fn test_add_get_remove() {
        let mut store = EntityStore::new();
        let id = particle(&mut store, true);
        assert!(store.get(id).is_some());
        assert!(store.remove(id));
        assert!(store.get(id).is_none());
        assert!(!store.remove(id));
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut store = EntityStore::new();
        let a = particle(&mut store, true);
        let b = particle(&mut store, true);
        assert!(b > a);
    }

    #[test]
    fn test_cleanup_drops_inactive_only() {
        let mut store = EntityStore::new();
        let live = particle(&mut store, true);
        let dead = particle(&mut store, false);
        store.cleanup();
        assert!(store.get(live).is_some());
        assert!(store.get(dead).is_none());
    }

    #[test]
    fn test_remove_by_class() {
        let mut store = EntityStore::new();
        particle(&mut store, true);
        particle(&mut store, true);
        store.remove_by_class(EntityClass::Particle);
        assert_eq!(store.all().count(), 0);
    }

    #[test]
    fn test_live_enemy_count_ignores_inactive() {
        let mut store = EntityStore::new();
        for active in [true, true, false] {
            let id = store.alloc_id();
            store.add(Entity {
                id,
                pos: Vec2::ZERO,
                vel: Vec2::ZERO,
                radius: 12.0,
                active,
                tint: 0,
                rotation: 0.0,
                kind: EntityKind::Enemy(EnemyState {
                    variant: EnemyVariant::Basic,
                    health: 20.0,
                    max_health: 20.0,
                    damage: 8.0,
                    score_value: 10,
                    knockback: Vec2::ZERO,
                    ai_state: AiState::Approach,
                    state_timer: 1.0,
                    orbit_dir: 1.0,
                    entered: false,
                    marked_timer: 0.0,
                    fire_timer: 0.0,
                    boss: None,
                }),
            });
        }
        assert_eq!(store.live_enemy_count(), 2);
    }
}
