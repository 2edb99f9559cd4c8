//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must stay pure and
//! deterministic:
//! - Clamped timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity id)
//! - No rendering or platform dependencies

pub mod collision;
pub mod damage;
pub mod enemy;
pub mod entity;
pub mod grid;
pub mod player;
pub mod projectile;
pub mod state;
pub mod upgrades;
pub mod wave;

pub use entity::{
    AiState, BossAttack, BossState, DashState, Entity, EntityClass, EntityId, EntityKind,
    EntityStore, EnemyState, EnemyVariant, HazardState, ParticleState, PlayerState,
    ProjectileShape, ProjectileState, ShieldState,
};
pub use grid::SpatialIndex;
pub use state::{
    CompositionWeights, EnemyShotHit, FrameEvents, FrameInput, GameSession, GameStatus,
    HitFeedback, PlayerContact, ProjectileHit,
};
pub use upgrades::{Family, PurchaseError, Rarity, UpgradeChain, UpgradeLedger, CATALOG};
