//! Upgrade chains, identity keystones, and family synergy
//!
//! The catalog is pure data: every tier carries a list of tagged stat
//! effects (op + stat + magnitude) interpreted by one applier, so chains
//! stay portable and inspectable. Purchase economics (step costs, the
//! generalist tax, the specialization discount, per-tier wave gates) live
//! here too; the engine only queues ids.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::entity::PlayerState;
use super::state::GameSession;

/// Upgrade family; offense is "bullets" in every player-facing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    Bullets,
    Defense,
    Mobility,
}

impl Family {
    pub const ALL: [Family; 3] = [Family::Bullets, Family::Defense, Family::Mobility];

    pub fn index(self) -> usize {
        match self {
            Family::Bullets => 0,
            Family::Defense => 1,
            Family::Mobility => 2,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bullets" => Some(Family::Bullets),
            "defense" => Some(Family::Defense),
            "mobility" => Some(Family::Mobility),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    /// Weight used by the shop offer draw
    fn draw_weight(self) -> u32 {
        match self {
            Rarity::Common => 60,
            Rarity::Rare => 25,
            Rarity::Epic => 10,
            Rarity::Legendary => 5,
        }
    }
}

/// Player stat a tier effect targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    Damage,
    FireRate,
    Speed,
    Piercing,
    Ricochet,
    ProjectileCount,
    Streams,
    MaxAmmo,
    DodgeChance,
    DamageReduction,
    Thorns,
    MaxHealth,
    ShieldMax,
    DashUnlock,
    DashCharges,
    ExecuteThreshold,
    ExecuteBonus,
    HealOnClearPct,
    SiphonChance,
    PostDashDamage,
    TrailDamage,
    StationaryBonus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectOp {
    Add,
    Mul,
}

/// One idempotent stat mutation, applied exactly once at purchase
#[derive(Debug, Clone, Copy)]
pub struct StatEffect {
    pub stat: Stat,
    pub op: EffectOp,
    pub value: f32,
}

const fn add(stat: Stat, value: f32) -> StatEffect {
    StatEffect {
        stat,
        op: EffectOp::Add,
        value,
    }
}

const fn mul(stat: Stat, value: f32) -> StatEffect {
    StatEffect {
        stat,
        op: EffectOp::Mul,
        value,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UpgradeTier {
    pub rarity: Rarity,
    pub description: &'static str,
    pub unlock_wave: u32,
    pub effects: &'static [StatEffect],
}

#[derive(Debug, Clone, Copy)]
pub struct UpgradeChain {
    pub id: &'static str,
    pub name: &'static str,
    pub family: Family,
    /// Single-tier, high-impact, trade-off chain; exclusive within a family
    pub keystone: bool,
    pub tiers: &'static [UpgradeTier],
}

macro_rules! tier {
    ($rarity:ident, $wave:expr, $desc:expr, [$($fx:expr),+ $(,)?]) => {
        UpgradeTier {
            rarity: Rarity::$rarity,
            description: $desc,
            unlock_wave: $wave,
            effects: &[$($fx),+],
        }
    };
}

/// The full chain catalog
///
/// Three keystones per family; everything else is a multi-tier chain.
pub static CATALOG: &[UpgradeChain] = &[
    // --- Bullets ---
    UpgradeChain {
        id: "steady_hand",
        name: "Steady Hand",
        family: Family::Bullets,
        keystone: false,
        tiers: &[
            tier!(Common, 1, "+3 damage", [add(Stat::Damage, 3.0)]),
            tier!(Common, 2, "+4 damage", [add(Stat::Damage, 4.0)]),
            tier!(Rare, 4, "+6 damage", [add(Stat::Damage, 6.0)]),
            tier!(Epic, 6, "+9 damage", [add(Stat::Damage, 9.0)]),
        ],
    },
    UpgradeChain {
        id: "rapid_feed",
        name: "Rapid Feed",
        family: Family::Bullets,
        keystone: false,
        tiers: &[
            tier!(Common, 1, "+0.5 shots/s", [add(Stat::FireRate, 0.5)]),
            tier!(Common, 3, "+0.6 shots/s", [add(Stat::FireRate, 0.6)]),
            tier!(Rare, 5, "+0.8 shots/s", [add(Stat::FireRate, 0.8)]),
            tier!(Epic, 8, "+1.1 shots/s", [add(Stat::FireRate, 1.1)]),
        ],
    },
    UpgradeChain {
        id: "drill_rounds",
        name: "Drill Rounds",
        family: Family::Bullets,
        keystone: false,
        tiers: &[
            tier!(Rare, 2, "Shots pierce one extra enemy", [add(Stat::Piercing, 1.0)]),
            tier!(Rare, 5, "Shots pierce one extra enemy", [add(Stat::Piercing, 1.0)]),
            tier!(Epic, 9, "Shots pierce one extra enemy", [add(Stat::Piercing, 1.0)]),
        ],
    },
    UpgradeChain {
        id: "ricochet_rounds",
        name: "Ricochet Rounds",
        family: Family::Bullets,
        keystone: false,
        tiers: &[
            tier!(Rare, 3, "Shots bounce to a nearby enemy", [add(Stat::Ricochet, 1.0)]),
            tier!(Epic, 6, "+1 bounce", [add(Stat::Ricochet, 1.0)]),
            tier!(Epic, 9, "+1 bounce", [add(Stat::Ricochet, 1.0)]),
        ],
    },
    UpgradeChain {
        id: "split_barrel",
        name: "Split Barrel",
        family: Family::Bullets,
        keystone: false,
        tiers: &[
            tier!(Rare, 4, "Fire an extra stream", [add(Stat::Streams, 1.0)]),
            tier!(Epic, 7, "Fire an extra stream", [add(Stat::Streams, 1.0)]),
            tier!(Legendary, 10, "Fire an extra stream", [add(Stat::Streams, 1.0)]),
        ],
    },
    UpgradeChain {
        id: "burst_magazine",
        name: "Burst Magazine",
        family: Family::Bullets,
        keystone: false,
        tiers: &[
            tier!(Rare, 3, "Each trigger pull fires an extra shot", [add(Stat::ProjectileCount, 1.0)]),
            tier!(Epic, 6, "+1 burst shot", [add(Stat::ProjectileCount, 1.0)]),
            tier!(Epic, 9, "+1 burst shot", [add(Stat::ProjectileCount, 1.0)]),
        ],
    },
    UpgradeChain {
        id: "extended_mag",
        name: "Extended Mag",
        family: Family::Bullets,
        keystone: false,
        tiers: &[
            tier!(Common, 1, "+4 magazine", [add(Stat::MaxAmmo, 4.0)]),
            tier!(Common, 3, "+6 magazine", [add(Stat::MaxAmmo, 6.0)]),
            tier!(Rare, 5, "+8 magazine", [add(Stat::MaxAmmo, 8.0)]),
        ],
    },
    UpgradeChain {
        id: "culling_edge",
        name: "Culling Edge",
        family: Family::Bullets,
        keystone: false,
        tiers: &[
            tier!(Rare, 4, "Bonus damage to enemies under 5% health", [
                add(Stat::ExecuteThreshold, 0.05),
                add(Stat::ExecuteBonus, 0.25),
            ]),
            tier!(Epic, 7, "Execute window widens to 10%", [
                add(Stat::ExecuteThreshold, 0.05),
                add(Stat::ExecuteBonus, 0.25),
            ]),
            tier!(Epic, 10, "Execute window widens to 18%", [
                add(Stat::ExecuteThreshold, 0.08),
                add(Stat::ExecuteBonus, 0.5),
            ]),
        ],
    },
    UpgradeChain {
        id: "glass_cannon",
        name: "Glass Cannon",
        family: Family::Bullets,
        keystone: true,
        tiers: &[tier!(Legendary, 6, "Double damage, half max health", [
            mul(Stat::Damage, 2.0),
            mul(Stat::MaxHealth, 0.5),
        ])],
    },
    UpgradeChain {
        id: "overcharge",
        name: "Overcharge",
        family: Family::Bullets,
        keystone: true,
        tiers: &[tier!(Legendary, 6, "+60% fire rate, half magazine", [
            mul(Stat::FireRate, 1.6),
            mul(Stat::MaxAmmo, 0.5),
        ])],
    },
    UpgradeChain {
        id: "executioner",
        name: "Executioner",
        family: Family::Bullets,
        keystone: true,
        tiers: &[tier!(Legendary, 8, "Kill non-bosses under 30% health outright, -15% damage", [
            add(Stat::ExecuteThreshold, 0.3),
            mul(Stat::Damage, 0.85),
        ])],
    },
    // --- Defense ---
    UpgradeChain {
        id: "plating",
        name: "Plating",
        family: Family::Defense,
        keystone: false,
        tiers: &[
            tier!(Common, 1, "+20 max health", [add(Stat::MaxHealth, 20.0)]),
            tier!(Common, 3, "+25 max health", [add(Stat::MaxHealth, 25.0)]),
            tier!(Rare, 5, "+30 max health", [add(Stat::MaxHealth, 30.0)]),
            tier!(Epic, 8, "+40 max health", [add(Stat::MaxHealth, 40.0)]),
        ],
    },
    UpgradeChain {
        id: "dampeners",
        name: "Dampeners",
        family: Family::Defense,
        keystone: false,
        tiers: &[
            tier!(Common, 2, "-8% contact damage", [add(Stat::DamageReduction, 0.08)]),
            tier!(Rare, 5, "-10% contact damage", [add(Stat::DamageReduction, 0.10)]),
            tier!(Epic, 8, "-12% contact damage", [add(Stat::DamageReduction, 0.12)]),
        ],
    },
    UpgradeChain {
        id: "aegis",
        name: "Aegis",
        family: Family::Defense,
        keystone: false,
        tiers: &[
            tier!(Rare, 2, "+1 shield charge", [add(Stat::ShieldMax, 1.0)]),
            tier!(Rare, 5, "+1 shield charge", [add(Stat::ShieldMax, 1.0)]),
            tier!(Epic, 8, "+1 shield charge", [add(Stat::ShieldMax, 1.0)]),
        ],
    },
    UpgradeChain {
        id: "barbs",
        name: "Barbs",
        family: Family::Defense,
        keystone: false,
        tiers: &[
            tier!(Common, 2, "Attackers take 4 damage", [add(Stat::Thorns, 4.0)]),
            tier!(Rare, 5, "+6 thorns damage", [add(Stat::Thorns, 6.0)]),
            tier!(Epic, 8, "+8 thorns damage", [add(Stat::Thorns, 8.0)]),
        ],
    },
    UpgradeChain {
        id: "field_triage",
        name: "Field Triage",
        family: Family::Defense,
        keystone: false,
        tiers: &[
            tier!(Common, 2, "Wave clear heals +10% of missing health", [add(Stat::HealOnClearPct, 0.10)]),
            tier!(Rare, 5, "+10% clear heal", [add(Stat::HealOnClearPct, 0.10)]),
            tier!(Rare, 8, "+10% clear heal", [add(Stat::HealOnClearPct, 0.10)]),
        ],
    },
    UpgradeChain {
        id: "siphon_core",
        name: "Siphon Core",
        family: Family::Defense,
        keystone: false,
        tiers: &[
            tier!(Rare, 3, "8% chance kills refill a shield", [add(Stat::SiphonChance, 0.08)]),
            tier!(Rare, 6, "+8% siphon chance", [add(Stat::SiphonChance, 0.08)]),
            tier!(Epic, 9, "+9% siphon chance", [add(Stat::SiphonChance, 0.09)]),
        ],
    },
    UpgradeChain {
        id: "bunker_discipline",
        name: "Bunker Discipline",
        family: Family::Defense,
        keystone: false,
        tiers: &[
            tier!(Rare, 4, "Standing ground mitigates +10% more", [add(Stat::StationaryBonus, 0.10)]),
            tier!(Epic, 8, "Standing ground mitigates +10% more", [add(Stat::StationaryBonus, 0.10)]),
        ],
    },
    UpgradeChain {
        id: "bulwark",
        name: "Bulwark",
        family: Family::Defense,
        keystone: true,
        tiers: &[tier!(Legendary, 6, "+2 shield charges, -20% move speed", [
            add(Stat::ShieldMax, 2.0),
            mul(Stat::Speed, 0.8),
        ])],
    },
    UpgradeChain {
        id: "juggernaut",
        name: "Juggernaut",
        family: Family::Defense,
        keystone: true,
        tiers: &[tier!(Legendary, 6, "+60% max health, -20% fire rate", [
            mul(Stat::MaxHealth, 1.6),
            mul(Stat::FireRate, 0.8),
        ])],
    },
    UpgradeChain {
        id: "mirror_plate",
        name: "Mirror Plate",
        family: Family::Defense,
        keystone: true,
        tiers: &[tier!(Legendary, 8, "+15 thorns damage, -15% damage", [
            add(Stat::Thorns, 15.0),
            mul(Stat::Damage, 0.85),
        ])],
    },
    // --- Mobility ---
    UpgradeChain {
        id: "sprint_servos",
        name: "Sprint Servos",
        family: Family::Mobility,
        keystone: false,
        tiers: &[
            tier!(Common, 1, "+18 move speed", [add(Stat::Speed, 18.0)]),
            tier!(Common, 3, "+22 move speed", [add(Stat::Speed, 22.0)]),
            tier!(Rare, 5, "+26 move speed", [add(Stat::Speed, 26.0)]),
            tier!(Epic, 8, "+30 move speed", [add(Stat::Speed, 30.0)]),
        ],
    },
    UpgradeChain {
        id: "phase_dash",
        name: "Phase Dash",
        family: Family::Mobility,
        keystone: false,
        tiers: &[
            tier!(Rare, 2, "Unlock dash", [add(Stat::DashUnlock, 1.0)]),
            tier!(Epic, 5, "+1 dash charge", [add(Stat::DashCharges, 1.0)]),
            tier!(Epic, 9, "+1 dash charge", [add(Stat::DashCharges, 1.0)]),
        ],
    },
    UpgradeChain {
        id: "evasion_trim",
        name: "Evasion Trim",
        family: Family::Mobility,
        keystone: false,
        tiers: &[
            tier!(Common, 2, "+5% dodge chance", [add(Stat::DodgeChance, 0.05)]),
            tier!(Rare, 5, "+6% dodge chance", [add(Stat::DodgeChance, 0.06)]),
            tier!(Epic, 8, "+8% dodge chance", [add(Stat::DodgeChance, 0.08)]),
        ],
    },
    UpgradeChain {
        id: "afterburn",
        name: "Afterburn",
        family: Family::Mobility,
        keystone: false,
        tiers: &[
            tier!(Rare, 3, "+10% damage briefly after dashing", [add(Stat::PostDashDamage, 0.10)]),
            tier!(Rare, 6, "+15% post-dash damage", [add(Stat::PostDashDamage, 0.15)]),
            tier!(Epic, 9, "+20% post-dash damage", [add(Stat::PostDashDamage, 0.20)]),
        ],
    },
    UpgradeChain {
        id: "trail_blazer",
        name: "Trail Blazer",
        family: Family::Mobility,
        keystone: false,
        tiers: &[
            tier!(Rare, 4, "Dash trail burns +4", [add(Stat::TrailDamage, 4.0)]),
            tier!(Epic, 8, "Dash trail burns +6", [add(Stat::TrailDamage, 6.0)]),
        ],
    },
    UpgradeChain {
        id: "light_frame",
        name: "Light Frame",
        family: Family::Mobility,
        keystone: false,
        tiers: &[
            tier!(Common, 2, "+6% move speed", [mul(Stat::Speed, 1.06)]),
            tier!(Rare, 5, "+8% move speed", [mul(Stat::Speed, 1.08)]),
            tier!(Epic, 9, "+10% move speed", [mul(Stat::Speed, 1.10)]),
        ],
    },
    UpgradeChain {
        id: "momentum_engine",
        name: "Momentum Engine",
        family: Family::Mobility,
        keystone: true,
        tiers: &[tier!(Legendary, 6, "+50% post-dash damage, -25% max health", [
            add(Stat::PostDashDamage, 0.5),
            mul(Stat::MaxHealth, 0.75),
        ])],
    },
    UpgradeChain {
        id: "phantom_step",
        name: "Phantom Step",
        family: Family::Mobility,
        keystone: true,
        tiers: &[tier!(Legendary, 6, "+15% dodge, -15% damage", [
            add(Stat::DodgeChance, 0.15),
            mul(Stat::Damage, 0.85),
        ])],
    },
    UpgradeChain {
        id: "untouchable",
        name: "Untouchable",
        family: Family::Mobility,
        keystone: true,
        tiers: &[tier!(Legendary, 8, "+1 dash charge, +15% speed, -25% magazine", [
            add(Stat::DashCharges, 1.0),
            mul(Stat::Speed, 1.15),
            mul(Stat::MaxAmmo, 0.75),
        ])],
    },
];

pub fn find_chain(id: &str) -> Option<&'static UpgradeChain> {
    CATALOG.iter().find(|c| c.id == id)
}

/// Run-scoped ownership and purchase bookkeeping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpgradeLedger {
    /// Chain id -> owned level (count of tiers already applied)
    pub owned: HashMap<String, u32>,
    /// Total purchased tier levels per family
    pub family_levels: [u32; 3],
    /// Distinct chains purchased per family
    pub family_chains: [u32; 3],
    /// Purchases requested from outside the tick, drained by the pipeline
    pub queue: Vec<String>,
    /// Set once an offer draw finds no candidates; offers skip forever after
    pub offers_exhausted: bool,
}

impl UpgradeLedger {
    pub fn owned_level(&self, id: &str) -> u32 {
        self.owned.get(id).copied().unwrap_or(0)
    }

    /// Family synergy tier (0-10): one tier per 3 purchased levels
    pub fn synergy_tier(&self, family: Family) -> u32 {
        (self.family_levels[family.index()] / 3).min(10)
    }

    /// Number of families with at least one purchase
    fn active_families(&self) -> usize {
        self.family_chains.iter().filter(|&&c| c > 0).count()
    }

    fn owns_keystone_in(&self, family: Family) -> bool {
        CATALOG
            .iter()
            .filter(|c| c.keystone && c.family == family)
            .any(|c| self.owned_level(c.id) > 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseError {
    UnknownUpgrade,
    MaxedOut,
    WaveLocked,
    InsufficientScore,
    KeystoneConflict,
}

/// Base cost by tier index; strictly increasing
const TIER_COSTS: [u64; 6] = [40, 80, 140, 220, 320, 450];

/// Cost of the next tier of `chain` given current ledger state
pub fn next_tier_cost(chain: &UpgradeChain, ledger: &UpgradeLedger) -> u64 {
    let level = ledger.owned_level(chain.id) as usize;
    let base = TIER_COSTS[level.min(TIER_COSTS.len() - 1)];
    let mut cost = base as f32;

    // Generalist tax: surcharge for opening a 3rd (or later) family
    let opening_new_family = ledger.family_chains[chain.family.index()] == 0;
    if opening_new_family && ledger.active_families() >= 2 {
        cost *= 1.25;
    }

    // Specialization discount once the family is committed to
    if ledger.family_chains[chain.family.index()] >= 3 {
        cost *= 0.8;
    }

    cost.round() as u64
}

/// Validate and apply one purchase; rejection leaves the session untouched
pub fn try_purchase(session: &mut GameSession, id: &str) -> Result<u64, PurchaseError> {
    let chain = find_chain(id).ok_or(PurchaseError::UnknownUpgrade)?;
    let level = session.upgrades.owned_level(id);
    if level as usize >= chain.tiers.len() {
        return Err(PurchaseError::MaxedOut);
    }
    if chain.keystone && session.upgrades.owns_keystone_in(chain.family) {
        return Err(PurchaseError::KeystoneConflict);
    }
    let tier = &chain.tiers[level as usize];
    if session.wave < tier.unlock_wave {
        return Err(PurchaseError::WaveLocked);
    }
    let cost = next_tier_cost(chain, &session.upgrades);
    if session.score < cost {
        return Err(PurchaseError::InsufficientScore);
    }

    session.score -= cost;
    grant_tier(session, chain, level);
    log::info!("purchased {} tier {} for {}", chain.id, level + 1, cost);
    Ok(cost)
}

/// Apply one tier's effects and advance the ledger. No validation.
fn grant_tier(session: &mut GameSession, chain: &UpgradeChain, level: u32) {
    let tier = &chain.tiers[level as usize];
    if let Some(player) = session.entities.player_mut().and_then(|e| e.as_player_mut()) {
        for effect in tier.effects {
            apply_effect(player, *effect);
        }
    }
    let entry = session.upgrades.owned.entry(chain.id.to_string()).or_insert(0);
    if *entry == 0 {
        session.upgrades.family_chains[chain.family.index()] += 1;
    }
    *entry += 1;
    session.upgrades.family_levels[chain.family.index()] += 1;
}

/// Dev-console helper: grant every remaining tier in a family, free
pub fn grant_family(session: &mut GameSession, family: Family) {
    for chain in CATALOG.iter().filter(|c| c.family == family) {
        if chain.keystone {
            continue; // keystones stay a deliberate choice even in dev runs
        }
        while (session.upgrades.owned_level(chain.id) as usize) < chain.tiers.len() {
            let level = session.upgrades.owned_level(chain.id);
            grant_tier(session, chain, level);
        }
    }
}

fn apply_effect(player: &mut PlayerState, effect: StatEffect) {
    let StatEffect { stat, op, value } = effect;
    // Integer-backed stats round to nearest after the op
    match stat {
        Stat::Damage => player.damage = apply_f32(player.damage, op, value),
        Stat::FireRate => player.fire_rate = apply_f32(player.fire_rate, op, value),
        Stat::Speed => player.speed = apply_f32(player.speed, op, value),
        Stat::Piercing => player.piercing = apply_u32(player.piercing, op, value),
        Stat::Ricochet => player.ricochet_bounces = apply_u32(player.ricochet_bounces, op, value),
        Stat::ProjectileCount => {
            player.projectile_count = apply_u32(player.projectile_count, op, value).max(1)
        }
        Stat::Streams => player.streams = apply_u32(player.streams, op, value).max(1),
        Stat::MaxAmmo => {
            player.max_ammo = apply_u32(player.max_ammo, op, value).max(1);
            player.ammo = player.ammo.min(player.max_ammo);
        }
        Stat::DodgeChance => {
            player.dodge_chance = apply_f32(player.dodge_chance, op, value).clamp(0.0, 0.75)
        }
        Stat::DamageReduction => {
            player.damage_reduction = apply_f32(player.damage_reduction, op, value).clamp(0.0, 0.7)
        }
        Stat::Thorns => player.thorns_damage = apply_f32(player.thorns_damage, op, value),
        Stat::MaxHealth => {
            let old_max = player.max_health;
            player.max_health = apply_f32(player.max_health, op, value).max(1.0);
            match op {
                // Flat health comes with the plating
                EffectOp::Add => player.health += (player.max_health - old_max).max(0.0),
                EffectOp::Mul => player.health = player.health.min(player.max_health),
            }
        }
        Stat::ShieldMax => {
            player.shield.max = apply_u32(player.shield.max, op, value);
            player.shield.current = (player.shield.current + value.round() as u32).min(player.shield.max);
        }
        Stat::DashUnlock => player.dash.unlocked = true,
        Stat::DashCharges => {
            player.dash.max_charges = apply_u32(player.dash.max_charges, op, value).max(1);
            player.dash.charges = (player.dash.charges + 1).min(player.dash.max_charges);
        }
        Stat::ExecuteThreshold => {
            player.execute_threshold = apply_f32(player.execute_threshold, op, value).clamp(0.0, 0.95)
        }
        Stat::ExecuteBonus => player.execute_bonus = apply_f32(player.execute_bonus, op, value),
        Stat::HealOnClearPct => {
            player.heal_on_clear_pct = apply_f32(player.heal_on_clear_pct, op, value).clamp(0.0, 1.0)
        }
        Stat::SiphonChance => {
            player.siphon_chance = apply_f32(player.siphon_chance, op, value).clamp(0.0, 1.0)
        }
        Stat::PostDashDamage => {
            player.post_dash_damage = apply_f32(player.post_dash_damage, op, value)
        }
        Stat::TrailDamage => player.trail_damage = apply_f32(player.trail_damage, op, value),
        Stat::StationaryBonus => {
            player.stationary_bonus = apply_f32(player.stationary_bonus, op, value).clamp(0.0, 0.6)
        }
    }
}

fn apply_f32(current: f32, op: EffectOp, value: f32) -> f32 {
    match op {
        EffectOp::Add => current + value,
        EffectOp::Mul => current * value,
    }
}

fn apply_u32(current: u32, op: EffectOp, value: f32) -> u32 {
    match op {
        EffectOp::Add => (current as i64 + value.round() as i64).max(0) as u32,
        EffectOp::Mul => ((current as f32 * value).round()).max(0.0) as u32,
    }
}

/// Draw rarity-weighted shop offers from the remaining candidates
///
/// Candidates are chains with an unlockable next tier at the current wave.
/// An empty candidate pool latches `offers_exhausted`.
pub fn draw_offers(session: &mut GameSession, count: usize) -> Vec<&'static str> {
    if session.upgrades.offers_exhausted {
        return Vec::new();
    }

    let mut candidates: Vec<&'static UpgradeChain> = CATALOG
        .iter()
        .filter(|c| {
            let level = session.upgrades.owned_level(c.id) as usize;
            if level >= c.tiers.len() {
                return false;
            }
            if c.keystone && session.upgrades.owns_keystone_in(c.family) {
                return false;
            }
            session.wave >= c.tiers[level].unlock_wave
        })
        .collect();

    if candidates.is_empty() {
        let any_left = CATALOG
            .iter()
            .any(|c| (session.upgrades.owned_level(c.id) as usize) < c.tiers.len());
        if !any_left {
            session.upgrades.offers_exhausted = true;
            log::info!("upgrade catalog exhausted; shop offers disabled");
        }
        return Vec::new();
    }

    let mut offers = Vec::with_capacity(count);
    while offers.len() < count && !candidates.is_empty() {
        let total: u32 = candidates
            .iter()
            .map(|c| {
                let level = session.upgrades.owned_level(c.id) as usize;
                c.tiers[level].rarity.draw_weight()
            })
            .sum();
        let mut roll = session.rng.random_range(0..total);
        let mut picked = 0;
        for (i, c) in candidates.iter().enumerate() {
            let level = session.upgrades.owned_level(c.id) as usize;
            let w = c.tiers[level].rarity.draw_weight();
            if roll < w {
                picked = i;
                break;
            }
            roll -= w;
        }
        offers.push(candidates.remove(picked).id);
    }
    offers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::GameSession;
    use proptest::prelude::*;

    fn session_with_score(score: u64, wave: u32) -> GameSession {
        let mut session = GameSession::new(42);
        session.start_run();
        session.score = score;
        session.wave = wave;
        session
    }

    #[test]
    fn test_purchase_rejected_when_broke() {
        let mut session = session_with_score(10, 5);
        let before = session.score;
        let err = try_purchase(&mut session, "steady_hand").unwrap_err();
        assert_eq!(err, PurchaseError::InsufficientScore);
        assert_eq!(session.score, before);
        assert_eq!(session.upgrades.owned_level("steady_hand"), 0);
    }

    #[test]
    fn test_purchase_rejected_before_unlock_wave() {
        // drill_rounds tier 1 unlocks at wave 2
        let mut session = session_with_score(10_000, 1);
        let err = try_purchase(&mut session, "drill_rounds").unwrap_err();
        assert_eq!(err, PurchaseError::WaveLocked);
        assert_eq!(session.score, 10_000);
    }

    #[test]
    fn test_purchase_decrements_exact_cost() {
        let mut session = session_with_score(10_000, 5);
        let chain = find_chain("steady_hand").unwrap();
        let cost = next_tier_cost(chain, &session.upgrades);
        let paid = try_purchase(&mut session, "steady_hand").unwrap();
        assert_eq!(paid, cost);
        assert_eq!(session.score, 10_000 - cost);
        assert_eq!(session.upgrades.owned_level("steady_hand"), 1);
    }

    #[test]
    fn test_final_tier_boundary() {
        let mut session = session_with_score(1_000_000, 20);
        let chain = find_chain("steady_hand").unwrap();
        assert_eq!(chain.tiers.len(), 4);

        // Buy up to ownedLevel == tierCount - 1
        for _ in 0..3 {
            try_purchase(&mut session, "steady_hand").unwrap();
        }
        assert_eq!(session.upgrades.owned_level("steady_hand"), 3);

        // Final tier succeeds and lands at tierCount
        try_purchase(&mut session, "steady_hand").unwrap();
        assert_eq!(session.upgrades.owned_level("steady_hand"), 4);

        // One past the end is rejected with no state change
        let score_before = session.score;
        assert_eq!(
            try_purchase(&mut session, "steady_hand").unwrap_err(),
            PurchaseError::MaxedOut
        );
        assert_eq!(session.score, score_before);
        assert_eq!(session.upgrades.owned_level("steady_hand"), 4);
    }

    #[test]
    fn test_keystones_exclusive_within_family() {
        let mut session = session_with_score(1_000_000, 20);
        try_purchase(&mut session, "glass_cannon").unwrap();
        assert_eq!(
            try_purchase(&mut session, "overcharge").unwrap_err(),
            PurchaseError::KeystoneConflict
        );
        // A keystone in a different family is fine
        try_purchase(&mut session, "bulwark").unwrap();
    }

    #[test]
    fn test_glass_cannon_tradeoff() {
        let mut session = session_with_score(1_000_000, 20);
        let (dmg, hp) = {
            let p = session.entities.player().unwrap().as_player().unwrap();
            (p.damage, p.max_health)
        };
        try_purchase(&mut session, "glass_cannon").unwrap();
        let p = session.entities.player().unwrap().as_player().unwrap();
        assert!((p.damage - dmg * 2.0).abs() < 0.001);
        assert!((p.max_health - hp * 0.5).abs() < 0.001);
        assert!(p.health <= p.max_health);
    }

    #[test]
    fn test_synergy_tier_milestones() {
        let mut ledger = UpgradeLedger::default();
        assert_eq!(ledger.synergy_tier(Family::Bullets), 0);
        ledger.family_levels[0] = 2;
        assert_eq!(ledger.synergy_tier(Family::Bullets), 0);
        ledger.family_levels[0] = 3;
        assert_eq!(ledger.synergy_tier(Family::Bullets), 1);
        ledger.family_levels[0] = 9;
        assert_eq!(ledger.synergy_tier(Family::Bullets), 3);
        ledger.family_levels[0] = 40;
        assert_eq!(ledger.synergy_tier(Family::Bullets), 10);
    }

    #[test]
    fn test_generalist_tax_and_specialist_discount() {
        let mut ledger = UpgradeLedger::default();
        let chain = find_chain("sprint_servos").unwrap();
        let base = next_tier_cost(chain, &ledger);

        // Two other families active: buying into mobility is taxed
        ledger.family_chains[Family::Bullets.index()] = 1;
        ledger.family_chains[Family::Defense.index()] = 1;
        let taxed = next_tier_cost(chain, &ledger);
        assert!(taxed > base);

        // Committed family: discounted
        ledger.family_chains[Family::Mobility.index()] = 3;
        let discounted = next_tier_cost(chain, &ledger);
        assert!(discounted < base);
    }

    #[test]
    fn test_draw_offers_respects_wave_gate() {
        let mut session = session_with_score(0, 1);
        let offers = draw_offers(&mut session, 30);
        for id in &offers {
            let chain = find_chain(id).unwrap();
            assert!(chain.tiers[0].unlock_wave <= 1, "{} offered too early", id);
        }
        assert!(!session.upgrades.offers_exhausted);
    }

    #[test]
    fn test_grant_family_fills_regular_chains() {
        let mut session = session_with_score(0, 1);
        grant_family(&mut session, Family::Bullets);
        for chain in CATALOG.iter().filter(|c| c.family == Family::Bullets && !c.keystone) {
            assert_eq!(
                session.upgrades.owned_level(chain.id) as usize,
                chain.tiers.len()
            );
        }
        // Keystones untouched
        assert_eq!(session.upgrades.owned_level("glass_cannon"), 0);
        // And no score was spent
        assert_eq!(session.score, 0);
    }

    proptest! {
        #[test]
        fn prop_costs_monotonic_in_tier(level in 0usize..5) {
            prop_assert!(TIER_COSTS[level] < TIER_COSTS[level + 1]);
        }

        #[test]
        fn prop_owned_level_never_exceeds_tier_count(spend in 0u64..2_000_000, wave in 1u32..30) {
            let mut session = session_with_score(spend, wave);
            for _ in 0..60 {
                let _ = try_purchase(&mut session, "steady_hand");
            }
            let chain = find_chain("steady_hand").unwrap();
            prop_assert!(session.upgrades.owned_level("steady_hand") as usize <= chain.tiers.len());
        }
    }
}
