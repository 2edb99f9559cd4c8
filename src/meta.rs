//! Meta progression: banked currency/XP, perks, and extraction banking
//!
//! At-risk value earned during a run only becomes permanent through an
//! explicit extraction (or the first-boss death concession). Perks act on
//! the player exclusively through the on-dash / on-wave-clear / on-damage
//! hooks, never by reaching into other systems' state.

use serde::{Deserialize, Serialize};

use crate::sim::state::GameSession;
use crate::sim::PlayerState;

/// Equippable meta-progression perks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Perk {
    /// Dashing charges the next volley with bonus damage
    KineticCharger,
    /// Extra flat heal on every wave clear
    FieldMedic,
    /// Taking a hit shaves time off the area-ability cooldown
    Adrenaline,
}

impl Perk {
    pub const ALL: [Perk; 3] = [Perk::KineticCharger, Perk::FieldMedic, Perk::Adrenaline];

    pub fn id(self) -> &'static str {
        match self {
            Perk::KineticCharger => "kinetic_charger",
            Perk::FieldMedic => "field_medic",
            Perk::Adrenaline => "adrenaline",
        }
    }

    pub fn parse(id: &str) -> Option<Self> {
        Perk::ALL.into_iter().find(|p| p.id() == id)
    }

    /// Meta level required before the perk can be equipped
    pub fn unlock_level(self) -> u32 {
        match self {
            Perk::KineticCharger => 2,
            Perk::FieldMedic => 3,
            Perk::Adrenaline => 5,
        }
    }
}

/// Persistent meta-progression; survives `reset_run`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaProgress {
    pub currency: u64,
    pub xp: u64,
    pub equipped_perk: Option<Perk>,
}

impl MetaProgress {
    /// Level derived from banked XP; never stored
    pub fn level(&self) -> u32 {
        (self.xp / 250) as u32 + 1
    }

    pub fn can_equip(&self, perk: Perk) -> bool {
        self.level() >= perk.unlock_level()
    }
}

/// Bank everything currently at risk. Caller guards session status.
pub fn extract(session: &mut GameSession) {
    session.meta.currency += session.at_risk_currency;
    session.meta.xp += session.at_risk_xp;
    log::info!(
        "extracted {} currency, {} xp (level {})",
        session.at_risk_currency,
        session.at_risk_xp,
        session.meta.level()
    );
    session.at_risk_currency = 0;
    session.at_risk_xp = 0;
}

/// Death settlement: at-risk value is forfeit, except that a run which
/// cleared its first boss concedes half on the way out.
pub fn apply_death_penalty(session: &mut GameSession) {
    if session.cleared_first_boss {
        session.meta.currency += session.at_risk_currency / 2;
        session.meta.xp += session.at_risk_xp / 2;
    }
    session.at_risk_currency = 0;
    session.at_risk_xp = 0;
}

// --- Perk hooks ---
// The hook set is the whole contract surface: systems call these at the
// named moments and perks touch nothing else.

pub fn on_dash(player: &mut PlayerState, perk: Option<Perk>) {
    if perk == Some(Perk::KineticCharger) {
        player.kinetic_charge = 1.0;
    }
}

pub fn on_wave_clear(player: &mut PlayerState, perk: Option<Perk>) {
    if perk == Some(Perk::FieldMedic) {
        player.health = (player.health + 10.0).min(player.max_health);
    }
}

pub fn on_damage(player: &mut PlayerState, perk: Option<Perk>) {
    if perk == Some(Perk::Adrenaline) {
        player.ability_cooldown = (player.ability_cooldown - 1.0).max(0.0);
    }
}
