//! Game engine orchestrator
//!
//! Owns the session and the event bus, runs the fixed-order system
//! pipeline once per host animation tick, and drives the top-level session
//! state machine. Every UI-facing mutation comes in through the command
//! methods; every UI-facing notification goes out through the bus.

use crate::console::{self, ConsoleCommand};
use crate::consts::*;
use crate::events::{EngineEvent, EventBus};
use crate::meta::{self, Perk};
use crate::persistence::MetaSave;
use crate::sim::{
    collision, damage, enemy, player, projectile, upgrades, wave, EnemyVariant, FrameInput,
    GameSession, GameStatus,
};

const WAVE_INTRO_TIME: f32 = 2.0;

/// Tracks last-emitted values so the bus only fires on change
#[derive(Debug, Clone, Default)]
struct EmitState {
    score: u64,
    wave: u32,
    status: Option<GameStatus>,
    health: f32,
    shields: u32,
    boss_health: Option<f32>,
}

pub struct GameEngine {
    pub session: GameSession,
    pub events: EventBus,
    running: bool,
    emitted: EmitState,
}

impl GameEngine {
    pub fn new(seed: u64) -> Self {
        let mut session = GameSession::new(seed);
        MetaSave::load().apply_to(&mut session.meta);
        Self {
            session,
            events: EventBus::new(),
            running: false,
            emitted: EmitState::default(),
        }
    }

    /// Read-only view for the renderer; must not be mutated
    pub fn snapshot(&self) -> &GameSession {
        &self.session
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // --- UI commands -----------------------------------------------------

    /// Begin a fresh run from the menu or a finished run
    pub fn start_run(&mut self) {
        match self.session.status {
            GameStatus::Menu | GameStatus::GameOver | GameStatus::ExtractionSuccess
            | GameStatus::MetaHub => {}
            _ => return,
        }
        self.session.start_run();
        wave::prepare_next_wave(&mut self.session);
        self.set_status(GameStatus::WaveIntro);
        self.session.intro_timer = WAVE_INTRO_TIME;
        self.running = true;
    }

    pub fn toggle_pause(&mut self) {
        match self.session.status {
            GameStatus::Playing => self.set_status(GameStatus::Paused),
            GameStatus::Paused => self.set_status(GameStatus::Playing),
            // Pausing anywhere else (console, shop, menus) is a no-op
            _ => {}
        }
    }

    pub fn toggle_dev_console(&mut self) {
        match self.session.status {
            GameStatus::Playing | GameStatus::Paused => self.set_status(GameStatus::DevConsole),
            GameStatus::DevConsole => self.set_status(GameStatus::Playing),
            _ => {}
        }
    }

    /// Queue an upgrade purchase; applied atomically inside the pipeline.
    /// Returns false for ids that don't exist (nothing is queued).
    pub fn buy_upgrade(&mut self, id: &str) -> bool {
        if upgrades::find_chain(id).is_none() {
            return false;
        }
        match self.session.status {
            GameStatus::Playing | GameStatus::Shop => {
                self.session.upgrades.queue.push(id.to_string());
                true
            }
            _ => false,
        }
    }

    /// Bank the at-risk value at an extraction checkpoint
    pub fn extract(&mut self) {
        if self.session.status != GameStatus::Extraction {
            return;
        }
        meta::extract(&mut self.session);
        MetaSave::from_meta(&self.session.meta).save();
        self.set_status(GameStatus::ExtractionSuccess);
        self.running = false;
    }

    /// Decline extraction (or leave the shop) and head into the next wave
    pub fn continue_run(&mut self) {
        match self.session.status {
            GameStatus::Extraction | GameStatus::Shop => {}
            _ => return,
        }
        wave::prepare_next_wave(&mut self.session);
        self.set_status(GameStatus::WaveIntro);
        self.session.intro_timer = WAVE_INTRO_TIME;
    }

    /// Equip (or unequip with None) a perk, gated by meta level
    pub fn equip_perk(&mut self, perk: Option<Perk>) -> bool {
        match self.session.status {
            GameStatus::Menu | GameStatus::MetaHub | GameStatus::GameOver
            | GameStatus::ExtractionSuccess => {}
            _ => return false,
        }
        if let Some(p) = perk {
            if !self.session.meta.can_equip(p) {
                return false;
            }
        }
        self.session.meta.equipped_perk = perk;
        true
    }

    /// Enter the meta hub from any out-of-run screen
    pub fn open_meta_hub(&mut self) {
        match self.session.status {
            GameStatus::Menu | GameStatus::GameOver | GameStatus::ExtractionSuccess => {
                self.set_status(GameStatus::MetaHub)
            }
            _ => {}
        }
    }

    pub fn back_to_menu(&mut self) {
        match self.session.status {
            GameStatus::MetaHub | GameStatus::GameOver | GameStatus::ExtractionSuccess => {
                self.set_status(GameStatus::Menu)
            }
            _ => {}
        }
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.session.bounds = glam::Vec2::new(width, height);
        }
    }

    /// Dev-only: jump the run to a specific wave
    pub fn dev_jump_to_wave(&mut self, target: u32) {
        if target == 0 {
            return;
        }
        self.session.entities.remove_by_class(crate::sim::EntityClass::Enemy);
        self.session.wave = target - 1;
        wave::prepare_next_wave(&mut self.session);
        self.set_status(GameStatus::WaveIntro);
        self.session.intro_timer = WAVE_INTRO_TIME;
    }

    /// Dev-only: grant score directly
    pub fn dev_give_score(&mut self, amount: u64) {
        self.session.score += amount;
    }

    /// Execute one dev-console line, returning the user-facing response
    pub fn exec_console(&mut self, line: &str) -> String {
        match console::parse(line) {
            Ok(ConsoleCommand::JumpToWave(n)) => {
                self.dev_jump_to_wave(n);
                format!("jumped to wave {}", n)
            }
            Ok(ConsoleCommand::GiveScore(n)) => {
                self.dev_give_score(n);
                format!("score +{}", n)
            }
            Ok(ConsoleCommand::GiveAllUpgrades(family)) => {
                upgrades::grant_family(&mut self.session, family);
                format!("granted all {:?} upgrades", family)
            }
            Ok(ConsoleCommand::OpenShop) => {
                self.set_status(GameStatus::Shop);
                "shop opened".to_string()
            }
            Ok(ConsoleCommand::Debug) => format!(
                "wave {} | score {} | enemies {} (+{} pending) | status {:?}",
                self.session.wave,
                self.session.score,
                self.session.live_enemy_count(),
                self.session.enemies_remaining,
                self.session.status
            ),
            Err(message) => message,
        }
    }

    // --- Tick pipeline ---------------------------------------------------

    /// Advance the simulation by one host frame
    pub fn tick(&mut self, input: &FrameInput, dt_raw: f32) {
        if !self.running {
            return;
        }
        // Background-tab throttling must not produce giant steps
        let dt = dt_raw.clamp(0.0, MAX_FRAME_DT);

        match self.session.status {
            GameStatus::WaveIntro => {
                self.session.intro_timer -= dt;
                if self.session.intro_timer <= 0.0 {
                    self.set_status(GameStatus::Playing);
                }
            }
            GameStatus::Playing => self.run_pipeline(input, dt),
            // Shop purchases still land while the wave is suspended
            GameStatus::Shop => drain_purchases(&mut self.session),
            // Paused and other intermission statuses only run housekeeping,
            // so suspend/resume never loses entity state
            _ => {}
        }

        self.session.entities.cleanup();
        self.emit_changes();
    }

    /// The fixed-order system pipeline; ordering is a hard contract
    fn run_pipeline(&mut self, input: &FrameInput, dt: f32) {
        self.session.elapsed += dt;

        player::update(&mut self.session, input, dt);

        if wave::check_wave_clear(&mut self.session) {
            // Boss kills gate the extraction checkpoint; everything else
            // goes through the shop
            if self.session.boss_wave {
                self.set_status(GameStatus::Extraction);
            } else {
                self.set_status(GameStatus::Shop);
            }
            return;
        }

        projectile::update(&mut self.session, dt);
        enemy::update(&mut self.session, dt);
        collision::update(&mut self.session);
        damage::update(&mut self.session, dt);

        // Externally queued purchases apply atomically, after combat
        drain_purchases(&mut self.session);

        if !self.session.is_player_alive {
            meta::apply_death_penalty(&mut self.session);
            MetaSave::from_meta(&self.session.meta).save();
            self.set_status(GameStatus::GameOver);
            self.running = false;
        }
    }

    pub fn shop_offers(&mut self, count: usize) -> Vec<&'static str> {
        upgrades::draw_offers(&mut self.session, count)
    }

    fn set_status(&mut self, status: GameStatus) {
        if self.session.status != status {
            self.session.status = status;
            log::debug!("status -> {:?}", status);
        }
    }

    /// Diff the session against the last emission and notify subscribers
    fn emit_changes(&mut self) {
        let session = &self.session;

        if session.score != self.emitted.score {
            self.emitted.score = session.score;
            self.events.emit(&EngineEvent::ScoreChanged { score: session.score });
        }
        if session.wave != self.emitted.wave {
            self.emitted.wave = session.wave;
            self.events.emit(&EngineEvent::WaveChanged { wave: session.wave });
        }
        if self.emitted.status != Some(session.status) {
            self.emitted.status = Some(session.status);
            self.events.emit(&EngineEvent::StatusChanged { status: session.status });
        }

        if let Some(p) = session.entities.player().and_then(|e| e.as_player()) {
            if (p.health - self.emitted.health).abs() > f32::EPSILON {
                self.emitted.health = p.health;
                self.events.emit(&EngineEvent::HealthChanged {
                    health: p.health,
                    max: p.max_health,
                });
            }
            if p.shield.current != self.emitted.shields {
                self.emitted.shields = p.shield.current;
                self.events.emit(&EngineEvent::ShieldChanged {
                    current: p.shield.current,
                    max: p.shield.max,
                });
            }
        }

        let boss = session
            .entities
            .enemies()
            .iter()
            .filter(|e| e.active)
            .find_map(|e| {
                e.as_enemy()
                    .filter(|s| s.variant == EnemyVariant::Boss)
                    .map(|s| (s.health, s.max_health))
            });
        if let Some((health, max)) = boss {
            if self.emitted.boss_health != Some(health) {
                self.emitted.boss_health = Some(health);
                self.events
                    .emit(&EngineEvent::BossHealthChanged { health, max });
            }
        } else {
            self.emitted.boss_health = None;
        }

        let feedback: Vec<_> = self.session.events.hit_feedback.drain(..).collect();
        for hit in feedback {
            self.events.emit(&EngineEvent::EnemyHit {
                enemy_id: hit.enemy_id,
                amount: hit.amount,
                killed: hit.killed,
            });
        }
    }
}

/// Apply every queued purchase; rejections are logged and dropped
fn drain_purchases(session: &mut GameSession) {
    let queued: Vec<String> = session.upgrades.queue.drain(..).collect();
    for id in queued {
        if let Err(e) = upgrades::try_purchase(session, &id) {
            log::debug!("purchase of {} rejected: {:?}", id, e);
        }
    }
}
