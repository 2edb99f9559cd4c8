//! Engine -> UI event bus
//!
//! An explicit observer registry keyed by event kind. Emission is confined
//! to the engine boundary so the simulation core never touches UI concerns.
//! Subscribers get a token back; unsubscribing takes kind + token.

use crate::sim::{EntityId, GameStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ScoreChanged,
    WaveChanged,
    StatusChanged,
    HealthChanged,
    ShieldChanged,
    BossHealthChanged,
    EnemyHit,
}

/// A named event with its payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    ScoreChanged { score: u64 },
    WaveChanged { wave: u32 },
    StatusChanged { status: GameStatus },
    HealthChanged { health: f32, max: f32 },
    ShieldChanged { current: u32, max: u32 },
    BossHealthChanged { health: f32, max: f32 },
    EnemyHit { enemy_id: EntityId, amount: f32, killed: bool },
}

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::ScoreChanged { .. } => EventKind::ScoreChanged,
            EngineEvent::WaveChanged { .. } => EventKind::WaveChanged,
            EngineEvent::StatusChanged { .. } => EventKind::StatusChanged,
            EngineEvent::HealthChanged { .. } => EventKind::HealthChanged,
            EngineEvent::ShieldChanged { .. } => EventKind::ShieldChanged,
            EngineEvent::BossHealthChanged { .. } => EventKind::BossHealthChanged,
            EngineEvent::EnemyHit { .. } => EventKind::EnemyHit,
        }
    }
}

pub type SubscriberId = u32;

type Callback = Box<dyn FnMut(&EngineEvent)>;

/// Observer registry. Single-threaded by design, like the rest of the core.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<(EventKind, SubscriberId, Callback)>,
    next_id: SubscriberId,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one event kind; the returned token identifies the
    /// callback for `off`
    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> SubscriberId
    where
        F: FnMut(&EngineEvent) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push((kind, id, Box::new(callback)));
        id
    }

    /// Remove a subscription; returns false if it was never registered
    pub fn off(&mut self, kind: EventKind, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(k, i, _)| !(*k == kind && *i == id));
        self.subscribers.len() != before
    }

    pub fn emit(&mut self, event: &EngineEvent) {
        let kind = event.kind();
        for (k, _, callback) in self.subscribers.iter_mut() {
            if *k == kind {
                callback(event);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
