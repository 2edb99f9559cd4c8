//! Swarmfall entry point
//!
//! Native builds run a headless autopilot session: the full simulation
//! pipeline under a scripted pilot, logging progress. Rendering and input
//! capture live in the embedding host, not here.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use glam::Vec2;
    use swarmfall::events::{EngineEvent, EventKind};
    use swarmfall::sim::{FrameInput, GameStatus};
    use swarmfall::GameEngine;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let seed = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0xC0FFEE);
    let mut engine = GameEngine::new(seed);

    engine.events.on(EventKind::WaveChanged, |e| {
        if let EngineEvent::WaveChanged { wave } = e {
            log::info!("== wave {} ==", wave);
        }
    });
    engine.events.on(EventKind::BossHealthChanged, |e| {
        if let EngineEvent::BossHealthChanged { health, max } = e {
            log::debug!("boss {:.0}/{:.0}", health, max);
        }
    });

    engine.start_run();

    const DT: f32 = 1.0 / 60.0;
    let mut ticks: u64 = 0;
    while ticks < 60 * 60 * 5 {
        let input = autopilot(engine.snapshot(), ticks);
        engine.tick(&input, DT);
        ticks += 1;

        match engine.session.status {
            GameStatus::Shop => {
                // Spend greedily, then move on
                let offers = engine.shop_offers(3);
                for id in offers {
                    engine.buy_upgrade(id);
                }
                engine.tick(&FrameInput::default(), DT);
                engine.continue_run();
            }
            GameStatus::Extraction => {
                log::info!("extraction reached at wave {}, banking", engine.session.wave);
                engine.extract();
                break;
            }
            GameStatus::GameOver => {
                log::info!(
                    "run over: wave {}, score {}",
                    engine.session.wave,
                    engine.session.score
                );
                break;
            }
            _ => {}
        }
    }

    let meta = &engine.session.meta;
    log::info!(
        "final: score {}, banked {} currency / {} xp (level {})",
        engine.session.score,
        meta.currency,
        meta.xp,
        meta.level()
    );

    /// Scripted pilot: chase-aim the nearest enemy, strafe on a slow orbit
    fn autopilot(session: &swarmfall::GameSession, ticks: u64) -> FrameInput {
        let player_pos = match session.entities.player() {
            Some(p) => p.pos,
            None => return FrameInput::default(),
        };
        let nearest = session
            .entities
            .enemies()
            .iter()
            .filter(|e| e.active)
            .min_by(|a, b| {
                a.pos
                    .distance(player_pos)
                    .partial_cmp(&b.pos.distance(player_pos))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

        let aim = nearest.map(|e| e.pos).unwrap_or(session.bounds * 0.5);
        let t = ticks as f32 * 0.01;
        let orbit = Vec2::new(t.cos(), t.sin());
        // Back off when crowded
        let retreat = nearest
            .map(|e| e.pos.distance(player_pos) < 120.0)
            .unwrap_or(false);
        let move_dir = if retreat {
            (player_pos - aim).normalize_or_zero()
        } else {
            orbit
        };

        FrameInput {
            move_dir,
            aim,
            fire: true,
            dash: retreat && ticks.is_multiple_of(90),
            ability: ticks.is_multiple_of(600),
            reload: false,
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The wasm build is driven by the embedding host through the library
    // surface; there is no standalone entry point.
}
