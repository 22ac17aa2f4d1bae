//! Headless Replay
//!
//! Replays a small event-loop scenario through the event bridge without a
//! renderer and prints the narration plus a per-step token summary.
//!
//! Run with: cargo run -p tokenflow_runtime --example headless_replay
//!
//! Pass a TOML file as the first argument to override engine settings.

use anyhow::{Context, Result};
use tokenflow_core::{TokenCategory, Vec3};
use tokenflow_runtime::{
    Engine, EngineConfig, EventBridge, Phase, QueueZone, SimEvent, StageObserver, StaticZone,
    Station, ZoneKind,
};

const SCENARIO: &str = r#"[
    {"type": "sync", "description": "console.log('script start')"},
    {"type": "stack-push", "frame": "main"},
    {"type": "webapi-add", "token": {"id": "t1", "type": "timer", "label": "setTimeout"}},
    {"type": "enqueue-micro", "token": {"id": "p1", "type": "promise", "label": "Promise.then"}},
    {"type": "stack-pop", "frame": "main"},
    {"type": "tick", "phase": "drain-micro"},
    {"type": "dequeue-micro", "token": {"id": "p1", "type": "promise", "label": "Promise.then"}},
    {"type": "token-remove", "tokenId": "p1"},
    {"type": "webapi-complete", "token": {"id": "t1", "type": "timer", "label": "setTimeout"}},
    {"type": "enqueue-macro", "token": {"id": "t1", "type": "timer", "label": "setTimeout"}},
    {"type": "tick", "phase": "run-macro"},
    {"type": "dequeue-macro", "token": {"id": "t1", "type": "timer", "label": "setTimeout"}},
    {"type": "token-remove", "tokenId": "t1"},
    {"type": "scenario-end"}
]"#;

const DT: f32 = 1.0 / 60.0;

/// Logs stage changes a renderer would animate
struct StageLog;

impl StageObserver for StageLog {
    fn phase_changed(&mut self, phase: Option<Phase>) {
        match phase {
            Some(phase) => tracing::info!("dispatcher phase: {phase}"),
            None => tracing::info!("dispatcher idle"),
        }
    }

    fn frame_pushed(&mut self, frame: &str) {
        tracing::info!("stack push: {frame}");
    }

    fn frame_popped(&mut self, frame: &str) {
        tracing::info!("stack pop: {frame}");
    }
}

fn build_stage(engine: &Engine) {
    engine.register_zone(
        ZoneKind::CallStack,
        StaticZone::new(Vec3::new(-8.0, 0.0, 2.0)).with_stride(0.6),
    );
    engine.register_zone(
        ZoneKind::ExternalService,
        StaticZone::new(Vec3::new(0.0, 4.0, 0.0))
            .with_station(Station::new("timers", TokenCategory::Timer, Vec3::new(-2.0, 4.0, 0.0)))
            .with_station(Station::new("network", TokenCategory::Network, Vec3::new(2.0, 4.0, 0.0))),
    );
    engine.register_zone(
        ZoneKind::MicrotaskQueue,
        QueueZone::new(Vec3::new(0.0, 0.0, 10.0)).with_attraction(2.0, 4.0),
    );
    engine.register_zone(
        ZoneKind::MacrotaskQueue,
        QueueZone::new(Vec3::new(6.0, -1.0, 0.0)).with_attraction(2.0, 4.0),
    );
    engine.register_zone(ZoneKind::EventLoop, StaticZone::new(Vec3::new(0.0, 2.0, 0.0)));
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => EngineConfig::default().with_seed(42),
    };

    let mut engine = Engine::new(config);
    build_stage(&engine);

    let mut bridge = EventBridge::new(&engine)
        .with_observer(StageLog)
        .with_narration(|line: &str| -> Result<()> {
            println!("  {line}");
            Ok(())
        });

    let events = SimEvent::parse_feed(SCENARIO).context("parsing scenario")?;
    let step = bridge.animation_delay().as_secs_f32();

    for (index, event) in events.into_iter().enumerate() {
        println!("[{index:02}] {}", event.kind());
        bridge.handle(event);
        engine.run_for(step, DT);

        let manager = engine.manager();
        for id in manager.token_ids() {
            if let Some(snapshot) = manager.snapshot(id) {
                println!(
                    "      {id} {:<10} {:<10} at ({:.2}, {:.2}, {:.2})",
                    snapshot.category.as_str(),
                    snapshot.state.to_string(),
                    snapshot.position.x,
                    snapshot.position.y,
                    snapshot.position.z,
                );
            }
        }
    }

    engine.run_for(2.0, DT);
    let manager = engine.manager();
    println!(
        "done after {} frames: {} live tokens, {} pooled timers, {} particles",
        engine.frame(),
        manager.len(),
        manager.pool_len(TokenCategory::Timer),
        manager.particle_count(),
    );
    if let Some(fault) = manager.physics_fault() {
        println!("physics fell back to tweens: {fault}");
    }

    engine.dispose();
    Ok(())
}
