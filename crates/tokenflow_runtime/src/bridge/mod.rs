//! Event bridge
//!
//! Translates the runtime model's event feed into token operations. Each
//! event is recorded, narrated, turned into a fire-and-forget flow on the
//! engine's choreographer, and finally reported to the stage observer.
//!
//! Task ids from the feed map to tokens. A mapping is reused only while the
//! token is alive and still in the same incarnation, so replaying an event
//! never creates a duplicate token and a recycled token is never mistaken
//! for an old task.

mod event;
mod narration;

pub use event::{Phase, SimEvent, TaskKind, TaskRef};
pub use narration::{narrate, NarrationSink, StageObserver};

use crate::engine::Engine;
use crate::executor::Choreographer;
use crate::manager::TokenManager;
use crate::zone::ZoneKind;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::time::Duration;
use tokenflow_core::{TokenId, TokenSpec, TokenState};

/// Milliseconds per step at animation speed 1
const BASE_DELAY_MS: f32 = 800.0;
/// Animation speed used when reduced motion is requested
const REDUCED_MOTION_SPEED: f32 = 0.75;

pub struct EventBridge {
    manager: TokenManager,
    choreographer: Choreographer,
    history: Vec<SimEvent>,
    /// Every task seen, in first-seen order
    registry: IndexMap<String, TaskRef>,
    /// Task id → (token, incarnation at mapping time)
    tokens: FxHashMap<String, (TokenId, u32)>,
    narration: Option<Box<dyn NarrationSink>>,
    observer: Option<Box<dyn StageObserver>>,
    animation_speed: f32,
    reduced_motion: bool,
}

impl EventBridge {
    pub fn new(engine: &Engine) -> Self {
        Self {
            manager: engine.manager().clone(),
            choreographer: engine.choreographer().clone(),
            history: Vec::new(),
            registry: IndexMap::new(),
            tokens: FxHashMap::default(),
            narration: None,
            observer: None,
            animation_speed: 1.0,
            reduced_motion: false,
        }
    }

    pub fn with_narration(mut self, sink: impl NarrationSink + 'static) -> Self {
        self.narration = Some(Box::new(sink));
        self
    }

    pub fn with_observer(mut self, observer: impl StageObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Process one event from the feed
    pub fn handle(&mut self, event: SimEvent) {
        tracing::debug!("EventBridge: {}", event.kind());
        self.history.push(event.clone());

        if let Some(task) = event.task() {
            self.registry.insert(task.id.clone(), task.clone());
        }

        if let Some(sink) = self.narration.as_mut() {
            let line = narrate(&event);
            if let Err(err) = sink.narrate(&line) {
                tracing::warn!("EventBridge: narration sink failed: {err:#}");
            }
        }

        self.dispatch(&event);

        if let Some(observer) = self.observer.as_mut() {
            observer.event_processed(&event);
        }
    }

    fn dispatch(&mut self, event: &SimEvent) {
        match event {
            SimEvent::WebapiAdd { token } => {
                let id = self.ensure_token(token);
                self.route(id, ZoneKind::ExternalService);
            }
            SimEvent::EnqueueMicro { token } => {
                let id = self.ensure_token(token);
                self.route(id, ZoneKind::MicrotaskQueue);
            }
            SimEvent::EnqueueMacro { token } => {
                let id = self.ensure_token(token);
                self.route(id, ZoneKind::MacrotaskQueue);
            }
            SimEvent::DequeueMicro { token } => {
                self.observe(|o| o.queue_processing(true, true));
                self.process(token);
            }
            SimEvent::DequeueMacro { token } => {
                self.observe(|o| o.queue_processing(false, true));
                self.process(token);
            }
            SimEvent::TokenMove { token, to, .. } => match ZoneKind::parse(to) {
                Some(kind) => {
                    let id = self.ensure_token(token);
                    self.route(id, kind);
                }
                None => tracing::warn!("EventBridge: unknown zone {to:?} for {}", token.id),
            },
            SimEvent::TokenRemove { token_id, .. } => match self.tokens.remove(token_id) {
                Some((id, _)) => {
                    let _ = self.manager.destroy_token(id);
                }
                None => tracing::debug!("EventBridge: remove for unmapped task {token_id}"),
            },
            SimEvent::WebapiComplete { .. } => {}
            SimEvent::Sync { description } => {
                self.observe(|o| {
                    o.phase_changed(Some(Phase::RunSync));
                    o.sync_ran(description);
                });
            }
            SimEvent::StackPush { frame } => self.observe(|o| o.frame_pushed(frame)),
            SimEvent::StackPop { frame } => self.observe(|o| o.frame_popped(frame)),
            SimEvent::MicrotaskDrain { .. } => self.observe(|o| {
                o.phase_changed(Some(Phase::DrainMicro));
                o.queue_processing(true, true);
            }),
            SimEvent::MacrotaskRun { .. } => self.observe(|o| {
                o.phase_changed(Some(Phase::RunMacro));
                o.queue_processing(false, true);
            }),
            SimEvent::Tick { phase } => self.observe(|o| o.phase_changed(Some(*phase))),
            SimEvent::ScenarioEnd => self.observe(|o| {
                o.phase_changed(None);
                o.queue_processing(true, false);
            }),
        }
    }

    fn observe(&mut self, f: impl FnOnce(&mut dyn StageObserver)) {
        if let Some(observer) = self.observer.as_mut() {
            f(observer.as_mut());
        }
    }

    fn route(&self, id: TokenId, kind: ZoneKind) {
        let manager = self.manager.clone();
        self.choreographer.spawn(async move {
            manager.move_to_zone(id, kind).await;
        });
    }

    fn process(&self, task: &TaskRef) {
        let Some(id) = self.token_for(&task.id) else {
            tracing::warn!("EventBridge: dequeue for unknown task {}", task.id);
            return;
        };
        let manager = self.manager.clone();
        self.choreographer.spawn(async move {
            manager.process_with_event_loop(id).await;
        });
    }

    /// The live token mapped to `task`, or a freshly spawned one
    fn ensure_token(&mut self, task: &TaskRef) -> TokenId {
        if let Some(id) = self.token_for(&task.id) {
            return id;
        }

        let spec = TokenSpec::new(task.kind.category(), task.label.clone())
            .with_metadata("task", task.id.clone());
        let spawn = self.manager.config().spawn_position;
        let id = self.manager.create_token(spec, spawn);
        let incarnation = self.manager.incarnation(id).unwrap_or(0);
        self.tokens.insert(task.id.clone(), (id, incarnation));
        tracing::debug!("EventBridge: task {} is {id}", task.id);
        id
    }

    /// Token currently standing for `task_id`, if its mapping is still valid
    pub fn token_for(&self, task_id: &str) -> Option<TokenId> {
        let &(id, incarnation) = self.tokens.get(task_id)?;
        let live = self
            .manager
            .with_token(id, |t| {
                t.incarnation() == incarnation && t.state() != TokenState::Destroyed
            })
            .unwrap_or(false);
        live.then_some(id)
    }

    pub fn history(&self) -> &[SimEvent] {
        &self.history
    }

    pub fn registry(&self) -> &IndexMap<String, TaskRef> {
        &self.registry
    }

    pub fn set_animation_speed(&mut self, speed: f32) {
        if !(speed.is_finite() && speed > 0.0) {
            tracing::warn!("EventBridge: ignoring animation speed {speed}");
            return;
        }
        self.animation_speed = speed;
        tracing::debug!(
            "EventBridge: animation speed {speed}x ({:?} per step)",
            self.animation_delay()
        );
    }

    pub fn animation_speed(&self) -> f32 {
        self.animation_speed
    }

    /// Suggested pause between feed steps at the current speed
    pub fn animation_delay(&self) -> Duration {
        let micros = (BASE_DELAY_MS * 1000.0 / self.animation_speed).round();
        Duration::from_micros(micros as u64)
    }

    /// Slow animation down for hosts that prefer reduced motion
    pub fn set_reduced_motion(&mut self, reduced: bool) {
        self.reduced_motion = reduced;
        self.animation_speed = if reduced { REDUCED_MOTION_SPEED } else { 1.0 };
    }

    pub fn reduced_motion(&self) -> bool {
        self.reduced_motion
    }

    /// Forget history and task mappings before a new scenario
    pub fn reset(&mut self) {
        tracing::debug!("EventBridge: reset after {} events", self.history.len());
        self.history.clear();
        self.registry.clear();
        self.tokens.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn bridge() -> (Engine, EventBridge) {
        let engine = Engine::new(EngineConfig::default().with_seed(4));
        let bridge = EventBridge::new(&engine);
        (engine, bridge)
    }

    #[test]
    fn test_animation_delay_follows_speed() {
        let (_engine, mut bridge) = bridge();
        assert_eq!(bridge.animation_delay(), Duration::from_millis(800));
        bridge.set_animation_speed(2.0);
        assert_eq!(bridge.animation_delay(), Duration::from_millis(400));
        bridge.set_animation_speed(0.0);
        assert_eq!(bridge.animation_speed(), 2.0);

        bridge.set_reduced_motion(true);
        assert_eq!(bridge.animation_speed(), 0.75);
    }

    #[test]
    fn test_registry_keeps_first_seen_order() {
        let (_engine, mut bridge) = bridge();
        for id in ["b", "a", "b"] {
            bridge.handle(SimEvent::WebapiComplete {
                token: TaskRef::new(id, TaskKind::Fetch, id),
            });
        }
        let order: Vec<&str> = bridge.registry().keys().map(String::as_str).collect();
        assert_eq!(order, vec!["b", "a"]);
        assert_eq!(bridge.history().len(), 3);
    }

    #[test]
    fn test_reset_forgets_mappings() {
        let (_engine, mut bridge) = bridge();
        bridge.handle(SimEvent::WebapiAdd {
            token: TaskRef::new("t1", TaskKind::Timer, "setTimeout"),
        });
        assert!(bridge.token_for("t1").is_some());

        bridge.reset();
        assert!(bridge.token_for("t1").is_none());
        assert!(bridge.history().is_empty());
        assert!(bridge.registry().is_empty());
    }
}
