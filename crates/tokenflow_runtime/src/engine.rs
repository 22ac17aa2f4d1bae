//! The engine context
//!
//! [`Engine`] bundles the token manager with the choreographer that runs
//! flows against it. Hosts create one per scene and call
//! [`Engine::tick`] once per frame.
//!
//! # Example
//!
//! ```ignore
//! use tokenflow_runtime::{Engine, EngineConfig};
//! use tokenflow_core::{TokenCategory, TokenSpec};
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! let flow = engine.spawn_flow(TokenSpec::new(TokenCategory::Timer, "setTimeout"));
//! while !flow.is_ready() {
//!     engine.tick(1.0 / 60.0);
//! }
//! ```

use crate::config::EngineConfig;
use crate::executor::{Choreographer, FlowHandle};
use crate::flow::execute_token_flow;
use crate::manager::TokenManager;
use crate::zone::{Zone, ZoneKind};
use std::future::Future;
use tokenflow_core::{TokenId, TokenSpec};

pub struct Engine {
    manager: TokenManager,
    choreographer: Choreographer,
    frame: u64,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        tracing::debug!(
            "Engine: pool size {}, physics {}",
            config.pool_size,
            if config.physics_enabled { "on" } else { "off" }
        );
        Self {
            manager: TokenManager::new(config),
            choreographer: Choreographer::new(),
            frame: 0,
        }
    }

    pub fn manager(&self) -> &TokenManager {
        &self.manager
    }

    pub fn choreographer(&self) -> &Choreographer {
        &self.choreographer
    }

    pub fn register_zone(&self, kind: ZoneKind, zone: impl Zone + 'static) {
        self.manager.register_zone(kind, zone);
    }

    /// Advance one frame: simulated time first, then every flow that the
    /// frame unblocked
    pub fn tick(&mut self, dt: f32) {
        self.manager.tick(dt);
        self.choreographer.run_until_stalled();
        self.frame += 1;
    }

    /// Tick at a fixed step until `seconds` of simulated time have passed
    pub fn run_for(&mut self, seconds: f32, dt: f32) {
        if !(dt > 0.0) {
            return;
        }
        let frames = (seconds / dt).ceil().max(0.0) as usize;
        for _ in 0..frames {
            self.tick(dt);
        }
    }

    /// Poll flows without advancing time
    pub fn settle(&self) {
        self.choreographer.run_until_stalled();
    }

    /// Run a category flow for a new token
    pub fn spawn_flow(&self, spec: TokenSpec) -> FlowHandle<TokenId> {
        self.choreographer
            .spawn_with_handle(execute_token_flow(self.manager.clone(), spec))
    }

    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.choreographer.spawn(future);
    }

    pub fn spawn_with_handle<F, T>(&self, future: F) -> FlowHandle<T>
    where
        F: Future<Output = T> + 'static,
        T: 'static,
    {
        self.choreographer.spawn_with_handle(future)
    }

    /// Frames ticked so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Drop every flow, token and pool
    pub fn dispose(&mut self) {
        self.choreographer.clear();
        self.manager.dispose();
        tracing::debug!("Engine: disposed after {} frames", self.frame);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::TransitionOutcome;
    use tokenflow_core::{TokenCategory, TokenState, Vec3};

    #[test]
    fn test_tick_resumes_flows() {
        let mut engine = Engine::new(EngineConfig::default().with_seed(3));
        let manager = engine.manager().clone();
        let id = manager.create_token(TokenSpec::new(TokenCategory::Immediate, "a"), Vec3::ZERO);

        let handle = engine.spawn_with_handle(async move {
            manager.move_to(id, Vec3::new(1.0, 0.0, 0.0), 0.2).await
        });
        engine.settle();
        assert!(!handle.is_ready());

        engine.run_for(0.3, 0.016);
        assert_eq!(handle.try_get(), Some(TransitionOutcome::Finished));
        assert_eq!(engine.manager().state(id), Some(TokenState::Idle));
        assert_eq!(engine.frame(), 19);
    }

    #[test]
    fn test_dispose_clears_everything() {
        let mut engine = Engine::new(EngineConfig::default().with_seed(3));
        let _flow = engine.spawn_flow(TokenSpec::new(TokenCategory::Network, "fetch"));
        engine.tick(0.016);
        assert_eq!(engine.manager().len(), 1);
        assert_eq!(engine.choreographer().pending(), 1);

        engine.dispose();
        assert!(engine.manager().is_empty());
        assert_eq!(engine.choreographer().pending(), 0);
    }
}
