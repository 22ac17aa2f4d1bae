//! Tokenflow Runtime
//!
//! Orchestrates token animation for an event-loop visualizer.
//!
//! # Features
//!
//! - **Token manager**: lifecycle-checked operations that resolve a
//!   [`Completion`] when the animation they start has finished
//! - **Pooling**: destroyed tokens are recycled per category
//! - **Zones**: pluggable stage areas with stations, queue slots and
//!   attraction fields
//! - **Choreographer**: a single-threaded task pool that resumes flows once
//!   per frame
//! - **Flows**: scripted journeys for each token category
//! - **Event bridge**: maps a runtime model's event feed onto token flows,
//!   with narration and stage callbacks
//!
//! # Example
//!
//! ```ignore
//! use tokenflow_runtime::{Engine, EngineConfig, StaticZone, ZoneKind};
//! use tokenflow_core::{TokenCategory, TokenSpec, Vec3};
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.register_zone(ZoneKind::CallStack, StaticZone::new(Vec3::new(-8.0, 0.0, 2.0)));
//! let flow = engine.spawn_flow(TokenSpec::new(TokenCategory::Immediate, "console.log"));
//! while !flow.is_ready() {
//!     engine.tick(1.0 / 60.0);
//! }
//! ```

pub mod bridge;
pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod flow;
pub mod manager;
pub mod motion;
mod pool;
pub mod zone;

pub use bridge::{EventBridge, NarrationSink, Phase, SimEvent, StageObserver, TaskKind, TaskRef};
pub use completion::{Completion, TransitionOutcome};
pub use config::{EngineConfig, FlowTimings, Steering, Timings};
pub use engine::Engine;
pub use error::{ConfigError, Result};
pub use executor::{Choreographer, FlowHandle};
pub use flow::execute_token_flow;
pub use manager::{TokenManager, TokenMap, TokenSnapshot};
pub use motion::PathSpec;
pub use zone::{station_position, Arrival, QueueZone, StaticZone, Station, Zone, ZoneKind};
