//! Engine configuration
//!
//! Everything tunable about the runtime lives in [`EngineConfig`]. Every
//! field has a default, so a config file only needs the values it changes:
//!
//! ```toml
//! pool_size = 8
//!
//! [timings]
//! settle_delay = 0.4
//!
//! [physics.gravity]
//! x = 0.0
//! y = -3.0
//! z = 0.0
//! ```

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tokenflow_core::Vec3;
use tokenflow_physics::{EmitterConfig, PhysicsConfig};

// =============================================================================
// Engine
// =============================================================================

/// Runtime configuration for an [`Engine`](crate::Engine)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Recycled tokens kept per category
    pub pool_size: usize,
    /// Vertical spacing between queue slots
    pub slot_height: f32,
    /// Where new tokens appear
    pub spawn_position: Vec3,
    /// Dispatcher position used when no event-loop zone is registered
    pub dispatcher_position: Vec3,
    /// Start with physics participation on
    pub physics_enabled: bool,
    /// Seed for cosmetic randomness; entropy when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub particle_seed: Option<u64>,
    pub timings: Timings,
    pub steering: Steering,
    pub physics: PhysicsConfig,
    pub particles: EmitterConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_size: 5,
            slot_height: 0.3,
            spawn_position: Vec3::new(0.0, 5.0, 0.0),
            dispatcher_position: Vec3::new(0.0, 2.0, 0.0),
            physics_enabled: true,
            particle_seed: None,
            timings: Timings::default(),
            steering: Steering::default(),
            physics: PhysicsConfig::zero_gravity(),
            particles: EmitterConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("EngineConfig: loaded {}", path.display());
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.particle_seed = Some(seed);
        self
    }

    pub fn with_physics(mut self, physics: PhysicsConfig) -> Self {
        self.physics = physics;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.slot_height.is_finite() && self.slot_height >= 0.0) {
            return Err(invalid(format!("slot_height must be >= 0, got {}", self.slot_height)));
        }
        if !self.spawn_position.is_finite() || !self.dispatcher_position.is_finite() {
            return Err(invalid("positions must be finite".into()));
        }
        self.timings.validate()?;
        self.steering.validate()?;

        let physics = &self.physics;
        if !physics.gravity.is_finite() {
            return Err(invalid("physics.gravity must be finite".into()));
        }
        if !(physics.air_density.is_finite() && physics.air_density >= 0.0) {
            return Err(invalid(format!(
                "physics.air_density must be >= 0, got {}",
                physics.air_density
            )));
        }
        if !(physics.cell_size.is_finite() && physics.cell_size > 0.0) {
            return Err(invalid(format!(
                "physics.cell_size must be > 0, got {}",
                physics.cell_size
            )));
        }

        let particles = &self.particles;
        if particles.lifetime.start > particles.lifetime.end
            || particles.size.start > particles.size.end
        {
            return Err(invalid("particle ranges must not be reversed".into()));
        }
        if !(particles.drag > 0.0 && particles.drag <= 1.0) {
            return Err(invalid(format!(
                "particles.drag must be in (0, 1], got {}",
                particles.drag
            )));
        }
        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}

// =============================================================================
// Timings
// =============================================================================

/// Durations in simulated seconds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Grow-in after creation
    pub spawn: f32,
    /// Shrink-out after destroy
    pub despawn: f32,
    /// Travel into a queue slot
    pub queue: f32,
    /// Travel onto the call stack
    pub stack: f32,
    /// Travel to an external-service station
    pub service: f32,
    /// Travel to the dispatcher
    pub dispatch: f32,
    /// Pause at the dispatcher before completing
    pub settle_delay: f32,
    /// One leg of the completion pulse
    pub pulse: f32,
    pub flow: FlowTimings,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            spawn: 0.5,
            despawn: 0.5,
            queue: 0.5,
            stack: 1.0,
            service: 1.2,
            dispatch: 0.8,
            settle_delay: 0.8,
            pulse: 0.2,
            flow: FlowTimings::default(),
        }
    }
}

impl Timings {
    fn validate(&self) -> Result<()> {
        let named = [
            ("spawn", self.spawn),
            ("despawn", self.despawn),
            ("queue", self.queue),
            ("stack", self.stack),
            ("service", self.service),
            ("dispatch", self.dispatch),
            ("settle_delay", self.settle_delay),
            ("pulse", self.pulse),
            ("flow.stack_dwell", self.flow.stack_dwell),
            ("flow.promise_wait", self.flow.promise_wait),
            ("flow.timer_wait", self.flow.timer_wait),
            ("flow.network_wait", self.flow.network_wait),
            ("flow.io_wait", self.flow.io_wait),
            ("flow.grace", self.flow.grace),
        ];
        for (name, value) in named {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(format!("timings.{name} must be >= 0, got {value}")));
            }
        }
        Ok(())
    }
}

/// Pauses used by the scripted per-category flows
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowTimings {
    /// Time an immediate token spends on the stack
    pub stack_dwell: f32,
    /// Promise resolution time in the service zone
    pub promise_wait: f32,
    /// Timer countdown when the token carries no delay of its own
    pub timer_wait: f32,
    pub network_wait: f32,
    pub io_wait: f32,
    /// Pause after completion before the token is destroyed
    pub grace: f32,
}

impl Default for FlowTimings {
    fn default() -> Self {
        Self {
            stack_dwell: 1.0,
            promise_wait: 1.5,
            timer_wait: 2.0,
            network_wait: 2.5,
            io_wait: 3.0,
            grace: 1.0,
        }
    }
}

// =============================================================================
// Steering
// =============================================================================

/// Path following and particle emission tuning
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Steering {
    /// Desired velocity per unit of distance to the path point
    pub gain: f32,
    /// How quickly velocity converges on the desired velocity, per second
    pub response: f32,
    /// Path followers faster than this shed particles
    pub particle_speed: f32,
    /// Per-frame chance of shedding
    pub particle_chance: f64,
    /// Particles per shed
    pub particle_burst: usize,
}

impl Default for Steering {
    fn default() -> Self {
        Self {
            gain: 6.0,
            response: 10.0,
            particle_speed: 2.0,
            particle_chance: 0.3,
            particle_burst: 3,
        }
    }
}

impl Steering {
    fn validate(&self) -> Result<()> {
        if !(self.gain.is_finite() && self.gain > 0.0) {
            return Err(invalid(format!("steering.gain must be > 0, got {}", self.gain)));
        }
        if !(self.response.is_finite() && self.response > 0.0) {
            return Err(invalid(format!(
                "steering.response must be > 0, got {}",
                self.response
            )));
        }
        if !(0.0..=1.0).contains(&self.particle_chance) {
            return Err(invalid(format!(
                "steering.particle_chance must be in [0, 1], got {}",
                self.particle_chance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.pool_size, 5);
        assert_eq!(config.slot_height, 0.3);
        assert_eq!(config.physics.gravity, Vec3::ZERO);
        assert_eq!(config.timings.settle_delay, 0.8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            pool_size = 2

            [timings]
            settle_delay = 0.4
            "#,
        )
        .unwrap();
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.timings.settle_delay, 0.4);
        assert_eq!(config.timings.spawn, 0.5);
        assert_eq!(config.slot_height, 0.3);
    }

    #[test]
    fn test_rejects_negative_timing() {
        let err = EngineConfig::from_toml_str("[timings]\nqueue = -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("timings.queue"));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = EngineConfig::from_toml_str("pool_size = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::load("/definitely/not/here/tokenflow.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
