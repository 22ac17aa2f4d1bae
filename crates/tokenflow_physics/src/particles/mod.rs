//! Particle effects
//!
//! Short-lived cosmetic points thrown off by fast tokens. Particles live in a
//! bounded pool and never touch token state.
//!
//! # Example
//!
//! ```ignore
//! use tokenflow_physics::particles::*;
//!
//! let mut sparks = ParticleEmitter::with_seed(EmitterConfig::default(), 7);
//! sparks.emit(Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0), 10);
//! sparks.update(1.0 / 60.0);
//! ```

mod particle;

pub use particle::*;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tokenflow_core::{Color, Vec3};

/// Particle emitter configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Maximum number of live particles
    pub capacity: usize,
    /// Scale of the random velocity added to each particle
    pub jitter: f32,
    /// Downward acceleration
    pub gravity: f32,
    /// Per-update velocity retention
    pub drag: f32,
    /// Lifetime range in seconds
    pub lifetime: Range<f32>,
    /// Size range
    pub size: Range<f32>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            jitter: 2.0,
            gravity: 9.81,
            drag: 0.98,
            lifetime: 1.0..3.0,
            size: 0.05..0.15,
        }
    }
}

impl EmitterConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_lifetime(mut self, lifetime: Range<f32>) -> Self {
        self.lifetime = lifetime;
        self
    }
}

/// Fixed-capacity particle storage with slot reuse
#[derive(Clone, Debug)]
pub struct ParticleBuffer {
    /// Particle slots, alive or dead
    pub particles: Vec<Particle>,
    /// Pool of dead particles for reuse
    dead_indices: Vec<usize>,
    capacity: usize,
}

impl ParticleBuffer {
    /// Create a new particle buffer with capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            particles: Vec::with_capacity(capacity),
            dead_indices: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Spawn a new particle, reusing dead slots if available
    pub fn spawn(&mut self, particle: Particle) -> Option<usize> {
        if let Some(index) = self.dead_indices.pop() {
            self.particles[index] = particle;
            Some(index)
        } else if self.particles.len() < self.capacity {
            let index = self.particles.len();
            self.particles.push(particle);
            Some(index)
        } else {
            None
        }
    }

    /// Mark a particle as dead
    #[cfg(test)]
    fn kill(&mut self, index: usize) {
        if let Some(particle) = self.particles.get_mut(index) {
            if particle.alive {
                particle.alive = false;
                self.dead_indices.push(index);
            }
        }
    }

    /// Advance every live particle, returning how many expired
    pub fn update(&mut self, dt: f32, gravity: f32, drag: f32) -> usize {
        let mut expired = 0;
        for (index, particle) in self.particles.iter_mut().enumerate() {
            if !particle.alive {
                continue;
            }
            particle.update(dt, gravity, drag);
            if !particle.alive {
                self.dead_indices.push(index);
                expired += 1;
            }
        }
        expired
    }

    /// Get number of alive particles
    pub fn alive_count(&self) -> usize {
        self.particles.len() - self.dead_indices.len()
    }

    /// Clear all particles
    pub fn clear(&mut self) {
        self.particles.clear();
        self.dead_indices.clear();
    }

    /// Iterate over alive particles
    pub fn iter_alive(&self) -> impl Iterator<Item = (usize, &Particle)> {
        self.particles
            .iter()
            .enumerate()
            .filter(|(_, p)| p.alive)
    }
}

/// Spawns and animates particles from a pooled buffer
pub struct ParticleEmitter {
    config: EmitterConfig,
    buffer: ParticleBuffer,
    rng: SmallRng,
}

impl ParticleEmitter {
    pub fn new(config: EmitterConfig) -> Self {
        Self::with_rng(config, SmallRng::from_entropy())
    }

    /// Emitter with a reproducible random sequence
    pub fn with_seed(config: EmitterConfig, seed: u64) -> Self {
        Self::with_rng(config, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(config: EmitterConfig, rng: SmallRng) -> Self {
        Self {
            buffer: ParticleBuffer::new(config.capacity),
            config,
            rng,
        }
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    /// Emit up to `count` particles at `origin`. Returns how many were
    /// spawned; the rest are dropped once the pool is full.
    pub fn emit(&mut self, origin: Vec3, base_velocity: Vec3, count: usize) -> usize {
        let mut spawned = 0;
        for _ in 0..count {
            let jitter = Vec3::new(
                self.rng.gen_range(-1.0..1.0),
                self.rng.gen_range(-1.0..1.0),
                self.rng.gen_range(-1.0..1.0),
            ) * self.config.jitter;
            let lifetime = sample(&mut self.rng, &self.config.lifetime);
            let size = sample(&mut self.rng, &self.config.size);
            let hue: f32 = self.rng.gen();

            let particle = Particle::new(origin, base_velocity + jitter, lifetime)
                .with_color(Color::from_hsl(hue, 0.8, 0.6))
                .with_size(size);
            if self.buffer.spawn(particle).is_none() {
                tracing::trace!("ParticleEmitter: pool full, dropped {} particles", count - spawned);
                break;
            }
            spawned += 1;
        }
        spawned
    }

    /// Roll the emitter's own dice; used to thin out per-frame emission
    pub fn chance(&mut self, probability: f64) -> bool {
        if !(probability > 0.0) {
            return false;
        }
        self.rng.gen_bool(probability.min(1.0))
    }

    /// Advance all live particles, returning how many expired
    pub fn update(&mut self, dt: f32) -> usize {
        if dt <= 0.0 {
            return 0;
        }
        self.buffer
            .update(dt, self.config.gravity, self.config.drag)
    }

    pub fn alive_count(&self) -> usize {
        self.buffer.alive_count()
    }

    pub fn particles(&self) -> impl Iterator<Item = &Particle> {
        self.buffer.iter_alive().map(|(_, p)| p)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

fn sample(rng: &mut SmallRng, range: &Range<f32>) -> f32 {
    if range.start < range.end {
        rng.gen_range(range.clone())
    } else {
        range.start
    }
}
