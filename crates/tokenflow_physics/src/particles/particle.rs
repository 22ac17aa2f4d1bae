//! Individual particle data

use tokenflow_core::{Color, Vec3};

/// A single cosmetic particle
#[derive(Clone, Debug)]
pub struct Particle {
    /// Current position
    pub position: Vec3,
    /// Current velocity
    pub velocity: Vec3,
    pub color: Color,
    pub size: f32,
    /// Seconds of life left
    pub life: f32,
    /// Lifetime at spawn
    pub max_life: f32,
    /// Whether particle is alive
    pub alive: bool,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            color: Color::WHITE,
            size: 0.1,
            life: 1.0,
            max_life: 1.0,
            alive: true,
        }
    }
}

impl Particle {
    /// Create a new particle
    pub fn new(position: Vec3, velocity: Vec3, lifetime: f32) -> Self {
        Self {
            position,
            velocity,
            life: lifetime,
            max_life: lifetime,
            ..Default::default()
        }
    }

    /// Remaining life as a fraction (1 = just spawned, 0 = expired)
    pub fn life_fraction(&self) -> f32 {
        if self.max_life <= 0.0 {
            0.0
        } else {
            (self.life / self.max_life).clamp(0.0, 1.0)
        }
    }

    pub fn is_dead(&self) -> bool {
        self.life <= 0.0
    }

    /// Update particle for one frame: integrate, fall, slow down and age
    pub fn update(&mut self, dt: f32, gravity: f32, drag: f32) {
        if !self.alive {
            return;
        }

        self.position += self.velocity * dt;
        self.velocity.y -= gravity * dt;
        self.velocity *= drag;
        self.life -= dt;

        if self.is_dead() {
            self.alive = false;
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }
}
