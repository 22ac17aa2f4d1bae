//! Physics world configuration

use serde::{Deserialize, Serialize};
use tokenflow_core::Vec3;

/// Physics simulation configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity vector; a non-zero vector installs a gravity force on creation
    pub gravity: Vec3,
    /// Coefficient of the velocity-proportional air drag force
    pub air_density: f32,
    /// Edge length of a spatial grid cell
    pub cell_size: f32,
    /// Magnetic fields do nothing to tokens closer than this
    pub min_field_distance: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            air_density: 0.02,
            cell_size: 2.0,
            min_field_distance: 0.01,
        }
    }
}

impl PhysicsConfig {
    /// Create config with custom gravity
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_air_density(mut self, air_density: f32) -> Self {
        self.air_density = air_density.max(0.0);
        self
    }

    /// Set the spatial grid cell size
    pub fn with_cell_size(mut self, cell_size: f32) -> Self {
        self.cell_size = cell_size.max(0.01);
        self
    }

    /// Zero gravity preset
    pub fn zero_gravity() -> Self {
        Self::default().with_gravity(Vec3::ZERO)
    }

    /// Low gravity preset
    pub fn low_gravity() -> Self {
        Self::default().with_gravity(Vec3::new(0.0, -1.62, 0.0))
    }
}
