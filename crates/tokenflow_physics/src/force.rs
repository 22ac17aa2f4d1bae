//! Environmental forces
//!
//! Forces apply to every participating token each tick and are summed before
//! integration.

use serde::{Deserialize, Serialize};
use tokenflow_core::{PhysicsProperties, Vec3};

slotmap::new_key_type! {
    /// Handle to a force installed in a [`PhysicsWorld`](crate::PhysicsWorld)
    pub struct ForceId;
}

/// Discriminant used to remove forces in bulk
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceKind {
    Gravity,
    Magnetic,
    Wind,
}

/// An environmental force field
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Force {
    /// Uniform gravity, scaled by mass; only affects tokens with gravity enabled
    Gravity { direction: Vec3, strength: f32 },
    /// Point attractor whose pull falls off with the square of distance
    Magnetic {
        anchor: Vec3,
        strength: f32,
        falloff: f32,
    },
    /// Constant push in one direction
    Wind { direction: Vec3, strength: f32 },
}

impl Force {
    /// Earth-like gravity pointing down
    pub fn gravity(strength: f32) -> Self {
        Force::Gravity {
            direction: Vec3::DOWN,
            strength,
        }
    }

    /// Gravity from a vector; its length is the strength
    pub fn gravity_vector(gravity: Vec3) -> Self {
        Force::Gravity {
            direction: gravity.normalize(),
            strength: gravity.length(),
        }
    }

    pub fn magnetic(anchor: Vec3, strength: f32, falloff: f32) -> Self {
        Force::Magnetic {
            anchor,
            strength,
            falloff,
        }
    }

    pub fn wind(direction: Vec3, strength: f32) -> Self {
        Force::Wind {
            direction: direction.normalize(),
            strength,
        }
    }

    pub fn kind(&self) -> ForceKind {
        match self {
            Force::Gravity { .. } => ForceKind::Gravity,
            Force::Magnetic { .. } => ForceKind::Magnetic,
            Force::Wind { .. } => ForceKind::Wind,
        }
    }

    /// Force exerted on a token at `position`.
    ///
    /// `min_distance` disables magnetic fields for tokens sitting on the
    /// anchor. A zero falloff is treated as 1.
    pub fn evaluate(&self, position: Vec3, props: &PhysicsProperties, min_distance: f32) -> Vec3 {
        match *self {
            Force::Gravity {
                direction,
                strength,
            } => {
                if props.gravity {
                    direction * (strength * props.mass)
                } else {
                    Vec3::ZERO
                }
            }
            Force::Magnetic {
                anchor,
                strength,
                falloff,
            } => {
                let offset = anchor - position;
                let distance = offset.length();
                if distance <= min_distance {
                    return Vec3::ZERO;
                }
                let falloff = if falloff == 0.0 { 1.0 } else { falloff };
                let scaled = distance / falloff;
                let magnitude = strength * props.magnetism / (scaled * scaled);
                offset / distance * magnitude
            }
            Force::Wind {
                direction,
                strength,
            } => direction * strength,
        }
    }
}
