//! Tokenflow Physics
//!
//! A small deterministic simulation for tokens in flight.
//!
//! # Features
//!
//! - **Forces**: uniform gravity, point magnetic fields, uniform wind
//! - **Springs**: damped distance constraints between pairs of tokens
//! - **Collisions**: spatial-grid broad phase, sphere narrow phase, positional
//!   correction and elastic impulses
//! - **Particles**: pooled cosmetic particle effects
//!
//! The world borrows tokens through [`BodyStore`] for the duration of a
//! tick and never owns them.

pub mod body;
pub mod config;
pub mod constraint;
pub mod error;
pub mod force;
pub mod grid;
pub mod particles;
pub mod world;

pub use body::{Body, BodyStore};
pub use config::PhysicsConfig;
pub use constraint::{ConstraintId, SpringConstraint, DEFAULT_SPRING_DAMPING};
pub use error::{PhysicsError, Result};
pub use force::{Force, ForceId, ForceKind};
pub use grid::{CellCoord, SpatialGrid};
pub use particles::{EmitterConfig, Particle, ParticleBuffer, ParticleEmitter};
pub use world::{Contact, PhysicsWorld, GRAVITY_FORCE};
