//! Tokenflow Core
//!
//! Shared types for the token physics and animation engine.
//!
//! # Features
//!
//! - **Math**: `Vec3` with operator overloads, `Color` with HSL construction
//! - **Tokens**: identity, category, payload and physical state of a unit of work
//! - **Lifecycle**: the pure state × operation transition table
//! - **Variants**: per-category physical parameter table and token factory

pub mod color;
pub mod lifecycle;
pub mod math;
pub mod token;
pub mod variant;

pub use color::Color;
pub use lifecycle::{Operation, TokenState};
pub use math::Vec3;
pub use token::{
    PhysicsOverrides, PhysicsProperties, Token, TokenCategory, TokenDescriptor, TokenId,
    TokenSpec, MAX_TRAIL_LENGTH, MIN_TRAIL_LENGTH,
};
pub use variant::{create_token, profile, TokenFactory};
