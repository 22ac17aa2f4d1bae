//! Spring constraints between pairs of tokens

use crate::body::Body;
use tokenflow_core::TokenId;

slotmap::new_key_type! {
    /// Handle to a spring constraint
    pub struct ConstraintId;
}

/// Damping applied when none is given
pub const DEFAULT_SPRING_DAMPING: f32 = 0.1;

/// A damped spring holding two tokens at a rest distance
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringConstraint {
    pub a: TokenId,
    pub b: TokenId,
    pub rest_length: f32,
    pub stiffness: f32,
    pub damping: f32,
}

impl SpringConstraint {
    pub fn new(a: TokenId, b: TokenId) -> Self {
        Self {
            a,
            b,
            rest_length: 1.0,
            stiffness: 1.0,
            damping: DEFAULT_SPRING_DAMPING,
        }
    }

    pub fn with_rest_length(mut self, rest_length: f32) -> Self {
        self.rest_length = rest_length.max(0.0);
        self
    }

    pub fn with_stiffness(mut self, stiffness: f32) -> Self {
        self.stiffness = stiffness.max(0.0);
        self
    }

    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping.max(0.0);
        self
    }

    pub fn involves(&self, id: TokenId) -> bool {
        self.a == id || self.b == id
    }

    /// Apply one step of spring and damping impulses to both endpoints.
    ///
    /// The impulse is split by inverse mass so the heavier token moves less.
    pub fn resolve(&self, a: &mut Body, b: &mut Body, dt: f32) {
        let offset = b.position - a.position;
        let distance = offset.length();
        if distance <= f32::EPSILON {
            return;
        }
        let axis = offset / distance;
        let inv_a = a.inverse_mass();
        let inv_b = b.inverse_mass();

        let displacement = distance - self.rest_length;
        let spring = axis * (displacement * self.stiffness * dt);
        a.velocity += spring * inv_a;
        b.velocity -= spring * inv_b;

        let closing = (b.velocity - a.velocity).dot(axis);
        let damping = axis * (closing * self.damping * dt);
        a.velocity += damping * inv_a;
        b.velocity -= damping * inv_b;
    }
}
