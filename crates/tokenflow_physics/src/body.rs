//! Token access for the physics world
//!
//! The world never owns tokens. During a tick it gathers the participating
//! tokens' physical state into a dense buffer of [`Body`] values, simulates
//! on that buffer and writes positions and velocities back.

use std::collections::HashMap;
use std::hash::BuildHasher;
use tokenflow_core::{PhysicsProperties, Token, TokenId, Vec3};

/// Lookup of tokens by id, implemented by whatever owns them
pub trait BodyStore {
    fn body(&self, id: TokenId) -> Option<&Token>;
    fn body_mut(&mut self, id: TokenId) -> Option<&mut Token>;
}

impl<S: BuildHasher> BodyStore for HashMap<TokenId, Token, S> {
    fn body(&self, id: TokenId) -> Option<&Token> {
        self.get(&id)
    }

    fn body_mut(&mut self, id: TokenId) -> Option<&mut Token> {
        self.get_mut(&id)
    }
}

#[cfg(test)]
impl BodyStore for Vec<Token> {
    fn body(&self, id: TokenId) -> Option<&Token> {
        self.iter().find(|t| t.id() == id)
    }

    fn body_mut(&mut self, id: TokenId) -> Option<&mut Token> {
        self.iter_mut().find(|t| t.id() == id)
    }
}

/// Physical state of one token for the duration of a tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Body {
    pub id: TokenId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub props: PhysicsProperties,
}

impl Body {
    pub fn from_token(token: &Token) -> Self {
        Self {
            id: token.id(),
            position: token.position,
            velocity: token.velocity,
            props: token.physics,
        }
    }

    pub fn inverse_mass(&self) -> f32 {
        1.0 / self.props.mass
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }
}

/// Mutable access to two distinct bodies of a slice
pub(crate) fn pair_mut(bodies: &mut [Body], i: usize, j: usize) -> (&mut Body, &mut Body) {
    debug_assert_ne!(i, j);
    if i < j {
        let (head, tail) = bodies.split_at_mut(j);
        (&mut head[i], &mut tail[0])
    } else {
        let (head, tail) = bodies.split_at_mut(i);
        (&mut tail[0], &mut head[j])
    }
}
