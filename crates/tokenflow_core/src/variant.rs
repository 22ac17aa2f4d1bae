//! Token variant factory
//!
//! Categories differ only in their physical parameters, so the variants are
//! a lookup table rather than a type hierarchy.

use crate::token::{PhysicsProperties, Token, TokenCategory, TokenId, TokenSpec};

/// Physical parameters for a category
///
/// Timer tokens are light, strongly magnetic and small so they snap into
/// place; network tokens are heavy, dull and large.
pub fn profile(category: TokenCategory) -> PhysicsProperties {
    match category {
        TokenCategory::Immediate => PhysicsProperties::default(),
        TokenCategory::Deferred => PhysicsProperties {
            mass: 0.8,
            drag: 0.97,
            elasticity: 0.7,
            magnetism: 1.5,
            collision_radius: 0.45,
            gravity: true,
        },
        TokenCategory::Timer => PhysicsProperties {
            mass: 0.5,
            drag: 0.98,
            elasticity: 0.8,
            magnetism: 2.0,
            collision_radius: 0.35,
            gravity: false,
        },
        TokenCategory::Network => PhysicsProperties {
            mass: 2.5,
            drag: 0.95,
            elasticity: 0.2,
            magnetism: 0.8,
            collision_radius: 0.7,
            gravity: true,
        },
        TokenCategory::UiEvent => PhysicsProperties {
            mass: 0.7,
            drag: 0.97,
            elasticity: 0.9,
            magnetism: 1.2,
            collision_radius: 0.4,
            gravity: true,
        },
        TokenCategory::Io => PhysicsProperties {
            mass: 1.8,
            drag: 0.96,
            elasticity: 0.4,
            magnetism: 0.9,
            collision_radius: 0.6,
            gravity: true,
        },
    }
}

/// Mints tokens with fresh identities
#[derive(Debug, Default)]
pub struct TokenFactory {
    next_id: u64,
}

impl TokenFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next identity without building a token
    pub fn next_id(&mut self) -> TokenId {
        let id = TokenId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Build a token configured for its category
    pub fn create(&mut self, spec: TokenSpec) -> Token {
        let id = self.next_id();
        let physics = profile(spec.category);
        tracing::debug!("TokenFactory: created {id} ({})", spec.category);
        Token::new(id, spec, physics)
    }

    /// Number of identities minted so far
    pub fn minted(&self) -> u64 {
        self.next_id
    }
}

/// Build a token from a category tag; unknown tags produce an
/// immediate-execution token.
pub fn create_token(
    factory: &mut TokenFactory,
    category: &str,
    content: impl Into<String>,
    priority: Option<i32>,
) -> Token {
    let spec = TokenSpec::new(TokenCategory::from_tag(category), content)
        .with_priority(priority.unwrap_or(0));
    factory.create(spec)
}
