//! Tokens
//!
//! A token is one in-flight unit of work moving through the scheduling
//! model. It carries an identity, a category, a payload, its physical state
//! and the lifecycle state driven by the manager.

use crate::lifecycle::TokenState;
use crate::math::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// Minimum number of positions kept in a motion trail
pub const MIN_TRAIL_LENGTH: usize = 5;
/// Maximum number of positions kept in a motion trail
pub const MAX_TRAIL_LENGTH: usize = 20;

/// Opaque token identity, displayed as `token-N`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenId(u64);

impl TokenId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token-{}", self.0)
    }
}

/// The kind of work a token represents
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TokenCategory {
    #[serde(rename = "immediate-execution", alias = "sync")]
    Immediate,
    #[serde(rename = "deferred-promise", alias = "promise")]
    Deferred,
    #[serde(rename = "timer")]
    Timer,
    #[serde(rename = "network-call", alias = "fetch")]
    Network,
    #[serde(rename = "ui-event", alias = "dom")]
    UiEvent,
    #[serde(rename = "io-operation", alias = "io")]
    Io,
}

impl TokenCategory {
    pub const ALL: [TokenCategory; 6] = [
        TokenCategory::Immediate,
        TokenCategory::Deferred,
        TokenCategory::Timer,
        TokenCategory::Network,
        TokenCategory::UiEvent,
        TokenCategory::Io,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenCategory::Immediate => "immediate-execution",
            TokenCategory::Deferred => "deferred-promise",
            TokenCategory::Timer => "timer",
            TokenCategory::Network => "network-call",
            TokenCategory::UiEvent => "ui-event",
            TokenCategory::Io => "io-operation",
        }
    }

    /// Parse a category from its long name or its short tag
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "immediate-execution" | "immediate" | "sync" => Some(TokenCategory::Immediate),
            "deferred-promise" | "deferred" | "promise" => Some(TokenCategory::Deferred),
            "timer" => Some(TokenCategory::Timer),
            "network-call" | "network" | "fetch" => Some(TokenCategory::Network),
            "ui-event" | "dom" => Some(TokenCategory::UiEvent),
            "io-operation" | "io" => Some(TokenCategory::Io),
            _ => None,
        }
    }

    /// Parse a category, falling back to immediate execution for unknown tags
    pub fn from_tag(tag: &str) -> Self {
        Self::parse(tag).unwrap_or_else(|| {
            tracing::warn!("unknown token category {tag:?}, using immediate-execution");
            TokenCategory::Immediate
        })
    }
}

impl fmt::Display for TokenCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical parameters of a token
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicsProperties {
    /// Mass, strictly positive
    pub mass: f32,
    /// Per-tick velocity retention in (0, 1]
    pub drag: f32,
    /// Restitution in [0, 1]
    pub elasticity: f32,
    /// Response to magnetic fields, non-negative
    pub magnetism: f32,
    /// Collision sphere radius, strictly positive
    pub collision_radius: f32,
    /// Whether gravity forces apply
    pub gravity: bool,
}

impl Default for PhysicsProperties {
    fn default() -> Self {
        Self {
            mass: 1.0,
            drag: 0.98,
            elasticity: 0.6,
            magnetism: 1.0,
            collision_radius: 0.5,
            gravity: true,
        }
    }
}

impl PhysicsProperties {
    /// True when every parameter is finite and inside its legal range
    pub fn is_valid(&self) -> bool {
        self.mass.is_finite()
            && self.mass > 0.0
            && self.drag.is_finite()
            && self.drag > 0.0
            && self.drag <= 1.0
            && (0.0..=1.0).contains(&self.elasticity)
            && self.magnetism.is_finite()
            && self.magnetism >= 0.0
            && self.collision_radius.is_finite()
            && self.collision_radius > 0.0
    }

    /// Apply a partial override, clamping each field into its legal range
    pub fn apply(&mut self, overrides: &PhysicsOverrides) {
        if let Some(mass) = overrides.mass {
            self.mass = mass.max(0.001);
        }
        if let Some(drag) = overrides.drag {
            self.drag = drag.clamp(0.001, 1.0);
        }
        if let Some(elasticity) = overrides.elasticity {
            self.elasticity = elasticity.clamp(0.0, 1.0);
        }
        if let Some(magnetism) = overrides.magnetism {
            self.magnetism = magnetism.max(0.0);
        }
        if let Some(radius) = overrides.collision_radius {
            self.collision_radius = radius.max(0.001);
        }
        if let Some(gravity) = overrides.gravity {
            self.gravity = gravity;
        }
    }
}

/// Partial override record for [`PhysicsProperties`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsOverrides {
    pub mass: Option<f32>,
    pub drag: Option<f32>,
    pub elasticity: Option<f32>,
    pub magnetism: Option<f32>,
    pub collision_radius: Option<f32>,
    pub gravity: Option<bool>,
}

impl PhysicsOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = Some(mass);
        self
    }

    pub fn with_drag(mut self, drag: f32) -> Self {
        self.drag = Some(drag);
        self
    }

    pub fn with_elasticity(mut self, elasticity: f32) -> Self {
        self.elasticity = Some(elasticity);
        self
    }

    pub fn with_magnetism(mut self, magnetism: f32) -> Self {
        self.magnetism = Some(magnetism);
        self
    }

    pub fn with_collision_radius(mut self, radius: f32) -> Self {
        self.collision_radius = Some(radius);
        self
    }

    pub fn with_gravity(mut self, gravity: bool) -> Self {
        self.gravity = Some(gravity);
        self
    }
}

/// What a caller asks for when creating a token
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenSpec {
    pub category: TokenCategory,
    pub content: String,
    #[serde(default)]
    pub priority: i32,
    /// Countdown in seconds, used by timer flows
    #[serde(default)]
    pub delay: Option<f32>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl TokenSpec {
    pub fn new(category: TokenCategory, content: impl Into<String>) -> Self {
        Self {
            category,
            content: content.into(),
            priority: 0,
            delay: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_delay(mut self, seconds: f32) -> Self {
        self.delay = Some(seconds);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Read-only view of a token handed to zone collaborators
#[derive(Clone, Debug, PartialEq)]
pub struct TokenDescriptor {
    pub id: TokenId,
    pub category: TokenCategory,
    pub content: String,
    pub priority: i32,
}

/// A single animated unit of work
#[derive(Clone, Debug)]
pub struct Token {
    id: TokenId,
    category: TokenCategory,
    incarnation: u32,
    pub content: String,
    pub priority: i32,
    pub delay: Option<f32>,
    pub metadata: BTreeMap<String, String>,

    pub position: Vec3,
    pub velocity: Vec3,
    pub target_position: Vec3,
    /// Progress along the current path, 0.0..=1.0
    pub path_progress: f32,
    /// Unit facing direction
    pub heading: Vec3,
    pub scale: f32,
    pub physics: PhysicsProperties,

    state: TokenState,
    trail: VecDeque<Vec3>,
}

impl Token {
    pub fn new(id: TokenId, spec: TokenSpec, physics: PhysicsProperties) -> Self {
        Self {
            id,
            category: spec.category,
            incarnation: 0,
            content: spec.content,
            priority: spec.priority,
            delay: spec.delay,
            metadata: spec.metadata,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            target_position: Vec3::ZERO,
            path_progress: 0.0,
            heading: Vec3::FORWARD,
            scale: 1.0,
            physics,
            state: TokenState::Idle,
            trail: VecDeque::with_capacity(MAX_TRAIL_LENGTH),
        }
    }

    pub fn id(&self) -> TokenId {
        self.id
    }

    pub fn category(&self) -> TokenCategory {
        self.category
    }

    /// Number of times this identity has been drawn back out of a pool
    pub fn incarnation(&self) -> u32 {
        self.incarnation
    }

    pub fn state(&self) -> TokenState {
        self.state
    }

    /// Set the lifecycle state. Only the lifecycle manager should call this;
    /// legality is checked by [`TokenState::apply`](crate::lifecycle::TokenState::apply).
    pub fn set_state(&mut self, state: TokenState) {
        self.state = state;
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    pub fn descriptor(&self) -> TokenDescriptor {
        TokenDescriptor {
            id: self.id,
            category: self.category,
            content: self.content.clone(),
            priority: self.priority,
        }
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    pub fn set_physics_properties(&mut self, overrides: &PhysicsOverrides) {
        self.physics.apply(overrides);
    }

    /// Instantaneous velocity change of `force / mass`
    pub fn apply_impulse(&mut self, force: Vec3) {
        self.velocity += force / self.physics.mass;
    }

    /// Nudge the token toward `target`; the pull weakens with distance and
    /// scales with the token's magnetism.
    pub fn set_magnetic_target(&mut self, target: Vec3, strength: f32) {
        let offset = target - self.position;
        let distance = offset.length();
        if distance > 0.1 {
            let magnitude = strength * self.physics.magnetism / distance.max(0.5);
            self.apply_impulse(offset.normalize() * magnitude);
        }
    }

    /// Recent positions, oldest first
    pub fn trail(&self) -> impl Iterator<Item = &Vec3> {
        self.trail.iter()
    }

    pub fn trail_len(&self) -> usize {
        self.trail.len()
    }

    /// Record the current position when the token is moving. The trail keeps
    /// between 5 and 20 points, longer for faster tokens.
    pub fn record_trail(&mut self) {
        let speed = self.speed();
        if speed <= 0.1 {
            return;
        }
        let limit = ((speed * 3.0) as usize).clamp(MIN_TRAIL_LENGTH, MAX_TRAIL_LENGTH);
        self.trail.push_back(self.position);
        while self.trail.len() > limit {
            self.trail.pop_front();
        }
    }

    /// Re-point this pooled token at a new request, keeping its identity
    pub fn reincarnate(&mut self, spec: TokenSpec) {
        self.incarnation = self.incarnation.wrapping_add(1);
        self.content = spec.content;
        self.priority = spec.priority;
        self.delay = spec.delay;
        self.metadata = spec.metadata;
    }

    /// Return the token to a spawnable baseline with the given parameters
    pub fn reset(&mut self, physics: PhysicsProperties) {
        self.position = Vec3::ZERO;
        self.velocity = Vec3::ZERO;
        self.target_position = Vec3::ZERO;
        self.path_progress = 0.0;
        self.heading = Vec3::FORWARD;
        self.scale = 1.0;
        self.physics = physics;
        self.state = TokenState::Idle;
        self.trail.clear();
    }

    /// Whether this pooled token may serve a request for `category`
    pub fn is_reusable_as(&self, category: TokenCategory) -> bool {
        self.category == category
            && self.state == TokenState::Idle
            && self.physics.is_valid()
            && self.position.is_finite()
            && self.velocity.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(category: TokenCategory) -> Token {
        Token::new(
            TokenId::new(1),
            TokenSpec::new(category, "work"),
            PhysicsProperties::default(),
        )
    }

    #[test]
    fn test_id_display() {
        assert_eq!(TokenId::new(7).to_string(), "token-7");
    }

    #[test]
    fn test_category_parse_accepts_both_names() {
        assert_eq!(TokenCategory::parse("fetch"), Some(TokenCategory::Network));
        assert_eq!(TokenCategory::parse("network-call"), Some(TokenCategory::Network));
        assert_eq!(TokenCategory::parse("dom"), Some(TokenCategory::UiEvent));
        assert_eq!(TokenCategory::parse("bogus"), None);
        assert_eq!(TokenCategory::from_tag("bogus"), TokenCategory::Immediate);
        for category in TokenCategory::ALL {
            assert_eq!(TokenCategory::parse(category.as_str()), Some(category));
        }
    }

    #[test]
    fn test_category_serde_aliases() {
        let c: TokenCategory = serde_json::from_str("\"promise\"").unwrap();
        assert_eq!(c, TokenCategory::Deferred);
        assert_eq!(
            serde_json::to_string(&TokenCategory::Io).unwrap(),
            "\"io-operation\""
        );
    }

    #[test]
    fn test_impulse_scales_with_mass() {
        let mut t = token(TokenCategory::Immediate);
        t.physics.mass = 2.0;
        t.apply_impulse(Vec3::new(4.0, 0.0, 0.0));
        assert_eq!(t.velocity, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_magnetic_target_ignores_close_targets() {
        let mut t = token(TokenCategory::Immediate);
        t.set_magnetic_target(Vec3::new(0.05, 0.0, 0.0), 10.0);
        assert_eq!(t.velocity, Vec3::ZERO);

        // distance 1.0 -> magnitude 10 * 1.0 / 1.0
        t.set_magnetic_target(Vec3::new(1.0, 0.0, 0.0), 10.0);
        assert!((t.velocity.x - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_overrides_are_clamped() {
        let mut props = PhysicsProperties::default();
        props.apply(
            &PhysicsOverrides::default()
                .with_mass(-3.0)
                .with_elasticity(4.0)
                .with_gravity(false),
        );
        assert_eq!(props.mass, 0.001);
        assert_eq!(props.elasticity, 1.0);
        assert!(!props.gravity);
        assert!(props.is_valid());
    }

    #[test]
    fn test_trail_bounds() {
        let mut t = token(TokenCategory::Immediate);
        t.velocity = Vec3::new(100.0, 0.0, 0.0);
        for i in 0..50 {
            t.position = Vec3::new(i as f32, 0.0, 0.0);
            t.record_trail();
        }
        assert_eq!(t.trail_len(), MAX_TRAIL_LENGTH);

        t.velocity = Vec3::new(0.5, 0.0, 0.0);
        t.record_trail();
        assert_eq!(t.trail_len(), MIN_TRAIL_LENGTH);
    }

    #[test]
    fn test_reusable_check() {
        let mut t = token(TokenCategory::Timer);
        assert!(t.is_reusable_as(TokenCategory::Timer));
        assert!(!t.is_reusable_as(TokenCategory::Io));
        t.physics.mass = f32::NAN;
        assert!(!t.is_reusable_as(TokenCategory::Timer));
    }
}
