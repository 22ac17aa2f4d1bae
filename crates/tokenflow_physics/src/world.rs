//! Physics world
//!
//! Advances every participating token one time step at a time:
//!
//! 1. rebuild the spatial grid
//! 2. accumulate forces and integrate velocity (semi-implicit Euler)
//! 3. resolve spring constraints
//! 4. detect collisions among same-cell and adjacent-cell pairs
//! 5. resolve collisions with positional correction and elastic impulses
//! 6. integrate positions
//!
//! The world holds token ids, never tokens. Iteration follows insertion
//! order and nothing is random, so identical inputs give identical
//! trajectories.

use crate::body::{pair_mut, Body, BodyStore};
use crate::config::PhysicsConfig;
use crate::constraint::{ConstraintId, SpringConstraint};
use crate::error::{PhysicsError, Result};
use crate::force::{Force, ForceId, ForceKind};
use crate::grid::SpatialGrid;
use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use tokenflow_core::{PhysicsOverrides, Token, TokenId, Vec3};

/// Name of the gravity force installed from [`PhysicsConfig::gravity`]
pub const GRAVITY_FORCE: &str = "gravity";

/// A collision found during the last tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    /// Lower id of the pair
    pub a: TokenId,
    /// Higher id of the pair
    pub b: TokenId,
    /// Unit vector from `a` toward `b`
    pub normal: Vec3,
    /// Overlap of the two collision spheres
    pub depth: f32,
}

#[derive(Clone, Debug)]
struct ForceEntry {
    name: Option<String>,
    force: Force,
}

/// Discrete-time force, spring and collision simulation
pub struct PhysicsWorld {
    config: PhysicsConfig,
    members: IndexSet<TokenId>,
    forces: SlotMap<ForceId, ForceEntry>,
    constraints: SlotMap<ConstraintId, SpringConstraint>,
    grid: SpatialGrid,
    contacts: Vec<Contact>,
    // per-tick scratch
    bodies: Vec<Body>,
    index: FxHashMap<TokenId, usize>,
    ticks: u64,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

impl PhysicsWorld {
    pub fn new(config: PhysicsConfig) -> Self {
        let mut world = Self {
            grid: SpatialGrid::new(config.cell_size),
            config,
            members: IndexSet::new(),
            forces: SlotMap::with_key(),
            constraints: SlotMap::with_key(),
            contacts: Vec::new(),
            bodies: Vec::new(),
            index: FxHashMap::default(),
            ticks: 0,
        };
        if world.config.gravity != Vec3::ZERO {
            let gravity = Force::gravity_vector(world.config.gravity);
            world.add_named_force(GRAVITY_FORCE, gravity);
        }
        world
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Participation
    // ---------------------------------------------------------------------

    /// Start simulating `token`, applying `overrides` to its parameters.
    ///
    /// Returns false, and changes nothing, when the token already participates.
    pub fn add_token(&mut self, token: &mut Token, overrides: &PhysicsOverrides) -> bool {
        if self.members.contains(&token.id()) {
            return false;
        }
        if !overrides.is_empty() {
            token.set_physics_properties(overrides);
        }
        self.members.insert(token.id());
        tracing::debug!("PhysicsWorld: {} joined ({} bodies)", token.id(), self.members.len());
        true
    }

    /// Stop simulating `id` and drop every spring attached to it
    pub fn remove_token(&mut self, id: TokenId) -> bool {
        if !self.members.shift_remove(&id) {
            return false;
        }
        let before = self.constraints.len();
        self.constraints.retain(|_, c| !c.involves(id));
        let purged = before - self.constraints.len();
        tracing::debug!("PhysicsWorld: {id} left, {purged} constraints purged");
        true
    }

    pub fn contains(&self, id: TokenId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Participating tokens in insertion order
    pub fn token_ids(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.members.iter().copied()
    }

    // ---------------------------------------------------------------------
    // Forces
    // ---------------------------------------------------------------------

    pub fn add_force(&mut self, force: Force) -> ForceId {
        self.forces.insert(ForceEntry { name: None, force })
    }

    /// Install a force under `name`, replacing any force already using it
    pub fn add_named_force(&mut self, name: impl Into<String>, force: Force) -> ForceId {
        let name = name.into();
        if let Some((id, entry)) = self
            .forces
            .iter_mut()
            .find(|(_, e)| e.name.as_deref() == Some(name.as_str()))
        {
            entry.force = force;
            return id;
        }
        self.forces.insert(ForceEntry {
            name: Some(name),
            force,
        })
    }

    /// Add a point attractor
    pub fn create_magnetic_field(&mut self, position: Vec3, strength: f32, falloff: f32) -> ForceId {
        self.add_force(Force::magnetic(position, strength, falloff))
    }

    pub fn force(&self, id: ForceId) -> Option<&Force> {
        self.forces.get(id).map(|e| &e.force)
    }

    pub fn named_force(&self, name: &str) -> Option<&Force> {
        self.forces
            .values()
            .find(|e| e.name.as_deref() == Some(name))
            .map(|e| &e.force)
    }

    pub fn forces(&self) -> impl Iterator<Item = &Force> + '_ {
        self.forces.values().map(|e| &e.force)
    }

    pub fn remove_force_id(&mut self, id: ForceId) -> bool {
        self.forces.remove(id).is_some()
    }

    pub fn remove_force(&mut self, name: &str) -> bool {
        let before = self.forces.len();
        self.forces.retain(|_, e| e.name.as_deref() != Some(name));
        before != self.forces.len()
    }

    /// Remove every force of `kind`, returning how many were removed
    pub fn remove_forces(&mut self, kind: ForceKind) -> usize {
        let before = self.forces.len();
        self.forces.retain(|_, e| e.force.kind() != kind);
        before - self.forces.len()
    }

    /// Move the anchor of the named magnetic field in place
    pub fn set_field_anchor(&mut self, name: &str, position: Vec3) -> bool {
        for entry in self.forces.values_mut() {
            if entry.name.as_deref() != Some(name) {
                continue;
            }
            if let Force::Magnetic { anchor, .. } = &mut entry.force {
                *anchor = position;
                return true;
            }
        }
        false
    }

    // ---------------------------------------------------------------------
    // Constraints
    // ---------------------------------------------------------------------

    /// Connect two participating tokens with a spring using default damping
    pub fn create_spring_constraint(
        &mut self,
        a: TokenId,
        b: TokenId,
        rest_length: f32,
        stiffness: f32,
    ) -> Result<ConstraintId> {
        self.add_spring(
            SpringConstraint::new(a, b)
                .with_rest_length(rest_length)
                .with_stiffness(stiffness),
        )
    }

    pub fn add_spring(&mut self, spring: SpringConstraint) -> Result<ConstraintId> {
        if spring.a == spring.b {
            return Err(PhysicsError::SelfConstraint(spring.a));
        }
        for end in [spring.a, spring.b] {
            if !self.members.contains(&end) {
                return Err(PhysicsError::UnknownToken(end));
            }
        }
        Ok(self.constraints.insert(spring))
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) -> bool {
        self.constraints.remove(id).is_some()
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&SpringConstraint> {
        self.constraints.get(id)
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    // ---------------------------------------------------------------------
    // Simulation
    // ---------------------------------------------------------------------

    /// Collisions found by the last tick
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Drop every body, force, constraint and cached contact
    pub fn clear(&mut self) {
        self.members.clear();
        self.forces.clear();
        self.constraints.clear();
        self.grid.clear();
        self.contacts.clear();
        self.bodies.clear();
        self.index.clear();
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Validation happens before anything is mutated; a non-finite result is
    /// detected before write-back, so on error `store` is left untouched.
    /// A zero `dt` only refreshes the grid and the contact list.
    pub fn tick<S: BodyStore + ?Sized>(&mut self, store: &mut S, dt: f32) -> Result<()> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(PhysicsError::InvalidTimeStep(dt));
        }

        self.gather(&*store)?;
        self.grid
            .rebuild(self.bodies.iter().map(|b| (b.id, b.position)));

        if dt == 0.0 {
            self.detect_collisions();
            return Ok(());
        }

        self.apply_forces(dt);
        self.resolve_constraints(dt);
        self.detect_collisions();
        self.resolve_collisions();

        for body in &mut self.bodies {
            body.position += body.velocity * dt;
        }

        if let Some(body) = self.bodies.iter().find(|b| !b.is_finite()) {
            return Err(PhysicsError::NonFinite(body.id));
        }

        for body in &self.bodies {
            if let Some(token) = store.body_mut(body.id) {
                token.position = body.position;
                token.velocity = body.velocity;
            }
        }
        self.ticks += 1;
        Ok(())
    }

    fn gather<S: BodyStore + ?Sized>(&mut self, store: &S) -> Result<()> {
        self.bodies.clear();
        self.index.clear();
        for &id in &self.members {
            let token = store.body(id).ok_or(PhysicsError::MissingBody(id))?;
            self.index.insert(id, self.bodies.len());
            self.bodies.push(Body::from_token(token));
        }
        for spring in self.constraints.values() {
            for end in [spring.a, spring.b] {
                if !self.index.contains_key(&end) {
                    return Err(PhysicsError::DanglingConstraint(end));
                }
            }
        }
        Ok(())
    }

    fn apply_forces(&mut self, dt: f32) {
        let min_distance = self.config.min_field_distance;
        let air_density = self.config.air_density;
        for body in &mut self.bodies {
            let mut force = Vec3::ZERO;
            for entry in self.forces.values() {
                force += entry.force.evaluate(body.position, &body.props, min_distance);
            }
            force -= body.velocity * (air_density * body.props.drag);

            let acceleration = force / body.props.mass;
            body.velocity += acceleration * dt;
            body.velocity *= body.props.drag;
        }
    }

    fn resolve_constraints(&mut self, dt: f32) {
        for spring in self.constraints.values() {
            let (i, j) = (self.index[&spring.a], self.index[&spring.b]);
            let (a, b) = pair_mut(&mut self.bodies, i, j);
            spring.resolve(a, b, dt);
        }
    }

    fn detect_collisions(&mut self) {
        self.contacts.clear();
        for (a, b) in self.grid.candidate_pairs() {
            let body_a = &self.bodies[self.index[&a]];
            let body_b = &self.bodies[self.index[&b]];
            let offset = body_b.position - body_a.position;
            let distance = offset.length();
            let reach = body_a.props.collision_radius + body_b.props.collision_radius;
            if distance < reach {
                self.contacts.push(Contact {
                    a,
                    b,
                    normal: contact_normal(offset, distance),
                    depth: reach - distance,
                });
            }
        }
    }

    fn resolve_collisions(&mut self) {
        for contact in &self.contacts {
            let (i, j) = (self.index[&contact.a], self.index[&contact.b]);
            let (a, b) = pair_mut(&mut self.bodies, i, j);

            // earlier corrections may already have separated this pair
            let offset = b.position - a.position;
            let distance = offset.length();
            let reach = a.props.collision_radius + b.props.collision_radius;
            if distance >= reach {
                continue;
            }
            let normal = contact_normal(offset, distance);
            let correction = normal * ((reach - distance) * 0.5);
            a.position -= correction;
            b.position += correction;

            let closing = (b.velocity - a.velocity).dot(normal);
            if closing > 0.0 {
                continue;
            }
            let elasticity = a.props.elasticity.min(b.props.elasticity);
            let (inv_a, inv_b) = (a.inverse_mass(), b.inverse_mass());
            let impulse = -(1.0 + elasticity) * closing / (inv_a + inv_b);
            a.velocity -= normal * (impulse * inv_a);
            b.velocity += normal * (impulse * inv_b);
        }
    }
}

/// Unit contact normal; coincident centres separate along the up axis
fn contact_normal(offset: Vec3, distance: f32) -> Vec3 {
    if distance > f32::EPSILON {
        offset / distance
    } else {
        Vec3::UP
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokenflow_core::{TokenCategory, TokenFactory, TokenSpec};

    fn spawn(factory: &mut TokenFactory, category: TokenCategory, position: Vec3) -> Token {
        let mut token = factory.create(TokenSpec::new(category, "t"));
        token.position = position;
        token
    }

    fn register(world: &mut PhysicsWorld, tokens: &mut [Token]) {
        for token in tokens.iter_mut() {
            world.add_token(token, &PhysicsOverrides::default());
        }
    }

    fn penetration(tokens: &[Token]) -> f32 {
        let reach = tokens[0].physics.collision_radius + tokens[1].physics.collision_radius;
        (reach - tokens[0].position.distance(tokens[1].position)).max(0.0)
    }

    #[test]
    fn test_default_world_has_gravity() {
        let world = PhysicsWorld::default();
        assert!(matches!(
            world.named_force(GRAVITY_FORCE),
            Some(Force::Gravity { .. })
        ));
        assert_eq!(PhysicsWorld::new(PhysicsConfig::zero_gravity()).forces().count(), 0);
    }

    #[test]
    fn test_gravity_pulls_down_unless_disabled() {
        let mut factory = TokenFactory::new();
        let mut tokens = vec![
            spawn(&mut factory, TokenCategory::Immediate, Vec3::new(0.0, 5.0, 0.0)),
            spawn(&mut factory, TokenCategory::Timer, Vec3::new(10.0, 5.0, 0.0)),
        ];
        let mut world = PhysicsWorld::default();
        register(&mut world, &mut tokens);

        for _ in 0..60 {
            world.tick(&mut tokens, 1.0 / 60.0).unwrap();
        }
        assert!(tokens[0].position.y < 5.0);
        assert!(tokens[0].velocity.y < 0.0);
        assert_eq!(tokens[1].position, Vec3::new(10.0, 5.0, 0.0));
        assert_eq!(world.tick_count(), 60);
    }

    #[test]
    fn test_add_token_is_idempotent() {
        let mut factory = TokenFactory::new();
        let mut token = spawn(&mut factory, TokenCategory::Immediate, Vec3::ZERO);
        let mut world = PhysicsWorld::default();

        assert!(world.add_token(&mut token, &PhysicsOverrides::default().with_mass(3.0)));
        assert!(!world.add_token(&mut token, &PhysicsOverrides::default().with_mass(9.0)));
        assert_eq!(token.physics.mass, 3.0);
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_remove_token_purges_constraints() {
        let mut factory = TokenFactory::new();
        let mut tokens = vec![
            spawn(&mut factory, TokenCategory::Immediate, Vec3::ZERO),
            spawn(&mut factory, TokenCategory::Immediate, Vec3::new(3.0, 0.0, 0.0)),
            spawn(&mut factory, TokenCategory::Immediate, Vec3::new(6.0, 0.0, 0.0)),
        ];
        let mut world = PhysicsWorld::new(PhysicsConfig::zero_gravity());
        register(&mut world, &mut tokens);
        let (a, b, c) = (tokens[0].id(), tokens[1].id(), tokens[2].id());

        world.create_spring_constraint(a, b, 3.0, 1.0).unwrap();
        let kept = world.create_spring_constraint(b, c, 3.0, 1.0).unwrap();
        world.create_spring_constraint(c, a, 6.0, 1.0).unwrap();

        assert!(world.remove_token(a));
        assert_eq!(world.constraint_count(), 1);
        assert!(world.constraint(kept).is_some());
        assert!(!world.remove_token(a));
        world.tick(&mut tokens, 0.016).unwrap();
    }

    #[test]
    fn test_spring_constraint_errors() {
        let mut factory = TokenFactory::new();
        let mut token = spawn(&mut factory, TokenCategory::Immediate, Vec3::ZERO);
        let stranger = factory.next_id();
        let mut world = PhysicsWorld::default();
        world.add_token(&mut token, &PhysicsOverrides::default());

        assert_eq!(
            world.create_spring_constraint(token.id(), stranger, 1.0, 1.0),
            Err(PhysicsError::UnknownToken(stranger))
        );
        assert_eq!(
            world.create_spring_constraint(token.id(), token.id(), 1.0, 1.0),
            Err(PhysicsError::SelfConstraint(token.id()))
        );
        assert_eq!(world.constraint_count(), 0);
    }

    #[test]
    fn test_invalid_time_step_leaves_state() {
        let mut factory = TokenFactory::new();
        let mut tokens = vec![spawn(&mut factory, TokenCategory::Immediate, Vec3::new(0.0, 5.0, 0.0))];
        let mut world = PhysicsWorld::default();
        register(&mut world, &mut tokens);

        assert!(matches!(
            world.tick(&mut tokens, -0.1),
            Err(PhysicsError::InvalidTimeStep(_))
        ));
        assert!(world.tick(&mut tokens, f32::NAN).is_err());
        assert_eq!(tokens[0].position, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(tokens[0].velocity, Vec3::ZERO);
    }

    #[test]
    fn test_missing_body_is_a_fault() {
        let mut factory = TokenFactory::new();
        let mut token = spawn(&mut factory, TokenCategory::Immediate, Vec3::ZERO);
        let mut world = PhysicsWorld::default();
        world.add_token(&mut token, &PhysicsOverrides::default());

        let mut empty: Vec<Token> = Vec::new();
        assert_eq!(
            world.tick(&mut empty, 0.016),
            Err(PhysicsError::MissingBody(token.id()))
        );
    }

    #[test]
    fn test_non_finite_state_is_reported_without_write_back() {
        let mut factory = TokenFactory::new();
        let mut tokens = vec![spawn(&mut factory, TokenCategory::Immediate, Vec3::ZERO)];
        tokens[0].velocity = Vec3::new(f32::INFINITY, 0.0, 0.0);
        let mut world = PhysicsWorld::new(PhysicsConfig::zero_gravity());
        register(&mut world, &mut tokens);

        let id = tokens[0].id();
        assert_eq!(world.tick(&mut tokens, 0.016), Err(PhysicsError::NonFinite(id)));
        assert_eq!(tokens[0].position, Vec3::ZERO);
    }

    #[test]
    fn test_zero_dt_only_refreshes_contacts() {
        let mut factory = TokenFactory::new();
        let mut tokens = vec![
            spawn(&mut factory, TokenCategory::Immediate, Vec3::ZERO),
            spawn(&mut factory, TokenCategory::Immediate, Vec3::new(0.5, 0.0, 0.0)),
        ];
        tokens[0].velocity = Vec3::new(1.0, 0.0, 0.0);
        let mut world = PhysicsWorld::default();
        register(&mut world, &mut tokens);

        world.tick(&mut tokens, 0.0).unwrap();
        assert_eq!(tokens[0].position, Vec3::ZERO);
        assert_eq!(tokens[0].velocity, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(tokens[1].position, Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(world.contacts().len(), 1);
        assert!((world.contacts()[0].depth - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_overlapping_tokens_separate() {
        let mut factory = TokenFactory::new();
        let mut tokens = vec![
            spawn(&mut factory, TokenCategory::Immediate, Vec3::ZERO),
            spawn(&mut factory, TokenCategory::Immediate, Vec3::new(0.6, 0.0, 0.0)),
        ];
        let mut world = PhysicsWorld::new(PhysicsConfig::zero_gravity());
        register(&mut world, &mut tokens);

        let mut previous = penetration(&tokens);
        assert!(previous > 0.3);
        for _ in 0..20 {
            world.tick(&mut tokens, 1.0 / 60.0).unwrap();
            let current = penetration(&tokens);
            assert!(current < previous || current <= 1e-5, "{current} after {previous}");
            previous = current;
        }
        assert!(previous <= 1e-5);
    }

    #[test]
    fn test_head_on_collision_bounces() {
        let mut factory = TokenFactory::new();
        let mut tokens = vec![
            spawn(&mut factory, TokenCategory::Immediate, Vec3::ZERO),
            spawn(&mut factory, TokenCategory::Immediate, Vec3::new(0.95, 0.0, 0.0)),
        ];
        tokens[0].velocity = Vec3::new(2.0, 0.0, 0.0);
        tokens[1].velocity = Vec3::new(-2.0, 0.0, 0.0);
        let mut world = PhysicsWorld::new(PhysicsConfig::zero_gravity());
        register(&mut world, &mut tokens);

        world.tick(&mut tokens, 1.0 / 60.0).unwrap();
        assert_eq!(world.contacts().len(), 1);
        assert!(tokens[0].velocity.x < 0.0);
        assert!(tokens[1].velocity.x > 0.0);
        // e = 0.6 on both, so the bounce is slower than the approach
        assert!(tokens[1].velocity.x < 2.0);
    }

    #[test]
    fn test_spring_settles_to_rest_length() {
        let mut factory = TokenFactory::new();
        let mut tokens = vec![
            spawn(&mut factory, TokenCategory::Immediate, Vec3::ZERO),
            spawn(&mut factory, TokenCategory::Immediate, Vec3::new(5.0, 0.0, 0.0)),
        ];
        let mut world = PhysicsWorld::new(PhysicsConfig::zero_gravity());
        register(&mut world, &mut tokens);
        world
            .create_spring_constraint(tokens[0].id(), tokens[1].id(), 3.0, 10.0)
            .unwrap();

        for _ in 0..900 {
            world.tick(&mut tokens, 1.0 / 60.0).unwrap();
            let distance = tokens[0].position.distance(tokens[1].position);
            assert!(distance < 10.0, "spring diverged: {distance}");
        }
        let distance = tokens[0].position.distance(tokens[1].position);
        assert!((distance - 3.0).abs() < 0.05, "settled at {distance}");
    }

    #[test]
    fn test_magnetic_field_attracts_timer_token() {
        let mut factory = TokenFactory::new();
        let mut tokens = vec![spawn(&mut factory, TokenCategory::Timer, Vec3::new(0.0, 5.0, 0.0))];
        let mut world = PhysicsWorld::default();
        register(&mut world, &mut tokens);
        let anchor = Vec3::new(10.0, 0.0, 0.0);
        world.create_magnetic_field(anchor, 8.0, 2.0);

        let mut last_x = tokens[0].position.x;
        let mut last_distance = tokens[0].position.distance(anchor);
        for step in 1..=120 {
            world.tick(&mut tokens, 0.016).unwrap();
            if step % 10 == 0 {
                let distance = tokens[0].position.distance(anchor);
                assert!(tokens[0].position.x > last_x);
                assert!(distance < last_distance);
                last_x = tokens[0].position.x;
                last_distance = distance;
            }
        }
    }

    #[test]
    fn test_named_forces_replace_and_move() {
        let mut world = PhysicsWorld::new(PhysicsConfig::zero_gravity());
        let first = world.add_named_force("event-loop", Force::magnetic(Vec3::ZERO, 1.0, 1.0));
        let second = world.add_named_force("event-loop", Force::magnetic(Vec3::ONE, 2.0, 1.0));
        assert_eq!(first, second);
        assert_eq!(world.forces().count(), 1);

        assert!(world.set_field_anchor("event-loop", Vec3::new(0.0, 2.0, 0.0)));
        assert!(!world.set_field_anchor("missing", Vec3::ZERO));
        match world.named_force("event-loop") {
            Some(Force::Magnetic { anchor, strength, .. }) => {
                assert_eq!(*anchor, Vec3::new(0.0, 2.0, 0.0));
                assert_eq!(*strength, 2.0);
            }
            other => panic!("unexpected {other:?}"),
        }

        world.add_force(Force::wind(Vec3::new(1.0, 0.0, 0.0), 0.5));
        world.add_force(Force::wind(Vec3::new(0.0, 0.0, 1.0), 0.5));
        assert_eq!(world.remove_forces(ForceKind::Wind), 2);
        assert!(world.remove_force("event-loop"));
        assert_eq!(world.forces().count(), 0);
    }

    fn scenario() -> (PhysicsWorld, Vec<Token>) {
        let mut factory = TokenFactory::new();
        let mut tokens: Vec<Token> = TokenCategory::ALL
            .iter()
            .enumerate()
            .map(|(i, &category)| {
                spawn(
                    &mut factory,
                    category,
                    Vec3::new(i as f32 * 0.7, 4.0 + (i % 2) as f32 * 0.4, 0.0),
                )
            })
            .collect();
        let mut world = PhysicsWorld::default();
        register(&mut world, &mut tokens);
        world.create_magnetic_field(Vec3::new(3.0, 0.0, 0.0), 6.0, 2.0);
        world.add_force(Force::wind(Vec3::new(0.0, 0.0, 1.0), 0.3));
        world
            .create_spring_constraint(tokens[0].id(), tokens[5].id(), 2.0, 4.0)
            .unwrap();
        (world, tokens)
    }

    #[test]
    fn test_identical_runs_are_bit_identical() {
        let (mut world_a, mut tokens_a) = scenario();
        let (mut world_b, mut tokens_b) = scenario();
        let steps = [1.0 / 60.0, 0.016, 0.033, 0.0, 0.02];

        for i in 0..300 {
            let dt = steps[i % steps.len()];
            world_a.tick(&mut tokens_a, dt).unwrap();
            world_b.tick(&mut tokens_b, dt).unwrap();
        }

        for (a, b) in tokens_a.iter().zip(&tokens_b) {
            assert_eq!(a.position.x.to_bits(), b.position.x.to_bits());
            assert_eq!(a.position.y.to_bits(), b.position.y.to_bits());
            assert_eq!(a.position.z.to_bits(), b.position.z.to_bits());
            assert_eq!(a.velocity.y.to_bits(), b.velocity.y.to_bits());
        }
        assert_eq!(world_a.contacts(), world_b.contacts());
    }
}
