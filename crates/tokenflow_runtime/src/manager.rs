//! Token lifecycle manager
//!
//! [`TokenManager`] owns every live token, the per-category pools, the
//! physics world and the particle emitter. Operations start transitions and
//! hand back a [`Completion`]; [`TokenManager::tick`] advances simulated time
//! and resolves whatever finished.
//!
//! The handle is a cheap clone over shared state. No borrow of that state is
//! ever held across an await point, so any number of flows may drive tokens
//! concurrently from the [`Choreographer`](crate::Choreographer).

use crate::completion::{Completion, Resolver, TransitionOutcome};
use crate::config::EngineConfig;
use crate::motion::{Motion, PathSpec, ScaleEnd, ScaleMotion, Settle, Timer};
use crate::pool::TokenPools;
use crate::zone::{station_position, Arrival, Zone, ZoneKind};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::rc::Rc;
use tokenflow_animation::Curve;
use tokenflow_core::{
    profile, Operation, PhysicsOverrides, Token, TokenCategory, TokenFactory, TokenId, TokenSpec,
    TokenState, Vec3,
};
use tokenflow_physics::{Force, Particle, ParticleEmitter, PhysicsError, PhysicsWorld};

/// Live tokens by id, as lent to [`TokenManager::with_physics`]
pub type TokenMap = FxHashMap<TokenId, Token>;

/// Point-in-time copy of a token's observable state
#[derive(Clone, Debug, PartialEq)]
pub struct TokenSnapshot {
    pub id: TokenId,
    pub category: TokenCategory,
    pub incarnation: u32,
    pub state: TokenState,
    pub position: Vec3,
    pub velocity: Vec3,
    pub heading: Vec3,
    pub scale: f32,
    pub path_progress: f32,
}

impl TokenSnapshot {
    fn of(token: &Token) -> Self {
        Self {
            id: token.id(),
            category: token.category(),
            incarnation: token.incarnation(),
            state: token.state(),
            position: token.position,
            velocity: token.velocity,
            heading: token.heading,
            scale: token.scale,
            path_progress: token.path_progress,
        }
    }
}

/// Shared handle to the token lifecycle manager
#[derive(Clone)]
pub struct TokenManager {
    inner: Rc<RefCell<ManagerInner>>,
}

struct ManagerInner {
    config: EngineConfig,
    factory: TokenFactory,
    tokens: TokenMap,
    pools: TokenPools,

    physics: PhysicsWorld,
    physics_enabled: bool,
    /// First physics failure; physics stays off for good once set
    fault: Option<PhysicsError>,
    particles: ParticleEmitter,

    motions: FxHashMap<TokenId, Motion>,
    /// Tokens parked in a queue slot or at the dispatcher, outside physics
    held: FxHashSet<TokenId>,
    scales: FxHashMap<TokenId, ScaleMotion>,
    timers: Vec<Timer>,
    /// In-flight zone operations per token
    active: FxHashMap<TokenId, usize>,

    zones: FxHashMap<ZoneKind, Box<dyn Zone>>,
    /// Zone each token was last routed to
    residency: FxHashMap<TokenId, ZoneKind>,

    clock: f64,
    frames: u64,
}

impl TokenManager {
    pub fn new(config: EngineConfig) -> Self {
        let physics = PhysicsWorld::new(config.physics.clone());
        let particles = match config.particle_seed {
            Some(seed) => ParticleEmitter::with_seed(config.particles.clone(), seed),
            None => ParticleEmitter::new(config.particles.clone()),
        };
        let inner = ManagerInner {
            factory: TokenFactory::new(),
            tokens: TokenMap::default(),
            pools: TokenPools::new(config.pool_size),
            physics,
            physics_enabled: config.physics_enabled,
            fault: None,
            particles,
            motions: FxHashMap::default(),
            held: FxHashSet::default(),
            scales: FxHashMap::default(),
            timers: Vec::new(),
            active: FxHashMap::default(),
            zones: FxHashMap::default(),
            residency: FxHashMap::default(),
            clock: 0.0,
            frames: 0,
            config,
        };
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.inner.borrow().config.clone()
    }

    // =========================================================================
    // Zones
    // =========================================================================

    /// Register the collaborator for `kind`, replacing any previous one
    pub fn register_zone(&self, kind: ZoneKind, zone: impl Zone + 'static) {
        let mut inner = self.inner.borrow_mut();
        // attracting zones get their field back on the next tick
        inner.physics.remove_force(kind.name());
        inner.zones.insert(kind, Box::new(zone));
        tracing::debug!("TokenManager: registered {kind} zone");
    }

    pub fn has_zone(&self, kind: ZoneKind) -> bool {
        self.inner.borrow().zones.contains_key(&kind)
    }

    /// Run `f` against the registered zone for `kind`
    pub fn with_zone_mut<R>(&self, kind: ZoneKind, f: impl FnOnce(&mut dyn Zone) -> R) -> Option<R> {
        let mut inner = self.inner.borrow_mut();
        let zone = inner.zones.get_mut(&kind)?;
        Some(f(&mut **zone))
    }

    /// Zone the token was last routed to
    pub fn zone_of(&self, id: TokenId) -> Option<ZoneKind> {
        self.inner.borrow().residency.get(&id).copied()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Spawn a token at `spawn`, reusing a pooled one when possible
    pub fn create_token(&self, spec: TokenSpec, spawn: Vec3) -> TokenId {
        self.create_token_with(spec, spawn, &PhysicsOverrides::default())
    }

    /// Spawn a token with per-token physics overrides
    pub fn create_token_with(
        &self,
        spec: TokenSpec,
        spawn: Vec3,
        overrides: &PhysicsOverrides,
    ) -> TokenId {
        self.inner.borrow_mut().create_token(spec, spawn, overrides)
    }

    /// Eased move to `target`; the token is Moving until it arrives
    pub fn move_to(&self, id: TokenId, target: Vec3, duration: f32) -> Completion {
        self.inner.borrow_mut().move_to(id, target, duration)
    }

    /// Follow a curve, steered by physics when the token participates
    pub fn move_along_path(&self, id: TokenId, path: PathSpec) -> Completion {
        let mut inner = self.inner.borrow_mut();
        inner.begin_motion(id, Some(Operation::MoveAlongPath), |token, resolver| {
            token.path_progress = 0.0;
            Motion::follow(path, resolver)
        })
    }

    /// Arched curve from `from` to `to`, for use with [`move_along_path`](Self::move_along_path)
    pub fn create_smart_path(&self, from: Vec3, to: Vec3) -> Curve {
        Curve::smart_path(from, to)
    }

    /// Queue the token in slot `index` above `base`
    pub fn add_to_queue(&self, id: TokenId, base: Vec3, index: usize) -> Completion {
        self.inner.borrow_mut().add_to_queue(id, base, index)
    }

    /// Mark a Processing token as being worked on. Returns false when the
    /// token is in any other state.
    pub fn start_processing(&self, id: TokenId) -> bool {
        self.inner
            .borrow_mut()
            .transition(id, Operation::StartProcessing)
            .is_some()
    }

    /// Finish processing with a scale pulse
    pub fn complete(&self, id: TokenId) -> Completion {
        self.inner.borrow_mut().complete(id)
    }

    /// Destroy the token now and shrink it out. The token returns to its
    /// pool once the shrink ends. A second call is a no-op.
    pub fn destroy_token(&self, id: TokenId) -> Completion {
        self.inner.borrow_mut().destroy_token(id)
    }

    /// Resolve after `seconds` of simulated time
    pub fn delay(&self, seconds: f32) -> Completion {
        self.inner.borrow_mut().delay(seconds)
    }

    /// Route the token to a zone and wait for it to arrive
    pub async fn move_to_zone(&self, id: TokenId, kind: ZoneKind) -> TransitionOutcome {
        let _active = self.activity(id);

        let start = self.inner.borrow_mut().begin_zone_move(id, kind);
        let (completion, arrival) = match start {
            Ok(started) => started,
            Err(outcome) => return outcome,
        };

        let outcome = completion.await;
        if outcome.is_finished() {
            self.inner.borrow_mut().settle_in_zone(&arrival);
        }
        outcome
    }

    /// Take a queued token through the dispatcher: Processing, travel,
    /// settle, then complete
    pub async fn process_with_event_loop(&self, id: TokenId) -> TransitionOutcome {
        let _active = self.activity(id);

        let start = self.inner.borrow_mut().begin_dispatch(id);
        let (completion, arrival) = match start {
            Ok(started) => started,
            Err(outcome) => return outcome,
        };

        let outcome = completion.await;
        if !outcome.is_finished() {
            return outcome;
        }

        let settle = {
            let mut inner = self.inner.borrow_mut();
            if let Some(arrival) = &arrival {
                inner.settle_in_zone(arrival);
            }
            inner.transition(id, Operation::StartProcessing);
            let wait = inner.config.timings.settle_delay;
            inner.delay(wait)
        };
        let outcome = settle.await;
        if !outcome.is_finished() {
            return outcome;
        }

        self.complete(id).await
    }

    // =========================================================================
    // Frame
    // =========================================================================

    /// Advance simulated time by `dt` seconds
    pub fn tick(&self, dt: f32) {
        self.inner.borrow_mut().tick(dt);
    }

    // =========================================================================
    // Physics access
    // =========================================================================

    /// Lend the physics world and the token store to `f`.
    ///
    /// `f` must not call back into this manager.
    pub fn with_physics<R>(&self, f: impl FnOnce(&mut PhysicsWorld, &mut TokenMap) -> R) -> R {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        f(&mut inner.physics, &mut inner.tokens)
    }

    /// Turn physics participation on or off. Returns false when physics was
    /// disabled by a fault, which is permanent.
    pub fn set_physics_enabled(&self, enabled: bool) -> bool {
        self.inner.borrow_mut().set_physics_enabled(enabled)
    }

    pub fn physics_enabled(&self) -> bool {
        self.inner.borrow().physics_enabled
    }

    pub fn physics_fault(&self) -> Option<PhysicsError> {
        self.inner.borrow().fault.clone()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn contains(&self, id: TokenId) -> bool {
        self.inner.borrow().tokens.contains_key(&id)
    }

    pub fn state(&self, id: TokenId) -> Option<TokenState> {
        self.with_token(id, Token::state)
    }

    pub fn position(&self, id: TokenId) -> Option<Vec3> {
        self.with_token(id, |t| t.position)
    }

    pub fn incarnation(&self, id: TokenId) -> Option<u32> {
        self.with_token(id, Token::incarnation)
    }

    pub fn snapshot(&self, id: TokenId) -> Option<TokenSnapshot> {
        self.with_token(id, TokenSnapshot::of)
    }

    pub fn with_token<R>(&self, id: TokenId, f: impl FnOnce(&Token) -> R) -> Option<R> {
        self.inner.borrow().tokens.get(&id).map(f)
    }

    pub fn with_token_mut<R>(&self, id: TokenId, f: impl FnOnce(&mut Token) -> R) -> Option<R> {
        self.inner.borrow_mut().tokens.get_mut(&id).map(f)
    }

    /// Live token ids in ascending order
    pub fn token_ids(&self) -> Vec<TokenId> {
        self.inner.borrow().sorted_ids()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the token has a motion, a scale animation or a zone
    /// operation in flight
    pub fn is_animating(&self, id: TokenId) -> bool {
        let inner = self.inner.borrow();
        inner.active.contains_key(&id)
            || inner.motions.contains_key(&id)
            || inner.scales.contains_key(&id)
    }

    pub fn pool_len(&self, category: TokenCategory) -> usize {
        self.inner.borrow().pools.len(category)
    }

    pub fn particle_count(&self) -> usize {
        self.inner.borrow().particles.alive_count()
    }

    pub fn with_particles<R>(&self, f: impl FnOnce(&mut dyn Iterator<Item = &Particle>) -> R) -> R {
        let inner = self.inner.borrow();
        let mut particles = inner.particles.particles();
        f(&mut particles)
    }

    /// Simulated seconds since creation
    pub fn clock(&self) -> f64 {
        self.inner.borrow().clock
    }

    pub fn frames(&self) -> u64 {
        self.inner.borrow().frames
    }

    /// Drop every token, pooled token, timer and motion. Pending
    /// completions resolve as superseded.
    pub fn dispose(&self) {
        self.inner.borrow_mut().dispose();
    }

    fn activity(&self, id: TokenId) -> ActiveGuard {
        *self.inner.borrow_mut().active.entry(id).or_insert(0) += 1;
        ActiveGuard {
            inner: self.inner.clone(),
            id,
        }
    }

    #[cfg(test)]
    fn with_pools<R>(&self, f: impl FnOnce(&mut TokenPools) -> R) -> R {
        f(&mut self.inner.borrow_mut().pools)
    }
}

/// Holds one count in the active-animation map for the life of a zone
/// operation
struct ActiveGuard {
    inner: Rc<RefCell<ManagerInner>>,
    id: TokenId,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let Ok(mut inner) = self.inner.try_borrow_mut() else {
            return;
        };
        let finished = match inner.active.get_mut(&self.id) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count == 0
            }
            None => false,
        };
        if finished {
            inner.active.remove(&self.id);
        }
    }
}

impl ManagerInner {
    fn sorted_ids(&self) -> Vec<TokenId> {
        let mut ids: Vec<TokenId> = self.tokens.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Apply `op` if legal, returning the new state
    fn transition(&mut self, id: TokenId, op: Operation) -> Option<TokenState> {
        let Some(token) = self.tokens.get_mut(&id) else {
            tracing::debug!("TokenManager: {op:?} on unknown {id}");
            return None;
        };
        match token.state().apply(op) {
            Some(next) => {
                token.set_state(next);
                Some(next)
            }
            None => {
                tracing::debug!("TokenManager: ignoring {op:?} on {id} in state {}", token.state());
                None
            }
        }
    }

    /// Install a new positional motion, superseding the current one
    fn begin_motion(
        &mut self,
        id: TokenId,
        op: Option<Operation>,
        build: impl FnOnce(&mut Token, Resolver) -> Motion,
    ) -> Completion {
        if let Some(op) = op {
            if self.transition(id, op).is_none() {
                return Completion::ignored();
            }
        }
        let Some(token) = self.tokens.get_mut(&id) else {
            return Completion::ignored();
        };
        if token.state() == TokenState::Destroyed {
            return Completion::ignored();
        }

        let (resolver, completion) = Completion::channel();
        let motion = build(token, resolver);
        if self.motions.insert(id, motion).is_some() {
            tracing::debug!("TokenManager: {id} motion superseded");
        }
        completion
    }

    fn create_token(&mut self, spec: TokenSpec, spawn: Vec3, overrides: &PhysicsOverrides) -> TokenId {
        let category = spec.category;
        let mut token = match self.pools.take(category) {
            Some(mut token) => {
                token.reincarnate(spec);
                token
            }
            None => self.factory.create(spec),
        };

        token.position = spawn;
        token.target_position = spawn;
        token.scale = 0.0;
        if self.physics_enabled {
            self.physics.add_token(&mut token, overrides);
        } else if !overrides.is_empty() {
            token.set_physics_properties(overrides);
        }

        let id = token.id();
        tracing::debug!(
            "TokenManager: spawned {id} ({category}, incarnation {})",
            token.incarnation()
        );
        self.tokens.insert(id, token);
        self.scales
            .insert(id, ScaleMotion::grow(self.config.timings.spawn));
        id
    }

    fn move_to(&mut self, id: TokenId, target: Vec3, duration: f32) -> Completion {
        self.begin_motion(id, Some(Operation::MoveTo), |token, resolver| {
            Motion::tween(token.position, target, duration, Settle::Arrive, resolver)
        })
    }

    fn add_to_queue(&mut self, id: TokenId, base: Vec3, index: usize) -> Completion {
        let target = base + Vec3::UP * (index as f32 * self.config.slot_height);
        let duration = self.config.timings.queue;
        self.begin_motion(id, Some(Operation::AddToQueue), |token, resolver| {
            Motion::tween(token.position, target, duration, Settle::Hold, resolver)
        })
    }

    fn complete(&mut self, id: TokenId) -> Completion {
        if self.transition(id, Operation::Complete).is_none() {
            return Completion::ignored();
        }
        let (resolver, completion) = Completion::channel();
        let pulse = ScaleMotion::pulse(self.config.timings.pulse, resolver);
        self.scales.insert(id, pulse);
        completion
    }

    fn destroy_token(&mut self, id: TokenId) -> Completion {
        let Some(token) = self.tokens.get_mut(&id) else {
            tracing::debug!("TokenManager: destroy on unknown {id}");
            return Completion::ignored();
        };
        let Some(next) = token.state().apply(Operation::Destroy) else {
            tracing::debug!("TokenManager: {id} already destroyed");
            return Completion::ignored();
        };
        token.set_state(next);
        token.velocity = Vec3::ZERO;
        let scale = token.scale;

        self.physics.remove_token(id);
        self.motions.remove(&id);
        self.held.remove(&id);
        self.release_zone(id);

        let (resolver, completion) = Completion::channel();
        let shrink = ScaleMotion::shrink(scale, self.config.timings.despawn, resolver);
        self.scales.insert(id, shrink);
        tracing::debug!("TokenManager: destroyed {id}");
        completion
    }

    fn delay(&mut self, seconds: f32) -> Completion {
        if !(seconds > 0.0) {
            return Completion::resolved(TransitionOutcome::Finished);
        }
        let (resolver, completion) = Completion::channel();
        self.timers.push(Timer {
            due: self.clock + f64::from(seconds),
            resolver,
        });
        completion
    }

    // -------------------------------------------------------------------------
    // Zones
    // -------------------------------------------------------------------------

    fn begin_zone_move(
        &mut self,
        id: TokenId,
        kind: ZoneKind,
    ) -> Result<(Completion, Arrival), TransitionOutcome> {
        let Some(token) = self.tokens.get(&id) else {
            tracing::debug!("TokenManager: zone move for unknown {id}");
            return Err(TransitionOutcome::Ignored);
        };
        let op = if kind.is_queue() {
            Operation::AddToQueue
        } else {
            Operation::MoveTo
        };
        if !token.state().accepts(op) {
            tracing::debug!("TokenManager: {id} cannot move to {kind} while {}", token.state());
            return Err(TransitionOutcome::Ignored);
        }
        let descriptor = token.descriptor();
        let from = token.position;

        let Some(zone) = self.zones.get_mut(&kind) else {
            tracing::warn!("TokenManager: no {kind} zone registered, {id} stays put");
            return Err(TransitionOutcome::Ignored);
        };
        let (anchor, slot) = match kind {
            ZoneKind::ExternalService => (station_position(&**zone, descriptor.category), 0),
            k if k.is_queue() => (zone.arrival_position(&descriptor), zone.queue_index(&descriptor)),
            _ => (zone.arrival_position(&descriptor), 0),
        };

        let previous = self.residency.insert(id, kind);
        let leaving = match previous {
            Some(prev) if prev != kind => {
                if let Some(zone) = self.zones.get_mut(&prev) {
                    zone.release(id);
                }
                true
            }
            _ => false,
        };

        let duration = match kind {
            ZoneKind::ExternalService => self.config.timings.service,
            ZoneKind::EventLoop => self.config.timings.dispatch,
            _ => self.config.timings.stack,
        };
        let (completion, position) = if kind.is_queue() {
            let position = anchor + Vec3::UP * (slot as f32 * self.config.slot_height);
            (self.add_to_queue(id, anchor, slot), position)
        } else {
            let completion = if self.physics_enabled && leaving {
                let curve = Curve::smart_path(from, anchor);
                self.begin_motion(id, Some(Operation::MoveTo), |_, resolver| {
                    Motion::glide(curve, duration, Settle::Arrive, resolver)
                })
            } else {
                self.move_to(id, anchor, duration)
            };
            (completion, anchor)
        };

        let arrival = Arrival {
            token: descriptor,
            zone: kind,
            position,
            slot,
        };
        Ok((completion, arrival))
    }

    fn begin_dispatch(
        &mut self,
        id: TokenId,
    ) -> Result<(Completion, Option<Arrival>), TransitionOutcome> {
        if self.transition(id, Operation::Process).is_none() {
            return Err(TransitionOutcome::Ignored);
        }
        let Some(token) = self.tokens.get(&id) else {
            return Err(TransitionOutcome::Ignored);
        };
        let descriptor = token.descriptor();

        let has_loop = self.zones.contains_key(&ZoneKind::EventLoop);
        let target = match self.zones.get(&ZoneKind::EventLoop) {
            Some(zone) => zone.arrival_position(&descriptor),
            None => self.config.dispatcher_position,
        };

        self.release_zone(id);
        if has_loop {
            self.residency.insert(id, ZoneKind::EventLoop);
        }

        let duration = self.config.timings.dispatch;
        let completion = self.begin_motion(id, None, |token, resolver| {
            Motion::tween(token.position, target, duration, Settle::Hold, resolver)
        });
        let arrival = has_loop.then(|| Arrival {
            token: descriptor,
            zone: ZoneKind::EventLoop,
            position: target,
            slot: 0,
        });
        Ok((completion, arrival))
    }

    /// Tell the zone the token arrived, unless it has since moved on
    fn settle_in_zone(&mut self, arrival: &Arrival) {
        let id = arrival.token.id;
        let live = self
            .tokens
            .get(&id)
            .is_some_and(|t| t.state() != TokenState::Destroyed);
        if !live || self.residency.get(&id) != Some(&arrival.zone) {
            return;
        }
        if let Some(zone) = self.zones.get_mut(&arrival.zone) {
            zone.accept(arrival);
        }
    }

    fn release_zone(&mut self, id: TokenId) {
        if let Some(kind) = self.residency.remove(&id) {
            if let Some(zone) = self.zones.get_mut(&kind) {
                zone.release(id);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Frame
    // -------------------------------------------------------------------------

    fn tick(&mut self, dt: f32) {
        if !dt.is_finite() || dt < 0.0 {
            tracing::warn!("TokenManager: ignoring tick with dt = {dt}");
            return;
        }
        self.clock += f64::from(dt);
        self.frames += 1;

        if self.physics_enabled {
            self.sync_zone_fields();
            self.steer_paths(dt);
            if let Err(err) = self.physics.tick(&mut self.tokens, dt) {
                self.degrade(err);
            }
        }

        self.advance_motions(dt);
        self.advance_scales(dt);
        self.fire_timers();

        // A zero-length frame only re-renders
        if dt == 0.0 {
            return;
        }
        self.emit_particles();
        self.particles.update(dt);

        for token in self.tokens.values_mut() {
            token.record_trail();
        }
    }

    /// Keep each attracting zone's field anchored on the zone
    fn sync_zone_fields(&mut self) {
        for kind in ZoneKind::ALL {
            let Some(zone) = self.zones.get(&kind) else {
                continue;
            };
            let Some((strength, falloff)) = zone.attraction() else {
                continue;
            };
            let anchor = zone.position();
            if !self.physics.set_field_anchor(kind.name(), anchor) {
                self.physics
                    .add_named_force(kind.name(), Force::magnetic(anchor, strength, falloff));
            }
        }
    }

    fn steer_paths(&mut self, dt: f32) {
        let mut ids: Vec<TokenId> = self
            .motions
            .iter()
            .filter(|(_, motion)| motion.is_path())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();

        for id in ids {
            if !self.physics.contains(id) {
                continue;
            }
            let (Some(token), Some(motion)) = (self.tokens.get_mut(&id), self.motions.get_mut(&id))
            else {
                continue;
            };
            motion.steer(token, dt, &self.config.steering);
        }
    }

    /// Physics failed: turn it off for the rest of the session
    fn degrade(&mut self, err: PhysicsError) {
        tracing::error!("TokenManager: physics fault, continuing with tweens only: {err}");
        self.physics_enabled = false;
        self.physics.clear();
        for token in self.tokens.values_mut() {
            token.velocity = Vec3::ZERO;
        }
        self.fault = Some(err);
    }

    fn advance_motions(&mut self, dt: f32) {
        let mut ids: Vec<TokenId> = self.motions.keys().copied().collect();
        ids.sort_unstable();

        for id in ids {
            let Some(token) = self.tokens.get_mut(&id) else {
                self.motions.remove(&id);
                continue;
            };
            let Some(motion) = self.motions.get_mut(&id) else {
                continue;
            };
            if motion.advance(token, dt) {
                if let Some(motion) = self.motions.remove(&id) {
                    if motion.holds() {
                        self.physics.remove_token(id);
                        self.held.insert(id);
                    }
                    motion.finish(token);
                }
            }
        }
    }

    fn advance_scales(&mut self, dt: f32) {
        let mut ids: Vec<TokenId> = self.scales.keys().copied().collect();
        ids.sort_unstable();

        let mut retired = Vec::new();
        for id in ids {
            let Some(token) = self.tokens.get_mut(&id) else {
                self.scales.remove(&id);
                continue;
            };
            let Some(scale) = self.scales.get_mut(&id) else {
                continue;
            };
            if !scale.advance(token, dt) {
                continue;
            }
            if let Some(scale) = self.scales.remove(&id) {
                if scale.end == ScaleEnd::Retire {
                    retired.push(id);
                }
                scale.finish();
            }
        }

        for id in retired {
            self.retire(id);
        }
    }

    /// Reset a destroyed token and hand it back to its pool
    fn retire(&mut self, id: TokenId) {
        let Some(mut token) = self.tokens.remove(&id) else {
            return;
        };
        self.physics.remove_token(id);
        self.motions.remove(&id);
        self.held.remove(&id);
        self.release_zone(id);

        let Some(next) = token.state().apply(Operation::Recycle) else {
            tracing::warn!("TokenManager: {id} retired while {}, dropping it", token.state());
            return;
        };
        token.reset(profile(token.category()));
        token.set_state(next);
        if !self.pools.give(token) {
            tracing::debug!("TokenManager: {id} disposed");
        }
    }

    fn fire_timers(&mut self) {
        let clock = self.clock;
        let (due, pending): (Vec<Timer>, Vec<Timer>) = std::mem::take(&mut self.timers)
            .into_iter()
            .partition(|timer| timer.due <= clock + 1e-9);
        self.timers = pending;
        for timer in due {
            timer.resolver.finish();
        }
    }

    /// Fast path followers shed a few sparks
    fn emit_particles(&mut self) {
        let mut ids: Vec<TokenId> = self
            .motions
            .iter()
            .filter(|(_, motion)| motion.is_path())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();

        let steering = &self.config.steering;
        for id in ids {
            let Some(token) = self.tokens.get(&id) else {
                continue;
            };
            if token.speed() > steering.particle_speed && self.particles.chance(steering.particle_chance) {
                self.particles
                    .emit(token.position, token.velocity * 0.1, steering.particle_burst);
            }
        }
    }

    fn set_physics_enabled(&mut self, enabled: bool) -> bool {
        if enabled == self.physics_enabled {
            return true;
        }
        if enabled {
            if let Some(fault) = &self.fault {
                tracing::warn!("TokenManager: physics stays off after fault: {fault}");
                return false;
            }
            for id in self.sorted_ids() {
                if self.held.contains(&id) {
                    continue;
                }
                if let Some(token) = self.tokens.get_mut(&id) {
                    if token.state() != TokenState::Destroyed {
                        self.physics.add_token(token, &PhysicsOverrides::default());
                    }
                }
            }
        } else {
            let members: Vec<TokenId> = self.physics.token_ids().collect();
            for id in members {
                self.physics.remove_token(id);
            }
        }
        self.physics_enabled = enabled;
        tracing::debug!("TokenManager: physics {}", if enabled { "on" } else { "off" });
        true
    }

    fn dispose(&mut self) {
        let residents: Vec<(TokenId, ZoneKind)> =
            self.residency.drain().collect();
        for (id, kind) in residents {
            if let Some(zone) = self.zones.get_mut(&kind) {
                zone.release(id);
            }
        }
        self.motions.clear();
        self.held.clear();
        self.scales.clear();
        self.timers.clear();
        self.active.clear();
        self.tokens.clear();
        self.pools.clear();
        self.particles.clear();

        let members: Vec<TokenId> = self.physics.token_ids().collect();
        for id in members {
            self.physics.remove_token(id);
        }
        tracing::debug!("TokenManager: disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Choreographer;
    use crate::zone::QueueZone;

    fn manager() -> TokenManager {
        TokenManager::new(EngineConfig::default().with_seed(1))
    }

    fn run(manager: &TokenManager, seconds: f32) {
        let frames = (seconds / 0.016).ceil() as usize;
        for _ in 0..frames {
            manager.tick(0.016);
        }
    }

    #[test]
    fn test_create_grows_in() {
        let manager = manager();
        let spawn = Vec3::new(0.0, 5.0, 0.0);
        let id = manager.create_token(TokenSpec::new(TokenCategory::Timer, "t"), spawn);

        let snapshot = manager.snapshot(id).unwrap();
        assert_eq!(snapshot.state, TokenState::Idle);
        assert_eq!(snapshot.scale, 0.0);
        assert_eq!(snapshot.position, spawn);
        assert!(manager.is_animating(id));

        run(&manager, 0.6);
        assert!((manager.snapshot(id).unwrap().scale - 1.0).abs() < 1e-5);
        assert!(!manager.is_animating(id));
    }

    #[test]
    fn test_move_to_resolves_and_idles() {
        let manager = manager();
        let id = manager.create_token(TokenSpec::new(TokenCategory::Immediate, "log"), Vec3::ZERO);
        let target = Vec3::new(2.0, 1.0, 0.0);
        let mut done = manager.move_to(id, target, 0.5);
        assert_eq!(manager.state(id), Some(TokenState::Moving));

        run(&manager, 0.6);
        assert_eq!(done.try_outcome(), Some(TransitionOutcome::Finished));
        assert_eq!(manager.state(id), Some(TokenState::Idle));
        assert!(manager.position(id).unwrap().distance(target) < 1e-4);
    }

    #[test]
    fn test_queue_slot_height() {
        let manager = manager();
        let id = manager.create_token(TokenSpec::new(TokenCategory::Deferred, "p"), Vec3::ZERO);
        let mut queued = manager.add_to_queue(id, Vec3::new(1.0, 0.0, -1.0), 2);
        run(&manager, 0.6);

        assert_eq!(queued.try_outcome(), Some(TransitionOutcome::Finished));
        assert_eq!(manager.state(id), Some(TokenState::Queued));
        let position = manager.position(id).unwrap();
        assert!((position.y - 0.6).abs() < 1e-4);
        assert!((position.x - 1.0).abs() < 1e-4);
        assert!((position.z + 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_path_following_steered_and_kinematic() {
        let manager = manager();
        let end = Vec3::new(6.0, 0.0, 0.0);
        let steered = manager.create_token(TokenSpec::new(TokenCategory::Network, "fetch"), Vec3::ZERO);
        let curve = manager.create_smart_path(Vec3::ZERO, end);
        let mut followed = manager.move_along_path(steered, PathSpec::new(curve, 1.0).oriented());
        assert_eq!(manager.state(steered), Some(TokenState::Moving));

        run(&manager, 1.1);
        assert_eq!(followed.try_outcome(), Some(TransitionOutcome::Finished));
        let snapshot = manager.snapshot(steered).unwrap();
        assert_eq!(snapshot.state, TokenState::Idle);
        assert_eq!(snapshot.path_progress, 1.0);
        assert!(snapshot.position.distance(end) < 2.0);
        assert!(manager.particle_count() > 0);

        assert!(manager.set_physics_enabled(false));
        let placed = manager.create_token(TokenSpec::new(TokenCategory::Io, "read"), Vec3::ZERO);
        let curve = manager.create_smart_path(Vec3::ZERO, end);
        let mut followed = manager.move_along_path(placed, PathSpec::new(curve, 2.0));
        run(&manager, 0.6);
        assert_eq!(followed.try_outcome(), Some(TransitionOutcome::Finished));
        assert!(manager.position(placed).unwrap().distance(end) < 1e-4);
    }

    #[test]
    fn test_zero_dt_tick_changes_nothing() {
        let manager = manager();
        let id = manager.create_token(TokenSpec::new(TokenCategory::Network, "fetch"), Vec3::ZERO);
        let curve = manager.create_smart_path(Vec3::ZERO, Vec3::new(6.0, 0.0, 0.0));
        let _followed = manager.move_along_path(id, PathSpec::new(curve, 0.5));
        for _ in 0..30 {
            manager.tick(0.016);
        }

        let particles = manager.particle_count();
        let trail = manager.with_token(id, |t| t.trail_len()).unwrap();
        let position = manager.position(id).unwrap();
        for _ in 0..200 {
            manager.tick(0.0);
        }
        assert_eq!(manager.particle_count(), particles);
        assert_eq!(manager.with_token(id, |t| t.trail_len()).unwrap(), trail);
        assert_eq!(manager.position(id).unwrap(), position);
        assert_eq!(manager.state(id), Some(TokenState::Moving));
    }

    #[test]
    fn test_queued_tokens_hold_their_slots() {
        let manager = manager();
        let base = Vec3::new(0.0, 0.0, 10.0);
        manager.register_zone(ZoneKind::MicrotaskQueue, QueueZone::new(base));
        let flows = Choreographer::new();

        let ids: Vec<TokenId> = (0..3)
            .map(|i| {
                let spawn = Vec3::new(i as f32 * 2.0 - 2.0, 0.0, 0.0);
                let id = manager.create_token(TokenSpec::new(TokenCategory::Deferred, "then"), spawn);
                let m = manager.clone();
                flows.spawn(async move {
                    m.move_to_zone(id, ZoneKind::MicrotaskQueue).await;
                });
                id
            })
            .collect();
        flows.run_until_stalled();

        for _ in 0..160 {
            manager.tick(0.016);
            flows.run_until_stalled();
        }
        for (slot, id) in ids.iter().enumerate() {
            let position = manager.position(*id).unwrap();
            assert_eq!(manager.state(*id), Some(TokenState::Queued));
            assert!((position.y - slot as f32 * 0.3).abs() < 1e-4, "{id} at {position:?}");
            assert!(position.distance(base + Vec3::UP * (slot as f32 * 0.3)) < 1e-4);
        }
    }

    #[test]
    fn test_enqueue_after_dequeue_takes_free_slot() {
        let manager = manager();
        let base = Vec3::new(0.0, 0.0, 10.0);
        manager.register_zone(ZoneKind::MicrotaskQueue, QueueZone::new(base));
        let flows = Choreographer::new();
        let enqueue = |label: &str, x: f32| {
            let spawn = Vec3::new(x, 0.0, 0.0);
            let id = manager.create_token(TokenSpec::new(TokenCategory::Deferred, label), spawn);
            let m = manager.clone();
            flows.spawn(async move {
                m.move_to_zone(id, ZoneKind::MicrotaskQueue).await;
            });
            id
        };
        let settle = |seconds: f32| {
            for _ in 0..(seconds / 0.016).ceil() as usize {
                manager.tick(0.016);
                flows.run_until_stalled();
            }
        };

        let a = enqueue("a", -2.0);
        let b = enqueue("b", 0.0);
        flows.run_until_stalled();
        settle(0.6);

        let m = manager.clone();
        flows.spawn(async move {
            m.process_with_event_loop(a).await;
        });
        flows.run_until_stalled();
        assert_eq!(manager.state(a), Some(TokenState::Processing));

        let c = enqueue("c", 2.0);
        flows.run_until_stalled();
        settle(0.6);

        assert_eq!(manager.state(c), Some(TokenState::Queued));
        assert!(manager.position(c).unwrap().distance(base) < 1e-4);
        assert!(manager.position(b).unwrap().distance(base + Vec3::UP * 0.3) < 1e-4);
    }

    #[test]
    fn test_delay_uses_simulated_time() {
        let manager = manager();
        let mut wait = manager.delay(0.1);
        manager.tick(0.05);
        assert_eq!(wait.try_outcome(), None);
        manager.tick(0.06);
        assert_eq!(wait.try_outcome(), Some(TransitionOutcome::Finished));

        let mut instant = manager.delay(0.0);
        assert_eq!(instant.try_outcome(), Some(TransitionOutcome::Finished));
    }

    #[test]
    fn test_destroy_recycles_into_pool() {
        let manager = manager();
        let id = manager.create_token(TokenSpec::new(TokenCategory::Io, "read"), Vec3::ZERO);
        let mut gone = manager.destroy_token(id);
        assert_eq!(manager.state(id), Some(TokenState::Destroyed));

        run(&manager, 0.6);
        assert_eq!(gone.try_outcome(), Some(TransitionOutcome::Finished));
        assert!(!manager.contains(id));
        assert_eq!(manager.pool_len(TokenCategory::Io), 1);

        let again = manager.create_token(TokenSpec::new(TokenCategory::Io, "write"), Vec3::ONE);
        assert_eq!(again, id);
        assert_eq!(manager.incarnation(again), Some(1));
        assert_eq!(manager.pool_len(TokenCategory::Io), 0);
        assert_eq!(manager.with_token(again, |t| t.content.clone()).unwrap(), "write");
    }

    #[test]
    fn test_stale_pooled_token_is_replaced() {
        let manager = manager();
        let id = manager.create_token(TokenSpec::new(TokenCategory::Network, "a"), Vec3::ZERO);
        let _ = manager.destroy_token(id);
        run(&manager, 0.6);
        assert_eq!(manager.pool_len(TokenCategory::Network), 1);

        manager.with_pools(|pools| {
            if let Some(token) = pools.peek_mut(TokenCategory::Network) {
                token.velocity = Vec3::new(f32::NAN, 0.0, 0.0);
            }
        });

        let fresh = manager.create_token(TokenSpec::new(TokenCategory::Network, "b"), Vec3::ZERO);
        assert_ne!(fresh, id);
        assert_eq!(manager.incarnation(fresh), Some(0));
        assert_eq!(manager.pool_len(TokenCategory::Network), 0);
        assert_eq!(manager.state(fresh), Some(TokenState::Idle));
    }

    #[test]
    fn test_missing_zone_is_ignored() {
        let manager = manager();
        let id = manager.create_token(TokenSpec::new(TokenCategory::Timer, "t"), Vec3::ZERO);
        let outcome = futures::executor::block_on(manager.move_to_zone(id, ZoneKind::CallStack));
        assert_eq!(outcome, TransitionOutcome::Ignored);
        assert_eq!(manager.state(id), Some(TokenState::Idle));
        assert_eq!(manager.zone_of(id), None);
    }

    #[test]
    fn test_illegal_queue_move_reserves_no_slot() {
        let manager = manager();
        manager.register_zone(ZoneKind::MicrotaskQueue, QueueZone::new(Vec3::ZERO));
        let id = manager.create_token(TokenSpec::new(TokenCategory::Deferred, "p"), Vec3::ZERO);
        let _ = manager.destroy_token(id);

        let outcome =
            futures::executor::block_on(manager.move_to_zone(id, ZoneKind::MicrotaskQueue));
        assert_eq!(outcome, TransitionOutcome::Ignored);
        assert_eq!(manager.zone_of(id), None);
    }

    #[test]
    fn test_zone_attraction_field_follows_zone() {
        let manager = manager();
        manager.register_zone(
            ZoneKind::MacrotaskQueue,
            QueueZone::new(Vec3::new(6.0, -1.0, 0.0)).with_attraction(3.0, 2.0),
        );
        manager.tick(0.016);
        let anchor = manager.with_physics(|world, _| match world.named_force("macrotask-queue") {
            Some(Force::Magnetic { anchor, .. }) => Some(*anchor),
            _ => None,
        });
        assert_eq!(anchor, Some(Vec3::new(6.0, -1.0, 0.0)));
    }

    #[test]
    fn test_dispose_supersedes_pending_work() {
        let manager = manager();
        let id = manager.create_token(TokenSpec::new(TokenCategory::Timer, "t"), Vec3::ZERO);
        let mut moving = manager.move_to(id, Vec3::ONE, 1.0);
        let mut waiting = manager.delay(5.0);

        manager.dispose();
        assert_eq!(moving.try_outcome(), Some(TransitionOutcome::Superseded));
        assert_eq!(waiting.try_outcome(), Some(TransitionOutcome::Superseded));
        assert!(manager.is_empty());
    }
}
