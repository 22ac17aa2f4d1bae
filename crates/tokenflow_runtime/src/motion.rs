//! Per-token motions driven by the manager's tick
//!
//! A token owns at most one positional motion and one scale animation.
//! Starting another replaces the old one, whose resolver then reports
//! `Superseded`.

use crate::completion::Resolver;
use crate::config::Steering;
use tokenflow_animation::{Curve, Easing, Tween};
use tokenflow_core::{Operation, Token, Vec3};

/// Instructions for following a curve
#[derive(Clone, Debug)]
pub struct PathSpec {
    pub curve: Curve,
    /// Path progress per second; 0.5 takes two seconds end to end
    pub speed: f32,
    /// Turn the token to face where it is going
    pub orient_to_velocity: bool,
}

impl PathSpec {
    pub fn new(curve: Curve, speed: f32) -> Self {
        Self {
            curve,
            speed,
            orient_to_velocity: false,
        }
    }

    pub fn oriented(mut self) -> Self {
        self.orient_to_velocity = true;
        self
    }
}

/// What happens to lifecycle state when a motion ends
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Settle {
    /// Moving becomes Idle
    Arrive,
    /// State is left alone (queued and dispatched tokens)
    Hold,
}

#[derive(Debug)]
enum Track {
    /// Eased point-to-point move
    Tween(Tween<Vec3>),
    /// Eased traversal of a curve over a fixed duration
    Glide { curve: Curve, progress: Tween<f32> },
    /// Constant-rate path following; steered by physics when available
    Follow {
        curve: Curve,
        speed: f32,
        orient: bool,
        steered: bool,
    },
}

#[derive(Debug)]
pub(crate) struct Motion {
    track: Track,
    settle: Settle,
    resolver: Resolver,
}

impl Motion {
    pub(crate) fn tween(from: Vec3, to: Vec3, duration: f32, settle: Settle, resolver: Resolver) -> Self {
        Self {
            track: Track::Tween(Tween::new(from, to, duration, Easing::EaseInOutCubic)),
            settle,
            resolver,
        }
    }

    pub(crate) fn glide(curve: Curve, duration: f32, settle: Settle, resolver: Resolver) -> Self {
        Self {
            track: Track::Glide {
                curve,
                progress: Tween::new(0.0, 1.0, duration, Easing::EaseInOutCubic),
            },
            settle,
            resolver,
        }
    }

    pub(crate) fn follow(path: PathSpec, resolver: Resolver) -> Self {
        Self {
            track: Track::Follow {
                curve: path.curve,
                speed: path.speed.max(f32::EPSILON),
                orient: path.orient_to_velocity,
                steered: false,
            },
            settle: Settle::Arrive,
            resolver,
        }
    }

    /// Ends parked in place rather than handing the token back to physics
    pub(crate) fn holds(&self) -> bool {
        self.settle == Settle::Hold
    }

    pub(crate) fn is_path(&self) -> bool {
        !matches!(self.track, Track::Tween(_))
    }

    /// Velocity correction toward the next path point, applied before the
    /// physics step. No-op for tweens and glides.
    pub(crate) fn steer(&mut self, token: &mut Token, dt: f32, steering: &Steering) {
        let Track::Follow {
            curve,
            speed,
            steered,
            ..
        } = &mut self.track
        else {
            return;
        };

        token.path_progress = (token.path_progress + *speed * dt).min(1.0);
        let target = curve.point_at(token.path_progress);
        token.target_position = target;

        let desired = (target - token.position) * steering.gain;
        let blend = (steering.response * dt).min(1.0);
        token.velocity += (desired - token.velocity) * blend;
        *steered = true;
    }

    /// Advance kinematic placement. Returns true once the motion is done.
    pub(crate) fn advance(&mut self, token: &mut Token, dt: f32) -> bool {
        let previous = token.position;

        let done = match &mut self.track {
            Track::Tween(tween) => {
                token.position = tween.advance(dt);
                token.target_position = *tween.to();
                tween.is_finished()
            }
            Track::Glide { curve, progress } => {
                let t = progress.advance(dt);
                token.position = curve.point_at(t);
                token.path_progress = t;
                token.target_position = curve.end();
                progress.is_finished()
            }
            Track::Follow {
                curve,
                speed,
                orient,
                steered,
            } => {
                if *steered {
                    *steered = false;
                } else {
                    token.path_progress = (token.path_progress + *speed * dt).min(1.0);
                    let target = curve.point_at(token.path_progress);
                    token.position = target;
                    token.target_position = target;
                    if dt > 0.0 {
                        token.velocity = (token.position - previous) / dt;
                    }
                }
                if *orient && token.speed() > 1e-3 {
                    token.heading = token.velocity.normalize();
                }
                return token.path_progress >= 1.0;
            }
        };

        if dt > 0.0 {
            token.velocity = (token.position - previous) / dt;
        }
        done
    }

    /// Bring the token to rest and resolve the completion
    pub(crate) fn finish(self, token: &mut Token) {
        token.velocity = Vec3::ZERO;
        if self.settle == Settle::Arrive {
            if let Some(next) = token.state().apply(Operation::Arrive) {
                token.set_state(next);
            }
        }
        self.resolver.finish();
    }
}

/// What to do with the token when a scale animation ends
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ScaleEnd {
    Keep,
    /// Shrink-out finished; reset and pool the token
    Retire,
}

#[derive(Debug)]
pub(crate) struct ScaleMotion {
    tween: Tween<f32>,
    pub(crate) end: ScaleEnd,
    resolver: Option<Resolver>,
}

impl ScaleMotion {
    pub(crate) fn grow(duration: f32) -> Self {
        Self {
            tween: Tween::new(0.0, 1.0, duration, Easing::EaseOutBack),
            end: ScaleEnd::Keep,
            resolver: None,
        }
    }

    /// 1 → 1.5 → 1
    pub(crate) fn pulse(leg: f32, resolver: Resolver) -> Self {
        Self {
            tween: Tween::new(1.0, 1.5, leg, Easing::EaseOutQuad).with_yoyo(),
            end: ScaleEnd::Keep,
            resolver: Some(resolver),
        }
    }

    pub(crate) fn shrink(from: f32, duration: f32, resolver: Resolver) -> Self {
        Self {
            tween: Tween::new(from, 0.0, duration, Easing::EaseInQuad),
            end: ScaleEnd::Retire,
            resolver: Some(resolver),
        }
    }

    pub(crate) fn advance(&mut self, token: &mut Token, dt: f32) -> bool {
        token.scale = self.tween.advance(dt);
        self.tween.is_finished()
    }

    pub(crate) fn finish(mut self) {
        if let Some(resolver) = self.resolver.take() {
            resolver.finish();
        }
    }
}

/// A pending simulated-time delay
#[derive(Debug)]
pub(crate) struct Timer {
    pub(crate) due: f64,
    pub(crate) resolver: Resolver,
}
