//! Time-based tweens
//!
//! A tween eases a value from a start to an end over a fixed duration. It is
//! advanced explicitly by the caller's frame delta, so a tween never reads a
//! wall clock.

use crate::easing::Easing;
use crate::values::Interpolate;

/// A single eased transition between two values
#[derive(Clone, Debug)]
pub struct Tween<T: Interpolate> {
    from: T,
    to: T,
    /// Duration of one leg in seconds
    duration: f32,
    elapsed: f32,
    easing: Easing,
    /// Play forward, then back to `from`
    yoyo: bool,
}

impl<T: Interpolate> Tween<T> {
    pub fn new(from: T, to: T, duration: f32, easing: Easing) -> Self {
        Self {
            from,
            to,
            duration: duration.max(0.0),
            elapsed: 0.0,
            easing,
            yoyo: false,
        }
    }

    /// Return to the start value after reaching the end, doubling the length
    pub fn with_yoyo(mut self) -> Self {
        self.yoyo = true;
        self
    }

    pub fn from(&self) -> &T {
        &self.from
    }

    pub fn to(&self) -> &T {
        &self.to
    }

    pub fn easing(&self) -> Easing {
        self.easing
    }

    /// Total running time including the return leg
    pub fn total_duration(&self) -> f32 {
        if self.yoyo {
            self.duration * 2.0
        } else {
            self.duration
        }
    }

    /// Linear progress through the whole tween, 0.0..=1.0
    pub fn progress(&self) -> f32 {
        let total = self.total_duration();
        if total <= 0.0 {
            1.0
        } else {
            (self.elapsed / total).min(1.0)
        }
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.total_duration()
    }

    /// Advance by `dt` seconds and return the new value
    pub fn advance(&mut self, dt: f32) -> T {
        if dt > 0.0 {
            self.elapsed = (self.elapsed + dt).min(self.total_duration());
        }
        self.value()
    }

    /// Current value
    pub fn value(&self) -> T {
        if self.duration <= 0.0 {
            return if self.yoyo {
                self.from.clone()
            } else {
                self.to.clone()
            };
        }

        let leg = self.elapsed / self.duration;
        let t = if self.yoyo && leg > 1.0 {
            2.0 - leg
        } else {
            leg.min(1.0)
        };
        self.from.lerp(&self.to, self.easing.apply(t))
    }
}
