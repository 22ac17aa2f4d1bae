//! Tokenflow Animation
//!
//! Frame-driven animation primitives for token motion.
//!
//! # Features
//!
//! - **Easing**: quadratic, cubic and back-out easing curves
//! - **Tweens**: typed point-to-point transitions with optional yoyo
//! - **Curves**: lines, Catmull-Rom splines, cubic Bézier arcs, orbits and
//!   smart paths that bow over the space between two zones

pub mod curve;
pub mod easing;
pub mod tween;
pub mod values;

pub use curve::{Curve, CurveError, DEFAULT_TENSION, ORBIT_SEGMENTS};
pub use easing::Easing;
pub use tween::Tween;
pub use values::Interpolate;
