//! 3D curves for path-following motion
//!
//! Every curve is parameterised over t in 0.0..=1.0. Catmull-Rom splines
//! use the cardinal form with a tension factor; open splines extrapolate
//! phantom end points so the curve passes through the first and last
//! control points.

use smallvec::SmallVec;
use thiserror::Error;
use tokenflow_core::Vec3;

/// Tension used by smooth paths
pub const DEFAULT_TENSION: f32 = 0.5;

/// Number of control points in a full orbit
pub const ORBIT_SEGMENTS: usize = 32;

/// Errors raised while building a curve
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CurveError {
    #[error("a path needs at least 2 waypoints, got {0}")]
    TooFewWaypoints(usize),

    #[error("waypoint {0} is not finite")]
    NonFiniteWaypoint(usize),

    #[error("orbit radius must be positive, got {0}")]
    InvalidRadius(f32),
}

pub type Result<T> = std::result::Result<T, CurveError>;

/// A parametric 3D curve
#[derive(Clone, Debug, PartialEq)]
pub enum Curve {
    Line {
        start: Vec3,
        end: Vec3,
    },
    CatmullRom {
        points: SmallVec<[Vec3; 4]>,
        closed: bool,
        tension: f32,
    },
    CubicBezier {
        p0: Vec3,
        p1: Vec3,
        p2: Vec3,
        p3: Vec3,
    },
}

impl Curve {
    pub fn line(start: Vec3, end: Vec3) -> Self {
        Curve::Line { start, end }
    }

    /// Smooth path through the waypoints: a straight line for two points, a
    /// Catmull-Rom spline otherwise.
    pub fn smooth(waypoints: &[Vec3]) -> Result<Self> {
        if waypoints.len() < 2 {
            return Err(CurveError::TooFewWaypoints(waypoints.len()));
        }
        if let Some(i) = waypoints.iter().position(|p| !p.is_finite()) {
            return Err(CurveError::NonFiniteWaypoint(i));
        }
        if waypoints.len() == 2 {
            return Ok(Curve::line(waypoints[0], waypoints[1]));
        }
        Ok(Curve::CatmullRom {
            points: SmallVec::from_slice(waypoints),
            closed: false,
            tension: DEFAULT_TENSION,
        })
    }

    /// Path between two zones that bows upward over whatever sits between
    /// them. The lift is at least 2 units and grows with the distance.
    pub fn smart_path(from: Vec3, to: Vec3) -> Self {
        let lift = (from.distance(to) * 0.25).max(2.0);
        let mid = from.lerp(to, 0.5) + Vec3::UP * lift;
        Curve::CatmullRom {
            points: SmallVec::from_slice(&[from, mid, to]),
            closed: false,
            tension: DEFAULT_TENSION,
        }
    }

    /// Cubic Bézier arc from `start` to `end`, raised by `height` at the middle
    pub fn arc(start: Vec3, end: Vec3, height: f32) -> Self {
        let mid = start.lerp(end, 0.5) + Vec3::UP * height;
        let lift = Vec3::UP * (height * 0.3);
        Curve::CubicBezier {
            p0: start,
            p1: start.lerp(mid, 0.5) + lift,
            p2: mid.lerp(end, 0.5) + lift,
            p3: end,
        }
    }

    /// Horizontal orbit around `center` between two angles in radians. A full
    /// turn produces a closed loop.
    pub fn orbit(center: Vec3, radius: f32, start_angle: f32, end_angle: f32) -> Result<Self> {
        if !(radius > 0.0 && radius.is_finite()) {
            return Err(CurveError::InvalidRadius(radius));
        }
        let sweep = end_angle - start_angle;
        let closed = (sweep.abs() - std::f32::consts::TAU).abs() < 1e-4;
        // a closed loop must not repeat its first point
        let count = if closed {
            ORBIT_SEGMENTS
        } else {
            ORBIT_SEGMENTS + 1
        };
        let points = (0..count)
            .map(|i| {
                let angle = start_angle + sweep * (i as f32 / ORBIT_SEGMENTS as f32);
                Vec3::new(
                    center.x + angle.cos() * radius,
                    center.y,
                    center.z + angle.sin() * radius,
                )
            })
            .collect();
        Ok(Curve::CatmullRom {
            points,
            closed,
            tension: DEFAULT_TENSION,
        })
    }

    pub fn start(&self) -> Vec3 {
        self.point_at(0.0)
    }

    pub fn end(&self) -> Vec3 {
        self.point_at(1.0)
    }

    /// Point on the curve at parameter `t`, clamped to 0.0..=1.0
    pub fn point_at(&self, t: f32) -> Vec3 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Curve::Line { start, end } => start.lerp(*end, t),
            Curve::CatmullRom {
                points,
                closed,
                tension,
            } => catmull_rom_point(points, *closed, *tension, t),
            Curve::CubicBezier { p0, p1, p2, p3 } => {
                let u = 1.0 - t;
                *p0 * (u * u * u) + *p1 * (3.0 * u * u * t) + *p2 * (3.0 * u * t * t) + *p3 * (t * t * t)
            }
        }
    }

    /// Unit tangent at `t`, estimated by central difference
    pub fn tangent_at(&self, t: f32) -> Vec3 {
        const H: f32 = 1e-3;
        let a = self.point_at((t - H).max(0.0));
        let b = self.point_at((t + H).min(1.0));
        (b - a).normalize()
    }

    /// `count` evenly spaced samples including both ends
    pub fn sample(&self, count: usize) -> Vec<Vec3> {
        match count {
            0 => Vec::new(),
            1 => vec![self.start()],
            _ => (0..count)
                .map(|i| self.point_at(i as f32 / (count - 1) as f32))
                .collect(),
        }
    }

    /// Polyline length over `segments` chords
    pub fn approximate_length(&self, segments: usize) -> f32 {
        let points = self.sample(segments.max(1) + 1);
        points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }
}

fn catmull_rom_point(points: &[Vec3], closed: bool, tension: f32, t: f32) -> Vec3 {
    let len = points.len();
    match len {
        0 => return Vec3::ZERO,
        1 => return points[0],
        _ => {}
    }

    let (p0, p1, p2, p3, weight) = if closed {
        let p = len as f32 * t;
        let mut segment = p.floor() as usize;
        let weight = p - segment as f32;
        segment %= len;
        (
            points[(segment + len - 1) % len],
            points[segment],
            points[(segment + 1) % len],
            points[(segment + 2) % len],
            weight,
        )
    } else {
        let p = (len - 1) as f32 * t;
        let mut segment = p.floor() as usize;
        let mut weight = p - segment as f32;
        if segment >= len - 1 {
            segment = len - 2;
            weight = 1.0;
        }
        let p1 = points[segment];
        let p2 = points[segment + 1];
        let p0 = if segment > 0 {
            points[segment - 1]
        } else {
            p1 + (p1 - p2)
        };
        let p3 = if segment + 2 < len {
            points[segment + 2]
        } else {
            p2 + (p2 - p1)
        };
        (p0, p1, p2, p3, weight)
    };

    Vec3::new(
        cardinal(p0.x, p1.x, p2.x, p3.x, tension, weight),
        cardinal(p0.y, p1.y, p2.y, p3.y, tension, weight),
        cardinal(p0.z, p1.z, p2.z, p3.z, tension, weight),
    )
}

/// Cubic Hermite segment from `x1` to `x2` with cardinal tangents
fn cardinal(x0: f32, x1: f32, x2: f32, x3: f32, tension: f32, t: f32) -> f32 {
    let t0 = tension * (x2 - x0);
    let t1 = tension * (x3 - x1);
    let c0 = x1;
    let c1 = t0;
    let c2 = -3.0 * x1 + 3.0 * x2 - 2.0 * t0 - t1;
    let c3 = 2.0 * x1 - 2.0 * x2 + t0 + t1;
    let t2 = t * t;
    c0 + c1 * t + c2 * t2 + c3 * t2 * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        a.distance(b) < 1e-4
    }

    #[test]
    fn test_smooth_needs_two_points() {
        assert_eq!(
            Curve::smooth(&[Vec3::ZERO]),
            Err(CurveError::TooFewWaypoints(1))
        );
        let line = Curve::smooth(&[Vec3::ZERO, Vec3::ONE]).unwrap();
        assert!(matches!(line, Curve::Line { .. }));
        assert!(close(line.point_at(0.5), Vec3::splat(0.5)));
    }

    #[test]
    fn test_smooth_rejects_non_finite() {
        let err = Curve::smooth(&[Vec3::ZERO, Vec3::new(f32::NAN, 0.0, 0.0), Vec3::ONE]);
        assert_eq!(err, Err(CurveError::NonFiniteWaypoint(1)));
    }

    #[test]
    fn test_catmull_rom_passes_through_control_points() {
        let points = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 3.0, 0.0),
            Vec3::new(4.0, 0.0, 1.0),
            Vec3::new(6.0, 1.0, 0.0),
        ];
        let curve = Curve::smooth(&points).unwrap();
        for (i, p) in points.iter().enumerate() {
            let t = i as f32 / 3.0;
            assert!(close(curve.point_at(t), *p), "control point {i}");
        }
    }

    #[test]
    fn test_smart_path_rises_between_ends() {
        let from = Vec3::new(-4.0, 0.0, 0.0);
        let to = Vec3::new(4.0, 0.0, 0.0);
        let curve = Curve::smart_path(from, to);
        assert!(close(curve.start(), from));
        assert!(close(curve.end(), to));
        let apex = curve.point_at(0.5);
        assert!((apex.y - 2.0).abs() < 1e-4);
        assert!(apex.x.abs() < 1e-4);
    }

    #[test]
    fn test_smart_path_lift_grows_with_distance() {
        let curve = Curve::smart_path(Vec3::ZERO, Vec3::new(20.0, 0.0, 0.0));
        assert!((curve.point_at(0.5).y - 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_arc_endpoints_and_height() {
        let curve = Curve::arc(Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), 2.0);
        assert!(close(curve.start(), Vec3::ZERO));
        assert!(close(curve.end(), Vec3::new(4.0, 0.0, 0.0)));
        assert!(curve.point_at(0.5).y > 0.0);
    }

    #[test]
    fn test_full_orbit_is_closed() {
        let center = Vec3::new(1.0, 2.0, 3.0);
        let orbit = Curve::orbit(center, 2.0, 0.0, std::f32::consts::TAU).unwrap();
        match &orbit {
            Curve::CatmullRom { points, closed, .. } => {
                assert!(*closed);
                assert_eq!(points.len(), ORBIT_SEGMENTS);
            }
            other => panic!("unexpected curve {other:?}"),
        }
        assert!(close(orbit.start(), orbit.end()));
        for p in orbit.sample(16) {
            assert!((p.y - 2.0).abs() < 1e-5);
        }
        assert!(Curve::orbit(center, 0.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_length_of_line() {
        let curve = Curve::line(Vec3::ZERO, Vec3::new(3.0, 4.0, 0.0));
        assert!((curve.approximate_length(8) - 5.0).abs() < 1e-4);
        assert_eq!(curve.sample(0).len(), 0);
        assert_eq!(curve.sample(5).len(), 5);
    }
}
