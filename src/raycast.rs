//! Raycasting and Circle Casting
//!
//! Ray descriptors and hit records shared by the AABB prefilter, the
//! per-shape tests, and the lag-compensated world queries.
//!
//! Rays are finite: every cast is bounded by [`RayCast::distance`]. A ray
//! whose origin is already inside a shape reports a *contained* hit with
//! distance zero and no usable normal.

use crate::body::BodyHandle;
use crate::math::{Fix128, Vec2Fix};

/// A finite ray: origin, unit direction, and maximum distance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RayCast {
    /// Ray origin point
    pub origin: Vec2Fix,
    /// Unit direction
    pub direction: Vec2Fix,
    /// Maximum travel distance
    pub distance: Fix128,
}

impl RayCast {
    /// Ray from `origin` toward `destination`. A degenerate ray (identical
    /// points) gets `UNIT_X` as direction and zero length.
    pub fn new(origin: Vec2Fix, destination: Vec2Fix) -> Self {
        let delta = destination - origin;
        let distance = delta.length();
        let direction = if distance.is_zero() {
            Vec2Fix::UNIT_X
        } else {
            delta / distance
        };
        Self {
            origin,
            direction,
            distance,
        }
    }

    /// Ray from an origin, a direction (normalized here), and a distance.
    pub fn with_direction(origin: Vec2Fix, direction: Vec2Fix, distance: Fix128) -> Self {
        Self {
            origin,
            direction: direction.try_normalize().unwrap_or(Vec2Fix::UNIT_X),
            distance,
        }
    }

    /// Point along the ray at parameter `t`.
    #[inline]
    pub fn at(&self, t: Fix128) -> Vec2Fix {
        self.origin + self.direction * t
    }

    /// Far end of the ray.
    #[inline]
    pub fn end(&self) -> Vec2Fix {
        self.at(self.distance)
    }
}

/// Closest-hit record filled in by successive shape tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RayResult {
    /// Body that was hit
    pub body: Option<BodyHandle>,
    /// Index of the hit shape within the body
    pub shape_index: usize,
    /// Distance along the ray
    pub distance: Fix128,
    /// Surface normal (world space once the body-level cast finishes)
    pub normal: Vec2Fix,
    /// The ray started inside the shape
    pub contained: bool,
}

impl Default for RayResult {
    fn default() -> Self {
        Self {
            body: None,
            shape_index: 0,
            distance: Fix128::MAX,
            normal: Vec2Fix::ZERO,
            contained: false,
        }
    }
}

impl RayResult {
    /// A hit has been recorded.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.body.is_some()
    }

    /// World-space hit point for the given ray.
    #[inline]
    pub fn point(&self, ray: &RayCast) -> Vec2Fix {
        ray.at(self.distance)
    }

    /// Record a hit if it is closer than the current one.
    pub(crate) fn offer(&mut self, hit: ShapeHit, body: BodyHandle, shape_index: usize) -> bool {
        if hit.distance >= self.distance && self.is_valid() {
            return false;
        }
        self.body = Some(body);
        self.shape_index = shape_index;
        self.distance = hit.distance;
        self.normal = hit.normal;
        self.contained = hit.contained;
        true
    }
}

/// Hit reported by a single shape, in the shape's body space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShapeHit {
    /// Distance along the ray
    pub distance: Fix128,
    /// Body-space surface normal (zero when contained)
    pub normal: Vec2Fix,
    /// The ray origin is inside the shape
    pub contained: bool,
}

impl ShapeHit {
    /// Hit at `distance` with a surface normal.
    #[inline]
    pub fn surface(distance: Fix128, normal: Vec2Fix) -> Self {
        Self {
            distance,
            normal,
            contained: false,
        }
    }

    /// The ray begins inside the shape.
    #[inline]
    pub fn contained() -> Self {
        Self {
            distance: Fix128::ZERO,
            normal: Vec2Fix::ZERO,
            contained: true,
        }
    }
}

/// Ray vs. circle.
///
/// Returns `None` on a miss or when the hit is beyond `ray.distance`.
/// An origin inside the circle is a contained hit.
pub fn ray_circle(ray: &RayCast, center: Vec2Fix, radius: Fix128) -> Option<ShapeHit> {
    let oc = ray.origin - center;
    let c = oc.length_squared() - radius * radius;
    if c <= Fix128::ZERO {
        return Some(ShapeHit::contained());
    }

    let b = oc.dot(ray.direction);
    if b >= Fix128::ZERO {
        // Outside and pointing away
        return None;
    }

    let discriminant = b * b - c;
    if discriminant.is_negative() {
        return None;
    }

    let t = -b - discriminant.sqrt();
    if t.is_negative() || t > ray.distance {
        return None;
    }

    let normal = (ray.at(t) - center).normalize();
    Some(ShapeHit::surface(t, normal))
}

/// Ray vs. line segment approached from the side `normal` points to.
///
/// Used by polygon circle casts, where each edge is pushed outward by the
/// cast radius.
pub fn ray_segment(
    ray: &RayCast,
    a: Vec2Fix,
    b: Vec2Fix,
    normal: Vec2Fix,
) -> Option<ShapeHit> {
    let denom = normal.dot(ray.direction);
    if !denom.is_negative() {
        return None;
    }

    let t = normal.dot(a - ray.origin) / denom;
    if t.is_negative() || t > ray.distance {
        return None;
    }

    // Project the hit point onto the segment
    let edge = b - a;
    let along = (ray.at(t) - a).dot(edge);
    if along.is_negative() || along > edge.length_squared() {
        return None;
    }

    Some(ShapeHit::surface(t, normal))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_ray_new_normalizes() {
        let ray = RayCast::new(Vec2Fix::ZERO, Vec2Fix::from_int(0, 8));
        assert_eq!(ray.direction, Vec2Fix::UNIT_Y);
        assert_eq!(ray.distance, Fix128::from_int(8));
        assert_eq!(ray.end(), Vec2Fix::from_int(0, 8));
    }

    #[test]
    fn test_ray_degenerate() {
        let p = Vec2Fix::from_int(3, 3);
        let ray = RayCast::new(p, p);
        assert_eq!(ray.direction, Vec2Fix::UNIT_X);
        assert!(ray.distance.is_zero());
    }

    #[test]
    fn test_ray_circle_hit() {
        let ray = RayCast::new(Vec2Fix::from_int(-10, 0), Vec2Fix::from_int(10, 0));
        let hit = ray_circle(&ray, Vec2Fix::ZERO, Fix128::ONE).unwrap();
        assert_eq!(hit.distance, Fix128::from_int(9));
        assert_eq!(hit.normal, -Vec2Fix::UNIT_X);
        assert!(!hit.contained);
    }

    #[test]
    fn test_ray_circle_miss_and_range() {
        let ray = RayCast::new(Vec2Fix::from_int(-10, 5), Vec2Fix::from_int(10, 5));
        assert!(ray_circle(&ray, Vec2Fix::ZERO, Fix128::ONE).is_none());

        let short = RayCast::new(Vec2Fix::from_int(-10, 0), Vec2Fix::from_int(-5, 0));
        assert!(ray_circle(&short, Vec2Fix::ZERO, Fix128::ONE).is_none());

        let away = RayCast::new(Vec2Fix::from_int(-10, 0), Vec2Fix::from_int(-20, 0));
        assert!(ray_circle(&away, Vec2Fix::ZERO, Fix128::ONE).is_none());
    }

    #[test]
    fn test_ray_circle_contained() {
        let ray = RayCast::new(Vec2Fix::ZERO, Vec2Fix::from_int(5, 0));
        let hit = ray_circle(&ray, Vec2Fix::ZERO, Fix128::from_int(2)).unwrap();
        assert!(hit.contained);
        assert!(hit.distance.is_zero());
    }

    #[test]
    fn test_ray_segment_front_face_only() {
        let a = Vec2Fix::from_int(0, -1);
        let b = Vec2Fix::from_int(0, 1);
        let normal = -Vec2Fix::UNIT_X;

        let ray = RayCast::new(Vec2Fix::from_int(-4, 0), Vec2Fix::from_int(4, 0));
        let hit = ray_segment(&ray, a, b, normal).unwrap();
        assert_eq!(hit.distance, Fix128::from_int(4));

        let back = RayCast::new(Vec2Fix::from_int(4, 0), Vec2Fix::from_int(-4, 0));
        assert!(ray_segment(&back, a, b, normal).is_none());

        let above = RayCast::new(Vec2Fix::from_int(-4, 3), Vec2Fix::from_int(4, 3));
        assert!(ray_segment(&above, a, b, normal).is_none());
    }
}
