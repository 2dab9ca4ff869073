//! Axis-Aligned Bounding Boxes
//!
//! World-space `(top, bottom, left, right)` boxes used by both broad-phase
//! indices, the per-body query prefilter, and the CCD sweep. Construction
//! always orders the bounds so `left <= right` and `bottom <= top` hold.

use crate::math::{Fix128, Vec2Fix};
use crate::raycast::RayCast;

/// 2D axis-aligned bounding box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb {
    top: Fix128,
    bottom: Fix128,
    left: Fix128,
    right: Fix128,
}

impl Aabb {
    /// Create from the four bounds. Swapped bounds are reordered.
    #[must_use]
    pub fn new(top: Fix128, bottom: Fix128, left: Fix128, right: Fix128) -> Self {
        Self {
            top: top.max(bottom),
            bottom: top.min(bottom),
            left: left.min(right),
            right: left.max(right),
        }
    }

    /// Create from two opposite corners in any order.
    #[must_use]
    pub fn from_corners(a: Vec2Fix, b: Vec2Fix) -> Self {
        Self::new(a.y, b.y, a.x, b.x)
    }

    /// Create from a center point and half extents.
    #[must_use]
    pub fn from_center(center: Vec2Fix, half_extents: Vec2Fix) -> Self {
        Self::from_corners(center - half_extents, center + half_extents)
    }

    /// Box around a circle.
    #[must_use]
    pub fn from_circle(center: Vec2Fix, radius: Fix128) -> Self {
        Self::from_center(center, Vec2Fix::new(radius, radius))
    }

    /// Smallest box containing every point. `None` for an empty slice.
    #[must_use]
    pub fn from_points(points: &[Vec2Fix]) -> Option<Self> {
        let first = *points.first()?;
        let mut out = Self::from_corners(first, first);
        for p in &points[1..] {
            out.top = out.top.max(p.y);
            out.bottom = out.bottom.min(p.y);
            out.left = out.left.min(p.x);
            out.right = out.right.max(p.x);
        }
        Some(out)
    }

    /// Upper bound on y
    #[inline]
    pub fn top(&self) -> Fix128 {
        self.top
    }

    /// Lower bound on y
    #[inline]
    pub fn bottom(&self) -> Fix128 {
        self.bottom
    }

    /// Lower bound on x
    #[inline]
    pub fn left(&self) -> Fix128 {
        self.left
    }

    /// Upper bound on x
    #[inline]
    pub fn right(&self) -> Fix128 {
        self.right
    }

    /// Width (x extent)
    #[inline]
    pub fn width(&self) -> Fix128 {
        self.right - self.left
    }

    /// Height (y extent)
    #[inline]
    pub fn height(&self) -> Fix128 {
        self.top - self.bottom
    }

    /// Center point
    #[inline]
    pub fn center(&self) -> Vec2Fix {
        Vec2Fix::new((self.left + self.right).half(), (self.bottom + self.top).half())
    }

    /// Half extents
    #[inline]
    pub fn extents(&self) -> Vec2Fix {
        Vec2Fix::new(self.width().half(), self.height().half())
    }

    /// Perimeter, the tree broad-phase's insertion cost metric.
    #[inline]
    pub fn perimeter(&self) -> Fix128 {
        (self.width() + self.height()).double()
    }

    // ========================================================================
    // Construction helpers
    // ========================================================================

    /// Box grown by `amount` on every side.
    #[must_use]
    pub fn expanded(&self, amount: Fix128) -> Self {
        Self::new(
            self.top + amount,
            self.bottom - amount,
            self.left - amount,
            self.right + amount,
        )
    }

    /// Box moved by `delta`.
    #[must_use]
    pub fn translated(&self, delta: Vec2Fix) -> Self {
        Self {
            top: self.top + delta.y,
            bottom: self.bottom + delta.y,
            left: self.left + delta.x,
            right: self.right + delta.x,
        }
    }

    /// Smallest box containing both.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        Self {
            top: self.top.max(other.top),
            bottom: self.bottom.min(other.bottom),
            left: self.left.min(other.left),
            right: self.right.max(other.right),
        }
    }

    /// Box covering this one and its copy moved by `delta` (swept volume).
    #[must_use]
    pub fn swept(&self, delta: Vec2Fix) -> Self {
        self.merged(&self.translated(delta))
    }

    // ========================================================================
    // Tests
    // ========================================================================

    /// Overlap test. Touching boxes intersect.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.left <= other.right
            && self.right >= other.left
            && self.bottom <= other.top
            && self.top >= other.bottom
    }

    /// `other` lies entirely inside this box.
    #[inline]
    pub fn contains(&self, other: &Self) -> bool {
        self.left <= other.left
            && self.right >= other.right
            && self.bottom <= other.bottom
            && self.top >= other.top
    }

    /// Point containment (inclusive).
    #[inline]
    pub fn query_point(&self, point: Vec2Fix) -> bool {
        self.left <= point.x && self.right >= point.x && self.bottom <= point.y && self.top >= point.y
    }

    /// Circle overlap approximated by testing the center against the box
    /// grown by the radius. Corners are conservative.
    #[inline]
    pub fn query_circle_approx(&self, origin: Vec2Fix, radius: Fix128) -> bool {
        self.expanded(radius).query_point(origin)
    }

    /// Slab test of a finite ray against this box.
    pub fn ray_cast(&self, ray: &RayCast) -> bool {
        let mut t_min = Fix128::ZERO;
        let mut t_max = ray.distance;

        let axes = [
            (ray.origin.x, ray.direction.x, self.left, self.right),
            (ray.origin.y, ray.direction.y, self.bottom, self.top),
        ];
        for (origin, dir, lo, hi) in axes {
            if dir.is_zero() {
                if origin < lo || origin > hi {
                    return false;
                }
                continue;
            }
            let mut t0 = (lo - origin) / dir;
            let mut t1 = (hi - origin) / dir;
            if t0 > t1 {
                core::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return false;
            }
        }
        true
    }

    /// Circle cast approximated by a ray cast against the box grown by the
    /// radius.
    #[inline]
    pub fn circle_cast_approx(&self, ray: &RayCast, radius: Fix128) -> bool {
        self.expanded(radius).ray_cast(ray)
    }
}

// ============================================================================
// Tests
// ============================================================================
