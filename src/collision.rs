//! Narrow-phase Collision Tests
//!
//! Exact shape-pair tests producing up to [`MAX_CONTACTS`] contact points.
//! All tests run on the world-space geometry cached on each shape.
//!
//! Conventions shared by every test:
//! - the normal points from the first shape toward the second;
//! - penetration is negative (overlap depth);
//! - touching without overlap is not a collision for circles.

use crate::config::MAX_CONTACTS;
use crate::math::{Axis, Fix128, Vec2Fix};
use crate::shape::{polygon_circle_overlap, Circle, Polygon, Shape, ShapeKind};

// ============================================================================
// Contact Set
// ============================================================================

/// One point of contact between two shapes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContactPoint {
    /// World-space contact position
    pub position: Vec2Fix,
    /// Unit normal from the first shape toward the second
    pub normal: Vec2Fix,
    /// Overlap depth (negative)
    pub penetration: Fix128,
}

/// Fixed-capacity list of contact points for one shape pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContactSet {
    points: [ContactPoint; MAX_CONTACTS],
    len: usize,
}

impl ContactSet {
    /// Append a point. Returns `false` once full.
    pub fn push(&mut self, position: Vec2Fix, normal: Vec2Fix, penetration: Fix128) -> bool {
        if self.len == MAX_CONTACTS {
            return false;
        }
        self.points[self.len] = ContactPoint {
            position,
            normal,
            penetration,
        };
        self.len += 1;
        true
    }

    /// Is full
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == MAX_CONTACTS
    }

    /// Number of points
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// No points
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Points collected so far
    #[inline]
    pub fn as_slice(&self) -> &[ContactPoint] {
        &self.points[..self.len]
    }

    fn flipped(mut self) -> Self {
        for p in self.points[..self.len].iter_mut() {
            p.normal = -p.normal;
        }
        self
    }

    fn single(position: Vec2Fix, normal: Vec2Fix, penetration: Fix128) -> Self {
        let mut set = Self::default();
        set.push(position, normal, penetration);
        set
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Test two shapes. The normal in the result points from `a` toward `b`
/// regardless of the kinds involved.
pub fn collide(a: &Shape, b: &Shape) -> Option<ContactSet> {
    match (a.kind(), b.kind()) {
        (ShapeKind::Circle(ca), ShapeKind::Circle(cb)) => circle_circle(ca, cb),
        (ShapeKind::Circle(c), ShapeKind::Polygon(p)) => circle_polygon(c, p),
        (ShapeKind::Polygon(p), ShapeKind::Circle(c)) => {
            circle_polygon(c, p).map(ContactSet::flipped)
        }
        (ShapeKind::Polygon(pa), ShapeKind::Polygon(pb)) => polygon_polygon(pa, pb),
    }
}

/// Circle vs circle.
pub fn circle_circle(a: &Circle, b: &Circle) -> Option<ContactSet> {
    let reach = a.radius() + b.radius();
    let offset = b.world_origin() - a.world_origin();
    let dist_sq = offset.length_squared();
    if dist_sq >= reach * reach {
        return None;
    }

    let dist = dist_sq.sqrt();
    let (normal, inv_dist) = if dist.is_zero() {
        // Concentric: any direction separates them
        (Vec2Fix::UNIT_X, Fix128::ZERO)
    } else {
        (offset / dist, Fix128::ONE / dist)
    };
    // Midpoint of the overlap region along the center line
    let t = Fix128::HALF + inv_dist * (a.radius() - reach.half());
    let position = a.world_origin() + offset * t;
    Some(ContactSet::single(position, normal, dist - reach))
}

/// Circle vs convex polygon. The normal points from the circle toward the
/// polygon.
pub fn circle_polygon(circle: &Circle, polygon: &Polygon) -> Option<ContactSet> {
    let (normal, penetration, position) = polygon_circle_overlap(
        polygon.world_vertices(),
        polygon.world_axes(),
        circle.world_origin(),
        circle.radius(),
    )?;
    Some(ContactSet::single(position, -normal, penetration))
}

/// Convex polygon vs convex polygon.
///
/// Separating-axis test over both polygons' edge normals. The axis with the
/// least overlap becomes the reference; contact points are vertices of each
/// polygon found inside the other, with a deepest-vertex fallback when no
/// vertex is contained.
pub fn polygon_polygon(a: &Polygon, b: &Polygon) -> Option<ContactSet> {
    let axis_a = min_separation_axis(a, b)?;
    let axis_b = min_separation_axis(b, a)?;

    let mut set = ContactSet::default();
    if axis_b.width > axis_a.width {
        // Reference edge on b; its normal points b -> a
        find_vertices(b, a, axis_b.normal, axis_b.width, &mut set);
        Some(set.flipped())
    } else {
        find_vertices(a, b, axis_a.normal, axis_a.width, &mut set);
        Some(set)
    }
}

/// Axis of `reference` along which `incident` penetrates least, as
/// `(normal, penetration)`. `None` if any axis separates them.
fn min_separation_axis(reference: &Polygon, incident: &Polygon) -> Option<Axis> {
    let mut best = Axis::new(Vec2Fix::ZERO, Fix128::MIN);
    for axis in reference.world_axes() {
        let min = incident
            .world_vertices()
            .iter()
            .map(|v| axis.distance(*v))
            .min()?;
        if min.is_positive() {
            return None;
        }
        if min > best.width {
            best = Axis::new(axis.normal, min);
        }
    }
    Some(best)
}

fn find_vertices(
    reference: &Polygon,
    incident: &Polygon,
    normal: Vec2Fix,
    penetration: Fix128,
    set: &mut ContactSet,
) {
    // Vertices fully inside the other polygon
    let full = |poly: &Polygon, v: Vec2Fix| {
        poly.world_axes()
            .iter()
            .all(|a| a.distance(v) <= Fix128::ZERO)
    };
    collect(
        reference,
        incident,
        normal,
        penetration,
        set,
        |v| full(incident, v),
        |v| full(reference, v),
    );
    if !set.is_empty() {
        return;
    }

    // Crossed polygons: relax containment to the edges facing the contact
    collect(
        reference,
        incident,
        normal,
        penetration,
        set,
        |v| incident.contains_point_partial(v, normal),
        |v| reference.contains_point_partial(v, -normal),
    );
    if !set.is_empty() {
        return;
    }

    // Nothing contained at all: the incident vertex reaching deepest along
    // the reference normal
    if let Some(deepest) = incident
        .world_vertices()
        .iter()
        .copied()
        .min_by_key(|v| normal.dot(*v))
    {
        set.push(deepest, normal, penetration);
    }
}

fn collect<F, G>(
    reference: &Polygon,
    incident: &Polygon,
    normal: Vec2Fix,
    penetration: Fix128,
    set: &mut ContactSet,
    in_incident: F,
    in_reference: G,
) where
    F: Fn(Vec2Fix) -> bool,
    G: Fn(Vec2Fix) -> bool,
{
    let candidates = reference
        .world_vertices()
        .iter()
        .copied()
        .filter(|v| in_incident(*v))
        .chain(incident.world_vertices().iter().copied().filter(|v| in_reference(*v)));
    for v in candidates {
        if !set.push(v, normal, penetration) {
            return;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::material::ShapeMaterial;
    use crate::shape::ShapeSpace;

    fn circle_at(x: i64, y: i64, radius: Fix128) -> Shape {
        let mut s =
            Shape::circle(Vec2Fix::ZERO, radius, ShapeSpace::Body, ShapeMaterial::default()).unwrap();
        s.attach(Vec2Fix::from_int(x, y), Vec2Fix::UNIT_X).unwrap();
        s
    }

    fn box_at(x: i64, y: i64, half: i64) -> Shape {
        let verts = [
            Vec2Fix::from_int(-half, -half),
            Vec2Fix::from_int(half, -half),
            Vec2Fix::from_int(half, half),
            Vec2Fix::from_int(-half, half),
        ];
        let mut s = Shape::polygon(&verts, ShapeSpace::Body, ShapeMaterial::default()).unwrap();
        s.attach(Vec2Fix::from_int(x, y), Vec2Fix::UNIT_X).unwrap();
        s
    }

    #[test]
    fn test_circle_circle_overlap() {
        let a = circle_at(0, 0, Fix128::ONE);
        let b = circle_at(1, 0, Fix128::ONE);
        let set = collide(&a, &b).unwrap();
        assert_eq!(set.len(), 1);
        let p = set.as_slice()[0];
        assert_eq!(p.normal, Vec2Fix::UNIT_X);
        assert_eq!(p.penetration, Fix128::NEG_ONE);
        assert_eq!(p.position, Vec2Fix::new(Fix128::HALF, Fix128::ZERO));
    }

    #[test]
    fn test_circle_circle_touching_is_not_contact() {
        let a = circle_at(0, 0, Fix128::ONE);
        let b = circle_at(2, 0, Fix128::ONE);
        assert!(collide(&a, &b).is_none());
    }

    #[test]
    fn test_circle_circle_concentric() {
        let a = circle_at(0, 0, Fix128::ONE);
        let b = circle_at(0, 0, Fix128::ONE);
        let set = collide(&a, &b).unwrap();
        assert_eq!(set.as_slice()[0].normal, Vec2Fix::UNIT_X);
        assert_eq!(set.as_slice()[0].penetration, -Fix128::from_int(2));
    }

    #[test]
    fn test_circle_polygon_normal_direction() {
        let c = circle_at(0, 3, Fix128::ONE);
        let p = box_at(0, 0, 2);
        let set = collide(&c, &p).unwrap();
        let point = set.as_slice()[0];
        // Circle sits on top of the box: normal points down into the box
        assert_eq!(point.normal, -Vec2Fix::UNIT_Y);
        assert_eq!(point.penetration, Fix128::ZERO);

        let reversed = collide(&p, &c).unwrap();
        assert_eq!(reversed.as_slice()[0].normal, Vec2Fix::UNIT_Y);
    }

    #[test]
    fn test_circle_polygon_separated() {
        let c = circle_at(5, 5, Fix128::ONE);
        let p = box_at(0, 0, 2);
        assert!(collide(&c, &p).is_none());
    }

    #[test]
    fn test_polygon_polygon_stacked() {
        let a = box_at(0, 0, 1);
        let b = box_at(0, 1, 1);
        let set = collide(&a, &b).unwrap();
        assert!(!set.is_empty());
        assert!(set.len() <= MAX_CONTACTS);
        for p in set.as_slice() {
            assert_eq!(p.penetration, -Fix128::ONE);
            assert_eq!(p.normal.dot(Vec2Fix::UNIT_Y), Fix128::ONE);
        }

        let reversed = collide(&b, &a).unwrap();
        for p in reversed.as_slice() {
            assert_eq!(p.normal, -Vec2Fix::UNIT_Y);
        }
    }

    #[test]
    fn test_polygon_polygon_separated() {
        let a = box_at(0, 0, 1);
        let b = box_at(5, 0, 1);
        assert!(collide(&a, &b).is_none());
    }

    #[test]
    fn test_contact_set_capacity() {
        let mut set = ContactSet::default();
        for _ in 0..MAX_CONTACTS {
            assert!(set.push(Vec2Fix::ZERO, Vec2Fix::UNIT_X, Fix128::ZERO));
        }
        assert!(set.is_full());
        assert!(!set.push(Vec2Fix::ZERO, Vec2Fix::UNIT_X, Fix128::ZERO));
    }
}
