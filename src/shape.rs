//! Collision Shapes
//!
//! Body-local geometry attached to exactly one body. Every concrete kind
//! implements [`ShapeGeometry`], the capability contract the rest of the
//! engine relies on: bounds, mass properties, containment and cast queries
//! in body space, a canonical ordering key for pair dispatch, and a world
//! cache refreshed whenever the owning body moves.
//!
//! # Shapes
//!
//! - [`Circle`]: origin offset + radius
//! - [`Polygon`]: convex, counter-clockwise vertex loop
//!
//! Shapes may be described in world space; the coordinates are converted to
//! body space against the owning body's initial pose when it is created.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::aabb::Aabb;
use crate::config::AREA_MASS_RATIO;
use crate::error::PhysicsError;
use crate::material::ShapeMaterial;
use crate::math::{Axis, Fix128, Vec2Fix};
use crate::raycast::{ray_circle, ray_segment, RayCast, ShapeHit};

// ============================================================================
// Capability Contract
// ============================================================================

/// Shape kind. The discriminant is the canonical dispatch order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShapeType {
    /// Circle (ordering key 0)
    Circle = 0,
    /// Convex polygon (ordering key 1)
    Polygon = 1,
}

/// Mass properties of one shape about its body's origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MassData {
    /// Area in body space
    pub area: Fix128,
    /// `density * area * AREA_MASS_RATIO`
    pub mass: Fix128,
    /// Moment of inertia about the body origin
    pub inertia: Fix128,
    /// Area centroid in body space
    pub centroid: Vec2Fix,
}

/// Geometry operations every shape kind provides.
pub trait ShapeGeometry {
    /// Shape kind.
    fn shape_type(&self) -> ShapeType;

    /// Canonical ordering key; pairs are dispatched with the lower key first.
    fn ordering_key(&self) -> u8 {
        self.shape_type() as u8
    }

    /// Bounds in body space.
    fn local_aabb(&self) -> Aabb;

    /// Mass properties for the given density.
    fn compute_mass(&self, density: Fix128) -> MassData;

    /// Point containment, body space.
    fn query_point(&self, body_point: Vec2Fix) -> bool;

    /// Circle overlap, body space.
    fn query_circle(&self, body_origin: Vec2Fix, radius: Fix128) -> bool;

    /// Ray cast, body space.
    fn ray_cast(&self, body_ray: &RayCast) -> Option<ShapeHit>;

    /// Swept circle cast, body space.
    fn circle_cast(&self, body_ray: &RayCast, radius: Fix128) -> Option<ShapeHit>;

    /// Refresh the world-space cache for a new body pose and return the
    /// world-space bounds.
    fn on_body_pose_changed(&mut self, position: Vec2Fix, facing: Vec2Fix) -> Aabb;
}

// ============================================================================
// Circle
// ============================================================================

/// Circle offset from its body's origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Circle {
    body_origin: Vec2Fix,
    radius: Fix128,
    world_origin: Vec2Fix,
}

impl Circle {
    /// Circle at `origin` (body space) with `radius`.
    pub fn new(origin: Vec2Fix, radius: Fix128) -> Result<Self, PhysicsError> {
        if !radius.is_positive() {
            return Err(PhysicsError::InvalidShape {
                reason: "circle radius must be > 0",
            });
        }
        Ok(Self {
            body_origin: origin,
            radius,
            world_origin: origin,
        })
    }

    /// Radius
    #[inline]
    pub fn radius(&self) -> Fix128 {
        self.radius
    }

    /// Center in body space
    #[inline]
    pub fn body_origin(&self) -> Vec2Fix {
        self.body_origin
    }

    /// Center in world space as of the last pose update
    #[inline]
    pub fn world_origin(&self) -> Vec2Fix {
        self.world_origin
    }

    fn to_body_space(&mut self, position: Vec2Fix, facing: Vec2Fix) {
        self.body_origin = (self.body_origin - position).inv_rotate_by(facing);
    }
}

impl ShapeGeometry for Circle {
    fn shape_type(&self) -> ShapeType {
        ShapeType::Circle
    }

    fn local_aabb(&self) -> Aabb {
        Aabb::from_circle(self.body_origin, self.radius)
    }

    fn compute_mass(&self, density: Fix128) -> MassData {
        let r2 = self.radius * self.radius;
        let area = Fix128::PI * r2;
        let mass = density * area * AREA_MASS_RATIO;
        let inertia = mass * (r2.half() + self.body_origin.length_squared());
        MassData {
            area,
            mass,
            inertia,
            centroid: self.body_origin,
        }
    }

    fn query_point(&self, body_point: Vec2Fix) -> bool {
        self.body_origin.distance_squared(body_point) <= self.radius * self.radius
    }

    fn query_circle(&self, body_origin: Vec2Fix, radius: Fix128) -> bool {
        let reach = self.radius + radius;
        self.body_origin.distance_squared(body_origin) <= reach * reach
    }

    fn ray_cast(&self, body_ray: &RayCast) -> Option<ShapeHit> {
        ray_circle(body_ray, self.body_origin, self.radius)
    }

    fn circle_cast(&self, body_ray: &RayCast, radius: Fix128) -> Option<ShapeHit> {
        ray_circle(body_ray, self.body_origin, self.radius + radius)
    }

    fn on_body_pose_changed(&mut self, position: Vec2Fix, facing: Vec2Fix) -> Aabb {
        self.world_origin = position + self.body_origin.rotate_by(facing);
        Aabb::from_circle(self.world_origin, self.radius)
    }
}

// ============================================================================
// Polygon
// ============================================================================

/// Convex polygon with counter-clockwise winding.
///
/// Edge `i` runs from vertex `i` to vertex `i + 1`; its axis is the outward
/// (right-hand) normal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Polygon {
    body_vertices: Vec<Vec2Fix>,
    body_axes: Vec<Axis>,
    world_vertices: Vec<Vec2Fix>,
    world_axes: Vec<Axis>,
}

impl Polygon {
    /// Polygon from counter-clockwise convex vertices (body space).
    pub fn new(vertices: &[Vec2Fix]) -> Result<Self, PhysicsError> {
        let mut polygon = Self::default();
        polygon.rebuild(vertices)?;
        Ok(polygon)
    }

    /// Refill this polygon's buffers from `vertices`, keeping capacity.
    pub(crate) fn rebuild(&mut self, vertices: &[Vec2Fix]) -> Result<(), PhysicsError> {
        if vertices.len() < 3 {
            return Err(PhysicsError::InvalidShape {
                reason: "polygon needs at least 3 vertices",
            });
        }
        self.clear();
        self.body_vertices.extend_from_slice(vertices);
        self.compute_body_axes()?;

        // Convex and counter-clockwise: every turn is a left turn.
        let n = vertices.len();
        for i in 0..n {
            let e0 = vertices[(i + 1) % n] - vertices[i];
            let e1 = vertices[(i + 2) % n] - vertices[(i + 1) % n];
            if !e0.cross(e1).is_positive() {
                return Err(PhysicsError::InvalidShape {
                    reason: "polygon must be convex and counter-clockwise",
                });
            }
        }

        self.world_vertices.extend_from_slice(&self.body_vertices);
        self.world_axes.extend_from_slice(&self.body_axes);
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.body_vertices.clear();
        self.body_axes.clear();
        self.world_vertices.clear();
        self.world_axes.clear();
    }

    fn compute_body_axes(&mut self) -> Result<(), PhysicsError> {
        self.body_axes.clear();
        let n = self.body_vertices.len();
        for i in 0..n {
            let a = self.body_vertices[i];
            let b = self.body_vertices[(i + 1) % n];
            let normal = (b - a)
                .right()
                .try_normalize()
                .ok_or(PhysicsError::ZeroLengthVector {
                    context: "polygon edge",
                })?;
            self.body_axes.push(Axis::new(normal, normal.dot(a)));
        }
        Ok(())
    }

    fn to_body_space(&mut self, position: Vec2Fix, facing: Vec2Fix) -> Result<(), PhysicsError> {
        for v in self.body_vertices.iter_mut() {
            *v = (*v - position).inv_rotate_by(facing);
        }
        self.compute_body_axes()
    }

    /// Vertices in body space
    #[inline]
    pub fn body_vertices(&self) -> &[Vec2Fix] {
        &self.body_vertices
    }

    /// Vertices in world space as of the last pose update
    #[inline]
    pub fn world_vertices(&self) -> &[Vec2Fix] {
        &self.world_vertices
    }

    /// Edge axes in world space as of the last pose update
    #[inline]
    pub fn world_axes(&self) -> &[Axis] {
        &self.world_axes
    }

    /// World-space containment, ignoring edges whose normal points against
    /// `normal`. Used when clipping contact vertices.
    pub(crate) fn contains_point_partial(&self, point: Vec2Fix, normal: Vec2Fix) -> bool {
        self.world_axes
            .iter()
            .all(|axis| axis.normal.dot(normal).is_negative() || axis.distance(point) <= Fix128::ZERO)
    }
}

/// Overlap between a circle and a convex polygon, from the polygon's side.
///
/// Returns `(normal, penetration, point)` where `normal` points from the
/// polygon toward the circle center and `penetration` is negative.
pub(crate) fn polygon_circle_overlap(
    vertices: &[Vec2Fix],
    axes: &[Axis],
    center: Vec2Fix,
    radius: Fix128,
) -> Option<(Vec2Fix, Fix128, Vec2Fix)> {
    let n = vertices.len();
    let mut index = 0;
    let mut max = Fix128::MIN;
    for (i, axis) in axes.iter().enumerate() {
        let d = axis.distance(center) - radius;
        if d.is_positive() {
            return None;
        }
        if d > max {
            max = d;
            index = i;
        }
    }

    let a = vertices[index];
    let b = vertices[(index + 1) % n];
    let axis = axes[index];

    // Vertex regions only apply while the center is outside the polygon.
    if (max + radius).is_positive() {
        let edge = b - a;
        let t = (center - a).dot(edge);
        if t.is_negative() {
            return circle_vertex_overlap(a, center, radius);
        }
        if t > edge.length_squared() {
            return circle_vertex_overlap(b, center, radius);
        }
    }

    let point = center - axis.normal * (radius + max.half());
    Some((axis.normal, max, point))
}

fn circle_vertex_overlap(
    vertex: Vec2Fix,
    center: Vec2Fix,
    radius: Fix128,
) -> Option<(Vec2Fix, Fix128, Vec2Fix)> {
    let delta = center - vertex;
    let dist_sq = delta.length_squared();
    if dist_sq > radius * radius {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist.is_zero() {
        Vec2Fix::UNIT_Y
    } else {
        delta / dist
    };
    let penetration = dist - radius;
    Some((normal, penetration, vertex + normal * penetration.half()))
}

impl ShapeGeometry for Polygon {
    fn shape_type(&self) -> ShapeType {
        ShapeType::Polygon
    }

    fn local_aabb(&self) -> Aabb {
        Aabb::from_points(&self.body_vertices).unwrap_or_default()
    }

    fn compute_mass(&self, density: Fix128) -> MassData {
        let n = self.body_vertices.len();
        let mut twice_area = Fix128::ZERO;
        let mut inertia_sum = Fix128::ZERO;
        let mut centroid_sum = Vec2Fix::ZERO;
        for i in 0..n {
            let a = self.body_vertices[i];
            let b = self.body_vertices[(i + 1) % n];
            let cross = a.cross(b);
            twice_area += cross;
            inertia_sum += cross * (a.dot(a) + a.dot(b) + b.dot(b));
            centroid_sum += (a + b) * cross;
        }

        let area = twice_area.half();
        let mass = density * area * AREA_MASS_RATIO;
        // J / A = sum / (6 * sum(cross)); centroid = sum / (3 * sum(cross))
        let per_mass = inertia_sum / (twice_area * Fix128::from_int(6));
        MassData {
            area,
            mass,
            inertia: mass * per_mass,
            centroid: centroid_sum / (twice_area * Fix128::from_int(3)),
        }
    }

    fn query_point(&self, body_point: Vec2Fix) -> bool {
        self.body_axes
            .iter()
            .all(|axis| axis.distance(body_point) <= Fix128::ZERO)
    }

    fn query_circle(&self, body_origin: Vec2Fix, radius: Fix128) -> bool {
        polygon_circle_overlap(&self.body_vertices, &self.body_axes, body_origin, radius).is_some()
    }

    fn ray_cast(&self, body_ray: &RayCast) -> Option<ShapeHit> {
        // Clip the ray against every edge half-plane.
        let mut lower = Fix128::ZERO;
        let mut upper = body_ray.distance;
        let mut entry: Option<usize> = None;

        for (i, axis) in self.body_axes.iter().enumerate() {
            let numerator = axis.width - axis.normal.dot(body_ray.origin);
            let denominator = axis.normal.dot(body_ray.direction);
            if denominator.is_zero() {
                if numerator.is_negative() {
                    return None;
                }
                continue;
            }
            let t = numerator / denominator;
            if denominator.is_negative() {
                if t > lower {
                    lower = t;
                    entry = Some(i);
                }
            } else if t < upper {
                upper = t;
            }
            if upper < lower {
                return None;
            }
        }

        match entry {
            Some(i) => Some(ShapeHit::surface(lower, self.body_axes[i].normal)),
            None => Some(ShapeHit::contained()),
        }
    }

    fn circle_cast(&self, body_ray: &RayCast, radius: Fix128) -> Option<ShapeHit> {
        if self.query_circle(body_ray.origin, radius) {
            return Some(ShapeHit::contained());
        }

        let n = self.body_vertices.len();
        let mut best: Option<ShapeHit> = None;
        let mut keep = |hit: Option<ShapeHit>| {
            if let Some(hit) = hit {
                if !hit.contained && best.map_or(true, |b| hit.distance < b.distance) {
                    best = Some(hit);
                }
            }
        };

        for i in 0..n {
            let a = self.body_vertices[i];
            let b = self.body_vertices[(i + 1) % n];
            let offset = self.body_axes[i].normal * radius;
            keep(ray_segment(body_ray, a + offset, b + offset, self.body_axes[i].normal));
            keep(ray_circle(body_ray, a, radius));
        }
        best
    }

    fn on_body_pose_changed(&mut self, position: Vec2Fix, facing: Vec2Fix) -> Aabb {
        for (world, body) in self.world_vertices.iter_mut().zip(&self.body_vertices) {
            *world = position + body.rotate_by(facing);
        }
        for (world, (body, vertex)) in self
            .world_axes
            .iter_mut()
            .zip(self.body_axes.iter().zip(&self.world_vertices))
        {
            let normal = body.normal.rotate_by(facing);
            *world = Axis::new(normal, normal.dot(*vertex));
        }
        Aabb::from_points(&self.world_vertices).unwrap_or_default()
    }
}

// ============================================================================
// Shape
// ============================================================================

/// Coordinate space a shape was described in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeSpace {
    /// Coordinates are relative to the body origin and facing
    Body,
    /// Coordinates are world positions, converted on attachment
    World,
}

/// Concrete geometry of a [`Shape`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    /// Circle
    Circle(Circle),
    /// Convex polygon
    Polygon(Polygon),
}

/// A shape attached (or about to be attached) to a body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shape {
    kind: ShapeKind,
    material: ShapeMaterial,
    space: ShapeSpace,
    mass: MassData,
    aabb: Aabb,
}

impl Shape {
    /// Circle shape.
    pub fn circle(
        origin: Vec2Fix,
        radius: Fix128,
        space: ShapeSpace,
        material: ShapeMaterial,
    ) -> Result<Self, PhysicsError> {
        Ok(Self::from_kind(
            ShapeKind::Circle(Circle::new(origin, radius)?),
            space,
            material,
        ))
    }

    /// Convex polygon shape.
    pub fn polygon(
        vertices: &[Vec2Fix],
        space: ShapeSpace,
        material: ShapeMaterial,
    ) -> Result<Self, PhysicsError> {
        Ok(Self::from_kind(
            ShapeKind::Polygon(Polygon::new(vertices)?),
            space,
            material,
        ))
    }

    pub(crate) fn from_kind(kind: ShapeKind, space: ShapeSpace, material: ShapeMaterial) -> Self {
        Self {
            kind,
            material,
            space,
            mass: MassData::default(),
            aabb: Aabb::default(),
        }
    }

    /// Bind to a body at its initial pose: convert world-space geometry to
    /// body space, compute mass, and build the world cache.
    pub(crate) fn attach(&mut self, position: Vec2Fix, facing: Vec2Fix) -> Result<(), PhysicsError> {
        if self.space == ShapeSpace::World {
            match &mut self.kind {
                ShapeKind::Circle(c) => c.to_body_space(position, facing),
                ShapeKind::Polygon(p) => p.to_body_space(position, facing)?,
            }
            self.space = ShapeSpace::Body;
        }
        self.mass = self.compute_mass(self.material.density);
        self.aabb = self.on_body_pose_changed(position, facing);
        Ok(())
    }

    /// Refresh world geometry and bounds for a new body pose.
    pub(crate) fn update_pose(&mut self, position: Vec2Fix, facing: Vec2Fix) {
        self.aabb = self.on_body_pose_changed(position, facing);
    }

    /// Concrete geometry
    #[inline]
    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    /// Surface material
    #[inline]
    pub fn material(&self) -> ShapeMaterial {
        self.material
    }

    /// Mass properties as of attachment
    #[inline]
    pub fn mass_data(&self) -> MassData {
        self.mass
    }

    /// World-space bounds as of the last pose update
    #[inline]
    pub fn aabb(&self) -> Aabb {
        self.aabb
    }

    /// Renderer-facing copy of the world geometry.
    pub fn snapshot(&self) -> ShapeSnapshot {
        match &self.kind {
            ShapeKind::Circle(c) => ShapeSnapshot::Circle {
                center: c.world_origin,
                radius: c.radius,
            },
            ShapeKind::Polygon(p) => ShapeSnapshot::Polygon {
                vertices: p.world_vertices.clone(),
            },
        }
    }
}

impl ShapeGeometry for Shape {
    fn shape_type(&self) -> ShapeType {
        match &self.kind {
            ShapeKind::Circle(c) => c.shape_type(),
            ShapeKind::Polygon(p) => p.shape_type(),
        }
    }

    fn local_aabb(&self) -> Aabb {
        match &self.kind {
            ShapeKind::Circle(c) => c.local_aabb(),
            ShapeKind::Polygon(p) => p.local_aabb(),
        }
    }

    fn compute_mass(&self, density: Fix128) -> MassData {
        match &self.kind {
            ShapeKind::Circle(c) => c.compute_mass(density),
            ShapeKind::Polygon(p) => p.compute_mass(density),
        }
    }

    fn query_point(&self, body_point: Vec2Fix) -> bool {
        match &self.kind {
            ShapeKind::Circle(c) => c.query_point(body_point),
            ShapeKind::Polygon(p) => p.query_point(body_point),
        }
    }

    fn query_circle(&self, body_origin: Vec2Fix, radius: Fix128) -> bool {
        match &self.kind {
            ShapeKind::Circle(c) => c.query_circle(body_origin, radius),
            ShapeKind::Polygon(p) => p.query_circle(body_origin, radius),
        }
    }

    fn ray_cast(&self, body_ray: &RayCast) -> Option<ShapeHit> {
        match &self.kind {
            ShapeKind::Circle(c) => c.ray_cast(body_ray),
            ShapeKind::Polygon(p) => p.ray_cast(body_ray),
        }
    }

    fn circle_cast(&self, body_ray: &RayCast, radius: Fix128) -> Option<ShapeHit> {
        match &self.kind {
            ShapeKind::Circle(c) => c.circle_cast(body_ray, radius),
            ShapeKind::Polygon(p) => p.circle_cast(body_ray, radius),
        }
    }

    fn on_body_pose_changed(&mut self, position: Vec2Fix, facing: Vec2Fix) -> Aabb {
        match &mut self.kind {
            ShapeKind::Circle(c) => c.on_body_pose_changed(position, facing),
            ShapeKind::Polygon(p) => p.on_body_pose_changed(position, facing),
        }
    }
}

/// World-space geometry for external renderers.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShapeSnapshot {
    /// Circle
    Circle {
        /// World-space center
        center: Vec2Fix,
        /// Radius
        radius: Fix128,
    },
    /// Polygon
    Polygon {
        /// World-space vertices, counter-clockwise
        vertices: Vec<Vec2Fix>,
    },
}

// ============================================================================
// ShapePool
// ============================================================================

/// Per-kind recycle bins for shapes freed by destroyed bodies.
///
/// Circles own no heap memory, so only a count is kept for them. Polygon
/// vertex and axis buffers are cleared and handed back out by the polygon
/// factories.
#[derive(Debug, Default)]
pub struct ShapePool {
    polygons: Vec<Polygon>,
    circles_released: usize,
    polygons_released: usize,
}

impl ShapePool {
    /// Empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cleared polygon buffer, recycled when available.
    pub(crate) fn take_polygon(&mut self) -> Polygon {
        self.polygons.pop().unwrap_or_default()
    }

    /// Hand back a buffer from [`ShapePool::take_polygon`] that was never
    /// attached to a shape.
    pub(crate) fn restore_polygon(&mut self, mut polygon: Polygon) {
        polygon.clear();
        self.polygons.push(polygon);
    }

    /// Return a shape's storage to its kind's bin.
    pub(crate) fn release(&mut self, shape: Shape) {
        match shape.kind {
            ShapeKind::Circle(_) => self.circles_released += 1,
            ShapeKind::Polygon(mut p) => {
                p.clear();
                self.polygons.push(p);
                self.polygons_released += 1;
            }
        }
    }

    /// Polygon buffers waiting for reuse
    #[inline]
    pub fn spare_polygons(&self) -> usize {
        self.polygons.len()
    }

    /// Total shapes released, across kinds
    #[inline]
    pub fn released_count(&self) -> usize {
        self.circles_released + self.polygons_released
    }
}

// ============================================================================
// Tests
// ============================================================================
