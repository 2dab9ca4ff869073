//! Rigid Bodies
//!
//! The mutable simulation entity: pose, velocity, accumulated forces, mass
//! properties, CCD settings, attached shapes, and an optional rollback
//! history buffer.
//!
//! # Lifecycle
//!
//! A body leaves its pool in the [`BodyType::Invalid`] state and is turned
//! into a static or dynamic body exactly once. Removing it from the world
//! vacates it (dynamics cleared, geometry and mass kept); destroying it frees
//! its shapes and recycles the slot.
//!
//! # Deferred mutation
//!
//! Forces, torques and velocities set between ticks are only consumed by the
//! next integration step.
//!
//! Author: Moroya Sakamoto

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::aabb::Aabb;
use crate::config::{
    CCD_ANGULAR_SLOP, CCD_LINEAR_SLOP, CCD_VELOCITY_THRESHOLD, MINIMUM_DYNAMIC_MASS,
};
use crate::error::PhysicsError;
use crate::history::{HistoryBuffer, HistoryLookup, HistoryRecord};
use crate::math::{Fix128, Vec2Fix};
use crate::pool::Poolable;
use crate::raycast::{RayCast, RayResult};
use crate::shape::{Shape, ShapeGeometry};

slotmap::new_key_type! {
    /// Generational handle to a body in a [`World`](crate::world::World).
    pub struct BodyHandle;
}

// ============================================================================
// Body Type / Filter
// ============================================================================

/// Body kind. Set once at initialization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BodyType {
    /// Freshly allocated, not yet initialized
    #[default]
    Invalid,
    /// Immovable; infinite mass
    Static,
    /// Moved by forces and contacts
    Dynamic,
}

/// Per-body collision filter, consulted in both directions for every pair.
#[derive(Clone, Copy, Debug, Default)]
pub enum CollisionFilter {
    /// Collide with everything
    #[default]
    None,
    /// Ignore all dynamic bodies
    DisallowDynamic,
    /// Ignore one specific body
    Exclude(BodyHandle),
    /// Custom predicate `(self, other) -> collide?`
    Custom(fn(&Body, &Body) -> bool),
}

impl CollisionFilter {
    /// Whether `this` accepts a pair with `other`.
    #[inline]
    pub fn accepts(&self, this: &Body, other: &Body) -> bool {
        match self {
            Self::None => true,
            Self::DisallowDynamic => !other.is_dynamic(),
            Self::Exclude(handle) => other.handle != *handle,
            Self::Custom(predicate) => predicate(this, other),
        }
    }
}

// ============================================================================
// Sweep Result
// ============================================================================

/// Outcome of [`Body::sweep_test`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepResult {
    /// Fraction of this tick's motion before impact, in [0, 1]. `1` means no
    /// impact.
    pub time_of_impact: Fix128,
    /// Body position at impact (present when `time_of_impact < 1`)
    pub contact_point: Option<Vec2Fix>,
    /// Unit vector from the impact point toward the other body's position.
    /// `None` when there is no impact or the two points coincide.
    pub contact_normal: Option<Vec2Fix>,
}

impl SweepResult {
    /// No impact this tick.
    pub const MISS: Self = Self {
        time_of_impact: Fix128::ONE,
        contact_point: None,
        contact_normal: None,
    };

    /// An impact happened before the end of the tick.
    #[inline]
    pub fn is_hit(&self) -> bool {
        self.time_of_impact < Fix128::ONE
    }
}

// ============================================================================
// Body
// ============================================================================

/// A rigid body.
#[derive(Debug)]
pub struct Body {
    pub(crate) handle: BodyHandle,
    body_type: BodyType,

    position: Vec2Fix,
    angle: Fix128,
    facing: Vec2Fix,

    linear_velocity: Vec2Fix,
    angular_velocity: Fix128,
    force: Vec2Fix,
    torque: Fix128,
    bias_velocity: Vec2Fix,
    bias_rotation: Fix128,

    mass: Fix128,
    inertia: Fix128,
    inv_mass: Fix128,
    inv_inertia: Fix128,

    ccd_enabled: bool,
    ccd_velocity_threshold: Fix128,
    previous_position: Vec2Fix,
    previous_angle: Fix128,

    shapes: Vec<Shape>,
    aabb: Aabb,
    history: Option<HistoryBuffer>,

    collision_filter: CollisionFilter,
    user_data: u64,

    pub(crate) in_world: bool,
    pub(crate) list_index: usize,
    pub(crate) proxy: Option<usize>,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            handle: BodyHandle::default(),
            body_type: BodyType::Invalid,
            position: Vec2Fix::ZERO,
            angle: Fix128::ZERO,
            facing: Vec2Fix::UNIT_X,
            linear_velocity: Vec2Fix::ZERO,
            angular_velocity: Fix128::ZERO,
            force: Vec2Fix::ZERO,
            torque: Fix128::ZERO,
            bias_velocity: Vec2Fix::ZERO,
            bias_rotation: Fix128::ZERO,
            mass: Fix128::ZERO,
            inertia: Fix128::ZERO,
            inv_mass: Fix128::ZERO,
            inv_inertia: Fix128::ZERO,
            ccd_enabled: false,
            ccd_velocity_threshold: CCD_VELOCITY_THRESHOLD,
            previous_position: Vec2Fix::ZERO,
            previous_angle: Fix128::ZERO,
            shapes: Vec::new(),
            aabb: Aabb::default(),
            history: None,
            collision_filter: CollisionFilter::None,
            user_data: 0,
            in_world: false,
            list_index: 0,
            proxy: None,
        }
    }
}

impl Poolable for Body {
    /// Full reset for pooling. Shapes must already have been taken.
    fn reset(&mut self) {
        debug_assert!(self.shapes.is_empty(), "free shapes before resetting a body");
        let shapes = core::mem::take(&mut self.shapes);
        *self = Self {
            shapes,
            ..Self::default()
        };
    }
}

impl Body {
    // ========================================================================
    // Accessors
    // ========================================================================

    /// This body's handle
    #[inline]
    pub fn handle(&self) -> BodyHandle {
        self.handle
    }

    /// Kind
    #[inline]
    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// Static body
    #[inline]
    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    /// Dynamic body
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    /// Currently simulated by its world
    #[inline]
    pub fn is_in_world(&self) -> bool {
        self.in_world
    }

    /// Origin position
    #[inline]
    pub fn position(&self) -> Vec2Fix {
        self.position
    }

    /// Angle in radians
    #[inline]
    pub fn angle(&self) -> Fix128 {
        self.angle
    }

    /// Unit facing `(cos θ, sin θ)`
    #[inline]
    pub fn facing(&self) -> Vec2Fix {
        self.facing
    }

    /// Linear velocity
    #[inline]
    pub fn linear_velocity(&self) -> Vec2Fix {
        self.linear_velocity
    }

    /// Angular velocity
    #[inline]
    pub fn angular_velocity(&self) -> Fix128 {
        self.angular_velocity
    }

    /// Force accumulated for the next tick
    #[inline]
    pub fn force(&self) -> Vec2Fix {
        self.force
    }

    /// Torque accumulated for the next tick
    #[inline]
    pub fn torque(&self) -> Fix128 {
        self.torque
    }

    /// Positional-correction velocity from the last solve
    #[inline]
    pub fn bias_velocity(&self) -> Vec2Fix {
        self.bias_velocity
    }

    /// Positional-correction rotation from the last solve
    #[inline]
    pub fn bias_rotation(&self) -> Fix128 {
        self.bias_rotation
    }

    /// Mass (zero for static bodies)
    #[inline]
    pub fn mass(&self) -> Fix128 {
        self.mass
    }

    /// Moment of inertia (zero for static bodies)
    #[inline]
    pub fn inertia(&self) -> Fix128 {
        self.inertia
    }

    /// Inverse mass (zero for static bodies)
    #[inline]
    pub fn inv_mass(&self) -> Fix128 {
        self.inv_mass
    }

    /// Inverse inertia (zero for static bodies)
    #[inline]
    pub fn inv_inertia(&self) -> Fix128 {
        self.inv_inertia
    }

    /// Union of the shape bounds
    #[inline]
    pub fn aabb(&self) -> Aabb {
        self.aabb
    }

    /// Attached shapes
    #[inline]
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// CCD enabled
    #[inline]
    pub fn ccd_enabled(&self) -> bool {
        self.ccd_enabled
    }

    /// Linear speed at which CCD engages
    #[inline]
    pub fn ccd_velocity_threshold(&self) -> Fix128 {
        self.ccd_velocity_threshold
    }

    /// Position before the last integration
    #[inline]
    pub fn previous_position(&self) -> Vec2Fix {
        self.previous_position
    }

    /// Angle before the last integration
    #[inline]
    pub fn previous_angle(&self) -> Fix128 {
        self.previous_angle
    }

    /// Rollback history, if this body keeps one
    #[inline]
    pub fn history(&self) -> Option<&HistoryBuffer> {
        self.history.as_ref()
    }

    /// Collision filter
    #[inline]
    pub fn collision_filter(&self) -> CollisionFilter {
        self.collision_filter
    }

    /// Opaque application payload
    #[inline]
    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    /// Pose and bounds as a record.
    #[inline]
    pub fn current_state(&self) -> HistoryRecord {
        HistoryRecord {
            aabb: self.aabb,
            position: self.position,
            facing: self.facing,
        }
    }

    // ========================================================================
    // Deferred mutators
    // ========================================================================

    /// Accumulate a force through the center.
    pub fn add_force(&mut self, force: Vec2Fix) {
        self.force += force;
    }

    /// Accumulate a force applied at a world point.
    pub fn add_force_at(&mut self, force: Vec2Fix, point: Vec2Fix) {
        self.force += force;
        self.torque += (self.position - point).cross(force);
    }

    /// Accumulate torque. Positive torque turns clockwise, matching the
    /// sign of [`Body::add_force_at`].
    pub fn add_torque(&mut self, torque: Fix128) {
        self.torque += torque;
    }

    /// Overwrite the pending accumulators consumed by the next integration.
    ///
    /// Rollback resimulation uses this to restore a body's force, torque and
    /// positional-correction terms exactly as they were saved.
    pub fn set_force(
        &mut self,
        force: Vec2Fix,
        torque: Fix128,
        bias_velocity: Vec2Fix,
        bias_rotation: Fix128,
    ) {
        self.force = force;
        self.torque = torque;
        self.bias_velocity = bias_velocity;
        self.bias_rotation = bias_rotation;
    }

    /// Replace the linear velocity.
    pub fn set_linear_velocity(&mut self, velocity: Vec2Fix) {
        self.linear_velocity = velocity;
    }

    /// Replace the angular velocity.
    pub fn set_angular_velocity(&mut self, velocity: Fix128) {
        self.angular_velocity = velocity;
    }

    /// Replace the application payload.
    pub fn set_user_data(&mut self, user_data: u64) {
        self.user_data = user_data;
    }

    /// Replace the collision filter.
    pub fn set_collision_filter(&mut self, filter: CollisionFilter) {
        self.collision_filter = filter;
    }

    // ========================================================================
    // Initialization
    // ========================================================================

    /// Turn an invalid body into a dynamic one.
    pub(crate) fn initialize_dynamic(
        &mut self,
        position: Vec2Fix,
        angle: Fix128,
        shapes: &mut Vec<Shape>,
    ) -> Result<(), PhysicsError> {
        self.initialize(position, angle, shapes)?;
        if let Err(e) = self.compute_dynamics() {
            shapes.append(&mut self.shapes);
            return Err(e);
        }
        self.body_type = BodyType::Dynamic;
        Ok(())
    }

    /// Turn an invalid body into a static one.
    pub(crate) fn initialize_static(
        &mut self,
        position: Vec2Fix,
        angle: Fix128,
        shapes: &mut Vec<Shape>,
    ) -> Result<(), PhysicsError> {
        self.initialize(position, angle, shapes)?;
        self.mass = Fix128::ZERO;
        self.inertia = Fix128::ZERO;
        self.inv_mass = Fix128::ZERO;
        self.inv_inertia = Fix128::ZERO;
        self.body_type = BodyType::Static;
        Ok(())
    }

    /// Shared setup. On failure the shapes are handed back in `shapes`.
    fn initialize(
        &mut self,
        position: Vec2Fix,
        angle: Fix128,
        shapes: &mut Vec<Shape>,
    ) -> Result<(), PhysicsError> {
        if self.body_type != BodyType::Invalid {
            return Err(PhysicsError::AlreadyInitialized);
        }
        if shapes.is_empty() {
            return Err(PhysicsError::EmptyShapeList);
        }

        self.position = position;
        self.angle = angle;
        self.facing = Vec2Fix::polar(angle);
        self.ccd_enabled = false;
        self.ccd_velocity_threshold = CCD_VELOCITY_THRESHOLD;
        self.previous_position = position;
        self.previous_angle = angle;

        self.shapes.clear();
        self.shapes.append(shapes);
        for i in 0..self.shapes.len() {
            if let Err(e) = self.shapes[i].attach(position, self.facing) {
                shapes.append(&mut self.shapes);
                return Err(e);
            }
        }
        self.update_aabb();
        Ok(())
    }

    fn compute_dynamics(&mut self) -> Result<(), PhysicsError> {
        let mut mass = Fix128::ZERO;
        let mut inertia = Fix128::ZERO;
        for shape in self.shapes.iter() {
            if shape.material().density.is_zero() {
                continue;
            }
            let data = shape.mass_data();
            mass += data.mass;
            inertia += data.inertia;
        }

        if mass < MINIMUM_DYNAMIC_MASS {
            return Err(PhysicsError::MassTooSmall);
        }
        if !inertia.is_positive() {
            return Err(PhysicsError::ZeroInertia);
        }

        self.mass = mass;
        self.inertia = inertia;
        self.inv_mass = Fix128::ONE / mass;
        self.inv_inertia = Fix128::ONE / inertia;
        Ok(())
    }

    // ========================================================================
    // Simulation
    // ========================================================================

    /// Advance one tick: record history, remember the pose for CCD,
    /// integrate, and refresh shapes and bounds.
    pub(crate) fn update(&mut self, delta_time: Fix128, damping: Fix128) {
        let state = self.current_state();
        if let Some(history) = self.history.as_mut() {
            history.store(state);
        }

        self.previous_position = self.position;
        self.previous_angle = self.angle;

        self.integrate(delta_time, damping);
        self.on_position_updated();
    }

    /// Half-step symplectic integration with damping applied first.
    fn integrate(&mut self, delta_time: Fix128, damping: Fix128) {
        self.linear_velocity = self.linear_velocity * damping;
        self.angular_velocity *= damping;

        let linear = self.force * self.inv_mass;
        let angular = self.torque * self.inv_inertia;

        self.integrate_forces(linear, angular, delta_time.half());
        self.position += self.linear_velocity * delta_time + self.bias_velocity;
        self.angle += self.angular_velocity * delta_time + self.bias_rotation;
        self.facing = Vec2Fix::polar(self.angle);
        self.integrate_forces(linear, angular, delta_time.half());

        self.force = Vec2Fix::ZERO;
        self.torque = Fix128::ZERO;
        self.bias_velocity = Vec2Fix::ZERO;
        self.bias_rotation = Fix128::ZERO;
    }

    #[inline]
    fn integrate_forces(&mut self, linear: Vec2Fix, angular: Fix128, step: Fix128) {
        self.linear_velocity += linear * step;
        self.angular_velocity -= angular * step;
    }

    /// Velocity impulse `j` applied at offset `r` from the origin.
    #[inline]
    pub(crate) fn apply_impulse(&mut self, j: Vec2Fix, r: Vec2Fix) {
        self.linear_velocity += j * self.inv_mass;
        self.angular_velocity -= self.inv_inertia * j.cross(r);
    }

    /// Positional-correction impulse `j` applied at offset `r`.
    #[inline]
    pub(crate) fn apply_bias(&mut self, j: Vec2Fix, r: Vec2Fix) {
        self.bias_velocity += j * self.inv_mass;
        self.bias_rotation -= self.inv_inertia * j.cross(r);
    }

    /// Teleport. Facing, shapes and bounds are recomputed immediately and
    /// the move is not swept by CCD.
    pub(crate) fn set(&mut self, position: Vec2Fix, angle: Fix128) {
        self.position = position;
        self.angle = angle;
        self.facing = Vec2Fix::polar(angle);
        self.previous_position = position;
        self.previous_angle = angle;
        self.on_position_updated();
    }

    /// Move back along this tick's motion to fraction `toi`.
    pub(crate) fn rewind(&mut self, toi: Fix128) {
        self.position = self.previous_position.lerp(self.position, toi);
        self.angle = self.previous_angle + (self.angle - self.previous_angle) * toi;
        self.facing = Vec2Fix::polar(self.angle);
        self.on_position_updated();
    }

    /// Drop the velocity component moving along `normal`.
    pub(crate) fn cancel_approach(&mut self, normal: Vec2Fix) {
        let approach = self.linear_velocity.dot(normal);
        if approach.is_positive() {
            self.linear_velocity -= normal * approach;
        }
    }

    fn on_position_updated(&mut self) {
        for shape in self.shapes.iter_mut() {
            shape.update_pose(self.position, self.facing);
        }
        self.update_aabb();
    }

    fn update_aabb(&mut self) {
        let mut shapes = self.shapes.iter();
        if let Some(first) = shapes.next() {
            self.aabb = shapes.fold(first.aabb(), |acc, s| acc.merged(&s.aabb()));
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Turn CCD on. Without a threshold the previous one is kept.
    pub(crate) fn enable_ccd(&mut self, threshold: Option<Fix128>) {
        self.ccd_enabled = true;
        if let Some(threshold) = threshold {
            self.ccd_velocity_threshold = threshold;
        }
    }

    pub(crate) fn disable_ccd(&mut self) {
        self.ccd_enabled = false;
    }

    pub(crate) fn attach_history(&mut self, history: HistoryBuffer) {
        self.history = Some(history);
    }

    pub(crate) fn take_history(&mut self) -> Option<HistoryBuffer> {
        self.history.take()
    }

    pub(crate) fn shapes_mut(&mut self) -> &mut Vec<Shape> {
        &mut self.shapes
    }

    /// Partial reset for removal from the world: dynamics and history are
    /// cleared, geometry, mass and pose are kept.
    pub(crate) fn vacate(&mut self) -> Option<HistoryBuffer> {
        self.linear_velocity = Vec2Fix::ZERO;
        self.angular_velocity = Fix128::ZERO;
        self.force = Vec2Fix::ZERO;
        self.torque = Fix128::ZERO;
        self.bias_velocity = Vec2Fix::ZERO;
        self.bias_rotation = Fix128::ZERO;
        self.previous_position = self.position;
        self.previous_angle = self.angle;
        self.in_world = false;
        self.proxy = None;
        self.history.take()
    }

    // ========================================================================
    // Collision
    // ========================================================================

    /// Pair acceptance: never self, never static-static, then the filter.
    pub fn can_collide(&self, other: &Body) -> bool {
        if self.handle == other.handle || (self.is_static() && other.is_static()) {
            return false;
        }
        self.collision_filter.accepts(self, other)
    }

    /// CCD is enabled, the body is dynamic, and it moves fast enough.
    pub fn requires_ccd(&self) -> bool {
        if !self.ccd_enabled || !self.is_dynamic() {
            return false;
        }
        let threshold = self.ccd_velocity_threshold;
        self.linear_velocity.length_squared() >= threshold * threshold
            || self.angular_velocity.abs() >= CCD_ANGULAR_SLOP
    }

    /// Sweep this tick's motion against `other`.
    ///
    /// Only this body's displacement is swept; `other` is treated as
    /// stationary at its current bounds. The slab test starts from this
    /// body's bounds at the start of the tick.
    pub fn sweep_test(&self, other: Option<&Body>) -> SweepResult {
        let Some(other) = other else {
            return SweepResult::MISS;
        };
        if self.is_static() == other.is_static() {
            return SweepResult::MISS;
        }

        let delta = self.position - self.previous_position;
        let start = self.aabb.translated(-delta);
        if !start.swept(delta).intersects(&other.aabb) {
            return SweepResult::MISS;
        }

        let slop_squared = CCD_LINEAR_SLOP * CCD_LINEAR_SLOP;
        let relative = self.linear_velocity - other.linear_velocity;
        if relative.length_squared() < slop_squared || delta.length_squared() < slop_squared {
            return SweepResult::MISS;
        }

        let toi = slab_time_of_impact(&start, delta, &other.aabb);
        if toi >= Fix128::ONE {
            return SweepResult::MISS;
        }

        let contact_point = self.previous_position + delta * toi;
        SweepResult {
            time_of_impact: toi,
            contact_point: Some(contact_point),
            contact_normal: (other.position - contact_point).try_normalize(),
        }
    }

    // ========================================================================
    // Queries (lag compensated)
    // ========================================================================

    /// State `ticks_behind` ticks ago. `0` is the live state; without a
    /// history buffer the live state comes back as `Clamped`.
    pub fn try_get_space(&self, ticks_behind: usize) -> HistoryLookup {
        if ticks_behind == 0 {
            return HistoryLookup::Exact(self.current_state());
        }
        match self.history.as_ref().and_then(|h| h.try_get(ticks_behind - 1)) {
            Some(lookup) => lookup,
            None => HistoryLookup::Clamped(self.current_state()),
        }
    }

    /// Bounds-only overlap test.
    pub fn query_aabb_only(&self, bounds: &Aabb, ticks_behind: usize) -> bool {
        self.try_get_space(ticks_behind).record().aabb.intersects(bounds)
    }

    /// Point containment.
    pub fn query_point(&self, point: Vec2Fix, ticks_behind: usize) -> bool {
        let record = self.try_get_space(ticks_behind).record();
        if !record.aabb.query_point(point) {
            return false;
        }
        let local = record.world_to_body_point(point);
        self.shapes.iter().any(|s| s.query_point(local))
    }

    /// Circle overlap.
    pub fn query_circle(&self, origin: Vec2Fix, radius: Fix128, ticks_behind: usize) -> bool {
        let record = self.try_get_space(ticks_behind).record();
        if !record.aabb.query_circle_approx(origin, radius) {
            return false;
        }
        let local = record.world_to_body_point(origin);
        self.shapes.iter().any(|s| s.query_circle(local, radius))
    }

    /// Ray cast. Updates `result` when a closer hit is found.
    pub fn ray_cast(&self, ray: &RayCast, result: &mut RayResult, ticks_behind: usize) -> bool {
        let record = self.try_get_space(ticks_behind).record();
        if !record.aabb.ray_cast(ray) {
            return false;
        }
        let local = record.world_to_body_ray(ray);
        self.cast_shapes(&record, result, |s| s.ray_cast(&local))
    }

    /// Circle cast. Updates `result` when a closer hit is found.
    pub fn circle_cast(
        &self,
        ray: &RayCast,
        radius: Fix128,
        result: &mut RayResult,
        ticks_behind: usize,
    ) -> bool {
        let record = self.try_get_space(ticks_behind).record();
        if !record.aabb.circle_cast_approx(ray, radius) {
            return false;
        }
        let local = record.world_to_body_ray(ray);
        self.cast_shapes(&record, result, |s| s.circle_cast(&local, radius))
    }

    fn cast_shapes<F>(&self, record: &HistoryRecord, result: &mut RayResult, cast: F) -> bool
    where
        F: Fn(&Shape) -> Option<crate::raycast::ShapeHit>,
    {
        for (i, shape) in self.shapes.iter().enumerate() {
            let Some(hit) = cast(shape) else {
                continue;
            };
            if result.offer(hit, self.handle, i) {
                if hit.contained {
                    return true;
                }
                result.normal = record.body_to_world_direction(hit.normal);
            }
        }
        result.body == Some(self.handle)
    }
}

/// Fractional time at which `moving`, displaced by `delta`, first overlaps
/// `target`. Returns `1` when they do not meet within the tick.
pub fn slab_time_of_impact(moving: &Aabb, delta: Vec2Fix, target: &Aabb) -> Fix128 {
    let axes = [
        (delta.x, moving.left(), moving.right(), target.left(), target.right()),
        (delta.y, moving.bottom(), moving.top(), target.bottom(), target.top()),
    ];

    let mut t_min = Fix128::MIN;
    let mut t_max = Fix128::MAX;
    for (d, lo, hi, target_lo, target_hi) in axes {
        if d.is_zero() {
            if hi < target_lo || lo > target_hi {
                return Fix128::ONE;
            }
            continue;
        }
        let (enter, exit) = if d.is_positive() {
            ((target_lo - hi) / d, (target_hi - lo) / d)
        } else {
            ((target_hi - lo) / d, (target_lo - hi) / d)
        };
        t_min = t_min.max(enter);
        t_max = t_max.min(exit);
    }

    if t_min > t_max || t_max.is_negative() || t_min > Fix128::ONE {
        return Fix128::ONE;
    }
    t_min.max(Fix128::ZERO)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::material::ShapeMaterial;
    use crate::shape::ShapeSpace;

    fn circle(radius: Fix128) -> Shape {
        Shape::circle(Vec2Fix::ZERO, radius, ShapeSpace::Body, ShapeMaterial::default()).unwrap()
    }

    fn dynamic_at(x: i64, radius: Fix128) -> Body {
        let mut body = Body::default();
        let mut shapes = vec![circle(radius)];
        body.initialize_dynamic(Vec2Fix::from_int(x, 0), Fix128::ZERO, &mut shapes)
            .unwrap();
        body
    }

    fn static_at(x: i64, radius: Fix128) -> Body {
        let mut body = Body::default();
        let mut shapes = vec![circle(radius)];
        body.initialize_static(Vec2Fix::from_int(x, 0), Fix128::ZERO, &mut shapes)
            .unwrap();
        body
    }

    #[test]
    fn test_initialize_dynamic_mass() {
        let body = dynamic_at(0, Fix128::ONE);
        assert!(body.is_dynamic());
        assert!(body.inv_mass().is_positive());
        assert!(body.inv_inertia().is_positive());
        assert_eq!(body.shapes().len(), 1);
    }

    #[test]
    fn test_initialize_static_has_infinite_mass() {
        let body = static_at(0, Fix128::ONE);
        assert!(body.is_static());
        assert!(body.inv_mass().is_zero());
        assert!(body.inv_inertia().is_zero());
    }

    #[test]
    fn test_initialize_twice_fails() {
        let mut body = dynamic_at(0, Fix128::ONE);
        let mut shapes = vec![circle(Fix128::ONE)];
        assert_eq!(
            body.initialize_static(Vec2Fix::ZERO, Fix128::ZERO, &mut shapes),
            Err(PhysicsError::AlreadyInitialized)
        );
        assert_eq!(shapes.len(), 1);
    }

    #[test]
    fn test_mass_too_small_returns_shapes() {
        let mut body = Body::default();
        let tiny = Shape::circle(
            Vec2Fix::ZERO,
            Fix128::from_ratio(1, 1000),
            ShapeSpace::Body,
            ShapeMaterial::default(),
        )
        .unwrap();
        let mut shapes = vec![tiny];
        assert_eq!(
            body.initialize_dynamic(Vec2Fix::ZERO, Fix128::ZERO, &mut shapes),
            Err(PhysicsError::MassTooSmall)
        );
        assert_eq!(shapes.len(), 1);
        assert!(body.shapes().is_empty());
    }

    #[test]
    fn test_empty_shapes_rejected() {
        let mut body = Body::default();
        let mut shapes = Vec::new();
        assert_eq!(
            body.initialize_dynamic(Vec2Fix::ZERO, Fix128::ZERO, &mut shapes),
            Err(PhysicsError::EmptyShapeList)
        );
    }

    #[test]
    fn test_forces_are_deferred() {
        let mut body = dynamic_at(0, Fix128::ONE);
        body.add_force(Vec2Fix::from_int(10, 0));
        assert_eq!(body.linear_velocity(), Vec2Fix::ZERO);
        assert_eq!(body.position(), Vec2Fix::ZERO);

        body.update(Fix128::from_ratio(1, 50), Fix128::ONE);
        assert!(body.linear_velocity().x.is_positive());
        assert!(body.position().x.is_positive());
        assert_eq!(body.force(), Vec2Fix::ZERO);
    }

    #[test]
    fn test_force_at_point_adds_torque() {
        let mut body = dynamic_at(0, Fix128::ONE);
        body.add_force_at(Vec2Fix::from_int(0, 1), Vec2Fix::from_int(1, 0));
        // cross(position - point, force) = cross((-1, 0), (0, 1)) = -1
        assert_eq!(body.torque(), Fix128::NEG_ONE);
        body.update(Fix128::from_ratio(1, 50), Fix128::ONE);
        // A push upward on the right side turns counter-clockwise
        assert!(body.angular_velocity().is_positive());
    }

    #[test]
    fn test_damping_scales_velocity() {
        let mut body = dynamic_at(0, Fix128::ONE);
        body.set_linear_velocity(Vec2Fix::from_int(10, 0));
        body.update(Fix128::from_ratio(1, 50), Fix128::HALF);
        assert_eq!(body.linear_velocity(), Vec2Fix::from_int(5, 0));
        assert!((body.position().x.to_f64() - 0.1).abs() < 1e-12);
        assert_eq!(body.previous_position(), Vec2Fix::ZERO);
    }

    #[test]
    fn test_set_updates_bounds() {
        let mut body = static_at(0, Fix128::ONE);
        body.set(Vec2Fix::from_int(7, 3), Fix128::ZERO);
        assert_eq!(body.aabb().center(), Vec2Fix::from_int(7, 3));
        assert_eq!(body.previous_position(), Vec2Fix::from_int(7, 3));
    }

    #[test]
    fn test_requires_ccd_threshold() {
        let mut body = dynamic_at(0, Fix128::ONE);
        body.enable_ccd(Some(Fix128::from_int(2)));
        body.set_linear_velocity(Vec2Fix::new(Fix128::from_ratio(199, 100), Fix128::ZERO));
        assert!(!body.requires_ccd());
        body.set_linear_velocity(Vec2Fix::from_int(2, 0));
        assert!(body.requires_ccd());
        body.disable_ccd();
        assert!(!body.requires_ccd());
    }

    #[test]
    fn test_requires_ccd_angular() {
        let mut body = dynamic_at(0, Fix128::ONE);
        body.enable_ccd(Some(Fix128::from_int(100)));
        body.set_angular_velocity(Fix128::ONE);
        assert!(body.requires_ccd());
    }

    #[test]
    fn test_sweep_test_guards() {
        let a = dynamic_at(0, Fix128::ONE);
        let b = dynamic_at(5, Fix128::ONE);
        assert_eq!(a.sweep_test(None), SweepResult::MISS);
        assert_eq!(a.sweep_test(Some(&b)), SweepResult::MISS);
    }

    #[test]
    fn test_sweep_test_hits_thin_wall() {
        let wall = static_at(0, Fix128::from_ratio(1, 5));
        let mut bullet = Body::default();
        let mut shapes = vec![circle(Fix128::from_ratio(1, 10))];
        bullet
            .initialize_dynamic(Vec2Fix::from_int(-1, 0), Fix128::ZERO, &mut shapes)
            .unwrap();
        bullet.set_linear_velocity(Vec2Fix::from_int(2, 0));
        bullet.update(Fix128::ONE, Fix128::ONE);
        assert_eq!(bullet.position(), Vec2Fix::from_int(1, 0));

        let sweep = bullet.sweep_test(Some(&wall));
        assert!(sweep.is_hit());
        // Leading edge -0.9 meets the wall face -0.2 after 0.7 of the 2-unit move
        assert!((sweep.time_of_impact.to_f64() - 0.35).abs() < 1e-12);
        let normal = sweep.contact_normal.unwrap();
        assert!((normal.x.to_f64() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_sweep_test_slow_bullet_hits() {
        // Moves 0.06 per tick: above the linear slop, under its old unsquared value
        let radius = Fix128::from_ratio(1, 100);
        let mut wall = Body::default();
        wall.initialize_static(Vec2Fix::ZERO, Fix128::ZERO, &mut vec![circle(radius)])
            .unwrap();

        let dense = ShapeMaterial::with_density(Fix128::from_int(1000));
        let mut shapes =
            vec![Shape::circle(Vec2Fix::ZERO, radius, ShapeSpace::Body, dense).unwrap()];
        let mut bullet = Body::default();
        bullet
            .initialize_dynamic(
                Vec2Fix::new(Fix128::from_ratio(-35, 1000), Fix128::ZERO),
                Fix128::ZERO,
                &mut shapes,
            )
            .unwrap();
        bullet.enable_ccd(Some(Fix128::ONE));
        bullet.set_linear_velocity(Vec2Fix::from_int(3, 0));
        assert!(bullet.requires_ccd());
        bullet.update(Fix128::from_ratio(1, 50), Fix128::ONE);
        // Fully past the wall after the discrete step
        assert!(bullet.aabb().left() > wall.aabb().right());

        let sweep = bullet.sweep_test(Some(&wall));
        assert!(sweep.is_hit());
        // Leading edge -0.025 meets the wall face -0.01 after 0.015 of 0.06
        assert!((sweep.time_of_impact.to_f64() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_slab_toi_ignores_tiny_drift() {
        let moving = Aabb::from_circle(Vec2Fix::from_int(-5, 0), Fix128::ONE);
        let target = Aabb::from_circle(Vec2Fix::ZERO, Fix128::from_ratio(3, 5));
        let straight = slab_time_of_impact(&moving, Vec2Fix::from_int(10, 0), &target);
        assert!((straight.to_f64() - 0.34).abs() < 1e-12);

        let drift = Fix128::from_raw(0, 1);
        let up = slab_time_of_impact(&moving, Vec2Fix::new(Fix128::from_int(10), drift), &target);
        let down =
            slab_time_of_impact(&moving, Vec2Fix::new(Fix128::from_int(10), -drift), &target);
        assert_eq!(up, straight);
        assert_eq!(down, straight);
    }

    #[test]
    fn test_set_force_restores_accumulators() {
        let mut body = dynamic_at(0, Fix128::ONE);
        let force = Vec2Fix::from_int(4, -2);
        let bias = Vec2Fix::new(Fix128::from_ratio(1, 4), Fix128::ZERO);
        body.set_force(force, Fix128::HALF, bias, Fix128::from_ratio(1, 8));
        assert_eq!(body.force(), force);
        assert_eq!(body.torque(), Fix128::HALF);
        assert_eq!(body.bias_velocity(), bias);
        assert_eq!(body.bias_rotation(), Fix128::from_ratio(1, 8));

        let mut replay = dynamic_at(0, Fix128::ONE);
        replay.add_force(Vec2Fix::from_int(99, 99));
        replay.set_force(force, Fix128::HALF, bias, Fix128::from_ratio(1, 8));

        body.update(Fix128::from_ratio(1, 50), Fix128::ONE);
        replay.update(Fix128::from_ratio(1, 50), Fix128::ONE);
        assert_eq!(body.position(), replay.position());
        assert_eq!(body.angle(), replay.angle());
        assert_eq!(body.linear_velocity(), replay.linear_velocity());
        assert_eq!(body.angular_velocity(), replay.angular_velocity());
        // Consumed by the integration
        assert_eq!(body.bias_velocity(), Vec2Fix::ZERO);
        assert_eq!(body.force(), Vec2Fix::ZERO);
    }

    #[test]
    fn test_slab_toi() {
        let moving = Aabb::from_circle(Vec2Fix::from_int(-5, 0), Fix128::ONE);
        let target = Aabb::from_circle(Vec2Fix::ZERO, Fix128::ONE);
        let toi = slab_time_of_impact(&moving, Vec2Fix::from_int(10, 0), &target);
        assert!((toi.to_f64() - 0.3).abs() < 1e-12);

        let offset = Aabb::from_circle(Vec2Fix::from_int(-5, 5), Fix128::ONE);
        let miss = slab_time_of_impact(&offset, Vec2Fix::from_int(10, 0), &target);
        assert_eq!(miss, Fix128::ONE);

        let short = slab_time_of_impact(&moving, Vec2Fix::from_int(2, 0), &target);
        assert_eq!(short, Fix128::ONE);
    }

    #[test]
    fn test_history_lookup() {
        let mut body = dynamic_at(0, Fix128::ONE);
        assert!(!body.try_get_space(3).is_exact());
        assert!(body.try_get_space(0).is_exact());

        body.attach_history(HistoryBuffer::new(4));
        body.set_linear_velocity(Vec2Fix::from_int(1, 0));
        for _ in 0..10 {
            body.update(Fix128::ONE, Fix128::ONE);
        }
        assert_eq!(body.position(), Vec2Fix::from_int(10, 0));
        assert_eq!(body.try_get_space(0).record(), body.current_state());
        let one_back = body.try_get_space(1);
        assert!(one_back.is_exact());
        assert_eq!(one_back.record().position, Vec2Fix::from_int(9, 0));
        let clamped = body.try_get_space(5);
        assert!(!clamped.is_exact());
        assert_eq!(clamped.record().position, Vec2Fix::from_int(6, 0));
    }

    #[test]
    fn test_can_collide_rules() {
        let mut keys: slotmap::SlotMap<BodyHandle, ()> = slotmap::SlotMap::with_key();
        let mut a = static_at(0, Fix128::ONE);
        let mut b = static_at(3, Fix128::ONE);
        let mut c = dynamic_at(6, Fix128::ONE);
        a.handle = keys.insert(());
        b.handle = keys.insert(());
        c.handle = keys.insert(());

        assert!(!a.can_collide(&b));
        assert!(!a.can_collide(&a));
        assert!(a.can_collide(&c));

        a.set_collision_filter(CollisionFilter::Exclude(c.handle));
        assert!(!a.can_collide(&c));
        assert!(c.can_collide(&a));

        c.set_collision_filter(CollisionFilter::Custom(|_, _| false));
        assert!(!c.can_collide(&b));

        a.set_collision_filter(CollisionFilter::DisallowDynamic);
        assert!(!a.can_collide(&c));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut body = dynamic_at(3, Fix128::ONE);
        body.set_user_data(42);
        body.shapes_mut().clear();
        body.reset();
        assert_eq!(body.body_type(), BodyType::Invalid);
        assert_eq!(body.user_data(), 0);
        assert!(body.mass().is_zero());
        assert!(body.shapes().is_empty());
    }
}
