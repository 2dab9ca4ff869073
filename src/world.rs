//! Physics World
//!
//! The orchestrator. A [`World`] owns every body, the two broad-phase
//! indices (a tree for static bodies, a linear list for dynamic ones), the
//! shape and history recycle bins, and the contact cache used for warm
//! starting.
//!
//! # Tick pipeline
//!
//! [`World::update`] runs, in order:
//!
//! 1. integration of every dynamic body (history is recorded first);
//! 2. the CCD pass for fast bodies;
//! 3. a refresh of the dynamic index;
//! 4. the global broad-phase, feeding the narrow phase one candidate
//!    list per dynamic body;
//! 5. the sequential-impulse solve;
//! 6. storing solved impulses for the next tick, then clearing manifolds.
//!
//! Bodies are visited in insertion order everywhere, so two worlds fed
//! the same calls produce bit-identical results.
//!
//! # Example
//!
//! ```rust
//! use alice_physics2d::prelude::*;
//!
//! let mut world = World::new(WorldConfig::default()).unwrap();
//! let floor = world
//!     .create_polygon_body_space(&[
//!         Vec2Fix::from_int(-10, -1),
//!         Vec2Fix::from_int(10, -1),
//!         Vec2Fix::from_int(10, 0),
//!         Vec2Fix::from_int(-10, 0),
//!     ])
//!     .unwrap();
//! world.create_static_body(Vec2Fix::ZERO, Fix128::ZERO, vec![floor]).unwrap();
//!
//! let ball = world.create_circle_body_space(Vec2Fix::ZERO, Fix128::ONE).unwrap();
//! let body = world
//!     .create_dynamic_body(Vec2Fix::from_int(0, 3), Fix128::ZERO, vec![ball])
//!     .unwrap();
//!
//! for _ in 0..10 {
//!     world.update();
//! }
//! assert_eq!(world.tick(), 10);
//! assert!(world.body(body).is_some());
//! ```
//!
//! Author: Moroya Sakamoto

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::aabb::Aabb;
use crate::body::{Body, BodyHandle, BodyType, CollisionFilter};
use crate::broadphase::{BroadPhase, NaiveBroadPhase, TreeBroadPhase};
use crate::ccd;
use crate::collision;
use crate::config::{self, WorldConfig};
use crate::error::PhysicsError;
use crate::history::{HistoryBuffer, HistoryLookup};
use crate::manifold::{ContactCache, Manifold, PairKey};
use crate::material::ShapeMaterial;
use crate::math::{Fix128, Vec2Fix};
use crate::pool::Pool;
use crate::raycast::{RayCast, RayResult};
use crate::shape::{Circle, Shape, ShapeGeometry, ShapeKind, ShapePool, ShapeSnapshot, ShapeSpace};
use crate::solver::{self, SolverSettings};

// ============================================================================
// Query Filter / Snapshot
// ============================================================================

/// Which bodies a world query considers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BodyFilter {
    /// Every body
    #[default]
    All,
    /// Static bodies only
    StaticOnly,
    /// Dynamic bodies only
    DynamicOnly,
    /// Every body except one
    Except(BodyHandle),
}

impl BodyFilter {
    #[inline]
    fn wants_static(&self) -> bool {
        !matches!(self, Self::DynamicOnly)
    }

    #[inline]
    fn wants_dynamic(&self) -> bool {
        !matches!(self, Self::StaticOnly)
    }

    /// The filter accepts `body`.
    pub fn accepts(&self, body: &Body) -> bool {
        match self {
            Self::All => true,
            Self::StaticOnly => body.is_static(),
            Self::DynamicOnly => body.is_dynamic(),
            Self::Except(handle) => body.handle() != *handle,
        }
    }
}

/// Read-only copy of a body's state for external renderers.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BodySnapshot {
    /// Body handle
    pub handle: BodyHandle,
    /// Static or dynamic
    pub kind: BodyType,
    /// World position
    pub position: Vec2Fix,
    /// Orientation in radians
    pub angle: Fix128,
    /// Unit facing vector
    pub facing: Vec2Fix,
    /// World bounds
    pub aabb: Aabb,
    /// Linear velocity
    pub linear_velocity: Vec2Fix,
    /// Angular velocity
    pub angular_velocity: Fix128,
    /// World geometry of every shape
    pub shapes: Vec<ShapeSnapshot>,
}

fn rejected(op: &str, err: PhysicsError) -> PhysicsError {
    log::warn!("{op} rejected: {err}");
    err
}

// ============================================================================
// World
// ============================================================================

/// 2D deterministic physics world.
pub struct World {
    config: WorldConfig,
    bodies: Pool<BodyHandle, Body>,
    /// In-world bodies in insertion order (swap-removed)
    body_list: Vec<BodyHandle>,
    static_index: TreeBroadPhase,
    dynamic_index: NaiveBroadPhase,
    shape_pool: ShapePool,
    history_pool: Vec<HistoryBuffer>,
    manifolds: Vec<Manifold>,
    contact_cache: ContactCache,
    candidates: Vec<BodyHandle>,
    scratch: Vec<BodyHandle>,
    tick: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::with_valid_config(WorldConfig::default())
    }
}

impl World {
    /// Create a world. The config is validated first.
    pub fn new(config: WorldConfig) -> Result<Self, PhysicsError> {
        config.validate().map_err(|e| rejected("World::new", e))?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: WorldConfig) -> Self {
        Self {
            config,
            bodies: Pool::new(),
            body_list: Vec::new(),
            static_index: TreeBroadPhase::new(),
            dynamic_index: NaiveBroadPhase::new(),
            shape_pool: ShapePool::new(),
            history_pool: Vec::new(),
            manifolds: Vec::new(),
            contact_cache: ContactCache::new(),
            candidates: Vec::new(),
            scratch: Vec::new(),
            tick: 0,
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Current configuration
    #[inline]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Tick length
    #[inline]
    pub fn delta_time(&self) -> Fix128 {
        self.config.delta_time
    }

    /// Change the tick length. Must be positive.
    pub fn set_delta_time(&mut self, delta_time: Fix128) -> Result<(), PhysicsError> {
        config::validate_delta_time(delta_time).map_err(|e| rejected("set_delta_time", e))?;
        self.config.delta_time = delta_time;
        Ok(())
    }

    /// Solver iterations per tick
    #[inline]
    pub fn iteration_count(&self) -> usize {
        self.config.iteration_count
    }

    /// Change the solver iteration count. Must be non-zero.
    pub fn set_iteration_count(&mut self, iteration_count: usize) -> Result<(), PhysicsError> {
        config::validate_iteration_count(iteration_count)
            .map_err(|e| rejected("set_iteration_count", e))?;
        self.config.iteration_count = iteration_count;
        Ok(())
    }

    /// Per-tick velocity damping
    #[inline]
    pub fn damping(&self) -> Fix128 {
        self.config.damping
    }

    /// Change the damping multiplier. Must lie in (0, 1].
    pub fn set_damping(&mut self, damping: Fix128) -> Result<(), PhysicsError> {
        config::validate_damping(damping).map_err(|e| rejected("set_damping", e))?;
        self.config.damping = damping;
        Ok(())
    }

    /// Rollback history length (fixed at construction)
    #[inline]
    pub fn history_length(&self) -> usize {
        self.config.history_length
    }

    /// Completed updates
    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    // ========================================================================
    // Shape Factories
    // ========================================================================

    /// Circle given in world coordinates.
    pub fn create_circle_world_space(
        &mut self,
        origin: Vec2Fix,
        radius: Fix128,
    ) -> Result<Shape, PhysicsError> {
        self.create_circle_world_space_with(origin, radius, ShapeMaterial::default())
    }

    /// Circle given in world coordinates, with an explicit material.
    pub fn create_circle_world_space_with(
        &mut self,
        origin: Vec2Fix,
        radius: Fix128,
        material: ShapeMaterial,
    ) -> Result<Shape, PhysicsError> {
        self.create_circle(origin, radius, ShapeSpace::World, material)
    }

    /// Circle given relative to its future body.
    pub fn create_circle_body_space(
        &mut self,
        origin: Vec2Fix,
        radius: Fix128,
    ) -> Result<Shape, PhysicsError> {
        self.create_circle_body_space_with(origin, radius, ShapeMaterial::default())
    }

    /// Circle given relative to its future body, with an explicit material.
    pub fn create_circle_body_space_with(
        &mut self,
        origin: Vec2Fix,
        radius: Fix128,
        material: ShapeMaterial,
    ) -> Result<Shape, PhysicsError> {
        self.create_circle(origin, radius, ShapeSpace::Body, material)
    }

    /// Convex polygon given in world coordinates (counter-clockwise).
    pub fn create_polygon_world_space(
        &mut self,
        vertices: &[Vec2Fix],
    ) -> Result<Shape, PhysicsError> {
        self.create_polygon_world_space_with(vertices, ShapeMaterial::default())
    }

    /// Convex polygon given in world coordinates, with an explicit material.
    pub fn create_polygon_world_space_with(
        &mut self,
        vertices: &[Vec2Fix],
        material: ShapeMaterial,
    ) -> Result<Shape, PhysicsError> {
        self.create_polygon(vertices, ShapeSpace::World, material)
    }

    /// Convex polygon given relative to its future body (counter-clockwise).
    pub fn create_polygon_body_space(&mut self, vertices: &[Vec2Fix]) -> Result<Shape, PhysicsError> {
        self.create_polygon_body_space_with(vertices, ShapeMaterial::default())
    }

    /// Convex polygon given relative to its future body, with an explicit
    /// material.
    pub fn create_polygon_body_space_with(
        &mut self,
        vertices: &[Vec2Fix],
        material: ShapeMaterial,
    ) -> Result<Shape, PhysicsError> {
        self.create_polygon(vertices, ShapeSpace::Body, material)
    }

    fn create_circle(
        &mut self,
        origin: Vec2Fix,
        radius: Fix128,
        space: ShapeSpace,
        material: ShapeMaterial,
    ) -> Result<Shape, PhysicsError> {
        let circle = Circle::new(origin, radius).map_err(|e| rejected("create_circle", e))?;
        Ok(Shape::from_kind(ShapeKind::Circle(circle), space, material))
    }

    fn create_polygon(
        &mut self,
        vertices: &[Vec2Fix],
        space: ShapeSpace,
        material: ShapeMaterial,
    ) -> Result<Shape, PhysicsError> {
        let mut polygon = self.shape_pool.take_polygon();
        if let Err(e) = polygon.rebuild(vertices) {
            self.shape_pool.restore_polygon(polygon);
            return Err(rejected("create_polygon", e));
        }
        Ok(Shape::from_kind(ShapeKind::Polygon(polygon), space, material))
    }

    /// Recycle bins for freed shapes
    #[inline]
    pub fn shape_pool(&self) -> &ShapePool {
        &self.shape_pool
    }

    // ========================================================================
    // Body Lifecycle
    // ========================================================================

    /// Create a static body and add it to the world.
    pub fn create_static_body(
        &mut self,
        position: Vec2Fix,
        angle: Fix128,
        shapes: Vec<Shape>,
    ) -> Result<BodyHandle, PhysicsError> {
        self.create_body(BodyType::Static, position, angle, shapes)
    }

    /// Create a dynamic body and add it to the world.
    ///
    /// Fails with [`PhysicsError::MassTooSmall`] when the shapes weigh less
    /// than [`MINIMUM_DYNAMIC_MASS`](crate::config::MINIMUM_DYNAMIC_MASS).
    pub fn create_dynamic_body(
        &mut self,
        position: Vec2Fix,
        angle: Fix128,
        shapes: Vec<Shape>,
    ) -> Result<BodyHandle, PhysicsError> {
        self.create_body(BodyType::Dynamic, position, angle, shapes)
    }

    fn create_body(
        &mut self,
        kind: BodyType,
        position: Vec2Fix,
        angle: Fix128,
        mut shapes: Vec<Shape>,
    ) -> Result<BodyHandle, PhysicsError> {
        let handle = self.bodies.allocate();
        let result = match self.bodies.get_mut(handle) {
            Some(body) => {
                body.handle = handle;
                match kind {
                    BodyType::Dynamic => body.initialize_dynamic(position, angle, &mut shapes),
                    _ => body.initialize_static(position, angle, &mut shapes),
                }
            }
            None => Err(crate::pool::stale(handle)),
        };

        if let Err(e) = result {
            // Slot goes back untouched; the caller's shapes are recycled
            for shape in shapes.drain(..) {
                self.shape_pool.release(shape);
            }
            let released = self.bodies.release(handle);
            debug_assert!(released.is_ok(), "freshly allocated body slot must release");
            return Err(rejected("create_body", e));
        }

        self.add_internal(handle);
        log::debug!("created {:?} body {:?} at {:?}", kind, handle, position);
        Ok(handle)
    }

    /// Put a removed body back into the simulation at a new pose.
    pub fn add_body(
        &mut self,
        handle: BodyHandle,
        position: Vec2Fix,
        angle: Fix128,
    ) -> Result<(), PhysicsError> {
        let body = self
            .bodies
            .try_get_mut(handle)
            .map_err(|e| rejected("add_body", e))?;
        if body.in_world {
            return Err(rejected("add_body", PhysicsError::AlreadyInWorld));
        }
        body.set(position, angle);
        self.add_internal(handle);
        log::debug!("added body {:?} at {:?}", handle, position);
        Ok(())
    }

    /// Take a body out of the simulation. It keeps its shapes and mass and
    /// can be re-added with [`World::add_body`].
    pub fn remove_body(&mut self, handle: BodyHandle) -> Result<(), PhysicsError> {
        let body = self
            .bodies
            .try_get(handle)
            .map_err(|e| rejected("remove_body", e))?;
        if !body.in_world {
            return Err(rejected("remove_body", PhysicsError::NotInWorld));
        }
        self.remove_internal(handle);
        log::debug!("removed body {:?}", handle);
        Ok(())
    }

    /// Remove a body (if present), free its shapes, and recycle its slot.
    /// The handle stops resolving.
    pub fn destroy_body(&mut self, handle: BodyHandle) -> Result<(), PhysicsError> {
        let in_world = self
            .bodies
            .try_get(handle)
            .map_err(|e| rejected("destroy_body", e))?
            .in_world;
        if in_world {
            self.remove_internal(handle);
        }
        if let Some(body) = self.bodies.get_mut(handle) {
            for shape in body.shapes_mut().drain(..) {
                self.shape_pool.release(shape);
            }
        }
        self.bodies
            .release(handle)
            .map_err(|e| rejected("destroy_body", e))?;
        log::debug!("destroyed body {:?}", handle);
        Ok(())
    }

    fn add_internal(&mut self, handle: BodyHandle) {
        let history_length = self.config.history_length;
        let list_index = self.body_list.len();
        let Some(body) = self.bodies.get_mut(handle) else {
            return;
        };

        body.in_world = true;
        body.list_index = list_index;
        body.proxy = Some(if body.is_static() {
            self.static_index.add(handle, body.aabb())
        } else {
            self.dynamic_index.add(handle, body.aabb())
        });
        if body.is_dynamic() && history_length > 0 {
            let mut history = self.history_pool.pop().unwrap_or_default();
            history.reset(history_length);
            body.attach_history(history);
        }
        self.body_list.push(handle);
    }

    fn remove_internal(&mut self, handle: BodyHandle) {
        let Some(body) = self.bodies.get_mut(handle) else {
            return;
        };
        let list_index = body.list_index;
        let is_static = body.is_static();
        let proxy = body.proxy;
        if let Some(history) = body.vacate() {
            self.history_pool.push(history);
        }

        if let Some(proxy) = proxy {
            if is_static {
                self.static_index.remove(proxy);
            } else {
                self.dynamic_index.remove(proxy);
            }
        }

        if list_index < self.body_list.len() {
            self.body_list.swap_remove(list_index);
            if let Some(&moved) = self.body_list.get(list_index) {
                if let Some(moved) = self.bodies.get_mut(moved) {
                    moved.list_index = list_index;
                }
            }
        }
        self.contact_cache.remove_body(handle);
    }

    // ========================================================================
    // Body Access
    // ========================================================================

    /// The handle refers to a live body (in the world or removed).
    #[inline]
    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.bodies.contains(handle)
    }

    /// Shared access to a body.
    #[inline]
    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle)
    }

    /// Exclusive access for deferred mutation (forces, velocities, filter).
    #[inline]
    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(handle)
    }

    /// Bodies currently simulated, in update order.
    pub fn bodies(&self) -> impl Iterator<Item = &Body> + '_ {
        self.body_list.iter().filter_map(move |h| self.bodies.get(*h))
    }

    /// Number of bodies currently simulated
    #[inline]
    pub fn body_count(&self) -> usize {
        self.body_list.len()
    }

    /// Shapes attached to simulated bodies
    pub fn shape_count(&self) -> usize {
        self.bodies().map(|b| b.shapes().len()).sum()
    }

    /// Reset bodies waiting in the pool for reuse
    #[inline]
    pub fn spare_bodies(&self) -> usize {
        self.bodies.spare_len()
    }

    /// Read-only copy of a body's state.
    pub fn snapshot(&self, handle: BodyHandle) -> Result<BodySnapshot, PhysicsError> {
        let body = self
            .bodies
            .try_get(handle)
            .map_err(|e| rejected("snapshot", e))?;
        Ok(BodySnapshot {
            handle,
            kind: body.body_type(),
            position: body.position(),
            angle: body.angle(),
            facing: body.facing(),
            aabb: body.aabb(),
            linear_velocity: body.linear_velocity(),
            angular_velocity: body.angular_velocity(),
            shapes: body.shapes().iter().map(Shape::snapshot).collect(),
        })
    }

    /// State of a body `ticks_behind` ticks ago.
    pub fn body_state(
        &self,
        handle: BodyHandle,
        ticks_behind: usize,
    ) -> Result<HistoryLookup, PhysicsError> {
        self.bodies
            .try_get(handle)
            .map(|b| b.try_get_space(ticks_behind))
            .map_err(|e| rejected("body_state", e))
    }

    // ========================================================================
    // Body Mutation
    // ========================================================================

    fn with_body<F>(&mut self, op: &str, handle: BodyHandle, f: F) -> Result<(), PhysicsError>
    where
        F: FnOnce(&mut Body),
    {
        let body = self.bodies.try_get_mut(handle).map_err(|e| rejected(op, e))?;
        f(body);
        Ok(())
    }

    /// Teleport a body. Geometry, bounds and the broad-phase entry are
    /// refreshed immediately; the move is not swept by CCD.
    pub fn set_body_pose(
        &mut self,
        handle: BodyHandle,
        position: Vec2Fix,
        angle: Fix128,
    ) -> Result<(), PhysicsError> {
        let body = self
            .bodies
            .try_get_mut(handle)
            .map_err(|e| rejected("set_body_pose", e))?;
        body.set(position, angle);
        if let Some(proxy) = body.proxy {
            if body.is_static() {
                self.static_index.update(proxy, body.aabb());
            } else {
                self.dynamic_index.update(proxy, body.aabb());
            }
        }
        Ok(())
    }

    /// Linear velocity, applied from the next integration.
    pub fn set_linear_velocity(
        &mut self,
        handle: BodyHandle,
        velocity: Vec2Fix,
    ) -> Result<(), PhysicsError> {
        self.with_body("set_linear_velocity", handle, |b| b.set_linear_velocity(velocity))
    }

    /// Angular velocity, applied from the next integration.
    pub fn set_angular_velocity(
        &mut self,
        handle: BodyHandle,
        velocity: Fix128,
    ) -> Result<(), PhysicsError> {
        self.with_body("set_angular_velocity", handle, |b| b.set_angular_velocity(velocity))
    }

    /// Accumulate a force through the center of mass.
    pub fn add_force(&mut self, handle: BodyHandle, force: Vec2Fix) -> Result<(), PhysicsError> {
        self.with_body("add_force", handle, |b| b.add_force(force))
    }

    /// Accumulate a force applied at a world point.
    pub fn add_force_at(
        &mut self,
        handle: BodyHandle,
        force: Vec2Fix,
        point: Vec2Fix,
    ) -> Result<(), PhysicsError> {
        self.with_body("add_force_at", handle, |b| b.add_force_at(force, point))
    }

    /// Accumulate torque.
    pub fn add_torque(&mut self, handle: BodyHandle, torque: Fix128) -> Result<(), PhysicsError> {
        self.with_body("add_torque", handle, |b| b.add_torque(torque))
    }

    /// Overwrite a body's pending force, torque and positional-correction
    /// terms, e.g. when restoring a saved state for resimulation.
    pub fn set_force(
        &mut self,
        handle: BodyHandle,
        force: Vec2Fix,
        torque: Fix128,
        bias_velocity: Vec2Fix,
        bias_rotation: Fix128,
    ) -> Result<(), PhysicsError> {
        self.with_body("set_force", handle, |b| {
            b.set_force(force, torque, bias_velocity, bias_rotation)
        })
    }

    /// Attach an opaque payload.
    pub fn set_user_data(&mut self, handle: BodyHandle, user_data: u64) -> Result<(), PhysicsError> {
        self.with_body("set_user_data", handle, |b| b.set_user_data(user_data))
    }

    /// Replace a body's collision filter.
    pub fn set_collision_filter(
        &mut self,
        handle: BodyHandle,
        filter: CollisionFilter,
    ) -> Result<(), PhysicsError> {
        self.with_body("set_collision_filter", handle, |b| b.set_collision_filter(filter))
    }

    /// Turn on CCD. `None` keeps the body's current threshold.
    pub fn enable_ccd(
        &mut self,
        handle: BodyHandle,
        threshold: Option<Fix128>,
    ) -> Result<(), PhysicsError> {
        self.with_body("enable_ccd", handle, |b| b.enable_ccd(threshold))?;
        log::debug!("ccd enabled for body {:?} (threshold {:?})", handle, threshold);
        Ok(())
    }

    /// Turn off CCD.
    pub fn disable_ccd(&mut self, handle: BodyHandle) -> Result<(), PhysicsError> {
        self.with_body("disable_ccd", handle, |b| b.disable_ccd())?;
        log::debug!("ccd disabled for body {:?}", handle);
        Ok(())
    }

    // ========================================================================
    // Simulation
    // ========================================================================

    fn solver_settings(&self) -> SolverSettings {
        SolverSettings {
            iteration_count: self.config.iteration_count,
            warm_start_factor: self.config.warm_start_factor,
        }
    }

    /// Advance the simulation by one tick.
    pub fn update(&mut self) {
        let delta_time = self.config.delta_time;
        let damping = self.config.damping;

        for &handle in self.body_list.iter() {
            if let Some(body) = self.bodies.get_mut(handle) {
                if body.is_dynamic() {
                    body.update(delta_time, damping);
                }
            }
        }

        let ccd_hits = ccd::resolve(
            &self.body_list,
            &mut self.bodies,
            &self.static_index,
            &mut self.scratch,
        );

        for &handle in self.body_list.iter() {
            let Some(body) = self.bodies.get(handle) else {
                continue;
            };
            if let (true, Some(proxy)) = (body.is_dynamic(), body.proxy) {
                self.dynamic_index.update(proxy, body.aabb());
            }
        }

        let candidate_pairs = self.broad_phase();

        let settings = self.solver_settings();
        solver::solve(&mut self.manifolds, &mut self.bodies, &self.contact_cache, &settings);
        self.contact_cache.store(&self.manifolds);

        log::trace!(
            "tick {}: {} candidate pairs, {} manifolds, {} ccd hits",
            self.tick,
            candidate_pairs,
            self.manifolds.len(),
            ccd_hits
        );
        self.manifolds.clear();
        self.tick += 1;
    }

    /// Global pass: each dynamic body against the static tree, then
    /// against every dynamic body after it in the list.
    fn broad_phase(&mut self) -> usize {
        let mut pairs = 0;
        for i in 0..self.body_list.len() {
            let handle = self.body_list[i];
            let Some(query) = self.bodies.get(handle) else {
                continue;
            };
            if !query.is_dynamic() {
                continue;
            }

            self.candidates.clear();
            self.static_index.query_overlap(&query.aabb(), &mut self.candidates);
            for &other in &self.body_list[i + 1..] {
                if self.bodies.get(other).is_some_and(|b| b.is_dynamic()) {
                    self.candidates.push(other);
                }
            }

            pairs += self.candidates.len();
            narrow_phase(
                &self.bodies,
                &self.config,
                handle,
                &self.candidates,
                &mut self.manifolds,
            );
        }
        pairs
    }

    /// Ad-hoc broad-phase for one body: bodies whose bounds overlap it and
    /// that it may collide with. Dynamic bodies are included on request.
    pub fn query_overlapping(
        &self,
        handle: BodyHandle,
        include_dynamic: bool,
        out: &mut Vec<BodyHandle>,
    ) -> Result<(), PhysicsError> {
        let body = self
            .bodies
            .try_get(handle)
            .map_err(|e| rejected("query_overlapping", e))?;
        let start = out.len();
        self.static_index.query_overlap(&body.aabb(), out);
        if include_dynamic {
            self.dynamic_index.query_overlap(&body.aabb(), out);
        }

        let mut kept = start;
        for i in start..out.len() {
            let other = out[i];
            let accept = self.bodies.get(other).is_some_and(|o| {
                body.can_collide(o) && o.can_collide(body) && body.aabb().intersects(&o.aabb())
            });
            if accept {
                out[kept] = other;
                kept += 1;
            }
        }
        out.truncate(kept);
        Ok(())
    }

    /// Step a single dynamic body: integrate, sweep, collide and solve it
    /// alone. Other bodies are obstacles. The tick counter does not move and
    /// the contact cache is read but not written.
    pub fn update_body(&mut self, handle: BodyHandle, collide_dynamic: bool) -> Result<(), PhysicsError> {
        let body = self
            .bodies
            .try_get_mut(handle)
            .map_err(|e| rejected("update_body", e))?;
        if !body.in_world {
            return Err(rejected("update_body", PhysicsError::NotInWorld));
        }
        if !body.is_dynamic() {
            return Ok(());
        }
        body.update(self.config.delta_time, self.config.damping);

        ccd::resolve(&[handle], &mut self.bodies, &self.static_index, &mut self.scratch);
        if let Some(body) = self.bodies.get(handle) {
            if let Some(proxy) = body.proxy {
                self.dynamic_index.update(proxy, body.aabb());
            }
        }

        let mut candidates = core::mem::take(&mut self.candidates);
        candidates.clear();
        self.query_overlapping(handle, collide_dynamic, &mut candidates)?;
        narrow_phase(
            &self.bodies,
            &self.config,
            handle,
            &candidates,
            &mut self.manifolds,
        );
        self.candidates = candidates;

        let settings = self.solver_settings();
        solver::solve(&mut self.manifolds, &mut self.bodies, &self.contact_cache, &settings);
        self.manifolds.clear();
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Visit query candidates in order: static hits from the tree, then
    /// every dynamic body in list order. Nothing is allocated.
    fn visit_bodies<F>(&self, bounds: &Aabb, filter: BodyFilter, mut visit: F)
    where
        F: FnMut(&Body),
    {
        if filter.wants_static() {
            self.static_index.visit_overlap(bounds, |handle| {
                if let Some(body) = self.bodies.get(handle).filter(|b| filter.accepts(b)) {
                    visit(body);
                }
            });
        }
        if filter.wants_dynamic() {
            for &handle in &self.body_list {
                if let Some(body) = self.bodies.get(handle) {
                    if body.is_dynamic() && filter.accepts(body) {
                        visit(body);
                    }
                }
            }
        }
    }

    /// Bodies containing `point`, as of `ticks_behind` ticks ago.
    pub fn query_point(
        &self,
        point: Vec2Fix,
        filter: BodyFilter,
        ticks_behind: usize,
        out: &mut Vec<BodyHandle>,
    ) {
        let bounds = Aabb::from_corners(point, point);
        self.visit_bodies(&bounds, filter, |b| {
            if b.query_point(point, ticks_behind) {
                out.push(b.handle());
            }
        });
    }

    /// Bodies overlapping a circle, as of `ticks_behind` ticks ago.
    pub fn query_circle(
        &self,
        origin: Vec2Fix,
        radius: Fix128,
        filter: BodyFilter,
        ticks_behind: usize,
        out: &mut Vec<BodyHandle>,
    ) {
        let bounds = Aabb::from_circle(origin, radius);
        self.visit_bodies(&bounds, filter, |b| {
            if b.query_circle(origin, radius, ticks_behind) {
                out.push(b.handle());
            }
        });
    }

    /// Closest ray hit, as of `ticks_behind` ticks ago.
    pub fn ray_cast(
        &self,
        ray: &RayCast,
        filter: BodyFilter,
        ticks_behind: usize,
    ) -> Option<RayResult> {
        let bounds = Aabb::from_corners(ray.origin, ray.end());
        let mut result = RayResult::default();
        self.visit_bodies(&bounds, filter, |b| {
            b.ray_cast(ray, &mut result, ticks_behind);
        });
        result.is_valid().then_some(result)
    }

    /// Closest swept-circle hit, as of `ticks_behind` ticks ago.
    pub fn circle_cast(
        &self,
        ray: &RayCast,
        radius: Fix128,
        filter: BodyFilter,
        ticks_behind: usize,
    ) -> Option<RayResult> {
        let bounds = Aabb::from_corners(ray.origin, ray.end()).expanded(radius);
        let mut result = RayResult::default();
        self.visit_bodies(&bounds, filter, |b| {
            b.circle_cast(ray, radius, &mut result, ticks_behind);
        });
        result.is_valid().then_some(result)
    }
}

/// Test `query` against each candidate and push a manifold per touching
/// shape pair. Pairs are ordered so the lower shape ordering key is `A`.
fn narrow_phase(
    bodies: &Pool<BodyHandle, Body>,
    config: &WorldConfig,
    query: BodyHandle,
    candidates: &[BodyHandle],
    manifolds: &mut Vec<Manifold>,
) {
    let Some(a) = bodies.get(query) else {
        return;
    };
    for &candidate in candidates {
        let Some(b) = bodies.get(candidate) else {
            continue;
        };
        if !a.can_collide(b) || !b.can_collide(a) || !a.aabb().intersects(&b.aabb()) {
            continue;
        }

        for (ia, sa) in a.shapes().iter().enumerate() {
            for (ib, sb) in b.shapes().iter().enumerate() {
                if !sa.aabb().intersects(&sb.aabb()) {
                    continue;
                }
                let ((ha, ia, sa), (hb, ib, sb)) = if sa.ordering_key() <= sb.ordering_key() {
                    ((query, ia, sa), (candidate, ib, sb))
                } else {
                    ((candidate, ib, sb), (query, ia, sa))
                };
                let Some(set) = collision::collide(sa, sb) else {
                    continue;
                };

                let (ma, mb) = (sa.material(), sb.material());
                let key = PairKey {
                    body_a: ha,
                    body_b: hb,
                    shape_a: ia,
                    shape_b: ib,
                };
                manifolds.push(Manifold::new(
                    key,
                    &set,
                    config.friction_combine.apply(ma.friction, mb.friction),
                    config.restitution_combine.apply(ma.restitution, mb.restitution),
                ));
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    fn square(half: i64) -> [Vec2Fix; 4] {
        [
            Vec2Fix::from_int(-half, -half),
            Vec2Fix::from_int(half, -half),
            Vec2Fix::from_int(half, half),
            Vec2Fix::from_int(-half, half),
        ]
    }

    fn ball(world: &mut World, x: i64, y: i64) -> BodyHandle {
        let shape = world.create_circle_body_space(Vec2Fix::ZERO, Fix128::ONE).unwrap();
        world
            .create_dynamic_body(Vec2Fix::from_int(x, y), Fix128::ZERO, vec![shape])
            .unwrap()
    }

    fn block(world: &mut World, x: i64, y: i64) -> BodyHandle {
        let shape = world.create_polygon_body_space(&square(1)).unwrap();
        world
            .create_static_body(Vec2Fix::from_int(x, y), Fix128::ZERO, vec![shape])
            .unwrap()
    }

    #[test]
    fn test_new_validates_config() {
        let bad = WorldConfig {
            iteration_count: 0,
            ..WorldConfig::default()
        };
        assert!(matches!(
            World::new(bad),
            Err(PhysicsError::InvalidConfiguration { .. })
        ));
        assert!(World::new(WorldConfig::default()).is_ok());
    }

    #[test]
    fn test_setters_validate() {
        let mut world = World::default();
        assert!(world.set_delta_time(Fix128::ZERO).is_err());
        assert!(world.set_iteration_count(0).is_err());
        assert!(world.set_damping(Fix128::from_int(2)).is_err());
        assert_eq!(world.iteration_count(), 20);

        world.set_iteration_count(9).unwrap();
        world.set_damping(Fix128::ONE).unwrap();
        assert_eq!(world.iteration_count(), 9);
        assert_eq!(world.damping(), Fix128::ONE);
    }

    #[test]
    fn test_invalid_shapes() {
        let mut world = World::default();
        assert!(world.create_circle_body_space(Vec2Fix::ZERO, Fix128::ZERO).is_err());
        assert!(world
            .create_polygon_body_space(&[Vec2Fix::ZERO, Vec2Fix::UNIT_X])
            .is_err());
    }

    #[test]
    fn test_failed_create_leaves_world_unchanged() {
        let mut world = World::default();
        let light = world
            .create_circle_body_space_with(
                Vec2Fix::ZERO,
                Fix128::ONE,
                ShapeMaterial::with_density(Fix128::ZERO),
            )
            .unwrap();
        let err = world
            .create_dynamic_body(Vec2Fix::ZERO, Fix128::ZERO, vec![light])
            .unwrap_err();
        assert_eq!(err, PhysicsError::MassTooSmall);
        assert_eq!(world.body_count(), 0);

        let err = world
            .create_static_body(Vec2Fix::ZERO, Fix128::ZERO, Vec::new())
            .unwrap_err();
        assert_eq!(err, PhysicsError::EmptyShapeList);
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_invalid_polygon_keeps_pooled_buffer() {
        let mut world = World::default();
        let shape = world.create_polygon_body_space(&square(1)).unwrap();
        let body = world
            .create_static_body(Vec2Fix::ZERO, Fix128::ZERO, vec![shape])
            .unwrap();
        world.destroy_body(body).unwrap();
        assert_eq!(world.shape_pool().spare_polygons(), 1);

        // Clockwise winding is rejected after the buffer was taken
        let mut clockwise = square(1);
        clockwise.reverse();
        assert!(world.create_polygon_body_space(&clockwise).is_err());
        assert!(world.create_polygon_body_space(&[Vec2Fix::ZERO]).is_err());
        assert_eq!(world.shape_pool().spare_polygons(), 1);
        assert_eq!(world.shape_pool().released_count(), 1);
    }

    #[test]
    fn test_failed_create_releases_slot() {
        let mut world = World::default();
        let err = world
            .create_dynamic_body(Vec2Fix::ZERO, Fix128::ZERO, Vec::new())
            .unwrap_err();
        assert_eq!(err, PhysicsError::EmptyShapeList);
        assert_eq!(world.spare_bodies(), 1);
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_remove_and_readd() {
        let mut world = World::default();
        let a = ball(&mut world, 0, 0);
        let b = ball(&mut world, 5, 0);
        world.set_linear_velocity(a, Vec2Fix::from_int(3, 0)).unwrap();

        world.remove_body(a).unwrap();
        assert_eq!(world.body_count(), 1);
        assert_eq!(world.remove_body(a), Err(PhysicsError::NotInWorld));
        // Swap-removed survivor is still addressable
        assert_eq!(world.bodies().next().map(Body::handle), Some(b));

        let body = world.body(a).unwrap();
        assert!(!body.is_in_world());
        assert_eq!(body.linear_velocity(), Vec2Fix::ZERO);
        assert!(body.mass().is_positive());

        world.add_body(a, Vec2Fix::from_int(-5, 0), Fix128::ZERO).unwrap();
        assert_eq!(world.add_body(a, Vec2Fix::ZERO, Fix128::ZERO), Err(PhysicsError::AlreadyInWorld));
        assert_eq!(world.body(a).unwrap().position(), Vec2Fix::from_int(-5, 0));
        assert_eq!(world.body_count(), 2);
    }

    #[test]
    fn test_destroy_releases_everything() {
        let mut world = World::default();
        let shape = world.create_polygon_body_space(&square(1)).unwrap();
        let body = world
            .create_dynamic_body(Vec2Fix::ZERO, Fix128::ZERO, vec![shape])
            .unwrap();
        assert_eq!(world.shape_count(), 1);

        world.destroy_body(body).unwrap();
        assert!(!world.contains(body));
        assert_eq!(world.shape_count(), 0);
        assert_eq!(world.shape_pool().spare_polygons(), 1);
        assert_eq!(world.spare_bodies(), 1);
        assert!(matches!(
            world.destroy_body(body),
            Err(PhysicsError::StaleHandle { .. })
        ));

        // Polygon buffer is recycled by the next factory call
        let again = world.create_polygon_body_space(&square(2)).unwrap();
        assert_eq!(world.shape_pool().spare_polygons(), 0);
        let reused = world
            .create_dynamic_body(Vec2Fix::ZERO, Fix128::ZERO, vec![again])
            .unwrap();
        assert_ne!(reused, body);
        assert_eq!(world.spare_bodies(), 0);
    }

    #[test]
    fn test_static_body_never_moves() {
        let mut world = World::default();
        let wall = block(&mut world, 0, 0);
        let b = ball(&mut world, 0, 3);
        world.set_linear_velocity(b, Vec2Fix::from_int(0, -10)).unwrap();

        let before = world.snapshot(wall).unwrap();
        for _ in 0..30 {
            world.update();
        }
        assert_eq!(world.snapshot(wall).unwrap(), before);
        assert_eq!(world.tick(), 30);
    }

    #[test]
    fn test_ball_rests_on_block() {
        let mut world = World::default();
        block(&mut world, 0, 0);
        let b = ball(&mut world, 0, 3);
        let weight = Vec2Fix::new(Fix128::ZERO, -world.body(b).unwrap().mass() * Fix128::from_int(10));
        for _ in 0..200 {
            world.add_force(b, weight).unwrap();
            world.update();
        }
        let y = world.body(b).unwrap().position().y.to_f64();
        // Ball radius 1 on a block with top at y = 1
        assert!(y > 1.5 && y < 2.5, "y = {}", y);
    }

    #[test]
    fn test_set_body_pose_updates_index() {
        let mut world = World::default();
        let wall = block(&mut world, 0, 0);
        let b = ball(&mut world, 20, 0);

        let mut out = Vec::new();
        world.query_overlapping(b, false, &mut out).unwrap();
        assert!(out.is_empty());

        world.set_body_pose(wall, Vec2Fix::from_int(20, 1), Fix128::ZERO).unwrap();
        world.query_overlapping(b, false, &mut out).unwrap();
        assert_eq!(out, vec![wall]);
    }

    #[test]
    fn test_query_overlapping_dynamic_toggle() {
        let mut world = World::default();
        let a = ball(&mut world, 0, 0);
        let b = ball(&mut world, 1, 0);

        let mut out = Vec::new();
        world.query_overlapping(a, false, &mut out).unwrap();
        assert!(out.is_empty());
        world.query_overlapping(a, true, &mut out).unwrap();
        assert_eq!(out, vec![b]);
    }

    #[test]
    fn test_point_and_circle_queries() {
        let mut world = World::default();
        let wall = block(&mut world, 0, 0);
        let b = ball(&mut world, 5, 0);

        let mut out = Vec::new();
        world.query_point(Vec2Fix::from_int(5, 0), BodyFilter::All, 0, &mut out);
        assert_eq!(out, vec![b]);

        out.clear();
        world.query_circle(
            Vec2Fix::from_int(2, 0),
            Fix128::from_int(3),
            BodyFilter::All,
            0,
            &mut out,
        );
        assert_eq!(out, vec![wall, b]);

        out.clear();
        world.query_circle(
            Vec2Fix::from_int(2, 0),
            Fix128::from_int(3),
            BodyFilter::Except(wall),
            0,
            &mut out,
        );
        assert_eq!(out, vec![b]);
    }

    #[test]
    fn test_ray_cast_closest_hit() {
        let mut world = World::default();
        let near = block(&mut world, 5, 0);
        block(&mut world, 10, 0);

        let ray = RayCast::new(Vec2Fix::ZERO, Vec2Fix::from_int(20, 0));
        let hit = world.ray_cast(&ray, BodyFilter::All, 0).unwrap();
        assert_eq!(hit.body, Some(near));
        assert!((hit.distance.to_f64() - 4.0).abs() < 1e-9);
        assert!((hit.normal.x.to_f64() + 1.0).abs() < 1e-9);

        assert!(world.ray_cast(&ray, BodyFilter::DynamicOnly, 0).is_none());
    }

    #[test]
    fn test_update_body_keeps_tick() {
        let mut world = World::default();
        let b = ball(&mut world, 0, 0);
        world.set_linear_velocity(b, Vec2Fix::from_int(1, 0)).unwrap();
        world.update_body(b, true).unwrap();
        assert_eq!(world.tick(), 0);
        assert!(world.body(b).unwrap().position().x.is_positive());

        world.remove_body(b).unwrap();
        assert_eq!(world.update_body(b, true), Err(PhysicsError::NotInWorld));
    }

    #[test]
    fn test_set_force_restores_pending_state() {
        let mut world = World::default();
        block(&mut world, 0, 0);
        let b = ball(&mut world, 0, 3);
        let weight = Vec2Fix::new(Fix128::ZERO, -world.body(b).unwrap().mass() * Fix128::from_int(10));
        world.set_linear_velocity(b, Vec2Fix::from_int(1, -4)).unwrap();
        world.add_force(b, weight).unwrap();

        let saved = world.snapshot(b).unwrap();
        let body = world.body(b).unwrap();
        let pending = (body.force(), body.torque(), body.bias_velocity(), body.bias_rotation());

        world.update();
        let expected = world.snapshot(b).unwrap();

        // Roll back and replay the same tick
        world.set_body_pose(b, saved.position, saved.angle).unwrap();
        world.set_linear_velocity(b, saved.linear_velocity).unwrap();
        world.set_angular_velocity(b, saved.angular_velocity).unwrap();
        world.set_force(b, pending.0, pending.1, pending.2, pending.3).unwrap();
        world.update();
        assert_eq!(world.snapshot(b).unwrap(), expected);
    }

    #[test]
    fn test_set_force_applies_bias() {
        let mut world = World::default();
        let b = ball(&mut world, 0, 0);
        let nudge = Vec2Fix::new(Fix128::from_ratio(1, 4), Fix128::ZERO);
        world.set_force(b, Vec2Fix::ZERO, Fix128::ZERO, nudge, Fix128::ZERO).unwrap();
        world.update();
        assert_eq!(world.body(b).unwrap().position(), nudge);
        assert_eq!(world.body(b).unwrap().linear_velocity(), Vec2Fix::ZERO);
    }

    #[test]
    fn test_history_assigned_on_add() {
        let mut world = World::new(WorldConfig::with_history(4)).unwrap();
        let b = ball(&mut world, 0, 0);
        let wall = block(&mut world, 10, 0);
        assert_eq!(world.body(b).unwrap().history().map(|h| h.capacity()), Some(4));
        assert!(world.body(wall).unwrap().history().is_none());

        world.remove_body(b).unwrap();
        assert!(world.body(b).unwrap().history().is_none());
        world.add_body(b, Vec2Fix::ZERO, Fix128::ZERO).unwrap();
        assert!(world.body(b).unwrap().history().is_some());
    }
}
