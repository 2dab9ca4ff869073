//! # ALICE-Physics2D
//!
//! **Deterministic 2D Rigid-Body Physics for Rollback Netcode**
//!
//! A fixed-point 2D physics engine whose every result is bit-identical
//! across platforms, so peers running the same inputs never desync.
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | **128-bit Fixed-Point** | `Fix128` (I64F64) scalar with CORDIC trigonometry |
//! | **Circles & Convex Polygons** | Body- or world-space shape factories |
//! | **Dual Broad-Phase** | AABB tree for static bodies, linear list for dynamic ones |
//! | **Sequential Impulses** | Biased/unbiased split with warm starting from cached impulses |
//! | **CCD** | Swept slab test that rewinds fast bodies to the time of impact |
//! | **Rollback History** | Per-body ring buffer for lag-compensated queries |
//! | **Pooling** | Generational handles over recycled bodies, shapes and history buffers |
//!
//! ## Quick Start
//!
//! ```rust
//! use alice_physics2d::prelude::*;
//!
//! let mut world = World::new(WorldConfig::with_history(8)).unwrap();
//!
//! let wall = world
//!     .create_circle_body_space(Vec2Fix::ZERO, Fix128::from_ratio(1, 5))
//!     .unwrap();
//! world.create_static_body(Vec2Fix::ZERO, Fix128::ZERO, vec![wall]).unwrap();
//!
//! let shape = world
//!     .create_circle_body_space(Vec2Fix::ZERO, Fix128::from_ratio(1, 10))
//!     .unwrap();
//! let bullet = world
//!     .create_dynamic_body(Vec2Fix::from_int(-10, 0), Fix128::ZERO, vec![shape])
//!     .unwrap();
//! world.set_linear_velocity(bullet, Vec2Fix::from_int(50, 0)).unwrap();
//! world.enable_ccd(bullet, Some(Fix128::ONE)).unwrap();
//!
//! for _ in 0..30 {
//!     world.update();
//! }
//! // Stopped at the wall instead of tunneling through it
//! assert!(world.body(bullet).unwrap().position().x < Fix128::ZERO);
//! ```
//!
//! ## Determinism
//!
//! - All simulation arithmetic is `Fix128`; `f64` conversions exist only for
//!   tests and tooling.
//! - Bodies are visited in insertion order and manifolds solved in the order
//!   the broad-phase produced them.
//! - No hash maps or threads sit on the simulation path.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod aabb;
pub mod body;
pub mod broadphase;
pub mod ccd;
pub mod collision;
pub mod config;
pub mod error;
pub mod history;
pub mod manifold;
pub mod material;
pub mod math;
pub mod pool;
pub mod raycast;
pub mod shape;
pub mod solver;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::aabb::Aabb;
    pub use crate::body::{Body, BodyHandle, BodyType, CollisionFilter, SweepResult};
    pub use crate::broadphase::{BroadPhase, NaiveBroadPhase, TreeBroadPhase};
    pub use crate::collision::{ContactPoint, ContactSet};
    pub use crate::config::WorldConfig;
    pub use crate::error::PhysicsError;
    pub use crate::history::{HistoryBuffer, HistoryLookup, HistoryRecord};
    pub use crate::manifold::{Contact, ContactCache, Manifold, PairKey};
    pub use crate::material::{CombineRule, ShapeMaterial};
    pub use crate::math::{Axis, Fix128, Vec2Fix};
    pub use crate::pool::{Pool, Poolable};
    pub use crate::raycast::{RayCast, RayResult};
    pub use crate::shape::{
        Circle, MassData, Polygon, Shape, ShapeGeometry, ShapeKind, ShapePool, ShapeSnapshot,
        ShapeSpace, ShapeType,
    };
    pub use crate::world::{BodyFilter, BodySnapshot, World};
}

// Re-export main types at crate root
pub use prelude::*;

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::prelude::*;

    fn box_vertices(half: i64) -> [Vec2Fix; 4] {
        [
            Vec2Fix::from_int(-half, -half),
            Vec2Fix::from_int(half, -half),
            Vec2Fix::from_int(half, half),
            Vec2Fix::from_int(-half, half),
        ]
    }

    #[test]
    fn test_mixed_scene_runs() {
        let mut world = World::default();
        let floor = world.create_polygon_body_space(&box_vertices(20)).unwrap();
        world
            .create_static_body(Vec2Fix::from_int(0, -20), Fix128::ZERO, vec![floor])
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..4 {
            let shape = if i % 2 == 0 {
                world.create_circle_body_space(Vec2Fix::ZERO, Fix128::HALF).unwrap()
            } else {
                world.create_polygon_body_space(&box_vertices(1)).unwrap()
            };
            handles.push(
                world
                    .create_dynamic_body(Vec2Fix::from_int(3 * i - 4, 2), Fix128::ZERO, vec![shape])
                    .unwrap(),
            );
        }

        for _ in 0..100 {
            for &h in &handles {
                let m = world.body(h).unwrap().mass();
                world
                    .add_force(h, Vec2Fix::new(Fix128::ZERO, -m * Fix128::from_int(10)))
                    .unwrap();
            }
            world.update();
        }

        // Nothing fell through the floor (top at y = 0)
        for &h in &handles {
            let y = world.body(h).unwrap().position().y.to_f64();
            assert!(y > -0.5, "body sank to y = {}", y);
        }
    }

    #[test]
    fn test_world_space_shape_matches_body_space() {
        let mut world = World::default();
        let local = world
            .create_circle_body_space(Vec2Fix::from_int(1, 0), Fix128::ONE)
            .unwrap();
        let global = world
            .create_circle_world_space(Vec2Fix::from_int(4, 3), Fix128::ONE)
            .unwrap();
        let a = world
            .create_static_body(Vec2Fix::from_int(3, 3), Fix128::ZERO, vec![local])
            .unwrap();
        let b = world
            .create_static_body(Vec2Fix::from_int(3, 3), Fix128::ZERO, vec![global])
            .unwrap();
        assert_eq!(world.body(a).unwrap().aabb(), world.body(b).unwrap().aabb());
    }
}
