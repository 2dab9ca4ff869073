//! Sequential Impulse Solver
//!
//! Four phases per tick over the manifolds produced by the narrow phase:
//!
//! 1. **Pre-step**: anchors, effective masses, restitution bias, and warm
//!    start seeds from the [`ContactCache`].
//! 2. **Biased**: `⌊n/3⌋` passes with elasticity 1, applying positional
//!    correction alongside the velocity impulses.
//! 3. **Warm start**: cached impulses applied once per manifold.
//! 4. **Unbiased**: `⌊2n/3⌋` passes with elasticity 0.
//!
//! Manifolds are visited in insertion order (Gauss-Seidel), which keeps the
//! result a deterministic function of the world state.
//!
//! Author: Moroya Sakamoto

use crate::body::{Body, BodyHandle};
use crate::manifold::{ContactCache, Manifold};
use crate::math::Fix128;
use crate::pool::Pool;

/// Iteration and warm-start settings for one solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SolverSettings {
    /// Total velocity iterations (split 1/3 biased, 2/3 unbiased)
    pub iteration_count: usize,
    /// Scale on cached impulses, in [0, 1]
    pub warm_start_factor: Fix128,
}

impl SolverSettings {
    /// Passes in the biased phase
    #[inline]
    pub fn biased_iterations(&self) -> usize {
        self.iteration_count / 3
    }

    /// Passes in the unbiased phase
    #[inline]
    pub fn unbiased_iterations(&self) -> usize {
        self.iteration_count * 2 / 3
    }
}

/// Solve all manifolds against the bodies they reference.
///
/// Manifolds whose bodies no longer resolve are skipped.
pub fn solve(
    manifolds: &mut [Manifold],
    bodies: &mut Pool<BodyHandle, Body>,
    cache: &ContactCache,
    settings: &SolverSettings,
) {
    for m in manifolds.iter_mut() {
        let key = m.key();
        if let Some((a, b)) = bodies.get2_mut(key.body_a, key.body_b) {
            m.pre_step(a, b, cache.lookup(&key), settings.warm_start_factor);
        }
    }

    for _ in 0..settings.biased_iterations() {
        solve_pass(manifolds, bodies, Fix128::ONE);
    }

    for m in manifolds.iter_mut() {
        if let Some((a, b)) = bodies.get2_mut(m.body_a(), m.body_b()) {
            m.solve_cached(a, b);
        }
    }

    for _ in 0..settings.unbiased_iterations() {
        solve_pass(manifolds, bodies, Fix128::ZERO);
    }
}

fn solve_pass(manifolds: &mut [Manifold], bodies: &mut Pool<BodyHandle, Body>, elasticity: Fix128) {
    for m in manifolds.iter_mut() {
        if let Some((a, b)) = bodies.get2_mut(m.body_a(), m.body_b()) {
            m.solve(a, b, elasticity);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::collision::collide;
    use crate::manifold::PairKey;
    use crate::material::ShapeMaterial;
    use crate::math::Vec2Fix;
    use crate::shape::{Shape, ShapeSpace};

    fn dynamic(pool: &mut Pool<BodyHandle, Body>, x: i64) -> BodyHandle {
        let handle = pool.allocate();
        let body = pool.get_mut(handle).unwrap();
        body.handle = handle;
        let mut shapes = vec![Shape::circle(
            Vec2Fix::ZERO,
            Fix128::ONE,
            ShapeSpace::Body,
            ShapeMaterial::default(),
        )
        .unwrap()];
        body.initialize_dynamic(Vec2Fix::from_int(x, 0), Fix128::ZERO, &mut shapes)
            .unwrap();
        handle
    }

    fn manifolds_for(pool: &Pool<BodyHandle, Body>, a: BodyHandle, b: BodyHandle) -> Vec<Manifold> {
        let set = collide(
            &pool.get(a).unwrap().shapes()[0],
            &pool.get(b).unwrap().shapes()[0],
        )
        .unwrap();
        let key = PairKey {
            body_a: a,
            body_b: b,
            shape_a: 0,
            shape_b: 0,
        };
        vec![Manifold::new(key, &set, Fix128::from_ratio(4, 5), Fix128::HALF)]
    }

    #[test]
    fn test_iteration_split() {
        let s = SolverSettings {
            iteration_count: 20,
            warm_start_factor: Fix128::ZERO,
        };
        assert_eq!(s.biased_iterations(), 6);
        assert_eq!(s.unbiased_iterations(), 13);
    }

    #[test]
    fn test_overlap_produces_separating_bias() {
        let mut pool = Pool::new();
        let a = dynamic(&mut pool, 0);
        let b = dynamic(&mut pool, 1);
        let mut manifolds = manifolds_for(&pool, a, b);
        let settings = SolverSettings {
            iteration_count: 20,
            warm_start_factor: Fix128::ZERO,
        };
        solve(&mut manifolds, &mut pool, &ContactCache::new(), &settings);

        let ba = pool.get(a).unwrap();
        let bb = pool.get(b).unwrap();
        assert!(ba.bias_velocity().x.is_negative());
        assert!(bb.bias_velocity().x.is_positive());
        // Equal masses: symmetric correction
        assert_eq!(ba.bias_velocity().x, -bb.bias_velocity().x);
    }

    #[test]
    fn test_deterministic() {
        let run = || {
            let mut pool = Pool::new();
            let a = dynamic(&mut pool, 0);
            let b = dynamic(&mut pool, 1);
            pool.get_mut(a).unwrap().set_linear_velocity(Vec2Fix::from_int(2, 1));
            let mut manifolds = manifolds_for(&pool, a, b);
            let settings = SolverSettings {
                iteration_count: 9,
                warm_start_factor: Fix128::HALF,
            };
            solve(&mut manifolds, &mut pool, &ContactCache::new(), &settings);
            let ba = pool.get(a).unwrap();
            (ba.linear_velocity(), ba.angular_velocity(), ba.bias_velocity())
        };
        assert_eq!(run(), run());
    }
}
