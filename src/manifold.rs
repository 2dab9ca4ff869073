//! Contact Manifolds with Warm Starting
//!
//! A [`Manifold`] holds up to [`MAX_CONTACTS`] contact constraints for one
//! colliding shape pair during one tick. Each [`Contact`] carries its
//! anchors, effective masses, restitution bias and accumulated impulses for
//! the sequential-impulse solver.
//!
//! # Warm Starting
//!
//! After the solve, the final accumulated impulses are stored in a
//! [`ContactCache`] keyed by (body A, body B, shape A, shape B). On the next
//! tick, contacts whose body-A-local anchor lands within
//! [`CONTACT_MATCH_DISTANCE`] of a cached one start from that impulse scaled
//! by the warm-start factor.
//!
//! # Sign Conventions
//!
//! The normal points from body A toward body B. Relative velocity is taken
//! as `v_A - v_B`, so an approaching pair has a positive normal component.
//! The impulse is applied negatively to A and positively to B.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::body::{Body, BodyHandle};
use crate::collision::ContactSet;
use crate::config::{CONTACT_MATCH_DISTANCE, MAX_CONTACTS, RESOLVE_RATE, RESOLVE_SLOP};
use crate::math::{Fix128, Vec2Fix};

// ============================================================================
// Contact
// ============================================================================

/// One contact constraint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Contact {
    /// World-space contact position
    pub position: Vec2Fix,
    /// Unit normal, body A toward body B
    pub normal: Vec2Fix,
    /// Overlap depth (negative)
    pub penetration: Fix128,

    to_a: Vec2Fix,
    to_b: Vec2Fix,
    to_a_left: Vec2Fix,
    to_b_left: Vec2Fix,
    /// Contact position in body A's local frame
    anchor: Vec2Fix,

    normal_mass: Fix128,
    tangent_mass: Fix128,
    bias: Fix128,
    bounce: Fix128,

    normal_impulse: Fix128,
    tangent_impulse: Fix128,
    bias_impulse: Fix128,

    warm_normal: Fix128,
    warm_tangent: Fix128,
}

impl Contact {
    fn new(position: Vec2Fix, normal: Vec2Fix, penetration: Fix128) -> Self {
        Self {
            position,
            normal,
            penetration,
            ..Self::default()
        }
    }

    /// Accumulated normal impulse
    #[inline]
    pub fn normal_impulse(&self) -> Fix128 {
        self.normal_impulse
    }

    /// Accumulated friction impulse
    #[inline]
    pub fn tangent_impulse(&self) -> Fix128 {
        self.tangent_impulse
    }

    /// Contact position relative to body A at solve time
    #[inline]
    pub fn anchor(&self) -> Vec2Fix {
        self.anchor
    }

    fn pre_step(
        &mut self,
        a: &Body,
        b: &Body,
        restitution: Fix128,
        seed: Option<&CachedImpulse>,
        warm_start_factor: Fix128,
    ) {
        self.to_a = self.position - a.position();
        self.to_b = self.position - b.position();
        self.to_a_left = self.to_a.left();
        self.to_b_left = self.to_b.left();
        self.anchor = self.to_a.inv_rotate_by(a.facing());

        self.normal_mass = Fix128::ONE / self.k_scalar(a, b, self.normal);
        self.tangent_mass = Fix128::ONE / self.k_scalar(a, b, self.normal.left());

        self.bias = bias_distance(self.penetration);
        self.bias_impulse = Fix128::ZERO;
        self.bounce = restitution * self.normal.dot(self.relative_velocity(a, b));

        self.normal_impulse = Fix128::ZERO;
        self.tangent_impulse = Fix128::ZERO;
        let (warm_normal, warm_tangent) = match seed {
            Some(s) => (
                s.normal_impulse * warm_start_factor,
                s.tangent_impulse * warm_start_factor,
            ),
            None => (Fix128::ZERO, Fix128::ZERO),
        };
        self.warm_normal = warm_normal;
        self.warm_tangent = warm_tangent;
    }

    fn solve_cached(&mut self, a: &mut Body, b: &mut Body) {
        self.normal_impulse += self.warm_normal;
        self.tangent_impulse += self.warm_tangent;
        self.apply_contact_impulse(a, b, self.warm_normal, self.warm_tangent);
    }

    fn solve(&mut self, a: &mut Body, b: &mut Body, friction: Fix128, elasticity: Fix128) {
        // Position correction
        let bias_a = a.bias_velocity() + self.to_a_left * a.bias_rotation();
        let bias_b = b.bias_velocity() + self.to_b_left * b.bias_rotation();
        let vbn = (bias_a - bias_b).dot(self.normal);

        let jbn = (self.normal_mass * (vbn - self.bias)).max(-self.bias_impulse);
        self.bias_impulse += jbn;
        let bias = self.normal * jbn;
        a.apply_bias(-bias, self.to_a);
        b.apply_bias(bias, self.to_b);

        // Normal impulse
        let vr = self.relative_velocity(a, b);
        let vrn = vr.dot(self.normal);
        let jn = (self.normal_mass * (vrn + self.bounce * elasticity)).max(-self.normal_impulse);
        self.normal_impulse += jn;

        // Friction, bounded by the accumulated normal impulse
        let vrt = vr.dot(self.normal.left());
        let limit = friction * self.normal_impulse;
        let accumulated = (self.tangent_impulse + vrt * self.tangent_mass)
            .max(-limit)
            .min(limit);
        let jt = accumulated - self.tangent_impulse;
        self.tangent_impulse = accumulated;

        self.apply_contact_impulse(a, b, jn, jt);
    }

    #[inline]
    fn apply_contact_impulse(&self, a: &mut Body, b: &mut Body, jn: Fix128, jt: Fix128) {
        let impulse = self.normal * jn + self.normal.left() * jt;
        a.apply_impulse(-impulse, self.to_a);
        b.apply_impulse(impulse, self.to_b);
    }

    #[inline]
    fn relative_velocity(&self, a: &Body, b: &Body) -> Vec2Fix {
        (a.linear_velocity() + self.to_a_left * a.angular_velocity())
            - (b.linear_velocity() + self.to_b_left * b.angular_velocity())
    }

    #[inline]
    fn k_scalar(&self, a: &Body, b: &Body, normal: Vec2Fix) -> Fix128 {
        a.inv_mass()
            + b.inv_mass()
            + a.inv_inertia() * self.to_a.cross(normal).square()
            + b.inv_inertia() * self.to_b.cross(normal).square()
    }
}

/// Positional correction for a penetration depth: a fraction of the overlap
/// beyond the allowed slop.
#[inline]
pub fn bias_distance(penetration: Fix128) -> Fix128 {
    RESOLVE_RATE * (penetration + RESOLVE_SLOP).min(Fix128::ZERO)
}

// ============================================================================
// Manifold
// ============================================================================

/// Identity of a shape pair across ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    /// Body owning the first shape
    pub body_a: BodyHandle,
    /// Body owning the second shape
    pub body_b: BodyHandle,
    /// Index of the first shape within its body
    pub shape_a: usize,
    /// Index of the second shape within its body
    pub shape_b: usize,
}

/// Contact constraints for one shape pair during one tick.
#[derive(Clone, Debug)]
pub struct Manifold {
    key: PairKey,
    friction: Fix128,
    restitution: Fix128,
    contacts: [Contact; MAX_CONTACTS],
    len: usize,
}

impl Manifold {
    /// Manifold from a narrow-phase result.
    pub fn new(key: PairKey, set: &ContactSet, friction: Fix128, restitution: Fix128) -> Self {
        let mut contacts = [Contact::default(); MAX_CONTACTS];
        for (slot, point) in contacts.iter_mut().zip(set.as_slice()) {
            *slot = Contact::new(point.position, point.normal, point.penetration);
        }
        Self {
            key,
            friction,
            restitution,
            contacts,
            len: set.len(),
        }
    }

    /// Shape pair identity
    #[inline]
    pub fn key(&self) -> PairKey {
        self.key
    }

    /// First body (normal origin)
    #[inline]
    pub fn body_a(&self) -> BodyHandle {
        self.key.body_a
    }

    /// Second body
    #[inline]
    pub fn body_b(&self) -> BodyHandle {
        self.key.body_b
    }

    /// Combined friction
    #[inline]
    pub fn friction(&self) -> Fix128 {
        self.friction
    }

    /// Combined restitution
    #[inline]
    pub fn restitution(&self) -> Fix128 {
        self.restitution
    }

    /// Active contacts
    #[inline]
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts[..self.len]
    }

    /// Deepest overlap among the contacts (most negative penetration).
    pub fn deepest_penetration(&self) -> Fix128 {
        self.contacts()
            .iter()
            .map(|c| c.penetration)
            .min()
            .unwrap_or(Fix128::ZERO)
    }

    /// Compute anchors, effective masses and restitution bias; seed warm
    /// start impulses from the previous tick.
    pub fn pre_step(
        &mut self,
        a: &Body,
        b: &Body,
        cached: Option<&[CachedImpulse]>,
        warm_start_factor: Fix128,
    ) {
        let restitution = self.restitution;
        for contact in self.contacts[..self.len].iter_mut() {
            let anchor = (contact.position - a.position()).inv_rotate_by(a.facing());
            let seed = cached.and_then(|c| match_anchor(c, anchor));
            contact.pre_step(a, b, restitution, seed, warm_start_factor);
        }
    }

    /// One sequential-impulse pass. `elasticity` scales the restitution bias.
    pub fn solve(&mut self, a: &mut Body, b: &mut Body, elasticity: Fix128) {
        let friction = self.friction;
        for contact in self.contacts[..self.len].iter_mut() {
            contact.solve(a, b, friction, elasticity);
        }
    }

    /// Apply the warm-start impulses seeded in [`Manifold::pre_step`].
    pub fn solve_cached(&mut self, a: &mut Body, b: &mut Body) {
        for contact in self.contacts[..self.len].iter_mut() {
            contact.solve_cached(a, b);
        }
    }
}

// ============================================================================
// Contact Cache
// ============================================================================

/// Final impulses of one contact, remembered for the next tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CachedImpulse {
    /// Body-A-local contact position
    pub anchor: Vec2Fix,
    /// Accumulated normal impulse
    pub normal_impulse: Fix128,
    /// Accumulated friction impulse
    pub tangent_impulse: Fix128,
}

#[derive(Clone, Copy, Debug)]
struct CacheEntry {
    key: PairKey,
    impulses: [CachedImpulse; MAX_CONTACTS],
    len: usize,
}

/// Impulses from the previous tick, sorted by pair key.
#[derive(Clone, Debug, Default)]
pub struct ContactCache {
    entries: Vec<CacheEntry>,
}

impl ContactCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cache contents with this tick's solved manifolds.
    pub fn store(&mut self, manifolds: &[Manifold]) {
        self.entries.clear();
        for m in manifolds {
            let mut impulses = [CachedImpulse::default(); MAX_CONTACTS];
            for (slot, c) in impulses.iter_mut().zip(m.contacts()) {
                *slot = CachedImpulse {
                    anchor: c.anchor,
                    normal_impulse: c.normal_impulse,
                    tangent_impulse: c.tangent_impulse,
                };
            }
            self.entries.push(CacheEntry {
                key: m.key,
                impulses,
                len: m.len,
            });
        }
        self.entries.sort_unstable_by_key(|e| e.key);
    }

    /// Cached impulses for a shape pair.
    pub fn lookup(&self, key: &PairKey) -> Option<&[CachedImpulse]> {
        self.entries
            .binary_search_by(|e| e.key.cmp(key))
            .ok()
            .map(|i| &self.entries[i].impulses[..self.entries[i].len])
    }

    /// Forget every pair involving `body`.
    pub fn remove_body(&mut self, body: BodyHandle) {
        self.entries
            .retain(|e| e.key.body_a != body && e.key.body_b != body);
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached pairs
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Nothing cached
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn match_anchor(cached: &[CachedImpulse], anchor: Vec2Fix) -> Option<&CachedImpulse> {
    let limit = CONTACT_MATCH_DISTANCE * CONTACT_MATCH_DISTANCE;
    cached
        .iter()
        .find(|c| c.anchor.distance_squared(anchor) <= limit)
}

// ============================================================================
// Tests
// ============================================================================
