//! Continuous Collision Detection Pass
//!
//! Runs after integration. Every dynamic body that [requires
//! CCD](crate::body::Body::requires_ccd) sweeps its tick displacement
//! against the static bodies its swept bounds touch. The earliest impact
//! wins: the body is rewound to the time of impact and its velocity along
//! the contact normal is removed, so it stops at the obstacle's surface
//! instead of tunneling through it.
//!
//! Candidates whose bounds already overlapped the body at the start of the
//! tick are left to the discrete solver; sweeping them would report an
//! impact at time zero and pin a sliding body in place.
//!
//! Author: Moroya Sakamoto

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::body::{Body, BodyHandle, SweepResult};
use crate::broadphase::BroadPhase;
use crate::pool::Pool;

/// Earliest impact of `body` against the static candidates in `index`.
pub fn earliest_impact<B: BroadPhase>(
    body: &Body,
    bodies: &Pool<BodyHandle, Body>,
    index: &B,
    scratch: &mut Vec<BodyHandle>,
) -> SweepResult {
    let delta = body.position() - body.previous_position();
    let start = body.aabb().translated(-delta);

    scratch.clear();
    index.query_overlap(&start.swept(delta), scratch);

    let mut best = SweepResult::MISS;
    for other in scratch.iter().filter_map(|h| bodies.get(*h)) {
        if !body.can_collide(other) || !other.can_collide(body) {
            continue;
        }
        if start.intersects(&other.aabb()) {
            continue;
        }
        let sweep = body.sweep_test(Some(other));
        if sweep.time_of_impact < best.time_of_impact {
            best = sweep;
        }
    }
    best
}

/// Sweep and resolve every CCD body in `dynamic`. Returns the number of
/// bodies that were rewound.
pub fn resolve<B: BroadPhase>(
    dynamic: &[BodyHandle],
    bodies: &mut Pool<BodyHandle, Body>,
    index: &B,
    scratch: &mut Vec<BodyHandle>,
) -> usize {
    let mut hits = 0;
    for &handle in dynamic {
        let sweep = match bodies.get(handle) {
            Some(body) if body.requires_ccd() => earliest_impact(body, bodies, index, scratch),
            _ => continue,
        };
        if !sweep.is_hit() {
            continue;
        }
        if let Some(body) = bodies.get_mut(handle) {
            body.rewind(sweep.time_of_impact);
            if let Some(normal) = sweep.contact_normal {
                body.cancel_approach(normal);
            }
            log::trace!(
                "ccd: body {:?} rewound to toi {:?}",
                handle,
                sweep.time_of_impact
            );
            hits += 1;
        }
    }
    hits
}

// ============================================================================
// Tests
// ============================================================================
