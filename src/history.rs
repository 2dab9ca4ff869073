//! Rollback History
//!
//! Fixed-capacity ring buffer of past body states, one per dynamic body.
//! Each tick stores the pre-integration pose so lag-compensated queries can
//! ask "where was this body N ticks ago" on the server.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::aabb::Aabb;
use crate::math::Vec2Fix;
use crate::raycast::RayCast;

// ============================================================================
// HistoryRecord
// ============================================================================

/// Snapshot of a body's pose and bounds at one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HistoryRecord {
    /// World-space bounds
    pub aabb: Aabb,
    /// Body origin
    pub position: Vec2Fix,
    /// Unit facing `(cos θ, sin θ)`
    pub facing: Vec2Fix,
}

impl Default for HistoryRecord {
    fn default() -> Self {
        Self {
            aabb: Aabb::default(),
            position: Vec2Fix::ZERO,
            facing: Vec2Fix::UNIT_X,
        }
    }
}

impl HistoryRecord {
    /// World point into this record's body space.
    #[inline]
    pub fn world_to_body_point(&self, point: Vec2Fix) -> Vec2Fix {
        (point - self.position).inv_rotate_by(self.facing)
    }

    /// Body point into world space.
    #[inline]
    pub fn body_to_world_point(&self, point: Vec2Fix) -> Vec2Fix {
        self.position + point.rotate_by(self.facing)
    }

    /// World direction into body space.
    #[inline]
    pub fn world_to_body_direction(&self, direction: Vec2Fix) -> Vec2Fix {
        direction.inv_rotate_by(self.facing)
    }

    /// Body direction into world space.
    #[inline]
    pub fn body_to_world_direction(&self, direction: Vec2Fix) -> Vec2Fix {
        direction.rotate_by(self.facing)
    }

    /// World ray into body space. Distance is preserved.
    pub fn world_to_body_ray(&self, ray: &RayCast) -> RayCast {
        RayCast {
            origin: self.world_to_body_point(ray.origin),
            direction: self.world_to_body_direction(ray.direction),
            distance: ray.distance,
        }
    }
}

// ============================================================================
// HistoryLookup
// ============================================================================

/// Result of asking for a past state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryLookup {
    /// The requested tick was available
    Exact(HistoryRecord),
    /// The request was older than what is retained (or no history exists);
    /// the closest available state is returned instead
    Clamped(HistoryRecord),
}

impl HistoryLookup {
    /// The record, regardless of clamping.
    #[inline]
    pub fn record(&self) -> HistoryRecord {
        match self {
            Self::Exact(r) | Self::Clamped(r) => *r,
        }
    }

    /// The requested tick was served exactly.
    #[inline]
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact(_))
    }
}

// ============================================================================
// HistoryBuffer
// ============================================================================

/// Ring buffer of the most recent `capacity` records.
#[derive(Clone, Debug, Default)]
pub struct HistoryBuffer {
    data: Vec<HistoryRecord>,
    capacity: usize,
    /// Slot the next record is written to
    head: usize,
}

impl HistoryBuffer {
    /// Buffer holding up to `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    /// Forget all records and set a new capacity, keeping the allocation
    /// when it is large enough.
    pub fn reset(&mut self, capacity: usize) {
        self.data.clear();
        self.data.reserve(capacity);
        self.capacity = capacity;
        self.head = 0;
    }

    /// Maximum records retained
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records currently retained
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Nothing stored yet
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Push a record, evicting the oldest when full.
    pub fn store(&mut self, record: HistoryRecord) {
        if self.capacity == 0 {
            return;
        }
        if self.data.len() < self.capacity {
            self.data.push(record);
        } else {
            self.data[self.head] = record;
        }
        self.head = (self.head + 1) % self.capacity;
    }

    /// Record `num_behind` entries before the newest (0 = newest).
    ///
    /// Requests past the oldest record are clamped to it. An empty buffer
    /// yields `None`.
    pub fn try_get(&self, num_behind: usize) -> Option<HistoryLookup> {
        let len = self.data.len();
        if len == 0 {
            return None;
        }
        let clamped = num_behind.min(len - 1);
        let newest = (self.head + len - 1) % len;
        let index = (newest + len - clamped) % len;
        let record = self.data[index];
        Some(if clamped == num_behind {
            HistoryLookup::Exact(record)
        } else {
            HistoryLookup::Clamped(record)
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
