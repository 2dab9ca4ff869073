//! Generational Object Pools
//!
//! Bodies live in a [`Pool`]: a generational slot map of live entries plus a
//! bin of reset spares. Allocation reuses a spare (keeping its heap buffers)
//! before building a fresh value, so a world in steady state does not
//! allocate. Handles carry a generation, so a handle to a released entry
//! fails to resolve instead of aliasing whatever reuses the slot.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use slotmap::{Key, SlotMap};

use crate::error::PhysicsError;

/// Objects that can be recycled by a [`Pool`].
pub trait Poolable: Default {
    /// Return the object to its freshly-constructed state, keeping any heap
    /// capacity it owns.
    fn reset(&mut self);
}

/// Split a slot-map key into `(index, generation)` for diagnostics.
pub(crate) fn key_parts<K: Key>(key: K) -> (u32, u32) {
    let ffi = key.data().as_ffi();
    (ffi as u32, (ffi >> 32) as u32)
}

/// Error for a handle that no longer resolves.
pub(crate) fn stale<K: Key>(key: K) -> PhysicsError {
    let (index, generation) = key_parts(key);
    PhysicsError::StaleHandle { index, generation }
}

/// Generational pool of recyclable objects.
pub struct Pool<K: Key, T: Poolable> {
    live: SlotMap<K, T>,
    spare: Vec<T>,
}

impl<K: Key, T: Poolable> Default for Pool<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key, T: Poolable> Pool<K, T> {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            live: SlotMap::with_key(),
            spare: Vec::new(),
        }
    }

    /// Create a pool with room for `capacity` live entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            live: SlotMap::with_capacity_and_key(capacity),
            spare: Vec::new(),
        }
    }

    /// Take an object from the pool, reusing a spare when one exists.
    pub fn allocate(&mut self) -> K {
        let value = self.spare.pop().unwrap_or_default();
        self.live.insert(value)
    }

    /// Reset the object and keep it for reuse. The handle stops resolving.
    pub fn release(&mut self, key: K) -> Result<(), PhysicsError> {
        match self.live.remove(key) {
            Some(mut value) => {
                value.reset();
                self.spare.push(value);
                Ok(())
            }
            None => {
                let (index, _) = key_parts(key);
                Err(PhysicsError::DoubleRelease { index })
            }
        }
    }

    /// The handle refers to a live object.
    #[inline]
    pub fn contains(&self, key: K) -> bool {
        self.live.contains_key(key)
    }

    /// Shared access to a live object.
    #[inline]
    pub fn get(&self, key: K) -> Option<&T> {
        self.live.get(key)
    }

    /// Exclusive access to a live object.
    #[inline]
    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.live.get_mut(key)
    }

    /// Exclusive access to two distinct live objects.
    #[inline]
    pub fn get2_mut(&mut self, a: K, b: K) -> Option<(&mut T, &mut T)> {
        let [x, y] = self.live.get_disjoint_mut([a, b])?;
        Some((x, y))
    }

    /// Like [`Pool::get`] but with a stale-handle error.
    #[inline]
    pub fn try_get(&self, key: K) -> Result<&T, PhysicsError> {
        self.live.get(key).ok_or_else(|| stale(key))
    }

    /// Like [`Pool::get_mut`] but with a stale-handle error.
    #[inline]
    pub fn try_get_mut(&mut self, key: K) -> Result<&mut T, PhysicsError> {
        self.live.get_mut(key).ok_or_else(|| stale(key))
    }

    /// Number of live objects.
    #[inline]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// No live objects.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Number of reset objects waiting for reuse.
    #[inline]
    pub fn spare_len(&self) -> usize {
        self.spare.len()
    }

    /// Iterate live objects in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.live.iter()
    }
}

// ============================================================================
// Tests
// ============================================================================
