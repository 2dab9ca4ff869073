//! Simulation Constants and World Configuration
//!
//! Every tunable the engine reads lives here, expressed as [`Fix128`] so the
//! values are identical on every peer. [`WorldConfig`] bundles the per-world
//! settings and validates them before a world is built.

use crate::error::PhysicsError;
use crate::material::CombineRule;
use crate::math::Fix128;

// ============================================================================
// Defaults
// ============================================================================

/// Default tick length (1/50 s)
pub const DEFAULT_DELTA_TIME: Fix128 = Fix128::from_ratio(1, 50);

/// Default solver iterations per tick
pub const DEFAULT_ITERATION_COUNT: usize = 20;

/// Default per-tick velocity damping multiplier
pub const DEFAULT_DAMPING: Fix128 = Fix128::from_ratio(999, 1000);

/// Default shape density
pub const DEFAULT_DENSITY: Fix128 = Fix128::ONE;

/// Default shape restitution
pub const DEFAULT_RESTITUTION: Fix128 = Fix128::from_ratio(1, 2);

/// Default shape friction
pub const DEFAULT_FRICTION: Fix128 = Fix128::from_ratio(4, 5);

/// Converts shape area times density into mass
pub const AREA_MASS_RATIO: Fix128 = Fix128::from_ratio(1, 100);

/// Dynamic bodies lighter than this are rejected
pub const MINIMUM_DYNAMIC_MASS: Fix128 = Fix128::from_ratio(1, 100_000);

/// Penetration allowed before positional correction kicks in
pub const RESOLVE_SLOP: Fix128 = Fix128::from_ratio(1, 100);

/// Fraction of penetration corrected per tick (Baumgarte factor)
pub const RESOLVE_RATE: Fix128 = Fix128::from_ratio(1, 10);

/// Default linear speed at which CCD engages
pub const CCD_VELOCITY_THRESHOLD: Fix128 = Fix128::from_int(5);

/// Squared motion below which a CCD sweep is skipped
pub const CCD_LINEAR_SLOP: Fix128 = Fix128::from_ratio(1, 200);

/// Angular speed at which CCD engages (2 degrees, in radians)
pub const CCD_ANGULAR_SLOP: Fix128 = Fix128::from_raw(0, 0x08EF_A351_294E_9C8A);

/// Contact points per manifold
pub const MAX_CONTACTS: usize = 3;

/// Margin added around static leaves in the tree broad-phase
pub const AABB_FAT_MARGIN: Fix128 = Fix128::from_ratio(1, 2);

/// Default scale applied to last tick's impulses when warm starting
pub const DEFAULT_WARM_START_FACTOR: Fix128 = Fix128::from_ratio(4, 5);

/// Anchor distance under which a contact matches last tick's contact
pub const CONTACT_MATCH_DISTANCE: Fix128 = Fix128::from_ratio(1, 100);

// ============================================================================
// WorldConfig
// ============================================================================

/// Per-world simulation settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldConfig {
    /// Tick length in seconds
    pub delta_time: Fix128,
    /// Solver iterations per tick, split 1/3 biased and 2/3 unbiased
    pub iteration_count: usize,
    /// Multiplicative velocity damping per tick, in (0, 1]
    pub damping: Fix128,
    /// Ticks of rollback history per dynamic body (0 disables history)
    pub history_length: usize,
    /// Scale on cached impulses for warm starting, in [0, 1]
    pub warm_start_factor: Fix128,
    /// How two shapes' friction values combine
    pub friction_combine: CombineRule,
    /// How two shapes' restitution values combine
    pub restitution_combine: CombineRule,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            delta_time: DEFAULT_DELTA_TIME,
            iteration_count: DEFAULT_ITERATION_COUNT,
            damping: DEFAULT_DAMPING,
            history_length: 0,
            warm_start_factor: DEFAULT_WARM_START_FACTOR,
            friction_combine: CombineRule::GeometricMean,
            restitution_combine: CombineRule::GeometricMean,
        }
    }
}

impl WorldConfig {
    /// Config with rollback history enabled.
    #[must_use]
    pub fn with_history(history_length: usize) -> Self {
        Self {
            history_length,
            ..Self::default()
        }
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        validate_delta_time(self.delta_time)?;
        validate_iteration_count(self.iteration_count)?;
        validate_damping(self.damping)?;
        if self.warm_start_factor.is_negative() || self.warm_start_factor > Fix128::ONE {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "warm_start_factor must be in [0, 1]",
            });
        }
        Ok(())
    }
}

pub(crate) fn validate_delta_time(delta_time: Fix128) -> Result<(), PhysicsError> {
    if !delta_time.is_positive() {
        return Err(PhysicsError::InvalidConfiguration {
            reason: "delta_time must be > 0",
        });
    }
    Ok(())
}

pub(crate) fn validate_iteration_count(iteration_count: usize) -> Result<(), PhysicsError> {
    if iteration_count == 0 {
        return Err(PhysicsError::InvalidConfiguration {
            reason: "iteration_count must be > 0",
        });
    }
    Ok(())
}

pub(crate) fn validate_damping(damping: Fix128) -> Result<(), PhysicsError> {
    if !damping.is_positive() || damping > Fix128::ONE {
        return Err(PhysicsError::InvalidConfiguration {
            reason: "damping must be in (0, 1]",
        });
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
