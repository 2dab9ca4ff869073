//! Shape Materials with Pair-wise Combine Rules
//!
//! Density, friction and restitution live on each shape. When two shapes
//! touch, their friction and restitution are merged by a [`CombineRule`]
//! chosen on the world (geometric mean by default).

use crate::config::{DEFAULT_DENSITY, DEFAULT_FRICTION, DEFAULT_RESTITUTION};
use crate::math::Fix128;

/// Combine rule for friction/restitution when two shapes interact
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CombineRule {
    /// `sqrt(a * b)`
    #[default]
    GeometricMean,
    /// Average of two values
    Average,
    /// Minimum of two values
    Min,
    /// Maximum of two values
    Max,
    /// Multiply two values
    Multiply,
}

impl CombineRule {
    /// Apply the combine rule to two values
    #[inline]
    pub fn apply(&self, a: Fix128, b: Fix128) -> Fix128 {
        match self {
            CombineRule::GeometricMean => (a * b).sqrt(),
            CombineRule::Average => (a + b).half(),
            CombineRule::Min => a.min(b),
            CombineRule::Max => a.max(b),
            CombineRule::Multiply => a * b,
        }
    }
}

/// Surface and mass properties of one shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShapeMaterial {
    /// Mass per unit area (before `AREA_MASS_RATIO`). Zero-density shapes
    /// collide but add no mass.
    pub density: Fix128,
    /// Friction coefficient
    pub friction: Fix128,
    /// Restitution (bounciness)
    pub restitution: Fix128,
}

impl Default for ShapeMaterial {
    fn default() -> Self {
        Self {
            density: DEFAULT_DENSITY,
            friction: DEFAULT_FRICTION,
            restitution: DEFAULT_RESTITUTION,
        }
    }
}

impl ShapeMaterial {
    /// Material with the given density and default surface properties.
    #[must_use]
    pub fn with_density(density: Fix128) -> Self {
        Self {
            density,
            ..Self::default()
        }
    }
}
