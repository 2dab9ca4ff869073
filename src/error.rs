//! Physics Error Types
//!
//! Unified error type for the engine. Contract violations (stale handles,
//! double initialization, bodies too light to simulate) are reported as
//! `Result<T, PhysicsError>` and leave the world untouched.
//!
//! Author: Moroya Sakamoto

use core::fmt;

/// Unified error type for physics operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhysicsError {
    /// A handle refers to a slot that was released or reused.
    StaleHandle {
        /// Slot index carried by the handle
        index: u32,
        /// Generation carried by the handle
        generation: u32,
    },
    /// A pool slot was released twice.
    DoubleRelease {
        /// Slot index
        index: u32,
    },
    /// A body was initialized a second time.
    AlreadyInitialized,
    /// The body is not currently part of the world's simulation.
    NotInWorld,
    /// The body is already part of the world's simulation.
    AlreadyInWorld,
    /// A body was created without shapes.
    EmptyShapeList,
    /// Shape geometry is not usable (too few vertices, non-positive radius).
    InvalidShape {
        /// Human-readable description of the problem
        reason: &'static str,
    },
    /// Total mass of a dynamic body is below `MINIMUM_DYNAMIC_MASS`.
    MassTooSmall,
    /// A dynamic body's shapes yield zero rotational inertia.
    ZeroInertia,
    /// A zero-length direction or normal was provided where a unit vector is required.
    ZeroLengthVector {
        /// Context describing where the zero-length vector was encountered
        context: &'static str,
    },
    /// Invalid configuration parameter.
    InvalidConfiguration {
        /// Description of the invalid configuration
        reason: &'static str,
    },
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleHandle { index, generation } => {
                write!(f, "stale handle (index={index}, generation={generation})")
            }
            Self::DoubleRelease { index } => write!(f, "slot {index} released twice"),
            Self::AlreadyInitialized => write!(f, "body already initialized"),
            Self::NotInWorld => write!(f, "body is not in the world"),
            Self::AlreadyInWorld => write!(f, "body is already in the world"),
            Self::EmptyShapeList => write!(f, "body requires at least one shape"),
            Self::InvalidShape { reason } => write!(f, "invalid shape: {reason}"),
            Self::MassTooSmall => write!(f, "mass of dynamic body too small"),
            Self::ZeroInertia => write!(f, "dynamic body has zero inertia"),
            Self::ZeroLengthVector { context } => {
                write!(f, "zero-length vector in {context}")
            }
            Self::InvalidConfiguration { reason } => {
                write!(f, "invalid configuration: {reason}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PhysicsError {}

// ============================================================================
// Tests
// ============================================================================
