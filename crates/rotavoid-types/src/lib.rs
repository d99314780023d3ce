//! `rotavoid-types` – shared vocabulary of the RotAvoid workspace.
//!
//! Holds the pieces every other crate agrees on: the reference [`Frame`] a
//! position is expressed in, the [`AvoidanceError`] taxonomy, and the tunable
//! parameter structs in [`config`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config;

pub use config::{ModulationConfig, ProjectionConfig, RepulsionConfig};

/// Reference frame in which a position or direction is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frame {
    /// The world frame shared by all obstacles and the agent.
    Global,
    /// The obstacle's own frame: origin at its centre, axes along its pose.
    Local,
}

/// Failures raised by the avoidance core.
///
/// Zero velocities are not errors at the modulation level (they are returned
/// unchanged); the variants below are reserved for setups in which no
/// meaningful answer exists.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AvoidanceError {
    #[error("Degenerate direction: zero vector given for {context}")]
    DegenerateDirection { context: String },

    #[error("Degenerate velocity: cannot rotate a zero velocity")]
    DegenerateVelocity,

    #[error("Coincident points: {context}")]
    CoincidentPoint { context: String },

    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Numeric singularity in {context}")]
    NumericSingularity { context: String },
}

impl AvoidanceError {
    /// Shorthand for [`AvoidanceError::DegenerateDirection`].
    pub fn degenerate(context: impl Into<String>) -> Self {
        Self::DegenerateDirection {
            context: context.into(),
        }
    }

    /// Shorthand for [`AvoidanceError::CoincidentPoint`].
    pub fn coincident(context: impl Into<String>) -> Self {
        Self::CoincidentPoint {
            context: context.into(),
        }
    }

    /// Shorthand for [`AvoidanceError::NumericSingularity`].
    pub fn singular(context: impl Into<String>) -> Self {
        Self::NumericSingularity {
            context: context.into(),
        }
    }

    /// Return `Ok(())` when both dimensions agree.
    pub fn check_dimension(expected: usize, found: usize) -> Result<(), Self> {
        if expected == found {
            Ok(())
        } else {
            Err(Self::DimensionMismatch { expected, found })
        }
    }
}
