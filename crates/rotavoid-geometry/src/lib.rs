//! `rotavoid-geometry` – geometric primitives of the avoidance core.
//!
//! # Modules
//!
//! - [`linalg`] – overflow-safe norms, normalisation and orthonormal bases on
//!   `ndarray` vectors.
//! - [`vector_rotation`] – [`VectorRotation`][vector_rotation::VectorRotation]:
//!   planar rotation between two directions in n-dimensional space, with
//!   partial rotation, inversion and chaining via
//!   [`VectorRotationSequence`][vector_rotation::VectorRotationSequence].
//! - [`pose`] – [`Pose`][pose::Pose]: position and orientation of an obstacle
//!   frame, with global ↔ local transforms.

pub mod linalg;
pub mod pose;
pub mod vector_rotation;

pub use pose::Pose;
pub use vector_rotation::{directional_weighted_sum, VectorRotation, VectorRotationSequence};
