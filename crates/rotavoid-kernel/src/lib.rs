//! `rotavoid-kernel` – Rotational obstacle avoidance
//!
//! The core of RotAvoid. Given a position, a nominal velocity and a set of
//! obstacles, it returns a velocity of the same speed that flows around the
//! obstacles instead of through them.
//!
//! # Modules
//!
//! - [`weights`] – [`compute_weights`][weights::compute_weights] and
//!   [`inverse_gamma_weight`][weights::inverse_gamma_weight]: how much each
//!   obstacle matters, and how strongly one obstacle bends the velocity.
//! - [`rotational`] – [`compute_avoidance_rotation`][rotational::compute_avoidance_rotation]:
//!   the rotation a single obstacle applies, towards the
//!   [`tangent_direction`][rotational::tangent_direction] on its surface.
//! - [`modulation`] – [`modulate`][modulation::modulate]: blends the
//!   per-obstacle rotations by directional weighted sum, handles moving
//!   obstacles and optional surface repulsion.
//! - [`convergence`] – [`ConvergenceProvider`][convergence::ConvergenceProvider]:
//!   the per-obstacle direction the avoidance converges to, either straight
//!   from the nominal field or from the projected dynamics.
//! - [`projected`] – [`ProjectedRotationDynamics`][projected::ProjectedRotationDynamics]:
//!   deflate / fold / inflate remapping of the space around one obstacle.

pub mod convergence;
pub mod modulation;
pub mod projected;
pub mod rotational;
pub mod weights;

pub use convergence::{ConvergenceProvider, FieldConvergence, ProjectedConvergence};
pub use modulation::{modulate, modulate_with_convergence};
pub use projected::ProjectedRotationDynamics;
pub use rotational::{compute_avoidance_rotation, tangent_direction};
pub use weights::{compute_weights, inverse_gamma_weight};
