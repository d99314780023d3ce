//! Single-obstacle rotational avoidance.
//!
//! The velocity is never scaled down towards a surface. Instead its
//! direction is turned towards a *tangent* direction built from the local
//! normal and the convergence direction, by a fraction that grows to one as
//! the agent reaches the surface.
//!
//! ```text
//!            n  (outward normal)
//!            ▲
//!            │   ╱ c  (convergence direction, dot(c, n) ≥ 0 → t = c)
//!            │  ╱
//!   ─────────┼─────────  surface, gamma = 1
//!  (obstacle)
//! ```
//!
//! When `c` points into the obstacle the tangent is the direction exactly
//! `π/2` away from `n`, on `c`'s side of the plane spanned by both.

use std::f64::consts::FRAC_PI_2;

use ndarray::{Array1, ArrayView1};
use rotavoid_geometry::{VectorRotation, linalg};
use rotavoid_scene::Obstacle;
use rotavoid_types::{AvoidanceError, Frame, ModulationConfig};
use tracing::trace;

use crate::weights::inverse_gamma_weight;

/// Unit direction the velocity should follow on the surface.
///
/// - `dot(c, n) >= 0`: the convergence direction itself;
/// - otherwise: `n` rotated towards `c` by exactly `π/2`. For `c = -n` the
///   rotation plane comes from the deterministic orthogonal tie-break.
///
/// The result never points into the obstacle: `dot(t, n) >= 0`.
///
/// # Errors
///
/// [`AvoidanceError::DegenerateDirection`] if either input is zero, and
/// [`AvoidanceError::DimensionMismatch`] for inputs of different sizes.
pub fn tangent_direction(
    normal: ArrayView1<f64>,
    convergence: ArrayView1<f64>,
) -> Result<Array1<f64>, AvoidanceError> {
    AvoidanceError::check_dimension(normal.len(), convergence.len())?;
    let normal =
        linalg::normalized(normal).ok_or_else(|| AvoidanceError::degenerate("surface normal"))?;
    let convergence = linalg::normalized(convergence)
        .ok_or_else(|| AvoidanceError::degenerate("convergence direction"))?;

    if normal.dot(&convergence) >= 0.0 {
        return Ok(convergence);
    }

    let rotation = VectorRotation::from_directions(normal.view(), convergence.view())?;
    // Angle lies in (π/2, π] here, never zero.
    Ok(rotation.rotate(normal.view(), FRAC_PI_2 / rotation.rotation_angle()))
}

/// Rotation that turns `velocity` into its avoiding direction for one
/// obstacle.
///
/// The full rotation goes from the velocity direction to
/// [`tangent_direction`]; its angle is scaled by
/// [`inverse_gamma_weight`] so the effect vanishes far away and is complete
/// on the surface. A zero `convergence_direction` falls back to the velocity
/// direction.
///
/// # Errors
///
/// - [`AvoidanceError::DegenerateVelocity`] for a zero velocity.
/// - [`AvoidanceError::DimensionMismatch`] for inconsistent dimensions.
pub fn compute_avoidance_rotation(
    position: ArrayView1<f64>,
    velocity: ArrayView1<f64>,
    obstacle: &dyn Obstacle,
    convergence_direction: ArrayView1<f64>,
    config: &ModulationConfig,
) -> Result<VectorRotation, AvoidanceError> {
    AvoidanceError::check_dimension(obstacle.dimension(), position.len())?;
    AvoidanceError::check_dimension(position.len(), velocity.len())?;
    AvoidanceError::check_dimension(position.len(), convergence_direction.len())?;

    let velocity_direction =
        linalg::normalized(velocity).ok_or(AvoidanceError::DegenerateVelocity)?;

    let gamma = obstacle.gamma(position, Frame::Global);
    let normal = obstacle.normal_direction(position, Frame::Global);

    let convergence = match linalg::normalized(convergence_direction) {
        Some(direction) => direction,
        None => velocity_direction.clone(),
    };
    let tangent = tangent_direction(normal.view(), convergence.view())?;

    let weight = inverse_gamma_weight(gamma, config.gamma_weight_power);
    let rotation = VectorRotation::from_directions(velocity_direction.view(), tangent.view())?;
    let angle = rotation.rotation_angle() * weight;
    trace!(gamma, weight, angle, "single obstacle rotation");

    Ok(rotation.with_rotation_angle(angle))
}
