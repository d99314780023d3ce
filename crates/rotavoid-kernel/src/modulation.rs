//! Multi-obstacle rotational modulation.
//!
//! Entry point of the avoidance core. Each nearby obstacle proposes a
//! rotation of the velocity direction (see [`crate::rotational`]); the
//! proposals are blended by a directional weighted sum around the current
//! velocity direction and the result is rescaled to the original speed.
//!
//! # Pipeline
//!
//! | Step | What happens                                                     |
//! |------|------------------------------------------------------------------|
//! | 1    | no obstacle or zero velocity → velocity returned unchanged       |
//! | 2    | Gamma per obstacle, `gamma >= cutoff_gamma` ignored              |
//! | 3    | weighted obstacle velocity removed (moving obstacles)            |
//! | 4    | inverse-distance weights, faded out over the last decade before the cutoff |
//! | 5    | per-obstacle rotation towards the tangent                        |
//! | 6    | directional weighted sum, rescaled to the speed                  |
//! | 7    | inward components removed for every touched surface              |
//! | 8    | optional repulsion close to the surface                          |
//! | 9    | obstacle velocity added back, finiteness checked                 |
//!
//! Step 7 covers every touched obstacle at once. Each tangent only knows its
//! own obstacle, so at a concave corner the blend alone can point into both.
//!
//! # Example
//!
//! ```rust
//! use ndarray::array;
//! use rotavoid_kernel::modulation::modulate;
//! use rotavoid_scene::{Ellipse, LinearSystem, Obstacle, VelocityField};
//! use rotavoid_types::ModulationConfig;
//!
//! let circle = Ellipse::circle(array![0.0, 0.0], 1.0).unwrap();
//! let field = LinearSystem::new(array![1.5, 0.0]);
//! let obstacles: [&dyn Obstacle; 1] = [&circle];
//!
//! let position = array![-2.0, 0.1];
//! let velocity = field.evaluate(position.view());
//! let modulated = modulate(
//!     position.view(),
//!     velocity.view(),
//!     &obstacles,
//!     &field,
//!     &ModulationConfig::default(),
//! )
//! .unwrap();
//! assert!(modulated[1] > 0.0);
//! ```

use ndarray::{Array1, ArrayView1};
use rotavoid_geometry::{directional_weighted_sum, linalg};
use rotavoid_scene::{Obstacle, VelocityField};
use rotavoid_types::{AvoidanceError, Frame, ModulationConfig, RepulsionConfig};
use tracing::{debug, trace};

use crate::convergence::{ConvergenceProvider, FieldConvergence};
use crate::rotational::compute_avoidance_rotation;
use crate::weights::compute_weights;

/// Obstacles with `gamma < 1 + SURFACE_MARGIN` count as touched: the
/// modulated velocity never points into them.
pub const SURFACE_MARGIN: f64 = 1e-6;

/// The rotation weight fades from one to zero while Gamma grows from
/// `cutoff_gamma / CUTOFF_FADE_RATIO` to `cutoff_gamma`.
pub const CUTOFF_FADE_RATIO: f64 = 10.0;

/// Passes of alternating half-space projection before giving up.
const MAX_CONE_PASSES: usize = 32;

/// Relative slack on `v · n >= 0`.
const CONE_TOLERANCE: f64 = 1e-12;

/// Modulate `velocity` at `position` around `obstacles`, taking each
/// obstacle's convergence direction from `convergence_field` evaluated at
/// its reference point.
///
/// # Errors
///
/// - [`AvoidanceError::DimensionMismatch`] for inconsistent dimensions.
/// - [`AvoidanceError::NumericSingularity`] if the result is not finite.
pub fn modulate(
    position: ArrayView1<f64>,
    velocity: ArrayView1<f64>,
    obstacles: &[&dyn Obstacle],
    convergence_field: &dyn VelocityField,
    config: &ModulationConfig,
) -> Result<Array1<f64>, AvoidanceError> {
    let convergence = FieldConvergence::new(convergence_field);
    modulate_with_convergence(position, velocity, obstacles, &convergence, config)
}

/// [`modulate`] with an arbitrary [`ConvergenceProvider`].
///
/// # Errors
///
/// Same as [`modulate`], plus whatever the provider reports.
pub fn modulate_with_convergence(
    position: ArrayView1<f64>,
    velocity: ArrayView1<f64>,
    obstacles: &[&dyn Obstacle],
    convergence: &dyn ConvergenceProvider,
    config: &ModulationConfig,
) -> Result<Array1<f64>, AvoidanceError> {
    AvoidanceError::check_dimension(position.len(), velocity.len())?;
    for obstacle in obstacles {
        AvoidanceError::check_dimension(position.len(), obstacle.dimension())?;
    }

    if obstacles.is_empty() || linalg::norm(velocity) == 0.0 {
        return Ok(velocity.to_owned());
    }

    // ── Relevant obstacles ──────────────────────────────────────────────
    let gammas: Vec<f64> = obstacles
        .iter()
        .map(|obstacle| obstacle.gamma(position, Frame::Global))
        .collect();
    let relevant: Vec<usize> = (0..obstacles.len())
        .filter(|index| gammas[*index] < config.cutoff_gamma)
        .collect();
    if relevant.is_empty() {
        trace!(count = obstacles.len(), "all obstacles beyond cutoff");
        return Ok(velocity.to_owned());
    }

    let relevant_gammas: Vec<f64> = relevant.iter().map(|index| gammas[*index]).collect();
    let weights = compute_weights(&relevant_gammas, config.weight_power, 1.0);
    if weights.iter().all(|w| *w == 0.0) {
        debug!("obstacle weights vanished; velocity unchanged");
        return Ok(velocity.to_owned());
    }

    // ── Moving obstacles ────────────────────────────────────────────────
    let obstacle_velocity = weighted_obstacle_velocity(
        obstacles,
        &relevant,
        &relevant_gammas,
        &weights,
        config.obstacle_velocity_sigma,
        position.len(),
    );
    let relative_velocity = &velocity - &obstacle_velocity;
    let speed = linalg::norm(relative_velocity.view());
    if speed == 0.0 {
        return Ok(velocity.to_owned());
    }

    // ── Rotation per obstacle ───────────────────────────────────────────
    let mut rotated_directions = Vec::with_capacity(relevant.len());
    let mut rotation_weights = Vec::with_capacity(relevant.len());
    let mut rotated = false;
    for (slot, index) in relevant.iter().enumerate() {
        if weights[slot] == 0.0 {
            continue;
        }
        let obstacle = obstacles[*index];
        let convergence_velocity = convergence.convergence_velocity(position, *index, obstacle)?;
        let rotation = compute_avoidance_rotation(
            position,
            relative_velocity.view(),
            obstacle,
            convergence_velocity.view(),
            config,
        )?;
        rotated |= rotation.rotation_angle() != 0.0;
        rotated_directions.push(rotation.rotated_base());
        let fade = cutoff_fade(gammas[*index], config.cutoff_gamma);
        rotation_weights.push(weights[slot] * fade);
    }

    let mut modulated = if rotated {
        directional_weighted_sum(
            relative_velocity.view(),
            &rotated_directions,
            &rotation_weights,
        )? * speed
    } else {
        relative_velocity
    };

    let touched: Vec<Array1<f64>> = relevant
        .iter()
        .filter(|index| gammas[**index] < 1.0 + SURFACE_MARGIN)
        .map(|index| obstacles[*index].normal_direction(position, Frame::Global))
        .collect();
    if !touched.is_empty() {
        modulated = restrict_to_free_space(modulated.view(), &touched);
    }

    if let Some(repulsion) = &config.repulsion {
        for index in &relevant {
            add_repulsion(
                &mut modulated,
                position,
                obstacles[*index],
                gammas[*index],
                repulsion,
            );
        }
    }

    modulated += &obstacle_velocity;

    if modulated.iter().any(|x| !x.is_finite()) {
        return Err(AvoidanceError::singular("modulated velocity"));
    }
    trace!(relevant = relevant.len(), rotated, "velocity modulated");
    Ok(modulated)
}

/// Share of the rotation weight an obstacle keeps near the cutoff.
///
/// One up to `cutoff / CUTOFF_FADE_RATIO` (never below Gamma one), then
/// linear in `ln(gamma)` down to zero at the cutoff.
fn cutoff_fade(gamma: f64, cutoff: f64) -> f64 {
    let start = (cutoff / CUTOFF_FADE_RATIO).max(1.0);
    if gamma <= start {
        return 1.0;
    }
    if gamma >= cutoff {
        return 0.0;
    }
    (cutoff / gamma).ln() / (cutoff / start).ln()
}

/// Remove the components of `velocity` pointing into any surface with
/// outward normal in `normals`, keeping the speed.
///
/// Projects onto the half-spaces `v · n >= 0` in turn until all hold. If
/// they do not settle, or the projection vanishes, the mean normal is used
/// when it clears every surface; otherwise the agent stops.
fn restrict_to_free_space(velocity: ArrayView1<f64>, normals: &[Array1<f64>]) -> Array1<f64> {
    let speed = linalg::norm(velocity);
    let violates = |v: &Array1<f64>| {
        let slack = CONE_TOLERANCE * linalg::norm(v.view());
        normals.iter().any(|normal| v.dot(normal) < -slack)
    };

    let mut projected = velocity.to_owned();
    if !violates(&projected) {
        return projected;
    }
    for _ in 0..MAX_CONE_PASSES {
        for normal in normals {
            let inward = projected.dot(normal);
            if inward < 0.0 {
                projected.scaled_add(-inward, normal);
            }
        }
        if !violates(&projected) {
            break;
        }
    }
    if !violates(&projected)
        && let Some(direction) = linalg::normalized(projected.view())
    {
        trace!(touched = normals.len(), "velocity projected out of touched surfaces");
        return direction * speed;
    }

    let mut mean_normal = Array1::<f64>::zeros(velocity.len());
    for normal in normals {
        mean_normal += normal;
    }
    if let Some(direction) = linalg::normalized(mean_normal.view())
        && !violates(&direction)
    {
        debug!(
            touched = normals.len(),
            "no tangent clears every surface; leaving along the mean normal"
        );
        return direction * speed;
    }
    debug!(touched = normals.len(), "enclosed by touched surfaces; stopping");
    Array1::zeros(velocity.len())
}

/// Weighted sum of the obstacles' own velocities, each damped by
/// `exp(-(max(gamma, 1) - 1) / sigma)`.
fn weighted_obstacle_velocity(
    obstacles: &[&dyn Obstacle],
    relevant: &[usize],
    gammas: &[f64],
    weights: &[f64],
    sigma: f64,
    dimension: usize,
) -> Array1<f64> {
    let mut summed = Array1::zeros(dimension);
    for ((index, gamma), weight) in relevant.iter().zip(gammas).zip(weights) {
        let Some(linear_velocity) = obstacles[*index].linear_velocity() else {
            continue;
        };
        let damping = (-(gamma.max(1.0) - 1.0) / sigma).exp();
        summed.scaled_add(weight * damping, &linear_velocity);
    }
    summed
}

/// Push away from an obstacle the agent is about to touch.
///
/// Active for `gamma < 1 + margin`; the push along the outward normal is
/// `factor * ((1 + margin) / gamma)^power - factor`, zero at the margin.
fn add_repulsion(
    velocity: &mut Array1<f64>,
    position: ArrayView1<f64>,
    obstacle: &dyn Obstacle,
    gamma: f64,
    repulsion: &RepulsionConfig,
) {
    let repulsion_gamma = 1.0 + repulsion.gamma_margin;
    if gamma >= repulsion_gamma {
        return;
    }
    let gamma = gamma.max(f64::EPSILON);
    let strength = repulsion.factor * ((repulsion_gamma / gamma).powf(repulsion.power) - 1.0);
    let normal = obstacle.normal_direction(position, Frame::Global);
    trace!(gamma, strength, "repulsion");
    velocity.scaled_add(strength, &normal);
}
