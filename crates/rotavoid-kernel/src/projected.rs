//! Projected rotation dynamics.
//!
//! Re-expresses space around one obstacle so that the region "behind" the
//! obstacle (as seen from the attractor) becomes reachable along the main
//! axis. The projection is a chain of three invertible maps in the
//! obstacle-local frame:
//!
//! ```text
//!   position ──deflate──► shrunk ──fold──► attractor-centred ──inflate──► projected
//!              (radius × 1/gamma)   (log radial, warped tangential)
//! ```
//!
//! 1. **deflate** shrinks the obstacle towards its centre by a weight that
//!    vanishes far away; points inside the shrunk obstacle collapse onto
//!    the centre.
//! 2. **fold** (*fold opposite kernel*) uses the attractor as origin and the
//!    attractor→obstacle axis as first coordinate. Distances become
//!    logarithmic, off-axis angles are stretched so that the ray pointing
//!    away from the obstacle is sent to infinity.
//! 3. **inflate** undoes step 1.
//!
//! All three steps have exact inverses (`inflate`/`deflate`, `unfold`/
//! `fold`) except at the documented sentinels.

use std::f64::consts::PI;

use ndarray::{Array1, ArrayView1, s};
use rotavoid_geometry::{VectorRotation, directional_weighted_sum, linalg};
use rotavoid_scene::{ConstantValue, Obstacle, VelocityField};
use rotavoid_types::{AvoidanceError, Frame, ModulationConfig, ProjectionConfig};
use tracing::{debug, trace};

use crate::modulation::modulate;

/// Largest exponent passed to `exp` when unfolding the radial coordinate.
const MAX_RADIAL_EXPONENT: f64 = 700.0;

/// Projection around a single obstacle towards a fixed attractor.
pub struct ProjectedRotationDynamics<'a> {
    obstacle: &'a dyn Obstacle,
    attractor_position: Array1<f64>,
    maximum_velocity: f64,
    base_rotation: VectorRotation,
    config: ProjectionConfig,
}

impl<'a> ProjectedRotationDynamics<'a> {
    /// Build the projection for `obstacle` and `attractor_position`.
    ///
    /// `reference_velocity` fixes the maximum speed and, together with the
    /// attractor direction, the base rotation.
    ///
    /// # Errors
    ///
    /// - [`AvoidanceError::CoincidentPoint`] when the attractor sits on the
    ///   obstacle centre. Checked first, so a field whose attractor is the
    ///   centre (and therefore has zero velocity there) reports this.
    /// - [`AvoidanceError::DegenerateDirection`] for a zero reference
    ///   velocity.
    /// - [`AvoidanceError::DimensionMismatch`] for inconsistent sizes or a
    ///   space of dimension below two.
    pub fn new(
        obstacle: &'a dyn Obstacle,
        attractor_position: Array1<f64>,
        reference_velocity: Array1<f64>,
        config: ProjectionConfig,
    ) -> Result<Self, AvoidanceError> {
        let dimension = obstacle.dimension();
        AvoidanceError::check_dimension(dimension, attractor_position.len())?;
        AvoidanceError::check_dimension(dimension, reference_velocity.len())?;
        if dimension < 2 {
            return Err(AvoidanceError::DimensionMismatch {
                expected: 2,
                found: dimension,
            });
        }

        let attractor_direction = &attractor_position - &obstacle.center_position();
        if linalg::norm(attractor_direction.view()) == 0.0 {
            return Err(AvoidanceError::coincident(
                "attractor placed at the obstacle centre",
            ));
        }

        let maximum_velocity = linalg::norm(reference_velocity.view());
        if maximum_velocity == 0.0 {
            return Err(AvoidanceError::degenerate("reference velocity"));
        }

        let base_rotation =
            VectorRotation::from_directions(attractor_direction.view(), reference_velocity.view())?;
        debug!(
            dimension,
            maximum_velocity,
            base_angle = base_rotation.rotation_angle(),
            "projected rotation dynamics ready"
        );

        Ok(Self {
            obstacle,
            attractor_position,
            maximum_velocity,
            base_rotation,
            config,
        })
    }

    pub fn obstacle(&self) -> &dyn Obstacle {
        self.obstacle
    }

    pub fn attractor_position(&self) -> ArrayView1<'_, f64> {
        self.attractor_position.view()
    }

    /// Speed of the reference velocity.
    pub fn maximum_velocity(&self) -> f64 {
        self.maximum_velocity
    }

    /// Rotation from the obstacle→attractor direction to the reference
    /// velocity.
    pub fn base_rotation(&self) -> &VectorRotation {
        &self.base_rotation
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    pub fn dimension(&self) -> usize {
        self.obstacle.dimension()
    }

    // ── Gamma ───────────────────────────────────────────────────────────

    /// Gamma of the obstacle as seen by the projection.
    ///
    /// - `gamma >= max_gamma` → `max_gamma`;
    /// - `min_gamma <= gamma < max_gamma` → `gamma^(2 / (1 + cos))` capped at
    ///   `max_gamma`, with `cos` the alignment between the direction to the
    ///   attractor and the obstacle→attractor axis;
    /// - below `min_gamma` → the raw Gamma.
    pub fn projected_gamma(&self, position: ArrayView1<f64>) -> f64 {
        let gamma = self.obstacle.gamma(position, Frame::Global);
        if gamma >= self.config.max_gamma {
            return self.config.max_gamma;
        }
        if gamma < self.config.min_gamma {
            return gamma;
        }

        let to_attractor = &self.attractor_position - &position;
        let Some(direction) = linalg::normalized(to_attractor.view()) else {
            return self.config.max_gamma;
        };
        let cos = direction.dot(&self.base_rotation.base0()).clamp(-1.0, 1.0);
        if cos <= -1.0 {
            return self.config.max_gamma;
        }
        gamma
            .powf(2.0 / (1.0 + cos))
            .min(self.config.max_gamma)
    }

    // ── Deflate / inflate ───────────────────────────────────────────────

    /// Shrink factor of the obstacle for a point at `gamma`: `1 / gamma`,
    /// saturated at one inside the obstacle.
    fn deflation_weight(gamma: f64) -> f64 {
        if gamma > 1.0 { 1.0 / gamma } else { 1.0 }
    }

    /// Move a local `position` towards the centre by `weight` times the
    /// local radius. Points within that distance, the shrunk surface
    /// included, collapse onto the centre.
    pub fn deflate(&self, position: ArrayView1<f64>, weight: f64) -> Array1<f64> {
        let radius = self.obstacle.local_radius(position, Frame::Local) * weight;
        let pos_norm = linalg::norm(position);
        if pos_norm < radius || pos_norm == 0.0 {
            return Array1::zeros(position.len());
        }
        position.mapv(|x| x * ((pos_norm - radius) / pos_norm))
    }

    /// Inverse of [`deflate`](Self::deflate) for points strictly outside
    /// the shrunk obstacle. The centre maps to `radius * e_0`, so a point
    /// exactly on the shrunk surface only round-trips when it lies on `e_0`.
    pub fn inflate(&self, position: ArrayView1<f64>, weight: f64) -> Array1<f64> {
        let pos_norm = linalg::norm(position);
        if pos_norm == 0.0 {
            let mut first_axis = Array1::zeros(position.len());
            first_axis[0] = 1.0;
            let radius = self.obstacle.local_radius(first_axis.view(), Frame::Local) * weight;
            return first_axis * radius;
        }
        let radius = self.obstacle.local_radius(position, Frame::Local) * weight;
        position.mapv(|x| x * ((pos_norm + radius) / pos_norm))
    }

    // ── Fold / unfold ───────────────────────────────────────────────────

    /// Unit attractor→obstacle axis and attractor distance, with the
    /// obstacle at the local origin.
    fn attractor_axis(
        &self,
        position: ArrayView1<f64>,
        attractor: ArrayView1<f64>,
    ) -> Result<(Array1<f64>, f64), AvoidanceError> {
        AvoidanceError::check_dimension(self.dimension(), position.len())?;
        AvoidanceError::check_dimension(self.dimension(), attractor.len())?;
        let distance = linalg::norm(attractor);
        if distance == 0.0 {
            return Err(AvoidanceError::coincident(
                "attractor on the (deflated) obstacle centre",
            ));
        }
        Ok((attractor.mapv(|x| -x / distance), distance))
    }

    /// Fold a local `position` around the local `attractor`.
    ///
    /// In the attractor-centred basis whose first axis points at the
    /// obstacle, the first coordinate becomes `d * ln(|p - a| / d)` and the
    /// remaining ones are rescaled to length `(2 / (1 + cos) - 1)^(1/power)`.
    /// Returns an absolute position in the local frame.
    ///
    /// Sentinels: `p == a` gives first coordinate `-f64::MAX`, and points on
    /// the ray pointing away from the obstacle (`cos == -1`) get the
    /// off-axis coordinate `f64::MAX`.
    ///
    /// # Errors
    ///
    /// [`AvoidanceError::CoincidentPoint`] when `attractor` is the origin.
    pub fn fold_opposite_kernel(
        &self,
        position: ArrayView1<f64>,
        attractor: ArrayView1<f64>,
    ) -> Result<Array1<f64>, AvoidanceError> {
        let (axis, distance) = self.attractor_axis(position, attractor)?;
        let basis = linalg::orthogonal_basis(axis.view())
            .ok_or_else(|| AvoidanceError::degenerate("attractor axis"))?;

        let relative = &position - &attractor;
        let mut transformed = basis.t().dot(&relative);

        let relative_norm = linalg::norm(relative.view());
        if relative_norm == 0.0 {
            transformed.fill(0.0);
            transformed[0] = -f64::MAX;
            return Ok(&attractor + &basis.dot(&transformed));
        }

        transformed[0] = distance * (relative_norm / distance).ln();

        let cos = (axis.dot(&relative) / relative_norm).clamp(-1.0, 1.0);
        if cos <= -1.0 {
            transformed.slice_mut(s![1..]).fill(0.0);
            transformed[1] = f64::MAX;
        } else if cos < 1.0 {
            let tail_norm = linalg::norm(transformed.slice(s![1..]));
            if tail_norm > 0.0 {
                let stretched =
                    (2.0 / (1.0 + cos) - 1.0).powf(1.0 / self.config.dotprod_projection_power);
                transformed
                    .slice_mut(s![1..])
                    .mapv_inplace(|x| x * (stretched / tail_norm));
            }
        }

        Ok(&attractor + &basis.dot(&transformed))
    }

    /// Inverse of [`fold_opposite_kernel`](Self::fold_opposite_kernel).
    ///
    /// # Errors
    ///
    /// [`AvoidanceError::CoincidentPoint`] when `attractor` is the origin.
    pub fn unfold(
        &self,
        transformed: ArrayView1<f64>,
        attractor: ArrayView1<f64>,
    ) -> Result<Array1<f64>, AvoidanceError> {
        let (axis, distance) = self.attractor_axis(transformed, attractor)?;
        let basis = linalg::orthogonal_basis(axis.view())
            .ok_or_else(|| AvoidanceError::degenerate("attractor axis"))?;

        let relative = &transformed - &attractor;
        let coordinates = basis.t().dot(&relative);
        let tail = coordinates.slice(s![1..]);
        let tail_norm = linalg::norm(tail);

        let direction = if tail_norm == 0.0 {
            axis.clone()
        } else {
            let cos = 2.0 / (tail_norm.powf(self.config.dotprod_projection_power) + 1.0) - 1.0;
            let tail_global = basis.slice(s![.., 1..]).dot(&tail);
            VectorRotation::from_directions(axis.view(), tail_global.view())?
                .with_rotation_angle(cos.clamp(-1.0, 1.0).acos())
                .rotated_base()
        };

        let exponent = (coordinates[0] / distance).min(MAX_RADIAL_EXPONENT);
        let magnitude = distance * exponent.exp();
        Ok(&attractor + &(direction * magnitude))
    }

    // ── Projection ──────────────────────────────────────────────────────

    /// Projected counterpart of a global `position`.
    ///
    /// # Errors
    ///
    /// [`AvoidanceError::CoincidentPoint`] when the attractor collapses onto
    /// the deflated obstacle centre (attractor inside the obstacle).
    pub fn projected_position(
        &self,
        position: ArrayView1<f64>,
    ) -> Result<Array1<f64>, AvoidanceError> {
        AvoidanceError::check_dimension(self.dimension(), position.len())?;
        let pose = self.obstacle.pose();

        let relative_position = pose.transform_position_to_relative(position);
        let relative_attractor =
            pose.transform_position_to_relative(self.attractor_position.view());

        let gamma = self.obstacle.gamma(relative_position.view(), Frame::Local);
        let weight = Self::deflation_weight(gamma);

        let deflated_position = self.deflate(relative_position.view(), weight);
        let deflated_attractor = self.deflate(relative_attractor.view(), weight);

        let folded =
            self.fold_opposite_kernel(deflated_position.view(), deflated_attractor.view())?;
        let inflated = self.inflate(folded.view(), weight);
        trace!(gamma, weight, "projected position");

        Ok(pose.transform_position_from_relative(inflated.view()))
    }

    // ── Directions ──────────────────────────────────────────────────────

    /// Unit gradient direction of the quadratic Lyapunov function, i.e.
    /// towards the attractor. Zero at the attractor.
    pub fn lyapunov_gradient(&self, position: ArrayView1<f64>) -> Array1<f64> {
        let to_attractor = &self.attractor_position - &position;
        linalg::normalized(to_attractor.view()).unwrap_or_else(|| Array1::zeros(position.len()))
    }

    /// Lyapunov gradient in the projected space: the obstacle→attractor
    /// axis.
    pub fn projected_lyapunov_gradient(&self) -> Array1<f64> {
        self.base_rotation.base0().to_owned()
    }

    /// Unit direction from `position` to the attractor.
    ///
    /// # Errors
    ///
    /// [`AvoidanceError::CoincidentPoint`] at the attractor.
    pub fn base_reference(&self, position: ArrayView1<f64>) -> Result<Array1<f64>, AvoidanceError> {
        let to_attractor = &self.attractor_position - &position;
        linalg::normalized(to_attractor.view())
            .ok_or_else(|| AvoidanceError::coincident("position at the attractor"))
    }

    /// Rotation from `velocity` to its rotational modulation by this
    /// obstacle alone, the velocity doubling as convergence direction.
    ///
    /// Zero velocity or zero modulation give the identity rotation.
    pub fn modulation_rotation(
        &self,
        position: ArrayView1<f64>,
        velocity: ArrayView1<f64>,
        config: &ModulationConfig,
    ) -> Result<VectorRotation, AvoidanceError> {
        if linalg::norm(velocity) == 0.0 {
            return Ok(VectorRotation::identity(velocity.len()));
        }
        let convergence = ConstantValue::new(velocity.to_owned());
        let modulated = modulate(position, velocity, &[self.obstacle], &convergence, config)?;
        if linalg::norm(modulated.view()) == 0.0 {
            return Ok(VectorRotation::identity(velocity.len()));
        }
        VectorRotation::from_directions(velocity, modulated.view())
    }

    /// Convergence velocity of this obstacle at `position`.
    ///
    /// The nominal velocity is rotated into the frame where the
    /// attractor→position axis lines up with the attractor→obstacle axis,
    /// blended there with the nominal velocity at the obstacle centre
    /// (weight `min(1, 1 / gamma(projected_position))`) and rotated back.
    /// The speed is the nominal speed, capped at
    /// [`maximum_velocity`](Self::maximum_velocity).
    ///
    /// Zero at the attractor; a position exactly opposite the obstacle
    /// returns the nominal velocity unchanged.
    pub fn convergence_velocity(
        &self,
        position: ArrayView1<f64>,
        initial_dynamics: &dyn VelocityField,
    ) -> Result<Array1<f64>, AvoidanceError> {
        AvoidanceError::check_dimension(self.dimension(), position.len())?;
        let initial_velocity = initial_dynamics.evaluate(position);

        let attractor_to_position = &position - &self.attractor_position;
        if linalg::norm(attractor_to_position.view()) == 0.0 {
            return Ok(Array1::zeros(position.len()));
        }
        let attractor_to_obstacle = &self.obstacle.center_position() - &self.attractor_position;

        let rotation = VectorRotation::from_directions(
            attractor_to_position.view(),
            attractor_to_obstacle.view(),
        )?;
        if rotation.rotation_angle() >= PI {
            return Ok(initial_velocity);
        }

        let speed = linalg::norm(initial_velocity.view());
        if speed == 0.0 {
            return Ok(initial_velocity);
        }

        let obstacle_velocity = initial_dynamics.evaluate(self.obstacle.center_position());
        let transformed_velocity = rotation.rotate(initial_velocity.view(), 1.0);

        let projected = self.projected_position(position)?;
        let projected_gamma = self.obstacle.gamma(projected.view(), Frame::Global);
        let weight = Self::deflation_weight(projected_gamma);

        let averaged = directional_weighted_sum(
            self.base_rotation.base0(),
            &[obstacle_velocity, transformed_velocity],
            &[weight, 1.0 - weight],
        )?;
        let direction = rotation.rotate(averaged.view(), -1.0);

        let result = direction * speed.min(self.maximum_velocity);
        if result.iter().any(|x| !x.is_finite()) {
            return Err(AvoidanceError::singular("projected convergence velocity"));
        }
        Ok(result)
    }
}
