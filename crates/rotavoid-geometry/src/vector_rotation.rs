//! Rotations between directions in n-dimensional space.
//!
//! A [`VectorRotation`] is a planar rotation embedded in `R^n`: an
//! orthonormal pair (`base0`, `base1`) spans the plane and `rotation_angle`
//! is measured from `base0` towards `base1`. Everything orthogonal to the
//! plane is left untouched, which is what makes the type usable in any
//! dimension.
//!
//! # Example
//!
//! ```rust
//! use ndarray::array;
//! use rotavoid_geometry::vector_rotation::VectorRotation;
//!
//! let rotation = VectorRotation::from_directions(
//!     array![1.0, 0.0].view(),
//!     array![0.0, 1.0].view(),
//! )
//! .unwrap();
//!
//! // Half of a quarter turn.
//! let half = rotation.rotate(array![1.0, 0.0].view(), 0.5);
//! assert!((half[0] - half[1]).abs() < 1e-12);
//!
//! // Un-rotate.
//! let back = rotation.rotate(array![0.0, 1.0].view(), -1.0);
//! assert!((back[0] - 1.0).abs() < 1e-12);
//! ```
//!
//! # Anti-parallel directions
//!
//! When `vec_rot` is parallel or anti-parallel to `vec_init` the plane of
//! rotation is not defined by the two inputs. `base1` is then taken from the
//! identity axis least aligned with `vec_init` (lowest index on ties). The
//! choice is deterministic, but rotation planes still jump as a configuration
//! crosses the anti-parallel one.

use ndarray::{Array1, ArrayView1};
use rotavoid_types::AvoidanceError;
use tracing::trace;

use crate::linalg::{self, ORTHOGONAL_TOLERANCE};

// ────────────────────────────────────────────────────────────────────────────
// VectorRotation
// ────────────────────────────────────────────────────────────────────────────

/// A rotation within the plane spanned by `base0` and `base1`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRotation {
    base0: Array1<f64>,
    base1: Array1<f64>,
    rotation_angle: f64,
}

impl VectorRotation {
    /// Build a rotation from an orthonormal pair and an angle.
    ///
    /// The caller guarantees that `base0` and `base1` are orthonormal.
    pub fn new(base0: Array1<f64>, base1: Array1<f64>, rotation_angle: f64) -> Self {
        Self {
            base0,
            base1,
            rotation_angle,
        }
    }

    /// The zero rotation in the plane of the first two identity axes.
    ///
    /// # Panics
    ///
    /// Panics if `dimension < 2`.
    pub fn identity(dimension: usize) -> Self {
        assert!(dimension >= 2, "rotations need at least two dimensions");
        let mut base0 = Array1::zeros(dimension);
        base0[0] = 1.0;
        let mut base1 = Array1::zeros(dimension);
        base1[1] = 1.0;
        Self::new(base0, base1, 0.0)
    }

    /// Rotation that turns the direction of `vec_init` into the direction of
    /// `vec_rot`.
    ///
    /// # Errors
    ///
    /// - [`AvoidanceError::DegenerateDirection`] if either input is zero.
    /// - [`AvoidanceError::DimensionMismatch`] if the inputs differ in size.
    pub fn from_directions(
        vec_init: ArrayView1<f64>,
        vec_rot: ArrayView1<f64>,
    ) -> Result<Self, AvoidanceError> {
        AvoidanceError::check_dimension(vec_init.len(), vec_rot.len())?;
        if vec_init.len() < 2 {
            return Err(AvoidanceError::DimensionMismatch {
                expected: 2,
                found: vec_init.len(),
            });
        }

        let base0 =
            linalg::normalized(vec_init).ok_or_else(|| AvoidanceError::degenerate("vec_init"))?;
        let target =
            linalg::normalized(vec_rot).ok_or_else(|| AvoidanceError::degenerate("vec_rot"))?;

        let dot = base0.dot(&target).clamp(-1.0, 1.0);
        let rotation_angle = dot.acos();

        let mut orthogonal = target;
        orthogonal.scaled_add(-dot, &base0);

        let base1 = if linalg::norm(orthogonal.view()) > ORTHOGONAL_TOLERANCE {
            linalg::normalized(orthogonal.view())
                .unwrap_or_else(|| linalg::deterministic_orthogonal(base0.view()))
        } else {
            trace!(rotation_angle, "parallel directions; deterministic rotation plane");
            linalg::deterministic_orthogonal(base0.view())
        };

        Ok(Self::new(base0, base1, rotation_angle))
    }

    /// First basis vector (the normalised initial direction).
    pub fn base0(&self) -> ArrayView1<'_, f64> {
        self.base0.view()
    }

    /// Second basis vector, orthogonal to `base0` inside the rotation plane.
    pub fn base1(&self) -> ArrayView1<'_, f64> {
        self.base1.view()
    }

    /// Angle of the full rotation in radians.
    pub fn rotation_angle(&self) -> f64 {
        self.rotation_angle
    }

    /// Dimension of the ambient space.
    pub fn dimension(&self) -> usize {
        self.base0.len()
    }

    /// Same plane, new angle.
    pub fn with_rotation_angle(mut self, rotation_angle: f64) -> Self {
        self.rotation_angle = rotation_angle;
        self
    }

    /// The rotation undoing this one.
    pub fn inverse(&self) -> Self {
        Self::new(self.base0.clone(), self.base1.clone(), -self.rotation_angle)
    }

    /// The direction reached by rotating `base0` by the full angle.
    pub fn rotated_base(&self) -> Array1<f64> {
        let (sin, cos) = self.rotation_angle.sin_cos();
        &self.base0 * cos + &self.base1 * sin
    }

    /// Rotate `vector` by `rot_factor * rotation_angle`.
    ///
    /// Any factor is accepted: `0` is the identity, `1` the full rotation,
    /// `-1` the inverse. Magnitudes are preserved.
    ///
    /// # Panics
    ///
    /// Panics if `vector` does not have the rotation's dimension.
    pub fn rotate(&self, vector: ArrayView1<f64>, rot_factor: f64) -> Array1<f64> {
        let x0 = self.base0.dot(&vector);
        let x1 = self.base1.dot(&vector);

        let mut result = vector.to_owned();
        result.scaled_add(-x0, &self.base0);
        result.scaled_add(-x1, &self.base1);

        let (sin, cos) = (rot_factor * self.rotation_angle).sin_cos();
        result.scaled_add(x0 * cos - x1 * sin, &self.base0);
        result.scaled_add(x0 * sin + x1 * cos, &self.base1);
        result
    }

    /// Full rotation of `vector`.
    pub fn rotate_direction(&self, vector: ArrayView1<f64>) -> Array1<f64> {
        self.rotate(vector, 1.0)
    }
}

/// Weighted angular mean of `directions` around `null_direction`.
///
/// Each direction is mapped into the directional space of `null_direction`
/// (angle times the unit orthogonal component), the weighted sum is taken and
/// mapped back onto the unit sphere. Weights summing to less than one leave
/// the residual at the null direction. Zero directions and zero weights are
/// skipped.
///
/// # Errors
///
/// [`AvoidanceError::DegenerateDirection`] for a zero `null_direction`, and
/// [`AvoidanceError::DimensionMismatch`] for inconsistent inputs.
pub fn directional_weighted_sum(
    null_direction: ArrayView1<f64>,
    directions: &[Array1<f64>],
    weights: &[f64],
) -> Result<Array1<f64>, AvoidanceError> {
    AvoidanceError::check_dimension(directions.len(), weights.len())?;
    let null = linalg::normalized(null_direction)
        .ok_or_else(|| AvoidanceError::degenerate("null_direction"))?;

    let mut summed = Array1::<f64>::zeros(null.len());
    for (direction, weight) in directions.iter().zip(weights) {
        if *weight == 0.0 || linalg::norm(direction.view()) == 0.0 {
            continue;
        }
        let rotation = VectorRotation::from_directions(null.view(), direction.view())?;
        summed.scaled_add(*weight * rotation.rotation_angle, &rotation.base1);
    }

    let magnitude = linalg::norm(summed.view());
    if magnitude == 0.0 {
        return Ok(null);
    }
    let (sin, cos) = magnitude.sin_cos();
    Ok(null * cos + summed * (sin / magnitude))
}

// ────────────────────────────────────────────────────────────────────────────
// VectorRotationSequence
// ────────────────────────────────────────────────────────────────────────────

/// An ordered chain of [`VectorRotation`]s applied one after the other.
///
/// Two planar rotations in different planes do not compose into a planar
/// rotation, so composition keeps the chain; [`to_rotation`] collapses it
/// into the single rotation between its end directions when that is enough.
///
/// [`to_rotation`]: VectorRotationSequence::to_rotation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorRotationSequence {
    rotations: Vec<VectorRotation>,
}

impl VectorRotationSequence {
    /// Create an empty sequence (the identity).
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain of rotations visiting `directions` in order.
    ///
    /// # Errors
    ///
    /// [`AvoidanceError::DegenerateDirection`] if fewer than two directions
    /// are given or any of them is zero.
    pub fn from_directions(directions: &[Array1<f64>]) -> Result<Self, AvoidanceError> {
        if directions.len() < 2 {
            return Err(AvoidanceError::degenerate(
                "rotation sequence with fewer than two directions",
            ));
        }
        let rotations = directions
            .windows(2)
            .map(|pair| VectorRotation::from_directions(pair[0].view(), pair[1].view()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rotations })
    }

    /// Append a rotation to the end of the chain.
    pub fn push(&mut self, rotation: VectorRotation) {
        self.rotations.push(rotation);
    }

    /// Number of rotations in the chain.
    pub fn len(&self) -> usize {
        self.rotations.len()
    }

    /// True when the chain holds no rotation.
    pub fn is_empty(&self) -> bool {
        self.rotations.is_empty()
    }

    /// Apply every rotation in order, each scaled by `rot_factor`.
    pub fn rotate(&self, vector: ArrayView1<f64>, rot_factor: f64) -> Array1<f64> {
        let mut result = vector.to_owned();
        for rotation in &self.rotations {
            result = rotation.rotate(result.view(), rot_factor);
        }
        result
    }

    /// The chain undoing this one.
    pub fn inverse(&self) -> Self {
        Self {
            rotations: self.rotations.iter().rev().map(|r| r.inverse()).collect(),
        }
    }

    /// Collapse into the single rotation from the first start direction to
    /// the final direction. `None` for an empty chain.
    pub fn to_rotation(&self) -> Option<VectorRotation> {
        let first = self.rotations.first()?;
        let end = self.rotate(first.base0(), 1.0);
        VectorRotation::from_directions(first.base0(), end.view()).ok()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn assert_close(a: &Array1<f64>, b: &Array1<f64>, tol: f64) {
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < tol, "{a} != {b}");
        }
    }

    // ── VectorRotation ──────────────────────────────────────────────────────

    #[test]
    fn rotation_to_itself_is_identity() {
        let u = array![0.3, -1.2, 2.0];
        let rotation = VectorRotation::from_directions(u.view(), u.view()).unwrap();
        assert!(rotation.rotation_angle().abs() < 1e-12);
        assert_close(&rotation.rotate(u.view(), 1.0), &u, 1e-12);
    }

    #[test]
    fn full_rotation_reaches_target_with_initial_magnitude() {
        let u = array![2.0, 0.5, -1.0];
        let v = array![-0.4, 3.0, 1.0];
        let rotation = VectorRotation::from_directions(u.view(), v.view()).unwrap();

        let rotated = rotation.rotate(u.view(), 1.0);
        let expected = linalg::normalized(v.view()).unwrap() * linalg::norm(u.view());
        assert_close(&rotated, &expected, 1e-12);
    }

    #[test]
    fn partial_rotation_halves_the_angle() {
        let rotation =
            VectorRotation::from_directions(array![1.0, 0.0].view(), array![0.0, 1.0].view())
                .unwrap();
        assert!((rotation.rotation_angle() - FRAC_PI_2).abs() < 1e-12);

        let half = rotation.rotate(array![1.0, 0.0].view(), 0.5);
        let s = std::f64::consts::FRAC_1_SQRT_2;
        assert_close(&half, &array![s, s], 1e-12);
    }

    #[test]
    fn negative_factor_unrotates() {
        let u = array![1.0, 1.0, 0.0];
        let v = array![0.0, 1.0, 1.0];
        let rotation = VectorRotation::from_directions(u.view(), v.view()).unwrap();

        let sample = array![0.2, -0.7, 1.5];
        let there = rotation.rotate(sample.view(), 1.0);
        let back = rotation.rotate(there.view(), -1.0);
        assert_close(&back, &sample, 1e-12);

        let inverse = rotation.inverse();
        assert_close(&inverse.rotate(there.view(), 1.0), &sample, 1e-12);
    }

    #[test]
    fn orthogonal_complement_is_untouched() {
        let rotation =
            VectorRotation::from_directions(array![1.0, 0.0, 0.0].view(), array![0.0, 1.0, 0.0].view())
                .unwrap();
        let rotated = rotation.rotate(array![0.0, 0.0, 4.0].view(), 1.0);
        assert_close(&rotated, &array![0.0, 0.0, 4.0], 1e-12);
    }

    #[test]
    fn zero_input_is_degenerate() {
        let err =
            VectorRotation::from_directions(array![0.0, 0.0].view(), array![1.0, 0.0].view())
                .unwrap_err();
        assert!(matches!(err, AvoidanceError::DegenerateDirection { .. }));

        let err =
            VectorRotation::from_directions(array![1.0, 0.0].view(), array![0.0, 0.0].view())
                .unwrap_err();
        assert!(matches!(err, AvoidanceError::DegenerateDirection { .. }));
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let err =
            VectorRotation::from_directions(array![1.0, 0.0].view(), array![1.0, 0.0, 0.0].view())
                .unwrap_err();
        assert_eq!(
            err,
            AvoidanceError::DimensionMismatch {
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn antiparallel_tie_break_is_deterministic() {
        let u = array![1.0, 0.0, 0.0];
        let v = array![-1.0, 0.0, 0.0];
        let a = VectorRotation::from_directions(u.view(), v.view()).unwrap();
        let b = VectorRotation::from_directions(u.view(), v.view()).unwrap();
        assert_eq!(a, b);
        assert!((a.rotation_angle() - PI).abs() < 1e-12);
        // First axis least aligned with +x is y.
        assert_close(&a.base1().to_owned(), &array![0.0, 1.0, 0.0], 1e-12);
        assert_close(&a.rotate(u.view(), 1.0), &v, 1e-12);
    }

    #[test]
    fn angle_overwrite_retargets_rotation() {
        let rotation =
            VectorRotation::from_directions(array![1.0, 0.0].view(), array![0.0, 1.0].view())
                .unwrap()
                .with_rotation_angle(PI);
        assert_close(&rotation.rotated_base(), &array![-1.0, 0.0], 1e-12);
    }

    // ── directional_weighted_sum ────────────────────────────────────────────

    #[test]
    fn weighted_sum_with_unit_weight_returns_direction() {
        let null = array![1.0, 0.0];
        let direction = array![0.0, 1.0];
        let result =
            directional_weighted_sum(null.view(), &[direction.clone()], &[1.0]).unwrap();
        assert_close(&result, &direction, 1e-12);
    }

    #[test]
    fn weighted_sum_residual_stays_at_null() {
        let null = array![1.0, 0.0];
        let result =
            directional_weighted_sum(null.view(), &[array![0.0, 1.0]], &[0.5]).unwrap();
        let s = std::f64::consts::FRAC_1_SQRT_2;
        assert_close(&result, &array![s, s], 1e-12);
    }

    #[test]
    fn weighted_sum_of_opposite_deflections_cancels() {
        let null = array![1.0, 0.0];
        let result = directional_weighted_sum(
            null.view(),
            &[array![1.0, 1.0], array![1.0, -1.0]],
            &[0.5, 0.5],
        )
        .unwrap();
        assert_close(&result, &null, 1e-12);
    }

    // ── VectorRotationSequence ──────────────────────────────────────────────

    #[test]
    fn sequence_visits_all_directions() {
        let directions = vec![array![1.0, 0.0, 0.0], array![0.0, 1.0, 0.0], array![0.0, 0.0, 1.0]];
        let sequence = VectorRotationSequence::from_directions(&directions).unwrap();
        assert_eq!(sequence.len(), 2);

        let end = sequence.rotate(directions[0].view(), 1.0);
        assert_close(&end, &directions[2], 1e-12);

        let back = sequence.inverse().rotate(end.view(), 1.0);
        assert_close(&back, &directions[0], 1e-12);

        let collapsed = sequence.to_rotation().unwrap();
        assert!((collapsed.rotation_angle() - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn sequence_needs_two_directions() {
        assert!(VectorRotationSequence::from_directions(&[array![1.0, 0.0]]).is_err());
        assert!(VectorRotationSequence::new().to_rotation().is_none());
    }
}
