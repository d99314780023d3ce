//! Rigid-body pose of an obstacle.
//!
//! A [`Pose`] relates an obstacle's local frame to the global frame: to map a
//! local point into the global frame, rotate it by `rotation` then add
//! `position`.
//!
//! # Example
//!
//! ```rust
//! use ndarray::array;
//! use rotavoid_geometry::pose::Pose;
//!
//! let pose = Pose::planar(array![1.0, 0.0], std::f64::consts::FRAC_PI_2).unwrap();
//!
//! // Local +x points along global +y.
//! let global = pose.transform_position_from_relative(array![1.0, 0.0].view());
//! assert!((global[0] - 1.0).abs() < 1e-12);
//! assert!((global[1] - 1.0).abs() < 1e-12);
//! ```

use ndarray::{Array1, Array2, ArrayView1};
use rotavoid_types::AvoidanceError;

/// Position and orientation of a local frame in the global frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    position: Array1<f64>,
    /// Orthonormal; columns are the local axes expressed globally.
    rotation: Array2<f64>,
}

impl Pose {
    /// Pose at `position` with the identity orientation.
    pub fn new(position: Array1<f64>) -> Self {
        let dimension = position.len();
        Self {
            position,
            rotation: Array2::eye(dimension),
        }
    }

    /// Planar pose rotated counter-clockwise by `orientation` radians.
    ///
    /// # Errors
    ///
    /// [`AvoidanceError::DimensionMismatch`] unless `position` is 2-D.
    pub fn planar(position: Array1<f64>, orientation: f64) -> Result<Self, AvoidanceError> {
        AvoidanceError::check_dimension(2, position.len())?;
        let (sin, cos) = orientation.sin_cos();
        let rotation = ndarray::array![[cos, -sin], [sin, cos]];
        Ok(Self { position, rotation })
    }

    /// Pose with an explicit rotation matrix.
    ///
    /// The caller is responsible for providing an orthonormal matrix.
    ///
    /// # Errors
    ///
    /// [`AvoidanceError::DimensionMismatch`] if the matrix is not square of
    /// the position's dimension.
    pub fn with_rotation(
        position: Array1<f64>,
        rotation: Array2<f64>,
    ) -> Result<Self, AvoidanceError> {
        AvoidanceError::check_dimension(position.len(), rotation.nrows())?;
        AvoidanceError::check_dimension(position.len(), rotation.ncols())?;
        Ok(Self { position, rotation })
    }

    /// Dimension of the space.
    pub fn dimension(&self) -> usize {
        self.position.len()
    }

    /// Origin of the local frame in global coordinates.
    pub fn position(&self) -> ArrayView1<'_, f64> {
        self.position.view()
    }

    /// Orientation matrix.
    pub fn rotation(&self) -> &Array2<f64> {
        &self.rotation
    }

    /// Shift the pose by `delta` (global frame).
    pub fn translate(&mut self, delta: ArrayView1<f64>) {
        self.position += &delta;
    }

    /// Global → local position.
    pub fn transform_position_to_relative(&self, position: ArrayView1<f64>) -> Array1<f64> {
        let offset = &position - &self.position;
        self.rotation.t().dot(&offset)
    }

    /// Local → global position.
    pub fn transform_position_from_relative(&self, position: ArrayView1<f64>) -> Array1<f64> {
        self.rotation.dot(&position) + &self.position
    }

    /// Global → local direction (rotation only).
    pub fn transform_direction_to_relative(&self, direction: ArrayView1<f64>) -> Array1<f64> {
        self.rotation.t().dot(&direction)
    }

    /// Local → global direction (rotation only).
    pub fn transform_direction_from_relative(&self, direction: ArrayView1<f64>) -> Array1<f64> {
        self.rotation.dot(&direction)
    }
}
