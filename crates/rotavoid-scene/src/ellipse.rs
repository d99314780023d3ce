//! Ellipsoidal obstacle in any dimension.
//!
//! Serves as the reference [`Obstacle`] implementation: a (hyper-)ellipsoid
//! whose semi-axes are aligned with its local frame. A circle is the special
//! case of equal semi-axes.
//!
//! # Example
//!
//! ```rust
//! use ndarray::array;
//! use rotavoid_scene::{ellipse::Ellipse, obstacle::Obstacle};
//! use rotavoid_types::Frame;
//!
//! let circle = Ellipse::circle(array![0.0, 0.0], 1.0).unwrap();
//! let gamma = circle.gamma(array![2.0, 0.0].view(), Frame::Global);
//! assert!((gamma - 2.0).abs() < 1e-12);
//! ```

use ndarray::{Array1, ArrayView1, Zip};
use rotavoid_geometry::{linalg, Pose};
use rotavoid_types::{AvoidanceError, Frame};
use tracing::{debug, trace};

use crate::obstacle::Obstacle;

/// An ellipsoid defined by its pose and full axis lengths.
#[derive(Debug, Clone)]
pub struct Ellipse {
    name: String,
    pose: Pose,
    semi_axes: Array1<f64>,
    is_boundary: bool,
    linear_velocity: Option<Array1<f64>>,
}

impl Ellipse {
    /// Axis-aligned ellipse centred at `center` with full `axes_length`.
    ///
    /// # Errors
    ///
    /// - [`AvoidanceError::DimensionMismatch`] if the sizes differ.
    /// - [`AvoidanceError::DegenerateDirection`] for a non-positive axis.
    pub fn new(center: Array1<f64>, axes_length: Array1<f64>) -> Result<Self, AvoidanceError> {
        Self::with_pose(Pose::new(center), axes_length)
    }

    /// Ellipse with an arbitrary pose.
    ///
    /// # Errors
    ///
    /// Same as [`Ellipse::new`].
    pub fn with_pose(pose: Pose, axes_length: Array1<f64>) -> Result<Self, AvoidanceError> {
        AvoidanceError::check_dimension(pose.dimension(), axes_length.len())?;
        if axes_length.iter().any(|a| !(*a > 0.0)) {
            return Err(AvoidanceError::degenerate("ellipse axis of non-positive length"));
        }
        Ok(Self {
            name: String::from("ellipse"),
            pose,
            semi_axes: axes_length / 2.0,
            is_boundary: false,
            linear_velocity: None,
        })
    }

    /// Circle (or sphere) of the given `radius`.
    ///
    /// # Errors
    ///
    /// Same as [`Ellipse::new`].
    pub fn circle(center: Array1<f64>, radius: f64) -> Result<Self, AvoidanceError> {
        let dimension = center.len();
        Self::new(center, Array1::from_elem(dimension, 2.0 * radius))
    }

    /// Turn the ellipse into a containing boundary.
    pub fn into_boundary(mut self) -> Self {
        self.is_boundary = true;
        self
    }

    /// Attach a constant translational velocity.
    pub fn with_linear_velocity(mut self, velocity: Array1<f64>) -> Self {
        self.linear_velocity = Some(velocity);
        self
    }

    /// Give the obstacle a human-readable name used in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Half of the axis lengths.
    pub fn semi_axes(&self) -> ArrayView1<'_, f64> {
        self.semi_axes.view()
    }

    /// `Σ (p_i / a_i)^2` of a local position.
    fn scaled_norm_sq(&self, local: ArrayView1<f64>) -> f64 {
        Zip::from(&local)
            .and(&self.semi_axes)
            .fold(0.0, |acc, p, a| acc + (p / a) * (p / a))
    }
}

impl Obstacle for Ellipse {
    fn pose(&self) -> &Pose {
        &self.pose
    }

    fn gamma(&self, position: ArrayView1<f64>, frame: Frame) -> f64 {
        let local = self.to_local(position, frame);
        let relative = self.scaled_norm_sq(local.view()).sqrt();
        if !self.is_boundary {
            return relative;
        }
        if relative == 0.0 {
            f64::MAX
        } else {
            1.0 / relative
        }
    }

    fn normal_direction(&self, position: ArrayView1<f64>, frame: Frame) -> Array1<f64> {
        let local = self.to_local(position, frame);
        let gradient = Zip::from(&local)
            .and(&self.semi_axes)
            .map_collect(|p, a| p / (a * a));

        let mut normal = linalg::normalized(gradient.view()).unwrap_or_else(|| {
            trace!(name = %self.name, "normal requested at the centre; using the first axis");
            let mut first_axis = Array1::zeros(self.dimension());
            first_axis[0] = 1.0;
            first_axis
        });
        if self.is_boundary {
            normal = -normal;
        }

        match frame {
            Frame::Global => self.pose.transform_direction_from_relative(normal.view()),
            Frame::Local => normal,
        }
    }

    fn local_radius(&self, position: ArrayView1<f64>, frame: Frame) -> f64 {
        let local = self.to_local(position, frame);
        let direction = linalg::normalized(local.view()).unwrap_or_else(|| {
            let mut first_axis = Array1::zeros(self.dimension());
            first_axis[0] = 1.0;
            first_axis
        });
        1.0 / self.scaled_norm_sq(direction.view()).sqrt()
    }

    fn is_boundary(&self) -> bool {
        self.is_boundary
    }

    fn linear_velocity(&self) -> Option<ArrayView1<'_, f64>> {
        self.linear_velocity.as_ref().map(|v| v.view())
    }

    fn do_velocity_step(&mut self, delta_time: f64) {
        if let Some(velocity) = &self.linear_velocity {
            let delta = velocity * delta_time;
            debug!(name = %self.name, %delta, "moving obstacle");
            self.pose.translate(delta.view());
        }
    }
}
