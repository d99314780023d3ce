//! Generic `Obstacle` capability trait.
//!
//! The avoidance core never looks at a concrete shape. It only reads
//! geometry through this trait, once per evaluation, so shapes can be swapped
//! without touching the modulation logic.
//!
//! # Conventions
//!
//! - `gamma == 1` on the surface, `> 1` in free space, `< 1` inside. For
//!   boundary (containing) obstacles the free space is the interior, so the
//!   sense inverts.
//! - Normal and reference directions point into free space: away from the
//!   obstacle for regular obstacles, inwards for boundaries.

use ndarray::{Array1, ArrayView1};
use rotavoid_geometry::{linalg, Pose};
use rotavoid_types::Frame;

/// A geometric obstacle. Read-only during an evaluation; only the driver
/// moves it, between steps.
pub trait Obstacle: Send + Sync {
    /// Local frame of the obstacle.
    fn pose(&self) -> &Pose;

    /// Distance-like measure; see the module conventions.
    fn gamma(&self, position: ArrayView1<f64>, frame: Frame) -> f64;

    /// Unit surface normal associated with `position`, pointing into free
    /// space and expressed in `frame`.
    fn normal_direction(&self, position: ArrayView1<f64>, frame: Frame) -> Array1<f64>;

    /// Distance from the centre to the surface along the ray through
    /// `position`.
    fn local_radius(&self, position: ArrayView1<f64>, frame: Frame) -> f64;

    /// True for obstacles that contain the agent (walls of a room).
    fn is_boundary(&self) -> bool {
        false
    }

    /// Translational velocity of a moving obstacle, global frame.
    fn linear_velocity(&self) -> Option<ArrayView1<'_, f64>> {
        None
    }

    /// Advance a moving obstacle by `delta_time` seconds. Static obstacles
    /// ignore it.
    fn do_velocity_step(&mut self, _delta_time: f64) {}

    /// Dimension of the space the obstacle lives in.
    fn dimension(&self) -> usize {
        self.pose().dimension()
    }

    /// Centre of the obstacle, global frame.
    fn center_position(&self) -> ArrayView1<'_, f64> {
        self.pose().position()
    }

    /// Reference (kernel) point, relative to which the obstacle is
    /// star-shaped. Defaults to the centre.
    fn reference_point(&self, frame: Frame) -> Array1<f64> {
        match frame {
            Frame::Global => self.center_position().to_owned(),
            Frame::Local => Array1::zeros(self.dimension()),
        }
    }

    /// Unit direction from the reference point towards `position` (inverted
    /// for boundaries). At the reference point itself the dummy direction
    /// `ones / d` is returned.
    fn reference_direction(&self, position: ArrayView1<f64>, frame: Frame) -> Array1<f64> {
        let relative = &position - &self.reference_point(frame);
        match linalg::normalized(relative.view()) {
            Some(direction) if self.is_boundary() => -direction,
            Some(direction) => direction,
            None => {
                let dimension = self.dimension();
                Array1::from_elem(dimension, 1.0 / dimension as f64)
            }
        }
    }

    /// Express `position` in the obstacle frame.
    fn to_local(&self, position: ArrayView1<f64>, frame: Frame) -> Array1<f64> {
        match frame {
            Frame::Global => self.pose().transform_position_to_relative(position),
            Frame::Local => position.to_owned(),
        }
    }

    /// Mirror a local `position` on the obstacle surface: outside points end
    /// up inside and vice versa. The centre maps to the far-away sentinel
    /// `(f64::MAX, 0, …)`.
    fn mirror_on_boundary(&self, position: ArrayView1<f64>) -> Array1<f64> {
        let pos_norm = linalg::norm(position);
        if pos_norm == 0.0 {
            let mut sentinel = Array1::zeros(position.len());
            sentinel[0] = f64::MAX;
            return sentinel;
        }
        let radius = self.local_radius(position, Frame::Local);
        position.mapv(|x| x * radius * radius / (pos_norm * pos_norm))
    }
}
