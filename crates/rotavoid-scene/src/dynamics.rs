//! Nominal (obstacle-free) dynamics.
//!
//! The avoidance core consumes these through the [`VelocityField`] trait
//! only; [`LinearSystem`] and [`ConstantValue`] are the two fields the
//! simulation driver and the tests need.

use ndarray::{Array1, ArrayView1};
use rotavoid_geometry::linalg;

/// A velocity field `position -> velocity`.
pub trait VelocityField: Send + Sync {
    /// Nominal velocity at `position`.
    fn evaluate(&self, position: ArrayView1<f64>) -> Array1<f64>;

    /// Point the field converges to, if it has one.
    fn attractor_position(&self) -> Option<ArrayView1<'_, f64>> {
        None
    }
}

/// Linear attractor dynamics `v = gain * (attractor - position)`, optionally
/// clipped to a maximum speed.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    attractor: Array1<f64>,
    gain: f64,
    maximum_velocity: Option<f64>,
}

impl LinearSystem {
    /// Unit gain, unclipped.
    pub fn new(attractor: Array1<f64>) -> Self {
        Self {
            attractor,
            gain: 1.0,
            maximum_velocity: None,
        }
    }

    /// Change the convergence gain.
    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    /// Clip the speed to `maximum_velocity`.
    pub fn with_maximum_velocity(mut self, maximum_velocity: f64) -> Self {
        self.maximum_velocity = Some(maximum_velocity);
        self
    }

    /// The attractor.
    pub fn attractor(&self) -> ArrayView1<'_, f64> {
        self.attractor.view()
    }
}

impl VelocityField for LinearSystem {
    fn evaluate(&self, position: ArrayView1<f64>) -> Array1<f64> {
        let velocity = (&self.attractor - &position) * self.gain;
        match self.maximum_velocity {
            Some(max) => {
                let speed = linalg::norm(velocity.view());
                if speed > max {
                    velocity * (max / speed)
                } else {
                    velocity
                }
            }
            None => velocity,
        }
    }

    fn attractor_position(&self) -> Option<ArrayView1<'_, f64>> {
        Some(self.attractor.view())
    }
}

/// The same velocity everywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantValue {
    velocity: Array1<f64>,
}

impl ConstantValue {
    pub fn new(velocity: Array1<f64>) -> Self {
        Self { velocity }
    }
}

impl VelocityField for ConstantValue {
    fn evaluate(&self, _position: ArrayView1<f64>) -> Array1<f64> {
        self.velocity.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn linear_system_points_to_attractor() {
        let field = LinearSystem::new(array![1.5, 0.0]);
        let v = field.evaluate(array![-1.0, 0.0].view());
        assert!((v[0] - 2.5).abs() < 1e-12);
        assert!(v[1].abs() < 1e-12);
        assert!(field.attractor_position().is_some());
    }

    #[test]
    fn linear_system_clips_speed() {
        let field = LinearSystem::new(array![0.0, 0.0])
            .with_gain(2.0)
            .with_maximum_velocity(1.0);
        let v = field.evaluate(array![10.0, 0.0].view());
        assert!((v[0] + 1.0).abs() < 1e-12);

        let slow = field.evaluate(array![0.25, 0.0].view());
        assert!((slow[0] + 0.5).abs() < 1e-12);
    }

    #[test]
    fn constant_value_ignores_position() {
        let field = ConstantValue::new(array![1.0, 1.0]);
        assert_eq!(field.evaluate(array![3.0, -9.0].view()), array![1.0, 1.0]);
        assert!(field.attractor_position().is_none());
    }
}
