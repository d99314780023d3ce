//! Where each obstacle wants the agent to go.
//!
//! The rotational avoidance bends the velocity towards a tangent built from
//! a per-obstacle *convergence direction*. A [`ConvergenceProvider`] supplies
//! it; two implementations ship with the kernel:
//!
//! | Provider                | Convergence velocity                          |
//! |-------------------------|-----------------------------------------------|
//! | [`FieldConvergence`]    | nominal field at the obstacle reference point |
//! | [`ProjectedConvergence`]| per-obstacle [`ProjectedRotationDynamics`]    |

use ndarray::{Array1, ArrayView1};
use rotavoid_scene::{Obstacle, VelocityField};
use rotavoid_types::{AvoidanceError, Frame};
use tracing::debug;

use crate::projected::ProjectedRotationDynamics;

/// Supplies the convergence velocity of one obstacle.
pub trait ConvergenceProvider: Send + Sync {
    /// Convergence velocity for `obstacle`, the `obstacle_index`-th entry of
    /// the list being modulated, seen from `position`.
    fn convergence_velocity(
        &self,
        position: ArrayView1<f64>,
        obstacle_index: usize,
        obstacle: &dyn Obstacle,
    ) -> Result<Array1<f64>, AvoidanceError>;
}

/// The nominal dynamics evaluated at the obstacle's reference point.
pub struct FieldConvergence<'a> {
    field: &'a dyn VelocityField,
}

impl<'a> FieldConvergence<'a> {
    pub fn new(field: &'a dyn VelocityField) -> Self {
        Self { field }
    }
}

impl ConvergenceProvider for FieldConvergence<'_> {
    fn convergence_velocity(
        &self,
        _position: ArrayView1<f64>,
        _obstacle_index: usize,
        obstacle: &dyn Obstacle,
    ) -> Result<Array1<f64>, AvoidanceError> {
        let reference = obstacle.reference_point(Frame::Global);
        Ok(self.field.evaluate(reference.view()))
    }
}

/// Convergence from one [`ProjectedRotationDynamics`] per obstacle, indexed
/// like the obstacle list passed to the modulation.
///
/// Obstacles without a matching entry fall back to [`FieldConvergence`].
pub struct ProjectedConvergence<'a> {
    field: &'a dyn VelocityField,
    dynamics: Vec<ProjectedRotationDynamics<'a>>,
}

impl<'a> ProjectedConvergence<'a> {
    pub fn new(field: &'a dyn VelocityField, dynamics: Vec<ProjectedRotationDynamics<'a>>) -> Self {
        Self { field, dynamics }
    }

    /// Number of obstacles with projected dynamics.
    pub fn len(&self) -> usize {
        self.dynamics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dynamics.is_empty()
    }
}

impl ConvergenceProvider for ProjectedConvergence<'_> {
    fn convergence_velocity(
        &self,
        position: ArrayView1<f64>,
        obstacle_index: usize,
        obstacle: &dyn Obstacle,
    ) -> Result<Array1<f64>, AvoidanceError> {
        match self.dynamics.get(obstacle_index) {
            Some(dynamics) => dynamics.convergence_velocity(position, self.field),
            None => {
                debug!(obstacle_index, "no projected dynamics; using field convergence");
                FieldConvergence::new(self.field).convergence_velocity(
                    position,
                    obstacle_index,
                    obstacle,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rotavoid_scene::{Ellipse, LinearSystem};
    use rotavoid_types::ProjectionConfig;

    #[test]
    fn field_convergence_reads_the_reference_point() {
        let field = LinearSystem::new(array![3.0, 0.0]);
        let circle = Ellipse::circle(array![1.0, 1.0], 0.5).unwrap();
        let provider = FieldConvergence::new(&field);
        let v = provider
            .convergence_velocity(array![-4.0, 0.0].view(), 0, &circle)
            .unwrap();
        assert!((v[0] - 2.0).abs() < 1e-12);
        assert!((v[1] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn projected_convergence_falls_back_when_missing() {
        let field = LinearSystem::new(array![3.0, 0.0]);
        let circle = Ellipse::circle(array![0.0, 0.0], 1.0).unwrap();
        let provider = ProjectedConvergence::new(&field, Vec::new());
        assert!(provider.is_empty());
        let v = provider
            .convergence_velocity(array![-4.0, 0.0].view(), 2, &circle)
            .unwrap();
        assert!((v[0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn projected_convergence_uses_its_dynamics() {
        let field = LinearSystem::new(array![3.0, 0.0]);
        let circle = Ellipse::circle(array![0.0, 0.0], 1.0).unwrap();
        let dynamics = ProjectedRotationDynamics::new(
            &circle,
            array![3.0, 0.0],
            array![1.0, 0.0],
            ProjectionConfig::default(),
        )
        .unwrap();
        let provider = ProjectedConvergence::new(&field, vec![dynamics]);
        assert_eq!(provider.len(), 1);
        let v = provider
            .convergence_velocity(array![-3.0, 1.0].view(), 0, &circle)
            .unwrap();
        assert!(v.iter().all(|x| x.is_finite()));
        assert!(v[0] > 0.0);
    }
}
