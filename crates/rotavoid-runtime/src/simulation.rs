//! Trajectory integration of the modulated dynamics.
//!
//! [`Simulation`] owns the nominal field, the obstacles and every parameter
//! of a run. Each step evaluates the nominal velocity, modulates it with
//! [`rotavoid_kernel::modulate`] (or its projected-convergence variant) and
//! integrates with explicit Euler or classic RK4. Moving obstacles are
//! advanced by `delta_time` after every step; all stages of one RK4 step
//! see the obstacles where they stood at the start of the step.
//!
//! A run ends when one of these happens:
//!
//! | Outcome              | Condition                                          |
//! |----------------------|----------------------------------------------------|
//! | [`Outcome::Converged`] | distance to the attractor below the tolerance (step length when the field has no attractor) |
//! | [`Outcome::Stalled`]   | [`StallGuard`] saw `stall_window` steps without progress |
//! | [`Outcome::MaxSteps`]  | step budget exhausted                              |

use ndarray::{Array1, ArrayView1};
use rotavoid_geometry::linalg;
use rotavoid_kernel::{
    ProjectedConvergence, ProjectedRotationDynamics, modulate, modulate_with_convergence,
};
use rotavoid_scene::{Obstacle, VelocityField};
use rotavoid_types::{AvoidanceError, ModulationConfig, ProjectionConfig};
use tracing::{debug, info, warn};

use crate::scenario::{ConvergenceMode, Integrator, SimulationConfig};
use crate::stall_guard::StallGuard;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Converged,
    Stalled,
    MaxSteps,
}

/// Positions visited by a run, start included.
#[derive(Debug, Clone)]
pub struct Trajectory {
    positions: Vec<Array1<f64>>,
    outcome: Outcome,
}

impl Trajectory {
    pub fn positions(&self) -> &[Array1<f64>] {
        &self.positions
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Last visited position.
    pub fn final_position(&self) -> ArrayView1<'_, f64> {
        // A trajectory always holds at least the start.
        self.positions[self.positions.len() - 1].view()
    }

    /// Number of positions, start included.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sum of the step lengths.
    pub fn path_length(&self) -> f64 {
        self.positions
            .windows(2)
            .map(|pair| linalg::norm((&pair[1] - &pair[0]).view()))
            .sum()
    }
}

/// Integrates the modulated dynamics of one scene.
pub struct Simulation {
    field: Box<dyn VelocityField>,
    obstacles: Vec<Box<dyn Obstacle>>,
    modulation: ModulationConfig,
    projection: ProjectionConfig,
    config: SimulationConfig,
}

impl Simulation {
    pub fn new(
        field: Box<dyn VelocityField>,
        obstacles: Vec<Box<dyn Obstacle>>,
        modulation: ModulationConfig,
        config: SimulationConfig,
    ) -> Self {
        Self {
            field,
            obstacles,
            modulation,
            projection: ProjectionConfig::default(),
            config,
        }
    }

    /// Parameters of the projected dynamics used with
    /// [`ConvergenceMode::Projected`].
    pub fn with_projection(mut self, projection: ProjectionConfig) -> Self {
        self.projection = projection;
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// The obstacles in their current state.
    pub fn obstacles(&self) -> &[Box<dyn Obstacle>] {
        &self.obstacles
    }

    fn obstacle_refs(&self) -> Vec<&dyn Obstacle> {
        self.obstacles.iter().map(|o| o.as_ref()).collect()
    }

    /// Modulated velocity at `position`.
    pub fn velocity(&self, position: ArrayView1<f64>) -> Result<Array1<f64>, AvoidanceError> {
        let nominal = self.field.evaluate(position);
        let obstacles = self.obstacle_refs();
        match self.config.convergence {
            ConvergenceMode::Field => modulate(
                position,
                nominal.view(),
                &obstacles,
                self.field.as_ref(),
                &self.modulation,
            ),
            ConvergenceMode::Projected => {
                let provider = self.projected_convergence(&obstacles)?;
                modulate_with_convergence(
                    position,
                    nominal.view(),
                    &obstacles,
                    &provider,
                    &self.modulation,
                )
            }
        }
    }

    fn projected_convergence<'a>(
        &'a self,
        obstacles: &[&'a dyn Obstacle],
    ) -> Result<ProjectedConvergence<'a>, AvoidanceError> {
        let Some(attractor) = self.field.attractor_position() else {
            debug!("field without attractor; projected convergence falls back to the field");
            return Ok(ProjectedConvergence::new(self.field.as_ref(), Vec::new()));
        };
        let dynamics = obstacles
            .iter()
            .map(|obstacle| {
                let reference = self.field.evaluate(obstacle.center_position());
                ProjectedRotationDynamics::new(
                    *obstacle,
                    attractor.to_owned(),
                    reference,
                    self.projection,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProjectedConvergence::new(self.field.as_ref(), dynamics))
    }

    /// One integration step from `position`.
    pub fn step(&self, position: ArrayView1<f64>) -> Result<Array1<f64>, AvoidanceError> {
        let dt = self.config.delta_time;
        match self.config.integrator {
            Integrator::Euler => {
                let velocity = self.velocity(position)?;
                Ok(&position + &(velocity * dt))
            }
            Integrator::Rk4 => {
                let k1 = self.velocity(position)?;
                let p2 = &position + &(&k1 * (dt * 0.5));
                let k2 = self.velocity(p2.view())?;
                let p3 = &position + &(&k2 * (dt * 0.5));
                let k3 = self.velocity(p3.view())?;
                let p4 = &position + &(&k3 * dt);
                let k4 = self.velocity(p4.view())?;

                let sum = k1 + &(k2 * 2.0) + &(k3 * 2.0) + &k4;
                Ok(&position + &(sum * (dt / 6.0)))
            }
        }
    }

    /// Integrate from `start` until convergence, stall or the step budget.
    ///
    /// Moving obstacles keep the position they reached when the run ends.
    pub fn run(&mut self, start: Array1<f64>) -> Result<Trajectory, AvoidanceError> {
        let attractor = self.field.attractor_position().map(|a| a.to_owned());
        if let Some(attractor) = &attractor {
            AvoidanceError::check_dimension(attractor.len(), start.len())?;
        }

        let mut guard = StallGuard::new(self.config.stall_window, self.config.min_progress);
        let mut distance = attractor
            .as_ref()
            .map(|a| linalg::norm((a - &start).view()));
        let mut current = start.clone();
        let mut positions = vec![start];

        for step in 0..self.config.max_steps {
            let next = self.step(current.view())?;
            let step_length = linalg::norm((&next - &current).view());
            for obstacle in &mut self.obstacles {
                obstacle.do_velocity_step(self.config.delta_time);
            }

            let (converged, progress) = match (&attractor, distance) {
                (Some(attractor), Some(previous)) => {
                    let remaining = linalg::norm((attractor - &next).view());
                    distance = Some(remaining);
                    (remaining < self.config.convergence_tolerance, previous - remaining)
                }
                _ => (step_length < self.config.convergence_tolerance, step_length),
            };

            positions.push(next.clone());
            current = next;

            if converged {
                info!(steps = step + 1, "trajectory converged");
                return Ok(Trajectory {
                    positions,
                    outcome: Outcome::Converged,
                });
            }
            if guard.record(progress) {
                warn!(steps = step + 1, position = %current, "trajectory stalled");
                return Ok(Trajectory {
                    positions,
                    outcome: Outcome::Stalled,
                });
            }
        }

        warn!(max_steps = self.config.max_steps, "step budget exhausted");
        Ok(Trajectory {
            positions,
            outcome: Outcome::MaxSteps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rotavoid_scene::{ConstantValue, Ellipse, LinearSystem};
    use rotavoid_types::Frame;

    fn circle_scene(config: SimulationConfig) -> Simulation {
        let circle = Ellipse::circle(array![0.0, 0.0], 1.0).unwrap();
        Simulation::new(
            Box::new(LinearSystem::new(array![2.0, 0.0])),
            vec![Box::new(circle)],
            ModulationConfig::default(),
            config,
        )
    }

    fn min_gamma(trajectory: &Trajectory) -> f64 {
        let circle = Ellipse::circle(array![0.0, 0.0], 1.0).unwrap();
        trajectory
            .positions()
            .iter()
            .map(|p| circle.gamma(p.view(), Frame::Global))
            .fold(f64::INFINITY, f64::min)
    }

    #[test]
    fn euler_run_goes_around_the_circle() {
        let mut sim = circle_scene(SimulationConfig::default());
        let trajectory = sim.run(array![-4.0, 0.2]).unwrap();
        assert_eq!(trajectory.outcome(), Outcome::Converged);
        assert!(min_gamma(&trajectory) > 0.99);
        let end = trajectory.final_position();
        assert!((end[0] - 2.0).abs() < 1e-2 && end[1].abs() < 1e-2);
    }

    #[test]
    fn rk4_run_goes_around_the_circle() {
        let mut sim = circle_scene(SimulationConfig {
            integrator: Integrator::Rk4,
            delta_time: 0.02,
            ..SimulationConfig::default()
        });
        let trajectory = sim.run(array![-4.0, -0.3]).unwrap();
        assert_eq!(trajectory.outcome(), Outcome::Converged);
        assert!(min_gamma(&trajectory) > 0.99);
        assert!(trajectory.path_length() > 6.0);
    }

    #[test]
    fn projected_convergence_run_stays_outside() {
        let mut sim = circle_scene(SimulationConfig {
            convergence: ConvergenceMode::Projected,
            max_steps: 1_500,
            ..SimulationConfig::default()
        });
        let trajectory = sim.run(array![-4.0, 0.5]).unwrap();
        assert!(trajectory.len() > 1);
        assert!(min_gamma(&trajectory) > 0.99);
        assert!(trajectory.positions().iter().all(|p| p.iter().all(|x| x.is_finite())));
        let end = trajectory.final_position();
        assert!(linalg::norm((&array![2.0, 0.0] - &end).view()) < 6.0);
    }

    #[test]
    fn step_budget_is_respected() {
        let mut sim = circle_scene(SimulationConfig {
            max_steps: 10,
            ..SimulationConfig::default()
        });
        let trajectory = sim.run(array![-4.0, 0.2]).unwrap();
        assert_eq!(trajectory.outcome(), Outcome::MaxSteps);
        assert_eq!(trajectory.len(), 11);
    }

    #[test]
    fn stall_is_reported() {
        // A zero field never moves the agent.
        let mut sim = Simulation::new(
            Box::new(ConstantValue::new(array![0.0, 0.0])),
            Vec::new(),
            ModulationConfig::default(),
            SimulationConfig {
                convergence_tolerance: 0.0,
                stall_window: 5,
                ..SimulationConfig::default()
            },
        );
        let trajectory = sim.run(array![1.0, 1.0]).unwrap();
        assert_eq!(trajectory.outcome(), Outcome::Stalled);
        assert_eq!(trajectory.len(), 6);
    }

    #[test]
    fn field_without_attractor_converges_on_step_length() {
        let mut sim = Simulation::new(
            Box::new(ConstantValue::new(array![0.0, 0.0])),
            Vec::new(),
            ModulationConfig::default(),
            SimulationConfig::default(),
        );
        let trajectory = sim.run(array![1.0, 1.0]).unwrap();
        assert_eq!(trajectory.outcome(), Outcome::Converged);
        assert_eq!(trajectory.len(), 2);
    }

    #[test]
    fn moving_obstacle_is_advanced_and_avoided() {
        let config = SimulationConfig {
            max_steps: 3_000,
            ..SimulationConfig::default()
        };
        let start_center = array![0.0, -1.5];
        let velocity = array![0.0, 0.5];
        let moving = Ellipse::circle(start_center.clone(), 1.0)
            .unwrap()
            .with_linear_velocity(velocity.clone());
        let mut sim = Simulation::new(
            Box::new(LinearSystem::new(array![3.0, 0.0])),
            vec![Box::new(moving)],
            ModulationConfig::default(),
            config,
        );

        let trajectory = sim.run(array![-4.0, 0.0]).unwrap();
        assert_eq!(trajectory.outcome(), Outcome::Converged);

        let steps = (trajectory.len() - 1) as f64;
        let expected = &start_center + &(&velocity * (steps * config.delta_time));
        let center = sim.obstacles()[0].center_position();
        assert!((center[1] - expected[1]).abs() < 1e-9);
        assert!(center[1] > start_center[1]);

        for (step, position) in trajectory.positions().iter().enumerate() {
            let center = &start_center + &(&velocity * (step as f64 * config.delta_time));
            let snapshot = Ellipse::circle(center, 1.0).unwrap();
            let gamma = snapshot.gamma(position.view(), Frame::Global);
            assert!(gamma > 0.98, "step {step}: gamma {gamma}");
        }
    }

    #[test]
    fn projected_mode_reports_attractor_on_an_obstacle_centre() {
        let circle = Ellipse::circle(array![2.0, 0.0], 1.0).unwrap();
        let mut sim = Simulation::new(
            Box::new(LinearSystem::new(array![2.0, 0.0])),
            vec![Box::new(circle)],
            ModulationConfig::default(),
            SimulationConfig {
                convergence: ConvergenceMode::Projected,
                ..SimulationConfig::default()
            },
        );
        assert!(matches!(
            sim.run(array![-4.0, 0.0]),
            Err(AvoidanceError::CoincidentPoint { .. })
        ));
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let mut sim = circle_scene(SimulationConfig::default());
        assert!(sim.run(array![0.0, 0.0, 4.0]).is_err());
    }
}
