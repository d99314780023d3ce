//! Scenario files – reads/writes avoidance scenes as TOML.
//!
//! A scenario bundles everything the simulation driver needs: start and
//! attractor, the nominal linear dynamics, the ellipse obstacles and the
//! modulation / projection / integration parameters. Every table except
//! `start` and `attractor` may be omitted and falls back to its default.
//!
//! ```toml
//! start = [-4.0, 0.2]
//! attractor = [2.0, 0.0]
//!
//! [[obstacles]]
//! center = [0.0, 0.0]
//! axes_length = [2.0, 2.0]
//!
//! [simulation]
//! delta_time = 0.01
//! integrator = "rk4"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array1;
use rotavoid_geometry::Pose;
use rotavoid_scene::{Ellipse, LinearSystem, Obstacle};
use rotavoid_types::{AvoidanceError, ModulationConfig, ProjectionConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::simulation::Simulation;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Failures while loading, saving or instantiating a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Failed to read scenario at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write scenario at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse scenario: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize scenario: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid scenario: {0}")]
    Invalid(String),

    #[error(transparent)]
    Avoidance(#[from] AvoidanceError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Simulation parameters
// ─────────────────────────────────────────────────────────────────────────────

/// Numerical integration scheme of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Integrator {
    #[default]
    Euler,
    Rk4,
}

/// Source of the per-obstacle convergence direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvergenceMode {
    /// Nominal field at the obstacle reference point.
    #[default]
    Field,
    /// Projected rotation dynamics per obstacle.
    Projected,
}

/// Stepping parameters of [`Simulation`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Integration step in seconds.
    pub delta_time: f64,
    /// Hard cap on the number of steps.
    pub max_steps: usize,
    /// Distance to the attractor (or step length without one) at which the
    /// run counts as converged.
    pub convergence_tolerance: f64,
    pub integrator: Integrator,
    pub convergence: ConvergenceMode,
    /// Consecutive steps without progress before the run is declared stalled.
    ///
    /// Progress is measured per step, so a detour that moves away from the
    /// attractor for longer than `stall_window * delta_time` seconds (around
    /// a long obstacle, say) also ends the run as stalled. Widen the window
    /// for such scenes.
    pub stall_window: usize,
    /// Progress towards the attractor below which a step counts as stalled.
    pub min_progress: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            delta_time: 0.01,
            max_steps: 5_000,
            convergence_tolerance: 1e-3,
            integrator: Integrator::Euler,
            convergence: ConvergenceMode::Field,
            stall_window: 200,
            min_progress: 1e-9,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario
// ─────────────────────────────────────────────────────────────────────────────

/// One ellipse obstacle of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EllipseSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub center: Vec<f64>,
    /// Full axis lengths.
    pub axes_length: Vec<f64>,
    /// Planar orientation in radians; 2-D scenarios only.
    #[serde(default)]
    pub orientation: f64,
    #[serde(default)]
    pub is_boundary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linear_velocity: Option<Vec<f64>>,
}

impl EllipseSpec {
    /// Instantiate the obstacle.
    pub fn build(&self) -> Result<Ellipse, ScenarioError> {
        let center = Array1::from(self.center.clone());
        let pose = if self.orientation != 0.0 {
            Pose::planar(center, self.orientation)?
        } else {
            Pose::new(center)
        };

        let mut ellipse = Ellipse::with_pose(pose, Array1::from(self.axes_length.clone()))?;
        if let Some(name) = &self.name {
            ellipse = ellipse.with_name(name.clone());
        }
        if self.is_boundary {
            ellipse = ellipse.into_boundary();
        }
        if let Some(velocity) = &self.linear_velocity {
            AvoidanceError::check_dimension(self.center.len(), velocity.len())?;
            ellipse = ellipse.with_linear_velocity(Array1::from(velocity.clone()));
        }
        Ok(ellipse)
    }
}

/// A complete avoidance scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub start: Vec<f64>,
    pub attractor: Vec<f64>,

    /// Gain of the linear nominal dynamics.
    #[serde(default = "default_gain")]
    pub gain: f64,

    /// Speed limit of the nominal dynamics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_velocity: Option<f64>,

    #[serde(default)]
    pub obstacles: Vec<EllipseSpec>,

    #[serde(default)]
    pub modulation: ModulationConfig,

    #[serde(default)]
    pub projection: ProjectionConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

fn default_gain() -> f64 {
    1.0
}

impl Default for ScenarioConfig {
    /// A unit circle between the start and the attractor.
    fn default() -> Self {
        Self {
            start: vec![-4.0, 0.2],
            attractor: vec![2.0, 0.0],
            gain: default_gain(),
            maximum_velocity: None,
            obstacles: vec![EllipseSpec {
                name: Some("circle".to_string()),
                center: vec![0.0, 0.0],
                axes_length: vec![2.0, 2.0],
                orientation: 0.0,
                is_boundary: false,
                linear_velocity: None,
            }],
            modulation: ModulationConfig::default(),
            projection: ProjectionConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl ScenarioConfig {
    /// Dimension of the scene, taken from the start position.
    pub fn dimension(&self) -> usize {
        self.start.len()
    }

    /// Check the sizes and step parameters.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let dimension = self.dimension();
        if dimension < 2 {
            return Err(ScenarioError::Invalid(format!(
                "dimension must be at least 2, got {dimension}"
            )));
        }
        AvoidanceError::check_dimension(dimension, self.attractor.len())?;
        for obstacle in &self.obstacles {
            AvoidanceError::check_dimension(dimension, obstacle.center.len())?;
            AvoidanceError::check_dimension(dimension, obstacle.axes_length.len())?;
        }
        if !(self.simulation.delta_time > 0.0) {
            return Err(ScenarioError::Invalid(format!(
                "delta_time must be positive, got {}",
                self.simulation.delta_time
            )));
        }
        Ok(())
    }

    /// The obstacles of the scene.
    pub fn build_obstacles(&self) -> Result<Vec<Ellipse>, ScenarioError> {
        self.obstacles.iter().map(EllipseSpec::build).collect()
    }

    /// The nominal linear dynamics towards the attractor.
    pub fn build_dynamics(&self) -> LinearSystem {
        let dynamics = LinearSystem::new(Array1::from(self.attractor.clone())).with_gain(self.gain);
        match self.maximum_velocity {
            Some(max) => dynamics.with_maximum_velocity(max),
            None => dynamics,
        }
    }

    /// A driver for the whole scene.
    pub fn build_simulation(&self) -> Result<Simulation, ScenarioError> {
        self.validate()?;
        let obstacles = self
            .build_obstacles()?
            .into_iter()
            .map(|ellipse| Box::new(ellipse) as Box<dyn Obstacle>)
            .collect();
        Ok(Simulation::new(
            Box::new(self.build_dynamics()),
            obstacles,
            self.modulation.clone(),
            self.simulation,
        )
        .with_projection(self.projection))
    }

    /// Start position as an array.
    pub fn start_position(&self) -> Array1<f64> {
        Array1::from(self.start.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

/// Load a scenario from `path`. Returns `None` if the file does not exist.
///
/// Environment overrides are applied and the result is validated.
pub fn load_from(path: &Path) -> Result<Option<ScenarioConfig>, ScenarioError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut cfg: ScenarioConfig = toml::from_str(&raw)?;
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    debug!(path = %path.display(), obstacles = cfg.obstacles.len(), "scenario loaded");
    Ok(Some(cfg))
}

/// Save a scenario to `path`, creating parent directories as needed.
pub fn save_to(cfg: &ScenarioConfig, path: &Path) -> Result<(), ScenarioError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ScenarioError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let raw = toml::to_string_pretty(cfg)?;
    fs::write(path, raw).map_err(|source| ScenarioError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply `ROTAVOID_*` environment variable overrides to `cfg`.
///
/// | Variable | Field |
/// |---|---|
/// | `ROTAVOID_DELTA_TIME` | `simulation.delta_time` |
/// | `ROTAVOID_MAX_STEPS` | `simulation.max_steps` |
///
/// Unparsable values are ignored.
pub fn apply_env_overrides(cfg: &mut ScenarioConfig) {
    if let Ok(v) = std::env::var("ROTAVOID_DELTA_TIME")
        && let Ok(delta_time) = v.parse::<f64>()
    {
        cfg.simulation.delta_time = delta_time;
    }
    if let Ok(v) = std::env::var("ROTAVOID_MAX_STEPS")
        && let Ok(max_steps) = v.parse::<usize>()
    {
        cfg.simulation.max_steps = max_steps;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotavoid_types::Frame;

    #[test]
    fn roundtrip_default_scenario() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("scenes").join("circle.toml");

        let cfg = ScenarioConfig::default();
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.obstacles, cfg.obstacles);
        assert_eq!(loaded.attractor, vec![2.0, 0.0]);
        assert_eq!(loaded.modulation, cfg.modulation);
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let result = load_from(&dir.path().join("absent.toml")).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn minimal_file_uses_defaults() {
        let cfg: ScenarioConfig = toml::from_str(
            r#"
            start = [0.0, 3.0]
            attractor = [0.0, -3.0]

            [simulation]
            integrator = "rk4"
            convergence = "projected"
            "#,
        )
        .expect("parse");
        assert!(cfg.obstacles.is_empty());
        assert!((cfg.gain - 1.0).abs() < 1e-12);
        assert_eq!(cfg.simulation.integrator, Integrator::Rk4);
        assert_eq!(cfg.simulation.convergence, ConvergenceMode::Projected);
        assert!((cfg.simulation.delta_time - 0.01).abs() < 1e-12);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "start = [1.0, \n").expect("write");
        assert!(matches!(load_from(&path), Err(ScenarioError::Parse(_))));
    }

    #[test]
    fn validation_catches_dimension_mismatch() {
        let cfg = ScenarioConfig {
            attractor: vec![1.0, 0.0, 0.0],
            ..ScenarioConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ScenarioError::Avoidance(AvoidanceError::DimensionMismatch { .. }))
        ));

        let bad_step = ScenarioConfig {
            simulation: SimulationConfig {
                delta_time: 0.0,
                ..SimulationConfig::default()
            },
            ..ScenarioConfig::default()
        };
        assert!(matches!(bad_step.validate(), Err(ScenarioError::Invalid(_))));
    }

    #[test]
    fn build_obstacles_honours_specs() {
        let cfg = ScenarioConfig {
            obstacles: vec![
                EllipseSpec {
                    name: Some("wall".to_string()),
                    center: vec![0.0, 0.0],
                    axes_length: vec![10.0, 10.0],
                    orientation: 0.0,
                    is_boundary: true,
                    linear_velocity: None,
                },
                EllipseSpec {
                    name: None,
                    center: vec![1.0, 1.0],
                    axes_length: vec![4.0, 2.0],
                    orientation: std::f64::consts::FRAC_PI_2,
                    is_boundary: false,
                    linear_velocity: Some(vec![0.5, 0.0]),
                },
            ],
            ..ScenarioConfig::default()
        };
        let obstacles = cfg.build_obstacles().expect("build");
        assert_eq!(obstacles[0].name(), "wall");
        assert!(obstacles[0].is_boundary());
        assert!(obstacles[1].linear_velocity().is_some());
        // Long axis rotated onto global y.
        let gamma = obstacles[1].gamma(ndarray::array![1.0, 3.0].view(), Frame::Global);
        assert!((gamma - 1.0).abs() < 1e-12);
    }

    #[test]
    fn build_dynamics_applies_gain_and_limit() {
        use rotavoid_scene::VelocityField;
        let cfg = ScenarioConfig {
            gain: 2.0,
            maximum_velocity: Some(1.0),
            ..ScenarioConfig::default()
        };
        let dynamics = cfg.build_dynamics();
        let v = dynamics.evaluate(ndarray::array![1.5, 0.0].view());
        assert!((v[0] - 1.0).abs() < 1e-12);
        let far = dynamics.evaluate(ndarray::array![-10.0, 0.0].view());
        assert!((far[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn apply_env_overrides_changes_max_steps() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("ROTAVOID_MAX_STEPS", "42") };
        let mut cfg = ScenarioConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.simulation.max_steps, 42);
        unsafe { std::env::remove_var("ROTAVOID_MAX_STEPS") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_delta_time() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("ROTAVOID_DELTA_TIME", "fast") };
        let mut cfg = ScenarioConfig::default();
        let original = cfg.simulation.delta_time;
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.simulation.delta_time, original);
        unsafe { std::env::remove_var("ROTAVOID_DELTA_TIME") };
    }
}
