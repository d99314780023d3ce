//! Tunable parameters of the avoidance core.
//!
//! All structs deserialize with per-field defaults, so a scenario file only
//! needs to name the values it changes.

use serde::{Deserialize, Serialize};

/// Parameters of the multi-obstacle modulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulationConfig {
    /// Obstacles whose Gamma reaches this value are ignored entirely.
    pub cutoff_gamma: f64,
    /// Exponent of the inverse-distance weights between obstacles.
    pub weight_power: f64,
    /// Exponent of the `1 / gamma` weight that grades how far a single
    /// obstacle rotates the velocity towards its tangent.
    pub gamma_weight_power: f64,
    /// Decay length of the exponential damping applied to the velocity of
    /// moving obstacles.
    pub obstacle_velocity_sigma: f64,
    /// Optional repulsion close to (and inside) obstacle surfaces.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repulsion: Option<RepulsionConfig>,
}

impl Default for ModulationConfig {
    fn default() -> Self {
        Self {
            cutoff_gamma: 1e6,
            weight_power: 1.0,
            gamma_weight_power: 1.0,
            obstacle_velocity_sigma: 1.0,
            repulsion: None,
        }
    }
}

/// Repulsive velocity added when an agent gets within `gamma_margin` of a
/// surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepulsionConfig {
    pub gamma_margin: f64,
    pub power: f64,
    pub factor: f64,
}

impl Default for RepulsionConfig {
    fn default() -> Self {
        Self {
            gamma_margin: 0.01,
            power: 5.0,
            factor: 5.0,
        }
    }
}

/// Parameters of the projected rotation dynamics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Gamma at which the projection has its full effect.
    pub min_gamma: f64,
    /// Gamma beyond which the obstacle no longer influences the projection.
    pub max_gamma: f64,
    /// Sharpness of the off-axis warp in the fold transform.
    pub dotprod_projection_power: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            min_gamma: 1.0,
            max_gamma: 10.0,
            dotprod_projection_power: 2.0,
        }
    }
}
