//! Modulated velocity field sampled on a planar grid.
//!
//! Grid points are independent, so they are evaluated in parallel with
//! `rayon`; the output keeps row-major order (x fastest). Points inside any
//! obstacle carry no velocity.

use ndarray::{Array1, array};
use rayon::prelude::*;
use rotavoid_kernel::modulate;
use rotavoid_scene::{Obstacle, VelocityField};
use rotavoid_types::{AvoidanceError, Frame, ModulationConfig};
use tracing::debug;

/// One grid point and its modulated velocity.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSample {
    pub position: Array1<f64>,
    /// `None` inside an obstacle.
    pub velocity: Option<Array1<f64>>,
}

/// `resolution` evenly spaced values spanning `range`, ends included.
fn linspace(range: (f64, f64), resolution: usize, index: usize) -> f64 {
    if resolution < 2 {
        return range.0;
    }
    range.0 + (range.1 - range.0) * index as f64 / (resolution - 1) as f64
}

/// Sample the modulated `field` on a `resolution × resolution` grid.
///
/// # Errors
///
/// [`AvoidanceError::DimensionMismatch`] for obstacles that are not planar,
/// and any modulation failure at a grid point.
pub fn sample_grid(
    x_range: (f64, f64),
    y_range: (f64, f64),
    resolution: usize,
    obstacles: &[&dyn Obstacle],
    field: &dyn VelocityField,
    config: &ModulationConfig,
) -> Result<Vec<GridSample>, AvoidanceError> {
    for obstacle in obstacles {
        AvoidanceError::check_dimension(2, obstacle.dimension())?;
    }

    let positions: Vec<Array1<f64>> = (0..resolution)
        .flat_map(|j| {
            (0..resolution).map(move |i| {
                array![
                    linspace(x_range, resolution, i),
                    linspace(y_range, resolution, j)
                ]
            })
        })
        .collect();
    debug!(points = positions.len(), "sampling modulated field");

    positions
        .into_par_iter()
        .map(|position| {
            let inside = obstacles
                .iter()
                .any(|obstacle| obstacle.gamma(position.view(), Frame::Global) < 1.0);
            if inside {
                return Ok(GridSample {
                    position,
                    velocity: None,
                });
            }
            let nominal = field.evaluate(position.view());
            let velocity = modulate(position.view(), nominal.view(), obstacles, field, config)?;
            Ok(GridSample {
                position,
                velocity: Some(velocity),
            })
        })
        .collect()
}
