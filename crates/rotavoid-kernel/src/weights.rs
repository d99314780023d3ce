//! Gamma → blending weights.
//!
//! Two weights are involved in every modulation:
//!
//! - [`compute_weights`] distributes influence *between* obstacles from
//!   their Gamma values (inverse distance, normalised);
//! - [`inverse_gamma_weight`] grades how strongly a *single* obstacle rotates
//!   the velocity, from `1` on the surface down to `0` at infinity.

use tracing::debug;

/// Normalised inverse-distance weights of a set of Gamma values.
///
/// - empty input → empty output;
/// - if some `gamma <= low_gamma` (touching or inside), all weight goes to
///   the one with the smallest Gamma, split equally on ties;
/// - otherwise `w_i = (gamma_i - low_gamma)^(-power)`, normalised to sum to
///   one. If every raw weight vanishes (all obstacles infinitely far) the
///   result is all-zero, meaning "no influence".
///
/// # Example
///
/// ```rust
/// use rotavoid_kernel::weights::compute_weights;
///
/// let w = compute_weights(&[2.0, 3.0], 1.0, 1.0);
/// assert!((w[0] - 2.0 / 3.0).abs() < 1e-12);
/// assert!((w[1] - 1.0 / 3.0).abs() < 1e-12);
/// ```
pub fn compute_weights(gammas: &[f64], power: f64, low_gamma: f64) -> Vec<f64> {
    if gammas.is_empty() {
        return Vec::new();
    }

    let critical_min = gammas
        .iter()
        .copied()
        .filter(|gamma| *gamma <= low_gamma)
        .fold(f64::INFINITY, f64::min);
    if critical_min.is_finite() {
        return one_hot(gammas, |gamma| gamma == critical_min);
    }

    let raw: Vec<f64> = gammas
        .iter()
        .map(|gamma| (gamma - low_gamma).powf(-power))
        .collect();

    let largest = raw.iter().copied().fold(0.0_f64, f64::max);
    if largest == 0.0 || largest.is_nan() {
        debug!(count = gammas.len(), "all obstacles out of reach; zero weights");
        return vec![0.0; gammas.len()];
    }
    if largest.is_infinite() {
        return one_hot(&raw, f64::is_infinite);
    }

    let scaled: Vec<f64> = raw.iter().map(|w| w / largest).collect();
    let sum: f64 = scaled.iter().sum();
    scaled.into_iter().map(|w| w / sum).collect()
}

/// Weight `1` for every value selected by `is_hit`, split equally.
fn one_hot(values: &[f64], is_hit: impl Fn(f64) -> bool) -> Vec<f64> {
    let hits = values.iter().filter(|v| is_hit(**v)).count();
    let share = 1.0 / hits as f64;
    values
        .iter()
        .map(|v| if is_hit(*v) { share } else { 0.0 })
        .collect()
}

/// Proximity weight of one obstacle: `gamma^(-power)` clamped to `[0, 1]`.
///
/// Equal to `1` on and inside the surface, strictly decreasing towards `0`
/// as `gamma → ∞`.
pub fn inverse_gamma_weight(gamma: f64, power: f64) -> f64 {
    if gamma <= 1.0 {
        return 1.0;
    }
    gamma.powf(-power).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_gives_empty_weights() {
        assert!(compute_weights(&[], 1.0, 1.0).is_empty());
    }

    #[test]
    fn single_obstacle_gets_full_weight() {
        let w = compute_weights(&[4.0], 1.0, 1.0);
        assert_eq!(w, vec![1.0]);
    }

    #[test]
    fn weights_sum_to_one_and_favor_closer() {
        let w = compute_weights(&[1.5, 3.0, 10.0], 2.0, 1.0);
        let sum: f64 = w.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(w[0] > w[1] && w[1] > w[2]);
    }

    #[test]
    fn touching_obstacle_takes_all_weight() {
        let w = compute_weights(&[3.0, 1.0, 0.8, 2.0], 1.0, 1.0);
        assert_eq!(w, vec![0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn touching_ties_split_equally() {
        let w = compute_weights(&[0.9, 5.0, 0.9], 1.0, 1.0);
        assert_eq!(w, vec![0.5, 0.0, 0.5]);
    }

    #[test]
    fn infinitely_far_obstacles_have_no_weight() {
        let w = compute_weights(&[f64::INFINITY, f64::INFINITY], 1.0, 1.0);
        assert_eq!(w, vec![0.0, 0.0]);
    }

    #[test]
    fn barely_outside_surface_dominates() {
        let w = compute_weights(&[1.0 + 1e-320_f64.max(f64::MIN_POSITIVE), 2.0], 1.0, 1.0);
        assert!(w[0] > 0.999);
        assert!(w.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn inverse_gamma_weight_decays_monotonically() {
        assert_eq!(inverse_gamma_weight(0.5, 1.0), 1.0);
        assert_eq!(inverse_gamma_weight(1.0, 1.0), 1.0);
        let mut previous = 1.0;
        for gamma in [1.1, 2.0, 5.0, 10.0, 1e6] {
            let weight = inverse_gamma_weight(gamma, 1.0);
            assert!(weight < previous);
            previous = weight;
        }
        assert!(inverse_gamma_weight(1e12, 1.0) < 1e-11);
    }
}
