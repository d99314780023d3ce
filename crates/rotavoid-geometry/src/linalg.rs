//! Small vector helpers on top of `ndarray`.
//!
//! Norms and normalisation are computed on a max-abs scaled copy so that the
//! sentinel magnitudes used by the projection (`f64::MAX`) survive without
//! overflowing to infinity.

use ndarray::{Array1, Array2, ArrayView1};

/// Below this norm the component orthogonal to a direction is treated as
/// absent (the two directions are parallel or anti-parallel).
pub const ORTHOGONAL_TOLERANCE: f64 = 1e-12;

/// Euclidean norm, robust against overflow of the squared entries.
///
/// Returns `f64::INFINITY` when an entry is infinite and `NaN` when an entry
/// is `NaN`.
pub fn norm(vector: ArrayView1<f64>) -> f64 {
    let scale = vector.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
    if scale == 0.0 {
        return 0.0;
    }
    if !scale.is_finite() {
        return scale;
    }
    let sum: f64 = vector.iter().map(|x| (x / scale) * (x / scale)).sum();
    scale * sum.sqrt()
}

/// Unit vector pointing along `vector`, or `None` for a zero (or non-finite)
/// vector.
pub fn normalized(vector: ArrayView1<f64>) -> Option<Array1<f64>> {
    let scale = vector.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let scaled = vector.mapv(|x| x / scale);
    let length = scaled.dot(&scaled).sqrt();
    Some(scaled / length)
}

/// Index of the identity axis least aligned with `direction`.
///
/// Ties resolve to the lowest index, so the choice is deterministic.
pub fn least_aligned_axis(direction: ArrayView1<f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::INFINITY;
    for (index, value) in direction.iter().enumerate() {
        if value.abs() < best_value {
            best = index;
            best_value = value.abs();
        }
    }
    best
}

/// Unit vector orthogonal to the unit vector `direction`, built from the
/// least aligned identity axis.
///
/// # Panics
///
/// Panics if `direction` has fewer than two entries.
pub fn deterministic_orthogonal(direction: ArrayView1<f64>) -> Array1<f64> {
    assert!(
        direction.len() >= 2,
        "an orthogonal direction needs at least two dimensions"
    );
    let axis = least_aligned_axis(direction);
    let mut candidate = direction.mapv(|x| -x * direction[axis]);
    candidate[axis] += 1.0;
    // |direction[axis]| <= 1/sqrt(d) < 1, so the candidate cannot vanish.
    normalized(candidate.view()).unwrap_or_else(|| {
        let mut fallback = Array1::zeros(direction.len());
        fallback[axis] = 1.0;
        fallback
    })
}

/// Orthonormal basis whose first column is the normalised `direction`.
///
/// The remaining columns complete the basis by Gram–Schmidt over the
/// identity axes, least aligned first. Returns `None` for a zero direction.
pub fn orthogonal_basis(direction: ArrayView1<f64>) -> Option<Array2<f64>> {
    let dimension = direction.len();
    let first = normalized(direction)?;

    let mut axes: Vec<usize> = (0..dimension).collect();
    axes.sort_by(|a, b| first[*a].abs().total_cmp(&first[*b].abs()));

    let mut columns: Vec<Array1<f64>> = vec![first];
    for axis in axes {
        if columns.len() == dimension {
            break;
        }
        let mut candidate = Array1::zeros(dimension);
        candidate[axis] = 1.0;
        for column in &columns {
            let projection = column.dot(&candidate);
            candidate.scaled_add(-projection, column);
        }
        if norm(candidate.view()) > ORTHOGONAL_TOLERANCE
            && let Some(unit) = normalized(candidate.view())
        {
            columns.push(unit);
        }
    }

    let mut basis = Array2::zeros((dimension, dimension));
    for (index, column) in columns.iter().enumerate() {
        basis.column_mut(index).assign(column);
    }
    Some(basis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn norm_of_sentinel_stays_finite() {
        let v = array![f64::MAX, 0.0, 0.0];
        assert_eq!(norm(v.view()), f64::MAX);
        let unit = normalized(v.view()).unwrap();
        assert!((unit[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn normalized_rejects_zero() {
        assert!(normalized(array![0.0, 0.0].view()).is_none());
    }

    #[test]
    fn least_aligned_axis_prefers_lowest_index_on_ties() {
        assert_eq!(least_aligned_axis(array![1.0, 0.0, 0.0].view()), 1);
        assert_eq!(least_aligned_axis(array![0.0, 1.0].view()), 0);
    }

    #[test]
    fn deterministic_orthogonal_is_orthogonal() {
        let d = normalized(array![1.0, 2.0, -0.5].view()).unwrap();
        let o = deterministic_orthogonal(d.view());
        assert!(d.dot(&o).abs() < 1e-12);
        assert!((norm(o.view()) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn orthogonal_basis_is_orthonormal() {
        let basis = orthogonal_basis(array![0.3, -2.0, 1.0].view()).unwrap();
        let gram = basis.t().dot(&basis);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((gram[[i, j]] - expected).abs() < 1e-12);
            }
        }
        let first = normalized(array![0.3, -2.0, 1.0].view()).unwrap();
        assert!((basis.column(0).dot(&first) - 1.0).abs() < 1e-12);
    }
}
