use ndarray::Array2;

/// Absolute residuals |X - W*H|
pub fn abs_residuals(x: &Array2<f64>, w: &Array2<f64>, h: &Array2<f64>) -> Array2<f64> {
    (x - &w.dot(h)).mapv_into(f64::abs)
}

/// q-th quantile with linear interpolation between order statistics.
///
/// Uses `select_nth_unstable_by()`, so `values` is partially reordered.
/// Returns NaN for an empty slice or when any value is NaN.
pub fn linear_quantile(values: &mut [f64], q: f64) -> f64 {
    if values.is_empty() || values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }

    let last = values.len() - 1;
    let pos = last as f64 * q;
    // `as` saturates, so q < 0 lands on the minimum
    let lo = (pos.floor() as usize).min(last);
    let (_, &mut below, above) = values.select_nth_unstable_by(lo, f64::total_cmp);
    // next order statistic is the smallest value above the pivot
    let above = above.iter().copied().fold(f64::INFINITY, f64::min);
    if lo == last {
        return below;
    }
    lerp(below, above, pos - lo as f64)
}

/// Interpolate from whichever end is closer to keep the endpoints exact
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    let diff = b - a;
    if t >= 0.5 {
        b - diff * (1.0 - t)
    } else {
        a + diff * t
    }
}

/// Binary inlier mask: M[i,j] = 1 where |X - W*H|[i,j] <= quantile(q), else 0.
///
/// Ties at the threshold count as inliers. q = 1 keeps every entry, q = 0 keeps
/// only the entries at the minimum residual. A NaN residual makes the threshold
/// NaN, and then no entry is an inlier.
///
/// `q` must lie in [0, 1]; other values are a caller error (checked in debug
/// builds only).
///
/// # Panics
/// If `W*H` is not conformable with `X`.
pub fn quantile_mask(x: &Array2<f64>, w: &Array2<f64>, h: &Array2<f64>, q: f64) -> Array2<f64> {
    debug_assert!((0.0..=1.0).contains(&q), "quantile {} outside [0, 1]", q);

    let residuals = abs_residuals(x, w, h);
    let mut sorted = residuals.iter().copied().collect::<Vec<f64>>();
    let threshold = linear_quantile(&mut sorted, q);

    residuals.mapv_into(|e| if e <= threshold { 1.0 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_quantile_interpolates() {
        let mut values = vec![4.0, 1.0, 3.0, 2.0];
        assert!((linear_quantile(&mut values, 0.5) - 2.5).abs() < 1e-12);
        assert!((linear_quantile(&mut values, 0.25) - 1.75).abs() < 1e-12);
        assert_eq!(linear_quantile(&mut values, 0.0), 1.0);
        assert_eq!(linear_quantile(&mut values, 1.0), 4.0);
    }

    #[test]
    fn test_linear_quantile_single_and_empty() {
        assert_eq!(linear_quantile(&mut [7.0], 0.3), 7.0);
        assert!(linear_quantile(&mut [], 0.5).is_nan());
    }

    #[test]
    fn test_linear_quantile_nan_poisons_result() {
        assert!(linear_quantile(&mut [1.0, f64::NAN, 3.0, 4.0], 0.5).is_nan());
        assert!(linear_quantile(&mut [f64::NAN], 0.0).is_nan());
    }

    #[test]
    fn test_mask_with_nan_residual_is_empty() {
        let w = array![[0.0], [0.0]];
        let h = array![[0.0, 0.0]];
        let d = array![[1.0, f64::NAN], [3.0, 4.0]];
        let mask = quantile_mask(&d, &w, &h, 0.5);
        assert_eq!(mask, Array2::<f64>::zeros((2, 2)));
    }

    #[test]
    fn test_mask_median_hand_computed() {
        // W*H = [[1, 1, 1], [2, 2, 2]]
        let w = array![[1.0], [2.0]];
        let h = array![[1.0, 1.0, 1.0]];
        let d = array![[2.0, 6.0, 1.0], [2.0, 10.0, 5.0]];
        // residuals [[1, 5, 0], [0, 8, 3]] -> sorted 0 0 1 3 5 8 -> median 2
        let mask = quantile_mask(&d, &w, &h, 0.5);
        assert_eq!(mask, array![[1.0, 0.0, 1.0], [1.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_mask_q_one_is_all_ones() {
        let w = array![[1.0], [2.0]];
        let h = array![[1.0, 3.0, 1.0]];
        let d = array![[9.0, 0.0, 4.0], [2.0, 100.0, 5.0]];
        let mask = quantile_mask(&d, &w, &h, 1.0);
        assert!(mask.iter().all(|&m| m == 1.0));
    }

    #[test]
    fn test_mask_q_zero_keeps_minimal_residuals() {
        let w = array![[1.0], [2.0]];
        let h = array![[1.0, 1.0, 1.0]];
        let d = array![[2.0, 6.0, 1.0], [2.0, 10.0, 5.0]];
        // minimum residual 0 appears twice
        let mask = quantile_mask(&d, &w, &h, 0.0);
        assert_eq!(mask, array![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_mask_ties_are_inliers() {
        let w = array![[0.0], [0.0]];
        let h = array![[0.0, 0.0]];
        let d = array![[3.0, 3.0], [3.0, 3.0]];
        let mask = quantile_mask(&d, &w, &h, 0.1);
        assert_eq!(mask.sum(), 4.0);
    }
}
