/// Shared test utilities for the multiplicative-update factorizations
use ndarray::Array2;
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::SeedableRng;

use crate::data_gen::{generate_synthetic_matrix, SyntheticData};

/// Exactly low-rank m×n matrix W̃*H̃ with integer factors in [0, 100).
pub fn make_low_rank(m: usize, n: usize, rank: usize, seed: u64) -> Array2<f64> {
    make_corrupted(m, n, rank, 0.0, seed).clean
}

/// Low-rank matrix with a fraction `beta` of entries hit by noise of scale 1e6.
pub fn make_corrupted(m: usize, n: usize, rank: usize, beta: f64, seed: u64) -> SyntheticData {
    let mut rng = StdRng::seed_from_u64(seed);
    generate_synthetic_matrix(m, n, rank, beta, 1e6, &mut rng)
        .expect("synthetic test data should be valid")
}

/// Non-increasing up to rounding
pub fn is_non_increasing(errors: &[f64]) -> bool {
    errors
        .windows(2)
        .all(|pair| pair[1] <= pair[0] * (1.0 + 1e-6) + 1e-12)
}

/// One masked multiplicative step written out entry by entry.
///
/// W is updated first; H uses the new W. A mask of ones gives plain NMF.
pub fn masked_step_by_entries(
    d: &Array2<f64>,
    mask: &Array2<f64>,
    w: &Array2<f64>,
    h: &Array2<f64>,
    eps: f64,
) -> (Array2<f64>, Array2<f64>) {
    let (m, n) = d.dim();
    let rank = w.ncols();

    let mut w_new = w.clone();
    for i in 0..m {
        for k in 0..rank {
            let mut numer = 0.0;
            let mut denom = 0.0;
            for j in 0..n {
                numer += mask[[i, j]] * d[[i, j]] * h[[k, j]];
                denom += mask[[i, j]] * entry(w, h, i, j) * h[[k, j]];
            }
            w_new[[i, k]] = w[[i, k]] * numer / (denom + eps);
        }
    }

    let mut h_new = h.clone();
    for k in 0..rank {
        for j in 0..n {
            let mut numer = 0.0;
            let mut denom = 0.0;
            for i in 0..m {
                numer += w_new[[i, k]] * mask[[i, j]] * d[[i, j]];
                denom += w_new[[i, k]] * mask[[i, j]] * entry(&w_new, h, i, j);
            }
            h_new[[k, j]] = h[[k, j]] * numer / (denom + eps);
        }
    }
    (w_new, h_new)
}

/// (W*H)[i, j]
fn entry(w: &Array2<f64>, h: &Array2<f64>, i: usize, j: usize) -> f64 {
    (0..w.ncols()).map(|k| w[[i, k]] * h[[k, j]]).sum()
}

/// Elementwise comparison with a relative tolerance
pub fn assert_all_close(actual: &Array2<f64>, expected: &Array2<f64>, tol: f64) {
    assert_eq!(actual.dim(), expected.dim());
    for ((idx, &a), &e) in actual.indexed_iter().zip(expected.iter()) {
        assert!(
            (a - e).abs() <= tol * (1.0 + e.abs()),
            "entry {:?}: got {}, expected {}",
            idx,
            a,
            e
        );
    }
}
