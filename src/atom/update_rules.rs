use ndarray::{Array2, Zip};
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::{Rng, SeedableRng};
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;

use super::types::FactorizationError;

/// Added to every update denominator and to the error normalizer
pub const EPSILON: f64 = 1e-10;

/// Elementwise multiplicative update in place: base * numer / (denom + eps)
///
/// Non-finite values are left as they are so that blow-ups show up in the
/// error trajectory.
pub fn multiplicative_update(
    base: &mut Array2<f64>,
    numer: &Array2<f64>,
    denom: &Array2<f64>,
    eps: f64,
) {
    Zip::from(base)
        .and(numer)
        .and(denom)
        .for_each(|b, &n, &d| {
            *b *= n / (d + eps);
        });
}

/// Relative squared Frobenius error: ||X - W*H||_F^2 / (||X||_F^2 + eps)
///
/// # Panics
/// If `W*H` is not conformable with `X`.
pub fn relative_error(x: &Array2<f64>, w: &Array2<f64>, h: &Array2<f64>) -> f64 {
    let approx = w.dot(h);
    let residual = Zip::from(x)
        .and(&approx)
        .fold(0.0, |acc, &a, &b| acc + (a - b) * (a - b));
    let reference = x.iter().map(|v| v * v).sum::<f64>();
    residual / (reference + EPSILON)
}

/// Draw W (m×r) and H (r×n) from |N(0, 1)|, W first
pub fn init_factors<R: Rng>(
    m: usize,
    n: usize,
    rank: usize,
    rng: &mut R,
) -> (Array2<f64>, Array2<f64>) {
    let w = Array2::<f64>::random_using((m, rank), StandardNormal, rng).mapv_into(f64::abs);
    let h = Array2::<f64>::random_using((rank, n), StandardNormal, rng).mapv_into(f64::abs);
    (w, h)
}

/// Deterministic generator for `Some(seed)`, OS entropy otherwise
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Shape and rank preconditions shared by NMF and QMU
pub(crate) fn validate_inputs(
    x_ref: &Array2<f64>,
    x_train: &Array2<f64>,
    rank: usize,
) -> Result<(), FactorizationError> {
    if x_train.is_empty() {
        return Err(FactorizationError::EmptyMatrix);
    }
    if x_ref.dim() != x_train.dim() {
        return Err(FactorizationError::DimensionMismatch(format!(
            "reference is {:?} but training data is {:?}",
            x_ref.dim(),
            x_train.dim()
        )));
    }
    if rank == 0 {
        return Err(FactorizationError::InvalidRank(rank));
    }
    Ok(())
}
