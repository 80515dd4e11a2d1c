use std::time::{Duration, Instant};

use log::debug;
use ndarray::Array2;
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::Rng;

use super::quantile_mask::quantile_mask;
use super::types::{FactorizationError, Factorizer, QmuConfig, QmuOutput, Trajectory};
use super::update_rules::{
    init_factors, multiplicative_update, relative_error, seeded_rng, validate_inputs, EPSILON,
};

/// Quantile Multiplicative Updates: NMF restricted to the entries whose
/// residual falls at or below the q-quantile, with the mask re-estimated
/// before every update.
pub struct Qmu {
    pub config: QmuConfig,
}

impl Qmu {
    pub fn new(rank: usize, quantile: f64) -> Self {
        Self {
            config: QmuConfig {
                rank,
                quantile,
                ..Default::default()
            },
        }
    }

    pub fn with_config(config: QmuConfig) -> Self {
        Self { config }
    }

    /// Run `max_iter` masked updates with the configured seed.
    pub fn fit(
        &self,
        d_tilde: &Array2<f64>,
        d: &Array2<f64>,
        max_iter: usize,
    ) -> Result<QmuOutput, FactorizationError> {
        let mut rng = seeded_rng(self.config.seed);
        self.fit_with_rng(d_tilde, d, max_iter, &mut rng)
    }

    /// Run `max_iter` masked updates on the corrupted data `d`, measuring
    /// error against the clean reference `d_tilde`.
    pub fn fit_with_rng<R: Rng>(
        &self,
        d_tilde: &Array2<f64>,
        d: &Array2<f64>,
        max_iter: usize,
        rng: &mut R,
    ) -> Result<QmuOutput, FactorizationError> {
        let QmuConfig {
            rank,
            quantile: q,
            record_reconstructions,
            ..
        } = self.config;
        validate_inputs(d_tilde, d, rank)?;
        if !(0.0..=1.0).contains(&q) {
            return Err(FactorizationError::InvalidQuantile(q));
        }

        let (m, n) = d.dim();
        let (mut w, mut h) = init_factors(m, n, rank, rng);
        let mut mask = Array2::ones((m, n));

        let mut errors = Vec::with_capacity(max_iter + 1);
        errors.push(relative_error(d_tilde, &w, &h));
        let mut reconstructions = record_reconstructions.then(|| {
            let mut history = Vec::with_capacity(max_iter + 1);
            history.push(w.dot(&h));
            history
        });
        let mut runtime = Duration::ZERO;

        for _iter in 0..max_iter {
            let start = Instant::now();
            // Mask from the factors before this iteration's updates
            mask = quantile_mask(d, &w, &h, q);
            let masked_data = &mask * d;
            update_w_masked(&masked_data, &mask, &mut w, &h);
            update_h_masked(&masked_data, &mask, &w, &mut h);
            runtime += start.elapsed();

            errors.push(relative_error(d_tilde, &w, &h));
            if let Some(history) = reconstructions.as_mut() {
                history.push(w.dot(&h));
            }
        }

        debug!(
            "QMU {}x{} rank {} q {}: {} iterations, {} inliers, final error {:.3e}, update time {:?}",
            m,
            n,
            rank,
            q,
            max_iter,
            mask.sum() as usize,
            errors.last().copied().unwrap_or(f64::NAN),
            runtime
        );

        Ok(QmuOutput {
            w,
            h,
            mask,
            errors,
            runtime,
            reconstructions,
        })
    }
}

/// W ← W * ((M⊙D)*H^T) / ((M⊙(W*H))*H^T)
fn update_w_masked(
    masked_data: &Array2<f64>,
    mask: &Array2<f64>,
    w: &mut Array2<f64>,
    h: &Array2<f64>,
) {
    let numer = masked_data.dot(&h.t()); // m×r
    let masked_approx = mask * &w.dot(h); // m×n
    let denom = masked_approx.dot(&h.t()); // m×r
    multiplicative_update(w, &numer, &denom, EPSILON);
}

/// H ← H * (W^T*(M⊙D)) / (W^T*(M⊙(W*H)))
fn update_h_masked(
    masked_data: &Array2<f64>,
    mask: &Array2<f64>,
    w: &Array2<f64>,
    h: &mut Array2<f64>,
) {
    let numer = w.t().dot(masked_data); // r×n
    let masked_approx = mask * &w.dot(&*h); // m×n
    let denom = w.t().dot(&masked_approx); // r×n
    multiplicative_update(h, &numer, &denom, EPSILON);
}

impl Factorizer for Qmu {
    fn factorize(
        &self,
        x_ref: &Array2<f64>,
        x_train: &Array2<f64>,
        max_iter: usize,
        rng: &mut StdRng,
    ) -> Result<Trajectory, FactorizationError> {
        let output = match self.config.seed {
            Some(_) => self.fit(x_ref, x_train, max_iter)?,
            None => self.fit_with_rng(x_ref, x_train, max_iter, rng)?,
        };
        Ok(output.into())
    }

    fn name(&self) -> &str {
        "QMU"
    }
}

/// QMU with the call shape `qmu(D_tilde, D, max_iter, r, q, seed)`.
///
/// Use [`Qmu::with_config`] with `record_reconstructions` to keep the
/// per-iteration `W*H` history.
pub fn qmu(
    d_tilde: &Array2<f64>,
    d: &Array2<f64>,
    max_iter: usize,
    rank: usize,
    q: f64,
    seed: Option<u64>,
) -> Result<QmuOutput, FactorizationError> {
    Qmu::with_config(QmuConfig {
        rank,
        quantile: q,
        seed,
        record_reconstructions: false,
    })
    .fit(d_tilde, d, max_iter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::nmf::nmf;
    use crate::atom::test_utils::{
        assert_all_close, make_corrupted, make_low_rank, masked_step_by_entries,
    };
    use ndarray::array;

    #[test]
    fn test_qmu_trajectory_and_mask_shape() {
        let data = make_corrupted(12, 10, 3, 0.1, 5);
        let result = qmu(&data.clean, &data.corrupted, 30, 3, 0.9, Some(3)).unwrap();
        assert_eq!(result.errors.len(), 31);
        assert_eq!(result.mask.dim(), (12, 10));
        assert!(result.mask.iter().all(|&m| m == 0.0 || m == 1.0));
        assert!(result.reconstructions.is_none());
        // at least 90% of 120 entries sit at or below the 0.9 quantile
        assert!(result.mask.sum() >= 108.0);
    }

    #[test]
    fn test_single_step_matches_masked_formula() {
        let d = array![[2.0, 6.0, 1.0], [2.0, 10.0, 5.0]];
        let mut w = array![[1.0], [2.0]];
        let mut h = array![[1.0, 1.0, 1.0]];

        // residuals [[1, 5, 0], [0, 8, 3]], median 2
        let mask = quantile_mask(&d, &w, &h, 0.5);
        assert_eq!(mask, array![[1.0, 0.0, 1.0], [1.0, 0.0, 0.0]]);
        let masked_data = &mask * &d;

        // (M⊙D)*H^T = [3, 2], (M⊙(W*H))*H^T = [2, 2]
        update_w_masked(&masked_data, &mask, &mut w, &h);
        assert_all_close(&w, &array![[1.5], [2.0]], 1e-9);

        // W^T*(M⊙D) = [7, 0, 1.5], W^T*(M⊙(W*H)) = [6.25, 0, 2.25]
        update_h_masked(&masked_data, &mask, &w, &mut h);
        assert_all_close(&h, &array![[7.0 / 6.25, 0.0, 1.5 / 2.25]], 1e-9);
    }

    #[test]
    fn test_first_iteration_matches_entrywise_update() {
        let data = make_corrupted(7, 6, 2, 0.2, 13);
        let result = qmu(&data.clean, &data.corrupted, 1, 2, 0.8, Some(5)).unwrap();

        let (w0, h0) = init_factors(7, 6, 2, &mut seeded_rng(Some(5)));
        let mask = quantile_mask(&data.corrupted, &w0, &h0, 0.8);
        assert_eq!(result.mask, mask);
        assert!(mask.sum() < 42.0);

        let (w1, h1) = masked_step_by_entries(&data.corrupted, &mask, &w0, &h0, EPSILON);
        assert_all_close(&result.w, &w1, 1e-9);
        assert_all_close(&result.h, &h1, 1e-9);
    }

    #[test]
    fn test_qmu_is_deterministic_under_seed() {
        let data = make_corrupted(10, 12, 3, 0.1, 6);
        let a = qmu(&data.clean, &data.corrupted, 20, 3, 0.9, Some(42)).unwrap();
        let b = qmu(&data.clean, &data.corrupted, 20, 3, 0.9, Some(42)).unwrap();
        assert_eq!(a.w, b.w);
        assert_eq!(a.h, b.h);
        assert_eq!(a.mask, b.mask);
        assert_eq!(a.errors, b.errors);
    }

    #[test]
    fn test_qmu_full_quantile_matches_nmf() {
        // q = 1 keeps every entry, so the masked updates reduce to plain NMF
        let x = make_low_rank(9, 11, 3, 8);
        let robust = qmu(&x, &x, 25, 3, 1.0, Some(17)).unwrap();
        let plain = nmf(&x, &x, 25, 3, Some(17)).unwrap();
        assert_eq!(robust.w, plain.w);
        assert_eq!(robust.h, plain.h);
        assert_eq!(robust.errors, plain.errors);
        assert!(robust.mask.iter().all(|&m| m == 1.0));
    }

    #[test]
    fn test_qmu_records_reconstructions() {
        let data = make_corrupted(8, 6, 2, 0.1, 2);
        let solver = Qmu::with_config(QmuConfig {
            rank: 2,
            quantile: 0.9,
            seed: Some(1),
            record_reconstructions: true,
        });
        let result = solver.fit(&data.clean, &data.corrupted, 12).unwrap();
        let history = result.reconstructions.as_ref().unwrap();
        assert_eq!(history.len(), 13);
        assert_eq!(history.last().unwrap(), &result.w.dot(&result.h));
        assert!(history.iter().all(|frame| frame.dim() == (8, 6)));
    }

    #[test]
    fn test_qmu_zero_iterations_returns_full_mask() {
        let data = make_corrupted(5, 4, 2, 0.1, 3);
        let result = qmu(&data.clean, &data.corrupted, 0, 2, 0.9, Some(1)).unwrap();
        assert_eq!(result.errors.len(), 1);
        assert!(result.mask.iter().all(|&m| m == 1.0));
    }

    #[test]
    fn test_qmu_rejects_invalid_quantile() {
        let x = make_low_rank(5, 5, 2, 1);
        assert_eq!(
            qmu(&x, &x, 5, 2, 1.5, Some(1)).unwrap_err(),
            FactorizationError::InvalidQuantile(1.5)
        );
        assert!(matches!(
            qmu(&x, &x, 5, 2, f64::NAN, Some(1)),
            Err(FactorizationError::InvalidQuantile(_))
        ));
    }
}
