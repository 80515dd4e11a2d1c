use std::time::{Duration, Instant};

use log::debug;
use ndarray::Array2;
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::Rng;

use super::types::{FactorizationError, Factorizer, NmfConfig, NmfOutput, Trajectory};
use super::update_rules::{
    init_factors, multiplicative_update, relative_error, seeded_rng, validate_inputs, EPSILON,
};

/// Standard multiplicative-update NMF (Lee & Seung) for X ≈ W*H
pub struct Nmf {
    pub config: NmfConfig,
}

impl Nmf {
    pub fn new(rank: usize) -> Self {
        Self {
            config: NmfConfig {
                rank,
                ..Default::default()
            },
        }
    }

    pub fn with_config(config: NmfConfig) -> Self {
        Self { config }
    }

    /// Run `max_iter` updates with the configured seed.
    pub fn fit(
        &self,
        x_ref: &Array2<f64>,
        x_train: &Array2<f64>,
        max_iter: usize,
    ) -> Result<NmfOutput, FactorizationError> {
        let mut rng = seeded_rng(self.config.seed);
        self.fit_with_rng(x_ref, x_train, max_iter, &mut rng)
    }

    /// Run `max_iter` updates, drawing the initial factors from `rng`.
    ///
    /// `x_train` drives the updates; `x_ref` is only used to measure error.
    pub fn fit_with_rng<R: Rng>(
        &self,
        x_ref: &Array2<f64>,
        x_train: &Array2<f64>,
        max_iter: usize,
        rng: &mut R,
    ) -> Result<NmfOutput, FactorizationError> {
        let NmfConfig {
            rank,
            record_reconstructions,
            ..
        } = self.config;
        validate_inputs(x_ref, x_train, rank)?;

        let (m, n) = x_train.dim();
        let (mut w, mut h) = init_factors(m, n, rank, rng);

        let mut errors = Vec::with_capacity(max_iter + 1);
        errors.push(relative_error(x_ref, &w, &h));
        let mut reconstructions = record_reconstructions.then(|| {
            let mut history = Vec::with_capacity(max_iter + 1);
            history.push(w.dot(&h));
            history
        });
        let mut runtime = Duration::ZERO;

        for _iter in 0..max_iter {
            let start = Instant::now();
            update_w(x_train, &mut w, &h);
            // H sees the W from this iteration
            update_h(x_train, &w, &mut h);
            runtime += start.elapsed();

            errors.push(relative_error(x_ref, &w, &h));
            if let Some(history) = reconstructions.as_mut() {
                history.push(w.dot(&h));
            }
        }

        debug!(
            "NMF {}x{} rank {}: {} iterations, final error {:.3e}, update time {:?}",
            m,
            n,
            rank,
            max_iter,
            errors.last().copied().unwrap_or(f64::NAN),
            runtime
        );

        Ok(NmfOutput {
            w,
            h,
            errors,
            runtime,
            reconstructions,
        })
    }
}

/// W ← W * (X*H^T) / (W*H*H^T)
fn update_w(x: &Array2<f64>, w: &mut Array2<f64>, h: &Array2<f64>) {
    let numer = x.dot(&h.t()); // m×r
    let denom = w.dot(h).dot(&h.t()); // m×r
    multiplicative_update(w, &numer, &denom, EPSILON);
}

/// H ← H * (W^T*X) / (W^T*W*H)
fn update_h(x: &Array2<f64>, w: &Array2<f64>, h: &mut Array2<f64>) {
    let numer = w.t().dot(x); // r×n
    let denom = w.t().dot(&w.dot(&*h)); // r×n
    multiplicative_update(h, &numer, &denom, EPSILON);
}

impl Factorizer for Nmf {
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
        "NMF"
    }
}

/// Standard NMF with the call shape `nmf(X_ref, X_train, max_iter, r, seed)`.
///
/// Use [`Nmf::with_config`] with `record_reconstructions` to keep the
/// per-iteration `W*H` history.
pub fn nmf(
    x_ref: &Array2<f64>,
    x_train: &Array2<f64>,
    max_iter: usize,
    rank: usize,
    seed: Option<u64>,
) -> Result<NmfOutput, FactorizationError> {
    Nmf::with_config(NmfConfig {
        rank,
        seed,
        record_reconstructions: false,
    })
    .fit(x_ref, x_train, max_iter)
}
