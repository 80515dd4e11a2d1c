//! # Experiment Runner
//!
//! Repeats factorization algorithms over seeded runs and data instances and
//! collects their error trajectories and runtimes.
//!
//! Run `r` seeds a generator with `base_seed + r`. Within a run, experiments
//! execute in order and share that generator, so each experiment sees a fresh
//! data instance. Runs are independent and execute in parallel.

use std::time::{Duration, Instant};

use log::{info, warn};
use ndarray::{Array2, Axis};
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::atom::{FactorizationError, Factorizer, Trajectory};
use crate::data_gen::{DataChoice, SyntheticData};

/// A labelled algorithm together with the data it trains and is measured on
pub struct Experiment {
    pub label: String,
    pub factorizer: Box<dyn Factorizer>,
    /// (reference, training)
    pub data_input: (DataChoice, DataChoice),
}

impl Experiment {
    /// Measured against clean data, trained on corrupted data
    pub fn new<F: Factorizer + 'static>(label: impl Into<String>, factorizer: F) -> Self {
        Self {
            label: label.into(),
            factorizer: Box::new(factorizer),
            data_input: (DataChoice::Clean, DataChoice::Corrupted),
        }
    }

    pub fn with_data_input(mut self, reference: DataChoice, training: DataChoice) -> Self {
        self.data_input = (reference, training);
        self
    }
}

/// Trajectories of one experiment across all runs
#[derive(Debug, Clone)]
pub struct LabelResults {
    pub label: String,
    /// One row per run, `max_iter + 1` columns
    pub errors: Array2<f64>,
    pub runtimes: Vec<Duration>,
}

/// Per-iteration statistics across runs, the data behind a convergence plot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectorySummary {
    pub label: String,
    pub mean: Vec<f64>,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub mean_runtime_secs: f64,
}

impl TrajectorySummary {
    pub fn final_mean(&self) -> f64 {
        self.mean.last().copied().unwrap_or(f64::NAN)
    }
}

/// Results keyed by experiment label, in insertion order
#[derive(Debug, Clone)]
pub struct ExperimentResults {
    pub entries: Vec<LabelResults>,
}

impl ExperimentResults {
    pub fn get(&self, label: &str) -> Option<&LabelResults> {
        self.entries.iter().find(|entry| entry.label == label)
    }

    pub fn summarize(&self) -> Vec<TrajectorySummary> {
        self.entries.iter().map(summarize_label).collect()
    }
}

fn summarize_label(entry: &LabelResults) -> TrajectorySummary {
    let columns = || entry.errors.axis_iter(Axis(1));
    TrajectorySummary {
        label: entry.label.clone(),
        mean: columns().map(|col| Statistics::mean(col.iter())).collect(),
        min: columns().map(|col| Statistics::min(col.iter())).collect(),
        max: columns().map(|col| Statistics::max(col.iter())).collect(),
        mean_runtime_secs: Statistics::mean(entry.runtimes.iter().map(Duration::as_secs_f64)),
    }
}

/// Run every experiment `num_runs` times for `max_iter` iterations.
///
/// `data_gen` builds one data instance from the run's generator; it is called
/// once per experiment per run.
pub fn run_experiments<G>(
    num_runs: usize,
    max_iter: usize,
    experiments: &[Experiment],
    data_gen: G,
    base_seed: u64,
) -> Result<ExperimentResults, FactorizationError>
where
    G: Fn(&mut StdRng) -> Result<SyntheticData, FactorizationError> + Sync,
{
    if num_runs == 0 {
        return Err(FactorizationError::InvalidParameter(
            "num_runs must be positive".to_string(),
        ));
    }
    if experiments.is_empty() {
        return Err(FactorizationError::InvalidParameter(
            "no experiments given".to_string(),
        ));
    }

    info!(
        "Running {} experiments x {} runs, {} iterations each",
        experiments.len(),
        num_runs,
        max_iter
    );
    let start = Instant::now();

    let runs = (0..num_runs)
        .into_par_iter()
        .map(|run| run_single(run, max_iter, experiments, &data_gen, base_seed))
        .collect::<Result<Vec<Vec<Trajectory>>, FactorizationError>>()?;

    let width = max_iter + 1;
    let mut entries = Vec::with_capacity(experiments.len());
    for (idx, experiment) in experiments.iter().enumerate() {
        let mut errors = Array2::zeros((num_runs, width));
        let mut runtimes = Vec::with_capacity(num_runs);
        for (run, traces) in runs.iter().enumerate() {
            let trace = &traces[idx];
            if trace.errors.len() != width {
                return Err(FactorizationError::DimensionMismatch(format!(
                    "{} returned {} errors, expected {}",
                    experiment.label,
                    trace.errors.len(),
                    width
                )));
            }
            errors
                .row_mut(run)
                .iter_mut()
                .zip(&trace.errors)
                .for_each(|(dst, &src)| *dst = src);
            runtimes.push(trace.runtime);
        }
        entries.push(LabelResults {
            label: experiment.label.clone(),
            errors,
            runtimes,
        });
    }

    info!("Experiments finished in {:?}", start.elapsed());
    Ok(ExperimentResults { entries })
}

fn run_single<G>(
    run: usize,
    max_iter: usize,
    experiments: &[Experiment],
    data_gen: &G,
    base_seed: u64,
) -> Result<Vec<Trajectory>, FactorizationError>
where
    G: Fn(&mut StdRng) -> Result<SyntheticData, FactorizationError>,
{
    let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(run as u64));
    experiments
        .iter()
        .map(|experiment| {
            let data = data_gen(&mut rng)?;
            let (x_ref, x_train) = data.select(experiment.data_input);
            let trace = experiment
                .factorizer
                .factorize(x_ref, x_train, max_iter, &mut rng)?;
            if trace.errors.iter().any(|e| !e.is_finite()) {
                warn!(
                    "[{}] run {}: non-finite relative error in trajectory",
                    experiment.label, run
                );
            }
            Ok(trace)
        })
        .collect()
}
