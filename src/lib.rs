/**
 * File: /src/lib.rs
 * -----
 * Robust nonnegative matrix factorization: standard multiplicative updates
 * (NMF) and Quantile Multiplicative Updates (QMU), plus the data generation,
 * experiment runner and export used to benchmark them.
 */
pub mod atom;
pub mod config;
pub mod data_gen;
pub mod experiment;
pub mod export;

use chrono::Local;

pub use atom::{
    nmf, qmu, quantile_mask, relative_error, FactorizationError, Factorizer, Nmf, NmfConfig,
    NmfOutput, Qmu, QmuConfig, QmuOutput, Trajectory,
};
pub use data_gen::{
    corrupt_matrix, generate_synthetic_matrix, load_dataset, DataChoice, SyntheticData,
};
pub use experiment::{run_experiments, Experiment, ExperimentResults, TrajectorySummary};

/// Wall-clock timestamp for log lines
pub fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}
