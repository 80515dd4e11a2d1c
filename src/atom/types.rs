//! # Factorization Data Structures
//!
//! Configurations, outputs and error types shared by the multiplicative-update
//! factorizations.

use std::error::Error;
use std::fmt;
use std::io;
use std::time::Duration;

use ndarray::Array2;
use ndarray_npy::{ReadNpyError, WriteNpyError, WriteNpzError};
use ndarray_rand::rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Configuration for standard multiplicative-update NMF
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NmfConfig {
    /// Target rank r of the factorization
    pub rank: usize,
    /// Seed for the factor initialization. `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Keep `W·H` after every iteration (plus the initial state)
    pub record_reconstructions: bool,
}

impl Default for NmfConfig {
    fn default() -> Self {
        Self {
            rank: 5,
            seed: None,
            record_reconstructions: false,
        }
    }
}

/// Configuration for Quantile Multiplicative Updates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QmuConfig {
    /// Target rank r of the factorization
    pub rank: usize,
    /// Quantile level q in [0, 1], typically `1 - corruption_rate`
    pub quantile: f64,
    /// Seed for the factor initialization. `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Keep `W·H` after every iteration (plus the initial state)
    pub record_reconstructions: bool,
}

impl Default for QmuConfig {
    fn default() -> Self {
        Self {
            rank: 5,
            quantile: 0.9,
            seed: None,
            record_reconstructions: false,
        }
    }
}

/// Result of a standard NMF run: X ≈ W * H
#[derive(Debug, Clone)]
pub struct NmfOutput {
    pub w: Array2<f64>,
    pub h: Array2<f64>,
    /// Relative error against the reference, length `max_iter + 1`
    pub errors: Vec<f64>,
    /// Time spent in update arithmetic only
    pub runtime: Duration,
    /// `W·H` per iteration, starting with the initial state
    pub reconstructions: Option<Vec<Array2<f64>>>,
}

/// Result of a QMU run: D ≈ W * H on the final inlier mask
#[derive(Debug, Clone)]
pub struct QmuOutput {
    pub w: Array2<f64>,
    pub h: Array2<f64>,
    /// Last mask used for an update (all ones when `max_iter == 0`)
    pub mask: Array2<f64>,
    /// Relative error against the clean reference, length `max_iter + 1`
    pub errors: Vec<f64>,
    /// Time spent in masking and update arithmetic only
    pub runtime: Duration,
    /// `W·H` per iteration, starting with the initial state
    pub reconstructions: Option<Vec<Array2<f64>>>,
}

/// What the experiment runner keeps from a single factorization run
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub errors: Vec<f64>,
    pub runtime: Duration,
}

impl From<NmfOutput> for Trajectory {
    fn from(output: NmfOutput) -> Self {
        Self {
            errors: output.errors,
            runtime: output.runtime,
        }
    }
}

impl From<QmuOutput> for Trajectory {
    fn from(output: QmuOutput) -> Self {
        Self {
            errors: output.errors,
            runtime: output.runtime,
        }
    }
}

/// Algorithm seam used by the experiment runner
pub trait Factorizer: Send + Sync {
    /// Factorize `x_train`, measuring error against `x_ref`.
    ///
    /// `rng` is the run's generator; implementations configured with their
    /// own seed ignore it.
    fn factorize(
        &self,
        x_ref: &Array2<f64>,
        x_train: &Array2<f64>,
        max_iter: usize,
        rng: &mut StdRng,
    ) -> Result<Trajectory, FactorizationError>;

    fn name(&self) -> &str;
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by the factorizations, data generation and export
#[derive(Debug, Clone, PartialEq)]
pub enum FactorizationError {
    DimensionMismatch(String),
    InvalidRank(usize),
    EmptyMatrix,
    InvalidQuantile(f64),
    InvalidParameter(String),
    Io(String),
}

impl fmt::Display for FactorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactorizationError::DimensionMismatch(msg) => write!(f, "Dimension mismatch: {}", msg),
            FactorizationError::InvalidRank(r) => {
                write!(f, "Invalid rank {} (must be a positive integer)", r)
            }
            FactorizationError::EmptyMatrix => write!(f, "Matrix has no rows or no columns"),
            FactorizationError::InvalidQuantile(q) => {
                write!(f, "Invalid quantile {} (must lie in [0, 1])", q)
            }
            FactorizationError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            FactorizationError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl Error for FactorizationError {}

impl From<io::Error> for FactorizationError {
    fn from(err: io::Error) -> Self {
        FactorizationError::Io(err.to_string())
    }
}

impl From<ReadNpyError> for FactorizationError {
    fn from(err: ReadNpyError) -> Self {
        FactorizationError::Io(format!("failed to read npy: {}", err))
    }
}

impl From<WriteNpyError> for FactorizationError {
    fn from(err: WriteNpyError) -> Self {
        FactorizationError::Io(format!("failed to write npy: {}", err))
    }
}

impl From<WriteNpzError> for FactorizationError {
    fn from(err: WriteNpzError) -> Self {
        FactorizationError::Io(format!("failed to write npz: {}", err))
    }
}

impl From<matfile::Error> for FactorizationError {
    fn from(err: matfile::Error) -> Self {
        FactorizationError::Io(format!("failed to read mat: {:?}", err))
    }
}
