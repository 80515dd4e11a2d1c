//! # Data Generation
//!
//! Synthetic exactly-low-rank matrices, sparse gross corruption, and loading
//! of stored datasets (e.g. Swimmer) from `.npy` or MATLAB `.mat`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::info;
use matfile::{MatFile, NumericData};
use ndarray::{Array2, ShapeBuilder};
use ndarray_rand::rand::seq::index;
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::{StandardNormal, Uniform};
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};

use crate::atom::FactorizationError;

/// Height and width of a single Swimmer image (one data column)
pub const SWIMMER_FRAME_SHAPE: (usize, usize) = (11, 20);

/// Variable holding the data matrix in `Swimmer.mat`
pub const MAT_VARIABLE: &str = "X";

/// Corrupted observation D together with its clean source D̃
#[derive(Debug, Clone)]
pub struct SyntheticData {
    pub corrupted: Array2<f64>,
    pub clean: Array2<f64>,
}

/// Which matrix of a data instance an experiment uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataChoice {
    Clean,
    Corrupted,
}

impl SyntheticData {
    pub fn matrix(&self, choice: DataChoice) -> &Array2<f64> {
        match choice {
            DataChoice::Clean => &self.clean,
            DataChoice::Corrupted => &self.corrupted,
        }
    }

    /// Pick (reference, training) matrices
    pub fn select(&self, input: (DataChoice, DataChoice)) -> (&Array2<f64>, &Array2<f64>) {
        (self.matrix(input.0), self.matrix(input.1))
    }

    /// Wrap `clean`, corrupting a fraction `beta` of its entries when beta > 0
    pub fn from_clean<R: Rng>(
        clean: Array2<f64>,
        beta: f64,
        corruption_scale: f64,
        rng: &mut R,
    ) -> Result<Self, FactorizationError> {
        validate_corruption(beta, corruption_scale)?;
        let corrupted = if beta > 0.0 {
            corrupt_matrix(&clean, beta, corruption_scale, rng)?
        } else {
            clean.clone()
        };
        Ok(Self { corrupted, clean })
    }
}

/// D = D̃ + C, where C hits ⌊m·n·beta⌋ distinct entries with |N(0, scale²)| noise.
pub fn corrupt_matrix<R: Rng>(
    clean: &Array2<f64>,
    beta: f64,
    corruption_scale: f64,
    rng: &mut R,
) -> Result<Array2<f64>, FactorizationError> {
    validate_corruption(beta, corruption_scale)?;

    let total = clean.len();
    let ncols = clean.ncols();
    let num_corrupted = (total as f64 * beta) as usize;

    // Noise first, then positions
    let noise: Vec<f64> = (0..num_corrupted)
        .map(|_| (corruption_scale * rng.sample::<f64, _>(StandardNormal)).abs())
        .collect();
    let positions = index::sample(rng, total, num_corrupted);

    let mut corrupted = clean.to_owned();
    for (flat, value) in positions.iter().zip(noise) {
        corrupted[[flat / ncols, flat % ncols]] += value;
    }
    Ok(corrupted)
}

/// D̃ = W̃·H̃ with W̃ (m×r), H̃ (r×n) drawn uniformly from {0, ..., 99},
/// corrupted with rate `beta` when beta > 0.
pub fn generate_synthetic_matrix<R: Rng>(
    m: usize,
    n: usize,
    rank: usize,
    beta: f64,
    corruption_scale: f64,
    rng: &mut R,
) -> Result<SyntheticData, FactorizationError> {
    if m == 0 || n == 0 {
        return Err(FactorizationError::EmptyMatrix);
    }
    if rank == 0 {
        return Err(FactorizationError::InvalidRank(rank));
    }

    let entries = Uniform::new(0u32, 100);
    let w_tilde = Array2::<u32>::random_using((m, rank), entries, rng).mapv(f64::from);
    let h_tilde = Array2::<u32>::random_using((rank, n), entries, rng).mapv(f64::from);
    let clean = w_tilde.dot(&h_tilde);

    SyntheticData::from_clean(clean, beta, corruption_scale, rng)
}

/// Read a stored matrix (`.npy`, or `.mat` variable `X`), optionally corrupting it.
///
/// The Swimmer dataset is expected as a 220×N matrix, one image per column.
pub fn load_dataset<P: AsRef<Path>, R: Rng>(
    path: P,
    beta: f64,
    corruption_scale: f64,
    rng: &mut R,
) -> Result<SyntheticData, FactorizationError> {
    let clean = read_matrix(path.as_ref())?;
    SyntheticData::from_clean(clean, beta, corruption_scale, rng)
}

/// Read a stored `f64` matrix, choosing the format by extension
pub fn read_matrix(path: &Path) -> Result<Array2<f64>, FactorizationError> {
    let matrix: Array2<f64> = match path.extension().and_then(|ext| ext.to_str()) {
        Some("mat") => read_mat_matrix(path, MAT_VARIABLE)?,
        _ => ndarray_npy::read_npy(path)?,
    };
    if matrix.is_empty() {
        return Err(FactorizationError::EmptyMatrix);
    }
    info!(
        "Loaded {}: {} x {}",
        path.display(),
        matrix.nrows(),
        matrix.ncols()
    );
    Ok(matrix)
}

/// Read a real numeric 2-D variable from a MATLAB v5 `.mat` file as `f64`
pub fn read_mat_matrix(path: &Path, variable: &str) -> Result<Array2<f64>, FactorizationError> {
    let mat = MatFile::parse(BufReader::new(File::open(path)?))?;
    let array = mat.find_by_name(variable).ok_or_else(|| {
        FactorizationError::Io(format!("{} has no variable {}", path.display(), variable))
    })?;

    let dims: &[usize] = array.size();
    let (rows, cols) = match *dims {
        [rows, cols] => (rows, cols),
        _ => {
            return Err(FactorizationError::DimensionMismatch(format!(
                "variable {} has shape {:?}, expected a matrix",
                variable, dims
            )))
        }
    };

    // MATLAB stores column-major
    let values = numeric_to_f64(array.data())?;
    let matrix = Array2::from_shape_vec((rows, cols).f(), values)
        .map_err(|e| FactorizationError::DimensionMismatch(e.to_string()))?;
    Ok(matrix.as_standard_layout().into_owned())
}

fn numeric_to_f64(data: &NumericData) -> Result<Vec<f64>, FactorizationError> {
    let values = match data {
        NumericData::Double { real, imag: None } => real.clone(),
        NumericData::Single { real, imag: None } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::UInt8 { real, imag: None } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::Int8 { real, imag: None } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::UInt16 { real, imag: None } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::Int16 { real, imag: None } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::UInt32 { real, imag: None } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::Int32 { real, imag: None } => real.iter().map(|&v| f64::from(v)).collect(),
        NumericData::UInt64 { real, imag: None } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int64 { real, imag: None } => real.iter().map(|&v| v as f64).collect(),
        _ => {
            return Err(FactorizationError::InvalidParameter(
                "complex .mat data is not supported".to_string(),
            ))
        }
    };
    Ok(values)
}

/// Reshape column `column` of a Swimmer matrix into an 11×20 image
pub fn swimmer_frame(data: &Array2<f64>, column: usize) -> Result<Array2<f64>, FactorizationError> {
    let (height, width) = SWIMMER_FRAME_SHAPE;
    if column >= data.ncols() {
        return Err(FactorizationError::InvalidParameter(format!(
            "column {} out of range for {} columns",
            column,
            data.ncols()
        )));
    }
    if data.nrows() != height * width {
        return Err(FactorizationError::DimensionMismatch(format!(
            "Swimmer frames need {} rows, got {}",
            height * width,
            data.nrows()
        )));
    }
    data.column(column)
        .to_owned()
        .into_shape(SWIMMER_FRAME_SHAPE)
        .map_err(|e| FactorizationError::DimensionMismatch(e.to_string()))
}

fn validate_corruption(beta: f64, corruption_scale: f64) -> Result<(), FactorizationError> {
    if !(0.0..1.0).contains(&beta) {
        return Err(FactorizationError::InvalidParameter(format!(
            "corruption rate {} outside [0, 1)",
            beta
        )));
    }
    if !corruption_scale.is_finite() || corruption_scale < 0.0 {
        return Err(FactorizationError::InvalidParameter(format!(
            "corruption scale {} must be finite and nonnegative",
            corruption_scale
        )));
    }
    Ok(())
}
