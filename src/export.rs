//! Result export for external plotting and GIF rendering.

use std::fs::File;
use std::path::Path;

use log::info;
use ndarray::{Array1, Array2};
use ndarray_npy::NpzWriter;

use crate::atom::FactorizationError;
use crate::experiment::ExperimentResults;

/// Write `<label>_errors` (runs × iterations) and `<label>_runtimes`
/// (seconds per run) for every experiment into one `.npz`.
pub fn write_results_npz<P: AsRef<Path>>(
    results: &ExperimentResults,
    path: P,
) -> Result<(), FactorizationError> {
    let path = path.as_ref();
    let mut npz = NpzWriter::new(File::create(path)?);
    for entry in &results.entries {
        let key = array_key(&entry.label);
        let runtimes: Array1<f64> = entry.runtimes.iter().map(|d| d.as_secs_f64()).collect();
        npz.add_array(format!("{}_errors", key), &entry.errors)?;
        npz.add_array(format!("{}_runtimes", key), &runtimes)?;
    }
    npz.finish()?;
    info!(
        "Wrote {} experiment results to {}",
        results.entries.len(),
        path.display()
    );
    Ok(())
}

/// Write a reconstruction history as `frame_000`, `frame_001`, ... into one `.npz`
pub fn write_reconstructions<P: AsRef<Path>>(
    path: P,
    frames: &[Array2<f64>],
) -> Result<(), FactorizationError> {
    let path = path.as_ref();
    let mut npz = NpzWriter::new(File::create(path)?);
    for (idx, frame) in frames.iter().enumerate() {
        npz.add_array(format!("frame_{:03}", idx), frame)?;
    }
    npz.finish()?;
    info!("Wrote {} frames to {}", frames.len(), path.display());
    Ok(())
}

/// Labels like "QMU (q=0.9)" become "QMU__q_0_9_"
fn array_key(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
