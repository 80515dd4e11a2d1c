/*
 * File: /main.rs
 * -----
 * Benchmark driver: NMF vs. QMU on corrupted synthetic or stored data.
 */

use std::error::Error;

use log::{info, LevelFilter};
use ndarray_rand::rand::rngs::StdRng;

use quantile_nmf::config::{Config, DataSource};
use quantile_nmf::data_gen::{generate_synthetic_matrix, read_matrix, SyntheticData};
use quantile_nmf::experiment::{run_experiments, Experiment};
use quantile_nmf::export::write_results_npz;
use quantile_nmf::{timestamp, FactorizationError, Nmf, Qmu};

fn setup_logger() -> Result<(), log::SetLoggerError> {
    simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
}

fn main() -> Result<(), Box<dyn Error>> {
    setup_logger()?;
    let config = Config::new(std::env::args())?;

    let rank = config.get_rank();
    let beta = config.get_beta();
    let scale = config.get_corruption_scale();
    let method = "quantile_nmf";

    info!(
        "[method: {}] [{}] rank {}, beta {}, {} iterations, {} runs, source {:?}",
        method,
        timestamp(),
        rank,
        beta,
        config.get_max_iter(),
        config.get_num_runs(),
        config.get_source()
    );

    let experiments = vec![
        Experiment::new("NMF", Nmf::new(rank)),
        Experiment::new(
            format!("QMU (q={})", config.get_quantile()),
            Qmu::new(rank, config.get_quantile()),
        ),
    ];

    let results = match config.get_source() {
        DataSource::Synthetic { m, n } => {
            let (m, n) = (*m, *n);
            let data_gen = |rng: &mut StdRng| generate_synthetic_matrix(m, n, rank, beta, scale, rng);
            run_experiments(
                config.get_num_runs(),
                config.get_max_iter(),
                &experiments,
                data_gen,
                config.get_seed(),
            )?
        }
        DataSource::File(path) => {
            let clean = read_matrix(path)?;
            let data_gen = |rng: &mut StdRng| -> Result<SyntheticData, FactorizationError> {
                SyntheticData::from_clean(clean.clone(), beta, scale, rng)
            };
            run_experiments(
                config.get_num_runs(),
                config.get_max_iter(),
                &experiments,
                data_gen,
                config.get_seed(),
            )?
        }
    };

    for summary in results.summarize() {
        info!(
            "[method: {}] [{}] {}: final mean error {:.4e} (min {:.4e}, max {:.4e}), mean runtime {:.2}s",
            method,
            timestamp(),
            summary.label,
            summary.final_mean(),
            summary.min.last().copied().unwrap_or(f64::NAN),
            summary.max.last().copied().unwrap_or(f64::NAN),
            summary.mean_runtime_secs
        );
    }

    if let Some(path) = config.get_output() {
        write_results_npz(&results, path)?;
    }
    Ok(())
}
