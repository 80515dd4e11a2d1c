/**
 * File: /src/config.rs
 * -----
 * Command-line configuration for the NMF vs. QMU benchmark driver.
 */
use std::error::Error;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where each run gets its data from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataSource {
    /// Fresh m×n synthetic matrix per experiment per run
    Synthetic { m: usize, n: usize },
    /// Stored `.npy` or `.mat` matrix, re-corrupted per experiment per run
    File(PathBuf),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    rank: usize,
    // corruption rate
    beta: f64,
    max_iter: usize,
    num_runs: usize,
    source: DataSource,
    seed: u64,
    corruption_scale: f64,
    output: Option<PathBuf>,
}

impl Config {
    /// constructor
    ///
    /// # Examples
    /// ```bash
    /// $ cargo run -- 5 0.1 300 10 30 40 --seed 42
    /// $ cargo run -- 5 0.1 300 10 --data data/swimmer.npy --out results.npz
    /// $ cargo run -- 5 0.1 300 10 --data data/Swimmer.mat
    /// ```
    pub fn new(mut args: impl Iterator<Item = String>) -> Result<Config, Box<dyn Error>> {
        // args:
        // 0: program name
        // 1: rank
        // 2: beta
        // 3: max_iter
        // 4: num_runs
        // 5,6: m n (optional, synthetic data)
        // then: --data <path> | --seed <u64> | --out <path> | --scale <f64>
        args.next();
        let rank: usize = parse_positional(args.next(), "rank")?;
        let beta: f64 = parse_positional(args.next(), "beta")?;
        let max_iter: usize = parse_positional(args.next(), "max_iter")?;
        let num_runs: usize = parse_positional(args.next(), "num_runs")?;

        if rank == 0 {
            return Err("rank must be positive".into());
        }
        if !(0.0..1.0).contains(&beta) {
            return Err(format!("beta {} must lie in [0, 1)", beta).into());
        }

        let mut dims = Vec::new();
        let mut data = None;
        let mut seed: u64 = 42;
        let mut corruption_scale: f64 = 1e6;
        let mut output = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--data" => data = Some(PathBuf::from(expect_value(args.next(), "--data")?)),
                "--seed" => seed = expect_value(args.next(), "--seed")?.parse()?,
                "--scale" => corruption_scale = expect_value(args.next(), "--scale")?.parse()?,
                "--out" => output = Some(PathBuf::from(expect_value(args.next(), "--out")?)),
                flag if flag.starts_with("--") => {
                    return Err(format!("unknown option {}", flag).into())
                }
                value => dims.push(value.parse::<usize>()?),
            }
        }

        let source = match (data, dims.as_slice()) {
            (Some(path), []) => match path.extension().and_then(|ext| ext.to_str()) {
                Some("npy") | Some("mat") => DataSource::File(path),
                _ => return Err(format!("{} is neither .npy nor .mat", path.display()).into()),
            },
            (None, []) => DataSource::Synthetic { m: 30, n: 40 },
            (None, &[m, n]) if m > 0 && n > 0 => DataSource::Synthetic { m, n },
            _ => return Err("expected either <m> <n> or --data <file.npy|file.mat>".into()),
        };

        Ok(Config {
            rank,
            beta,
            max_iter,
            num_runs,
            source,
            seed,
            corruption_scale,
            output,
        })
    }

    pub fn get_rank(&self) -> usize {
        self.rank
    }

    pub fn get_beta(&self) -> f64 {
        self.beta
    }

    /// Quantile level for QMU: everything but the expected corruption
    pub fn get_quantile(&self) -> f64 {
        1.0 - self.beta
    }

    pub fn get_max_iter(&self) -> usize {
        self.max_iter
    }

    pub fn get_num_runs(&self) -> usize {
        self.num_runs
    }

    pub fn get_source(&self) -> &DataSource {
        &self.source
    }

    pub fn get_seed(&self) -> u64 {
        self.seed
    }

    pub fn get_corruption_scale(&self) -> f64 {
        self.corruption_scale
    }

    pub fn get_output(&self) -> Option<&PathBuf> {
        self.output.as_ref()
    }
}

fn parse_positional<T>(arg: Option<String>, name: &str) -> Result<T, Box<dyn Error>>
where
    T: std::str::FromStr,
    T::Err: Error + 'static,
{
    let arg = arg.ok_or_else(|| format!("missing argument <{}>", name))?;
    Ok(arg.parse::<T>()?)
}

fn expect_value(arg: Option<String>, flag: &str) -> Result<String, Box<dyn Error>> {
    arg.ok_or_else(|| format!("{} expects a value", flag).into())
}
