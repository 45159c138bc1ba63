//! Command-line interface definitions and argument parsing

use crate::elbow::{DEFAULT_K, DEFAULT_MAX_K};
use crate::model::KMeansEngine;
use clap::Parser;
use std::path::{Path, PathBuf};

/// Cluster a table with K-Means, pick K with the elbow method and export an xlsx report
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input table (.csv, .xlsx, .xls or .ods); the last column is the label
    #[arg(short, long, default_value = "winequality-red.csv")]
    pub input: PathBuf,

    /// Directory for the report file [default: directory of the input]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Largest K tried by the elbow sweep
    #[arg(long, default_value_t = DEFAULT_MAX_K)]
    pub max_k: usize,

    /// K used when no elbow is found
    #[arg(long, default_value_t = DEFAULT_K)]
    pub default_k: usize,

    /// Maximum iterations for K-Means algorithm
    #[arg(long, default_value = "300")]
    pub max_iters: u64,

    /// Tolerance for K-Means convergence
    #[arg(long, default_value = "1e-4")]
    pub tolerance: f64,

    /// Seed for K-Means centroid initialisation
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_k == 0 {
            anyhow::bail!("--max-k must be at least 1");
        }
        if self.default_k == 0 {
            anyhow::bail!("--default-k must be at least 1");
        }
        if self.max_iters == 0 {
            anyhow::bail!("--max-iters must be at least 1");
        }
        if self.tolerance.is_nan() || self.tolerance <= 0.0 {
            anyhow::bail!("--tolerance must be positive, got {}", self.tolerance);
        }
        Ok(())
    }

    /// Directory the report is written to
    pub fn report_dir(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => self
                .input
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    /// K-Means engine configured from the arguments
    pub fn engine(&self) -> KMeansEngine {
        KMeansEngine {
            max_iters: self.max_iters,
            tolerance: self.tolerance,
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["clusterreport"]);
        assert_eq!(args.input, PathBuf::from("winequality-red.csv"));
        assert_eq!(args.max_k, 8);
        assert_eq!(args.default_k, 3);
        assert_eq!(args.report_dir(), PathBuf::from("."));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_report_dir() {
        let mut args = Args::parse_from(["clusterreport", "-i", "/data/wine/red.xlsx"]);
        assert_eq!(args.report_dir(), PathBuf::from("/data/wine"));

        args.output_dir = Some(PathBuf::from("/reports"));
        assert_eq!(args.report_dir(), PathBuf::from("/reports"));
    }

    #[test]
    fn test_validate() {
        let mut args = Args::parse_from(["clusterreport", "--seed", "7"]);
        assert_eq!(args.engine().seed, 7);

        args.max_k = 0;
        assert!(args.validate().is_err());

        args.max_k = 8;
        args.tolerance = 0.0;
        assert!(args.validate().is_err());

        args.tolerance = f64::NAN;
        assert!(args.validate().is_err());
    }
}
