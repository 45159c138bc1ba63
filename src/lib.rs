//! ClusterReport: K-Means clustering of tabular data with elbow-selected K
//!
//! This library loads a CSV or spreadsheet table, sweeps K with a pluggable
//! clustering engine, picks K with the elbow heuristic and builds a
//! four-sheet xlsx report of the final clustering.

pub mod cli;
pub mod data;
pub mod elbow;
pub mod model;
pub mod report;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{load_dataset, Dataset, Field};
pub use elbow::{select_best_k, sweep, WcssSweep};
pub use model::{
    cluster_final, evaluate_wcss, ClusterGroups, ClusterOutcome, ClusteringEngine, ClusteringError,
    KMeansEngine,
};
pub use report::{build_report, write_report, Report};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
