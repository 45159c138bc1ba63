//! ClusterReport: elbow-selected K-Means clustering with an xlsx report
//!
//! This is the main entrypoint that orchestrates data loading, the elbow
//! sweep, the final clustering run and report export.

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use clusterreport::report::format_percentage;
use clusterreport::{
    build_report, cluster_final, elbow, load_dataset, select_best_k, write_report, Args, Dataset,
    KMeansEngine, WcssSweep,
};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    args.validate()?;

    // Fatal: nothing to do without data
    let dataset = load_dataset(&args.input)?;
    println!("Records loaded: {}", dataset.len());
    println!("Feature dimension: {}", dataset.dimension());
    println!("Label column (excluded): {}", dataset.label_name());

    let engine = args.engine();

    println!("\n=== ELBOW METHOD ===");
    let wcss = elbow::sweep(&engine, &dataset.features, args.max_k);
    let best_k = select_best_k(&wcss, args.default_k);
    println!("Selected K: {}", best_k);

    let outcome = run_report_stage(&args, &engine, &dataset, best_k);

    print_wcss_table(&wcss, best_k);

    if let Err(err) = outcome {
        anyhow::bail!("Reporting aborted: {:#}", err);
    }
    Ok(())
}

/// Cluster with the chosen K and export the report
fn run_report_stage(
    args: &Args,
    engine: &KMeansEngine,
    dataset: &Dataset,
    best_k: usize,
) -> Result<PathBuf> {
    println!("\n=== CLUSTERING WITH K = {} ===", best_k);

    let outcome = cluster_final(engine, best_k, &dataset.features).map_err(|err| {
        error!("Final clustering failed: {}", err);
        err
    })?;

    let report = build_report(dataset, &outcome.assignments, best_k);
    let timestamp = Local::now().naive_local();
    let path = write_report(&report, &args.report_dir(), &timestamp).map_err(|err| {
        error!("Writing the report failed: {:#}", err);
        err
    })?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    println!("\n✓ Clustering results exported to Excel");
    println!("  File: {}", file_name);
    println!("  Clusters: {}", outcome.k);
    println!("  Total records: {}", dataset.len());

    println!("\n=== CLUSTER PREVIEW ===");
    let total = dataset.len().max(1) as f64;
    for (index, &size) in outcome.sizes.iter().enumerate() {
        let percentage = size as f64 / total * 100.0;
        println!(
            "Cluster {}: {} records ({})",
            index + 1,
            size,
            format_percentage(percentage)
        );
    }

    println!("\nSheets:");
    for (index, sheet) in report.sheets.iter().enumerate() {
        println!("{}. {} - {}", index + 1, sheet.name, sheet.description);
    }

    info!("Report stage finished");
    Ok(path)
}

fn print_wcss_table(wcss: &WcssSweep, best_k: usize) {
    println!("\n=== WCSS RESULTS ===");
    for (k, value) in wcss {
        let indicator = if *k == best_k { " <- OPTIMAL" } else { "" };
        match value {
            Some(value) => println!("K = {}: {}{}", k, value, indicator),
            None => println!("K = {}: ERROR{}", k, indicator),
        }
    }
}
