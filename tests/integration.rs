//! Integration tests for ClusterReport

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use clusterreport::report::{
    Cell, SizeCategory, CENTROIDS_SHEET, RESULTS_SHEET, STATISTICS_SHEET, SUMMARY_SHEET,
};
use clusterreport::{
    build_report, cluster_final, elbow, evaluate_wcss, load_dataset, select_best_k,
    write_report, ClusterGroups, ClusteringEngine, ClusteringError, KMeansEngine,
};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Ten wine-like rows: two tight blobs near (0,0) and (10,10) plus a quality label
fn create_test_csv() -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "alcohol,acidity,quality").unwrap();

    writeln!(file, "0.0,0.1,5").unwrap();
    writeln!(file, "0.1,0.0,5").unwrap();
    writeln!(file, "-0.1,0.0,6").unwrap();
    writeln!(file, ",,").unwrap();
    writeln!(file, "0.0,-0.1,5").unwrap();
    writeln!(file, "0.05,0.05,6").unwrap();

    writeln!(file, "10.0,10.1,7").unwrap();
    writeln!(file, "10.1,10.0,7").unwrap();
    writeln!(file, "9.9,10.0,8").unwrap();
    writeln!(file, "10.0,9.9,7").unwrap();
    writeln!(file, "10.05,10.05,8").unwrap();

    file
}

fn read_zip_entry(path: &Path, name: &str) -> String {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut xml = String::new();
    entry.read_to_string(&mut xml).unwrap();
    xml
}

struct BrokenEngine;

impl ClusteringEngine for BrokenEngine {
    fn cluster(&self, k: usize, vectors: &[Vec<f64>]) -> Result<ClusterGroups, ClusteringError> {
        Err(ClusteringError::InvalidClusterCount {
            k,
            n_samples: vectors.len(),
        })
    }
}

#[test]
fn test_end_to_end_pipeline() {
    let input = create_test_csv();
    let dataset = load_dataset(input.path()).unwrap();

    // Blank row is dropped from both sequences
    assert_eq!(dataset.len(), 10);
    assert_eq!(dataset.features.len(), dataset.records.len());
    assert!(dataset
        .features
        .iter()
        .all(|features| features.len() == dataset.header.len() - 1));

    let engine = KMeansEngine::default();
    let wcss = elbow::sweep(&engine, &dataset.features, 8);
    assert_eq!(wcss.len(), 8);
    let best_k = select_best_k(&wcss, 3);
    assert_eq!(best_k, 2);

    let outcome = cluster_final(&engine, best_k, &dataset.features).unwrap();
    assert_eq!(outcome.assignments.len(), 10);
    assert!(outcome.assignments.iter().all(|&c| (1..=2).contains(&c)));
    // Each blob lands in one cluster
    assert!(outcome.assignments[..5].iter().all(|&c| c == outcome.assignments[0]));
    assert!(outcome.assignments[5..].iter().all(|&c| c == outcome.assignments[5]));
    assert_ne!(outcome.assignments[0], outcome.assignments[5]);

    let report = build_report(&dataset, &outcome.assignments, best_k);
    let stats = report.sheet(STATISTICS_SHEET).unwrap();
    for row in &stats.rows[..2] {
        assert_eq!(row[1], Cell::Number(5.0));
        assert_eq!(row[2], Cell::Text("50.00%".to_string()));
        assert_eq!(row[3], Cell::Category(SizeCategory::Majority));
    }

    let out_dir = tempfile::tempdir().unwrap();
    let timestamp = NaiveDate::from_ymd_opt(2024, 5, 17)
        .unwrap()
        .and_hms_opt(14, 30, 0)
        .unwrap();
    let path = write_report(&report, out_dir.path(), &timestamp).unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "clustering_results_2K_2024-05-17_14-30-00.xlsx"
    );

    let mut workbook = open_workbook_auto(&path).unwrap();
    assert_eq!(
        workbook.sheet_names(),
        vec![RESULTS_SHEET, STATISTICS_SHEET, SUMMARY_SHEET, CENTROIDS_SHEET]
    );

    let summary = workbook.worksheet_range(SUMMARY_SHEET).unwrap();
    for row in 1..=2u32 {
        assert_eq!(
            summary.get_value((row, 0)),
            Some(&Data::String(format!("Cluster {}", row)))
        );
        assert_eq!(summary.get_value((row, 1)), Some(&Data::Float(5.0)));
        assert_eq!(
            summary.get_value((row, 2)),
            Some(&Data::String("50.00%".to_string()))
        );
    }

    let results = workbook.worksheet_range(RESULTS_SHEET).unwrap();
    assert_eq!(results.height(), 11);
    assert_eq!(
        results.get_value((0, 3)),
        Some(&Data::String("Cluster".to_string()))
    );
}

#[test]
fn test_first_sheet_is_active() {
    let input = create_test_csv();
    let dataset = load_dataset(input.path()).unwrap();
    let assignments = vec![1, 1, 1, 1, 1, 2, 2, 2, 2, 2];
    let report = build_report(&dataset, &assignments, 2);

    let out_dir = tempfile::tempdir().unwrap();
    let timestamp = NaiveDate::from_ymd_opt(2024, 5, 17)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    let path = write_report(&report, out_dir.path(), &timestamp).unwrap();

    let workbook_xml = read_zip_entry(&path, "xl/workbook.xml");
    assert!(
        !workbook_xml.contains("activeTab=") || workbook_xml.contains("activeTab=\"0\""),
        "unexpected active tab in {}",
        workbook_xml
    );

    let first = read_zip_entry(&path, "xl/worksheets/sheet1.xml");
    assert!(first.contains("tabSelected=\"1\""));
    for index in 2..=4 {
        let other = read_zip_entry(&path, &format!("xl/worksheets/sheet{}.xml", index));
        assert!(!other.contains("tabSelected=\"1\""));
    }
}

#[test]
fn test_spreadsheet_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.xlsx");

    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "a").unwrap();
    sheet.write_string(0, 1, "b").unwrap();
    sheet.write_string(0, 2, "quality").unwrap();
    sheet.write_number(1, 0, 1.5).unwrap();
    sheet.write_string(1, 1, "2.5").unwrap();
    sheet.write_number(1, 2, 5).unwrap();
    // Row 2 is left blank
    sheet.write_number(3, 0, 4.0).unwrap();
    sheet.write_string(3, 1, "bad").unwrap();
    sheet.write_string(3, 2, "six").unwrap();
    workbook.save(&path).unwrap();

    let dataset = load_dataset(&path).unwrap();
    assert_eq!(dataset.header, vec!["a", "b", "quality"]);
    assert_eq!(dataset.features, vec![vec![1.5, 2.5], vec![4.0, 0.0]]);
}

#[test]
fn test_missing_input_is_fatal() {
    let err = load_dataset("no_such_dataset.csv").unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_engine_failure_is_not_fatal() {
    let input = create_test_csv();
    let dataset = load_dataset(input.path()).unwrap();

    assert_eq!(evaluate_wcss(&BrokenEngine, 2, &dataset.features), None);

    let wcss = elbow::sweep(&BrokenEngine, &dataset.features, 8);
    assert!(wcss.values().all(Option::is_none));
    assert_eq!(select_best_k(&wcss, 3), 3);

    assert!(cluster_final(&BrokenEngine, 3, &dataset.features).is_err());
}

#[test]
fn test_wcss_properties() {
    let input = create_test_csv();
    let dataset = load_dataset(input.path()).unwrap();
    let engine = KMeansEngine::default();

    let one = evaluate_wcss(&engine, 1, &dataset.features).unwrap();
    let two = evaluate_wcss(&engine, 2, &dataset.features).unwrap();
    assert!(one.is_finite() && one > 0.0);
    assert!(two >= 0.0 && two < one);
}
