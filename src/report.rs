//! Report views and the spreadsheet writer

use crate::data::{Dataset, Field};
use crate::model::{centroids_from_assignments, cluster_sizes};
use chrono::NaiveDateTime;
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const RESULTS_SHEET: &str = "Cluster Results";
pub const STATISTICS_SHEET: &str = "Detailed Statistics";
pub const SUMMARY_SHEET: &str = "Cluster Summary";
pub const CENTROIDS_SHEET: &str = "Cluster Centroids";

const HEADER_FILL: u32 = 0x4472C4;

/// Size class of a cluster relative to the whole dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeCategory {
    Majority,
    Medium,
    Minority,
    /// Category of the TOTAL row
    AllClusters,
}

impl SizeCategory {
    /// MAJORITY from 50%, MEDIUM from 30%, MINORITY below
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 50.0 {
            SizeCategory::Majority
        } else if percentage >= 30.0 {
            SizeCategory::Medium
        } else {
            SizeCategory::Minority
        }
    }

    fn fill(self) -> u32 {
        match self {
            SizeCategory::Majority => 0xC6EFCE,
            SizeCategory::Medium => 0xFFEB9C,
            SizeCategory::Minority => 0xFFC7CE,
            SizeCategory::AllClusters => 0xD9E1F2,
        }
    }
}

impl fmt::Display for SizeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SizeCategory::Majority => "MAJORITY",
            SizeCategory::Medium => "MEDIUM",
            SizeCategory::Minority => "MINORITY",
            SizeCategory::AllClusters => "ALL CLUSTERS",
        };
        f.write_str(label)
    }
}

/// Size statistics of one cluster
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterStat {
    /// 1-based cluster id
    pub cluster: usize,
    pub count: usize,
    /// Share of all records, 0 to 100
    pub percentage: f64,
    pub category: SizeCategory,
}

impl ClusterStat {
    pub fn label(&self) -> String {
        format!("Cluster {}", self.cluster)
    }
}

/// Per-cluster statistics for clusters `1..=k`
pub fn cluster_stats(assignments: &[usize], k: usize) -> Vec<ClusterStat> {
    let total = assignments.len();
    cluster_sizes(assignments, k)
        .into_iter()
        .enumerate()
        .map(|(index, count)| {
            let percentage = if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            ClusterStat {
                cluster: index + 1,
                count,
                percentage,
                category: SizeCategory::from_percentage(percentage),
            }
        })
        .collect()
}

/// Two decimals with ties rounded away from zero, e.g. `40.63%` for 13 of 32
pub fn format_percentage(percentage: f64) -> String {
    format!("{:.2}%", (percentage * 100.0).round() / 100.0)
}

/// A single cell of a report sheet
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Category(SizeCategory),
}

impl From<&Field> for Cell {
    fn from(field: &Field) -> Self {
        match field {
            Field::Empty => Cell::Empty,
            Field::Number(value) => Cell::Number(*value),
            Field::Bool(value) => Cell::Bool(*value),
            Field::Text(text) => Cell::Text(text.clone()),
        }
    }
}

/// One tabular view of the report
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: &'static str,
    /// One-line description for console output
    pub description: &'static str,
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    /// Excel number format for numeric body cells
    pub number_format: Option<&'static str>,
    /// Free text written beside the table, first line as a title
    pub legend: Vec<String>,
}

impl Sheet {
    fn new(name: &'static str, description: &'static str, header: Vec<String>) -> Self {
        Sheet {
            name,
            description,
            header,
            rows: Vec::new(),
            number_format: None,
            legend: Vec::new(),
        }
    }
}

/// The four report views, in sheet order
#[derive(Debug, Clone)]
pub struct Report {
    pub best_k: usize,
    pub sheets: Vec<Sheet>,
}

impl Report {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }
}

/// Build all report views from the dataset and its final assignments
///
/// # Arguments
/// * `dataset` - Loaded header, records and feature vectors
/// * `assignments` - 1-based cluster id per record
/// * `best_k` - Number of clusters used for the final run
pub fn build_report(dataset: &Dataset, assignments: &[usize], best_k: usize) -> Report {
    let stats = cluster_stats(assignments, best_k);
    let total = dataset.len();

    Report {
        best_k,
        sheets: vec![
            results_sheet(dataset, assignments),
            statistics_sheet(&stats, total),
            summary_sheet(&stats, total),
            centroids_sheet(dataset, assignments, best_k),
        ],
    }
}

fn results_sheet(dataset: &Dataset, assignments: &[usize]) -> Sheet {
    let mut header = dataset.header.clone();
    header.push("Cluster".to_string());

    let mut sheet = Sheet::new(RESULTS_SHEET, "Full data with cluster labels", header);
    sheet.rows = dataset
        .records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let cluster = assignments.get(index).copied().unwrap_or(0);
            record
                .iter()
                .map(Cell::from)
                .chain(std::iter::once(Cell::Number(cluster as f64)))
                .collect()
        })
        .collect();
    sheet
}

fn statistics_sheet(stats: &[ClusterStat], total: usize) -> Sheet {
    let mut sheet = Sheet::new(
        STATISTICS_SHEET,
        "Cluster sizes with MAJORITY/MEDIUM/MINORITY categories",
        vec![
            "Cluster".to_string(),
            "Count".to_string(),
            "Percentage".to_string(),
            "Category".to_string(),
        ],
    );
    sheet.rows = stats
        .iter()
        .map(|stat| {
            vec![
                Cell::Text(stat.label()),
                Cell::Number(stat.count as f64),
                Cell::Text(format_percentage(stat.percentage)),
                Cell::Category(stat.category),
            ]
        })
        .collect();
    sheet.rows.push(vec![
        Cell::Text("TOTAL".to_string()),
        Cell::Number(total as f64),
        Cell::Text("100%".to_string()),
        Cell::Category(SizeCategory::AllClusters),
    ]);
    sheet.legend = vec![
        "CLUSTER DISTRIBUTION ANALYSIS".to_string(),
        String::new(),
        "Legend:".to_string(),
        "• MAJORITY: >= 50% of records".to_string(),
        "• MEDIUM: 30% - 49.99% of records".to_string(),
        "• MINORITY: < 30% of records".to_string(),
    ];
    sheet
}

fn summary_sheet(stats: &[ClusterStat], total: usize) -> Sheet {
    let mut sheet = Sheet::new(
        SUMMARY_SHEET,
        "Record count per cluster",
        vec![
            "Cluster".to_string(),
            "Count".to_string(),
            "Percentage".to_string(),
        ],
    );
    sheet.rows = stats
        .iter()
        .map(|stat| {
            vec![
                Cell::Text(stat.label()),
                Cell::Number(stat.count as f64),
                Cell::Text(format_percentage(stat.percentage)),
            ]
        })
        .collect();
    sheet.rows.push(vec![
        Cell::Text("TOTAL".to_string()),
        Cell::Number(total as f64),
        Cell::Text("100%".to_string()),
    ]);
    sheet
}

fn centroids_sheet(dataset: &Dataset, assignments: &[usize], best_k: usize) -> Sheet {
    let mut header = vec!["Cluster".to_string()];
    header.extend(dataset.feature_names().iter().cloned());

    let mut sheet = Sheet::new(CENTROIDS_SHEET, "Centroid values per cluster", header);
    sheet.number_format = Some("0.0000");
    sheet.rows = centroids_from_assignments(&dataset.features, assignments, best_k)
        .into_iter()
        .enumerate()
        .filter_map(|(index, centroid)| {
            let centroid = centroid?;
            let mut row = vec![Cell::Text(format!("Cluster {}", index + 1))];
            row.extend(centroid.into_iter().map(Cell::Number));
            Some(row)
        })
        .collect();
    sheet
}

/// Report file path: `<dir>/clustering_results_<K>K_<timestamp>.xlsx`
pub fn output_path(dir: &Path, best_k: usize, timestamp: &NaiveDateTime) -> PathBuf {
    dir.join(format!(
        "clustering_results_{}K_{}.xlsx",
        best_k,
        timestamp.format("%Y-%m-%d_%H-%M-%S")
    ))
}

/// Write the report as an xlsx workbook with the first sheet active
///
/// # Returns
/// * Path of the written file
pub fn write_report(
    report: &Report,
    dir: &Path,
    timestamp: &NaiveDateTime,
) -> crate::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = output_path(dir, report.best_k, timestamp);

    let mut workbook = Workbook::new();
    for (index, sheet) in report.sheets.iter().enumerate() {
        let worksheet = workbook.add_worksheet();
        write_sheet(worksheet, sheet)?;
        if index == 0 {
            worksheet.set_active(true);
        }
        debug!("Wrote sheet '{}' with {} rows", sheet.name, sheet.rows.len());
    }

    workbook.save(&path)?;
    info!("Report saved to {}", path.display());
    Ok(path)
}

fn write_sheet(worksheet: &mut Worksheet, sheet: &Sheet) -> crate::Result<()> {
    worksheet.set_name(sheet.name)?;

    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL));
    let number_format = sheet
        .number_format
        .map(|pattern| Format::new().set_num_format(pattern));

    for (col, title) in sheet.header.iter().enumerate() {
        let (row, col) = position(0, col)?;
        worksheet.write_string_with_format(row, col, title, &header_format)?;
    }

    for (row_index, cells) in sheet.rows.iter().enumerate() {
        for (col_index, cell) in cells.iter().enumerate() {
            let (row, col) = position(row_index + 1, col_index)?;
            match cell {
                Cell::Empty => {}
                Cell::Text(text) => {
                    worksheet.write_string(row, col, text)?;
                }
                Cell::Number(value) => match &number_format {
                    Some(format) => {
                        worksheet.write_number_with_format(row, col, *value, format)?;
                    }
                    None => {
                        worksheet.write_number(row, col, *value)?;
                    }
                },
                Cell::Bool(value) => {
                    worksheet.write_boolean(row, col, *value)?;
                }
                Cell::Category(category) => {
                    let format = Format::new().set_background_color(Color::RGB(category.fill()));
                    worksheet.write_string_with_format(row, col, category.to_string(), &format)?;
                }
            }
        }
    }

    if !sheet.legend.is_empty() {
        let legend_col = sheet.header.len() + 1;
        let title_format = Format::new().set_bold().set_font_size(14);
        let line_format = Format::new().set_bold();
        for (line_index, line) in sheet.legend.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let (row, col) = position(line_index, legend_col)?;
            let format = if line_index == 0 {
                &title_format
            } else {
                &line_format
            };
            worksheet.write_string_with_format(row, col, line, format)?;
        }
    }

    worksheet.autofit();
    Ok(())
}

fn position(row: usize, col: usize) -> crate::Result<(u32, u16)> {
    Ok((u32::try_from(row)?, u16::try_from(col)?))
}
