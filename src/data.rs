//! Data loading: spreadsheet or CSV table into records and feature vectors

use calamine::{open_workbook_auto, Data, Reader};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

/// A single raw cell of the input table
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Empty,
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Field {
    /// Build a field from raw text, keeping numeric-looking text as a number
    pub fn from_text(raw: &str) -> Self {
        if raw.is_empty() {
            return Field::Empty;
        }
        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Field::Number(value),
            _ => Field::Text(raw.to_string()),
        }
    }

    /// True for missing cells and empty strings. Whitespace is content.
    pub fn is_empty(&self) -> bool {
        match self {
            Field::Empty => true,
            Field::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    /// Permissive numeric conversion; anything non-numeric becomes zero
    pub fn as_f64(&self) -> f64 {
        match self {
            Field::Number(value) => *value,
            Field::Bool(true) => 1.0,
            Field::Bool(false) => 0.0,
            Field::Text(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .unwrap_or(0.0),
            Field::Empty => 0.0,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Empty => Ok(()),
            Field::Number(value) => write!(f, "{}", value),
            Field::Bool(value) => write!(f, "{}", value),
            Field::Text(text) => f.write_str(text),
        }
    }
}

impl From<&Data> for Field {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => Field::Empty,
            Data::Float(value) => Field::Number(*value),
            Data::Int(value) => Field::Number(*value as f64),
            Data::Bool(value) => Field::Bool(*value),
            Data::String(text) => Field::from_text(text),
            other => Field::from_text(&other.to_string()),
        }
    }
}

/// One original input row, label column included
pub type Record = Vec<Field>;

/// Loaded table: header, original records and their feature vectors
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Column names; the last one is the label column
    pub header: Vec<String>,
    /// Non-blank rows, normalized to the header width
    pub records: Vec<Record>,
    /// Numeric features per record (label column excluded), index-aligned with `records`
    pub features: Vec<Vec<f64>>,
}

impl Dataset {
    /// Build a dataset from a header and raw rows, dropping blank rows
    pub fn from_rows(header: Vec<String>, rows: Vec<Record>) -> crate::Result<Self> {
        if header.len() < 2 {
            anyhow::bail!(
                "Header must have at least one feature column and a label column, found {} column(s)",
                header.len()
            );
        }

        let width = header.len();
        let mut records = Vec::with_capacity(rows.len());
        let mut features = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;

        for mut row in rows {
            if row.iter().all(Field::is_empty) {
                skipped += 1;
                continue;
            }
            row.resize(width, Field::Empty);

            features.push(row[..width - 1].iter().map(Field::as_f64).collect());
            records.push(row);
        }

        if skipped > 0 {
            debug!("Skipped {} blank row(s)", skipped);
        }

        Ok(Dataset {
            header,
            records,
            features,
        })
    }

    /// Number of loaded records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Dimension of each feature vector
    pub fn dimension(&self) -> usize {
        self.header.len() - 1
    }

    /// Header names of the feature columns
    pub fn feature_names(&self) -> &[String] {
        &self.header[..self.dimension()]
    }

    /// Header name of the label column
    pub fn label_name(&self) -> &str {
        &self.header[self.dimension()]
    }
}

/// Load a table and split it into header, records and feature vectors
///
/// Delimited files get their separator (`;`, tab or `,`) from the first
/// line. Workbooks are always read from their first worksheet, whichever
/// sheet was active when the file was saved.
///
/// # Arguments
/// * `path` - Path to a `.csv` file or a spreadsheet readable by calamine
///
/// # Returns
/// * `Dataset` with blank rows removed and features converted permissively
pub fn load_dataset<P: AsRef<Path>>(path: P) -> crate::Result<Dataset> {
    let path = path.as_ref();
    if !path.exists() {
        anyhow::bail!("File {} not found", path.display());
    }

    let mut rows = if is_delimited(path) {
        read_csv_rows(path)?
    } else {
        read_workbook_rows(path)?
    };

    if rows.is_empty() {
        anyhow::bail!("File {} has no header row", path.display());
    }
    let header: Vec<String> = rows
        .remove(0)
        .iter()
        .map(|field| field.to_string().trim().to_string())
        .collect();

    let dataset = Dataset::from_rows(header, rows)?;
    info!(
        "Loaded {} records with {} features from {}",
        dataset.len(),
        dataset.dimension(),
        path.display()
    );
    Ok(dataset)
}

fn is_delimited(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("txt"))
        .unwrap_or(false)
}

/// Pick the separator that occurs most often in the header line, `,` on ties
fn sniff_delimiter(line: &str) -> u8 {
    [b',', b';', b'\t']
        .into_iter()
        .map(|delimiter| (delimiter, line.bytes().filter(|&b| b == delimiter).count()))
        .fold((b',', 0), |best, candidate| {
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        })
        .0
}

fn read_csv_rows(path: &Path) -> crate::Result<Vec<Record>> {
    let mut first_line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first_line)?;
    let delimiter = sniff_delimiter(&first_line);
    debug!("Using delimiter {:?} for {}", delimiter as char, path.display());

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(Field::from_text).collect());
    }
    Ok(rows)
}

fn read_workbook_rows(path: &Path) -> crate::Result<Vec<Record>> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow::anyhow!("Workbook {} has no worksheets", path.display()))??;

    Ok(range
        .rows()
        .map(|row| row.iter().map(Field::from).collect())
        .collect())
}
