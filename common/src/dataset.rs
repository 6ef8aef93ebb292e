use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    metadata::{Metadata, MetadataError, load_metadata},
    util::title_case,
};

pub const CONCURRENCY_COLUMN: &str = "concurrency";
pub const RPS_COLUMN: &str = "rps";
pub const SCENARIO_COLUMN: &str = "scenario";
pub const LATENCY_PREFIX: &str = "latency_";

/// Display labels for well known latency columns. Anything else with the
/// [`LATENCY_PREFIX`] is shown under its column name.
pub const LATENCY_LABELS: &[(&str, &str)] = &[
    ("latency_p50", "p50"),
    ("latency_p90", "p90"),
    ("latency_p95", "p95"),
    ("latency_p99", "p99"),
    ("latency_p999", "p99.9"),
];

pub fn latency_label(column: &str) -> &str {
    LATENCY_LABELS
        .iter()
        .find(|(key, _)| *key == column)
        .map(|(_, label)| *label)
        .unwrap_or(column)
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("CSV file is missing a header row")]
    MissingHeader,
    #[error("Required column '{0}' missing from CSV")]
    MissingColumn(&'static str),
    #[error("Invalid {column} value '{value}' at line {line}")]
    InvalidValue {
        column: &'static str,
        value: String,
        line: usize,
    },
    #[error("CSV contains no data rows")]
    NoRows,
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// One benchmark CSV file after parsing, sorted by concurrency.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub source_path: PathBuf,
    pub scenario: String,
    pub title: String,
    pub concurrency: Vec<i64>,
    pub rps: Vec<f64>,
    /// Latency column name -> one value per concurrency level
    pub latencies: BTreeMap<String, Vec<f64>>,
    pub metadata: Metadata,
}

impl Dataset {
    /// Base name used for every file produced from this dataset.
    pub fn slug(&self) -> String {
        file_stem(&self.source_path)
    }

    /// Latency series as `(display label, values)` in column name order.
    pub fn latency_series(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.latencies
            .iter()
            .map(|(column, values)| (latency_label(column), values.as_slice()))
    }

    pub fn latency(&self, column: &str) -> Option<&[f64]> {
        self.latencies.get(column).map(Vec::as_slice)
    }
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug)]
struct Row {
    concurrency: i64,
    rps: f64,
    scenario: Option<String>,
    latencies: Vec<Option<f64>>,
}

struct Columns {
    concurrency: usize,
    rps: usize,
    scenario: Option<usize>,
    /// (column index, column name)
    latencies: Vec<(usize, String)>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, DatasetError> {
        if headers.is_empty() {
            return Err(DatasetError::MissingHeader);
        }
        let position = |name: &str| headers.iter().position(|h| h == name);
        Ok(Self {
            concurrency: position(CONCURRENCY_COLUMN)
                .ok_or(DatasetError::MissingColumn(CONCURRENCY_COLUMN))?,
            rps: position(RPS_COLUMN).ok_or(DatasetError::MissingColumn(RPS_COLUMN))?,
            scenario: position(SCENARIO_COLUMN),
            latencies: headers
                .iter()
                .enumerate()
                .filter(|(_, h)| h.starts_with(LATENCY_PREFIX))
                .map(|(idx, h)| (idx, h.to_owned()))
                .collect(),
        })
    }
}

/// Parses one benchmark CSV file and its sidecar metadata.
pub fn load_dataset(csv_path: &Path) -> Result<Dataset, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(csv_path)?;
    let columns = Columns::from_headers(reader.headers()?)?;

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        // header is line 1
        let line = idx + 2;
        rows.push(parse_row(&record, &columns, csv_path, line)?);
    }
    if rows.is_empty() {
        return Err(DatasetError::NoRows);
    }
    debug!("Parsed {} rows from {}", rows.len(), csv_path.display());

    rows.sort_by_key(|row| row.concurrency);

    let scenarios: BTreeSet<&str> = rows.iter().filter_map(|row| row.scenario.as_deref()).collect();
    let scenario = match scenarios.iter().exactly_one() {
        Ok(name) => (*name).to_owned(),
        Err(_) => file_stem(csv_path),
    };

    let mut latencies = BTreeMap::new();
    for (pos, (_, column)) in columns.latencies.iter().enumerate() {
        let values: Option<Vec<f64>> = rows.iter().map(|row| row.latencies[pos]).collect();
        match values {
            Some(values) => {
                latencies.insert(column.clone(), values);
            }
            None => warn!(
                "Column '{column}' in {} has missing values; omitting from chart",
                csv_path.display()
            ),
        }
    }

    let metadata = load_metadata(csv_path)?;
    let title = match metadata.get("title").filter(|title| !title.is_empty()) {
        Some(title) => title.clone(),
        None => title_case(&scenario.replace(['-', '_'], " ")),
    };

    Ok(Dataset {
        source_path: csv_path.to_path_buf(),
        scenario,
        title,
        concurrency: rows.iter().map(|row| row.concurrency).collect(),
        rps: rows.iter().map(|row| row.rps).collect(),
        latencies,
        metadata,
    })
}

fn parse_row(
    record: &csv::StringRecord,
    columns: &Columns,
    csv_path: &Path,
    line: usize,
) -> Result<Row, DatasetError> {
    let concurrency_raw = record
        .get(columns.concurrency)
        .ok_or(DatasetError::MissingColumn(CONCURRENCY_COLUMN))?;
    let concurrency =
        concurrency_raw
            .trim()
            .parse::<i64>()
            .map_err(|_| DatasetError::InvalidValue {
                column: CONCURRENCY_COLUMN,
                value: concurrency_raw.to_owned(),
                line,
            })?;

    let rps_raw = record
        .get(columns.rps)
        .ok_or(DatasetError::MissingColumn(RPS_COLUMN))?;
    let rps = rps_raw
        .trim()
        .parse::<f64>()
        .map_err(|_| DatasetError::InvalidValue {
            column: RPS_COLUMN,
            value: rps_raw.to_owned(),
            line,
        })?;

    let scenario = columns
        .scenario
        .and_then(|idx| record.get(idx))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned);

    let latencies = columns
        .latencies
        .iter()
        .map(|(idx, column)| {
            let raw = record.get(*idx).unwrap_or_default().trim();
            if raw.is_empty() {
                return None;
            }
            match raw.parse::<f64>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(
                        "Unable to parse '{column}'='{raw}' in {} line {line}; field dropped",
                        csv_path.display()
                    );
                    None
                }
            }
        })
        .collect();

    Ok(Row {
        concurrency,
        rps,
        scenario,
        latencies,
    })
}
