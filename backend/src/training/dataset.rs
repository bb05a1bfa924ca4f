use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::normalize::normalize;

pub const REGION_COLUMN: &str = "Region";
pub const COUNTRY_COLUMN: &str = "Country";
pub const TARGET_COLUMN: &str = "Disaster Type";

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("No rows left after removing empty values")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisasterRecord {
    pub region: String,
    pub country: String,
    pub disaster_type: String,
}

impl DisasterRecord {
    pub fn new(region: &str, country: &str, disaster_type: &str) -> Self {
        Self {
            region: normalize(region),
            country: normalize(country),
            disaster_type: normalize(disaster_type),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CleanedDataset {
    pub records: Vec<DisasterRecord>,
    pub rows_read: usize,
    pub rows_dropped: usize,
}

fn column_index(headers: &csv::StringRecord, name: &'static str) -> Result<usize, DatasetError> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        .ok_or(DatasetError::MissingColumn(name))
}

/// Read the three training columns, dropping rows where any of them is blank.
pub fn read_records<R: Read>(reader: R) -> Result<CleanedDataset, DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let region = column_index(&headers, REGION_COLUMN)?;
    let country = column_index(&headers, COUNTRY_COLUMN)?;
    let target = column_index(&headers, TARGET_COLUMN)?;

    let mut records = Vec::new();
    let mut rows_read = 0;
    for row in csv_reader.records() {
        let row = row?;
        rows_read += 1;

        let field = |i: usize| row.get(i).map(str::trim).filter(|v| !v.is_empty());
        if let (Some(r), Some(c), Some(t)) = (field(region), field(country), field(target)) {
            records.push(DisasterRecord::new(r, c, t));
        }
    }

    if records.is_empty() {
        return Err(DatasetError::Empty);
    }
    let rows_dropped = rows_read - records.len();
    if rows_dropped > 0 {
        log::info!("Dropped {} of {} rows with empty values", rows_dropped, rows_read);
    }
    Ok(CleanedDataset {
        records,
        rows_read,
        rows_dropped,
    })
}

pub fn read_records_from_path(path: &Path) -> Result<CleanedDataset, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Reading training data from {}", path.display());
    read_records(file)
}

/// Record count per disaster type, most frequent first.
pub fn class_distribution(records: &[DisasterRecord]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(record.disaster_type.as_str()).or_default() += 1;
    }
    let mut distribution: Vec<(String, usize)> =
        counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    distribution.sort_by(|a, b| b.1.cmp(&a.1));
    distribution
}

/// Remove records whose class has fewer than `min_count` members.
///
/// Returns the kept records and the names of the removed classes.
pub fn filter_rare_classes(
    records: Vec<DisasterRecord>,
    min_count: usize,
) -> (Vec<DisasterRecord>, Vec<String>) {
    let rare: BTreeSet<String> = class_distribution(&records)
        .into_iter()
        .filter(|(_, count)| *count < min_count)
        .map(|(name, _)| name)
        .collect();

    let kept = records
        .into_iter()
        .filter(|r| !rare.contains(&r.disaster_type))
        .collect();
    (kept, rare.into_iter().collect())
}
