//! # Record Loading and Normalization
//!
//! This module is the entry point for user-provided collision tables. It
//! reads a delimited text file, locates the known columns by header name,
//! and turns every row into a cleaned `Record`.
//!
//! - Lenient headers: names are matched case-insensitively, ignoring spaces,
//!   underscores and dashes, and a few common aliases are accepted.
//! - Normalized cells: placeholders such as `Unspecified`, `NA` or `Unknown`
//!   become absent values, and out-of-range hours and weekdays are dropped,
//!   so the engine never sees a phantom category.
//! - Strict labels: a row whose injury label cannot be determined is an
//!   error that names the offending line.

use crate::record::{Conditions, Record};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Cell contents treated as "no value", compared case-insensitively.
const MISSING_MARKERS: [&str; 5] = ["unspecified", "na", "n/a", "unknown", "null"];

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse delimited input: {0}")]
    Csv(#[from] csv::Error),
    #[error(
        "The input has neither an 'injured' nor an 'injured_count' column, so no injury label can be derived."
    )]
    MissingLabelColumn,
    #[error("Line {line}: the injury label is missing and no injured count is available.")]
    MissingLabel { line: u64 },
    #[error(
        "Line {line}: could not interpret '{value}' as an injury label (expected true/false, yes/no or 1/0)."
    )]
    InvalidLabel { line: u64, value: String },
}

/// Column positions resolved from the header row.
#[derive(Debug, Default)]
struct ColumnMap {
    vehicle_type: Option<usize>,
    pre_crash: Option<usize>,
    borough: Option<usize>,
    hour: Option<usize>,
    dow: Option<usize>,
    injured: Option<usize>,
    injured_count: Option<usize>,
    severity: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let mut map = Self::default();
        for (position, header) in headers.iter().enumerate() {
            let slot = match canonical_header(header).as_str() {
                "vehicletype" | "vehicle" | "vehicletypecode1" => &mut map.vehicle_type,
                "precrash" | "precrashaction" | "action" => &mut map.pre_crash,
                "borough" | "boro" => &mut map.borough,
                "hour" | "crashhour" => &mut map.hour,
                "dow" | "dayofweek" | "weekday" => &mut map.dow,
                "injured" => &mut map.injured,
                "injuredcount" | "personsinjured" | "numberofpersonsinjured" => {
                    &mut map.injured_count
                }
                "severity" => &mut map.severity,
                _ => continue,
            };
            // First matching column wins.
            slot.get_or_insert(position);
        }
        map
    }
}

fn canonical_header(header: &str) -> String {
    header
        .trim()
        .chars()
        .filter(|c| !matches!(*c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Trims a category cell and maps placeholders to `None`.
pub fn normalize_category(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_ascii_lowercase();
    if MISSING_MARKERS.contains(&lowered.as_str()) {
        return None;
    }
    Some(trimmed.to_string())
}

/// Parses an integer cell and keeps it only when it lies in `0..=max`.
/// Values written with a fractional zero part (`"7.0"`) are accepted.
pub fn normalize_bounded(raw: &str, max: u8) -> Option<u8> {
    let value: f64 = normalize_category(raw)?.parse().ok()?;
    if !value.is_finite() || value.fract() != 0.0 || value < 0.0 || value > f64::from(max) {
        return None;
    }
    Some(value as u8)
}

/// `Some(None)` for an empty cell, `None` for a cell that is not a label.
fn parse_label(raw: &str) -> Option<Option<bool>> {
    let Some(value) = normalize_category(raw) else {
        return Some(None);
    };
    match value.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(Some(true)),
        "false" | "f" | "no" | "n" | "0" => Some(Some(false)),
        _ => None,
    }
}

fn parse_non_negative(raw: &str) -> Option<f64> {
    let value: f64 = normalize_category(raw)?.parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// Loads records from `path`. Files ending in `.tsv` or `.tab` are read as
/// tab-separated; everything else as comma-separated.
pub fn load_records(path: &Path) -> Result<Vec<Record>, DataError> {
    let delimiter = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("tab") => b'\t',
        _ => b',',
    };
    let file = File::open(path)?;
    let records = read_records(file, delimiter)?;
    log::info!(
        "Loaded {} records from {}.",
        records.len(),
        path.display()
    );
    Ok(records)
}

/// Reads records from any delimited source with a header row.
pub fn read_records<R: Read>(reader: R, delimiter: u8) -> Result<Vec<Record>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = ColumnMap::from_headers(reader.headers()?);
    if columns.injured.is_none() && columns.injured_count.is_none() {
        return Err(DataError::MissingLabelColumn);
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let line = row.position().map_or(0, |p| p.line());
        let cell = |column: Option<usize>| column.and_then(|i| row.get(i)).unwrap_or("");

        let conditions = Conditions {
            vehicle_type: normalize_category(cell(columns.vehicle_type)),
            pre_crash: normalize_category(cell(columns.pre_crash)),
            borough: normalize_category(cell(columns.borough)),
            hour: normalize_bounded(cell(columns.hour), 23),
            dow: normalize_bounded(cell(columns.dow), 6),
        };

        let injured_count =
            parse_non_negative(cell(columns.injured_count)).map(|count| count.round() as u32);
        let explicit = parse_label(cell(columns.injured)).ok_or_else(|| DataError::InvalidLabel {
            line,
            value: cell(columns.injured).to_string(),
        })?;
        let injured = match (explicit, injured_count) {
            (Some(label), _) => label,
            (None, Some(count)) => count > 0,
            (None, None) => return Err(DataError::MissingLabel { line }),
        };

        records.push(Record {
            conditions,
            injured,
            severity: parse_non_negative(cell(columns.severity)),
            injured_count,
        });
    }

    log::debug!(
        "Parsed {} rows ({} injured).",
        records.len(),
        records.iter().filter(|r| r.injured).count()
    );
    Ok(records)
}
