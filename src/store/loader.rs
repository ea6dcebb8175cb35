//! CSV dataset loading.
//!
//! Parses the registration dataset into fixed [`Record`]s. Every row is kept;
//! cells are only normalized (trimmed, empty to `None`, numeric coercion).

use crate::error::{AnalyticsError, Result};
use crate::models::Record;
use std::io::Read;
use std::path::Path;
use tracing::debug;

pub const COL_MAKE: &str = "Make";
pub const COL_MODEL: &str = "Model";
pub const COL_MODEL_YEAR: &str = "Model Year";
pub const COL_COUNTY: &str = "County";
pub const COL_CITY: &str = "City";
pub const COL_ELECTRIC_RANGE: &str = "Electric Range";
pub const COL_VEHICLE_TYPE: &str = "Electric Vehicle Type";
pub const COL_CAFV: &str = "Clean Alternative Fuel Vehicle (CAFV) Eligibility";

/// Headers the dataset must carry. Extra columns are ignored.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    COL_MAKE,
    COL_MODEL,
    COL_MODEL_YEAR,
    COL_COUNTY,
    COL_CITY,
    COL_ELECTRIC_RANGE,
    COL_VEHICLE_TYPE,
    COL_CAFV,
];

/// Positions of the required columns within the header row.
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    make: usize,
    model: usize,
    model_year: usize,
    county: usize,
    city: usize,
    electric_range: usize,
    vehicle_type: usize,
    cafv: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &csv::StringRecord, path: &Path) -> Result<Self> {
        let names: Vec<&str> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim())
            .collect();

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|col| !names.contains(col))
            .collect();
        if !missing.is_empty() {
            return Err(AnalyticsError::data_unavailable(
                path,
                format!("missing required columns: {}", missing.join(", ")),
            ));
        }

        let find = |col: &str| names.iter().position(|n| *n == col).unwrap_or_default();
        Ok(Self {
            make: find(COL_MAKE),
            model: find(COL_MODEL),
            model_year: find(COL_MODEL_YEAR),
            county: find(COL_COUNTY),
            city: find(COL_CITY),
            electric_range: find(COL_ELECTRIC_RANGE),
            vehicle_type: find(COL_VEHICLE_TYPE),
            cafv: find(COL_CAFV),
        })
    }

    fn record(&self, row: &csv::StringRecord) -> Record {
        let cell = |idx: usize| row.get(idx);
        Record {
            make: cell(self.make).and_then(parse_text),
            model: cell(self.model).and_then(parse_text),
            model_year: cell(self.model_year).and_then(parse_model_year),
            county: cell(self.county).and_then(parse_text),
            city: cell(self.city).and_then(parse_text),
            electric_range: cell(self.electric_range).and_then(parse_range),
            vehicle_type: cell(self.vehicle_type).and_then(parse_text),
            cafv_eligibility: cell(self.cafv).and_then(parse_text),
        }
    }
}

/// Read all records from a CSV file.
pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let file = std::fs::File::open(path)
        .map_err(|e| AnalyticsError::data_unavailable(path, e))?;
    parse_records(file, path)
}

/// Parse records from any reader. `path` is only used in error messages.
///
/// Any malformed row aborts the whole load.
pub fn parse_records<R: Read>(reader: R, path: &Path) -> Result<Vec<Record>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| AnalyticsError::data_unavailable(path, e))?
        .clone();
    let index = ColumnIndex::from_headers(&headers, path)?;

    let mut records = Vec::new();
    for (line, row) in csv_reader.records().enumerate() {
        let row = row.map_err(|e| {
            AnalyticsError::data_unavailable(path, format!("row {}: {}", line + 1, e))
        })?;
        records.push(index.record(&row));
    }

    debug!("Parsed {} records from {}", records.len(), path.display());
    Ok(records)
}

fn parse_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Accepts `2020` and `2020.0`; anything else is not a year.
fn parse_model_year(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(year) = trimmed.parse::<i64>() {
        return Some(year);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Some(v as i64),
        _ => None,
    }
}

fn parse_range(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
