//! Data models for the EV analytics pipeline.
//!
//! This module contains the core data structures shared by the store,
//! the aggregation queries and the presentation adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One vehicle registration, validated once at load time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub make: Option<String>,
    pub model: Option<String>,
    pub model_year: Option<i64>,
    pub county: Option<String>,
    pub city: Option<String>,
    /// Miles. Values `<= 0` mean the range is unknown.
    pub electric_range: Option<f64>,
    pub vehicle_type: Option<String>,
    pub cafv_eligibility: Option<String>,
}

impl Record {
    /// Returns the electric range only when it is a real, positive value.
    pub fn known_range(&self) -> Option<f64> {
        self.electric_range.filter(|r| *r > 0.0)
    }
}

/// A single cell of a query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl CellValue {
    /// Numeric view of the cell, used for chart axes.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Real(r) => Some(*r),
            CellValue::Text(s) => s.parse().ok(),
            CellValue::Null => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Real(r) => write!(f, "{}", r),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// An ordered, named-column query result.
///
/// Row order is significant: it is the documented sort order of the query
/// that produced the table, and consumers must not reorder it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// A query that matched nothing. Not an error.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<&CellValue>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().filter_map(|row| row.get(idx)).collect())
    }

    /// Returns a copy holding only the first `n` rows.
    pub fn head(&self, n: usize) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

/// Metadata about one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Path of the source dataset.
    pub source: String,
    /// When the run started.
    pub generated_at: DateTime<Utc>,
    /// Number of records in the store.
    pub record_count: usize,
    /// Number of queries that produced a table.
    pub queries_succeeded: usize,
    /// Number of queries that failed.
    pub queries_failed: usize,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}
