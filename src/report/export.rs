//! Summary export.
//!
//! Writes a [`ResultTable`] as CSV or JSON, header row first and rows in the
//! table's own order.

use crate::config::ExportFormat;
use crate::error::{AnalyticsError, Result};
use crate::models::ResultTable;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write `table` to `dir/stem.<ext>`, creating `dir` if needed.
pub fn export_table(
    table: &ResultTable,
    dir: &Path,
    stem: &str,
    format: ExportFormat,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| AnalyticsError::export(dir, e))?;

    let path = dir.join(format!("{}.{}", stem, format.extension()));
    let content = match format {
        ExportFormat::Csv => generate_csv(table).map_err(|e| AnalyticsError::export(&path, e))?,
        ExportFormat::Json => {
            generate_json(table).map_err(|e| AnalyticsError::export(&path, e))?
        }
    };

    std::fs::write(&path, content).map_err(|e| AnalyticsError::export(&path, e))?;
    debug!("Wrote {} rows to {}", table.len(), path.display());

    Ok(path)
}

/// Render a table as CSV text.
pub fn generate_csv(table: &ResultTable) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Render a table as pretty JSON: one object per row, keyed by column.
pub fn generate_json(table: &ResultTable) -> anyhow::Result<String> {
    let rows: Vec<serde_json::Map<String, serde_json::Value>> = table
        .rows
        .iter()
        .map(|row| {
            table
                .columns
                .iter()
                .cloned()
                .zip(row.iter().map(serde_json::to_value))
                .map(|(col, value)| value.map(|v| (col, v)))
                .collect::<serde_json::Result<_>>()
        })
        .collect::<serde_json::Result<_>>()?;

    serde_json::to_string_pretty(&rows).map_err(Into::into)
}
