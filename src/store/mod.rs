//! Record store.
//!
//! Holds the loaded registrations twice: as typed [`Record`]s for in-memory
//! widgets, and as a SQLite table for the aggregation queries. The store is
//! immutable once loaded.

pub mod database;
pub mod loader;

pub use database::{Database, ReadHandle, TABLE_NAME};

use crate::error::{AnalyticsError, Result};
use crate::models::{CellValue, Record, ResultTable};
use rusqlite::types::ValueRef;
use rusqlite::ToSql;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The queryable holder of all records for a session.
#[derive(Debug)]
pub struct RecordStore {
    source: PathBuf,
    records: Vec<Record>,
    database: Database,
}

impl RecordStore {
    /// Load the dataset at `source` and materialize it into SQLite.
    ///
    /// Either every row is loaded or the call fails; a partially built store
    /// is never returned.
    pub fn load(source: &Path, database: Option<&Path>) -> Result<Self> {
        info!("Loading dataset from {}", source.display());

        let records = loader::read_records(source)?;
        let database = Database::create(database, &records).map_err(|e| {
            AnalyticsError::data_unavailable(source, format!("failed to build store: {:#}", e))
        })?;

        info!("Loaded {} records", records.len());

        Ok(Self {
            source: source.to_path_buf(),
            records,
            database,
        })
    }

    /// Path of the dataset this store was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Run a read-only statement and collect it into a [`ResultTable`].
    ///
    /// A dedicated handle is opened for this call and released before it
    /// returns, on success and on failure alike.
    pub fn query(&self, name: &str, sql: &str, params: &[&dyn ToSql]) -> Result<ResultTable> {
        let fail = |e: rusqlite::Error| AnalyticsError::query_failure(name, e);

        let handle = self.database.read_handle().map_err(fail)?;
        let mut stmt = handle.prepare(sql).map_err(fail)?;

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let rows = stmt
            .query_map(params, |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(cell_from_ref))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(fail)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(fail)?;

        debug!("Query '{}' returned {} rows", name, rows.len());
        Ok(ResultTable { columns, rows })
    }
}

fn cell_from_ref(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(i) => CellValue::Integer(i),
        ValueRef::Real(r) => CellValue::Real(r),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            CellValue::Text(String::from_utf8_lossy(t).into_owned())
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    pub const HEADER: &str = "County,City,Model Year,Make,Model,Electric Vehicle Type,Clean Alternative Fuel Vehicle (CAFV) Eligibility,Electric Range";

    /// Write a CSV with the standard header and the given data lines.
    pub fn write_csv(dir: &TempDir, lines: &[&str]) -> PathBuf {
        let path = dir.path().join("ev_data.csv");
        let mut content = String::from(HEADER);
        content.push('\n');
        for line in lines {
            content.push_str(line);
            content.push('\n');
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Build a store from data lines in a fresh temp dir.
    pub fn store_from_lines(lines: &[&str]) -> (TempDir, RecordStore) {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, lines);
        let store = RecordStore::load(&path, None).unwrap();
        (dir, store)
    }

    /// Path of the shared sample dataset.
    pub fn fixture_path() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("fixtures")
            .join("ev_sample.csv")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_load_preserves_every_row() {
        let (_dir, store) = store_from_lines(&[
            "King,Seattle,2020,TESLA,MODEL Y,BEV,Eligible,0",
            ",,,,,,,",
            "Pierce,Tacoma,abc,NISSAN,LEAF,BEV,Eligible,150",
        ]);

        assert_eq!(store.len(), 3);
        assert_eq!(store.records()[1], Record::default());
        assert_eq!(store.records()[2].model_year, None);
    }

    #[test]
    fn test_load_missing_source() {
        let err = RecordStore::load(Path::new("/no/such/ev_data.csv"), None).unwrap_err();
        assert!(matches!(err, AnalyticsError::DataUnavailable { .. }));
    }

    #[test]
    fn test_query_maps_columns_and_types() {
        let (_dir, store) = store_from_lines(&["King,Seattle,2020,TESLA,MODEL Y,BEV,Eligible,250"]);

        let table = store
            .query(
                "probe",
                "SELECT \"Make\", \"Model Year\", \"Electric Range\", NULL AS nothing FROM ev_population",
                &[],
            )
            .unwrap();

        assert_eq!(table.columns, vec!["Make", "Model Year", "Electric Range", "nothing"]);
        assert_eq!(
            table.rows[0],
            vec![
                CellValue::Text("TESLA".into()),
                CellValue::Integer(2020),
                CellValue::Real(250.0),
                CellValue::Null,
            ]
        );
    }

    #[test]
    fn test_query_with_params() {
        let (_dir, store) = store_from_lines(&[
            "King,Seattle,2020,TESLA,MODEL Y,BEV,Eligible,250",
            "Pierce,Tacoma,2021,NISSAN,LEAF,BEV,Eligible,150",
        ]);

        let county = "Pierce";
        let table = store
            .query(
                "by_county",
                "SELECT \"Make\" FROM ev_population WHERE \"County\" = ?1",
                &[&county],
            )
            .unwrap();
        assert_eq!(table.rows, vec![vec![CellValue::Text("NISSAN".into())]]);
    }

    #[test]
    fn test_query_failure_is_isolated() {
        let (_dir, store) = store_from_lines(&["King,Seattle,2020,TESLA,MODEL Y,BEV,Eligible,250"]);

        let err = store
            .query("broken", "SELECT \"No Such Column\" FROM ev_population", &[])
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::QueryFailure { ref query, .. } if query == "broken"));

        // The next call gets its own handle and is unaffected
        let table = store
            .query("count", "SELECT COUNT(*) AS n FROM ev_population", &[])
            .unwrap();
        assert_eq!(table.rows[0][0], CellValue::Integer(1));
    }

    #[test]
    fn test_query_cannot_mutate_store() {
        let (_dir, store) = store_from_lines(&["King,Seattle,2020,TESLA,MODEL Y,BEV,Eligible,250"]);

        assert!(store
            .query("mutate", "DELETE FROM ev_population", &[])
            .is_err());
        let table = store
            .query("count", "SELECT COUNT(*) FROM ev_population", &[])
            .unwrap();
        assert_eq!(table.rows[0][0], CellValue::Integer(1));
    }

    #[test]
    fn test_fixture_loads() {
        let store = RecordStore::load(&fixture_path(), None).unwrap();
        assert!(!store.is_empty());
    }
}
