//! SQLite materialization of the loaded records.
//!
//! The records are written once into the `ev_population` table. Queries never
//! share a connection: each one opens a read-only [`ReadHandle`] that is
//! closed when it goes out of scope, whichever way the query exits.

use super::loader::{
    COL_CAFV, COL_CITY, COL_COUNTY, COL_ELECTRIC_RANGE, COL_MAKE, COL_MODEL, COL_MODEL_YEAR,
    COL_VEHICLE_TYPE,
};
use crate::models::Record;
use rusqlite::{params, Connection, OpenFlags};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Name of the table the aggregation queries read from.
pub const TABLE_NAME: &str = "ev_population";

/// The on-disk SQLite database backing a record store.
#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    /// Keeps a scratch database alive when no explicit path was configured.
    _temp_dir: Option<TempDir>,
}

impl Database {
    /// Create (or replace) the database and insert every record.
    ///
    /// With `path == None` the file is placed in a temporary directory that
    /// lives as long as the returned value.
    pub fn create(path: Option<&Path>, records: &[Record]) -> anyhow::Result<Self> {
        let (path, temp_dir) = match path {
            Some(p) => {
                if let Some(parent) = p.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                (p.to_path_buf(), None)
            }
            None => {
                let temp = TempDir::new()?;
                (temp.path().join("ev_data.db"), Some(temp))
            }
        };

        debug!("Writing {} records to {}", records.len(), path.display());

        let mut conn = Connection::open(&path)?;
        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table};
             CREATE TABLE {table} (
                 \"{make}\" TEXT,
                 \"{model}\" TEXT,
                 \"{year}\" INTEGER,
                 \"{county}\" TEXT,
                 \"{city}\" TEXT,
                 \"{range}\" REAL,
                 \"{vtype}\" TEXT,
                 \"{cafv}\" TEXT
             );",
            table = TABLE_NAME,
            make = COL_MAKE,
            model = COL_MODEL,
            year = COL_MODEL_YEAR,
            county = COL_COUNTY,
            city = COL_CITY,
            range = COL_ELECTRIC_RANGE,
            vtype = COL_VEHICLE_TYPE,
            cafv = COL_CAFV,
        ))?;

        let tx = conn.transaction()?;
        {
            let mut insert = tx.prepare(&format!(
                "INSERT INTO {} VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                TABLE_NAME
            ))?;
            for record in records {
                insert.execute(params![
                    record.make,
                    record.model,
                    record.model_year,
                    record.county,
                    record.city,
                    record.electric_range,
                    record.vehicle_type,
                    record.cafv_eligibility,
                ])?;
            }
        }
        tx.commit()?;

        info!("Database ready at {}", path.display());

        Ok(Self {
            path,
            _temp_dir: temp_dir,
        })
    }

    /// Path of the SQLite file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh read-only connection for a single query.
    pub fn read_handle(&self) -> rusqlite::Result<ReadHandle> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        debug!("Acquired read handle on {}", self.path.display());
        Ok(ReadHandle { conn })
    }
}

/// A short-lived, read-only connection. Released on drop.
pub struct ReadHandle {
    conn: Connection,
}

impl Deref for ReadHandle {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for ReadHandle {
    fn drop(&mut self) {
        debug!("Released read handle");
    }
}
