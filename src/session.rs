//! Session context.
//!
//! A [`Session`] owns the loaded record store for one run. The store is
//! loaded on first use and reused by every later query; it is only replaced
//! by an explicit reload. There is no process-wide cache.
//!
//! The `ev-analytics` binary loads once per process and never reloads;
//! `reload` and `reload_from` serve callers that keep one session across
//! several datasets.

use crate::error::Result;
use crate::store::RecordStore;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub struct Session {
    source: PathBuf,
    database: Option<PathBuf>,
    show_progress: bool,
    store: Option<RecordStore>,
}

impl Session {
    /// Create a session. Nothing is loaded until [`Session::store`] is called.
    pub fn new(source: impl Into<PathBuf>, database: Option<PathBuf>) -> Self {
        Self {
            source: source.into(),
            database,
            show_progress: false,
            store: None,
        }
    }

    /// Show a spinner while the one-time load runs.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    #[allow(dead_code)]
    pub fn source(&self) -> &Path {
        &self.source
    }

    #[allow(dead_code)]
    pub fn is_loaded(&self) -> bool {
        self.store.is_some()
    }

    /// The session's store, loading it on first access.
    pub fn store(&mut self) -> Result<&RecordStore> {
        let store = match self.store.take() {
            Some(store) => store,
            None => self.load()?,
        };
        Ok(self.store.insert(store))
    }

    /// Drop the cached store and load the same source again.
    ///
    /// On failure the session is left unloaded rather than serving the
    /// previous data.
    #[allow(dead_code)]
    pub fn reload(&mut self) -> Result<&RecordStore> {
        info!("Reloading dataset from {}", self.source.display());
        self.store = None;
        self.store()
    }

    /// Switch to a new source and load it.
    #[allow(dead_code)]
    pub fn reload_from(&mut self, source: impl Into<PathBuf>) -> Result<&RecordStore> {
        self.source = source.into();
        self.reload()
    }

    fn load(&self) -> Result<RecordStore> {
        let spinner = self.show_progress.then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg} [{elapsed}]")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message(format!("Loading EV data from {}", self.source.display()));
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });

        let result = RecordStore::load(&self.source, self.database.as_deref());

        if let Some(pb) = spinner {
            match result {
                Ok(ref store) => pb.finish_with_message(format!("Loaded {} records", store.len())),
                Err(_) => pb.abandon_with_message("Failed to load EV data"),
            }
        }
        if let Err(ref e) = result {
            warn!("Dataset load failed: {}", e);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyticsError;
    use crate::store::test_support::write_csv;
    use tempfile::TempDir;

    #[test]
    fn test_lazy_load() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, &["King,Seattle,2020,TESLA,MODEL Y,BEV,Eligible,250"]);

        let mut session = Session::new(&path, None);
        assert!(!session.is_loaded());

        assert_eq!(session.store().unwrap().len(), 1);
        assert!(session.is_loaded());
    }

    #[test]
    fn test_cached_until_reload() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, &["King,Seattle,2020,TESLA,MODEL Y,BEV,Eligible,250"]);

        let mut session = Session::new(&path, None);
        session.store().unwrap();

        // No staleness detection: the cached store keeps answering
        std::fs::remove_file(&path).unwrap();
        assert_eq!(session.store().unwrap().len(), 1);

        // An explicit reload sees the missing file and leaves nothing behind
        let err = session.reload().unwrap_err();
        assert!(matches!(err, AnalyticsError::DataUnavailable { .. }));
        assert!(!session.is_loaded());
    }

    #[test]
    fn test_reload_picks_up_new_contents() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, &["King,Seattle,2020,TESLA,MODEL Y,BEV,Eligible,250"]);

        let mut session = Session::new(&path, None);
        assert_eq!(session.store().unwrap().len(), 1);

        write_csv(
            &dir,
            &[
                "King,Seattle,2020,TESLA,MODEL Y,BEV,Eligible,250",
                "Pierce,Tacoma,2021,NISSAN,LEAF,BEV,Eligible,150",
            ],
        );
        assert_eq!(session.store().unwrap().len(), 1);
        assert_eq!(session.reload().unwrap().len(), 2);
    }

    #[test]
    fn test_reload_from_new_source() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let a = write_csv(&first, &["King,Seattle,2020,TESLA,MODEL Y,BEV,Eligible,250"]);
        let b = write_csv(&second, &[",,,,,,,", ",,,,,,,", ",,,,,,,"]);

        let mut session = Session::new(&a, None);
        session.store().unwrap();
        assert_eq!(session.reload_from(&b).unwrap().len(), 3);
        assert_eq!(session.source(), b.as_path());
    }

    #[test]
    fn test_missing_source_never_loads() {
        let mut session = Session::new("/no/such/ev_data.csv", None);
        assert!(session.store().is_err());
        assert!(!session.is_loaded());
    }
}
