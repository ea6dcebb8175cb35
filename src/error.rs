//! Error types for loading, querying and exporting.
//!
//! Load-time failures are fatal to the session operation that triggered
//! them. Query failures are scoped to the single call that produced them.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the record store and the presentation adapters.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The source dataset is missing, unreadable or malformed.
    #[error("dataset unavailable at {}: {reason}", path.display())]
    DataUnavailable { path: PathBuf, reason: String },

    /// The backing engine rejected a query.
    #[error("query '{query}' failed: {source}")]
    QueryFailure {
        query: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Writing a summary, chart or dashboard failed.
    #[error("failed to write {}: {reason}", path.display())]
    Export { path: PathBuf, reason: String },
}

impl AnalyticsError {
    pub fn data_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DataUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn query_failure(query: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::QueryFailure {
            query: query.into(),
            source,
        }
    }

    pub fn export(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Export {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result alias used throughout the store and query layers.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
