//! Analysis modules.
//!
//! `queries` holds the seven aggregation queries that run against the
//! record store. `aggregator` holds the in-memory widget computations
//! driven by the dashboard filters.

pub mod aggregator;
pub mod queries;

pub use aggregator::*;
pub use queries::*;
