//! Presentation adapters: summary export, SVG charts and the HTML dashboard.
//!
//! Adapters only consume [`ResultTable`](crate::models::ResultTable)s produced
//! by the aggregation queries; none of them builds SQL.

pub mod chart;
pub mod dashboard;
pub mod export;

pub use chart::{chart_for, render_chart};
pub use dashboard::{export_downloads, write_dashboard, DashboardContext};
pub use export::export_table;
