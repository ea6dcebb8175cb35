//! Static HTML dashboard.
//!
//! The page is assembled section by section. Every widget runs its own query
//! against the store; a widget whose query fails is replaced by a placeholder
//! and the rest of the page still renders.

use super::chart::{self, ChartKind, ChartSpec};
use super::export::export_table;
use crate::analysis::{range_histogram, AggregationQuery, DashboardFilters, SummaryMetrics};
use crate::config::{DashboardConfig, ExportFormat};
use crate::error::{AnalyticsError, Result};
use crate::models::{CellValue, ResultTable};
use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Summaries offered as downloads from the dashboard.
pub const DOWNLOAD_QUERIES: [AggregationQuery; 3] = [
    AggregationQuery::TopMakes,
    AggregationQuery::CountByYear,
    AggregationQuery::AvgRangeByMake,
];

const TABS: [(&str, &str); 5] = [
    ("overview", "Overview"),
    ("manufacturers", "Manufacturers"),
    ("geographic", "Geographic"),
    ("performance", "Performance"),
    ("detailed-analysis", "Detailed Analysis"),
];

const NO_RANGE_DATA: &str = "No valid range data available for histogram.";

const STYLE: &str = "body{font-family:sans-serif;margin:0;color:#222;background:#f7f7f9}
header{background:#1f3a5f;color:#fff;padding:16px 24px}
nav{background:#fff;border-bottom:1px solid #ddd;padding:8px 24px}
nav a{margin-right:16px;color:#1f3a5f;text-decoration:none;font-weight:bold}
main{padding:16px 24px}
section{background:#fff;border:1px solid #ddd;border-radius:6px;margin-bottom:24px;padding:16px}
.metrics{display:flex;gap:16px;flex-wrap:wrap}
.metric{flex:1;min-width:160px;border:1px solid #e0e0e0;border-radius:6px;padding:12px;text-align:center}
.metric-value{font-size:28px;font-weight:bold;color:#1f3a5f}
.placeholder,.no-data{color:#888;font-style:italic;padding:24px;text-align:center}
table{border-collapse:collapse;margin:8px 0 16px}
th,td{border:1px solid #ddd;padding:4px 8px;text-align:left}
th{background:#f0f0f4}
footer{color:#888;font-size:12px;padding:16px 24px}
";

/// A summary file linked from the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub label: String,
    /// Link target, relative to the dashboard file.
    pub href: String,
}

/// Everything the dashboard needs to render.
pub struct DashboardContext<'a> {
    pub store: &'a RecordStore,
    pub filters: &'a DashboardFilters,
    pub config: &'a DashboardConfig,
    pub chart_width: u32,
    pub chart_height: u32,
    pub downloads: Vec<Download>,
    pub generated_at: DateTime<Utc>,
}

/// Generate the complete dashboard page.
pub fn generate_dashboard(ctx: &DashboardContext<'_>) -> String {
    let mut output = String::new();

    output.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    output.push_str("<meta charset=\"utf-8\">\n");
    output.push_str("<title>Electric Vehicle Population Dashboard</title>\n");
    output.push_str(&format!("<style>\n{}</style>\n", STYLE));
    output.push_str("</head>\n<body>\n");
    output.push_str("<header><h1>Electric Vehicle Population Dashboard</h1></header>\n");

    output.push_str(&generate_navigation());
    output.push_str("<main>\n");
    output.push_str(&generate_filters_section(ctx.filters));
    output.push_str(&generate_overview_section(ctx));
    output.push_str(&generate_manufacturers_section(ctx));
    output.push_str(&generate_geographic_section(ctx));
    output.push_str(&generate_performance_section(ctx));
    output.push_str(&generate_detailed_section(ctx));
    output.push_str(&generate_downloads_section(&ctx.downloads));
    output.push_str("</main>\n");

    output.push_str(&generate_footer(ctx));
    output.push_str("</body>\n</html>\n");

    output
}

/// Export the download summaries as CSV into `dir`.
///
/// A query that fails is logged and left out of the returned links.
pub fn export_downloads(store: &RecordStore, dir: &Path, href_prefix: &str) -> Vec<Download> {
    let mut downloads = Vec::new();

    for query in DOWNLOAD_QUERIES {
        let exported = query
            .run(store)
            .and_then(|table| export_table(&table, dir, query.file_stem(), ExportFormat::Csv));

        match exported {
            Ok(path) => {
                debug!("Download ready: {}", path.display());
                downloads.push(Download {
                    label: query.title().to_string(),
                    href: format!("{}/{}.csv", href_prefix, query.file_stem()),
                });
            }
            Err(e) => warn!("Skipping download for {}: {}", query, e),
        }
    }

    downloads
}

/// Write the dashboard to `path`, creating parent directories.
pub fn write_dashboard(ctx: &DashboardContext<'_>, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| AnalyticsError::export(parent, e))?;
    }

    let content = generate_dashboard(ctx);
    std::fs::write(path, content).map_err(|e| AnalyticsError::export(path, e))?;
    info!("Dashboard written to {}", path.display());

    Ok(path.to_path_buf())
}

fn generate_navigation() -> String {
    let mut nav = String::from("<nav>\n");
    for (anchor, label) in TABS {
        nav.push_str(&format!("<a href=\"#{}\">{}</a>\n", anchor, label));
    }
    nav.push_str("<a href=\"#downloads\">Downloads</a>\n");
    nav.push_str("</nav>\n");
    nav
}

fn generate_filters_section(filters: &DashboardFilters) -> String {
    fn describe(values: Vec<String>) -> String {
        if values.is_empty() {
            "All".to_string()
        } else {
            escape(&values.join(", "))
        }
    }

    let mut section = String::new();
    section.push_str("<section id=\"filters\">\n<h2>Filters</h2>\n<ul>\n");
    section.push_str(&format!(
        "<li><strong>Model Years:</strong> {}</li>\n",
        describe(filters.years.iter().map(|y| y.to_string()).collect())
    ));
    section.push_str(&format!(
        "<li><strong>Manufacturers:</strong> {}</li>\n",
        describe(filters.makes.clone())
    ));
    section.push_str(&format!(
        "<li><strong>Counties:</strong> {}</li>\n",
        describe(filters.counties.clone())
    ));
    section.push_str("</ul>\n");
    if filters.is_unfiltered() {
        section.push_str("<p>No filters applied: showing every record.</p>\n");
    } else {
        section.push_str("<p>Filters apply to the summary metrics and the range histogram.</p>\n");
    }
    section.push_str("</section>\n");
    section
}

fn generate_overview_section(ctx: &DashboardContext<'_>) -> String {
    let filtered = ctx.filters.apply(ctx.store.records());
    let metrics = SummaryMetrics::from_records(&filtered);

    let mut section = String::new();
    section.push_str("<section id=\"overview\">\n<h2>Overview</h2>\n");
    section.push_str("<div class=\"metrics\">\n");
    section.push_str(&metric_card("Total EVs", &metrics.total_vehicles.to_string()));
    section.push_str(&metric_card("Unique Makes", &metrics.unique_makes.to_string()));
    section.push_str(&metric_card(
        "Average Range",
        &format!("{:.1} mi", metrics.average_range),
    ));
    section.push_str(&metric_card("Counties", &metrics.unique_counties.to_string()));
    section.push_str("</div>\n");

    section.push_str(&chart_widget(ctx, AggregationQuery::CountByYear, None));
    section.push_str(&chart_widget(ctx, AggregationQuery::TopMakes, None));
    section.push_str("</section>\n");
    section
}

fn generate_manufacturers_section(ctx: &DashboardContext<'_>) -> String {
    let mut section = String::new();
    section.push_str("<section id=\"manufacturers\">\n<h2>Manufacturers</h2>\n");
    section.push_str(&chart_widget(ctx, AggregationQuery::AvgRangeByMake, None));
    section.push_str(&chart_widget(ctx, AggregationQuery::TopModelsByRange, None));
    section.push_str("</section>\n");
    section
}

fn generate_geographic_section(ctx: &DashboardContext<'_>) -> String {
    let mut section = String::new();
    section.push_str("<section id=\"geographic\">\n<h2>Geographic</h2>\n");
    section.push_str(&chart_widget(
        ctx,
        AggregationQuery::CountByCounty,
        Some(ctx.config.county_chart_limit),
    ));
    section.push_str(&chart_widget(ctx, AggregationQuery::CountByCity, None));
    section.push_str("</section>\n");
    section
}

fn generate_performance_section(ctx: &DashboardContext<'_>) -> String {
    let mut section = String::new();
    section.push_str("<section id=\"performance\">\n<h2>Performance</h2>\n");
    section.push_str(&chart_widget(ctx, AggregationQuery::TypeCafvDistribution, None));

    section.push_str("<h3>Distribution of Electric Range</h3>\n");
    let filtered = ctx.filters.apply(ctx.store.records());
    let bins = range_histogram(&filtered, ctx.config.histogram_bins);
    if bins.is_empty() {
        section.push_str(&format!("<p class=\"no-data\">{}</p>\n", NO_RANGE_DATA));
    } else {
        let spec = ChartSpec::new(
            ChartKind::Bar,
            "Electric Range",
            "Count",
            "Distribution of Electric Range",
        )
        .with_axis_labels("Electric Range (miles)", "Number of Vehicles")
        .with_size(ctx.chart_width, ctx.chart_height);
        section.push_str(&chart::render_histogram_svg(&bins, &spec));
    }

    section.push_str("</section>\n");
    section
}

fn generate_detailed_section(ctx: &DashboardContext<'_>) -> String {
    let mut section = String::new();
    section.push_str("<section id=\"detailed-analysis\">\n<h2>Detailed Analysis</h2>\n");
    for query in [
        AggregationQuery::TopMakes,
        AggregationQuery::CountByYear,
        AggregationQuery::AvgRangeByMake,
        AggregationQuery::TopModelsByRange,
    ] {
        section.push_str(&widget(ctx.store, query, |table| {
            format!("<h3>{}</h3>\n{}", escape(query.title()), html_table(table))
        }));
    }
    section.push_str("</section>\n");
    section
}

fn generate_downloads_section(downloads: &[Download]) -> String {
    let mut section = String::new();
    section.push_str("<section id=\"downloads\">\n<h2>Downloads</h2>\n");

    if downloads.is_empty() {
        section.push_str("<p class=\"no-data\">No summaries available for download.</p>\n");
    } else {
        section.push_str("<ul>\n");
        for download in downloads {
            section.push_str(&format!(
                "<li><a href=\"{}\" download>{} (CSV)</a></li>\n",
                escape(&download.href),
                escape(&download.label)
            ));
        }
        section.push_str("</ul>\n");
    }

    section.push_str("</section>\n");
    section
}

fn generate_footer(ctx: &DashboardContext<'_>) -> String {
    format!(
        "<footer>Generated by ev-analytics v{} on {} from {} ({} records)</footer>\n",
        env!("CARGO_PKG_VERSION"),
        ctx.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        escape(&ctx.store.source().display().to_string()),
        ctx.store.len()
    )
}

fn metric_card(label: &str, value: &str) -> String {
    format!(
        "<div class=\"metric\"><div class=\"metric-label\">{}</div><div class=\"metric-value\">{}</div></div>\n",
        label, value
    )
}

/// Run `query` and render it, or a no-data or placeholder block.
fn widget(
    store: &RecordStore,
    query: AggregationQuery,
    render: impl FnOnce(&ResultTable) -> String,
) -> String {
    match query.run(store) {
        Ok(table) if table.is_empty() => format!(
            "<h3>{}</h3>\n<p class=\"no-data\">{}</p>\n",
            escape(query.title()),
            chart::NO_DATA
        ),
        Ok(table) => render(&table),
        Err(e) => {
            warn!("Dashboard widget {} failed: {}", query, e);
            format!(
                "<h3>{}</h3>\n<p class=\"placeholder\">This widget could not be loaded.</p>\n",
                escape(query.title())
            )
        }
    }
}

fn chart_widget(
    ctx: &DashboardContext<'_>,
    query: AggregationQuery,
    limit: Option<usize>,
) -> String {
    let spec = chart::chart_for(query).with_size(ctx.chart_width, ctx.chart_height);
    widget(ctx.store, query, |table| match limit {
        Some(n) => chart::render_svg(&table.head(n), &spec),
        None => chart::render_svg(table, &spec),
    })
}

/// Escape text for HTML element content and attribute values.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn format_cell(cell: &CellValue) -> String {
    match cell {
        CellValue::Real(v) => format!("{:.2}", v),
        other => escape(&other.to_string()),
    }
}

fn html_table(table: &ResultTable) -> String {
    let mut html = String::from("<table>\n<tr>");
    for column in &table.columns {
        html.push_str(&format!("<th>{}</th>", escape(column)));
    }
    html.push_str("</tr>\n");

    for row in &table.rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<td>{}</td>", format_cell(cell)));
        }
        html.push_str("</tr>\n");
    }

    html.push_str("</table>\n");
    html
}
