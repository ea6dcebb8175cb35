//! SVG chart rendering.
//!
//! Charts read their x/y columns from a [`ResultTable`] and plot rows in the
//! order the table gives them. An empty table renders a "No data available"
//! chart instead of empty axes. Drawing goes through plotters' SVG backend
//! into a `String`, so the dashboard can inline the same markup that is
//! written to disk.

use crate::analysis::{AggregationQuery, HistogramBin};
use crate::error::{AnalyticsError, Result};
use crate::models::ResultTable;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const PALETTE: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

const FONT: &str = "sans-serif";
const CAPTION_SIZE: u32 = 20;
const LABEL_SIZE: u32 = 11;
const X_LABEL_AREA: u32 = 110;
const Y_LABEL_AREA: u32 = 60;

/// Marker text used for empty tables.
pub const NO_DATA: &str = "No data available";

type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    GroupedBar,
}

/// What to plot and how.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub x: String,
    pub y: String,
    /// Colour series for grouped bars and scatter plots.
    pub group: Option<String>,
    /// Point label for scatter plots.
    pub label: Option<String>,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub width: u32,
    pub height: u32,
}

impl ChartSpec {
    pub fn new(kind: ChartKind, x: &str, y: &str, title: &str) -> Self {
        Self {
            kind,
            x: x.to_string(),
            y: y.to_string(),
            group: None,
            label: None,
            title: title.to_string(),
            x_label: x.to_string(),
            y_label: y.to_string(),
            width: 800,
            height: 450,
        }
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_axis_labels(mut self, x_label: &str, y_label: &str) -> Self {
        self.x_label = x_label.to_string();
        self.y_label = y_label.to_string();
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// The chart each aggregation query is drawn with.
pub fn chart_for(query: AggregationQuery) -> ChartSpec {
    let title = query.title();
    match query {
        AggregationQuery::TopMakes => ChartSpec::new(ChartKind::Bar, "Make", "total", title)
            .with_axis_labels("Manufacturer", "Number of EVs"),
        AggregationQuery::CountByYear => {
            ChartSpec::new(ChartKind::Line, "Year", "EV_Count", title)
                .with_axis_labels("Year", "Number of EVs")
        }
        AggregationQuery::CountByCounty => {
            ChartSpec::new(ChartKind::Bar, "County", "EV_Count", title)
                .with_axis_labels("County", "Number of EVs")
        }
        AggregationQuery::AvgRangeByMake => {
            ChartSpec::new(ChartKind::Bar, "Make", "Avg_Range", title)
                .with_axis_labels("Manufacturer", "Average Range (miles)")
        }
        AggregationQuery::CountByCity => ChartSpec::new(ChartKind::Bar, "City", "Count", title)
            .with_axis_labels("City", "Number of EVs"),
        AggregationQuery::TypeCafvDistribution => ChartSpec::new(
            ChartKind::GroupedBar,
            "Electric Vehicle Type",
            "Count",
            title,
        )
        .with_group("Clean Alternative Fuel Vehicle (CAFV) Eligibility")
        .with_axis_labels("Electric Vehicle Type", "Number of Vehicles"),
        AggregationQuery::TopModelsByRange => {
            ChartSpec::new(ChartKind::Scatter, "Avg_Range", "Model_Count", title)
                .with_group("Make")
                .with_label("Model")
                .with_axis_labels("Average Range (miles)", "Number of Vehicles")
        }
    }
}

/// Render `table` to an SVG file at `dest`, creating parent directories.
pub fn render_chart(table: &ResultTable, spec: &ChartSpec, dest: &Path) -> Result<PathBuf> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| AnalyticsError::export(parent, e))?;
    }

    let svg = render_svg(table, spec);
    std::fs::write(dest, svg).map_err(|e| AnalyticsError::export(dest, e))?;
    debug!("Rendered chart '{}' to {}", spec.title, dest.display());

    Ok(dest.to_path_buf())
}

/// Render `table` as an SVG document.
pub fn render_svg(table: &ResultTable, spec: &ChartSpec) -> String {
    if table.is_empty() {
        return placeholder_svg(spec, NO_DATA);
    }

    let mut required = vec![spec.x.as_str(), spec.y.as_str()];
    required.extend(spec.group.as_deref());
    required.extend(spec.label.as_deref());
    if let Some(missing) = required.iter().find(|c| table.column_index(c).is_none()) {
        return placeholder_svg(spec, &format!("Column {} not found", missing));
    }

    let labels = text_values(table, &spec.x);
    let values = numbers(table, &spec.y);
    draw_svg(spec, |root| match spec.kind {
        ChartKind::Bar => draw_bars(root, spec, &labels, &values),
        ChartKind::Line => draw_line(root, spec, &labels, &values),
        ChartKind::Scatter => draw_scatter(root, spec, table),
        ChartKind::GroupedBar => draw_grouped_bars(root, spec, table),
    })
}

/// Render histogram bins as an SVG bar chart over the value axis.
pub fn render_histogram_svg(bins: &[HistogramBin], spec: &ChartSpec) -> String {
    if bins.is_empty() {
        return placeholder_svg(spec, NO_DATA);
    }

    draw_svg(spec, |root| draw_histogram(root, spec, bins))
}

/// Run `draw` against an SVG backend writing into a string.
///
/// A drawing error is logged and replaced by a placeholder chart.
fn draw_svg<F>(spec: &ChartSpec, draw: F) -> String
where
    F: FnOnce(&Area<'_>) -> anyhow::Result<()>,
{
    let mut svg = String::new();
    let drawn = {
        let root =
            SVGBackend::with_string(&mut svg, (spec.width, spec.height)).into_drawing_area();
        draw(&root)
    };

    match drawn {
        Ok(()) => svg,
        Err(e) => {
            warn!("Failed to draw chart '{}': {:#}", spec.title, e);
            placeholder_svg(spec, "Chart could not be rendered")
        }
    }
}

fn placeholder_svg(spec: &ChartSpec, message: &str) -> String {
    let mut svg = String::new();
    let drawn = {
        let root =
            SVGBackend::with_string(&mut svg, (spec.width, spec.height)).into_drawing_area();
        draw_message(&root, spec, message)
    };
    if let Err(e) = drawn {
        warn!("Failed to draw placeholder for '{}': {:#}", spec.title, e);
    }
    svg
}

fn draw_message(root: &Area<'_>, spec: &ChartSpec, message: &str) -> anyhow::Result<()> {
    root.fill(&WHITE)?;
    let body = root.titled(&spec.title, (FONT, CAPTION_SIZE))?;
    let (w, h) = body.dim_in_pixel();

    let style = (FONT, 16)
        .into_font()
        .color(&RGBColor(102, 102, 102))
        .pos(Pos::new(HPos::Center, VPos::Center));
    body.draw(&Text::new(
        message.to_string(),
        (w as i32 / 2, h as i32 / 2),
        style,
    ))?;

    root.present()?;
    Ok(())
}

fn color(i: usize) -> RGBColor {
    PALETTE[i % PALETTE.len()]
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{:.0}", v)
    } else {
        format!("{:.1}", v)
    }
}

/// Upper bound of the y axis, padded so the tallest mark has headroom.
fn y_max(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.fold(0.0_f64, f64::max);
    if max <= 0.0 {
        1.0
    } else {
        max * 1.1
    }
}

fn text_values(table: &ResultTable, column: &str) -> Vec<String> {
    table
        .column(column)
        .unwrap_or_default()
        .into_iter()
        .map(|c| c.to_string())
        .collect()
}

fn numbers(table: &ResultTable, column: &str) -> Vec<f64> {
    table
        .column(column)
        .unwrap_or_default()
        .into_iter()
        .map(|c| c.as_f64().unwrap_or(0.0))
        .collect()
}

/// Distinct values in order of first appearance.
fn distinct(values: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for value in values {
        if !seen.contains(value) {
            seen.push(value.clone());
        }
    }
    seen
}

/// Tick label for a category axis: the category at an integral position.
fn category_label(categories: &[String], x: f64) -> String {
    let idx = x.round();
    if (x - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    categories.get(idx as usize).cloned().unwrap_or_default()
}

fn category_chart<'a, 'b>(
    root: &'a Area<'b>,
    spec: &ChartSpec,
    categories: &[String],
    top: f64,
) -> anyhow::Result<ChartContext<'a, SVGBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>>
{
    root.fill(&WHITE)?;
    let n = categories.len();

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, (FONT, CAPTION_SIZE))
        .margin(10)
        .x_label_area_size(X_LABEL_AREA)
        .y_label_area_size(Y_LABEL_AREA)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), 0f64..top)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&|x| category_label(categories, *x))
        .x_label_style(
            (FONT, LABEL_SIZE)
                .into_font()
                .transform(FontTransform::Rotate90),
        )
        .y_label_formatter(&|y| format_value(y.round()))
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .draw()?;

    Ok(chart)
}

fn draw_bars(
    root: &Area<'_>,
    spec: &ChartSpec,
    labels: &[String],
    values: &[f64],
) -> anyhow::Result<()> {
    let mut chart = category_chart(root, spec, labels, y_max(values.iter().copied()))?;

    chart.draw_series(values.iter().enumerate().map(|(i, v)| {
        let x = i as f64;
        Rectangle::new([(x - 0.4, 0.0), (x + 0.4, *v)], color(0).filled())
    }))?;

    root.present()?;
    Ok(())
}

fn draw_line(
    root: &Area<'_>,
    spec: &ChartSpec,
    labels: &[String],
    values: &[f64],
) -> anyhow::Result<()> {
    let mut chart = category_chart(root, spec, labels, y_max(values.iter().copied()))?;
    let points: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .map(|(i, v)| (i as f64, *v))
        .collect();

    chart.draw_series(LineSeries::new(points.clone(), color(0).stroke_width(2)))?;
    chart.draw_series(
        points
            .into_iter()
            .map(|p| Circle::new(p, 4, color(0).filled())),
    )?;

    root.present()?;
    Ok(())
}

fn draw_grouped_bars(root: &Area<'_>, spec: &ChartSpec, table: &ResultTable) -> anyhow::Result<()> {
    let group_col = spec.group.as_deref().unwrap_or_default();
    let xs = text_values(table, &spec.x);
    let gs = text_values(table, group_col);
    let values = numbers(table, &spec.y);

    let categories = distinct(&xs);
    let groups = distinct(&gs);
    let bar_width = 0.8 / groups.len().max(1) as f64;

    let mut chart = category_chart(root, spec, &categories, y_max(values.iter().copied()))?;

    for (gi, group) in groups.iter().enumerate() {
        let fill = color(gi);
        let bars = xs
            .iter()
            .zip(&gs)
            .zip(&values)
            .filter(|((_, g), _)| *g == group)
            .map(|((x, _), v)| {
                let ci = categories.iter().position(|c| c == x).unwrap_or_default();
                let left = ci as f64 - 0.4 + bar_width * gi as f64;
                Rectangle::new([(left, 0.0), (left + bar_width, *v)], fill.filled())
            });

        chart
            .draw_series(bars)?
            .label(group.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], fill.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .label_font((FONT, 10))
        .draw()?;

    root.present()?;
    Ok(())
}

fn draw_scatter(root: &Area<'_>, spec: &ChartSpec, table: &ResultTable) -> anyhow::Result<()> {
    let xs = numbers(table, &spec.x);
    let ys = numbers(table, &spec.y);
    let gs = spec
        .group
        .as_deref()
        .map(|g| text_values(table, g))
        .unwrap_or_else(|| vec![String::new(); xs.len()]);
    let labels = spec
        .label
        .as_deref()
        .map(|l| text_values(table, l))
        .unwrap_or_else(|| vec![String::new(); xs.len()]);
    let groups = distinct(&gs);

    let x_min = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let x_max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let x_span = if x_max > x_min { x_max - x_min } else { 1.0 };
    let pad = x_span * 0.1;

    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, (FONT, CAPTION_SIZE))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(Y_LABEL_AREA)
        .build_cartesian_2d(
            (x_min - pad)..(x_max + pad),
            0f64..y_max(ys.iter().copied()),
        )?;

    chart
        .configure_mesh()
        .x_label_formatter(&|x| format_value(x.round()))
        .y_label_formatter(&|y| format_value(y.round()))
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .draw()?;

    for (gi, group) in groups.iter().enumerate() {
        let fill = color(gi);
        let points = xs
            .iter()
            .zip(&ys)
            .zip(&gs)
            .zip(&labels)
            .filter(|(((_, _), g), _)| *g == group)
            .map(|(((x, y), _), label)| {
                // Bubble size grows with range
                let radius = (4.0 + 8.0 * (x - x_min) / x_span).round() as i32;
                EmptyElement::at((*x, *y))
                    + Circle::new((0, 0), radius, fill.mix(0.7).filled())
                    + Text::new(label.clone(), (radius + 2, -radius - 2), (FONT, 10).into_font())
            });

        let series = chart.draw_series(points)?;
        if !group.is_empty() {
            series
                .label(group.as_str())
                .legend(move |(x, y)| Circle::new((x + 5, y), 4, fill.filled()));
        }
    }

    if groups.iter().any(|g| !g.is_empty()) {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .label_font((FONT, 10))
            .draw()?;
    }

    root.present()?;
    Ok(())
}

fn draw_histogram(root: &Area<'_>, spec: &ChartSpec, bins: &[HistogramBin]) -> anyhow::Result<()> {
    let lower = bins.iter().map(|b| b.lower).fold(f64::INFINITY, f64::min);
    let upper = bins.iter().map(|b| b.upper).fold(f64::NEG_INFINITY, f64::max);
    // A single value still needs a visible bar
    let (lower, upper) = if upper > lower {
        (lower, upper)
    } else {
        (lower - 0.5, upper + 0.5)
    };
    let top = y_max(bins.iter().map(|b| b.count as f64));

    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, (FONT, CAPTION_SIZE))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(Y_LABEL_AREA)
        .build_cartesian_2d(lower..upper, 0f64..top)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_label_formatter(&|x| format_value(x.round()))
        .y_label_formatter(&|y| format_value(y.round()))
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .draw()?;

    chart.draw_series(bins.iter().map(|b| {
        let (left, right) = if b.upper > b.lower {
            (b.lower, b.upper)
        } else {
            (lower, upper)
        };
        Rectangle::new([(left, 0.0), (right, b.count as f64)], color(0).filled())
    }))?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;
    use tempfile::TempDir;

    fn makes() -> ResultTable {
        ResultTable {
            columns: vec!["Make".to_string(), "total".to_string()],
            rows: vec![
                vec![CellValue::Text("TESLA".into()), CellValue::Integer(7)],
                vec![CellValue::Text("NISSAN".into()), CellValue::Integer(5)],
                vec![CellValue::Text("KIA".into()), CellValue::Integer(1)],
            ],
        }
    }

    #[test]
    fn test_bar_chart_keeps_row_order() {
        let spec = chart_for(AggregationQuery::TopMakes);
        let svg = render_svg(&makes(), &spec);

        assert!(svg.contains("<svg"));
        assert!(svg.contains("Top 5 EV Manufacturers"));
        assert!(!svg.contains(NO_DATA));

        let tesla = svg.find("TESLA").unwrap();
        let nissan = svg.find("NISSAN").unwrap();
        let kia = svg.find("KIA").unwrap();
        assert!(tesla < nissan && nissan < kia);
    }

    #[test]
    fn test_category_labels_only_on_integral_ticks() {
        let labels = vec!["A".to_string(), "B".to_string()];
        assert_eq!(category_label(&labels, 0.0), "A");
        assert_eq!(category_label(&labels, 1.0), "B");
        assert_eq!(category_label(&labels, 0.5), "");
        assert_eq!(category_label(&labels, 2.0), "");
        assert_eq!(category_label(&labels, -1.0), "");
    }

    #[test]
    fn test_empty_table_renders_no_data() {
        let empty = ResultTable::new(vec!["City".to_string(), "Count".to_string()]);
        let svg = render_svg(&empty, &chart_for(AggregationQuery::CountByCity));
        assert!(svg.contains("<svg"));
        assert!(svg.contains(NO_DATA));
    }

    #[test]
    fn test_missing_column_renders_placeholder() {
        let spec = ChartSpec::new(ChartKind::Bar, "County", "EV_Count", "Counties");
        let svg = render_svg(&makes(), &spec);
        assert!(svg.contains("Column County not found"));
    }

    #[test]
    fn test_line_chart() {
        let table = ResultTable {
            columns: vec!["Year".to_string(), "EV_Count".to_string()],
            rows: vec![
                vec![CellValue::Integer(2018), CellValue::Integer(2)],
                vec![CellValue::Integer(2019), CellValue::Integer(4)],
                vec![CellValue::Integer(2020), CellValue::Integer(3)],
            ],
        };
        let svg = render_svg(&table, &chart_for(AggregationQuery::CountByYear));
        assert!(svg.contains("<polyline"));
        assert!(svg.contains("<circle"));
        assert!(svg.find("2018").unwrap() < svg.find("2020").unwrap());
    }

    #[test]
    fn test_grouped_bar_legend() {
        let table = ResultTable {
            columns: vec![
                "Electric Vehicle Type".to_string(),
                "Clean Alternative Fuel Vehicle (CAFV) Eligibility".to_string(),
                "Count".to_string(),
                "Percentage".to_string(),
            ],
            rows: vec![
                vec![
                    CellValue::Text("BEV".into()),
                    CellValue::Text("Eligible".into()),
                    CellValue::Integer(3),
                    CellValue::Real(60.0),
                ],
                vec![
                    CellValue::Text("PHEV".into()),
                    CellValue::Text("Eligible".into()),
                    CellValue::Integer(1),
                    CellValue::Real(20.0),
                ],
                vec![
                    CellValue::Text("PHEV".into()),
                    CellValue::Text("Not eligible".into()),
                    CellValue::Integer(1),
                    CellValue::Real(20.0),
                ],
            ],
        };
        let svg = render_svg(&table, &chart_for(AggregationQuery::TypeCafvDistribution));
        assert!(svg.contains("Not eligible"));
        assert!(svg.contains("BEV"));
        assert!(svg.contains("PHEV"));
    }

    #[test]
    fn test_scatter_chart_labels_points() {
        let table = ResultTable {
            columns: vec![
                "Make".to_string(),
                "Model".to_string(),
                "Avg_Range".to_string(),
                "Model_Count".to_string(),
            ],
            rows: vec![
                vec![
                    CellValue::Text("TESLA".into()),
                    CellValue::Text("MODEL Y".into()),
                    CellValue::Real(291.0),
                    CellValue::Integer(1),
                ],
                vec![
                    CellValue::Text("NISSAN".into()),
                    CellValue::Text("LEAF".into()),
                    CellValue::Real(115.0),
                    CellValue::Integer(4),
                ],
            ],
        };
        let svg = render_svg(&table, &chart_for(AggregationQuery::TopModelsByRange));
        assert!(svg.contains("<circle"));
        assert!(svg.contains("MODEL Y"));
        assert!(svg.contains("LEAF"));
        assert!(svg.contains("TESLA"));
    }

    #[test]
    fn test_histogram_svg() {
        let bins = vec![
            HistogramBin { lower: 0.0, upper: 100.0, count: 2 },
            HistogramBin { lower: 100.0, upper: 200.0, count: 5 },
        ];
        let spec = ChartSpec::new(ChartKind::Bar, "range", "count", "Distribution of Electric Range");
        let svg = render_histogram_svg(&bins, &spec);
        assert!(svg.contains("Distribution of Electric Range"));
        assert!(!svg.contains(NO_DATA));

        let single = vec![HistogramBin { lower: 42.0, upper: 42.0, count: 3 }];
        assert!(!render_histogram_svg(&single, &spec).contains(NO_DATA));

        assert!(render_histogram_svg(&[], &spec).contains(NO_DATA));
    }

    #[test]
    fn test_render_chart_writes_file() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("charts").join("top_ev_makes.svg");

        let path = render_chart(&makes(), &chart_for(AggregationQuery::TopMakes), &dest).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("<svg"));
        assert!(content.trim_end().ends_with("</svg>"));
    }
}
