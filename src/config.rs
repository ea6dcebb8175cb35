//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.ev-analytics.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".ev-analytics.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Dataset and store settings.
    #[serde(default)]
    pub data: DataConfig,

    /// Summary and chart export settings.
    #[serde(default)]
    pub export: ExportConfig,

    /// Dashboard settings.
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory that receives summaries, charts and the dashboard.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Show a spinner while the dataset loads.
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            show_progress: true,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

/// Dataset location and backing store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// CSV dataset path.
    #[serde(default = "default_source")]
    pub source: PathBuf,

    /// SQLite file path. When absent a temporary database is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            database: None,
        }
    }
}

fn default_source() -> PathBuf {
    PathBuf::from("data/ev_data.csv")
}

/// Export format for query summaries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Comma-separated values (default)
    #[default]
    Csv,
    /// Pretty-printed JSON
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// Summary and chart export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Summary file format.
    #[serde(default)]
    pub format: ExportFormat,

    /// Sub-directory of the output directory for summaries.
    #[serde(default = "default_summaries_dir")]
    pub summaries_dir: String,

    /// Render an SVG chart for each query.
    #[serde(default = "default_true")]
    pub charts: bool,

    /// Chart width in pixels.
    #[serde(default = "default_chart_width")]
    pub chart_width: u32,

    /// Chart height in pixels.
    #[serde(default = "default_chart_height")]
    pub chart_height: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Csv,
            summaries_dir: default_summaries_dir(),
            charts: true,
            chart_width: default_chart_width(),
            chart_height: default_chart_height(),
        }
    }
}

fn default_summaries_dir() -> String {
    "summaries".to_string()
}

fn default_chart_width() -> u32 {
    800
}

fn default_chart_height() -> u32 {
    450
}

/// Dashboard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Generate the HTML dashboard.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Dashboard file name inside the output directory.
    #[serde(default = "default_dashboard_file")]
    pub file_name: String,

    /// Number of counties shown in the county chart.
    #[serde(default = "default_county_chart_limit")]
    pub county_chart_limit: usize,

    /// Number of bins in the electric range histogram.
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,

    /// Most recent years preselected when no year filter is given.
    #[serde(default = "default_year_count")]
    pub default_year_count: usize,

    /// Makes preselected when no make filter is given.
    #[serde(default = "default_make_count")]
    pub default_make_count: usize,

    /// Counties preselected when no county filter is given.
    #[serde(default = "default_county_count")]
    pub default_county_count: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file_name: default_dashboard_file(),
            county_chart_limit: default_county_chart_limit(),
            histogram_bins: default_histogram_bins(),
            default_year_count: default_year_count(),
            default_make_count: default_make_count(),
            default_county_count: default_county_count(),
        }
    }
}

fn default_dashboard_file() -> String {
    "dashboard.html".to_string()
}

fn default_county_chart_limit() -> usize {
    20
}

fn default_histogram_bins() -> usize {
    30
}

fn default_year_count() -> usize {
    5
}

fn default_make_count() -> usize {
    10
}

fn default_county_count() -> usize {
    5
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values the user actually passed override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref data) = args.data {
            self.data.source = data.clone();
        }
        if let Some(ref db) = args.db {
            self.data.database = Some(db.clone());
        }
        if let Some(ref output_dir) = args.output_dir {
            self.general.output_dir = output_dir.clone();
        }
        if let Some(format) = args.format {
            self.export.format = format;
        }

        // Flags always override
        if args.no_charts {
            self.export.charts = false;
        }
        if args.no_dashboard {
            self.dashboard.enabled = false;
        }
        if args.quiet {
            self.general.show_progress = false;
        }
    }

    /// Directory that receives the summary files.
    pub fn summaries_path(&self) -> PathBuf {
        self.general.output_dir.join(&self.export.summaries_dir)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
