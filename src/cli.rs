//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::AggregationQuery;
use crate::config::ExportFormat;
use clap::Parser;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// EV Analytics - aggregation reports over EV registration data
///
/// Loads an electric-vehicle registration CSV into SQLite, runs the
/// aggregation queries, and writes summaries, SVG charts and an HTML
/// dashboard.
///
/// Examples:
///   ev-analytics --data data/ev_data.csv
///   ev-analytics --data data/ev_data.csv --format json --no-charts
///   ev-analytics --only top-makes,count-by-year --no-dashboard
///   ev-analytics --years 2021,2022 --makes TESLA,NISSAN
///   ev-analytics --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to the EV registration CSV
    ///
    /// Defaults to data/ev_data.csv or the [data] section of the config file.
    #[arg(short, long, value_name = "FILE", env = "EV_ANALYTICS_DATA")]
    pub data: Option<PathBuf>,

    /// SQLite database file to materialize the dataset into
    ///
    /// If not specified, a temporary database is used for the run.
    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// Directory for summaries, charts and the dashboard
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Summary export format (csv, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<ExportFormat>,

    /// Run only these queries (comma-separated)
    ///
    /// Example: --only top-makes,count-by-county
    #[arg(long, value_name = "QUERIES", value_delimiter = ',')]
    pub only: Option<Vec<AggregationQuery>>,

    /// Skip SVG chart rendering
    #[arg(long)]
    pub no_charts: bool,

    /// Skip HTML dashboard generation
    #[arg(long)]
    pub no_dashboard: bool,

    /// Dashboard year filter (comma-separated)
    #[arg(long, value_name = "YEARS", value_delimiter = ',')]
    pub years: Option<Vec<i64>>,

    /// Dashboard make filter (comma-separated)
    #[arg(long, value_name = "MAKES", value_delimiter = ',')]
    pub makes: Option<Vec<String>>,

    /// Dashboard county filter (comma-separated)
    #[arg(long, value_name = "COUNTIES", value_delimiter = ',')]
    pub counties: Option<Vec<String>>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .ev-analytics.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: load the dataset and print what would be produced
    ///
    /// Nothing is written to the output directory.
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .ev-analytics.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref only) = self.only {
            if only.is_empty() {
                return Err("--only needs at least one query name".to_string());
            }
        }

        // Validate data file if provided
        if let Some(ref data) = self.data {
            if data.is_dir() {
                return Err(format!("Data path is a directory: {}", data.display()));
            }
        }

        if let Some(ref output_dir) = self.output_dir {
            if output_dir.is_file() {
                return Err(format!(
                    "Output path is a file, not a directory: {}",
                    output_dir.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Log filter: a valid `RUST_LOG` directive wins over the verbosity flags.
    pub fn log_filter(&self, rust_log: Option<&str>) -> EnvFilter {
        rust_log
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| EnvFilter::try_new(s).ok())
            .unwrap_or_else(|| {
                EnvFilter::default().add_directive(LevelFilter::from_level(self.log_level()).into())
            })
    }

    /// Returns the queries to run, in their canonical order.
    pub fn selected_queries(&self) -> Vec<AggregationQuery> {
        match self.only {
            Some(ref only) => AggregationQuery::ALL
                .into_iter()
                .filter(|q| only.contains(q))
                .collect(),
            None => AggregationQuery::ALL.to_vec(),
        }
    }

    /// Returns true if any dashboard filter was given on the command line.
    pub fn has_filters(&self) -> bool {
        self.years.is_some() || self.makes.is_some() || self.counties.is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn make_args() -> Args {
        Args {
            data: None,
            db: None,
            output_dir: None,
            format: None,
            only: None,
            no_charts: false,
            no_dashboard: false,
            years: None,
            makes: None,
            counties: None,
            config: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "ev-analytics",
            "--data",
            "ev.csv",
            "--format",
            "json",
            "--only",
            "top-makes,count-by-county",
            "--years",
            "2021,2022",
            "--makes",
            "TESLA,KIA",
        ])
        .unwrap();

        assert_eq!(args.data, Some(PathBuf::from("ev.csv")));
        assert_eq!(args.format, Some(ExportFormat::Json));
        assert_eq!(
            args.only,
            Some(vec![
                AggregationQuery::TopMakes,
                AggregationQuery::CountByCounty
            ])
        );
        assert_eq!(args.years, Some(vec![2021, 2022]));
        assert_eq!(args.makes, Some(vec!["TESLA".to_string(), "KIA".to_string()]));
        assert!(args.has_filters());
    }

    #[test]
    fn test_unknown_query_name_rejected() {
        let result = Args::try_parse_from(["ev-analytics", "--only", "everything"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_selected_queries_keep_canonical_order() {
        let mut args = make_args();
        assert_eq!(args.selected_queries().len(), 7);

        args.only = Some(vec![
            AggregationQuery::TopModelsByRange,
            AggregationQuery::TopMakes,
        ]);
        assert_eq!(
            args.selected_queries(),
            vec![
                AggregationQuery::TopMakes,
                AggregationQuery::TopModelsByRange
            ]
        );
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_data_is_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut args = make_args();
        args.data = Some(dir.path().to_path_buf());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_log_filter() {
        let mut args = make_args();
        args.verbose = true;
        let filter = args.log_filter(None).to_string().to_lowercase();
        assert!(filter.contains("debug"));

        let filter = args
            .log_filter(Some("ev_analytics=trace"))
            .to_string()
            .to_lowercase();
        assert!(filter.contains("ev_analytics=trace"));

        // Blank or unparsable values fall back to the flags
        args.verbose = false;
        args.quiet = true;
        assert!(args.log_filter(Some("  ")).to_string().to_lowercase().contains("error"));
        assert!(args
            .log_filter(Some("ev_analytics=loud"))
            .to_string()
            .to_lowercase()
            .contains("error"));
    }
}
