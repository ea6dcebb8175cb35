//! EV Analytics - aggregation reports over EV registration data
//!
//! A CLI tool that loads an electric-vehicle registration CSV into SQLite,
//! runs a fixed set of aggregation queries, and writes summaries, SVG charts
//! and a static HTML dashboard.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, dataset load, output directory, etc.)
//!   2 - One or more queries failed (the others were still exported)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;
mod session;
mod store;

use analysis::{AggregationQuery, DashboardFilters, FilterOptions};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use models::RunMetadata;
use report::DashboardContext;
use session::Session;
use std::path::Path;
use std::time::Instant;
use store::RecordStore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("EV Analytics v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .ev-analytics.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the data source, output directory, and dashboard.");
    Ok(())
}

/// Initialize logging from RUST_LOG or the verbosity flags.
fn init_logging(args: &Args) {
    let filter = args.log_filter(std::env::var("RUST_LOG").ok().as_deref());

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete analysis workflow. Returns exit code (0 or 2).
fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();
    let generated_at = Utc::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Step 1: Load the dataset once for the session
    println!("📥 Loading dataset: {}", config.data.source.display());
    let mut session = Session::new(&config.data.source, config.data.database.clone())
        .with_progress(config.general.show_progress);
    let store = session.store().context("Failed to load dataset")?;
    debug!("SQLite store at {}", store.database().path().display());
    if store.is_empty() {
        warn!("Dataset {} has no records", store.source().display());
    }

    let queries = args.selected_queries();

    // Handle --dry-run: report what would be produced and exit
    if args.dry_run {
        return handle_dry_run(store, &queries, &config);
    }

    // Step 2: Run each query and export its summary and chart
    println!("\n🔬 Running {} aggregation queries...", queries.len());
    let summaries_dir = config.summaries_path();
    let charts_dir = config.general.output_dir.join("charts");
    let mut failed = Vec::new();

    for query in &queries {
        match run_query(store, *query, &config, &summaries_dir, &charts_dir) {
            Ok(rows) => println!("   ✔ {} ({} rows)", query.title(), rows),
            Err(e) => {
                warn!("Query {} failed: {:#}", query, e);
                println!("   ✘ {} (failed)", query.title());
                failed.push(*query);
            }
        }
    }

    // Step 3: Dashboard
    if config.dashboard.enabled {
        println!("\n📝 Generating dashboard...");
        let filters = dashboard_filters(&args, store, &config);
        debug!("Dashboard filters: {:?}", filters);

        let downloads =
            report::export_downloads(store, &summaries_dir, &config.export.summaries_dir);
        let ctx = DashboardContext {
            store,
            filters: &filters,
            config: &config.dashboard,
            chart_width: config.export.chart_width,
            chart_height: config.export.chart_height,
            downloads,
            generated_at,
        };

        let path = config.general.output_dir.join(&config.dashboard.file_name);
        report::write_dashboard(&ctx, &path).context("Failed to write dashboard")?;
        println!("   Dashboard: {}", path.display());
    }

    // Step 4: Run metadata
    let duration = start_time.elapsed().as_secs_f64();
    let metadata = RunMetadata {
        source: store.source().display().to_string(),
        generated_at,
        record_count: store.len(),
        queries_succeeded: queries.len() - failed.len(),
        queries_failed: failed.len(),
        duration_seconds: duration,
    };
    write_run_summary(&metadata, &config.general.output_dir)?;

    // Print summary
    println!("\n📊 Run Summary:");
    println!("   Records: {}", metadata.record_count);
    println!(
        "   Queries: {} succeeded, {} failed",
        metadata.queries_succeeded, metadata.queries_failed
    );
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Analysis complete! Output saved to: {}",
        config.general.output_dir.display()
    );

    if !failed.is_empty() {
        let names: Vec<String> = failed.iter().map(|q| q.to_string()).collect();
        eprintln!(
            "\n⛔ Some queries failed ({}). Failing (exit code 2).",
            names.join(", ")
        );
        return Ok(2);
    }

    Ok(0)
}

/// Run one query, export its summary and (optionally) its chart.
fn run_query(
    store: &RecordStore,
    query: AggregationQuery,
    config: &Config,
    summaries_dir: &Path,
    charts_dir: &Path,
) -> Result<usize> {
    let table = query.run(store)?;
    if table.is_empty() {
        info!("Query {} returned no rows", query);
    }

    report::export_table(&table, summaries_dir, query.file_stem(), config.export.format)?;

    if config.export.charts {
        let spec = report::chart_for(query)
            .with_size(config.export.chart_width, config.export.chart_height);
        let charted = match query {
            AggregationQuery::CountByCounty => table.head(config.dashboard.county_chart_limit),
            _ => table.clone(),
        };
        let dest = charts_dir.join(format!("{}.svg", query.file_stem()));
        report::render_chart(&charted, &spec, &dest)?;
    }

    Ok(table.len())
}

/// Filters for the dashboard: the command line selection, or the defaults.
fn dashboard_filters(args: &Args, store: &RecordStore, config: &Config) -> DashboardFilters {
    if args.has_filters() {
        DashboardFilters {
            years: args.years.clone().unwrap_or_default(),
            makes: args.makes.clone().unwrap_or_default(),
            counties: args.counties.clone().unwrap_or_default(),
        }
    } else {
        let options = FilterOptions::from_records(store.records());
        DashboardFilters::default_selection(&options, &config.dashboard)
    }
}

/// Handle --dry-run: print what would be produced, write nothing.
fn handle_dry_run(
    store: &RecordStore,
    queries: &[AggregationQuery],
    config: &Config,
) -> Result<i32> {
    println!("\n🔍 Dry run: dataset loaded, no files will be written.\n");
    println!("   Records: {}", store.len());
    println!("   Queries that would run:\n");

    let summaries_dir = config.summaries_path();
    for query in queries {
        println!(
            "     📄 {} -> {}",
            query.title(),
            summaries_dir
                .join(format!("{}.{}", query.file_stem(), config.export.format.extension()))
                .display()
        );
    }

    if config.dashboard.enabled {
        println!(
            "\n   Dashboard: {}",
            config
                .general
                .output_dir
                .join(&config.dashboard.file_name)
                .display()
        );
    }

    println!("\n✅ Dry run complete.");
    Ok(0)
}

/// Write run metadata as JSON next to the other outputs.
fn write_run_summary(metadata: &RunMetadata, output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let path = output_dir.join("run_summary.json");
    let content = serde_json::to_string_pretty(metadata)?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write run summary to {}", path.display()))?;

    debug!("Run summary written to {}", path.display());
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
