//! CLI entry point for the ETL pipeline.

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use lex_etl::reporting::render_summary;
use lex_etl::{
    AnalysisReport, CategoricalImputation, DataAnalyzer, DatasetSource, EtlConfig, Fetcher,
    NumericImputation, Pipeline, RunSummary, SqliteStore,
};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// CLI-compatible numeric imputation strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliNumericImputation {
    /// Use the median of non-null values
    Median,
    /// Use the mean of non-null values
    Mean,
    /// Use zero as the fill value
    Zero,
}

impl From<CliNumericImputation> for NumericImputation {
    fn from(cli: CliNumericImputation) -> Self {
        match cli {
            CliNumericImputation::Median => NumericImputation::Median,
            CliNumericImputation::Mean => NumericImputation::Mean,
            CliNumericImputation::Zero => NumericImputation::Zero,
        }
    }
}

/// CLI-compatible categorical imputation strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliCategoricalImputation {
    /// Use the most frequent value (mode)
    Mode,
    /// Use the configured sentinel ("unknown" by default)
    Constant,
}

impl From<CliCategoricalImputation> for CategoricalImputation {
    fn from(cli: CliCategoricalImputation) -> Self {
        match cli {
            CliCategoricalImputation::Mode => CategoricalImputation::Mode,
            CliCategoricalImputation::Constant => CategoricalImputation::Constant,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Fetch, clean, store, analyze and chart tabular datasets",
    long_about = "Fetch a CSV dataset, clean it, store it in SQLite and write reports and charts.\n\n\
                  EXAMPLES:\n  \
                  # Run the full pipeline on a registered dataset\n  \
                  lex-etl run iris\n\n  \
                  # Run on a local file with mean imputation\n  \
                  lex-etl run data/people.csv --numeric-imputation mean\n\n  \
                  # Query the stored table\n  \
                  lex-etl query \"SELECT species, COUNT(*) FROM iris GROUP BY species\"\n\n  \
                  # Analyze a file without storing it\n  \
                  lex-etl analyze data/people.csv --json"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Project root holding the data/ and outputs/ directories
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// JSON configuration file (overrides --root)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline for a registered dataset, URL or file
    Run {
        /// Registered dataset name, http(s) URL or path to a CSV file
        dataset: String,

        /// Download again even when a cached copy exists
        #[arg(long)]
        refresh: bool,

        /// Strategy for imputing missing numeric values
        #[arg(long, value_enum)]
        numeric_imputation: Option<CliNumericImputation>,

        /// Strategy for imputing missing categorical values
        #[arg(long, value_enum)]
        categorical_imputation: Option<CliCategoricalImputation>,

        /// Keep duplicate rows
        #[arg(long)]
        keep_duplicates: bool,

        /// Do not strip whitespace from string columns
        #[arg(long)]
        no_strip: bool,
    },

    /// List registered datasets and stored tables
    List,

    /// Run a read-only SQL query against the database
    Query {
        /// A SELECT (or WITH ... SELECT) statement
        sql: String,
    },

    /// Analyze a CSV file and print the result
    Analyze {
        /// Path to the CSV file
        path: PathBuf,

        /// Print the analysis as JSON (disables logging)
        #[arg(long)]
        json: bool,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only holds JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    let json_output = matches!(args.command, Command::Analyze { json: true, .. });
    init_logging(&args.log_level, args.quiet, json_output);

    // Load environment variables from .env file
    dotenv().ok();

    let mut config = match &args.config {
        Some(path) => EtlConfig::from_json_file(path)?,
        None => EtlConfig::with_root(&args.root),
    };

    match args.command {
        Command::Run {
            dataset,
            refresh,
            numeric_imputation,
            categorical_imputation,
            keep_duplicates,
            no_strip,
        } => {
            if let Some(strategy) = numeric_imputation {
                config.cleaning.numeric_na_strategy = strategy.into();
            }
            if let Some(strategy) = categorical_imputation {
                config.cleaning.categorical_na_strategy = strategy.into();
            }
            config.cleaning.remove_duplicates &= !keep_duplicates;
            config.cleaning.strip_columns &= !no_strip;
            run_pipeline(config, &dataset, refresh, args.quiet)
        }
        Command::List => list(&config),
        Command::Query { sql } => query(&config, &sql),
        Command::Analyze { path, json } => analyze(&config, &path, json),
    }
}

/// Run the pipeline and print a summary of the run.
fn run_pipeline(config: EtlConfig, dataset: &str, refresh: bool, quiet: bool) -> Result<()> {
    let mut builder = Pipeline::builder().config(config).refresh(refresh);

    if !quiet {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }

    let pipeline = builder.build()?;
    match pipeline.execute(dataset) {
        Ok(summary) => {
            print_run_summary(&summary);
            Ok(())
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            Err(anyhow!("Pipeline failed: {}", e))
        }
    }
}

/// Print a human-readable summary of a pipeline run.
///
/// Uses `println!` so the summary shows regardless of log level.
fn print_run_summary(summary: &RunSummary) {
    println!();
    println!("{}", "=".repeat(80));
    println!("PIPELINE COMPLETE");
    println!("{}", "=".repeat(80));
    println!();
    println!("Dataset: {} ({})", summary.dataset, summary.source);
    println!("Table:   {}", summary.table_name);
    println!(
        "Rows:    {} -> {} ({} duplicates removed)",
        summary.rows_before, summary.rows_after, summary.duplicates_removed
    );
    println!("Columns: {}", summary.columns);
    println!("Duration: {}ms", summary.duration_ms);
    println!();
    println!("Outputs:");
    println!("  - {}", summary.processed_csv.display());
    println!("  - {}", summary.analysis_report.display());
    println!("  - {}", summary.summary_report.display());
    println!("  - {} plots", summary.plots_generated);

    if !summary.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &summary.warnings {
            println!("  ! {}", warning);
        }
    }
    println!("{}", "=".repeat(80));
}

/// Print the dataset registry and the tables already stored.
fn list(config: &EtlConfig) -> Result<()> {
    println!("Registered datasets:");
    for (name, url) in &config.datasets {
        println!("  {:<16} {}", name, url);
    }

    println!();
    if !config.database_path.exists() {
        println!("No database at {}", config.database_path.display());
        return Ok(());
    }

    let tables = SqliteStore::new(&config.database_path).list_tables()?;
    println!("Stored tables ({}):", config.database_path.display());
    if tables.is_empty() {
        println!("  (none)");
    }
    for table in tables {
        println!("  {}", table);
    }
    Ok(())
}

fn query(config: &EtlConfig, sql: &str) -> Result<()> {
    if !config.database_path.exists() {
        return Err(anyhow!(
            "Database not found: {}",
            config.database_path.display()
        ));
    }

    let df = SqliteStore::new(&config.database_path).query(sql)?;
    println!("{df}");
    Ok(())
}

/// Load and analyze a single file without storing it.
fn analyze(config: &EtlConfig, path: &Path, json: bool) -> Result<()> {
    let df = Fetcher::load(path)?;
    let analysis = DataAnalyzer::new(config.top_n_categories).analyze(&df)?;

    let name = DatasetSource::Path(path.to_path_buf()).name();
    let report = AnalysisReport::new(name, analysis).with_source(path.display().to_string());

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_summary(&report));
    }
    Ok(())
}
