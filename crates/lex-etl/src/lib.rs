//! Tabular ETL Library
//!
//! Fetch a CSV dataset, clean it, store it in SQLite, analyze it and chart it.
//!
//! # Overview
//!
//! The pipeline runs five components in order:
//!
//! - **Fetcher**: resolves a registry name, URL or path and parses the CSV
//! - **Cleaner**: removes duplicate rows, strips whitespace, imputes missing values
//! - **Store**: writes the cleaned table to a SQLite file and answers read queries
//! - **Analyzer**: shape, column types, numeric statistics, value frequencies, correlations
//! - **Reporter**: JSON and text reports plus SVG histograms, bar charts and a heatmap
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_etl::{EtlConfig, Pipeline};
//!
//! let config = EtlConfig::builder()
//!     .root("/tmp/etl")
//!     .dataset("penguins", "https://example.org/penguins.csv")
//!     .build()?;
//!
//! let summary = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .execute("penguins")?;
//!
//! println!("{} plots written", summary.plots_generated);
//! ```
//!
//! # Components
//!
//! Each component can be used on its own:
//!
//! ```rust,ignore
//! use lex_etl::{DataAnalyzer, DataCleaner, Fetcher, SqliteStore};
//!
//! let df = Fetcher::load("data.csv")?;
//! let cleaned = DataCleaner::default().clean(&df)?;
//!
//! let store = SqliteStore::new("data/pipeline.db");
//! store.write(&cleaned, "data")?;
//! let top = store.query("SELECT * FROM data LIMIT 5")?;
//!
//! let analysis = DataAnalyzer::default().analyze(&cleaned)?;
//! ```

pub mod analyzer;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod imputers;
pub mod pipeline;
pub mod reporting;
pub mod store;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use analyzer::DataAnalyzer;
pub use cleaner::DataCleaner;
pub use config::{
    CategoricalImputation, CleaningOptions, ConfigValidationError, EtlConfig, EtlConfigBuilder,
    NumericImputation,
};
pub use error::{EtlError, Result as EtlResult, ResultExt};
pub use fetcher::{DatasetSource, FetchedDataset, Fetcher};
pub use imputers::StatisticalImputer;
pub use pipeline::{
    ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineStage, ProgressReporter,
    ProgressUpdate,
};
pub use reporting::{AnalysisReport, PlotGenerator, ReportGenerator, ReportPaths};
pub use store::SqliteStore;
pub use types::{
    AnalysisResult, CleaningReport, CorrelationMatrix, NumericSummary, RunSummary, ValueCount,
};
pub use utils::{ColumnKind, column_kind, sanitize_identifier};
