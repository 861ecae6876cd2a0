//! Integration tests for the ETL pipeline.
//!
//! These tests run the full pipeline against local CSV fixtures inside
//! temporary project roots. Remote sources are exercised through the raw
//! cache and a closed local port only.

use lex_etl::{
    DataAnalyzer, DataCleaner, EtlConfig, EtlError, Fetcher, Pipeline, PipelineStage,
    SqliteStore,
};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(filename: &str) -> String {
    fixtures_path().join(filename).to_string_lossy().into_owned()
}

fn pipeline(root: &Path) -> Pipeline {
    Pipeline::builder()
        .config(EtlConfig::with_root(root))
        .build()
        .expect("default config should be valid")
}

fn f64_values(df: &DataFrame, column: &str) -> Vec<Option<f64>> {
    df.column(column)
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .collect()
}

// ============================================================================
// Full Pipeline Tests
// ============================================================================

#[test]
fn test_full_pipeline_sample() {
    let temp = TempDir::new().unwrap();
    let pipeline = pipeline(temp.path());

    let summary = pipeline.execute(&fixture("sample.csv")).unwrap();

    assert_eq!(summary.dataset, "sample");
    assert_eq!(summary.table_name, "sample");
    assert_eq!(summary.rows_before, 5);
    assert_eq!(summary.rows_after, 5);
    assert_eq!(summary.duplicates_removed, 0);
    assert!(summary.warnings.is_empty());
    // three histograms, two bar charts, one heatmap
    assert_eq!(summary.plots_generated, 6);

    let config = pipeline.config();
    assert_eq!(summary.processed_csv, config.processed_dir.join("sample.csv"));
    assert!(config.reports_dir.join("sample_analysis.json").is_file());
    assert!(config.reports_dir.join("sample_summary.txt").is_file());
    assert!(config.plots_dir.join("sample_correlation_heatmap.svg").is_file());
}

#[test]
fn test_stored_table_is_clean() {
    let temp = TempDir::new().unwrap();
    let pipeline = pipeline(temp.path());
    assert!(pipeline.run(&fixture("sample.csv")));

    let store = SqliteStore::new(&pipeline.config().database_path);
    assert!(store.list_tables().unwrap().contains(&"sample".to_string()));

    let df = store.query("SELECT * FROM sample ORDER BY id").unwrap();
    assert_eq!(df.shape(), (5, 5));
    for col in df.get_columns() {
        assert_eq!(col.null_count(), 0, "column {} has nulls", col.name());
    }
    assert_eq!(f64_values(&df, "age")[2], Some(32.5));
    assert_eq!(f64_values(&df, "score")[3], Some(86.75));
}

#[test]
fn test_processed_csv_matches_cleaned_table() {
    let temp = TempDir::new().unwrap();
    let pipeline = pipeline(temp.path());
    let summary = pipeline.execute(&fixture("sample.csv")).unwrap();

    let exported = Fetcher::load(&summary.processed_csv).unwrap();
    let expected = DataCleaner::default()
        .clean(&Fetcher::load(fixture("sample.csv")).unwrap())
        .unwrap();

    assert_eq!(exported.shape(), expected.shape());
    assert_eq!(f64_values(&exported, "age"), f64_values(&expected, "age"));
}

#[test]
fn test_analysis_report_contents() {
    let temp = TempDir::new().unwrap();
    let pipeline = pipeline(temp.path());
    let summary = pipeline.execute(&fixture("sample.csv")).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&summary.analysis_report).unwrap()).unwrap();

    assert_eq!(json["dataset"], "sample");
    assert_eq!(json["analysis"]["shape"], serde_json::json!([5, 5]));
    assert_eq!(json["analysis"]["null_counts"]["age"], 0);
    assert_eq!(json["cleaning"]["rows_before"], 5);
    assert!(json["source"].as_str().unwrap().ends_with("sample.csv"));

    let text = fs::read_to_string(&summary.summary_report).unwrap();
    assert!(text.contains("Shape: 5 rows x 5 columns"));
}

#[test]
fn test_duplicates_removed_before_imputation() {
    let temp = TempDir::new().unwrap();
    let pipeline = pipeline(temp.path());
    let summary = pipeline.execute(&fixture("duplicates.csv")).unwrap();

    assert_eq!(summary.rows_before, 5);
    assert_eq!(summary.rows_after, 3);
    assert_eq!(summary.duplicates_removed, 2);

    let store = SqliteStore::new(&pipeline.config().database_path);
    let df = store.query("SELECT city, temp FROM duplicates ORDER BY id").unwrap();
    let cities: Vec<Option<&str>> = df.column("city").unwrap().str().unwrap().into_iter().collect();
    assert_eq!(cities, vec![Some("Oslo"), Some("Rome"), Some("Lima")]);
    assert_eq!(f64_values(&df, "temp"), vec![Some(12.5), Some(16.25), Some(20.0)]);
}

#[test]
fn test_rerun_replaces_table() {
    let temp = TempDir::new().unwrap();
    let pipeline = pipeline(temp.path());

    assert!(pipeline.run(&fixture("sample.csv")));
    assert!(pipeline.run(&fixture("sample.csv")));

    let store = SqliteStore::new(&pipeline.config().database_path);
    assert_eq!(store.list_tables().unwrap(), vec!["sample"]);
    let df = store.query("SELECT COUNT(*) AS n FROM sample").unwrap();
    assert_eq!(df.column("n").unwrap().i64().unwrap().get(0), Some(5));
}

// ============================================================================
// Remote Sources
// ============================================================================

#[test]
fn test_registered_dataset_served_from_cache() {
    let temp = TempDir::new().unwrap();
    let config = EtlConfig::builder()
        .root(temp.path())
        .dataset("people", "http://127.0.0.1:9/people.csv")
        .http_timeout_secs(2)
        .build()
        .unwrap();
    let fetcher = Fetcher::new(&config);
    let cache = fetcher.cache_path(&fetcher.resolve("people").unwrap()).unwrap();
    fs::create_dir_all(&config.raw_dir).unwrap();
    fs::copy(fixtures_path().join("sample.csv"), &cache).unwrap();

    let summary = Pipeline::builder()
        .config(config)
        .build()
        .unwrap()
        .execute("people")
        .unwrap();

    assert_eq!(summary.table_name, "people");
    assert_eq!(summary.rows_after, 5);
}

#[test]
fn test_unreachable_source_fails_at_fetch() {
    let temp = TempDir::new().unwrap();
    let config = EtlConfig::builder()
        .root(temp.path())
        .dataset("people", "http://127.0.0.1:9/people.csv")
        .http_timeout_secs(2)
        .build()
        .unwrap();
    let database_path = config.database_path.clone();
    let pipeline = Pipeline::builder().config(config).build().unwrap();

    let err = pipeline.execute("people").unwrap_err();
    assert_eq!(err.stage(), Some(PipelineStage::Fetching));
    assert_eq!(err.error_code(), "FETCH_FAILED");
    assert!(!database_path.exists());
}

// ============================================================================
// Failure Handling
// ============================================================================

#[test]
fn test_malformed_csv_fails_at_fetch() {
    let temp = TempDir::new().unwrap();
    let pipeline = pipeline(temp.path());

    for name in ["ragged.csv", "duplicate_header.csv"] {
        let err = pipeline.execute(&fixture(name)).unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::Fetching), "{name}");
        assert_eq!(err.error_code(), "PARSE_FAILED", "{name}");
    }
    assert!(!pipeline.run(&fixture("ragged.csv")));
}

#[test]
fn test_unknown_dataset() {
    let temp = TempDir::new().unwrap();
    let err = pipeline(temp.path()).execute("no_such_dataset").unwrap_err();

    assert!(matches!(err, EtlError::StageFailed { .. }));
    assert_eq!(err.error_code(), "UNKNOWN_DATASET");
}

// ============================================================================
// Component Properties
// ============================================================================

#[test]
fn test_cleaning_is_idempotent_on_fixture() {
    let df = Fetcher::load(fixture("sample.csv")).unwrap();
    let cleaner = DataCleaner::default();

    let once = cleaner.clean(&df).unwrap();
    let twice = cleaner.clean(&once).unwrap();
    assert!(once.equals_missing(&twice));
}

#[test]
fn test_analysis_shape_matches_table() {
    let df = Fetcher::load(fixture("duplicates.csv")).unwrap();
    let analysis = DataAnalyzer::default().analyze(&df).unwrap();

    assert_eq!(analysis.shape, (df.height(), df.width()));
    assert_eq!(analysis.duplicate_rows, 2);
}
