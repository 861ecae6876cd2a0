//! The end-to-end ETL pipeline.
//!
//! Runs Fetcher, Cleaner, Store, Analyzer and Reporter in sequence for a
//! single dataset. A failing stage halts the run; work already written by
//! earlier stages is left in place.

use crate::analyzer::DataAnalyzer;
use crate::cleaner::DataCleaner;
use crate::config::{ConfigValidationError, EtlConfig};
use crate::error::{EtlError, Result};
use crate::fetcher::Fetcher;
use crate::pipeline::progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::reporting::{AnalysisReport, PlotGenerator, ReportGenerator, write_csv};
use crate::store::SqliteStore;
use crate::types::RunSummary;
use crate::utils::sanitize_identifier;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// The ETL pipeline.
///
/// Use [`Pipeline::builder()`] to create a pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use lex_etl::{EtlConfig, Pipeline};
///
/// let summary = Pipeline::builder()
///     .config(EtlConfig::with_root("/tmp/etl"))
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .execute("iris")?;
///
/// println!("{} rows stored in '{}'", summary.rows_after, summary.table_name);
/// ```
pub struct Pipeline {
    config: EtlConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    refresh: bool,
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    /// Run the pipeline, returning whether every stage succeeded.
    ///
    /// Failures are logged with the stage that stopped the run.
    pub fn run(&self, target: &str) -> bool {
        self.execute(target).is_ok()
    }

    /// Run the pipeline and return a summary of the run.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::StageFailed`](crate::EtlError::StageFailed) naming
    /// the stage that failed and wrapping its cause.
    pub fn execute(&self, target: &str) -> Result<RunSummary> {
        match self.execute_internal(target) {
            Ok(summary) => {
                self.report_progress(ProgressUpdate::complete(format!(
                    "Pipeline completed for '{}'",
                    summary.dataset
                )));
                Ok(summary)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn start_stage(&self, stage: PipelineStage, message: impl Into<String>) {
        let message = message.into();
        info!("{}: {}", stage, message);
        self.report_progress(ProgressUpdate::new(stage, 0.0, message));
    }

    fn finish_stage(&self, stage: PipelineStage, message: impl Into<String>) {
        self.report_progress(ProgressUpdate::new(stage, 1.0, message));
    }

    fn execute_internal(&self, target: &str) -> Result<RunSummary> {
        let start_time = Instant::now();
        info!("Starting ETL pipeline for '{}'", target);

        // Step 1: Fetch
        self.start_stage(PipelineStage::Fetching, format!("Fetching '{target}'..."));
        let fetched = self
            .config
            .ensure_directories()
            .map_err(EtlError::from)
            .and_then(|()| {
                Fetcher::new(&self.config)
                    .refresh(self.refresh)
                    .fetch(target)
            })
            .map_err(|e| e.in_stage(PipelineStage::Fetching))?;
        let name = fetched.name.clone();
        let source = fetched.source.to_string();
        self.finish_stage(
            PipelineStage::Fetching,
            format!(
                "Fetched {} rows x {} columns",
                fetched.data.height(),
                fetched.data.width()
            ),
        );

        // Step 2: Clean
        self.start_stage(PipelineStage::Cleaning, "Cleaning data...");
        let (cleaned, cleaning) = DataCleaner::new(self.config.cleaning.clone())
            .clean_with_report(&fetched.data)
            .map_err(|e| e.in_stage(PipelineStage::Cleaning))?;
        self.finish_stage(
            PipelineStage::Cleaning,
            format!("{} -> {} rows", cleaning.rows_before, cleaning.rows_after),
        );

        // Step 3: Export processed CSV and store
        self.start_stage(PipelineStage::Storing, "Saving processed data...");
        let processed_csv = self
            .config
            .processed_dir
            .join(format!("{}.csv", sanitize_identifier(&name)));
        let table_name = write_csv(&cleaned, &processed_csv)
            .and_then(|()| SqliteStore::new(&self.config.database_path).write(&cleaned, &name))
            .map_err(|e| e.in_stage(PipelineStage::Storing))?;
        self.finish_stage(
            PipelineStage::Storing,
            format!("Stored table '{table_name}'"),
        );

        // Step 4: Analyze
        self.start_stage(PipelineStage::Analyzing, "Analyzing data...");
        let analysis = DataAnalyzer::new(self.config.top_n_categories)
            .analyze(&cleaned)
            .map_err(|e| e.in_stage(PipelineStage::Analyzing))?;
        self.finish_stage(PipelineStage::Analyzing, "Analysis complete");

        // Step 5: Reports and plots
        self.start_stage(PipelineStage::Reporting, "Writing reports...");
        let report = AnalysisReport::new(&name, analysis)
            .with_source(&source)
            .with_cleaning(cleaning.clone());
        let paths = ReportGenerator::new(&self.config.reports_dir)
            .write_full_report(&report)
            .map_err(|e| e.in_stage(PipelineStage::Reporting))?;
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Reporting,
            0.3,
            "Rendering plots...",
        ));
        let plots_generated =
            PlotGenerator::new(&self.config.plots_dir, self.config.max_bar_chart_categories)
                .generate_plots(&cleaned, &name)
                .map_err(|e| e.in_stage(PipelineStage::Reporting))?;
        self.finish_stage(
            PipelineStage::Reporting,
            format!("Generated {plots_generated} plots"),
        );

        let summary = RunSummary {
            dataset: name,
            source,
            table_name,
            rows_before: cleaning.rows_before,
            rows_after: cleaning.rows_after,
            columns: cleaned.width(),
            duplicates_removed: cleaning.duplicates_removed,
            processed_csv,
            analysis_report: paths.analysis_json,
            summary_report: paths.summary_txt,
            plots_generated,
            warnings: cleaning.warnings,
            duration_ms: start_time.elapsed().as_millis() as u64,
        };
        info!(
            "Pipeline finished for '{}' in {} ms",
            summary.dataset, summary.duration_ms
        );
        Ok(summary)
    }
}

/// Builder for creating a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<EtlConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    refresh: bool,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: EtlConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during a run.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Download remote datasets again even when a cached copy exists.
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Pipeline {
            config,
            progress_reporter: self.progress_reporter,
            refresh: self.refresh,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const SAMPLE_CSV: &str = "id,name,age,score,category\n\
        1,Alice,25,85.5,A\n\
        2,Bob,30,92.0,B\n\
        3,Charlie,,78.5,A\n\
        4,,40,,C\n\
        5,Eve,35,88.0,B\n";

    fn pipeline_in(temp: &TempDir) -> Pipeline {
        Pipeline::builder()
            .config(EtlConfig::with_root(temp.path()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_pipeline_builder_default() {
        let pipeline = Pipeline::builder().build().unwrap();
        assert!(pipeline.progress_reporter.is_none());
        assert!(!pipeline.refresh);
        assert!(pipeline.config.cleaning.remove_duplicates);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EtlConfig::default();
        config.max_bar_chart_categories = 0;
        assert!(Pipeline::builder().config(config).build().is_err());
    }

    #[test]
    fn test_execute_local_file() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("sample.csv");
        fs::write(&input, SAMPLE_CSV).unwrap();

        let pipeline = pipeline_in(&temp);
        let summary = pipeline.execute(input.to_str().unwrap()).unwrap();

        assert_eq!(summary.dataset, "sample");
        assert_eq!(summary.table_name, "sample");
        assert_eq!(summary.rows_before, 5);
        assert_eq!(summary.rows_after, 5);
        assert_eq!(summary.columns, 5);
        assert!(summary.plots_generated >= 3);
        assert!(summary.processed_csv.is_file());
        assert!(summary.analysis_report.is_file());
        assert!(summary.summary_report.is_file());

        let store = SqliteStore::new(&pipeline.config().database_path);
        assert_eq!(store.list_tables().unwrap(), vec!["sample"]);
    }

    #[test]
    fn test_failure_is_tagged_with_stage() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline_in(&temp);
        let missing = temp.path().join("missing.csv");

        let err = pipeline.execute(missing.to_str().unwrap()).unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::Fetching));
        assert!(matches!(err, EtlError::StageFailed { .. }));
        assert_eq!(err.error_code(), "FETCH_FAILED");
        assert!(!pipeline.run(missing.to_str().unwrap()));
    }

    #[test]
    fn test_progress_reported_for_every_stage() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("sample.csv");
        fs::write(&input, SAMPLE_CSV).unwrap();

        let stages = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&stages);
        let pipeline = Pipeline::builder()
            .config(EtlConfig::with_root(temp.path()))
            .on_progress(move |update| seen.lock().unwrap().push(update.stage))
            .build()
            .unwrap();

        assert!(pipeline.run(input.to_str().unwrap()));

        let stages = stages.lock().unwrap();
        for stage in [
            PipelineStage::Fetching,
            PipelineStage::Cleaning,
            PipelineStage::Storing,
            PipelineStage::Analyzing,
            PipelineStage::Reporting,
        ] {
            assert!(stages.contains(&stage), "missing progress for {stage}");
        }
        assert_eq!(stages.last(), Some(&PipelineStage::Complete));
    }

    #[test]
    fn test_failed_progress_on_error() {
        let temp = TempDir::new().unwrap();
        let last = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&last);
        let pipeline = Pipeline::builder()
            .config(EtlConfig::with_root(temp.path()))
            .on_progress(move |update| *seen.lock().unwrap() = Some(update.stage))
            .build()
            .unwrap();

        assert!(!pipeline.run("not-a-registered-dataset"));
        assert_eq!(*last.lock().unwrap(), Some(PipelineStage::Failed));
    }
}
