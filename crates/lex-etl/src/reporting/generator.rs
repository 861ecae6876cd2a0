use crate::error::{EtlError, Result};
use crate::types::{AnalysisResult, CleaningReport};
use crate::utils::sanitize_identifier;
use chrono::Local;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

// ============================================================================
// Report Types
// ============================================================================

/// Everything written to `<name>_analysis.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Timestamp when the report was generated
    pub generated_at: String,
    pub dataset: String,
    /// URL or path the data came from, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// What the cleaning pass did, when the report follows a pipeline run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaning: Option<CleaningReport>,
    pub analysis: AnalysisResult,
}

impl AnalysisReport {
    pub fn new(dataset: impl Into<String>, analysis: AnalysisResult) -> Self {
        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            dataset: dataset.into(),
            source: None,
            cleaning: None,
            analysis,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_cleaning(mut self, cleaning: CleaningReport) -> Self {
        self.cleaning = Some(cleaning);
        self
    }
}

/// Locations of the files written for one report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPaths {
    pub analysis_json: PathBuf,
    pub summary_txt: PathBuf,
}

// ============================================================================
// Report Generator
// ============================================================================

/// Writes analysis reports to a directory.
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `<name>_analysis.json` and `<name>_summary.txt`.
    pub fn write_report(&self, analysis: &AnalysisResult, name: &str) -> Result<ReportPaths> {
        self.write_full_report(&AnalysisReport::new(name, analysis.clone()))
    }

    /// Write a report that may carry source and cleaning details.
    pub fn write_full_report(&self, report: &AnalysisReport) -> Result<ReportPaths> {
        self.write_internal(report)
            .map_err(|e| EtlError::ReportGenerationFailed(format!("{e:#}")))
    }

    fn write_internal(&self, report: &AnalysisReport) -> anyhow::Result<ReportPaths> {
        fs::create_dir_all(&self.output_dir)?;
        let stem = sanitize_identifier(&report.dataset);

        let analysis_json = self.output_dir.join(format!("{stem}_analysis.json"));
        let mut file = File::create(&analysis_json)?;
        file.write_all(serde_json::to_string_pretty(report)?.as_bytes())?;
        info!("Analysis report saved: {}", analysis_json.display());

        let summary_txt = self.output_dir.join(format!("{stem}_summary.txt"));
        fs::write(&summary_txt, render_summary(report))?;
        info!("Summary saved: {}", summary_txt.display());

        Ok(ReportPaths {
            analysis_json,
            summary_txt,
        })
    }
}

/// Human-readable summary of a report.
pub fn render_summary(report: &AnalysisReport) -> String {
    let analysis = &report.analysis;
    let mut lines = vec![
        format!("Dataset analysis: {}", report.dataset),
        format!("Generated: {}", report.generated_at),
    ];
    if let Some(source) = &report.source {
        lines.push(format!("Source: {source}"));
    }

    lines.push(String::new());
    lines.push(format!(
        "Shape: {} rows x {} columns",
        analysis.shape.0, analysis.shape.1
    ));
    let types: Vec<String> = analysis
        .type_counts()
        .iter()
        .map(|(kind, count)| format!("{kind} {count}"))
        .collect();
    lines.push(format!("Column types: {}", types.join(", ")));
    lines.push(format!("Duplicate rows: {}", analysis.duplicate_rows));
    lines.push(format!("Missing values: {}", analysis.total_nulls()));
    for column in &analysis.columns {
        if let Some(nulls) = analysis.null_counts.get(column).filter(|n| **n > 0) {
            lines.push(format!("  {column}: {nulls}"));
        }
    }

    if !analysis.numeric_stats.is_empty() {
        lines.push(String::new());
        lines.push("Numeric columns".to_string());
        for column in &analysis.columns {
            if let Some(s) = analysis.numeric_stats.get(column) {
                lines.push(format!(
                    "  {column}: count {}, mean {:.2}, std {:.2}, min {:.2}, \
                     25% {:.2}, 50% {:.2}, 75% {:.2}, max {:.2}",
                    s.count, s.mean, s.std, s.min, s.q25, s.median, s.q75, s.max
                ));
            }
        }
    }

    if !analysis.categorical_stats.is_empty() {
        lines.push(String::new());
        lines.push("Categorical columns".to_string());
        for column in &analysis.columns {
            if let Some(top) = analysis.categorical_stats.get(column) {
                let values: Vec<String> = top
                    .iter()
                    .map(|vc| format!("{} ({})", vc.value, vc.count))
                    .collect();
                lines.push(format!("  {column}: {}", values.join(", ")));
            }
        }
    }

    if let Some(cleaning) = &report.cleaning {
        lines.push(String::new());
        lines.push(format!(
            "Cleaning: {} -> {} rows",
            cleaning.rows_before, cleaning.rows_after
        ));
        lines.extend(cleaning.actions.iter().map(|a| format!("  - {a}")));
        if !cleaning.warnings.is_empty() {
            lines.push("Warnings".to_string());
            lines.extend(cleaning.warnings.iter().map(|w| format!("  - {w}")));
        }
    }

    lines.push(String::new());
    lines.join("\n")
}

/// Write a table as CSV with a header row.
pub fn write_csv(df: &DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    let mut df = df.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(&mut df)?;
    info!("Dataset saved: {}", path.display());
    Ok(())
}
