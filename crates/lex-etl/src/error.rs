//! Error types for the ETL pipeline.
//!
//! Every component reports failures through [`EtlError`]. Component-level
//! kinds (`FetchFailed`, `ParseFailed`, `StoreFailed`, ...) identify which part
//! of the system gave up; the orchestrator wraps them in
//! [`EtlError::StageFailed`] so callers can tell which stage stopped the run.
//!
//! Errors serialize as `{ "code": ..., "message": ... }` so they can be written
//! into JSON reports unchanged.

use crate::pipeline::PipelineStage;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the ETL pipeline.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Network or transport failure while retrieving a dataset.
    #[error("Failed to fetch '{source_ref}': {reason}")]
    FetchFailed { source_ref: String, reason: String },

    /// Input could not be parsed as a table.
    #[error("Failed to parse dataset: {0}")]
    ParseFailed(String),

    /// A dataset name that is not in the registry and is not a URL or path.
    #[error("Unknown dataset '{0}'")]
    UnknownDataset(String),

    /// Data cleaning failed.
    #[error("Failed to clean data: {0}")]
    CleaningFailed(String),

    /// Writing to or reading metadata from the database failed.
    #[error("Store error: {0}")]
    StoreFailed(String),

    /// A read query was rejected or failed.
    #[error("Query error: {0}")]
    QueryFailed(String),

    /// Chart rendering failed.
    #[error("Failed to render plot '{plot}': {reason}")]
    PlotFailed { plot: String, reason: String },

    /// Analysis was asked to summarize a table with no columns.
    #[error("Table has no columns")]
    EmptyTable,

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Report generation failed.
    #[error("Failed to generate report: {0}")]
    ReportGenerationFailed(String),

    /// A pipeline stage failed; the run was halted at this stage.
    #[error("{stage} stage failed: {source}")]
    StageFailed {
        stage: PipelineStage,
        #[source]
        source: Box<EtlError>,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EtlError>,
    },
}

impl EtlError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EtlError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Tag an error with the pipeline stage it came from.
    pub fn in_stage(self, stage: PipelineStage) -> Self {
        EtlError::StageFailed {
            stage,
            source: Box::new(self),
        }
    }

    /// Stable error code, suitable for reports and scripting.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::FetchFailed { .. } => "FETCH_FAILED",
            Self::ParseFailed(_) => "PARSE_FAILED",
            Self::UnknownDataset(_) => "UNKNOWN_DATASET",
            Self::CleaningFailed(_) => "CLEANING_FAILED",
            Self::StoreFailed(_) => "STORE_FAILED",
            Self::QueryFailed(_) => "QUERY_FAILED",
            Self::PlotFailed { .. } => "PLOT_FAILED",
            Self::EmptyTable => "EMPTY_TABLE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::ReportGenerationFailed(_) => "REPORT_GENERATION_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::StageFailed { source, .. } | Self::WithContext { source, .. } => {
                source.error_code()
            }
        }
    }

    /// The stage that failed, if this error came out of the orchestrator.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::StageFailed { stage, .. } => Some(*stage),
            Self::WithContext { source, .. } => source.stage(),
            _ => None,
        }
    }

    /// Shorthand for a fetch failure.
    pub(crate) fn fetch(source_ref: impl Into<String>, reason: impl ToString) -> Self {
        EtlError::FetchFailed {
            source_ref: source_ref.into(),
            reason: reason.to_string(),
        }
    }
}

impl Serialize for EtlError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("EtlError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for ETL operations.
pub type Result<T> = std::result::Result<T, EtlError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| EtlError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(EtlError::EmptyTable.error_code(), "EMPTY_TABLE");
        assert_eq!(
            EtlError::QueryFailed("no such table: x".to_string()).error_code(),
            "QUERY_FAILED"
        );
        assert_eq!(
            EtlError::fetch("titanic", "connection refused").error_code(),
            "FETCH_FAILED"
        );
    }

    #[test]
    fn test_stage_failed_keeps_code_and_stage() {
        let error = EtlError::StoreFailed("disk full".to_string()).in_stage(PipelineStage::Storing);

        assert_eq!(error.error_code(), "STORE_FAILED");
        assert_eq!(error.stage(), Some(PipelineStage::Storing));
        assert!(error.to_string().contains("disk full"));
        assert!(error.to_string().contains("Storing"));
    }

    #[test]
    fn test_error_serialization() {
        let error = EtlError::UnknownDataset("penguins".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("UNKNOWN_DATASET"));
        assert!(json.contains("penguins"));
    }

    #[test]
    fn test_with_context() {
        let error = EtlError::ParseFailed("bad row".to_string()).with_context("Loading iris");
        assert!(error.to_string().contains("Loading iris"));
        assert_eq!(error.error_code(), "PARSE_FAILED");
        assert_eq!(error.stage(), None);
    }
}
