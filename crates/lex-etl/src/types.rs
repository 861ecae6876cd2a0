use crate::utils::ColumnKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ============================================================================
// Analysis Types
// ============================================================================

/// Descriptive statistics of a numeric column.
///
/// Quartiles use linear interpolation between closest ranks; `std` is the
/// sample standard deviation (n - 1 denominator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    #[serde(rename = "25%")]
    pub q25: f64,
    #[serde(rename = "50%")]
    pub median: f64,
    #[serde(rename = "75%")]
    pub q75: f64,
    pub max: f64,
}

/// A value and how often it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Pearson correlations between numeric columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    /// Column names, in table order.
    pub columns: Vec<String>,
    /// Row-major square matrix; `None` where a coefficient is undefined
    /// (constant column or fewer than two paired values).
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    /// Correlation between two named columns.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values.get(i)?.get(j).copied().flatten()
    }
}

/// Summary of a table's shape and contents.
///
/// Computed fresh by every call to [`crate::DataAnalyzer::analyze`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// (rows, columns)
    pub shape: (usize, usize),
    /// Column names in table order.
    pub columns: Vec<String>,
    pub column_types: BTreeMap<String, ColumnKind>,
    /// Physical polars dtype of each column.
    pub dtypes: BTreeMap<String, String>,
    pub numeric_stats: BTreeMap<String, NumericSummary>,
    /// Most frequent values per categorical column, most frequent first.
    pub categorical_stats: BTreeMap<String, Vec<ValueCount>>,
    pub null_counts: BTreeMap<String, usize>,
    /// Rows that exactly repeat an earlier row.
    pub duplicate_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlations: Option<CorrelationMatrix>,
}

impl AnalysisResult {
    /// Number of columns of each kind.
    pub fn type_counts(&self) -> BTreeMap<ColumnKind, usize> {
        let mut counts = BTreeMap::new();
        for kind in self.column_types.values() {
            *counts.entry(*kind).or_insert(0) += 1;
        }
        counts
    }

    /// Total missing values across all columns.
    pub fn total_nulls(&self) -> usize {
        self.null_counts.values().sum()
    }
}

// ============================================================================
// Cleaning Types
// ============================================================================

/// What a cleaning pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub duplicates_removed: usize,
    /// Columns whose values were trimmed.
    pub stripped_columns: Vec<String>,
    /// Column name and a description of the fill that was applied.
    pub imputations: Vec<(String, String)>,
    /// Human-readable log of actions, in order.
    pub actions: Vec<String>,
    /// Non-fatal problems (e.g. entirely-missing columns).
    pub warnings: Vec<String>,
}

impl CleaningReport {
    pub(crate) fn add_action(&mut self, action: impl Into<String>) {
        self.actions.push(action.into());
    }

    pub(crate) fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

// ============================================================================
// Pipeline Types
// ============================================================================

/// Outcome of a full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Dataset name; also the name of the stored table.
    pub dataset: String,
    /// Where the raw data came from (URL or path).
    pub source: String,
    pub table_name: String,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns: usize,
    pub duplicates_removed: usize,
    pub processed_csv: PathBuf,
    pub analysis_report: PathBuf,
    pub summary_report: PathBuf,
    pub plots_generated: usize,
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> AnalysisResult {
        let mut column_types = BTreeMap::new();
        column_types.insert("age".to_string(), ColumnKind::Numeric);
        column_types.insert("score".to_string(), ColumnKind::Numeric);
        column_types.insert("name".to_string(), ColumnKind::Categorical);

        let mut null_counts = BTreeMap::new();
        null_counts.insert("age".to_string(), 1);
        null_counts.insert("score".to_string(), 2);
        null_counts.insert("name".to_string(), 0);

        AnalysisResult {
            shape: (5, 3),
            columns: vec!["name".into(), "age".into(), "score".into()],
            column_types,
            dtypes: BTreeMap::new(),
            numeric_stats: BTreeMap::new(),
            categorical_stats: BTreeMap::new(),
            null_counts,
            duplicate_rows: 0,
            correlations: None,
        }
    }

    #[test]
    fn test_type_counts() {
        let counts = sample_result().type_counts();
        assert_eq!(counts.get(&ColumnKind::Numeric), Some(&2));
        assert_eq!(counts.get(&ColumnKind::Categorical), Some(&1));
        assert_eq!(counts.get(&ColumnKind::Boolean), None);
    }

    #[test]
    fn test_total_nulls() {
        assert_eq!(sample_result().total_nulls(), 3);
    }

    #[test]
    fn test_numeric_summary_uses_percentile_keys() {
        let summary = NumericSummary {
            count: 4,
            mean: 32.5,
            std: 6.45,
            min: 25.0,
            q25: 28.75,
            median: 32.5,
            q75: 36.25,
            max: 40.0,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["50%"], 32.5);
        assert_eq!(json["25%"], 28.75);
    }

    #[test]
    fn test_correlation_lookup() {
        let matrix = CorrelationMatrix {
            columns: vec!["a".into(), "b".into()],
            values: vec![vec![Some(1.0), Some(-0.5)], vec![Some(-0.5), Some(1.0)]],
        };
        assert_eq!(matrix.get("a", "b"), Some(-0.5));
        assert_eq!(matrix.get("a", "zzz"), None);
    }
}
