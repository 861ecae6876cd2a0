//! Descriptive analysis of tables.

mod statistics;

use crate::error::{EtlError, Result, ResultExt};
use crate::types::{AnalysisResult, CorrelationMatrix, ValueCount};
use crate::utils::{
    ColumnKind, column_kind, duplicate_row_flags, numeric_values, value_frequencies,
};
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Default number of value/frequency pairs kept per categorical column.
pub const DEFAULT_TOP_N: usize = 10;

/// Computes an [`AnalysisResult`] for a table.
#[derive(Debug, Clone)]
pub struct DataAnalyzer {
    top_n: usize,
}

impl Default for DataAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_N)
    }
}

impl DataAnalyzer {
    pub fn new(top_n: usize) -> Self {
        Self { top_n: top_n.max(1) }
    }

    /// Summarize a table.
    ///
    /// Fails with [`EtlError::EmptyTable`] when the table has no columns.
    /// A table with columns but no rows is summarized normally.
    pub fn analyze(&self, df: &DataFrame) -> Result<AnalysisResult> {
        if df.width() == 0 {
            return Err(EtlError::EmptyTable);
        }

        info!("Analyzing table: {} rows x {} columns", df.height(), df.width());

        let mut columns = Vec::with_capacity(df.width());
        let mut column_types = BTreeMap::new();
        let mut dtypes = BTreeMap::new();
        let mut numeric_stats = BTreeMap::new();
        let mut categorical_stats = BTreeMap::new();
        let mut null_counts = BTreeMap::new();

        for col in df.get_columns() {
            let series = col.as_materialized_series();
            let name = series.name().to_string();
            let kind = column_kind(series);

            columns.push(name.clone());
            column_types.insert(name.clone(), kind);
            dtypes.insert(name.clone(), series.dtype().to_string());
            null_counts.insert(name.clone(), series.null_count());

            match kind {
                ColumnKind::Numeric => {
                    let values = numeric_values(series)
                        .context(format!("Summarizing column '{name}'"))?;
                    if let Some(summary) = statistics::summarize(&values) {
                        numeric_stats.insert(name.clone(), summary);
                    }
                }
                ColumnKind::Categorical => {
                    let top: Vec<ValueCount> = value_frequencies(series)
                        .context(format!("Counting values of column '{name}'"))?
                        .into_iter()
                        .take(self.top_n)
                        .map(|(value, count)| ValueCount { value, count })
                        .collect();
                    categorical_stats.insert(name.clone(), top);
                }
                ColumnKind::Boolean => {}
            }
            debug!("Analyzed column '{}' ({})", name, kind);
        }

        let correlations = correlations(df)?;
        let duplicate_rows = duplicate_row_flags(df)?.into_iter().filter(|d| *d).count();

        Ok(AnalysisResult {
            shape: (df.height(), df.width()),
            columns,
            column_types,
            dtypes,
            numeric_stats,
            categorical_stats,
            null_counts,
            duplicate_rows,
            correlations,
        })
    }
}

/// Pearson correlations between all numeric columns, when there are at least two.
pub(crate) fn correlations(df: &DataFrame) -> PolarsResult<Option<CorrelationMatrix>> {
    let mut columns: Vec<(String, Vec<Option<f64>>)> = Vec::new();
    for col in df.get_columns() {
        let series = col.as_materialized_series();
        if column_kind(series) == ColumnKind::Numeric {
            let values: Vec<Option<f64>> =
                series.cast(&DataType::Float64)?.f64()?.into_iter().collect();
            columns.push((series.name().to_string(), values));
        }
    }

    if columns.len() < 2 {
        return Ok(None);
    }
    Ok(Some(correlation_matrix(&columns)))
}

fn correlation_matrix(columns: &[(String, Vec<Option<f64>>)]) -> CorrelationMatrix {
    let values = columns
        .iter()
        .map(|(_, xs)| {
            columns
                .iter()
                .map(|(_, ys)| statistics::pearson(xs, ys))
                .collect()
        })
        .collect();

    CorrelationMatrix {
        columns: columns.iter().map(|(name, _)| name.clone()).collect(),
        values,
    }
}
