//! Data cleaning.
//!
//! A cleaning pass runs, in order:
//! 1. Duplicate row removal (on the raw rows)
//! 2. Whitespace stripping in string columns
//! 3. Imputation of missing values per column kind
//!
//! The input table is never modified; every pass returns a new table.

mod sanitizers;

use crate::config::CleaningOptions;
use crate::error::{EtlError, Result};
use crate::imputers::StatisticalImputer;
use crate::types::CleaningReport;
use crate::utils::{ColumnKind, column_kind, column_names};
use polars::prelude::*;
use tracing::{debug, info};

/// Applies a set of [`CleaningOptions`] to tables.
#[derive(Debug, Clone, Default)]
pub struct DataCleaner {
    options: CleaningOptions,
}

impl DataCleaner {
    pub fn new(options: CleaningOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CleaningOptions {
        &self.options
    }

    /// Clean a table and return the result.
    pub fn clean(&self, df: &DataFrame) -> Result<DataFrame> {
        self.clean_with_report(df).map(|(cleaned, _)| cleaned)
    }

    /// Clean a table and describe what was done.
    pub fn clean_with_report(&self, df: &DataFrame) -> Result<(DataFrame, CleaningReport)> {
        self.clean_internal(df)
            .map_err(|e| EtlError::CleaningFailed(format!("{e:#}")))
    }

    fn clean_internal(&self, df: &DataFrame) -> anyhow::Result<(DataFrame, CleaningReport)> {
        info!(
            "Cleaning table: {} rows x {} columns",
            df.height(),
            df.width()
        );

        let mut report = CleaningReport {
            rows_before: df.height(),
            ..CleaningReport::default()
        };

        // 1. Duplicates
        let mut df = if self.options.remove_duplicates {
            let (deduped, removed) = sanitizers::remove_duplicate_rows(df)?;
            report.duplicates_removed = removed;
            if removed > 0 {
                report.add_action(format!("Removed {} duplicate rows", removed));
            } else {
                report.add_action("No duplicate rows found");
            }
            deduped
        } else {
            df.clone()
        };

        // 2. Whitespace
        if self.options.strip_columns {
            let stripped = sanitizers::strip_string_columns(&mut df)?;
            if !stripped.is_empty() {
                report.add_action(format!(
                    "Stripped whitespace in {} columns: {}",
                    stripped.len(),
                    stripped.join(", ")
                ));
            }
            report.stripped_columns = stripped;
        }

        // 3. Missing values
        for col_name in column_names(&df) {
            let kind = column_kind(df.column(&col_name)?.as_materialized_series());
            debug!("Imputing '{}' as {}", col_name, kind);
            match kind {
                ColumnKind::Numeric => StatisticalImputer::impute_numeric(
                    &mut df,
                    &col_name,
                    self.options.numeric_na_strategy,
                    &mut report,
                )?,
                ColumnKind::Categorical => StatisticalImputer::impute_categorical(
                    &mut df,
                    &col_name,
                    self.options.categorical_na_strategy,
                    &self.options.categorical_sentinel,
                    &mut report,
                )?,
                ColumnKind::Boolean => {
                    StatisticalImputer::impute_boolean(&mut df, &col_name, &mut report)?
                }
            }
        }

        report.rows_after = df.height();
        info!(
            "Cleaning complete: {} -> {} rows, {} columns imputed",
            report.rows_before,
            report.rows_after,
            report.imputations.len()
        );

        Ok((df, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CategoricalImputation, NumericImputation};

    fn sample() -> DataFrame {
        df! {
            "id" => &[1i64, 2, 3, 4, 5],
            "name" => &[Some("Alice"), Some("Bob"), Some("Charlie"), None, Some("Eve")],
            "age" => &[Some(25i64), Some(30), None, Some(40), Some(35)],
            "score" => &[Some(85.5), Some(92.0), Some(78.5), None, Some(88.0)],
            "category" => &["A", "B", "A", "C", "B"],
        }
        .unwrap()
    }

    fn total_nulls(df: &DataFrame) -> usize {
        df.get_columns().iter().map(|c| c.null_count()).sum()
    }

    #[test]
    fn test_clean_sample_fills_everything() {
        let df = sample();
        let (cleaned, report) = DataCleaner::default().clean_with_report(&df).unwrap();

        assert_eq!(cleaned.height(), 5);
        assert_eq!(total_nulls(&cleaned), 0);
        assert_eq!(report.duplicates_removed, 0);
        assert_eq!(report.imputations.len(), 3);

        let age = cleaned
            .column("age")
            .unwrap()
            .as_materialized_series()
            .get(2)
            .unwrap()
            .try_extract::<f64>()
            .unwrap();
        assert_eq!(age, 32.5);
    }

    #[test]
    fn test_clean_does_not_modify_input() {
        let df = sample();
        let _ = DataCleaner::default().clean(&df).unwrap();
        assert_eq!(df.column("age").unwrap().null_count(), 1);
        assert_eq!(df.column("age").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_clean_is_idempotent() {
        let cleaner = DataCleaner::default();
        let once = cleaner.clean(&sample()).unwrap();
        let twice = cleaner.clean(&once).unwrap();
        assert!(once.equals_missing(&twice));
    }

    #[test]
    fn test_duplicates_removed_before_imputation() {
        let df = df! {
            "x" => &[Some(1.0), Some(1.0), None, None],
            "y" => &[Some("a"), Some("a"), None, None],
        }
        .unwrap();

        let (cleaned, report) = DataCleaner::default().clean_with_report(&df).unwrap();
        assert_eq!(report.duplicates_removed, 2);
        assert_eq!(cleaned.height(), 2);
        assert_eq!(total_nulls(&cleaned), 0);
    }

    #[test]
    fn test_keep_duplicates_and_no_strip() {
        let options = CleaningOptions {
            remove_duplicates: false,
            strip_columns: false,
            ..CleaningOptions::default()
        };
        let df = df! { "name" => &[" a ", " a ", "b"] }.unwrap();

        let (cleaned, report) = DataCleaner::new(options).clean_with_report(&df).unwrap();
        assert_eq!(cleaned.height(), 3);
        assert!(report.stripped_columns.is_empty());
        let names: Vec<Option<&str>> = cleaned
            .column("name")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(names[0], Some(" a "));
    }

    #[test]
    fn test_strip_then_mode() {
        let df = df! { "city" => &[Some(" Oslo"), Some("Oslo "), Some("Rome"), None] }.unwrap();
        let cleaned = DataCleaner::default().clean(&df).unwrap();

        let cities: Vec<Option<&str>> = cleaned
            .column("city")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(
            cities,
            vec![Some("Oslo"), Some("Oslo"), Some("Rome"), Some("Oslo")]
        );
    }

    #[test]
    fn test_alternative_strategies() {
        let options = CleaningOptions {
            numeric_na_strategy: NumericImputation::Zero,
            categorical_na_strategy: CategoricalImputation::Constant,
            ..CleaningOptions::default()
        };
        let cleaned = DataCleaner::new(options).clean(&sample()).unwrap();

        let names: Vec<Option<&str>> = cleaned
            .column("name")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(names[3], Some("unknown"));
        let score = cleaned
            .column("score")
            .unwrap()
            .as_materialized_series()
            .get(3)
            .unwrap()
            .try_extract::<f64>()
            .unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_entirely_missing_categorical_gets_sentinel() {
        let df = df! {
            "id" => &[1i64, 2],
            "note" => &[Option::<&str>::None, None],
        }
        .unwrap();
        let (cleaned, report) = DataCleaner::default().clean_with_report(&df).unwrap();

        let notes: Vec<Option<&str>> = cleaned
            .column("note")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(notes, vec![Some("unknown"), Some("unknown")]);
        assert_eq!(report.warnings.len(), 1);
    }
}
