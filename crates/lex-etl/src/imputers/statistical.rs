//! Statistical imputation methods.
//!
//! Provides median, mean, zero, mode and constant fills. Every method leaves
//! columns without missing values untouched.

use crate::config::{CategoricalImputation, NumericImputation};
use crate::types::CleaningReport;
use crate::utils::{fill_bool_nulls, fill_numeric_nulls, fill_string_nulls, string_mode};
use anyhow::Result;
use polars::prelude::*;
use tracing::{debug, warn};

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill a numeric column with the chosen statistic.
    ///
    /// A column with no observed values is zero-filled and a warning recorded.
    pub fn impute_numeric(
        df: &mut DataFrame,
        col_name: &str,
        strategy: NumericImputation,
        report: &mut CleaningReport,
    ) -> Result<()> {
        let series = df.column(col_name)?.as_materialized_series().clone();
        if series.null_count() == 0 {
            return Ok(());
        }

        let statistic = match strategy {
            NumericImputation::Median => series.median(),
            NumericImputation::Mean => series.mean(),
            NumericImputation::Zero => Some(0.0),
        };

        let (fill_value, label) = match statistic {
            Some(value) if value.is_finite() => (value, strategy_label(strategy)),
            _ => {
                let warning = format!(
                    "Column '{}' has no observed values; filled with 0",
                    col_name
                );
                warn!("{}", warning);
                report.add_warning(warning);
                (0.0, "zero")
            }
        };

        let missing = series.null_count();
        let filled = fill_numeric_nulls(&series, fill_value)?;
        df.replace(col_name, filled)?;

        debug!(
            "Filled {} missing values in '{}' with {} ({})",
            missing, col_name, label, fill_value
        );
        report
            .imputations
            .push((col_name.to_string(), format!("{label}: {fill_value}")));
        report.add_action(format!(
            "Filled {} missing values in '{}' with {} ({})",
            missing, col_name, label, fill_value
        ));
        Ok(())
    }

    /// Fill a categorical column with its mode or the sentinel.
    ///
    /// A column with no observed values always receives the sentinel.
    pub fn impute_categorical(
        df: &mut DataFrame,
        col_name: &str,
        strategy: CategoricalImputation,
        sentinel: &str,
        report: &mut CleaningReport,
    ) -> Result<()> {
        let series = df.column(col_name)?.as_materialized_series().clone();
        if series.null_count() == 0 {
            return Ok(());
        }

        let (fill_value, label) = match strategy {
            CategoricalImputation::Constant => (sentinel.to_string(), "constant"),
            CategoricalImputation::Mode => match string_mode(&series) {
                Some(mode) => (mode, "mode"),
                None => {
                    let warning = format!(
                        "Column '{}' has no observed values; filled with '{}'",
                        col_name, sentinel
                    );
                    warn!("{}", warning);
                    report.add_warning(warning);
                    (sentinel.to_string(), "constant")
                }
            },
        };

        let missing = series.null_count();
        let filled = fill_string_nulls(&series, &fill_value)?;
        df.replace(col_name, filled)?;

        debug!(
            "Filled {} missing values in '{}' with {} '{}'",
            missing, col_name, label, fill_value
        );
        report
            .imputations
            .push((col_name.to_string(), format!("{label}: {fill_value}")));
        report.add_action(format!(
            "Filled {} missing values in '{}' with {} '{}'",
            missing, col_name, label, fill_value
        ));
        Ok(())
    }

    /// Fill a boolean column with its most frequent value.
    ///
    /// Ties go to the value seen first; an entirely missing column becomes
    /// `false` with a warning.
    pub fn impute_boolean(
        df: &mut DataFrame,
        col_name: &str,
        report: &mut CleaningReport,
    ) -> Result<()> {
        let series = df.column(col_name)?.as_materialized_series().clone();
        if series.null_count() == 0 {
            return Ok(());
        }

        let fill_value = match bool_mode(series.bool()?) {
            Some(value) => value,
            None => {
                let warning = format!(
                    "Column '{}' has no observed values; filled with false",
                    col_name
                );
                warn!("{}", warning);
                report.add_warning(warning);
                false
            }
        };

        let missing = series.null_count();
        let filled = fill_bool_nulls(&series, fill_value)?;
        df.replace(col_name, filled)?;

        report
            .imputations
            .push((col_name.to_string(), format!("mode: {fill_value}")));
        report.add_action(format!(
            "Filled {} missing values in '{}' with mode ({})",
            missing, col_name, fill_value
        ));
        Ok(())
    }
}

fn strategy_label(strategy: NumericImputation) -> &'static str {
    match strategy {
        NumericImputation::Median => "median",
        NumericImputation::Mean => "mean",
        NumericImputation::Zero => "zero",
    }
}

fn bool_mode(values: &BooleanChunked) -> Option<bool> {
    let mut trues = 0usize;
    let mut falses = 0usize;
    let mut first = None;
    for value in values.into_iter().flatten() {
        first.get_or_insert(value);
        if value {
            trues += 1;
        } else {
            falses += 1;
        }
    }
    match trues.cmp(&falses) {
        std::cmp::Ordering::Greater => Some(true),
        std::cmp::Ordering::Less => Some(false),
        std::cmp::Ordering::Equal => first,
    }
}
