//! Shared helpers for column classification, value extraction and null filling.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// =============================================================================
// Column Classification
// =============================================================================

/// Logical type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Integer or floating point numbers
    Numeric,
    /// Strings and everything else that is compared by value
    Categorical,
    /// true/false
    Boolean,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
            Self::Boolean => "boolean",
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is an integer type.
#[inline]
pub fn is_integer_dtype(dtype: &DataType) -> bool {
    is_numeric_dtype(dtype) && !matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Classify a DataType.
pub fn kind_of_dtype(dtype: &DataType) -> ColumnKind {
    if is_numeric_dtype(dtype) {
        ColumnKind::Numeric
    } else if matches!(dtype, DataType::Boolean) {
        ColumnKind::Boolean
    } else {
        ColumnKind::Categorical
    }
}

/// Classify a Series.
pub fn column_kind(series: &Series) -> ColumnKind {
    kind_of_dtype(series.dtype())
}

/// Column names in table order, as owned strings.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect()
}

// =============================================================================
// Value Extraction
// =============================================================================

/// Non-null, finite values of a numeric Series as f64.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<f64>> {
    let float_series = series.cast(&DataType::Float64)?;
    Ok(float_series
        .f64()?
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect())
}

/// Every value of a Series rendered as text, preserving nulls and row order.
pub fn string_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let str_series = series.cast(&DataType::String)?;
    Ok(str_series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Value frequencies, most frequent first.
///
/// Ties keep the order in which values first appear in the column.
pub fn value_frequencies(series: &Series) -> PolarsResult<Vec<(String, usize)>> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for value in string_values(series)?.into_iter().flatten() {
        match counts.get_mut(&value) {
            Some(count) => *count += 1,
            None => {
                counts.insert(value.clone(), 1);
                order.push(value);
            }
        }
    }

    let mut frequencies: Vec<(String, usize)> = order
        .into_iter()
        .map(|value| {
            let count = counts.get(&value).copied().unwrap_or(0);
            (value, count)
        })
        .collect();
    // stable sort keeps first-seen order among equal counts
    frequencies.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(frequencies)
}

/// The most frequent non-null value of a Series, as text.
pub fn string_mode(series: &Series) -> Option<String> {
    value_frequencies(series)
        .ok()
        .and_then(|freqs| freqs.into_iter().next())
        .map(|(value, _)| value)
}

/// For every row, whether it exactly repeats an earlier row.
///
/// Values are compared by their text rendering, so a missing value only
/// matches another missing value.
pub fn duplicate_row_flags(df: &DataFrame) -> PolarsResult<Vec<bool>> {
    if df.width() == 0 {
        return Ok(vec![false; df.height()]);
    }

    let columns: Vec<Vec<Option<String>>> = df
        .get_columns()
        .iter()
        .map(|col| string_values(col.as_materialized_series()))
        .collect::<PolarsResult<_>>()?;

    let mut seen: HashSet<Vec<Option<String>>> = HashSet::with_capacity(df.height());
    let flags = (0..df.height())
        .map(|row| {
            let key: Vec<Option<String>> = columns.iter().map(|col| col[row].clone()).collect();
            !seen.insert(key)
        })
        .collect();
    Ok(flags)
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Fill null values in a numeric Series with a specific value.
///
/// The result is always Float64.
pub fn fill_numeric_nulls(series: &Series, fill_value: f64) -> PolarsResult<Series> {
    let float_series = series.cast(&DataType::Float64)?;
    let values: Vec<f64> = float_series
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(fill_value))
        .collect();
    Ok(Series::new(series.name().clone(), values))
}

/// Fill null values in a string Series with a specific value.
pub fn fill_string_nulls(series: &Series, fill_value: &str) -> PolarsResult<Series> {
    let values: Vec<String> = string_values(series)?
        .into_iter()
        .map(|v| v.unwrap_or_else(|| fill_value.to_string()))
        .collect();
    Ok(Series::new(series.name().clone(), values))
}

/// Fill null values in a boolean Series with a specific value.
pub fn fill_bool_nulls(series: &Series, fill_value: bool) -> PolarsResult<Series> {
    let values: Vec<bool> = series
        .bool()?
        .into_iter()
        .map(|v| v.unwrap_or(fill_value))
        .collect();
    Ok(Series::new(series.name().clone(), values))
}

// =============================================================================
// Naming
// =============================================================================

/// Turn an arbitrary label into a lowercase identifier of `[a-z0-9_]`.
///
/// Used for table names and output file names derived from URLs and paths.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_sep = false;
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep && !out.is_empty() {
            out.push('_');
            last_was_sep = true;
        }
    }
    let trimmed = out.trim_end_matches('_');
    if trimmed.is_empty() {
        "dataset".to_string()
    } else if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("t_{trimmed}")
    } else {
        trimmed.to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
