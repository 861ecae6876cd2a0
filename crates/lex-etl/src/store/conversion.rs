//! Conversion between polars columns and SQLite values.

use crate::utils::{is_integer_dtype, is_numeric_dtype, string_values};
use polars::prelude::*;
use rusqlite::types::Value;
use std::collections::HashSet;

/// SQLite column type for a polars dtype.
pub(crate) fn sql_type(dtype: &DataType) -> &'static str {
    if is_integer_dtype(dtype) {
        "INTEGER"
    } else if is_numeric_dtype(dtype) {
        "REAL"
    } else if matches!(dtype, DataType::Boolean) {
        "INTEGER"
    } else {
        "TEXT"
    }
}

/// Quote an identifier for use in SQL.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Every value of a column as an SQLite value, in row order.
pub(crate) fn column_values(series: &Series) -> PolarsResult<Vec<Value>> {
    let dtype = series.dtype();
    let values = if is_integer_dtype(dtype) {
        series
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, Value::Integer))
            .collect()
    } else if is_numeric_dtype(dtype) {
        series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| match v {
                Some(f) if f.is_finite() => Value::Real(f),
                _ => Value::Null,
            })
            .collect()
    } else if matches!(dtype, DataType::Boolean) {
        series
            .bool()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, |b| Value::Integer(i64::from(b))))
            .collect()
    } else {
        string_values(series)?
            .into_iter()
            .map(|v| v.map_or(Value::Null, Value::Text))
            .collect()
    };
    Ok(values)
}

/// Build a DataFrame from query results.
///
/// A column whose non-null values are all integers becomes Int64; integers
/// mixed with reals become Float64; anything else becomes String.
/// Repeated result names get a numeric suffix (`id`, `id_1`, ...).
pub(crate) fn frame_from_rows(names: &[String], rows: &[Vec<Value>]) -> PolarsResult<DataFrame> {
    let columns: Vec<Column> = unique_names(names)
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let values = rows.iter().map(move |row| &row[idx]);
            Column::from(column_from_values(name, values))
        })
        .collect();
    DataFrame::new(columns)
}

fn unique_names(names: &[String]) -> Vec<String> {
    let mut taken: HashSet<String> = names.iter().cloned().collect();
    let mut seen: HashSet<&str> = HashSet::new();

    names
        .iter()
        .map(|name| {
            if seen.insert(name.as_str()) {
                return name.clone();
            }
            let renamed = (1..)
                .map(|suffix| format!("{name}_{suffix}"))
                .find(|candidate| !taken.contains(candidate))
                .unwrap_or_else(|| name.clone());
            taken.insert(renamed.clone());
            renamed
        })
        .collect()
}

fn column_from_values<'a>(name: &str, values: impl Iterator<Item = &'a Value> + Clone) -> Series {
    let mut saw_integer = false;
    let mut saw_real = false;
    let mut saw_other = false;
    for value in values.clone() {
        match value {
            Value::Null => {}
            Value::Integer(_) => saw_integer = true,
            Value::Real(_) => saw_real = true,
            Value::Text(_) | Value::Blob(_) => saw_other = true,
        }
    }

    if !saw_other && saw_integer && !saw_real {
        let data: Vec<Option<i64>> = values
            .map(|v| match v {
                Value::Integer(i) => Some(*i),
                _ => None,
            })
            .collect();
        Series::new(name.into(), data)
    } else if !saw_other && saw_real {
        let data: Vec<Option<f64>> = values
            .map(|v| match v {
                Value::Integer(i) => Some(*i as f64),
                Value::Real(f) => Some(*f),
                _ => None,
            })
            .collect();
        Series::new(name.into(), data)
    } else {
        let data: Vec<Option<String>> = values.map(value_to_text).collect();
        Series::new(name.into(), data)
    }
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s.clone()),
        Value::Blob(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
    }
}
