//! Row and value sanitization.

use crate::utils::duplicate_row_flags;
use anyhow::Result;
use polars::prelude::*;
use tracing::debug;

/// Drop rows that repeat an earlier row, keeping first occurrences in order.
///
/// Returns the filtered table and the number of rows removed.
pub(crate) fn remove_duplicate_rows(df: &DataFrame) -> Result<(DataFrame, usize)> {
    let flags = duplicate_row_flags(df)?;
    let removed = flags.iter().filter(|dup| **dup).count();
    if removed == 0 {
        return Ok((df.clone(), 0));
    }

    let keep: Vec<bool> = flags.iter().map(|dup| !dup).collect();
    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    let deduped = df.filter(&mask)?;
    debug!("Removed {} duplicate rows", removed);
    Ok((deduped, removed))
}

/// Trim leading and trailing whitespace in every string column.
///
/// Returns the names of the columns in which at least one value changed.
pub(crate) fn strip_string_columns(df: &mut DataFrame) -> Result<Vec<String>> {
    let string_columns: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|col| col.dtype() == &DataType::String)
        .map(|col| col.name().to_string())
        .collect();

    let mut changed = Vec::new();
    for col_name in &string_columns {
        let (stripped, any_changed) = {
            let values = df.column(col_name)?.str()?;
            let mut any_changed = false;
            let stripped: Vec<Option<String>> = values
                .into_iter()
                .map(|opt| {
                    opt.map(|value| {
                        let trimmed = value.trim();
                        if trimmed.len() != value.len() {
                            any_changed = true;
                        }
                        trimmed.to_string()
                    })
                })
                .collect();
            (stripped, any_changed)
        };

        if any_changed {
            df.replace(col_name, Series::new(col_name.as_str().into(), stripped))?;
            debug!("Stripped whitespace in '{}'", col_name);
            changed.push(col_name.clone());
        }
    }
    Ok(changed)
}
