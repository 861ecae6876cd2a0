//! CSV parsing with structural validation.

use anyhow::{Context, bail};
use polars::prelude::*;
use std::io::Cursor;

/// Parse CSV bytes into a DataFrame.
///
/// The input must have a header row and every record must have as many
/// fields as the header. Column types are inferred from all rows.
pub(crate) fn parse_csv(bytes: Vec<u8>) -> anyhow::Result<DataFrame> {
    validate_structure(&bytes)?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .context("CSV content could not be read as a table")?;

    Ok(df)
}

/// Check the shape of the input before handing it to polars.
///
/// Polars is lenient with ragged rows; a dataset with inconsistent widths is
/// rejected here instead of being silently padded.
fn validate_structure(bytes: &[u8]) -> anyhow::Result<()> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        bail!("input is empty");
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(bytes);

    let headers = reader.headers().context("header row is unreadable")?.clone();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        bail!("no header row");
    }

    let mut seen = std::collections::HashSet::new();
    for name in headers.iter() {
        if !seen.insert(name) {
            bail!("duplicate column name '{name}' in header");
        }
    }

    for record in reader.records() {
        record.context("inconsistent row width")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_infers_types() {
        let df = parse_csv(b"id,name,score\n1,Alice,3.5\n2,Bob,\n".to_vec()).unwrap();
        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.column("id").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("score").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("name").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("score").unwrap().null_count(), 1);
    }

    #[test]
    fn test_parse_csv_header_only() {
        let df = parse_csv(b"a,b,c\n".to_vec()).unwrap();
        assert_eq!(df.shape(), (0, 3));
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let err = parse_csv(b"a,b,c\n1,2,3\n4,5\n".to_vec()).unwrap_err();
        assert!(format!("{err:#}").contains("inconsistent row width"));
    }

    #[test]
    fn test_rejects_empty_input() {
        assert!(parse_csv(Vec::new()).is_err());
        assert!(parse_csv(b"  \n\n".to_vec()).is_err());
    }

    #[test]
    fn test_rejects_duplicate_headers() {
        let err = parse_csv(b"a,a\n1,2\n".to_vec()).unwrap_err();
        assert!(err.to_string().contains("duplicate column name"));
    }
}
