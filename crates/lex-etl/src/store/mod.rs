//! SQLite persistence for cleaned tables.
//!
//! Every operation opens its own connection and closes it before returning.

mod conversion;

use crate::error::{EtlError, Result};
use anyhow::{Context, bail};
use conversion::{column_values, frame_from_rows, quote_identifier, sql_type};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, params_from_iter};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

static READ_QUERY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(select|with)\b").expect("Invalid regex: read query"));

/// A single-file SQLite database holding one table per dataset.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a table, replacing any existing table with the same name.
    ///
    /// Returns the name the table was stored under.
    pub fn write(&self, df: &DataFrame, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EtlError::StoreFailed("table name must not be empty".to_string()));
        }

        self.write_internal(df, name)
            .map_err(|e| EtlError::StoreFailed(format!("{e:#}")))?;

        info!(
            "Stored {} rows in table '{}' ({})",
            df.height(),
            name,
            self.path.display()
        );
        Ok(name.to_string())
    }

    /// Names of every user table, sorted.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        self.list_tables_internal()
            .map_err(|e| EtlError::StoreFailed(format!("{e:#}")))
    }

    /// Run a read-only query and return its result as a table.
    ///
    /// Statements other than `SELECT`/`WITH` are rejected before execution.
    pub fn query(&self, sql: &str) -> Result<DataFrame> {
        if !READ_QUERY.is_match(sql) {
            return Err(EtlError::QueryFailed(
                "only SELECT queries are allowed".to_string(),
            ));
        }

        let df = self
            .query_internal(sql)
            .map_err(|e| EtlError::QueryFailed(format!("{e:#}")))?;
        debug!("Query returned {} rows", df.height());
        Ok(df)
    }

    fn open(&self) -> anyhow::Result<Connection> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        Connection::open(&self.path)
            .with_context(|| format!("cannot open database {}", self.path.display()))
    }

    fn write_internal(&self, df: &DataFrame, name: &str) -> anyhow::Result<()> {
        if df.width() == 0 {
            bail!("cannot store a table with no columns");
        }

        let table = quote_identifier(name);
        let mut definitions = Vec::with_capacity(df.width());
        let mut columns: Vec<Vec<Value>> = Vec::with_capacity(df.width());
        for col in df.get_columns() {
            let series = col.as_materialized_series();
            definitions.push(format!(
                "{} {}",
                quote_identifier(series.name()),
                sql_type(series.dtype())
            ));
            columns.push(column_values(series)?);
        }

        let placeholders = vec!["?"; df.width()].join(", ");
        let insert = format!("INSERT INTO {table} VALUES ({placeholders})");

        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({});",
            definitions.join(", ")
        ))
        .with_context(|| format!("cannot create table '{name}'"))?;
        {
            let mut stmt = tx.prepare(&insert)?;
            for row in 0..df.height() {
                stmt.execute(params_from_iter(columns.iter().map(|col| &col[row])))
                    .with_context(|| format!("cannot insert row {row}"))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn list_tables_internal(&self) -> anyhow::Result<Vec<String>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn query_internal(&self, sql: &str) -> anyhow::Result<DataFrame> {
        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("cannot open database {}", self.path.display()))?;

        let mut stmt = conn.prepare(sql)?;
        if !stmt.readonly() {
            bail!("statement would modify the database");
        }

        let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
        let width = names.len();

        let mut rows_out: Vec<Vec<Value>> = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let values = (0..width)
                .map(|idx| row.get::<_, Value>(idx))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows_out.push(values);
        }

        Ok(frame_from_rows(&names, &rows_out)?)
    }
}
