//! Writers for the aggregated table. Each sink fully replaces its target.

use crate::constants::{self, SALES_TABLE};
use crate::error::{EtlError, Result};
use crate::table::Aggregated;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Destination for the aggregated rows.
///
/// Implementations own their output resource only for the duration of
/// `write` and must release it on every exit path.
pub trait AggregateSink {
    fn name(&self) -> &'static str;

    fn target(&self) -> &Path;

    /// Replace the target's contents with `data`, returning rows written
    fn write(&self, data: &Aggregated) -> Result<usize>;
}

/// Writes the `sales_data` table into a SQLite database file
pub struct SqliteSink {
    db_path: PathBuf,
}

impl SqliteSink {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    fn replace_table(&self, data: &Aggregated) -> Result<usize> {
        let mut conn = Connection::open(&self.db_path)?;
        let tx = conn.transaction()?;

        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table};
             CREATE TABLE {table} ({category} TEXT, {period} TEXT, {total} REAL);",
            table = SALES_TABLE,
            category = constants::OUTPUT_CATEGORY_COLUMN,
            period = constants::OUTPUT_PERIOD_COLUMN,
            total = constants::OUTPUT_TOTAL_COLUMN,
        ))?;

        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} ({}, {}, {}) VALUES (?1, ?2, ?3)",
                SALES_TABLE,
                constants::OUTPUT_CATEGORY_COLUMN,
                constants::OUTPUT_PERIOD_COLUMN,
                constants::OUTPUT_TOTAL_COLUMN,
            ))?;
            for row in data {
                stmt.execute(params![row.category, row.period, row.total_sales])?;
            }
        }

        tx.commit()?;
        debug!("Committed {} rows to {}", data.len(), SALES_TABLE);
        Ok(data.len())
    }
}

impl AggregateSink for SqliteSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn target(&self) -> &Path {
        &self.db_path
    }

    #[instrument(skip(self, data), fields(path = %self.db_path.display()))]
    fn write(&self, data: &Aggregated) -> Result<usize> {
        let written = self
            .replace_table(data)
            .map_err(|e| EtlError::sink(self.name(), e))?;
        info!("Data loaded successfully into SQLite database.");
        Ok(written)
    }
}

/// Writes a delimited file with a `category,month,sales` header
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn replace_file(&self, data: &Aggregated) -> Result<usize> {
        // Header is written by hand so an empty table still gets one
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&self.path)?;

        writer.write_record(constants::OUTPUT_COLUMNS)?;
        for row in data {
            let total = format_total(row.total_sales);
            writer.write_record([row.category.as_str(), row.period.as_str(), total.as_str()])?;
        }
        writer.flush()?;
        Ok(data.len())
    }
}

impl AggregateSink for CsvSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn target(&self) -> &Path {
        &self.path
    }

    #[instrument(skip(self, data), fields(path = %self.path.display()))]
    fn write(&self, data: &Aggregated) -> Result<usize> {
        let written = self
            .replace_file(data)
            .map_err(|e| EtlError::sink(self.name(), e))?;
        info!("Data saved successfully to CSV file.");
        Ok(written)
    }
}

/// Shortest decimal that round-trips, e.g. `100`, `150.5`
pub fn format_total(value: f64) -> String {
    value.to_string()
}
