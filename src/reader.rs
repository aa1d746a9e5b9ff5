//! Reader stage: loads the whole source file into a [`Table`] of [`RawRecord`]s.

use crate::constants::{self, is_na};
use crate::error::{EtlError, Result};
use crate::table::{RawRecord, Table};
use csv::StringRecord;
use metrics::counter;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, error, info, instrument};

/// Positions of the required columns within the header
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    sales: usize,
    date: usize,
    category: usize,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| EtlError::MissingColumn(name.to_string()))
        };
        Ok(Self {
            sales: find(constants::SALES_COLUMN)?,
            date: find(constants::DATE_COLUMN)?,
            category: find(constants::CATEGORY_COLUMN)?,
        })
    }

    fn is_required(&self, idx: usize) -> bool {
        idx == self.sales || idx == self.date || idx == self.category
    }
}

/// Read a delimited file into a table, keeping column names and row order.
///
/// Any failure is wrapped as [`EtlError::Ingest`] with the path and cause.
#[instrument(skip(path), fields(path = %path.display()))]
pub fn read_table(path: &Path) -> Result<Table<RawRecord>> {
    let file = File::open(path).map_err(|e| EtlError::ingest(path, e.into()))?;
    let table = parse_table(file).map_err(|e| EtlError::ingest(path, e))?;
    counter!("sales_etl_rows_read_total").increment(table.len() as u64);
    info!("Read {} rows with columns {:?}", table.len(), table.columns());
    Ok(table)
}

/// Reader contract for the pipeline driver: the table, or `None` after logging
/// why nothing could be read.
pub fn read_data(path: &Path) -> Option<Table<RawRecord>> {
    match read_table(path) {
        Ok(table) => Some(table),
        Err(e) => {
            error!("Error reading the file: {}", e);
            None
        }
    }
}

/// Parse delimited text from any reader. The first record is the header.
pub fn parse_table<R: Read>(source: R) -> Result<Table<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(source);

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(EtlError::EmptyInput("no header row".to_string()));
    }
    let index = ColumnIndex::resolve(&headers)?;
    let width = headers.len();

    let columns: Vec<String> = headers.iter().map(str::to_string).collect();
    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result?;
        if record.len() > width {
            return Err(EtlError::MalformedRow {
                line: record.position().map(|p| p.line()).unwrap_or_default(),
                expected: width,
                found: record.len(),
            });
        }
        rows.push(to_raw_record(&record, index, width));
    }

    debug!("Parsed {} data rows", rows.len());
    Ok(Table::new(columns, rows))
}

fn to_raw_record(record: &StringRecord, index: ColumnIndex, width: usize) -> RawRecord {
    // Short rows are padded with nulls
    let text = |i: usize| {
        record
            .get(i)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    // NA markers only mean "missing" in the columns that get parsed; a category
    // or free-text column may legitimately hold "NA" or "None"
    let value = |i: usize| text(i).filter(|v| !is_na(v));

    RawRecord {
        sales: value(index.sales),
        date: value(index.date),
        category: text(index.category),
        extra: (0..width)
            .filter(|i| !index.is_required(*i))
            .map(text)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_preserves_columns_and_order() {
        let data = "region,sales,date,category\nwest,100,2024-01-01,A\neast,200,2024-02-02,B\n";
        let table = parse_table(data.as_bytes()).unwrap();

        assert_eq!(table.columns(), &["region", "sales", "date", "category"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].sales.as_deref(), Some("100"));
        assert_eq!(table.rows()[0].extra, vec![Some("west".to_string())]);
        assert_eq!(table.rows()[1].category.as_deref(), Some("B"));
    }

    #[test]
    fn test_na_markers_and_empty_fields_are_null() {
        let data = "sales,date,category\n,2024-01-01,A\nNone,NaN,\nN/A,2024-01-02,B\n";
        let table = parse_table(data.as_bytes()).unwrap();

        assert_eq!(table.rows()[0].sales, None);
        assert_eq!(table.rows()[1].sales, None);
        assert_eq!(table.rows()[1].date, None);
        assert_eq!(table.rows()[1].category, None);
        assert_eq!(table.rows()[2].sales, None);
    }

    #[test]
    fn test_na_like_category_is_kept() {
        let data = "region,sales,date,category
NA,100,2024-01-01,NA
null,200,2024-01-02,None
,300,2024-01-03,
";
        let table = parse_table(data.as_bytes()).unwrap();

        assert_eq!(table.rows()[0].category.as_deref(), Some("NA"));
        assert_eq!(table.rows()[0].extra, vec![Some("NA".to_string())]);
        assert_eq!(table.rows()[1].category.as_deref(), Some("None"));
        assert_eq!(table.rows()[1].extra, vec![Some("null".to_string())]);
        assert_eq!(table.rows()[2].category, None);
        assert_eq!(table.rows()[2].extra, vec![None]);
    }

    #[test]
    fn test_whitespace_is_kept_for_the_cleaner() {
        let data = "sales,date,category\n\" 150 \",2024-01-01,A\n";
        let table = parse_table(data.as_bytes()).unwrap();
        assert_eq!(table.rows()[0].sales.as_deref(), Some(" 150 "));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let data = "sales,date,category\n100,2024-01-01\n";
        let table = parse_table(data.as_bytes()).unwrap();
        assert_eq!(table.rows()[0].category, None);
    }

    #[test]
    fn test_long_rows_are_malformed() {
        let data = "sales,date,category\n100,2024-01-01,A,extra\n";
        let err = parse_table(data.as_bytes()).unwrap_err();
        assert!(matches!(err, EtlError::MalformedRow { expected: 3, found: 4, .. }));
    }

    #[test]
    fn test_missing_required_column() {
        let data = "sales,category\n100,A\n";
        let err = parse_table(data.as_bytes()).unwrap_err();
        assert!(matches!(err, EtlError::MissingColumn(ref c) if c == "date"));
    }

    #[test]
    fn test_empty_input_is_error() {
        let err = parse_table("".as_bytes()).unwrap_err();
        assert!(matches!(err, EtlError::EmptyInput(_)));
    }

    #[test]
    fn test_header_only_is_empty_table() {
        let table = parse_table("sales,date,category\n".as_bytes()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns().len(), 3);
    }

    #[test]
    fn test_invalid_utf8_is_error() {
        let mut data = b"sales,date,category\n".to_vec();
        data.extend_from_slice(&[0xff, 0xfe, b',', b'x', b',', b'y', b'\n']);
        assert!(parse_table(data.as_slice()).is_err());
    }

    #[test]
    fn test_read_table_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "sales,date,category").unwrap();
        writeln!(file, "100,2024-01-01,A").unwrap();
        drop(file);

        let table = read_table(&path).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_missing_file_yields_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.csv");

        let err = read_table(&path).unwrap_err();
        assert!(matches!(err, EtlError::Ingest { .. }));
        assert!(err.to_string().contains("missing.csv"));
        assert!(read_data(&path).is_none());
    }
}
