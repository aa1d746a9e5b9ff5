use crate::constants;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Ordered rows sharing one column set; the unit handed between stages.
///
/// Each stage consumes a table and builds a new one, nothing is edited in place
/// once it has been handed on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table<R> {
    columns: Vec<String>,
    rows: Vec<R>,
}

impl<R> Table<R> {
    pub fn new(columns: Vec<String>, rows: Vec<R>) -> Self {
        Self { columns, rows }
    }

    /// A table with the given shape and no rows
    pub fn empty(columns: Vec<String>) -> Self {
        Self::new(columns, Vec::new())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.rows.iter()
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<R>) {
        (self.columns, self.rows)
    }
}

impl<'a, R> IntoIterator for &'a Table<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// One input row as read from the source file. `None` means the field was
/// empty, or held an NA marker in `sales` or `date`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawRecord {
    pub sales: Option<String>,
    pub date: Option<String>,
    pub category: Option<String>,
    /// Values of the non-required columns, in header order
    pub extra: Vec<Option<String>>,
}

impl RawRecord {
    pub fn new(sales: Option<&str>, date: Option<&str>, category: Option<&str>) -> Self {
        Self {
            sales: sales.map(str::to_string),
            date: date.map(str::to_string),
            category: category.map(str::to_string),
            extra: Vec::new(),
        }
    }
}

/// A row that survived cleaning: `sales` and `date` are always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub sales: f64,
    pub date: NaiveDate,
    pub category: String,
    pub extra: Vec<Option<String>>,
}

/// Total sales for one (category, period label) key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub category: String,
    #[serde(rename = "month")]
    pub period: String,
    #[serde(rename = "sales")]
    pub total_sales: f64,
}

/// Output of the aggregator; always carries the `category, month, sales` columns.
pub type Aggregated = Table<AggregateRow>;

impl Table<AggregateRow> {
    pub fn from_rows(rows: Vec<AggregateRow>) -> Self {
        Table::new(output_columns(), rows)
    }

    pub fn total_sales(&self) -> f64 {
        self.rows.iter().map(|r| r.total_sales).sum()
    }
}

pub fn output_columns() -> Vec<String> {
    constants::OUTPUT_COLUMNS.iter().map(|c| c.to_string()).collect()
}
