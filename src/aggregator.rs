//! Aggregator stage: total sales per (category, period label).

use crate::table::{Aggregated, AggregateRow, SalesRecord, Table};
use chrono::NaiveDate;
use metrics::counter;
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Grouping label for a date.
///
/// This is the full calendar date (`2024-01-15`), not the month it falls in,
/// even though the output column is called `month`. Downstream consumers key
/// on the exact date, so the granularity must stay as is.
pub fn period_label(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Group cleaned rows by (category, period label) and sum `sales`.
///
/// One output row per distinct key. Rows come out sorted by key, but callers
/// should treat the order as unspecified.
#[instrument(skip(table), fields(rows = table.len()))]
pub fn aggregate(table: &Table<SalesRecord>) -> Aggregated {
    let mut totals: BTreeMap<(String, String), f64> = BTreeMap::new();

    for record in table {
        let key = (record.category.clone(), period_label(record.date));
        *totals.entry(key).or_insert(0.0) += record.sales;
    }

    let rows: Vec<AggregateRow> = totals
        .into_iter()
        .map(|((category, period), total_sales)| AggregateRow {
            category,
            period,
            total_sales,
        })
        .collect();

    counter!("sales_etl_groups_total").increment(rows.len() as u64);
    info!("Aggregated {} rows into {} groups", table.len(), rows.len());

    Aggregated::from_rows(rows)
}
