/// Column and path constants shared by every stage of the pipeline.
/// Input column names must match the header of the source file exactly.

// Required input columns
pub const SALES_COLUMN: &str = "sales";
pub const DATE_COLUMN: &str = "date";
pub const CATEGORY_COLUMN: &str = "category";

pub const REQUIRED_COLUMNS: [&str; 3] = [SALES_COLUMN, DATE_COLUMN, CATEGORY_COLUMN];

// Output columns. The period label keeps the historical `month` name even though
// it carries the full calendar date, and the total keeps the `sales` name.
pub const OUTPUT_CATEGORY_COLUMN: &str = "category";
pub const OUTPUT_PERIOD_COLUMN: &str = "month";
pub const OUTPUT_TOTAL_COLUMN: &str = "sales";

pub const OUTPUT_COLUMNS: [&str; 3] = [
    OUTPUT_CATEGORY_COLUMN,
    OUTPUT_PERIOD_COLUMN,
    OUTPUT_TOTAL_COLUMN,
];

/// Table replaced by the relational sink on every run
pub const SALES_TABLE: &str = "sales_data";

// Default locations used when neither config file, env nor CLI supply one
pub const DEFAULT_INPUT_PATH: &str = "input_sales_data.csv";
pub const DEFAULT_DB_PATH: &str = "sales_data.db";
pub const DEFAULT_OUTPUT_PATH: &str = "transformed_sales_data.csv";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_CONFIG_FILE: &str = "sales_etl.toml";

// Environment overrides
pub const ENV_INPUT_PATH: &str = "SALES_ETL_INPUT";
pub const ENV_DB_PATH: &str = "SALES_ETL_DB";
pub const ENV_OUTPUT_PATH: &str = "SALES_ETL_OUTPUT";
pub const ENV_LOG_DIR: &str = "SALES_ETL_LOG_DIR";

/// Field values the reader treats as missing, in addition to the empty string
pub const NA_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// True when a raw field should be read as null
pub fn is_na(value: &str) -> bool {
    value.is_empty() || NA_MARKERS.contains(&value)
}
