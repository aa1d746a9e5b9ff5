use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Malformed row at line {line}: expected {expected} fields, found {found}")]
    MalformedRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("Failed to read '{}': {source}", .path.display())]
    Ingest {
        path: PathBuf,
        #[source]
        source: Box<EtlError>,
    },

    #[error("Sink '{sink}' failed: {source}")]
    Sink {
        sink: String,
        #[source]
        source: Box<EtlError>,
    },
}

impl EtlError {
    pub fn ingest(path: impl Into<PathBuf>, source: EtlError) -> Self {
        EtlError::Ingest {
            path: path.into(),
            source: Box::new(source),
        }
    }

    pub fn sink(sink: impl Into<String>, source: EtlError) -> Self {
        EtlError::Sink {
            sink: sink.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
