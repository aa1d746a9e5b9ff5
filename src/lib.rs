pub mod constants;
pub mod config;
pub mod error;
pub mod logging;

// Pipeline stages, in the order they run
pub mod table;
pub mod reader;
pub mod cleaner;
pub mod aggregator;
pub mod sink;
pub mod pipeline;

pub use error::{EtlError, Result};
pub use pipeline::{run_pipeline, Pipeline, PipelineResult, PipelineStage, SinkOutcome};
