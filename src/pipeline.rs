use crate::aggregator;
use crate::cleaner;
use crate::config::EtlConfig;
use crate::reader;
use crate::sink::{AggregateSink, CsvSink, SqliteSink};
use crate::table::Aggregated;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Linear run states. The only shortcut is Read -> Done when ingestion fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineStage {
    Start,
    Read,
    Clean,
    Aggregate,
    Load,
    Done,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Start => "start",
            PipelineStage::Read => "read",
            PipelineStage::Clean => "clean",
            PipelineStage::Aggregate => "aggregate",
            PipelineStage::Load => "load",
            PipelineStage::Done => "done",
        }
    }
}

/// What one sink did during the load stage
#[derive(Debug, Clone, Serialize)]
pub struct SinkOutcome {
    pub sink: String,
    pub target: String,
    pub rows_written: usize,
    pub error: Option<String>,
}

impl SinkOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub input_path: String,
    /// States visited, in order, always starting at `Start` and ending at `Done`
    pub stages: Vec<PipelineStage>,
    /// Last state entered; `Done` once the run returns
    pub final_stage: PipelineStage,
    /// Set when ingestion failed and the run skipped straight to `Done`
    pub halted_reason: Option<String>,
    pub rows_read: usize,
    pub rows_cleaned: usize,
    pub rows_dropped: usize,
    pub groups: usize,
    pub total_sales: f64,
    pub sinks: Vec<SinkOutcome>,
}

impl PipelineResult {
    fn new(input_path: &Path) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            input_path: input_path.display().to_string(),
            stages: Vec::new(),
            final_stage: PipelineStage::Start,
            halted_reason: None,
            rows_read: 0,
            rows_cleaned: 0,
            rows_dropped: 0,
            groups: 0,
            total_sales: 0.0,
            sinks: Vec::new(),
        }
    }

    fn enter(&mut self, stage: PipelineStage) {
        info!(stage = stage.as_str(), "Pipeline stage");
        self.stages.push(stage);
        self.final_stage = stage;
    }

    pub fn halted(&self) -> bool {
        self.halted_reason.is_some()
    }

    pub fn sink_failures(&self) -> usize {
        self.sinks.iter().filter(|s| !s.is_success()).count()
    }

    /// 0 on success, 1 when ingestion halted the run, 2 when a sink failed
    pub fn exit_code(&self) -> i32 {
        if self.halted() {
            1
        } else if self.sink_failures() > 0 {
            2
        } else {
            0
        }
    }
}

/// Read -> Clean -> Aggregate -> Load over one input file and a set of sinks
pub struct Pipeline {
    input_path: PathBuf,
    sinks: Vec<Box<dyn AggregateSink>>,
}

impl Pipeline {
    /// Pipeline writing to a SQLite database and a delimited file
    pub fn new(
        input_path: impl Into<PathBuf>,
        db_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self::with_sinks(
            input_path,
            vec![
                Box::new(SqliteSink::new(db_path)),
                Box::new(CsvSink::new(output_path)),
            ],
        )
    }

    pub fn from_config(config: &EtlConfig) -> Self {
        Self::new(
            config.input_path.clone(),
            config.db_path.clone(),
            config.output_path.clone(),
        )
    }

    pub fn with_sinks(input_path: impl Into<PathBuf>, sinks: Vec<Box<dyn AggregateSink>>) -> Self {
        Self {
            input_path: input_path.into(),
            sinks,
        }
    }

    /// Run every stage once. Never fails: ingestion errors halt the run and
    /// sink errors are collected per sink.
    #[instrument(skip(self), fields(input = %self.input_path.display()))]
    pub fn run(&self) -> PipelineResult {
        let mut result = PipelineResult::new(&self.input_path);
        counter!("sales_etl_pipeline_runs_total").increment(1);
        let t_pipeline = Instant::now();

        result.enter(PipelineStage::Start);

        // Step 1: Read
        result.enter(PipelineStage::Read);
        let t_stage = Instant::now();
        // The reader logs the cause; `None` means there is nothing to clean
        let Some(raw) = reader::read_data(&self.input_path) else {
            counter!("sales_etl_ingest_failures_total").increment(1);
            result.halted_reason = Some(format!("no data read from {}", self.input_path.display()));
            return self.finish(result, t_pipeline);
        };
        record_stage(PipelineStage::Read, t_stage);
        result.rows_read = raw.len();

        // Step 2: Clean
        result.enter(PipelineStage::Clean);
        let t_stage = Instant::now();
        let report = cleaner::clean_table(raw);
        record_stage(PipelineStage::Clean, t_stage);
        result.rows_dropped = report.dropped();
        result.rows_cleaned = report.table.len();

        // Step 3: Aggregate
        result.enter(PipelineStage::Aggregate);
        let t_stage = Instant::now();
        let aggregated = aggregator::aggregate(&report.table);
        record_stage(PipelineStage::Aggregate, t_stage);
        result.groups = aggregated.len();
        result.total_sales = aggregated.total_sales();

        // Step 4: Load, every sink is attempted regardless of the others
        result.enter(PipelineStage::Load);
        let t_stage = Instant::now();
        result.sinks = self.load(&aggregated);
        record_stage(PipelineStage::Load, t_stage);

        self.finish(result, t_pipeline)
    }

    fn load(&self, aggregated: &Aggregated) -> Vec<SinkOutcome> {
        self.sinks
            .iter()
            .map(|sink| {
                let target = sink.target().display().to_string();
                match sink.write(aggregated) {
                    Ok(rows_written) => SinkOutcome {
                        sink: sink.name().to_string(),
                        target,
                        rows_written,
                        error: None,
                    },
                    Err(e) => {
                        error!("Error loading data into {} sink at {}: {}", sink.name(), target, e);
                        counter!("sales_etl_sink_failures_total", "sink" => sink.name()).increment(1);
                        SinkOutcome {
                            sink: sink.name().to_string(),
                            target,
                            rows_written: 0,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .collect()
    }

    fn finish(&self, mut result: PipelineResult, started: Instant) -> PipelineResult {
        result.enter(PipelineStage::Done);
        result.finished_at = Utc::now();
        histogram!("sales_etl_pipeline_duration_seconds").record(started.elapsed().as_secs_f64());

        if result.halted() {
            warn!("Pipeline halted before cleaning; no sink was written");
        } else {
            info!(
                "Pipeline finished: {} rows read, {} kept, {} groups, {} sink failures",
                result.rows_read,
                result.rows_cleaned,
                result.groups,
                result.sink_failures()
            );
        }
        result
    }
}

fn record_stage(stage: PipelineStage, started: Instant) {
    histogram!("sales_etl_stage_duration_seconds", "stage" => stage.as_str())
        .record(started.elapsed().as_secs_f64());
}

/// Run the whole pipeline once for the three paths
pub fn run_pipeline(input_path: &Path, db_path: &Path, output_path: &Path) -> PipelineResult {
    Pipeline::new(input_path, db_path, output_path).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EtlError, Result};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records what it was asked to write, or fails when told to
    struct MockSink {
        name: &'static str,
        target: PathBuf,
        fail: bool,
        writes: Rc<RefCell<Vec<usize>>>,
    }

    impl MockSink {
        fn new(name: &'static str, fail: bool) -> (Self, Rc<RefCell<Vec<usize>>>) {
            let writes = Rc::new(RefCell::new(Vec::new()));
            let sink = Self {
                name,
                target: PathBuf::from(name),
                fail,
                writes: writes.clone(),
            };
            (sink, writes)
        }
    }

    impl AggregateSink for MockSink {
        fn name(&self) -> &'static str {
            self.name
        }

        fn target(&self) -> &Path {
            &self.target
        }

        fn write(&self, data: &Aggregated) -> Result<usize> {
            if self.fail {
                return Err(EtlError::sink(self.name, EtlError::Config("locked".into())));
            }
            self.writes.borrow_mut().push(data.len());
            Ok(data.len())
        }
    }

    fn write_input(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("input.csv");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_full_run_visits_every_stage() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(
            dir.path(),
            "sales,date,category\n100,2024-01-01,A\n200,2024-02-02,B\n,invalid_date,A\n300,2024-03-03,B\n",
        );
        let (sink, writes) = MockSink::new("mock", false);

        let result = Pipeline::with_sinks(&input, vec![Box::new(sink)]).run();

        assert_eq!(
            result.stages,
            vec![
                PipelineStage::Start,
                PipelineStage::Read,
                PipelineStage::Clean,
                PipelineStage::Aggregate,
                PipelineStage::Load,
                PipelineStage::Done,
            ]
        );
        assert_eq!(result.rows_read, 4);
        assert_eq!(result.rows_cleaned, 3);
        assert_eq!(result.rows_dropped, 1);
        assert_eq!(result.groups, 3);
        assert_eq!(result.total_sales, 600.0);
        assert_eq!(*writes.borrow(), vec![3]);
        assert_eq!(result.exit_code(), 0);
    }

    #[test]
    fn test_missing_input_halts_without_touching_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, writes) = MockSink::new("mock", false);

        let result = Pipeline::with_sinks(dir.path().join("nope.csv"), vec![Box::new(sink)]).run();

        assert!(result.halted());
        assert_eq!(
            result.stages,
            vec![PipelineStage::Start, PipelineStage::Read, PipelineStage::Done]
        );
        assert_eq!(result.final_stage, PipelineStage::Done);
        assert!(result.halted_reason.as_deref().unwrap().contains("nope.csv"));
        assert!(result.input_path.ends_with("nope.csv"));
        assert!(result.sinks.is_empty());
        assert!(writes.borrow().is_empty());
        assert_eq!(result.exit_code(), 1);
    }

    #[test]
    fn test_failing_sink_does_not_stop_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "sales,date,category\n5,2024-01-01,A\n");
        let (broken, _) = MockSink::new("broken", true);
        let (healthy, writes) = MockSink::new("healthy", false);

        let result = Pipeline::with_sinks(&input, vec![Box::new(broken), Box::new(healthy)]).run();

        assert_eq!(result.sinks.len(), 2);
        assert!(!result.sinks[0].is_success());
        assert!(result.sinks[0].error.as_deref().unwrap().contains("locked"));
        assert!(result.sinks[1].is_success());
        assert_eq!(*writes.borrow(), vec![1]);
        assert_eq!(result.exit_code(), 2);
    }

    #[test]
    fn test_result_serializes_to_json() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "sales,date,category\n");
        let result = Pipeline::with_sinks(&input, Vec::new()).run();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["rows_read"], 0);
        assert_eq!(json["stages"][0], "Start");
        assert_eq!(json["final_stage"], "Done");
        assert!(json["halted_reason"].is_null());
    }
}
