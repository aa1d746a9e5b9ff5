use clap::Parser;
use sales_etl::config::EtlConfig;
use sales_etl::logging;
use sales_etl::{Pipeline, PipelineResult};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "sales_etl")]
#[command(about = "Ingest sales records, clean them, aggregate by category and date, and load the result")]
#[command(version = "0.1.0")]
struct Cli {
    /// Source delimited file (needs `sales`, `date` and `category` columns)
    #[arg(long)]
    input: Option<PathBuf>,

    /// SQLite database that receives the `sales_data` table
    #[arg(long)]
    db: Option<PathBuf>,

    /// Delimited output file
    #[arg(long)]
    output: Option<PathBuf>,

    /// TOML config file (defaults to ./sales_etl.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for rolling JSON logs
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Print the run result as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply(&self, config: &mut EtlConfig) {
        if let Some(p) = &self.input {
            config.input_path = p.clone();
        }
        if let Some(p) = &self.db {
            config.db_path = p.clone();
        }
        if let Some(p) = &self.output {
            config.output_path = p.clone();
        }
        if let Some(p) = &self.log_dir {
            config.log_dir = p.clone();
        }
    }

    /// Where to log when the config itself could not be loaded
    fn fallback_log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| EtlConfig::default().log_dir)
    }
}

fn print_summary(result: &PipelineResult) {
    if let Some(reason) = &result.halted_reason {
        println!("❌ Pipeline halted: {}", reason);
        return;
    }

    println!("\n📊 Pipeline Results ({}):", result.run_id);
    println!("   Rows read: {}", result.rows_read);
    println!("   Rows kept: {}", result.rows_cleaned);
    println!("   Rows dropped: {}", result.rows_dropped);
    println!("   Groups: {}", result.groups);
    println!("   Total sales: {}", result.total_sales);
    for sink in &result.sinks {
        match &sink.error {
            None => println!("   ✅ {} -> {} ({} rows)", sink.sink, sink.target, sink.rows_written),
            Some(e) => println!("   ⚠️  {} -> {} failed: {}", sink.sink, sink.target, e),
        }
    }
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match EtlConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let guard = logging::init_logging(&cli.fallback_log_dir());
            error!("Failed to load configuration: {}", e);
            drop(guard);
            return Err(e.into());
        }
    };
    cli.apply(&mut config);

    let guard = logging::init_logging(&config.log_dir);
    info!(?config, "Starting sales ETL run");

    let result = Pipeline::from_config(&config).run();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    let code = result.exit_code();
    if code != 0 {
        // Flush file logs before exiting
        drop(guard);
        std::process::exit(code);
    }
    Ok(())
}
