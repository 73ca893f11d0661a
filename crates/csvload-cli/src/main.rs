//! csvload - parallel CSV bulk loader for Postgres

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use csvload_core::config::{
    DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF_MS, DEFAULT_WORKERS,
};
use csvload_core::logging::{init_logging, LogConfig, LogLevel};
use csvload_core::{
    ArityPolicy, CsvSource, DeadLetter, LoadConfig, LoadReport, PgSink, Pipeline, RetryPolicy,
};
use indicatif::{ProgressBar, ProgressStyle};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "csvload")]
#[command(author, version, about = "Bulk-load a delimited file into a Postgres table")]
struct Cli {
    /// Path to the delimited input file; the first record is the header
    file: PathBuf,

    /// Target table name (optionally schema-qualified)
    #[arg(short, long)]
    table: String,

    /// Field delimiter
    #[arg(short, long, default_value_t = ',')]
    delimiter: char,

    /// Number of insert workers
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Maximum insert attempts per row
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Backoff before the first re-attempt, in milliseconds
    #[arg(long, default_value_t = DEFAULT_INITIAL_BACKOFF_MS)]
    initial_backoff_ms: u64,

    /// Backoff ceiling, in milliseconds
    #[arg(long, default_value_t = DEFAULT_MAX_BACKOFF_MS)]
    max_backoff_ms: u64,

    /// Policy for rows whose field count differs from the header
    #[arg(long, default_value_t = ArityPolicy::Abort)]
    arity: ArityPolicy,

    /// Maximum open database connections
    #[arg(long, default_value_t = 100)]
    max_connections: u32,

    /// Minimum idle database connections to keep around
    #[arg(long, default_value_t = 4)]
    min_connections: u32,

    /// Database connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    /// Write terminally failed rows to this JSON-lines file
    #[arg(long)]
    dead_letter: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging; CSVLOAD_LOG_* variables take precedence over -v
    let mut log_config = LogConfig::from_env().unwrap_or_default();
    if cli.verbose && std::env::var("CSVLOAD_LOG_LEVEL").is_err() {
        log_config.level = LogLevel::Debug;
    }
    init_logging(&log_config)?;

    let delimiter = u8::try_from(cli.delimiter as u32)
        .context("Delimiter must be a single-byte character")?;

    info!("Starting database connection");
    let pool = PgPoolOptions::new()
        .max_connections(cli.max_connections)
        .min_connections(cli.min_connections)
        .connect(&cli.database_url)
        .await
        .context("Failed to connect to the database")?;

    info!(file = %cli.file.display(), "Opening input file");
    let mut source = CsvSource::from_path(&cli.file, delimiter)
        .await
        .with_context(|| format!("Failed to open {}", cli.file.display()))?;

    let schema = source
        .read_schema()
        .await
        .context("Failed to read the header row")?;
    info!(columns = schema.len(), table = %cli.table, "Schema established from header");

    let sink = PgSink::new(pool, &cli.table, &schema);

    let config = LoadConfig {
        workers: cli.workers,
        arity: cli.arity,
        retry: RetryPolicy {
            max_attempts: cli.max_attempts,
            initial_backoff_ms: cli.initial_backoff_ms,
            max_backoff_ms: cli.max_backoff_ms,
        },
        ..LoadConfig::default()
    };

    let pipeline = Pipeline::new(config);

    let spinner = create_spinner("Loading rows...");
    let ticker = {
        let spinner = spinner.clone();
        let counter = pipeline.loaded_counter();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(250));
            loop {
                interval.tick().await;
                let loaded = counter.load(Ordering::Relaxed);
                spinner.set_message(format!("{} rows loaded", loaded));
            }
        })
    };

    let result = pipeline.run(source, schema, sink).await;

    ticker.abort();
    spinner.finish_and_clear();

    let report = result.context("Load failed")?;

    if let Some(path) = &cli.dead_letter {
        write_dead_letters(path, &report.dead_letters).await?;
    }

    report_outcome(&report);

    Ok(())
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Persist terminally failed rows as JSON lines
async fn write_dead_letters(path: &PathBuf, dead_letters: &[DeadLetter]) -> Result<()> {
    if dead_letters.is_empty() {
        return Ok(());
    }

    let mut lines = String::new();
    for dead_letter in dead_letters {
        lines.push_str(&serde_json::to_string(dead_letter)?);
        lines.push('\n');
    }

    tokio::fs::write(path, lines)
        .await
        .with_context(|| format!("Failed to write dead letters to {}", path.display()))?;

    info!(
        path = %path.display(),
        dead_letters = dead_letters.len(),
        "Wrote terminally failed rows"
    );

    Ok(())
}

fn report_outcome(report: &LoadReport) {
    if report.rows_failed > 0 {
        warn!(
            rows_failed = report.rows_failed,
            "Some rows could not be loaded; see the dead-letter output"
        );
    }

    info!(
        rows_loaded = report.rows_loaded,
        rows_skipped = report.rows_skipped,
        rows_failed = report.rows_failed,
        elapsed_secs = report.elapsed.as_secs_f64().ceil() as u64,
        "Done"
    );
}
