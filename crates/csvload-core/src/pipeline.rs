//! Pipeline orchestration
//!
//! Wires the record source, dispatch channel, worker pool, completion
//! tracker and dead-letter queue together:
//!
//! 1. Workers are spawned first, sharing one bounded channel receiver.
//! 2. The producer streams rows, applying the arity policy, incrementing
//!    the tracker before each dispatch.
//! 3. The channel is closed exactly once, after the last row is pushed.
//! 4. The orchestrator blocks on the tracker, then joins the workers.
//!
//! The channel bound is 1, the smallest tokio offers, so the producer can
//! never race ahead of the consumers: in-flight work is bounded by the
//! pool size, not the file size.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};

use crate::config::{ArityPolicy, LoadConfig};
use crate::dlq::{DeadLetter, DeadLetterQueue};
use crate::error::{LoadError, Result};
use crate::schema::Schema;
use crate::sink::Sink;
use crate::source::{RecordSource, Row};
use crate::tracker::CompletionTracker;
use crate::worker::Worker;

/// Outcome of a completed pipeline run
#[derive(Debug)]
pub struct LoadReport {
    /// Rows persisted successfully
    pub rows_loaded: u64,
    /// Rows skipped by the arity policy
    pub rows_skipped: u64,
    /// Rows that reached a terminal failure
    pub rows_failed: u64,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
    /// The terminally failed rows, with their last error
    pub dead_letters: Vec<DeadLetter>,
}

/// Producer/worker-pool bulk-load pipeline
pub struct Pipeline {
    config: LoadConfig,
    loaded: Arc<AtomicU64>,
}

impl Pipeline {
    pub fn new(config: LoadConfig) -> Self {
        Self {
            config,
            loaded: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Live count of rows persisted so far, for progress observers
    pub fn loaded_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.loaded)
    }

    /// Stream every data row from `source` into `sink`.
    ///
    /// `schema` must be the value produced by the source's header read;
    /// it fixes the arity every row is checked against. On a source read
    /// error the run aborts, but only after already-dispatched rows have
    /// drained.
    pub async fn run<Src, S>(&self, mut source: Src, schema: Schema, sink: S) -> Result<LoadReport>
    where
        Src: RecordSource,
        S: Sink + 'static,
    {
        self.config
            .validate()
            .map_err(|e| LoadError::Config(e.to_string()))?;

        let started = Instant::now();
        self.loaded.store(0, Ordering::Relaxed);

        let (tx, rx) = mpsc::channel::<Row>(1);
        let rx = Arc::new(Mutex::new(rx));
        let tracker = CompletionTracker::new();
        let dead_letters = DeadLetterQueue::new();
        let sink = Arc::new(sink);

        tracing::info!(
            workers = self.config.workers,
            columns = schema.len(),
            "Starting load pipeline"
        );

        let mut handles = Vec::with_capacity(self.config.workers);
        for id in 0..self.config.workers {
            let worker = Worker {
                id,
                sink: Arc::clone(&sink),
                jobs: Arc::clone(&rx),
                tracker: tracker.clone(),
                dead_letters: dead_letters.clone(),
                retry: self.config.retry.clone(),
                progress_interval: self.config.progress_interval,
                loaded: Arc::clone(&self.loaded),
            };
            handles.push(tokio::spawn(worker.run()));
        }

        let mut rows_skipped = 0u64;
        let mut failure: Option<LoadError> = None;

        loop {
            let row = match source.next_row().await {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => {
                    failure = Some(e.into());
                    break;
                }
            };

            let row = match self.apply_arity_policy(row, &schema) {
                ArityOutcome::Dispatch(row) => row,
                ArityOutcome::Skip => {
                    rows_skipped += 1;
                    continue;
                }
                ArityOutcome::Abort(e) => {
                    failure = Some(e);
                    break;
                }
            };

            tracker.add(1);
            if tx.send(row).await.is_err() {
                // Receiver gone means every worker task died.
                tracker.done();
                failure = Some(LoadError::WorkersStopped);
                break;
            }
        }

        // One-time close: workers drain the channel and exit.
        drop(tx);
        tracker.wait().await;

        let mut rows_loaded = 0u64;
        for handle in handles {
            rows_loaded += handle.await?;
        }

        if let Some(e) = failure {
            tracing::error!(error = %e, "Load aborted");
            return Err(e);
        }

        let dead_letters = dead_letters.drain();
        let report = LoadReport {
            rows_loaded,
            rows_skipped,
            rows_failed: dead_letters.len() as u64,
            elapsed: started.elapsed(),
            dead_letters,
        };

        tracing::info!(
            rows_loaded = report.rows_loaded,
            rows_skipped = report.rows_skipped,
            rows_failed = report.rows_failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Load pipeline finished"
        );

        Ok(report)
    }

    fn apply_arity_policy(&self, mut row: Row, schema: &Schema) -> ArityOutcome {
        if row.len() == schema.len() {
            return ArityOutcome::Dispatch(row);
        }

        match self.config.arity {
            ArityPolicy::Abort => ArityOutcome::Abort(LoadError::ArityMismatch {
                expected: schema.len(),
                actual: row.len(),
            }),
            ArityPolicy::Skip => {
                tracing::warn!(
                    expected = schema.len(),
                    actual = row.len(),
                    "Skipping row with mismatched field count"
                );
                ArityOutcome::Skip
            }
            ArityPolicy::Coerce => {
                row.resize(schema.len(), String::new());
                ArityOutcome::Dispatch(row)
            }
        }
    }
}

enum ArityOutcome {
    Dispatch(Row),
    Skip,
    Abort(LoadError),
}
