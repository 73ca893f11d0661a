//! Insert workers
//!
//! Each worker pulls jobs from the shared dispatch channel until it is
//! closed and drained, persisting every job through the sink with a
//! bounded retry loop. A job's outcome is always terminal: either a
//! successful insert or a dead letter. Either way the completion tracker
//! is decremented exactly once per job.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::config::RetryPolicy;
use crate::dlq::{DeadLetter, DeadLetterQueue};
use crate::sink::Sink;
use crate::source::Row;
use crate::tracker::CompletionTracker;

pub(crate) struct Worker<S> {
    pub(crate) id: usize,
    pub(crate) sink: Arc<S>,
    pub(crate) jobs: Arc<Mutex<mpsc::Receiver<Row>>>,
    pub(crate) tracker: CompletionTracker,
    pub(crate) dead_letters: DeadLetterQueue,
    pub(crate) retry: RetryPolicy,
    pub(crate) progress_interval: u64,
    pub(crate) loaded: Arc<AtomicU64>,
}

impl<S: Sink + 'static> Worker<S> {
    /// Run until the dispatch channel is closed and empty.
    ///
    /// Returns the number of rows this worker inserted.
    pub(crate) async fn run(self) -> u64 {
        let mut inserted = 0u64;

        loop {
            // Hold the receiver lock only for the handoff itself.
            let job = self.jobs.lock().await.recv().await;
            let Some(row) = job else {
                break;
            };

            if self.process(row).await {
                inserted += 1;
                self.loaded.fetch_add(1, Ordering::Relaxed);

                if inserted % self.progress_interval == 0 {
                    tracing::info!(worker = self.id, inserted, "Worker progress");
                }
            }

            // Success or dead letter, the job has reached a terminal state.
            self.tracker.done();
        }

        tracing::debug!(worker = self.id, inserted, "Worker finished");
        inserted
    }

    /// Persist one job, retrying per policy. Returns true on success.
    async fn process(&self, row: Row) -> bool {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let error = match self.sink.persist(&row).await {
                Ok(()) => return true,
                Err(e) => e,
            };

            if error.is_retryable() && attempt < self.retry.max_attempts {
                let backoff = self.retry.backoff(attempt);
                tracing::warn!(
                    worker = self.id,
                    attempt,
                    max_attempts = self.retry.max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %error,
                    "Insert failed, will retry"
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            tracing::error!(
                worker = self.id,
                attempt,
                error = %error,
                "Insert failed terminally, row sent to dead-letter queue"
            );
            self.dead_letters.push(DeadLetter {
                row,
                attempts: attempt,
                error: error.to_string(),
            });
            return false;
        }
    }
}
