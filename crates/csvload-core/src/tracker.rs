//! Outstanding-work tracking
//!
//! Counts dispatched-but-not-yet-terminal jobs. The orchestrator issues
//! every `add` on the producer path before closing the dispatch channel,
//! then blocks on `wait` until workers have driven the count back to zero.

use std::sync::Arc;

use tokio::sync::watch;

/// Counting completion primitive: `add` / `done` / `wait`
#[derive(Debug, Clone)]
pub struct CompletionTracker {
    count: Arc<watch::Sender<u64>>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0u64);
        Self { count: Arc::new(tx) }
    }

    /// Record `n` newly dispatched jobs
    pub fn add(&self, n: u64) {
        self.count.send_modify(|c| *c += n);
    }

    /// Record one terminal job outcome.
    ///
    /// Must be paired with a prior `add`; an unpaired call is a caller bug
    /// and is logged rather than wrapping the counter.
    pub fn done(&self) {
        self.count.send_modify(|c| {
            if *c == 0 {
                tracing::error!("Completion tracker decremented below zero");
            } else {
                *c -= 1;
            }
        });
    }

    /// Current number of outstanding jobs
    pub fn outstanding(&self) -> u64 {
        *self.count.borrow()
    }

    /// Block until the outstanding count reaches zero.
    ///
    /// Returns immediately when nothing is outstanding.
    pub async fn wait(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in self, so the channel cannot close under us.
        let _ = rx.wait_for(|c| *c == 0).await;
    }
}

impl Default for CompletionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_immediately_at_zero() {
        let tracker = CompletionTracker::new();
        tokio::time::timeout(Duration::from_millis(100), tracker.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_blocks_until_all_done() {
        let tracker = CompletionTracker::new();
        tracker.add(3);

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait().await })
        };

        tracker.done();
        tracker.done();
        assert_eq!(tracker.outstanding(), 1);
        assert!(!waiter.is_finished());

        tracker.done();
        tokio::time::timeout(Duration::from_millis(100), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tracker.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_done_without_add_does_not_wrap() {
        let tracker = CompletionTracker::new();
        tracker.done();
        assert_eq!(tracker.outstanding(), 0);
    }
}
