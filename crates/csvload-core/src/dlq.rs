//! Dead-letter collection for terminally failed rows
//!
//! Rows that exhaust their retry budget or hit a fatal persist error land
//! here instead of stalling a worker. The pipeline drains the queue into
//! the final report; callers decide whether to persist it further.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::source::Row;

/// One row that reached a terminal failure
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    /// The row's field values, in schema order
    pub row: Row,
    /// Persist attempts made before giving up
    pub attempts: u32,
    /// The last error observed
    pub error: String,
}

/// Shared collector of terminally failed rows
#[derive(Debug, Clone, Default)]
pub struct DeadLetterQueue {
    inner: Arc<Mutex<Vec<DeadLetter>>>,
}

impl DeadLetterQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, dead_letter: DeadLetter) {
        self.lock().push(dead_letter);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Take all collected dead letters, leaving the queue empty
    pub fn drain(&self) -> Vec<DeadLetter> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<DeadLetter>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            // A worker panicking mid-push cannot leave the Vec torn.
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_drain() {
        let queue = DeadLetterQueue::new();
        assert!(queue.is_empty());

        queue.push(DeadLetter {
            row: vec!["1".to_string(), "a".to_string()],
            attempts: 3,
            error: "connection refused".to_string(),
        });
        assert_eq!(queue.len(), 1);

        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].attempts, 3);
        assert!(queue.is_empty());
    }
}
