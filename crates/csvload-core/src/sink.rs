//! Persistence sinks
//!
//! A sink persists one row per call. [`PgSink`] borrows one connection
//! from the shared pool for the duration of one statement execution; the
//! connection is returned to the pool on every exit path.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::PersistError;
use crate::schema::Schema;
use crate::source::Row;

/// Persist one row; failures are classified for the worker retry loop
#[async_trait]
pub trait Sink: Send + Sync {
    async fn persist(&self, row: &Row) -> Result<(), PersistError>;
}

#[async_trait]
impl<S: Sink + ?Sized> Sink for std::sync::Arc<S> {
    async fn persist(&self, row: &Row) -> Result<(), PersistError> {
        self.as_ref().persist(row).await
    }
}

/// Postgres sink executing a fixed parameterized insert
pub struct PgSink {
    pool: PgPool,
    statement: String,
    arity: usize,
}

impl PgSink {
    /// Build a sink for the given table.
    ///
    /// The insert statement is derived from the schema once; the schema is
    /// consumed by the pipeline afterwards and never changes.
    pub fn new(pool: PgPool, table: &str, schema: &Schema) -> Self {
        Self {
            pool,
            statement: schema.insert_statement(table),
            arity: schema.len(),
        }
    }

    /// The insert statement this sink executes
    pub fn statement(&self) -> &str {
        &self.statement
    }
}

#[async_trait]
impl Sink for PgSink {
    async fn persist(&self, row: &Row) -> Result<(), PersistError> {
        if row.len() != self.arity {
            return Err(PersistError::Fatal(format!(
                "row has {} fields but the statement binds {}",
                row.len(),
                self.arity
            )));
        }

        let mut conn = self.pool.acquire().await.map_err(classify)?;

        let mut query = sqlx::query(&self.statement);
        for field in row {
            query = query.bind(field.as_str());
        }

        query.execute(&mut *conn).await.map_err(classify)?;

        Ok(())
    }
}

/// Map a sqlx error onto the retry taxonomy.
///
/// Pool and transport problems are transient; statement-level database
/// errors would fail identically on every attempt, except for the
/// concurrency-control codes Postgres documents as retryable.
fn classify(err: sqlx::Error) -> PersistError {
    match err {
        sqlx::Error::Io(e) => PersistError::Retryable(format!("IO error: {}", e)),
        sqlx::Error::PoolTimedOut => {
            PersistError::Retryable("timed out acquiring a connection".to_string())
        }
        sqlx::Error::WorkerCrashed => {
            PersistError::Retryable("connection worker crashed".to_string())
        }
        sqlx::Error::Database(db) => {
            let retryable = matches!(
                db.code().as_deref(),
                // serialization_failure, deadlock_detected, too_many_connections
                Some("40001") | Some("40P01") | Some("53300")
            );
            if retryable {
                PersistError::Retryable(db.to_string())
            } else {
                PersistError::Fatal(db.to_string())
            }
        }
        other => PersistError::Fatal(other.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_are_retryable() {
        let err = classify(sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        )));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_pool_timeout_is_retryable() {
        assert!(classify(sqlx::Error::PoolTimedOut).is_retryable());
    }

    #[test]
    fn test_protocol_errors_are_fatal() {
        let err = classify(sqlx::Error::Protocol("bad frame".to_string()));
        assert!(!err.is_retryable());
    }
}
