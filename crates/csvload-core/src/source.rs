//! Record sources
//!
//! A record source produces a lazy, forward-only sequence of rows. The
//! first record of the input is the schema header and is consumed by
//! [`CsvSource::read_schema`], never forwarded to the dispatch channel.
//!
//! Read errors are surfaced as [`SourceError`], distinct from end-of-input
//! (`Ok(None)`); the pipeline aborts the run on them instead of silently
//! stopping early.

use std::path::Path;

use async_trait::async_trait;
use csv_async::{AsyncReaderBuilder, StringRecord};
use tokio::io::AsyncRead;

use crate::error::SourceError;
use crate::schema::Schema;

/// One data row: ordered, opaque field values aligned with the schema
pub type Row = Vec<String>;

/// Forward-only, non-restartable row sequence
#[async_trait]
pub trait RecordSource: Send {
    /// Read the next data row. `Ok(None)` signals end of input.
    async fn next_row(&mut self) -> Result<Option<Row>, SourceError>;
}

/// CSV-backed record source over any async reader
pub struct CsvSource<R> {
    reader: csv_async::AsyncReader<R>,
    record: StringRecord,
}

impl<R: AsyncRead + Unpin + Send> CsvSource<R> {
    /// Build a source from an async reader.
    ///
    /// Headers are handled by `read_schema`, not by the CSV layer, and the
    /// reader is flexible so that arity is this crate's policy decision
    /// rather than a parse error.
    pub fn from_reader(reader: R, delimiter: u8) -> Self {
        let reader = AsyncReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .create_reader(reader);

        Self {
            reader,
            record: StringRecord::new(),
        }
    }

    /// Consume the first record and establish the schema.
    ///
    /// Must be called exactly once, before the first `next_row`; the
    /// returned value is moved into the sink and pipeline, there is no
    /// shared mutable schema state.
    pub async fn read_schema(&mut self) -> Result<Schema, SourceError> {
        if !self.reader.read_record(&mut self.record).await? {
            return Err(SourceError::MissingHeader);
        }

        let columns = self.record.iter().map(|s| s.to_string()).collect();
        Ok(Schema::new(columns)?)
    }
}

impl CsvSource<tokio::fs::File> {
    /// Open a CSV file from disk
    pub async fn from_path(
        path: impl AsRef<Path>,
        delimiter: u8,
    ) -> Result<Self, SourceError> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::from_reader(file, delimiter))
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> RecordSource for CsvSource<R> {
    async fn next_row(&mut self) -> Result<Option<Row>, SourceError> {
        if !self.reader.read_record(&mut self.record).await? {
            return Ok(None);
        }

        Ok(Some(self.record.iter().map(|s| s.to_string()).collect()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn source_from(data: &str) -> CsvSource<std::io::Cursor<Vec<u8>>> {
        CsvSource::from_reader(std::io::Cursor::new(data.as_bytes().to_vec()), b',')
    }

    #[tokio::test]
    async fn test_header_then_rows() {
        let mut source = source_from("id,name\n1,a\n2,b\n");

        let schema = source.read_schema().await.unwrap();
        assert_eq!(schema.columns(), ["id", "name"]);

        assert_eq!(source.next_row().await.unwrap(), Some(vec!["1".into(), "a".into()]));
        assert_eq!(source.next_row().await.unwrap(), Some(vec!["2".into(), "b".into()]));
        assert_eq!(source.next_row().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_input_has_no_header() {
        let mut source = source_from("");
        assert!(matches!(
            source.read_schema().await,
            Err(SourceError::MissingHeader)
        ));
    }

    #[tokio::test]
    async fn test_header_only_yields_no_rows() {
        let mut source = source_from("id,name\n");
        source.read_schema().await.unwrap();
        assert_eq!(source.next_row().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_custom_delimiter() {
        let mut source = CsvSource::from_reader(
            std::io::Cursor::new(b"id;name\n1;a\n".to_vec()),
            b';',
        );
        let schema = source.read_schema().await.unwrap();
        assert_eq!(schema.columns(), ["id", "name"]);
        assert_eq!(source.next_row().await.unwrap(), Some(vec!["1".into(), "a".into()]));
    }

    #[tokio::test]
    async fn test_short_row_is_not_a_parse_error() {
        // Arity mismatches are a pipeline policy decision, not a read error.
        let mut source = source_from("id,name\n1\n");
        source.read_schema().await.unwrap();
        assert_eq!(source.next_row().await.unwrap(), Some(vec!["1".into()]));
    }
}
