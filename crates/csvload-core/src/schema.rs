//! Column schema derived from the input header
//!
//! The schema is established exactly once, from the first record of the
//! source, and is immutable afterwards. Every data row is positionally
//! aligned with it.

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Ordered column-name list for the target table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    /// Build a schema from the header row.
    ///
    /// Rejects empty headers, empty column names, and duplicates — a
    /// malformed header would otherwise surface much later as an opaque
    /// statement error on every single row.
    pub fn new(columns: Vec<String>) -> Result<Self, SchemaError> {
        if columns.is_empty() {
            return Err(SchemaError::EmptyHeader);
        }

        for (index, name) in columns.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(SchemaError::EmptyColumnName { index });
            }
        }

        let mut seen = std::collections::HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(SchemaError::DuplicateColumn { name: name.clone() });
            }
        }

        Ok(Self { columns })
    }

    /// Column names, in input order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns (the arity every data row must match)
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Build the parameterized insert statement for this schema.
    ///
    /// Built once and shared read-only across all workers:
    /// `INSERT INTO "t" ("c1", "c2") VALUES ($1, $2)`.
    pub fn insert_statement(&self, table: &str) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        let placeholders = (1..=self.columns.len())
            .map(|n| format!("${}", n))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_table(table),
            columns,
            placeholders
        )
    }
}

/// Quote a single identifier, doubling embedded quotes
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified table name segment by segment
fn quote_table(table: &str) -> String {
    table
        .split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_insert_statement() {
        let schema = Schema::new(cols(&["id", "name"])).unwrap();
        assert_eq!(
            schema.insert_statement("domain"),
            r#"INSERT INTO "domain" ("id", "name") VALUES ($1, $2)"#
        );
    }

    #[test]
    fn test_insert_statement_qualified_table() {
        let schema = Schema::new(cols(&["id"])).unwrap();
        assert_eq!(
            schema.insert_statement("public.domain"),
            r#"INSERT INTO "public"."domain" ("id") VALUES ($1)"#
        );
    }

    #[test]
    fn test_quotes_are_escaped() {
        let schema = Schema::new(cols(&[r#"we"ird"#])).unwrap();
        assert_eq!(
            schema.insert_statement("t"),
            r#"INSERT INTO "t" ("we""ird") VALUES ($1)"#
        );
    }

    #[test]
    fn test_empty_header_rejected() {
        assert_eq!(Schema::new(vec![]), Err(SchemaError::EmptyHeader));
    }

    #[test]
    fn test_empty_column_rejected() {
        assert_eq!(
            Schema::new(cols(&["id", " "])),
            Err(SchemaError::EmptyColumnName { index: 1 })
        );
    }

    #[test]
    fn test_duplicate_column_rejected() {
        assert_eq!(
            Schema::new(cols(&["id", "name", "id"])),
            Err(SchemaError::DuplicateColumn {
                name: "id".to_string()
            })
        );
    }
}
