use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::model::ids::DatasetId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Errors produced while validating or executing a learner query.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QueryError {
    #[error("syntax error: {message}")]
    Syntax { message: String },

    #[error("unknown dataset: {0}")]
    UnknownDataset(DatasetId),

    #[error("statement not allowed: {reason}")]
    Forbidden { reason: String },

    #[error("query exceeded the time limit of {limit_ms} ms")]
    Timeout { limit_ms: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl QueryError {
    /// Returns true when the failure is the platform's fault rather than the learner's.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, QueryError::Internal(_))
    }
}

//
// ─── VALUES ────────────────────────────────────────────────────────────────────
//

/// A single scalar cell of a query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => f.write_str(s),
            Value::Blob(bytes) => {
                f.write_str("x'")?;
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                f.write_str("'")
            }
        }
    }
}

//
// ─── TABULAR RESULT ────────────────────────────────────────────────────────────
//

/// Ordered column names plus rows of equal length.
///
/// An empty row list is a valid result and still carries its columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabularResult {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    truncated: bool,
    #[serde(skip)]
    elapsed: Duration,
}

impl TabularResult {
    /// Build a result, checking that every row has one value per column.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Internal` if a row length differs from the column count.
    pub fn new(
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
        truncated: bool,
        elapsed: Duration,
    ) -> Result<Self, QueryError> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(QueryError::Internal(format!(
                "row {index} has {} values but the result has {} columns",
                row.len(),
                columns.len()
            )));
        }

        Ok(Self {
            columns,
            rows,
            truncated,
            elapsed,
        })
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when the engine stopped collecting rows at the configured cap.
    #[must_use]
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Position of the first column with the given name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, in row order.
    #[must_use]
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ragged_rows() {
        let err = TabularResult::new(
            vec!["a".into(), "b".into()],
            vec![vec![Value::Integer(1)]],
            false,
            Duration::ZERO,
        )
        .unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn empty_result_keeps_columns() {
        let result =
            TabularResult::new(vec!["name".into()], Vec::new(), false, Duration::ZERO).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.columns(), ["name".to_string()]);
    }

    #[test]
    fn column_values_follow_row_order() {
        let result = TabularResult::new(
            vec!["id".into(), "name".into()],
            vec![
                vec![Value::Integer(1), Value::Text("Alice".into())],
                vec![Value::Integer(2), Value::Null],
            ],
            false,
            Duration::ZERO,
        )
        .unwrap();

        let names = result.column_values("name").unwrap();
        assert_eq!(names, vec![&Value::Text("Alice".into()), &Value::Null]);
        assert!(result.column_values("missing").is_none());
    }

    #[test]
    fn value_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Blob(vec![0xab, 0x01]).to_string(), "x'ab01'");
    }
}
