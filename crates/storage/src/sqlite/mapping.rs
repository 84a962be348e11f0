use sqlearn_core::model::{QueryError, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, TypeInfo, ValueRef};

use crate::repository::QueryLimits;

// Primary result codes; extended codes carry them in the low byte.
const SQLITE_ERROR: i32 = 1;
const SQLITE_READONLY: i32 = 8;
const SQLITE_INTERRUPT: i32 = 9;
const SQLITE_AUTH: i32 = 23;
const SQLITE_RANGE: i32 = 25;

pub(crate) fn internal<E: core::fmt::Display>(e: E) -> QueryError {
    QueryError::Internal(e.to_string())
}

/// Translate an engine failure into the learner-facing error taxonomy.
pub(crate) fn map_query_error(err: sqlx::Error, limits: QueryLimits) -> QueryError {
    let sqlx::Error::Database(db) = err else {
        return internal(err);
    };

    let message = db.message().to_string();
    let code = db
        .code()
        .and_then(|c| c.parse::<i32>().ok())
        .map(|c| c & 0xff);

    match code {
        Some(SQLITE_INTERRUPT) => QueryError::Timeout {
            limit_ms: limits.timeout_ms(),
        },
        Some(SQLITE_READONLY | SQLITE_AUTH) => QueryError::Forbidden {
            reason: format!("the sample datasets are read-only ({message})"),
        },
        Some(SQLITE_ERROR | SQLITE_RANGE) => QueryError::Syntax { message },
        _ if message.contains("interrupted") => QueryError::Timeout {
            limit_ms: limits.timeout_ms(),
        },
        _ => QueryError::Internal(message),
    }
}

/// Decode one cell by its runtime storage class.
pub(crate) fn decode_cell(row: &SqliteRow, index: usize) -> Result<Value, QueryError> {
    let raw = row.try_get_raw(index).map_err(internal)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let storage_class = raw.type_info().name().to_ascii_uppercase();
    let value = match storage_class.as_str() {
        "INTEGER" | "INT" | "BIGINT" | "BOOLEAN" => {
            Value::Integer(row.try_get_unchecked::<i64, _>(index).map_err(internal)?)
        }
        "REAL" | "FLOAT" | "DOUBLE" => {
            Value::Real(row.try_get_unchecked::<f64, _>(index).map_err(internal)?)
        }
        "BLOB" => Value::Blob(row.try_get_unchecked::<Vec<u8>, _>(index).map_err(internal)?),
        _ => Value::Text(row.try_get_unchecked::<String, _>(index).map_err(internal)?),
    };
    Ok(value)
}

pub(crate) fn decode_row(row: &SqliteRow, columns: usize) -> Result<Vec<Value>, QueryError> {
    (0..columns).map(|i| decode_cell(row, i)).collect()
}

/// Quote an identifier for interpolation into SQL.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_ident("students"), "\"students\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn non_database_errors_are_internal() {
        let err = map_query_error(sqlx::Error::PoolTimedOut, QueryLimits::default());
        assert!(err.is_internal());
    }
}
