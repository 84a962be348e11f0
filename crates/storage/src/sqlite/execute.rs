use std::time::{Duration, Instant};

use futures_util::TryStreamExt;
use sqlearn_core::model::{QueryError, TabularResult, Value};
use sqlx::pool::PoolConnection;
use sqlx::{Column, Executor, Row, Sqlite, SqlitePool, Statement};

use super::mapping::{decode_row, internal, map_query_error, quote_ident};
use crate::repository::{QueryLimits, TableInfo, TableKind};

/// VM instructions between deadline checks.
const PROGRESS_INTERVAL: i32 = 1_000;

/// Extra time granted to the engine to notice the deadline before the
/// outer timer gives up on it.
const DEADLINE_GRACE: Duration = Duration::from_millis(250);

/// Run one statement on a pooled connection within `limits`.
pub(crate) async fn run_statement(
    pool: &SqlitePool,
    sql: &str,
    limits: QueryLimits,
) -> Result<TabularResult, QueryError> {
    let started = Instant::now();
    let work = async {
        let mut conn = pool.acquire().await.map_err(internal)?;

        let deadline = started + limits.timeout;
        conn.lock_handle()
            .await
            .map_err(internal)?
            .set_progress_handler(PROGRESS_INTERVAL, move || Instant::now() < deadline);

        let outcome = fetch(&mut conn, sql, limits).await;

        if let Ok(mut handle) = conn.lock_handle().await {
            handle.remove_progress_handler();
        }
        outcome
    };

    let (columns, rows, truncated) = tokio::time::timeout(limits.timeout + DEADLINE_GRACE, work)
        .await
        .map_err(|_| QueryError::Timeout {
            limit_ms: limits.timeout_ms(),
        })??;

    TabularResult::new(columns, rows, truncated, started.elapsed())
}

type Fetched = (Vec<String>, Vec<Vec<Value>>, bool);

async fn fetch(
    conn: &mut sqlx::SqliteConnection,
    sql: &str,
    limits: QueryLimits,
) -> Result<Fetched, QueryError> {
    // Preparing first yields column names even when no row comes back.
    let statement = (&mut *conn)
        .prepare(sql)
        .await
        .map_err(|e| map_query_error(e, limits))?;
    let columns: Vec<String> = statement
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    // Stop stepping the statement once one row past the cap has arrived.
    let mut stream = statement.query().fetch(&mut *conn);
    let mut rows = Vec::new();
    let mut truncated = false;
    while let Some(row) = stream
        .try_next()
        .await
        .map_err(|e| map_query_error(e, limits))?
    {
        if rows.len() == limits.max_rows {
            truncated = true;
            break;
        }
        rows.push(decode_row(&row, columns.len())?);
    }

    Ok((columns, rows, truncated))
}

/// Acquire a connection with no deadline left over from an abandoned query.
///
/// A query dropped by the outer timer never reaches its cleanup, so the
/// progress handler it installed may still be attached to the connection.
async fn acquire_clean(pool: &SqlitePool) -> Result<PoolConnection<Sqlite>, QueryError> {
    let mut conn = pool.acquire().await.map_err(internal)?;
    conn.lock_handle()
        .await
        .map_err(internal)?
        .remove_progress_handler();
    Ok(conn)
}

/// Tables and views of the attached database, user objects only.
pub(crate) async fn describe(pool: &SqlitePool) -> Result<Vec<TableInfo>, QueryError> {
    let mut conn = acquire_clean(pool).await?;
    let objects = sqlx::query(
        r"
            SELECT name, type FROM sqlite_master
            WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%'
            ORDER BY name
        ",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(internal)?;

    let mut tables = Vec::with_capacity(objects.len());
    for object in objects {
        let name: String = object.try_get("name").map_err(internal)?;
        let kind = match object.try_get::<String, _>("type").map_err(internal)?.as_str() {
            "view" => TableKind::View,
            _ => TableKind::Table,
        };

        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
                .bind(&name)
                .fetch_all(&mut *conn)
                .await
                .map_err(internal)?;

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quote_ident(&name)))
            .fetch_one(&mut *conn)
            .await
            .map_err(internal)?;

        tables.push(TableInfo {
            name,
            kind,
            columns,
            row_count: u64::try_from(count).map_err(internal)?,
        });
    }
    Ok(tables)
}
