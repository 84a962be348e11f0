use std::time::Duration;

use sqlearn_core::model::{DatasetId, QueryError, Value};
use storage::repository::{DatasetRepository, QueryLimits, TableKind};
use storage::sqlite::{DatasetDefinition, SqliteDatasets};

fn id(raw: &str) -> DatasetId {
    DatasetId::new(raw).unwrap()
}

#[tokio::test]
async fn bundled_datasets_are_listed_in_id_order() {
    let repo = SqliteDatasets::bundled().await.expect("seed");
    let ids: Vec<String> = repo
        .datasets()
        .into_iter()
        .map(|d| d.id.to_string())
        .collect();
    assert_eq!(ids, ["company", "retail", "school"]);
    assert!(repo.contains(&id("school")));
    assert!(!repo.contains(&id("nope")));
}

#[tokio::test]
async fn select_returns_columns_and_rows() {
    let repo = SqliteDatasets::bundled().await.unwrap();
    let result = repo
        .execute(
            &id("school"),
            "SELECT id, name, age FROM students ORDER BY id",
            QueryLimits::default(),
        )
        .await
        .unwrap();

    assert_eq!(result.columns(), ["id", "name", "age"]);
    assert_eq!(result.row_count(), 5);
    assert_eq!(
        result.rows()[0],
        vec![
            Value::Integer(1),
            Value::Text("Alice".into()),
            Value::Integer(20)
        ]
    );
    assert!(!result.truncated());
}

#[tokio::test]
async fn empty_result_keeps_column_names() {
    let repo = SqliteDatasets::bundled().await.unwrap();
    let result = repo
        .execute(
            &id("school"),
            "SELECT name FROM students WHERE age > 900",
            QueryLimits::default(),
        )
        .await
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(result.columns(), ["name"]);
}

#[tokio::test]
async fn nulls_and_reals_are_decoded() {
    let repo = SqliteDatasets::bundled().await.unwrap();
    let result = repo
        .execute(
            &id("company"),
            "SELECT manager_id, salary * 1.5 AS boosted FROM employees WHERE emp_id = 1",
            QueryLimits::default(),
        )
        .await
        .unwrap();
    assert_eq!(result.rows()[0], vec![Value::Null, Value::Real(75000.0)]);
}

#[tokio::test]
async fn rows_beyond_the_cap_are_truncated() {
    let repo = SqliteDatasets::bundled().await.unwrap();
    let limits = QueryLimits {
        max_rows: 4,
        ..QueryLimits::default()
    };
    let result = repo
        .execute(&id("company"), "SELECT * FROM employees", limits)
        .await
        .unwrap();
    assert_eq!(result.row_count(), 4);
    assert!(result.truncated());

    let exact = QueryLimits {
        max_rows: 6,
        ..QueryLimits::default()
    };
    let result = repo
        .execute(&id("company"), "SELECT * FROM employees", exact)
        .await
        .unwrap();
    assert!(!result.truncated());
}

#[tokio::test]
async fn unbounded_result_stops_at_the_cap() {
    let repo = SqliteDatasets::bundled().await.unwrap();
    let limits = QueryLimits {
        timeout: Duration::from_secs(1),
        max_rows: 3,
    };
    let result = repo
        .execute(
            &id("school"),
            "WITH RECURSIVE cnt(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM cnt) SELECT x FROM cnt",
            limits,
        )
        .await
        .unwrap();
    assert_eq!(result.columns(), ["x"]);
    assert_eq!(
        result.rows(),
        [
            vec![Value::Integer(1)],
            vec![Value::Integer(2)],
            vec![Value::Integer(3)]
        ]
    );
    assert!(result.truncated());
    assert!(result.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn runaway_query_times_out_and_connection_recovers() {
    let repo = SqliteDatasets::bundled().await.unwrap();
    let limits = QueryLimits {
        timeout: Duration::from_millis(100),
        ..QueryLimits::default()
    };

    let err = repo
        .execute(
            &id("school"),
            "WITH RECURSIVE cnt(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM cnt) SELECT count(*) FROM cnt",
            limits,
        )
        .await
        .unwrap_err();
    assert_eq!(err, QueryError::Timeout { limit_ms: 100 });

    for _ in 0..8 {
        let ok = repo
            .execute(&id("school"), "SELECT count(*) AS n FROM students", limits)
            .await
            .unwrap();
        assert_eq!(ok.rows()[0], vec![Value::Integer(5)]);
    }
}

#[tokio::test]
async fn engine_refuses_writes() {
    let repo = SqliteDatasets::bundled().await.unwrap();
    let err = repo
        .execute(&id("company"), "DELETE FROM employees", QueryLimits::default())
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Forbidden { .. }), "{err:?}");

    let count = repo
        .execute(&id("company"), "SELECT COUNT(*) FROM employees", QueryLimits::default())
        .await
        .unwrap();
    assert_eq!(count.rows()[0], vec![Value::Integer(6)]);
}

#[tokio::test]
async fn engine_errors_are_syntax_errors() {
    let repo = SqliteDatasets::bundled().await.unwrap();
    for sql in ["SELEC 1", "SELECT * FROM no_such_table", "SELECT nope FROM students"] {
        let err = repo
            .execute(&id("school"), sql, QueryLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Syntax { .. }), "{sql}: {err:?}");
    }
}

#[tokio::test]
async fn unknown_dataset_is_reported() {
    let repo = SqliteDatasets::bundled().await.unwrap();
    let err = repo
        .execute(&id("warehouse"), "SELECT 1", QueryLimits::default())
        .await
        .unwrap_err();
    assert_eq!(err, QueryError::UnknownDataset(id("warehouse")));
}

#[tokio::test]
async fn describe_lists_tables_and_views() {
    let repo = SqliteDatasets::bundled().await.unwrap();
    let tables = repo.describe(&id("retail")).await.unwrap();
    let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["audit_log", "products", "region_revenue", "sales"]);

    let view = &tables[2];
    assert_eq!(view.kind, TableKind::View);
    assert_eq!(view.columns, ["region", "revenue"]);
    assert_eq!(view.row_count, 4);
    assert_eq!(tables[3].row_count, 5);
}

#[tokio::test]
async fn datasets_are_isolated_from_each_other() {
    let repo = SqliteDatasets::bundled().await.unwrap();
    let err = repo
        .execute(&id("school"), "SELECT * FROM employees", QueryLimits::default())
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Syntax { .. }));
}

#[tokio::test]
async fn duplicate_and_broken_definitions_fail_to_open() {
    let def = || DatasetDefinition::new("tiny", "Tiny", "", "CREATE TABLE t (x INTEGER);").unwrap();
    assert!(SqliteDatasets::open(vec![def(), def()]).await.is_err());

    let broken = DatasetDefinition::new("broken", "Broken", "", "CREATE TABLE (").unwrap();
    assert!(SqliteDatasets::open(vec![broken]).await.is_err());
}
