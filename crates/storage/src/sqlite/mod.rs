use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlearn_core::model::{DatasetId, QueryError, TabularResult};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{SqliteConnection, SqlitePool};

use crate::repository::{
    DatasetInfo, DatasetRepository, QueryLimits, Storage, StorageError, TableInfo,
};

mod datasets;
mod execute;
mod mapping;

pub use datasets::{DatasetDefinition, bundled};

struct LoadedDataset {
    info: DatasetInfo,
    pool: SqlitePool,
    // Keeps the shared in-memory database alive while pool connections come and go.
    _anchor: Mutex<SqliteConnection>,
}

/// Sample datasets held in process-private in-memory `SQLite` databases.
///
/// Each dataset is seeded once through a writable anchor connection. Learner
/// queries go through a separate pool whose connections run with
/// `PRAGMA query_only`, so the seeded state never changes.
#[derive(Clone)]
pub struct SqliteDatasets {
    datasets: Arc<BTreeMap<DatasetId, LoadedDataset>>,
}

impl SqliteDatasets {
    /// Seed every definition into its own in-memory database.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::DuplicateDataset` when two definitions share an
    /// id, and `Open`/`Seed` when a database cannot be created or its seed
    /// script fails.
    pub async fn open(definitions: Vec<DatasetDefinition>) -> Result<Self, StorageError> {
        let mut datasets = BTreeMap::new();
        for definition in definitions {
            if datasets.contains_key(definition.id()) {
                return Err(StorageError::DuplicateDataset(definition.id().clone()));
            }
            let loaded = load(&definition).await?;
            tracing::debug!(dataset = %definition.id(), "seeded dataset");
            datasets.insert(definition.id().clone(), loaded);
        }
        Ok(Self {
            datasets: Arc::new(datasets),
        })
    }

    /// Open the datasets bundled with the crate.
    ///
    /// # Errors
    ///
    /// See [`SqliteDatasets::open`].
    pub async fn bundled() -> Result<Self, StorageError> {
        Self::open(datasets::bundled()?).await
    }

    fn pool(&self, dataset: &DatasetId) -> Result<&SqlitePool, QueryError> {
        self.datasets
            .get(dataset)
            .map(|d| &d.pool)
            .ok_or_else(|| QueryError::UnknownDataset(dataset.clone()))
    }
}

async fn load(definition: &DatasetDefinition) -> Result<LoadedDataset, StorageError> {
    let options = datasets::memory_options(definition.id())?;
    let anchor = datasets::seed(definition, &options).await?;

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .acquire_timeout(Duration::from_secs(5))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA query_only = ON;")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect_with(options)
        .await
        .map_err(|e| StorageError::Open {
            dataset: definition.id().clone(),
            message: e.to_string(),
        })?;

    Ok(LoadedDataset {
        info: definition.info(),
        pool,
        _anchor: Mutex::new(anchor),
    })
}

#[async_trait]
impl DatasetRepository for SqliteDatasets {
    fn datasets(&self) -> Vec<DatasetInfo> {
        self.datasets.values().map(|d| d.info.clone()).collect()
    }

    fn contains(&self, dataset: &DatasetId) -> bool {
        self.datasets.contains_key(dataset)
    }

    async fn execute(
        &self,
        dataset: &DatasetId,
        sql: &str,
        limits: QueryLimits,
    ) -> Result<TabularResult, QueryError> {
        let pool = self.pool(dataset)?;
        let result = execute::run_statement(pool, sql, limits).await;
        if let Err(QueryError::Timeout { limit_ms }) = &result {
            tracing::warn!(dataset = %dataset, limit_ms, "query interrupted at deadline");
        }
        result
    }

    async fn describe(&self, dataset: &DatasetId) -> Result<Vec<TableInfo>, QueryError> {
        execute::describe(self.pool(dataset)?).await
    }
}

impl Storage {
    /// Build a `Storage` over the bundled sample datasets.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a dataset cannot be seeded.
    pub async fn sqlite_bundled() -> Result<Self, StorageError> {
        Ok(Self::new(Arc::new(SqliteDatasets::bundled().await?)))
    }
}
