use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlearn_core::model::{DatasetId, QueryError, TabularResult};
use thiserror::Error;

/// Errors raised while building the dataset registry.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("failed to open dataset {dataset}: {message}")]
    Open { dataset: DatasetId, message: String },

    #[error("failed to seed dataset {dataset}: {message}")]
    Seed { dataset: DatasetId, message: String },

    #[error("dataset registered twice: {0}")]
    DuplicateDataset(DatasetId),

    #[error("invalid dataset definition: {0}")]
    InvalidDefinition(String),
}

/// Per-query resource limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub timeout: Duration,
    pub max_rows: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2_000),
            max_rows: 500,
        }
    }
}

impl QueryLimits {
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Listing entry for a registered dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetInfo {
    pub id: DatasetId,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Table,
    View,
}

/// Schema summary of one table or view in a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub kind: TableKind,
    pub columns: Vec<String>,
    pub row_count: u64,
}

/// Read-only access to the bundled sample datasets.
///
/// Implementations never persist learner changes: every dataset stays in the
/// state it was seeded with for the lifetime of the process.
#[async_trait]
pub trait DatasetRepository: Send + Sync {
    /// Registered datasets, ordered by id.
    fn datasets(&self) -> Vec<DatasetInfo>;

    fn contains(&self, dataset: &DatasetId) -> bool;

    /// Execute a single read-only statement against a dataset.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::UnknownDataset` for unregistered ids, `Syntax` for
    /// statements the engine rejects, `Timeout` when `limits.timeout` elapses,
    /// `Forbidden` when the engine refuses a write, and `Internal` otherwise.
    async fn execute(
        &self,
        dataset: &DatasetId,
        sql: &str,
        limits: QueryLimits,
    ) -> Result<TabularResult, QueryError>;

    /// Tables and views of a dataset with their columns and row counts.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::UnknownDataset` for unregistered ids.
    async fn describe(&self, dataset: &DatasetId) -> Result<Vec<TableInfo>, QueryError>;
}

/// Aggregates the repositories used by services.
#[derive(Clone)]
pub struct Storage {
    pub datasets: Arc<dyn DatasetRepository>,
}

impl Storage {
    #[must_use]
    pub fn new(datasets: Arc<dyn DatasetRepository>) -> Self {
        Self { datasets }
    }
}
