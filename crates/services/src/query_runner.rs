use std::sync::Arc;

use sqlearn_core::Catalog;
use sqlearn_core::model::{DatasetId, QueryError, TabularResult};
use sqlearn_core::statement::ensure_read_only;
use storage::{DatasetInfo, DatasetRepository, TableInfo};

use crate::config::RunnerConfig;
use crate::error::Error;

/// Runs learner SQL against the sample datasets.
///
/// Statements are checked lexically before they reach the engine; the engine
/// itself only ever sees read-only connections. Shared across sessions.
#[derive(Clone)]
pub struct QueryRunner {
    datasets: Arc<dyn DatasetRepository>,
    catalog: Arc<Catalog>,
    config: RunnerConfig,
}

impl QueryRunner {
    #[must_use]
    pub fn new(
        datasets: Arc<dyn DatasetRepository>,
        catalog: Arc<Catalog>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            datasets,
            catalog,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> RunnerConfig {
        self.config
    }

    /// Run one read-only statement against `dataset`.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Forbidden` for statements that could write,
    /// `Syntax` for malformed or multi-statement input, `UnknownDataset`,
    /// `Timeout` when the configured limit elapses, and `Internal` for
    /// engine faults.
    pub async fn run(&self, sql: &str, dataset: &DatasetId) -> Result<TabularResult, QueryError> {
        let kind = ensure_read_only(sql).inspect_err(|err| {
            if let QueryError::Forbidden { reason } = err {
                tracing::info!(dataset = %dataset, %reason, "rejected statement");
            }
        })?;

        if !self.datasets.contains(dataset) {
            return Err(QueryError::UnknownDataset(dataset.clone()));
        }

        match self
            .datasets
            .execute(dataset, sql, self.config.limits())
            .await
        {
            Ok(result) => {
                tracing::debug!(
                    dataset = %dataset,
                    ?kind,
                    rows = result.row_count(),
                    truncated = result.truncated(),
                    elapsed_ms = %result.elapsed().as_millis(),
                    "query finished"
                );
                Ok(result)
            }
            Err(err) if err.is_internal() => {
                tracing::error!(dataset = %dataset, error = %err, "query failed");
                Err(err)
            }
            Err(err) => {
                tracing::debug!(dataset = %dataset, error = %err, "query rejected by engine");
                Err(err)
            }
        }
    }

    /// Run a catalog example on the dataset it names.
    ///
    /// # Errors
    ///
    /// Returns `Error::Catalog` for unknown examples, `Error::NotRunnable` for
    /// illustrative examples without a dataset, and `Error::Query` if the
    /// statement itself fails.
    pub async fn run_example(&self, example: &str) -> Result<TabularResult, Error> {
        let example = self.catalog.example(example)?;
        let Some(dataset) = example.dataset() else {
            return Err(Error::NotRunnable(example.id().clone()));
        };
        Ok(self.run(example.sql(), dataset).await?)
    }

    #[must_use]
    pub fn datasets(&self) -> Vec<DatasetInfo> {
        self.datasets.datasets()
    }

    /// # Errors
    ///
    /// Returns `QueryError::UnknownDataset` for unregistered ids.
    pub async fn describe(&self, dataset: &DatasetId) -> Result<Vec<TableInfo>, QueryError> {
        self.datasets.describe(dataset).await
    }
}
