use std::sync::Arc;

use sqlearn_core::{Catalog, CatalogError};
use storage::Storage;

use crate::Clock;
use crate::catalog_service::CatalogService;
use crate::config::RunnerConfig;
use crate::error::Error;
use crate::query_runner::QueryRunner;
use crate::sessions::SessionRegistry;

/// Assembles the catalog, query runner and session registry.
#[derive(Clone)]
pub struct AppServices {
    catalog: CatalogService,
    runner: QueryRunner,
    sessions: Arc<SessionRegistry>,
}

impl AppServices {
    /// Build services over the bundled catalog and sample datasets.
    ///
    /// # Errors
    ///
    /// Returns `Error::Catalog` if the catalog fails validation or references a
    /// dataset that is not bundled, and `Error::Storage` if seeding fails.
    pub async fn bundled(clock: Clock, config: RunnerConfig) -> Result<Self, Error> {
        let catalog = Arc::new(Catalog::bundled()?);
        let storage = Storage::sqlite_bundled().await?;
        Self::from_parts(clock, catalog, storage, config)
    }

    /// Wire services from already built parts.
    ///
    /// # Errors
    ///
    /// Returns `Error::Catalog` with `UnknownDataset` if a runnable example
    /// names a dataset the storage does not provide.
    pub fn from_parts(
        clock: Clock,
        catalog: Arc<Catalog>,
        storage: Storage,
        config: RunnerConfig,
    ) -> Result<Self, Error> {
        if let Some((example, dataset)) = catalog
            .examples()
            .filter_map(|e| e.dataset().map(|d| (e, d)))
            .find(|(_, d)| !storage.datasets.contains(d))
        {
            return Err(CatalogError::UnknownDataset {
                example: example.id().clone(),
                dataset: dataset.clone(),
            }
            .into());
        }

        tracing::info!(
            topics = catalog.topic_count(),
            questions = catalog.question_count(),
            datasets = storage.datasets.datasets().len(),
            "services ready"
        );

        Ok(Self {
            catalog: CatalogService::new(Arc::clone(&catalog)),
            runner: QueryRunner::new(Arc::clone(&storage.datasets), Arc::clone(&catalog), config),
            sessions: Arc::new(SessionRegistry::new(clock, catalog)),
        })
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    #[must_use]
    pub fn runner(&self) -> &QueryRunner {
        &self.runner
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.sessions)
    }
}
