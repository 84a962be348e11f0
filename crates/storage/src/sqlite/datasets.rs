use std::str::FromStr;

use sqlearn_core::model::DatasetId;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, SqliteConnection};

use crate::repository::{DatasetInfo, StorageError};

/// A named dataset: its listing metadata plus the SQL script that seeds it.
#[derive(Debug, Clone)]
pub struct DatasetDefinition {
    id: DatasetId,
    title: String,
    description: String,
    seed_sql: String,
}

impl DatasetDefinition {
    /// # Errors
    ///
    /// Returns `StorageError::InvalidDefinition` for an invalid id or an empty seed script.
    pub fn new(
        id: &str,
        title: impl Into<String>,
        description: impl Into<String>,
        seed_sql: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let id = DatasetId::new(id).map_err(|e| StorageError::InvalidDefinition(e.to_string()))?;
        let seed_sql = seed_sql.into();
        if seed_sql.trim().is_empty() {
            return Err(StorageError::InvalidDefinition(format!(
                "dataset {id} has an empty seed script"
            )));
        }
        Ok(Self {
            id,
            title: title.into(),
            description: description.into(),
            seed_sql,
        })
    }

    #[must_use]
    pub fn id(&self) -> &DatasetId {
        &self.id
    }

    #[must_use]
    pub fn seed_sql(&self) -> &str {
        &self.seed_sql
    }

    #[must_use]
    pub fn info(&self) -> DatasetInfo {
        DatasetInfo {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
        }
    }
}

/// The sample datasets shipped with the crate.
///
/// # Errors
///
/// Returns `StorageError::InvalidDefinition` if a bundled definition is malformed.
pub fn bundled() -> Result<Vec<DatasetDefinition>, StorageError> {
    Ok(vec![
        DatasetDefinition::new(
            "school",
            "School",
            "Students, courses and enrollments with scores.",
            include_str!("../../data/school.sql"),
        )?,
        DatasetDefinition::new(
            "company",
            "Company",
            "Employees, departments, managers and two team rosters for set operations.",
            include_str!("../../data/company.sql"),
        )?,
        DatasetDefinition::new(
            "retail",
            "Retail",
            "Regional sales, products with stock, a revenue view and an audit trigger.",
            include_str!("../../data/retail.sql"),
        )?,
    ])
}

/// Connection options for a process-private, shared-cache in-memory database.
///
/// Every connection opened with the returned options sees the same database,
/// which lives as long as at least one of them stays open.
pub(crate) fn memory_options(id: &DatasetId) -> Result<SqliteConnectOptions, StorageError> {
    let url = format!(
        "sqlite:file:sqlearn-{id}-{}?mode=memory&cache=shared",
        uuid::Uuid::new_v4().simple()
    );
    SqliteConnectOptions::from_str(&url).map_err(|e| StorageError::Open {
        dataset: id.clone(),
        message: e.to_string(),
    })
}

/// Open a writable connection and run the seed script on it.
///
/// The returned connection anchors the in-memory database.
pub(crate) async fn seed(
    definition: &DatasetDefinition,
    options: &SqliteConnectOptions,
) -> Result<SqliteConnection, StorageError> {
    let mut anchor = options
        .connect()
        .await
        .map_err(|e| StorageError::Open {
            dataset: definition.id.clone(),
            message: e.to_string(),
        })?;

    sqlx::raw_sql(&definition.seed_sql)
        .execute(&mut anchor)
        .await
        .map_err(|e| StorageError::Seed {
            dataset: definition.id.clone(),
            message: e.to_string(),
        })?;

    Ok(anchor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_definitions_are_valid() {
        let defs = bundled().unwrap();
        let ids: Vec<&str> = defs.iter().map(|d| d.id().as_str()).collect();
        assert_eq!(ids, ["school", "company", "retail"]);
        assert!(defs.iter().all(|d| d.seed_sql().contains("CREATE TABLE")));
    }

    #[test]
    fn empty_seed_is_rejected() {
        let err = DatasetDefinition::new("empty", "Empty", "", "  ").unwrap_err();
        assert!(matches!(err, StorageError::InvalidDefinition(_)));
    }

    #[test]
    fn invalid_id_is_rejected() {
        let err = DatasetDefinition::new("Bad Id", "Bad", "", "SELECT 1;").unwrap_err();
        assert!(matches!(err, StorageError::InvalidDefinition(_)));
    }
}
