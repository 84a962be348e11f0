#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    DatasetInfo, DatasetRepository, QueryLimits, Storage, StorageError, TableInfo, TableKind,
};
