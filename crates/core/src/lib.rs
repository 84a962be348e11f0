#![forbid(unsafe_code)]

pub mod catalog;
pub mod model;
pub mod statement;
pub mod time;

pub use catalog::{Catalog, CatalogError};
pub use time::Clock;
