#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog_service;
pub mod config;
pub mod error;
pub mod query_runner;
pub mod sessions;

pub use sqlearn_core::Clock;

pub use app_services::AppServices;
pub use catalog_service::{CatalogService, TopicSummary};
pub use config::{ConfigError, RunnerConfig};
pub use error::{Error, ErrorKind};
pub use query_runner::QueryRunner;
pub use sessions::{SessionError, SessionHandle, SessionRegistry, SessionTracker};
