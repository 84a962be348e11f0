use std::time::Duration;

use storage::QueryLimits;
use thiserror::Error;

pub const QUERY_TIMEOUT_ENV: &str = "SQLEARN_QUERY_TIMEOUT_MS";
pub const MAX_ROWS_ENV: &str = "SQLEARN_MAX_ROWS";

const DEFAULT_TIMEOUT_MS: u64 = 2_000;
const MAX_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_MAX_ROWS: usize = 500;
const MAX_MAX_ROWS: usize = 100_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{key} must be a whole number, got {raw:?}")]
    NotANumber { key: &'static str, raw: String },
    #[error("query timeout must be between 1 and 60000 ms, got {0}")]
    TimeoutOutOfRange(u64),
    #[error("max rows must be between 1 and 100000, got {0}")]
    MaxRowsOutOfRange(usize),
}

/// Limits applied to every learner query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    query_timeout: Duration,
    max_rows: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

impl RunnerConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` if either value is outside its accepted range.
    pub fn new(timeout_ms: u64, max_rows: usize) -> Result<Self, ConfigError> {
        Self::default().with_timeout_ms(timeout_ms)?.with_max_rows(max_rows)
    }

    /// Read overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unparsable or out-of-range values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unparsable or out-of-range values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(QUERY_TIMEOUT_ENV) {
            config = config.with_timeout_ms(parse(QUERY_TIMEOUT_ENV, &raw)?)?;
        }
        if let Some(raw) = lookup(MAX_ROWS_ENV) {
            config = config.with_max_rows(parse(MAX_ROWS_ENV, &raw)?)?;
        }
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::TimeoutOutOfRange` outside `1..=60000`.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Result<Self, ConfigError> {
        if !(1..=MAX_TIMEOUT_MS).contains(&timeout_ms) {
            return Err(ConfigError::TimeoutOutOfRange(timeout_ms));
        }
        self.query_timeout = Duration::from_millis(timeout_ms);
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::MaxRowsOutOfRange` outside `1..=100000`.
    pub fn with_max_rows(mut self, max_rows: usize) -> Result<Self, ConfigError> {
        if !(1..=MAX_MAX_ROWS).contains(&max_rows) {
            return Err(ConfigError::MaxRowsOutOfRange(max_rows));
        }
        self.max_rows = max_rows;
        Ok(self)
    }

    #[must_use]
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    #[must_use]
    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    #[must_use]
    pub fn limits(&self) -> QueryLimits {
        QueryLimits {
            timeout: self.query_timeout,
            max_rows: self.max_rows,
        }
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::NotANumber {
        key,
        raw: raw.to_string(),
    })
}
