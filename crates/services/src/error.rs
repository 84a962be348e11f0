//! Shared error types for the services crate.

use thiserror::Error;

use sqlearn_core::CatalogError;
use sqlearn_core::model::{AnswerError, ExampleId, QueryError, SessionError, SessionId};
use storage::StorageError;

use crate::config::ConfigError;

/// Coarse classification used by front ends to pick a message and a tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    SyntaxError,
    UnknownDataset,
    Forbidden,
    Timeout,
    InvalidAnswerIndex,
    AnswerKindMismatch,
    SessionEnded,
    NotRunnable,
    InvalidInput,
    Internal,
}

/// Errors emitted by the services layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("example {0} is illustrative only and has no dataset to run against")]
    NotRunnable(ExampleId),
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Catalog(e) if e.is_not_found() => ErrorKind::NotFound,
            Error::Catalog(_) | Error::Storage(_) | Error::Internal(_) => ErrorKind::Internal,
            Error::Query(e) => match e {
                QueryError::Syntax { .. } => ErrorKind::SyntaxError,
                QueryError::UnknownDataset(_) => ErrorKind::UnknownDataset,
                QueryError::Forbidden { .. } => ErrorKind::Forbidden,
                QueryError::Timeout { .. } => ErrorKind::Timeout,
                _ => ErrorKind::Internal,
            },
            Error::Session(e) => session_kind(e),
            Error::Config(_) => ErrorKind::InvalidInput,
            Error::NotRunnable(_) => ErrorKind::NotRunnable,
            Error::SessionNotFound(_) => ErrorKind::NotFound,
        }
    }

    /// True when the learner caused the failure and can fix it.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        self.kind() != ErrorKind::Internal
    }
}

fn session_kind(err: &SessionError) -> ErrorKind {
    match err {
        SessionError::TopicNotFound(_) | SessionError::QuestionNotFound(_) => ErrorKind::NotFound,
        SessionError::Answer(AnswerError::InvalidAnswerIndex { .. }) => {
            ErrorKind::InvalidAnswerIndex
        }
        SessionError::Answer(AnswerError::KindMismatch { .. }) => ErrorKind::AnswerKindMismatch,
        SessionError::SessionEnded => ErrorKind::SessionEnded,
        SessionError::Replay { source, .. } => session_kind(source),
        _ => ErrorKind::Internal,
    }
}
