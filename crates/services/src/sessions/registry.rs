use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use sqlearn_core::Catalog;
use sqlearn_core::model::{AnswerFeedback, Score, SessionId, SessionProgress, TopicId};

use super::tracker::SessionTracker;
use crate::Clock;
use crate::error::Error;

pub type SessionHandle = Arc<tokio::sync::Mutex<SessionTracker>>;

/// Concurrent store of live sessions keyed by id.
///
/// The map lock is held only to look up, insert or remove a handle. Work on a
/// session happens under that session's own async mutex, so sessions never
/// wait on each other.
pub struct SessionRegistry {
    clock: Clock,
    catalog: Arc<Catalog>,
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(clock: Clock, catalog: Arc<Catalog>) -> Self {
        Self {
            clock,
            catalog,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Start and register a new session.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the registry lock is poisoned.
    pub fn start(&self) -> Result<SessionId, Error> {
        let tracker = SessionTracker::start(self.clock, Arc::clone(&self.catalog));
        let id = tracker.id();
        self.lock()?
            .insert(id, Arc::new(tokio::sync::Mutex::new(tracker)));
        Ok(id)
    }

    /// Shared handle to a session.
    ///
    /// # Errors
    ///
    /// Returns `Error::SessionNotFound` for unknown ids.
    pub fn get(&self, id: SessionId) -> Result<SessionHandle, Error> {
        self.lock()?
            .get(&id)
            .cloned()
            .ok_or(Error::SessionNotFound(id))
    }

    /// # Errors
    ///
    /// Returns `Error::SessionNotFound` or the session's own error.
    pub async fn visit_topic(&self, id: SessionId, topic: &str) -> Result<bool, Error> {
        let handle = self.get(id)?;
        let mut tracker = handle.lock().await;
        Ok(tracker.visit_topic(topic)?)
    }

    /// # Errors
    ///
    /// Returns `Error::SessionNotFound` or the session's own error.
    pub async fn submit_answer(
        &self,
        id: SessionId,
        question: &str,
        answer_index: usize,
    ) -> Result<AnswerFeedback, Error> {
        let handle = self.get(id)?;
        let mut tracker = handle.lock().await;
        Ok(tracker.submit_answer(question, answer_index)?)
    }

    /// # Errors
    ///
    /// Returns `Error::SessionNotFound` or the session's own error.
    pub async fn submit_selection(
        &self,
        id: SessionId,
        question: &str,
        indices: &[usize],
    ) -> Result<AnswerFeedback, Error> {
        let handle = self.get(id)?;
        let mut tracker = handle.lock().await;
        Ok(tracker.submit_selection(question, indices)?)
    }

    /// End a session. It stays registered so its score can still be read.
    ///
    /// # Errors
    ///
    /// Returns `Error::SessionNotFound`, or `SessionEnded` when already ended.
    pub async fn end(&self, id: SessionId) -> Result<Score, Error> {
        let handle = self.get(id)?;
        let mut tracker = handle.lock().await;
        Ok(tracker.end_session()?)
    }

    /// # Errors
    ///
    /// Returns `Error::SessionNotFound` for unknown ids.
    pub async fn score(&self, id: SessionId) -> Result<Score, Error> {
        let handle = self.get(id)?;
        let tracker = handle.lock().await;
        Ok(tracker.score())
    }

    /// # Errors
    ///
    /// Returns `Error::SessionNotFound` for unknown ids.
    pub async fn visited(&self, id: SessionId) -> Result<BTreeSet<TopicId>, Error> {
        let handle = self.get(id)?;
        let tracker = handle.lock().await;
        Ok(tracker.visited().clone())
    }

    /// # Errors
    ///
    /// Returns `Error::SessionNotFound` for unknown ids.
    pub async fn progress(&self, id: SessionId) -> Result<SessionProgress, Error> {
        let handle = self.get(id)?;
        let tracker = handle.lock().await;
        Ok(tracker.progress())
    }

    /// Forget a session. Returns whether it was registered.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the registry lock is poisoned.
    pub fn discard(&self, id: SessionId) -> Result<bool, Error> {
        let removed = self.lock()?.remove(&id).is_some();
        if removed {
            tracing::debug!(session = %id, "session discarded");
        }
        Ok(removed)
    }

    /// # Errors
    ///
    /// Returns `Error::Internal` if the registry lock is poisoned.
    pub fn len(&self) -> Result<usize, Error> {
        Ok(self.lock()?.len())
    }

    /// # Errors
    ///
    /// Returns `Error::Internal` if the registry lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<SessionId, SessionHandle>>, Error> {
        self.sessions
            .lock()
            .map_err(|_| Error::Internal("session registry lock poisoned".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use sqlearn_core::time::fixed_clock;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(fixed_clock(), Arc::new(Catalog::bundled().unwrap()))
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let registry = registry();
        let a = registry.start().unwrap();
        let b = registry.start().unwrap();
        assert_ne!(a, b);

        registry.visit_topic(a, "joins").await.unwrap();
        registry.end(b).await.unwrap();

        assert_eq!(registry.visited(a).await.unwrap().len(), 1);
        assert!(registry.visited(b).await.unwrap().is_empty());
        assert_eq!(
            registry.visit_topic(b, "joins").await.unwrap_err().kind(),
            ErrorKind::SessionEnded
        );
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let registry = registry();
        let err = registry.score(SessionId::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn discard_removes_session() {
        let registry = registry();
        let id = registry.start().unwrap();
        assert_eq!(registry.len().unwrap(), 1);
        assert!(registry.discard(id).unwrap());
        assert!(!registry.discard(id).unwrap());
        assert!(registry.is_empty().unwrap());
    }
}
