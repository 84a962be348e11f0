use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlearn_core::Catalog;
use sqlearn_core::model::{
    AnswerFeedback, Score, SessionError, SessionEvent, SessionId, SessionProgress, SessionState,
    SessionStatus, TopicId,
};

use crate::Clock;

/// One learner's session: the state machine plus the clock that stamps it.
///
/// Mutations take `&mut self`, so a tracker is driven by one caller at a
/// time. Share it through [`SessionRegistry`](super::SessionRegistry) when
/// several tasks need access.
pub struct SessionTracker {
    clock: Clock,
    catalog: Arc<Catalog>,
    state: SessionState,
}

impl SessionTracker {
    /// Start a fresh, active session.
    #[must_use]
    pub fn start(clock: Clock, catalog: Arc<Catalog>) -> Self {
        let state = SessionState::new(SessionId::new_v4(), clock.now());
        tracing::debug!(session = %state.id(), "session started");
        Self {
            clock,
            catalog,
            state,
        }
    }

    /// Rebuild a session from a recorded event log.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Replay` if the log breaks the session rules.
    pub fn replay(
        clock: Clock,
        catalog: Arc<Catalog>,
        id: SessionId,
        started_at: DateTime<Utc>,
        events: &[SessionEvent],
    ) -> Result<Self, SessionError> {
        let state = SessionState::replay(id, started_at, &catalog, events)?;
        Ok(Self {
            clock,
            catalog,
            state,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.state.id()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Record a topic visit. Returns `true` on the first visit.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionEnded` or `SessionError::TopicNotFound`.
    pub fn visit_topic(&mut self, topic: &str) -> Result<bool, SessionError> {
        let first = self
            .state
            .visit_topic(&self.catalog, topic, self.clock.now())?;
        if first {
            tracing::debug!(session = %self.id(), topic, "topic visited");
        }
        Ok(first)
    }

    /// Answer a single-choice question by candidate index.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionEnded`, `QuestionNotFound`, or `Answer`
    /// for an out-of-range index or a multi-select question.
    pub fn submit_answer(
        &mut self,
        question: &str,
        answer_index: usize,
    ) -> Result<AnswerFeedback, SessionError> {
        let feedback =
            self.state
                .submit_answer(&self.catalog, question, answer_index, self.clock.now())?;
        tracing::debug!(session = %self.id(), question, correct = feedback.correct, "answer recorded");
        Ok(feedback)
    }

    /// Answer a multi-select question.
    ///
    /// # Errors
    ///
    /// Same as [`SessionTracker::submit_answer`].
    pub fn submit_selection(
        &mut self,
        question: &str,
        indices: &[usize],
    ) -> Result<AnswerFeedback, SessionError> {
        let feedback =
            self.state
                .submit_selection(&self.catalog, question, indices, self.clock.now())?;
        tracing::debug!(session = %self.id(), question, correct = feedback.correct, "selection recorded");
        Ok(feedback)
    }

    /// # Errors
    ///
    /// Returns `SessionError::SessionEnded` if already ended.
    pub fn end_session(&mut self) -> Result<Score, SessionError> {
        self.state.end(self.clock.now())?;
        let score = self.score();
        tracing::info!(
            session = %self.id(),
            correct = score.correct,
            answered = score.answered,
            "session ended"
        );
        Ok(score)
    }

    #[must_use]
    pub fn score(&self) -> Score {
        self.state.score(&self.catalog)
    }

    #[must_use]
    pub fn visited(&self) -> &BTreeSet<TopicId> {
        self.state.visited()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        self.state.progress(&self.catalog)
    }

    #[must_use]
    pub fn events(&self) -> &[SessionEvent] {
        self.state.events()
    }
}
