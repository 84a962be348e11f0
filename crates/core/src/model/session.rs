use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{Catalog, CatalogError};
use crate::model::ids::{QuestionId, SessionId, TopicId};
use crate::model::quiz::{Answer, AnswerError, AnswerFeedback};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("topic not found: {0}")]
    TopicNotFound(String),

    #[error("question not found: {0}")]
    QuestionNotFound(String),

    #[error(transparent)]
    Answer(#[from] AnswerError),

    #[error("session has ended")]
    SessionEnded,

    #[error("catalog lookup failed: {0}")]
    Catalog(String),

    #[error("event {index} cannot be replayed: {source}")]
    Replay {
        index: usize,
        source: Box<SessionError>,
    },
}

impl SessionError {
    fn from_lookup(err: CatalogError) -> Self {
        match err {
            CatalogError::TopicNotFound(id) => SessionError::TopicNotFound(id),
            CatalogError::QuestionNotFound(id) => SessionError::QuestionNotFound(id),
            other => SessionError::Catalog(other.to_string()),
        }
    }
}

//
// ─── STATUS, EVENTS, SCORE ─────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Ended,
}

/// An accepted mutation, in the order it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    TopicVisited {
        topic: TopicId,
        at: DateTime<Utc>,
    },
    AnswerSubmitted {
        question: QuestionId,
        answer: Answer,
        at: DateTime<Utc>,
    },
    SessionEnded {
        at: DateTime<Utc>,
    },
}

/// Correct answers out of distinct questions answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Score {
    pub correct: u32,
    pub answered: u32,
}

impl Score {
    /// Share of correct answers in `[0, 1]`, or `None` before the first answer.
    #[must_use]
    pub fn ratio(&self) -> Option<f64> {
        (self.answered > 0).then(|| f64::from(self.correct) / f64::from(self.answered))
    }
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Per-topic progress row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicProgress {
    pub topic: TopicId,
    pub title: String,
    pub visited: bool,
    pub questions: usize,
    pub answered: usize,
    pub correct: usize,
}

impl TopicProgress {
    /// Every question of the topic has been answered correctly.
    #[must_use]
    pub fn is_mastered(&self) -> bool {
        self.questions > 0 && self.correct == self.questions
    }
}

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionProgress {
    pub topics: Vec<TopicProgress>,
    pub visited_topics: usize,
    pub total_topics: usize,
    pub total_questions: usize,
    pub score: Score,
}

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// Per-learner state: visited topics and the latest answer for each question.
///
/// Each question appears at most once in the answer mapping; a resubmission
/// replaces the earlier answer. The score is derived from the mapping on
/// demand and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    id: SessionId,
    status: SessionStatus,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    visited: BTreeSet<TopicId>,
    answers: BTreeMap<QuestionId, Answer>,
    events: Vec<SessionEvent>,
}

impl SessionState {
    #[must_use]
    pub fn new(id: SessionId, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: SessionStatus::Active,
            started_at,
            ended_at: None,
            visited: BTreeSet::new(),
            answers: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    /// Rebuild a session by re-applying an event log.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Replay` with the offending position if an event
    /// would be rejected by the live state machine.
    pub fn replay(
        id: SessionId,
        started_at: DateTime<Utc>,
        catalog: &Catalog,
        events: &[SessionEvent],
    ) -> Result<Self, SessionError> {
        let mut state = Self::new(id, started_at);
        for (index, event) in events.iter().enumerate() {
            let applied = match event {
                SessionEvent::TopicVisited { topic, at } => {
                    state.visit_topic(catalog, topic, *at).map(|_| ())
                }
                SessionEvent::AnswerSubmitted {
                    question,
                    answer,
                    at,
                } => state
                    .submit(catalog, question.as_str(), answer.clone(), *at)
                    .map(|_| ()),
                SessionEvent::SessionEnded { at } => state.end(*at),
            };
            applied.map_err(|source| SessionError::Replay {
                index,
                source: Box::new(source),
            })?;
        }
        Ok(state)
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.status == SessionStatus::Ended
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    #[must_use]
    pub fn visited(&self) -> &BTreeSet<TopicId> {
        &self.visited
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<QuestionId, Answer> {
        &self.answers
    }

    #[must_use]
    pub fn answer_for(&self, question: &QuestionId) -> Option<&Answer> {
        self.answers.get(question)
    }

    #[must_use]
    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    /// Mark a topic as visited.
    ///
    /// Returns `true` the first time the topic is visited; later visits leave
    /// the state untouched.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionEnded` after `end`, or
    /// `SessionError::TopicNotFound` for topics missing from the catalog.
    pub fn visit_topic(
        &mut self,
        catalog: &Catalog,
        topic: impl AsRef<str>,
        at: DateTime<Utc>,
    ) -> Result<bool, SessionError> {
        self.ensure_active()?;
        let topic = catalog
            .get_topic(topic)
            .map_err(SessionError::from_lookup)?
            .id()
            .clone();

        if self.visited.contains(&topic) {
            return Ok(false);
        }
        self.visited.insert(topic.clone());
        self.events.push(SessionEvent::TopicVisited { topic, at });
        Ok(true)
    }

    /// Submit a single-choice answer, replacing any earlier answer to the question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionEnded`, `SessionError::QuestionNotFound`,
    /// or `SessionError::Answer` (out-of-range index, wrong answer kind).
    /// The answer mapping is unchanged on error.
    pub fn submit_answer(
        &mut self,
        catalog: &Catalog,
        question: impl AsRef<str>,
        answer_index: usize,
        at: DateTime<Utc>,
    ) -> Result<AnswerFeedback, SessionError> {
        self.submit(catalog, question.as_ref(), Answer::Single(answer_index), at)
    }

    /// Submit the selected candidates of a multi-select question.
    ///
    /// # Errors
    ///
    /// Same as `submit_answer`.
    pub fn submit_selection(
        &mut self,
        catalog: &Catalog,
        question: impl AsRef<str>,
        indices: &[usize],
        at: DateTime<Utc>,
    ) -> Result<AnswerFeedback, SessionError> {
        self.submit(catalog, question.as_ref(), Answer::selection(indices), at)
    }

    fn submit(
        &mut self,
        catalog: &Catalog,
        question: &str,
        answer: Answer,
        at: DateTime<Utc>,
    ) -> Result<AnswerFeedback, SessionError> {
        self.ensure_active()?;
        let question = catalog
            .question(question)
            .map_err(SessionError::from_lookup)?;
        let feedback = question.grade(&answer)?;

        let question = question.id().clone();
        self.answers.insert(question.clone(), answer.clone());
        self.events.push(SessionEvent::AnswerSubmitted {
            question,
            answer,
            at,
        });
        Ok(feedback)
    }

    /// End the session. Reads keep working; mutations fail from now on.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionEnded` if the session already ended.
    pub fn end(&mut self, at: DateTime<Utc>) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.status = SessionStatus::Ended;
        self.ended_at = Some(at);
        self.events.push(SessionEvent::SessionEnded { at });
        Ok(())
    }

    /// Recompute the score from the answer mapping.
    #[must_use]
    pub fn score(&self, catalog: &Catalog) -> Score {
        let correct = self
            .answers
            .iter()
            .filter(|(question, answer)| {
                catalog
                    .question(question)
                    .is_ok_and(|q| q.is_correct(answer))
            })
            .count();

        Score {
            correct: u32::try_from(correct).unwrap_or(u32::MAX),
            answered: u32::try_from(self.answers.len()).unwrap_or(u32::MAX),
        }
    }

    /// Per-topic and overall progress against the catalog.
    #[must_use]
    pub fn progress(&self, catalog: &Catalog) -> SessionProgress {
        let topics: Vec<TopicProgress> = catalog
            .topics()
            .iter()
            .map(|topic| {
                let answered: Vec<_> = topic
                    .quiz()
                    .iter()
                    .filter_map(|q| self.answers.get(q.id()).map(|a| (q, a)))
                    .collect();
                TopicProgress {
                    topic: topic.id().clone(),
                    title: topic.title().to_string(),
                    visited: self.visited.contains(topic.id()),
                    questions: topic.quiz().len(),
                    answered: answered.len(),
                    correct: answered.iter().filter(|(q, a)| q.is_correct(a)).count(),
                }
            })
            .collect();

        SessionProgress {
            visited_topics: self.visited.len(),
            total_topics: catalog.topic_count(),
            total_questions: catalog.question_count(),
            score: self.score(catalog),
            topics,
        }
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::Active => Ok(()),
            SessionStatus::Ended => Err(SessionError::SessionEnded),
        }
    }
}
