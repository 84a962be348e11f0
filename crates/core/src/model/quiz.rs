use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Reasons an answer cannot be accepted for a question.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("answer index {index} is out of range for {question} ({candidates} candidates)")]
    InvalidAnswerIndex {
        question: QuestionId,
        index: usize,
        candidates: usize,
    },

    #[error("question {question} expects a {expected} answer")]
    KindMismatch {
        question: QuestionId,
        expected: AnswerKind,
    },
}

//
// ─── ANSWERS ───────────────────────────────────────────────────────────────────
//

/// Shape of answer a question accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    SingleChoice,
    MultiSelect,
}

impl std::fmt::Display for AnswerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerKind::SingleChoice => f.write_str("single-choice"),
            AnswerKind::MultiSelect => f.write_str("multi-select"),
        }
    }
}

/// The correct answer of a question, as authored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrectAnswer {
    SingleChoice { index: usize },
    MultiSelect { indices: BTreeSet<usize> },
}

/// A learner's submitted answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    Single(usize),
    Multiple(BTreeSet<usize>),
}

impl Answer {
    #[must_use]
    pub fn kind(&self) -> AnswerKind {
        match self {
            Answer::Single(_) => AnswerKind::SingleChoice,
            Answer::Multiple(_) => AnswerKind::MultiSelect,
        }
    }

    /// Builds a multi-select answer; duplicate indices collapse.
    #[must_use]
    pub fn selection(indices: &[usize]) -> Self {
        Answer::Multiple(indices.iter().copied().collect())
    }
}

/// Outcome of grading one answer, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerFeedback {
    pub correct: bool,
    pub message: String,
    /// Correct candidates the learner did not select (multi-select only).
    pub missing: Vec<String>,
    /// Selected candidates that are not correct (multi-select only).
    pub extra: Vec<String>,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// An immutable multiple-choice quiz item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    id: QuestionId,
    prompt: String,
    candidates: Vec<String>,
    correct: CorrectAnswer,
    explanation: String,
    hint: String,
}

impl QuizQuestion {
    #[must_use]
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        candidates: Vec<String>,
        correct: CorrectAnswer,
        explanation: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            candidates,
            correct,
            explanation: explanation.into(),
            hint: hint.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    #[must_use]
    pub fn correct(&self) -> &CorrectAnswer {
        &self.correct
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn hint(&self) -> &str {
        &self.hint
    }

    #[must_use]
    pub fn answer_kind(&self) -> AnswerKind {
        match self.correct {
            CorrectAnswer::SingleChoice { .. } => AnswerKind::SingleChoice,
            CorrectAnswer::MultiSelect { .. } => AnswerKind::MultiSelect,
        }
    }

    /// Checks that an answer has the right shape and only references existing candidates.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::KindMismatch` for a single/multi mismatch and
    /// `AnswerError::InvalidAnswerIndex` for the first out-of-range index.
    pub fn validate(&self, answer: &Answer) -> Result<(), AnswerError> {
        if answer.kind() != self.answer_kind() {
            return Err(AnswerError::KindMismatch {
                question: self.id.clone(),
                expected: self.answer_kind(),
            });
        }

        let out_of_range = match answer {
            Answer::Single(index) => (*index >= self.candidates.len()).then_some(*index),
            Answer::Multiple(indices) => indices
                .iter()
                .copied()
                .find(|index| *index >= self.candidates.len()),
        };

        match out_of_range {
            Some(index) => Err(AnswerError::InvalidAnswerIndex {
                question: self.id.clone(),
                index,
                candidates: self.candidates.len(),
            }),
            None => Ok(()),
        }
    }

    /// Correct/incorrect, with no partial credit for multi-select.
    #[must_use]
    pub fn is_correct(&self, answer: &Answer) -> bool {
        match (&self.correct, answer) {
            (CorrectAnswer::SingleChoice { index }, Answer::Single(given)) => index == given,
            (CorrectAnswer::MultiSelect { indices }, Answer::Multiple(given)) => indices == given,
            _ => false,
        }
    }

    /// Validate and grade an answer.
    ///
    /// # Errors
    ///
    /// Propagates `validate` failures.
    pub fn grade(&self, answer: &Answer) -> Result<AnswerFeedback, AnswerError> {
        self.validate(answer)?;
        let correct = self.is_correct(answer);

        let (missing, extra) = match (&self.correct, answer) {
            (CorrectAnswer::MultiSelect { indices }, Answer::Multiple(given)) => (
                self.labels(indices.difference(given)),
                self.labels(given.difference(indices)),
            ),
            _ => (Vec::new(), Vec::new()),
        };

        let message = if correct {
            self.explanation.clone()
        } else {
            self.hint.clone()
        };

        Ok(AnswerFeedback {
            correct,
            message,
            missing,
            extra,
        })
    }

    fn labels<'a>(&self, indices: impl Iterator<Item = &'a usize>) -> Vec<String> {
        indices
            .filter_map(|i| self.candidates.get(*i).cloned())
            .collect()
    }

    /// Authoring problems with this question, if any.
    pub(crate) fn definition_problem(&self) -> Option<String> {
        if self.prompt.trim().is_empty() {
            return Some("prompt is empty".into());
        }
        if self.candidates.len() < 2 {
            return Some("needs at least two candidates".into());
        }
        match &self.correct {
            CorrectAnswer::SingleChoice { index } if *index >= self.candidates.len() => {
                Some(format!("correct index {index} is out of range"))
            }
            CorrectAnswer::MultiSelect { indices } if indices.is_empty() => {
                Some("multi-select question has no correct candidates".into())
            }
            CorrectAnswer::MultiSelect { indices } => indices
                .iter()
                .find(|i| **i >= self.candidates.len())
                .map(|i| format!("correct index {i} is out of range")),
            CorrectAnswer::SingleChoice { .. } => None,
        }
    }
}
