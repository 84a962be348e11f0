//! Immutable content catalog: topics, lessons, examples and quiz questions.
//!
//! The catalog is parsed and validated once; afterwards it is only read, so it
//! can be shared between sessions behind an `Arc` without locking.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use thiserror::Error;

use crate::model::{DatasetId, ExampleId, QueryExample, QuestionId, QuizQuestion, Topic, TopicId};

const BUNDLED_CATALOG: &str = include_str!("../data/catalog.json");

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("topic not found: {0}")]
    TopicNotFound(String),

    #[error("question not found: {0}")]
    QuestionNotFound(String),

    #[error("example not found: {0}")]
    ExampleNotFound(String),

    #[error("duplicate {kind} id in catalog: {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("topic {topic} is invalid: {reason}")]
    InvalidTopic { topic: TopicId, reason: String },

    #[error("question {question} is invalid: {reason}")]
    InvalidQuestion { question: QuestionId, reason: String },

    #[error("example {example} references unknown dataset {dataset}")]
    UnknownDataset {
        example: ExampleId,
        dataset: DatasetId,
    },

    #[error("catalog document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl CatalogError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::TopicNotFound(_)
                | CatalogError::QuestionNotFound(_)
                | CatalogError::ExampleNotFound(_)
        )
    }
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

#[derive(Deserialize)]
struct CatalogDocument {
    topics: Vec<Topic>,
}

/// Read-only index over all topics, ordered by their learning-path position.
#[derive(Debug, Clone)]
pub struct Catalog {
    topics: Vec<Topic>,
    topic_index: HashMap<TopicId, usize>,
    question_index: HashMap<QuestionId, (usize, usize)>,
    example_index: HashMap<ExampleId, (usize, usize)>,
}

impl Catalog {
    /// Load the catalog bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the bundled document fails to parse or validate.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json(BUNDLED_CATALOG)
    }

    /// Parse and validate a catalog document of the form `{"topics": [...]}`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Malformed` for JSON errors and a validation
    /// variant for authoring problems.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        Self::from_topics(document.topics)
    }

    /// Build a catalog from already constructed topics.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateId` when topic, question or example ids
    /// (or topic positions) collide, and `InvalidTopic`/`InvalidQuestion` for
    /// malformed content.
    pub fn from_topics(mut topics: Vec<Topic>) -> Result<Self, CatalogError> {
        topics.sort_by_key(Topic::order);

        let mut topic_index = HashMap::with_capacity(topics.len());
        let mut question_index = HashMap::new();
        let mut example_index = HashMap::new();
        let mut orders = HashSet::with_capacity(topics.len());

        for (t, topic) in topics.iter().enumerate() {
            validate_topic(topic)?;
            if !orders.insert(topic.order()) {
                return Err(CatalogError::DuplicateId {
                    kind: "topic order",
                    id: topic.order().to_string(),
                });
            }
            if topic_index.insert(topic.id().clone(), t).is_some() {
                return Err(CatalogError::DuplicateId {
                    kind: "topic",
                    id: topic.id().to_string(),
                });
            }

            for (q, question) in topic.quiz().iter().enumerate() {
                if let Some(reason) = question.definition_problem() {
                    return Err(CatalogError::InvalidQuestion {
                        question: question.id().clone(),
                        reason,
                    });
                }
                if question_index.insert(question.id().clone(), (t, q)).is_some() {
                    return Err(CatalogError::DuplicateId {
                        kind: "question",
                        id: question.id().to_string(),
                    });
                }
            }

            for (e, example) in topic.examples().iter().enumerate() {
                if example_index.insert(example.id().clone(), (t, e)).is_some() {
                    return Err(CatalogError::DuplicateId {
                        kind: "example",
                        id: example.id().to_string(),
                    });
                }
            }
        }

        Ok(Self {
            topics,
            topic_index,
            question_index,
            example_index,
        })
    }

    /// All topics in learning-path order.
    #[must_use]
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Look up a topic by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::TopicNotFound` for unknown ids.
    pub fn get_topic(&self, id: impl AsRef<str>) -> Result<&Topic, CatalogError> {
        let id = id.as_ref();
        self.topic_index
            .get(id)
            .map(|t| &self.topics[*t])
            .ok_or_else(|| CatalogError::TopicNotFound(id.to_string()))
    }

    /// Look up a quiz question by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::QuestionNotFound` for unknown ids.
    pub fn question(&self, id: impl AsRef<str>) -> Result<&QuizQuestion, CatalogError> {
        let id = id.as_ref();
        self.question_index
            .get(id)
            .map(|(t, q)| &self.topics[*t].quiz()[*q])
            .ok_or_else(|| CatalogError::QuestionNotFound(id.to_string()))
    }

    /// The topic a question belongs to.
    #[must_use]
    pub fn topic_of_question(&self, id: &QuestionId) -> Option<&Topic> {
        self.question_index.get(id).map(|(t, _)| &self.topics[*t])
    }

    /// Look up an example query by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ExampleNotFound` for unknown ids.
    pub fn example(&self, id: impl AsRef<str>) -> Result<&QueryExample, CatalogError> {
        let id = id.as_ref();
        self.example_index
            .get(id)
            .map(|(t, e)| &self.topics[*t].examples()[*e])
            .ok_or_else(|| CatalogError::ExampleNotFound(id.to_string()))
    }

    /// Every example of every topic, in topic order.
    pub fn examples(&self) -> impl Iterator<Item = &QueryExample> {
        self.topics.iter().flat_map(|t| t.examples().iter())
    }

    /// Every dataset referenced by a runnable example, without duplicates.
    #[must_use]
    pub fn referenced_datasets(&self) -> Vec<&DatasetId> {
        let mut seen = HashSet::new();
        self.examples()
            .filter_map(QueryExample::dataset)
            .filter(|d| seen.insert(*d))
            .collect()
    }

    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.question_index.len()
    }
}

fn validate_topic(topic: &Topic) -> Result<(), CatalogError> {
    let invalid = |reason: &str| CatalogError::InvalidTopic {
        topic: topic.id().clone(),
        reason: reason.to_string(),
    };

    if topic.title().trim().is_empty() {
        return Err(invalid("title is empty"));
    }
    if topic.sections().is_empty() {
        return Err(invalid("has no lesson sections"));
    }
    if let Some(example) = topic.examples().iter().find(|e| e.sql().trim().is_empty()) {
        return Err(invalid(&format!("example {} has no SQL", example.id())));
    }
    Ok(())
}
