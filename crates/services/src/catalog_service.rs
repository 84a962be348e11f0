use std::sync::Arc;

use serde::Serialize;
use sqlearn_core::Catalog;
use sqlearn_core::model::{QueryExample, QuizQuestion, Topic, TopicId};

use crate::error::Error;

/// Listing row for the topic index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicSummary {
    pub id: TopicId,
    pub title: String,
    pub order: u32,
    pub summary: String,
    pub examples: usize,
    pub questions: usize,
}

impl TopicSummary {
    fn from_topic(topic: &Topic) -> Self {
        Self {
            id: topic.id().clone(),
            title: topic.title().to_string(),
            order: topic.order(),
            summary: topic.summary().to_string(),
            examples: topic.examples().len(),
            questions: topic.quiz().len(),
        }
    }
}

/// Read-only access to lesson content.
#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<Catalog>,
}

impl CatalogService {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// # Errors
    ///
    /// Returns `Error::Catalog` with `TopicNotFound` for unknown ids.
    pub fn get_topic(&self, id: &str) -> Result<&Topic, Error> {
        Ok(self.catalog.get_topic(id)?)
    }

    /// Topics in learning-path order.
    #[must_use]
    pub fn list_topics(&self) -> Vec<TopicSummary> {
        self.catalog
            .topics()
            .iter()
            .map(TopicSummary::from_topic)
            .collect()
    }

    /// # Errors
    ///
    /// Returns `Error::Catalog` with `QuestionNotFound` for unknown ids.
    pub fn question(&self, id: &str) -> Result<&QuizQuestion, Error> {
        Ok(self.catalog.question(id)?)
    }

    /// # Errors
    ///
    /// Returns `Error::Catalog` with `ExampleNotFound` for unknown ids.
    pub fn example(&self, id: &str) -> Result<&QueryExample, Error> {
        Ok(self.catalog.example(id)?)
    }
}
