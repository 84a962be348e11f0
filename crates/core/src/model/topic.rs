use serde::{Deserialize, Serialize};

use crate::model::ids::{DatasetId, ExampleId, TopicId};
use crate::model::query::TabularResult;
use crate::model::quiz::QuizQuestion;

//
// ─── LESSONS ───────────────────────────────────────────────────────────────────
//

/// One section of a lesson; `body` is markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonSection {
    pub heading: String,
    pub body: String,
}

//
// ─── EXAMPLES ──────────────────────────────────────────────────────────────────
//

/// Column names and row count an example is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedShape {
    pub columns: Vec<String>,
    pub rows: usize,
}

impl ExpectedShape {
    #[must_use]
    pub fn matches(&self, result: &TabularResult) -> bool {
        result.columns() == self.columns.as_slice() && result.row_count() == self.rows
    }
}

/// A query shown in a lesson.
///
/// Examples without a dataset are illustrative only (for instance `INSERT` or
/// `CREATE TRIGGER` statements) and cannot be run against the sample data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryExample {
    id: ExampleId,
    title: String,
    sql: String,
    #[serde(default)]
    dataset: Option<DatasetId>,
    #[serde(default)]
    expected: Option<ExpectedShape>,
}

impl QueryExample {
    #[must_use]
    pub fn new(
        id: ExampleId,
        title: impl Into<String>,
        sql: impl Into<String>,
        dataset: Option<DatasetId>,
        expected: Option<ExpectedShape>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            sql: sql.into(),
            dataset,
            expected,
        }
    }

    #[must_use]
    pub fn id(&self) -> &ExampleId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn dataset(&self) -> Option<&DatasetId> {
        self.dataset.as_ref()
    }

    #[must_use]
    pub fn expected(&self) -> Option<&ExpectedShape> {
        self.expected.as_ref()
    }

    #[must_use]
    pub fn is_runnable(&self) -> bool {
        self.dataset.is_some()
    }
}

//
// ─── TOPIC ─────────────────────────────────────────────────────────────────────
//

/// A single SQL concept unit: lessons, runnable examples and quiz items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    id: TopicId,
    title: String,
    order: u32,
    #[serde(default)]
    summary: String,
    sections: Vec<LessonSection>,
    #[serde(default)]
    examples: Vec<QueryExample>,
    #[serde(default)]
    quiz: Vec<QuizQuestion>,
}

impl Topic {
    #[must_use]
    pub fn new(
        id: TopicId,
        title: impl Into<String>,
        order: u32,
        sections: Vec<LessonSection>,
        examples: Vec<QueryExample>,
        quiz: Vec<QuizQuestion>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            order,
            summary: String::new(),
            sections,
            examples,
            quiz,
        }
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    #[must_use]
    pub fn id(&self) -> &TopicId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Position of the topic in the learning path, starting at 1.
    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    #[must_use]
    pub fn sections(&self) -> &[LessonSection] {
        &self.sections
    }

    #[must_use]
    pub fn examples(&self) -> &[QueryExample] {
        &self.examples
    }

    #[must_use]
    pub fn quiz(&self) -> &[QuizQuestion] {
        &self.quiz
    }
}
