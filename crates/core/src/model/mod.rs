mod ids;
mod query;
mod quiz;
mod session;
mod topic;

pub use ids::{DatasetId, ExampleId, ParseIdError, QuestionId, SessionId, TopicId};
pub use query::{QueryError, TabularResult, Value};
pub use quiz::{Answer, AnswerError, AnswerFeedback, AnswerKind, CorrectAnswer, QuizQuestion};
pub use session::{
    Score, SessionError, SessionEvent, SessionProgress, SessionState, SessionStatus,
    TopicProgress,
};
pub use topic::{ExpectedShape, LessonSection, QueryExample, Topic};
