mod difficulty;
mod ids;
mod question;
mod report;
mod session;

pub use difficulty::{Difficulty, UnknownDifficulty};
pub use ids::{ParseIdError, QuestionId, SessionId};
pub use question::{Choice, GENERAL_TOPIC, Question, SanitizedQuestion};
pub use report::{AnswerHistoryEntry, Report, ScoreCard, TopicAccuracy, floor_percent};
pub use session::{
    AnswerRecord, ContextError, Session, SessionState, SessionStateError, TOTAL_QUESTIONS,
    UserContext, UserContextDraft,
};
