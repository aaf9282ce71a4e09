mod engine;
mod outcome;
mod report;

// Public API of the session subsystem.
pub use engine::SessionEngine;
pub use outcome::{AnswerOutcome, StartedSession};
pub use report::{QUESTION_TEXT_UNAVAILABLE, fallback_summary};
