use serde::ser::{Serialize, SerializeMap, Serializer};

use quiz_core::model::{Report, SanitizedQuestion, SessionId};

/// Returned by `SessionEngine::start`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedSession {
    pub session_id: SessionId,
    pub total_questions: usize,
    pub first_question: SanitizedQuestion,
}

/// Result of submitting one answer.
///
/// Serializes as `{"isFinished": false, "nextQuestion": ..}` or
/// `{"isFinished": true, "results": ..}`.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    Next(SanitizedQuestion),
    Finished(Box<Report>),
}

impl AnswerOutcome {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }

    #[must_use]
    pub fn next_question(&self) -> Option<&SanitizedQuestion> {
        match self {
            Self::Next(q) => Some(q),
            Self::Finished(_) => None,
        }
    }

    #[must_use]
    pub fn results(&self) -> Option<&Report> {
        match self {
            Self::Next(_) => None,
            Self::Finished(report) => Some(report),
        }
    }
}

impl Serialize for AnswerOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            Self::Next(question) => {
                map.serialize_entry("isFinished", &false)?;
                map.serialize_entry("nextQuestion", question)?;
            }
            Self::Finished(report) => {
                map.serialize_entry("isFinished", &true)?;
                map.serialize_entry("results", report)?;
            }
        }
        map.end()
    }
}
