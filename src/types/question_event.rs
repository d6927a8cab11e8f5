use serde::{Deserialize, Serialize};

/// A question some widget wants asked in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionEvent {
    /// The question text.
    pub question: String,
}

impl QuestionEvent {
    /// Creates a new event.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
        }
    }
}
