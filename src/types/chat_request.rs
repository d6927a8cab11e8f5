use serde::{Deserialize, Serialize};

use crate::types::{Message, Origin};

/// Role of a forwarded turn, as the chat endpoint expects it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Visitor turn.
    User,

    /// Assistant turn.
    Assistant,
}

impl From<Origin> for Role {
    fn from(origin: Origin) -> Self {
        match origin {
            Origin::User => Role::User,
            Origin::Assistant => Role::Assistant,
        }
    }
}

/// A prior turn forwarded with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    /// Who said it.
    pub role: Role,

    /// What was said.
    pub content: String,
}

impl From<&Message> for HistoryTurn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.origin.into(),
            content: message.text.clone(),
        }
    }
}

/// Body of one `POST` to the chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The text being submitted.
    pub message: String,

    /// Every committed turn before this one, oldest first, without the greeting.
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
}

impl ChatRequest {
    /// Creates a request from the submitted text and the turns that precede it.
    ///
    /// `prior` must already exclude the seed greeting.
    pub fn new(message: impl Into<String>, prior: &[Message]) -> Self {
        Self {
            message: message.into(),
            history: prior.iter().map(HistoryTurn::from).collect(),
        }
    }
}
