use serde::{Deserialize, Serialize};

/// Body of a successful chat endpoint reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Assistant text; may embed a follow-up directive.
    pub response: String,
}

impl ChatResponse {
    /// Creates a response with the given text.
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}
