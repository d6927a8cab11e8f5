//! The seam between the conversation engine and the AI endpoint.

use crate::error::Result;
use crate::types::{ChatRequest, ChatResponse};

/// An opaque request/response chat service.
///
/// [`ChatClient`](crate::ChatClient) implements this over HTTP; tests
/// implement it with scripted replies.
#[async_trait::async_trait]
pub trait ChatService: Send + Sync {
    /// Sends one request and waits for the complete reply.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures, non-success statuses, and
    /// bodies that do not match [`ChatResponse`].
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse>;
}
