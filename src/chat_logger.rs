//! Logging hook for chat endpoint traffic.
//!
//! This module provides the [`ChatLogger`] trait that lets callers capture
//! every request the [`ChatClient`](crate::ChatClient) sends and what came
//! back.

use crate::error::Error;
use crate::types::{ChatRequest, ChatResponse};

/// A trait for logging chat endpoint interactions.
///
/// # Example
///
/// ```rust,ignore
/// use folio::{ChatLogger, ChatRequest, ChatResponse, Error};
/// use std::io::Write;
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl ChatLogger for FileLogger {
///     fn log_request(&self, request: &ChatRequest) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Request: {}", serde_json::to_string(request).unwrap()).unwrap();
///     }
///
///     fn log_response(&self, response: &ChatResponse) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Response: {}", response.response).unwrap();
///     }
///
///     fn log_failure(&self, error: &Error) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Failure: {error}").unwrap();
///     }
/// }
/// ```
pub trait ChatLogger: Send + Sync {
    /// Log a request just before it is sent.
    fn log_request(&self, request: &ChatRequest);

    /// Log a successfully parsed response.
    fn log_response(&self, response: &ChatResponse);

    /// Log a failed request, whatever the reason.
    fn log_failure(&self, error: &Error);
}

/// A [`ChatLogger`] that forwards to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ChatLogger for TracingLogger {
    fn log_request(&self, request: &ChatRequest) {
        tracing::debug!(
            text = %request.message,
            history = request.history.len(),
            "chat request"
        );
    }

    fn log_response(&self, response: &ChatResponse) {
        tracing::debug!(chars = response.response.chars().count(), "chat response");
    }

    fn log_failure(&self, error: &Error) {
        tracing::debug!(reason = %error.reason(), %error, "chat request failed");
    }
}
