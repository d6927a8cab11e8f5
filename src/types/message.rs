use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

static LAST_MESSAGE_ID: AtomicU64 = AtomicU64::new(0);

/// A time-ordered message identifier.
///
/// Ids are derived from the wall clock in milliseconds and bumped so that
/// every id handed out by this process is strictly greater than the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    /// Allocates a fresh id.
    pub fn next() -> Self {
        let now = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000).max(0) as u64;
        let prev = LAST_MESSAGE_ID
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        MessageId(now.max(prev + 1))
    }

    /// Returns the raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a turn.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Typed or injected by the visitor.
    User,

    /// Produced by the chat endpoint (or the engine's fallback).
    Assistant,
}

/// One committed turn of the conversation.
///
/// `text` always holds the complete content, including any follow-up
/// directive the endpoint embedded in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique, time-ordered id.
    pub id: MessageId,

    /// Full textual content.
    pub text: String,

    /// Author of the turn.
    pub origin: Origin,

    /// When the turn was committed.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,
}

impl Message {
    /// Creates a message with a fresh id and the current time.
    pub fn new(text: impl Into<String>, origin: Origin) -> Self {
        Self {
            id: MessageId::next(),
            text: text.into(),
            origin,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Creates a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, Origin::User)
    }

    /// Creates an assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(text, Origin::Assistant)
    }

    /// Returns true if the visitor authored this turn.
    pub fn is_user(&self) -> bool {
        self.origin == Origin::User
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_strictly_increase() {
        let ids: Vec<MessageId> = (0..64).map(|_| MessageId::next()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn message_serializes_rfc3339_timestamp() {
        let mut message = Message::user("Hello");
        message.created_at = time::macros::datetime!(2024-05-01 12:30:00 UTC);
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["text"], "Hello");
        assert_eq!(json["origin"], "user");
        assert_eq!(json["created_at"], "2024-05-01T12:30:00Z");

        let parsed: Message = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, message);
    }
}
