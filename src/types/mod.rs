// Public modules
pub mod chat_request;
pub mod chat_response;
pub mod message;
pub mod question_event;

// Re-exports
pub use chat_request::{ChatRequest, HistoryTurn, Role};
pub use chat_response::ChatResponse;
pub use message::{Message, MessageId, Origin};
pub use question_event::QuestionEvent;
