// Public modules
pub mod bus;
pub mod catalog;
pub mod chat;
pub mod chat_logger;
pub mod client;
pub mod directive;
pub mod engine;
pub mod error;
pub mod recall;
pub mod render;
pub mod reveal;
pub mod service;
pub mod types;
pub mod utils;

mod observability;

// Re-exports
pub use bus::{QuestionBus, Subscription};
pub use catalog::{Catalog, CatalogCard, CatalogSection, QuestionWidget};
pub use chat_logger::{ChatLogger, TracingLogger};
pub use client::ChatClient;
pub use engine::{
    ChatEngine, ChatPhase, ConversationSnapshot, EngineConfig, EngineStats, FALLBACK_REPLY, View,
};
pub use error::{Error, FailureReason, Result};
pub use observability::register_biometrics;
pub use recall::{Direction, RecallHistory};
pub use render::{PlainTextRenderer, Renderer};
pub use reveal::{PendingStream, RevealHandle, RevealSink};
pub use service::ChatService;
pub use types::*;
