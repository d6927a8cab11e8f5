//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::engine::{DEFAULT_GREETING, EngineConfig};
use crate::recall::DEFAULT_RECALL_CAPACITY;
use crate::reveal::DEFAULT_TICK;

/// Command-line arguments for the folio-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Chat endpoint URL.
    #[arrrg(optional, "Chat endpoint (default: $FOLIO_CHAT_ENDPOINT or http://localhost:3000/api/chat)", "URL")]
    pub endpoint: Option<String>,

    /// Request timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: 30)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// Milliseconds between revealed graphemes.
    #[arrrg(optional, "Milliseconds per revealed grapheme (default: 20)", "MS")]
    pub tick_ms: Option<u64>,

    /// Greeting shown when the conversation starts.
    #[arrrg(optional, "Opening assistant message", "TEXT")]
    pub greeting: Option<String>,

    /// Portfolio catalog to browse.
    #[arrrg(optional, "Portfolio catalog JSON file", "PATH")]
    pub catalog: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Log debug events to stderr.
    #[arrrg(flag, "Log debug events to stderr")]
    pub verbose: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Endpoint override; `None` defers to the environment.
    pub endpoint: Option<String>,

    /// Request timeout; `None` uses the client default.
    pub timeout: Option<Duration>,

    /// Time between revealed graphemes.
    pub tick: Duration,

    /// Opening assistant message.
    pub greeting: String,

    /// How many submissions recall remembers.
    pub recall_capacity: usize,

    /// Catalog file; `None` uses the built-in catalog.
    pub catalog_path: Option<PathBuf>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Whether to log debug events.
    pub verbose: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Endpoint: from the environment
    /// - Tick: 20 ms
    /// - Recall: 5 entries
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            endpoint: None,
            timeout: None,
            tick: DEFAULT_TICK,
            greeting: DEFAULT_GREETING.to_string(),
            recall_capacity: DEFAULT_RECALL_CAPACITY,
            catalog_path: None,
            use_color: true,
            verbose: false,
        }
    }

    /// Sets the endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the reveal tick.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Sets the greeting.
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Sets the catalog file.
    pub fn with_catalog_path(mut self, path: Option<PathBuf>) -> Self {
        self.catalog_path = path;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// The engine settings this config implies.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new()
            .with_greeting(self.greeting.clone())
            .with_tick(self.tick)
            .with_recall_capacity(self.recall_capacity)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let defaults = ChatConfig::new();
        ChatConfig {
            endpoint: args.endpoint,
            timeout: args.timeout_secs.map(Duration::from_secs),
            tick: args.tick_ms.map(Duration::from_millis).unwrap_or(defaults.tick),
            greeting: args.greeting.unwrap_or(defaults.greeting),
            catalog_path: args.catalog.map(PathBuf::from),
            use_color: !args.no_color,
            verbose: args.verbose,
            ..ChatConfig::new()
        }
    }
}
