//! Terminal front end for the portfolio conversation.
//!
//! This module provides the pieces of the `folio-chat` REPL built on top of
//! the [`ChatEngine`](crate::ChatEngine):
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: Slash command parsing
//!
//! The engine renders through a [`Renderer`]; the REPL uses
//! [`PlainTextRenderer`].

mod commands;
mod config;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
