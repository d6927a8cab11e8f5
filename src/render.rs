//! Output rendering for the conversation.
//!
//! The engine reports everything the view layer shows (committed turns,
//! the loading indicator, revealed graphemes, view switches) through the
//! [`Renderer`] trait.  [`PlainTextRenderer`] writes it to a terminal.

use std::io::{self, Stdout, Write};

use crate::directive;
use crate::engine::View;
use crate::types::Message;
use crate::utils::time::clock;

/// ANSI escape code for dim text (used for the loading indicator).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text (used for injected questions).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for follow-up prompts).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for green text (used for the assistant label).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI sequence that returns to column 0 and clears the line.
const ANSI_CLEAR_LINE: &str = "\r\x1b[2K";

/// Trait for rendering conversation output.
///
/// Implementations must not call back into the engine; they run while the
/// engine holds its state lock.
pub trait Renderer: Send {
    /// Called when a user turn is committed.
    ///
    /// `injected` is true when the question came from a content widget
    /// rather than the input line.
    fn print_user(&mut self, message: &Message, injected: bool) {
        _ = message;
        _ = injected;
    }

    /// Called when the loading indicator turns on or off.
    fn set_loading(&mut self, loading: bool) {
        _ = loading;
    }

    /// Called when a reply starts being revealed.
    fn start_reveal(&mut self) {}

    /// Print newly revealed reply text.
    ///
    /// This is called once per reveal tick.
    fn print_text(&mut self, text: &str);

    /// Called when the revealed reply has been committed as `message`.
    fn finish_reveal(&mut self, message: &Message);

    /// Called when an assistant turn is committed without a reveal.
    fn print_reply(&mut self, message: &Message);

    /// Called when the engine asks the view layer to switch views.
    fn switch_view(&mut self, view: View) {
        _ = view;
    }

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

impl Renderer for () {
    fn print_text(&mut self, _: &str) {}

    fn finish_reveal(&mut self, _: &Message) {}

    fn print_reply(&mut self, _: &Message) {}

    fn print_error(&mut self, _: &str) {}

    fn print_info(&mut self, _: &str) {}
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    label: String,
    loading: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            label: "Assistant".to_string(),
            loading: false,
        }
    }

    /// Sets the label printed before assistant turns.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Flushes stdout to ensure immediate display of revealed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn clear_loading(&mut self) {
        if self.loading {
            if self.use_color {
                print!("{ANSI_CLEAR_LINE}");
            } else {
                println!();
            }
            self.loading = false;
        }
    }

    fn print_label(&mut self) {
        if self.use_color {
            print!("{ANSI_GREEN}{}:{ANSI_RESET} ", self.label);
        } else {
            print!("{}: ", self.label);
        }
    }

    /// Prints each directive's prompts as its own block.
    ///
    /// Numbering runs across groups so it matches `/pick N`.
    fn print_prompts(&mut self, groups: &[Vec<String>]) {
        if groups.is_empty() {
            return;
        }
        let mut number = 0;
        for group in groups {
            let line = group
                .iter()
                .map(|prompt| {
                    number += 1;
                    format!("[{number}] {prompt}")
                })
                .collect::<Vec<_>>()
                .join("  ");
            if self.use_color {
                println!("  {ANSI_CYAN}{line}{ANSI_RESET}");
            } else {
                println!("  {line}");
            }
        }
        println!("  (/pick N to ask)");
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_user(&mut self, message: &Message, injected: bool) {
        // Typed input is already on screen.
        if !injected {
            return;
        }
        self.clear_loading();
        if self.use_color {
            println!(
                "{ANSI_ITALIC}You [{}]: {}{ANSI_RESET}",
                clock(&message.created_at),
                message.text
            );
        } else {
            println!("You [{}]: {}", clock(&message.created_at), message.text);
        }
        self.flush();
    }

    fn set_loading(&mut self, loading: bool) {
        if loading {
            if self.use_color {
                print!("{ANSI_DIM}Thinking...{ANSI_RESET}");
            } else {
                print!("Thinking...");
            }
            self.loading = true;
        } else {
            self.clear_loading();
        }
        self.flush();
    }

    fn start_reveal(&mut self) {
        self.clear_loading();
        self.print_label();
        self.flush();
    }

    fn print_text(&mut self, text: &str) {
        print!("{text}");
        self.flush();
    }

    fn finish_reveal(&mut self, message: &Message) {
        println!();
        self.print_prompts(&directive::prompt_groups(&message.text));
        self.flush();
    }

    fn print_reply(&mut self, message: &Message) {
        self.clear_loading();
        self.print_label();
        let rendered = directive::render(&message.text);
        println!("{}", rendered.content);
        self.print_prompts(&rendered.groups);
        self.flush();
    }

    fn switch_view(&mut self, view: View) {
        self.clear_loading();
        match view {
            View::Conversation => self.print_info("[back to the conversation]"),
            View::Portfolio => self.print_info("[browsing the portfolio]"),
        }
    }

    fn print_error(&mut self, error: &str) {
        self.clear_loading();
        if self.use_color {
            eprintln!("{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("Error: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        self.clear_loading();
        println!("{info}");
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
        assert_eq!(renderer.label, "Assistant");
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false).with_label("Taylor");
        assert!(!renderer.use_color);
        assert_eq!(renderer.label, "Taylor");
    }

    #[test]
    fn loading_is_cleared_by_reveal() {
        let mut renderer = PlainTextRenderer::with_color(false);
        renderer.set_loading(true);
        assert!(renderer.loading);
        renderer.start_reveal();
        assert!(!renderer.loading);
    }
}
