//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the session without sending messages to the
//! chat endpoint.

/// A parsed chat command.
///
/// These commands control the session and are not sent to the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Switch to the portfolio view and list its questions.
    Portfolio,

    /// Switch back to the conversation.
    Conversation,

    /// Ask portfolio question N (1-based) through the question bus.
    Ask(usize),

    /// Ask follow-up prompt N (1-based) of the latest reply.
    Pick(usize),

    /// Load the previous recalled input.
    Previous,

    /// Load the next recalled input.
    Next,

    /// List recalled inputs.
    History,

    /// Display session statistics.
    Stats,

    /// Print the conversation log as JSON.
    Log,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use folio::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/ask 2").is_some());
/// assert!(parse_command("Where did you study?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "portfolio" => ChatCommand::Portfolio,
        "chat" => ChatCommand::Conversation,
        "ask" => parse_index(argument, ChatCommand::Ask, "/ask"),
        "pick" => parse_index(argument, ChatCommand::Pick, "/pick"),
        "prev" | "up" => ChatCommand::Previous,
        "next" | "down" => ChatCommand::Next,
        "history" => ChatCommand::History,
        "stats" | "status" => ChatCommand::Stats,
        "log" => ChatCommand::Log,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn parse_index(
    argument: Option<&str>,
    build: fn(usize) -> ChatCommand,
    name: &str,
) -> ChatCommand {
    match argument.map(str::parse::<usize>) {
        Some(Ok(n)) if n > 0 => build(n),
        Some(_) => ChatCommand::Invalid(format!("{name} expects a positive number")),
        None => ChatCommand::Invalid(format!("{name} requires a number")),
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /portfolio             Browse the portfolio and its suggested questions
  /chat                  Return to the conversation
  /ask <n>               Ask portfolio question n
  /pick <n>              Ask follow-up n of the latest reply
  /prev                  Recall the previous input
  /next                  Recall the next input
  /history               List recalled inputs
  /stats                 Show session statistics
  /log                   Print the conversation as JSON
  /help                  Show this help message
  /quit                  Exit the chat"#
}
