//! Interactive terminal front end for the portfolio conversation.
//!
//! This binary plays the part of the portfolio site's view layer: it types
//! questions into a [`ChatEngine`], shows each reply as it is revealed, and
//! lets the visitor browse a read-only catalog whose suggested questions
//! reach the conversation through the question bus.
//!
//! # Usage
//!
//! ```bash
//! # Talk to the endpoint named by $FOLIO_CHAT_ENDPOINT (or localhost)
//! folio-chat
//!
//! # Point at a deployed endpoint with a custom catalog
//! folio-chat --endpoint https://example.com/api/chat --catalog portfolio.json
//!
//! # Disable colors (useful for piping output)
//! folio-chat --no-color
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/portfolio` - Browse the catalog and its questions
//! - `/ask <n>` - Ask catalog question n
//! - `/pick <n>` - Ask follow-up n of the latest reply
//! - `/prev`, `/next` - Walk recent inputs
//! - `/quit` - Exit the application

use std::sync::{Arc, Mutex, PoisonError};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;

use folio::chat::{
    ChatArgs, ChatCommand, ChatConfig, PlainTextRenderer, Renderer, help_text, parse_command,
};
use folio::{
    Catalog, ChatClient, ChatEngine, Direction, QuestionBus, QuestionWidget, TracingLogger, View,
};

/// Main entry point for the folio-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("folio-chat [OPTIONS]");
    let config = ChatConfig::from(args);
    let use_color = config.use_color;

    let level = if config.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    let catalog = match &config.catalog_path {
        Some(path) => Catalog::load(path)?,
        None => Catalog::default(),
    };
    let client = ChatClient::with_options(config.endpoint.clone(), config.timeout)?
        .with_logger(Arc::new(TracingLogger));
    println!("Portfolio chat ({})", client.endpoint());
    println!("Type /help for commands, /quit to exit\n");

    let bus = QuestionBus::new();
    let widget = QuestionWidget::new(bus.clone());
    let mut engine = ChatEngine::new(
        config.engine_config(),
        client,
        PlainTextRenderer::with_color(use_color),
    )?;
    engine.attach(&bus);
    let mut renderer = PlainTextRenderer::with_color(use_color);
    let mut rl = DefaultEditor::new()?;

    // Ctrl+C while a reply is in flight tears the engine down.
    let interrupt = Arc::new(Mutex::new(CancellationToken::new()));
    let interrupt_clone = Arc::clone(&interrupt);
    ctrlc::set_handler(move || {
        interrupt_clone
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    })?;

    loop {
        // A Ctrl+C at the prompt must not cancel the next turn.
        let interrupted = {
            let mut token = interrupt.lock().unwrap_or_else(PoisonError::into_inner);
            *token = CancellationToken::new();
            token.clone()
        };
        let initial = engine.input();
        let readline = rl.readline_with_initial("You: ", (&initial, ""));

        match readline {
            Ok(line) => {
                engine.set_input("");
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(trimmed);

                if let Some(cmd) = parse_command(trimmed) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Portfolio => {
                            engine.set_view(View::Portfolio);
                            print_catalog(&catalog);
                        }
                        ChatCommand::Conversation => {
                            engine.set_view(View::Conversation);
                        }
                        ChatCommand::Ask(n) => match widget.ask_numbered(&catalog, n) {
                            Ok(0) => renderer.print_error("Nobody is listening for questions."),
                            Ok(_) => {
                                if !wait_for_reply(&mut engine, &interrupted).await {
                                    break;
                                }
                            }
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::Pick(n) => {
                            let prompts = engine.follow_ups();
                            match prompts.get(n - 1) {
                                Some(prompt) => {
                                    widget.ask(prompt);
                                    if !wait_for_reply(&mut engine, &interrupted).await {
                                        break;
                                    }
                                }
                                None if prompts.is_empty() => {
                                    renderer.print_error("The latest reply has no follow-ups.")
                                }
                                None => renderer.print_error(&format!(
                                    "no follow-up {n}; choose 1-{}",
                                    prompts.len()
                                )),
                            }
                        }
                        ChatCommand::Previous => {
                            if engine.navigate_history(Direction::Older).is_none() {
                                renderer.print_info("Nothing to recall.");
                            }
                        }
                        ChatCommand::Next => {
                            engine.navigate_history(Direction::Newer);
                        }
                        ChatCommand::History => {
                            print_history(&engine);
                        }
                        ChatCommand::Stats => {
                            print_stats(&engine);
                        }
                        ChatCommand::Log => match serde_json::to_string_pretty(&engine.messages()) {
                            Ok(json) => println!("{json}"),
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                // Sent as typed.
                engine.set_input(line.as_str());
                if engine.submit_input().is_some() && !wait_for_reply(&mut engine, &interrupted).await
                {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    engine.shutdown();
    Ok(())
}

/// Waits for the current turn to finish; returns false if interrupted.
async fn wait_for_reply(engine: &mut ChatEngine, interrupted: &CancellationToken) -> bool {
    let stopped = tokio::select! {
        _ = interrupted.cancelled() => true,
        idle = engine.wait_idle() => idle.is_err(),
    };
    if stopped {
        engine.shutdown();
        println!("\nInterrupted.");
    }
    !stopped
}

fn print_catalog(catalog: &Catalog) {
    let mut n = 0;
    for section in &catalog.sections {
        println!("  {}", section.name);
        for card in &section.cards {
            if card.subtitle.is_empty() {
                println!("    {}", card.title);
            } else {
                println!("    {} ({})", card.title, card.subtitle);
            }
            if !card.description.is_empty() {
                println!("      {}", card.description);
            }
            for link in &card.links {
                println!("      {}: {}", link.name, link.url);
            }
            for question in &card.questions {
                n += 1;
                println!("      [{n}] {question}");
            }
        }
    }
    println!("  (/ask N to ask, /chat to return)");
}

fn print_history(engine: &ChatEngine) {
    let snapshot = engine.snapshot();
    if snapshot.recall.is_empty() {
        println!("    No inputs yet.");
        return;
    }
    for (offset, entry) in snapshot.recall.iter().enumerate() {
        let marker = if offset as isize == snapshot.cursor {
            ">"
        } else {
            " "
        };
        println!("  {marker} {offset}: {entry}");
    }
}

fn print_stats(engine: &ChatEngine) {
    let stats = engine.stats();
    println!("    Session Statistics:");
    println!("      Messages: {}", stats.message_count);
    println!("      Submissions: {}", stats.submissions);
    println!("      Rejected: {}", stats.rejected);
    println!("      Failures: {}", stats.failures);
    println!("      Recall entries: {}", stats.recall_len);
    match stats.last_failure {
        Some(reason) => println!("      Last failure: {reason}"),
        None => println!("      Last failure: none"),
    }
}
