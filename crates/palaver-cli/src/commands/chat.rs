use std::io::Write;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use palaver_core::models::{ExchangeOutcome, SkipReason};
use palaver_core::{ChatController, ChatEvent};

use super::conversations::{print_conversations, print_message};
use crate::app::AppContext;

const HELP: &str = "Commands: /new, /list, /switch <id>, /quit. Ctrl-C stops a reply.";

enum Flow {
    Continue,
    Quit,
}

/// Prints the assistant message of the running exchange as it is revealed.
#[derive(Default)]
struct ReplyPrinter {
    printed: usize,
}

impl ReplyPrinter {
    fn handle(&mut self, event: &ChatEvent) -> Result<()> {
        let ChatEvent::MessagesChanged { messages, .. } = event else {
            return Ok(());
        };
        let Some(last) = messages.last() else {
            return Ok(());
        };

        if last.is_user() {
            self.printed = 0;
            return Ok(());
        }
        if last.content.len() > self.printed {
            let mut stdout = std::io::stdout();
            stdout.write_all(last.content[self.printed..].as_bytes())?;
            stdout.flush()?;
            self.printed = last.content.len();
        }
        Ok(())
    }
}

pub async fn run(ctx: &AppContext, id: Option<String>) -> Result<()> {
    let chat = ctx.controller()?;
    chat.load().await.context("Failed to load conversations")?;

    match id {
        Some(id) => chat
            .select_conversation(&id)
            .await
            .with_context(|| format!("Failed to load conversation {id}"))?,
        None if chat.snapshot().active_conversation_id.is_none() => {
            chat.create_conversation(ctx.settings.default_chat_settings())
                .await
                .context("Failed to create conversation")?;
        }
        None => {}
    }

    print_history(&chat);
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read from stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            match handle_command(ctx, &chat, command).await {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => eprintln!("{e:#}"),
            }
            continue;
        }

        exchange(&chat, line).await?;
    }

    // Let a pending title finish typing and saving before exit.
    chat.settle().await;
    Ok(())
}

fn print_history(chat: &ChatController) {
    let snapshot = chat.snapshot();
    if let Some(title) = snapshot.active_title() {
        println!("# {title}");
    }
    for message in &snapshot.messages {
        print_message(message);
    }
}

async fn handle_command(ctx: &AppContext, chat: &ChatController, command: &str) -> Result<Flow> {
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match name {
        "quit" | "exit" => return Ok(Flow::Quit),
        "new" => {
            let created = chat
                .create_conversation(ctx.settings.default_chat_settings())
                .await
                .context("Failed to create conversation")?;
            println!("Started {}", created.id);
        }
        "list" => {
            chat.load().await.context("Failed to load conversations")?;
            print_conversations(chat);
        }
        "switch" if !arg.is_empty() => {
            chat.select_conversation(arg)
                .await
                .with_context(|| format!("Failed to load conversation {arg}"))?;
            print_history(chat);
        }
        _ => println!("{HELP}"),
    }
    Ok(Flow::Continue)
}

async fn exchange(chat: &ChatController, text: &str) -> Result<()> {
    let mut events = chat.subscribe();
    let mut printer = ReplyPrinter::default();

    let send = chat.send_message(text);
    tokio::pin!(send);

    let outcome = loop {
        tokio::select! {
            outcome = &mut send => break outcome,
            Ok(event) = events.recv() => printer.handle(&event)?,
            _ = tokio::signal::ctrl_c() => {
                chat.stop_generation();
            }
        }
    };
    while let Ok(event) = events.try_recv() {
        printer.handle(&event)?;
    }
    println!();

    debug!(?outcome, "Exchange ended");
    match outcome {
        ExchangeOutcome::Stopped => println!("[stopped]"),
        ExchangeOutcome::Skipped(SkipReason::NoActiveConversation) => {
            println!("No conversation selected. Use /new or /switch <id>.")
        }
        ExchangeOutcome::Skipped(SkipReason::ExchangeInFlight) => {
            println!("Still waiting for the previous reply.")
        }
        _ => {}
    }
    Ok(())
}
