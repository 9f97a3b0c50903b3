use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

use palaver_core::models::{ChatSettings, Message};
use palaver_core::{ChatController, ChatEvent, RenameMode};

use crate::app::AppContext;

pub fn print_message(message: &Message) {
    println!("{}: {}", message.role.as_str(), message.content);
}

pub fn print_conversations(chat: &ChatController) {
    let snapshot = chat.snapshot();
    if snapshot.conversations.is_empty() {
        println!("No conversations yet. Start one with `palaver new`.");
        return;
    }
    for conv in &snapshot.conversations {
        let marker = if snapshot.active_conversation_id.as_deref() == Some(conv.id.as_str()) {
            '*'
        } else {
            ' '
        };
        println!("{marker} {}  {}", conv.id, conv.title);
    }
}

pub async fn list(ctx: &AppContext) -> Result<()> {
    let chat = ctx.controller()?;
    chat.load().await.context("Failed to load conversations")?;
    print_conversations(&chat);
    Ok(())
}

pub async fn create(ctx: &AppContext) -> Result<()> {
    let chat = ctx.controller()?;
    let created = chat
        .create_conversation(ctx.settings.default_chat_settings())
        .await
        .context("Failed to create conversation")?;
    println!("{}", created.id);
    Ok(())
}

pub async fn show(ctx: &AppContext, id: &str) -> Result<()> {
    let chat = ctx.controller()?;
    chat.select_conversation(id)
        .await
        .with_context(|| format!("Failed to load conversation {id}"))?;

    let snapshot = chat.snapshot();
    if let Some(title) = snapshot.active_title() {
        println!("# {title}");
    }
    for message in &snapshot.messages {
        print_message(message);
    }
    Ok(())
}

pub async fn rename(ctx: &AppContext, id: &str, title: &str, animate: bool) -> Result<()> {
    let chat = ctx.controller()?;
    chat.load_directory()
        .await
        .context("Failed to load conversations")?;

    if !animate {
        chat.rename_conversation(id, title, RenameMode::Direct)
            .await
            .context("Rename failed")?;
        let snapshot = chat.snapshot();
        let confirmed = snapshot
            .conversations
            .iter()
            .find(|c| c.id == id)
            .map_or(title, |c| c.title.as_str());
        println!("Renamed to {confirmed}");
        return Ok(());
    }

    let mut events = chat.subscribe();
    let rename = chat.rename_conversation(id, title, RenameMode::Presented);
    tokio::pin!(rename);

    let mut stdout = tokio::io::stdout();
    let result = loop {
        tokio::select! {
            result = &mut rename => break result,
            Ok(event) = events.recv() => {
                if let ChatEvent::TitleChanged { conversation_id, title } = event
                    && conversation_id == id
                {
                    stdout.write_all(format!("\r{title}").as_bytes()).await?;
                    stdout.flush().await?;
                }
            }
        }
    };
    println!();
    result.context("Rename failed")?;
    Ok(())
}

pub async fn delete(ctx: &AppContext, id: &str) -> Result<()> {
    let chat = ctx.controller()?;
    chat.delete_conversation(id).await.context("Delete failed")?;
    println!("Deleted {id}");
    Ok(())
}

pub async fn settings(
    ctx: &AppContext,
    id: &str,
    model: Option<String>,
    temperature: Option<f32>,
    context_length: Option<u32>,
) -> Result<()> {
    let chat = ctx.controller()?;
    chat.select_conversation(id)
        .await
        .with_context(|| format!("Failed to load conversation {id}"))?;

    let current = chat.snapshot().settings;
    let updated = ChatSettings {
        model: model.unwrap_or(current.model),
        temperature: temperature.unwrap_or(current.temperature),
        context_length: context_length.unwrap_or(current.context_length),
    };
    chat.update_settings(id, updated)
        .await
        .context("Failed to update settings")?;

    let settings = chat.snapshot().settings;
    println!(
        "model={} temperature={} context_length={}",
        settings.model, settings.temperature, settings.context_length
    );
    Ok(())
}
