use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ChatError, ChatResult};
use crate::models::{ConversationPatch, ConversationSummary};
use crate::repositories::ConversationStore;

/// Characters of the first user message kept in a synthesized title.
pub const TITLE_PREFIX_CHARS: usize = 30;

const ELLIPSIS: &str = "...";

/// Title for a conversation, derived from its first user message.
pub fn derive_title(input: &str) -> String {
    let mut chars = input.chars();
    let prefix: String = chars.by_ref().take(TITLE_PREFIX_CHARS).collect();
    if chars.next().is_some() {
        format!("{prefix}{ELLIPSIS}")
    } else {
        prefix
    }
}

/// Where the presenter publishes titles.
pub trait TitleTarget: Send + Sync + 'static {
    /// Show a partial title. Returns `false` once the conversation is gone.
    fn show_title(&self, conversation_id: &str, title: &str) -> bool;

    /// Replace the local summary with the store-confirmed one.
    fn confirm_title(&self, summary: ConversationSummary);
}

/// Type `final_title` into the target one character per `interval`, then
/// persist it with a single update.
///
/// A failed update is logged and returned; the last displayed title stays.
pub async fn present_title(
    target: Arc<dyn TitleTarget>,
    store: Arc<dyn ConversationStore>,
    conversation_id: String,
    final_title: String,
    interval: Duration,
) -> ChatResult<()> {
    debug!(conversation_id = %conversation_id, title = %final_title, "Presenting title");

    let mut shown = String::with_capacity(final_title.len());
    for ch in final_title.chars() {
        tokio::time::sleep(interval).await;
        shown.push(ch);
        if !target.show_title(&conversation_id, &shown) {
            debug!(conversation_id = %conversation_id, "Conversation gone, title not persisted");
            return Err(ChatError::Cancelled);
        }
    }

    match store
        .update_conversation(&conversation_id, &ConversationPatch::title(final_title))
        .await
    {
        Ok(summary) => {
            target.confirm_title(summary);
            Ok(())
        }
        Err(e) => {
            warn!(conversation_id = %conversation_id, error = ?e, "Failed to persist title");
            Err(e.into())
        }
    }
}
