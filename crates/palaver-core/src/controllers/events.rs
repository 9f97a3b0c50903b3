use crate::models::{ExchangeOutcome, Message};

/// Events published by the chat controller for decoupled UI updates.
/// Variants touching one conversation carry its id so subscribers can filter.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatEvent {
    /// The set or order of conversation summaries changed.
    DirectoryChanged,
    ActiveConversationChanged {
        conversation_id: Option<String>,
    },
    /// Full message list of the active session after a change.
    MessagesChanged {
        conversation_id: Option<String>,
        messages: Vec<Message>,
    },
    TitleChanged {
        conversation_id: String,
        title: String,
    },
    LoadingChanged(bool),
    ExchangeFinished {
        conversation_id: String,
        outcome: ExchangeOutcome,
    },
}
