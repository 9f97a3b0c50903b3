pub mod active_session;
pub mod conversation;
pub mod conversation_directory;
pub mod exchange_tracker;
pub mod message;
pub mod optimistic;

pub use active_session::ActiveSession;
pub use conversation::{
    ChatSettings, ConversationDetail, ConversationPatch, ConversationSummary,
    NEW_CONVERSATION_TITLE,
};
pub use conversation_directory::ConversationDirectory;
pub use exchange_tracker::{
    ExchangeOutcome, ExchangePhase, ExchangeTicket, ExchangeTracker, SkipReason,
};
pub use message::{EXCHANGE_ERROR_CONTENT, Message, NO_RESPONSE_CONTENT, Role};
pub use optimistic::Optimistic;
