use thiserror::Error;

/// Failures reported by a [`ConversationStore`](crate::repositories::ConversationStore).
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Remote store returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Not authenticated")]
    Unauthorized,

    #[error("Conversation not found: {0}")]
    NotFound(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors surfaced by the chat controller.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Unknown conversation: {0}")]
    UnknownConversation(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Settings(err.to_string())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
