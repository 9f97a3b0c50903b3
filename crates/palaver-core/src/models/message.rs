use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content shown when the store replies without an assistant message.
pub const NO_RESPONSE_CONTENT: &str = "No response received";

/// Content of the synthetic assistant message appended when an exchange fails.
pub const EXCHANGE_ERROR_CONTENT: &str = "⚠️ Error processing request.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of a conversation's history.
///
/// Locally created user messages carry no `id` until the store confirms them;
/// the history is append-only, so a message is never removed on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Role::User,
            content: content.into(),
            created_at: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Role::Assistant,
            content: content.into(),
            created_at: None,
        }
    }

    /// Same identity and role with the content cleared, used as the reveal placeholder.
    pub fn placeholder_for(reply: &Message) -> Self {
        Self {
            content: String::new(),
            ..reply.clone()
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}
