use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::message::Message;
use crate::error::{ChatError, ChatResult};

/// Title given to every conversation when it is created.
pub const NEW_CONVERSATION_TITLE: &str = "New Conversation";

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_CONTEXT_LENGTH: u32 = 4000;

/// The backend allows `title: null`; treat it as an empty title.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Generation parameters of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f32,
    pub context_length: u32,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            context_length: DEFAULT_CONTEXT_LENGTH,
        }
    }
}

impl ChatSettings {
    pub fn validate(&self) -> ChatResult<()> {
        if self.model.trim().is_empty() {
            return Err(ChatError::validation("model must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ChatError::validation(format!(
                "temperature {} is outside 0.0..=1.0",
                self.temperature
            )));
        }
        if self.context_length == 0 {
            return Err(ChatError::validation("context length must be positive"));
        }
        Ok(())
    }
}

/// Sidebar entry for one remote conversation.
///
/// The generation fields are optional on the wire; use
/// [`ConversationSummary::settings_or`] to resolve them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConversationSummary {
    /// Generation settings of this conversation, each missing field taken from `fallback`.
    pub fn settings_or(&self, fallback: &ChatSettings) -> ChatSettings {
        ChatSettings {
            model: self
                .model
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| fallback.model.clone()),
            temperature: self.temperature.unwrap_or(fallback.temperature),
            context_length: self
                .context_length
                .filter(|len| *len > 0)
                .unwrap_or(fallback.context_length),
        }
    }

    pub fn apply_settings(&mut self, settings: &ChatSettings) {
        self.model = Some(settings.model.clone());
        self.temperature = Some(settings.temperature);
        self.context_length = Some(settings.context_length);
    }
}

/// A conversation together with its full message history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub summary: ConversationSummary,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Partial update sent with `updateConversation`; absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u32>,
}

impl ConversationPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn settings(settings: &ChatSettings) -> Self {
        Self {
            title: None,
            model: Some(settings.model.clone()),
            temperature: Some(settings.temperature),
            context_length: Some(settings.context_length),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.model.is_none()
            && self.temperature.is_none()
            && self.context_length.is_none()
    }

    /// Applies the present fields to `summary`.
    pub fn apply_to(&self, summary: &mut ConversationSummary) {
        if let Some(title) = &self.title {
            summary.title = title.clone();
        }
        if let Some(model) = &self.model {
            summary.model = Some(model.clone());
        }
        if let Some(temperature) = self.temperature {
            summary.temperature = Some(temperature);
        }
        if let Some(context_length) = self.context_length {
            summary.context_length = Some(context_length);
        }
    }
}
