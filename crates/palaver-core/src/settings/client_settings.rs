use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::ChatSettings;
use crate::models::conversation::{DEFAULT_CONTEXT_LENGTH, DEFAULT_MODEL, DEFAULT_TEMPERATURE};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Environment variable overriding [`ClientSettings::api_base_url`].
pub const API_URL_ENV: &str = "PALAVER_API_URL";

/// Client configuration, persisted as JSON. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub api_base_url: String,
    /// Pause before each revealed character of an assistant reply.
    pub reveal_interval_ms: u64,
    /// Pause before each revealed character of a synthesized title.
    pub title_interval_ms: u64,
    /// Deadline for a whole exchange; elapsing behaves like "stop generating".
    pub exchange_timeout_secs: Option<u64>,
    pub default_model: String,
    pub default_temperature: f32,
    pub default_context_length: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            reveal_interval_ms: 10,
            title_interval_ms: 30,
            exchange_timeout_secs: None,
            default_model: DEFAULT_MODEL.to_string(),
            default_temperature: DEFAULT_TEMPERATURE,
            default_context_length: DEFAULT_CONTEXT_LENGTH,
        }
    }
}

impl ClientSettings {
    pub fn reveal_interval(&self) -> Duration {
        Duration::from_millis(self.reveal_interval_ms)
    }

    pub fn title_interval(&self) -> Duration {
        Duration::from_millis(self.title_interval_ms)
    }

    pub fn exchange_timeout(&self) -> Option<Duration> {
        self.exchange_timeout_secs.map(Duration::from_secs)
    }

    /// Fallback generation settings for new and under-specified conversations.
    pub fn default_chat_settings(&self) -> ChatSettings {
        ChatSettings {
            model: self.default_model.clone(),
            temperature: self.default_temperature,
            context_length: self.default_context_length,
        }
    }

    /// Apply overrides from the environment.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV)
            && !url.trim().is_empty()
        {
            self.api_base_url = url.trim().to_string();
        }
        self
    }

    /// Base URL without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}
