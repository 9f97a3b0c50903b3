use std::path::PathBuf;

use super::client_settings::ClientSettings;
use super::json_file;
use crate::error::ChatResult;
use crate::repositories::BoxFuture;

pub trait ClientSettingsRepository: Send + Sync + 'static {
    /// Load settings from storage, defaults on first run
    fn load(&self) -> BoxFuture<'static, ChatResult<ClientSettings>>;

    /// Save settings to storage
    fn save(&self, settings: ClientSettings) -> BoxFuture<'static, ChatResult<()>>;
}

pub struct ClientSettingsJsonRepository {
    file_path: PathBuf,
}

impl ClientSettingsJsonRepository {
    /// Create repository with XDG-compliant path
    pub fn new() -> ChatResult<Self> {
        Ok(Self {
            file_path: json_file::config_file_path("settings.json")?,
        })
    }

    /// Create repository with custom path (for testing)
    pub fn with_path(file_path: PathBuf) -> Self {
        Self { file_path }
    }
}

impl ClientSettingsRepository for ClientSettingsJsonRepository {
    fn load(&self) -> BoxFuture<'static, ChatResult<ClientSettings>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            Ok(json_file::read_json::<ClientSettings>(&path)
                .await?
                .unwrap_or_default())
        })
    }

    fn save(&self, settings: ClientSettings) -> BoxFuture<'static, ChatResult<()>> {
        let path = self.file_path.clone();

        Box::pin(async move { json_file::write_json(&path, &settings).await })
    }
}
