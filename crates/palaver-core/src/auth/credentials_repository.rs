use std::path::PathBuf;

use super::session::Credentials;
use crate::error::ChatResult;
use crate::repositories::BoxFuture;
use crate::settings::json_file;

/// Persists the signed-in user's token between runs.
pub trait CredentialsRepository: Send + Sync + 'static {
    fn load(&self) -> BoxFuture<'static, ChatResult<Option<Credentials>>>;

    fn save(&self, credentials: Credentials) -> BoxFuture<'static, ChatResult<()>>;

    fn clear(&self) -> BoxFuture<'static, ChatResult<()>>;
}

pub struct CredentialsJsonRepository {
    file_path: PathBuf,
}

impl CredentialsJsonRepository {
    pub fn new() -> ChatResult<Self> {
        Ok(Self {
            file_path: json_file::config_file_path("credentials.json")?,
        })
    }

    pub fn with_path(file_path: PathBuf) -> Self {
        Self { file_path }
    }
}

impl CredentialsRepository for CredentialsJsonRepository {
    fn load(&self) -> BoxFuture<'static, ChatResult<Option<Credentials>>> {
        let path = self.file_path.clone();
        Box::pin(async move { json_file::read_json(&path).await })
    }

    fn save(&self, credentials: Credentials) -> BoxFuture<'static, ChatResult<()>> {
        let path = self.file_path.clone();
        Box::pin(async move { json_file::write_private_json(&path, &credentials).await })
    }

    fn clear(&self) -> BoxFuture<'static, ChatResult<()>> {
        let path = self.file_path.clone();
        Box::pin(async move { json_file::remove_file(&path).await })
    }
}
