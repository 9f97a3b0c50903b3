use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::error::{ChatError, ChatResult};

/// `<config_dir>/palaver/<file_name>`
pub fn config_file_path(file_name: &str) -> ChatResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ChatError::Settings("Cannot determine config directory".into()))?;
    Ok(config_dir.join("palaver").join(file_name))
}

/// Read a JSON file, or `None` on first run when it does not exist yet.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> ChatResult<Option<T>> {
    if !tokio::fs::try_exists(path).await? {
        return Ok(None);
    }

    let contents = tokio::fs::read_to_string(path).await?;
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Write a JSON file atomically (temp file, then rename).
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> ChatResult<()> {
    write_atomic(path, value, false).await
}

/// Like [`write_json`], but the file is readable by its owner only on Unix.
pub async fn write_private_json<T: Serialize>(path: &Path, value: &T) -> ChatResult<()> {
    write_atomic(path, value, true).await
}

async fn write_atomic<T: Serialize>(path: &Path, value: &T, private: bool) -> ChatResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(value)?;
    let temp_path = path.with_extension("json.tmp");
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        if private {
            options.mode(0o600);
        }
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut file = options.open(&temp_path).await?;
    file.write_all(json.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);

    // `mode` only applies on creation; a leftover temp file keeps its old bits.
    #[cfg(unix)]
    {
        if private {
            tokio::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }
    }

    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

pub async fn remove_file(path: &Path) -> ChatResult<()> {
    if tokio::fs::try_exists(path).await? {
        tokio::fs::remove_file(path).await?;
    }
    Ok(())
}
