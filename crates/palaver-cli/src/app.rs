use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

use palaver_core::ChatController;
use palaver_core::auth::{AuthApi, AuthSession, CredentialsJsonRepository, CredentialsRepository};
use palaver_core::repositories::HttpConversationStore;
use palaver_core::settings::{ClientSettings, ClientSettingsJsonRepository, ClientSettingsRepository};

/// Everything a command needs: settings, auth state and where credentials live.
pub struct AppContext {
    pub settings: ClientSettings,
    pub auth: AuthSession,
    credentials: CredentialsJsonRepository,
    session_expired: Arc<AtomicBool>,
}

impl AppContext {
    /// Load settings (file, then environment, then `--api-url`) and any saved credentials.
    pub async fn load(api_url: Option<String>) -> Result<Self> {
        let settings_repo =
            ClientSettingsJsonRepository::new().context("Failed to locate settings file")?;
        let mut settings = match settings_repo.load().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = ?e, "Failed to read settings, using defaults");
                ClientSettings::default()
            }
        }
        .with_env_overrides();
        if let Some(url) = api_url {
            settings.api_base_url = url;
        }
        debug!(api = %settings.api_base(), "Using backend");

        let credentials =
            CredentialsJsonRepository::new().context("Failed to locate credentials file")?;
        let saved = credentials
            .load()
            .await
            .context("Failed to read saved credentials")?;

        let auth = AuthSession::with_credentials(saved);
        let session_expired = Arc::new(AtomicBool::new(false));
        auth.on_unauthenticated({
            let session_expired = session_expired.clone();
            move || session_expired.store(true, Ordering::SeqCst)
        });

        Ok(Self {
            settings,
            auth,
            credentials,
            session_expired,
        })
    }

    pub fn auth_api(&self) -> AuthApi {
        AuthApi::new(self.settings.api_base(), self.auth.clone())
    }

    /// Controller backed by the REST store. Requires a signed-in user.
    pub fn controller(&self) -> Result<ChatController> {
        if !self.auth.is_authenticated() {
            bail!("Not logged in. Run `palaver login` first.");
        }
        let store = HttpConversationStore::new(self.settings.api_base(), self.auth.clone());
        Ok(ChatController::with_store(store, self.settings.clone()))
    }

    /// Persist or drop credentials to match the auth session.
    pub async fn sync_credentials(&self) -> Result<()> {
        match self.auth.credentials() {
            Some(credentials) => self.credentials.save(credentials).await?,
            None => self.credentials.clear().await?,
        }
        Ok(())
    }

    /// True once the backend rejected the saved token during this run.
    pub fn session_expired(&self) -> bool {
        self.session_expired.load(Ordering::SeqCst)
    }
}
