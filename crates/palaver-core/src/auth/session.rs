use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Token issued by the backend together with the account it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub token: String,
    pub username: String,
}

/// The signed-in user on whose behalf store calls are made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub username: String,
}

type UnauthenticatedHandler = Arc<dyn Fn() + Send + Sync>;

/// Shared authentication state.
///
/// Store clients read the token from here; a 401 from the backend ends up in
/// [`AuthSession::handle_unauthenticated`], which drops the credentials and
/// runs the registered redirect hooks.
#[derive(Clone, Default)]
pub struct AuthSession {
    credentials: Arc<RwLock<Option<Credentials>>>,
    handlers: Arc<Mutex<Vec<UnauthenticatedHandler>>>,
}

impl AuthSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Option<Credentials>) -> Self {
        let session = Self::new();
        *session.credentials.write() = credentials;
        session
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.read().is_some()
    }

    pub fn current_actor(&self) -> Option<Actor> {
        self.credentials.read().as_ref().map(|c| Actor {
            username: c.username.clone(),
        })
    }

    pub fn token(&self) -> Option<String> {
        self.credentials.read().as_ref().map(|c| c.token.clone())
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials.read().clone()
    }

    pub fn sign_in(&self, credentials: Credentials) {
        info!(username = %credentials.username, "Signed in");
        *self.credentials.write() = Some(credentials);
    }

    pub fn sign_out(&self) {
        *self.credentials.write() = None;
    }

    /// Register the hook run when the backend rejects the current token.
    pub fn on_unauthenticated(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.handlers.lock().push(Arc::new(handler));
    }

    pub fn handle_unauthenticated(&self) {
        debug!("Backend rejected credentials, signing out");
        self.sign_out();

        // Clone so a hook may register further hooks without deadlocking.
        let handlers: Vec<UnauthenticatedHandler> = self.handlers.lock().clone();
        for handler in handlers {
            handler();
        }
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
