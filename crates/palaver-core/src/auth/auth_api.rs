use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::session::{AuthSession, Credentials};
use crate::error::{RemoteError, RemoteResult};
use crate::repositories::http_store::check_status;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountInfo {
    pub id: serde_json::Value,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    user: AccountInfo,
    token: String,
}

/// Decode a login or registration response.
///
/// A rejected attempt, 401 included, is a plain status error and leaves the
/// current session and its unauthenticated hooks alone.
async fn decode_credentials(response: Response, resource: &str) -> RemoteResult<AuthResponse> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        warn!(resource, status = status.as_u16(), "Auth request rejected");
        return Err(RemoteError::Status {
            status: status.as_u16(),
            message,
        });
    }
    response
        .json()
        .await
        .map_err(|e| RemoteError::Parse(format!("{resource}: {e}")))
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    password: &'a str,
    email: &'a str,
}

/// Account endpoints of the chat backend.
///
/// Successful login and registration sign the shared [`AuthSession`] in.
#[derive(Debug, Clone)]
pub struct AuthApi {
    client: Client,
    base_url: String,
    session: AuthSession,
}

impl AuthApi {
    pub fn new(base_url: impl Into<String>, session: AuthSession) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> RemoteResult<Credentials> {
        let response = self
            .client
            .post(format!("{}/auth/login/", self.base_url))
            .json(&LoginRequest { username, password })
            .send()
            .await?;
        self.accept(decode_credentials(response, "auth/login").await?)
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> RemoteResult<Credentials> {
        let response = self
            .client
            .post(format!("{}/auth/register/", self.base_url))
            .json(&RegisterRequest {
                username,
                password,
                email,
            })
            .send()
            .await?;
        self.accept(decode_credentials(response, "auth/register").await?)
    }

    /// Invalidate the token remotely. Local credentials are dropped even when
    /// the backend call fails; the error is still returned.
    pub async fn logout(&self) -> RemoteResult<()> {
        let Some(token) = self.session.token() else {
            return Ok(());
        };

        let result: RemoteResult<()> = async {
            let response = self
                .client
                .post(format!("{}/auth/logout/", self.base_url))
                .header("Authorization", format!("Token {token}"))
                .send()
                .await?;
            check_status(response, "auth/logout", &self.session).await?;
            Ok(())
        }
        .await;

        if let Err(e) = &result {
            warn!(error = %e, "Remote logout failed");
        }
        self.session.sign_out();
        info!("Signed out");
        result
    }

    fn accept(&self, response: AuthResponse) -> RemoteResult<Credentials> {
        let credentials = Credentials {
            token: response.token,
            username: response.user.username,
        };
        self.session.sign_in(credentials.clone());
        Ok(credentials)
    }
}
