use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use super::conversation_store::{BoxFuture, ConversationStore};
use crate::auth::AuthSession;
use crate::error::{RemoteError, RemoteResult};
use crate::models::{
    ChatSettings, ConversationDetail, ConversationPatch, ConversationSummary, Message,
    NEW_CONVERSATION_TITLE, NO_RESPONSE_CONTENT, Role,
};

#[derive(Deserialize)]
struct SendMessageResponse {
    #[serde(default)]
    assistant_message: Option<Message>,
}

/// Map a non-success status to a [`RemoteError`], firing the unauthenticated
/// hook on 401.
pub(crate) async fn check_status(
    response: Response,
    resource: &str,
    auth: &AuthSession,
) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED => {
            warn!(resource, "Backend returned 401");
            auth.handle_unauthenticated();
            Err(RemoteError::Unauthorized)
        }
        StatusCode::NOT_FOUND => Err(RemoteError::NotFound(resource.to_string())),
        _ => {
            let message = response.text().await.unwrap_or_default();
            Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(
    response: Response,
    resource: &str,
    auth: &AuthSession,
) -> RemoteResult<T> {
    let response = check_status(response, resource, auth).await?;
    response
        .json()
        .await
        .map_err(|e| RemoteError::Parse(format!("{resource}: {e}")))
}

/// [`ConversationStore`] backed by the chat backend's REST API.
#[derive(Debug, Clone)]
pub struct HttpConversationStore {
    client: Client,
    base_url: String,
    auth: AuthSession,
}

impl HttpConversationStore {
    pub fn new(base_url: impl Into<String>, auth: AuthSession) -> Self {
        Self::with_client(Client::new(), base_url, auth)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, auth: AuthSession) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            auth,
        }
    }

    fn conversations_url(&self) -> String {
        format!("{}/conversations/", self.base_url)
    }

    fn conversation_url(&self, id: &str) -> String {
        format!("{}/conversations/{}/", self.base_url, id)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth.token() {
            Some(token) => request.header("Authorization", format!("Token {token}")),
            None => request,
        }
    }
}

impl ConversationStore for HttpConversationStore {
    fn list_conversations(&self) -> BoxFuture<'static, RemoteResult<Vec<ConversationSummary>>> {
        let request = self.authorized(self.client.get(self.conversations_url()));
        let auth = self.auth.clone();

        Box::pin(async move {
            let response = request.send().await?;
            let conversations: Vec<ConversationSummary> =
                decode(response, "conversations", &auth).await?;
            debug!(count = conversations.len(), "Listed conversations");
            Ok(conversations)
        })
    }

    fn get_conversation(&self, id: &str) -> BoxFuture<'static, RemoteResult<ConversationDetail>> {
        let request = self.authorized(self.client.get(self.conversation_url(id)));
        let auth = self.auth.clone();
        let id = id.to_string();

        Box::pin(async move {
            let response = request.send().await?;
            decode(response, &id, &auth).await
        })
    }

    fn create_conversation(
        &self,
        settings: &ChatSettings,
    ) -> BoxFuture<'static, RemoteResult<ConversationSummary>> {
        let body = json!({
            "title": NEW_CONVERSATION_TITLE,
            "model": settings.model,
            "temperature": settings.temperature,
            "context_length": settings.context_length,
        });
        let request = self.authorized(self.client.post(self.conversations_url()).json(&body));
        let auth = self.auth.clone();

        Box::pin(async move {
            let response = request.send().await?;
            let created: ConversationSummary = decode(response, "conversations", &auth).await?;
            debug!(conversation_id = %created.id, "Created conversation");
            Ok(created)
        })
    }

    fn update_conversation(
        &self,
        id: &str,
        patch: &ConversationPatch,
    ) -> BoxFuture<'static, RemoteResult<ConversationSummary>> {
        let request = self.authorized(self.client.patch(self.conversation_url(id)).json(patch));
        let auth = self.auth.clone();
        let id = id.to_string();

        Box::pin(async move {
            let response = request.send().await?;
            decode(response, &id, &auth).await
        })
    }

    fn delete_conversation(&self, id: &str) -> BoxFuture<'static, RemoteResult<()>> {
        let request = self.authorized(self.client.delete(self.conversation_url(id)));
        let auth = self.auth.clone();
        let id = id.to_string();

        Box::pin(async move {
            let response = request.send().await?;
            check_status(response, &id, &auth).await?;
            debug!(conversation_id = %id, "Deleted conversation");
            Ok(())
        })
    }

    fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
        model: &str,
        temperature: f32,
    ) -> BoxFuture<'static, RemoteResult<Message>> {
        let url = format!("{}add_message/", self.conversation_url(conversation_id));
        let body = json!({
            "role": Role::User.as_str(),
            "content": text,
            "model": model,
            "temperature": temperature,
        });
        let request = self.authorized(self.client.post(url).json(&body));
        let auth = self.auth.clone();
        let id = conversation_id.to_string();

        Box::pin(async move {
            let response = request.send().await?;
            let reply: SendMessageResponse = decode(response, &id, &auth).await?;
            Ok(reply
                .assistant_message
                .unwrap_or_else(|| Message::assistant(NO_RESPONSE_CONTENT)))
        })
    }
}
